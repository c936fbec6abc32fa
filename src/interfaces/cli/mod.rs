//! Command-line surface: one subcommand per engine operation, plus `watch` and
//! `demo` which drive the polling protocol.

pub mod args;
pub mod json_writer;

use crate::application::engine::{NewTransaction, TransactionEngine};
use crate::application::polling::{
    self, CLIENT_TARGETS, CancelSignal, PollOutcome, PollPolicy,
};
use crate::config::EngineConfig;
use crate::domain::charges::Percent;
use crate::domain::transaction::{TransactionId, TransactionStatus};
use crate::error::{PaymentError, Result};
use args::{Command, EngineArgs};
use json_writer::JsonWriter;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

impl EngineArgs {
    pub fn to_config(&self) -> Result<EngineConfig> {
        let sojor = Percent::new(self.sojor_percent)?;
        let config = EngineConfig::new(self.secret.as_bytes())
            .with_token_ttl(Duration::from_secs(self.token_ttl_seconds))
            .with_sojor_percent(sojor)
            .with_clear_requires_auth(self.clear_requires_auth)
            .with_strict_roles(self.strict_roles)
            .with_preview_base(self.preview_base.as_str());
        config.validate()?;
        Ok(config)
    }
}

/// Executes one command and writes its JSON result to `out`.
pub async fn run<W: Write>(
    engine: Arc<TransactionEngine>,
    command: Command,
    out: &mut JsonWriter<W>,
) -> Result<()> {
    match command {
        Command::Token { subject, role } => {
            emit(out, &engine.issue_token(&subject, role.as_deref())?)
        }
        Command::Whoami { token } => emit(out, &json!({ "ok": true, "claims": engine.whoami(&token)? })),
        Command::Create {
            token,
            source,
            destination,
            amount,
            buyer_float_percent,
        } => {
            let created = engine
                .create(
                    &token,
                    NewTransaction {
                        source,
                        destination,
                        amount,
                        buyer_float_percent,
                    },
                )
                .await?;
            emit(out, &created)
        }
        Command::Status { id, token } => {
            let snapshot = engine.status(&parse_id(&id)?, &token).await?;
            emit(out, &json!({ "tx": snapshot }))
        }
        Command::Pending { token } => {
            emit(out, &json!({ "transactions": engine.list_pending(&token).await? }))
        }
        Command::Ready { token } => {
            emit(out, &json!({ "transactions": engine.list_ready(&token).await? }))
        }
        Command::Confirm { id, token } => {
            let status = engine.confirm(&parse_id(&id)?, &token).await?;
            emit(out, &json!({ "ok": true, "status": status }))
        }
        Command::Authorize { id, token } => {
            let status = engine.authorize(&parse_id(&id)?, &token).await?;
            emit(out, &json!({ "ok": true, "status": status }))
        }
        Command::Cancel { id, token } => {
            let status = engine.cancel(&parse_id(&id)?, &token).await?;
            emit(out, &json!({ "ok": true, "status": status }))
        }
        Command::Clear { id, token } => {
            engine.clear(&parse_id(&id)?, token.as_deref()).await?;
            emit(out, &json!({ "ok": true }))
        }
        Command::Watch {
            id,
            token,
            poll,
            ttl_seconds,
        } => {
            let id = parse_id(&id)?;
            let mut policy = PollPolicy::new(Duration::from_millis(poll.interval_ms));
            if let Some(ttl) = ttl_seconds {
                policy = policy.with_ttl(Duration::from_secs(ttl));
            }
            let outcome = polling::watch_transaction(
                &engine,
                &id,
                &token,
                CLIENT_TARGETS,
                policy,
                CancelSignal::never(),
            )
            .await;
            match outcome {
                PollOutcome::Reached(snapshot) => emit(out, &json!({ "tx": snapshot })),
                PollOutcome::Expired => emit(out, &json!({ "stopped": "expired" })),
                PollOutcome::Cancelled => emit(out, &json!({ "stopped": "cancelled" })),
                PollOutcome::Failed(e) => Err(e),
            }
        }
        Command::Demo {
            amount,
            buyer_float_percent,
            poll,
        } => {
            let summary = demo(
                engine,
                amount,
                buyer_float_percent,
                Duration::from_millis(poll.interval_ms),
            )
            .await?;
            emit(out, &summary)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemoSummary {
    pub tx_id: TransactionId,
    pub grand_total: Decimal,
    pub pos_saw_pending: usize,
    pub client_observed: Vec<TransactionStatus>,
    pub final_status: TransactionStatus,
}

/// Client creates a transaction and polls it while a POS poller picks it up,
/// confirms it, then authorizes it.
async fn demo(
    engine: Arc<TransactionEngine>,
    amount: Decimal,
    buyer_float_percent: Decimal,
    interval: Duration,
) -> Result<DemoSummary> {
    let client = engine.issue_token("demo-client", Some("client"))?;
    let pos = engine.issue_token("demo-pos", Some("pos"))?;
    let ttl = Duration::from_secs(client.ttl_seconds);

    let created = engine
        .create(
            &client.token,
            NewTransaction {
                source: "demo-client".to_string(),
                destination: "demo-merchant".to_string(),
                amount,
                buyer_float_percent: Some(buyer_float_percent),
            },
        )
        .await?;
    let tx_id = created.tx_id;

    let pos_task = {
        let engine = engine.clone();
        let token = pos.token.clone();
        tokio::spawn(async move {
            let policy = PollPolicy::new(interval).with_ttl(ttl);
            let pending = match polling::watch_queue(
                &engine,
                TransactionStatus::Waiting,
                &token,
                policy,
                CancelSignal::never(),
            )
            .await
            {
                PollOutcome::Reached(list) => list,
                PollOutcome::Failed(e) => return Err(e),
                _ => return Err(PaymentError::internal("POS stopped polling before work arrived")),
            };
            engine.confirm(&tx_id, &token).await?;
            // Give the client poller a chance to observe READY_FOR_AUTH.
            tokio::time::sleep(interval * 2).await;
            engine.authorize(&tx_id, &token).await?;
            Ok::<usize, PaymentError>(pending.len())
        })
    };

    let policy = PollPolicy::new(interval).with_ttl(ttl);
    let mut observed = Vec::new();
    let outcome = polling::poll_until(
        policy,
        CancelSignal::never(),
        || engine.status(&tx_id, &created.tx_token),
        |snapshot| {
            let status = snapshot.transaction.status;
            if observed.last() != Some(&status) {
                observed.push(status);
            }
            status.is_terminal()
        },
    )
    .await;

    let pos_saw_pending = pos_task
        .await
        .map_err(|e| PaymentError::InternalError(Box::new(e)))??;
    let final_status = match outcome {
        PollOutcome::Reached(snapshot) => snapshot.transaction.status,
        PollOutcome::Failed(e) => return Err(e),
        PollOutcome::Expired | PollOutcome::Cancelled => {
            return Err(PaymentError::internal("client stopped polling before settlement"));
        }
    };

    Ok(DemoSummary {
        tx_id,
        grand_total: created.grand_total,
        pos_saw_pending,
        client_observed: observed,
        final_status,
    })
}

fn emit<W: Write, T: Serialize>(out: &mut JsonWriter<W>, value: &T) -> Result<()> {
    out.write(value)
        .map_err(|e| PaymentError::InternalError(Box::new(e)))
}

fn parse_id(id: &str) -> Result<TransactionId> {
    id.parse()
}

use crate::error::PaymentError;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

/// Writes one JSON document per line to any `Write` sink.
pub struct JsonWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write<T: Serialize>(&mut self, value: &T) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, value)?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    /// Writes `{"error": <kind>, "message": <text>}`.
    pub fn write_error(&mut self, err: &PaymentError) -> io::Result<()> {
        self.write(&ErrorBody {
            error: err.kind().as_str(),
            message: err.to_string(),
        })
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

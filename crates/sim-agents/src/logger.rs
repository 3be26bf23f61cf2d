//! Logger Agent
//!
//! Serializes simulation log writes through its own mailbox. Normal records
//! are one line each; error records are framed by banners.

use std::cell::RefCell;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use futures::FutureExt;

use crate::agent::{Agent, HandlerTable};
use crate::context::AgentContext;
use crate::error::{AgentError, HandlerResult};
use crate::timestamp::RelativeTime;
use crate::value::{Params, Value};

const BANNER_WIDTH: usize = 60;

/// In-memory sink whose contents stay readable after the logger stops.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.borrow()).into_owned()
    }
}

/// Destination of one log stream.
#[derive(Debug)]
pub enum LogSink {
    Stdout,
    Stderr,
    File(BufWriter<File>),
    Buffer(SharedBuffer),
    Null,
}

impl LogSink {
    /// Truncates or creates `path`.
    pub fn file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(LogSink::File(BufWriter::new(file)))
    }
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::Stdout => io::stdout().write(buf),
            LogSink::Stderr => io::stderr().write(buf),
            LogSink::File(writer) => writer.write(buf),
            LogSink::Buffer(buffer) => {
                buffer.0.borrow_mut().extend_from_slice(buf);
                Ok(buf.len())
            }
            LogSink::Null => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::Stdout => io::stdout().flush(),
            LogSink::Stderr => io::stderr().flush(),
            LogSink::File(writer) => writer.flush(),
            LogSink::Buffer(_) | LogSink::Null => Ok(()),
        }
    }
}

/// The `logger` service.
#[derive(Debug)]
pub struct Logger {
    normal: LogSink,
    errors: LogSink,
    entry_count: u64,
    error_count: u64,
}

impl Logger {
    pub fn new(normal: LogSink, errors: LogSink) -> Self {
        Self {
            normal,
            errors,
            entry_count: 0,
            error_count: 0,
        }
    }

    /// Normal records to stdout, errors to stderr.
    pub fn console() -> Self {
        Self::new(LogSink::Stdout, LogSink::Stderr)
    }

    /// A logger that discards everything (for testing)
    pub fn null() -> Self {
        Self::new(LogSink::Null, LogSink::Null)
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn error_count(&self) -> u64 {
        self.error_count
    }

    pub fn write_entry(
        &mut self,
        sender: &str,
        message: &str,
        when: RelativeTime,
    ) -> io::Result<()> {
        self.entry_count += 1;
        writeln!(self.normal, "[{sender}: {when}] {message}")
    }

    pub fn write_error(&mut self, sender: &str, text: &str) -> io::Result<()> {
        self.error_count += 1;
        let title = format!(" ERROR in {sender} ");
        writeln!(self.errors, "{:=^width$}", title, width = BANNER_WIDTH)?;
        writeln!(self.errors, "{}", text.trim_end())?;
        writeln!(self.errors, "{}", "=".repeat(BANNER_WIDTH))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.normal.flush()?;
        self.errors.flush()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "failed to flush simulation log");
        }
    }
}

fn sender_of(params: &Params) -> String {
    params
        .get("sender")
        .map(|sender| match sender {
            Value::Str(name) => name.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "?".to_string())
}

fn io_failure(e: io::Error) -> AgentError {
    AgentError::handler(format!("log write failed: {e}"))
}

fn log_entry<'a>(
    logger: &'a mut Logger,
    ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let sender = sender_of(&params);
        let message = params.str("message")?;
        let when = params
            .get("when")
            .and_then(RelativeTime::from_value)
            .unwrap_or_else(|| ctx.now());
        logger
            .write_entry(&sender, message, when)
            .map_err(io_failure)?;
        Ok(Value::Null)
    }
    .boxed_local()
}

fn error_message<'a>(
    logger: &'a mut Logger,
    _ctx: &'a AgentContext,
    params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        let sender = sender_of(&params);
        let text = params.str("text")?;
        logger.write_error(&sender, text).map_err(io_failure)?;
        Ok(Value::Null)
    }
    .boxed_local()
}

fn stop_receiving<'a>(
    logger: &'a mut Logger,
    ctx: &'a AgentContext,
    _params: Params,
) -> LocalBoxFuture<'a, HandlerResult> {
    async move {
        logger.flush().map_err(io_failure)?;
        ctx.kill();
        Ok(Value::from(logger.entry_count))
    }
    .boxed_local()
}

impl Agent for Logger {
    const KIND: &'static str = "logger";

    fn handlers() -> HandlerTable<Self> {
        HandlerTable::new()
            .on("log_entry", log_entry)
            .on("error_message", error_message)
            .on("stop_receiving", stop_receiving)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffered() -> (Logger, SharedBuffer, SharedBuffer) {
        let normal = SharedBuffer::new();
        let errors = SharedBuffer::new();
        let logger = Logger::new(
            LogSink::Buffer(normal.clone()),
            LogSink::Buffer(errors.clone()),
        );
        (logger, normal, errors)
    }

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_flush_on_drop_is_traced() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let mut logger = Logger::new(LogSink::file("/dev/full").unwrap(), LogSink::Null);
        logger
            .write_entry("clock", "tick 1", RelativeTime::from_millis(5))
            .unwrap();
        tracing::subscriber::with_default(subscriber, || drop(logger));

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("WARN"));
        assert!(output.contains("failed to flush simulation log"));
    }

    #[test]
    fn test_entry_format() {
        let (mut logger, normal, _) = buffered();
        logger
            .write_entry("clock", "tick 3", RelativeTime::from_millis(12_345))
            .unwrap();
        assert_eq!(normal.contents(), "[clock: r12.345] tick 3\n");
        assert_eq!(logger.entry_count(), 1);
    }

    #[test]
    fn test_error_banner() {
        let (mut logger, _, errors) = buffered();
        logger.write_error("7", "something broke\n").unwrap();
        let text = errors.contents();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains(" ERROR in 7 "));
        assert_eq!(lines[0].len(), BANNER_WIDTH);
        assert_eq!(lines[1], "something broke");
        assert_eq!(lines[2], "=".repeat(BANNER_WIDTH));
    }

    #[test]
    fn test_file_sink_flushes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sim.log");
        {
            let mut logger = Logger::new(LogSink::file(&path).unwrap(), LogSink::Null);
            logger
                .write_entry("manager", "created 0", RelativeTime::from_millis(5))
                .unwrap();
        }
        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "[manager: r0.005] created 0\n");
    }
}

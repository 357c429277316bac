//! In-memory log sink so unit tests can assert on emitted diagnostics.

use std::io;
use std::sync::{Arc, Mutex};

use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Accumulates the formatted output of a test-scoped subscriber.
#[derive(Clone, Default)]
pub(crate) struct LogSink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogSink {
    pub(crate) fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogSink {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// A plain-text subscriber writing into `sink`.
pub(crate) fn subscriber(sink: LogSink) -> impl Subscriber + Send + Sync {
    tracing_subscriber::fmt()
        .with_writer(sink)
        .with_target(false)
        .with_ansi(false)
        .finish()
}

/// Runs `f` with a capturing subscriber installed on this thread and
/// returns everything it logged.
pub(crate) fn capture(f: impl FnOnce()) -> String {
    let sink = LogSink::default();
    tracing::subscriber::with_default(subscriber(sink.clone()), f);
    sink.contents()
}

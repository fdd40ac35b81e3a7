use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// Fire-and-forget progress lines for one run.
///
/// Every line is logged; if a receiver is attached it also gets a copy.
/// A dropped receiver is ignored.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    sink: Option<UnboundedSender<String>>,
}

impl Progress {
    /// Log-only progress.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn channel() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        (Self { sink: Some(tx) }, rx)
    }

    pub fn emit(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(target: "progress", "{message}");
        if let Some(sink) = &self.sink {
            let _ = sink.send(message);
        }
    }
}

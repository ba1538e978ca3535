// ── Reply channels ──
//
// Every command hands the caller a `ReplyStream`. The executor keeps the
// matching `ReplySink` wherever the command's results will come from: a
// session, a connection listener, a pending completion slot, or the
// firmware update delegate. Dropping the sink ends the stream.

use std::fmt;

use futures_core::Stream;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyStatus {
    Ok,
    Error,
}

/// One result delivered to a caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub status: ReplyStatus,
    pub payload: Value,
    /// `false` on the last reply a stream will carry.
    pub keep_open: bool,
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        self.status == ReplyStatus::Ok
    }

    pub fn is_error(&self) -> bool {
        self.status == ReplyStatus::Error
    }

    /// The `_cb` discriminator of a session event, if any.
    pub fn callback(&self) -> Option<&str> {
        self.payload.get("_cb").and_then(Value::as_str)
    }
}

/// Create a connected sink/stream pair.
pub fn channel() -> (ReplySink, ReplyStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ReplySink { tx }, ReplyStream { rx })
}

// ── ReplySink ────────────────────────────────────────────────────

/// Sending half of a caller's result channel.
///
/// Non-terminal sends borrow the sink; terminal sends consume it, so a
/// stream can never observe anything after its final reply.
#[derive(Debug)]
pub struct ReplySink {
    tx: mpsc::UnboundedSender<Reply>,
}

impl ReplySink {
    fn push(&self, reply: Reply) {
        if self.tx.send(reply).is_err() {
            debug!("reply stream dropped by caller, discarding delivery");
        }
    }

    /// Deliver a result and keep the stream open.
    pub fn send(&self, payload: Value) {
        self.push(Reply {
            status: ReplyStatus::Ok,
            payload,
            keep_open: true,
        });
    }

    /// Deliver the final successful result.
    pub fn finish(self, payload: Value) {
        self.push(Reply {
            status: ReplyStatus::Ok,
            payload,
            keep_open: false,
        });
    }

    /// Deliver a final error result.
    pub fn fail(self, message: impl fmt::Display) {
        self.push(Reply {
            status: ReplyStatus::Error,
            payload: Value::String(message.to_string()),
            keep_open: false,
        });
    }

    /// Whether the caller has dropped its stream.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ── ReplyStream ──────────────────────────────────────────────────

/// Receiving half of a caller's result channel.
#[derive(Debug)]
pub struct ReplyStream {
    rx: mpsc::UnboundedReceiver<Reply>,
}

impl ReplyStream {
    /// Next reply, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Reply> {
        self.rx.recv().await
    }

    /// A reply that is already queued, without waiting.
    pub fn try_next(&mut self) -> Option<Reply> {
        self.rx.try_recv().ok()
    }

    pub fn into_stream(self) -> impl Stream<Item = Reply> {
        UnboundedReceiverStream::new(self.rx)
    }
}

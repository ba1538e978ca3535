// ── Bridge facade ──
//
// Caller-side handle to one running bridge. Commands are enqueued onto
// the executor task and answered through the `ReplyStream` each call
// returns; nothing here touches driver or registry state directly.

mod executor;

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::BridgeConfig;
use crate::driver::{CallbackHandle, ReaderDriver};
use crate::error::CoreError;
use crate::model::ConnectionState;
use crate::reply::{self, ReplyStream};

use executor::Executor;

/// A message for the executor task.
pub(crate) enum Envelope {
    Command {
        name: String,
        args: Vec<Value>,
        reply: reply::ReplySink,
    },
    Reset {
        done: oneshot::Sender<()>,
    },
}

// ── Bridge ───────────────────────────────────────────────────────

/// The main entry point for callers.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. Owns the executor task that
/// serializes every command and hardware callback against the driver.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    command_tx: mpsc::Sender<Envelope>,
    connection_state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Bridge {
    /// Build the driver and start the executor task.
    ///
    /// `driver_factory` receives the [`CallbackHandle`] the driver must use
    /// for every asynchronous report. Must be called within a tokio runtime.
    pub fn spawn<D, F>(config: BridgeConfig, driver_factory: F) -> Self
    where
        D: ReaderDriver,
        F: FnOnce(CallbackHandle) -> D,
    {
        let (callback_tx, callback_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::channel(config.command_queue_depth.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::NotConnected);
        let cancel = CancellationToken::new();

        let driver = driver_factory(CallbackHandle::new(callback_tx));
        let executor = Executor::new(config.clone(), driver, state_tx);
        let task = tokio::spawn(executor.run(command_rx, callback_rx, cancel.clone()));

        Self {
            inner: Arc::new(BridgeInner {
                config,
                command_tx,
                connection_state: state_rx,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    // ── Command execution ────────────────────────────────────────

    /// Enqueue a named command with its positional arguments.
    ///
    /// Returns as soon as the command is queued; every result arrives on
    /// the returned stream. Waits only when the command queue is full.
    pub async fn execute(
        &self,
        name: impl Into<String>,
        args: Vec<Value>,
    ) -> Result<ReplyStream, CoreError> {
        let (reply, stream) = reply::channel();
        self.inner
            .command_tx
            .send(Envelope::Command {
                name: name.into(),
                args,
                reply,
            })
            .await
            .map_err(|_| CoreError::BridgeClosed)?;
        Ok(stream)
    }

    /// Unregister all listeners, force-stop all sessions, drop pending
    /// completions and close the reader connection.
    pub async fn reset(&self) -> Result<(), CoreError> {
        let (done, ack) = oneshot::channel();
        self.inner
            .command_tx
            .send(Envelope::Reset { done })
            .await
            .map_err(|_| CoreError::BridgeClosed)?;
        ack.await.map_err(|_| CoreError::BridgeClosed)
    }

    /// Stop the executor. It resets all state before exiting.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(task) = self.inner.task.lock().await.take() {
            let _ = task.await;
        }
        debug!("bridge shut down");
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to reader connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.clone()
    }
}

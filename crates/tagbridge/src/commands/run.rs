//! `tagbridge run`: execute a JSON-lines script against the simulated reader.
//!
//! Each non-empty line is either a request, `{"command": "...", "args": [...]}`,
//! or a pause, `{"sleep_ms": N}`. Lines starting with `#` are skipped.
//! Replies are printed as JSON lines carrying the index of their request.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use tagbridge_core::{Bridge, BridgeConfig, Epc, Reply, ReplyStatus, ReplyStream};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::sim::{DEFAULT_TAGS, SimulatedReader};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptLine {
    Sleep {
        sleep_ms: u64,
    },
    Request {
        command: String,
        #[serde(default)]
        args: Vec<Value>,
    },
}

#[derive(Serialize)]
struct OutputLine<'a> {
    request: usize,
    #[serde(flatten)]
    reply: &'a Reply,
}

type Outbox = mpsc::UnboundedSender<(usize, Reply)>;

pub async fn handle(args: RunArgs, mut bridge_config: BridgeConfig) -> Result<(), CliError> {
    if args.open {
        bridge_config.auto_open_connection = true;
    }
    let tags: Vec<Epc> = if args.tags.is_empty() {
        DEFAULT_TAGS.iter().copied().map(Epc::from).collect()
    } else {
        args.tags.into_iter().map(Epc::from).collect()
    };

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match &args.script {
        Some(path) => {
            let file = File::open(path).await.map_err(|source| CliError::Script {
                path: path.clone(),
                source,
            })?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    let bridge = Bridge::spawn(bridge_config, |callbacks| {
        SimulatedReader::new(callbacks, tags)
    });
    let (outbox, replies) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_replies(replies));
    let mut forwarders = JoinSet::new();

    let mut lines = input.lines();
    let mut next_index = 0usize;
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<ScriptLine>(line) {
            Ok(ScriptLine::Sleep { sleep_ms }) => {
                tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
            }
            Ok(ScriptLine::Request { command, args }) => {
                debug!(request = next_index, %command, "submitting request");
                let stream = bridge.execute(command, args).await?;
                forwarders.spawn(forward(next_index, stream, outbox.clone()));
                next_index += 1;
            }
            Err(e) => {
                warn!(request = next_index, error = %e, "unreadable script line");
                let reply = Reply {
                    status: ReplyStatus::Error,
                    payload: json!(format!("invalid request: {e}")),
                    keep_open: false,
                };
                let _ = outbox.send((next_index, reply));
                next_index += 1;
            }
        }
    }

    // Give open streams a chance to finish; shutdown ends the rest.
    let linger = Duration::from_millis(args.linger_ms);
    if tokio::time::timeout(linger, drain(&mut forwarders))
        .await
        .is_err()
    {
        debug!(open = forwarders.len(), "streams still open after linger");
    }
    bridge.shutdown().await;
    drain(&mut forwarders).await;

    drop(outbox);
    if let Err(e) = printer.await {
        warn!(error = %e, "reply printer failed");
    }
    Ok(())
}

async fn drain(forwarders: &mut JoinSet<()>) {
    while forwarders.join_next().await.is_some() {}
}

async fn forward(index: usize, mut stream: ReplyStream, outbox: Outbox) {
    while let Some(reply) = stream.next().await {
        if outbox.send((index, reply)).is_err() {
            break;
        }
    }
}

async fn print_replies(mut replies: mpsc::UnboundedReceiver<(usize, Reply)>) {
    let mut stdout = tokio::io::stdout();
    while let Some((request, reply)) = replies.recv().await {
        let line = match serde_json::to_string(&OutputLine {
            request,
            reply: &reply,
        }) {
            Ok(line) => line,
            Err(e) => {
                warn!(request, error = %e, "reply could not be printed");
                continue;
            }
        };
        if stdout.write_all(format!("{line}\n").as_bytes()).await.is_err() {
            break;
        }
    }
    let _ = stdout.flush().await;
}

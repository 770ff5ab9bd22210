use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use bep_engine::{BuildEventSession, ByteStreamResolver, ItemKind};
use bep_types::BuildEvent;
use bep_types::json::JsonEventReader;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

/// How often the session drains the event channel while a file is replayed.
pub const POLL_INTERVAL: Duration = Duration::from_millis(5);

const EVENT_BUDGET: usize = 64;

/// Decode a newline-delimited JSON event file into `tx`, in file order.
/// Lines that do not decode are logged and skipped. Returns the number of
/// events sent.
pub async fn stream_events(path: PathBuf, tx: mpsc::Sender<BuildEvent>) -> Result<u64> {
    let file = File::open(&path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))?;
    let mut lines = BufReader::new(file).lines();
    let mut reader = JsonEventReader::new();
    let mut sent = 0;
    let mut skipped: u64 = 0;

    while let Some(line) = lines
        .next_line()
        .await
        .with_context(|| format!("failed to read {}", path.display()))?
    {
        let event = match reader.decode_line(&line) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    line = e.line(),
                    "Skipping malformed build event: {e}"
                );
                skipped += 1;
                continue;
            }
        };
        if tx.send(event).await.is_err() {
            bail!("build event session closed while replaying {}", path.display());
        }
        sent += 1;
    }
    tracing::debug!(path = %path.display(), events = sent, skipped, "Event file exhausted");
    Ok(sent)
}

/// Feed the events of `path` through `session` until the file is exhausted
/// and every event has been applied.
pub async fn replay<R: ByteStreamResolver>(
    session: &mut BuildEventSession<R>,
    path: &Path,
) -> Result<u64> {
    let producer = tokio::spawn(stream_events(path.to_path_buf(), session.event_sender()));
    let mut ticks = time::interval(POLL_INTERVAL);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut applied: u64 = 0;
    loop {
        ticks.tick().await;
        let drained = session.poll_events(EVENT_BUDGET);
        applied += drained as u64;
        if drained == 0 && producer.is_finished() {
            break;
        }
    }

    let sent = producer.await.context("event reader task panicked")??;
    // The reader may finish between the last drain and the check above.
    loop {
        let drained = session.poll_events(EVENT_BUDGET);
        if drained == 0 {
            break;
        }
        applied += drained as u64;
    }
    tracing::info!(events = sent, applied, "Replay complete");
    Ok(sent)
}

/// Outcome of the last build in the session, `None` when the stream ended
/// before a finished event.
#[must_use]
pub fn build_outcome<R: ByteStreamResolver>(session: &BuildEventSession<R>) -> Option<bool> {
    session.items().iter().rev().find_map(|item| match item.kind() {
        ItemKind::BuildFinished { success, .. } => Some(*success),
        _ => None,
    })
}

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::engine::StatsSnapshot;
use crate::error::OutputError;

#[derive(Serialize)]
struct SnapshotLine<'snapshot> {
    kind: &'static str,
    #[serde(flatten)]
    snapshot: &'snapshot StatsSnapshot,
}

/// Appends every published snapshot to `path` as one JSON line. The last
/// snapshot seen before the publisher goes away is tagged `final`, every
/// earlier one `progress`. Resolves to the number of lines written.
#[must_use]
pub(crate) fn spawn_snapshot_writer(
    path: PathBuf,
    mut snapshots: watch::Receiver<Arc<StatsSnapshot>>,
) -> JoinHandle<Result<u64, OutputError>> {
    tokio::spawn(async move {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|err| OutputError::OpenSnapshot {
                path: path.clone(),
                source: err,
            })?;
        let mut writer = BufWriter::new(file);
        let mut pending: Option<Arc<StatsSnapshot>> = None;
        let mut written: u64 = 0;

        while snapshots.changed().await.is_ok() {
            let latest = Arc::clone(&snapshots.borrow_and_update());
            if let Some(previous) = pending.replace(latest) {
                write_line(&mut writer, &path, "progress", &previous).await?;
                written = written.saturating_add(1);
            }
        }
        if let Some(last) = pending {
            write_line(&mut writer, &path, "final", &last).await?;
            written = written.saturating_add(1);
        }

        writer
            .flush()
            .await
            .map_err(|err| OutputError::WriteSnapshot {
                path: path.clone(),
                source: err,
            })?;
        debug!("Wrote {} snapshot lines to {}", written, path.display());
        Ok(written)
    })
}

async fn write_line(
    writer: &mut BufWriter<tokio::fs::File>,
    path: &std::path::Path,
    kind: &'static str,
    snapshot: &StatsSnapshot,
) -> Result<(), OutputError> {
    let mut line = serde_json::to_vec(&SnapshotLine { kind, snapshot })
        .map_err(|err| OutputError::SerializeSnapshot { source: err })?;
    line.push(b'\n');
    writer
        .write_all(&line)
        .await
        .map_err(|err| OutputError::WriteSnapshot {
            path: path.to_path_buf(),
            source: err,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OutcomeCounts;
    use tempfile::tempdir;

    fn run_async_test<F>(future: F) -> Result<(), String>
    where
        F: std::future::Future<Output = Result<(), String>>,
    {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| format!("Failed to build runtime: {}", err))?;
        runtime.block_on(future)
    }

    fn snapshot(total: u64) -> Arc<StatsSnapshot> {
        Arc::new(StatsSnapshot {
            counts: OutcomeCounts {
                total,
                success: total,
                ..OutcomeCounts::default()
            },
            ..StatsSnapshot::default()
        })
    }

    #[test]
    fn writes_progress_then_final_lines() -> Result<(), String> {
        run_async_test(async {
            let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
            let path = dir.path().join("snapshots.jsonl");
            let (tx, rx) = watch::channel(snapshot(0));
            let writer = spawn_snapshot_writer(path.clone(), rx);

            tx.send_replace(snapshot(5));
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            tx.send_replace(snapshot(9));
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            drop(tx);

            let written = writer
                .await
                .map_err(|err| format!("writer panicked: {}", err))?
                .map_err(|err| format!("writer failed: {}", err))?;
            if written != 2 {
                return Err(format!("Expected 2 lines, wrote {}", written));
            }

            let content = std::fs::read_to_string(&path)
                .map_err(|err| format!("read failed: {}", err))?;
            let lines: Vec<serde_json::Value> = content
                .lines()
                .map(serde_json::from_str)
                .collect::<Result<_, _>>()
                .map_err(|err| format!("invalid json line: {}", err))?;
            let kinds: Vec<&str> = lines
                .iter()
                .filter_map(|line| line.get("kind").and_then(serde_json::Value::as_str))
                .collect();
            if kinds != ["progress", "final"] {
                return Err(format!("Unexpected kinds {:?}", kinds));
            }
            let final_total = lines
                .last()
                .and_then(|line| line.pointer("/counts/total"))
                .and_then(serde_json::Value::as_u64);
            if final_total != Some(9) {
                return Err(format!("Unexpected final total {:?}", final_total));
            }
            Ok(())
        })
    }

    #[test]
    fn unwritable_path_is_reported() -> Result<(), String> {
        run_async_test(async {
            let dir = tempdir().map_err(|err| format!("tempdir failed: {}", err))?;
            let path = dir.path().join("missing").join("snapshots.jsonl");
            let (_tx, rx) = watch::channel(snapshot(0));
            match spawn_snapshot_writer(path, rx).await {
                Ok(Err(OutputError::OpenSnapshot { .. })) => Ok(()),
                other => Err(format!("Expected open error, got {:?}", other.map(|_| ()))),
            }
        })
    }
}

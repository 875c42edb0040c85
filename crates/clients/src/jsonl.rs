//! JsonlDataClient - matched records replayed from a JSON-lines file
//!
//! Each line is one `MatchedRecord`. The committed position is a line count
//! stored as plain text in a sidecar file; on open the client resumes right
//! after it. Lines that fail to parse are consumed and reported as pull
//! errors. A trailing line without a newline is not read until it is
//! complete.

use std::io::{BufRead, BufReader, ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use contracts::{
    ContractError, DataClient, LivenessProbe, MatchedRecord, PulledBatch, ShutdownHook,
};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader as AsyncBufReader};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Default, Clone, Copy)]
struct Cursor {
    /// Byte position of the next unread line
    byte: u64,
    /// Lines read so far
    line: u64,
    /// Lines covered by the persisted offset
    committed: u64,
}

/// `DataClient` reading a JSON-lines file
pub struct JsonlDataClient {
    name: String,
    records_path: PathBuf,
    offsets_path: PathBuf,
    poll_interval: Duration,
    cursor: Mutex<Cursor>,
    stopped: AtomicBool,
}

impl JsonlDataClient {
    /// Open `records_path`, resuming from the offset stored in `offsets_path`
    ///
    /// # Errors
    /// Returns an error if the offset file exists but cannot be read or
    /// parsed, or if the records file is shorter than the stored offset.
    pub fn open(
        records_path: impl Into<PathBuf>,
        offsets_path: impl Into<PathBuf>,
    ) -> Result<Self, ContractError> {
        let records_path = records_path.into();
        let offsets_path = offsets_path.into();
        let name = format!("jsonl:{}", records_path.display());

        let committed = read_offset(&offsets_path)?;
        let byte = byte_position(&records_path, committed)
            .map_err(|e| ContractError::data_client(&name, e))?;

        info!(
            client = %name,
            offsets = %offsets_path.display(),
            committed,
            "resuming records file"
        );

        Ok(Self {
            name,
            records_path,
            offsets_path,
            poll_interval: DEFAULT_POLL_INTERVAL,
            cursor: Mutex::new(Cursor {
                byte,
                line: committed,
                committed,
            }),
            stopped: AtomicBool::new(false),
        })
    }

    /// Override how often the file is re-checked while waiting
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Lines covered by the persisted offset
    pub async fn committed_lines(&self) -> u64 {
        self.cursor.lock().await.committed
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Read up to `limit` non-blank complete lines after `cursor`
    async fn read_available(
        &self,
        cursor: &mut Cursor,
        limit: usize,
        batch: &mut PulledBatch,
    ) -> Result<(), ContractError> {
        let mut file = match tokio::fs::File::open(&self.records_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        file.seek(SeekFrom::Start(cursor.byte)).await?;
        let mut reader = AsyncBufReader::new(file);
        let mut segment = Vec::new();

        let mut messages = 0;
        while messages < limit {
            segment.clear();
            let n = reader.read_until(b'\n', &mut segment).await?;
            if n == 0 || segment.last() != Some(&b'\n') {
                break;
            }
            cursor.byte += n as u64;
            cursor.line += 1;

            let text = String::from_utf8_lossy(&segment);
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            messages += 1;
            match serde_json::from_str::<MatchedRecord>(text) {
                Ok(record) => batch.records.push(record),
                Err(e) => batch.errors.push(format!("line {}: {e}", cursor.line)),
            }
        }
        Ok(())
    }
}

fn read_offset(path: &Path) -> Result<u64, ContractError> {
    match std::fs::read_to_string(path) {
        Ok(content) => content.trim().parse().map_err(|e| {
            ContractError::config_parse(format!(
                "invalid offset file '{}': {e}",
                path.display()
            ))
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Byte position right after line `lines` of `path`
fn byte_position(path: &Path, lines: u64) -> Result<u64, String> {
    if lines == 0 {
        return Ok(0);
    }
    let file = std::fs::File::open(path)
        .map_err(|e| format!("cannot open records file: {e}"))?;
    let mut reader = BufReader::new(file);
    let mut byte = 0u64;
    let mut buf = Vec::new();
    for _ in 0..lines {
        buf.clear();
        let n = reader
            .read_until(b'\n', &mut buf)
            .map_err(|e| format!("cannot read records file: {e}"))?;
        if n == 0 || buf.last() != Some(&b'\n') {
            return Err(format!(
                "records file has fewer than {lines} complete lines"
            ));
        }
        byte += n as u64;
    }
    Ok(byte)
}

impl DataClient for JsonlDataClient {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "jsonl_pull_batch", skip(self), fields(client = %self.name))]
    async fn pull_batch(
        &self,
        timeout: Duration,
        limit: usize,
    ) -> Result<PulledBatch, ContractError> {
        if self.is_stopped() {
            return Err(ContractError::stopped(&self.name));
        }

        let deadline = Instant::now() + timeout;
        let mut cursor = self.cursor.lock().await;
        let mut batch = PulledBatch::default();
        loop {
            self.read_available(&mut cursor, limit, &mut batch).await?;
            let now = Instant::now();
            if !batch.is_empty() || now >= deadline || self.is_stopped() {
                break;
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }

        if !batch.errors.is_empty() {
            warn!(
                client = %self.name,
                errors = batch.errors.len(),
                "unparsable records"
            );
        }
        debug!(
            client = %self.name,
            records = batch.records.len(),
            line = cursor.line,
            "batch pulled"
        );
        Ok(batch)
    }

    async fn persist_offsets(&self) -> Result<(), ContractError> {
        let mut cursor = self.cursor.lock().await;
        if cursor.committed == cursor.line {
            return Ok(());
        }

        let tmp = self.offsets_path.with_extension("offset.tmp");
        tokio::fs::write(&tmp, format!("{}\n", cursor.line)).await?;
        tokio::fs::rename(&tmp, &self.offsets_path).await?;
        cursor.committed = cursor.line;

        debug!(client = %self.name, committed = cursor.committed, "offsets persisted");
        Ok(())
    }
}

impl LivenessProbe for JsonlDataClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_alive(&self) -> bool {
        !self.is_stopped()
    }
}

impl ShutdownHook for JsonlDataClient {
    fn name(&self) -> &str {
        &self.name
    }

    fn shutdown(&self) -> Result<(), ContractError> {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            info!(client = %self.name, "data client stopped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const RECORD: &str = r#"{"fields": {"v": 1}, "extra": {}, "export_ids": ["e1"]}"#;

    fn setup(lines: &[&str]) -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let records = dir.path().join("records.jsonl");
        let offsets = dir.path().join("records.offset");
        let mut file = std::fs::File::create(&records).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        (dir, records, offsets)
    }

    fn client(records: &Path, offsets: &Path) -> JsonlDataClient {
        JsonlDataClient::open(records, offsets)
            .unwrap()
            .with_poll_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_pull_respects_limit() {
        let (_dir, records, offsets) = setup(&[RECORD, RECORD, RECORD]);
        let client = client(&records, &offsets);

        let first = client.pull_batch(Duration::ZERO, 2).await.unwrap();
        let second = client.pull_batch(Duration::ZERO, 2).await.unwrap();

        assert_eq!(first.records.len(), 2);
        assert_eq!(second.records.len(), 1);
        assert_eq!(second.records[0].export_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_cursor_stops_at_limit() {
        let (_dir, records, offsets) = setup(&[RECORD, "", RECORD, RECORD]);
        let client = client(&records, &offsets);

        let batch = client.pull_batch(Duration::ZERO, 1).await.unwrap();
        client.persist_offsets().await.unwrap();

        assert_eq!(batch.records.len(), 1);
        assert_eq!(client.committed_lines().await, 1);
        assert_eq!(std::fs::read_to_string(&offsets).unwrap().trim(), "1");

        let rest = client.pull_batch(Duration::ZERO, 10).await.unwrap();
        assert_eq!(rest.records.len(), 2);
    }

    #[tokio::test]
    async fn test_unparsable_line_is_pull_error() {
        let (_dir, records, offsets) = setup(&[RECORD, "{not json", "", RECORD]);
        let client = client(&records, &offsets);

        let batch = client.pull_batch(Duration::ZERO, 10).await.unwrap();

        assert_eq!(batch.records.len(), 2);
        assert_eq!(batch.errors.len(), 1);
        assert!(batch.errors[0].starts_with("line 2:"), "got: {}", batch.errors[0]);
    }

    #[tokio::test]
    async fn test_resume_from_persisted_offset() {
        let (_dir, records, offsets) = setup(&[RECORD, RECORD, RECORD]);
        {
            let client = client(&records, &offsets);
            client.pull_batch(Duration::ZERO, 2).await.unwrap();
            client.persist_offsets().await.unwrap();
            // pulled but never persisted
            client.pull_batch(Duration::ZERO, 1).await.unwrap();
        }
        assert_eq!(std::fs::read_to_string(&offsets).unwrap().trim(), "2");

        let resumed = client(&records, &offsets);
        assert_eq!(resumed.committed_lines().await, 2);
        let batch = resumed.pull_batch(Duration::ZERO, 10).await.unwrap();
        assert_eq!(batch.records.len(), 1);
    }

    #[tokio::test]
    async fn test_waits_for_appended_lines() {
        let (_dir, records, offsets) = setup(&[]);
        let client = client(&records, &offsets);

        let path = records.clone();
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            let mut file = std::fs::OpenOptions::new().append(true).open(path).unwrap();
            writeln!(file, "{RECORD}").unwrap();
        });

        let batch = client.pull_batch(Duration::from_secs(2), 10).await.unwrap();
        writer.await.unwrap();
        assert_eq!(batch.records.len(), 1);
    }

    #[tokio::test]
    async fn test_incomplete_trailing_line_is_not_read() {
        let (_dir, records, offsets) = setup(&[RECORD]);
        let mut file = std::fs::OpenOptions::new().append(true).open(&records).unwrap();
        write!(file, "{RECORD}").unwrap();

        let client = client(&records, &offsets);
        let batch = client.pull_batch(Duration::ZERO, 10).await.unwrap();
        assert_eq!(batch.records.len(), 1);
    }

    #[test]
    fn test_offset_beyond_file_is_error() {
        let (_dir, records, offsets) = setup(&[RECORD]);
        std::fs::write(&offsets, "5").unwrap();
        assert!(JsonlDataClient::open(&records, &offsets).is_err());
    }

    #[tokio::test]
    async fn test_missing_records_file_yields_empty_batch() {
        let dir = TempDir::new().unwrap();
        let client = client(&dir.path().join("none.jsonl"), &dir.path().join("none.offset"));
        let batch = client.pull_batch(Duration::ZERO, 10).await.unwrap();
        assert!(batch.is_empty());
    }
}

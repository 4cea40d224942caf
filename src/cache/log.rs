//! Log-Structured Backend
//!
//! Keeps the shard's entries in memory and mirrors every mutation to an
//! append-only JSON-lines file, one file per shard. Opening a backend replays
//! its file to rebuild the index. Once superseded records outnumber live ones
//! the file is compacted by writing the live set to a temp file and renaming
//! it over the log.
//!
//! The in-memory index is authoritative: a failed append is logged and
//! counted, never surfaced to the caller.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::cache::backend::{scan_map, ScanVisitor};
use crate::cache::{Backend, Entry};

/// Compaction never runs below this many superseded records.
pub const COMPACT_MIN_STALE: usize = 1024;

#[derive(Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Record<V> {
    Put { key: Vec<u8>, entry: Entry<V> },
    Delete { key: Vec<u8> },
}

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum RecordRef<'a, V> {
    Put { key: &'a [u8], entry: &'a Entry<V> },
    Delete { key: &'a [u8] },
}

// == Log Backend ==
pub struct LogBackend<V> {
    path: PathBuf,
    index: BTreeMap<Vec<u8>, Entry<V>>,
    writer: BufWriter<File>,
    /// Records in the file that no longer describe a live index entry
    stale_records: usize,
    write_failures: u64,
}

impl<V> std::fmt::Debug for LogBackend<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogBackend")
            .field("path", &self.path)
            .field("entries", &self.index.len())
            .field("stale_records", &self.stale_records)
            .field("write_failures", &self.write_failures)
            .finish()
    }
}

impl<V: Serialize + DeserializeOwned> LogBackend<V> {
    /// Opens (or creates) the log for `shard` under `dir` and replays it.
    pub fn open(dir: impl AsRef<Path>, shard: usize) -> io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("shard-{shard:04}.log"));

        let (index, records, skipped) = if path.exists() {
            replay(&path)?
        } else {
            (BTreeMap::new(), 0, 0)
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let stale_records = records.saturating_sub(index.len());
        debug!(
            path = %path.display(),
            entries = index.len(),
            stale_records,
            "opened shard log"
        );

        let mut backend = Self {
            path,
            index,
            writer: BufWriter::new(file),
            stale_records,
            write_failures: 0,
        };
        // A torn tail would corrupt the next append.
        if skipped > 0 {
            backend.compact()?;
        }
        Ok(backend)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of appends or compactions that failed since opening.
    pub fn write_failures(&self) -> u64 {
        self.write_failures
    }

    fn append(&mut self, record: &RecordRef<'_, V>) {
        let result = serde_json::to_writer(&mut self.writer, record)
            .map_err(io::Error::from)
            .and_then(|_| self.writer.write_all(b"\n"))
            .and_then(|_| self.writer.flush());

        if let Err(e) = result {
            self.write_failures += 1;
            error!(path = %self.path.display(), error = %e, "failed to append to shard log");
        }
    }

    fn maybe_compact(&mut self) {
        if self.stale_records < COMPACT_MIN_STALE || self.stale_records <= self.index.len() {
            return;
        }
        match self.compact() {
            Ok(()) => info!(
                path = %self.path.display(),
                entries = self.index.len(),
                "compacted shard log"
            ),
            Err(e) => {
                self.write_failures += 1;
                error!(path = %self.path.display(), error = %e, "shard log compaction failed");
            }
        }
    }

    /// Rewrites the log so it holds exactly one record per live key.
    pub fn compact(&mut self) -> io::Result<()> {
        let tmp = self.path.with_extension("log.tmp");
        {
            let mut out = BufWriter::new(File::create(&tmp)?);
            for (key, entry) in &self.index {
                serde_json::to_writer(&mut out, &RecordRef::Put { key, entry })?;
                out.write_all(b"\n")?;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.stale_records = 0;
        Ok(())
    }
}

type Replayed<V> = (BTreeMap<Vec<u8>, Entry<V>>, usize, usize);

/// Returns the rebuilt index, the number of applied records and the number
/// of unreadable ones.
fn replay<V: DeserializeOwned>(path: &Path) -> io::Result<Replayed<V>> {
    let reader = BufReader::new(File::open(path)?);
    let mut index = BTreeMap::new();
    let mut records = 0usize;
    let mut skipped = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Record<V>>(&line) {
            Ok(Record::Put { key, entry }) => {
                index.insert(key, entry);
                records += 1;
            }
            Ok(Record::Delete { key }) => {
                index.remove(&key);
                records += 1;
            }
            Err(e) => {
                skipped += 1;
                warn!(
                    path = %path.display(),
                    line = line_no + 1,
                    error = %e,
                    "skipping unreadable shard log record"
                );
            }
        }
    }

    Ok((index, records, skipped))
}

impl<V> Backend<V> for LogBackend<V>
where
    V: Serialize + DeserializeOwned + Send,
{
    fn get(&self, key: &[u8]) -> Option<&Entry<V>> {
        self.index.get(key)
    }

    fn insert(&mut self, key: Vec<u8>, entry: Entry<V>) -> Option<Entry<V>> {
        self.append(&RecordRef::Put {
            key: &key,
            entry: &entry,
        });
        let previous = self.index.insert(key, entry);
        if previous.is_some() {
            self.stale_records += 1;
        }
        self.maybe_compact();
        previous
    }

    fn remove(&mut self, key: &[u8]) -> Option<Entry<V>> {
        // Absent keys leave the log untouched.
        let previous = self.index.remove(key)?;
        self.append(&RecordRef::Delete { key });
        // The put and the tombstone are both dead weight now.
        self.stale_records += 2;
        self.maybe_compact();
        Some(previous)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn clear(&mut self) {
        self.index.clear();
        self.stale_records = 0;
        let truncated = self
            .writer
            .flush()
            .and_then(|_| File::create(&self.path))
            .and_then(|_| OpenOptions::new().append(true).open(&self.path));
        match truncated {
            Ok(file) => self.writer = BufWriter::new(file),
            Err(e) => {
                self.write_failures += 1;
                error!(path = %self.path.display(), error = %e, "failed to truncate shard log");
            }
        }
    }

    fn scan(
        &self,
        from: Bound<&[u8]>,
        limit: usize,
        visit: &mut ScanVisitor<'_, V>,
    ) -> Option<Vec<u8>> {
        scan_map(&self.index, from, limit, visit)
    }
}

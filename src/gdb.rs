//! Read/write access to the game's persistent state file (`GDB.bin`).
//!
//! The store holds no cached mirror of the file: every read parses the
//! file in full and every mutation rewrites it in full, so changes made
//! by the game itself between calls are always picked up. Mutations are
//! all-or-nothing, staged in a sibling temp file and renamed over the
//! original, with the file's insertion counter incremented once per
//! newly created entry.

mod counter;
mod entry;

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use memchr::memmem;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use counter::CounterSlot;

/// Failure cases when mutating the state file
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state file has no delimited window (FF FD FF FD markers)")]
    WindowMissing,
    #[error("key {0:?} is too long to encode")]
    KeyTooLong(String),
}

pub struct GdbStore {
    path: PathBuf,
    counter: CounterSlot,
}

impl GdbStore {
    /// Open the store and prime the insertion-counter slot. One store per
    /// file; open once per session, before the first [`GdbStore::set`].
    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let meta = fs::metadata(&path)
            .with_context(|| format!("Failed to open state file {}", path.display()))?;
        anyhow::ensure!(meta.is_file(), "{} is not a file", path.display());
        debug!("opened state file {} ({} bytes)", path.display(), meta.len());
        Ok(Self {
            path,
            counter: CounterSlot::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the value stored under `key`, or 0 when the key has never
    /// been written. Read failures also degrade to 0 and are only logged,
    /// so a transient I/O problem cannot take the caller down.
    pub fn get(&self, key: &str) -> i64 {
        match self.try_get(key) {
            Ok(value) => value,
            Err(err) => {
                warn!("failed to read {key:?} from {}: {err}", self.path.display());
                0
            }
        }
    }

    fn try_get(&self, key: &str) -> std::io::Result<i64> {
        let content = fs::read(&self.path)?;
        let Some((opening, closing)) = entry::find_window(&content) else {
            debug!("state file has no delimited window yet");
            return Ok(0);
        };
        let window = &content[opening..closing];
        let Some(key_pos) = memmem::find(window, key.as_bytes()) else {
            return Ok(0);
        };
        let after_key = &window[key_pos + key.len()..];
        let Some(tag_pos) = memmem::find(after_key, &entry::VALUE_TAG) else {
            return Ok(0);
        };
        match after_key.get(tag_pos + entry::VALUE_OFFSET) {
            Some(&byte) => Ok(byte as i64 - entry::VALUE_BIAS as i64),
            None => Ok(0),
        }
    }

    /// Create or update `key` with `value`. Updates rewrite the value
    /// byte in place; creations rebuild the window with the new entry
    /// merged into case-insensitive key order and bump the insertion
    /// counter. A malformed file or an I/O failure leaves the file as it
    /// was.
    pub fn set(&mut self, key: &str, value: u8) -> anyhow::Result<()> {
        if key.len() + 1 > u8::MAX as usize {
            return Err(StoreError::KeyTooLong(key.to_owned()).into());
        }
        let mut content = fs::read(&self.path)
            .with_context(|| format!("Failed to read state file {}", self.path.display()))?;

        let (opening, closing) = entry::find_window(&content).ok_or(StoreError::WindowMissing)?;
        let data_start = opening + entry::WINDOW_MARKER.len();
        let data_end = closing - entry::compact(&mut content, data_start, closing);

        let entries = entry::scan(&content, data_start, data_end);
        let mut stale = None;
        if let Some((index, found)) = entries
            .iter()
            .enumerate()
            .find(|(_, e)| e.key == key.as_bytes())
        {
            let span = &content[found.start..found.end];
            if let Some(tag_pos) = memmem::find(span, &entry::VALUE_TAG) {
                let value_at = found.start + tag_pos + entry::VALUE_OFFSET;
                if value_at < found.end {
                    content[value_at] = entry::VALUE_BIAS.wrapping_add(value);
                    return self.persist(&content);
                }
            }
            // The matched entry has lost its value byte; drop the span
            // and let the rebuild re-create it
            stale = Some(index);
        }

        let mut sorted: Vec<(Vec<u8>, Vec<u8>)> = entries
            .iter()
            .enumerate()
            .filter(|(index, _)| Some(*index) != stale)
            .map(|(_, e)| (e.key.clone(), content[e.start..e.end].to_vec()))
            .collect();
        sorted.push((key.as_bytes().to_vec(), entry::build(key.as_bytes(), value)));
        sorted.sort_by(|a, b| a.0.to_ascii_lowercase().cmp(&b.0.to_ascii_lowercase()));

        let mut rebuilt = Vec::with_capacity(content.len() + key.len() + 20);
        rebuilt.extend_from_slice(&content[..data_start]);
        for (i, (_, raw)) in sorted.iter().enumerate() {
            if i > 0 {
                rebuilt.extend_from_slice(&entry::ENTRY_MARKER);
            }
            rebuilt.extend_from_slice(raw);
        }
        rebuilt.extend_from_slice(&entry::WINDOW_MARKER);
        rebuilt.extend_from_slice(&content[data_end + entry::WINDOW_MARKER.len()..]);

        let rolled = self.counter.apply(&mut rebuilt);
        self.persist(&rebuilt)?;
        if rolled {
            self.counter.advance();
        }
        Ok(())
    }

    /// Replace the file atomically: stage a sibling temp file, then rename
    fn persist(&self, content: &[u8]) -> anyhow::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp_file =
            NamedTempFile::new_in(dir).context("Failed to create temp state file")?;
        temp_file
            .write_all(content)
            .context("Failed to write temp state file")?;
        temp_file
            .persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

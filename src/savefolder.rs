//! Item history mirrored into the name of a save folder.
//!
//! The game cannot read the state file while a mission is loading, but it
//! does list the save directory. Appending `"<item>.<count>-"` segments
//! to a prefixed folder name turns the directory listing into a small
//! side channel for recently delivered items. Everything here is best
//! effort: failures are logged and swallowed rather than disturbing the
//! session.

use std::{
    fs,
    path::PathBuf,
    sync::OnceLock,
    time::UNIX_EPOCH,
};

use anyhow::Context;
use regex::Regex;
use tracing::{debug, info, warn};

/// Name prefix of the folder that carries the item history
pub const FOLDER_PREFIX: &str = "__multiworld-";
/// Segments after which the name is reset to the bare prefix
const MAX_SEGMENTS: usize = 6;

/// One `"<item>.<count>-"` segment within a folder name
fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^.\-]+\.\d+-").expect("valid segment pattern"))
}

pub struct SaveFolder {
    base: PathBuf,
}

impl SaveFolder {
    /// `base` is the directory that holds the prefixed save folder
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    /// Append an `"<item>.<count>-"` segment to the folder name, creating
    /// the folder if needed and resetting to the bare prefix once six
    /// segments have accumulated. Re-appending a segment that is already
    /// present is a no-op.
    pub fn append(&self, item_name: &str, count: i64) {
        if let Err(err) = self.try_append(item_name, count) {
            warn!("failed to record {item_name:?} in the save folder: {err:#}");
        }
    }

    /// Rename the prefixed folder back to the bare prefix, discarding the
    /// accumulated segments
    pub fn reset(&self) {
        if let Err(err) = self.try_reset() {
            warn!("failed to reset the save folder: {err:#}");
        }
    }

    fn try_append(&self, item_name: &str, count: i64) -> anyhow::Result<()> {
        fs::create_dir_all(&self.base)
            .with_context(|| format!("Failed to create {}", self.base.display()))?;
        let (mut name, mut path) = match self.newest_prefixed()? {
            Some(found) => found,
            None => {
                let path = self.base.join(FOLDER_PREFIX);
                fs::create_dir_all(&path)?;
                (FOLDER_PREFIX.to_owned(), path)
            }
        };

        if segment_pattern().find_iter(&name).count() >= MAX_SEGMENTS {
            let bare = self.base.join(FOLDER_PREFIX);
            fs::rename(&path, &bare).context("Failed to reset the full save folder")?;
            info!("save folder reset after {MAX_SEGMENTS} segments");
            name = FOLDER_PREFIX.to_owned();
            path = bare;
        }

        let segment = format!("{item_name}.{count}-");
        if name.ends_with(&segment) || name.contains(&format!("-{segment}")) {
            debug!("segment {segment:?} is already recorded");
            return Ok(());
        }

        let renamed = self.base.join(format!("{name}{segment}"));
        fs::rename(&path, &renamed)
            .with_context(|| format!("Failed to rename save folder to {}", renamed.display()))?;
        debug!("save folder now {}", renamed.display());
        Ok(())
    }

    fn try_reset(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.base)
            .with_context(|| format!("Failed to create {}", self.base.display()))?;
        let Some((name, path)) = self.newest_prefixed()? else {
            return Ok(());
        };
        if name == FOLDER_PREFIX {
            return Ok(());
        }
        fs::rename(&path, self.base.join(FOLDER_PREFIX))
            .context("Failed to reset the save folder")?;
        Ok(())
    }

    /// The most recently modified directory under `base` whose name
    /// starts with the prefix
    fn newest_prefixed(&self) -> anyhow::Result<Option<(String, PathBuf)>> {
        let listing = fs::read_dir(&self.base)
            .with_context(|| format!("Failed to list {}", self.base.display()))?;
        let mut newest = None;
        for dirent in listing {
            let dirent = dirent?;
            let Ok(name) = dirent.file_name().into_string() else {
                continue;
            };
            if !name.starts_with(FOLDER_PREFIX) || !dirent.file_type()?.is_dir() {
                continue;
            }
            let modified = dirent
                .metadata()
                .and_then(|meta| meta.modified())
                .unwrap_or(UNIX_EPOCH);
            let newer = match &newest {
                Some((_, _, best)) => modified > *best,
                None => true,
            };
            if newer {
                newest = Some((name, dirent.path(), modified));
            }
        }
        Ok(newest.map(|(name, path, _)| (name, path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn folder_names(dir: &TempDir) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|d| d.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn append_accumulates_segments() {
        let dir = TempDir::new().unwrap();
        let folder = SaveFolder::new(dir.path().to_path_buf());

        folder.append("masonry", 1);
        folder.append("tracking", 2);

        assert_eq!(
            folder_names(&dir),
            ["__multiworld-masonry.1-tracking.2-"]
        );
    }

    #[test]
    fn append_is_idempotent_per_segment() {
        let dir = TempDir::new().unwrap();
        let folder = SaveFolder::new(dir.path().to_path_buf());

        folder.append("masonry", 1);
        folder.append("masonry", 1);

        assert_eq!(folder_names(&dir), ["__multiworld-masonry.1-"]);
    }

    #[test]
    fn same_item_with_a_new_count_is_appended() {
        let dir = TempDir::new().unwrap();
        let folder = SaveFolder::new(dir.path().to_path_buf());

        folder.append("masonry", 1);
        folder.append("masonry", 2);

        assert_eq!(
            folder_names(&dir),
            ["__multiworld-masonry.1-masonry.2-"]
        );
    }

    #[test]
    fn seventh_segment_resets_the_name() {
        let dir = TempDir::new().unwrap();
        let full = dir.path().join("__multiworld-a.1-b.1-c.1-d.1-e.1-f.1-");
        fs::create_dir(&full).unwrap();
        let folder = SaveFolder::new(dir.path().to_path_buf());

        folder.append("grain", 1);

        assert_eq!(folder_names(&dir), ["__multiworld-grain.1-"]);
    }

    #[test]
    fn reset_discards_segments() {
        let dir = TempDir::new().unwrap();
        let folder = SaveFolder::new(dir.path().to_path_buf());

        folder.append("masonry", 1);
        folder.reset();

        assert_eq!(folder_names(&dir), ["__multiworld-"]);
    }

    #[test]
    fn reset_without_any_folder_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let folder = SaveFolder::new(dir.path().join("saves"));

        folder.reset();

        assert_eq!(fs::read_dir(dir.path().join("saves")).unwrap().count(), 0);
    }

    #[test]
    fn unprefixed_folders_are_ignored() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("mission_03")).unwrap();
        let folder = SaveFolder::new(dir.path().to_path_buf());

        folder.append("masonry", 1);

        assert_eq!(
            folder_names(&dir),
            ["__multiworld-masonry.1-", "mission_03"]
        );
    }

    #[test]
    fn segment_pattern_counts_segments_not_the_prefix() {
        assert_eq!(segment_pattern().find_iter(FOLDER_PREFIX).count(), 0);
        assert_eq!(
            segment_pattern()
                .find_iter("__multiworld-masonry.1-banner.12-")
                .count(),
            2
        );
    }
}

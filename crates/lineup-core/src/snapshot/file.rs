// # File Snapshot Store
//
// File-based implementation of SnapshotStore.
//
// ## Layout
//
// ```text
// <root>/                         one directory per monitored server
//   Antenna_Tuner.lineup          one snapshot per source
//   Pluto_TV.lineup
//   deleted/
//     Old_Source_20250109_120000.lineup
// ```
//
// File names are the source name with spaces replaced by `_`, and `_`, `%` and
// path separators percent-escaped. The real name is also kept in the file's
// header line.
//
// ## Writes
//
// Saves are full replacements: the new snapshot is written to a temporary file
// and renamed over the old one.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::model::Lineup;
use crate::snapshot::format;
use crate::traits::SnapshotStore;

/// Snapshot file extension
const SNAPSHOT_EXTENSION: &str = "lineup";

/// Name of the holding area for snapshots of deleted sources
pub const DELETED_DIR: &str = "deleted";

/// File-based snapshot store
///
/// # Example
///
/// ```rust,no_run
/// use lineup_core::snapshot::FileSnapshotStore;
/// use lineup_core::traits::SnapshotStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileSnapshotStore::new("/var/lib/lineup/127.0.0.1-8089").await?;
///
///     let lineup = store.load("Antenna Tuner").await?;
///     println!("{} channels", lineup.len());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
    strict: bool,
}

impl FileSnapshotStore {
    /// Open a store rooted at `root`, creating the directory if needed
    ///
    /// The store is lenient: malformed snapshot lines are skipped.
    pub async fn new<P: AsRef<Path>>(root: P) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(&root).await.map_err(|e| {
            Error::snapshot(format!(
                "Failed to create snapshot directory {}: {}",
                root.display(),
                e
            ))
        })?;

        Ok(Self {
            root,
            strict: false,
        })
    }

    /// Fail on malformed snapshot lines instead of skipping them
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File stem used for a source name
    ///
    /// Spaces become `_`. A literal `_`, path separators and `%` are
    /// percent-escaped, so distinct names never share a file.
    pub fn file_stem(source_name: &str) -> String {
        let mut stem = String::with_capacity(source_name.len());
        for c in source_name.chars() {
            match c {
                ' ' => stem.push('_'),
                '_' => stem.push_str("%5F"),
                '/' => stem.push_str("%2F"),
                '\\' => stem.push_str("%5C"),
                '%' => stem.push_str("%25"),
                c => stem.push(c),
            }
        }
        stem
    }

    /// Source name for a header-less snapshot, inverse of [`Self::file_stem`]
    pub fn source_name_from_stem(stem: &str) -> String {
        let mut name = String::with_capacity(stem.len());
        let mut rest = stem;
        while let Some(c) = rest.chars().next() {
            let escaped = match rest.get(..3) {
                Some("%5F") => Some('_'),
                Some("%2F") => Some('/'),
                Some("%5C") => Some('\\'),
                Some("%25") => Some('%'),
                _ => None,
            };
            match escaped {
                Some(decoded) => {
                    name.push(decoded);
                    rest = &rest[3..];
                }
                None => {
                    name.push(if c == '_' { ' ' } else { c });
                    rest = &rest[c.len_utf8()..];
                }
            }
        }
        name
    }

    fn snapshot_path(&self, source_name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", Self::file_stem(source_name), SNAPSHOT_EXTENSION))
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut temp = path.to_path_buf();
        temp.set_extension("tmp");
        temp
    }

    async fn read_snapshot(&self, path: &Path) -> Result<format::DecodedSnapshot, Error> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            Error::snapshot(format!(
                "Failed to read snapshot {}: {}",
                path.display(),
                e
            ))
        })?;

        format::decode(&content, self.strict)
            .map_err(|e| Error::snapshot(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self, source_name: &str) -> Result<Lineup, Error> {
        let path = self.snapshot_path(source_name);
        if !fs::try_exists(&path).await? {
            tracing::debug!("No snapshot for {} at {}", source_name, path.display());
            return Ok(Lineup::new());
        }

        let decoded = self.read_snapshot(&path).await?;
        if let Some(stored) = decoded.source_name.as_deref()
            && stored != source_name
        {
            tracing::warn!(
                "Snapshot {} belongs to {:?}, not {:?}; ignoring it",
                path.display(),
                stored,
                source_name
            );
            return Ok(Lineup::new());
        }
        tracing::debug!(
            "Loaded snapshot for {}: {} channels",
            source_name,
            decoded.lineup.len()
        );
        Ok(decoded.lineup)
    }

    async fn save(&self, source_name: &str, lineup: &Lineup) -> Result<(), Error> {
        let path = self.snapshot_path(source_name);
        let temp_path = Self::temp_path(&path);
        let content = format::encode(source_name, lineup);

        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(content.as_bytes()).await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.flush().await.map_err(|e| {
                Error::snapshot(format!(
                    "Failed to flush temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        fs::rename(&temp_path, &path).await.map_err(|e| {
            Error::snapshot(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::trace!("Snapshot written: {}", path.display());
        Ok(())
    }

    async fn list_sources(&self) -> Result<Vec<String>, Error> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SNAPSHOT_EXTENSION) {
                continue;
            }
            if !entry.file_type().await?.is_file() {
                continue;
            }

            let decoded = self.read_snapshot(&path).await?;
            let name = match decoded.source_name {
                Some(name) => name,
                None => Self::source_name_from_stem(
                    path.file_stem().and_then(|s| s.to_str()).unwrap_or_default(),
                ),
            };
            names.push(name);
        }

        names.sort();
        Ok(names)
    }

    async fn archive(&self, source_name: &str) -> Result<(), Error> {
        let path = self.snapshot_path(source_name);
        if !fs::try_exists(&path).await? {
            tracing::debug!("No snapshot to archive for {}", source_name);
            return Ok(());
        }

        let deleted_dir = self.root.join(DELETED_DIR);
        fs::create_dir_all(&deleted_dir).await?;

        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let target = deleted_dir.join(format!(
            "{}_{}.{}",
            Self::file_stem(source_name),
            stamp,
            SNAPSHOT_EXTENSION
        ));

        fs::rename(&path, &target).await.map_err(|e| {
            Error::snapshot(format!(
                "Failed to archive {} to {}: {}",
                path.display(),
                target.display(),
                e
            ))
        })?;

        tracing::info!("Archived snapshot of {} to {}", source_name, target.display());
        Ok(())
    }
}

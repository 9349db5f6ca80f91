//! Persistence of migration versions.
//!
//! A store only needs to answer two questions for the planner: which
//! sequence number was used last, and where to put a new version. Two
//! implementations are provided: [`MemoryStore`] for tests and embedding,
//! and [`DirectoryStore`], which writes one `{name}.sql` artifact per
//! version.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use tracing::{debug, info};

use crate::artifact::{parse_artifact, ArtifactContent};
use crate::error::{MigrateError, Result};
use crate::planner::MigrationVersion;

/// A version read back from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVersion {
    /// Sequence number.
    pub sequence: u64,
    /// Full version name.
    pub name: String,
    /// Parsed artifact.
    pub content: ArtifactContent,
}

/// Where migration versions live.
pub trait MigrationStore {
    /// Writes `version`, replacing any version with the same sequence
    /// number.
    fn record_version(&mut self, version: &MigrationVersion) -> Result<()>;

    /// Highest recorded sequence number, if any.
    fn latest_sequence_number(&self) -> Result<Option<u64>>;

    /// All recorded versions, ordered by sequence number.
    fn list_versions(&self) -> Result<Vec<StoredVersion>>;

    /// Removes the version with sequence number `sequence`. Returns whether
    /// anything was removed.
    fn remove_version(&mut self, sequence: u64) -> Result<bool>;
}

// ============================================================================
// In-memory store
// ============================================================================

/// Keeps rendered artifacts in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    versions: BTreeMap<u64, (String, String)>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered artifact of the version with sequence number `sequence`.
    #[must_use]
    pub fn artifact(&self, sequence: u64) -> Option<&str> {
        self.versions.get(&sequence).map(|(_, text)| text.as_str())
    }

    /// Number of recorded versions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether no version was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

impl MigrationStore for MemoryStore {
    fn record_version(&mut self, version: &MigrationVersion) -> Result<()> {
        self.versions
            .insert(version.sequence, (version.name(), version.render()));
        Ok(())
    }

    fn latest_sequence_number(&self) -> Result<Option<u64>> {
        Ok(self.versions.keys().next_back().copied())
    }

    fn list_versions(&self) -> Result<Vec<StoredVersion>> {
        self.versions
            .iter()
            .map(|(&sequence, (name, text))| {
                Ok(StoredVersion {
                    sequence,
                    name: name.clone(),
                    content: parse_artifact(name, text)?,
                })
            })
            .collect()
    }

    fn remove_version(&mut self, sequence: u64) -> Result<bool> {
        Ok(self.versions.remove(&sequence).is_some())
    }
}

// ============================================================================
// Directory store
// ============================================================================

const FILE_PATTERN: &str = r"^(\d+)_(\d{14})_(.+)\.sql$";

/// Writes one `{sequence}_{timestamp}_{label}.sql` file per version.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
    pattern: Regex,
}

impl DirectoryStore {
    /// Opens the store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let pattern = Regex::new(FILE_PATTERN).map_err(|e| MigrateError::ParseError {
            path: dir.clone(),
            message: e.to_string(),
        })?;
        Ok(Self { dir, pattern })
    }

    /// Directory holding the artifacts.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Migration files in the directory as `(sequence, name, path)`, sorted
    /// by sequence number.
    fn entries(&self) -> Result<Vec<(u64, String, PathBuf)>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(caps) = self.pattern.captures(file_name) else {
                debug!(file = %path.display(), "Skipping non-migration file");
                continue;
            };
            let Ok(sequence) = caps[1].parse::<u64>() else {
                continue;
            };
            let name = file_name.trim_end_matches(".sql").to_string();
            entries.push((sequence, name, path));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        Ok(entries)
    }
}

impl MigrationStore for DirectoryStore {
    fn record_version(&mut self, version: &MigrationVersion) -> Result<()> {
        self.remove_version(version.sequence)?;
        let path = self.dir.join(format!("{}.sql", version.name()));
        fs::write(&path, version.render())?;
        info!(file = %path.display(), "Wrote migration file");
        Ok(())
    }

    fn latest_sequence_number(&self) -> Result<Option<u64>> {
        Ok(self.entries()?.last().map(|(sequence, _, _)| *sequence))
    }

    fn list_versions(&self) -> Result<Vec<StoredVersion>> {
        self.entries()?
            .into_iter()
            .map(|(sequence, name, path)| {
                let text = fs::read_to_string(&path)?;
                let content = parse_artifact(&name, &text).map_err(|e| match e {
                    MigrateError::ParseError { message, .. } => {
                        MigrateError::ParseError { path, message }
                    }
                    other => other,
                })?;
                Ok(StoredVersion {
                    sequence,
                    name,
                    content,
                })
            })
            .collect()
    }

    fn remove_version(&mut self, sequence: u64) -> Result<bool> {
        let mut removed = false;
        for (_, _, path) in self
            .entries()?
            .into_iter()
            .filter(|(seq, _, _)| *seq == sequence)
        {
            fs::remove_file(&path)?;
            info!(file = %path.display(), "Removed migration file");
            removed = true;
        }
        Ok(removed)
    }
}

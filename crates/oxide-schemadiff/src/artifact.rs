//! Migration artifact format.
//!
//! ```text
//! -- upgrade --
//! ALTER TABLE "post" RENAME COLUMN "name" TO "title";
//! -- downgrade --
//! ALTER TABLE "post" RENAME COLUMN "title" TO "name";
//! ```
//!
//! Every statement ends with `;` at the end of a line outside any quoted
//! literal or identifier, so comments may themselves contain `;` and line
//! breaks. Markers are only recognized between statements. A missing
//! `-- downgrade --` marker means the migration cannot be reverted, which is
//! different from an empty downgrade section.

use std::path::PathBuf;

use crate::error::{MigrateError, Result};
use crate::operations::MigrationOperation;

/// Marker opening the upgrade section.
pub const UPGRADE_MARKER: &str = "-- upgrade --";
/// Marker opening the downgrade section.
pub const DOWNGRADE_MARKER: &str = "-- downgrade --";

/// Statements read back from an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactContent {
    name: String,
    upgrade: Vec<String>,
    downgrade: Option<Vec<String>>,
}

impl ArtifactContent {
    /// Name of the version the artifact belongs to.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upgrade statements, without delimiters.
    #[must_use]
    pub fn upgrade(&self) -> &[String] {
        &self.upgrade
    }

    /// Downgrade statements, without delimiters.
    ///
    /// Fails with [`MigrateError::NoDowngrade`] if the artifact has no
    /// downgrade section.
    pub fn downgrade(&self) -> Result<&[String]> {
        self.downgrade
            .as_deref()
            .ok_or_else(|| MigrateError::NoDowngrade(self.name.clone()))
    }

    /// Whether the artifact has a downgrade section.
    #[must_use]
    pub fn has_downgrade(&self) -> bool {
        self.downgrade.is_some()
    }
}

/// Renders an artifact. The downgrade marker is omitted only when there are
/// upgrade operations but no downgrade operations.
#[must_use]
pub fn render_artifact(upgrade: &[MigrationOperation], downgrade: &[MigrationOperation]) -> String {
    let mut out = String::new();
    out.push_str(UPGRADE_MARKER);
    out.push('\n');
    push_statements(&mut out, upgrade);
    if !downgrade.is_empty() || upgrade.is_empty() {
        out.push_str(DOWNGRADE_MARKER);
        out.push('\n');
        push_statements(&mut out, downgrade);
    }
    out
}

fn push_statements(out: &mut String, ops: &[MigrationOperation]) {
    for statement in ops.iter().flat_map(|op| &op.statements) {
        out.push_str(statement);
        out.push_str(";\n");
    }
}

/// Parses an artifact written by [`render_artifact`].
pub fn parse_artifact(name: &str, text: &str) -> Result<ArtifactContent> {
    let error = |message: &str| MigrateError::ParseError {
        path: PathBuf::from(name),
        message: message.to_string(),
    };

    let mut lines = text.lines();
    if lines.next().map(str::trim) != Some(UPGRADE_MARKER) {
        return Err(error("missing upgrade marker on the first line"));
    }

    let mut upgrade = Vec::new();
    let mut downgrade: Option<Vec<String>> = None;
    let mut pending = String::new();
    let mut quotes = QuoteTracker::default();

    for line in lines {
        if !quotes.is_open() {
            let marker = line.trim();
            if marker == DOWNGRADE_MARKER {
                if downgrade.is_some() {
                    return Err(error("duplicate downgrade marker"));
                }
                if !pending.trim().is_empty() {
                    return Err(error("unterminated statement before downgrade marker"));
                }
                pending.clear();
                downgrade = Some(Vec::new());
                continue;
            }
            if marker == UPGRADE_MARKER {
                return Err(error("duplicate upgrade marker"));
            }
        }

        if !pending.is_empty() {
            pending.push('\n');
        }
        pending.push_str(line);
        quotes.scan(line);

        if !quotes.is_open() && line.trim_end().ends_with(';') {
            let trimmed = pending.trim();
            let statement = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end().to_string();
            pending.clear();
            if statement.is_empty() {
                continue;
            }
            match downgrade.as_mut() {
                Some(statements) => statements.push(statement),
                None => upgrade.push(statement),
            }
        }
    }

    if quotes.is_open() {
        return Err(error("unterminated quote at end of file"));
    }
    if !pending.trim().is_empty() {
        return Err(error("unterminated statement at end of file"));
    }

    Ok(ArtifactContent {
        name: name.to_string(),
        upgrade,
        downgrade,
    })
}

/// Follows quoted literals and identifiers across the lines of a statement.
/// A doubled quote closes and reopens, which leaves it open as expected.
#[derive(Debug, Default)]
struct QuoteTracker {
    open: Option<char>,
}

impl QuoteTracker {
    fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn scan(&mut self, line: &str) {
        let mut chars = line.chars().peekable();
        while let Some(c) = chars.next() {
            match self.open {
                Some(quote) if c == quote => self.open = None,
                Some(_) => {}
                None => match c {
                    '\'' | '"' | '`' => self.open = Some(c),
                    '-' if chars.peek() == Some(&'-') => break,
                    _ => {}
                },
            }
        }
    }
}

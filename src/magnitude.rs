use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Line count at which the magnitude curve reaches 1.0.
pub const SATURATION_LINES: u64 = 100;

/// Score assigned when diff stats could not be read.
pub const CONSERVATIVE_SCORE: f64 = 0.5;

const RENAME_DAMPING: f64 = 0.6;

#[derive(Debug, Error)]
pub enum DiffError {
    #[error("git diff failed for {path}: {message}")]
    Git { path: String, message: String },
    #[error("malformed numstat line: {line:?}")]
    MalformedNumstat { line: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub added: u64,
    pub removed: u64,
}

impl DiffStats {
    pub fn total(&self) -> u64 {
        self.added + self.removed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RenameInfo {
    pub is_rename: bool,
    /// Fraction in `[0, 1]`, e.g. `0.97` for git's `(97%)`.
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangeMagnitude {
    pub lines_added: u64,
    pub lines_removed: u64,
    pub is_rename: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
    pub score: f64,
    pub trivial_rename: bool,
    pub estimated: bool,
}

impl ChangeMagnitude {
    /// Stand-in used when the real stats are unavailable.
    pub fn conservative() -> Self {
        ChangeMagnitude {
            lines_added: 0,
            lines_removed: 0,
            is_rename: false,
            similarity: None,
            score: CONSERVATIVE_SCORE,
            trivial_rename: false,
            estimated: true,
        }
    }

    pub fn total_lines(&self) -> u64 {
        self.lines_added + self.lines_removed
    }

    pub fn significance(&self) -> &'static str {
        if self.score > 0.7 {
            "major"
        } else if self.score > 0.4 {
            "medium"
        } else {
            "minor"
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MagnitudeScorer {
    pub rename_similarity_floor: f64,
}

impl Default for MagnitudeScorer {
    fn default() -> Self {
        MagnitudeScorer {
            rename_similarity_floor: 0.95,
        }
    }
}

impl MagnitudeScorer {
    pub fn new(rename_similarity_floor: f64) -> Self {
        MagnitudeScorer {
            rename_similarity_floor,
        }
    }

    pub fn score(&self, stats: DiffStats, rename: RenameInfo) -> ChangeMagnitude {
        let trivial_rename = rename.is_rename
            && rename
                .similarity
                .is_some_and(|s| s >= self.rename_similarity_floor);

        let score = if trivial_rename {
            0.0
        } else if rename.is_rename {
            volume_score(stats.total()) * RENAME_DAMPING
        } else {
            volume_score(stats.total())
        };

        ChangeMagnitude {
            lines_added: stats.added,
            lines_removed: stats.removed,
            is_rename: rename.is_rename,
            similarity: rename.similarity,
            score,
            trivial_rename,
            estimated: false,
        }
    }
}

lazy_static! {
    static ref SATURATION_LN: f64 = (1.0 + SATURATION_LINES as f64).ln();
}

/// Logarithmic damping of the changed line count, saturating at
/// [`SATURATION_LINES`].
pub fn volume_score(total_lines: u64) -> f64 {
    ((1.0 + total_lines as f64).ln() / *SATURATION_LN).min(1.0)
}

/// Parses `git diff --numstat` output. Binary entries (`-`) count as zero
/// lines, multiple lines are summed.
pub fn parse_numstat(output: &str) -> Result<DiffStats, DiffError> {
    let mut stats = DiffStats::default();

    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let mut parts = line.split('\t');
        let (added, removed) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(r), Some(_)) => (a.trim(), r.trim()),
            _ => {
                return Err(DiffError::MalformedNumstat {
                    line: line.to_string(),
                })
            }
        };

        stats.added += parse_count(added, line)?;
        stats.removed += parse_count(removed, line)?;
    }

    Ok(stats)
}

fn parse_count(field: &str, line: &str) -> Result<u64, DiffError> {
    if field == "-" {
        return Ok(0);
    }
    field.parse().map_err(|_| DiffError::MalformedNumstat {
        line: line.to_string(),
    })
}

/// Reads rename detection from `git diff --summary`, e.g.
/// ` rename src/{old.rs => new.rs} (97%)`.
pub fn parse_rename_summary(output: &str) -> RenameInfo {
    let Some(line) = output
        .lines()
        .find(|l| l.trim_start().to_lowercase().starts_with("rename"))
    else {
        return RenameInfo::default();
    };

    let similarity = line
        .rfind('(')
        .and_then(|start| line[start + 1..].split('%').next())
        .and_then(|pct| pct.trim().parse::<u32>().ok())
        .map(|pct| f64::from(pct.min(100)) / 100.0);

    RenameInfo {
        is_rename: true,
        similarity,
    }
}

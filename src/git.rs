use crate::magnitude::{parse_numstat, parse_rename_summary, DiffError};
use crate::pipeline::{ChangeStats, FileChange};
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

/// Rename detection threshold passed to `git diff -M`.
const RENAME_DETECTION: &str = "-M50%";

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git is not installed")]
    NotInstalled,
    #[error("not a git repository")]
    NotARepo,
    #[error("git command failed: {0}")]
    CommandFailed(String),
}

fn run_git(root: &Path, args: &[&str]) -> Result<String, GitError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .map_err(|_| GitError::NotInstalled)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }
        return Err(GitError::CommandFailed(stderr.trim().to_string()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub fn ls_files(root: &Path) -> Result<Vec<PathBuf>, GitError> {
    let stdout = run_git(root, &["ls-files", "--cached", "--others", "--exclude-standard"])?;
    let files = stdout
        .lines()
        .map(|line| PathBuf::from(line.trim()))
        .collect();

    Ok(files)
}

pub fn repo_root(path: &Path) -> Result<PathBuf, GitError> {
    let stdout = run_git(path, &["rev-parse", "--show-toplevel"])?;
    Ok(PathBuf::from(stdout.trim()))
}

/// A path that differs between `base` and the working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPath {
    pub path: String,
    /// Previous location when git detected a rename.
    pub old_path: Option<String>,
}

impl ChangedPath {
    fn pathspec(&self) -> Vec<&str> {
        let mut spec = vec!["--"];
        if let Some(old) = &self.old_path {
            spec.push(old.as_str());
        }
        spec.push(self.path.as_str());
        spec
    }
}

/// Lists files changed against `base`, reading `git diff --name-status`.
pub fn changed_files(root: &Path, base: &str) -> Result<Vec<ChangedPath>, GitError> {
    let stdout = run_git(root, &["diff", "--name-status", RENAME_DETECTION, base])?;
    Ok(parse_name_status(&stdout))
}

pub fn parse_name_status(output: &str) -> Vec<ChangedPath> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let status = fields.first()?;
            match (status.chars().next()?, fields.len()) {
                ('R' | 'C', 3) => Some(ChangedPath {
                    path: fields[2].to_string(),
                    old_path: Some(fields[1].to_string()),
                }),
                (_, n) if n >= 2 => Some(ChangedPath {
                    path: fields[n - 1].to_string(),
                    old_path: None,
                }),
                _ => None,
            }
        })
        .collect()
}

/// Diff stats for one changed path. Failures are reported per file so one bad
/// entry never aborts a batch.
pub fn change_stats(root: &Path, base: &str, changed: &ChangedPath) -> Result<ChangeStats, DiffError> {
    let git_err = |e: GitError| DiffError::Git {
        path: changed.path.clone(),
        message: e.to_string(),
    };

    let mut numstat_args = vec!["diff", "--numstat", RENAME_DETECTION, base];
    numstat_args.extend(changed.pathspec());
    let numstat = parse_numstat(&run_git(root, &numstat_args).map_err(git_err)?)?;

    let mut summary_args = vec!["diff", "--summary", RENAME_DETECTION, base];
    summary_args.extend(changed.pathspec());
    let rename = parse_rename_summary(&run_git(root, &summary_args).map_err(git_err)?);

    Ok(ChangeStats { numstat, rename })
}

pub fn diff_text(root: &Path, base: &str, changed: &ChangedPath) -> Result<String, GitError> {
    let mut args = vec!["diff", RENAME_DETECTION, base];
    args.extend(changed.pathspec());
    run_git(root, &args)
}

/// Collects everything the pipeline needs about one changed path. A diff that
/// cannot be read leaves `diff_text` empty instead of failing.
pub fn collect_change(root: &Path, base: &str, changed: &ChangedPath) -> FileChange {
    let stats = change_stats(root, base, changed);
    let diff = match diff_text(root, base, changed) {
        Ok(text) => Some(text),
        Err(e) => {
            debug!(path = %changed.path, error = %e, "diff text unavailable");
            None
        }
    };

    let mut change = FileChange::new(changed.path.clone(), stats);
    change.diff_text = diff;
    change
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_repo_root_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        // temp dirs normally live outside any checkout
        if let Err(e) = repo_root(dir.path()) {
            assert!(matches!(e, GitError::NotARepo | GitError::NotInstalled));
        }
    }

    #[test]
    fn test_ls_files_in_crate() {
        let cwd = env::current_dir().unwrap();
        if repo_root(&cwd).is_ok() {
            assert!(ls_files(&cwd).is_ok());
        }
    }

    #[test]
    fn test_parse_name_status() {
        let output = "M\tsrc/main.rs\nR097\tsrc/old.rs\tsrc/new.rs\nA\tdocs/guide.md\nD\tlegacy.py\n";
        let changed = parse_name_status(output);
        assert_eq!(changed.len(), 4);
        assert_eq!(changed[0].path, "src/main.rs");
        assert_eq!(changed[1].path, "src/new.rs");
        assert_eq!(changed[1].old_path.as_deref(), Some("src/old.rs"));
        assert_eq!(changed[3].path, "legacy.py");
        assert!(changed[3].old_path.is_none());
    }

    #[test]
    fn test_parse_name_status_ignores_garbage() {
        assert!(parse_name_status("\nM\n").is_empty());
    }

    #[test]
    fn test_pathspec_includes_old_path() {
        let changed = ChangedPath {
            path: "b.rs".to_string(),
            old_path: Some("a.rs".to_string()),
        };
        assert_eq!(changed.pathspec(), vec!["--", "a.rs", "b.rs"]);
    }
}

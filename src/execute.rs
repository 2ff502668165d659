//! Sequential execution of a plan with per-step failure isolation.
//!
//! Steps run strictly in rank order, one at a time. Completed steps are never
//! rolled back: on the first unrecoverable failure execution halts and the
//! report names exactly which steps finished and which step failed, so the
//! user can inspect the partial state and start over from a fresh scan.

use std::fmt;
use std::fs::{self, File};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::archive::{self, ArchiveKind};
use crate::output::OutputFormatter;
use crate::plan::{Plan, StepAction};

/// Errors produced while executing a single step.
#[derive(Debug)]
pub enum ExecuteError {
    /// The destination is already occupied. The plan guarantees this cannot
    /// happen unless the filesystem changed underneath it.
    DestinationExists { path: PathBuf },
    /// A move could not be performed.
    MoveFailed {
        source: PathBuf,
        destination: PathBuf,
        source_error: io::Error,
    },
    /// A deletion could not be performed.
    DeleteFailed {
        path: PathBuf,
        source_error: io::Error,
    },
    /// An archive member could not be staged.
    ExtractFailed {
        container: PathBuf,
        member: PathBuf,
        reason: String,
    },
    /// The file named by an archive suffix is not a supported container.
    UnsupportedContainer { container: PathBuf },
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecuteError::DestinationExists { path } => {
                write!(f, "Destination already exists: {}", path.display())
            }
            ExecuteError::MoveFailed {
                source,
                destination,
                source_error,
            } => write!(
                f,
                "Failed to move {} to {}: {}",
                source.display(),
                destination.display(),
                source_error
            ),
            ExecuteError::DeleteFailed { path, source_error } => {
                write!(f, "Failed to delete {}: {}", path.display(), source_error)
            }
            ExecuteError::ExtractFailed {
                container,
                member,
                reason,
            } => write!(
                f,
                "Failed to extract {} from {}: {}",
                member.display(),
                container.display(),
                reason
            ),
            ExecuteError::UnsupportedContainer { container } => {
                write!(f, "Not a supported archive: {}", container.display())
            }
        }
    }
}

impl std::error::Error for ExecuteError {}

/// A step that finished successfully.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub rank: usize,
    pub description: String,
}

/// The step execution halted on.
#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
    pub rank: usize,
    pub description: String,
    pub error: String,
}

/// What happened during one execution run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// When execution started, RFC 3339.
    pub started_at: String,
    /// Steps that completed, in execution order.
    pub completed: Vec<StepRecord>,
    /// Deletions whose target was already absent. Treated as satisfied.
    pub skipped_deletes: Vec<PathBuf>,
    /// Set when execution halted early.
    pub failure: Option<StepFailure>,
}

impl ExecutionReport {
    fn new() -> Self {
        Self {
            started_at: chrono::Utc::now().to_rfc3339(),
            completed: Vec::new(),
            skipped_deletes: Vec::new(),
            failure: None,
        }
    }

    /// Returns true if every step ran to completion.
    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

/// Runs plans against the filesystem.
pub struct Executor {
    show_progress: bool,
}

impl Executor {
    /// Creates an executor. With `show_progress` a progress bar and one line
    /// per step are written to the terminal.
    pub fn new(show_progress: bool) -> Self {
        Self { show_progress }
    }

    /// Executes every step of the plan in rank order, stopping at the first
    /// failure. The returned report is complete in either case.
    pub fn execute(&self, plan: &Plan) -> ExecutionReport {
        let mut report = ExecutionReport::new();
        let progress = self
            .show_progress
            .then(|| OutputFormatter::create_progress_bar(plan.len() as u64));

        for step in &plan.steps {
            let description = step.action.to_string();
            match self.run_step(&step.action) {
                Ok(outcome) => {
                    if let StepOutcome::DeleteAlreadyAbsent(path) = outcome {
                        if let Some(bar) = &progress {
                            bar.println(format!("  ⚠ already absent: {}", path.display()));
                        }
                        report.skipped_deletes.push(path);
                    } else if let Some(bar) = &progress {
                        bar.println(format!("  ✓ {}", description));
                    }
                    report.completed.push(StepRecord {
                        rank: step.ordering_rank,
                        description,
                    });
                    if let Some(bar) = &progress {
                        bar.inc(1);
                    }
                }
                Err(error) => {
                    if let Some(bar) = &progress {
                        bar.println(format!("  ✗ {}: {}", description, error));
                    }
                    report.failure = Some(StepFailure {
                        rank: step.ordering_rank,
                        description,
                        error: error.to_string(),
                    });
                    break;
                }
            }
        }

        if let Some(bar) = progress {
            bar.finish_and_clear();
        }
        report
    }

    fn run_step(&self, action: &StepAction) -> Result<StepOutcome, ExecuteError> {
        match action {
            StepAction::MoveFile {
                source,
                destination,
            } => {
                move_file(source, destination)?;
                Ok(StepOutcome::Done)
            }
            StepAction::DeleteFile { path } => match fs::remove_file(path) {
                Ok(()) => Ok(StepOutcome::Done),
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    Ok(StepOutcome::DeleteAlreadyAbsent(path.clone()))
                }
                Err(e) => Err(ExecuteError::DeleteFailed {
                    path: path.clone(),
                    source_error: e,
                }),
            },
            StepAction::ExtractMember {
                container,
                member,
                staging,
            } => {
                extract_member(container, member, staging)?;
                Ok(StepOutcome::Done)
            }
            StepAction::RenameToTemp { source, temp } => {
                if temp.exists() {
                    return Err(ExecuteError::DestinationExists { path: temp.clone() });
                }
                fs::rename(source, temp).map_err(|e| ExecuteError::MoveFailed {
                    source: source.clone(),
                    destination: temp.clone(),
                    source_error: e,
                })?;
                Ok(StepOutcome::Done)
            }
        }
    }
}

enum StepOutcome {
    Done,
    DeleteAlreadyAbsent(PathBuf),
}

/// Moves a file, creating intermediate destination directories as needed.
/// Falls back to copy-and-remove when source and destination are on
/// different filesystems.
fn move_file(source: &Path, destination: &Path) -> Result<(), ExecuteError> {
    let move_error = |e: io::Error| ExecuteError::MoveFailed {
        source: source.to_path_buf(),
        destination: destination.to_path_buf(),
        source_error: e,
    };

    if let Some(parent) = destination.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(move_error)?;
    }

    if destination.exists() {
        return Err(ExecuteError::DestinationExists {
            path: destination.to_path_buf(),
        });
    }

    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => {
            fs::copy(source, destination).map_err(move_error)?;
            fs::remove_file(source).map_err(move_error)?;
            Ok(())
        }
        Err(e) => Err(move_error(e)),
    }
}

/// Stages the bytes of an archive member at the given path.
fn extract_member(container: &Path, member: &Path, staging: &Path) -> Result<(), ExecuteError> {
    let extract_error = |reason: String| ExecuteError::ExtractFailed {
        container: container.to_path_buf(),
        member: member.to_path_buf(),
        reason,
    };

    let kind = ArchiveKind::detect(container).ok_or(ExecuteError::UnsupportedContainer {
        container: container.to_path_buf(),
    })?;

    let mut reader =
        archive::open_member(kind, container, member).map_err(|e| extract_error(e.to_string()))?;

    if let Some(parent) = staging.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| extract_error(e.to_string()))?;
    }
    let mut file = File::create(staging).map_err(|e| extract_error(e.to_string()))?;
    io::copy(&mut reader, &mut file).map_err(|e| extract_error(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::PlanStep;
    use tempfile::TempDir;

    fn plan_of(actions: Vec<StepAction>) -> Plan {
        Plan {
            steps: actions
                .into_iter()
                .enumerate()
                .map(|(ordering_rank, action)| PlanStep {
                    ordering_rank,
                    action,
                })
                .collect(),
        }
    }

    fn executor() -> Executor {
        Executor::new(false)
    }

    #[test]
    fn test_move_creates_destination_directories() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let source = dir.path().join("a.txt");
        let destination = dir.path().join("deep/nested/b.txt");
        fs::write(&source, "content").expect("Failed to write file");

        let report = executor().execute(&plan_of(vec![StepAction::MoveFile {
            source: source.clone(),
            destination: destination.clone(),
        }]));

        assert!(report.succeeded());
        assert!(!source.exists());
        assert_eq!(
            fs::read_to_string(&destination).expect("Failed to read file"),
            "content"
        );
    }

    #[test]
    fn test_occupied_destination_halts_execution() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let source = dir.path().join("a.txt");
        let destination = dir.path().join("b.txt");
        fs::write(&source, "new").expect("Failed to write file");
        fs::write(&destination, "old").expect("Failed to write file");

        let report = executor().execute(&plan_of(vec![
            StepAction::MoveFile {
                source: source.clone(),
                destination: destination.clone(),
            },
            StepAction::DeleteFile {
                path: source.clone(),
            },
        ]));

        assert!(!report.succeeded());
        let failure = report.failure.expect("expected a failure");
        assert_eq!(failure.rank, 0);
        assert!(report.completed.is_empty());
        // Neither file was touched and the second step never ran.
        assert_eq!(
            fs::read_to_string(&destination).expect("Failed to read file"),
            "old"
        );
        assert!(source.exists());
    }

    #[test]
    fn test_delete_of_absent_path_is_satisfied() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let missing = dir.path().join("gone.txt");

        let report = executor().execute(&plan_of(vec![StepAction::DeleteFile {
            path: missing.clone(),
        }]));

        assert!(report.succeeded());
        assert_eq!(report.skipped_deletes, vec![missing]);
        assert_eq!(report.completed.len(), 1);
    }

    #[test]
    fn test_delete_removes_file() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("doomed.txt");
        fs::write(&path, "x").expect("Failed to write file");

        let report = executor().execute(&plan_of(vec![StepAction::DeleteFile {
            path: path.clone(),
        }]));

        assert!(report.succeeded());
        assert!(!path.exists());
        assert!(report.skipped_deletes.is_empty());
    }

    #[test]
    fn test_rename_to_temp_then_place() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let source = dir.path().join("a.txt");
        let temp = dir.path().join(".umv-0001.a.txt");
        let destination = dir.path().join("b.txt");
        fs::write(&source, "swapped").expect("Failed to write file");

        let report = executor().execute(&plan_of(vec![
            StepAction::RenameToTemp {
                source: source.clone(),
                temp: temp.clone(),
            },
            StepAction::MoveFile {
                source: temp.clone(),
                destination: destination.clone(),
            },
        ]));

        assert!(report.succeeded());
        assert!(!temp.exists());
        assert_eq!(
            fs::read_to_string(&destination).expect("Failed to read file"),
            "swapped"
        );
    }

    #[test]
    fn test_extract_member_stages_bytes() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let container = dir.path().join("bundle.tar");
        let file = File::create(&container).expect("Failed to create tar");
        let mut builder = tar::Builder::new(file);
        let data: &[u8] = b"member bytes";
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, "inner/data.bin", data)
            .expect("Failed to append member");
        builder.finish().expect("Failed to finish tar");

        let staging = dir.path().join("staging/member-0000");
        let destination = dir.path().join("flat.bin");

        let report = executor().execute(&plan_of(vec![
            StepAction::ExtractMember {
                container: container.clone(),
                member: PathBuf::from("inner/data.bin"),
                staging: staging.clone(),
            },
            StepAction::MoveFile {
                source: staging.clone(),
                destination: destination.clone(),
            },
        ]));

        assert!(report.succeeded());
        assert_eq!(
            fs::read(&destination).expect("Failed to read file"),
            b"member bytes"
        );
        assert!(container.exists());
        assert!(!staging.exists());
    }

    #[test]
    fn test_report_names_completed_steps_in_order() {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        fs::write(&a, "1").expect("Failed to write file");
        fs::write(&b, "2").expect("Failed to write file");

        let report = executor().execute(&plan_of(vec![
            StepAction::MoveFile {
                source: a.clone(),
                destination: dir.path().join("x.txt"),
            },
            StepAction::DeleteFile { path: b.clone() },
        ]));

        assert!(report.succeeded());
        let ranks: Vec<usize> = report.completed.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![0, 1]);
    }
}

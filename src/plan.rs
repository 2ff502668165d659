//! Ordering of operations into a conflict-free execution plan.
//!
//! Executing moves in listing order can destroy data: a destination may still
//! be occupied by a file that is itself moved or deleted further down. The
//! builder treats every occupied path as a dependency. An operation writing
//! to path P waits for whatever currently holds P to vacate it, whether by
//! moving away, being deleted, or finishing its read of an archive container.
//! Dependency cycles (the classic two-file swap and its longer rotations) are
//! broken by staging one participant under a temporary name and re-queuing
//! its real placement after the rest of the cycle has drained.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::entry::{MEMBER_SEPARATOR, Origin};
use crate::reconcile::{CaseSensitivity, Operation, OperationKind};

/// One executable filesystem mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StepAction {
    /// Move a file to its destination, creating parent directories as needed.
    MoveFile {
        source: PathBuf,
        destination: PathBuf,
    },
    /// Remove a file.
    DeleteFile { path: PathBuf },
    /// Copy the bytes of an archive member to a staging file for the
    /// following placement step to consume.
    ExtractMember {
        container: PathBuf,
        member: PathBuf,
        staging: PathBuf,
    },
    /// Set a file aside under a generated temporary name to break a
    /// dependency cycle. Never derived from a user edit.
    RenameToTemp { source: PathBuf, temp: PathBuf },
}

impl fmt::Display for StepAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepAction::MoveFile {
                source,
                destination,
            } => write!(f, "move {} -> {}", source.display(), destination.display()),
            StepAction::DeleteFile { path } => write!(f, "delete {}", path.display()),
            StepAction::ExtractMember {
                container, member, ..
            } => write!(
                f,
                "extract {}{}{}",
                container.display(),
                MEMBER_SEPARATOR,
                member.display()
            ),
            StepAction::RenameToTemp { source, temp } => {
                write!(f, "set aside {} as {}", source.display(), temp.display())
            }
        }
    }
}

/// One unit of execution with its final position in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    /// Position in the execution order. Steps run strictly by rank.
    pub ordering_rank: usize,
    /// The mutation to perform.
    pub action: StepAction,
}

/// The ordered, conflict-resolved sequence of steps for one listing edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub steps: Vec<PlanStep>,
}

impl Plan {
    /// Returns true if no filesystem mutation is required.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Number of steps in the plan.
    pub fn len(&self) -> usize {
        self.steps.len()
    }
}

/// Errors produced while building a plan.
#[derive(Debug)]
pub enum PlanError {
    /// The operations cannot be ordered into a safe plan.
    UnresolvablePlan { reason: String },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanError::UnresolvablePlan { reason } => {
                write!(f, "Cannot build an execution plan: {}", reason)
            }
        }
    }
}

impl std::error::Error for PlanError {}

/// What a graph node does once it executes.
#[derive(Debug, Clone)]
enum Payload {
    /// Move a file already on disk.
    MoveExisting { source: PathBuf },
    /// Extract a member and place it at the destination.
    PlaceMember {
        container: PathBuf,
        member: PathBuf,
        staging: PathBuf,
    },
    /// Remove a file already on disk.
    DeleteExisting { path: PathBuf },
    /// Place a previously staged file at its real destination.
    PlaceFromTemp { temp: PathBuf },
}

/// One node in the occupancy dependency graph.
#[derive(Debug, Clone)]
struct Node {
    /// Position of the originating operation in the listing, used to break
    /// ordering ties deterministically.
    op_index: usize,
    /// Comparison key of the path this node occupies until it executes.
    source_key: Option<String>,
    dest: Option<PathBuf>,
    dest_key: Option<String>,
    payload: Payload,
}

/// Builds plans. Owns the temporary-name generator so that plan building is
/// deterministic and repeatable: the same operations always produce the same
/// steps in the same order.
pub struct PlanBuilder {
    staging_dir: PathBuf,
    case: CaseSensitivity,
    temp_counter: u64,
}

impl PlanBuilder {
    /// Creates a builder that stages extracted archive members under
    /// `staging_dir`.
    pub fn new(staging_dir: &Path, case: CaseSensitivity) -> Self {
        Self {
            staging_dir: staging_dir.to_path_buf(),
            case,
            temp_counter: 0,
        }
    }

    /// Orders the operations into an executable plan.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::UnresolvablePlan`] when a destination is also a
    /// required ancestor directory of another destination, or when the
    /// dependency graph cannot be drained even with temporary renames.
    pub fn build(mut self, operations: &[Operation]) -> Result<Plan, PlanError> {
        self.check_nested_destinations(operations)?;

        let mut nodes = self.collect_nodes(operations);

        // Pending holders of each occupied path.
        let mut occupants: HashMap<String, BTreeSet<usize>> = HashMap::new();
        for (id, node) in nodes.iter().enumerate() {
            if let Some(key) = &node.source_key {
                occupants.entry(key.clone()).or_default().insert(id);
            }
        }

        let mut dependents: HashMap<String, Vec<usize>> = HashMap::new();
        let mut in_degree = vec![0usize; nodes.len()];
        for (id, node) in nodes.iter().enumerate() {
            if let Some(key) = &node.dest_key {
                in_degree[id] = occupants.get(key).map(|held| held.len()).unwrap_or(0);
                dependents.entry(key.clone()).or_default().push(id);
            }
        }

        let mut ready: BTreeSet<usize> = (0..nodes.len())
            .filter(|&id| in_degree[id] == 0)
            .collect();
        let mut emitted = vec![false; nodes.len()];
        let mut pending = nodes.len();
        let mut actions = Vec::new();
        let break_limit = nodes.len();
        let mut breaks = 0usize;

        while pending > 0 {
            let next = ready.iter().next().copied();
            if let Some(id) = next {
                ready.remove(&id);
                emitted[id] = true;
                pending -= 1;
                push_actions(&nodes[id], &mut actions);
                vacate(
                    id,
                    &nodes,
                    &mut occupants,
                    &dependents,
                    &mut in_degree,
                    &emitted,
                    &mut ready,
                );
                continue;
            }

            // Every pending node is blocked, so the graph holds a cycle.
            breaks += 1;
            if breaks > break_limit {
                return Err(PlanError::UnresolvablePlan {
                    reason: "cycle breaking did not converge".to_string(),
                });
            }

            let Some(cycle) = find_cycle(&nodes, &occupants, &emitted) else {
                return Err(PlanError::UnresolvablePlan {
                    reason: "dependency graph is blocked without a detectable cycle".to_string(),
                });
            };

            let Some(victim) = cycle
                .iter()
                .copied()
                .filter(|&id| {
                    matches!(
                        nodes[id].payload,
                        Payload::MoveExisting { .. } | Payload::PlaceMember { .. }
                    )
                })
                .min_by_key(|&id| nodes[id].op_index)
            else {
                return Err(PlanError::UnresolvablePlan {
                    reason: "dependency cycle contains no operation that can be staged aside"
                        .to_string(),
                });
            };

            // Stage the victim's bytes out of the cycle now and re-queue the
            // placement at its real destination for later.
            emitted[victim] = true;
            pending -= 1;
            let staged = match nodes[victim].payload.clone() {
                Payload::MoveExisting { source } => {
                    let temp = self.next_temp(&source);
                    actions.push(StepAction::RenameToTemp {
                        source,
                        temp: temp.clone(),
                    });
                    temp
                }
                Payload::PlaceMember {
                    container,
                    member,
                    staging,
                } => {
                    actions.push(StepAction::ExtractMember {
                        container,
                        member,
                        staging: staging.clone(),
                    });
                    staging
                }
                Payload::DeleteExisting { .. } | Payload::PlaceFromTemp { .. } => {
                    return Err(PlanError::UnresolvablePlan {
                        reason: "dependency cycle cannot be broken".to_string(),
                    });
                }
            };
            vacate(
                victim,
                &nodes,
                &mut occupants,
                &dependents,
                &mut in_degree,
                &emitted,
                &mut ready,
            );

            let (Some(dest), Some(dest_key)) =
                (nodes[victim].dest.clone(), nodes[victim].dest_key.clone())
            else {
                return Err(PlanError::UnresolvablePlan {
                    reason: "a blocked operation has no destination".to_string(),
                });
            };
            let blockers = occupants.get(&dest_key).map(|held| held.len()).unwrap_or(0);
            let id = nodes.len();
            nodes.push(Node {
                op_index: nodes[victim].op_index,
                source_key: None,
                dest: Some(dest),
                dest_key: Some(dest_key.clone()),
                payload: Payload::PlaceFromTemp { temp: staged },
            });
            in_degree.push(blockers);
            emitted.push(false);
            dependents.entry(dest_key).or_default().push(id);
            pending += 1;
            if blockers == 0 {
                ready.insert(id);
            }
        }

        let steps = actions
            .into_iter()
            .enumerate()
            .map(|(ordering_rank, action)| PlanStep {
                ordering_rank,
                action,
            })
            .collect();
        Ok(Plan { steps })
    }

    /// A destination that is also a required ancestor directory of another
    /// destination would have to be both a file and a directory.
    fn check_nested_destinations(&self, operations: &[Operation]) -> Result<(), PlanError> {
        let mut destinations: HashMap<String, PathBuf> = HashMap::new();
        for operation in operations {
            if operation.kind == OperationKind::Delete {
                continue;
            }
            if let Some(dest) = &operation.destination {
                destinations.insert(self.case.key(dest), dest.clone());
            }
        }

        for operation in operations {
            if operation.kind == OperationKind::Delete {
                continue;
            }
            let Some(dest) = &operation.destination else {
                continue;
            };
            for ancestor in dest.ancestors().skip(1) {
                if ancestor.as_os_str().is_empty() {
                    break;
                }
                if let Some(other) = destinations.get(&self.case.key(ancestor)) {
                    return Err(PlanError::UnresolvablePlan {
                        reason: format!(
                            "{} must become a directory to hold {}, but it is also a destination file",
                            other.display(),
                            dest.display()
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    fn collect_nodes(&self, operations: &[Operation]) -> Vec<Node> {
        let mut nodes = Vec::new();
        for operation in operations {
            match operation.kind {
                OperationKind::Delete => {
                    // Containers are not rewritten, so deleting a member is
                    // satisfied by doing nothing.
                    if let Origin::File { path } = &operation.source {
                        nodes.push(Node {
                            op_index: operation.index,
                            source_key: Some(self.case.key(path)),
                            dest: None,
                            dest_key: None,
                            payload: Payload::DeleteExisting { path: path.clone() },
                        });
                    }
                }
                OperationKind::Keep | OperationKind::Move => {
                    let Some(dest) = &operation.destination else {
                        continue;
                    };
                    let dest_key = self.case.key(dest);
                    match &operation.source {
                        Origin::File { path } => {
                            if self.case.key(path) == dest_key {
                                // Already in place, nothing to execute.
                                continue;
                            }
                            nodes.push(Node {
                                op_index: operation.index,
                                source_key: Some(self.case.key(path)),
                                dest: Some(dest.clone()),
                                dest_key: Some(dest_key),
                                payload: Payload::MoveExisting {
                                    source: path.clone(),
                                },
                            });
                        }
                        Origin::ArchiveMember { container, member } => {
                            let staging = self
                                .staging_dir
                                .join(format!("member-{:04}", operation.index));
                            nodes.push(Node {
                                op_index: operation.index,
                                source_key: Some(self.case.key(container)),
                                dest: Some(dest.clone()),
                                dest_key: Some(dest_key),
                                payload: Payload::PlaceMember {
                                    container: container.clone(),
                                    member: member.clone(),
                                    staging,
                                },
                            });
                        }
                    }
                }
            }
        }
        nodes
    }

    /// Generates a unique temporary path next to `source`. Temporary names
    /// never appear in the user-visible listing.
    fn next_temp(&mut self, source: &Path) -> PathBuf {
        self.temp_counter += 1;
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| String::from("entry"));
        source.with_file_name(format!(".umv-{:04}.{}", self.temp_counter, name))
    }
}

/// Emits the executable steps for one node.
fn push_actions(node: &Node, actions: &mut Vec<StepAction>) {
    match &node.payload {
        Payload::MoveExisting { source } => {
            if let Some(dest) = &node.dest {
                actions.push(StepAction::MoveFile {
                    source: source.clone(),
                    destination: dest.clone(),
                });
            }
        }
        Payload::PlaceMember {
            container,
            member,
            staging,
        } => {
            if let Some(dest) = &node.dest {
                // Extraction immediately precedes placement so only one
                // member of a container is ever staged at a time.
                actions.push(StepAction::ExtractMember {
                    container: container.clone(),
                    member: member.clone(),
                    staging: staging.clone(),
                });
                actions.push(StepAction::MoveFile {
                    source: staging.clone(),
                    destination: dest.clone(),
                });
            }
        }
        Payload::DeleteExisting { path } => {
            actions.push(StepAction::DeleteFile { path: path.clone() });
        }
        Payload::PlaceFromTemp { temp } => {
            if let Some(dest) = &node.dest {
                actions.push(StepAction::MoveFile {
                    source: temp.clone(),
                    destination: dest.clone(),
                });
            }
        }
    }
}

/// Removes an executed node from the occupancy table and readies any
/// dependent whose destination just became free.
fn vacate(
    id: usize,
    nodes: &[Node],
    occupants: &mut HashMap<String, BTreeSet<usize>>,
    dependents: &HashMap<String, Vec<usize>>,
    in_degree: &mut Vec<usize>,
    emitted: &[bool],
    ready: &mut BTreeSet<usize>,
) {
    let Some(key) = &nodes[id].source_key else {
        return;
    };
    let removed = occupants
        .get_mut(key)
        .map(|held| held.remove(&id))
        .unwrap_or(false);
    if !removed {
        return;
    }
    if let Some(waiting) = dependents.get(key) {
        for &dependent in waiting {
            if emitted[dependent] {
                continue;
            }
            in_degree[dependent] = in_degree[dependent].saturating_sub(1);
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }
}

/// Walks blocker chains from the lowest pending node until a node repeats,
/// returning the nodes on the cycle. Returns `None` only if the bookkeeping
/// is inconsistent.
fn find_cycle(
    nodes: &[Node],
    occupants: &HashMap<String, BTreeSet<usize>>,
    emitted: &[bool],
) -> Option<Vec<usize>> {
    let start = (0..nodes.len()).find(|&id| !emitted[id])?;
    let mut path = Vec::new();
    let mut seen_at: HashMap<usize, usize> = HashMap::new();
    let mut current = start;
    loop {
        if let Some(&at) = seen_at.get(&current) {
            return Some(path[at..].to_vec());
        }
        seen_at.insert(current, path.len());
        path.push(current);
        let key = nodes[current].dest_key.as_ref()?;
        current = *occupants.get(key)?.iter().next()?;
    }
}

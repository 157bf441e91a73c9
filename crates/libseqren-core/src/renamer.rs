//! Collision-safe sequential batch renamer
//!
//! Files are renamed to `01.ext`, `02.ext`, ... in the order they are given,
//! each staying in its own directory. Every file that needs to move is first
//! staged under a unique temporary name, and only then moved to its final
//! name, so a batch whose targets collide with current names of other batch
//! members (`a -> 02`, `02 -> 01`, ...) never overwrites anything.

use std::collections::HashSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::SeqrenError;

/// Width of the zero-padded numeric prefix.
///
/// Two digits up to 99 files, three digits above that. Batches larger than
/// 999 keep three digits and simply grow past the padding.
pub fn calculate_padding(total: usize) -> usize {
    if total <= 99 {
        2
    } else {
        3
    }
}

/// Final file name for the `index`-th survivor (1-based)
pub fn target_name(index: usize, padding: usize, source: &Path) -> OsString {
    let mut name = OsString::from(format!("{:0width$}", index, width = padding));
    if let Some(ext) = source.extension() {
        name.push(".");
        name.push(ext);
    }
    name
}

/// One planned move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRename {
    /// Position among the survivors, starting at 1
    pub index: usize,
    pub source: PathBuf,
    pub target: PathBuf,
}

impl PlannedRename {
    /// True if the file already carries its computed name
    pub fn is_noop(&self) -> bool {
        self.source == self.target
    }
}

/// Mapping from input order to target names, computed fresh for each call
#[derive(Debug, Clone, Default)]
pub struct RenamePlan {
    /// Length of the input sequence before filtering
    pub requested: usize,
    pub padding: usize,
    /// Inputs that no longer exist on disk
    pub missing: usize,
    /// Inputs that repeat an earlier path in the same call
    pub duplicates: usize,
    pub entries: Vec<PlannedRename>,
}

impl RenamePlan {
    /// Build a plan for the given ordered paths.
    ///
    /// Padding is derived from the full input length; numbering runs over the
    /// paths that still exist, in input order.
    pub fn build<P: AsRef<Path>>(paths: &[P]) -> Self {
        let requested = paths.len();
        let padding = calculate_padding(requested);
        let mut seen = HashSet::new();
        let mut plan = RenamePlan {
            requested,
            padding,
            ..Default::default()
        };

        for path in paths {
            let source = path.as_ref();
            if !source.exists() {
                debug!(path = %source.display(), "Skipping missing file");
                plan.missing += 1;
                continue;
            }
            if !seen.insert(source.to_path_buf()) {
                plan.duplicates += 1;
                continue;
            }

            let index = plan.entries.len() + 1;
            let target = source.with_file_name(target_name(index, padding, source));
            plan.entries.push(PlannedRename {
                index,
                source: source.to_path_buf(),
                target,
            });
        }

        plan
    }
}

/// A single entry that could not be renamed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenameFailure {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of a batch rename
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameReport {
    pub requested: usize,
    /// Files that ended at their target name through a move
    pub renamed: usize,
    /// Files that already carried their target name
    pub unchanged: usize,
    pub missing: usize,
    pub duplicates: usize,
    pub failed: Vec<RenameFailure>,
}

impl RenameReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Convert into an error if any entry failed.
    ///
    /// Used by front ends that surface their own synchronous invocations.
    pub fn into_result(self) -> Result<Self, SeqrenError> {
        if self.failed.is_empty() {
            Ok(self)
        } else {
            Err(SeqrenError::PartialRename {
                failed: self.failed.len(),
                requested: self.requested,
            })
        }
    }

    fn fail(&mut self, path: &Path, err: &SeqrenError) {
        warn!(path = %path.display(), code = err.error_code(), "{}", err);
        self.failed.push(RenameFailure {
            path: path.to_path_buf(),
            reason: err.to_string(),
        });
    }
}

/// A file moved to its temporary name during phase 1
struct Staged {
    entry: PlannedRename,
    temp: PathBuf,
}

/// Rename the given files in order.
///
/// Never panics and never stops early: each failing entry is logged and
/// recorded in the report while the rest of the batch proceeds. Nothing that
/// already moved is rolled back.
pub fn rename_files<P: AsRef<Path>>(paths: &[P]) -> RenameReport {
    let plan = RenamePlan::build(paths);
    execute_plan(plan)
}

/// Execute a precomputed plan with the two-phase staged strategy
pub fn execute_plan(plan: RenamePlan) -> RenameReport {
    let mut report = RenameReport {
        requested: plan.requested,
        missing: plan.missing,
        duplicates: plan.duplicates,
        ..Default::default()
    };

    if plan.entries.is_empty() {
        return report;
    }

    info!(
        requested = plan.requested,
        survivors = plan.entries.len(),
        padding = plan.padding,
        "Renaming batch"
    );

    let batch_members: HashSet<PathBuf> = plan
        .entries
        .iter()
        .flat_map(|e| identities(&e.source))
        .collect();

    // Phase 1: move everything that needs a new name out of the way
    let mut staged = Vec::with_capacity(plan.entries.len());
    for entry in plan.entries {
        if entry.is_noop() {
            debug!(path = %entry.source.display(), "Already named correctly");
            report.unchanged += 1;
            continue;
        }

        if occupied_by_outsider(&entry.target, &batch_members) {
            report.fail(&entry.source, &SeqrenError::TargetOccupied(entry.target.clone()));
            continue;
        }

        let temp = match temp_path(&entry.source) {
            Ok(temp) => temp,
            Err(e) => {
                report.fail(&entry.source, &e);
                continue;
            }
        };

        match std::fs::rename(&entry.source, &temp) {
            Ok(()) => {
                debug!(from = %entry.source.display(), to = %temp.display(), "Staged");
                staged.push(Staged { entry, temp });
            }
            Err(e) => report.fail(&entry.source, &SeqrenError::rename(&entry.source, &temp, e)),
        }
    }

    // Phase 2: move staged files to their final names in target order
    for Staged { entry, temp } in staged {
        // A phase 1 failure can leave a batch member sitting on this target
        if entry.target.exists() {
            report.fail(&entry.source, &SeqrenError::TargetOccupied(entry.target.clone()));
            restore(&temp, &entry.source);
            continue;
        }

        match std::fs::rename(&temp, &entry.target) {
            Ok(()) => {
                debug!(from = %entry.source.display(), to = %entry.target.display(), "Renamed");
                report.renamed += 1;
            }
            Err(e) => {
                report.fail(&entry.source, &SeqrenError::rename(&temp, &entry.target, e));
                restore(&temp, &entry.source);
            }
        }
    }

    info!(
        renamed = report.renamed,
        unchanged = report.unchanged,
        missing = report.missing,
        failed = report.failed.len(),
        "Batch rename finished"
    );

    report
}

/// Fresh temporary name in the same directory with the same extension
fn temp_path(source: &Path) -> Result<PathBuf, SeqrenError> {
    for _ in 0..8 {
        let mut name = OsString::from(format!(".seqren-{}", uuid::Uuid::new_v4().simple()));
        if let Some(ext) = source.extension() {
            name.push(".");
            name.push(ext);
        }
        let candidate = source.with_file_name(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    Err(SeqrenError::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free temporary name next to {}", source.display()),
    )))
}

/// Best effort: put a staged file back under its original name
fn restore(temp: &Path, original: &Path) {
    if original.exists() {
        warn!(path = %temp.display(), "Original name taken, file left at temporary name");
        return;
    }
    if let Err(e) = std::fs::rename(temp, original) {
        warn!(
            path = %temp.display(),
            original = %original.display(),
            "Failed to restore staged file: {}",
            e
        );
    }
}

/// Literal and canonical forms of a path, so case-insensitive filesystems
/// still recognise a batch member under a differently-cased target.
fn identities(path: &Path) -> Vec<PathBuf> {
    let mut ids = vec![path.to_path_buf()];
    if let Ok(canonical) = path.canonicalize() {
        ids.push(canonical);
    }
    ids
}

fn occupied_by_outsider(target: &Path, batch_members: &HashSet<PathBuf>) -> bool {
    if !target.exists() {
        return false;
    }
    !identities(target)
        .iter()
        .any(|id| batch_members.contains(id))
}

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, VersetError};
use crate::pattern;
use crate::registry::PatternRegistry;
use crate::store::{VersionStore, STORE_FILE};
use crate::validate::{self, ChangeSet, Finding};
use crate::version::{BumpPart, VersionValue};

/// Phase of the current operation. Terminal phases are `Rejected`,
/// `DryRunReported`, `Committed`, and `RolledBack`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    Idle,
    Planning,
    Validated,
    Rejected,
    DryRunReported,
    Applying,
    Committed,
    RolledBack,
}

/// One resolved edit of a target file. `changed = false` marks a no-op:
/// the file already carries the rendered value.
#[derive(Debug, Clone)]
pub struct FileEdit {
    pub key: String,
    pub path: PathBuf,
    pub locator: String,
    pub previous: String,
    pub rendered: String,
    pub old_content: String,
    pub new_content: String,
    pub changed: bool,
}

/// Fully-resolved, validated edits for one ChangeSet. Building a plan only
/// reads the filesystem; a plan is never persisted.
#[derive(Debug)]
pub struct Plan {
    /// key → (current value, proposed value)
    pub key_changes: BTreeMap<String, (String, String)>,
    pub edits: Vec<FileEdit>,
    /// Findings raised while validating the ChangeSet. `plan` only hands
    /// out a plan once this is empty; `apply` refuses one that is not.
    pub findings: Vec<Finding>,
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        self.edits.iter().all(|e| !e.changed)
            && self.key_changes.values().all(|(old, new)| old == new)
    }

    /// Unique target paths the apply phase would rewrite.
    pub fn changed_paths(&self) -> BTreeSet<&Path> {
        self.edits
            .iter()
            .filter(|e| e.changed)
            .map(|e| e.path.as_path())
            .collect()
    }
}

/// What a successful apply touched.
#[derive(Debug, Default)]
pub struct ApplySummary {
    pub key_changes: BTreeMap<String, (String, String)>,
    pub files_written: Vec<PathBuf>,
    pub files_unchanged: Vec<PathBuf>,
}

/// Drives one update operation end to end: resolve a ChangeSet into a
/// Plan, then apply it with all-or-nothing semantics. Every touched file,
/// the store document included, is backed up in memory before the first
/// write and restored on any failure.
pub struct UpdatePlanner {
    root: PathBuf,
    store: VersionStore,
    registry: PatternRegistry,
    state: PlannerState,
}

struct Backup {
    path: PathBuf,
    content: String,
}

impl UpdatePlanner {
    pub fn new<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let store_path = root.join(STORE_FILE);
        if !root.is_dir() {
            return Err(VersetError::StoreUnreadable {
                path: store_path,
                reason: "project root is not a directory".to_string(),
            });
        }
        let store = VersionStore::load(&store_path)?;
        let registry = PatternRegistry::load(&store_path)?;
        registry.validate(&store)?;

        Ok(Self {
            root,
            store,
            registry,
            state: PlannerState::Idle,
        })
    }

    #[allow(dead_code)]
    pub fn state(&self) -> PlannerState {
        self.state
    }

    pub fn store(&self) -> &VersionStore {
        &self.store
    }

    pub fn registry(&self) -> &PatternRegistry {
        &self.registry
    }

    /// Read-only key to value view of the store.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.store.snapshot()
    }

    /// Resolve and validate a ChangeSet. Any failure rejects the operation
    /// with zero filesystem effect.
    pub fn plan(&mut self, changes: &ChangeSet) -> Result<Plan> {
        self.state = PlannerState::Planning;

        let plan = match validate::check_changes(&self.store, changes)
            .and_then(|()| self.build_edits(changes))
        {
            Ok(plan) => plan,
            Err(e) => {
                self.state = PlannerState::Rejected;
                return Err(e);
            }
        };

        self.state = PlannerState::Validated;
        Ok(plan)
    }

    /// Mark a plan as previewed instead of applied.
    pub fn finish_dry_run(&mut self) {
        self.state = PlannerState::DryRunReported;
    }

    /// Write every planned edit, persist the store, then re-verify every
    /// registered occurrence. On any failure all written files are restored
    /// from backup and the causing error is returned.
    pub fn apply(&mut self, plan: Plan) -> Result<ApplySummary> {
        // a plan carrying findings never passed validation
        if !plan.findings.is_empty() {
            self.state = PlannerState::Rejected;
            return Err(VersetError::ValidationFailed(plan.findings.len()));
        }
        self.state = PlannerState::Applying;

        // final content per file: last edit wins, a file changes if any
        // of its edits did
        let mut files: BTreeMap<PathBuf, (String, bool)> = BTreeMap::new();
        for edit in &plan.edits {
            let entry = files
                .entry(edit.path.clone())
                .or_insert_with(|| (String::new(), false));
            entry.0 = edit.new_content.clone();
            entry.1 |= edit.changed;
        }

        // backups before the first write
        let mut backups: Vec<Backup> = Vec::new();
        for path in files.keys() {
            let abs = self.root.join(path);
            match fs::read_to_string(&abs) {
                Ok(content) => backups.push(Backup { path: abs, content }),
                Err(e) => {
                    self.state = PlannerState::RolledBack;
                    return Err(e.into());
                }
            }
        }
        let store_path = self.store.path().to_path_buf();
        let store_backup = match fs::read_to_string(&store_path) {
            Ok(content) => content,
            Err(e) => {
                self.state = PlannerState::RolledBack;
                return Err(e.into());
            }
        };

        for (key, (_, new_value)) in &plan.key_changes {
            if let Err(e) = self.store.set(key, new_value) {
                return Err(self.rollback(&backups, &[], false, &store_backup, e));
            }
        }

        let mut written: Vec<PathBuf> = Vec::new();
        for (path, (content, changed)) in &files {
            if !*changed {
                continue;
            }
            let abs = self.root.join(path);
            // a failed write may still have truncated the file, so it
            // counts as written for rollback purposes
            written.push(abs.clone());
            if let Err(e) = fs::write(&abs, content) {
                return Err(self.rollback(&backups, &written, false, &store_backup, e.into()));
            }
        }

        if let Err(e) = self.store.commit() {
            return Err(self.rollback(&backups, &written, false, &store_backup, e));
        }

        if let Err(e) = self.verify() {
            return Err(self.rollback(&backups, &written, true, &store_backup, e));
        }

        self.state = PlannerState::Committed;

        let mut summary = ApplySummary {
            key_changes: plan.key_changes,
            ..ApplySummary::default()
        };
        for (path, (_, changed)) in files {
            if changed {
                summary.files_written.push(path);
            } else {
                summary.files_unchanged.push(path);
            }
        }
        Ok(summary)
    }

    /// Next value a bump of `part` would write for `key`.
    pub fn bumped_value(&self, key: &str, part: BumpPart) -> Result<String> {
        let current = self.store.get_parsed(key)?;
        current
            .bump(part)
            .map(|v| v.original)
            .ok_or_else(|| VersetError::UnsupportedBumpTarget {
                key: key.to_string(),
                reason: format!(
                    "{} kind has no numeric components",
                    self.store.kind_of(key).as_str()
                ),
            })
    }

    /// Read-only consistency pass over the whole project.
    pub fn scan(&self) -> Vec<Finding> {
        validate::scan(&self.root, &self.store, &self.registry)
    }

    fn build_edits(&self, changes: &ChangeSet) -> Result<Plan> {
        let mut key_changes = BTreeMap::new();
        let mut contents: BTreeMap<PathBuf, String> = BTreeMap::new();
        let mut edits = Vec::new();

        for (key, value) in changes {
            let old = self.store.get(key)?.to_string();
            key_changes.insert(key.clone(), (old, value.clone()));

            let kind = self.store.kind_of(key);
            let parsed = VersionValue::parse(value, kind).ok_or_else(|| {
                VersetError::InvalidValueFormat {
                    key: key.clone(),
                    kind: kind.as_str().to_string(),
                    value: value.clone(),
                }
            })?;

            for locator in self.registry.targets_for(key) {
                let rendered = pattern::render_value(locator, &parsed)?;

                // edits to the same file compose in plan order
                let old_content = match contents.get(&locator.path) {
                    Some(current) => current.clone(),
                    None => fs::read_to_string(self.root.join(&locator.path)).map_err(|_| {
                        VersetError::NoMatch {
                            key: key.clone(),
                            path: locator.path.clone(),
                            locator: locator.locator.clone(),
                        }
                    })?,
                };

                let edit = pattern::replace_value(key, locator, &old_content, &rendered)?;
                edits.push(FileEdit {
                    key: key.clone(),
                    path: locator.path.clone(),
                    locator: locator.locator.clone(),
                    previous: edit.previous,
                    rendered: rendered.clone(),
                    old_content,
                    new_content: edit.content.clone(),
                    changed: edit.changed,
                });
                contents.insert(locator.path.clone(), edit.content);
            }
        }

        Ok(Plan {
            key_changes,
            edits,
            findings: Vec::new(),
        })
    }

    /// Re-read every registered occurrence, changed or not, and require
    /// exactly the value the store now holds. An edit whose span overlaps
    /// another key's occurrence only shows up in the full pass.
    fn verify(&self) -> Result<()> {
        for (key, locator) in self.registry.all() {
            let value = self.store.get_parsed(key)?;
            let expected = pattern::render_value(locator, &value)?;
            let content = fs::read_to_string(self.root.join(&locator.path))?;
            let found = pattern::extract_value(key, locator, &content)?;
            if found != expected {
                return Err(VersetError::ConsistencyViolation {
                    path: locator.path.clone(),
                    key: key.to_string(),
                    found,
                    expected,
                });
            }
        }
        Ok(())
    }

    /// Restore every file written so far, then reload the in-memory store
    /// from the restored document. Returns the causing error, or escalates
    /// when the restore itself fails.
    fn rollback(
        &mut self,
        backups: &[Backup],
        written: &[PathBuf],
        store_committed: bool,
        store_backup: &str,
        cause: VersetError,
    ) -> VersetError {
        self.state = PlannerState::RolledBack;

        // every touched file gets a restore attempt even when one fails
        let mut failed: Option<(PathBuf, String)> = None;
        for backup in backups {
            if !written.contains(&backup.path) {
                continue;
            }
            if let Err(e) = fs::write(&backup.path, &backup.content) {
                if failed.is_none() {
                    failed = Some((backup.path.clone(), e.to_string()));
                }
            }
        }

        let store_path = self.store.path().to_path_buf();
        if store_committed {
            if let Err(e) = fs::write(&store_path, store_backup) {
                if failed.is_none() {
                    failed = Some((store_path.clone(), e.to_string()));
                }
            }
        }

        match VersionStore::load(&store_path) {
            Ok(store) => self.store = store,
            Err(e) => {
                if failed.is_none() {
                    failed = Some((store_path, e.to_string()));
                }
            }
        }

        match failed {
            Some((path, reason)) => VersetError::RollbackFailed {
                cause: cause.to_string(),
                path,
                reason,
            },
            None => cause,
        }
    }
}

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, VersetError};
use crate::pattern;
use crate::registry::PatternRegistry;
use crate::store::VersionStore;
use crate::version::VersionValue;

/// Requested key→value changes for one operation. Sorted by key so plans
/// come out in a stable order.
pub type ChangeSet = BTreeMap<String, String>;

/// Reject a ChangeSet before any plan is built: every key must exist, every
/// proposed value must parse under its kind, and any `X`/`X_min` pair with a
/// proposed side must still satisfy `X >= X_min` after the change.
pub fn check_changes(store: &VersionStore, changes: &ChangeSet) -> Result<()> {
    for (key, value) in changes {
        if !store.contains(key) {
            return Err(VersetError::UnknownKey(key.clone()));
        }
        let kind = store.kind_of(key);
        if VersionValue::parse(value, kind).is_none() {
            return Err(VersetError::InvalidValueFormat {
                key: key.clone(),
                kind: kind.as_str().to_string(),
                value: value.clone(),
            });
        }
    }

    for min_key in store.keys() {
        let Some(base) = min_key.strip_suffix("_min") else {
            continue;
        };
        if !store.contains(base) {
            continue;
        }
        if !changes.contains_key(base) && !changes.contains_key(&min_key) {
            continue;
        }

        let base_value = effective(store, changes, base)?;
        let min_value = effective(store, changes, &min_key)?;

        if base_value.release_cmp(&min_value) == Some(Ordering::Less) {
            return Err(VersetError::BelowMinimumVersion {
                key: base.to_string(),
                value: base_value.original,
                min_key: min_key.clone(),
                minimum: min_value.original,
            });
        }
    }

    Ok(())
}

/// Value a key will hold after the ChangeSet is applied.
fn effective(store: &VersionStore, changes: &ChangeSet, key: &str) -> Result<VersionValue> {
    match changes.get(key) {
        Some(proposed) => {
            let kind = store.kind_of(key);
            VersionValue::parse(proposed, kind).ok_or_else(|| VersetError::InvalidValueFormat {
                key: key.to_string(),
                kind: kind.as_str().to_string(),
                value: proposed.clone(),
            })
        }
        None => store.get_parsed(key),
    }
}

/// One problem found by a consistency scan.
#[derive(Debug, Clone)]
pub enum Finding {
    /// Stored value does not parse under its declared kind.
    MalformedValue {
        key: String,
        kind: String,
        value: String,
    },
    /// Base key sits below its declared minimum.
    BelowMinimum {
        key: String,
        value: String,
        min_key: String,
        minimum: String,
    },
    /// Target file disagrees with the canonical value.
    Drift {
        key: String,
        path: PathBuf,
        found: String,
        expected: String,
    },
    /// Target file missing or not matchable.
    Unlocatable {
        key: String,
        path: PathBuf,
        reason: String,
    },
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Finding::MalformedValue { key, kind, value } => {
                write!(f, "{key}: {value:?} is not a valid {kind} value")
            }
            Finding::BelowMinimum {
                key,
                value,
                min_key,
                minimum,
            } => write!(f, "{key} = {value:?} is below minimum {minimum:?} ({min_key})"),
            Finding::Drift {
                key,
                path,
                found,
                expected,
            } => write!(
                f,
                "{}: {key} reads {found:?}, store has {expected:?}",
                path.display()
            ),
            Finding::Unlocatable { key, path, reason } => {
                write!(f, "{}: {key} could not be checked: {reason}", path.display())
            }
        }
    }
}

/// Read-only pass over the whole project: store-level value and minimum
/// checks, then every registered occurrence compared against the canonical
/// value it should carry.
pub fn scan(root: &Path, store: &VersionStore, registry: &PatternRegistry) -> Vec<Finding> {
    let mut findings = Vec::new();

    for key in store.keys() {
        if let Err(VersetError::InvalidValueFormat { key, kind, value }) = store.get_parsed(&key) {
            findings.push(Finding::MalformedValue { key, kind, value });
        }
    }

    for min_key in store.keys() {
        let Some(base) = min_key.strip_suffix("_min") else {
            continue;
        };
        let (Ok(base_value), Ok(min_value)) =
            (store.get_parsed(base), store.get_parsed(&min_key))
        else {
            continue;
        };
        if base_value.release_cmp(&min_value) == Some(Ordering::Less) {
            findings.push(Finding::BelowMinimum {
                key: base.to_string(),
                value: base_value.original,
                min_key: min_key.clone(),
                minimum: min_value.original,
            });
        }
    }

    for (key, locator) in registry.all() {
        let Ok(value) = store.get_parsed(key) else {
            continue; // already reported above
        };
        let expected = match pattern::render_value(locator, &value) {
            Ok(expected) => expected,
            Err(e) => {
                findings.push(Finding::Unlocatable {
                    key: key.to_string(),
                    path: locator.path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let content = match fs::read_to_string(root.join(&locator.path)) {
            Ok(content) => content,
            Err(e) => {
                findings.push(Finding::Unlocatable {
                    key: key.to_string(),
                    path: locator.path.clone(),
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match pattern::extract_value(key, locator, &content) {
            Ok(found) if found == expected => {}
            Ok(found) => findings.push(Finding::Drift {
                key: key.to_string(),
                path: locator.path.clone(),
                found,
                expected,
            }),
            Err(e) => findings.push(Finding::Unlocatable {
                key: key.to_string(),
                path: locator.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    findings
}

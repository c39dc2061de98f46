use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use toml_edit::{DocumentMut, Value};

use crate::error::{Result, VersetError};
use crate::version::{VersionKind, VersionValue};

/// Well-known store document name, looked up under the project root.
pub const STORE_FILE: &str = "versions.toml";

/// Canonical key/value store backed by the `[versions]` table of the
/// store document. Edits stay in memory until `commit`; the document is
/// kept as a `DocumentMut` so unrelated entries, comments, and ordering
/// survive a rewrite.
pub struct VersionStore {
    store_path: PathBuf,
    doc: DocumentMut,
    kinds: BTreeMap<String, VersionKind>,
}

impl VersionStore {
    pub fn load<P: AsRef<Path>>(store_path: P) -> Result<Self> {
        let store_path = store_path.as_ref().to_path_buf();

        let content = fs::read_to_string(&store_path).map_err(|e| VersetError::StoreUnreadable {
            path: store_path.clone(),
            reason: e.to_string(),
        })?;

        let doc = content
            .parse::<DocumentMut>()
            .map_err(|e| VersetError::StoreUnreadable {
                path: store_path.clone(),
                reason: e.to_string(),
            })?;

        let versions = doc
            .get("versions")
            .and_then(|item| item.as_table())
            .ok_or_else(|| VersetError::StoreUnreadable {
                path: store_path.clone(),
                reason: "missing [versions] table".into(),
            })?;

        for (key, item) in versions.iter() {
            if !item.is_str() {
                return Err(VersetError::StoreUnreadable {
                    path: store_path,
                    reason: format!("versions.{key} is not a string"),
                });
            }
        }

        let kinds = parse_kinds(&doc, versions)?;

        Ok(Self {
            store_path,
            doc,
            kinds,
        })
    }

    pub fn path(&self) -> &Path {
        &self.store_path
    }

    /// Declared kind for a key; keys without a `[kinds]` entry are semver.
    pub fn kind_of(&self, key: &str) -> VersionKind {
        self.kinds.get(key).copied().unwrap_or_default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.versions_table()
            .map(|t| t.contains_key(key))
            .unwrap_or(false)
    }

    pub fn get(&self, key: &str) -> Result<&str> {
        self.versions_table()
            .and_then(|t| t.get(key))
            .and_then(|item| item.as_str())
            .ok_or_else(|| VersetError::UnknownKey(key.to_string()))
    }

    /// Current value parsed against the key's declared kind.
    pub fn get_parsed(&self, key: &str) -> Result<VersionValue> {
        let raw = self.get(key)?;
        let kind = self.kind_of(key);
        VersionValue::parse(raw, kind).ok_or_else(|| VersetError::InvalidValueFormat {
            key: key.to_string(),
            kind: kind.as_str().to_string(),
            value: raw.to_string(),
        })
    }

    /// Replace the value of an existing key, in memory only. The new value
    /// must parse under the key's declared kind.
    pub fn set(&mut self, key: &str, new_value: &str) -> Result<()> {
        let kind = self.kind_of(key);
        if VersionValue::parse(new_value, kind).is_none() {
            return Err(VersetError::InvalidValueFormat {
                key: key.to_string(),
                kind: kind.as_str().to_string(),
                value: new_value.to_string(),
            });
        }

        let item = self
            .doc
            .get_mut("versions")
            .and_then(|item| item.as_table_mut())
            .and_then(|t| t.get_mut(key))
            .ok_or_else(|| VersetError::UnknownKey(key.to_string()))?;

        match item.as_value_mut() {
            Some(value) => {
                let decor = value.decor().clone();
                *value = Value::from(new_value);
                *value.decor_mut() = decor;
                Ok(())
            }
            None => Err(VersetError::UnknownKey(key.to_string())),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.versions_table()
            .map(|t| t.iter().map(|(k, _)| k.to_string()).collect())
            .unwrap_or_default()
    }

    /// Full key→value map at this point in time.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let mut set = BTreeMap::new();
        if let Some(table) = self.versions_table() {
            for (key, item) in table.iter() {
                if let Some(value) = item.as_str() {
                    set.insert(key.to_string(), value.to_string());
                }
            }
        }
        set
    }

    /// Serialize the in-memory document and atomically replace the store
    /// file. On any failure the previous on-disk content is untouched.
    pub fn commit(&self) -> Result<()> {
        let dir = match self.store_path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };

        let tmp = NamedTempFile::new_in(dir).map_err(|e| VersetError::Persist {
            path: self.store_path.clone(),
            reason: e.to_string(),
        })?;

        fs::write(tmp.path(), self.doc.to_string()).map_err(|e| VersetError::Persist {
            path: self.store_path.clone(),
            reason: e.to_string(),
        })?;

        tmp.persist(&self.store_path)
            .map_err(|e| VersetError::Persist {
                path: self.store_path.clone(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    fn versions_table(&self) -> Option<&toml_edit::Table> {
        self.doc.get("versions").and_then(|item| item.as_table())
    }
}

fn parse_kinds(
    doc: &DocumentMut,
    versions: &toml_edit::Table,
) -> Result<BTreeMap<String, VersionKind>> {
    let mut kinds = BTreeMap::new();

    let Some(table) = doc.get("kinds").and_then(|item| item.as_table()) else {
        return Ok(kinds);
    };

    for (key, item) in table.iter() {
        if !versions.contains_key(key) {
            return Err(VersetError::RegistryConfig(format!(
                "kinds.{key} does not name a declared version key"
            )));
        }
        let kind = match item.as_str() {
            Some("semver") => VersionKind::Semver,
            Some("token") => VersionKind::Token,
            other => {
                return Err(VersetError::RegistryConfig(format!(
                    "kinds.{key} must be \"semver\" or \"token\", got {other:?}"
                )));
            }
        };
        kinds.insert(key.to_string(), kind);
    }

    Ok(kinds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const FIXTURE: &str = r#"# project versions
[versions]
project = "0.2.0"
python = "3.13" # runtime
python_min = "3.11"
node = "24"
actions_checkout = "v4"

[kinds]
actions_checkout = "token"
"#;

    fn store_in_tempdir(content: &str) -> (tempfile::TempDir, VersionStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versions.toml");
        fs::write(&path, content).unwrap();
        (dir, VersionStore::load(&path).unwrap())
    }

    #[test]
    fn test_load_and_get() {
        let (_dir, store) = store_in_tempdir(FIXTURE);
        assert_eq!(store.get("project").unwrap(), "0.2.0");
        assert_eq!(store.get("node").unwrap(), "24");
        assert!(matches!(
            store.get("missing"),
            Err(VersetError::UnknownKey(_))
        ));
    }

    #[test]
    fn test_kind_lookup() {
        let (_dir, store) = store_in_tempdir(FIXTURE);
        assert_eq!(store.kind_of("python"), VersionKind::Semver);
        assert_eq!(store.kind_of("actions_checkout"), VersionKind::Token);
    }

    #[test]
    fn test_set_validates_kind() {
        let (_dir, mut store) = store_in_tempdir(FIXTURE);
        assert!(matches!(
            store.set("python", "not a version"),
            Err(VersetError::InvalidValueFormat { .. })
        ));
        assert!(matches!(
            store.set("missing", "1.0.0"),
            Err(VersetError::UnknownKey(_))
        ));
        store.set("python", "3.14").unwrap();
        assert_eq!(store.get("python").unwrap(), "3.14");
    }

    #[test]
    fn test_commit_preserves_comments_and_order() {
        let (dir, mut store) = store_in_tempdir(FIXTURE);
        store.set("python", "3.14").unwrap();
        store.commit().unwrap();

        let written = fs::read_to_string(dir.path().join("versions.toml")).unwrap();
        assert!(written.starts_with("# project versions"));
        assert!(written.contains("python = \"3.14\" # runtime"));
        // ordering untouched
        let project_pos = written.find("project =").unwrap();
        let node_pos = written.find("node =").unwrap();
        assert!(project_pos < node_pos);
    }

    #[test]
    fn test_set_without_commit_leaves_file_unchanged() {
        let (dir, mut store) = store_in_tempdir(FIXTURE);
        store.set("node", "26").unwrap();

        let on_disk = fs::read_to_string(dir.path().join("versions.toml")).unwrap();
        assert!(on_disk.contains("node = \"24\""));
    }

    #[test]
    fn test_unreadable_store() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("versions.toml");
        assert!(matches!(
            VersionStore::load(&missing),
            Err(VersetError::StoreUnreadable { .. })
        ));

        fs::write(&missing, "this is not toml [").unwrap();
        assert!(matches!(
            VersionStore::load(&missing),
            Err(VersetError::StoreUnreadable { .. })
        ));

        fs::write(&missing, "[other]\nx = 1\n").unwrap();
        assert!(matches!(
            VersionStore::load(&missing),
            Err(VersetError::StoreUnreadable { .. })
        ));
    }

    #[test]
    fn test_kind_for_undeclared_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("versions.toml");
        fs::write(&path, "[versions]\na = \"1.0.0\"\n\n[kinds]\nb = \"token\"\n").unwrap();
        assert!(matches!(
            VersionStore::load(&path),
            Err(VersetError::RegistryConfig(_))
        ));
    }
}

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, VersetError};
use crate::pattern;
use crate::store::VersionStore;
use crate::version::VersionKind;

/// How a target file is interpreted when locating a version occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetFormat {
    StructuredTable,
    StructuredMapping,
    LinePattern,
    LiteralAssignment,
}

impl TargetFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetFormat::StructuredTable => "structured-table",
            TargetFormat::StructuredMapping => "structured-mapping",
            TargetFormat::LinePattern => "line-pattern",
            TargetFormat::LiteralAssignment => "literal-assignment",
        }
    }
}

/// One declared occurrence of a version key in a target file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetLocator {
    /// File path relative to the project root.
    pub path: PathBuf,
    pub format: TargetFormat,
    /// Dotted key path for structured formats, single-capture-group regex
    /// for line-based formats.
    pub locator: String,
    /// Optional template ({value}, {major}, {minor}, {patch}) applied to the
    /// canonical value before writing.
    #[serde(default)]
    pub render: Option<String>,
    /// Optional 1-based line anchor to disambiguate repeated matches.
    #[serde(default)]
    pub line: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct RegistryDoc {
    #[serde(default)]
    targets: BTreeMap<String, Vec<TargetLocator>>,
}

/// Declarative key→locations registry, read from the `[[targets.*]]`
/// arrays of the store document.
pub struct PatternRegistry {
    targets: BTreeMap<String, Vec<TargetLocator>>,
}

impl PatternRegistry {
    pub fn load<P: AsRef<Path>>(store_path: P) -> Result<Self> {
        let store_path = store_path.as_ref();

        let content = fs::read_to_string(store_path).map_err(|e| VersetError::StoreUnreadable {
            path: store_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let doc: RegistryDoc = toml::from_str(&content)
            .map_err(|e| VersetError::RegistryConfig(e.to_string()))?;

        Ok(Self {
            targets: doc.targets,
        })
    }

    /// Declared locators for a key. Empty for store-only keys.
    pub fn targets_for(&self, key: &str) -> &[TargetLocator] {
        self.targets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every (key, locator) pair, keys in sorted order, locators in
    /// declaration order.
    pub fn all(&self) -> impl Iterator<Item = (&str, &TargetLocator)> {
        self.targets
            .iter()
            .flat_map(|(key, locators)| locators.iter().map(move |l| (key.as_str(), l)))
    }

    /// Static checks against the store: referenced keys exist, paths stay
    /// inside the project, locators are well-formed for their format, render
    /// templates fit the key's kind, and every `*_min` key constrains an
    /// existing semver key.
    pub fn validate(&self, store: &VersionStore) -> Result<()> {
        for (key, locators) in &self.targets {
            if !store.contains(key) {
                return Err(VersetError::RegistryConfig(format!(
                    "targets.{key} does not name a declared version key"
                )));
            }

            for locator in locators {
                validate_path(key, &locator.path)?;
                validate_locator(key, locator)?;

                if let Some(template) = &locator.render {
                    pattern::validate_template(template, store.kind_of(key)).map_err(|msg| {
                        VersetError::RegistryConfig(format!("targets.{key} render: {msg}"))
                    })?;
                }

                if locator.line == Some(0) {
                    return Err(VersetError::RegistryConfig(format!(
                        "targets.{key}: line anchors are 1-based"
                    )));
                }
            }
        }

        for key in store.keys() {
            if let Some(base) = key.strip_suffix("_min") {
                if !store.contains(base) {
                    return Err(VersetError::RegistryConfig(format!(
                        "{key} has no matching base key {base}"
                    )));
                }
                if store.kind_of(base) == VersionKind::Token
                    || store.kind_of(&key) == VersionKind::Token
                {
                    return Err(VersetError::RegistryConfig(format!(
                        "{key}: minimum constraints require semver kind on both keys"
                    )));
                }
            }
        }

        Ok(())
    }
}

fn validate_path(key: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(VersetError::RegistryConfig(format!(
            "targets.{key}: empty path"
        )));
    }
    if path.is_absolute() {
        return Err(VersetError::RegistryConfig(format!(
            "targets.{key}: path {} must be relative to the project root",
            path.display()
        )));
    }
    if path.components().any(|c| matches!(c, Component::ParentDir)) {
        return Err(VersetError::RegistryConfig(format!(
            "targets.{key}: path {} escapes the project root",
            path.display()
        )));
    }
    Ok(())
}

fn validate_locator(key: &str, locator: &TargetLocator) -> Result<()> {
    match locator.format {
        TargetFormat::StructuredTable | TargetFormat::StructuredMapping => {
            if let Err(msg) = pattern::parse_key_path(&locator.locator) {
                return Err(VersetError::RegistryConfig(format!(
                    "targets.{key}: malformed key path {:?}: {msg}",
                    locator.locator
                )));
            }
            if locator.line.is_some() {
                return Err(VersetError::RegistryConfig(format!(
                    "targets.{key}: line anchors only apply to line-based formats"
                )));
            }
        }
        TargetFormat::LinePattern | TargetFormat::LiteralAssignment => {
            let regex = Regex::new(&locator.locator).map_err(|e| {
                VersetError::RegistryConfig(format!("targets.{key}: invalid pattern: {e}"))
            })?;
            // captures_len counts the implicit whole-match group
            if regex.captures_len() != 2 {
                return Err(VersetError::RegistryConfig(format!(
                    "targets.{key}: pattern must have exactly one capture group, has {}",
                    regex.captures_len() - 1
                )));
            }
        }
    }
    Ok(())
}

use toml_edit::{DocumentMut, Item, Table, Value};

use super::{key_path, no_match, Edit, PathSegment};
use crate::error::Result;
use crate::registry::TargetLocator;

/// Replace the string scalar at a dotted key path in a TOML document.
/// Everything else in the document, including comments and ordering,
/// round-trips untouched.
pub(super) fn replace(
    key: &str,
    locator: &TargetLocator,
    content: &str,
    rendered: &str,
) -> Result<Edit> {
    let segments = key_path(key, locator)?;
    let mut doc: DocumentMut = content.parse().map_err(|_| no_match(key, locator))?;

    let leaf = leaf_in_item(doc.as_item_mut(), &segments).ok_or_else(|| no_match(key, locator))?;
    let previous = leaf
        .as_str()
        .ok_or_else(|| no_match(key, locator))?
        .to_string();

    if previous == rendered {
        return Ok(Edit {
            previous,
            content: content.to_string(),
            changed: false,
        });
    }

    let decor = leaf.decor().clone();
    *leaf = Value::from(rendered);
    *leaf.decor_mut() = decor;

    Ok(Edit {
        previous,
        content: doc.to_string(),
        changed: true,
    })
}

pub(super) fn extract(key: &str, locator: &TargetLocator, content: &str) -> Result<String> {
    let segments = key_path(key, locator)?;
    let mut doc: DocumentMut = content.parse().map_err(|_| no_match(key, locator))?;

    leaf_in_item(doc.as_item_mut(), &segments)
        .and_then(|leaf| leaf.as_str())
        .map(str::to_string)
        .ok_or_else(|| no_match(key, locator))
}

fn leaf_in_item<'a>(item: &'a mut Item, segments: &[PathSegment]) -> Option<&'a mut Value> {
    match item {
        Item::Value(value) => leaf_in_value(value, segments),
        Item::Table(table) => leaf_in_table(table, segments),
        Item::ArrayOfTables(tables) => {
            let (PathSegment::Index(idx), rest) = segments.split_first()? else {
                return None;
            };
            leaf_in_table(tables.get_mut(*idx)?, rest)
        }
        Item::None => None,
    }
}

fn leaf_in_table<'a>(table: &'a mut Table, segments: &[PathSegment]) -> Option<&'a mut Value> {
    let (PathSegment::Key(key), rest) = segments.split_first()? else {
        return None;
    };
    leaf_in_item(table.get_mut(key)?, rest)
}

fn leaf_in_value<'a>(value: &'a mut Value, segments: &[PathSegment]) -> Option<&'a mut Value> {
    let Some((first, rest)) = segments.split_first() else {
        return Some(value);
    };
    match (first, value) {
        (PathSegment::Key(key), Value::InlineTable(inline)) => {
            leaf_in_value(inline.get_mut(key)?, rest)
        }
        (PathSegment::Index(idx), Value::Array(array)) => leaf_in_value(array.get_mut(*idx)?, rest),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VersetError;
    use crate::registry::TargetFormat;
    use std::path::PathBuf;

    fn locator(path: &str) -> TargetLocator {
        TargetLocator {
            path: PathBuf::from("Cargo.toml"),
            format: TargetFormat::StructuredTable,
            locator: path.to_string(),
            render: None,
            line: None,
        }
    }

    const MANIFEST: &str = r#"# top comment
[package]
name = "demo"
version = "0.2.0" # keep in sync

[dependencies]
serde = { version = "1.0", features = ["derive"] }

[[bin]]
name = "demo"
path = "src/main.rs"
"#;

    #[test]
    fn test_replace_preserves_document() {
        let edit = replace("project", &locator("package.version"), MANIFEST, "0.3.0").unwrap();
        assert!(edit.changed);
        assert_eq!(edit.previous, "0.2.0");
        assert!(edit.content.starts_with("# top comment"));
        assert!(edit.content.contains("version = \"0.3.0\" # keep in sync"));
        assert!(edit.content.contains("serde = { version = \"1.0\""));
    }

    #[test]
    fn test_replace_inline_table_leaf() {
        let edit = replace(
            "serde",
            &locator("dependencies.serde.version"),
            MANIFEST,
            "1.1",
        )
        .unwrap();
        assert_eq!(edit.previous, "1.0");
        assert!(edit.content.contains("serde = { version = \"1.1\""));
    }

    #[test]
    fn test_replace_array_of_tables() {
        let edit = replace("bin", &locator("bin[0].name"), MANIFEST, "other").unwrap();
        assert_eq!(edit.previous, "demo");
        assert!(edit.content.contains("name = \"other\""));
    }

    #[test]
    fn test_noop_returns_input_unchanged() {
        let edit = replace("project", &locator("package.version"), MANIFEST, "0.2.0").unwrap();
        assert!(!edit.changed);
        assert_eq!(edit.content, MANIFEST);
    }

    #[test]
    fn test_missing_path_is_no_match() {
        let err = replace("project", &locator("package.missing"), MANIFEST, "1").unwrap_err();
        assert!(matches!(err, VersetError::NoMatch { .. }));
    }

    #[test]
    fn test_non_string_leaf_is_no_match() {
        let content = "[package]\nedition = 2024\n";
        let err = replace("edition", &locator("package.edition"), content, "2027").unwrap_err();
        assert!(matches!(err, VersetError::NoMatch { .. }));
    }

    #[test]
    fn test_extract_reads_current_value() {
        let value = extract("project", &locator("package.version"), MANIFEST).unwrap();
        assert_eq!(value, "0.2.0");
    }
}

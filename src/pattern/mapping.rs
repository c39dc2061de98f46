use super::{key_path, no_match, Edit, PathSegment};
use crate::error::Result;
use crate::registry::TargetLocator;

/// Replace the string scalar at a key path in a JSON or YAML mapping,
/// dispatched by file extension. Key order survives the rewrite; YAML
/// comments do not (the document is re-emitted from the parsed tree).
pub(super) fn replace(
    key: &str,
    locator: &TargetLocator,
    content: &str,
    rendered: &str,
) -> Result<Edit> {
    if is_json(locator) {
        replace_json(key, locator, content, rendered)
    } else {
        replace_yaml(key, locator, content, rendered)
    }
}

pub(super) fn extract(key: &str, locator: &TargetLocator, content: &str) -> Result<String> {
    let segments = key_path(key, locator)?;
    if is_json(locator) {
        let mut root: serde_json::Value =
            serde_json::from_str(content).map_err(|_| no_match(key, locator))?;
        json_leaf(&mut root, &segments)
            .and_then(|leaf| leaf.as_str())
            .map(str::to_string)
            .ok_or_else(|| no_match(key, locator))
    } else {
        let mut root: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|_| no_match(key, locator))?;
        yaml_leaf(&mut root, &segments)
            .and_then(|leaf| leaf.as_str())
            .map(str::to_string)
            .ok_or_else(|| no_match(key, locator))
    }
}

fn is_json(locator: &TargetLocator) -> bool {
    locator
        .path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

fn replace_json(
    key: &str,
    locator: &TargetLocator,
    content: &str,
    rendered: &str,
) -> Result<Edit> {
    let segments = key_path(key, locator)?;
    let mut root: serde_json::Value =
        serde_json::from_str(content).map_err(|_| no_match(key, locator))?;

    let leaf = json_leaf(&mut root, &segments).ok_or_else(|| no_match(key, locator))?;
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

    *leaf = serde_json::Value::String(rendered.to_string());

    let mut out = serde_json::to_string_pretty(&root)?;
    if content.ends_with('\n') {
        out.push('\n');
    }

    Ok(Edit {
        previous,
        content: out,
        changed: true,
    })
}

fn replace_yaml(
    key: &str,
    locator: &TargetLocator,
    content: &str,
    rendered: &str,
) -> Result<Edit> {
    let segments = key_path(key, locator)?;
    let mut root: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|_| no_match(key, locator))?;

    let leaf = yaml_leaf(&mut root, &segments).ok_or_else(|| no_match(key, locator))?;
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

    *leaf = serde_yaml::Value::String(rendered.to_string());

    Ok(Edit {
        previous,
        content: serde_yaml::to_string(&root)?,
        changed: true,
    })
}

fn json_leaf<'a>(
    root: &'a mut serde_json::Value,
    segments: &[PathSegment],
) -> Option<&'a mut serde_json::Value> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            PathSegment::Key(key) => current.get_mut(key.as_str())?,
            PathSegment::Index(idx) => current.get_mut(*idx)?,
        };
    }
    Some(current)
}

fn yaml_leaf<'a>(
    root: &'a mut serde_yaml::Value,
    segments: &[PathSegment],
) -> Option<&'a mut serde_yaml::Value> {
    let mut current = root;
    for segment in segments {
        current = match segment {
            PathSegment::Key(key) => current.get_mut(key.as_str())?,
            PathSegment::Index(idx) => current.get_mut(*idx)?,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VersetError;
    use crate::registry::TargetFormat;
    use std::path::PathBuf;

    fn locator(file: &str, path: &str) -> TargetLocator {
        TargetLocator {
            path: PathBuf::from(file),
            format: TargetFormat::StructuredMapping,
            locator: path.to_string(),
            render: None,
            line: None,
        }
    }

    const PACKAGE_JSON: &str = r#"{
  "name": "demo",
  "version": "0.2.0",
  "engines": {
    "node": ">=24"
  }
}
"#;

    const WORKFLOW_YAML: &str = r#"name: ci
jobs:
  build:
    steps:
      - uses: actions/checkout@v4
      - name: setup
        with:
          node-version: "24"
"#;

    #[test]
    fn test_json_replace_preserves_key_order() {
        let loc = locator("package.json", "version");
        let edit = replace("project", &loc, PACKAGE_JSON, "0.3.0").unwrap();
        assert!(edit.changed);
        assert_eq!(edit.previous, "0.2.0");

        let name_pos = edit.content.find("\"name\"").unwrap();
        let version_pos = edit.content.find("\"version\"").unwrap();
        let engines_pos = edit.content.find("\"engines\"").unwrap();
        assert!(name_pos < version_pos && version_pos < engines_pos);
        assert!(edit.content.contains("\"version\": \"0.3.0\""));
        assert!(edit.content.ends_with('\n'));
    }

    #[test]
    fn test_yaml_replace_nested_with_index() {
        let loc = locator("ci.yml", "jobs.build.steps[1].with.node-version");
        let edit = replace("node", &loc, WORKFLOW_YAML, "26").unwrap();
        assert!(edit.changed);
        assert_eq!(edit.previous, "24");
        assert!(edit.content.contains("node-version: '26'"));
        // sibling keys untouched, order kept
        assert!(edit.content.contains("uses: actions/checkout@v4"));
        let name_pos = edit.content.find("name: ci").unwrap();
        let jobs_pos = edit.content.find("jobs:").unwrap();
        assert!(name_pos < jobs_pos);
    }

    #[test]
    fn test_noop_keeps_content_byte_identical() {
        let loc = locator("package.json", "version");
        let edit = replace("project", &loc, PACKAGE_JSON, "0.2.0").unwrap();
        assert!(!edit.changed);
        assert_eq!(edit.content, PACKAGE_JSON);
    }

    #[test]
    fn test_missing_key_is_no_match() {
        let loc = locator("package.json", "missing.version");
        assert!(matches!(
            replace("project", &loc, PACKAGE_JSON, "1").unwrap_err(),
            VersetError::NoMatch { .. }
        ));
    }

    #[test]
    fn test_non_string_leaf_is_no_match() {
        let loc = locator("data.json", "count");
        assert!(matches!(
            replace("count", &loc, "{\"count\": 3}", "4").unwrap_err(),
            VersetError::NoMatch { .. }
        ));
    }

    #[test]
    fn test_extract_from_yaml() {
        let loc = locator("ci.yml", "jobs.build.steps[1].with.node-version");
        assert_eq!(extract("node", &loc, WORKFLOW_YAML).unwrap(), "24");
    }
}

// Format handlers for locating and replacing version occurrences.
//
// Each handler owns one target format. They share the same contract:
// locate exactly one occurrence, replace only the located scalar, and
// detect no-ops before rewriting so an already-updated file comes back
// byte-identical.

mod line;
mod mapping;
mod table;

use crate::error::{Result, VersetError};
use crate::registry::{TargetFormat, TargetLocator};
use crate::version::{VersionKind, VersionValue};

/// Outcome of one locate-and-replace over a file's content.
#[derive(Debug, Clone)]
pub struct Edit {
    /// Rendered value found at the location before the edit.
    pub previous: String,
    /// Full file content after the edit. Equal to the input when `changed`
    /// is false.
    pub content: String,
    pub changed: bool,
}

/// Replace the located occurrence with an already-rendered value.
pub fn replace_value(
    key: &str,
    locator: &TargetLocator,
    content: &str,
    rendered: &str,
) -> Result<Edit> {
    match locator.format {
        TargetFormat::StructuredTable => table::replace(key, locator, content, rendered),
        TargetFormat::StructuredMapping => mapping::replace(key, locator, content, rendered),
        TargetFormat::LinePattern | TargetFormat::LiteralAssignment => {
            line::replace(key, locator, content, rendered)
        }
    }
}

/// Read the currently rendered value at the located occurrence.
pub fn extract_value(key: &str, locator: &TargetLocator, content: &str) -> Result<String> {
    match locator.format {
        TargetFormat::StructuredTable => table::extract(key, locator, content),
        TargetFormat::StructuredMapping => mapping::extract(key, locator, content),
        TargetFormat::LinePattern | TargetFormat::LiteralAssignment => {
            line::extract(key, locator, content)
        }
    }
}

/// Canonical value as it must appear in this target, render template
/// applied when the locator declares one.
pub fn render_value(locator: &TargetLocator, value: &VersionValue) -> Result<String> {
    match &locator.render {
        Some(template) => render_template(template, value),
        None => Ok(value.original.clone()),
    }
}

/// Expand `{value}`, `{major}`, `{minor}`, `{patch}` placeholders.
/// Component placeholders zero-pad values written with fewer components.
pub fn render_template(template: &str, value: &VersionValue) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            out.push(ch);
            continue;
        }

        let mut name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            name.push(c);
        }
        if !closed {
            return Err(VersetError::RegistryConfig(format!(
                "unclosed placeholder in template {template:?}"
            )));
        }

        match name.as_str() {
            "value" => out.push_str(&value.original),
            "major" | "minor" | "patch" => {
                let components =
                    value
                        .release_components()
                        .ok_or_else(|| VersetError::RegistryConfig(format!(
                            "{{{name}}} needs a semver value, got {:?}",
                            value.original
                        )))?;
                let idx = match name.as_str() {
                    "major" => 0,
                    "minor" => 1,
                    _ => 2,
                };
                out.push_str(&components[idx].to_string());
            }
            other => {
                return Err(VersetError::RegistryConfig(format!(
                    "unknown placeholder {{{other}}} in template {template:?}"
                )));
            }
        }
    }

    Ok(out)
}

/// Static template check used at registry load time. Component
/// placeholders require a semver-kind key.
pub fn validate_template(template: &str, kind: VersionKind) -> std::result::Result<(), String> {
    let mut chars = template.chars();

    while let Some(ch) = chars.next() {
        if ch != '{' {
            continue;
        }

        let mut name = String::new();
        let mut closed = false;
        for c in chars.by_ref() {
            if c == '}' {
                closed = true;
                break;
            }
            name.push(c);
        }
        if !closed {
            return Err(format!("unclosed placeholder in {template:?}"));
        }

        match name.as_str() {
            "value" => {}
            "major" | "minor" | "patch" => {
                if kind != VersionKind::Semver {
                    return Err(format!("{{{name}}} requires a semver-kind key"));
                }
            }
            other => return Err(format!("unknown placeholder {{{other}}}")),
        }
    }

    Ok(())
}

/// Key-path segment for the structured formats. `tool.node[0].version`
/// walks two keys with an index between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PathSegment {
    Key(String),
    Index(usize),
}

/// Split a dotted key path into segments. Malformed shapes (`a[x]`,
/// `a[0`, `a[0]b`, empty segments) are rejected instead of walking a
/// silently truncated path.
pub(crate) fn parse_key_path(path: &str) -> std::result::Result<Vec<PathSegment>, String> {
    if path.is_empty() {
        return Err("empty key path".to_string());
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        let (name, indexes) = match part.find('[') {
            Some(open) => part.split_at(open),
            None => (part, ""),
        };
        if name.is_empty() && indexes.is_empty() {
            return Err(format!("empty segment in {path:?}"));
        }
        if !name.is_empty() {
            segments.push(PathSegment::Key(name.to_string()));
        }

        let mut rest = indexes;
        while let Some(tail) = rest.strip_prefix('[') {
            let Some((index, after)) = tail.split_once(']') else {
                return Err(format!("unclosed index in segment {part:?}"));
            };
            let idx = index
                .parse::<usize>()
                .map_err(|_| format!("index {index:?} in segment {part:?} is not a number"))?;
            segments.push(PathSegment::Index(idx));
            rest = after;
        }
        if !rest.is_empty() {
            return Err(format!("unexpected {rest:?} after index in segment {part:?}"));
        }
    }

    Ok(segments)
}

/// Segments for a structured locator, with parse failures mapped onto the
/// configuration error the registry raises at load time.
fn key_path(key: &str, locator: &TargetLocator) -> Result<Vec<PathSegment>> {
    parse_key_path(&locator.locator).map_err(|msg| {
        VersetError::RegistryConfig(format!(
            "{key}: malformed key path {:?}: {msg}",
            locator.locator
        ))
    })
}

pub(crate) fn no_match(key: &str, locator: &TargetLocator) -> VersetError {
    VersetError::NoMatch {
        key: key.to_string(),
        path: locator.path.clone(),
        locator: locator.locator.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn semver(value: &str) -> VersionValue {
        VersionValue::parse(value, VersionKind::Semver).unwrap()
    }

    #[test]
    fn test_render_plain_value() {
        assert_eq!(render_template("{value}", &semver("3.13")).unwrap(), "3.13");
        assert_eq!(
            render_template("v{value}", &semver("1.2.3")).unwrap(),
            "v1.2.3"
        );
    }

    #[test]
    fn test_render_components() {
        assert_eq!(
            render_template("py{major}{minor}", &semver("3.13")).unwrap(),
            "py313"
        );
        assert_eq!(
            render_template("{major}.{minor}.{patch}", &semver("3.13")).unwrap(),
            "3.13.0"
        );
    }

    #[test]
    fn test_render_rejects_bad_templates() {
        assert!(render_template("{nope}", &semver("1.0.0")).is_err());
        assert!(render_template("py{major", &semver("1.0.0")).is_err());

        let token = VersionValue::parse("v4", VersionKind::Token).unwrap();
        assert!(render_template("{major}", &token).is_err());
        assert_eq!(render_template("{value}", &token).unwrap(), "v4");
    }

    #[test]
    fn test_validate_template_kind_rules() {
        assert!(validate_template("py{major}{minor}", VersionKind::Semver).is_ok());
        assert!(validate_template("{value}", VersionKind::Token).is_ok());
        assert!(validate_template("{major}", VersionKind::Token).is_err());
        assert!(validate_template("{bogus}", VersionKind::Semver).is_err());
        assert!(validate_template("{value", VersionKind::Semver).is_err());
    }

    #[test]
    fn test_parse_key_path() {
        assert_eq!(
            parse_key_path("package.version").unwrap(),
            vec![
                PathSegment::Key("package".into()),
                PathSegment::Key("version".into())
            ]
        );
        assert_eq!(
            parse_key_path("jobs.build.steps[2].uses").unwrap(),
            vec![
                PathSegment::Key("jobs".into()),
                PathSegment::Key("build".into()),
                PathSegment::Key("steps".into()),
                PathSegment::Index(2),
                PathSegment::Key("uses".into())
            ]
        );
        // a document whose root is an array starts with a bare index
        assert_eq!(
            parse_key_path("[0].version").unwrap(),
            vec![PathSegment::Index(0), PathSegment::Key("version".into())]
        );
    }

    #[test]
    fn test_malformed_key_paths_rejected() {
        for path in [
            "",
            "a..b",
            ".a",
            "a.",
            "steps[x].uses",
            "steps[]",
            "steps[2",
            "steps[2]x",
        ] {
            assert!(parse_key_path(path).is_err(), "{path:?} should be rejected");
        }
    }
}

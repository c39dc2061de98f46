use regex::Regex;

use super::{no_match, Edit};
use crate::error::{Result, VersetError};
use crate::registry::TargetLocator;

/// Replace capture group 1 of the locator pattern on the unique matching
/// line. Line endings, including a final line without one, pass through
/// unchanged; only the captured span is rewritten.
pub(super) fn replace(
    key: &str,
    locator: &TargetLocator,
    content: &str,
    rendered: &str,
) -> Result<Edit> {
    let regex = compile(key, locator)?;
    let segments: Vec<&str> = content.split_inclusive('\n').collect();
    let target = locate(key, locator, &regex, &segments)?;

    let (body, eol) = split_eol(segments[target]);
    let group = regex
        .captures(body)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| no_match(key, locator))?;
    let previous = group.as_str().to_string();

    if previous == rendered {
        return Ok(Edit {
            previous,
            content: content.to_string(),
            changed: false,
        });
    }

    let mut out = String::with_capacity(content.len());
    for (idx, segment) in segments.iter().enumerate() {
        if idx == target {
            out.push_str(&body[..group.start()]);
            out.push_str(rendered);
            out.push_str(&body[group.end()..]);
            out.push_str(eol);
        } else {
            out.push_str(segment);
        }
    }

    Ok(Edit {
        previous,
        content: out,
        changed: true,
    })
}

pub(super) fn extract(key: &str, locator: &TargetLocator, content: &str) -> Result<String> {
    let regex = compile(key, locator)?;
    let segments: Vec<&str> = content.split_inclusive('\n').collect();
    let target = locate(key, locator, &regex, &segments)?;

    let (body, _) = split_eol(segments[target]);
    regex
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map(|group| group.as_str().to_string())
        .ok_or_else(|| no_match(key, locator))
}

fn compile(key: &str, locator: &TargetLocator) -> Result<Regex> {
    Regex::new(&locator.locator).map_err(|e| {
        VersetError::RegistryConfig(format!("targets.{key}: invalid pattern: {e}"))
    })
}

/// Index of the line to edit. A declared `line` anchor must itself match;
/// without one the pattern must match exactly one line.
fn locate(key: &str, locator: &TargetLocator, regex: &Regex, segments: &[&str]) -> Result<usize> {
    let matches: Vec<usize> = segments
        .iter()
        .enumerate()
        .filter(|(_, segment)| regex.is_match(split_eol(segment).0))
        .map(|(idx, _)| idx)
        .collect();

    if let Some(anchor) = locator.line {
        // anchors are 1-based
        let idx = anchor.checked_sub(1).ok_or_else(|| no_match(key, locator))?;
        if matches.contains(&idx) {
            return Ok(idx);
        }
        return Err(no_match(key, locator));
    }

    match matches.len() {
        0 => Err(no_match(key, locator)),
        1 => Ok(matches[0]),
        count => Err(VersetError::AmbiguousMatch {
            key: key.to_string(),
            path: locator.path.clone(),
            count,
        }),
    }
}

fn split_eol(segment: &str) -> (&str, &str) {
    if let Some(body) = segment.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = segment.strip_suffix('\n') {
        (body, "\n")
    } else {
        (segment, "")
    }
}

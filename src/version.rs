use std::cmp::Ordering;

/// Declared kind of a version key. Keys without an entry in `[kinds]`
/// default to semver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionKind {
    #[default]
    Semver,
    Token,
}

impl VersionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionKind::Semver => "semver",
            VersionKind::Token => "token",
        }
    }
}

/// Which component a bump targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BumpPart {
    Major,
    Minor,
    Patch,
}

impl BumpPart {
    fn index(&self) -> usize {
        match self {
            BumpPart::Major => 0,
            BumpPart::Minor => 1,
            BumpPart::Patch => 2,
        }
    }
}

/// A version value retaining the exact written form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionValue {
    pub original: String,
    pub parsed: ParsedValue,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedValue {
    /// Full three-component form, optionally with pre-release/build.
    Semantic(semver::Version),
    /// One or two numeric components ("24", "3.13").
    Numeric(Vec<u64>),
    /// Opaque token ("v4", "py313"). Not ordered, not bumpable.
    Token(String),
}

impl VersionValue {
    /// Parse a raw value against its declared kind. `None` means the value
    /// does not conform and must be rejected.
    pub fn parse(value: &str, kind: VersionKind) -> Option<Self> {
        let parsed = match kind {
            VersionKind::Token => {
                if value.is_empty() || value.chars().any(char::is_whitespace) {
                    return None;
                }
                ParsedValue::Token(value.to_string())
            }
            VersionKind::Semver => {
                if let Ok(v) = semver::Version::parse(value) {
                    ParsedValue::Semantic(v)
                } else {
                    ParsedValue::Numeric(Self::parse_numeric(value)?)
                }
            }
        };

        Some(VersionValue {
            original: value.to_string(),
            parsed,
        })
    }

    /// One or two dot-separated numeric components. Three components must
    /// go through the full semver grammar instead.
    fn parse_numeric(value: &str) -> Option<Vec<u64>> {
        let parts: Vec<&str> = value.split('.').collect();
        if parts.is_empty() || parts.len() > 2 {
            return None;
        }

        let mut numbers = Vec::new();
        for part in parts {
            if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
                return None;
            }
            numbers.push(part.parse::<u64>().ok()?);
        }
        Some(numbers)
    }

    /// Release components zero-padded to three, pre-release and build
    /// metadata ignored. `None` for token values.
    pub fn release_components(&self) -> Option<[u64; 3]> {
        match &self.parsed {
            ParsedValue::Semantic(v) => Some([v.major, v.minor, v.patch]),
            ParsedValue::Numeric(n) => {
                let mut padded = [0u64; 3];
                for (i, c) in n.iter().enumerate() {
                    padded[i] = *c;
                }
                Some(padded)
            }
            ParsedValue::Token(_) => None,
        }
    }

    /// Compare two values as releases (pre-release ignored). `None` when
    /// either side is a token.
    pub fn release_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.release_components()?.cmp(&other.release_components()?))
    }

    /// Increment one component, reset the lower ones, drop any suffix.
    /// Written precision is preserved; bumping below it extends the form
    /// ("3.13" + patch → "3.13.1"). `None` for token values.
    pub fn bump(&self, part: BumpPart) -> Option<VersionValue> {
        let (mut components, written) = match &self.parsed {
            ParsedValue::Semantic(v) => ([v.major, v.minor, v.patch], 3),
            ParsedValue::Numeric(n) => {
                let mut padded = [0u64; 3];
                for (i, c) in n.iter().enumerate() {
                    padded[i] = *c;
                }
                (padded, n.len())
            }
            ParsedValue::Token(_) => return None,
        };

        let idx = part.index();
        components[idx] += 1;
        for lower in components.iter_mut().skip(idx + 1) {
            *lower = 0;
        }

        let precision = written.max(idx + 1);
        let rendered = components[..precision]
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");

        VersionValue::parse(&rendered, VersionKind::Semver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn semver(value: &str) -> VersionValue {
        VersionValue::parse(value, VersionKind::Semver).unwrap()
    }

    #[test]
    fn test_parse_forms() {
        assert!(matches!(semver("1.2.3").parsed, ParsedValue::Semantic(_)));
        assert!(matches!(semver("3.13").parsed, ParsedValue::Numeric(_)));
        assert!(matches!(semver("24").parsed, ParsedValue::Numeric(_)));
        assert!(matches!(
            semver("2.0.0-rc.1").parsed,
            ParsedValue::Semantic(_)
        ));

        assert!(VersionValue::parse("abc", VersionKind::Semver).is_none());
        assert!(VersionValue::parse("1..2", VersionKind::Semver).is_none());
        assert!(VersionValue::parse("", VersionKind::Semver).is_none());
    }

    #[test]
    fn test_parse_token() {
        let v = VersionValue::parse("v4", VersionKind::Token).unwrap();
        assert!(matches!(v.parsed, ParsedValue::Token(_)));

        assert!(VersionValue::parse("", VersionKind::Token).is_none());
        assert!(VersionValue::parse("v 4", VersionKind::Token).is_none());
    }

    #[test]
    fn test_bump_full_precision() {
        let v = semver("1.9.9");
        assert_eq!(v.bump(BumpPart::Major).unwrap().original, "2.0.0");
        assert_eq!(v.bump(BumpPart::Minor).unwrap().original, "1.10.0");
        assert_eq!(v.bump(BumpPart::Patch).unwrap().original, "1.9.10");
    }

    #[test]
    fn test_bump_partial_precision() {
        assert_eq!(semver("3.13").bump(BumpPart::Minor).unwrap().original, "3.14");
        assert_eq!(
            semver("3.13").bump(BumpPart::Patch).unwrap().original,
            "3.13.1"
        );
        assert_eq!(semver("3.13").bump(BumpPart::Major).unwrap().original, "4.0");
        assert_eq!(semver("24").bump(BumpPart::Major).unwrap().original, "25");
        assert_eq!(semver("24").bump(BumpPart::Minor).unwrap().original, "24.1");
    }

    #[test]
    fn test_bump_drops_suffix() {
        let v = semver("2.0.0-rc.1");
        assert_eq!(v.bump(BumpPart::Patch).unwrap().original, "2.0.1");
        assert_eq!(v.bump(BumpPart::Major).unwrap().original, "3.0.0");
    }

    #[test]
    fn test_bump_refuses_token() {
        let v = VersionValue::parse("v4", VersionKind::Token).unwrap();
        assert!(v.bump(BumpPart::Major).is_none());
    }

    #[test]
    fn test_release_cmp_ignores_prerelease() {
        let a = semver("1.0.0-alpha");
        let b = semver("1.0.0");
        assert_eq!(a.release_cmp(&b), Some(Ordering::Equal));
    }

    #[test]
    fn test_release_cmp_mixed_precision() {
        assert_eq!(
            semver("3.10").release_cmp(&semver("3.11")),
            Some(Ordering::Less)
        );
        assert_eq!(
            semver("24").release_cmp(&semver("22")),
            Some(Ordering::Greater)
        );
        assert_eq!(
            semver("3.11").release_cmp(&semver("3.11.0")),
            Some(Ordering::Equal)
        );
    }
}

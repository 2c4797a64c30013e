//! Lenient semantic version parsing for annotations
//!
//! Script authors write `1.0` or `v2` far more often than full versions, so
//! missing minor and patch components default to zero.

use semver::Version;

/// Parse a version, accepting a `v` prefix and one to three core components
pub fn parse_tolerant(input: &str) -> Option<Version> {
    let trimmed = input.trim();
    let trimmed = trimmed
        .strip_prefix(['v', 'V'])
        .unwrap_or(trimmed);

    let suffix_start = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(suffix_start);

    let components = core.split('.').count();
    let padding = match components {
        1 => ".0.0",
        2 => ".0",
        3 => "",
        _ => return None,
    };
    if core
        .split('.')
        .any(|c| c.is_empty() || !c.bytes().all(|b| b.is_ascii_digit()))
    {
        return None;
    }

    Version::parse(&format!("{}{}{}", core, padding, suffix)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_missing_components() {
        assert_eq!(parse_tolerant("1"), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_tolerant("1.0"), Some(Version::new(1, 0, 0)));
        assert_eq!(parse_tolerant("3.1.21"), Some(Version::new(3, 1, 21)));
    }

    #[test]
    fn accepts_prefix_and_prerelease() {
        assert_eq!(parse_tolerant("v2.3"), Some(Version::new(2, 3, 0)));
        let v = parse_tolerant("1.2-beta.1").unwrap();
        assert_eq!(v.to_string(), "1.2.0-beta.1");
    }

    #[test]
    fn rejects_non_versions() {
        assert_eq!(parse_tolerant("main"), None);
        assert_eq!(parse_tolerant("1.2.3.4"), None);
        assert_eq!(parse_tolerant("1..2"), None);
        assert_eq!(parse_tolerant("a1b2c3d"), None);
        assert_eq!(parse_tolerant(""), None);
    }
}

//! Origin grammar of import annotations
//!
//! Forms are tried in order: `@owner[/repo]`, SCP-style remotes, the legacy
//! `owner/repo` shorthand, URLs with a scheme, and finally local paths.

use crate::import::parser::ParseNotices;
use crate::import::spec::Origin;
use std::path::{Path, PathBuf};

/// Why an origin string was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OriginError {
    /// `~user` names a user without a home directory
    UnknownUser(String),
    /// Home directory of the current user is unknown
    NoHomeDirectory,
    /// Scheme present but the rest is not a valid URI
    MalformedUrl(String),
}

impl std::fmt::Display for OriginError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownUser(user) => write!(f, "cannot get home directory for user {}", user),
            Self::NoHomeDirectory => write!(f, "cannot get home directory"),
            Self::MalformedUrl(url) => write!(f, "malformed URL {}", url),
        }
    }
}

/// Parse the origin part of an annotation
pub fn parse_origin(
    text: &str,
    script_folder: &Path,
    notices: &ParseNotices,
) -> Result<Origin, OriginError> {
    if let Some(rest) = text.strip_prefix('@') {
        if let Some((owner, repo)) = parse_owner_repo(rest, true) {
            return Ok(Origin::RemoteShorthand { owner, repo });
        }
    }

    if is_scp_like(text) {
        return Ok(Origin::ScpLike(text.to_string()));
    }

    if let Some((owner, repo @ Some(_))) = parse_owner_repo(text, false) {
        notices.legacy_shorthand();
        return Ok(Origin::RemoteShorthand { owner, repo });
    }

    if has_uri_scheme(text) {
        if text.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(OriginError::MalformedUrl(text.to_string()));
        }
        return Ok(Origin::RemoteUrl(text.to_string()));
    }

    Ok(Origin::LocalPath {
        path: expand_home(text)?,
        base_dir: script_folder.to_path_buf(),
    })
}

/// `owner[/repo[.git]]`, the repo being mandatory unless `repo_optional`
fn parse_owner_repo(text: &str, repo_optional: bool) -> Option<(String, Option<String>)> {
    let (owner, repo) = match text.split_once('/') {
        Some((owner, repo)) => (owner, Some(repo)),
        None if repo_optional => (text, None),
        None => return None,
    };

    if owner.is_empty() || !owner.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }

    let repo = match repo {
        Some(repo) => {
            let repo = match repo.strip_suffix(".git") {
                Some(stripped) if !stripped.is_empty() => stripped,
                _ => repo,
            };
            if repo.is_empty() || !repo.chars().all(is_repo_char) {
                return None;
            }
            Some(repo.to_string())
        }
        None => None,
    };

    Some((owner.to_string(), repo))
}

fn is_repo_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')
}

/// `user@host:path` with a conservative character set per part
fn is_scp_like(text: &str) -> bool {
    let Some((user, rest)) = text.split_once('@') else {
        return false;
    };
    let Some((host, path)) = rest.split_once(':') else {
        return false;
    };

    !user.is_empty()
        && user.chars().all(|c| c.is_ascii_alphanumeric())
        && !host.is_empty()
        && host.chars().all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
        && !path.is_empty()
        && path
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'))
}

/// RFC 3986 scheme followed by `:`
fn has_uri_scheme(text: &str) -> bool {
    let Some((scheme, _)) = text.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Expand a leading `~` or `~user`
fn expand_home(text: &str) -> Result<PathBuf, OriginError> {
    let Some(rest) = text.strip_prefix('~') else {
        return Ok(PathBuf::from(text));
    };

    let (user, tail) = match rest.find('/') {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };

    let home = if user.is_empty() {
        dirs::home_dir().ok_or(OriginError::NoHomeDirectory)?
    } else {
        home_of(user).ok_or_else(|| OriginError::UnknownUser(user.to_string()))?
    };

    let mut expanded = home.into_os_string();
    expanded.push(tail);
    Ok(PathBuf::from(expanded))
}

fn home_of(user: &str) -> Option<PathBuf> {
    match nix::unistd::User::from_name(user) {
        Ok(Some(user)) => Some(user.dir),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Origin, OriginError> {
        parse_origin(text, Path::new("/scripts"), &ParseNotices::new())
    }

    #[test]
    fn shorthand_with_and_without_repo() {
        assert_eq!(
            parse("@mxcl").unwrap(),
            Origin::RemoteShorthand {
                owner: "mxcl".into(),
                repo: None
            }
        );
        assert_eq!(
            parse("@mxcl/swift-bar.git").unwrap(),
            Origin::RemoteShorthand {
                owner: "mxcl".into(),
                repo: Some("swift-bar".into())
            }
        );
    }

    #[test]
    fn scp_like_is_opaque() {
        let origin = parse("git@github.com:MariusCiocanel/Path.swift.git").unwrap();
        assert_eq!(
            origin,
            Origin::ScpLike("git@github.com:MariusCiocanel/Path.swift.git".into())
        );
    }

    #[test]
    fn legacy_shorthand_notice_is_set_once() {
        let notices = ParseNotices::new();
        assert!(!notices.legacy_shorthand_reported());

        for _ in 0..3 {
            let origin = parse_origin("mxcl/Bar", Path::new("/"), &notices).unwrap();
            assert_eq!(
                origin,
                Origin::RemoteShorthand {
                    owner: "mxcl".into(),
                    repo: Some("Bar".into())
                }
            );
        }
        assert!(notices.legacy_shorthand_reported());
    }

    #[test]
    fn scheme_makes_a_url() {
        assert_eq!(
            parse("ssh://git@github.com/x/swift-sh.git").unwrap(),
            Origin::RemoteUrl("ssh://git@github.com/x/swift-sh.git".into())
        );
        assert!(matches!(
            parse("https://example.com/a b"),
            Err(OriginError::MalformedUrl(_))
        ));
    }

    #[test]
    fn everything_else_is_local() {
        assert_eq!(
            parse("../libs/Foo").unwrap(),
            Origin::LocalPath {
                path: PathBuf::from("../libs/Foo"),
                base_dir: PathBuf::from("/scripts")
            }
        );
    }

    #[test]
    fn tilde_expands_to_home() {
        let home = dirs::home_dir().unwrap();
        let origin = parse("~/pkg").unwrap();
        assert_eq!(origin.local_path(), Some(home.join("pkg")));
    }

    #[test]
    fn unknown_user_is_rejected() {
        assert_eq!(
            parse("~no-such-user-swift-sh-test/pkg"),
            Err(OriginError::UnknownUser("no-such-user-swift-sh-test".into()))
        );
    }
}

//! Dependency specification types produced by the import parser

use semver::Version;
use std::fmt;
use std::path::{Path, PathBuf};

/// Module name of the companion helper library shipped with swift-sh
pub const HELPERS_MODULE: &str = "SwiftSH_Helpers";

/// Owner of the helper library repository
pub const HELPERS_OWNER: &str = "xcode-actions";

/// Repository holding the helper library
pub const HELPERS_REPO: &str = "swift-sh";

/// One dependency declared beside an import statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    /// Module name as written after `import`
    pub import_name: String,
    /// Where the package comes from
    pub origin: Origin,
    /// Which versions are acceptable
    pub constraint: Constraint,
}

/// Where a dependency package is fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    /// Full URL with a scheme (`https://…`, `ssh://…`)
    RemoteUrl(String),
    /// SCP-style remote (`git@host:path`), passed through verbatim
    ScpLike(String),
    /// Package on the local filesystem
    ///
    /// Relative paths are resolved against `base_dir`, the directory of the
    /// script that declared them.
    LocalPath { path: PathBuf, base_dir: PathBuf },
    /// `@owner[/repo]` on the well-known host; repo defaults to the import name
    RemoteShorthand { owner: String, repo: Option<String> },
}

/// Version requirement of a dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// `~> version`
    UpToNextMajor(Version),
    /// `== version` or `== ref`
    Exact(ExactPin),
    /// No operator
    Latest,
}

/// Target of an exact constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExactPin {
    Version(Version),
    /// Branch, tag or commit that is not a semantic version
    Ref(String),
}

impl DependencySpec {
    /// Spec for the helper library, as used by a bare `import SwiftSH_Helpers`
    pub fn helpers(constraint: Constraint) -> Self {
        Self {
            import_name: HELPERS_MODULE.to_string(),
            origin: Origin::RemoteShorthand {
                owner: HELPERS_OWNER.to_string(),
                repo: Some(HELPERS_REPO.to_string()),
            },
            constraint,
        }
    }

    /// Whether the package must be fetched from a remote
    pub fn is_remote(&self) -> bool {
        !matches!(self.origin, Origin::LocalPath { .. })
    }
}

impl Origin {
    /// Absolute (or script-relative) location of a local package
    pub fn local_path(&self) -> Option<PathBuf> {
        match self {
            Self::LocalPath { path, base_dir } => Some(join_lexically(base_dir, path)),
            _ => None,
        }
    }
}

/// Join `path` onto `base`, dropping redundant `.` and trailing separators
///
/// An absolute `path` replaces `base`. `..` components are kept as written.
fn join_lexically(base: &Path, path: &Path) -> PathBuf {
    let normalized: PathBuf = path.components().collect();
    base.join(normalized)
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RemoteUrl(url) => write!(f, "{}", url),
            Self::ScpLike(descr) => write!(f, "{}", descr),
            Self::LocalPath { path, base_dir } => {
                write!(f, "{}", join_lexically(base_dir, path).display())
            }
            Self::RemoteShorthand {
                owner,
                repo: Some(repo),
            } => write!(f, "@{}/{}", owner, repo),
            Self::RemoteShorthand { owner, repo: None } => write!(f, "@{}", owner),
        }
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToNextMajor(v) => write!(f, "~> {}", v),
            Self::Exact(ExactPin::Version(v)) => write!(f, "== {}", v),
            Self::Exact(ExactPin::Ref(r)) => write!(f, "== {}", r),
            Self::Latest => write!(f, "latest"),
        }
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.import_name, self.origin, self.constraint)
    }
}

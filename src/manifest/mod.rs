//! Dependencies package synthesis
//!
//! Turns the ordered list of declared dependencies into the `Package.swift`
//! of a throwaway package whose only purpose is to make the toolchain fetch
//! and build every dependency. The manifest hash keys the cache.

mod platform;

pub use platform::PlatformSpec;

use crate::import::{Constraint, DependencySpec, ExactPin, Origin};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Name of the generated package
pub const PACKAGE_NAME: &str = "SwiftSH_DummyDepsPackage";

/// Library product exposing every dependency
pub const PRODUCT_NAME: &str = "SwiftSH_Deps";

/// Target depending on every dependency product
pub const TARGET_NAME: &str = "SwiftSH_DummyDepsLib";

/// Placeholder source file of the target
pub const PLACEHOLDER_SOURCE: &str = "empty.swift";

/// Manifest file name inside a package directory
pub const MANIFEST_FILE: &str = "Package.swift";

const GITHUB_HTTPS_PREFIX: &str = "https://github.com/";
const GITHUB_SSH_PREFIX: &str = "git@github.com:";

/// Unbounded range used for dependencies without a constraint
const LATEST_RANGE: &str = "Version(0,0,0)...Version(1_000_000,0,0)";

/// Options affecting the rendered manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManifestOptions {
    /// Use `git@github.com:` instead of `https://github.com/` for shorthands
    pub use_ssh_for_github: bool,
    pub platform: PlatformSpec,
}

/// Rendered `Package.swift` and its content hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    content: String,
    hash: String,
}

impl Manifest {
    /// Render the manifest for `specs`, in order
    ///
    /// Pure: identical inputs always give byte-identical output.
    pub fn synthesize(specs: &[DependencySpec], options: &ManifestOptions) -> Self {
        let dependencies = specs
            .iter()
            .map(|spec| package_line(spec, options.use_ssh_for_github))
            .collect::<Vec<_>>()
            .join(",\n\t\t");
        let products = specs
            .iter()
            .map(product_line)
            .collect::<Vec<_>>()
            .join(",\n\t\t\t");

        let content = format!(
            "// swift-tools-version:5.7\n\
             import PackageDescription\n\
             \n\
             \n\
             let package = Package(\n\
             \tname: \"{package}\",\n\
             \tplatforms: {platforms},\n\
             \tproducts: [.library(name: \"{product}\", targets: [\"{target}\"])],\n\
             \tdependencies: [\n\
             \t\t{dependencies}\n\
             \t],\n\
             \ttargets: [\n\
             \t\t.target(name: \"{target}\", dependencies: [\n\
             \t\t\t{products}\n\
             \t\t], path: \".\", sources: [\"{placeholder}\"])\n\
             \t]\n\
             )\n",
            package = PACKAGE_NAME,
            platforms = options.platform,
            product = PRODUCT_NAME,
            target = TARGET_NAME,
            placeholder = PLACEHOLDER_SOURCE,
        );

        let hash = hex::encode(Sha256::digest(content.as_bytes()));
        Self { content, hash }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }

    /// Hex SHA-256 of the content
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Escape a value interpolated in a Swift string literal
///
/// Printable ASCII other than quotes and backslashes is kept; everything else
/// becomes an escape sequence Swift understands.
fn escaped(text: &str) -> String {
    text.chars().flat_map(char::escape_default).collect()
}

fn package_line(spec: &DependencySpec, use_ssh_for_github: bool) -> String {
    match &spec.origin {
        Origin::LocalPath { .. } => {
            let path = spec.origin.local_path().unwrap_or_default();
            format!(
                ".package(path: \"{}\")",
                escaped(&path.to_string_lossy())
            )
        }
        Origin::ScpLike(url) | Origin::RemoteUrl(url) => format!(
            ".package(url: \"{}\", {})",
            escaped(url),
            requirement(&spec.constraint)
        ),
        Origin::RemoteShorthand { owner, repo } => {
            let prefix = if use_ssh_for_github {
                GITHUB_SSH_PREFIX
            } else {
                GITHUB_HTTPS_PREFIX
            };
            format!(
                ".package(url: \"{}{}/{}.git\", {})",
                prefix,
                escaped(owner),
                escaped(repo.as_deref().unwrap_or(&spec.import_name)),
                requirement(&spec.constraint)
            )
        }
    }
}

fn product_line(spec: &DependencySpec) -> String {
    format!(
        ".product(name: \"{}\", package: \"{}\")",
        escaped(&spec.import_name),
        escaped(&product_package(spec))
    )
}

/// Package identity the toolchain derives for a dependency
fn product_package(spec: &DependencySpec) -> String {
    match &spec.origin {
        Origin::LocalPath { path, .. } => path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| spec.import_name.clone()),
        Origin::RemoteUrl(url) => last_component_stem(url),
        Origin::ScpLike(descr) => {
            let path = descr.split_once(':').map_or(descr.as_str(), |(_, path)| path);
            last_component_stem(path)
        }
        Origin::RemoteShorthand { repo, .. } => {
            repo.clone().unwrap_or_else(|| spec.import_name.clone())
        }
    }
}

fn last_component_stem(url: &str) -> String {
    let last = url.trim_end_matches('/').rsplit('/').next().unwrap_or(url);
    Path::new(last)
        .file_stem()
        .map_or_else(|| last.to_string(), |stem| stem.to_string_lossy().into_owned())
}

fn requirement(constraint: &Constraint) -> String {
    match constraint {
        Constraint::UpToNextMajor(version) => {
            format!("from: \"{}\"", escaped(&version.to_string()))
        }
        Constraint::Exact(ExactPin::Version(version)) => {
            format!("revision: \"{}\"", escaped(&version.to_string()))
        }
        Constraint::Exact(ExactPin::Ref(reference)) => {
            format!("revision: \"{}\"", escaped(reference))
        }
        Constraint::Latest => LATEST_RANGE.to_string(),
    }
}

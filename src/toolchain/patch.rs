//! Fix-ups applied to the invocation reported by the toolchain
//!
//! The reported arguments are not always enough to build a script: recent
//! toolchains point `-I` at the parent of the `Modules` directory, binary
//! frameworks need their headers on the include path, and system library
//! targets need the directory of their module map.

use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Apply every fix-up for the package in `package_dir`
pub fn patch_invocation(args: Vec<String>, package_dir: &Path) -> Vec<String> {
    let build_dir = package_dir.join(".build");
    let mut args = prefer_modules_dirs(args);
    args.extend(xcframework_include_paths(&build_dir.join("artifacts")));
    args.extend(system_module_include_paths(&build_dir.join("checkouts")));
    args
}

/// Log when an invocation lacks include, library path or library flags
pub fn check_suspicious(args: &[String]) {
    let has = |prefix: &str| args.iter().any(|arg| arg.starts_with(prefix));
    if !has("-I") || !has("-L") || !has("-l") {
        info!("Suspicious REPL arguments: {}", args.join(" "));
    }
}

/// Replace include paths by their `Modules` subdirectory when it exists
fn prefer_modules_dirs(mut args: Vec<String>) -> Vec<String> {
    let mut idx = 0;
    while idx < args.len() {
        let (path_idx, prefix) = if args[idx] == "-I" {
            idx += 1;
            (idx, "")
        } else if args[idx].starts_with("-I") {
            (idx, "-I")
        } else {
            idx += 1;
            continue;
        };
        idx += 1;

        let Some(arg) = args.get(path_idx) else {
            break;
        };
        let path = arg[prefix.len()..].trim_end_matches('/');
        let modules = format!("{}/Modules", path);
        if Path::new(&modules).is_dir() {
            debug!("Using {} as include path", modules);
            args[path_idx] = format!("{}{}", prefix, modules);
        }
    }
    args
}

/// Header include paths of macOS slices of binary frameworks
fn xcframework_include_paths(artifacts: &Path) -> Vec<String> {
    let mut paths = Vec::new();
    let mut walker = WalkDir::new(artifacts).sort_by_file_name().into_iter();

    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else {
            continue;
        };
        let path = entry.path();
        if !is_macos_xcframework_slice_child(path) {
            continue;
        }

        if path.extension().is_some_and(|ext| ext == "framework") {
            paths.push(format!("-I{}", path.join("Headers").display()));
            walker.skip_current_dir();
        } else if file_name_lowercase(path).as_deref() == Some("headers") {
            paths.push(format!("-I{}", path.display()));
            walker.skip_current_dir();
        }
    }

    if !paths.is_empty() {
        debug!("Binary framework include paths: {:?}", paths);
    }
    paths
}

/// `<name>.xcframework/macos-*/<path>`
fn is_macos_xcframework_slice_child(path: &Path) -> bool {
    let Some(slice) = path.parent() else {
        return false;
    };
    let is_macos = file_name_lowercase(slice).is_some_and(|name| name.starts_with("macos-"));
    let in_xcframework = slice
        .parent()
        .and_then(Path::extension)
        .is_some_and(|ext| ext == "xcframework");
    is_macos && in_xcframework
}

/// Directories of `[system]` module maps in dependency checkouts
fn system_module_include_paths(checkouts: &Path) -> Vec<String> {
    WalkDir::new(checkouts)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| file_name_lowercase(entry.path()).as_deref() == Some("module.modulemap"))
        .filter(|entry| {
            std::fs::read_to_string(entry.path())
                .map(|content| content.contains("[system]"))
                .unwrap_or(false)
        })
        .filter_map(|entry| entry.path().parent().map(PathBuf::from))
        .map(|dir| format!("-I{}", dir.display()))
        .collect()
}

fn file_name_lowercase(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_lowercase())
}

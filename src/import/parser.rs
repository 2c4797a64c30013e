//! Import line parser
//!
//! A line is read in two stages. The outer stage recognizes an `import`
//! statement and extracts the module name and the optional trailing comment.
//! The inner stage splits the comment into an origin and a constraint.

use crate::import::origin::parse_origin;
use crate::import::spec::{Constraint, DependencySpec, ExactPin, HELPERS_MODULE};
use crate::import::version::parse_tolerant;
use semver::Version;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, trace, warn};

/// Declaration kinds allowed between `import` and the module name
const IMPORT_KINDS: [&str; 8] = [
    "class",
    "enum",
    "struct",
    "protocol",
    "typealias",
    "func",
    "let",
    "var",
];

/// Outcome of parsing one source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineParse {
    /// A dependency was declared on this line
    Spec(DependencySpec),
    /// Not an import line, or an import without a dependency annotation
    NoMatch,
    /// An annotated import that could not be turned into a dependency
    Invalid(String),
}

/// One-time notices raised while parsing a script
///
/// Shared by reference across every line of a run so each notice is emitted
/// at most once, whichever line triggers it first.
#[derive(Debug, Default)]
pub struct ParseNotices {
    legacy_shorthand: AtomicBool,
    main_attribute: AtomicBool,
}

impl ParseNotices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report use of the deprecated `owner/repo` form
    pub fn legacy_shorthand(&self) {
        if !self.legacy_shorthand.swap(true, Ordering::Relaxed) {
            warn!(
                "The \"github-username/repo-name\" format is deprecated; please use \"@github-username/repo-name\" instead"
            );
        }
    }

    /// Whether the legacy shorthand notice has been emitted
    pub fn legacy_shorthand_reported(&self) -> bool {
        self.legacy_shorthand.load(Ordering::Relaxed)
    }

    /// Report a probable `@main` attribute in the script
    pub fn main_attribute(&self) {
        if !self.main_attribute.swap(true, Ordering::Relaxed) {
            warn!(
                "Possible @main detected. @main is not supported in scripts, call your main type directly \
                 (for an AsyncParsableCommand: `_ = await Task{{ await YourMainType.main() }}.value`)"
            );
        }
    }
}

/// Inputs shared by every line of one script
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Directory relative local paths are resolved against
    pub script_folder: &'a Path,
    /// Version pinned for a bare helpers import
    pub tool_version: &'a Version,
    pub notices: &'a ParseNotices,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    UpToNextMajor,
    Exact,
}

/// Why an annotated import was dropped
enum Rejection {
    /// Already reported at warn level
    Constraint(String),
    Annotation(String),
}

struct ImportLine<'l> {
    module: &'l str,
    comment: Option<&'l str>,
}

/// Parse one line of a script
///
/// Never fails: anything that is not a well-formed annotated import is
/// reported through the returned variant.
pub fn parse_line(line: &str, ctx: &ParseContext<'_>) -> LineParse {
    let Some(import) = match_import(line) else {
        return LineParse::NoMatch;
    };

    let Some(comment) = import.comment else {
        if import.module == HELPERS_MODULE {
            return LineParse::Spec(DependencySpec::helpers(Constraint::Exact(
                ExactPin::Version(ctx.tool_version.clone()),
            )));
        }
        trace!(module = import.module, "Import without annotation");
        return LineParse::NoMatch;
    };

    match parse_annotation(import.module, comment, ctx) {
        Ok(spec) => {
            trace!(%spec, "Found dependency");
            LineParse::Spec(spec)
        }
        Err(Rejection::Constraint(reason)) => LineParse::Invalid(reason),
        Err(Rejection::Annotation(reason)) => {
            info!(line, reason = %reason, "Dropping import specification");
            LineParse::Invalid(reason)
        }
    }
}

fn is_hspace(c: char) -> bool {
    c.is_whitespace() && !matches!(c, '\n' | '\r' | '\u{0b}' | '\u{0c}')
}

/// Strip `word` and at least one horizontal space after it
fn strip_word<'l>(text: &'l str, word: &str) -> Option<&'l str> {
    let rest = text.strip_prefix(word)?;
    rest.starts_with(is_hspace)
        .then(|| rest.trim_start_matches(is_hspace))
}

fn match_import(line: &str) -> Option<ImportLine<'_>> {
    let rest = line.trim_start_matches(is_hspace);
    let rest = strip_word(rest, "@testable").unwrap_or(rest);
    let mut rest = strip_word(rest, "import")?;

    if let Some(after_kind) = IMPORT_KINDS.iter().find_map(|kind| strip_word(rest, kind)) {
        rest = after_kind;
    }

    let name_len = rest
        .find(|c: char| c == '.' || c == '/' || is_hspace(c))
        .unwrap_or(rest.len());
    if name_len == 0 {
        return None;
    }
    let (module, mut rest) = rest.split_at(name_len);

    // Member imports (`import struct Foo.Bar`); the member may run into the comment.
    if let Some(member) = rest.strip_prefix('.') {
        let member_len = member.find(char::is_whitespace).unwrap_or(member.len());
        if member_len > 0 {
            rest = &member[member_len..];
        }
    }

    Some(ImportLine {
        module,
        comment: comment_body(rest.trim_start_matches(is_hspace)),
    })
}

/// Body of a `// …` or `/* … */` comment, trimmed; empty bodies count as none
fn comment_body(text: &str) -> Option<&str> {
    let body = if let Some(inner) = text.strip_prefix("/*") {
        let end = inner.find("*/")?;
        &inner[..end]
    } else {
        text.strip_prefix("//")?
    };

    let body = body.trim_matches(is_hspace);
    (!body.is_empty()).then_some(body)
}

/// Split a comment body at the first operator followed by a value
fn split_constraint(body: &str) -> (Option<&str>, Option<(Operator, &str)>) {
    for (idx, _) in body.char_indices() {
        let op = if body[idx..].starts_with("~>") {
            Operator::UpToNextMajor
        } else if body[idx..].starts_with("==") {
            Operator::Exact
        } else {
            continue;
        };

        let value = body[idx + 2..].trim_matches(is_hspace);
        if value.is_empty() {
            continue;
        }
        let origin = body[..idx].trim_end_matches(is_hspace);
        return ((!origin.is_empty()).then_some(origin), Some((op, value)));
    }
    (Some(body), None)
}

fn parse_annotation(
    module: &str,
    comment: &str,
    ctx: &ParseContext<'_>,
) -> Result<DependencySpec, Rejection> {
    let (origin, constraint) = split_constraint(comment);

    let constraint = match constraint {
        Some((op, value)) => constraint_from(op, value)?,
        None => Constraint::Latest,
    };

    let Some(origin) = origin else {
        if module == HELPERS_MODULE {
            return Ok(DependencySpec::helpers(constraint));
        }
        return Err(Rejection::Annotation(format!(
            "no origin given for module {}",
            module
        )));
    };

    let origin = parse_origin(origin, ctx.script_folder, ctx.notices)
        .map_err(|e| Rejection::Annotation(e.to_string()))?;

    Ok(DependencySpec {
        import_name: module.to_string(),
        origin,
        constraint,
    })
}

fn constraint_from(op: Operator, value: &str) -> Result<Constraint, Rejection> {
    match (op, parse_tolerant(value)) {
        (Operator::UpToNextMajor, Some(version)) => Ok(Constraint::UpToNextMajor(version)),
        (Operator::Exact, Some(version)) => Ok(Constraint::Exact(ExactPin::Version(version))),
        (Operator::Exact, None) => Ok(Constraint::Exact(ExactPin::Ref(value.to_string()))),
        (Operator::UpToNextMajor, None) => {
            warn!(
                constraint = value,
                "Invalid constraint: \"~>\" requires a version, dropping import specification"
            );
            Err(Rejection::Constraint(format!(
                "\"~>\" requires a version, got {}",
                value
            )))
        }
    }
}

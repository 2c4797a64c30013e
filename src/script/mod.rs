//! Script sources and dependency scanning

pub mod scan;
pub mod source;

pub use scan::{scan_script, ScanOutcome};
pub use source::{ScriptSource, SourceKind, STDIN_SENTINEL};

//! Single pass over a script collecting its dependencies

use crate::error::{SwiftShError, SwiftShResult};
use crate::import::{parse_line, DependencySpec, LineParse, ParseContext};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tracing::trace;

/// Result of scanning a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Declared dependencies, in source order
    pub specs: Vec<DependencySpec>,
    /// Full content, kept when the source cannot be read twice
    pub content: Option<Vec<u8>>,
    /// Hex SHA-256 of the full content
    pub content_hash: String,
}

/// Read `reader` to the end, parsing every line
///
/// Lines that are not valid UTF-8 are hashed and buffered but not parsed.
pub async fn scan_script<R>(
    reader: R,
    ctx: &ParseContext<'_>,
    keep_content: bool,
) -> SwiftShResult<ScanOutcome>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut hasher = Sha256::new();
    let mut content = keep_content.then(Vec::new);
    let mut specs = Vec::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| SwiftShError::io("reading script", e))?;
        if read == 0 {
            break;
        }

        hasher.update(&buf);
        if let Some(content) = content.as_mut() {
            content.extend_from_slice(&buf);
        }

        let Ok(line) = std::str::from_utf8(&buf) else {
            continue;
        };
        let line = line.trim_end_matches(['\n', '\r']);

        if line.split_whitespace().any(|token| token == "@main") {
            ctx.notices.main_attribute();
        }

        trace!("Parsing line: {}", line);
        match parse_line(line, ctx) {
            LineParse::Spec(spec) => specs.push(spec),
            LineParse::NoMatch | LineParse::Invalid(_) => {}
        }
    }

    Ok(ScanOutcome {
        specs,
        content,
        content_hash: hex::encode(hasher.finalize()),
    })
}

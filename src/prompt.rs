//! Interactive operator loop.
//!
//! Reads one identifier per line, looks it up, and prints the result. An
//! empty line (or end of input, or an interrupt at the prompt) ends the loop.
//! Lookup failures are collapsed into a single operator message; `verbose`
//! appends the classified kind.

use std::fmt::Write as _;
use std::future::Future;
use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::lookup::{LookupClient, LookupError};
use crate::models::{Identifier, LookupResult};

pub const BANNER: &str = "Client started. Enter an employee ID (integer) or press Enter to exit.";
pub const PROMPT: &str = "Enter employee ID: ";
pub const INVALID_INPUT_MESSAGE: &str = "Invalid input! Please enter a valid integer.";
pub const SERVER_UNAVAILABLE_MESSAGE: &str = "server is not running. Please try again later";
pub const CANCELLED_MESSAGE: &str = "Lookup cancelled.";
pub const RECORD_DELIMITER: &str = "---";

#[derive(Debug, Clone, Copy, Default)]
pub struct LoopOptions {
    pub verbose: bool,
}

/// What happened during one run of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub lookups: usize,
    pub failures: usize,
    pub invalid_inputs: usize,
}

/// Text shown for a successful lookup.
pub fn render_result(id: Identifier, result: &LookupResult) -> String {
    let mut out = String::new();

    if result.is_empty() {
        let _ = writeln!(out, "No project found for employee ID {}", id);
        return out;
    }

    let _ = writeln!(out, "Project for employee ID {}", id);
    let _ = writeln!(out);
    for record in result {
        let _ = writeln!(out, "ID: {}", record.project_id);
        let _ = writeln!(out, "Title: {}", record.title.as_deref().unwrap_or(""));
        let _ = writeln!(
            out,
            "Description: {}",
            record.description.as_deref().unwrap_or("")
        );
        let _ = writeln!(out, "Position: {}", record.position.as_deref().unwrap_or(""));
        let _ = writeln!(out, "{}", RECORD_DELIMITER);
    }
    out
}

/// Text shown for a failed lookup.
pub fn render_failure(err: &LookupError, verbose: bool) -> String {
    let mut out = match err {
        LookupError::Cancelled => CANCELLED_MESSAGE.to_string(),
        _ => SERVER_UNAVAILABLE_MESSAGE.to_string(),
    };
    if verbose {
        let _ = write!(out, " [{}: {}]", err.kind(), err);
    }
    out.push('\n');
    out
}

/// Run the prompt loop until the operator quits.
///
/// `interrupt` is called to get a fresh interrupt signal for each wait. At
/// the prompt it ends the loop; during a lookup it cancels that lookup.
pub async fn run<R, W, F, C>(
    client: &LookupClient,
    mut input: R,
    output: &mut W,
    options: LoopOptions,
    mut interrupt: F,
) -> io::Result<LoopSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    F: FnMut() -> C,
    C: Future<Output = ()>,
{
    let mut summary = LoopSummary::default();
    let mut buf = Vec::new();

    output.write_all(format!("{}\n", BANNER).as_bytes()).await?;

    loop {
        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        buf.clear();
        let read = tokio::select! {
            read = input.read_until(b'\n', &mut buf) => Some(read?),
            _ = interrupt() => None,
        };

        // EOF and interrupt behave like an empty line.
        if matches!(read, None | Some(0)) {
            break;
        }
        let line = trim_line_ending(&buf);
        if line.is_empty() {
            break;
        }

        let parsed = std::str::from_utf8(line)
            .map_err(|err| err.to_string())
            .and_then(|text| text.parse::<Identifier>().map_err(|err| err.to_string()));
        let id = match parsed {
            Ok(id) => id,
            Err(err) => {
                tracing::debug!(error = %err, "rejected operator input");
                summary.invalid_inputs += 1;
                output
                    .write_all(format!("{}\n", INVALID_INPUT_MESSAGE).as_bytes())
                    .await?;
                continue;
            }
        };

        summary.lookups += 1;
        let rendered = match client.lookup_until(id, interrupt()).await {
            Ok(result) => render_result(id, &result),
            Err(err) => {
                summary.failures += 1;
                render_failure(&err, options.verbose)
            }
        };
        output.write_all(rendered.as_bytes()).await?;
    }

    output.flush().await?;
    Ok(summary)
}

/// Strips a trailing `\n` or `\r\n`.
fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

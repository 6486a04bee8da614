use super::{ReportSink, RunSummary};
use console::style;
use std::io::{self, Write};

/// Where console output goes. Child ranks use stderr because their stdout
/// carries collective traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// Prints the summary always, matches and arrays only in debug mode
#[derive(Debug, Clone)]
pub struct ConsoleSink {
    debug: bool,
    show_arrays: bool,
    stream: Stream,
}

impl ConsoleSink {
    pub fn new(debug: bool, show_arrays: bool) -> Self {
        Self {
            debug,
            show_arrays,
            stream: Stream::Stdout,
        }
    }

    pub fn with_stream(mut self, stream: Stream) -> Self {
        self.stream = stream;
        self
    }

    // One locked write per line keeps interleaved matches from tearing.
    fn write_line(&self, line: &str) {
        let result = match self.stream {
            Stream::Stdout => writeln!(io::stdout().lock(), "{}", line),
            Stream::Stderr => writeln!(io::stderr().lock(), "{}", line),
        };
        if let Err(e) = result {
            tracing::warn!("Failed to write report line: {}", e);
        }
    }
}

impl ReportSink for ConsoleSink {
    fn emit_match(&self, value: i32) {
        if self.debug {
            self.write_line(&format!("Common elements: {}", value));
        }
    }

    fn emit_array(&self, label: &str, values: &[i32]) {
        if !(self.debug && self.show_arrays) {
            return;
        }
        let joined = values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        self.write_line(&format!("{}: {}", label, joined));
    }

    fn emit_summary(&self, summary: &RunSummary) {
        self.write_line(&summary.headline());
        self.write_line(&format!(
            "{} {} common elements",
            style("✔").green(),
            style(summary.report.matches).bold()
        ));
    }
}

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};

use crate::utils;

/// Identifies which process stream produced a line of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
}

/// Captures a single line of process output along with its origin stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamLine {
    pub line: String,
    pub source: StreamSource,
}

impl StreamLine {
    pub fn new<S: Into<String>>(line: S, source: StreamSource) -> Self {
        Self {
            line: line.into(),
            source,
        }
    }

    pub fn stdout<S: Into<String>>(line: S) -> Self {
        Self::new(line, StreamSource::Stdout)
    }

    pub fn stderr<S: Into<String>>(line: S) -> Self {
        Self::new(line, StreamSource::Stderr)
    }

    /// The line with the `[time] [thread/LEVEL]: ` prefix removed.
    pub fn msg(&self) -> &str {
        utils::strip_log_prefix(&self.line)
    }

    pub fn extract_timestamp(&self) -> Option<DateTime<Utc>> {
        utils::extract_timestamp(&self.line)
    }
}

impl Display for StreamLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.line)
    }
}

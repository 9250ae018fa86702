use tracing::debug;

use crate::error::ServerError;

use super::ProcessSupervisor;

/// Commands sent so far, oldest first, with a recall cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandHistory {
    entries: Vec<String>,
    cursor: Option<usize>,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `line` unless it repeats the newest entry. Resets the cursor.
    pub fn record<S: Into<String>>(&mut self, line: S) {
        let line = line.into();
        if self.entries.last() != Some(&line) {
            self.entries.push(line);
        }
        self.cursor = None;
    }

    /// Steps back in time. Stays on the oldest entry once reached.
    pub fn recall_previous(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        let idx = match self.cursor {
            None => self.entries.len() - 1,
            Some(i) => i.saturating_sub(1),
        };
        self.cursor = Some(idx);
        self.entries.get(idx).map(String::as_str)
    }

    /// Steps forward. Moving past the newest entry clears the selection and
    /// yields `None`, i.e. an empty input line.
    pub fn recall_next(&mut self) -> Option<&str> {
        let i = self.cursor?;
        if i + 1 < self.entries.len() {
            self.cursor = Some(i + 1);
            self.entries.get(i + 1).map(String::as_str)
        } else {
            self.cursor = None;
            None
        }
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Operator console for a supervised server.
#[derive(Debug, Clone)]
pub struct CommandChannel {
    supervisor: ProcessSupervisor,
    history: CommandHistory,
}

impl CommandChannel {
    pub fn new(supervisor: ProcessSupervisor) -> Self {
        Self {
            supervisor,
            history: CommandHistory::new(),
        }
    }

    /// Sends `line` to the server. Blank input is ignored.
    pub async fn send(&mut self, line: &str) -> Result<(), ServerError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        self.supervisor.write_line(line).await?;
        debug!(command = line, "command sent");
        self.history.record(line);
        Ok(())
    }

    pub fn recall_previous(&mut self) -> Option<&str> {
        self.history.recall_previous()
    }

    pub fn recall_next(&mut self) -> Option<&str> {
        self.history.recall_next()
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }
}

use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::instance::LifecycleState;

use super::line::StreamLine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    StateChange {
        old: LifecycleState,
        new: LifecycleState,
    },

    StdLine {
        line: StreamLine,
    },

    /// Informational notice from the supervisor, e.g. a process exit.
    Info {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceEvent {
    pub id: Uuid,

    pub timestamp: DateTime<Utc>,

    pub payload: EventPayload,
}

impl InstanceEvent {
    fn with_payload(payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Wraps a line of server output, keeping the server's own clock when the
    /// line carries a `[HH:MM:SS]` stamp.
    pub fn output(line: StreamLine) -> Self {
        let timestamp = line.extract_timestamp().unwrap_or_else(Utc::now);
        Self {
            id: Uuid::new_v4(),
            timestamp,
            payload: EventPayload::StdLine { line },
        }
    }

    pub fn state_change(old: LifecycleState, new: LifecycleState) -> Self {
        Self::with_payload(EventPayload::StateChange { old, new })
    }

    pub fn info<S: Into<String>>(message: S) -> Self {
        Self::with_payload(EventPayload::Info {
            message: message.into(),
        })
    }
}

impl Display for InstanceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            EventPayload::StdLine { line } => write!(f, "{line}"),
            EventPayload::StateChange { old, new } => {
                write!(f, "State changed: {old} -> {new}")
            }
            EventPayload::Info { message } => write!(f, "{message}"),
        }
    }
}

//! # Supervisor ↔ worker IPC messages.
//!
//! Workers talk to the supervisor over their stdio pipes using
//! newline-delimited JSON:
//!
//! ```text
//! worker stdout ──► {"type":"online"}      worker finished initialising
//!               ──► {"type":"disconnect"}  worker asks for graceful removal
//! worker stdin  ◄── {"type":"disconnect"}  supervisor asks worker to drain and exit
//! ```
//!
//! Any stdout line that is not a message is treated as plain worker output.

use serde::{Deserialize, Serialize};

/// Control message exchanged on the stdio pipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IpcMessage {
    /// Worker is ready.
    Online,
    /// Orderly shutdown handshake (either direction).
    Disconnect,
}

impl IpcMessage {
    /// Encodes the message as one line (without the trailing newline).
    pub fn encode(&self) -> String {
        match self {
            IpcMessage::Online => r#"{"type":"online"}"#.to_owned(),
            IpcMessage::Disconnect => r#"{"type":"disconnect"}"#.to_owned(),
        }
    }

    /// Parses a line; `None` for anything that is not a control message.
    pub fn decode(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with('{') {
            return None;
        }
        serde_json::from_str(line).ok()
    }
}

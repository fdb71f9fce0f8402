//! Single-slot outbound command mailbox.
//!
//! The device polls for its next instruction; the controller keeps at
//! most one.  Posting overwrites an undelivered command (last writer
//! wins) and taking clears the slot, so each command is handed out at
//! most once.

use serde::{Deserialize, Serialize};

use super::commands::DeviceCommand;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandMailbox {
    slot: Option<DeviceCommand>,
}

impl CommandMailbox {
    pub const fn new() -> Self {
        Self { slot: None }
    }

    /// Store `command`, replacing anything not yet polled.
    pub fn post(&mut self, command: DeviceCommand) {
        self.slot = Some(command);
    }

    /// Return the pending command and clear the slot.
    pub fn peek_and_clear(&mut self) -> Option<DeviceCommand> {
        self.slot.take()
    }

    /// Look at the pending command without consuming it.
    pub fn peek(&self) -> Option<DeviceCommand> {
        self.slot
    }

    /// Drop any pending command.
    pub fn clear(&mut self) {
        self.slot = None;
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

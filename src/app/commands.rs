//! Commands flowing into and out of the application core.
//!
//! [`OperatorCommand`]s arrive from the operator surface and are
//! interpreted by the [`GuardianService`](super::service::GuardianService).
//! [`DeviceCommand`]s are the instructions the controller leaves in the
//! mailbox for the device to pick up on its next poll.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Operator overrides accepted by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorCommand {
    /// Hold the relay on regardless of presence.
    KeepPower,

    /// Leave forced mode and fall back to presence-driven control.
    CancelForced,

    /// Switch the relay off immediately.
    PowerOff,

    /// Return to a quiescent baseline (liveness untouched).
    Reset,
}

impl OperatorCommand {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::KeepPower => "keep_power",
            Self::CancelForced => "cancel_forced",
            Self::PowerOff => "power_off",
            Self::Reset => "reset",
        }
    }
}

impl fmt::Display for OperatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatorCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "keep_power" => Ok(Self::KeepPower),
            "cancel_forced" => Ok(Self::CancelForced),
            "power_off" => Ok(Self::PowerOff),
            "reset" => Ok(Self::Reset),
            other => Err(UnknownCommand(other.to_owned())),
        }
    }
}

/// Rejection for a command name the controller does not understand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCommand(pub String);

impl fmt::Display for UnknownCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command: {:?}", self.0)
    }
}

impl std::error::Error for UnknownCommand {}

/// Instruction delivered to the device through the mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCommand {
    RelayOn,
    RelayOff,
}

impl DeviceCommand {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RelayOn => "relay_on",
            Self::RelayOff => "relay_off",
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

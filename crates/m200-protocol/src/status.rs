//! Response status byte.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Status byte carried by every response.
///
/// Any byte value may arrive on the wire, so this is a newtype rather than a
/// closed enum. Non-zero does not always mean failure: [`Status::INVENTORY_COMPLETE`]
/// ends an inventory that simply found nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Status(pub u8);

impl Status {
    pub const SUCCESS: Status = Status(0x00);
    pub const PARAMETER_ERROR: Status = Status(0x01);
    pub const COMMAND_FAILED: Status = Status(0x02);
    pub const INVENTORY_COMPLETE: Status = Status(0x12);
    pub const TAG_TIMEOUT: Status = Status(0x14);
    pub const DEMODULATION_ERROR: Status = Status(0x15);
    pub const AUTH_FAILED: Status = Status(0x16);
    pub const WRONG_PASSWORD: Status = Status(0x17);
    pub const NO_MORE_DATA: Status = Status(0xFF);

    #[inline]
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Terminal outcomes that are not errors: the operation ran to completion
    /// without producing data.
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::INVENTORY_COMPLETE | Self::NO_MORE_DATA)
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        self.0
    }

    /// Human readable meaning. Total over all byte values.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self.0 {
            0x00 => "success",
            0x01 => "parameter error",
            0x02 => "command failed",
            0x12 => "inventory complete / no tags",
            0x14 => "tag timeout",
            0x15 => "demodulation error",
            0x16 => "authentication failed",
            0x17 => "wrong password",
            0xFF => "no more data",
            _ => "unknown status",
        }
    }
}

impl From<u8> for Status {
    fn from(value: u8) -> Self {
        Status(value)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "0x{:02X} ({})", self.0, self.description())
    }
}

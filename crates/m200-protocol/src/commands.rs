//! Command code definitions for the M-200 protocol.
//!
//! Every frame carries a big-endian 16-bit command code right after the
//! address byte. Responses echo the code of the command they answer, which is
//! how a synchronous exchange recognizes its reply among unsolicited pushes.
//!
//! ```text
//! CF FF 00 70 00 xx xx
//!       ^^^^^ Command: GetDeviceInfo
//! ```
//!
//! # Command Categories
//!
//! ## Inventory and tag access
//! - `StartInventory` (0x0001), `StopInventory` (0x0002)
//! - `ReadTag` (0x0003), `WriteTag` (0x0004), `SelectTag` (0x0007)
//! - `QueryParams` (0x0059)
//!
//! ## Reader configuration
//! - `ModuleInit` (0x0050), `SetPower` (0x0053), `GetPower` (0x0054)
//! - `GetDeviceInfo` (0x0070), `SetAllParams` (0x0071), `GetAllParams` (0x0072)
//! - `IoParams` (0x0073), `NetworkParams` (0x0074), `RssiFilter` (0x0075)
//!
//! ## Gate hardware
//! - `Gpio` (0x0076), `Relay1` (0x0077), `Relay2` (0x0078)
//! - `GateStatus` (0x0080), `GateParams` (0x0081), `EasMask` (0x0082)
//!
//! # Usage
//!
//! ```
//! use m200_protocol::CommandCode;
//!
//! let cmd = CommandCode::from_u16(0x0070).unwrap();
//! assert_eq!(cmd, CommandCode::GetDeviceInfo);
//! assert_eq!(cmd.as_u16(), 0x0070);
//! assert!(CommandCode::from_u16(0xBEEF).is_none());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Command codes understood by the M-200.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandCode {
    // Inventory and tag access
    StartInventory, // 0x0001
    StopInventory,  // 0x0002
    ReadTag,        // 0x0003
    WriteTag,       // 0x0004
    SelectTag,      // 0x0007
    QueryParams,    // 0x0059

    // Reader configuration
    ModuleInit,    // 0x0050
    SetPower,      // 0x0053
    GetPower,      // 0x0054
    GetDeviceInfo, // 0x0070
    SetAllParams,  // 0x0071
    GetAllParams,  // 0x0072
    IoParams,      // 0x0073
    NetworkParams, // 0x0074
    RssiFilter,    // 0x0075

    // Gate hardware
    Gpio,       // 0x0076
    Relay1,     // 0x0077
    Relay2,     // 0x0078
    GateStatus, // 0x0080
    GateParams, // 0x0081
    EasMask,    // 0x0082
}

impl CommandCode {
    /// Look up a wire code. Unknown codes (for example autonomous device
    /// pushes) return `None`.
    #[must_use]
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0x0001 => Some(Self::StartInventory),
            0x0002 => Some(Self::StopInventory),
            0x0003 => Some(Self::ReadTag),
            0x0004 => Some(Self::WriteTag),
            0x0007 => Some(Self::SelectTag),
            0x0059 => Some(Self::QueryParams),
            0x0050 => Some(Self::ModuleInit),
            0x0053 => Some(Self::SetPower),
            0x0054 => Some(Self::GetPower),
            0x0070 => Some(Self::GetDeviceInfo),
            0x0071 => Some(Self::SetAllParams),
            0x0072 => Some(Self::GetAllParams),
            0x0073 => Some(Self::IoParams),
            0x0074 => Some(Self::NetworkParams),
            0x0075 => Some(Self::RssiFilter),
            0x0076 => Some(Self::Gpio),
            0x0077 => Some(Self::Relay1),
            0x0078 => Some(Self::Relay2),
            0x0080 => Some(Self::GateStatus),
            0x0081 => Some(Self::GateParams),
            0x0082 => Some(Self::EasMask),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::StartInventory => 0x0001,
            Self::StopInventory => 0x0002,
            Self::ReadTag => 0x0003,
            Self::WriteTag => 0x0004,
            Self::SelectTag => 0x0007,
            Self::QueryParams => 0x0059,
            Self::ModuleInit => 0x0050,
            Self::SetPower => 0x0053,
            Self::GetPower => 0x0054,
            Self::GetDeviceInfo => 0x0070,
            Self::SetAllParams => 0x0071,
            Self::GetAllParams => 0x0072,
            Self::IoParams => 0x0073,
            Self::NetworkParams => 0x0074,
            Self::RssiFilter => 0x0075,
            Self::Gpio => 0x0076,
            Self::Relay1 => 0x0077,
            Self::Relay2 => 0x0078,
            Self::GateStatus => 0x0080,
            Self::GateParams => 0x0081,
            Self::EasMask => 0x0082,
        }
    }

    /// Returns `true` for inventory and tag memory commands.
    #[inline]
    #[must_use]
    pub fn is_tag_access(&self) -> bool {
        matches!(
            self,
            Self::StartInventory
                | Self::StopInventory
                | Self::ReadTag
                | Self::WriteTag
                | Self::SelectTag
                | Self::QueryParams
        )
    }

    /// Returns `true` for reader configuration commands.
    #[inline]
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::ModuleInit
                | Self::SetPower
                | Self::GetPower
                | Self::GetDeviceInfo
                | Self::SetAllParams
                | Self::GetAllParams
                | Self::IoParams
                | Self::NetworkParams
                | Self::RssiFilter
        )
    }

    /// Returns `true` for relay, GPIO and gate commands.
    #[inline]
    #[must_use]
    pub fn is_gate(&self) -> bool {
        matches!(
            self,
            Self::Gpio
                | Self::Relay1
                | Self::Relay2
                | Self::GateStatus
                | Self::GateParams
                | Self::EasMask
        )
    }
}

impl From<CommandCode> for u16 {
    fn from(code: CommandCode) -> Self {
        code.as_u16()
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}(0x{:04X})", self, self.as_u16())
    }
}

/// Render any wire code, naming it when it is a known command.
#[must_use]
pub fn describe_code(code: u16) -> String {
    match CommandCode::from_u16(code) {
        Some(known) => known.to_string(),
        None => format!("Unknown(0x{code:04X})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_command_codes() -> Vec<CommandCode> {
        vec![
            CommandCode::StartInventory,
            CommandCode::StopInventory,
            CommandCode::ReadTag,
            CommandCode::WriteTag,
            CommandCode::SelectTag,
            CommandCode::QueryParams,
            CommandCode::ModuleInit,
            CommandCode::SetPower,
            CommandCode::GetPower,
            CommandCode::GetDeviceInfo,
            CommandCode::SetAllParams,
            CommandCode::GetAllParams,
            CommandCode::IoParams,
            CommandCode::NetworkParams,
            CommandCode::RssiFilter,
            CommandCode::Gpio,
            CommandCode::Relay1,
            CommandCode::Relay2,
            CommandCode::GateStatus,
            CommandCode::GateParams,
            CommandCode::EasMask,
        ]
    }

    #[test]
    fn test_wire_codes_resolve_back() {
        for cmd in all_command_codes() {
            assert_eq!(CommandCode::from_u16(cmd.as_u16()), Some(cmd));
        }
    }

    #[test]
    fn test_wire_codes_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for cmd in all_command_codes() {
            assert!(seen.insert(cmd.as_u16()), "duplicate code for {cmd:?}");
        }
        assert_eq!(seen.len(), 21);
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(CommandCode::from_u16(0x0000), None);
        assert_eq!(describe_code(0x1234), "Unknown(0x1234)");
        assert_eq!(describe_code(0x0070), "GetDeviceInfo(0x0070)");
    }

    #[test]
    fn test_display() {
        assert_eq!(CommandCode::StartInventory.to_string(), "StartInventory(0x0001)");
        assert_eq!(CommandCode::Relay2.to_string(), "Relay2(0x0078)");
    }

    #[test]
    fn test_command_categories_are_mutually_exclusive() {
        for cmd in all_command_codes() {
            let count = [cmd.is_tag_access(), cmd.is_configuration(), cmd.is_gate()]
                .iter()
                .filter(|&&x| x)
                .count();
            assert_eq!(count, 1, "Command {cmd:?} belongs to {count} categories");
        }
    }
}

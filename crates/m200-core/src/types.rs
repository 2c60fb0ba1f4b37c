use crate::{Result, error::Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single tag observation from an inventory cycle.
///
/// This is the event handed to persistence and broadcast sinks: one per
/// discovered tag per cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRead {
    /// EPC as uppercase hex.
    pub epc: String,

    /// Received signal strength in dBm (negative).
    pub rssi: i16,

    /// Antenna port the tag was seen on.
    pub antenna_port: u8,

    /// Protocol control word.
    pub pc: u16,

    /// Capture time.
    pub timestamp: DateTime<Utc>,
}

impl TagRead {
    /// Stamp a tag observation with the current time.
    pub fn new(epc: impl Into<String>, rssi: i16, antenna_port: u8, pc: u16) -> Self {
        Self {
            epc: epc.into(),
            rssi,
            antenna_port,
            pc,
            timestamp: Utc::now(),
        }
    }

    /// Replace the capture timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Identification strings reported by the reader.
///
/// The control processor (CP) and the RF module report separately. Fields the
/// device did not send are left empty; `fields_present` counts the leading
/// fields that were actually decoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub cp_hardware_version: String,
    pub cp_firmware_version: String,
    pub cp_serial: String,
    pub module_hardware_version: String,
    pub module_name: String,
    pub module_serial: String,
    pub fields_present: usize,
}

impl DeviceInfo {
    /// Returns `true` when all six fields were present on the wire.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.fields_present == 6
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} (module {} fw {}, serial {})",
            self.module_name, self.module_hardware_version, self.cp_firmware_version, self.cp_serial
        )
    }
}

/// Tag memory bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBank {
    Reserved = 0,
    Epc = 1,
    Tid = 2,
    User = 3,
}

impl MemoryBank {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MemoryBank {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::Reserved),
            1 => Ok(Self::Epc),
            2 => Ok(Self::Tid),
            3 => Ok(Self::User),
            other => Err(Error::invalid_parameter(format!(
                "Memory bank must be 0-3, got {other}"
            ))),
        }
    }
}

impl fmt::Display for MemoryBank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Reserved => "Reserved",
            Self::Epc => "EPC",
            Self::Tid => "TID",
            Self::User => "User",
        };
        f.write_str(name)
    }
}

/// Uppercase hex rendering used for EPCs and wire dumps.
#[must_use]
pub fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// Parse a hex string (whitespace ignored) into bytes.
///
/// # Errors
/// Returns `Error::InvalidParameter` for odd length or non-hex characters.
pub fn hex_to_bytes(hex: &str) -> Result<Vec<u8>> {
    let digits: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return Err(Error::invalid_parameter(format!(
            "Hex string must have an even number of digits, got {}",
            digits.len()
        )));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| Error::invalid_parameter(format!("Invalid hex byte: {}", &digits[i..i + 2])))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_bytes_to_hex() {
        assert_eq!(bytes_to_hex(&[0xE2, 0x00, 0x1a]), "E2001A");
        assert_eq!(bytes_to_hex(&[]), "");
    }

    #[test]
    fn test_hex_to_bytes() {
        assert_eq!(hex_to_bytes("E2 00 1a").unwrap(), vec![0xE2, 0x00, 0x1A]);
        assert!(hex_to_bytes("ABC").is_err());
        assert!(hex_to_bytes("ZZ").is_err());
    }

    #[rstest]
    #[case(0, MemoryBank::Reserved)]
    #[case(1, MemoryBank::Epc)]
    #[case(2, MemoryBank::Tid)]
    #[case(3, MemoryBank::User)]
    fn test_memory_bank_from_u8(#[case] raw: u8, #[case] bank: MemoryBank) {
        assert_eq!(MemoryBank::try_from(raw).unwrap(), bank);
        assert_eq!(bank.as_u8(), raw);
    }

    #[test]
    fn test_memory_bank_out_of_range() {
        assert!(matches!(
            MemoryBank::try_from(4),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_tag_read_serializes_iso8601_timestamp() {
        let ts = DateTime::parse_from_rfc3339("2025-10-05T12:46:06Z")
            .unwrap()
            .with_timezone(&Utc);
        let tag = TagRead::new("E2000017", -58, 1, 0x3000).with_timestamp(ts);

        let json = serde_json::to_value(&tag).unwrap();
        assert_eq!(json["epc"], "E2000017");
        assert_eq!(json["rssi"], -58);
        assert_eq!(json["antenna_port"], 1);
        assert_eq!(json["timestamp"], "2025-10-05T12:46:06Z");
    }

    #[test]
    fn test_device_info_completeness() {
        let info = DeviceInfo {
            fields_present: 6,
            ..Default::default()
        };
        assert!(info.is_complete());
        assert!(!DeviceInfo::default().is_complete());
    }
}

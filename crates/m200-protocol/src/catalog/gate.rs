//! Gate hardware: GPIO, relays, passage counters and EAS alarm mask.

use bytes::{BufMut, BytesMut};
use m200_core::{Error, Result, constants::MAX_EAS_MASK_LEN};
use serde::{Deserialize, Serialize};

use super::{OPTION_GET, OPTION_SET, require_len};
use crate::{Command, CommandCode};

/// Output levels of the GPIO pins, one bit per pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpioState {
    pub levels: u8,
}

impl GpioState {
    /// Whether pin `pin` (0-based) is high.
    pub fn is_high(&self, pin: u8) -> bool {
        pin < 8 && self.levels & (1 << pin) != 0
    }
}

pub fn get_gpio() -> Command {
    Command::fixed(CommandCode::Gpio, vec![OPTION_GET])
}

/// Drive the pins selected by `pin_mask` to the levels in `level_mask`.
pub fn set_gpio(pin_mask: u8, level_mask: u8) -> Command {
    Command::fixed(CommandCode::Gpio, vec![OPTION_SET, pin_mask, level_mask])
}

pub fn parse_gpio(data: &[u8]) -> Result<GpioState> {
    require_len(data, 1, "GPIO")?;
    Ok(GpioState { levels: data[0] })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayAction {
    /// Release (open) the relay.
    Release,
    /// Close the relay, optionally for a limited time.
    Close,
}

impl RelayAction {
    fn as_u8(self) -> u8 {
        match self {
            Self::Release => 0x00,
            Self::Close => 0x01,
        }
    }
}

/// Operate relay 1 or 2. `hold_secs` of 0 keeps the new state until changed.
///
/// # Errors
/// Returns `Error::InvalidParameter` for a relay other than 1 or 2.
pub fn control_relay(relay: u8, action: RelayAction, hold_secs: u8) -> Result<Command> {
    let code = match relay {
        1 => CommandCode::Relay1,
        2 => CommandCode::Relay2,
        other => {
            return Err(Error::invalid_parameter(format!(
                "relay must be 1 or 2, got {other}"
            )));
        }
    };
    Ok(Command::fixed(code, vec![action.as_u8(), hold_secs]))
}

/// Passage counters and infrared beam state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateStatus {
    pub state: u8,
    /// One bit per infrared beam, set while interrupted.
    pub ir_flags: u8,
    pub in_count: u32,
    pub out_count: u32,
}

impl GateStatus {
    pub const WIRE_SIZE: usize = 10;
}

pub fn get_gate_status() -> Command {
    Command::empty(CommandCode::GateStatus)
}

pub fn parse_gate_status(data: &[u8]) -> Result<GateStatus> {
    require_len(data, GateStatus::WIRE_SIZE, "gate status")?;
    Ok(GateStatus {
        state: data[0],
        ir_flags: data[1],
        in_count: u32::from_be_bytes([data[2], data[3], data[4], data[5]]),
        out_count: u32::from_be_bytes([data[6], data[7], data[8], data[9]]),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GateParams {
    pub mode: u8,
    pub alarm_secs: u8,
    pub ir_enabled: bool,
    pub direction_detect: bool,
}

pub fn get_gate_params() -> Command {
    Command::fixed(CommandCode::GateParams, vec![OPTION_GET])
}

pub fn set_gate_params(params: &GateParams) -> Command {
    Command::fixed(
        CommandCode::GateParams,
        vec![
            OPTION_SET,
            params.mode,
            params.alarm_secs,
            u8::from(params.ir_enabled),
            u8::from(params.direction_detect),
        ],
    )
}

pub fn parse_gate_params(data: &[u8]) -> Result<GateParams> {
    require_len(data, 4, "gate params")?;
    Ok(GateParams {
        mode: data[0],
        alarm_secs: data[1],
        ir_enabled: data[2] != 0,
        direction_detect: data[3] != 0,
    })
}

pub fn get_eas_mask() -> Command {
    Command::fixed(CommandCode::EasMask, vec![OPTION_GET])
}

/// Set the EPC prefix that raises the EAS alarm.
///
/// # Errors
/// Returns `Error::InvalidParameter` for masks longer than 62 bytes.
pub fn set_eas_mask(mask: &[u8]) -> Result<Command> {
    if mask.len() > MAX_EAS_MASK_LEN {
        return Err(Error::invalid_parameter(format!(
            "EAS mask must be at most {MAX_EAS_MASK_LEN} bytes, got {}",
            mask.len()
        )));
    }
    let mut buf = BytesMut::with_capacity(2 + mask.len());
    buf.put_u8(OPTION_SET);
    buf.put_u8(mask.len() as u8);
    buf.put_slice(mask);
    Ok(Command::fixed(CommandCode::EasMask, buf.freeze()))
}

/// Parse `len | mask`.
pub fn parse_eas_mask(data: &[u8]) -> Result<Vec<u8>> {
    require_len(data, 1, "EAS mask")?;
    let len = data[0] as usize;
    require_len(data, 1 + len, "EAS mask")?;
    Ok(data[1..1 + len].to_vec())
}

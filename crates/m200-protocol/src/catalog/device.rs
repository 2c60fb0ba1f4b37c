//! Reader identity, RF power and the full parameter block.

use bytes::{BufMut, BytesMut};
use m200_core::{
    DeviceInfo, Error, Result,
    constants::{DEVICE_INFO_FIELDS, MAX_Q_VALUE, MAX_RF_POWER_DBM, MAX_SESSION},
};
use serde::{Deserialize, Serialize};

use super::require_len;
use crate::{Command, CommandCode};

pub fn module_init() -> Command {
    Command::empty(CommandCode::ModuleInit)
}

pub fn get_device_info() -> Command {
    Command::empty(CommandCode::GetDeviceInfo)
}

/// Parse the 152-byte device-info structure.
///
/// Six NUL-padded ASCII fields of 32/32/12/32/32/12 bytes. Short buffers yield
/// only the leading fields that fit completely; this never fails.
pub fn parse_device_info(data: &[u8]) -> DeviceInfo {
    let mut fields: Vec<String> = Vec::with_capacity(DEVICE_INFO_FIELDS.len());
    let mut offset = 0;

    for width in DEVICE_INFO_FIELDS {
        let Some(raw) = data.get(offset..offset + width) else {
            break;
        };
        let text = String::from_utf8_lossy(raw);
        fields.push(
            text.trim_matches(|c: char| c == '\0' || c.is_whitespace())
                .to_string(),
        );
        offset += width;
    }

    let fields_present = fields.len();
    let mut fields = fields.into_iter();
    let mut next = || fields.next().unwrap_or_default();

    DeviceInfo {
        cp_hardware_version: next(),
        cp_firmware_version: next(),
        cp_serial: next(),
        module_hardware_version: next(),
        module_name: next(),
        module_serial: next(),
        fields_present,
    }
}

fn check_power(power_dbm: u8) -> Result<()> {
    if power_dbm > MAX_RF_POWER_DBM {
        return Err(Error::invalid_parameter(format!(
            "RF power must be 0-{MAX_RF_POWER_DBM} dBm, got {power_dbm}"
        )));
    }
    Ok(())
}

/// Set RF output power.
///
/// # Errors
/// Returns `Error::InvalidParameter` when `power_dbm` is above 30.
pub fn set_power(power_dbm: u8) -> Result<Command> {
    check_power(power_dbm)?;
    Ok(Command::fixed(CommandCode::SetPower, vec![power_dbm, 0x00]))
}

pub fn get_power() -> Command {
    Command::empty(CommandCode::GetPower)
}

/// Parse a get-power response.
pub fn parse_power(data: &[u8]) -> Result<u8> {
    require_len(data, 1, "get power")?;
    Ok(data[0])
}

/// The reader's complete parameter block.
///
/// Wire layout (25 bytes): address, protocol, work mode, interface, baud rate,
/// wiegand, antenna mask, region, start frequency integer part (2, BE),
/// start frequency decimal part (2, BE), frequency step (2, BE), channel count,
/// RF power, inquiry area, Q, session, access address, access data length,
/// filter time, trigger time, buzzer time, polling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllParams {
    pub address: u8,
    pub protocol: u8,
    pub work_mode: u8,
    pub interface: u8,
    pub baud_rate: u8,
    pub wiegand: u8,
    pub antenna_mask: u8,
    pub region: u8,
    pub start_freq_int: u16,
    pub start_freq_dec: u16,
    pub freq_step: u16,
    pub channel_count: u8,
    pub power: u8,
    pub inquiry_area: u8,
    pub q_value: u8,
    pub session: u8,
    pub access_address: u8,
    pub access_data_len: u8,
    pub filter_time: u8,
    pub trigger_time: u8,
    pub buzzer_time: u8,
    pub polling_interval: u8,
}

impl AllParams {
    pub const WIRE_SIZE: usize = 25;

    fn validate(&self) -> Result<()> {
        check_power(self.power)?;
        if self.q_value > MAX_Q_VALUE {
            return Err(Error::invalid_parameter(format!(
                "Q must be 0-{MAX_Q_VALUE}, got {}",
                self.q_value
            )));
        }
        if self.session > MAX_SESSION {
            return Err(Error::invalid_parameter(format!(
                "Session must be 0-{MAX_SESSION}, got {}",
                self.session
            )));
        }
        Ok(())
    }

    fn to_bytes(self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(Self::WIRE_SIZE);
        buf.put_slice(&[
            self.address,
            self.protocol,
            self.work_mode,
            self.interface,
            self.baud_rate,
            self.wiegand,
            self.antenna_mask,
            self.region,
        ]);
        buf.put_u16(self.start_freq_int);
        buf.put_u16(self.start_freq_dec);
        buf.put_u16(self.freq_step);
        buf.put_slice(&[
            self.channel_count,
            self.power,
            self.inquiry_area,
            self.q_value,
            self.session,
            self.access_address,
            self.access_data_len,
            self.filter_time,
            self.trigger_time,
            self.buzzer_time,
            self.polling_interval,
        ]);
        buf
    }
}

pub fn get_all_params() -> Command {
    Command::empty(CommandCode::GetAllParams)
}

/// Write the full parameter block.
///
/// # Errors
/// Returns `Error::InvalidParameter` for out-of-range power, Q or session.
pub fn set_all_params(params: &AllParams) -> Result<Command> {
    params.validate()?;
    Ok(Command::fixed(
        CommandCode::SetAllParams,
        params.to_bytes().freeze(),
    ))
}

/// Parse a get-all-params response.
pub fn parse_all_params(data: &[u8]) -> Result<AllParams> {
    require_len(data, AllParams::WIRE_SIZE, "get all params")?;
    let be = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);

    Ok(AllParams {
        address: data[0],
        protocol: data[1],
        work_mode: data[2],
        interface: data[3],
        baud_rate: data[4],
        wiegand: data[5],
        antenna_mask: data[6],
        region: data[7],
        start_freq_int: be(8),
        start_freq_dec: be(10),
        freq_step: be(12),
        channel_count: data[14],
        power: data[15],
        inquiry_area: data[16],
        q_value: data[17],
        session: data[18],
        access_address: data[19],
        access_data_len: data[20],
        filter_time: data[21],
        trigger_time: data[22],
        buzzer_time: data[23],
        polling_interval: data[24],
    })
}

//! Network, I/O and RSSI filter parameters.

use std::net::Ipv4Addr;

use bytes::{BufMut, BytesMut};
use m200_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::{OPTION_GET, OPTION_SET, require_len};
use crate::{Command, CommandCode};

/// TCP/IP settings of the reader's network port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub port: u16,
}

impl NetworkParams {
    pub const WIRE_SIZE: usize = 14;
}

pub fn get_network_params() -> Command {
    Command::fixed(CommandCode::NetworkParams, vec![OPTION_GET])
}

/// Change the reader's IP configuration. Takes effect on the device's next
/// restart on most firmware.
///
/// # Errors
/// Returns `Error::InvalidParameter` for port 0.
pub fn set_network_params(params: &NetworkParams) -> Result<Command> {
    if params.port == 0 {
        return Err(Error::invalid_parameter("network port must be non-zero"));
    }

    let mut buf = BytesMut::with_capacity(1 + NetworkParams::WIRE_SIZE);
    buf.put_u8(OPTION_SET);
    buf.put_slice(&params.ip.octets());
    buf.put_slice(&params.netmask.octets());
    buf.put_slice(&params.gateway.octets());
    buf.put_u16(params.port);
    Ok(Command::fixed(CommandCode::NetworkParams, buf.freeze()))
}

pub fn parse_network_params(data: &[u8]) -> Result<NetworkParams> {
    require_len(data, NetworkParams::WIRE_SIZE, "network params")?;
    let ip = |i: usize| Ipv4Addr::new(data[i], data[i + 1], data[i + 2], data[i + 3]);

    Ok(NetworkParams {
        ip: ip(0),
        netmask: ip(4),
        gateway: ip(8),
        port: u16::from_be_bytes([data[12], data[13]]),
    })
}

/// Trigger input and output behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IoParams {
    pub input_mode: u8,
    pub output_mode: u8,
    /// Output hold time in 100 ms units.
    pub hold_time: u8,
}

pub fn get_io_params() -> Command {
    Command::fixed(CommandCode::IoParams, vec![OPTION_GET])
}

pub fn set_io_params(params: &IoParams) -> Command {
    Command::fixed(
        CommandCode::IoParams,
        vec![
            OPTION_SET,
            params.input_mode,
            params.output_mode,
            params.hold_time,
        ],
    )
}

pub fn parse_io_params(data: &[u8]) -> Result<IoParams> {
    require_len(data, 3, "I/O params")?;
    Ok(IoParams {
        input_mode: data[0],
        output_mode: data[1],
        hold_time: data[2],
    })
}

/// Per-antenna RSSI threshold below which reads are discarded by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RssiFilter {
    pub antenna: u8,
    pub enabled: bool,
    /// Threshold as a positive magnitude, like tag-record RSSI.
    pub threshold: u8,
}

pub fn get_rssi_filter(antenna: u8) -> Command {
    Command::fixed(CommandCode::RssiFilter, vec![OPTION_GET, antenna])
}

pub fn set_rssi_filter(filter: &RssiFilter) -> Command {
    Command::fixed(
        CommandCode::RssiFilter,
        vec![
            OPTION_SET,
            filter.antenna,
            u8::from(filter.enabled),
            filter.threshold,
        ],
    )
}

pub fn parse_rssi_filter(data: &[u8]) -> Result<RssiFilter> {
    require_len(data, 3, "RSSI filter")?;
    Ok(RssiFilter {
        antenna: data[0],
        enabled: data[1] != 0,
        threshold: data[2],
    })
}

//! Tag memory access and Gen2 query parameters.

use bytes::{BufMut, BytesMut};
use m200_core::{
    Error, MemoryBank, Result,
    constants::{MAX_Q_VALUE, MAX_SESSION},
};
use serde::{Deserialize, Serialize};

use super::{OPTION_GET, OPTION_SET, require_len};
use crate::{Command, CommandCode};

/// Highest Gen2 inventory target (A=0, B=1).
const MAX_TARGET: u8 = 1;

/// Address of a word range in tag memory.
///
/// The bank is range-checked when it is converted from a raw byte with
/// `MemoryBank::try_from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMemoryAccess {
    /// Access password, `0` for unprotected tags.
    pub password: u32,
    pub bank: MemoryBank,
    /// Start address in 16-bit words.
    pub word_ptr: u16,
    pub word_count: u8,
}

impl TagMemoryAccess {
    pub fn new(bank: MemoryBank, word_ptr: u16, word_count: u8) -> Self {
        Self {
            password: 0,
            bank,
            word_ptr,
            word_count,
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: u32) -> Self {
        self.password = password;
        self
    }

    fn write_header(&self, buf: &mut BytesMut) -> Result<()> {
        if self.word_count == 0 {
            return Err(Error::invalid_parameter("word count must be at least 1"));
        }
        buf.put_u32(self.password);
        buf.put_u8(self.bank.as_u8());
        buf.put_u16(self.word_ptr);
        buf.put_u8(self.word_count);
        Ok(())
    }
}

/// Read `word_count` words. The response data is the raw memory content.
pub fn read_tag_memory(access: &TagMemoryAccess) -> Result<Command> {
    let mut buf = BytesMut::with_capacity(8);
    access.write_header(&mut buf)?;
    Ok(Command::fixed(CommandCode::ReadTag, buf.freeze()))
}

/// Write `data` into the addressed word range.
///
/// # Errors
/// Returns `Error::InvalidParameter` unless `data` is exactly
/// `2 * word_count` bytes, and `Error::PayloadTooLarge` when the frame would
/// not fit.
pub fn write_tag_memory(access: &TagMemoryAccess, data: &[u8]) -> Result<Command> {
    let expected = 2 * access.word_count as usize;
    if data.len() != expected {
        return Err(Error::invalid_parameter(format!(
            "write of {} words needs {expected} bytes, got {}",
            access.word_count,
            data.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(8 + data.len());
    access.write_header(&mut buf)?;
    buf.put_slice(data);
    Command::new(CommandCode::WriteTag, buf.freeze())
}

/// Singulation mask restricting which tags answer subsequent operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectMask {
    pub bank: MemoryBank,
    /// Start of the mask in bits.
    pub bit_ptr: u16,
    pub bit_len: u8,
    pub mask: Vec<u8>,
}

impl SelectMask {
    /// Match the leading bytes of the EPC, after the CRC and PC words.
    pub fn epc_prefix(prefix: &[u8]) -> Result<Self> {
        let bit_len = u8::try_from(prefix.len() * 8).map_err(|_| {
            Error::invalid_parameter(format!("EPC prefix too long: {} bytes", prefix.len()))
        })?;
        Ok(Self {
            bank: MemoryBank::Epc,
            bit_ptr: 0x20,
            bit_len,
            mask: prefix.to_vec(),
        })
    }
}

/// # Errors
/// Returns `Error::InvalidParameter` when `mask` is shorter than `bit_len`
/// bits.
pub fn select_tag(select: &SelectMask) -> Result<Command> {
    let needed = (select.bit_len as usize).div_ceil(8);
    if select.mask.len() < needed {
        return Err(Error::invalid_parameter(format!(
            "mask of {} bits needs {needed} bytes, got {}",
            select.bit_len,
            select.mask.len()
        )));
    }

    let mut buf = BytesMut::with_capacity(4 + select.mask.len());
    buf.put_u8(select.bank.as_u8());
    buf.put_u16(select.bit_ptr);
    buf.put_u8(select.bit_len);
    buf.put_slice(&select.mask);
    Command::new(CommandCode::SelectTag, buf.freeze())
}

/// Gen2 Query command parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub q: u8,
    pub session: u8,
    pub target: u8,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            q: 4,
            session: 0,
            target: 0,
        }
    }
}

pub fn get_query_params() -> Command {
    Command::fixed(CommandCode::QueryParams, vec![OPTION_GET])
}

/// # Errors
/// Returns `Error::InvalidParameter` for Q above 15, session above 3 or
/// target above 1.
pub fn set_query_params(params: &QueryParams) -> Result<Command> {
    if params.q > MAX_Q_VALUE {
        return Err(Error::invalid_parameter(format!(
            "Q must be 0-{MAX_Q_VALUE}, got {}",
            params.q
        )));
    }
    if params.session > MAX_SESSION {
        return Err(Error::invalid_parameter(format!(
            "session must be 0-{MAX_SESSION}, got {}",
            params.session
        )));
    }
    if params.target > MAX_TARGET {
        return Err(Error::invalid_parameter(format!(
            "target must be 0-{MAX_TARGET}, got {}",
            params.target
        )));
    }

    Ok(Command::fixed(
        CommandCode::QueryParams,
        vec![OPTION_SET, params.q, params.session, params.target],
    ))
}

pub fn parse_query_params(data: &[u8]) -> Result<QueryParams> {
    require_len(data, 3, "query params")?;
    Ok(QueryParams {
        q: data[0],
        session: data[1],
        target: data[2],
    })
}

//! Inventory commands and tag record parsing.
//!
//! A successful inventory response carries zero or more tag records:
//!
//! ```text
//! RSSI(1) | ANT(1) | PC(2,BE) | EPC_LEN(1) | EPC(EPC_LEN)
//! ```
//!
//! RSSI is sent as a positive magnitude and reported here in negative dBm.

use bytes::{BufMut, BytesMut};
use m200_core::{TagRead, bytes_to_hex};
use tracing::debug;

use crate::{Command, CommandCode};

/// Fixed part of a tag record preceding the EPC.
const TAG_RECORD_HEADER: usize = 5;

/// How long an inventory runs before the reader stops on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InventoryMode {
    /// Run for the given time, in the reader's time unit. `0` runs until stopped.
    ByTime(u32),
    /// Run the given number of inventory rounds. `0` runs until stopped.
    ByCycles(u32),
}

impl InventoryMode {
    /// Inventory until an explicit stop.
    pub const CONTINUOUS: InventoryMode = InventoryMode::ByCycles(0);

    fn to_wire(self) -> (u8, u32) {
        match self {
            Self::ByTime(t) => (0x00, t),
            Self::ByCycles(n) => (0x01, n),
        }
    }
}

pub fn start_inventory(mode: InventoryMode) -> Command {
    let (kind, param) = mode.to_wire();
    let mut payload = BytesMut::with_capacity(5);
    payload.put_u8(kind);
    payload.put_u32(param);
    Command::fixed(CommandCode::StartInventory, payload.freeze())
}

/// One bounded inventory round, used for polling.
pub fn single_cycle_inventory() -> Command {
    start_inventory(InventoryMode::ByCycles(1))
}

pub fn stop_inventory() -> Command {
    Command::empty(CommandCode::StopInventory)
}

/// Parse tag records from an inventory response body.
///
/// Records are stamped with the current time. An incomplete trailing record
/// is dropped without error.
pub fn parse_inventory_response(data: &[u8]) -> Vec<TagRead> {
    let mut tags = Vec::new();
    let mut rest = data;

    while rest.len() >= TAG_RECORD_HEADER {
        let epc_len = rest[4] as usize;
        let record_len = TAG_RECORD_HEADER + epc_len;
        if rest.len() < record_len {
            debug!(
                remaining = rest.len(),
                needed = record_len,
                "Dropping truncated tag record"
            );
            break;
        }

        let rssi = -i16::from(rest[0]);
        let antenna = rest[1];
        let pc = u16::from_be_bytes([rest[2], rest[3]]);
        let epc = bytes_to_hex(&rest[TAG_RECORD_HEADER..record_len]);
        tags.push(TagRead::new(epc, rssi, antenna, pc));

        rest = &rest[record_len..];
    }

    tags
}

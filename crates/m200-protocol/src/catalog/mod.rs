//! Named M-200 operations.
//!
//! Each operation is a builder returning a ready [`Command`](crate::Command)
//! plus, where the device answers with data, a parser for the response body.
//! Builders validate their arguments; the frame codec only enforces the
//! 255-byte payload limit.
//!
//! Combined get/set commands share one code and start their payload with an
//! option byte: [`OPTION_SET`] or [`OPTION_GET`].
//!
//! | Module | Operations |
//! |--------|------------|
//! | [`inventory`] | start/stop inventory, tag record parsing |
//! | [`device`] | module init, device info, RF power, all params |
//! | [`network`] | network, I/O, RSSI filter |
//! | [`gate`] | GPIO, relays, gate status/params, EAS mask |
//! | [`tag`] | read/write/select tag memory, query params |

pub mod device;
pub mod gate;
pub mod inventory;
pub mod network;
pub mod tag;

pub use device::{
    AllParams, get_all_params, get_device_info, get_power, module_init, parse_all_params,
    parse_device_info, parse_power, set_all_params, set_power,
};
pub use gate::{
    GateParams, GateStatus, GpioState, RelayAction, control_relay, get_eas_mask,
    get_gate_params, get_gate_status, get_gpio, parse_eas_mask, parse_gate_params,
    parse_gate_status, parse_gpio, set_eas_mask, set_gate_params, set_gpio,
};
pub use inventory::{
    InventoryMode, parse_inventory_response, single_cycle_inventory, start_inventory,
    stop_inventory,
};
pub use network::{
    IoParams, NetworkParams, RssiFilter, get_io_params, get_network_params, get_rssi_filter,
    parse_io_params, parse_network_params, parse_rssi_filter, set_io_params,
    set_network_params, set_rssi_filter,
};
pub use tag::{
    QueryParams, SelectMask, TagMemoryAccess, get_query_params, parse_query_params,
    read_tag_memory, select_tag, set_query_params, write_tag_memory,
};

use m200_core::{Error, Result};

/// Option byte selecting the "set" half of a combined command.
pub const OPTION_SET: u8 = 0x01;

/// Option byte selecting the "get" half of a combined command.
pub const OPTION_GET: u8 = 0x02;

/// Fail unless `data` holds at least `needed` bytes.
pub(crate) fn require_len(data: &[u8], needed: usize, what: &str) -> Result<()> {
    if data.len() < needed {
        return Err(Error::invalid_frame(format!(
            "{what} response needs {needed} bytes, got {}",
            data.len()
        )));
    }
    Ok(())
}

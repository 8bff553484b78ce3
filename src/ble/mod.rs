//! BLE value types shared by the scan core and the radio adapters.
//!
//! Nothing in here talks to a radio.  These are plain `Copy` types that
//! both sides of the port boundary agree on.

pub mod adv_data;

use core::fmt;

// ───────────────────────────────────────────────────────────────
// Well-known identifiers
// ───────────────────────────────────────────────────────────────

/// GATT Battery Service.
pub const BATTERY_SERVICE_UUID: BleUuid = BleUuid::Uuid16(0x180F);

/// Battery Level characteristic (one `u8`, percent).
pub const BATTERY_LEVEL_CHAR_UUID: BleUuid = BleUuid::Uuid16(0x2A19);

/// Bluetooth Base UUID `00000000-0000-1000-8000-00805F9B34FB`.
/// Short UUIDs occupy bits 96..128.
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5F9B_34FB;

// ───────────────────────────────────────────────────────────────
// Address
// ───────────────────────────────────────────────────────────────

/// 48-bit device address in display (most-significant-first) order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BleAddress(pub [u8; 6]);

impl BleAddress {
    /// Build from the little-endian byte order used on the air and by most
    /// HCI-level stacks.
    pub fn from_le_bytes(mut bytes: [u8; 6]) -> Self {
        bytes.reverse();
        Self(bytes)
    }

    /// Bytes in little-endian (over-the-air) order.
    pub fn to_le_bytes(self) -> [u8; 6] {
        let mut bytes = self.0;
        bytes.reverse();
        bytes
    }
}

impl fmt::Display for BleAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Address type as reported with each advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    /// IEEE-assigned, stable across reboots.
    Public,
    /// Static or resolvable/non-resolvable private address.
    Random,
    /// Anything the stack could not map (e.g. RPA with public identity).
    Other,
}

// ───────────────────────────────────────────────────────────────
// UUID
// ───────────────────────────────────────────────────────────────

/// Service or characteristic identifier in whichever width the peer used.
#[derive(Debug, Clone, Copy)]
pub enum BleUuid {
    Uuid16(u16),
    Uuid32(u32),
    Uuid128(u128),
}

impl BleUuid {
    /// Expand to the full 128-bit form via the Bluetooth Base UUID.
    pub const fn to_u128(self) -> u128 {
        match self {
            Self::Uuid16(v) => BASE_UUID | ((v as u128) << 96),
            Self::Uuid32(v) => BASE_UUID | ((v as u128) << 96),
            Self::Uuid128(v) => v,
        }
    }
}

/// UUIDs compare by value, so `0x180F` equals its 128-bit expansion.
impl PartialEq for BleUuid {
    fn eq(&self, other: &Self) -> bool {
        self.to_u128() == other.to_u128()
    }
}

impl Eq for BleUuid {}

impl fmt::Display for BleUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uuid16(v) => write!(f, "0x{:04x}", v),
            Self::Uuid32(v) => write!(f, "0x{:08x}", v),
            Self::Uuid128(v) => {
                let v = *v;
                write!(
                    f,
                    "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
                    (v >> 96) as u32,
                    (v >> 80) as u16,
                    (v >> 64) as u16,
                    (v >> 48) as u16,
                    v & 0xFFFF_FFFF_FFFF
                )
            }
        }
    }
}

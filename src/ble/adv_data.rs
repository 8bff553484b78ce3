//! Advertising-data (AD structure) parser.
//!
//! Bluedroid hands us the raw advertising payload followed by the scan
//! response, back to back.  Each part is a sequence of `len | type | data`
//! structures and is parsed separately into the same [`AdvData`]:
//!
//! ```text
//!  ┌─────┬──────┬──────────────┐┌─────┬──────┬────────┐
//!  │ len │ type │ data[len-1]  ││ len │ type │ ...    │
//!  └─────┴──────┴──────────────┘└─────┴──────┴────────┘
//! ```
//!
//! Parsing is lenient: an unknown type is skipped, and a structure whose
//! length runs past the buffer ends parsing with whatever was collected so
//! far.  A zero length byte is early termination padding.

use std::borrow::Cow;

use super::BleUuid;

const AD_INCOMPLETE_UUID16: u8 = 0x02;
const AD_COMPLETE_UUID16: u8 = 0x03;
const AD_INCOMPLETE_UUID32: u8 = 0x04;
const AD_COMPLETE_UUID32: u8 = 0x05;
const AD_INCOMPLETE_UUID128: u8 = 0x06;
const AD_COMPLETE_UUID128: u8 = 0x07;
const AD_SHORT_NAME: u8 = 0x08;
const AD_COMPLETE_NAME: u8 = 0x09;
const AD_MANUFACTURER_DATA: u8 = 0xFF;

/// Upper bound on service UUIDs kept per advertisement.
pub const MAX_SERVICE_UUIDS: usize = 16;

/// Fields of interest extracted from one advertising + scan-response payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvData<'a> {
    /// Complete name if present, else the shortened name.  Bytes that are
    /// not UTF-8 come through as U+FFFD.
    pub name: Option<Cow<'a, str>>,
    pub service_uuids: heapless::Vec<BleUuid, MAX_SERVICE_UUIDS>,
    /// Manufacturer-specific payload *including* the 2-byte company id.
    pub manufacturer_data: Option<&'a [u8]>,
}

/// Iterator over `(ad_type, data)` pairs.
struct AdStructures<'a> {
    buf: &'a [u8],
}

impl<'a> Iterator for AdStructures<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (&len, rest) = self.buf.split_first()?;
        let len = len as usize;
        if len == 0 || len > rest.len() {
            self.buf = &[];
            return None;
        }
        let (structure, tail) = rest.split_at(len);
        self.buf = tail;
        Some((structure[0], &structure[1..]))
    }
}

/// Parse an advertising payload.  Never fails; missing fields stay `None`.
pub fn parse(payload: &[u8]) -> AdvData<'_> {
    let mut out = AdvData::default();
    parse_into(&mut out, payload);
    out
}

/// Merge the structures of `payload` into `out`.  Fields already set by an
/// earlier payload (advertising data) win over later ones (scan response),
/// except that a complete name replaces a shortened one.
pub fn parse_into<'a>(out: &mut AdvData<'a>, payload: &'a [u8]) {
    for (ad_type, data) in (AdStructures { buf: payload }) {
        match ad_type {
            AD_INCOMPLETE_UUID16 | AD_COMPLETE_UUID16 => {
                for c in data.chunks_exact(2) {
                    push_uuid(out, BleUuid::Uuid16(u16::from_le_bytes([c[0], c[1]])));
                }
            }
            AD_INCOMPLETE_UUID32 | AD_COMPLETE_UUID32 => {
                for c in data.chunks_exact(4) {
                    push_uuid(
                        out,
                        BleUuid::Uuid32(u32::from_le_bytes([c[0], c[1], c[2], c[3]])),
                    );
                }
            }
            AD_INCOMPLETE_UUID128 | AD_COMPLETE_UUID128 => {
                for c in data.chunks_exact(16) {
                    let mut raw = [0u8; 16];
                    raw.copy_from_slice(c);
                    push_uuid(out, BleUuid::Uuid128(u128::from_le_bytes(raw)));
                }
            }
            AD_COMPLETE_NAME => {
                out.name = Some(String::from_utf8_lossy(data));
            }
            AD_SHORT_NAME => {
                if out.name.is_none() {
                    out.name = Some(String::from_utf8_lossy(data));
                }
            }
            AD_MANUFACTURER_DATA => {
                if out.manufacturer_data.is_none() {
                    out.manufacturer_data = Some(data);
                }
            }
            _ => {}
        }
    }
}

fn push_uuid(out: &mut AdvData<'_>, uuid: BleUuid) {
    if out.service_uuids.push(uuid).is_err() {
        log::debug!("BLE: service UUID list full, dropping {}", uuid);
    }
}

//! Advertisement classifier integration tests.
//!
//! Feed raw advertisements through the classifier into a shared registry
//! and check what comes out the other side.

use blescanner::app::classifier::{
    AdvertisementClassifier, MAX_NAME_LEN, ManufacturerId, RawAdvertisement,
};
use blescanner::app::ports::AdvertisementCallbacks;
use blescanner::ble::{AddressKind, BATTERY_SERVICE_UUID, BleAddress, BleUuid, adv_data};

use crate::mock_radio::SharedRegistry;

const ADDR: BleAddress = BleAddress([0xA4, 0xC1, 0x38, 0x01, 0x02, 0x03]);

fn raw<'a>(kind: AddressKind) -> RawAdvertisement<'a> {
    RawAdvertisement {
        address: ADDR,
        address_kind: kind,
        name: None,
        service_uuids: &[],
        manufacturer_data: None,
        rssi: -67,
    }
}

fn run(advs: &[RawAdvertisement<'_>]) -> SharedRegistry {
    let registry = SharedRegistry::new();
    let mut classifier = AdvertisementClassifier::new(registry.clone());
    for a in advs {
        classifier.on_result(a);
    }
    registry
}

#[test]
fn only_public_addresses_reach_registry() {
    let registry = run(&[
        raw(AddressKind::Random),
        raw(AddressKind::Other),
        raw(AddressKind::Public),
    ]);
    let records = registry.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].address_kind, AddressKind::Public);
}

#[test]
fn bare_public_advertisement_gets_defaults() {
    let records = run(&[raw(AddressKind::Public)]).records();
    let r = &records[0];
    assert_eq!(r.address, ADDR);
    assert_eq!(r.name.as_str(), "");
    assert_eq!(r.manufacturer_id, ManufacturerId::UNKNOWN);
    assert_eq!(r.manufacturer_id.0, 0xFFFF);
    assert_eq!(r.rssi, -67);
    assert!(!r.has_battery_service);
}

#[test]
fn every_observation_is_forwarded() {
    let a = raw(AddressKind::Public);
    assert_eq!(run(&[a, a, a]).records().len(), 3);
}

#[test]
fn battery_service_in_any_width() {
    let u16s = [BleUuid::Uuid16(0x1800), BleUuid::Uuid16(0x180F)];
    let u32s = [BleUuid::Uuid32(0x0000_180F)];
    let u128s = [BleUuid::Uuid128(0x0000_180F_0000_1000_8000_0080_5F9B_34FB)];
    let other = [BleUuid::Uuid16(0x180A), BleUuid::Uuid16(0x2A19)];

    let advs = [
        RawAdvertisement {
            service_uuids: &u16s,
            ..raw(AddressKind::Public)
        },
        RawAdvertisement {
            service_uuids: &u32s,
            ..raw(AddressKind::Public)
        },
        RawAdvertisement {
            service_uuids: &u128s,
            ..raw(AddressKind::Public)
        },
        RawAdvertisement {
            service_uuids: &other,
            ..raw(AddressKind::Public)
        },
    ];
    let flags: Vec<bool> = run(&advs)
        .records()
        .iter()
        .map(|r| r.has_battery_service)
        .collect();
    assert_eq!(flags, vec![true, true, true, false]);
}

#[test]
fn manufacturer_id_from_company_bytes() {
    let apple = [0x4C, 0x00, 0x02, 0x15];
    let one_byte = [0x4C];
    let advs = [
        RawAdvertisement {
            manufacturer_data: Some(&apple),
            ..raw(AddressKind::Public)
        },
        RawAdvertisement {
            manufacturer_data: Some(&one_byte),
            ..raw(AddressKind::Public)
        },
    ];
    let records = run(&advs).records();
    assert_eq!(records[0].manufacturer_id, ManufacturerId(0x004C));
    assert!(records[1].manufacturer_id.is_unknown());
}

#[test]
fn long_names_are_truncated() {
    let long = "x".repeat(MAX_NAME_LEN + 10);
    let records = run(&[RawAdvertisement {
        name: Some(&long),
        ..raw(AddressKind::Public)
    }])
    .records();
    assert_eq!(records[0].name.len(), MAX_NAME_LEN);
}

#[test]
fn multibyte_name_cut_on_char_boundary() {
    // 11 three-byte chars = 33 bytes; only 10 fit.
    let name = "€".repeat(11);
    let records = run(&[RawAdvertisement {
        name: Some(&name),
        ..raw(AddressKind::Public)
    }])
    .records();
    assert_eq!(records[0].name.as_str(), "€".repeat(10));
}

#[test]
fn parsed_payload_classifies_end_to_end() {
    let payload = [
        0x02, 0x01, 0x06, // flags
        0x07, 0x09, b'S', b'e', b'n', b's', b'o', b'r', // name
        0x03, 0x02, 0x0F, 0x18, // incomplete 16-bit list: 0x180F
        0x04, 0xFF, 0x59, 0x00, 0xAB, // Nordic
    ];
    let parsed = adv_data::parse(&payload);
    let adv = RawAdvertisement {
        name: parsed.name.as_deref(),
        service_uuids: &parsed.service_uuids,
        manufacturer_data: parsed.manufacturer_data,
        ..raw(AddressKind::Public)
    };

    let records = run(&[adv]).records();
    let r = &records[0];
    assert_eq!(r.name.as_str(), "Sensor");
    assert_eq!(r.manufacturer_id, ManufacturerId(0x0059));
    assert!(r.has_battery_service);
    assert!(parsed.service_uuids.contains(&BATTERY_SERVICE_UUID));
}

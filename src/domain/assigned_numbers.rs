//! Bluetooth SIG assigned numbers
//!
//! Friendly names for the 16-bit UUIDs most peripherals expose, so the
//! service and characteristic lists read as more than raw UUIDs.

use uuid::Uuid;

/// `0000xxxx-0000-1000-8000-00805f9b34fb`
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;
const SHORT_MASK: u128 = 0xffff_ffff << 96;

const SERVICES: &[(u16, &str)] = &[
    (0x1800, "Generic Access"),
    (0x1801, "Generic Attribute"),
    (0x1802, "Immediate Alert"),
    (0x1803, "Link Loss"),
    (0x1804, "Tx Power"),
    (0x1805, "Current Time"),
    (0x180A, "Device Information"),
    (0x180D, "Heart Rate"),
    (0x180F, "Battery"),
    (0x1810, "Blood Pressure"),
    (0x1812, "Human Interface Device"),
    (0x1816, "Cycling Speed and Cadence"),
    (0x181A, "Environmental Sensing"),
    (0x181C, "User Data"),
    (0xFE59, "Nordic DFU"),
];

const CHARACTERISTICS: &[(u16, &str)] = &[
    (0x2A00, "Device Name"),
    (0x2A01, "Appearance"),
    (0x2A04, "Peripheral Preferred Connection Parameters"),
    (0x2A05, "Service Changed"),
    (0x2A06, "Alert Level"),
    (0x2A07, "Tx Power Level"),
    (0x2A19, "Battery Level"),
    (0x2A23, "System ID"),
    (0x2A24, "Model Number String"),
    (0x2A25, "Serial Number String"),
    (0x2A26, "Firmware Revision String"),
    (0x2A27, "Hardware Revision String"),
    (0x2A28, "Software Revision String"),
    (0x2A29, "Manufacturer Name String"),
    (0x2A37, "Heart Rate Measurement"),
    (0x2A38, "Body Sensor Location"),
    (0x2A4D, "Report"),
    (0x2A6E, "Temperature"),
    (0x2A6F, "Humidity"),
    (0x2AA6, "Central Address Resolution"),
];

/// The 16-bit short form, if `uuid` sits on the Bluetooth base UUID
pub fn short_uuid(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    if value & !SHORT_MASK != BASE_UUID {
        return None;
    }
    let short = value >> 96;
    u16::try_from(short).ok()
}

pub fn service_name(uuid: &Uuid) -> Option<&'static str> {
    lookup(SERVICES, uuid)
}

pub fn characteristic_name(uuid: &Uuid) -> Option<&'static str> {
    lookup(CHARACTERISTICS, uuid)
}

fn lookup(table: &[(u16, &'static str)], uuid: &Uuid) -> Option<&'static str> {
    let short = short_uuid(uuid)?;
    table
        .iter()
        .find(|(number, _)| *number == short)
        .map(|(_, name)| *name)
}

/// `0x180F Battery`, `0x1234`, or the full UUID for vendor UUIDs
pub fn describe_service(uuid: &Uuid) -> String {
    describe(uuid, service_name(uuid))
}

pub fn describe_characteristic(uuid: &Uuid) -> String {
    describe(uuid, characteristic_name(uuid))
}

fn describe(uuid: &Uuid, name: Option<&str>) -> String {
    match (short_uuid(uuid), name) {
        (Some(short), Some(name)) => format!("0x{:04X} {}", short, name),
        (Some(short), None) => format!("0x{:04X}", short),
        _ => uuid.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(short: u16) -> Uuid {
        Uuid::from_u128(BASE_UUID | (u128::from(short) << 96))
    }

    #[test]
    fn test_short_uuid() {
        let battery: Uuid = "0000180f-0000-1000-8000-00805f9b34fb".parse().unwrap();
        assert_eq!(short_uuid(&battery), Some(0x180F));
        assert_eq!(battery, sig(0x180F));
    }

    #[test]
    fn test_vendor_uuid_has_no_short_form() {
        let vendor: Uuid = "6e400001-b5a3-f393-e0a9-e50e24dcca9e".parse().unwrap();
        assert_eq!(short_uuid(&vendor), None);
        assert_eq!(describe_service(&vendor), "6e400001-b5a3-f393-e0a9-e50e24dcca9e");
    }

    #[test]
    fn test_32_bit_uuid_is_not_short() {
        let wide = Uuid::from_u128(BASE_UUID | (0x0001_180F_u128 << 96));
        assert_eq!(short_uuid(&wide), None);
        assert_eq!(describe_service(&wide), wide.to_string());
    }

    #[test]
    fn test_names() {
        assert_eq!(service_name(&sig(0x180F)), Some("Battery"));
        assert_eq!(characteristic_name(&sig(0x2A19)), Some("Battery Level"));
        assert_eq!(characteristic_name(&sig(0x180F)), None);
    }

    #[test]
    fn test_describe() {
        assert_eq!(describe_service(&sig(0x180D)), "0x180D Heart Rate");
        assert_eq!(describe_characteristic(&sig(0x2A00)), "0x2A00 Device Name");
        assert_eq!(describe_characteristic(&sig(0xFFF1)), "0xFFF1");
    }
}

//! GATT access
//!
//! Translates btleplug's service tree into domain types and performs
//! read / write / subscribe on the connected peripheral.

use crate::domain::models::{CharacteristicInfo, CharacteristicKey, ServiceInfo, WriteMode};
use crate::infrastructure::bluetooth::error::{BleError, BleResult};
use btleplug::api::{Characteristic, Peripheral as _, Service};
use btleplug::platform::Peripheral;
use tracing::{debug, info};
use uuid::Uuid;

pub fn service_info(service: &Service) -> ServiceInfo {
    ServiceInfo {
        uuid: service.uuid,
        primary: service.primary,
        characteristics: service
            .characteristics
            .iter()
            .map(characteristic_info)
            .collect(),
    }
}

pub fn characteristic_info(characteristic: &Characteristic) -> CharacteristicInfo {
    CharacteristicInfo {
        uuid: characteristic.uuid,
        service_uuid: characteristic.service_uuid,
        properties: characteristic.properties,
        descriptors: characteristic.descriptors.iter().map(|d| d.uuid).collect(),
    }
}

/// Services of a peripheral whose services have been discovered
pub fn services(peripheral: &Peripheral) -> Vec<ServiceInfo> {
    peripheral.services().iter().map(service_info).collect()
}

pub fn service(peripheral: &Peripheral, uuid: Uuid) -> BleResult<ServiceInfo> {
    peripheral
        .services()
        .iter()
        .find(|s| s.uuid == uuid)
        .map(service_info)
        .ok_or(BleError::ServiceNotFound(uuid))
}

/// Owning service of a characteristic, for notifications that only carry the characteristic UUID.
///
/// Takes the first match, so a UUID reused across services is ambiguous here.
/// The notification pump asks the subscription set first.
pub fn service_of(peripheral: &Peripheral, characteristic: Uuid) -> Option<Uuid> {
    peripheral
        .characteristics()
        .iter()
        .find(|c| c.uuid == characteristic)
        .map(|c| c.service_uuid)
}

fn find_characteristic(peripheral: &Peripheral, key: &CharacteristicKey) -> BleResult<Characteristic> {
    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == key.characteristic && c.service_uuid == key.service)
        .ok_or(BleError::CharacteristicNotFound(key.characteristic))
}

pub async fn read(peripheral: &Peripheral, key: &CharacteristicKey) -> BleResult<Vec<u8>> {
    let characteristic = find_characteristic(peripheral, key)?;
    if !characteristic_info(&characteristic).is_readable() {
        return Err(BleError::NotReadable(key.characteristic));
    }

    let value = peripheral.read(&characteristic).await?;
    debug!("Read {} bytes from {}", value.len(), key.characteristic);
    Ok(value)
}

pub async fn write(
    peripheral: &Peripheral,
    key: &CharacteristicKey,
    payload: &[u8],
    mode: WriteMode,
) -> BleResult<()> {
    let characteristic = find_characteristic(peripheral, key)?;
    let write_type = mode
        .resolve(characteristic.properties)
        .ok_or(BleError::NotWritable(key.characteristic))?;

    info!(
        "Writing {} bytes to {} ({:?})",
        payload.len(),
        key.characteristic,
        write_type
    );
    peripheral.write(&characteristic, payload, write_type).await?;
    Ok(())
}

pub async fn set_notify(
    peripheral: &Peripheral,
    key: &CharacteristicKey,
    enabled: bool,
) -> BleResult<()> {
    let characteristic = find_characteristic(peripheral, key)?;
    if !characteristic_info(&characteristic).is_notifiable() {
        return Err(BleError::NotNotifiable(key.characteristic));
    }

    if enabled {
        peripheral.subscribe(&characteristic).await?;
    } else {
        peripheral.unsubscribe(&characteristic).await?;
    }
    debug!(
        "Notifications {} for {}",
        if enabled { "enabled" } else { "disabled" },
        key.characteristic
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use btleplug::api::{CharPropFlags, Descriptor};
    use std::collections::BTreeSet;

    const SERVICE: Uuid = Uuid::from_u128(0x0000_180d_0000_1000_8000_0080_5f9b_34fb);
    const MEASUREMENT: Uuid = Uuid::from_u128(0x0000_2a37_0000_1000_8000_0080_5f9b_34fb);
    const CCCD: Uuid = Uuid::from_u128(0x0000_2902_0000_1000_8000_0080_5f9b_34fb);

    #[test]
    fn test_service_info_conversion() {
        let mut descriptors = BTreeSet::new();
        descriptors.insert(Descriptor {
            uuid: CCCD,
            service_uuid: SERVICE,
            characteristic_uuid: MEASUREMENT,
        });
        let mut characteristics = BTreeSet::new();
        characteristics.insert(Characteristic {
            uuid: MEASUREMENT,
            service_uuid: SERVICE,
            properties: CharPropFlags::NOTIFY,
            descriptors,
        });
        let service = Service {
            uuid: SERVICE,
            primary: true,
            characteristics,
        };

        let info = service_info(&service);
        assert_eq!(info.uuid, SERVICE);
        assert!(info.primary);
        assert_eq!(info.characteristics.len(), 1);

        let c = &info.characteristics[0];
        assert_eq!(c.key().service, SERVICE);
        assert_eq!(c.key().characteristic, MEASUREMENT);
        assert_eq!(c.descriptors, vec![CCCD]);
        assert!(c.is_notifiable());
        assert!(!c.is_readable());
    }
}

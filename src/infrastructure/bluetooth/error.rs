use thiserror::Error;
use uuid::Uuid;

/// Failures of BLE operations issued by the explorer
#[derive(Debug, Error)]
pub enum BleError {
    #[error("no Bluetooth adapter found (index {0})")]
    NoAdapter(usize),

    #[error("device {0} not found, scan again")]
    DeviceNotFound(String),

    #[error("not connected to a device")]
    NotConnected,

    #[error("service {0} not found")]
    ServiceNotFound(Uuid),

    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),

    #[error("characteristic {0} is not readable")]
    NotReadable(Uuid),

    #[error("characteristic {0} is not writable")]
    NotWritable(Uuid),

    #[error("characteristic {0} does not support notifications")]
    NotNotifiable(Uuid),

    #[error("connection timed out after {attempts} attempt(s)")]
    ConnectTimeout { attempts: u32 },

    #[error("invalid scan filter UUID \"{0}\"")]
    InvalidFilter(String),

    #[error(transparent)]
    Btleplug(#[from] btleplug::Error),
}

pub type BleResult<T> = Result<T, BleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let uuid = Uuid::from_u128(0x0000_2a19_0000_1000_8000_0080_5f9b_34fb);
        assert_eq!(
            BleError::NotWritable(uuid).to_string(),
            "characteristic 00002a19-0000-1000-8000-00805f9b34fb is not writable"
        );
        assert_eq!(
            BleError::ConnectTimeout { attempts: 3 }.to_string(),
            "connection timed out after 3 attempt(s)"
        );
        assert_eq!(
            BleError::DeviceNotFound("hci0/dev_00".to_string()).to_string(),
            "device hci0/dev_00 not found, scan again"
        );
    }
}

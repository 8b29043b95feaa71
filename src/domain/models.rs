use btleplug::api::{BDAddr, CharPropFlags, WriteType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A peripheral seen during an LE scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedDevice {
    /// Platform peripheral id, stable for the lifetime of the adapter
    pub id: String,
    pub name: Option<String>,
    pub address: BDAddr,
    pub rssi: Option<i16>,
}

impl ScannedDevice {
    /// List label in the `name (address)` form
    pub fn label(&self) -> String {
        format!(
            "{} ({})",
            self.name.as_deref().unwrap_or("Unknown"),
            self.address
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub service_uuid: Uuid,
    pub properties: CharPropFlags,
    pub descriptors: Vec<Uuid>,
}

impl CharacteristicInfo {
    pub fn key(&self) -> CharacteristicKey {
        CharacteristicKey {
            service: self.service_uuid,
            characteristic: self.uuid,
        }
    }

    pub fn is_readable(&self) -> bool {
        self.properties.contains(CharPropFlags::READ)
    }

    pub fn is_writable(&self) -> bool {
        self.properties
            .intersects(CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE)
    }

    pub fn is_notifiable(&self) -> bool {
        self.properties
            .intersects(CharPropFlags::NOTIFY | CharPropFlags::INDICATE)
    }

    /// Compact property string, e.g. `R,W,N`
    pub fn property_summary(&self) -> String {
        const FLAGS: &[(CharPropFlags, &str)] = &[
            (CharPropFlags::BROADCAST, "B"),
            (CharPropFlags::READ, "R"),
            (CharPropFlags::WRITE_WITHOUT_RESPONSE, "Wn"),
            (CharPropFlags::WRITE, "W"),
            (CharPropFlags::NOTIFY, "N"),
            (CharPropFlags::INDICATE, "I"),
            (CharPropFlags::AUTHENTICATED_SIGNED_WRITES, "S"),
            (CharPropFlags::EXTENDED_PROPERTIES, "E"),
        ];

        FLAGS
            .iter()
            .filter(|(flag, _)| self.properties.contains(*flag))
            .map(|(_, name)| *name)
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: Uuid,
    pub primary: bool,
    pub characteristics: Vec<CharacteristicInfo>,
}

/// Identifies one characteristic of the connected peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharacteristicKey {
    pub service: Uuid,
    pub characteristic: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOrigin {
    Read,
    Notification,
    Written,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicValue {
    pub bytes: Vec<u8>,
    pub origin: ValueOrigin,
}

/// How a write request is sent over the air
///
/// `Auto` prefers write-with-response when the characteristic has both
/// properties, so the peripheral acknowledges each write. Pick
/// `WithoutResponse` to always send write commands, e.g. for devices that
/// only act on unacknowledged writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// With response when the characteristic allows it, otherwise without
    #[default]
    Auto,
    WithResponse,
    WithoutResponse,
}

impl WriteMode {
    /// Pick the write type for a characteristic, or `None` if it is not writable
    pub fn resolve(self, properties: CharPropFlags) -> Option<WriteType> {
        let with = properties.contains(CharPropFlags::WRITE);
        let without = properties.contains(CharPropFlags::WRITE_WITHOUT_RESPONSE);
        if !with && !without {
            return None;
        }

        match self {
            WriteMode::Auto if with => Some(WriteType::WithResponse),
            WriteMode::Auto => Some(WriteType::WithoutResponse),
            WriteMode::WithResponse => Some(WriteType::WithResponse),
            WriteMode::WithoutResponse => Some(WriteType::WithoutResponse),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WriteMode::Auto => "Auto",
            WriteMode::WithResponse => "With response",
            WriteMode::WithoutResponse => "Without response",
        }
    }
}

/// Commands sent from the UI to the Bluetooth worker
#[derive(Debug, Clone)]
pub enum BluetoothCommand {
    StartScan,
    StopScan,
    Connect(String),
    Disconnect,
    DiscoverServices,
    DiscoverServiceDetails(Uuid),
    Read(CharacteristicKey),
    Write {
        key: CharacteristicKey,
        payload: Vec<u8>,
        mode: WriteMode,
    },
    Subscribe(CharacteristicKey),
    Unsubscribe(CharacteristicKey),
}

/// Events sent from the Bluetooth worker to the UI
#[derive(Debug, Clone)]
pub enum AppEvent {
    ScanStarted,
    DeviceFound(ScannedDevice),
    ScanFinished,
    ConnectionStatus(ConnectionStatus),
    ServicesDiscovered(Vec<ServiceInfo>),
    ServiceDetailsDiscovered {
        service: Uuid,
        characteristics: Vec<CharacteristicInfo>,
    },
    CharacteristicValue {
        key: CharacteristicKey,
        value: CharacteristicValue,
    },
    SubscriptionChanged {
        key: CharacteristicKey,
        subscribed: bool,
    },
    LogMessage(StatusMessage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
    pub severity: MessageSeverity,
}

impl StatusMessage {
    pub fn new(message: impl Into<String>, severity: MessageSeverity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    Info,
    Success,
    Warning,
    Error,
}

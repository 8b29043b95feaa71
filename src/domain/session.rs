//! Explorer session state
//!
//! Everything the window shows, independent of egui. The Bluetooth worker
//! reports through [`AppEvent`]s which are folded in with [`ExplorerState::apply`].

use crate::domain::assigned_numbers;
use crate::domain::models::{
    AppEvent, CharacteristicInfo, CharacteristicKey, CharacteristicValue, ConnectionStatus,
    MessageSeverity, ScannedDevice, ServiceInfo, StatusMessage, ValueOrigin,
};
use crate::domain::payload;
use std::collections::{HashMap, HashSet, VecDeque};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    pub message: String,
    pub severity: MessageSeverity,
}

pub struct ExplorerState {
    pub connection_status: ConnectionStatus,
    pub status_message: Option<StatusMessage>,
    pub scan_state: ScanState,

    pub devices: Vec<ScannedDevice>,
    pub selected_device: Option<String>,
    /// Device the current (or pending) connection belongs to
    pub active_device: Option<String>,

    pub services: Vec<ServiceInfo>,
    pub selected_service: Option<Uuid>,
    /// Service whose characteristics are listed
    pub open_service: Option<Uuid>,
    pub characteristics: Vec<CharacteristicInfo>,
    pub selected_characteristic: Option<CharacteristicKey>,
    values: HashMap<CharacteristicKey, CharacteristicValue>,
    subscriptions: HashSet<CharacteristicKey>,

    event_log: VecDeque<LogEntry>,
    log_capacity: usize,
    next_seq: u64,
}

impl ExplorerState {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            connection_status: ConnectionStatus::Disconnected,
            status_message: None,
            scan_state: ScanState::Idle,
            devices: Vec::new(),
            selected_device: None,
            active_device: None,
            services: Vec::new(),
            selected_service: None,
            open_service: None,
            characteristics: Vec::new(),
            selected_characteristic: None,
            values: HashMap::new(),
            subscriptions: HashSet::new(),
            event_log: VecDeque::new(),
            log_capacity: log_capacity.max(1),
            next_seq: 0,
        }
    }

    /// Fold one worker event into the state
    pub fn apply(&mut self, event: AppEvent) {
        match event {
            AppEvent::ScanStarted => {
                self.scan_state = ScanState::Scanning;
                self.log("Scanning...", MessageSeverity::Info);
            }
            AppEvent::DeviceFound(device) => self.upsert_device(device),
            AppEvent::ScanFinished => {
                if self.scan_state == ScanState::Scanning {
                    self.scan_state = ScanState::Finished;
                    let found = self.devices.len();
                    self.log(
                        format!("Scan finished, {} device(s) found", found),
                        MessageSeverity::Info,
                    );
                }
            }
            AppEvent::ConnectionStatus(status) => self.set_connection_status(status),
            AppEvent::ServicesDiscovered(services) => {
                if !self.is_connected() {
                    return;
                }
                self.log(
                    format!("Discovered {} service(s)", services.len()),
                    MessageSeverity::Info,
                );
                for service in &services {
                    self.log(
                        format!("  {}", assigned_numbers::describe_service(&service.uuid)),
                        MessageSeverity::Info,
                    );
                }
                self.services = services;
                if let Some(selected) = self.selected_service {
                    if !self.services.iter().any(|s| s.uuid == selected) {
                        self.selected_service = None;
                    }
                }
            }
            AppEvent::ServiceDetailsDiscovered {
                service,
                characteristics,
            } => {
                if !self.is_connected() {
                    return;
                }
                self.log(
                    format!(
                        "{}: {} characteristic(s)",
                        assigned_numbers::describe_service(&service),
                        characteristics.len()
                    ),
                    MessageSeverity::Info,
                );
                if let Some(info) = self.services.iter_mut().find(|s| s.uuid == service) {
                    info.characteristics = characteristics.clone();
                }
                if self.open_service != Some(service) {
                    self.selected_characteristic = None;
                }
                self.open_service = Some(service);
                self.characteristics = characteristics;
            }
            AppEvent::CharacteristicValue { key, value } => {
                if !self.is_connected() {
                    return;
                }
                let verb = match value.origin {
                    ValueOrigin::Read => "Read",
                    ValueOrigin::Notification => "Changed",
                    ValueOrigin::Written => "Wrote",
                };
                self.log(
                    format!(
                        "{} {}: {}",
                        verb,
                        assigned_numbers::describe_characteristic(&key.characteristic),
                        payload::summarize(&value.bytes, 16)
                    ),
                    MessageSeverity::Info,
                );
                self.values.insert(key, value);
            }
            AppEvent::SubscriptionChanged { key, subscribed } => {
                if !self.is_connected() {
                    return;
                }
                if subscribed {
                    self.subscriptions.insert(key);
                } else {
                    self.subscriptions.remove(&key);
                }
            }
            AppEvent::LogMessage(msg) => {
                self.log(msg.message.clone(), msg.severity);
                self.status_message = Some(msg);
            }
        }
    }

    /// Clear the device list ahead of a new scan
    pub fn begin_scan(&mut self) {
        self.devices.clear();
        self.selected_device = None;
        self.scan_state = ScanState::Scanning;
    }

    /// Mark a connection attempt to `id` as pending
    pub fn begin_connect(&mut self, id: &str) {
        self.active_device = Some(id.to_string());
        self.connection_status = ConnectionStatus::Connecting;
    }

    /// Text of the toggling connect button
    pub fn connect_button_label(&self) -> &'static str {
        match self.connection_status {
            ConnectionStatus::Connected => "Disconnect",
            ConnectionStatus::Connecting => "Cancel",
            ConnectionStatus::Disconnected | ConnectionStatus::Error => "Connect",
        }
    }

    /// Label shown under the device list
    pub fn scan_label(&self) -> &'static str {
        match self.scan_state {
            ScanState::Idle => "",
            ScanState::Scanning => "Scanning...",
            ScanState::Finished => "Scan finished!",
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_status == ConnectionStatus::Connected
    }

    pub fn device(&self, id: &str) -> Option<&ScannedDevice> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn active_device(&self) -> Option<&ScannedDevice> {
        self.active_device.as_deref().and_then(|id| self.device(id))
    }

    pub fn characteristic(&self, key: &CharacteristicKey) -> Option<&CharacteristicInfo> {
        self.characteristics.iter().find(|c| c.key() == *key)
    }

    pub fn value(&self, key: &CharacteristicKey) -> Option<&CharacteristicValue> {
        self.values.get(key)
    }

    pub fn is_subscribed(&self, key: &CharacteristicKey) -> bool {
        self.subscriptions.contains(key)
    }

    pub fn event_log(&self) -> impl Iterator<Item = &LogEntry> {
        self.event_log.iter()
    }

    pub fn clear_log(&mut self) {
        self.event_log.clear();
    }

    pub fn set_log_capacity(&mut self, capacity: usize) {
        self.log_capacity = capacity.max(1);
        while self.event_log.len() > self.log_capacity {
            self.event_log.pop_front();
        }
    }

    fn upsert_device(&mut self, device: ScannedDevice) {
        match self.devices.iter_mut().find(|d| d.id == device.id) {
            Some(existing) => {
                if device.rssi.is_some() {
                    existing.rssi = device.rssi;
                }
                if device.name.is_some() {
                    existing.name = device.name;
                }
            }
            None => {
                self.log(format!("Found {}", device.label()), MessageSeverity::Info);
                self.devices.push(device);
            }
        }
    }

    fn set_connection_status(&mut self, status: ConnectionStatus) {
        let previous = self.connection_status;
        self.connection_status = status;

        match status {
            ConnectionStatus::Connected => {
                let name = self
                    .active_device()
                    .map(|d| d.label())
                    .unwrap_or_else(|| "device".to_string());
                self.status_message = Some(StatusMessage::new(
                    format!("Connected to {}", name),
                    MessageSeverity::Success,
                ));
                self.log(format!("Connected to {}", name), MessageSeverity::Success);
            }
            ConnectionStatus::Connecting => {}
            ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                self.clear_gatt();
                self.active_device = None;
                if previous == ConnectionStatus::Connected
                    && status == ConnectionStatus::Disconnected
                {
                    self.status_message = Some(StatusMessage::new(
                        "Disconnected from device",
                        MessageSeverity::Info,
                    ));
                    self.log("Disconnected from device", MessageSeverity::Info);
                }
            }
        }
    }

    fn clear_gatt(&mut self) {
        self.services.clear();
        self.selected_service = None;
        self.open_service = None;
        self.characteristics.clear();
        self.selected_characteristic = None;
        self.values.clear();
        self.subscriptions.clear();
    }

    fn log(&mut self, message: impl Into<String>, severity: MessageSeverity) {
        if self.event_log.len() == self.log_capacity {
            self.event_log.pop_front();
        }
        self.event_log.push_back(LogEntry {
            seq: self.next_seq,
            message: message.into(),
            severity,
        });
        self.next_seq += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use btleplug::api::{BDAddr, CharPropFlags};

    const BATTERY_SERVICE: Uuid = Uuid::from_u128(0x0000_180f_0000_1000_8000_0080_5f9b_34fb);
    const BATTERY_LEVEL: Uuid = Uuid::from_u128(0x0000_2a19_0000_1000_8000_0080_5f9b_34fb);

    fn device(id: &str, name: Option<&str>, rssi: Option<i16>) -> ScannedDevice {
        ScannedDevice {
            id: id.to_string(),
            name: name.map(str::to_string),
            address: BDAddr::from([0, 1, 2, 3, 4, 5]),
            rssi,
        }
    }

    fn battery_level() -> CharacteristicInfo {
        CharacteristicInfo {
            uuid: BATTERY_LEVEL,
            service_uuid: BATTERY_SERVICE,
            properties: CharPropFlags::READ | CharPropFlags::NOTIFY,
            descriptors: Vec::new(),
        }
    }

    fn battery_service() -> ServiceInfo {
        ServiceInfo {
            uuid: BATTERY_SERVICE,
            primary: true,
            characteristics: Vec::new(),
        }
    }

    fn connected() -> ExplorerState {
        let mut state = ExplorerState::new(100);
        state.apply(AppEvent::DeviceFound(device("a", Some("Band"), Some(-70))));
        state.begin_connect("a");
        state.apply(AppEvent::ConnectionStatus(ConnectionStatus::Connected));
        state
    }

    fn with_open_battery_service() -> ExplorerState {
        let mut state = connected();
        state.apply(AppEvent::ServicesDiscovered(vec![battery_service()]));
        state.apply(AppEvent::ServiceDetailsDiscovered {
            service: BATTERY_SERVICE,
            characteristics: vec![battery_level()],
        });
        state
    }

    #[test]
    fn test_devices_deduplicated_by_id() {
        let mut state = ExplorerState::new(100);
        state.apply(AppEvent::DeviceFound(device("a", None, Some(-80))));
        state.apply(AppEvent::DeviceFound(device("b", Some("Tag"), None)));
        state.apply(AppEvent::DeviceFound(device("a", Some("Band"), Some(-60))));
        state.apply(AppEvent::DeviceFound(device("a", None, None)));

        assert_eq!(state.devices.len(), 2);
        let a = state.device("a").unwrap();
        assert_eq!(a.name.as_deref(), Some("Band"));
        assert_eq!(a.rssi, Some(-60));
    }

    #[test]
    fn test_scan_lifecycle_labels() {
        let mut state = ExplorerState::new(100);
        assert_eq!(state.scan_label(), "");

        state.apply(AppEvent::DeviceFound(device("old", None, None)));
        state.begin_scan();
        assert!(state.devices.is_empty());
        assert_eq!(state.scan_label(), "Scanning...");

        state.apply(AppEvent::ScanStarted);
        state.apply(AppEvent::ScanFinished);
        assert_eq!(state.scan_label(), "Scan finished!");
    }

    #[test]
    fn test_connect_button_toggles() {
        let mut state = ExplorerState::new(100);
        assert_eq!(state.connect_button_label(), "Connect");
        state.begin_connect("a");
        assert_eq!(state.connection_status, ConnectionStatus::Connecting);
        state.apply(AppEvent::ConnectionStatus(ConnectionStatus::Connected));
        assert_eq!(state.connect_button_label(), "Disconnect");
        state.apply(AppEvent::ConnectionStatus(ConnectionStatus::Disconnected));
        assert_eq!(state.connect_button_label(), "Connect");
    }

    #[test]
    fn test_connected_message_names_device() {
        let state = connected();
        let msg = state.status_message.unwrap();
        assert_eq!(msg.severity, MessageSeverity::Success);
        assert!(msg.message.contains("Band"));
    }

    #[test]
    fn test_service_details_populate_characteristics() {
        let state = with_open_battery_service();
        assert_eq!(state.open_service, Some(BATTERY_SERVICE));
        assert_eq!(state.characteristics, vec![battery_level()]);
        assert_eq!(state.services[0].characteristics.len(), 1);
    }

    #[test]
    fn test_values_and_subscriptions_tracked() {
        let mut state = with_open_battery_service();
        let key = battery_level().key();

        state.apply(AppEvent::CharacteristicValue {
            key,
            value: CharacteristicValue {
                bytes: vec![87],
                origin: ValueOrigin::Read,
            },
        });
        state.apply(AppEvent::SubscriptionChanged {
            key,
            subscribed: true,
        });
        state.apply(AppEvent::CharacteristicValue {
            key,
            value: CharacteristicValue {
                bytes: vec![86],
                origin: ValueOrigin::Notification,
            },
        });

        let value = state.value(&key).unwrap();
        assert_eq!(value.bytes, vec![86]);
        assert_eq!(value.origin, ValueOrigin::Notification);
        assert!(state.is_subscribed(&key));

        state.apply(AppEvent::SubscriptionChanged {
            key,
            subscribed: false,
        });
        assert!(!state.is_subscribed(&key));
    }

    #[test]
    fn test_disconnect_clears_gatt_state() {
        let mut state = with_open_battery_service();
        let key = battery_level().key();
        state.selected_characteristic = Some(key);
        state.apply(AppEvent::SubscriptionChanged {
            key,
            subscribed: true,
        });

        state.apply(AppEvent::ConnectionStatus(ConnectionStatus::Disconnected));

        assert!(state.services.is_empty());
        assert!(state.characteristics.is_empty());
        assert_eq!(state.open_service, None);
        assert_eq!(state.selected_characteristic, None);
        assert!(!state.is_subscribed(&key));
        assert!(state.active_device.is_none());
        // Scan results survive a disconnect
        assert_eq!(state.devices.len(), 1);
    }

    #[test]
    fn test_connection_error_clears_gatt_state() {
        let mut state = with_open_battery_service();
        let key = battery_level().key();
        state.selected_service = Some(BATTERY_SERVICE);
        state.selected_characteristic = Some(key);
        state.apply(AppEvent::CharacteristicValue {
            key,
            value: CharacteristicValue {
                bytes: vec![87],
                origin: ValueOrigin::Read,
            },
        });
        state.apply(AppEvent::SubscriptionChanged {
            key,
            subscribed: true,
        });

        state.apply(AppEvent::ConnectionStatus(ConnectionStatus::Error));

        assert_eq!(state.connection_status, ConnectionStatus::Error);
        assert!(state.services.is_empty());
        assert!(state.characteristics.is_empty());
        assert_eq!(state.open_service, None);
        assert_eq!(state.selected_service, None);
        assert_eq!(state.selected_characteristic, None);
        assert!(state.value(&key).is_none());
        assert!(!state.is_subscribed(&key));
        assert_eq!(state.connect_button_label(), "Connect");
    }

    #[test]
    fn test_gatt_events_ignored_when_disconnected() {
        let mut state = ExplorerState::new(100);
        state.apply(AppEvent::ServicesDiscovered(vec![battery_service()]));
        state.apply(AppEvent::CharacteristicValue {
            key: battery_level().key(),
            value: CharacteristicValue {
                bytes: vec![1],
                origin: ValueOrigin::Read,
            },
        });
        assert!(state.services.is_empty());
        assert!(state.value(&battery_level().key()).is_none());
    }

    #[test]
    fn test_connect_error_is_not_reported_as_disconnect() {
        let mut state = ExplorerState::new(100);
        state.begin_connect("a");
        state.apply(AppEvent::LogMessage(StatusMessage::new(
            "Connection failed",
            MessageSeverity::Error,
        )));
        state.apply(AppEvent::ConnectionStatus(ConnectionStatus::Error));

        let msg = state.status_message.as_ref().unwrap();
        assert_eq!(msg.severity, MessageSeverity::Error);
        assert_eq!(state.connect_button_label(), "Connect");
    }

    #[test]
    fn test_event_log_is_bounded() {
        let mut state = ExplorerState::new(3);
        for i in 0..5 {
            state.apply(AppEvent::LogMessage(StatusMessage::new(
                format!("msg {}", i),
                MessageSeverity::Info,
            )));
        }
        let entries: Vec<_> = state.event_log().map(|e| e.message.clone()).collect();
        assert_eq!(entries, vec!["msg 2", "msg 3", "msg 4"]);
        assert_eq!(state.event_log().last().unwrap().seq, 4);

        state.set_log_capacity(1);
        assert_eq!(state.event_log().count(), 1);

        state.clear_log();
        assert_eq!(state.event_log().count(), 0);
    }
}

use crate::domain::models::WriteMode;
use crate::domain::payload::DEFAULT_WRITE_LEN;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl LogRotation {
    pub const ALL: [LogRotation; 4] = [
        LogRotation::Minutely,
        LogRotation::Hourly,
        LogRotation::Daily,
        LogRotation::Never,
    ];

    pub fn label(self) -> &'static str {
        match self {
            LogRotation::Minutely => "minutely",
            LogRotation::Hourly => "hourly",
            LogRotation::Daily => "daily",
            LogRotation::Never => "never",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
    #[serde(default = "default_false")]
    pub show_file_line: bool,
    #[serde(default = "default_false")]
    pub show_thread_ids: bool,
    #[serde(default = "default_true")]
    pub show_target: bool,
    #[serde(default = "default_true")]
    pub ansi_colors: bool,
    #[serde(default)]
    pub rotation: LogRotation,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            file_logging_enabled: default_true(),
            console_logging_enabled: default_true(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
            show_file_line: default_false(),
            show_thread_ids: default_false(),
            show_target: default_true(),
            ansi_colors: default_true(),
            rotation: LogRotation::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "ble_explorer".to_string()
}

/// A peripheral the user has connected to before
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnownDevice {
    pub id: String,
    pub name: Option<String>,
    pub address: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    // Scanning
    #[serde(default = "default_scan_timeout_ms")]
    pub scan_timeout_ms: u64,
    /// Only list devices advertising this service; empty lists everything
    #[serde(default)]
    pub scan_service_filter: String,
    #[serde(default = "default_true")]
    pub show_unnamed_devices: bool,
    #[serde(default)]
    pub adapter_index: usize,

    // Connection
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_connect_max_retries")]
    pub connect_max_retries: u32,
    #[serde(default = "default_connect_retry_delay_ms")]
    pub connect_retry_delay_ms: u64,
    #[serde(default = "default_true")]
    pub auto_discover_services: bool,

    // GATT
    #[serde(default = "default_true")]
    pub auto_read_on_open: bool,
    #[serde(default = "default_true")]
    pub auto_subscribe: bool,
    #[serde(default = "default_write_len")]
    pub default_write_len: usize,
    #[serde(default)]
    pub write_mode: WriteMode,

    // UI
    #[serde(default = "default_event_log_capacity")]
    pub event_log_capacity: usize,
    #[serde(default)]
    pub dark_mode: bool,

    // History
    #[serde(default)]
    pub known_devices: Vec<KnownDevice>,
    #[serde(default)]
    pub last_connected_id: Option<String>,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            scan_timeout_ms: default_scan_timeout_ms(),
            scan_service_filter: String::new(),
            show_unnamed_devices: true,
            adapter_index: 0,

            connect_timeout_ms: default_connect_timeout_ms(),
            connect_max_retries: default_connect_max_retries(),
            connect_retry_delay_ms: default_connect_retry_delay_ms(),
            auto_discover_services: true,

            auto_read_on_open: true,
            auto_subscribe: true,
            default_write_len: default_write_len(),
            write_mode: WriteMode::default(),

            event_log_capacity: default_event_log_capacity(),
            dark_mode: false,

            known_devices: Vec::new(),
            last_connected_id: None,

            log_settings: LogSettings::default(),
        }
    }
}

fn default_scan_timeout_ms() -> u64 {
    5000
}
fn default_connect_timeout_ms() -> u64 {
    10_000
}
fn default_connect_max_retries() -> u32 {
    3
}
fn default_connect_retry_delay_ms() -> u64 {
    1000
}
fn default_write_len() -> usize {
    DEFAULT_WRITE_LEN
}
fn default_event_log_capacity() -> usize {
    500
}

pub struct SettingsService {
    settings: Settings,
    settings_path: PathBuf,
}

impl SettingsService {
    pub fn new() -> anyhow::Result<Self> {
        let settings_path = Self::get_settings_path()?;
        Ok(Self::load(settings_path))
    }

    /// Load from `path`, falling back to defaults when it is missing or unreadable
    pub fn load(settings_path: PathBuf) -> Self {
        let settings = match Self::load_from_file(&settings_path) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::debug!(
                    "Using default settings ({}): {}",
                    settings_path.display(),
                    e
                );
                Settings::default()
            }
        };

        Self {
            settings,
            settings_path,
        }
    }

    fn get_settings_path() -> anyhow::Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        path.push("BleExplorer");
        path.push("settings.json");
        Ok(path)
    }

    fn load_from_file(path: &Path) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.settings)?;
        fs::write(&self.settings_path, json)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.settings_path
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }

    pub fn get_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Remember a successfully connected device and persist
    pub fn remember_device(&mut self, device: KnownDevice) -> anyhow::Result<()> {
        self.settings.last_connected_id = Some(device.id.clone());
        match self
            .settings
            .known_devices
            .iter_mut()
            .find(|d| d.id == device.id)
        {
            Some(existing) => *existing = device,
            None => self.settings.known_devices.push(device),
        }
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("ble_explorer_test_{}_{}", name, std::process::id()))
            .join("settings.json")
    }

    #[test]
    fn test_defaults() {
        let s = Settings::default();
        assert_eq!(s.scan_timeout_ms, 5000);
        assert_eq!(s.default_write_len, 247);
        assert_eq!(s.write_mode, WriteMode::Auto);
        assert!(s.auto_discover_services);
        assert_eq!(s.log_settings.rotation, LogRotation::Daily);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let s: Settings = serde_json::from_str(r#"{ "scan_timeout_ms": 8000 }"#).unwrap();
        assert_eq!(s.scan_timeout_ms, 8000);
        assert_eq!(s.connect_max_retries, 3);
        assert!(s.show_unnamed_devices);
        assert_eq!(s.log_settings.level, "info");
    }

    #[test]
    fn test_rotation_serde() {
        let s: LogSettings = serde_json::from_str(r#"{ "rotation": "hourly" }"#).unwrap();
        assert_eq!(s.rotation, LogRotation::Hourly);
        assert!(serde_json::from_str::<LogSettings>(r#"{ "rotation": "weekly" }"#).is_err());
    }

    #[test]
    fn test_missing_file_loads_defaults() {
        let service = SettingsService::load(temp_path("missing"));
        assert_eq!(service.get().scan_timeout_ms, 5000);
    }

    #[test]
    fn test_remember_device_round_trip() {
        let path = temp_path("remember");
        let mut service = SettingsService::load(path.clone());
        let device = KnownDevice {
            id: "dev-1".to_string(),
            name: Some("Sensor".to_string()),
            address: "AA:BB:CC:DD:EE:FF".to_string(),
        };
        service.remember_device(device.clone()).unwrap();
        service
            .remember_device(KnownDevice {
                name: Some("Renamed".to_string()),
                ..device
            })
            .unwrap();

        let reloaded = SettingsService::load(path.clone());
        assert_eq!(reloaded.get().known_devices.len(), 1);
        assert_eq!(
            reloaded.get().known_devices[0].name.as_deref(),
            Some("Renamed")
        );
        assert_eq!(reloaded.get().last_connected_id.as_deref(), Some("dev-1"));

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }
}

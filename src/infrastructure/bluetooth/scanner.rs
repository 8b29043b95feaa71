//! BLE Scanner Module
//!
//! Handles Bluetooth LE device discovery with a bounded scan window.

use crate::domain::models::{AppEvent, ScannedDevice};
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::error::{BleError, BleResult};
use btleplug::api::{Central, CentralEvent, Peripheral as _, PeripheralProperties, ScanFilter};
use btleplug::platform::{Adapter, PeripheralId};
use futures::StreamExt;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Shortest scan window accepted, shorter values are raised to this
const MIN_SCAN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub service_filter: Option<Uuid>,
    pub timeout: Duration,
    pub show_unnamed: bool,
}

impl ScanConfig {
    pub fn from_settings(settings: &Settings) -> BleResult<Self> {
        let filter = settings.scan_service_filter.trim();
        let service_filter = if filter.is_empty() {
            None
        } else {
            Some(
                Uuid::parse_str(filter)
                    .map_err(|_| BleError::InvalidFilter(filter.to_string()))?,
            )
        };

        Ok(Self {
            service_filter,
            timeout: Duration::from_millis(settings.scan_timeout_ms).max(MIN_SCAN_TIMEOUT),
            show_unnamed: settings.show_unnamed_devices,
        })
    }

    /// Whether a discovered device is listed
    pub fn accepts(&self, device: &ScannedDevice) -> bool {
        self.show_unnamed || device.name.is_some()
    }

    fn scan_filter(&self) -> ScanFilter {
        ScanFilter {
            services: self.service_filter.into_iter().collect(),
        }
    }
}

pub fn device_from_properties(id: String, properties: &PeripheralProperties) -> ScannedDevice {
    ScannedDevice {
        id,
        name: properties
            .local_name
            .as_ref()
            .map(|n| n.trim_end_matches('\0').trim().to_string())
            .filter(|n| !n.is_empty()),
        address: properties.address,
        rssi: properties.rssi,
    }
}

/// BLE Scanner for discovering peripherals
pub struct BleScanner {
    task: Option<JoinHandle<()>>,
    event_sender: mpsc::UnboundedSender<AppEvent>,
}

impl BleScanner {
    pub fn new(event_sender: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            task: None,
            event_sender,
        }
    }

    /// Start an LE scan that stops by itself after `config.timeout`
    pub async fn start(&mut self, adapter: &Adapter, config: ScanConfig) -> BleResult<()> {
        // Restarting replaces the running scan without a ScanFinished in between
        if let Some(task) = self.task.take() {
            task.abort();
        }

        info!(
            "Starting BLE scan (filter: {:?}, timeout: {:?})",
            config.service_filter, config.timeout
        );

        let mut events = adapter.events().await?;
        adapter.start_scan(config.scan_filter()).await?;
        let _ = self.event_sender.send(AppEvent::ScanStarted);

        let adapter = adapter.clone();
        let sender = self.event_sender.clone();

        self.task = Some(tokio::spawn(async move {
            let deadline = tokio::time::sleep(config.timeout);
            tokio::pin!(deadline);

            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    event = events.next() => match event {
                        Some(CentralEvent::DeviceDiscovered(id))
                        | Some(CentralEvent::DeviceUpdated(id)) => {
                            match lookup_device(&adapter, &id).await {
                                Ok(Some(device)) if config.accepts(&device) => {
                                    let _ = sender.send(AppEvent::DeviceFound(device));
                                }
                                Ok(_) => {}
                                Err(e) => debug!("Skipping {:?}: {}", id, e),
                            }
                        }
                        Some(_) => {}
                        None => {
                            warn!("Adapter event stream ended during scan");
                            break;
                        }
                    }
                }
            }

            if let Err(e) = adapter.stop_scan().await {
                warn!("Failed to stop scan: {}", e);
            }
            info!("Scan finished");
            let _ = sender.send(AppEvent::ScanFinished);
        }));

        Ok(())
    }

    /// Stop scanning before the timeout
    pub async fn stop(&mut self, adapter: &Adapter) -> BleResult<()> {
        if let Some(task) = self.task.take() {
            if task.is_finished() {
                return Ok(());
            }
            info!("Stopping BLE scan...");
            task.abort();
            adapter.stop_scan().await?;
            let _ = self.event_sender.send(AppEvent::ScanFinished);
        }
        Ok(())
    }

    pub fn is_scanning(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn lookup_device(adapter: &Adapter, id: &PeripheralId) -> BleResult<Option<ScannedDevice>> {
    let peripheral = adapter.peripheral(id).await?;
    let properties = peripheral.properties().await?;
    Ok(properties.map(|p| device_from_properties(peripheral.id().to_string(), &p)))
}

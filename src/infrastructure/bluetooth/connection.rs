//! BLE Connection Module
//!
//! Handles connecting to a peripheral, watching for link loss and pumping
//! GATT notifications back to the UI.

use crate::domain::models::{
    AppEvent, CharacteristicKey, CharacteristicValue, ConnectionStatus, MessageSeverity,
    StatusMessage, ValueOrigin,
};
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::error::{BleError, BleResult};
use crate::infrastructure::bluetooth::gatt;
use btleplug::api::{Central, CentralEvent, Peripheral as _};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Configuration for connection behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Time allowed for a single connect attempt
    pub connect_timeout: Duration,
    /// Maximum connect attempts
    pub max_retries: u32,
    /// Delay between attempts
    pub retry_delay: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl ConnectionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            connect_timeout: Duration::from_millis(settings.connect_timeout_ms),
            max_retries: settings.connect_max_retries.max(1),
            retry_delay: Duration::from_millis(settings.connect_retry_delay_ms),
        }
    }
}

/// Characteristics with notifications enabled, shared with the notification pump
#[derive(Debug, Clone, Default)]
pub struct Subscriptions(Arc<Mutex<BTreeSet<CharacteristicKey>>>);

impl Subscriptions {
    pub fn set(&self, key: CharacteristicKey, enabled: bool) {
        let mut keys = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        if enabled {
            keys.insert(key);
        } else {
            keys.remove(&key);
        }
    }

    pub fn contains(&self, key: &CharacteristicKey) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }

    pub fn keys(&self) -> Vec<CharacteristicKey> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    /// Service of a subscribed characteristic.
    ///
    /// Notifications only carry the characteristic UUID, so the subscribed
    /// key decides between services that reuse the same UUID.
    pub fn service_for(&self, characteristic: Uuid) -> Option<Uuid> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|k| k.characteristic == characteristic)
            .map(|k| k.service)
    }

    pub fn clear(&self) {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

/// A live connection and the tasks that serve it
pub struct ActiveConnection {
    pub peripheral: Peripheral,
    pub id: String,
    pub subscriptions: Subscriptions,
    watcher: Option<JoinHandle<()>>,
    notifications: Option<JoinHandle<()>>,
}

impl ActiveConnection {
    /// Unsubscribe everything, stop the background tasks, then drop the link
    pub async fn close(&mut self) -> BleResult<()> {
        if self.is_connected().await {
            for key in self.subscriptions.keys() {
                if let Err(e) = gatt::set_notify(&self.peripheral, &key, false).await {
                    warn!("Failed to unsubscribe from {}: {}", key.characteristic, e);
                }
            }
        }
        self.subscriptions.clear();
        self.abort_tasks();

        if self.is_connected().await {
            self.peripheral.disconnect().await?;
        }
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    fn abort_tasks(&mut self) {
        if let Some(task) = self.watcher.take() {
            task.abort();
        }
        if let Some(task) = self.notifications.take() {
            task.abort();
        }
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

/// BLE Connection handler
pub struct BleConnection {
    event_sender: mpsc::UnboundedSender<AppEvent>,
    config: ConnectionConfig,
}

impl BleConnection {
    pub fn new(event_sender: mpsc::UnboundedSender<AppEvent>, config: ConnectionConfig) -> Self {
        Self {
            event_sender,
            config,
        }
    }

    /// Connect to a peripheral previously seen by the scanner
    pub async fn connect(&self, adapter: &Adapter, id: &str) -> BleResult<ActiveConnection> {
        info!("Connecting to Bluetooth device: {}", id);
        self.send_log("Connecting to device...", MessageSeverity::Info);

        // Step 1: Resolve the peripheral from the adapter cache
        let peripheral = find_peripheral(adapter, id)
            .await?
            .ok_or_else(|| BleError::DeviceNotFound(id.to_string()))?;

        // Step 2: Establish the link
        if peripheral.is_connected().await? {
            info!("Device already connected");
        } else {
            self.connect_with_retry(&peripheral).await?;
        }

        // Step 3: Watch for link loss and forward notifications
        let subscriptions = Subscriptions::default();
        let watcher = match self.spawn_disconnect_watcher(adapter, &peripheral).await {
            Ok(watcher) => watcher,
            Err(e) => {
                abandon(&peripheral).await;
                return Err(e);
            }
        };
        let notifications = match self
            .spawn_notification_pump(&peripheral, subscriptions.clone())
            .await
        {
            Ok(notifications) => notifications,
            Err(e) => {
                watcher.abort();
                abandon(&peripheral).await;
                return Err(e);
            }
        };

        Ok(ActiveConnection {
            peripheral,
            id: id.to_string(),
            subscriptions,
            watcher: Some(watcher),
            notifications: Some(notifications),
        })
    }

    /// Drop a link that came up without an `ActiveConnection`, e.g. after a cancelled connect
    pub async fn release(adapter: &Adapter, id: &str) -> BleResult<()> {
        if let Some(peripheral) = find_peripheral(adapter, id).await? {
            if peripheral.is_connected().await? {
                info!("Releasing link to {}", id);
                peripheral.disconnect().await?;
            }
        }
        Ok(())
    }

    async fn connect_with_retry(&self, peripheral: &Peripheral) -> BleResult<()> {
        let attempts = self.config.max_retries;
        let mut last_error = BleError::ConnectTimeout { attempts };

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.config.connect_timeout, peripheral.connect()).await {
                Ok(Ok(())) => {
                    info!("Connected on attempt {}", attempt);
                    return Ok(());
                }
                Ok(Err(e)) => {
                    warn!("Connect attempt {} failed: {}", attempt, e);
                    last_error = e.into();
                }
                Err(_) => {
                    warn!(
                        "Connect attempt {} timed out after {:?}",
                        attempt, self.config.connect_timeout
                    );
                    last_error = BleError::ConnectTimeout { attempts };
                }
            }

            if attempt < attempts {
                self.send_log(
                    &format!("Connect attempt {} failed, retrying...", attempt),
                    MessageSeverity::Warning,
                );
                tokio::time::sleep(self.config.retry_delay).await;
            }
        }

        error!("Failed to connect after {} attempts", attempts);
        Err(last_error)
    }

    async fn spawn_disconnect_watcher(
        &self,
        adapter: &Adapter,
        peripheral: &Peripheral,
    ) -> BleResult<JoinHandle<()>> {
        let mut events = adapter.events().await?;
        let target = peripheral.id();
        let sender = self.event_sender.clone();

        Ok(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if let CentralEvent::DeviceDisconnected(id) = event {
                    if id == target {
                        info!("Peripheral {:?} disconnected", id);
                        let _ = sender.send(AppEvent::ConnectionStatus(
                            ConnectionStatus::Disconnected,
                        ));
                        break;
                    }
                }
            }
        }))
    }

    async fn spawn_notification_pump(
        &self,
        peripheral: &Peripheral,
        subscriptions: Subscriptions,
    ) -> BleResult<JoinHandle<()>> {
        let mut stream = peripheral.notifications().await?;
        let peripheral = peripheral.clone();
        let sender = self.event_sender.clone();

        Ok(tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                let service = subscriptions
                    .service_for(notification.uuid)
                    .or_else(|| gatt::service_of(&peripheral, notification.uuid));
                let Some(service) = service else {
                    debug!("Notification from unknown characteristic {}", notification.uuid);
                    continue;
                };
                let _ = sender.send(AppEvent::CharacteristicValue {
                    key: CharacteristicKey {
                        service,
                        characteristic: notification.uuid,
                    },
                    value: CharacteristicValue {
                        bytes: notification.value,
                        origin: ValueOrigin::Notification,
                    },
                });
            }
            debug!("Notification stream closed");
        }))
    }

    fn send_log(&self, message: &str, severity: MessageSeverity) {
        let _ = self
            .event_sender
            .send(AppEvent::LogMessage(StatusMessage::new(message, severity)));
    }
}

async fn find_peripheral(adapter: &Adapter, id: &str) -> BleResult<Option<Peripheral>> {
    Ok(adapter
        .peripherals()
        .await?
        .into_iter()
        .find(|p| p.id().to_string() == id))
}

/// Best-effort disconnect when connection setup fails half-way
async fn abandon(peripheral: &Peripheral) {
    if let Err(e) = peripheral.disconnect().await {
        warn!("Failed to drop half-open connection: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_settings() {
        let settings = Settings {
            connect_timeout_ms: 2500,
            connect_max_retries: 0,
            connect_retry_delay_ms: 200,
            ..Settings::default()
        };
        let config = ConnectionConfig::from_settings(&settings);
        assert_eq!(config.connect_timeout, Duration::from_millis(2500));
        // At least one attempt is always made
        assert_eq!(config.max_retries, 1);
        assert_eq!(config.retry_delay, Duration::from_millis(200));
    }

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
    }

    fn key(service: u128, characteristic: u128) -> CharacteristicKey {
        CharacteristicKey {
            service: Uuid::from_u128(service),
            characteristic: Uuid::from_u128(characteristic),
        }
    }

    #[test]
    fn test_subscriptions_track_notify_changes() {
        let subscriptions = Subscriptions::default();
        subscriptions.set(key(1, 10), true);
        subscriptions.set(key(1, 11), true);
        subscriptions.set(key(1, 10), true);
        assert_eq!(subscriptions.keys(), vec![key(1, 10), key(1, 11)]);

        subscriptions.set(key(1, 10), false);
        assert!(!subscriptions.contains(&key(1, 10)));
        assert_eq!(subscriptions.keys(), vec![key(1, 11)]);

        // Unsubscribing something never subscribed is harmless
        subscriptions.set(key(2, 20), false);
        assert_eq!(subscriptions.keys().len(), 1);

        subscriptions.clear();
        assert!(subscriptions.keys().is_empty());
    }

    #[test]
    fn test_subscriptions_shared_with_clones() {
        let subscriptions = Subscriptions::default();
        let pump_view = subscriptions.clone();
        subscriptions.set(key(1, 10), true);
        assert!(pump_view.contains(&key(1, 10)));
    }

    #[test]
    fn test_notification_routed_to_subscribed_service() {
        let subscriptions = Subscriptions::default();
        // Two services expose the same characteristic UUID, only the second is subscribed
        subscriptions.set(key(2, 10), true);
        assert_eq!(
            subscriptions.service_for(Uuid::from_u128(10)),
            Some(Uuid::from_u128(2))
        );
        assert_eq!(subscriptions.service_for(Uuid::from_u128(99)), None);
    }
}

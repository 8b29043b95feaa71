//! Bluetooth Service Module
//!
//! Main service that owns the adapter, the scanner and the active
//! connection, and executes UI commands one at a time.

use crate::domain::models::{
    AppEvent, BluetoothCommand, CharacteristicKey, CharacteristicValue, ConnectionStatus,
    MessageSeverity, StatusMessage, ValueOrigin, WriteMode,
};
use crate::domain::settings::{KnownDevice, Settings, SettingsService};
use crate::infrastructure::bluetooth::{
    connection::{ActiveConnection, BleConnection, ConnectionConfig},
    error::BleError,
    gatt,
    scanner::{BleScanner, ScanConfig},
};
use anyhow::Result;
use btleplug::api::{Manager as _, Peripheral as _};
use btleplug::platform::{Adapter, Manager};
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Main Bluetooth service coordinating all BLE operations
pub struct BluetoothService {
    adapter: Option<Adapter>,
    scanner: BleScanner,
    connection: Option<ActiveConnection>,
    event_sender: mpsc::UnboundedSender<AppEvent>,
    settings: Arc<Mutex<SettingsService>>,
}

impl BluetoothService {
    pub fn new(
        event_sender: mpsc::UnboundedSender<AppEvent>,
        settings: Arc<Mutex<SettingsService>>,
    ) -> Self {
        Self {
            adapter: None,
            scanner: BleScanner::new(event_sender.clone()),
            connection: None,
            event_sender,
            settings,
        }
    }

    /// Process commands until the UI side hangs up
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<BluetoothCommand>) {
        let mut deferred = VecDeque::new();
        loop {
            let command = match deferred.pop_front() {
                Some(command) => command,
                None => match commands.recv().await {
                    Some(command) => command,
                    None => break,
                },
            };
            let is_connect = matches!(command, BluetoothCommand::Connect(_));
            let is_scan = matches!(command, BluetoothCommand::StartScan);
            let label = command_label(&command);

            let result = match command {
                BluetoothCommand::Connect(id) => {
                    self.connect_or_cancel(&id, &mut commands, &mut deferred)
                        .await
                }
                command => self.handle(command).await,
            };

            if let Err(e) = result {
                error!("{} failed: {:#}", label, e);
                self.send_log(&format!("{} failed: {}", label, e), MessageSeverity::Error);
                if is_connect {
                    self.send(AppEvent::ConnectionStatus(ConnectionStatus::Error));
                }
                if is_scan {
                    self.send(AppEvent::ScanFinished);
                }
            }
        }

        info!("Command channel closed, shutting down Bluetooth service");
        if let Err(e) = self.close_connection().await {
            warn!("Failed to disconnect on shutdown: {}", e);
        }
    }

    pub async fn handle(&mut self, command: BluetoothCommand) -> Result<()> {
        match command {
            BluetoothCommand::StartScan => self.start_scan().await,
            BluetoothCommand::StopScan => self.stop_scan().await,
            BluetoothCommand::Connect(id) => self.connect(&id).await,
            BluetoothCommand::Disconnect => self.disconnect().await,
            BluetoothCommand::DiscoverServices => self.discover_services().await,
            BluetoothCommand::DiscoverServiceDetails(service) => {
                self.discover_service_details(service).await
            }
            BluetoothCommand::Read(key) => self.read(key).await,
            BluetoothCommand::Write { key, payload, mode } => {
                self.write(key, payload, mode).await
            }
            BluetoothCommand::Subscribe(key) => self.set_notify(key, true).await,
            BluetoothCommand::Unsubscribe(key) => self.set_notify(key, false).await,
        }
    }

    fn settings(&self) -> Result<Settings> {
        let settings = self
            .settings
            .lock()
            .map_err(|_| anyhow::anyhow!("Lock error"))?;
        Ok(settings.get().clone())
    }

    /// The configured adapter, opened on first use
    async fn adapter(&mut self) -> Result<Adapter> {
        if let Some(adapter) = &self.adapter {
            return Ok(adapter.clone());
        }

        let index = self.settings()?.adapter_index;
        let manager = Manager::new().await.map_err(BleError::from)?;
        let adapter = manager
            .adapters()
            .await
            .map_err(BleError::from)?
            .into_iter()
            .nth(index)
            .ok_or(BleError::NoAdapter(index))?;

        info!("Using Bluetooth adapter #{}", index);
        self.adapter = Some(adapter.clone());
        Ok(adapter)
    }

    async fn start_scan(&mut self) -> Result<()> {
        let config = ScanConfig::from_settings(&self.settings()?)?;
        let adapter = self.adapter().await?;
        self.scanner.start(&adapter, config).await?;
        Ok(())
    }

    async fn stop_scan(&mut self) -> Result<()> {
        if let Some(adapter) = self.adapter.clone() {
            self.scanner.stop(&adapter).await?;
        }
        Ok(())
    }

    /// Connect, giving up early when a `Disconnect` arrives meanwhile
    async fn connect_or_cancel(
        &mut self,
        id: &str,
        commands: &mut mpsc::UnboundedReceiver<BluetoothCommand>,
        deferred: &mut VecDeque<BluetoothCommand>,
    ) -> Result<()> {
        match until_cancelled(self.connect(id), commands, deferred).await {
            Raced::Finished(result) => result,
            Raced::Cancelled => {
                self.cancel_connect(id).await;
                Ok(())
            }
        }
    }

    /// Tear down whatever a cancelled connect left behind
    async fn cancel_connect(&mut self, id: &str) {
        info!("Connection to {} cancelled", id);
        self.send_log("Connection cancelled", MessageSeverity::Warning);

        if self.connection.is_none() {
            if let Some(adapter) = self.adapter.clone() {
                if let Err(e) = BleConnection::release(&adapter, id).await {
                    warn!("Failed to release {} after cancel: {}", id, e);
                }
            }
        }
        if let Err(e) = self.disconnect().await {
            warn!("Disconnect after cancel failed: {:#}", e);
            self.send_log(&format!("Disconnect failed: {}", e), MessageSeverity::Error);
        }
    }

    async fn connect(&mut self, id: &str) -> Result<()> {
        if self.connection.is_some() {
            info!("Dropping previous connection before connecting to {}", id);
            self.close_connection().await?;
        }
        if self.scanner.is_scanning() {
            self.stop_scan().await?;
        }

        let settings = self.settings()?;
        let adapter = self.adapter().await?;
        let connection = BleConnection::new(
            self.event_sender.clone(),
            ConnectionConfig::from_settings(&settings),
        );
        let active = connection.connect(&adapter, id).await?;

        let known = match active.peripheral.properties().await {
            Ok(Some(props)) => Some(KnownDevice {
                id: id.to_string(),
                name: props.local_name,
                address: props.address.to_string(),
            }),
            _ => None,
        };
        self.connection = Some(active);
        self.send(AppEvent::ConnectionStatus(ConnectionStatus::Connected));

        if let Some(device) = known {
            if let Ok(mut settings) = self.settings.lock() {
                if let Err(e) = settings.remember_device(device) {
                    warn!("Failed to save known device: {}", e);
                }
            }
        }

        if settings.auto_discover_services {
            // The link is up, so a failed discovery must not turn into a connect error
            if let Err(e) = self.discover_services().await {
                self.report_soft_failure("Service discovery", &e);
            }
        }
        Ok(())
    }

    /// Always reports `Disconnected`: the connection is gone from the worker
    /// even when the peripheral refused a clean disconnect
    async fn disconnect(&mut self) -> Result<()> {
        let had_connection = self.connection.is_some();
        let result = self.close_connection().await;
        if had_connection && result.is_ok() {
            info!("Disconnected from device");
        }
        self.send(AppEvent::ConnectionStatus(ConnectionStatus::Disconnected));
        result
    }

    async fn close_connection(&mut self) -> Result<()> {
        if let Some(mut connection) = self.connection.take() {
            connection.close().await?;
        }
        Ok(())
    }

    fn connection(&self) -> Result<&ActiveConnection> {
        Ok(self.connection.as_ref().ok_or(BleError::NotConnected)?)
    }

    async fn discover_services(&mut self) -> Result<()> {
        let connection = self.connection()?;
        if !connection.is_connected().await {
            return Err(BleError::NotConnected.into());
        }

        info!("Discovering services of {}", connection.id);
        connection
            .peripheral
            .discover_services()
            .await
            .map_err(BleError::from)?;
        let services = gatt::services(&connection.peripheral);
        info!("Found {} services", services.len());

        self.send(AppEvent::ServicesDiscovered(services));
        Ok(())
    }

    async fn discover_service_details(&mut self, service: Uuid) -> Result<()> {
        let settings = self.settings()?;
        let connection = self.connection()?;
        let peripheral = connection.peripheral.clone();
        let subscriptions = connection.subscriptions.clone();

        if peripheral.services().is_empty() {
            peripheral.discover_services().await.map_err(BleError::from)?;
        }
        let info = gatt::service(&peripheral, service)?;
        info!(
            "Service {} has {} characteristics",
            service,
            info.characteristics.len()
        );

        self.send(AppEvent::ServiceDetailsDiscovered {
            service,
            characteristics: info.characteristics.clone(),
        });

        for characteristic in &info.characteristics {
            let key = characteristic.key();

            if settings.auto_read_on_open && characteristic.is_readable() {
                match gatt::read(&peripheral, &key).await {
                    Ok(bytes) => self.send_value(key, bytes, ValueOrigin::Read),
                    Err(e) => warn!("Could not read {}: {}", key.characteristic, e),
                }
            }

            if settings.auto_subscribe && characteristic.is_notifiable() {
                match gatt::set_notify(&peripheral, &key, true).await {
                    Ok(()) => {
                        subscriptions.set(key, true);
                        self.send(AppEvent::SubscriptionChanged {
                            key,
                            subscribed: true,
                        });
                    }
                    Err(e) => warn!("Could not subscribe to {}: {}", key.characteristic, e),
                }
            }
        }

        Ok(())
    }

    async fn read(&mut self, key: CharacteristicKey) -> Result<()> {
        let connection = self.connection()?;
        let bytes = gatt::read(&connection.peripheral, &key).await?;
        self.send_value(key, bytes, ValueOrigin::Read);
        Ok(())
    }

    async fn write(&mut self, key: CharacteristicKey, payload: Vec<u8>, mode: WriteMode) -> Result<()> {
        let connection = self.connection()?;
        gatt::write(&connection.peripheral, &key, &payload, mode).await?;
        self.send_value(key, payload, ValueOrigin::Written);
        Ok(())
    }

    async fn set_notify(&mut self, key: CharacteristicKey, enabled: bool) -> Result<()> {
        let connection = self.connection()?;
        gatt::set_notify(&connection.peripheral, &key, enabled).await?;
        connection.subscriptions.set(key, enabled);
        self.send(AppEvent::SubscriptionChanged {
            key,
            subscribed: enabled,
        });
        Ok(())
    }

    fn report_soft_failure(&self, label: &str, error: &anyhow::Error) {
        warn!("{} failed: {:#}", label, error);
        self.send_log(
            &format!("{} failed: {}", label, error),
            MessageSeverity::Warning,
        );
    }

    fn send_value(&self, key: CharacteristicKey, bytes: Vec<u8>, origin: ValueOrigin) {
        self.send(AppEvent::CharacteristicValue {
            key,
            value: CharacteristicValue { bytes, origin },
        });
    }

    fn send(&self, event: AppEvent) {
        let _ = self.event_sender.send(event);
    }

    fn send_log(&self, message: &str, severity: MessageSeverity) {
        self.send(AppEvent::LogMessage(StatusMessage::new(message, severity)));
    }
}

enum Raced<T> {
    Finished(T),
    Cancelled,
}

/// Drive `future` while watching the command channel.
///
/// A `Disconnect` cancels it; other commands are kept for later in `deferred`.
async fn until_cancelled<F: Future>(
    future: F,
    commands: &mut mpsc::UnboundedReceiver<BluetoothCommand>,
    deferred: &mut VecDeque<BluetoothCommand>,
) -> Raced<F::Output> {
    tokio::pin!(future);
    let mut open = true;

    loop {
        tokio::select! {
            output = &mut future => return Raced::Finished(output),
            command = commands.recv(), if open => match command {
                Some(BluetoothCommand::Disconnect) => return Raced::Cancelled,
                Some(command) => {
                    debug!("Deferring {} until connect completes", command_label(&command));
                    deferred.push_back(command);
                }
                None => open = false,
            },
        }
    }
}

/// Human-readable name of a command for error reports
fn command_label(command: &BluetoothCommand) -> &'static str {
    match command {
        BluetoothCommand::StartScan => "Scan",
        BluetoothCommand::StopScan => "Stop scan",
        BluetoothCommand::Connect(_) => "Connection",
        BluetoothCommand::Disconnect => "Disconnect",
        BluetoothCommand::DiscoverServices => "Service discovery",
        BluetoothCommand::DiscoverServiceDetails(_) => "Characteristic discovery",
        BluetoothCommand::Read(_) => "Read",
        BluetoothCommand::Write { .. } => "Write",
        BluetoothCommand::Subscribe(_) => "Subscribe",
        BluetoothCommand::Unsubscribe(_) => "Unsubscribe",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn service() -> (BluetoothService, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let settings = SettingsService::load(PathBuf::from("does-not-exist/settings.json"));
        (
            BluetoothService::new(tx, Arc::new(Mutex::new(settings))),
            rx,
        )
    }

    fn key() -> CharacteristicKey {
        CharacteristicKey {
            service: Uuid::from_u128(1),
            characteristic: Uuid::from_u128(2),
        }
    }

    #[test]
    fn test_command_labels() {
        assert_eq!(command_label(&BluetoothCommand::Connect("x".into())), "Connection");
        assert_eq!(
            command_label(&BluetoothCommand::Write {
                key: key(),
                payload: vec![],
                mode: WriteMode::Auto
            }),
            "Write"
        );
    }

    #[tokio::test]
    async fn test_gatt_commands_require_connection() {
        let (mut service, _rx) = service();
        for command in [
            BluetoothCommand::DiscoverServices,
            BluetoothCommand::DiscoverServiceDetails(Uuid::from_u128(1)),
            BluetoothCommand::Read(key()),
            BluetoothCommand::Subscribe(key()),
        ] {
            let err = service.handle(command).await.unwrap_err();
            assert!(matches!(
                err.downcast_ref::<BleError>(),
                Some(BleError::NotConnected)
            ));
        }
    }

    #[tokio::test]
    async fn test_disconnect_without_connection_reports_disconnected() {
        let (mut service, mut rx) = service();
        service.handle(BluetoothCommand::Disconnect).await.unwrap();
        assert!(matches!(
            rx.try_recv(),
            Ok(AppEvent::ConnectionStatus(ConnectionStatus::Disconnected))
        ));
    }

    #[tokio::test]
    async fn test_cancel_connect_reports_disconnected() {
        let (mut service, mut rx) = service();
        service.cancel_connect("peripheral-1").await;

        match rx.try_recv() {
            Ok(AppEvent::LogMessage(msg)) => {
                assert_eq!(msg.severity, MessageSeverity::Warning);
                assert_eq!(msg.message, "Connection cancelled");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            rx.try_recv(),
            Ok(AppEvent::ConnectionStatus(ConnectionStatus::Disconnected))
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_soft_failure_is_a_warning() {
        let (service, mut rx) = service();
        let error = anyhow::Error::from(BleError::NotConnected);
        service.report_soft_failure("Service discovery", &error);

        match rx.try_recv() {
            Ok(AppEvent::LogMessage(msg)) => {
                assert_eq!(msg.severity, MessageSeverity::Warning);
                assert_eq!(msg.message, "Service discovery failed: not connected to a device");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        // No connection status change, the link stays up
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_disconnect_cancels_pending_connect() {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel();
        let mut deferred = VecDeque::new();
        cmd_tx.send(BluetoothCommand::StartScan).unwrap();
        cmd_tx.send(BluetoothCommand::Read(key())).unwrap();
        cmd_tx.send(BluetoothCommand::Disconnect).unwrap();

        let outcome =
            until_cancelled(std::future::pending::<()>(), &mut cmd_rx, &mut deferred).await;

        assert!(matches!(outcome, Raced::Cancelled));
        assert_eq!(deferred.len(), 2);
        assert!(matches!(deferred[0], BluetoothCommand::StartScan));
        assert!(matches!(deferred[1], BluetoothCommand::Read(_)));
    }

    #[tokio::test]
    async fn test_connect_finishes_when_not_cancelled() {
        let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<BluetoothCommand>();
        let mut deferred = VecDeque::new();
        drop(cmd_tx);

        let slow = async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            7
        };
        let outcome = until_cancelled(slow, &mut cmd_rx, &mut deferred).await;

        assert!(matches!(outcome, Raced::Finished(7)));
        assert!(deferred.is_empty());
    }

    #[tokio::test]
    async fn test_stop_scan_without_adapter_is_noop() {
        let (mut service, mut rx) = service();
        service.handle(BluetoothCommand::StopScan).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_reports_failures() {
        let (service, mut rx) = service();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        cmd_tx.send(BluetoothCommand::Read(key())).unwrap();
        drop(cmd_tx);

        service.run(cmd_rx).await;

        match rx.try_recv() {
            Ok(AppEvent::LogMessage(msg)) => {
                assert_eq!(msg.severity, MessageSeverity::Error);
                assert_eq!(msg.message, "Read failed: not connected to a device");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}

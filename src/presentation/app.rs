use crate::domain::models::{
    AppEvent, BluetoothCommand, CharacteristicKey, ConnectionStatus, MessageSeverity,
    StatusMessage, WriteMode,
};
use crate::domain::payload;
use crate::domain::session::{ExplorerState, ScanState};
use crate::domain::settings::SettingsService;
use crate::infrastructure::bluetooth::BluetoothService;
use crate::infrastructure::logging::LoggingGuard;
use crate::presentation::components::Components;
use eframe::egui;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Explorer,
    Log,
    Settings,
}

pub struct BleExplorerApp {
    pub(crate) settings: Arc<Mutex<SettingsService>>,

    // Bluetooth
    bluetooth_tx: mpsc::UnboundedSender<BluetoothCommand>,
    events_rx: mpsc::UnboundedReceiver<AppEvent>,

    pub(crate) state: ExplorerState,

    // UI State
    pub(crate) selected_tab: Tab,
    pub(crate) write_input: String,
    pub(crate) write_mode: WriteMode,
    pub(crate) is_dark_mode: bool,

    _logging_guard: Option<LoggingGuard>,
}

impl BleExplorerApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        settings_service: SettingsService,
        logging_guard: Option<LoggingGuard>,
    ) -> Self {
        let (is_dark_mode, write_mode, log_capacity) = {
            let s = settings_service.get();
            (s.dark_mode, s.write_mode, s.event_log_capacity)
        };
        crate::presentation::theme::apply(&cc.egui_ctx, is_dark_mode);

        let settings = Arc::new(Mutex::new(settings_service));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (bt_cmd_tx, bt_cmd_rx) = mpsc::unbounded_channel();

        spawn_bluetooth_worker(event_tx, bt_cmd_rx, settings.clone());

        Self {
            settings,
            bluetooth_tx: bt_cmd_tx,
            events_rx: event_rx,
            state: ExplorerState::new(log_capacity),
            selected_tab: Tab::Explorer,
            write_input: String::new(),
            write_mode,
            is_dark_mode,
            _logging_guard: logging_guard,
        }
    }

    fn send(&mut self, command: BluetoothCommand) {
        if self.bluetooth_tx.send(command).is_err() {
            error!("Bluetooth worker is gone");
            self.report(
                "Bluetooth worker stopped, restart the application",
                MessageSeverity::Error,
            );
        }
    }

    pub(crate) fn report(&mut self, message: impl Into<String>, severity: MessageSeverity) {
        self.state
            .apply(AppEvent::LogMessage(StatusMessage::new(message, severity)));
    }

    pub(crate) fn start_scan(&mut self) {
        self.state.begin_scan();
        self.send(BluetoothCommand::StartScan);
    }

    pub(crate) fn stop_scan(&mut self) {
        self.send(BluetoothCommand::StopScan);
    }

    /// Connect to the selected device, or disconnect when connected
    pub(crate) fn toggle_connection(&mut self) {
        match self.state.connection_status {
            ConnectionStatus::Connected | ConnectionStatus::Connecting => {
                self.send(BluetoothCommand::Disconnect);
            }
            ConnectionStatus::Disconnected | ConnectionStatus::Error => {
                let Some(id) = self.state.selected_device.clone() else {
                    self.report("Select a device first", MessageSeverity::Warning);
                    return;
                };
                self.state.begin_connect(&id);
                self.send(BluetoothCommand::Connect(id));
            }
        }
    }

    pub(crate) fn discover_services(&mut self) {
        self.send(BluetoothCommand::DiscoverServices);
    }

    pub(crate) fn open_service(&mut self, service: Uuid) {
        self.state.selected_service = Some(service);
        self.send(BluetoothCommand::DiscoverServiceDetails(service));
    }

    pub(crate) fn read(&mut self, key: CharacteristicKey) {
        self.send(BluetoothCommand::Read(key));
    }

    pub(crate) fn write(&mut self, key: CharacteristicKey) {
        let default_len = self
            .settings
            .lock()
            .map(|s| s.get().default_write_len)
            .unwrap_or(payload::DEFAULT_WRITE_LEN);

        match payload::parse_hex(&self.write_input, default_len) {
            Ok(bytes) => {
                let mode = self.write_mode;
                self.send(BluetoothCommand::Write {
                    key,
                    payload: bytes,
                    mode,
                });
            }
            Err(e) => self.report(format!("Invalid payload: {}", e), MessageSeverity::Error),
        }
    }

    pub(crate) fn toggle_subscription(&mut self, key: CharacteristicKey) {
        if self.state.is_subscribed(&key) {
            self.send(BluetoothCommand::Unsubscribe(key));
        } else {
            self.send(BluetoothCommand::Subscribe(key));
        }
    }

    pub(crate) fn save_settings(&mut self) {
        let result = match self.settings.lock() {
            Ok(mut settings) => {
                let s = settings.get_mut();
                s.dark_mode = self.is_dark_mode;
                s.write_mode = self.write_mode;
                let capacity = s.event_log_capacity;
                self.state.set_log_capacity(capacity);
                settings
                    .save()
                    .map(|()| settings.path().display().to_string())
            }
            Err(_) => Err(anyhow::anyhow!("Lock error")),
        };

        match result {
            Ok(path) => {
                info!("Settings saved to {}", path);
                self.report("Settings saved", MessageSeverity::Success);
            }
            Err(e) => {
                warn!("Failed to save settings: {}", e);
                self.report(format!("Failed to save settings: {}", e), MessageSeverity::Error);
            }
        }
    }

    fn drain_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            self.state.apply(event);
        }
    }

    fn busy(&self) -> bool {
        self.state.scan_state == ScanState::Scanning
            || self.state.connection_status == ConnectionStatus::Connecting
    }
}

/// The BLE stack runs on its own thread with a current-thread runtime
fn spawn_bluetooth_worker(
    event_tx: mpsc::UnboundedSender<AppEvent>,
    commands: mpsc::UnboundedReceiver<BluetoothCommand>,
    settings: Arc<Mutex<SettingsService>>,
) {
    let failure_tx = event_tx.clone();
    let spawned = std::thread::Builder::new()
        .name("ble-worker".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to create tokio runtime for Bluetooth: {}", e);
                    let _ = event_tx.send(AppEvent::LogMessage(StatusMessage::new(
                        format!("Bluetooth unavailable: {}", e),
                        MessageSeverity::Error,
                    )));
                    return;
                }
            };

            rt.block_on(BluetoothService::new(event_tx, settings).run(commands));
        });

    if let Err(e) = spawned {
        error!("Failed to spawn Bluetooth thread: {}", e);
        let _ = failure_tx.send(AppEvent::LogMessage(StatusMessage::new(
            format!("Bluetooth unavailable: {}", e),
            MessageSeverity::Error,
        )));
    }
}

impl eframe::App for BleExplorerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();

        // Events arrive from another thread, so poll faster while work is pending
        let poll = if self.busy() { 50 } else { 200 };
        ctx.request_repaint_after(Duration::from_millis(poll));

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                ui.selectable_value(&mut self.selected_tab, Tab::Explorer, "Explorer");
                ui.selectable_value(&mut self.selected_tab, Tab::Log, "Log");
                ui.selectable_value(&mut self.selected_tab, Tab::Settings, "Settings");

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let switch_icon = if self.is_dark_mode { "☀ Light" } else { "🌙 Dark" };
                    if ui.button(switch_icon).clicked() {
                        self.is_dark_mode = !self.is_dark_mode;
                        crate::presentation::theme::apply(ctx, self.is_dark_mode);
                    }
                });
            });
        });

        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            Components::status_line(
                ui,
                self.state.connection_status,
                self.state.status_message.as_ref(),
            );
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            use crate::presentation::tabs;
            match self.selected_tab {
                Tab::Explorer => tabs::explorer::render(self, ui),
                Tab::Log => tabs::log::render(self, ui),
                Tab::Settings => tabs::settings::render(self, ui),
            }
        });
    }
}

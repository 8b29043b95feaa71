//! Bluetooth Module
//!
//! BLE central role: discovery, connection and GATT access through btleplug.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    BluetoothService                      │
//! │   (runs on the BLE thread, executes BluetoothCommand)    │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼─────────────┐
//!         │             │             │
//!         ▼             ▼             ▼
//! ┌───────────┐  ┌────────────┐  ┌──────────┐
//! │  Scanner  │  │ Connection │  │   GATT   │
//! │           │  │            │  │          │
//! │ - LE scan │  │ - Retries  │  │ - Read   │
//! │ - Timeout │  │ - Link loss│  │ - Write  │
//! │           │  │ - Notify   │  │ - Notify │
//! └───────────┘  └────────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! - [`scanner`] - BLE device discovery
//! - [`connection`] - Connecting, link-loss watching and notification delivery
//! - [`gatt`] - Service tree conversion and characteristic operations
//! - [`service`] - Main service coordinator
//! - [`error`] - Error taxonomy for all of the above

pub mod connection;
pub mod error;
pub mod gatt;
pub mod scanner;
pub mod service;

pub use service::BluetoothService;

//! System State Management
//!
//! Mirror of the control loop and network state for observers such as the
//! heartbeat. The drive task owns the real state; this copy is only ever
//! written by its owners and read by everyone else.
//!
//! # State Access Pattern
//! ```rust
//! let state = SYSTEM_STATE.lock().await;
//! // Read state here
//! // Lock automatically released when state goes out of scope
//! ```

use defmt::Format;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};
use rover_core::control::DriveMode;

/// Global system state protected by a mutex
///
/// Initialized to manual mode, no network and no client.
pub static SYSTEM_STATE: Mutex<CriticalSectionRawMutex, SystemState> = Mutex::new(SystemState {
    drive_mode: DriveMode::Manual,
    motors: [0, 0],
    network: NetworkState::Down,
    client_connected: false,
});

/// Boot-time network bring-up progress
#[derive(Debug, Clone, Copy, PartialEq, Format)]
pub enum NetworkState {
    /// Radio not started yet
    Down,
    /// Joining and waiting for DHCP
    Connecting,
    /// Holding this IPv4 address
    Connected([u8; 4]),
    /// Join failed, recovery restart pending
    Failed,
}

#[derive(Format)]
pub struct SystemState {
    /// Mode of the drive controller
    pub drive_mode: DriveMode,
    /// Last signed duty per channel
    pub motors: [i16; 2],
    pub network: NetworkState,
    /// Whether an operator client is attached to the command server
    pub client_connected: bool,
}

/// Records the controller's mode and duties after an event or a forced stop
pub async fn set_drive(mode: DriveMode, motors: [i16; 2]) {
    let mut state = SYSTEM_STATE.lock().await;
    state.drive_mode = mode;
    state.motors = motors;
}

pub async fn set_network(network: NetworkState) {
    SYSTEM_STATE.lock().await.network = network;
}

pub async fn set_client_connected(connected: bool) {
    SYSTEM_STATE.lock().await.client_connected = connected;
}

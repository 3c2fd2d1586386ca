//! Heartbeat
//!
//! Logs a snapshot of the system state at a fixed period.

use defmt::info;
use embassy_time::Ticker;

use crate::system::config::HEARTBEAT_PERIOD;
use crate::system::state::SYSTEM_STATE;

#[embassy_executor::task]
pub async fn heartbeat() {
    let mut ticker = Ticker::every(HEARTBEAT_PERIOD);
    loop {
        ticker.next().await;
        let state = SYSTEM_STATE.lock().await;
        info!(
            "Heartbeat: mode {}, motors {}, network {}, client {}",
            state.drive_mode.as_str(),
            state.motors,
            state.network,
            state.client_connected
        );
    }
}

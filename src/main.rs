//! Rover firmware entry point
//!
//! Stops the motors, brings up Wi-Fi with the stored credentials and, once
//! connected, starts the command server. A failed join selects the recovery
//! image and restarts instead.

#![no_std]
#![no_main]

use core::cell::RefCell;

use crate::system::boot::{DfuBootSelector, SharedFlash, WatchdogRestart};
use crate::system::network::{read_credentials, RadioLink, SystemClock};
use crate::system::config::COMMAND_PORT;
use crate::system::state::{self, NetworkState};
use crate::task::{command_server::command_server, drive::drive, heartbeat::heartbeat, net::start_radio};
use defmt::{error, info, warn};
use embassy_executor::Spawner;
use embassy_rp::block::ImageDef;
use embassy_rp::config::Config;
use embassy_rp::flash::Flash;
use embassy_rp::watchdog::Watchdog;
use embassy_sync::blocking_mutex::Mutex;
use embassy_time::Delay;
use rover_core::config::ConnectConfig;
use rover_core::connectivity::{ConnectOutcome, ConnectivityManager};
use static_cell::StaticCell;
// the group structs are named by the split_resources! expansion
use system::resources::{AssignedResources, MotorDriverResources, RadioResources};
use {defmt_rtt as _, panic_probe as _};

/// Firmware image type for bootloader
#[link_section = ".start_block"]
#[used]
pub static IMAGE_DEF: ImageDef = ImageDef::secure_exe();

/// System core modules
mod system;
/// Task implementations
mod task;

/// Firmware entry point
#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_rp::init(Config::default());

    // Shared between the credential reader and the boot selector
    static FLASH: StaticCell<SharedFlash> = StaticCell::new();
    let flash = FLASH.init(Mutex::new(RefCell::new(Flash::new_blocking(p.FLASH))));
    let watchdog = Watchdog::new(p.WATCHDOG);

    // Split the resources into separate groups for each task
    let r = split_resources!(p);

    // The drive task forces the motors into the stopped state as it starts
    spawner.spawn(drive(r.motor_driver)).unwrap();
    spawner.spawn(heartbeat()).unwrap();

    let credentials = match read_credentials(flash) {
        Ok(credentials) => {
            info!("Stored credentials: {}", credentials);
            Some(credentials)
        }
        Err(e) => {
            warn!("No usable credentials: {}", e);
            None
        }
    };

    let (control, stack) = start_radio(spawner, r.radio).await;
    state::set_network(NetworkState::Connecting).await;

    let mut link = RadioLink::new(control, stack, credentials);
    let mut boot = DfuBootSelector::new(flash);
    let mut restart = WatchdogRestart::new(watchdog);
    let mut connectivity = ConnectivityManager::new(SystemClock, Delay, ConnectConfig::default());

    match connectivity.bring_up(&mut link, &mut boot, &mut restart).await {
        ConnectOutcome::Connected { address } => {
            let octets = address.map(|address| address.octets()).unwrap_or_default();
            // no discovery service; the log is where the operator finds the rover
            info!(
                "Rover reachable at {}.{}.{}.{}:{}",
                octets[0], octets[1], octets[2], octets[3], COMMAND_PORT
            );
            state::set_network(NetworkState::Connected(octets)).await;
            spawner.spawn(command_server(stack)).unwrap();
        }
        ConnectOutcome::Failed(report) => {
            // only reached if the reset request did not take
            state::set_network(NetworkState::Failed).await;
            error!("Still running after recovery restart: {}", report);
        }
    }
}

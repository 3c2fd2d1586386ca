//! Firmware Configuration
//!
//! Board-level constants. Timing contracts of the control core live in
//! `rover_core::config`.

use embassy_time::Duration;

/// PWM carrier for the H-bridge inputs (Hz)
pub const PWM_FREQUENCY_HZ: u32 = 20_000;

/// TCP port the command server listens on
pub const COMMAND_PORT: u16 = 81;

/// Period of the drive task's watchdog check
pub const CHECK_PERIOD: Duration = Duration::from_millis(10);

/// Period of the heartbeat log
pub const HEARTBEAT_PERIOD: Duration = Duration::from_secs(5);

/// Upper bound for one radio join attempt while the link is polled
pub const JOIN_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the control-event queue
pub const CONTROL_QUEUE_DEPTH: usize = 16;

/// Capacity of the status echo outbox
pub const STATUS_OUTBOX_DEPTH: usize = 4;

/// Total flash of the Pico 2 W
pub const FLASH_SIZE: usize = 4 * 1024 * 1024;

/// Radio firmware blob, flashed separately with
/// `probe-rs download 43439A0.bin --binary-format bin --chip RP235x --base-address 0x10380000`
pub const RADIO_FIRMWARE_ADDRESS: usize = 0x1038_0000;
pub const RADIO_FIRMWARE_LEN: usize = 230_321;

/// Radio CLM blob, flashed like the firmware at `0x103C0000`
pub const RADIO_CLM_ADDRESS: usize = 0x103C_0000;
pub const RADIO_CLM_LEN: usize = 4_752;

/// Offset of the credentials sector from the start of flash
pub const CREDENTIALS_OFFSET: u32 = 0x003F_F000;
pub const CREDENTIALS_SECTOR_LEN: u32 = 4096;

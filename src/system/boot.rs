//! Boot Target Selection
//!
//! Recovery path for a failed network join. The recovery firmware is kept in
//! the embassy-boot DFU partition; selecting it marks the partition as
//! updated so the bootloader swaps it in on the next reset. The restart goes
//! through the hardware watchdog.

use core::cell::RefCell;

use defmt::{error, info};
use embassy_boot_rp::{AlignedBuffer, BlockingFirmwareUpdater, FirmwareUpdaterConfig};
use embassy_rp::flash::{Blocking, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::watchdog::Watchdog;
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embedded_storage::nor_flash::ReadNorFlash;
use rover_core::connectivity::{BootError, BootSelector, Restart};

use crate::system::config::FLASH_SIZE;

pub type FlashDevice = Flash<'static, FLASH, Blocking, FLASH_SIZE>;

/// Flash shared between the credential reader and the boot selector
pub type SharedFlash = Mutex<NoopRawMutex, RefCell<FlashDevice>>;

/// Handle to a recovery image found in the DFU partition
#[derive(Debug, Clone, Copy, defmt::Format)]
pub struct RecoveryImage {
    /// Size of the partition holding it
    pub capacity: usize,
}

pub struct DfuBootSelector {
    flash: &'static SharedFlash,
}

impl DfuBootSelector {
    pub fn new(flash: &'static SharedFlash) -> Self {
        Self { flash }
    }
}

impl BootSelector for DfuBootSelector {
    type Image = RecoveryImage;

    fn find_recovery_image(&mut self) -> Result<RecoveryImage, BootError> {
        let config = FirmwareUpdaterConfig::from_linkerfile_blocking(self.flash, self.flash);
        let mut dfu = config.dfu;

        // start of the vector table: initial stack pointer and reset vector
        let mut header = [0u8; 8];
        dfu.read(0, &mut header).map_err(|e| {
            error!("DFU partition unreadable: {:?}", e);
            BootError::NotFound
        })?;

        if header.iter().all(|&b| b == 0xFF) {
            return Err(BootError::NotFound);
        }

        let image = RecoveryImage {
            capacity: dfu.capacity(),
        };
        info!("Recovery image found: {}", image);
        Ok(image)
    }

    fn set_next_boot(&mut self, _image: &RecoveryImage) -> Result<(), BootError> {
        let config = FirmwareUpdaterConfig::from_linkerfile_blocking(self.flash, self.flash);
        let mut aligned = AlignedBuffer([0; 1]);
        let mut updater = BlockingFirmwareUpdater::new(config, &mut aligned.0);

        updater.mark_updated().map_err(|e| {
            error!("Could not mark recovery image for boot: {:?}", e);
            BootError::WriteFailed
        })
    }
}

/// Restart through the RP watchdog
pub struct WatchdogRestart {
    watchdog: Watchdog,
}

impl WatchdogRestart {
    pub fn new(watchdog: Watchdog) -> Self {
        Self { watchdog }
    }
}

impl Restart for WatchdogRestart {
    fn restart(&mut self) {
        info!("Restarting");
        self.watchdog.trigger_reset();
    }
}

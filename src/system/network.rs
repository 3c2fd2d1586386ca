//! Network Link
//!
//! Binds the connectivity manager's link, clock and credential seams to the
//! CYW43 radio and the embassy-net stack.

use core::net::Ipv4Addr;

use cyw43::JoinOptions;
use defmt::{error, info, warn, Debug2Format};
use embassy_embedded_hal::flash::partition::BlockingPartition;
use embassy_net::Stack;
use embassy_time::{with_timeout, Instant};
use embedded_storage::nor_flash::ReadNorFlash;
use rover_core::connectivity::{Clock, JoinError, LinkStatus, NetworkLink};
use rover_core::credentials::{CredentialError, WifiCredentials};

use crate::system::boot::SharedFlash;
use crate::system::config::{CREDENTIALS_OFFSET, CREDENTIALS_SECTOR_LEN, JOIN_ATTEMPT_TIMEOUT};

/// Reads the provisioned credential record from its flash sector
pub fn read_credentials(flash: &SharedFlash) -> Result<WifiCredentials, CredentialError> {
    let mut sector = BlockingPartition::new(flash, CREDENTIALS_OFFSET, CREDENTIALS_SECTOR_LEN);
    WifiCredentials::load(|record| {
        sector
            .read(0, record)
            .map_err(|e| error!("Credential sector unreadable: {}", Debug2Format(&e)))
    })
}

/// Station link over the CYW43 radio
///
/// The radio's join call is blocking and gives up on its own, so the link
/// retries it from `status` until it succeeds. The connectivity manager
/// abandons a `status` call still joining at its deadline.
pub struct RadioLink {
    control: cyw43::Control<'static>,
    stack: Stack<'static>,
    credentials: Option<WifiCredentials>,
    joined: bool,
}

impl RadioLink {
    pub fn new(
        control: cyw43::Control<'static>,
        stack: Stack<'static>,
        credentials: Option<WifiCredentials>,
    ) -> Self {
        Self {
            control,
            stack,
            credentials,
            joined: false,
        }
    }

    async fn try_join(&mut self) -> bool {
        let Some(credentials) = &self.credentials else {
            return false;
        };

        let options = if credentials.is_open() {
            JoinOptions::new_open()
        } else {
            JoinOptions::new(credentials.password.as_bytes())
        };

        match with_timeout(
            JOIN_ATTEMPT_TIMEOUT,
            self.control.join(credentials.ssid.as_str(), options),
        )
        .await
        {
            Ok(Ok(())) => {
                info!("Joined {}", credentials.ssid.as_str());
                true
            }
            Ok(Err(e)) => {
                warn!("Join failed with status {}", e.status);
                false
            }
            Err(_) => {
                warn!("Join attempt timed out");
                false
            }
        }
    }
}

impl NetworkLink for RadioLink {
    async fn begin_join(&mut self) -> Result<(), JoinError> {
        match &self.credentials {
            Some(credentials) => {
                info!("Joining {}", credentials.ssid.as_str());
                Ok(())
            }
            None => Err(JoinError::NoCredentials),
        }
    }

    async fn status(&mut self) -> LinkStatus {
        if !self.joined {
            self.joined = self.try_join().await;
        }

        if self.joined && self.stack.is_config_up() {
            LinkStatus::Connected
        } else {
            LinkStatus::Joining
        }
    }

    fn address(&self) -> Option<Ipv4Addr> {
        self.stack
            .config_v4()
            .map(|config| Ipv4Addr::from(config.address.address().octets()))
    }
}

/// Monotonic clock backed by the embassy time driver
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

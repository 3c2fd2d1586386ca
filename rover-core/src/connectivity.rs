//! One-shot network bring-up with a recovery fallback
//!
//! At boot the device joins the stored network and polls the link until it
//! is up or the connect timeout expires. A device that cannot join must still
//! be reachable, so on failure the recovery image is selected as the next
//! boot target and the device restarts. The restart happens whatever the
//! boot selector reports; there is no in-process retry.
//!
//! The timeout bounds each status query too: a query still pending when the
//! attempt expires is abandoned, and a link reported up only after expiry
//! does not count.

use core::net::Ipv4Addr;

use embassy_futures::select::{select, Either};
use embassy_time::{Duration, Instant};
use embedded_hal_async::delay::DelayNs;

use crate::config::ConnectConfig;

/// Link state as reported by the network stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    Joining,
    /// Associated and holding an address
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum JoinError {
    /// No credentials were provisioned
    NoCredentials,
    /// The radio refused to start the join
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootError {
    /// No recovery image is present
    NotFound,
    /// The boot target could not be written
    WriteFailed,
}

/// Network join and status
#[allow(async_fn_in_trait)]
pub trait NetworkLink {
    /// Starts joining with the persisted credentials
    async fn begin_join(&mut self) -> Result<(), JoinError>;

    async fn status(&mut self) -> LinkStatus;

    fn address(&self) -> Option<Ipv4Addr>;
}

/// Selects which firmware image runs after the next restart
pub trait BootSelector {
    type Image;

    fn find_recovery_image(&mut self) -> Result<Self::Image, BootError>;

    fn set_next_boot(&mut self, image: &Self::Image) -> Result<(), BootError>;
}

pub trait Restart {
    /// Resets the device; only returns on test doubles
    fn restart(&mut self);
}

/// Monotonic time source
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectState {
    Init,
    Connecting,
    Connected,
    Failed,
}

/// Bookkeeping for the single join attempt made at boot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectivityAttempt {
    pub started_at: Instant,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub state: ConnectState,
}

impl ConnectivityAttempt {
    pub fn new(started_at: Instant, config: &ConnectConfig) -> Self {
        Self {
            started_at,
            timeout: config.timeout,
            poll_interval: config.poll_interval,
            state: ConnectState::Init,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.started_at)
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.elapsed(now) > self.timeout
    }

    /// Time left until [`Self::is_expired`] turns true
    pub fn until_expired(&self, now: Instant) -> Duration {
        (self.timeout + Duration::from_millis(1))
            .checked_sub(self.elapsed(now))
            .unwrap_or(Duration::from_ticks(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailureCause {
    JoinFailed(JoinError),
    Timeout,
}

/// What happened on the way to the recovery restart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RecoveryReport {
    pub cause: FailureCause,
    /// Time spent trying to connect
    pub elapsed: Duration,
    /// Outcome of selecting the recovery image
    pub boot_target: Result<(), BootError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected { address: Option<Ipv4Addr> },
    /// Only observable when [`Restart::restart`] returns
    Failed(RecoveryReport),
}

pub struct ConnectivityManager<C, D> {
    clock: C,
    delay: D,
    config: ConnectConfig,
}

impl<C: Clock, D: DelayNs> ConnectivityManager<C, D> {
    pub fn new(clock: C, delay: D, config: ConnectConfig) -> Self {
        Self {
            clock,
            delay,
            config,
        }
    }

    /// Joins the network, or selects the recovery image and restarts
    pub async fn bring_up<L, B, R>(
        &mut self,
        link: &mut L,
        boot: &mut B,
        restart: &mut R,
    ) -> ConnectOutcome
    where
        L: NetworkLink,
        B: BootSelector,
        R: Restart,
    {
        let mut attempt = ConnectivityAttempt::new(self.clock.now(), &self.config);

        info!("Joining network");
        if let Err(e) = link.begin_join().await {
            error!("Join could not start: {:?}", e);
            attempt.state = ConnectState::Failed;
            let elapsed = attempt.elapsed(self.clock.now());
            return self
                .recover(FailureCause::JoinFailed(e), elapsed, boot, restart)
                .await;
        }
        attempt.state = ConnectState::Connecting;

        loop {
            let until_expired = as_ms(attempt.until_expired(self.clock.now()));
            let status = match select(link.status(), self.delay.delay_ms(until_expired)).await {
                Either::First(status) => Some(status),
                Either::Second(()) => {
                    warn!("Link status still pending at the connect deadline");
                    None
                }
            };

            let now = self.clock.now();
            if status == Some(LinkStatus::Connected) && !attempt.is_expired(now) {
                attempt.state = ConnectState::Connected;
                let address = link.address();
                if let Some(address) = address {
                    info!("Connected, address {:?}", address.octets());
                }
                return ConnectOutcome::Connected { address };
            }

            if attempt.is_expired(now) {
                attempt.state = ConnectState::Failed;
                error!("No connection after {} ms", attempt.elapsed(now).as_millis());
                return self
                    .recover(FailureCause::Timeout, attempt.elapsed(now), boot, restart)
                    .await;
            }

            self.delay.delay_ms(as_ms(attempt.poll_interval)).await;
        }
    }

    async fn recover<B, R>(
        &mut self,
        cause: FailureCause,
        elapsed: Duration,
        boot: &mut B,
        restart: &mut R,
    ) -> ConnectOutcome
    where
        B: BootSelector,
        R: Restart,
    {
        let boot_target = boot
            .find_recovery_image()
            .and_then(|image| boot.set_next_boot(&image));

        let wait = match boot_target {
            Ok(()) => {
                info!("Recovery image selected, restarting");
                self.config.restart_delay
            }
            Err(e) => {
                error!("Could not select recovery image: {:?}, restarting anyway", e);
                self.config.restart_delay_on_error
            }
        };

        self.delay.delay_ms(as_ms(wait)).await;
        restart.restart();

        ConnectOutcome::Failed(RecoveryReport {
            cause,
            elapsed,
            boot_target,
        })
    }
}

fn as_ms(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}

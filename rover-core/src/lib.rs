//! Rover control core
//!
//! Hardware-agnostic pieces of the rover firmware: everything with a timing
//! contract or a safety invariant lives here so it can be exercised on the host.
//!
//! - [`command`]: command and queue event types
//! - [`drive`]: signed speed to dual duty-cycle mapping for H-bridge channels
//! - [`watchdog`]: command freshness watchdog
//! - [`control`]: owned controller state drained from the control-event queue
//! - [`protocol`]: text and structured command parsers
//! - [`status`]: status echo sent back to the operator
//! - [`framing`]: byte stream to line splitting
//! - [`credentials`]: persisted Wi-Fi credential record
//! - [`connectivity`]: bounded network bring-up with recovery-image fallback

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod command;
pub mod config;
pub mod connectivity;
pub mod control;
pub mod credentials;
pub mod drive;
pub mod framing;
pub mod protocol;
pub mod status;
pub mod watchdog;

#[cfg(test)]
pub(crate) mod testing;

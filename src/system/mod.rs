//! Core system components for rover operation
pub mod boot;
pub mod config;
pub mod event;
pub mod network;
pub mod resources;
pub mod state;

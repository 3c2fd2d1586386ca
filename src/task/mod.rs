pub mod command_server;
pub mod drive;
pub mod heartbeat;
pub mod net;

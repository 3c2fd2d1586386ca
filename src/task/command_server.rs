//! Command Server
//!
//! Accepts one operator at a time over TCP. Incoming bytes are framed into
//! lines, parsed, stamped with their arrival time and posted to the drive
//! task. Status echoes from the drive task are written back as JSON lines.
//!
//! A client connecting or going away posts a link event, which stops the
//! motors.

use defmt::{debug, info, warn};
use embassy_futures::select::{select, Either};
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::{Duration, Instant};
use embedded_io_async::Write;
use heapless::Vec;
use rover_core::command::{Command, ControlEvent};
use rover_core::config::MAX_LINE_LEN;
use rover_core::framing::LineFramer;
use rover_core::protocol;
use rover_core::status::StatusEcho;

use crate::system::config::COMMAND_PORT;
use crate::system::{event, state};

/// Idle connections are dropped after this long without traffic
const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);

const READ_CHUNK: usize = 128;

/// Empty lines are rejected, so past a line carried over from the previous
/// chunk every command takes at least two bytes of the chunk
const MAX_COMMANDS_PER_CHUNK: usize = READ_CHUNK / 2;

#[embassy_executor::task]
pub async fn command_server(stack: Stack<'static>) {
    let mut rx_buffer = [0; 1024];
    let mut tx_buffer = [0; 1024];
    let mut read_buffer = [0; READ_CHUNK];
    let mut framer = LineFramer::<MAX_LINE_LEN>::new();

    loop {
        let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
        socket.set_timeout(Some(SOCKET_TIMEOUT));

        info!("Listening on TCP:{}", COMMAND_PORT);
        if let Err(e) = socket.accept(COMMAND_PORT).await {
            warn!("Accept error: {:?}", e);
            continue;
        }

        info!("Client connected from {:?}", socket.remote_endpoint());
        framer.reset();
        event::clear_status();
        event::send(ControlEvent::LinkUp).await;
        state::set_client_connected(true).await;

        loop {
            let next = select(socket.read(&mut read_buffer), event::next_status()).await;
            match next {
                Either::First(Ok(0)) => {
                    info!("Client closed the connection");
                    break;
                }
                Either::First(Ok(n)) => {
                    let mut commands = Vec::<Command, MAX_COMMANDS_PER_CHUNK>::new();
                    framer.feed(&read_buffer[..n], |line| {
                        if let Some(command) = parse_line(line) {
                            // cannot overflow, see MAX_COMMANDS_PER_CHUNK
                            let _ = commands.push(command);
                        }
                    });
                    for command in commands {
                        event::send(ControlEvent::Command(command)).await;
                    }
                }
                Either::First(Err(e)) => {
                    warn!("Read error: {:?}", e);
                    break;
                }
                Either::Second(echo) => {
                    if let Err(e) = write_echo(&mut socket, &echo).await {
                        warn!("Write error: {:?}", e);
                        break;
                    }
                }
            }
        }

        event::send(ControlEvent::LinkDown).await;
        state::set_client_connected(false).await;
        socket.abort();
        // let the abort reach the peer before the buffers are reused
        let _ = socket.flush().await;
    }
}

/// Parses one framed line and stamps it with its arrival time
fn parse_line(line: &[u8]) -> Option<Command> {
    let received_at = Instant::now();
    match protocol::parse_line(line) {
        Ok(inbound) => Some(Command { inbound, received_at }),
        Err(e) => {
            debug!("Rejected line: {}", e);
            None
        }
    }
}

async fn write_echo(socket: &mut TcpSocket<'_>, echo: &StatusEcho) -> Result<(), embassy_net::tcp::Error> {
    match echo.to_json() {
        Ok(json) => {
            socket.write_all(json.as_bytes()).await?;
            socket.write_all(b"\n").await
        }
        Err(_) => {
            warn!("Status echo did not fit, skipped");
            Ok(())
        }
    }
}

//! Linux SocketCAN driver
//!
//! Only built with the `socketcan` feature on Linux. The interface must be
//! up already (`ip link set can0 up type can bitrate 500000`); the bitrate
//! is configured by the system, not by this reader.

use super::source::BusReader;
use crate::error::{CanLogError, Result};
use crate::types::RawFrame;
use socketcan::{CanFrame, CanSocket, EmbeddedFrame, Frame, Socket};
use std::io;
use std::time::Duration;

/// Reads frames from a SocketCAN interface
pub struct SocketCanBus {
    channel: String,
    socket: CanSocket,
    timeout: Option<Duration>,
}

impl SocketCanBus {
    /// Open `channel` (e.g. `can0`, `vcan0`)
    pub fn open(channel: &str) -> Result<Self> {
        let socket = CanSocket::open(channel).map_err(|e| {
            CanLogError::TransportDisconnected(format!("Failed to open {}: {}", channel, e))
        })?;
        tracing::info!("Opened SocketCAN interface {}", channel);
        Ok(Self {
            channel: channel.to_string(),
            socket,
            timeout: None,
        })
    }
}

impl BusReader for SocketCanBus {
    fn read_frame(&mut self, timeout: Duration) -> Result<Option<RawFrame>> {
        if self.timeout != Some(timeout) {
            self.socket
                .set_read_timeout(timeout)
                .map_err(|e| CanLogError::TransportDisconnected(e.to_string()))?;
            self.timeout = Some(timeout);
        }

        match self.socket.read_frame() {
            Ok(CanFrame::Data(frame)) => Ok(Some(RawFrame::new(frame.raw_id(), frame.data()))),
            Ok(CanFrame::Remote(_)) => Ok(None),
            Ok(CanFrame::Error(frame)) => {
                tracing::warn!("Error frame on {}: 0x{:X}", self.channel, frame.raw_id());
                Ok(None)
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Ok(None)
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(None),
            Err(e) => Err(CanLogError::TransportDisconnected(format!(
                "{}: {}",
                self.channel, e
            ))),
        }
    }

    fn name(&self) -> &str {
        &self.channel
    }

    fn shutdown(&mut self) {
        tracing::info!("Closing SocketCAN interface {}", self.channel);
    }
}

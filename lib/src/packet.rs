//! Provides the captured packet type and the trait describing a native
//! capture handle

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::error::Result;

/// Default number of bytes captured per packet
pub const DEFAULT_SNAPLEN: usize = 65535;

/// A single packet read off of the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedPacket {
    /// Time the packet was read from the native handle
    pub timestamp: SystemTime,
    /// Length of the packet as seen on the wire
    pub length: usize,
    /// Captured bytes, at most snaplen of them
    pub data: Vec<u8>,
}

impl CapturedPacket {
    /// Copies a raw frame, truncating it to `snaplen` bytes
    pub fn new(frame: &[u8], snaplen: usize) -> Self {
        let captured = frame.len().min(snaplen);

        Self {
            timestamp: SystemTime::now(),
            length: frame.len(),
            data: frame[..captured].to_vec(),
        }
    }

    /// Whether the captured bytes are shorter than the packet on the wire
    pub fn is_truncated(&self) -> bool {
        self.data.len() < self.length
    }
}

/// Trait describing a native capture handle
pub trait Reader: Send {
    /// Should return the next packet off of the wire, or None when the
    /// handle's read timeout expired before a packet arrived
    fn next_packet(&mut self) -> Result<Option<CapturedPacket>>;
}

#[cfg(test)]
#[path = "./packet_tests.rs"]
#[doc(hidden)]
pub mod mocks;

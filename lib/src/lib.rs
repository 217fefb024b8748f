//! Library package for capturing packets from local network interfaces
//!
//! A [`device::CaptureDevice`] owns a single native capture handle and
//! exposes two mutually exclusive ways of reading from it:
//!
//! - synchronously, one packet at a time, with
//!   [`device::CaptureDevice::get_next_packet`]
//! - in the background, with [`device::CaptureDevice::start_capture`], which
//!   dispatches every packet to the registered packet-arrival handlers
//!
//! # Examples
//!
//! ## Background Capture
//!
//! <https://github.com/robgonnella/r-lancap/blob/main/lib/examples/background-capture.rs>
//!
//! ```bash
//! sudo -E cargo run --example background-capture -p r-caplib
//! ```
//!
//! ## Synchronous Capture
//!
//! <https://github.com/robgonnella/r-lancap/blob/main/lib/examples/next-packet.rs>
//!
//! ```bash
//! sudo -E cargo run --example next-packet -p r-caplib
//! ```

#![deny(missing_docs)]
pub mod device;
pub mod error;
pub mod network;
pub mod packet;
pub mod wire;

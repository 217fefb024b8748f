//! Implements the default capture Backend using pnet

#[cfg(test)]
use mockall::automock;

use pnet::datalink;
use std::io;

use crate::{
    device::CaptureConfig,
    error::{RCapLibError, Result},
    network::{self, NetworkInterface},
    packet::{CapturedPacket, Reader},
};

#[cfg_attr(test, automock)]
/// Trait describing the native capture layer
pub trait Backend: Send + Sync {
    /// Should enumerate the interfaces available for capture
    fn interfaces(&self) -> Result<Vec<NetworkInterface>>;

    /// Should acquire a native capture handle on the given interface
    fn open(
        &self,
        interface: &NetworkInterface,
        config: &CaptureConfig,
    ) -> Result<Box<dyn Reader>>;
}

/// A pnet datalink implementation of [`Backend`]
#[derive(Debug, Clone, Copy, Default)]
pub struct PNetBackend;

impl Backend for PNetBackend {
    fn interfaces(&self) -> Result<Vec<NetworkInterface>> {
        let gateways = network::get_default_gateways();

        Ok(datalink::interfaces()
            .into_iter()
            .map(|iface| {
                let gws = gateways.get(&iface.name).cloned().unwrap_or_default();
                NetworkInterface::from(iface).with_gateways(gws)
            })
            .collect())
    }

    fn open(
        &self,
        interface: &NetworkInterface,
        config: &CaptureConfig,
    ) -> Result<Box<dyn Reader>> {
        let cfg = datalink::Config {
            read_timeout: Some(config.read_timeout),
            read_buffer_size: config.buffer_size,
            promiscuous: config.promiscuous,
            ..Default::default()
        };

        let receiver = match datalink::channel(&interface.into(), cfg) {
            Ok(datalink::Channel::Ethernet(_, rx)) => Ok(rx),
            Ok(_) => Err(RCapLibError::Wire(format!(
                "unsupported channel type for {}",
                interface.name
            ))),
            Err(e) => Err(RCapLibError::Wire(e.to_string())),
        }?;

        log::debug!("opened pnet channel on {}", interface.name);

        Ok(Box::new(PNetReader {
            receiver,
            snaplen: config.snaplen,
        }))
    }
}

/// A PNetReader implementation of packet Reader
pub struct PNetReader {
    receiver: Box<dyn datalink::DataLinkReceiver>,
    snaplen: usize,
}

// Implements the Reader trait for our PNet implementation
impl Reader for PNetReader {
    fn next_packet(&mut self) -> Result<Option<CapturedPacket>> {
        match self.receiver.next() {
            Ok(frame) => Ok(Some(CapturedPacket::new(frame, self.snaplen))),
            Err(e) if is_read_timeout(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_read_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
#[path = "./wire_tests.rs"]
mod tests;

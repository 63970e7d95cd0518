use crate::error::Result;
use crate::packet::Packet;
use std::time::Duration;

/// The capability the handshake needs from the persistent transport once the
/// probe succeeds: send a packet, receive the next packet, bound the wait,
/// close. The handshake core carries no dependency on a concrete websocket
/// implementation beyond this trait.
pub trait Transport: Send + Sync {
    /// Sends a single packet to the server.
    fn send(&self, packet: Packet) -> Result<()>;

    /// Blocks until the next packet arrives. Single consumer.
    fn receive(&self) -> Result<Packet>;

    /// Bounds every following `receive` call. A receive that runs past the
    /// deadline fails with an io timeout error. `None` removes the bound.
    fn set_receive_timeout(&self, timeout: Option<Duration>) -> Result<()>;

    /// Closes the transport.
    fn close(&self) -> Result<()>;
}

impl std::fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Transport")
    }
}

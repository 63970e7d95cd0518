mod builder;
#[allow(clippy::module_inception)]
mod client;
pub(crate) mod handshake;

pub use builder::{ClientBuilder, DEFAULT_HANDSHAKE_TIMEOUT};
pub use client::{Client, Iter};
pub use handshake::Stage;

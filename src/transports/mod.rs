mod polling;
mod websocket;

pub use polling::PollingTransport;
pub use websocket::WebsocketTransport;

//! # engineio-client
//!
//! A client for the `engine.io` transport-negotiation handshake (revision 4
//! of the protocol): it opens a session over HTTP long-polling, runs the
//! probe/upgrade sequence and migrates the session onto a websocket without
//! losing or reordering any in-flight packets. Packets that reach the client
//! while the handshake is still polling are replayed to the registered
//! callbacks, in arrival order, before anything received over the upgraded
//! transport.
//!
//! ## Example usage
//!
//! ``` no_run
//! use engineio_client::{connect, Client, packet::{Packet, PacketId}};
//!
//! // open a session; the returned client is already upgraded to websocket
//! let client: Client = connect("http://localhost:4201", "").expect("Connection failed");
//!
//! // send a message packet
//! let packet = Packet::new(PacketId::Message, "Hello World");
//! client.emit(packet).expect("Server unreachable");
//!
//! // receive the next packet
//! let reply = client.poll().expect("Connection lost");
//! println!("{reply:?}");
//!
//! // close the session
//! client.disconnect().expect("Disconnect failed")
//! ```
//!
//! The main entry point is the [`ClientBuilder`], which also takes custom
//! query pairs, headers, a tls configuration and the `on_open`/`on_packet`/
//! `on_data`/`on_error`/`on_close` callbacks. The free [`connect`] function
//! covers the common case.
//!
//! Binary payloads (the base64 `b` marker) are not supported; the handshake
//! layer itself only ever exchanges text packets.
//!
#![warn(clippy::complexity)]
#![warn(clippy::style)]
#![warn(clippy::perf)]
#![warn(clippy::correctness)]
/// A small macro that spawns a scoped thread. Used for calling the callback
/// functions.
macro_rules! spawn_scoped {
    ($e:expr) => {
        std::thread::scope(|s| {
            s.spawn(|| $e);
        });
    };
}

pub mod address;
mod callback;
pub mod client;
pub mod packet;
pub mod transport;
pub mod transports;

pub const ENGINE_IO_VERSION: i32 = 4;

/// Contains the error type which will be returned with every result in this
/// crate. Handles all kinds of errors.
pub mod error;

pub use client::{Client, ClientBuilder, Stage};
pub use error::Error;
pub use packet::{Packet, PacketId, Payload};

/// Connects to an `engine.io` server, running the full polling handshake and
/// websocket upgrade. `query` holds extra query pairs (may be empty). The
/// URI must name an explicit port.
pub fn connect(uri: &str, query: &str) -> error::Result<Client> {
    ClientBuilder::from_uri(uri)?.query(query).connect()
}

#[cfg(test)]
pub(crate) mod test {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use url::Url;

    /// A scripted HTTP/1.1 server: answers each accepted connection with the
    /// next canned response and records what the client sent.
    pub(crate) struct StubServer {
        port: u16,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubServer {
        pub(crate) fn start(responses: Vec<String>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let port = listener.local_addr().unwrap().port();
            let requests: Arc<Mutex<Vec<String>>> = Arc::default();

            let recorded = requests.clone();
            thread::spawn(move || {
                for response in responses {
                    let Ok((stream, _)) = listener.accept() else {
                        return;
                    };
                    handle_exchange(stream, &recorded, &response);
                }
            });

            StubServer { port, requests }
        }

        pub(crate) fn base_url(&self) -> Url {
            Url::parse(&format!("http://127.0.0.1:{}/socket.io/?EIO=4", self.port)).unwrap()
        }

        /// Every request seen so far: request line, headers (lowercased
        /// names) and body, concatenated.
        pub(crate) fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    fn handle_exchange(mut stream: TcpStream, recorded: &Arc<Mutex<Vec<String>>>, response: &str) {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut head = String::new();
        let mut content_length = 0usize;

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap_or(0) == 0 {
                break;
            }
            if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap_or(0);
            }
            let done = line == "\r\n";
            head.push_str(&line);
            if done {
                break;
            }
        }

        let mut body = vec![0u8; content_length];
        if content_length > 0 {
            reader.read_exact(&mut body).unwrap();
        }
        head.push_str(&String::from_utf8_lossy(&body));
        recorded.lock().unwrap().push(head);

        stream.write_all(response.as_bytes()).unwrap();
        let _ = stream.flush();
        // dropping the stream closes the connection, one exchange per accept
    }

    /// A canned `200 OK` response with the given content type and body.
    pub(crate) fn response(content_type: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }
}

//! Framed TCP transport with routing identities.
//!
//! The broker core never touches sockets directly: it consumes a
//! poll/recv/send interface over multipart framed messages. The transport
//! runs its own reader and writer tasks per connection, but the dispatch
//! loop remains the sole consumer of inbound traffic.

mod connection;
mod frames;
mod identity;
mod router;

pub use connection::Connection;
pub use frames::{MultipartCodec, TransportError, MAX_FRAME_SIZE};
pub use identity::SocketIdentity;
pub use router::RouterEndpoint;

//! Duplex transport interface to the remote conversational service
//!
//! The transport itself is provided by the embedding application; this
//! module defines the wire message types and the traits a transport must
//! implement.

pub mod duplex;
pub mod messages;

pub use duplex::{SessionTransport, TransportConnector, TransportEvent};
pub use messages::{ClientEvent, ServerEvent, WireAudioChunk};

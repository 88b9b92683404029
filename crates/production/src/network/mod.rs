//! Network transport and wire codec.

pub mod codec;
mod transport;
pub mod wire;

pub use codec::{decode_event, decode_message, encode_message, CodecError};
pub use transport::{
    listen, ChannelTransport, InboundFrame, TcpTransport, Transport, TransportError,
    MAX_FRAME_SIZE,
};

//! Marker traits for messages sent between replicas.

/// A message that can travel over the network.
///
/// The type id selects the decoder on the receiving side.
pub trait NetworkMessage: Send + Sync + 'static {
    fn message_type_id() -> &'static str;
}

/// A request with a statically paired response type.
pub trait Request: NetworkMessage {
    type Response: NetworkMessage;
}

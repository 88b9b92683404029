//! Message encoding and decoding for network transport.
//!
//! # Wire Format
//!
//! Every message is SBOR-encoded, LZ4-compressed and prefixed with its
//! message type id:
//!
//! ```text
//! [id length: u8][message type id][LZ4 compressed SBOR payload]
//! ```
//!
//! # Type Dispatch
//!
//! The message type id (see [`NetworkMessage::message_type_id`]) selects the
//! decoder. Messages carry no sender: the transport attaches the peer the
//! frame arrived from.

use super::wire::{self, WireError};
use quorum_core::{Event, OutboundMessage};
use quorum_messages::{
    CommittedCommandsRequest, CommittedCommandsResponse, GetVerticesErrorResponse,
    GetVerticesRequest, GetVerticesResponse,
};
use quorum_types::{NetworkMessage, ValidatorId};
use thiserror::Error;

/// Errors that can occur during message encoding/decoding.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Message too short")]
    MessageTooShort,

    #[error("SBOR decode error: {0}")]
    SborDecode(String),

    #[error("SBOR encode error: {0}")]
    SborEncode(String),

    #[error("Decompression error: {0}")]
    Decompress(#[from] WireError),

    #[error("Unknown message type: {0}")]
    UnknownType(String),
}

/// Message type id of an outbound message.
pub fn message_type_id(message: &OutboundMessage) -> &'static str {
    match message {
        OutboundMessage::GetVerticesRequest(_) => GetVerticesRequest::message_type_id(),
        OutboundMessage::GetVerticesResponse(_) => GetVerticesResponse::message_type_id(),
        OutboundMessage::GetVerticesErrorResponse(_) => {
            GetVerticesErrorResponse::message_type_id()
        }
        OutboundMessage::CommittedCommandsRequest(_) => {
            CommittedCommandsRequest::message_type_id()
        }
        OutboundMessage::CommittedCommandsResponse(_) => {
            CommittedCommandsResponse::message_type_id()
        }
    }
}

/// Encode an outbound message to wire format.
pub fn encode_message(message: &OutboundMessage) -> Result<Vec<u8>, CodecError> {
    let sbor_bytes = match message {
        OutboundMessage::GetVerticesRequest(request) => sbor::basic_encode(request),
        OutboundMessage::GetVerticesResponse(response) => sbor::basic_encode(response),
        OutboundMessage::GetVerticesErrorResponse(response) => {
            sbor::basic_encode(response.as_ref())
        }
        OutboundMessage::CommittedCommandsRequest(request) => sbor::basic_encode(request),
        OutboundMessage::CommittedCommandsResponse(response) => {
            sbor::basic_encode(response.as_ref())
        }
    }
    .map_err(|e| CodecError::SborEncode(format!("{:?}", e)))?;

    let type_id = message_type_id(message).as_bytes();
    let compressed = wire::compress(&sbor_bytes);
    let mut bytes = Vec::with_capacity(1 + type_id.len() + compressed.len());
    bytes.push(type_id.len() as u8);
    bytes.extend_from_slice(type_id);
    bytes.extend_from_slice(&compressed);
    Ok(bytes)
}

/// Decode a message from wire format.
pub fn decode_message(data: &[u8]) -> Result<OutboundMessage, CodecError> {
    let (&id_len, rest) = data.split_first().ok_or(CodecError::MessageTooShort)?;
    let id_len = id_len as usize;
    if rest.len() <= id_len {
        return Err(CodecError::MessageTooShort);
    }
    let (type_id, compressed) = rest.split_at(id_len);
    let type_id = std::str::from_utf8(type_id)
        .map_err(|_| CodecError::UnknownType(format!("{:?}", type_id)))?;

    let payload = wire::decompress(compressed)?;

    let decode_error = |e: sbor::DecodeError| CodecError::SborDecode(format!("{:?}", e));
    let message = match type_id {
        id if id == GetVerticesRequest::message_type_id() => OutboundMessage::GetVerticesRequest(
            sbor::basic_decode(&payload).map_err(decode_error)?,
        ),
        id if id == GetVerticesResponse::message_type_id() => {
            OutboundMessage::GetVerticesResponse(
                sbor::basic_decode(&payload).map_err(decode_error)?,
            )
        }
        id if id == GetVerticesErrorResponse::message_type_id() => {
            let response: GetVerticesErrorResponse =
                sbor::basic_decode(&payload).map_err(decode_error)?;
            OutboundMessage::GetVerticesErrorResponse(Box::new(response))
        }
        id if id == CommittedCommandsRequest::message_type_id() => {
            OutboundMessage::CommittedCommandsRequest(
                sbor::basic_decode(&payload).map_err(decode_error)?,
            )
        }
        id if id == CommittedCommandsResponse::message_type_id() => {
            let response: CommittedCommandsResponse =
                sbor::basic_decode(&payload).map_err(decode_error)?;
            OutboundMessage::CommittedCommandsResponse(Box::new(response))
        }
        other => return Err(CodecError::UnknownType(other.to_string())),
    };
    Ok(message)
}

/// Decode a frame received from `from` into the event it delivers.
pub fn decode_event(from: ValidatorId, data: &[u8]) -> Result<Event, CodecError> {
    Ok(decode_message(data)?.into_received_event(from))
}

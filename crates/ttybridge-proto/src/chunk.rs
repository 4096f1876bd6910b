//! Outbound chunking of transfer-protocol payloads.
//!
//! Transfer codecs can emit arbitrarily large bursts. Each burst is split into
//! `Input` frames of at most [`MAX_CHUNK_PAYLOAD`] payload bytes so that no
//! single message exceeds 4096 bytes including the tag.

use bytes::Bytes;

use crate::{ClientCommand, Frame};

/// Largest payload carried by one outbound chunk (4096 minus the tag byte).
pub const MAX_CHUNK_PAYLOAD: usize = 4095;

/// Split `payload` into `Input` frames of at most [`MAX_CHUNK_PAYLOAD`] bytes.
///
/// Produces `ceil(len / MAX_CHUNK_PAYLOAD)` frames, none for an empty payload.
/// Concatenating the frame payloads in order yields `payload` exactly.
pub fn chunk_input(payload: &[u8]) -> impl Iterator<Item = Frame> + '_ {
    payload
        .chunks(MAX_CHUNK_PAYLOAD)
        .map(|chunk| Frame::client(ClientCommand::Input, Bytes::copy_from_slice(chunk)))
}

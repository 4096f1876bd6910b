//! Fuzz target for message decoding
//!
//! Feeds arbitrary bytes to every decoder a peer can reach:
//! - `Frame::decode` (command byte split)
//! - `ServerMessage::decode` (title, preferences and reconnect payloads)
//! - `ClientMessage::decode` (resize and handshake JSON)
//!
//! # Invariants
//!
//! - No decoder panics; malformed input returns an error
//! - A decoded server message re-encodes without panicking

#![no_main]

use libfuzzer_sys::fuzz_target;
use ttybridge_proto::{ClientMessage, Frame, ServerMessage};

fuzz_target!(|data: &[u8]| {
    let _ = Frame::decode(data);
    let _ = ClientMessage::decode(data);

    if let Ok(message) = ServerMessage::decode(data) {
        let _ = message.into_frame().map(|frame| frame.to_bytes());
    }
});

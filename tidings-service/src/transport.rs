//! Chat response stream: paced text, then an optional tool payload.

pub mod decoder;
pub mod encoder;
pub mod frame;

pub use decoder::{DecodedMessage, DecoderState, StreamDecoder};
pub use encoder::{Cadence, encode};
pub use frame::{DELIMITER, StreamFrame};

//! Sequence decoding of per-timestep character probabilities into text.

mod alphabet;
mod decoder;

pub use alphabet::Alphabet;
pub use decoder::{DecodeError, DecodedText, SequenceDecoder};

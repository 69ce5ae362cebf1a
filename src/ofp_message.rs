use std::io::{self, Cursor};

use thiserror::Error;

/// Failures raised while marshaling or parsing OpenFlow structures.
///
/// A parse failure leaves the byte stream at an unknown alignment; callers must
/// discard the enclosing message rather than attempt to resume.
#[derive(Debug, Error)]
pub enum OfpSerializationError {
    #[error("truncated {what}: {needed} bytes required, {available} available")]
    TruncatedInput {
        what: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("malformed instruction: {0}")]
    MalformedInstruction(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("unknown {kind} {value:#x}")]
    UnknownVariant { kind: &'static str, value: u32 },
    #[error("{what} of {len} bytes exceeds the {max} bytes its length field can carry")]
    ValueTooLarge {
        what: &'static str,
        len: usize,
        max: usize,
    },
    #[error("i/o: {0}")]
    Io(#[from] io::Error),
}

impl OfpSerializationError {
    /// Report a short nested stream as a malformed `message`. Every other
    /// error passes through unchanged.
    pub fn nested_in(self, message: &'static str) -> OfpSerializationError {
        match self {
            OfpSerializationError::TruncatedInput { what, needed, available } => {
                OfpSerializationError::MalformedMessage(format!(
                    "{} overruns {}: {} bytes required, {} available",
                    what, message, needed, available
                ))
            }
            e => e,
        }
    }
}

/// OpenFlow structure codec
///
/// Common API for every structure carried in flow and group programming messages.
/// `parse` reads from a cursor positioned at the start of the structure; for the
/// structures without an explicit length (`FlowMod`, `GroupMod`) the cursor must be
/// bounded to the message body by the caller.
pub trait OfpCodec: Sized {
    /// Return the byte-size of the marshaled structure, padding included.
    fn size_of(&self) -> usize;
    /// Parse a structure, advancing `bytes` past everything it consumed.
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Self, OfpSerializationError>;
    /// Append the marshaled structure to `bytes`.
    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError>;

    /// Return a fresh buffer holding the marshaled structure.
    fn encode(&self) -> Result<Vec<u8>, OfpSerializationError> {
        let mut bytes = Vec::with_capacity(self.size_of());
        self.marshal(&mut bytes)?;
        Ok(bytes)
    }

    /// Parse a structure from the start of `buf`, returning it with the number of
    /// bytes it occupied.
    fn decode(buf: &[u8]) -> Result<(Self, usize), OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let value = Self::parse(&mut bytes)?;
        Ok((value, bytes.position() as usize))
    }
}

//! Primitive codec shared by every OpenFlow structure: big-endian fields are
//! handled by `byteorder`, this module covers byte accounting, bounded reads and
//! the 8-byte alignment rule.

use std::io::{BufRead, Cursor};

use crate::ofp_message::OfpSerializationError;

/// Every self-describing OpenFlow record is padded to a multiple of this.
pub const ALIGNMENT: usize = 8;

/// Number of unread bytes left in `bytes`.
pub fn remaining(bytes: &Cursor<&[u8]>) -> usize {
    bytes.get_ref().len().saturating_sub(bytes.position() as usize)
}

/// Fail with `TruncatedInput` unless at least `needed` bytes are left to read.
pub fn ensure_remaining(bytes: &Cursor<&[u8]>,
                        needed: usize,
                        what: &'static str)
                        -> Result<(), OfpSerializationError> {
    let available = remaining(bytes);
    if available < needed {
        return Err(OfpSerializationError::TruncatedInput {
            what: what,
            needed: needed,
            available: available,
        });
    }
    Ok(())
}

/// Read exactly `len` bytes as a borrowed slice and advance past them.
///
/// The length is checked against the input before anything is consumed, so a
/// corrupt length field never moves the cursor or allocates.
pub fn read_slice<'a>(bytes: &mut Cursor<&'a [u8]>,
                      len: usize,
                      what: &'static str)
                      -> Result<&'a [u8], OfpSerializationError> {
    ensure_remaining(bytes, len, what)?;
    let buf: &'a [u8] = *bytes.get_ref();
    let start = bytes.position() as usize;
    bytes.consume(len);
    Ok(&buf[start..start + len])
}

/// Skip `len` padding bytes.
pub fn skip_padding(bytes: &mut Cursor<&[u8]>,
                    len: usize,
                    what: &'static str)
                    -> Result<(), OfpSerializationError> {
    ensure_remaining(bytes, len, what)?;
    bytes.consume(len);
    Ok(())
}

/// Append `len` zero bytes.
pub fn write_padding_bytes(bytes: &mut Vec<u8>, len: usize) {
    bytes.resize(bytes.len() + len, 0);
}

/// Bytes needed after a record of `len` bytes to reach the next 8-byte boundary.
pub fn pad_len(len: usize) -> usize {
    (ALIGNMENT - len % ALIGNMENT) % ALIGNMENT
}

/// Round `len` up to a multiple of 8.
pub fn align(len: usize) -> usize {
    len + pad_len(len)
}

/// Convert a computed record length into its 16-bit wire field.
pub fn length_field(len: usize, what: &'static str) -> Result<u16, OfpSerializationError> {
    if len > u16::MAX as usize {
        return Err(OfpSerializationError::ValueTooLarge {
            what: what,
            len: len,
            max: u16::MAX as usize,
        });
    }
    Ok(len as u16)
}

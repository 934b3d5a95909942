//! Unsigned LEB128 length prefixes.
//!
//! Variable-length encoding where small values use fewer bytes:
//! - 0-127: 1 byte
//! - 128-16383: 2 bytes
//! - 16384-2097151: 3 bytes
//! - etc.
//!
//! Only the minimal encoding of a value is accepted on read.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::CommunicatorError;

/// Append a variable-length integer to a buffer
pub fn write_varint(buf: &mut BytesMut, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80; // Set continuation bit
        }
        buf.put_u8(byte);
        if value == 0 {
            break;
        }
    }
}

/// Read a variable-length integer from a stream, one byte at a time.
///
/// Never consumes more bytes than the prefix itself, so the stream stays
/// positioned at the start of the payload.
pub async fn read_varint<R>(reader: &mut R) -> Result<u64, CommunicatorError>
where
    R: AsyncRead + Unpin,
{
    let mut result: u64 = 0;
    let mut shift = 0;

    loop {
        let byte = reader.read_u8().await?;

        // The tenth byte may only carry the top bit of a u64.
        if shift == 63 && byte > 1 {
            return Err(CommunicatorError::Framing(
                "varint length prefix overflows u64".to_string(),
            ));
        }

        result |= u64::from(byte & 0x7F) << shift;

        if byte & 0x80 == 0 {
            if byte == 0 && shift > 0 {
                return Err(CommunicatorError::Framing(
                    "non-minimal varint length prefix".to_string(),
                ));
            }
            return Ok(result);
        }

        shift += 7;
    }
}

/// Calculate the number of bytes needed to encode a value as VarInt
pub fn varint_size(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let bits = 64 - value.leading_zeros() as usize;
    bits.div_ceil(7)
}

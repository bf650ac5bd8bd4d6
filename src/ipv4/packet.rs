//! Assembly of one contiguous `[header][payload]` packet into a
//! caller-supplied buffer.

use super::{HeaderTemplate, Ipv4HeaderBuilder, HEADER_OCTETS};
use thiserror::Error as ThisError;

/// Composes a complete packet into `buffer` and returns the number of bytes
/// written.
///
/// Nothing is written unless the whole packet fits: on error the buffer is
/// untouched. The emitted header is unfragmented; oversized payloads are
/// the fragmenter's job.
pub fn assemble(
    buffer: &mut [u8],
    template: &HeaderTemplate,
    payload: &[u8],
    dont_fragment: bool,
) -> Result<usize, AssembleError> {
    let needed = HEADER_OCTETS + payload.len();
    let total_length = u16::try_from(needed).map_err(|_| AssembleError::PayloadTooLong)?;
    if buffer.len() < needed {
        return Err(AssembleError::BufferTooSmall {
            needed,
            capacity: buffer.len(),
        });
    }

    let mut builder = Ipv4HeaderBuilder::new(
        template.source,
        template.destination,
        template.protocol,
        total_length,
    )
    .identification(template.identification)
    .time_to_live(template.time_to_live);
    if dont_fragment {
        builder = builder.dont_fragment();
    }
    buffer[..HEADER_OCTETS].copy_from_slice(&builder.build());
    buffer[HEADER_OCTETS..needed].copy_from_slice(payload);
    Ok(needed)
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum AssembleError {
    #[error("needed {needed} bytes of buffer capacity, found {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },
    #[error("the payload does not fit the 16-bit total length field")]
    PayloadTooLong,
}

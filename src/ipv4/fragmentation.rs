//! Implements the sending side of section 3.2, An Example Fragmentation
//! Procedure, from page 26 of RFC 791
//! <https://www.rfc-editor.org/rfc/rfc791>. Reassembly belongs to the
//! receiver and is not provided here.

use super::{HeaderTemplate, Ipv4HeaderBuilder, HEADER_OCTETS};
use std::fmt::Debug;
use thiserror::Error as ThisError;

/// The number of payload bytes per fragment offset unit.
const FRAGMENT_BLOCK: usize = 8;

/// Splits `payload` into fragments that fit `mtu` and hands each complete
/// fragment buffer to `sink` in increasing offset order. Returns the number
/// of fragments emitted.
///
/// Payload is only ever cut at 8-byte boundaries, because the fragment
/// offset field counts in 8-byte units. Every fragment except the last
/// carries the more-fragments flag, and all of them share the template's
/// identification.
///
/// The slice passed to the sink is valid only for the duration of that
/// call; a sink that needs the bytes later must copy them. A sink error
/// aborts the run with no further fragments prepared.
pub fn fragment<E: Debug>(
    template: &HeaderTemplate,
    payload: &[u8],
    mtu: u16,
    mut sink: impl FnMut(&[u8]) -> Result<(), E>,
) -> Result<usize, FragmentError<E>> {
    if (mtu as usize) < HEADER_OCTETS + FRAGMENT_BLOCK {
        return Err(FragmentError::MtuTooSmall(mtu));
    }
    if payload.len() > u16::MAX as usize - HEADER_OCTETS {
        return Err(FragmentError::PayloadTooLong(payload.len()));
    }

    // NFB*8 from the RFC: the largest 8-byte-aligned capacity under the MTU.
    let capacity = (mtu as usize - HEADER_OCTETS) & !(FRAGMENT_BLOCK - 1);
    tracing::trace!(
        payload_length = payload.len(),
        mtu = mtu as usize,
        capacity,
        "fragmenting datagram"
    );

    let mut buffer = vec![0u8; HEADER_OCTETS + capacity.min(payload.len())];
    let mut offset = 0;
    let mut emitted = 0;
    while offset < payload.len() {
        let slice = &payload[offset..(offset + capacity).min(payload.len())];
        let more_fragments = offset + slice.len() < payload.len();
        let fragment_length = HEADER_OCTETS + slice.len();

        let mut builder = Ipv4HeaderBuilder::new(
            template.source,
            template.destination,
            template.protocol,
            fragment_length as u16,
        )
        .identification(template.identification)
        .time_to_live(template.time_to_live)
        .fragment_offset((offset / FRAGMENT_BLOCK) as u16);
        if more_fragments {
            builder = builder.more_fragments();
        }
        buffer[..HEADER_OCTETS].copy_from_slice(&builder.build());
        buffer[HEADER_OCTETS..fragment_length].copy_from_slice(slice);

        tracing::trace!(
            offset_units = offset / FRAGMENT_BLOCK,
            length = fragment_length,
            more_fragments,
            "emitting fragment"
        );
        sink(&buffer[..fragment_length]).map_err(|cause| FragmentError::SinkAborted {
            emitted: emitted + 1,
            cause,
        })?;
        emitted += 1;
        offset += slice.len();
    }
    Ok(emitted)
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum FragmentError<E: Debug> {
    /// The MTU cannot carry a header plus one 8-byte payload block.
    #[error("an MTU of {0} cannot carry a header and any payload block")]
    MtuTooSmall(u16),
    /// The payload could never have formed a legal IPv4 datagram, so its
    /// tail would overflow the 13-bit fragment offset field.
    #[error("a payload of {0} bytes does not fit an IPv4 datagram")]
    PayloadTooLong(usize),
    /// The sink rejected a delivery. `emitted` counts the sink invocations
    /// made, the rejected one included.
    #[error("the sink aborted the run after {emitted} fragments")]
    SinkAborted { emitted: usize, cause: E },
}

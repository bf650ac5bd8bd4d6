use super::{Ipv4Address, BASE_WORDS, DEFAULT_TIME_TO_LIVE, FRAGMENT_OFFSET_MASK, HEADER_OCTETS};
use crate::utility::{checksum, Checksum};
use std::fmt::{self, Debug, Formatter};
use thiserror::Error as ThisError;

/// An IPv4 header, as described in RFC 791 p11 s3.1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ipv4Header {
    /// Internet Header Length, the number of `u32` words in the header
    pub ihl: u8,
    /// The quality of service desired, carried uninterpreted
    pub type_of_service: u8,
    /// The length of the datagram in bytes, header included
    pub total_length: u16,
    /// Assigned by the sender to correlate the fragments of one datagram
    pub identification: u16,
    /// Where in the datagram this fragment belongs, in units of 8 bytes
    pub fragment_offset: u16,
    /// Flags describing fragmentation properties
    pub flags: ControlFlags,
    /// The number of remaining hops this datagram can take before being
    /// removed
    pub time_to_live: u8,
    /// Indicates the next level protocol in the data portion of the
    /// datagram
    pub protocol: u8,
    /// The header checksum as transmitted
    pub checksum: u16,
    /// The source address
    pub source: Ipv4Address,
    /// The destination address
    pub destination: Ipv4Address,
}

impl Ipv4Header {
    /// The header length in bytes.
    pub fn header_length(&self) -> usize {
        self.ihl as usize * 4
    }

    /// The payload length in bytes.
    pub fn payload_length(&self) -> usize {
        self.total_length as usize - self.header_length()
    }
}

/// The result of parsing a received buffer: the decoded header plus the
/// facts a caller acts on independently of structural validity.
///
/// A bad checksum is not garbage. The header stays fully inspectable so the
/// caller can decide what to do with the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedHeader {
    /// The decoded header fields
    pub header: Ipv4Header,
    /// Whether the header declares options (header length over 20 bytes).
    /// Options are verified as part of the checksum but never interpreted.
    pub has_options: bool,
    /// Whether the received checksum matches a zero-filled recomputation
    pub checksum_valid: bool,
}

impl ParsedHeader {
    /// Parses and validates the header at the front of a received buffer.
    ///
    /// Structural problems are hard errors. Checksum mismatch and options
    /// presence are reported through the returned value instead. Nothing
    /// past the declared header length is read.
    pub fn from_bytes(buffer: &[u8]) -> Result<Self, ParseError> {
        if buffer.len() < HEADER_OCTETS {
            return Err(ParseError::HeaderTooShort);
        }

        let version = buffer[0] >> 4;
        if version != 4 {
            return Err(ParseError::IncorrectIpv4Version(version));
        }

        let ihl = buffer[0] & 0b1111;
        let header_length = ihl as usize * 4;
        if header_length < HEADER_OCTETS || header_length > buffer.len() {
            return Err(ParseError::InvalidHeaderLength(ihl));
        }

        let total_length = u16::from_be_bytes([buffer[2], buffer[3]]);
        if (total_length as usize) < header_length || total_length as usize > buffer.len() {
            return Err(ParseError::InvalidTotalLength {
                total_length,
                buffer_length: buffer.len(),
            });
        }

        let flags_and_fragment_offset = u16::from_be_bytes([buffer[6], buffer[7]]);
        let received_checksum = u16::from_be_bytes([buffer[10], buffer[11]]);

        // Recompute over the whole declared header with the checksum field
        // taken as zero. Both spans have even length, so the byte pairing
        // is preserved across the gap.
        let mut computed = Checksum::new();
        computed.accumulate_remainder(buffer[..10].iter().copied());
        computed.accumulate_remainder(buffer[12..header_length].iter().copied());
        let checksum_valid = computed.as_u16() == received_checksum;

        let header = Ipv4Header {
            ihl,
            type_of_service: buffer[1],
            total_length,
            identification: u16::from_be_bytes([buffer[4], buffer[5]]),
            fragment_offset: flags_and_fragment_offset & FRAGMENT_OFFSET_MASK,
            flags: ControlFlags::from((flags_and_fragment_offset >> 13) as u8),
            time_to_live: buffer[8],
            protocol: buffer[9],
            checksum: received_checksum,
            source: Ipv4Address::new([buffer[12], buffer[13], buffer[14], buffer[15]]),
            destination: Ipv4Address::new([buffer[16], buffer[17], buffer[18], buffer[19]]),
        };

        Ok(Self {
            header,
            has_options: ihl > BASE_WORDS,
            checksum_valid,
        })
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("the buffer is too short to hold an IPv4 header")]
    HeaderTooShort,
    #[error("expected version 4 in IPv4 header, found {0}")]
    IncorrectIpv4Version(u8),
    #[error("the declared header length of {0} words is inconsistent with the buffer")]
    InvalidHeaderLength(u8),
    #[error("the declared total length {total_length} does not fit between the header and the {buffer_length} byte buffer")]
    InvalidTotalLength {
        total_length: u16,
        buffer_length: usize,
    },
}

/// A builder for optionless IPv4 headers. The fields align with those found
/// on [`Ipv4Header`].
///
/// Fragment-related fields default to zero; a header built without touching
/// them fronts an unfragmented datagram.
#[derive(Debug, Clone, Copy)]
pub struct Ipv4HeaderBuilder {
    type_of_service: u8,
    total_length: u16,
    identification: u16,
    fragment_offset: u16,
    flags: ControlFlags,
    time_to_live: u8,
    protocol: u8,
    source: Ipv4Address,
    destination: Ipv4Address,
}

impl Ipv4HeaderBuilder {
    /// Creates a new builder. `total_length` is the header plus payload
    /// length of the datagram this header fronts.
    pub fn new(
        source: Ipv4Address,
        destination: Ipv4Address,
        protocol: u8,
        total_length: u16,
    ) -> Self {
        Self {
            type_of_service: 0,
            total_length,
            identification: 0,
            fragment_offset: 0,
            flags: ControlFlags::default(),
            time_to_live: 0,
            protocol,
            source,
            destination,
        }
    }

    /// Sets the type of service byte, carried uninterpreted.
    pub fn type_of_service(mut self, type_of_service: u8) -> Self {
        self.type_of_service = type_of_service;
        self
    }

    /// Sets the identification field.
    pub fn identification(mut self, identification: u16) -> Self {
        self.identification = identification;
        self
    }

    /// Sets the time to live. Zero selects the default of 64.
    pub fn time_to_live(mut self, time_to_live: u8) -> Self {
        self.time_to_live = time_to_live;
        self
    }

    /// Forbids routers from fragmenting this datagram.
    pub fn dont_fragment(mut self) -> Self {
        self.flags.set_dont_fragment(true);
        self
    }

    /// Marks this header as fronting a non-terminal fragment.
    pub fn more_fragments(mut self) -> Self {
        self.flags.set_more_fragments(true);
        self
    }

    /// Sets the fragment offset in units of 8 bytes.
    pub fn fragment_offset(mut self, fragment_offset: u16) -> Self {
        self.fragment_offset = fragment_offset & FRAGMENT_OFFSET_MASK;
        self
    }

    /// Serializes the header. The checksum is computed over the final field
    /// values, with the checksum field held at zero while the sum is taken.
    pub fn build(self) -> [u8; HEADER_OCTETS] {
        let mut header = [0u8; HEADER_OCTETS];
        header[0] = (4u8 << 4) | BASE_WORDS;
        header[1] = self.type_of_service;
        header[2..4].copy_from_slice(&self.total_length.to_be_bytes());
        header[4..6].copy_from_slice(&self.identification.to_be_bytes());
        let flags_and_fragment_offset = ((self.flags.as_u8() as u16) << 13)
            | (self.fragment_offset & FRAGMENT_OFFSET_MASK);
        header[6..8].copy_from_slice(&flags_and_fragment_offset.to_be_bytes());
        header[8] = if self.time_to_live == 0 {
            DEFAULT_TIME_TO_LIVE
        } else {
            self.time_to_live
        };
        header[9] = self.protocol;
        header[12..16].copy_from_slice(&self.source.to_bytes());
        header[16..20].copy_from_slice(&self.destination.to_bytes());
        let checksum = checksum(&header);
        header[10..12].copy_from_slice(&checksum.to_be_bytes());
        header
    }
}

/// The control flag bits of the flags and fragment offset field: bit 2 is
/// reserved, bit 1 is don't-fragment, bit 0 is more-fragments.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ControlFlags(u8);

impl ControlFlags {
    pub const fn new(dont_fragment: bool, more_fragments: bool) -> Self {
        Self(((dont_fragment as u8) << 1) | more_fragments as u8)
    }

    pub const fn dont_fragment(&self) -> bool {
        self.0 & 0b010 != 0
    }

    pub fn set_dont_fragment(&mut self, value: bool) {
        self.0 = (self.0 & !0b010) | ((value as u8) << 1);
    }

    pub const fn more_fragments(&self) -> bool {
        self.0 & 0b001 != 0
    }

    pub fn set_more_fragments(&mut self, value: bool) {
        self.0 = (self.0 & !0b001) | value as u8;
    }

    /// Whether the reserved bit is set. This layer never sets it.
    pub const fn reserved(&self) -> bool {
        self.0 & 0b100 != 0
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

impl Debug for ControlFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlFlags")
            .field("DF", &self.dont_fragment())
            .field("MF", &self.more_fragments())
            .finish()
    }
}

impl From<u8> for ControlFlags {
    fn from(byte: u8) -> Self {
        Self(byte & 0b111)
    }
}

impl From<ControlFlags> for u8 {
    fn from(flags: ControlFlags) -> Self {
        flags.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESTINATION: Ipv4Address = Ipv4Address::new([123, 45, 67, 89]);

    fn build_bare_header() -> [u8; HEADER_OCTETS] {
        Ipv4HeaderBuilder::new(
            Ipv4Address::LOCALHOST,
            DESTINATION,
            17,
            HEADER_OCTETS as u16,
        )
        .identification(0x1234)
        .time_to_live(30)
        .build()
    }

    #[test]
    fn round_trips_built_header() -> anyhow::Result<()> {
        let bytes = build_bare_header();
        let parsed = ParsedHeader::from_bytes(&bytes)?;
        assert!(parsed.checksum_valid);
        assert!(!parsed.has_options);
        let header = parsed.header;
        assert_eq!(header.ihl, BASE_WORDS);
        assert_eq!(header.type_of_service, 0);
        assert_eq!(header.total_length, HEADER_OCTETS as u16);
        assert_eq!(header.identification, 0x1234);
        assert_eq!(header.fragment_offset, 0);
        assert!(!header.flags.dont_fragment());
        assert!(!header.flags.more_fragments());
        assert_eq!(header.time_to_live, 30);
        assert_eq!(header.protocol, 17);
        assert_eq!(header.source, Ipv4Address::LOCALHOST);
        assert_eq!(header.destination, DESTINATION);
        assert_eq!(header.payload_length(), 0);
        Ok(())
    }

    #[test]
    fn agrees_with_etherparse() -> anyhow::Result<()> {
        let bytes = Ipv4HeaderBuilder::new(Ipv4Address::LOCALHOST, DESTINATION, 17, 33)
            .identification(0x1234)
            .time_to_live(30)
            .dont_fragment()
            .build();
        let slice = etherparse::Ipv4HeaderSlice::from_slice(&bytes)?;
        assert_eq!(slice.ihl(), 5);
        assert_eq!(slice.total_len(), 33);
        assert_eq!(slice.identification(), 0x1234);
        assert!(slice.dont_fragment());
        assert!(!slice.more_fragments());
        assert_eq!(slice.fragments_offset(), 0);
        assert_eq!(slice.ttl(), 30);
        assert_eq!(slice.protocol(), 17);
        assert_eq!(slice.source_addr().octets(), [127, 0, 0, 1]);
        assert_eq!(slice.destination_addr().octets(), [123, 45, 67, 89]);
        // etherparse recomputes the checksum with its own engine.
        assert_eq!(
            slice.header_checksum(),
            slice.to_header().calc_header_checksum()?
        );
        Ok(())
    }

    #[test]
    fn built_header_sums_to_all_ones() {
        // Summing a correct header, checksum field included, folds to
        // 0xffff, so the complement is zero.
        assert_eq!(checksum(&build_bare_header()), 0);
    }

    #[test]
    fn zero_ttl_selects_the_default() {
        let bytes = Ipv4HeaderBuilder::new(
            Ipv4Address::LOCALHOST,
            DESTINATION,
            17,
            HEADER_OCTETS as u16,
        )
        .build();
        assert_eq!(bytes[8], DEFAULT_TIME_TO_LIVE);
    }

    #[test]
    fn rejects_short_buffer() {
        assert_eq!(
            ParsedHeader::from_bytes(&[0u8; 10]),
            Err(ParseError::HeaderTooShort)
        );
    }

    #[test]
    fn rejects_wrong_version() {
        let mut bytes = build_bare_header();
        bytes[0] = (6 << 4) | 5;
        assert_eq!(
            ParsedHeader::from_bytes(&bytes),
            Err(ParseError::IncorrectIpv4Version(6))
        );
    }

    #[test]
    fn rejects_undersized_header_length() {
        let mut bytes = build_bare_header();
        bytes[0] = (4 << 4) | 4;
        assert_eq!(
            ParsedHeader::from_bytes(&bytes),
            Err(ParseError::InvalidHeaderLength(4))
        );
    }

    #[test]
    fn rejects_header_length_past_buffer() {
        let mut bytes = build_bare_header();
        bytes[0] = (4 << 4) | 15;
        assert_eq!(
            ParsedHeader::from_bytes(&bytes),
            Err(ParseError::InvalidHeaderLength(15))
        );
    }

    #[test]
    fn rejects_total_length_past_buffer() {
        let bytes = Ipv4HeaderBuilder::new(Ipv4Address::LOCALHOST, DESTINATION, 17, 33).build();
        // The header declares 13 payload bytes the buffer does not carry.
        assert_eq!(
            ParsedHeader::from_bytes(&bytes),
            Err(ParseError::InvalidTotalLength {
                total_length: 33,
                buffer_length: 20,
            })
        );
    }

    #[test]
    fn rejects_total_length_under_header_length() {
        let mut bytes = build_bare_header();
        bytes[2..4].copy_from_slice(&10u16.to_be_bytes());
        assert_eq!(
            ParsedHeader::from_bytes(&bytes),
            Err(ParseError::InvalidTotalLength {
                total_length: 10,
                buffer_length: 20,
            })
        );
    }

    #[test]
    fn reports_checksum_mismatch_as_a_fact() -> anyhow::Result<()> {
        let mut bytes = build_bare_header();
        bytes[19] ^= 0x01;
        let parsed = ParsedHeader::from_bytes(&bytes)?;
        assert!(!parsed.checksum_valid);
        // The corrupted header stays inspectable.
        assert_eq!(parsed.header.destination, Ipv4Address::new([123, 45, 67, 88]));
        Ok(())
    }

    #[test]
    fn any_single_bit_flip_breaks_the_checksum() {
        let bytes = build_bare_header();
        for bit in 0..bytes.len() * 8 {
            let mut corrupted = bytes;
            corrupted[bit / 8] ^= 1 << (bit % 8);
            match ParsedHeader::from_bytes(&corrupted) {
                Ok(parsed) => assert!(!parsed.checksum_valid, "bit {bit} went undetected"),
                Err(_) => {} // structurally invalid counts as detected
            }
        }
    }

    #[test]
    fn surfaces_options_without_interpreting_them() -> anyhow::Result<()> {
        // A 24-byte header: IHL 6, one word of no-operation options.
        let mut bytes = [0u8; 24];
        bytes[0] = (4 << 4) | 6;
        bytes[2..4].copy_from_slice(&24u16.to_be_bytes());
        bytes[8] = 64;
        bytes[9] = 17;
        bytes[12..16].copy_from_slice(&[10, 0, 0, 1]);
        bytes[16..20].copy_from_slice(&[10, 0, 0, 2]);
        bytes[20..24].copy_from_slice(&[1, 1, 1, 1]);
        let value = checksum(&bytes);
        bytes[10..12].copy_from_slice(&value.to_be_bytes());

        let parsed = ParsedHeader::from_bytes(&bytes)?;
        assert!(parsed.has_options);
        assert!(parsed.checksum_valid);
        assert_eq!(parsed.header.header_length(), 24);
        assert_eq!(parsed.header.payload_length(), 0);
        Ok(())
    }
}

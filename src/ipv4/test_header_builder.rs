#![allow(unused)]

use super::{
    ipv4_parsing::{ControlFlags, Ipv4Header},
    HeaderTemplate, Ipv4Address, BASE_WORDS, DEFAULT_TIME_TO_LIVE, HEADER_OCTETS,
};

const SOURCE: Ipv4Address = Ipv4Address::LOCALHOST;
const DESTINATION: Ipv4Address = Ipv4Address::new([123, 45, 67, 89]);
const PROTOCOL: u8 = 253;
const IDENTIFICATION: u16 = 1337;

/// The template the unit tests send from. [`TestHeaderBuilder`] produces
/// the header values a parse of its output is expected to reproduce.
pub fn template() -> HeaderTemplate {
    HeaderTemplate {
        source: SOURCE,
        destination: DESTINATION,
        protocol: PROTOCOL,
        time_to_live: 0,
        identification: IDENTIFICATION,
    }
}

/// Builds expected header values, checksum left at zero.
pub struct TestHeaderBuilder {
    total_length: u16,
    identification: u16,
    fragment_offset: u16,
    dont_fragment: bool,
    more_fragments: bool,
}

impl TestHeaderBuilder {
    pub const fn new(total_length: u16) -> Self {
        Self {
            total_length,
            identification: IDENTIFICATION,
            fragment_offset: 0,
            dont_fragment: false,
            more_fragments: false,
        }
    }

    pub const fn with_payload_len(payload_len: u16) -> Self {
        Self::new(payload_len + HEADER_OCTETS as u16)
    }

    pub const fn identification(mut self, identification: u16) -> Self {
        self.identification = identification;
        self
    }

    pub const fn dont_fragment(mut self) -> Self {
        self.dont_fragment = true;
        self
    }

    pub const fn more_fragments(mut self) -> Self {
        self.more_fragments = true;
        self
    }

    pub const fn fragment_offset(mut self, offset_bytes: u16) -> Self {
        self.fragment_offset = offset_bytes / 8;
        self
    }

    pub const fn build(self) -> Ipv4Header {
        Ipv4Header {
            ihl: BASE_WORDS,
            type_of_service: 0,
            total_length: self.total_length,
            identification: self.identification,
            fragment_offset: self.fragment_offset,
            flags: ControlFlags::new(self.dont_fragment, self.more_fragments),
            time_to_live: DEFAULT_TIME_TO_LIVE,
            protocol: PROTOCOL,
            checksum: 0,
            source: SOURCE,
            destination: DESTINATION,
        }
    }
}

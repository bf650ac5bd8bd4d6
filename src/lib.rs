//! A byte-level IPv4 wire-format layer: building, parsing, and fragmenting
//! datagrams, with no I/O attached.
//!
//! # Organization
//!
//! - [`utility`] holds the RFC 1071 one's-complement checksum engine the
//!   codecs share
//! - [`ipv4`] holds the header codec, whole-packet assembly, and the
//!   fragmenter
//!
//! Outbound, callers either compose one contiguous packet with [`assemble`]
//! or hand a payload and a [`HeaderTemplate`] to [`fragment`] and receive
//! wire-ready fragment buffers through a sink. Inbound,
//! [`ParsedHeader::from_bytes`] validates a received buffer and reports
//! checksum validity and options presence as separate facts for the caller
//! to act on.
//!
//! Raw sockets, reassembly of received fragments, and everything above the
//! IP layer are deliberately outside this crate.

pub mod ipv4;
pub use ipv4::{
    assemble, fragment, AssembleError, ControlFlags, FragmentError, HeaderTemplate, Ipv4Address,
    Ipv4Header, Ipv4HeaderBuilder, ParseError, ParsedHeader,
};

pub mod utility;
pub use utility::{checksum, Checksum};

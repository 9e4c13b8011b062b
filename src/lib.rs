//! `ofwire` speaks OpenFlow 1.5, with the widely-deployed Nicira/Open vSwitch
//! experimenter extensions, over a byte-oriented transport.
//!
//! The crate provides the wire-level foundation an SDN controller builds on:
//! a concurrent, length-prefixed message stream ([`ofp_stream::MessageStream`])
//! that frames, parses, and serializes OpenFlow messages over a transport, and
//! the bit-exact codec for the OpenFlow Extensible Match TLV system
//! ([`ofp_match::Match`], [`ofp_match::MatchField`]).
//!
//! Message content beyond the match structure is deliberately left to the
//! caller: anything implementing [`ofp_message::OfpMessage`] can ride the
//! stream, and [`ofp_message::RawMessage`] carries frames whose body the
//! caller wants to keep opaque.

pub mod ofp_header;
pub mod ofp_match;
pub mod ofp_message;
pub mod ofp_stream;
pub mod oxm;

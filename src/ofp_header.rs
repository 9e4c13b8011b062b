use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::ofp_message::OfpSerializationError;

pub const OFP_HEADER_LENGTH: usize = 8;

pub type Xid = u32;

/// Wire version byte for OpenFlow 1.5.
pub const OPENFLOW_1_5_VERSION: u8 = 6;

// Message type codes the framing layer and the demo binary care about.
// Everything else passes through untouched.
pub const TYPE_HELLO: u8 = 0;
pub const TYPE_ERROR: u8 = 1;
pub const TYPE_ECHO_REQUEST: u8 = 2;
pub const TYPE_ECHO_REPLY: u8 = 3;
pub const TYPE_EXPERIMENTER: u8 = 4;
pub const TYPE_PACKET_IN: u8 = 29;

/// OpenFlow Header
///
/// The first fields of every OpenFlow message, no matter the protocol
/// version. This is parsed to determine length and transaction id of the
/// remaining message, so that it can be framed and routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfpHeader {
    version: u8,
    typ: u8,
    length: u16,
    xid: Xid,
}

impl OfpHeader {
    /// Create an `OfpHeader` out of the arguments.
    pub fn new(version: u8, typ: u8, length: u16, xid: Xid) -> OfpHeader {
        OfpHeader {
            version,
            typ,
            length,
            xid,
        }
    }

    /// Return the byte-size of an `OfpHeader`.
    pub fn size() -> usize {
        OFP_HEADER_LENGTH
    }

    /// Fills a message buffer with the header fields of an `OfpHeader`.
    pub fn marshal(bytes: &mut Vec<u8>, header: &OfpHeader) {
        bytes.write_u8(header.version).unwrap();
        bytes.write_u8(header.typ).unwrap();
        bytes.write_u16::<BigEndian>(header.length).unwrap();
        bytes.write_u32::<BigEndian>(header.xid).unwrap();
    }

    /// Takes a message buffer of at least `OFP_HEADER_LENGTH` bytes and
    /// returns the `OfpHeader` at its front.
    pub fn parse(buf: &[u8]) -> Result<OfpHeader, OfpSerializationError> {
        if buf.len() < OFP_HEADER_LENGTH {
            return Err(OfpSerializationError::ShortBuffer {
                needed: OFP_HEADER_LENGTH,
                remaining: buf.len(),
                context: "OpenFlow header",
            });
        }
        let mut bytes = Cursor::new(buf);
        Ok(OfpHeader {
            version: bytes.read_u8().unwrap(),
            typ: bytes.read_u8().unwrap(),
            length: bytes.read_u16::<BigEndian>().unwrap(),
            xid: bytes.read_u32::<BigEndian>().unwrap(),
        })
    }

    /// Return the `version` field of a header.
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Return the raw message type code of a header.
    pub fn typ(&self) -> u8 {
        self.typ
    }

    /// Return the `length` field of a header. Includes the length of the
    /// header itself.
    pub fn length(&self) -> usize {
        self.length as usize
    }

    /// Return the `xid` field of a header, the transaction id associated with
    /// this message. Replies use the same id to facilitate pairing.
    pub fn xid(&self) -> Xid {
        self.xid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marshal_parse_round_trip() {
        let header = OfpHeader::new(OPENFLOW_1_5_VERSION, TYPE_ECHO_REQUEST, 16, 0xdeadbeef);
        let mut bytes = vec![];
        OfpHeader::marshal(&mut bytes, &header);
        assert_eq!(bytes, [6, 2, 0, 16, 0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(OfpHeader::parse(&bytes).unwrap(), header);
    }

    #[test]
    fn parse_rejects_short_buffer() {
        let err = OfpHeader::parse(&[6, 0, 0]).unwrap_err();
        assert!(matches!(
            err,
            OfpSerializationError::ShortBuffer { needed: 8, remaining: 3, .. }
        ));
    }
}

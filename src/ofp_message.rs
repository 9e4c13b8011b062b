use thiserror::Error;

use crate::ofp_header::{OfpHeader, Xid, OFP_HEADER_LENGTH};

/// Faults raised while encoding or decoding OpenFlow bytes.
#[derive(Debug, Error)]
pub enum OfpSerializationError {
    #[error("buffer too short for {context}: need {needed} bytes, have {remaining}")]
    ShortBuffer {
        needed: usize,
        remaining: usize,
        context: &'static str,
    },
    #[error("unsupported experimenter id {id:#010x} in class {class:#06x}")]
    UnsupportedExperimenter { id: u32, class: u16 },
    #[error("unknown OXM field {field} in class {class:#06x}")]
    UnknownOxmField { class: u16, field: u8 },
    #[error("unexpected value '{value}' at field '{field}' of '{message}'")]
    UnexpectedValue {
        value: String,
        field: &'static str,
        message: &'static str,
    },
}

/// OpenFlow Message
///
/// Byte-level capability every message type satisfies: a message knows its
/// own marshaled length and can rebuild itself from a byte prefix of at
/// least that length.
pub trait OfpMessage: Sized {
    /// Return the byte-size of the marshaled message.
    fn size_of(&self) -> usize;
    /// Append exactly `size_of()` bytes to `bytes`.
    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError>;
    /// Rebuild the message from a byte prefix of at least `size_of()` bytes.
    fn unmarshal(buf: &[u8]) -> Result<Self, OfpSerializationError>;
}

/// Turns one fully-framed OpenFlow message (header included) into a typed
/// message. The framing layer is generic over this, so callers can plug in
/// their own message model.
pub trait MessageParser: Send + Sync + 'static {
    type Message: OfpMessage + Send + 'static;

    fn parse(&self, buf: &[u8]) -> Result<Self::Message, OfpSerializationError>;
}

/// An OpenFlow message kept as its parsed header plus an opaque body.
///
/// The body is everything after the header in the supplied frame. For
/// oversize `PacketIn2` frames the header `length` field has overflowed and
/// no longer describes the frame; taking the full remainder keeps such
/// frames intact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub header: OfpHeader,
    pub body: Vec<u8>,
}

impl RawMessage {
    /// Build an outbound message around `body`, stamping the header length.
    pub fn new(version: u8, typ: u8, xid: Xid, body: Vec<u8>) -> RawMessage {
        let length = (OFP_HEADER_LENGTH + body.len()) as u16;
        RawMessage {
            header: OfpHeader::new(version, typ, length, xid),
            body,
        }
    }
}

impl OfpMessage for RawMessage {
    fn size_of(&self) -> usize {
        OFP_HEADER_LENGTH + self.body.len()
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        OfpHeader::marshal(bytes, &self.header);
        bytes.extend_from_slice(&self.body);
        Ok(())
    }

    fn unmarshal(buf: &[u8]) -> Result<RawMessage, OfpSerializationError> {
        let header = OfpHeader::parse(buf)?;
        Ok(RawMessage {
            header,
            body: buf[OFP_HEADER_LENGTH..].to_vec(),
        })
    }
}

/// The no-interpretation parser: every frame becomes a [`RawMessage`].
#[derive(Debug, Default, Clone, Copy)]
pub struct RawParser;

impl MessageParser for RawParser {
    type Message = RawMessage;

    fn parse(&self, buf: &[u8]) -> Result<RawMessage, OfpSerializationError> {
        RawMessage::unmarshal(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ofp_header::{OPENFLOW_1_5_VERSION, TYPE_ECHO_REPLY};

    #[test]
    fn raw_message_round_trip() {
        let msg = RawMessage::new(OPENFLOW_1_5_VERSION, TYPE_ECHO_REPLY, 7, vec![1, 2, 3, 4]);
        assert_eq!(msg.size_of(), 12);
        let mut bytes = vec![];
        msg.marshal(&mut bytes).unwrap();
        assert_eq!(bytes.len(), msg.size_of());
        assert_eq!(RawMessage::unmarshal(&bytes).unwrap(), msg);
    }

    #[test]
    fn unmarshal_rejects_truncated_header() {
        assert!(RawMessage::unmarshal(&[6, 3, 0]).is_err());
    }
}

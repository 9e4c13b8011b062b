//! ofp_match, OpenFlow 1.5: the OXM TLV container, the single match field,
//! and one builder per supported `(class, field)` pair.

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::ofp_message::{OfpMessage, OfpSerializationError};
use crate::oxm::{
    payload_shape, MacAddr, MatchValue, NXM_NX_ARP_SHA, NXM_NX_ARP_THA, NXM_NX_CONJ_ID,
    NXM_NX_CT_IPV6_DST, NXM_NX_CT_IPV6_SRC, NXM_NX_CT_LABEL, NXM_NX_CT_MARK, NXM_NX_CT_NW_DST,
    NXM_NX_CT_NW_PROTO, NXM_NX_CT_NW_SRC, NXM_NX_CT_STATE, NXM_NX_CT_TP_DST, NXM_NX_CT_TP_SRC,
    NXM_NX_CT_ZONE, NXM_NX_IP_TTL, NXM_NX_PKT_MARK, NXM_NX_REG0, NXM_NX_TUN_IPV4_DST,
    NXM_NX_TUN_IPV4_SRC, NXM_NX_TUN_IPV6_DST, NXM_NX_TUN_IPV6_SRC, NXM_NX_TUN_METADATA0,
    NXM_NX_XXREG0, ONF_EXPERIMENTER_ID, OXM_CLASS_EXPERIMENTER, OXM_CLASS_NXM_1,
    OXM_CLASS_OPENFLOW_BASIC, OXM_CLASS_PACKET_REGS, OXM_FIELD_ACTSET_OUTPUT, OXM_FIELD_ARP_OP,
    OXM_FIELD_ARP_SHA, OXM_FIELD_ARP_SPA, OXM_FIELD_ARP_THA, OXM_FIELD_ARP_TPA, OXM_FIELD_ETH_DST,
    OXM_FIELD_ETH_SRC, OXM_FIELD_ETH_TYPE, OXM_FIELD_ICMPV4_CODE, OXM_FIELD_ICMPV4_TYPE,
    OXM_FIELD_ICMPV6_CODE, OXM_FIELD_ICMPV6_TYPE, OXM_FIELD_IN_PHY_PORT, OXM_FIELD_IN_PORT,
    OXM_FIELD_IPV4_DST, OXM_FIELD_IPV4_SRC, OXM_FIELD_IPV6_DST, OXM_FIELD_IPV6_EXTHDR,
    OXM_FIELD_IPV6_FLABEL, OXM_FIELD_IPV6_ND_SLL, OXM_FIELD_IPV6_ND_TARGET,
    OXM_FIELD_IPV6_ND_TLL, OXM_FIELD_IPV6_SRC, OXM_FIELD_IP_DSCP, OXM_FIELD_IP_ECN,
    OXM_FIELD_IP_PROTO, OXM_FIELD_METADATA, OXM_FIELD_MPLS_BOS, OXM_FIELD_MPLS_LABEL,
    OXM_FIELD_MPLS_TC, OXM_FIELD_PACKET_TYPE, OXM_FIELD_PBB_ISID, OXM_FIELD_SCTP_DST,
    OXM_FIELD_SCTP_SRC, OXM_FIELD_TCP_DST, OXM_FIELD_TCP_FLAGS, OXM_FIELD_TCP_SRC,
    OXM_FIELD_TUNNEL_ID, OXM_FIELD_UDP_DST, OXM_FIELD_UDP_SRC, OXM_FIELD_VLAN_PCP,
    OXM_FIELD_VLAN_VID, OXM_PACKET_REG0,
};

// ofp_match_type: only the OXM TLV format survives in 1.5.
pub const MATCH_TYPE_STANDARD: u16 = 0; /* Deprecated */
pub const MATCH_TYPE_OXM: u16 = 1;

/// Bit set in the on-wire VLAN_VID value whenever a VLAN tag is present.
pub const OFPVID_PRESENT: u16 = 0x1000;
/// On-wire VLAN_VID value matching untagged packets.
pub const OFPVID_NONE: u16 = 0x0000;

/// One OXM TLV: header, decoded value, and optional mask of the same shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchField {
    pub class: u16,
    pub field: u8,
    pub has_mask: bool,
    /// On-wire payload byte count: value + mask + experimenter-id tail.
    pub length: u8,
    /// Nonzero only in the experimenter class.
    pub experimenter_id: u32,
    pub value: MatchValue,
    pub mask: Option<MatchValue>,
}

impl MatchField {
    /// Assemble a field, deriving `has_mask` and `length` from the payloads.
    fn with_value(class: u16, field: u8, value: MatchValue, mask: Option<MatchValue>) -> MatchField {
        let mut length = value.len();
        if let Some(mask) = &mask {
            length += mask.len();
        }
        MatchField {
            class,
            field,
            has_mask: mask.is_some(),
            length: length as u8,
            experimenter_id: 0,
            value,
            mask,
        }
    }

    /// Experimenter-class variant of [`MatchField::with_value`]; the id word
    /// counts toward the on-wire payload length.
    fn with_experimenter(field: u8, value: MatchValue, mask: Option<MatchValue>) -> MatchField {
        let mut f = Self::with_value(OXM_CLASS_EXPERIMENTER, field, value, mask);
        f.experimenter_id = ONF_EXPERIMENTER_ID;
        f.length += 4;
        f
    }
}

impl OfpMessage for MatchField {
    fn size_of(&self) -> usize {
        let mut n = 4;
        if self.class == OXM_CLASS_EXPERIMENTER {
            n += 4;
        }
        n += self.value.len();
        if let Some(mask) = &self.mask {
            n += mask.len();
        }
        n
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u16::<BigEndian>(self.class).unwrap();
        bytes.write_u8((self.field << 1) | u8::from(self.has_mask)).unwrap();
        bytes.write_u8(self.length).unwrap();
        if self.class == OXM_CLASS_EXPERIMENTER {
            bytes.write_u32::<BigEndian>(self.experimenter_id).unwrap();
        }
        self.value.marshal(bytes);
        if let Some(mask) = &self.mask {
            mask.marshal(bytes);
        }
        Ok(())
    }

    fn unmarshal(buf: &[u8]) -> Result<MatchField, OfpSerializationError> {
        if buf.len() < 4 {
            return Err(OfpSerializationError::ShortBuffer {
                needed: 4,
                remaining: buf.len(),
                context: "OXM TLV header",
            });
        }
        let class = BigEndian::read_u16(&buf[0..2]);
        let packed = buf[2];
        let has_mask = packed & 0x1 == 1;
        let field = packed >> 1;
        let length = buf[3];

        let mut n = 4;
        let mut experimenter_id = 0;
        if class == OXM_CLASS_EXPERIMENTER {
            if buf.len() < 8 {
                return Err(OfpSerializationError::ShortBuffer {
                    needed: 8,
                    remaining: buf.len(),
                    context: "OXM experimenter header",
                });
            }
            let id = BigEndian::read_u32(&buf[4..8]);
            if id != ONF_EXPERIMENTER_ID {
                return Err(OfpSerializationError::UnsupportedExperimenter { id, class });
            }
            experimenter_id = id;
            n += 4;
        }

        let shape = payload_shape(class, field)?;
        // Byte-array payloads are sized by the header length byte, which
        // counts both halves when a mask is present.
        let tail = if class == OXM_CLASS_EXPERIMENTER { 4 } else { 0 };
        let body = (length as usize).saturating_sub(tail);
        let per_side = if has_mask { body / 2 } else { body };

        let value = MatchValue::unmarshal(shape, per_side, &buf[n..])?;
        n += value.len();
        let mask = if has_mask {
            let mask = MatchValue::unmarshal(shape, per_side, &buf[n..])?;
            Some(mask)
        } else {
            None
        };

        Ok(MatchField {
            class,
            field,
            has_mask,
            length,
            experimenter_id,
            value,
            mask,
        })
    }
}

/// ofp_match: the outer OXM container.
///
/// `length` covers type, length, and fields but not the trailing padding;
/// the marshaled form is zero-padded to the next multiple of 8 bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub typ: u16,
    pub length: u16,
    pub fields: Vec<MatchField>,
}

impl Match {
    pub fn new() -> Match {
        Match {
            typ: MATCH_TYPE_OXM,
            length: 4,
            fields: Vec::new(),
        }
    }

    pub fn add_field(&mut self, field: MatchField) {
        self.length += field.size_of() as u16;
        self.fields.push(field);
    }

    fn inner_size(&self) -> usize {
        4 + self.fields.iter().map(MatchField::size_of).sum::<usize>()
    }
}

impl Default for Match {
    fn default() -> Match {
        Match::new()
    }
}

impl OfpMessage for Match {
    /// Marshaled size, padding included.
    fn size_of(&self) -> usize {
        (self.inner_size() + 7) / 8 * 8
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u16::<BigEndian>(self.typ).unwrap();
        bytes.write_u16::<BigEndian>(self.length).unwrap();
        for field in &self.fields {
            field.marshal(bytes)?;
        }
        let inner = self.inner_size();
        for _ in 0..((8 - inner % 8) % 8) {
            bytes.write_u8(0).unwrap();
        }
        Ok(())
    }

    fn unmarshal(buf: &[u8]) -> Result<Match, OfpSerializationError> {
        if buf.len() < 4 {
            return Err(OfpSerializationError::ShortBuffer {
                needed: 4,
                remaining: buf.len(),
                context: "ofp_match header",
            });
        }
        let typ = BigEndian::read_u16(&buf[0..2]);
        if typ != MATCH_TYPE_OXM {
            return Err(OfpSerializationError::UnexpectedValue {
                value: format!("{typ:#06x}"),
                field: "type",
                message: "ofp_match",
            });
        }
        let length = BigEndian::read_u16(&buf[2..4]) as usize;
        if buf.len() < length {
            return Err(OfpSerializationError::ShortBuffer {
                needed: length,
                remaining: buf.len(),
                context: "ofp_match fields",
            });
        }

        let mut fields = Vec::new();
        let mut n = 4;
        while n < length {
            let field = MatchField::unmarshal(&buf[n..])?;
            n += field.size_of();
            fields.push(field);
        }
        Ok(Match {
            typ,
            length: length as u16,
            fields,
        })
    }
}

/// A payload-less OXM header, as listed in table feature properties.
///
/// Non-experimenter ids are 4 bytes on the wire, experimenter ids 8; the
/// `length` field carries the payload length the field would have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OxmId {
    pub class: u16,
    pub field: u8,
    pub has_mask: bool,
    pub length: u8,
    pub experimenter_id: u32,
}

impl OxmId {
    pub fn new(class: u16, field: u8, has_mask: bool, length: u8, experimenter_id: u32) -> OxmId {
        OxmId {
            class,
            field,
            has_mask,
            length,
            experimenter_id: if class == OXM_CLASS_EXPERIMENTER {
                experimenter_id
            } else {
                0
            },
        }
    }
}

impl OfpMessage for OxmId {
    fn size_of(&self) -> usize {
        if self.class == OXM_CLASS_EXPERIMENTER {
            8
        } else {
            4
        }
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u16::<BigEndian>(self.class).unwrap();
        bytes.write_u8((self.field << 1) | u8::from(self.has_mask)).unwrap();
        bytes.write_u8(self.length).unwrap();
        if self.class == OXM_CLASS_EXPERIMENTER {
            bytes.write_u32::<BigEndian>(self.experimenter_id).unwrap();
        }
        Ok(())
    }

    fn unmarshal(buf: &[u8]) -> Result<OxmId, OfpSerializationError> {
        if buf.len() < 4 {
            return Err(OfpSerializationError::ShortBuffer {
                needed: 4,
                remaining: buf.len(),
                context: "OXM id",
            });
        }
        let class = BigEndian::read_u16(&buf[0..2]);
        let packed = buf[2];
        let mut id = OxmId {
            class,
            field: packed >> 1,
            has_mask: packed & 0x1 == 1,
            length: buf[3],
            experimenter_id: 0,
        };
        if class == OXM_CLASS_EXPERIMENTER {
            if buf.len() < 8 {
                return Err(OfpSerializationError::ShortBuffer {
                    needed: 8,
                    remaining: buf.len(),
                    context: "OXM experimenter id",
                });
            }
            let experimenter_id = BigEndian::read_u32(&buf[4..8]);
            if experimenter_id != ONF_EXPERIMENTER_ID {
                return Err(OfpSerializationError::UnsupportedExperimenter {
                    id: experimenter_id,
                    class,
                });
            }
            id.experimenter_id = experimenter_id;
        }
        Ok(id)
    }
}

// Builders, one per supported (class, field) pair. Fields that the protocol
// allows to be masked take an `Option` of the same shape.
impl MatchField {
    /// Match on the switch input port.
    pub fn in_port(port: u32) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IN_PORT, MatchValue::U32(port), None)
    }

    /// Match on the switch physical input port.
    pub fn in_phy_port(port: u32) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IN_PHY_PORT, MatchValue::U32(port), None)
    }

    /// Match on the metadata passed between tables.
    pub fn metadata(metadata: u64, mask: Option<u64>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_METADATA,
            MatchValue::U64(metadata),
            mask.map(MatchValue::U64),
        )
    }

    /// Match on the Ethernet destination address.
    pub fn eth_dst(addr: MacAddr, mask: Option<MacAddr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_ETH_DST,
            MatchValue::Mac(addr),
            mask.map(MatchValue::Mac),
        )
    }

    /// Match on the Ethernet source address.
    pub fn eth_src(addr: MacAddr, mask: Option<MacAddr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_ETH_SRC,
            MatchValue::Mac(addr),
            mask.map(MatchValue::Mac),
        )
    }

    /// Match on the Ethernet frame type.
    pub fn eth_type(eth_type: u16) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ETH_TYPE, MatchValue::U16(eth_type), None)
    }

    /// Match on a VLAN id. The on-wire value carries [`OFPVID_PRESENT`] in
    /// addition to the id.
    pub fn vlan_vid(vid: u16, mask: Option<u16>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_VLAN_VID,
            MatchValue::U16(vid | OFPVID_PRESENT),
            mask.map(MatchValue::U16),
        )
    }

    /// Match on the VLAN priority.
    pub fn vlan_pcp(pcp: u8) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_VLAN_PCP, MatchValue::U8(pcp), None)
    }

    /// Match on the IP DSCP bits.
    pub fn ip_dscp(dscp: u8, mask: Option<u8>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_IP_DSCP,
            MatchValue::U8(dscp),
            mask.map(MatchValue::U8),
        )
    }

    /// Match on the IP ECN bits.
    pub fn ip_ecn(ecn: u8) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IP_ECN, MatchValue::U8(ecn), None)
    }

    /// Match on the IP protocol number.
    pub fn ip_proto(proto: u8) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IP_PROTO, MatchValue::U8(proto), None)
    }

    /// Match on the IPv4 source address.
    pub fn ipv4_src(addr: Ipv4Addr, mask: Option<Ipv4Addr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_IPV4_SRC,
            MatchValue::Ipv4(addr),
            mask.map(MatchValue::Ipv4),
        )
    }

    /// Match on the IPv4 destination address.
    pub fn ipv4_dst(addr: Ipv4Addr, mask: Option<Ipv4Addr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_IPV4_DST,
            MatchValue::Ipv4(addr),
            mask.map(MatchValue::Ipv4),
        )
    }

    pub fn tcp_src(port: u16) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_TCP_SRC, MatchValue::U16(port), None)
    }

    pub fn tcp_dst(port: u16) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_TCP_DST, MatchValue::U16(port), None)
    }

    pub fn udp_src(port: u16) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_UDP_SRC, MatchValue::U16(port), None)
    }

    pub fn udp_dst(port: u16) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_UDP_DST, MatchValue::U16(port), None)
    }

    pub fn sctp_src(port: u16) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_SCTP_SRC, MatchValue::U16(port), None)
    }

    pub fn sctp_dst(port: u16) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_SCTP_DST, MatchValue::U16(port), None)
    }

    pub fn icmpv4_type(typ: u8) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ICMPV4_TYPE, MatchValue::U8(typ), None)
    }

    pub fn icmpv4_code(code: u8) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ICMPV4_CODE, MatchValue::U8(code), None)
    }

    /// Match on the ARP opcode.
    pub fn arp_op(op: u16) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ARP_OP, MatchValue::U16(op), None)
    }

    /// Match on the ARP source protocol address.
    pub fn arp_spa(addr: Ipv4Addr) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ARP_SPA, MatchValue::Ipv4(addr), None)
    }

    /// Match on the ARP target protocol address.
    pub fn arp_tpa(addr: Ipv4Addr) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ARP_TPA, MatchValue::Ipv4(addr), None)
    }

    /// Match on the ARP source hardware address.
    pub fn arp_sha(addr: MacAddr) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ARP_SHA, MatchValue::Mac(addr), None)
    }

    /// Match on the ARP target hardware address.
    pub fn arp_tha(addr: MacAddr) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ARP_THA, MatchValue::Mac(addr), None)
    }

    /// Match on the IPv6 source address.
    pub fn ipv6_src(addr: Ipv6Addr, mask: Option<Ipv6Addr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_IPV6_SRC,
            MatchValue::Ipv6(addr),
            mask.map(MatchValue::Ipv6),
        )
    }

    /// Match on the IPv6 destination address.
    pub fn ipv6_dst(addr: Ipv6Addr, mask: Option<Ipv6Addr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_IPV6_DST,
            MatchValue::Ipv6(addr),
            mask.map(MatchValue::Ipv6),
        )
    }

    /// Match on the IPv6 flow label.
    pub fn ipv6_flabel(label: u32, mask: Option<u32>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_IPV6_FLABEL,
            MatchValue::U32(label),
            mask.map(MatchValue::U32),
        )
    }

    pub fn icmpv6_type(typ: u8) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ICMPV6_TYPE, MatchValue::U8(typ), None)
    }

    pub fn icmpv6_code(code: u8) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ICMPV6_CODE, MatchValue::U8(code), None)
    }

    /// Match on the neighbor discovery target address.
    pub fn ipv6_nd_target(addr: Ipv6Addr) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IPV6_ND_TARGET, MatchValue::Ipv6(addr), None)
    }

    /// Match on the neighbor discovery source link-layer address.
    pub fn ipv6_nd_sll(addr: MacAddr) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IPV6_ND_SLL, MatchValue::Mac(addr), None)
    }

    /// Match on the neighbor discovery target link-layer address.
    pub fn ipv6_nd_tll(addr: MacAddr) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IPV6_ND_TLL, MatchValue::Mac(addr), None)
    }

    /// Match on the MPLS label.
    pub fn mpls_label(label: u32) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_MPLS_LABEL, MatchValue::U32(label), None)
    }

    /// Match on the MPLS traffic class.
    pub fn mpls_tc(tc: u8) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_MPLS_TC, MatchValue::U8(tc), None)
    }

    /// Match on the MPLS bottom-of-stack bit.
    pub fn mpls_bos(bos: u8) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_MPLS_BOS, MatchValue::U8(bos), None)
    }

    /// Match on the PBB I-SID.
    pub fn pbb_isid(isid: u32, mask: Option<u32>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_PBB_ISID,
            MatchValue::U32(isid),
            mask.map(MatchValue::U32),
        )
    }

    /// Match on the logical port metadata (tunnel id).
    pub fn tunnel_id(id: u64) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_TUNNEL_ID, MatchValue::U64(id), None)
    }

    /// Match on the IPv6 extension header pseudo-field.
    pub fn ipv6_exthdr(exthdr: u16, mask: Option<u16>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_IPV6_EXTHDR,
            MatchValue::U16(exthdr),
            mask.map(MatchValue::U16),
        )
    }

    /// Match on the TCP flags.
    pub fn tcp_flags(flags: u16, mask: Option<u16>) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_TCP_FLAGS,
            MatchValue::U16(flags),
            mask.map(MatchValue::U16),
        )
    }

    /// Match on the output port of the action set.
    pub fn actset_output(port: u32) -> MatchField {
        Self::with_value(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ACTSET_OUTPUT, MatchValue::U32(port), None)
    }

    /// Match on the packet type.
    pub fn packet_type(namespace: u16, ns_type: u16) -> MatchField {
        Self::with_value(
            OXM_CLASS_OPENFLOW_BASIC,
            OXM_FIELD_PACKET_TYPE,
            MatchValue::PacketType { namespace, ns_type },
            None,
        )
    }

    /// Match on Nicira register `idx` (0..=15).
    pub fn reg(idx: u8, value: u32, mask: Option<u32>) -> MatchField {
        assert!(idx <= 15, "NXM register index out of range: {idx}");
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_REG0 + idx,
            MatchValue::U32(value),
            mask.map(MatchValue::U32),
        )
    }

    /// Match on the ARP source hardware address through the Nicira class.
    pub fn nx_arp_sha(addr: MacAddr) -> MatchField {
        Self::with_value(OXM_CLASS_NXM_1, NXM_NX_ARP_SHA, MatchValue::Mac(addr), None)
    }

    /// Match on the ARP target hardware address through the Nicira class.
    pub fn nx_arp_tha(addr: MacAddr) -> MatchField {
        Self::with_value(OXM_CLASS_NXM_1, NXM_NX_ARP_THA, MatchValue::Mac(addr), None)
    }

    /// Match on the tunnel source IPv4 address.
    pub fn tun_ipv4_src(addr: Ipv4Addr, mask: Option<Ipv4Addr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_TUN_IPV4_SRC,
            MatchValue::Ipv4(addr),
            mask.map(MatchValue::Ipv4),
        )
    }

    /// Match on the tunnel destination IPv4 address.
    pub fn tun_ipv4_dst(addr: Ipv4Addr, mask: Option<Ipv4Addr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_TUN_IPV4_DST,
            MatchValue::Ipv4(addr),
            mask.map(MatchValue::Ipv4),
        )
    }

    /// Match on the tunnel source IPv6 address.
    pub fn tun_ipv6_src(addr: Ipv6Addr, mask: Option<Ipv6Addr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_TUN_IPV6_SRC,
            MatchValue::Ipv6(addr),
            mask.map(MatchValue::Ipv6),
        )
    }

    /// Match on the tunnel destination IPv6 address.
    pub fn tun_ipv6_dst(addr: Ipv6Addr, mask: Option<Ipv6Addr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_TUN_IPV6_DST,
            MatchValue::Ipv6(addr),
            mask.map(MatchValue::Ipv6),
        )
    }

    /// Match on the IP time-to-live.
    pub fn ip_ttl(ttl: u8) -> MatchField {
        Self::with_value(OXM_CLASS_NXM_1, NXM_NX_IP_TTL, MatchValue::U8(ttl), None)
    }

    /// Match on the kernel packet mark.
    pub fn pkt_mark(mark: u32, mask: Option<u32>) -> MatchField {
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_PKT_MARK,
            MatchValue::U32(mark),
            mask.map(MatchValue::U32),
        )
    }

    /// Match on a conjunction id.
    pub fn conj_id(id: u32) -> MatchField {
        Self::with_value(OXM_CLASS_NXM_1, NXM_NX_CONJ_ID, MatchValue::U32(id), None)
    }

    /// Match on tunnel metadata slot `idx` (0..=7), Geneve variable data.
    pub fn tun_metadata(idx: u8, data: Vec<u8>, mask: Option<Vec<u8>>) -> MatchField {
        assert!(idx <= 7, "tunnel metadata index out of range: {idx}");
        if let Some(mask) = &mask {
            assert_eq!(mask.len(), data.len(), "mask length must equal value length");
        }
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_TUN_METADATA0 + idx,
            MatchValue::Bytes(data),
            mask.map(MatchValue::Bytes),
        )
    }

    /// Match on the conntrack state bits.
    pub fn ct_state(state: u32, mask: Option<u32>) -> MatchField {
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_CT_STATE,
            MatchValue::U32(state),
            mask.map(MatchValue::U32),
        )
    }

    /// Match on the conntrack zone.
    pub fn ct_zone(zone: u16) -> MatchField {
        Self::with_value(OXM_CLASS_NXM_1, NXM_NX_CT_ZONE, MatchValue::U16(zone), None)
    }

    /// Match on the conntrack mark.
    pub fn ct_mark(mark: u32, mask: Option<u32>) -> MatchField {
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_CT_MARK,
            MatchValue::U32(mark),
            mask.map(MatchValue::U32),
        )
    }

    /// Match on the 128-bit conntrack label.
    pub fn ct_label(label: [u8; 16], mask: Option<[u8; 16]>) -> MatchField {
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_CT_LABEL,
            MatchValue::Bytes(label.to_vec()),
            mask.map(|m| MatchValue::Bytes(m.to_vec())),
        )
    }

    /// Match on the protocol of the original-direction conntrack tuple.
    pub fn ct_nw_proto(proto: u8) -> MatchField {
        Self::with_value(OXM_CLASS_NXM_1, NXM_NX_CT_NW_PROTO, MatchValue::U8(proto), None)
    }

    /// Match on the IPv4 source of the original-direction conntrack tuple.
    pub fn ct_nw_src(addr: Ipv4Addr, mask: Option<Ipv4Addr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_CT_NW_SRC,
            MatchValue::Ipv4(addr),
            mask.map(MatchValue::Ipv4),
        )
    }

    /// Match on the IPv4 destination of the original-direction conntrack tuple.
    pub fn ct_nw_dst(addr: Ipv4Addr, mask: Option<Ipv4Addr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_CT_NW_DST,
            MatchValue::Ipv4(addr),
            mask.map(MatchValue::Ipv4),
        )
    }

    /// Match on the IPv6 source of the original-direction conntrack tuple.
    pub fn ct_ipv6_src(addr: Ipv6Addr, mask: Option<Ipv6Addr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_CT_IPV6_SRC,
            MatchValue::Ipv6(addr),
            mask.map(MatchValue::Ipv6),
        )
    }

    /// Match on the IPv6 destination of the original-direction conntrack tuple.
    pub fn ct_ipv6_dst(addr: Ipv6Addr, mask: Option<Ipv6Addr>) -> MatchField {
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_CT_IPV6_DST,
            MatchValue::Ipv6(addr),
            mask.map(MatchValue::Ipv6),
        )
    }

    /// Match on the transport source port of the original-direction conntrack tuple.
    pub fn ct_tp_src(port: u16) -> MatchField {
        Self::with_value(OXM_CLASS_NXM_1, NXM_NX_CT_TP_SRC, MatchValue::U16(port), None)
    }

    /// Match on the transport destination port of the original-direction conntrack tuple.
    pub fn ct_tp_dst(port: u16) -> MatchField {
        Self::with_value(OXM_CLASS_NXM_1, NXM_NX_CT_TP_DST, MatchValue::U16(port), None)
    }

    /// Match on 128-bit extended register `idx` (0..=3).
    pub fn xxreg(idx: u8, data: Vec<u8>, mask: Option<Vec<u8>>) -> MatchField {
        assert!(idx <= 3, "extended register index out of range: {idx}");
        if let Some(mask) = &mask {
            assert_eq!(mask.len(), data.len(), "mask length must equal value length");
        }
        Self::with_value(
            OXM_CLASS_NXM_1,
            NXM_NX_XXREG0 + idx,
            MatchValue::Bytes(data),
            mask.map(MatchValue::Bytes),
        )
    }

    /// Match on OpenFlow 1.5 packet register `idx` (0..=7).
    pub fn packet_reg(idx: u8, data: Vec<u8>, mask: Option<Vec<u8>>) -> MatchField {
        assert!(idx <= 7, "packet register index out of range: {idx}");
        if let Some(mask) = &mask {
            assert_eq!(mask.len(), data.len(), "mask length must equal value length");
        }
        Self::with_value(
            OXM_CLASS_PACKET_REGS,
            OXM_PACKET_REG0 + idx,
            MatchValue::Bytes(data),
            mask.map(MatchValue::Bytes),
        )
    }

    /// Match on TCP flags through the ONF experimenter class.
    pub fn experimenter_tcp_flags(flags: u16, mask: Option<u16>) -> MatchField {
        Self::with_experimenter(OXM_FIELD_TCP_FLAGS, MatchValue::U16(flags), mask.map(MatchValue::U16))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oxm::{NXM_NX_TUN_METADATA2, OXM_CLASS_NXM_0};

    fn round_trip(field: MatchField) -> MatchField {
        let mut bytes = vec![];
        field.marshal(&mut bytes).unwrap();
        assert_eq!(bytes.len(), field.size_of(), "marshaled length mismatch");
        let decoded = MatchField::unmarshal(&bytes).unwrap();
        assert_eq!(decoded, field);
        decoded
    }

    #[test]
    fn in_port_wire_format() {
        let field = MatchField::in_port(3);
        let mut bytes = vec![];
        field.marshal(&mut bytes).unwrap();
        assert_eq!(bytes, [0x80, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x03]);
        let decoded = MatchField::unmarshal(&bytes).unwrap();
        assert_eq!(decoded.value, MatchValue::U32(3));
    }

    #[test]
    fn masked_eth_dst_wire_format() {
        let field = MatchField::eth_dst(
            MacAddr([0x01, 0x02, 0x03, 0x04, 0x05, 0x06]),
            Some(MacAddr([0xff, 0xff, 0xff, 0x00, 0x00, 0x00])),
        );
        let mut bytes = vec![];
        field.marshal(&mut bytes).unwrap();
        assert_eq!(
            bytes,
            [
                0x80, 0x00, 0x07, 0x0c, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0xff, 0xff, 0xff,
                0x00, 0x00, 0x00
            ]
        );
        round_trip(field);
    }

    #[test]
    fn vlan_vid_sets_present_bit() {
        let field = MatchField::vlan_vid(100, None);
        let mut bytes = vec![];
        field.marshal(&mut bytes).unwrap();
        assert_eq!(&bytes[4..], [0x10, 0x64]);
    }

    #[test]
    fn vlan_pcp_carries_the_given_priority() {
        let field = MatchField::vlan_pcp(5);
        assert_eq!(field.value, MatchValue::U8(5));
        let field = MatchField::ip_ecn(2);
        assert_eq!(field.value, MatchValue::U8(2));
    }

    #[test]
    fn builders_round_trip() {
        let mask_ip: Ipv4Addr = "255.255.255.0".parse().unwrap();
        let v6: Ipv6Addr = "2001:db8::1".parse().unwrap();
        let v6_mask: Ipv6Addr = "ffff:ffff::".parse().unwrap();
        let fields = vec![
            MatchField::in_phy_port(12),
            MatchField::metadata(0xfeed, Some(0xffff)),
            MatchField::eth_src(MacAddr([0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]), None),
            MatchField::eth_type(0x0800),
            MatchField::ip_dscp(46, None),
            MatchField::ip_proto(6),
            MatchField::ipv4_src("10.0.0.1".parse().unwrap(), Some(mask_ip)),
            MatchField::ipv4_dst("10.0.0.2".parse().unwrap(), None),
            MatchField::tcp_src(443),
            MatchField::udp_dst(4789),
            MatchField::sctp_src(9899),
            MatchField::icmpv4_type(8),
            MatchField::icmpv4_code(0),
            MatchField::arp_op(1),
            MatchField::arp_spa("192.168.0.1".parse().unwrap()),
            MatchField::arp_tha(MacAddr([0, 1, 2, 3, 4, 5])),
            MatchField::ipv6_src(v6, Some(v6_mask)),
            MatchField::ipv6_flabel(0xabcde, Some(0xfffff)),
            MatchField::icmpv6_type(135),
            MatchField::ipv6_nd_target(v6),
            MatchField::ipv6_nd_sll(MacAddr([9, 8, 7, 6, 5, 4])),
            MatchField::mpls_label(1048575),
            MatchField::mpls_tc(5),
            MatchField::mpls_bos(1),
            MatchField::pbb_isid(0xabcdef, None),
            MatchField::tunnel_id(0x1234_5678),
            MatchField::ipv6_exthdr(0x01ff, Some(0x01ff)),
            MatchField::tcp_flags(0x002, Some(0xfff)),
            MatchField::actset_output(4),
            MatchField::packet_type(0, 0x0800),
            MatchField::reg(6, 0x0a00_0001, Some(0xffff_ffff)),
            MatchField::nx_arp_sha(MacAddr([0x02, 0x00, 0x5e, 0x10, 0x00, 0x01])),
            MatchField::nx_arp_tha(MacAddr([0x02, 0x00, 0x5e, 0x10, 0x00, 0x02])),
            MatchField::tun_ipv4_src("172.16.0.1".parse().unwrap(), None),
            MatchField::tun_ipv6_dst(v6, None),
            MatchField::ip_ttl(64),
            MatchField::pkt_mark(42, None),
            MatchField::conj_id(77),
            MatchField::ct_state(0x21, Some(0xff)),
            MatchField::ct_zone(4097),
            MatchField::ct_mark(0x8000_0000, Some(0x8000_0000)),
            MatchField::ct_nw_proto(17),
            MatchField::ct_nw_src("10.1.0.0".parse().unwrap(), Some(mask_ip)),
            MatchField::ct_ipv6_dst(v6, None),
            MatchField::ct_tp_src(53),
            MatchField::ct_tp_dst(853),
        ];
        for field in fields {
            round_trip(field);
        }
    }

    #[test]
    fn masked_byte_arrays_double_the_header_length() {
        let field = MatchField::tun_metadata(2, vec![1, 2, 3, 4, 5, 6, 7, 8], Some(vec![0xff; 8]));
        assert_eq!(field.field, NXM_NX_TUN_METADATA2);
        assert_eq!(field.length, 16);
        assert_eq!(field.value.len(), 8);
        let decoded = round_trip(field);
        assert_eq!(decoded.mask.as_ref().map(MatchValue::len), Some(8));

        let unmasked = MatchField::tun_metadata(0, vec![1, 2, 3, 4], None);
        assert_eq!(unmasked.length, 4);
        round_trip(unmasked);

        let label = MatchField::ct_label([0xab; 16], Some([0xff; 16]));
        assert_eq!(label.length, 32);
        round_trip(label);

        let xxreg = MatchField::xxreg(1, vec![0; 16], None);
        assert_eq!(xxreg.length, 16);
        round_trip(xxreg);

        let preg = MatchField::packet_reg(3, vec![1, 2, 3, 4, 5, 6, 7, 8], Some(vec![0xf0; 8]));
        assert_eq!(preg.length, 16);
        round_trip(preg);
    }

    #[test]
    fn experimenter_field_carries_the_onf_id() {
        let field = MatchField::experimenter_tcp_flags(0x010, None);
        assert_eq!(field.length, 6);
        let mut bytes = vec![];
        field.marshal(&mut bytes).unwrap();
        assert_eq!(
            bytes,
            [0xff, 0xff, 0x54, 0x06, 0x4f, 0x4e, 0x46, 0x00, 0x00, 0x10]
        );
        round_trip(field);
    }

    #[test]
    fn foreign_experimenter_id_is_rejected() {
        let mut bytes = vec![];
        MatchField::experimenter_tcp_flags(0x010, None)
            .marshal(&mut bytes)
            .unwrap();
        bytes[4..8].copy_from_slice(&0xdead_beef_u32.to_be_bytes());
        let err = MatchField::unmarshal(&bytes).unwrap_err();
        assert!(matches!(
            err,
            OfpSerializationError::UnsupportedExperimenter { id: 0xdead_beef, .. }
        ));
    }

    #[test]
    fn unknown_field_is_rejected() {
        // NXM_0 TLVs are never decodable.
        let bytes = [0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x03];
        let err = MatchField::unmarshal(&bytes).unwrap_err();
        assert!(matches!(
            err,
            OfpSerializationError::UnknownOxmField { class: OXM_CLASS_NXM_0, field: 0 }
        ));
    }

    #[test]
    fn match_pads_to_eight_bytes() {
        let mut m = Match::new();
        m.add_field(MatchField::in_port(3));
        assert_eq!(m.length, 12);
        assert_eq!(m.size_of(), 16);
        let mut bytes = vec![];
        m.marshal(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[12..], [0, 0, 0, 0]);
    }

    #[test]
    fn match_round_trip() {
        let mut m = Match::new();
        m.add_field(MatchField::eth_type(0x0800));
        m.add_field(MatchField::ipv4_dst(
            "10.0.0.7".parse().unwrap(),
            Some("255.255.255.255".parse().unwrap()),
        ));
        m.add_field(MatchField::ct_zone(3));
        let mut bytes = vec![];
        m.marshal(&mut bytes).unwrap();
        assert_eq!(bytes.len() % 8, 0);
        let decoded = Match::unmarshal(&bytes).unwrap();
        assert_eq!(decoded, m);
    }

    #[test]
    fn empty_match_is_a_padded_header() {
        let m = Match::new();
        let mut bytes = vec![];
        m.marshal(&mut bytes).unwrap();
        assert_eq!(bytes, [0x00, 0x01, 0x00, 0x04, 0, 0, 0, 0]);
        assert_eq!(Match::unmarshal(&bytes).unwrap(), m);
    }

    #[test]
    fn match_rejects_non_oxm_type() {
        let bytes = [0x00, 0x00, 0x00, 0x04, 0, 0, 0, 0];
        let err = Match::unmarshal(&bytes).unwrap_err();
        assert!(matches!(err, OfpSerializationError::UnexpectedValue { .. }));
    }

    #[test]
    fn oxm_id_round_trips_in_both_widths() {
        let plain = OxmId::new(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IN_PORT, false, 4, 0);
        let mut bytes = vec![];
        plain.marshal(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 4);
        assert_eq!(OxmId::unmarshal(&bytes).unwrap(), plain);

        let exp = OxmId::new(OXM_CLASS_EXPERIMENTER, OXM_FIELD_TCP_FLAGS, true, 8, ONF_EXPERIMENTER_ID);
        let mut bytes = vec![];
        exp.marshal(&mut bytes).unwrap();
        assert_eq!(bytes.len(), 8);
        assert_eq!(OxmId::unmarshal(&bytes).unwrap(), exp);
    }
}

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::Cursor;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::ofp_message::OfpSerializationError;

// ofp_oxm_class, OpenFlow 1.5
pub const OXM_CLASS_NXM_0: u16 = 0x0000; /* Backward compatibility with NXM */
pub const OXM_CLASS_NXM_1: u16 = 0x0001; /* Backward compatibility with NXM */
pub const OXM_CLASS_OPENFLOW_BASIC: u16 = 0x8000; /* Basic class for OpenFlow */
pub const OXM_CLASS_PACKET_REGS: u16 = 0x8001; /* Packet registers (pipeline fields) */
pub const OXM_CLASS_EXPERIMENTER: u16 = 0xFFFF; /* Experimenter class */

/// The only experimenter id the decoder accepts in the experimenter class.
pub const ONF_EXPERIMENTER_ID: u32 = 0x4f4e_4600;

// Fields of OXM_CLASS_OPENFLOW_BASIC.
pub const OXM_FIELD_IN_PORT: u8 = 0; /* Switch input port */
pub const OXM_FIELD_IN_PHY_PORT: u8 = 1; /* Switch physical input port */
pub const OXM_FIELD_METADATA: u8 = 2; /* Metadata passed between tables */
pub const OXM_FIELD_ETH_DST: u8 = 3; /* Ethernet destination address */
pub const OXM_FIELD_ETH_SRC: u8 = 4; /* Ethernet source address */
pub const OXM_FIELD_ETH_TYPE: u8 = 5; /* Ethernet frame type */
pub const OXM_FIELD_VLAN_VID: u8 = 6; /* VLAN id */
pub const OXM_FIELD_VLAN_PCP: u8 = 7; /* VLAN priority */
pub const OXM_FIELD_IP_DSCP: u8 = 8; /* IP DSCP (6 bits in ToS field) */
pub const OXM_FIELD_IP_ECN: u8 = 9; /* IP ECN (2 bits in ToS field) */
pub const OXM_FIELD_IP_PROTO: u8 = 10; /* IP protocol */
pub const OXM_FIELD_IPV4_SRC: u8 = 11; /* IPv4 source address */
pub const OXM_FIELD_IPV4_DST: u8 = 12; /* IPv4 destination address */
pub const OXM_FIELD_TCP_SRC: u8 = 13; /* TCP source port */
pub const OXM_FIELD_TCP_DST: u8 = 14; /* TCP destination port */
pub const OXM_FIELD_UDP_SRC: u8 = 15; /* UDP source port */
pub const OXM_FIELD_UDP_DST: u8 = 16; /* UDP destination port */
pub const OXM_FIELD_SCTP_SRC: u8 = 17; /* SCTP source port */
pub const OXM_FIELD_SCTP_DST: u8 = 18; /* SCTP destination port */
pub const OXM_FIELD_ICMPV4_TYPE: u8 = 19; /* ICMP type */
pub const OXM_FIELD_ICMPV4_CODE: u8 = 20; /* ICMP code */
pub const OXM_FIELD_ARP_OP: u8 = 21; /* ARP opcode */
pub const OXM_FIELD_ARP_SPA: u8 = 22; /* ARP source IPv4 address */
pub const OXM_FIELD_ARP_TPA: u8 = 23; /* ARP target IPv4 address */
pub const OXM_FIELD_ARP_SHA: u8 = 24; /* ARP source hardware address */
pub const OXM_FIELD_ARP_THA: u8 = 25; /* ARP target hardware address */
pub const OXM_FIELD_IPV6_SRC: u8 = 26; /* IPv6 source address */
pub const OXM_FIELD_IPV6_DST: u8 = 27; /* IPv6 destination address */
pub const OXM_FIELD_IPV6_FLABEL: u8 = 28; /* IPv6 Flow Label */
pub const OXM_FIELD_ICMPV6_TYPE: u8 = 29; /* ICMPv6 type */
pub const OXM_FIELD_ICMPV6_CODE: u8 = 30; /* ICMPv6 code */
pub const OXM_FIELD_IPV6_ND_TARGET: u8 = 31; /* Target address for ND */
pub const OXM_FIELD_IPV6_ND_SLL: u8 = 32; /* Source link-layer for ND */
pub const OXM_FIELD_IPV6_ND_TLL: u8 = 33; /* Target link-layer for ND */
pub const OXM_FIELD_MPLS_LABEL: u8 = 34; /* MPLS label */
pub const OXM_FIELD_MPLS_TC: u8 = 35; /* MPLS TC */
pub const OXM_FIELD_MPLS_BOS: u8 = 36; /* MPLS BoS bit */
pub const OXM_FIELD_PBB_ISID: u8 = 37; /* PBB I-SID */
pub const OXM_FIELD_TUNNEL_ID: u8 = 38; /* Logical Port Metadata */
pub const OXM_FIELD_IPV6_EXTHDR: u8 = 39; /* IPv6 Extension Header pseudo-field */
pub const OXM_FIELD_PBB_UCA: u8 = 41; /* PBB UCA header field (OpenFlow 1.4) */
pub const OXM_FIELD_TCP_FLAGS: u8 = 42; /* TCP flags (OpenFlow 1.5) */
pub const OXM_FIELD_ACTSET_OUTPUT: u8 = 43; /* actset output port (OpenFlow 1.5) */
pub const OXM_FIELD_PACKET_TYPE: u8 = 44; /* Packet type value */

// Fields of OXM_CLASS_NXM_1, the Nicira extension class used by
// Open vSwitch for conntrack, registers, and tunnel metadata.
pub const NXM_NX_REG0: u8 = 0;
pub const NXM_NX_REG1: u8 = 1;
pub const NXM_NX_REG2: u8 = 2;
pub const NXM_NX_REG3: u8 = 3;
pub const NXM_NX_REG4: u8 = 4;
pub const NXM_NX_REG5: u8 = 5;
pub const NXM_NX_REG6: u8 = 6;
pub const NXM_NX_REG7: u8 = 7;
pub const NXM_NX_REG8: u8 = 8;
pub const NXM_NX_REG9: u8 = 9;
pub const NXM_NX_REG10: u8 = 10;
pub const NXM_NX_REG11: u8 = 11;
pub const NXM_NX_REG12: u8 = 12;
pub const NXM_NX_REG13: u8 = 13;
pub const NXM_NX_REG14: u8 = 14;
pub const NXM_NX_REG15: u8 = 15;
pub const NXM_NX_TUN_ID: u8 = 16; /* tun_id, VNI */
pub const NXM_NX_ARP_SHA: u8 = 17; /* ARP source Ethernet address */
pub const NXM_NX_ARP_THA: u8 = 18; /* ARP target Ethernet address */
pub const NXM_NX_IPV6_SRC: u8 = 19; /* IPv6 source address */
pub const NXM_NX_IPV6_DST: u8 = 20; /* IPv6 destination address */
pub const NXM_NX_ICMPV6_TYPE: u8 = 21; /* ICMPv6 type */
pub const NXM_NX_ICMPV6_CODE: u8 = 22; /* ICMPv6 code */
pub const NXM_NX_ND_TARGET: u8 = 23; /* ND target address */
pub const NXM_NX_ND_SLL: u8 = 24; /* ND source link-layer address */
pub const NXM_NX_ND_TLL: u8 = 25; /* ND target link-layer address */
pub const NXM_NX_IP_FRAG: u8 = 26; /* IP fragments */
pub const NXM_NX_IPV6_LABEL: u8 = 27; /* low 20 bits of the IPv6 flow label */
pub const NXM_NX_IP_ECN: u8 = 28; /* ToS byte with DSCP bits cleared */
pub const NXM_NX_IP_TTL: u8 = 29; /* time-to-live field */
pub const NXM_NX_MPLS_TTL: u8 = 30; /* time-to-live from the MPLS label */
pub const NXM_NX_TUN_IPV4_SRC: u8 = 31; /* src IPv4 address of tunnel */
pub const NXM_NX_TUN_IPV4_DST: u8 = 32; /* dst IPv4 address of tunnel */
pub const NXM_NX_PKT_MARK: u8 = 33; /* packet mark from the Linux kernel */
pub const NXM_NX_TCP_FLAGS: u8 = 34;
pub const NXM_NX_DP_HASH: u8 = 35;
pub const NXM_NX_RECIRC_ID: u8 = 36; /* recirculation id, used with ct */
pub const NXM_NX_CONJ_ID: u8 = 37; /* conjunction id for conjunctive match */
pub const NXM_NX_TUN_GBP_ID: u8 = 38; /* GBP policy id */
pub const NXM_NX_TUN_GBP_FLAGS: u8 = 39; /* GBP policy flags */
pub const NXM_NX_TUN_METADATA0: u8 = 40; /* Geneve header variable data */
pub const NXM_NX_TUN_METADATA1: u8 = 41;
pub const NXM_NX_TUN_METADATA2: u8 = 42;
pub const NXM_NX_TUN_METADATA3: u8 = 43;
pub const NXM_NX_TUN_METADATA4: u8 = 44;
pub const NXM_NX_TUN_METADATA5: u8 = 45;
pub const NXM_NX_TUN_METADATA6: u8 = 46;
pub const NXM_NX_TUN_METADATA7: u8 = 47;
pub const NXM_NX_TUN_FLAGS: u8 = 104; /* tunnel flags */
pub const NXM_NX_CT_STATE: u8 = 105; /* ct_state for conn_track */
pub const NXM_NX_CT_ZONE: u8 = 106; /* ct_zone for conn_track */
pub const NXM_NX_CT_MARK: u8 = 107; /* ct_mark for conn_track */
pub const NXM_NX_CT_LABEL: u8 = 108; /* ct_label for conn_track */
pub const NXM_NX_TUN_IPV6_SRC: u8 = 109; /* src IPv6 address of tunnel */
pub const NXM_NX_TUN_IPV6_DST: u8 = 110; /* dst IPv6 address of tunnel */
pub const NXM_NX_XXREG0: u8 = 111; /* 128-bit extended register 0 */
pub const NXM_NX_XXREG1: u8 = 112;
pub const NXM_NX_XXREG2: u8 = 113;
pub const NXM_NX_XXREG3: u8 = 114;
pub const NXM_NX_CT_NW_PROTO: u8 = 119; /* protocol of the original-direction conntrack tuple */
pub const NXM_NX_CT_NW_SRC: u8 = 120; /* IPv4 source of the original-direction conntrack tuple */
pub const NXM_NX_CT_NW_DST: u8 = 121; /* IPv4 destination of the original-direction conntrack tuple */
pub const NXM_NX_CT_IPV6_SRC: u8 = 122; /* IPv6 source of the original-direction conntrack tuple */
pub const NXM_NX_CT_IPV6_DST: u8 = 123; /* IPv6 destination of the original-direction conntrack tuple */
pub const NXM_NX_CT_TP_SRC: u8 = 124; /* transport source port of the original-direction conntrack tuple */
pub const NXM_NX_CT_TP_DST: u8 = 125; /* transport destination port of the original-direction conntrack tuple */

// Fields of OXM_CLASS_PACKET_REGS, OpenFlow 1.5 packet registers.
pub const OXM_PACKET_REG0: u8 = 0;
pub const OXM_PACKET_REG1: u8 = 1;
pub const OXM_PACKET_REG2: u8 = 2;
pub const OXM_PACKET_REG3: u8 = 3;
pub const OXM_PACKET_REG4: u8 = 4;
pub const OXM_PACKET_REG5: u8 = 5;
pub const OXM_PACKET_REG6: u8 = 6;
pub const OXM_PACKET_REG7: u8 = 7;

/// A 48-bit IEEE 802 hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub const LENGTH: usize = 6;

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl From<[u8; 6]> for MacAddr {
    fn from(octets: [u8; 6]) -> MacAddr {
        MacAddr(octets)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// Concrete payload layout selected by an OXM `(class, field)` pair.
///
/// Every supported pair maps to exactly one shape; the shape decides how
/// many bytes the value (and the mask, when present) occupies on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    U8,
    U16,
    U32,
    U64,
    Mac,
    Ipv4,
    Ipv6,
    Bytes,
    PacketType,
}

impl PayloadShape {
    /// Fixed byte width of the shape, or `None` for the header-sized
    /// `Bytes` shape.
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            PayloadShape::U8 => Some(1),
            PayloadShape::U16 => Some(2),
            PayloadShape::U32 | PayloadShape::Ipv4 | PayloadShape::PacketType => Some(4),
            PayloadShape::Mac => Some(6),
            PayloadShape::U64 => Some(8),
            PayloadShape::Ipv6 => Some(16),
            PayloadShape::Bytes => None,
        }
    }
}

/// One-table dispatch from `(class, field)` to the payload layout.
///
/// Unknown pairs are a hard error rather than a skippable TLV: OXM payload
/// lengths are field-specific, so a decoder that does not recognize a pair
/// cannot know where the next TLV starts.
pub fn payload_shape(class: u16, field: u8) -> Result<PayloadShape, OfpSerializationError> {
    use PayloadShape::*;

    let shape = match (class, field) {
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IN_PORT) => U32,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IN_PHY_PORT) => U32,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_METADATA) => U64,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ETH_DST) => Mac,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ETH_SRC) => Mac,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ETH_TYPE) => U16,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_VLAN_VID) => U16,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_VLAN_PCP) => U8,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IP_DSCP) => U8,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IP_ECN) => U8,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IP_PROTO) => U8,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IPV4_SRC) => Ipv4,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IPV4_DST) => Ipv4,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_TCP_SRC) => U16,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_TCP_DST) => U16,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_UDP_SRC) => U16,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_UDP_DST) => U16,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_SCTP_SRC) => U16,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_SCTP_DST) => U16,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ICMPV4_TYPE) => U8,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ICMPV4_CODE) => U8,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ARP_OP) => U16,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ARP_SPA) => Ipv4,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ARP_TPA) => Ipv4,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ARP_SHA) => Mac,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ARP_THA) => Mac,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IPV6_SRC) => Ipv6,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IPV6_DST) => Ipv6,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IPV6_FLABEL) => U32,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ICMPV6_TYPE) => U8,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ICMPV6_CODE) => U8,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IPV6_ND_TARGET) => Ipv6,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IPV6_ND_SLL) => Mac,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IPV6_ND_TLL) => Mac,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_MPLS_LABEL) => U32,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_MPLS_TC) => U8,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_MPLS_BOS) => U8,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_PBB_ISID) => U32,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_TUNNEL_ID) => U64,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IPV6_EXTHDR) => U16,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_TCP_FLAGS) => U16,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_ACTSET_OUTPUT) => U32,
        (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_PACKET_TYPE) => PacketType,

        (OXM_CLASS_NXM_1, NXM_NX_REG0..=NXM_NX_REG15) => U32,
        (OXM_CLASS_NXM_1, NXM_NX_ARP_SHA) => Mac,
        (OXM_CLASS_NXM_1, NXM_NX_ARP_THA) => Mac,
        (OXM_CLASS_NXM_1, NXM_NX_IPV6_SRC) => Ipv6,
        (OXM_CLASS_NXM_1, NXM_NX_IPV6_DST) => Ipv6,
        (OXM_CLASS_NXM_1, NXM_NX_ICMPV6_TYPE) => U8,
        (OXM_CLASS_NXM_1, NXM_NX_ICMPV6_CODE) => U8,
        (OXM_CLASS_NXM_1, NXM_NX_ND_TARGET) => Ipv6,
        (OXM_CLASS_NXM_1, NXM_NX_ND_SLL) => Mac,
        (OXM_CLASS_NXM_1, NXM_NX_ND_TLL) => Mac,
        (OXM_CLASS_NXM_1, NXM_NX_IP_TTL) => U8,
        (OXM_CLASS_NXM_1, NXM_NX_TUN_IPV4_SRC) => Ipv4,
        (OXM_CLASS_NXM_1, NXM_NX_TUN_IPV4_DST) => Ipv4,
        (OXM_CLASS_NXM_1, NXM_NX_PKT_MARK) => U32,
        (OXM_CLASS_NXM_1, NXM_NX_CONJ_ID) => U32,
        (OXM_CLASS_NXM_1, NXM_NX_TUN_METADATA0..=NXM_NX_TUN_METADATA7) => Bytes,
        (OXM_CLASS_NXM_1, NXM_NX_CT_STATE) => U32,
        (OXM_CLASS_NXM_1, NXM_NX_CT_ZONE) => U16,
        (OXM_CLASS_NXM_1, NXM_NX_CT_MARK) => U32,
        (OXM_CLASS_NXM_1, NXM_NX_CT_LABEL) => Bytes,
        (OXM_CLASS_NXM_1, NXM_NX_TUN_IPV6_SRC) => Ipv6,
        (OXM_CLASS_NXM_1, NXM_NX_TUN_IPV6_DST) => Ipv6,
        (OXM_CLASS_NXM_1, NXM_NX_XXREG0..=NXM_NX_XXREG3) => Bytes,
        (OXM_CLASS_NXM_1, NXM_NX_CT_NW_PROTO) => U8,
        (OXM_CLASS_NXM_1, NXM_NX_CT_NW_SRC) => Ipv4,
        (OXM_CLASS_NXM_1, NXM_NX_CT_NW_DST) => Ipv4,
        (OXM_CLASS_NXM_1, NXM_NX_CT_IPV6_SRC) => Ipv6,
        (OXM_CLASS_NXM_1, NXM_NX_CT_IPV6_DST) => Ipv6,
        (OXM_CLASS_NXM_1, NXM_NX_CT_TP_SRC) => U16,
        (OXM_CLASS_NXM_1, NXM_NX_CT_TP_DST) => U16,

        (OXM_CLASS_PACKET_REGS, OXM_PACKET_REG0..=OXM_PACKET_REG7) => Bytes,

        (OXM_CLASS_EXPERIMENTER, OXM_FIELD_TCP_FLAGS) => U16,

        _ => return Err(OfpSerializationError::UnknownOxmField { class, field }),
    };

    Ok(shape)
}

/// Decoded payload of one OXM TLV.
///
/// The variant in play is fixed by the `(class, field)` pair through
/// [`payload_shape`]; values and masks of the same field always share a
/// variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Mac(MacAddr),
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Bytes(Vec<u8>),
    PacketType { namespace: u16, ns_type: u16 },
}

impl MatchValue {
    /// Payload bytes this value occupies on the wire.
    pub fn len(&self) -> usize {
        match self {
            MatchValue::U8(_) => 1,
            MatchValue::U16(_) => 2,
            MatchValue::U32(_) | MatchValue::Ipv4(_) | MatchValue::PacketType { .. } => 4,
            MatchValue::Mac(_) => 6,
            MatchValue::U64(_) => 8,
            MatchValue::Ipv6(_) => 16,
            MatchValue::Bytes(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> PayloadShape {
        match self {
            MatchValue::U8(_) => PayloadShape::U8,
            MatchValue::U16(_) => PayloadShape::U16,
            MatchValue::U32(_) => PayloadShape::U32,
            MatchValue::U64(_) => PayloadShape::U64,
            MatchValue::Mac(_) => PayloadShape::Mac,
            MatchValue::Ipv4(_) => PayloadShape::Ipv4,
            MatchValue::Ipv6(_) => PayloadShape::Ipv6,
            MatchValue::Bytes(_) => PayloadShape::Bytes,
            MatchValue::PacketType { .. } => PayloadShape::PacketType,
        }
    }

    /// Append the big-endian wire form of the value to `bytes`.
    pub fn marshal(&self, bytes: &mut Vec<u8>) {
        match self {
            MatchValue::U8(v) => bytes.write_u8(*v).unwrap(),
            MatchValue::U16(v) => bytes.write_u16::<BigEndian>(*v).unwrap(),
            MatchValue::U32(v) => bytes.write_u32::<BigEndian>(*v).unwrap(),
            MatchValue::U64(v) => bytes.write_u64::<BigEndian>(*v).unwrap(),
            MatchValue::Mac(mac) => bytes.extend_from_slice(&mac.0),
            MatchValue::Ipv4(ip) => bytes.extend_from_slice(&ip.octets()),
            MatchValue::Ipv6(ip) => bytes.extend_from_slice(&ip.octets()),
            MatchValue::Bytes(b) => bytes.extend_from_slice(b),
            MatchValue::PacketType { namespace, ns_type } => {
                bytes.write_u16::<BigEndian>(*namespace).unwrap();
                bytes.write_u16::<BigEndian>(*ns_type).unwrap();
            }
        }
    }

    /// Decode one payload of `shape` from the front of `buf`.
    ///
    /// `payload_len` is the per-side byte count taken from the TLV header;
    /// only the `Bytes` shape is sized by it, every other shape has a fixed
    /// width.
    pub fn unmarshal(
        shape: PayloadShape,
        payload_len: usize,
        buf: &[u8],
    ) -> Result<MatchValue, OfpSerializationError> {
        let needed = shape.fixed_len().unwrap_or(payload_len);
        if buf.len() < needed {
            return Err(OfpSerializationError::ShortBuffer {
                needed,
                remaining: buf.len(),
                context: "OXM payload",
            });
        }

        let mut bytes = Cursor::new(buf);
        let value = match shape {
            PayloadShape::U8 => MatchValue::U8(bytes.read_u8().unwrap()),
            PayloadShape::U16 => MatchValue::U16(bytes.read_u16::<BigEndian>().unwrap()),
            PayloadShape::U32 => MatchValue::U32(bytes.read_u32::<BigEndian>().unwrap()),
            PayloadShape::U64 => MatchValue::U64(bytes.read_u64::<BigEndian>().unwrap()),
            PayloadShape::Mac => {
                let mut octets = [0u8; 6];
                octets.copy_from_slice(&buf[..6]);
                MatchValue::Mac(MacAddr(octets))
            }
            PayloadShape::Ipv4 => MatchValue::Ipv4(Ipv4Addr::new(buf[0], buf[1], buf[2], buf[3])),
            PayloadShape::Ipv6 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&buf[..16]);
                MatchValue::Ipv6(Ipv6Addr::from(octets))
            }
            PayloadShape::Bytes => MatchValue::Bytes(buf[..payload_len].to_vec()),
            PayloadShape::PacketType => MatchValue::PacketType {
                namespace: bytes.read_u16::<BigEndian>().unwrap(),
                ns_type: bytes.read_u16::<BigEndian>().unwrap(),
            },
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_covers_the_supported_classes() {
        assert_eq!(
            payload_shape(OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_IN_PORT).unwrap(),
            PayloadShape::U32
        );
        assert_eq!(
            payload_shape(OXM_CLASS_NXM_1, NXM_NX_CT_ZONE).unwrap(),
            PayloadShape::U16
        );
        assert_eq!(
            payload_shape(OXM_CLASS_NXM_1, NXM_NX_TUN_METADATA5).unwrap(),
            PayloadShape::Bytes
        );
        assert_eq!(
            payload_shape(OXM_CLASS_PACKET_REGS, OXM_PACKET_REG7).unwrap(),
            PayloadShape::Bytes
        );
        assert_eq!(
            payload_shape(OXM_CLASS_EXPERIMENTER, OXM_FIELD_TCP_FLAGS).unwrap(),
            PayloadShape::U16
        );
    }

    #[test]
    fn dispatch_rejects_unknown_pairs() {
        // NXM_0 carries no supported fields, and the original's dangling
        // entries (tun_id, ip_frag, dp_hash, ...) are typed errors here.
        for (class, field) in [
            (OXM_CLASS_NXM_0, OXM_FIELD_IN_PORT),
            (OXM_CLASS_NXM_1, NXM_NX_TUN_ID),
            (OXM_CLASS_NXM_1, NXM_NX_IP_FRAG),
            (OXM_CLASS_NXM_1, NXM_NX_DP_HASH),
            (OXM_CLASS_OPENFLOW_BASIC, 60),
            (OXM_CLASS_OPENFLOW_BASIC, OXM_FIELD_PBB_UCA),
        ] {
            let err = payload_shape(class, field).unwrap_err();
            assert!(
                matches!(err, OfpSerializationError::UnknownOxmField { class: c, field: f }
                    if c == class && f == field),
                "expected UnknownOxmField for ({class:#06x}, {field})"
            );
        }
    }

    #[test]
    fn values_round_trip_through_their_shape() {
        let cases = vec![
            (MatchValue::U8(0x7f), PayloadShape::U8),
            (MatchValue::U16(0xbeef), PayloadShape::U16),
            (MatchValue::U32(0xdead_beef), PayloadShape::U32),
            (MatchValue::U64(0x0123_4567_89ab_cdef), PayloadShape::U64),
            (
                MatchValue::Mac(MacAddr([1, 2, 3, 4, 5, 6])),
                PayloadShape::Mac,
            ),
            (
                MatchValue::Ipv4(Ipv4Addr::new(10, 0, 0, 1)),
                PayloadShape::Ipv4,
            ),
            (
                MatchValue::Ipv6("fe80::1".parse().unwrap()),
                PayloadShape::Ipv6,
            ),
            (
                MatchValue::Bytes(vec![0xaa, 0xbb, 0xcc, 0xdd]),
                PayloadShape::Bytes,
            ),
            (
                MatchValue::PacketType {
                    namespace: 0,
                    ns_type: 0x0800,
                },
                PayloadShape::PacketType,
            ),
        ];
        for (value, shape) in cases {
            let mut bytes = vec![];
            value.marshal(&mut bytes);
            assert_eq!(bytes.len(), value.len());
            assert_eq!(value.shape(), shape);
            let decoded = MatchValue::unmarshal(shape, bytes.len(), &bytes).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn unmarshal_rejects_short_payload() {
        let err = MatchValue::unmarshal(PayloadShape::Ipv6, 16, &[0u8; 7]).unwrap_err();
        assert!(matches!(
            err,
            OfpSerializationError::ShortBuffer { needed: 16, remaining: 7, .. }
        ));
    }

    #[test]
    fn mac_addr_formats_as_colon_hex() {
        let mac = MacAddr([0x01, 0x80, 0xc2, 0x00, 0x00, 0x0e]);
        assert_eq!(mac.to_string(), "01:80:c2:00:00:0e");
    }
}

//! OpenFlow Extensible Match (OXM) entries.
//!
//! Wire layout: `class:2, field<<1|has_mask:1, length:1, [mask], value`. With the
//! mask bit set the length byte covers mask and value, which are equally long.

use std::io::Cursor;
use std::net::{Ipv4Addr, Ipv6Addr};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::ofp_message::{OfpCodec, OfpSerializationError};
use crate::ofp_utils::{ensure_remaining, read_slice};

const OXM_HEADER_LEN: usize = 4;
const OXM_FIELD_MAX: u8 = 0x7f;
const OXM_PAYLOAD_MAX: usize = 0xff;

/// VLAN id bit set when a VLAN tag is present.
pub const OFPVID_PRESENT: u16 = 0x1000;
/// VLAN id value matching packets without a VLAN tag.
pub const OFPVID_NONE: u16 = 0x0000;

/// IPv6 extension header pseudo-field flags for `Ipv6Exthdr`.
pub const OFPIEH_NONEXT: u16 = 1 << 0;
pub const OFPIEH_ESP: u16 = 1 << 1;
pub const OFPIEH_AUTH: u16 = 1 << 2;
pub const OFPIEH_DEST: u16 = 1 << 3;
pub const OFPIEH_FRAG: u16 = 1 << 4;
pub const OFPIEH_ROUTER: u16 = 1 << 5;
pub const OFPIEH_HOP: u16 = 1 << 6;
pub const OFPIEH_UNREP: u16 = 1 << 7;
pub const OFPIEH_UNSEQ: u16 = 1 << 8;

/// OXM class. Classes below 0x8000 are ONF member classes, 0x8000 and above
/// are reserved for standardisation.
///
/// Classes compare by wire value, so `Other(0x8000)` equals `OpenFlowBasic`.
/// Decoding always yields the named variant.
#[derive(Copy, Clone, Debug, Eq)]
pub enum OxmClass {
    /// Backward compatibility with NXM.
    Nxm0,
    /// Backward compatibility with NXM.
    Nxm1,
    /// The basic set of OpenFlow match fields.
    OpenFlowBasic,
    /// Experimenter matches.
    Experimenter,
    Other(u16),
}

impl OxmClass {
    pub fn of_int(c: u16) -> OxmClass {
        match c {
            0x0000 => OxmClass::Nxm0,
            0x0001 => OxmClass::Nxm1,
            0x8000 => OxmClass::OpenFlowBasic,
            0xffff => OxmClass::Experimenter,
            c => OxmClass::Other(c),
        }
    }

    pub fn to_int(c: OxmClass) -> u16 {
        match c {
            OxmClass::Nxm0 => 0x0000,
            OxmClass::Nxm1 => 0x0001,
            OxmClass::OpenFlowBasic => 0x8000,
            OxmClass::Experimenter => 0xffff,
            OxmClass::Other(c) => c,
        }
    }
}

impl PartialEq for OxmClass {
    fn eq(&self, other: &OxmClass) -> bool {
        OxmClass::to_int(*self) == OxmClass::to_int(*other)
    }
}

/// Match fields of the `OpenFlowBasic` class.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OxmField {
    InPort,
    InPhyPort,
    Metadata,
    EthDst,
    EthSrc,
    EthType,
    VlanVid,
    VlanPcp,
    IpDscp,
    IpEcn,
    IpProto,
    Ipv4Src,
    Ipv4Dst,
    TcpSrc,
    TcpDst,
    UdpSrc,
    UdpDst,
    SctpSrc,
    SctpDst,
    Icmpv4Type,
    Icmpv4Code,
    ArpOp,
    ArpSpa,
    ArpTpa,
    ArpSha,
    ArpTha,
    Ipv6Src,
    Ipv6Dst,
    Ipv6Flabel,
    Icmpv6Type,
    Icmpv6Code,
    Ipv6NdTarget,
    Ipv6NdSll,
    Ipv6NdTll,
    MplsLabel,
    MplsTc,
    MplsBos,
    PbbIsid,
    TunnelId,
    Ipv6Exthdr,
}

const BASIC_FIELDS: [OxmField; 40] = [OxmField::InPort,
                                      OxmField::InPhyPort,
                                      OxmField::Metadata,
                                      OxmField::EthDst,
                                      OxmField::EthSrc,
                                      OxmField::EthType,
                                      OxmField::VlanVid,
                                      OxmField::VlanPcp,
                                      OxmField::IpDscp,
                                      OxmField::IpEcn,
                                      OxmField::IpProto,
                                      OxmField::Ipv4Src,
                                      OxmField::Ipv4Dst,
                                      OxmField::TcpSrc,
                                      OxmField::TcpDst,
                                      OxmField::UdpSrc,
                                      OxmField::UdpDst,
                                      OxmField::SctpSrc,
                                      OxmField::SctpDst,
                                      OxmField::Icmpv4Type,
                                      OxmField::Icmpv4Code,
                                      OxmField::ArpOp,
                                      OxmField::ArpSpa,
                                      OxmField::ArpTpa,
                                      OxmField::ArpSha,
                                      OxmField::ArpTha,
                                      OxmField::Ipv6Src,
                                      OxmField::Ipv6Dst,
                                      OxmField::Ipv6Flabel,
                                      OxmField::Icmpv6Type,
                                      OxmField::Icmpv6Code,
                                      OxmField::Ipv6NdTarget,
                                      OxmField::Ipv6NdSll,
                                      OxmField::Ipv6NdTll,
                                      OxmField::MplsLabel,
                                      OxmField::MplsTc,
                                      OxmField::MplsBos,
                                      OxmField::PbbIsid,
                                      OxmField::TunnelId,
                                      OxmField::Ipv6Exthdr];

impl OxmField {
    pub fn of_int(f: u8) -> Option<OxmField> {
        BASIC_FIELDS.get(f as usize).cloned()
    }
}

/// One typed, optionally masked match field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Oxm {
    pub class: OxmClass,
    /// Class-specific field id, 7 bits on the wire.
    pub field: u8,
    pub mask: Option<Vec<u8>>,
    pub value: Vec<u8>,
}

impl Oxm {
    /// An entry of the `OpenFlowBasic` class.
    pub fn basic(field: OxmField, value: Vec<u8>, mask: Option<Vec<u8>>) -> Oxm {
        Oxm {
            class: OxmClass::OpenFlowBasic,
            field: field as u8,
            mask: mask,
            value: value,
        }
    }

    /// The named basic field of this entry, if it belongs to the `OpenFlowBasic` class.
    pub fn basic_field(&self) -> Option<OxmField> {
        if self.class == OxmClass::OpenFlowBasic {
            OxmField::of_int(self.field)
        } else {
            None
        }
    }

    /// An unmasked entry of the `Experimenter` class. The experimenter id is
    /// carried ahead of `value` and counted in the length byte.
    pub fn experimenter(field: u8, experimenter: u32, value: &[u8]) -> Oxm {
        let mut payload = experimenter.to_be_bytes().to_vec();
        payload.extend_from_slice(value);
        Oxm {
            class: OxmClass::Experimenter,
            field: field,
            mask: None,
            value: payload,
        }
    }

    /// Experimenter id and remaining value of an unmasked `Experimenter` entry.
    pub fn experimenter_value(&self) -> Option<(u32, &[u8])> {
        if self.class != OxmClass::Experimenter || self.mask.is_some() || self.value.len() < 4 {
            return None;
        }
        let (id, rest) = self.value.split_at(4);
        Some((u32::from_be_bytes([id[0], id[1], id[2], id[3]]), rest))
    }

    pub fn in_port(port: u32) -> Oxm {
        Oxm::basic(OxmField::InPort, port.to_be_bytes().to_vec(), None)
    }

    pub fn metadata(metadata: u64, mask: Option<u64>) -> Oxm {
        Oxm::basic(OxmField::Metadata,
                   metadata.to_be_bytes().to_vec(),
                   mask.map(|m| m.to_be_bytes().to_vec()))
    }

    pub fn eth_dst(addr: [u8; 6], mask: Option<[u8; 6]>) -> Oxm {
        Oxm::basic(OxmField::EthDst, addr.to_vec(), mask.map(|m| m.to_vec()))
    }

    pub fn eth_src(addr: [u8; 6], mask: Option<[u8; 6]>) -> Oxm {
        Oxm::basic(OxmField::EthSrc, addr.to_vec(), mask.map(|m| m.to_vec()))
    }

    pub fn eth_type(eth_type: u16) -> Oxm {
        Oxm::basic(OxmField::EthType, eth_type.to_be_bytes().to_vec(), None)
    }

    pub fn vlan_vid(vid: u16, mask: Option<u16>) -> Oxm {
        Oxm::basic(OxmField::VlanVid,
                   vid.to_be_bytes().to_vec(),
                   mask.map(|m| m.to_be_bytes().to_vec()))
    }

    pub fn ip_proto(proto: u8) -> Oxm {
        Oxm::basic(OxmField::IpProto, vec![proto], None)
    }

    pub fn ipv4_src(addr: Ipv4Addr, mask: Option<Ipv4Addr>) -> Oxm {
        Oxm::basic(OxmField::Ipv4Src,
                   addr.octets().to_vec(),
                   mask.map(|m| m.octets().to_vec()))
    }

    pub fn ipv4_dst(addr: Ipv4Addr, mask: Option<Ipv4Addr>) -> Oxm {
        Oxm::basic(OxmField::Ipv4Dst,
                   addr.octets().to_vec(),
                   mask.map(|m| m.octets().to_vec()))
    }

    pub fn tcp_src(port: u16) -> Oxm {
        Oxm::basic(OxmField::TcpSrc, port.to_be_bytes().to_vec(), None)
    }

    pub fn tcp_dst(port: u16) -> Oxm {
        Oxm::basic(OxmField::TcpDst, port.to_be_bytes().to_vec(), None)
    }

    pub fn udp_src(port: u16) -> Oxm {
        Oxm::basic(OxmField::UdpSrc, port.to_be_bytes().to_vec(), None)
    }

    pub fn udp_dst(port: u16) -> Oxm {
        Oxm::basic(OxmField::UdpDst, port.to_be_bytes().to_vec(), None)
    }

    pub fn ipv6_src(addr: Ipv6Addr, mask: Option<Ipv6Addr>) -> Oxm {
        Oxm::basic(OxmField::Ipv6Src,
                   addr.octets().to_vec(),
                   mask.map(|m| m.octets().to_vec()))
    }

    pub fn ipv6_dst(addr: Ipv6Addr, mask: Option<Ipv6Addr>) -> Oxm {
        Oxm::basic(OxmField::Ipv6Dst,
                   addr.octets().to_vec(),
                   mask.map(|m| m.octets().to_vec()))
    }

    fn payload_len(&self) -> usize {
        self.mask.as_ref().map_or(0, |m| m.len()) + self.value.len()
    }
}

impl OfpCodec for Oxm {
    fn size_of(&self) -> usize {
        OXM_HEADER_LEN + self.payload_len()
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Oxm, OfpSerializationError> {
        ensure_remaining(bytes, OXM_HEADER_LEN, "oxm header")?;
        let class = OxmClass::of_int(bytes.read_u16::<BigEndian>()?);
        let field_raw = bytes.read_u8()?;
        let len = bytes.read_u8()? as usize;
        let has_mask = field_raw & 1 == 1;
        let field = field_raw >> 1;
        let mask = if has_mask {
            if len % 2 != 0 {
                return Err(OfpSerializationError::MalformedMessage(format!(
                    "masked oxm field {} has odd length {}", field, len)));
            }
            ensure_remaining(bytes, len, "oxm payload")?;
            Some(read_slice(bytes, len / 2, "oxm mask")?.to_vec())
        } else {
            None
        };
        let value_len = if has_mask { len / 2 } else { len };
        let value = read_slice(bytes, value_len, "oxm value")?.to_vec();
        Ok(Oxm {
            class: class,
            field: field,
            mask: mask,
            value: value,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        if self.field > OXM_FIELD_MAX {
            return Err(OfpSerializationError::ValueTooLarge {
                what: "oxm field id",
                len: self.field as usize,
                max: OXM_FIELD_MAX as usize,
            });
        }
        if let Some(ref mask) = self.mask {
            if mask.len() != self.value.len() {
                return Err(OfpSerializationError::MalformedMessage(format!(
                    "oxm field {} mask is {} bytes but value is {}",
                    self.field, mask.len(), self.value.len())));
            }
        }
        let len = self.payload_len();
        if len > OXM_PAYLOAD_MAX {
            return Err(OfpSerializationError::ValueTooLarge {
                what: "oxm payload",
                len: len,
                max: OXM_PAYLOAD_MAX,
            });
        }
        bytes.write_u16::<BigEndian>(OxmClass::to_int(self.class))?;
        bytes.write_u8(self.field << 1 | self.mask.is_some() as u8)?;
        bytes.write_u8(len as u8)?;
        if let Some(ref mask) = self.mask {
            bytes.extend_from_slice(mask);
        }
        bytes.extend_from_slice(&self.value);
        Ok(())
    }
}

//! OpenFlow 1.3 (wire version 0x04) flow and group programming structures.

use byteorder::{BigEndian, WriteBytesExt};

use crate::ofp_message::OfpSerializationError;

pub mod action;
pub mod flow;
pub mod group;
pub mod instruction;
pub mod ofp_match;
pub mod oxm;

pub use self::action::{Action, ActionType};
pub use self::flow::{FlowMod, FlowModCommand, FlowModFlags, FlowRemoved, FlowRemovedReason,
                     FlowStats, FlowStatsRequest};
pub use self::group::{Bucket, BucketCounter, GroupMod, GroupModCommand, GroupStats,
                      GroupStatsRequest, GroupType};
pub use self::instruction::{Instruction, InstructionType, Instructions};
pub use self::ofp_match::{Match, MatchType};
pub use self::oxm::{Oxm, OxmClass, OxmField};

/// Protocol version carried in the header of every OpenFlow 1.3 message.
pub const OFP_VERSION: u8 = 0x04;

/// `buffer_id` value meaning no packet is buffered at the switch.
pub const OFP_NO_BUFFER: u32 = 0xffff_ffff;

/// Wildcard table id, valid for flow deletion and statistics requests.
pub const OFPTT_ALL: u8 = 0xff;

/// Last usable group number.
pub const OFPG_MAX: u32 = 0xffff_ff00;
/// All groups, for group delete and group statistics requests.
pub const OFPG_ALL: u32 = 0xffff_fffc;
/// Wildcard group, meaning no restriction.
pub const OFPG_ANY: u32 = 0xffff_ffff;

/// Group identifier. Values above `OFPG_MAX` are reserved.
pub type GroupId = u32;

#[repr(u32)]
enum OfpPort {
    OFPPMax = 0xffff_ff00,
    OFPPInPort = 0xffff_fff8,
    OFPPTable = 0xffff_fff9,
    OFPPNormal = 0xffff_fffa,
    OFPPFlood = 0xffff_fffb,
    OFPPAll = 0xffff_fffc,
    OFPPController = 0xffff_fffd,
    OFPPLocal = 0xffff_fffe,
    OFPPAny = 0xffff_ffff,
}

/// Port behavior.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PseudoPort {
    PhysicalPort(u32),
    InPort,
    Table,
    Normal,
    Flood,
    AllPorts,
    Controller,
    Local,
}

impl PseudoPort {
    /// Decode a port number where `OFPP_ANY` stands for "no port".
    pub fn of_int(p: u32) -> Result<Option<PseudoPort>, OfpSerializationError> {
        if (OfpPort::OFPPAny as u32) == p {
            Ok(None)
        } else {
            Ok(Some(PseudoPort::make(p)?))
        }
    }

    /// Decode a port number that must name an actual port.
    pub fn make(p: u32) -> Result<PseudoPort, OfpSerializationError> {
        let port = match p {
            p if p == (OfpPort::OFPPInPort as u32) => PseudoPort::InPort,
            p if p == (OfpPort::OFPPTable as u32) => PseudoPort::Table,
            p if p == (OfpPort::OFPPNormal as u32) => PseudoPort::Normal,
            p if p == (OfpPort::OFPPFlood as u32) => PseudoPort::Flood,
            p if p == (OfpPort::OFPPAll as u32) => PseudoPort::AllPorts,
            p if p == (OfpPort::OFPPController as u32) => PseudoPort::Controller,
            p if p == (OfpPort::OFPPLocal as u32) => PseudoPort::Local,
            p if p <= (OfpPort::OFPPMax as u32) => PseudoPort::PhysicalPort(p),
            p => {
                return Err(OfpSerializationError::UnknownVariant {
                    kind: "port number",
                    value: p,
                })
            }
        };
        Ok(port)
    }

    /// Return the 32-bit wire value of a port.
    pub fn to_int(pp: PseudoPort) -> u32 {
        match pp {
            PseudoPort::PhysicalPort(p) => p,
            PseudoPort::InPort => OfpPort::OFPPInPort as u32,
            PseudoPort::Table => OfpPort::OFPPTable as u32,
            PseudoPort::Normal => OfpPort::OFPPNormal as u32,
            PseudoPort::Flood => OfpPort::OFPPFlood as u32,
            PseudoPort::AllPorts => OfpPort::OFPPAll as u32,
            PseudoPort::Controller => OfpPort::OFPPController as u32,
            PseudoPort::Local => OfpPort::OFPPLocal as u32,
        }
    }

    /// Write an optional port, `None` as `OFPP_ANY`.
    pub fn marshal(pp: Option<PseudoPort>,
                   bytes: &mut Vec<u8>)
                   -> Result<(), OfpSerializationError> {
        let p = match pp {
            None => OfpPort::OFPPAny as u32,
            Some(pp) => PseudoPort::to_int(pp),
        };
        bytes.write_u32::<BigEndian>(p)?;
        Ok(())
    }
}

/// How long before a flow entry expires.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Timeout {
    Permanent,
    ExpiresAfter(u16),
}

impl Timeout {
    pub fn of_int(tm: u16) -> Timeout {
        match tm {
            0 => Timeout::Permanent,
            d => Timeout::ExpiresAfter(d),
        }
    }

    pub fn to_int(tm: Timeout) -> u16 {
        match tm {
            Timeout::Permanent => 0,
            Timeout::ExpiresAfter(d) => d,
        }
    }
}

/// Decode a `buffer_id` field, `OFP_NO_BUFFER` as `None`.
pub fn buffer_id_of_int(id: u32) -> Option<u32> {
    match id {
        OFP_NO_BUFFER => None,
        n => Some(n),
    }
}

/// Encode an optional buffer id.
pub fn buffer_id_to_int(id: Option<u32>) -> u32 {
    id.unwrap_or(OFP_NO_BUFFER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_ports() {
        assert_eq!(PseudoPort::of_int(0xffff_ffff).unwrap(), None);
        assert_eq!(PseudoPort::make(0xffff_fffd).unwrap(), PseudoPort::Controller);
        assert_eq!(PseudoPort::make(7).unwrap(), PseudoPort::PhysicalPort(7));
        assert_eq!(PseudoPort::to_int(PseudoPort::Flood), 0xffff_fffb);
        assert!(matches!(PseudoPort::make(0xffff_ff01),
                         Err(OfpSerializationError::UnknownVariant { .. })));
    }

    #[test]
    fn marshal_any_port() {
        let mut bytes = vec![];
        PseudoPort::marshal(None, &mut bytes).unwrap();
        PseudoPort::marshal(Some(PseudoPort::PhysicalPort(3)), &mut bytes).unwrap();
        assert_eq!(bytes, vec![0xff, 0xff, 0xff, 0xff, 0, 0, 0, 3]);
    }

    #[test]
    fn timeouts_and_buffers() {
        assert_eq!(Timeout::of_int(0), Timeout::Permanent);
        assert_eq!(Timeout::to_int(Timeout::ExpiresAfter(30)), 30);
        assert_eq!(buffer_id_of_int(OFP_NO_BUFFER), None);
        assert_eq!(buffer_id_to_int(Some(12)), 12);
    }
}

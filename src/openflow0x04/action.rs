//! Actions applied by instructions and group buckets.
//!
//! Every action is framed as `type:2, length:2, payload, pad` where `length`
//! counts the whole record and is a non-zero multiple of 8. Instruction and bucket
//! codecs rely only on that framing; the payload layouts live here.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::ofp_message::{OfpCodec, OfpSerializationError};
use crate::ofp_utils::{align, ensure_remaining, length_field, read_slice, remaining,
                       write_padding_bytes, ALIGNMENT};
use crate::openflow0x04::oxm::Oxm;
use crate::openflow0x04::{GroupId, PseudoPort};

const ACTION_HEADER_LEN: usize = 4;
const OUTPUT_LEN: usize = 16;

/// `max_len` asking the switch to send the whole packet to the controller.
pub const OFPCML_NO_BUFFER: u16 = 0xffff;

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ActionType {
    Output = 0,
    CopyTtlOut = 11,
    CopyTtlIn = 12,
    SetMplsTtl = 15,
    DecMplsTtl = 16,
    PushVlan = 17,
    PopVlan = 18,
    PushMpls = 19,
    PopMpls = 20,
    SetQueue = 21,
    Group = 22,
    SetNwTtl = 23,
    DecNwTtl = 24,
    SetField = 25,
    PushPbb = 26,
    PopPbb = 27,
    Experimenter = 0xffff,
}

impl ActionType {
    pub fn of_int(t: u16) -> Result<ActionType, OfpSerializationError> {
        let typ = match t {
            0 => ActionType::Output,
            11 => ActionType::CopyTtlOut,
            12 => ActionType::CopyTtlIn,
            15 => ActionType::SetMplsTtl,
            16 => ActionType::DecMplsTtl,
            17 => ActionType::PushVlan,
            18 => ActionType::PopVlan,
            19 => ActionType::PushMpls,
            20 => ActionType::PopMpls,
            21 => ActionType::SetQueue,
            22 => ActionType::Group,
            23 => ActionType::SetNwTtl,
            24 => ActionType::DecNwTtl,
            25 => ActionType::SetField,
            26 => ActionType::PushPbb,
            27 => ActionType::PopPbb,
            0xffff => ActionType::Experimenter,
            t => {
                return Err(OfpSerializationError::UnknownVariant {
                    kind: "action type",
                    value: t as u32,
                })
            }
        };
        Ok(typ)
    }
}

/// Actions associated with flows and group buckets.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Output to a port; `max_len` bounds what is sent to the controller.
    Output { port: PseudoPort, max_len: u16 },
    CopyTtlOut,
    CopyTtlIn,
    SetMplsTtl(u8),
    DecMplsTtl,
    /// Push a VLAN tag with the given ethertype.
    PushVlan(u16),
    PopVlan,
    PushMpls(u16),
    /// Pop the outer MPLS label, setting the given ethertype.
    PopMpls(u16),
    SetQueue(u32),
    Group(GroupId),
    SetNwTtl(u8),
    DecNwTtl,
    SetField(Oxm),
    PushPbb(u16),
    PopPbb,
    /// `data` fills the record to its end, so its length is a multiple of 8.
    Experimenter { experimenter: u32, data: Vec<u8> },
}

impl Action {
    pub fn type_code(a: &Action) -> ActionType {
        match *a {
            Action::Output { .. } => ActionType::Output,
            Action::CopyTtlOut => ActionType::CopyTtlOut,
            Action::CopyTtlIn => ActionType::CopyTtlIn,
            Action::SetMplsTtl(_) => ActionType::SetMplsTtl,
            Action::DecMplsTtl => ActionType::DecMplsTtl,
            Action::PushVlan(_) => ActionType::PushVlan,
            Action::PopVlan => ActionType::PopVlan,
            Action::PushMpls(_) => ActionType::PushMpls,
            Action::PopMpls(_) => ActionType::PopMpls,
            Action::SetQueue(_) => ActionType::SetQueue,
            Action::Group(_) => ActionType::Group,
            Action::SetNwTtl(_) => ActionType::SetNwTtl,
            Action::DecNwTtl => ActionType::DecNwTtl,
            Action::SetField(_) => ActionType::SetField,
            Action::PushPbb(_) => ActionType::PushPbb,
            Action::PopPbb => ActionType::PopPbb,
            Action::Experimenter { .. } => ActionType::Experimenter,
        }
    }

    /// Total padded size of a list of actions.
    pub fn size_of_sequence(actions: &[Action]) -> usize {
        actions.iter().fold(0, |acc, x| x.size_of() + acc)
    }

    /// Parse back-to-back actions until `buf` is exhausted.
    pub fn parse_sequence(buf: &[u8]) -> Result<Vec<Action>, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let mut actions = vec![];
        while remaining(&bytes) > 0 {
            actions.push(Action::parse(&mut bytes)?);
        }
        Ok(actions)
    }

    pub fn marshal_sequence(actions: &[Action],
                            bytes: &mut Vec<u8>)
                            -> Result<(), OfpSerializationError> {
        let start = bytes.len();
        for act in actions {
            if let Err(e) = act.marshal(bytes) {
                bytes.truncate(start);
                return Err(e);
            }
        }
        Ok(())
    }

    fn fixed_len(typ: ActionType) -> Option<usize> {
        match typ {
            ActionType::Output => Some(OUTPUT_LEN),
            ActionType::SetField | ActionType::Experimenter => None,
            _ => Some(ALIGNMENT),
        }
    }

    fn parse_payload(typ: ActionType,
                     len: usize,
                     payload: &[u8])
                     -> Result<Action, OfpSerializationError> {
        if let Some(expected) = Action::fixed_len(typ) {
            if len != expected {
                return Err(OfpSerializationError::MalformedMessage(format!(
                    "{:?} action has length {}, expected {}", typ, len, expected)));
            }
        }
        let mut bytes = Cursor::new(payload);
        let action = match typ {
            ActionType::Output => {
                let port = PseudoPort::make(bytes.read_u32::<BigEndian>()?)?;
                let max_len = bytes.read_u16::<BigEndian>()?;
                Action::Output {
                    port: port,
                    max_len: max_len,
                }
            }
            ActionType::SetField => {
                let oxm = Oxm::parse(&mut bytes)?;
                if align(ACTION_HEADER_LEN + oxm.size_of()) != len {
                    return Err(OfpSerializationError::MalformedMessage(format!(
                        "set-field action of length {} holds a {} byte oxm", len, oxm.size_of())));
                }
                Action::SetField(oxm)
            }
            ActionType::Experimenter => {
                ensure_remaining(&bytes, 4, "experimenter action")?;
                let experimenter = bytes.read_u32::<BigEndian>()?;
                Action::Experimenter {
                    experimenter: experimenter,
                    data: payload[4..].to_vec(),
                }
            }
            ActionType::CopyTtlOut => Action::CopyTtlOut,
            ActionType::CopyTtlIn => Action::CopyTtlIn,
            ActionType::SetMplsTtl => Action::SetMplsTtl(bytes.read_u8()?),
            ActionType::DecMplsTtl => Action::DecMplsTtl,
            ActionType::PushVlan => Action::PushVlan(bytes.read_u16::<BigEndian>()?),
            ActionType::PopVlan => Action::PopVlan,
            ActionType::PushMpls => Action::PushMpls(bytes.read_u16::<BigEndian>()?),
            ActionType::PopMpls => Action::PopMpls(bytes.read_u16::<BigEndian>()?),
            ActionType::SetQueue => Action::SetQueue(bytes.read_u32::<BigEndian>()?),
            ActionType::Group => Action::Group(bytes.read_u32::<BigEndian>()?),
            ActionType::SetNwTtl => Action::SetNwTtl(bytes.read_u8()?),
            ActionType::DecNwTtl => Action::DecNwTtl,
            ActionType::PushPbb => Action::PushPbb(bytes.read_u16::<BigEndian>()?),
            ActionType::PopPbb => Action::PopPbb,
        };
        Ok(action)
    }
}

impl OfpCodec for Action {
    fn size_of(&self) -> usize {
        let body = match *self {
            Action::Output { .. } => 6,
            Action::SetMplsTtl(_) | Action::SetNwTtl(_) => 1,
            Action::PushVlan(_) | Action::PushMpls(_) | Action::PopMpls(_) |
            Action::PushPbb(_) => 2,
            Action::SetQueue(_) | Action::Group(_) => 4,
            Action::SetField(ref oxm) => oxm.size_of(),
            Action::Experimenter { ref data, .. } => 4 + data.len(),
            _ => 0,
        };
        align(ACTION_HEADER_LEN + body).max(ALIGNMENT)
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Action, OfpSerializationError> {
        ensure_remaining(bytes, ACTION_HEADER_LEN, "action header")?;
        let code = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < ALIGNMENT || len % ALIGNMENT != 0 {
            return Err(OfpSerializationError::MalformedMessage(format!(
                "action {:#x} has length {}, not a non-zero multiple of 8", code, len)));
        }
        let payload = read_slice(bytes, len - ACTION_HEADER_LEN, "action")?;
        let typ = ActionType::of_int(code)?;
        Action::parse_payload(typ, len, payload)
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let size = self.size_of();
        let len = length_field(size, "action")?;
        let mut body = vec![];
        match *self {
            Action::Output { port, max_len } => {
                PseudoPort::marshal(Some(port), &mut body)?;
                body.write_u16::<BigEndian>(max_len)?;
            }
            Action::SetMplsTtl(ttl) |
            Action::SetNwTtl(ttl) => body.write_u8(ttl)?,
            Action::PushVlan(ethertype) |
            Action::PushMpls(ethertype) |
            Action::PopMpls(ethertype) |
            Action::PushPbb(ethertype) => body.write_u16::<BigEndian>(ethertype)?,
            Action::SetQueue(id) |
            Action::Group(id) => body.write_u32::<BigEndian>(id)?,
            Action::SetField(ref oxm) => oxm.marshal(&mut body)?,
            Action::Experimenter { experimenter, ref data } => {
                if data.len() % ALIGNMENT != 0 {
                    return Err(OfpSerializationError::MalformedMessage(format!(
                        "experimenter action data of {} bytes is not a multiple of 8",
                        data.len())));
                }
                body.write_u32::<BigEndian>(experimenter)?;
                body.extend_from_slice(data);
            }
            Action::CopyTtlOut | Action::CopyTtlIn | Action::DecMplsTtl | Action::PopVlan |
            Action::DecNwTtl | Action::PopPbb => (),
        }
        bytes.write_u16::<BigEndian>(Action::type_code(self) as u16)?;
        bytes.write_u16::<BigEndian>(len)?;
        bytes.extend_from_slice(&body);
        write_padding_bytes(bytes, size - ACTION_HEADER_LEN - body.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_ttl_in_layout() {
        assert_eq!(Action::CopyTtlIn.encode().unwrap(),
                   vec![0x00, 0x0c, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(Action::CopyTtlOut.encode().unwrap(),
                   vec![0x00, 0x0b, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn output_layout() {
        let act = Action::Output {
            port: PseudoPort::PhysicalPort(3),
            max_len: OFPCML_NO_BUFFER,
        };
        assert_eq!(act.encode().unwrap(),
                   vec![0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x03, 0xff, 0xff, 0x00, 0x00,
                        0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn every_action_is_aligned_and_round_trips() {
        let actions = vec![Action::Output {
                               port: PseudoPort::Controller,
                               max_len: 128,
                           },
                           Action::CopyTtlOut,
                           Action::CopyTtlIn,
                           Action::SetMplsTtl(64),
                           Action::DecMplsTtl,
                           Action::PushVlan(0x8100),
                           Action::PopVlan,
                           Action::PushMpls(0x8847),
                           Action::PopMpls(0x0800),
                           Action::SetQueue(7),
                           Action::Group(9),
                           Action::SetNwTtl(32),
                           Action::DecNwTtl,
                           Action::SetField(Oxm::vlan_vid(0x1005, None)),
                           Action::SetField(Oxm::ipv4_dst("10.1.2.3".parse().unwrap(), None)),
                           Action::PushPbb(0x88e7),
                           Action::PopPbb,
                           Action::Experimenter {
                               experimenter: 0x2320,
                               data: vec![1, 2, 3, 4, 5, 6, 7, 8],
                           }];
        let mut bytes = vec![];
        for act in &actions {
            let encoded = act.encode().unwrap();
            assert_eq!(encoded.len() % 8, 0, "{:?}", act);
            assert_eq!(encoded.len(), act.size_of(), "{:?}", act);
            bytes.extend_from_slice(&encoded);
        }
        assert_eq!(bytes.len(), Action::size_of_sequence(&actions));
        assert_eq!(Action::parse_sequence(&bytes).unwrap(), actions);
    }

    #[test]
    fn set_field_pads_oxm() {
        let act = Action::SetField(Oxm::eth_type(0x0806));
        assert_eq!(act.encode().unwrap(),
                   vec![0x00, 0x19, 0x00, 0x10, 0x80, 0x00, 0x0a, 0x02, 0x08, 0x06, 0x00, 0x00,
                        0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn misaligned_length() {
        let buf = [0x00, 0x0c, 0x00, 0x06, 0x00, 0x00];
        assert!(matches!(Action::decode(&buf),
                         Err(OfpSerializationError::MalformedMessage(_))));
    }

    #[test]
    fn wrong_fixed_length() {
        let buf = [0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x01];
        assert!(matches!(Action::decode(&buf),
                         Err(OfpSerializationError::MalformedMessage(_))));
    }

    #[test]
    fn unknown_type() {
        let buf = [0x00, 0x05, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(Action::decode(&buf),
                         Err(OfpSerializationError::UnknownVariant {
                             kind: "action type",
                             value: 5,
                         })));
    }

    #[test]
    fn experimenter_data_must_fill_the_record() {
        let act = Action::Experimenter {
            experimenter: 0x2320,
            data: vec![1],
        };
        let mut bytes = vec![0xaa];
        assert!(matches!(act.marshal(&mut bytes),
                         Err(OfpSerializationError::MalformedMessage(_))));
        assert_eq!(bytes, vec![0xaa]);

        let act = Action::Experimenter {
            experimenter: 0x2320,
            data: vec![1, 0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 0, 0, 0, 0],
        };
        let bytes = act.encode().unwrap();
        assert_eq!(&bytes[..8], &[0xff, 0xff, 0x00, 0x18, 0x00, 0x00, 0x23, 0x20]);
        assert_eq!(Action::decode(&bytes).unwrap(), (act, 24));
    }

    #[test]
    fn failed_set_field_writes_nothing() {
        let act = Action::SetField(Oxm {
            class: crate::openflow0x04::OxmClass::OpenFlowBasic,
            field: 0x80,
            mask: None,
            value: vec![0],
        });
        let mut bytes = vec![];
        assert!(act.marshal(&mut bytes).is_err());
        assert!(bytes.is_empty());
    }

    #[test]
    fn truncated_payload() {
        let buf = [0x00, 0x00, 0x00, 0x10, 0x00, 0x00, 0x00, 0x01];
        assert!(matches!(Action::parse_sequence(&buf),
                         Err(OfpSerializationError::TruncatedInput { .. })));
    }
}

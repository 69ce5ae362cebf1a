//! Instructions attached to flow entries.
//!
//! An instruction stream has no count or outer length: the enclosing message's
//! byte budget ends it. Each instruction is `type:2, length:2, body` with `length`
//! a multiple of 8 that includes the header.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::ofp_message::{OfpCodec, OfpSerializationError};
use crate::ofp_utils::{align, ensure_remaining, length_field, read_slice, remaining,
                       write_padding_bytes, ALIGNMENT};
use crate::openflow0x04::action::Action;

const INSTRUCTION_HEADER_LEN: usize = 4;
const WRITE_METADATA_LEN: usize = 24;

#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InstructionType {
    GotoTable = 1,
    WriteMetadata = 2,
    WriteActions = 3,
    ApplyActions = 4,
    ClearActions = 5,
    Meter = 6,
    Experimenter = 0xffff,
}

impl InstructionType {
    pub fn of_int(t: u16) -> Result<InstructionType, OfpSerializationError> {
        let typ = match t {
            1 => InstructionType::GotoTable,
            2 => InstructionType::WriteMetadata,
            3 => InstructionType::WriteActions,
            4 => InstructionType::ApplyActions,
            5 => InstructionType::ClearActions,
            6 => InstructionType::Meter,
            0xffff => InstructionType::Experimenter,
            t => {
                return Err(OfpSerializationError::UnknownVariant {
                    kind: "instruction type",
                    value: t as u32,
                })
            }
        };
        Ok(typ)
    }
}

/// Pipeline-processing directive of a flow entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    /// Continue processing at the given table.
    GotoTable(u8),
    /// Write the masked metadata field for later tables.
    WriteMetadata { metadata: u64, mask: u64 },
    /// Merge the actions into the action set.
    WriteActions(Vec<Action>),
    /// Apply the actions immediately, in order.
    ApplyActions(Vec<Action>),
    ClearActions,
    Meter(u32),
    /// `data` runs to the end of the record and must be a multiple of 8 bytes.
    Experimenter { experimenter: u32, data: Vec<u8> },
}

/// The instruction set of a flow entry, in wire order.
pub type Instructions = Vec<Instruction>;

impl Instruction {
    pub fn type_code(inst: &Instruction) -> InstructionType {
        match *inst {
            Instruction::GotoTable(_) => InstructionType::GotoTable,
            Instruction::WriteMetadata { .. } => InstructionType::WriteMetadata,
            Instruction::WriteActions(_) => InstructionType::WriteActions,
            Instruction::ApplyActions(_) => InstructionType::ApplyActions,
            Instruction::ClearActions => InstructionType::ClearActions,
            Instruction::Meter(_) => InstructionType::Meter,
            Instruction::Experimenter { .. } => InstructionType::Experimenter,
        }
    }

    pub fn size_of_sequence(insts: &[Instruction]) -> usize {
        insts.iter().map(|i| i.size_of()).sum()
    }

    /// Parse instructions back to back until `buf` is exhausted.
    pub fn parse_sequence(buf: &[u8]) -> Result<Instructions, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let mut insts = vec![];
        while remaining(&bytes) > 0 {
            insts.push(Instruction::parse(&mut bytes)?);
        }
        trace!("instructions: {} decoded from {} bytes", insts.len(), buf.len());
        Ok(insts)
    }

    pub fn marshal_sequence(insts: &[Instruction],
                            bytes: &mut Vec<u8>)
                            -> Result<(), OfpSerializationError> {
        let start = bytes.len();
        for inst in insts {
            if let Err(e) = inst.marshal(bytes) {
                bytes.truncate(start);
                return Err(e);
            }
        }
        Ok(())
    }

    fn malformed(typ: InstructionType, len: usize) -> OfpSerializationError {
        OfpSerializationError::MalformedInstruction(format!("{:?} instruction with length {}",
                                                            typ,
                                                            len))
    }

    fn parse_actions(typ: InstructionType,
                     body: &[u8])
                     -> Result<Vec<Action>, OfpSerializationError> {
        Action::parse_sequence(&body[4..]).map_err(|e| match e {
            OfpSerializationError::TruncatedInput { what, .. } => {
                OfpSerializationError::MalformedInstruction(format!(
                    "{} overruns its {:?} instruction", what, typ))
            }
            e => e,
        })
    }
}

impl OfpCodec for Instruction {
    fn size_of(&self) -> usize {
        match *self {
            Instruction::GotoTable(_) |
            Instruction::ClearActions |
            Instruction::Meter(_) => ALIGNMENT,
            Instruction::WriteMetadata { .. } => WRITE_METADATA_LEN,
            Instruction::WriteActions(ref acts) |
            Instruction::ApplyActions(ref acts) => ALIGNMENT + Action::size_of_sequence(acts),
            Instruction::Experimenter { ref data, .. } => align(ALIGNMENT + data.len()),
        }
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Instruction, OfpSerializationError> {
        ensure_remaining(bytes, INSTRUCTION_HEADER_LEN, "instruction header")?;
        let code = bytes.read_u16::<BigEndian>()?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < ALIGNMENT || len % ALIGNMENT != 0 {
            return Err(OfpSerializationError::MalformedInstruction(format!(
                "instruction {:#x} has length {}, not a non-zero multiple of 8", code, len)));
        }
        let typ = InstructionType::of_int(code)?;
        let body = read_slice(bytes, len - INSTRUCTION_HEADER_LEN, "instruction")?;
        let mut fields = Cursor::new(body);
        let inst = match typ {
            InstructionType::GotoTable => {
                if len != ALIGNMENT {
                    return Err(Instruction::malformed(typ, len));
                }
                Instruction::GotoTable(fields.read_u8()?)
            }
            InstructionType::WriteMetadata => {
                if len != WRITE_METADATA_LEN {
                    return Err(Instruction::malformed(typ, len));
                }
                fields.set_position(4);
                let metadata = fields.read_u64::<BigEndian>()?;
                let mask = fields.read_u64::<BigEndian>()?;
                Instruction::WriteMetadata {
                    metadata: metadata,
                    mask: mask,
                }
            }
            InstructionType::WriteActions => {
                Instruction::WriteActions(Instruction::parse_actions(typ, body)?)
            }
            InstructionType::ApplyActions => {
                Instruction::ApplyActions(Instruction::parse_actions(typ, body)?)
            }
            InstructionType::ClearActions => {
                if len != ALIGNMENT {
                    return Err(Instruction::malformed(typ, len));
                }
                Instruction::ClearActions
            }
            InstructionType::Meter => {
                if len != ALIGNMENT {
                    return Err(Instruction::malformed(typ, len));
                }
                Instruction::Meter(fields.read_u32::<BigEndian>()?)
            }
            InstructionType::Experimenter => {
                Instruction::Experimenter {
                    experimenter: fields.read_u32::<BigEndian>()?,
                    data: body[4..].to_vec(),
                }
            }
        };
        Ok(inst)
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let size = self.size_of();
        let len = length_field(size, "instruction")?;
        let mut body = vec![];
        match *self {
            Instruction::GotoTable(table_id) => body.write_u8(table_id)?,
            Instruction::WriteMetadata { metadata, mask } => {
                write_padding_bytes(&mut body, 4);
                body.write_u64::<BigEndian>(metadata)?;
                body.write_u64::<BigEndian>(mask)?;
            }
            Instruction::WriteActions(ref acts) |
            Instruction::ApplyActions(ref acts) => {
                write_padding_bytes(&mut body, 4);
                Action::marshal_sequence(acts, &mut body)?;
            }
            Instruction::ClearActions => (),
            Instruction::Meter(meter_id) => body.write_u32::<BigEndian>(meter_id)?,
            Instruction::Experimenter { experimenter, ref data } => {
                if data.len() % ALIGNMENT != 0 {
                    return Err(OfpSerializationError::MalformedInstruction(format!(
                        "experimenter instruction data of {} bytes is not a multiple of 8",
                        data.len())));
                }
                body.write_u32::<BigEndian>(experimenter)?;
                body.extend_from_slice(data);
            }
        }
        bytes.write_u16::<BigEndian>(Instruction::type_code(self) as u16)?;
        bytes.write_u16::<BigEndian>(len)?;
        bytes.extend_from_slice(&body);
        write_padding_bytes(bytes, size - INSTRUCTION_HEADER_LEN - body.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow0x04::PseudoPort;

    #[test]
    fn goto_table_layout() {
        assert_eq!(Instruction::GotoTable(3).encode().unwrap(),
                   vec![0x00, 0x01, 0x00, 0x08, 0x03, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn write_metadata_layout() {
        let inst = Instruction::WriteMetadata {
            metadata: 0x0102_0304_0506_0708,
            mask: 0xffff_ffff_0000_0000,
        };
        assert_eq!(inst.encode().unwrap(),
                   vec![0x00, 0x02, 0x00, 0x18, 0x00, 0x00, 0x00, 0x00, 0x01, 0x02, 0x03, 0x04,
                        0x05, 0x06, 0x07, 0x08, 0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn meter_and_clear_layout() {
        assert_eq!(Instruction::Meter(0x0a0b0c0d).encode().unwrap(),
                   vec![0x00, 0x06, 0x00, 0x08, 0x0a, 0x0b, 0x0c, 0x0d]);
        assert_eq!(Instruction::ClearActions.encode().unwrap(),
                   vec![0x00, 0x05, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn apply_actions_layout() {
        let inst = Instruction::ApplyActions(vec![Action::CopyTtlIn,
                                                  Action::Output {
                                                      port: PseudoPort::PhysicalPort(1),
                                                      max_len: 0,
                                                  }]);
        let bytes = inst.encode().unwrap();
        assert_eq!(&bytes[..8], &[0x00, 0x04, 0x00, 0x20, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(&bytes[8..16], &[0x00, 0x0c, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(bytes.len(), 32);
        assert_eq!(inst.size_of(), 32);
    }

    #[test]
    fn sequence_round_trip() {
        let insts = vec![Instruction::Meter(4),
                         Instruction::ApplyActions(vec![Action::PopVlan]),
                         Instruction::ClearActions,
                         Instruction::WriteActions(vec![Action::Group(2)]),
                         Instruction::WriteMetadata {
                             metadata: 1,
                             mask: 1,
                         },
                         Instruction::Experimenter {
                             experimenter: 0x00d0_f0f0,
                             data: vec![9; 8],
                         },
                         Instruction::GotoTable(1)];
        let mut bytes = vec![];
        Instruction::marshal_sequence(&insts, &mut bytes).unwrap();
        assert_eq!(bytes.len(), Instruction::size_of_sequence(&insts));
        assert_eq!(bytes.len() % 8, 0);
        assert_eq!(Instruction::parse_sequence(&bytes).unwrap(), insts);
    }

    #[test]
    fn empty_stream() {
        assert!(Instruction::parse_sequence(&[]).unwrap().is_empty());
    }

    #[test]
    fn misaligned_length() {
        let buf = [0x00, 0x01, 0x00, 0x0c, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(Instruction::parse_sequence(&buf),
                         Err(OfpSerializationError::MalformedInstruction(_))));
    }

    #[test]
    fn wrong_fixed_length() {
        let buf = [0x00, 0x02, 0x00, 0x10, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        assert!(matches!(Instruction::parse_sequence(&buf),
                         Err(OfpSerializationError::MalformedInstruction(_))));
    }

    #[test]
    fn unknown_type() {
        let buf = [0x00, 0x07, 0x00, 0x08, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(Instruction::parse_sequence(&buf),
                         Err(OfpSerializationError::UnknownVariant { value: 7, .. })));
    }

    #[test]
    fn action_overrunning_instruction() {
        // Apply-actions of length 16 holding an output action that claims 16 bytes.
        let buf = [0x00, 0x04, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10,
                   0x00, 0x00, 0x00, 0x01];
        assert!(matches!(Instruction::parse_sequence(&buf),
                         Err(OfpSerializationError::MalformedInstruction(_))));
    }

    #[test]
    fn experimenter_data_alignment() {
        let inst = Instruction::Experimenter {
            experimenter: 0x2320,
            data: vec![1, 2, 3],
        };
        let mut bytes = vec![];
        assert!(matches!(inst.marshal(&mut bytes),
                         Err(OfpSerializationError::MalformedInstruction(_))));
        assert!(bytes.is_empty());

        let inst = Instruction::Experimenter {
            experimenter: 0x2320,
            data: vec![1, 2, 3, 0, 0, 0, 0, 0],
        };
        let bytes = inst.encode().unwrap();
        assert_eq!(bytes,
                   vec![0xff, 0xff, 0x00, 0x10, 0x00, 0x00, 0x23, 0x20, 0x01, 0x02, 0x03, 0x00,
                        0x00, 0x00, 0x00, 0x00]);
        assert_eq!(Instruction::decode(&bytes).unwrap(), (inst, 16));
    }

    #[test]
    fn failed_action_list_writes_nothing() {
        let inst = Instruction::WriteActions(vec![Action::Experimenter {
                                                      experimenter: 1,
                                                      data: vec![0; 5],
                                                  }]);
        let mut bytes = vec![];
        assert!(inst.marshal(&mut bytes).is_err());
        assert!(bytes.is_empty());
    }

    #[test]
    fn truncated_instruction() {
        let buf = [0x00, 0x06, 0x00, 0x08, 0x00, 0x00];
        assert!(matches!(Instruction::parse_sequence(&buf),
                         Err(OfpSerializationError::TruncatedInput { .. })));
    }
}

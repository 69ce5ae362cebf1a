//! Flow table programming, flow removal notices and flow statistics.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::bits::{set_bit, test_bit};
use crate::ofp_message::{OfpCodec, OfpSerializationError};
use crate::ofp_utils::{ensure_remaining, length_field, read_slice, remaining, skip_padding,
                       write_padding_bytes};
use crate::openflow0x04::instruction::{Instruction, Instructions};
use crate::openflow0x04::ofp_match::Match;
use crate::openflow0x04::{buffer_id_of_int, buffer_id_to_int, GroupId, PseudoPort, Timeout,
                          OFPG_ANY};

const FLOW_MOD_HEADER_LEN: usize = 40;
const FLOW_REMOVED_HEADER_LEN: usize = 40;
const FLOW_STATS_REQUEST_HEADER_LEN: usize = 32;
const FLOW_STATS_HEADER_LEN: usize = 48;

/// Type of modification to perform on a flow table.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowModCommand {
    AddFlow,
    ModFlow,
    ModStrictFlow,
    DeleteFlow,
    DeleteStrictFlow,
}

impl FlowModCommand {
    pub fn of_int(c: u8) -> Result<FlowModCommand, OfpSerializationError> {
        match c {
            0 => Ok(FlowModCommand::AddFlow),
            1 => Ok(FlowModCommand::ModFlow),
            2 => Ok(FlowModCommand::ModStrictFlow),
            3 => Ok(FlowModCommand::DeleteFlow),
            4 => Ok(FlowModCommand::DeleteStrictFlow),
            c => {
                Err(OfpSerializationError::UnknownVariant {
                    kind: "flow mod command",
                    value: c as u32,
                })
            }
        }
    }
}

/// Flags of a flow entry.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FlowModFlags {
    /// Send a flow removed message when the entry expires or is deleted.
    pub send_flow_rem: bool,
    /// Refuse to add an entry overlapping one of the same priority.
    pub check_overlap: bool,
    pub reset_counts: bool,
    pub no_pkt_counts: bool,
    pub no_byt_counts: bool,
}

impl FlowModFlags {
    pub fn of_int(d: u16) -> FlowModFlags {
        FlowModFlags {
            send_flow_rem: test_bit(0, d),
            check_overlap: test_bit(1, d),
            reset_counts: test_bit(2, d),
            no_pkt_counts: test_bit(3, d),
            no_byt_counts: test_bit(4, d),
        }
    }

    pub fn to_int(flags: FlowModFlags) -> u16 {
        let d = set_bit(0, 0, flags.send_flow_rem);
        let d = set_bit(1, d, flags.check_overlap);
        let d = set_bit(2, d, flags.reset_counts);
        let d = set_bit(3, d, flags.no_pkt_counts);
        set_bit(4, d, flags.no_byt_counts)
    }
}

/// Represents modifications to a flow table from the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowMod {
    pub cookie: u64,
    /// Restricts modify and delete commands to entries whose cookie matches
    /// under this mask. Zero means no restriction.
    pub cookie_mask: u64,
    pub table_id: u8,
    pub command: FlowModCommand,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub priority: u16,
    /// Buffered packet to run through the flow once it is installed.
    pub buffer_id: Option<u32>,
    /// Delete commands only: restrict to entries outputting to this port.
    pub out_port: Option<PseudoPort>,
    /// Delete commands only: restrict to entries outputting to this group.
    pub out_group: GroupId,
    pub flags: FlowModFlags,
    pub pattern: Match,
    pub instructions: Instructions,
}

impl FlowMod {
    /// Return a `FlowMod` adding a permanent flow to table 0 with the given
    /// `priority`, `pattern` and `instructions`.
    pub fn add_flow(priority: u16, pattern: Match, instructions: Instructions) -> FlowMod {
        FlowMod {
            cookie: 0,
            cookie_mask: 0,
            table_id: 0,
            command: FlowModCommand::AddFlow,
            idle_timeout: Timeout::Permanent,
            hard_timeout: Timeout::Permanent,
            priority: priority,
            buffer_id: None,
            out_port: None,
            out_group: OFPG_ANY,
            flags: FlowModFlags::default(),
            pattern: pattern,
            instructions: instructions,
        }
    }
}

impl OfpCodec for FlowMod {
    fn size_of(&self) -> usize {
        FLOW_MOD_HEADER_LEN + self.pattern.size_of() +
        Instruction::size_of_sequence(&self.instructions)
    }

    /// Instructions are read until the end of `bytes`, which must hold exactly
    /// this message body.
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<FlowMod, OfpSerializationError> {
        ensure_remaining(bytes, FLOW_MOD_HEADER_LEN, "flow mod header")?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let cookie_mask = bytes.read_u64::<BigEndian>()?;
        let table_id = bytes.read_u8()?;
        let command = FlowModCommand::of_int(bytes.read_u8()?)?;
        let idle = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let hard = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let priority = bytes.read_u16::<BigEndian>()?;
        let buffer_id = buffer_id_of_int(bytes.read_u32::<BigEndian>()?);
        let out_port = PseudoPort::of_int(bytes.read_u32::<BigEndian>()?)?;
        let out_group = bytes.read_u32::<BigEndian>()?;
        let flags = FlowModFlags::of_int(bytes.read_u16::<BigEndian>()?);
        skip_padding(bytes, 2, "flow mod header")?;
        let pattern = Match::parse(bytes).map_err(|e| e.nested_in("flow mod"))?;
        let rest = remaining(bytes);
        let instructions = Instruction::parse_sequence(read_slice(bytes, rest, "instructions")?)
            .map_err(|e| e.nested_in("flow mod"))?;
        debug!("flow mod {:?} table {} priority {}: {} match fields, {} instructions",
               command,
               table_id,
               priority,
               pattern.fields.len(),
               instructions.len());
        Ok(FlowMod {
            cookie: cookie,
            cookie_mask: cookie_mask,
            table_id: table_id,
            command: command,
            idle_timeout: idle,
            hard_timeout: hard,
            priority: priority,
            buffer_id: buffer_id,
            out_port: out_port,
            out_group: out_group,
            flags: flags,
            pattern: pattern,
            instructions: instructions,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let mut body = vec![];
        self.pattern.marshal(&mut body)?;
        Instruction::marshal_sequence(&self.instructions, &mut body)?;
        bytes.write_u64::<BigEndian>(self.cookie)?;
        bytes.write_u64::<BigEndian>(self.cookie_mask)?;
        bytes.write_u8(self.table_id)?;
        bytes.write_u8(self.command as u8)?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(self.idle_timeout))?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(self.hard_timeout))?;
        bytes.write_u16::<BigEndian>(self.priority)?;
        bytes.write_u32::<BigEndian>(buffer_id_to_int(self.buffer_id))?;
        PseudoPort::marshal(self.out_port, bytes)?;
        bytes.write_u32::<BigEndian>(self.out_group)?;
        bytes.write_u16::<BigEndian>(FlowModFlags::to_int(self.flags))?;
        write_padding_bytes(bytes, 2);
        bytes.extend_from_slice(&body);
        Ok(())
    }
}

/// Why a flow entry was removed.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FlowRemovedReason {
    IdleTimeout,
    HardTimeout,
    Delete,
    GroupDelete,
}

impl FlowRemovedReason {
    pub fn of_int(r: u8) -> Result<FlowRemovedReason, OfpSerializationError> {
        match r {
            0 => Ok(FlowRemovedReason::IdleTimeout),
            1 => Ok(FlowRemovedReason::HardTimeout),
            2 => Ok(FlowRemovedReason::Delete),
            3 => Ok(FlowRemovedReason::GroupDelete),
            r => {
                Err(OfpSerializationError::UnknownVariant {
                    kind: "flow removed reason",
                    value: r as u32,
                })
            }
        }
    }
}

/// Flow removed notice (datapath -> controller).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowRemoved {
    pub cookie: u64,
    pub priority: u16,
    pub reason: FlowRemovedReason,
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub packet_count: u64,
    pub byte_count: u64,
    pub pattern: Match,
}

impl OfpCodec for FlowRemoved {
    fn size_of(&self) -> usize {
        FLOW_REMOVED_HEADER_LEN + self.pattern.size_of()
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<FlowRemoved, OfpSerializationError> {
        ensure_remaining(bytes, FLOW_REMOVED_HEADER_LEN, "flow removed header")?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let priority = bytes.read_u16::<BigEndian>()?;
        let reason = FlowRemovedReason::of_int(bytes.read_u8()?)?;
        let table_id = bytes.read_u8()?;
        let duration_sec = bytes.read_u32::<BigEndian>()?;
        let duration_nsec = bytes.read_u32::<BigEndian>()?;
        let idle = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let hard = Timeout::of_int(bytes.read_u16::<BigEndian>()?);
        let packet_count = bytes.read_u64::<BigEndian>()?;
        let byte_count = bytes.read_u64::<BigEndian>()?;
        let pattern = Match::parse(bytes).map_err(|e| e.nested_in("flow removed"))?;
        Ok(FlowRemoved {
            cookie: cookie,
            priority: priority,
            reason: reason,
            table_id: table_id,
            duration_sec: duration_sec,
            duration_nsec: duration_nsec,
            idle_timeout: idle,
            hard_timeout: hard,
            packet_count: packet_count,
            byte_count: byte_count,
            pattern: pattern,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let mut pattern = vec![];
        self.pattern.marshal(&mut pattern)?;
        bytes.write_u64::<BigEndian>(self.cookie)?;
        bytes.write_u16::<BigEndian>(self.priority)?;
        bytes.write_u8(self.reason as u8)?;
        bytes.write_u8(self.table_id)?;
        bytes.write_u32::<BigEndian>(self.duration_sec)?;
        bytes.write_u32::<BigEndian>(self.duration_nsec)?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(self.idle_timeout))?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(self.hard_timeout))?;
        bytes.write_u64::<BigEndian>(self.packet_count)?;
        bytes.write_u64::<BigEndian>(self.byte_count)?;
        bytes.extend_from_slice(&pattern);
        Ok(())
    }
}

/// Body of an individual flow statistics request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowStatsRequest {
    /// Table to read, or `OFPTT_ALL`.
    pub table_id: u8,
    pub out_port: Option<PseudoPort>,
    pub out_group: GroupId,
    pub cookie: u64,
    pub cookie_mask: u64,
    pub pattern: Match,
}

impl OfpCodec for FlowStatsRequest {
    fn size_of(&self) -> usize {
        FLOW_STATS_REQUEST_HEADER_LEN + self.pattern.size_of()
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<FlowStatsRequest, OfpSerializationError> {
        ensure_remaining(bytes, FLOW_STATS_REQUEST_HEADER_LEN, "flow stats request header")?;
        let table_id = bytes.read_u8()?;
        skip_padding(bytes, 3, "flow stats request header")?;
        let out_port = PseudoPort::of_int(bytes.read_u32::<BigEndian>()?)?;
        let out_group = bytes.read_u32::<BigEndian>()?;
        skip_padding(bytes, 4, "flow stats request header")?;
        let cookie = bytes.read_u64::<BigEndian>()?;
        let cookie_mask = bytes.read_u64::<BigEndian>()?;
        let pattern = Match::parse(bytes).map_err(|e| e.nested_in("flow stats request"))?;
        Ok(FlowStatsRequest {
            table_id: table_id,
            out_port: out_port,
            out_group: out_group,
            cookie: cookie,
            cookie_mask: cookie_mask,
            pattern: pattern,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let mut pattern = vec![];
        self.pattern.marshal(&mut pattern)?;
        bytes.write_u8(self.table_id)?;
        write_padding_bytes(bytes, 3);
        PseudoPort::marshal(self.out_port, bytes)?;
        bytes.write_u32::<BigEndian>(self.out_group)?;
        write_padding_bytes(bytes, 4);
        bytes.write_u64::<BigEndian>(self.cookie)?;
        bytes.write_u64::<BigEndian>(self.cookie_mask)?;
        bytes.extend_from_slice(&pattern);
        Ok(())
    }
}

/// One entry of an individual flow statistics reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowStats {
    pub table_id: u8,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub priority: u16,
    pub idle_timeout: Timeout,
    pub hard_timeout: Timeout,
    pub flags: FlowModFlags,
    pub cookie: u64,
    pub packet_count: u64,
    pub byte_count: u64,
    pub pattern: Match,
    pub instructions: Instructions,
}

impl FlowStats {
    /// Parse the entries of a flow statistics reply body.
    pub fn parse_sequence(buf: &[u8]) -> Result<Vec<FlowStats>, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let mut stats = vec![];
        while remaining(&bytes) > 0 {
            stats.push(FlowStats::parse(&mut bytes)?);
        }
        Ok(stats)
    }
}

impl OfpCodec for FlowStats {
    fn size_of(&self) -> usize {
        FLOW_STATS_HEADER_LEN + self.pattern.size_of() +
        Instruction::size_of_sequence(&self.instructions)
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<FlowStats, OfpSerializationError> {
        ensure_remaining(bytes, FLOW_STATS_HEADER_LEN, "flow stats header")?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        if len < FLOW_STATS_HEADER_LEN {
            return Err(OfpSerializationError::MalformedMessage(format!(
                "flow stats length {} is shorter than its header", len)));
        }
        let mut entry = Cursor::new(read_slice(bytes, len - 2, "flow stats")?);
        let table_id = entry.read_u8()?;
        skip_padding(&mut entry, 1, "flow stats header")?;
        let duration_sec = entry.read_u32::<BigEndian>()?;
        let duration_nsec = entry.read_u32::<BigEndian>()?;
        let priority = entry.read_u16::<BigEndian>()?;
        let idle = Timeout::of_int(entry.read_u16::<BigEndian>()?);
        let hard = Timeout::of_int(entry.read_u16::<BigEndian>()?);
        let flags = FlowModFlags::of_int(entry.read_u16::<BigEndian>()?);
        skip_padding(&mut entry, 4, "flow stats header")?;
        let cookie = entry.read_u64::<BigEndian>()?;
        let packet_count = entry.read_u64::<BigEndian>()?;
        let byte_count = entry.read_u64::<BigEndian>()?;
        let pattern = Match::parse(&mut entry).map_err(|e| e.nested_in("flow stats"))?;
        let rest = remaining(&entry);
        let instructions = read_slice(&mut entry, rest, "instructions")?;
        let instructions = Instruction::parse_sequence(instructions)
            .map_err(|e| e.nested_in("flow stats"))?;
        Ok(FlowStats {
            table_id: table_id,
            duration_sec: duration_sec,
            duration_nsec: duration_nsec,
            priority: priority,
            idle_timeout: idle,
            hard_timeout: hard,
            flags: flags,
            cookie: cookie,
            packet_count: packet_count,
            byte_count: byte_count,
            pattern: pattern,
            instructions: instructions,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let mut body = vec![];
        self.pattern.marshal(&mut body)?;
        Instruction::marshal_sequence(&self.instructions, &mut body)?;
        let len = length_field(FLOW_STATS_HEADER_LEN + body.len(), "flow stats")?;
        bytes.write_u16::<BigEndian>(len)?;
        bytes.write_u8(self.table_id)?;
        write_padding_bytes(bytes, 1);
        bytes.write_u32::<BigEndian>(self.duration_sec)?;
        bytes.write_u32::<BigEndian>(self.duration_nsec)?;
        bytes.write_u16::<BigEndian>(self.priority)?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(self.idle_timeout))?;
        bytes.write_u16::<BigEndian>(Timeout::to_int(self.hard_timeout))?;
        bytes.write_u16::<BigEndian>(FlowModFlags::to_int(self.flags))?;
        write_padding_bytes(bytes, 4);
        bytes.write_u64::<BigEndian>(self.cookie)?;
        bytes.write_u64::<BigEndian>(self.packet_count)?;
        bytes.write_u64::<BigEndian>(self.byte_count)?;
        bytes.extend_from_slice(&body);
        Ok(())
    }
}

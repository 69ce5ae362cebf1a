//! Group table programming and statistics.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::ofp_message::{OfpCodec, OfpSerializationError};
use crate::ofp_utils::{ensure_remaining, length_field, read_slice, remaining, skip_padding,
                       write_padding_bytes, ALIGNMENT};
use crate::openflow0x04::action::Action;
use crate::openflow0x04::{GroupId, PseudoPort};

const BUCKET_HEADER_LEN: usize = 16;
const GROUP_MOD_HEADER_LEN: usize = 8;
const GROUP_STATS_HEADER_LEN: usize = 40;
const BUCKET_COUNTER_LEN: usize = 16;

/// Type of modification to perform on the group table.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GroupModCommand {
    Add,
    Modify,
    Delete,
}

impl GroupModCommand {
    pub fn of_int(c: u16) -> Result<GroupModCommand, OfpSerializationError> {
        match c {
            0 => Ok(GroupModCommand::Add),
            1 => Ok(GroupModCommand::Modify),
            2 => Ok(GroupModCommand::Delete),
            c => {
                Err(OfpSerializationError::UnknownVariant {
                    kind: "group command",
                    value: c as u32,
                })
            }
        }
    }
}

/// How the buckets of a group are used.
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum GroupType {
    /// Every bucket is executed.
    All,
    /// One bucket, chosen by the switch.
    Select,
    /// The single bucket is executed.
    Indirect,
    /// The first live bucket is executed.
    FastFailover,
}

impl GroupType {
    pub fn of_int(t: u8) -> Result<GroupType, OfpSerializationError> {
        match t {
            0 => Ok(GroupType::All),
            1 => Ok(GroupType::Select),
            2 => Ok(GroupType::Indirect),
            3 => Ok(GroupType::FastFailover),
            t => {
                Err(OfpSerializationError::UnknownVariant {
                    kind: "group type",
                    value: t as u32,
                })
            }
        }
    }
}

/// One action list of a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Bucket {
    /// Relative weight, only meaningful for select groups.
    pub weight: u16,
    /// Port whose liveness gates this bucket, fast failover only.
    pub watch_port: Option<PseudoPort>,
    /// Group whose liveness gates this bucket, fast failover only.
    pub watch_group: GroupId,
    pub actions: Vec<Action>,
}

impl Bucket {
    /// Parse buckets back to back until `buf` is exhausted.
    pub fn parse_sequence(buf: &[u8]) -> Result<Vec<Bucket>, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let mut buckets = vec![];
        while remaining(&bytes) > 0 {
            buckets.push(Bucket::parse(&mut bytes)?);
        }
        Ok(buckets)
    }
}

impl OfpCodec for Bucket {
    fn size_of(&self) -> usize {
        BUCKET_HEADER_LEN + Action::size_of_sequence(&self.actions)
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Bucket, OfpSerializationError> {
        ensure_remaining(bytes, BUCKET_HEADER_LEN, "bucket header")?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        let weight = bytes.read_u16::<BigEndian>()?;
        let watch_port = PseudoPort::of_int(bytes.read_u32::<BigEndian>()?)?;
        let watch_group = bytes.read_u32::<BigEndian>()?;
        skip_padding(bytes, 4, "bucket header")?;
        if len < BUCKET_HEADER_LEN || len % ALIGNMENT != 0 {
            return Err(OfpSerializationError::MalformedMessage(format!(
                "bucket length {} is not a multiple of 8 covering its header", len)));
        }
        let body = read_slice(bytes, len - BUCKET_HEADER_LEN, "bucket")?;
        let actions = Action::parse_sequence(body).map_err(|e| e.nested_in("bucket"))?;
        Ok(Bucket {
            weight: weight,
            watch_port: watch_port,
            watch_group: watch_group,
            actions: actions,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let mut body = vec![];
        Action::marshal_sequence(&self.actions, &mut body)?;
        bytes.write_u16::<BigEndian>(length_field(BUCKET_HEADER_LEN + body.len(), "bucket")?)?;
        bytes.write_u16::<BigEndian>(self.weight)?;
        PseudoPort::marshal(self.watch_port, bytes)?;
        bytes.write_u32::<BigEndian>(self.watch_group)?;
        write_padding_bytes(bytes, 4);
        bytes.extend_from_slice(&body);
        Ok(())
    }
}

/// Represents modifications to the group table from the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupMod {
    pub command: GroupModCommand,
    pub typ: GroupType,
    pub group_id: GroupId,
    pub buckets: Vec<Bucket>,
}

impl OfpCodec for GroupMod {
    fn size_of(&self) -> usize {
        GROUP_MOD_HEADER_LEN + self.buckets.iter().map(|b| b.size_of()).sum::<usize>()
    }

    /// Buckets are read until the end of `bytes`, which must hold exactly this
    /// message body.
    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<GroupMod, OfpSerializationError> {
        ensure_remaining(bytes, GROUP_MOD_HEADER_LEN, "group mod header")?;
        let command = GroupModCommand::of_int(bytes.read_u16::<BigEndian>()?)?;
        let typ = GroupType::of_int(bytes.read_u8()?)?;
        skip_padding(bytes, 1, "group mod header")?;
        let group_id = bytes.read_u32::<BigEndian>()?;
        let rest = remaining(bytes);
        let body = read_slice(bytes, rest, "group mod buckets")?;
        let buckets = Bucket::parse_sequence(body).map_err(|e| e.nested_in("group mod"))?;
        debug!("group mod {:?} group {}: {} buckets", command, group_id, buckets.len());
        Ok(GroupMod {
            command: command,
            typ: typ,
            group_id: group_id,
            buckets: buckets,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let mut body = vec![];
        for bucket in &self.buckets {
            bucket.marshal(&mut body)?;
        }
        bytes.write_u16::<BigEndian>(self.command as u16)?;
        bytes.write_u8(self.typ as u8)?;
        write_padding_bytes(bytes, 1);
        bytes.write_u32::<BigEndian>(self.group_id)?;
        bytes.extend_from_slice(&body);
        Ok(())
    }
}

/// Body of a group statistics request.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GroupStatsRequest {
    /// Group to read, or `OFPG_ALL`.
    pub group_id: GroupId,
}

impl OfpCodec for GroupStatsRequest {
    fn size_of(&self) -> usize {
        8
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<GroupStatsRequest, OfpSerializationError> {
        ensure_remaining(bytes, 8, "group stats request")?;
        let group_id = bytes.read_u32::<BigEndian>()?;
        skip_padding(bytes, 4, "group stats request")?;
        Ok(GroupStatsRequest { group_id: group_id })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u32::<BigEndian>(self.group_id)?;
        write_padding_bytes(bytes, 4);
        Ok(())
    }
}

/// Per-bucket counters of a group statistics reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BucketCounter {
    pub packet_count: u64,
    pub byte_count: u64,
}

impl OfpCodec for BucketCounter {
    fn size_of(&self) -> usize {
        BUCKET_COUNTER_LEN
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<BucketCounter, OfpSerializationError> {
        ensure_remaining(bytes, BUCKET_COUNTER_LEN, "bucket counter")?;
        Ok(BucketCounter {
            packet_count: bytes.read_u64::<BigEndian>()?,
            byte_count: bytes.read_u64::<BigEndian>()?,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u64::<BigEndian>(self.packet_count)?;
        bytes.write_u64::<BigEndian>(self.byte_count)?;
        Ok(())
    }
}

/// One entry of a group statistics reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupStats {
    pub group_id: GroupId,
    /// Number of flows or groups forwarding to this group.
    pub ref_count: u32,
    pub packet_count: u64,
    pub byte_count: u64,
    pub duration_sec: u32,
    pub duration_nsec: u32,
    pub bucket_stats: Vec<BucketCounter>,
}

impl GroupStats {
    /// Parse the entries of a group statistics reply body.
    pub fn parse_sequence(buf: &[u8]) -> Result<Vec<GroupStats>, OfpSerializationError> {
        let mut bytes = Cursor::new(buf);
        let mut stats = vec![];
        while remaining(&bytes) > 0 {
            stats.push(GroupStats::parse(&mut bytes)?);
        }
        Ok(stats)
    }
}

impl OfpCodec for GroupStats {
    fn size_of(&self) -> usize {
        GROUP_STATS_HEADER_LEN + BUCKET_COUNTER_LEN * self.bucket_stats.len()
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<GroupStats, OfpSerializationError> {
        ensure_remaining(bytes, GROUP_STATS_HEADER_LEN, "group stats header")?;
        let len = bytes.read_u16::<BigEndian>()? as usize;
        skip_padding(bytes, 2, "group stats header")?;
        let group_id = bytes.read_u32::<BigEndian>()?;
        let ref_count = bytes.read_u32::<BigEndian>()?;
        skip_padding(bytes, 4, "group stats header")?;
        let packet_count = bytes.read_u64::<BigEndian>()?;
        let byte_count = bytes.read_u64::<BigEndian>()?;
        let duration_sec = bytes.read_u32::<BigEndian>()?;
        let duration_nsec = bytes.read_u32::<BigEndian>()?;
        if len < GROUP_STATS_HEADER_LEN ||
           (len - GROUP_STATS_HEADER_LEN) % BUCKET_COUNTER_LEN != 0 {
            return Err(OfpSerializationError::MalformedMessage(format!(
                "group stats length {} does not hold whole bucket counters", len)));
        }
        let body = read_slice(bytes, len - GROUP_STATS_HEADER_LEN, "group stats")
            .map_err(|e| e.nested_in("group stats"))?;
        let mut counters = Cursor::new(body);
        let mut bucket_stats = vec![];
        while remaining(&counters) > 0 {
            bucket_stats.push(BucketCounter::parse(&mut counters)?);
        }
        Ok(GroupStats {
            group_id: group_id,
            ref_count: ref_count,
            packet_count: packet_count,
            byte_count: byte_count,
            duration_sec: duration_sec,
            duration_nsec: duration_nsec,
            bucket_stats: bucket_stats,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        bytes.write_u16::<BigEndian>(length_field(self.size_of(), "group stats")?)?;
        write_padding_bytes(bytes, 2);
        bytes.write_u32::<BigEndian>(self.group_id)?;
        bytes.write_u32::<BigEndian>(self.ref_count)?;
        write_padding_bytes(bytes, 4);
        bytes.write_u64::<BigEndian>(self.packet_count)?;
        bytes.write_u64::<BigEndian>(self.byte_count)?;
        bytes.write_u32::<BigEndian>(self.duration_sec)?;
        bytes.write_u32::<BigEndian>(self.duration_nsec)?;
        for counter in &self.bucket_stats {
            counter.marshal(bytes)?;
        }
        Ok(())
    }
}

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::ofp_message::{OfpCodec, OfpSerializationError};
use crate::ofp_utils::{align, ensure_remaining, length_field, read_slice, remaining,
                       write_padding_bytes, ALIGNMENT};
use crate::openflow0x04::oxm::Oxm;

const MATCH_HEADER_LEN: usize = 4;

/// Entries are only looked for while at least this many body bytes remain.
const MIN_SCANNED_ENTRY: usize = 8;

/// Match structure in use, carried in the first field of every match.
#[repr(u16)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatchType {
    Standard,
    Oxm,
}

impl MatchType {
    pub fn of_int(t: u16) -> Result<MatchType, OfpSerializationError> {
        match t {
            0 => Ok(MatchType::Standard),
            1 => Ok(MatchType::Oxm),
            t => {
                Err(OfpSerializationError::UnknownVariant {
                    kind: "match type",
                    value: t as u32,
                })
            }
        }
    }
}

/// Fields to match against flows.
///
/// On the wire: `type:2, length:2, oxm*, pad`. The encoder always appends between
/// 1 and 8 zero bytes and records the padded size, header included, in `length`.
///
/// The decoder stops looking for entries once fewer than 8 body bytes remain, so
/// an entry shorter than 8 bytes that ends within the last 8 bytes of the body is
/// read as padding. A final 8 bytes of zeros is also taken as padding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Match {
    pub typ: MatchType,
    pub fields: Vec<Oxm>,
}

impl Match {
    /// An OXM match without fields, matching every packet.
    pub fn match_all() -> Match {
        Match {
            typ: MatchType::Oxm,
            fields: vec![],
        }
    }

    fn content_len(&self) -> usize {
        self.fields.iter().map(|oxm| oxm.size_of()).sum()
    }

    fn trailing_pad(content_len: usize) -> usize {
        ALIGNMENT - (MATCH_HEADER_LEN + content_len) % ALIGNMENT
    }
}

impl Default for Match {
    fn default() -> Match {
        Match::match_all()
    }
}

impl OfpCodec for Match {
    fn size_of(&self) -> usize {
        let content = self.content_len();
        MATCH_HEADER_LEN + content + Match::trailing_pad(content)
    }

    fn parse(bytes: &mut Cursor<&[u8]>) -> Result<Match, OfpSerializationError> {
        ensure_remaining(bytes, MATCH_HEADER_LEN, "match header")?;
        let typ = MatchType::of_int(bytes.read_u16::<BigEndian>()?)?;
        let length = bytes.read_u16::<BigEndian>()? as usize;
        if length < MATCH_HEADER_LEN {
            return Err(OfpSerializationError::MalformedMessage(format!(
                "match length {} is shorter than its header", length)));
        }
        let body = read_slice(bytes, align(length) - MATCH_HEADER_LEN, "match body")?;

        let mut entries = Cursor::new(body);
        let mut fields = vec![];
        while remaining(&entries) >= MIN_SCANNED_ENTRY {
            let rest = &body[entries.position() as usize..];
            if rest.len() == ALIGNMENT && rest.iter().all(|b| *b == 0) {
                break;
            }
            fields.push(Oxm::parse(&mut entries)?);
        }
        if remaining(&entries) > 0 {
            trace!("match: {} trailing bytes taken as padding", remaining(&entries));
        }
        trace!("match: {} oxm fields in {} bytes", fields.len(), length);
        Ok(Match {
            typ: typ,
            fields: fields,
        })
    }

    fn marshal(&self, bytes: &mut Vec<u8>) -> Result<(), OfpSerializationError> {
        let mut body = vec![];
        for oxm in &self.fields {
            oxm.marshal(&mut body)?;
        }
        let pad = Match::trailing_pad(body.len());
        write_padding_bytes(&mut body, pad);
        let length = length_field(MATCH_HEADER_LEN + body.len(), "match")?;
        bytes.write_u16::<BigEndian>(self.typ as u16)?;
        bytes.write_u16::<BigEndian>(length)?;
        bytes.extend_from_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openflow0x04::oxm::{OxmClass, OxmField};

    #[test]
    fn empty_match_pads_to_eight() {
        let bytes = Match::match_all().encode().unwrap();
        assert_eq!(bytes, vec![0x00, 0x01, 0x00, 0x08, 0, 0, 0, 0]);
        let (m, consumed) = Match::decode(&bytes).unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(m, Match::match_all());
    }

    #[test]
    fn pads_a_full_block_at_exact_boundary() {
        // 4 header + 12 metadata + 8 in_port = 24, already aligned.
        let m = Match {
            typ: MatchType::Oxm,
            fields: vec![Oxm::metadata(0xdead_beef, None), Oxm::in_port(1)],
        };
        let bytes = m.encode().unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(m.size_of(), 32);
        assert_eq!(&bytes[..4], &[0x00, 0x01, 0x00, 0x20]);
        assert_eq!(&bytes[24..], &[0; 8]);
        let (parsed, consumed) = Match::decode(&bytes).unwrap();
        assert_eq!(consumed, 32);
        assert_eq!(parsed, m);
    }

    #[test]
    fn round_trip_mixed_fields() {
        let m = Match {
            typ: MatchType::Oxm,
            fields: vec![Oxm::in_port(3),
                         Oxm::eth_dst([0, 1, 2, 3, 4, 5], Some([0xff, 0xff, 0xff, 0, 0, 0])),
                         Oxm::eth_type(0x0800)],
        };
        let bytes = m.encode().unwrap();
        assert_eq!(bytes.len() % 8, 0);
        let (parsed, consumed) = Match::decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(parsed, m);
        assert_eq!(parsed.encode().unwrap(), bytes);
    }

    #[test]
    fn truncated_body_consumes_nothing_more() {
        let buf = [0x00, 0x01, 0x00, 0x18, 0x80, 0x00, 0x00, 0x04];
        let mut bytes = Cursor::new(&buf[..]);
        assert!(matches!(Match::parse(&mut bytes),
                         Err(OfpSerializationError::TruncatedInput { .. })));
        assert_eq!(bytes.position(), 4);
    }

    #[test]
    fn scan_stops_before_short_tail() {
        // ip_proto entry, then 7 non-zero bytes, then the next structure.
        let buf = [0x00, 0x01, 0x00, 0x10, 0x80, 0x00, 0x14, 0x01, 0x06, 0xaa, 0xbb, 0xcc,
                   0xdd, 0xee, 0xff, 0x11, 0x00, 0x01];
        let (m, consumed) = Match::decode(&buf).unwrap();
        assert_eq!(consumed, 16);
        assert_eq!(m.fields, vec![Oxm::ip_proto(6)]);
    }

    #[test]
    fn short_trailing_entry_is_read_as_padding() {
        let m = Match {
            typ: MatchType::Oxm,
            fields: vec![Oxm::eth_type(0x0800), Oxm::ip_proto(6)],
        };
        let (parsed, _) = Match::decode(&m.encode().unwrap()).unwrap();
        assert_eq!(parsed.fields, vec![Oxm::eth_type(0x0800)]);
    }

    #[test]
    fn accepts_unpadded_length() {
        // Length excludes padding: 4 + 6 byte eth_type entry.
        let buf = [0x00, 0x01, 0x00, 0x0a, 0x80, 0x00, 0x0a, 0x02, 0x86, 0xdd, 0, 0, 0, 0, 0, 0];
        let (m, consumed) = Match::decode(&buf).unwrap();
        assert_eq!(consumed, 16);
        assert_eq!(m.fields, vec![Oxm::eth_type(0x86dd)]);

        let buf = [0x00, 0x01, 0x00, 0x0c, 0x80, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01,
                   0, 0, 0, 0];
        let (m, consumed) = Match::decode(&buf).unwrap();
        assert_eq!(consumed, 16);
        assert_eq!(m.fields[0].class, OxmClass::OpenFlowBasic);
        assert_eq!(m.fields[0].basic_field(), Some(OxmField::InPort));
    }

    #[test]
    fn rejects_length_below_header() {
        let buf = [0x00, 0x01, 0x00, 0x02, 0, 0, 0, 0];
        assert!(matches!(Match::decode(&buf),
                         Err(OfpSerializationError::MalformedMessage(_))));
    }

    #[test]
    fn unknown_match_type() {
        let buf = [0x00, 0x07, 0x00, 0x08, 0, 0, 0, 0];
        assert!(matches!(Match::decode(&buf),
                         Err(OfpSerializationError::UnknownVariant { .. })));
    }
}

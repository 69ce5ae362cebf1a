extern crate hex;
extern crate rust_ofp13;

use rust_ofp13::openflow0x04::{Action, Bucket, BucketCounter, FlowMod, GroupMod,
                               GroupModCommand, GroupStatsRequest, GroupType, Instruction,
                               Match, MatchType, Oxm, OxmField, PseudoPort};
use rust_ofp13::OfpCodec;

fn wire(s: &str) -> Vec<u8> {
    hex::decode(s.replace(' ', "")).unwrap()
}

#[test]
fn bucket_with_two_actions() {
    let bucket = Bucket {
        weight: 42,
        watch_port: Some(PseudoPort::PhysicalPort(5)),
        watch_group: 7,
        actions: vec![Action::CopyTtlIn,
                      Action::Output {
                          port: PseudoPort::PhysicalPort(3),
                          max_len: 0xffff,
                      }],
    };
    let expected = wire("0028 002a 00000005 00000007 00000000 \
                         000c 0008 00000000 \
                         0000 0010 00000003 ffff 000000000000");
    assert_eq!(bucket.encode().unwrap(), expected);
    assert_eq!(Bucket::decode(&expected).unwrap(), (bucket, 40));
}

#[test]
fn group_mod_with_two_buckets() {
    let gm = GroupMod {
        command: GroupModCommand::Modify,
        typ: GroupType::Indirect,
        group_id: 3,
        buckets: vec![Bucket {
                          weight: 10,
                          watch_port: Some(PseudoPort::PhysicalPort(2)),
                          watch_group: 5,
                          actions: vec![Action::CopyTtlIn],
                      },
                      Bucket {
                          weight: 20,
                          watch_port: Some(PseudoPort::PhysicalPort(3)),
                          watch_group: 6,
                          actions: vec![Action::CopyTtlOut],
                      }],
    };
    let expected = wire("0001 02 00 00000003 \
                         0018 000a 00000002 00000005 00000000 000c 0008 00000000 \
                         0018 0014 00000003 00000006 00000000 000b 0008 00000000");
    assert_eq!(gm.encode().unwrap(), expected);
    let (parsed, consumed) = GroupMod::decode(&expected).unwrap();
    assert_eq!(consumed, expected.len());
    assert_eq!(parsed, gm);
}

#[test]
fn bucket_counters() {
    let counters = [(10838451347809794865u64,
                     9634678394999596076u64,
                     "9669ea13858e7b31 85b540f41b14e42c"),
                    (5523660708591555761,
                     14713084686717327527,
                     "4ca7fc261b61d4b1 cc2f6091be0698a7")];
    for &(packet_count, byte_count, bytes) in counters.iter() {
        let counter = BucketCounter {
            packet_count: packet_count,
            byte_count: byte_count,
        };
        let expected = wire(bytes);
        assert_eq!(counter.encode().unwrap(), expected);
        assert_eq!(BucketCounter::decode(&expected).unwrap(), (counter, 16));
    }
}

#[test]
fn group_stats_request() {
    let req = GroupStatsRequest { group_id: 7 };
    assert_eq!(req.encode().unwrap(), wire("00000007 00000000"));
}

#[test]
fn masked_oxm_field_byte() {
    let masked = Oxm::basic(OxmField::EthSrc, vec![1; 6], Some(vec![0xff; 6]));
    let bytes = masked.encode().unwrap();
    assert_eq!(bytes[2], (4 << 1) | 1);
    assert_eq!(bytes[3], 12);

    let exact = Oxm::eth_src([1; 6], None);
    assert_eq!(exact.encode().unwrap()[2], 4 << 1);
}

#[test]
fn flow_mod_reencodes_identically() {
    let pattern = Match {
        typ: MatchType::Oxm,
        fields: vec![Oxm::in_port(1), Oxm::eth_type(0x0800), Oxm::ip_proto(6), Oxm::tcp_dst(80)],
    };
    let output = Action::Output {
        port: PseudoPort::PhysicalPort(2),
        max_len: 0,
    };
    let fm = FlowMod::add_flow(100, pattern, vec![Instruction::ApplyActions(vec![output])]);
    let first = fm.encode().unwrap();
    assert_eq!(first.len() % 8, 0);
    let (decoded, consumed) = FlowMod::decode(&first).unwrap();
    assert_eq!(consumed, first.len());
    assert_eq!(decoded, fm);
    assert_eq!(decoded.encode().unwrap(), first);
}

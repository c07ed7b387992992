//! Property-based tests for the object-graph codec.
//!
//! **Test Organization**:
//! - `roundtrip_properties`: decode(encode(v)) reproduces v, with and without compression
//! - `identity_properties`: shared references and cycles survive a round trip
//! - `corruption_properties`: truncated or corrupted streams fail with the right error class
//! - `scenarios`: concrete graphs with known expected shapes

#![allow(clippy::approx_constant)]

use std::rc::Rc;

use proptest::collection::vec;
use proptest::prelude::*;

use objgraph::limits::HEADER_LEN;
use objgraph::{
    EnumConstant, ErrorKind, RecordRef, RecordType, TypeDesc, Value, decode, decode_all, detach,
    encode, encode_all, encode_compressed,
};

fn entry_type() -> Rc<RecordType> {
    Rc::new(
        RecordType::builder("prop.Entry")
            .field("id", TypeDesc::Int)
            .field("payload", TypeDesc::Any)
            .build(),
    )
}

fn node_type() -> Rc<RecordType> {
    Rc::new(
        RecordType::builder("prop.Node")
            .field("id", TypeDesc::Int)
            .field("next", TypeDesc::record("prop.Node"))
            .build(),
    )
}

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i8>().prop_map(Value::Byte),
        any::<u16>().prop_map(Value::Char),
        any::<i16>().prop_map(Value::Short),
        any::<i32>().prop_map(Value::Int),
        any::<i64>().prop_map(Value::Long),
        any::<f32>().prop_map(Value::Float),
        any::<f64>().prop_map(Value::Double),
        ".{0,16}".prop_map(Value::Text),
        vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
        prop::sample::select(vec!["SNAFU", "TARFU", "FUBAR"])
            .prop_map(|name| Value::Enum(EnumConstant::new("prop.Status", name))),
    ]
}

fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            vec(inner.clone(), 0..8).prop_map(Value::collection),
            (any::<i32>(), inner.clone()).prop_map(|(id, payload)| {
                Value::record(entry_type(), vec![Value::Int(id), payload])
            }),
            vec(any::<i32>(), 0..8).prop_map(|xs| {
                Value::array(TypeDesc::Int, xs.into_iter().map(Value::Int).collect())
            }),
            vec(".{0,8}", 0..4).prop_map(|xs| {
                Value::array(TypeDesc::Text, xs.into_iter().map(Value::Text).collect())
            }),
            vec(inner, 0..4).prop_map(|items| Value::array(TypeDesc::Any, items)),
        ]
    })
}

/// A ring of `len` nodes; node i points at node i+1, the last at the first.
fn ring(len: usize) -> Value {
    let ty = node_type();
    let nodes: Vec<RecordRef> = (0..len)
        .map(|i| RecordRef::new(ty.clone(), vec![Value::Int(i as i32), Value::Null]))
        .collect();
    for (i, node) in nodes.iter().enumerate() {
        node.set_field("next", Value::Record(nodes[(i + 1) % len].clone()));
    }
    Value::Record(nodes[0].clone())
}

mod roundtrip_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: decode(encode(v)) == v for every acyclic value
        #[test]
        fn prop_roundtrip(v in value()) {
            let bytes = encode(&v).expect("encode should succeed");
            let decoded = decode(&bytes).expect("decode should succeed");
            prop_assert_eq!(decoded, v);
        }

        /// Property: several values in one stream come back in order
        #[test]
        fn prop_roundtrip_many(values in vec(value(), 0..5)) {
            let bytes = encode_all(&values).expect("encode should succeed");
            let decoded = decode_all(&bytes).expect("decode should succeed");
            prop_assert_eq!(decoded, values);
        }

        /// Property: encoding is deterministic
        #[test]
        fn prop_deterministic(v in value()) {
            prop_assert_eq!(encode(&v).unwrap(), encode(&v).unwrap());
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Property: the compressed envelope round-trips like a plain stream
        #[test]
        fn prop_compressed_roundtrip(v in value(), level in 1i32..6) {
            let bytes = encode_compressed(&v, level).expect("encode should succeed");
            let decoded = decode(&bytes).expect("decode should succeed");
            prop_assert_eq!(decoded, v);
        }
    }
}

mod identity_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: two references to one object decode to one instance
        #[test]
        fn prop_shared_reference_preserved(v in value(), copies in 2usize..5) {
            let shared = Value::collection(vec![v]);
            let root = Value::collection(vec![shared; copies]);

            let decoded = decode(&encode(&root).unwrap()).unwrap();
            let items = decoded.as_collection().unwrap();
            prop_assert_eq!(items.len(), copies);
            let first = items.get(0).unwrap();
            for i in 1..copies {
                prop_assert!(first.same_object(&items.get(i).unwrap()));
            }
        }

        /// Property: a cycle of any length decodes to a cycle of the same length
        #[test]
        fn prop_cycle_preserved(len in 1usize..16) {
            let root = ring(len);
            let decoded = decode(&encode(&root).unwrap()).unwrap();
            prop_assert_eq!(&decoded, &root);

            let mut current = decoded.clone();
            for i in 0..len {
                let node = current.as_record().unwrap().clone();
                prop_assert_eq!(node.get_as::<i32>("id"), Ok(i as i32));
                current = node.field("next").unwrap();
            }
            prop_assert!(current.same_object(&decoded));

            detach(&root);
            detach(&decoded);
        }
    }
}

mod corruption_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property: every strict prefix of a stream is reported as truncated
        #[test]
        fn prop_truncation_detected(v in value()) {
            let bytes = encode(&v).unwrap();
            for len in 0..bytes.len() {
                let err = decode(&bytes[..len]).expect_err("prefix must not decode");
                prop_assert_eq!(err.kind(), ErrorKind::TruncatedStream, "prefix {} of {}: {}", len, bytes.len(), err);
            }
        }

        /// Property: every strict prefix of a compressed stream is reported as truncated
        #[test]
        fn prop_compressed_truncation_detected(v in value(), level in 1i32..6) {
            let bytes = encode_compressed(&v, level).unwrap();
            for len in 0..bytes.len() {
                let err = decode(&bytes[..len]).expect_err("prefix must not decode");
                prop_assert_eq!(err.kind(), ErrorKind::TruncatedStream, "prefix {} of {}: {}", len, bytes.len(), err);
            }
        }

        /// Property: an unassigned root tag is reported as malformed
        #[test]
        fn prop_root_tag_corruption_detected(
            v in value(),
            tag in prop_oneof![Just(0x00u8), 0x12u8..=0xFF],
        ) {
            let mut bytes = encode(&v).unwrap();
            bytes[HEADER_LEN] = tag;
            let err = decode(&bytes).expect_err("corrupted stream must not decode");
            prop_assert_eq!(err.kind(), ErrorKind::MalformedTag);
            prop_assert_eq!(err.offset(), Some(HEADER_LEN));
        }

        /// Property: an unassigned tag inside a container is reported as malformed
        #[test]
        fn prop_nested_tag_corruption_detected(
            items in vec(value(), 1..4),
            tag in prop_oneof![Just(0x00u8), 0x11u8..=0xFF],
        ) {
            let mut bytes = encode(&Value::collection(items)).unwrap();
            // first element, after the collection tag and its length
            bytes[HEADER_LEN + 5] = tag;
            let err = decode(&bytes).expect_err("corrupted stream must not decode");
            prop_assert_eq!(err.kind(), ErrorKind::MalformedTag);
        }
    }
}

mod scenarios {
    use super::*;

    fn bar_type() -> Rc<RecordType> {
        Rc::new(RecordType::builder("fixtures.Bar").field("value", TypeDesc::Int).build())
    }

    fn foo_type() -> Rc<RecordType> {
        Rc::new(
            RecordType::builder("fixtures.Foo")
                .field("b", TypeDesc::Byte)
                .field("bool", TypeDesc::Bool)
                .field("c", TypeDesc::Char)
                .field("d", TypeDesc::Double)
                .field("f", TypeDesc::Float)
                .field("i", TypeDesc::Int)
                .field("l", TypeDesc::Long)
                .field("s", TypeDesc::Short)
                .field("text", TypeDesc::Text)
                .field("bytes", TypeDesc::Bytes)
                .field("status", TypeDesc::enumeration("fixtures.Status"))
                .field("prefix", TypeDesc::enumeration("fixtures.Prefix"))
                .field("bars", TypeDesc::array_of(TypeDesc::record("fixtures.Bar")))
                .build(),
        )
    }

    fn foo(i: i32, l: i64, text: &str, bars: &[i32]) -> Value {
        let bar_type = bar_type();
        let bars = bars
            .iter()
            .map(|&v| Value::record(bar_type.clone(), vec![Value::Int(v)]))
            .collect();
        Value::record(
            foo_type(),
            vec![
                Value::Byte(0x7f),
                Value::Bool(true),
                Value::char('e').unwrap(),
                Value::Double(3.14),
                Value::Float(2.718),
                Value::Int(i),
                Value::Long(l),
                Value::Short(32767),
                Value::from(text),
                Value::Bytes(vec![0x11, 0x22, 0x33]),
                Value::Enum(EnumConstant::new("fixtures.Status", "SNAFU")),
                Value::Enum(EnumConstant::new("fixtures.Prefix", "KILO")),
                Value::array(TypeDesc::record("fixtures.Bar"), bars),
            ],
        )
    }

    #[test]
    fn test_foo_record_fields() {
        let original = foo(7, 5_000_000_000, "hello", &[0x1111, 0x2222]);
        let decoded = decode(&encode(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);

        let record = decoded.as_record().unwrap();
        assert_eq!(record.type_name(), "fixtures.Foo");
        assert_eq!(record.get_as::<i8>("b"), Ok(0x7f));
        assert_eq!(record.get_as::<bool>("bool"), Ok(true));
        assert_eq!(record.get_as::<char>("c"), Ok('e'));
        assert_eq!(record.get_as::<f64>("d"), Ok(3.14));
        assert_eq!(record.get_as::<f32>("f"), Ok(2.718));
        assert_eq!(record.get_as::<i32>("i"), Ok(7));
        assert_eq!(record.get_as::<i64>("l"), Ok(5_000_000_000));
        assert_eq!(record.get_as::<i16>("s"), Ok(32767));
        assert_eq!(record.get_as::<String>("text"), Ok("hello".to_string()));
        assert_eq!(record.get_as::<Vec<u8>>("bytes"), Ok(vec![0x11, 0x22, 0x33]));
        assert_eq!(
            record.get_as::<EnumConstant>("status"),
            Ok(EnumConstant::new("fixtures.Status", "SNAFU"))
        );
        assert_eq!(
            record.get_as::<EnumConstant>("prefix"),
            Ok(EnumConstant::new("fixtures.Prefix", "KILO"))
        );

        let bars = record.get_as::<Vec<objgraph::RecordRef>>("bars").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].get_as::<i32>("value"), Ok(0x1111));
        assert_eq!(bars[1].get_as::<i32>("value"), Ok(0x2222));
    }

    #[test]
    fn test_three_independent_records() {
        let items = vec![
            foo(7, 5_000_000_000, "hello", &[0x1111, 0x2222]),
            foo(8, 6_000_000_000, "hola", &[0x3333, 0x4444]),
            foo(9, 7_000_000_000, "aloha", &[0x5555]),
        ];
        let root = Value::array(TypeDesc::record("fixtures.Foo"), items);
        let decoded = decode(&encode(&root).unwrap()).unwrap();
        assert_eq!(decoded, root);

        let array = decoded.as_array().unwrap();
        assert_eq!(array.len(), 3);
        let records: Vec<Value> = (0..3).map(|i| array.get(i).unwrap()).collect();
        for (i, a) in records.iter().enumerate() {
            for b in &records[i + 1..] {
                assert!(!a.same_object(b));
            }
        }
        let texts: Vec<String> = records
            .iter()
            .map(|r| r.as_record().unwrap().get_as::<String>("text").unwrap())
            .collect();
        assert_eq!(texts, ["hello", "hola", "aloha"]);
    }

    #[test]
    fn test_24_bit_integer_collection() {
        let values = [0xaaaaaa, 0xbbbbbb, 0xcccccc, 0xdddddd];
        let root = Value::collection(values.iter().map(|&v| Value::Int(v)).collect());
        let decoded = decode(&encode(&root).unwrap()).unwrap();
        assert_eq!(decoded.cast::<Vec<i32>>(), Ok(values.to_vec()));
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        let mut root = Value::collection(vec![]);
        for _ in 0..100_000 {
            root = Value::collection(vec![root]);
        }
        let decoded = decode(&encode(&root).unwrap()).unwrap();
        let mut depth = 0;
        let mut current = decoded.clone();
        while let Some(next) = current.as_collection().and_then(|c| c.get(0)) {
            current = next;
            depth += 1;
        }
        assert_eq!(depth, 100_000);

        drop(current);
        drop(root);
        drop(decoded);
    }

    #[test]
    fn test_deep_stream_decodes_and_drops() {
        // 100_000 nested one-element collections around an empty one
        let mut bytes = b"OG\x01".to_vec();
        for _ in 0..100_000 {
            bytes.extend_from_slice(&[0x0F, 0, 0, 0, 1]);
        }
        bytes.extend_from_slice(&[0x0F, 0, 0, 0, 0]);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.as_collection().map(|c| c.len()), Some(1));
        drop(decoded);
    }
}

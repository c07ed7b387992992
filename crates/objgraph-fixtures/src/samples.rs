//! Sample graphs written by the fixture generator.

use std::rc::Rc;

use objgraph::{EnumConstant, EnumType, RecordRef, RecordType, TypeDesc, Value};

pub const STATUS: &str = "fixtures.Status";
pub const PREFIX: &str = "fixtures.Prefix";
pub const BAR: &str = "fixtures.Bar";
pub const FOO: &str = "fixtures.Foo";
pub const NODE: &str = "fixtures.Node";

/// A named sample; written to `<name>.og`.
pub struct Sample {
    pub name: &'static str,
    pub value: Value,
}

pub fn status_type() -> EnumType {
    EnumType::new(STATUS, ["SNAFU", "TARFU", "FUBAR"])
}

pub fn prefix_type() -> EnumType {
    EnumType::new(PREFIX, ["KILO", "KIBI", "MEGA", "MEBI", "GIGA", "GIBI"])
}

pub fn bar_type() -> Rc<RecordType> {
    Rc::new(RecordType::builder(BAR).field("value", TypeDesc::Int).build())
}

pub fn foo_type() -> Rc<RecordType> {
    Rc::new(
        RecordType::builder(FOO)
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
            .field("status", TypeDesc::enumeration(STATUS))
            .field("prefix", TypeDesc::enumeration(PREFIX))
            .field("bars", TypeDesc::array_of(TypeDesc::record(BAR)))
            .build(),
    )
}

pub fn node_type() -> Rc<RecordType> {
    Rc::new(
        RecordType::builder(NODE)
            .field("id", TypeDesc::Int)
            .field("next", TypeDesc::record(NODE))
            .build(),
    )
}

struct Foo {
    b: i8,
    i: i32,
    l: i64,
    s: i16,
    text: &'static str,
    bytes: [u8; 3],
    status: &'static str,
    prefix: &'static str,
    bars: &'static [i32],
}

/// Record types shared by every sample in one run.
pub struct Types {
    pub foo: Rc<RecordType>,
    pub bar: Rc<RecordType>,
    pub node: Rc<RecordType>,
}

impl Types {
    pub fn new() -> Self {
        Self {
            foo: foo_type(),
            bar: bar_type(),
            node: node_type(),
        }
    }

    fn bars(&self, values: &[i32]) -> Value {
        let bars = values
            .iter()
            .map(|&v| Value::record(self.bar.clone(), vec![Value::Int(v)]))
            .collect();
        Value::array(TypeDesc::record(BAR), bars)
    }

    fn foo(&self, foo: Foo) -> Value {
        Value::record(
            self.foo.clone(),
            vec![
                Value::Byte(foo.b),
                Value::Bool(true),
                Value::Char(u16::from(b'e')),
                Value::Double(3.14),
                Value::Float(2.718),
                Value::Int(foo.i),
                Value::Long(foo.l),
                Value::Short(foo.s),
                Value::from(foo.text),
                Value::Bytes(foo.bytes.to_vec()),
                Value::Enum(EnumConstant::new(STATUS, foo.status)),
                Value::Enum(EnumConstant::new(PREFIX, foo.prefix)),
                self.bars(foo.bars),
            ],
        )
    }

    pub fn foo1(&self) -> Value {
        self.foo(Foo {
            b: 0x7f,
            i: 7,
            l: 5_000_000_000,
            s: 32767,
            text: "hello",
            bytes: [0x11, 0x22, 0x33],
            status: "SNAFU",
            prefix: "KILO",
            bars: &[0x1111, 0x2222],
        })
    }

    pub fn foo2(&self) -> Value {
        self.foo(Foo {
            b: 0x00,
            i: 8,
            l: 6_000_000_000,
            s: 32766,
            text: "hola",
            bytes: [0x44, 0x55, 0x66],
            status: "TARFU",
            prefix: "MEGA",
            bars: &[0x3333, 0x4444],
        })
    }

    pub fn foo3(&self) -> Value {
        self.foo(Foo {
            b: 0x55,
            i: 9,
            l: 7_000_000_000,
            s: 32765,
            text: "aloha",
            bytes: [0x77, 0x77, 0x77],
            status: "FUBAR",
            prefix: "GIGA",
            bars: &[0x5555],
        })
    }

    /// Two nodes pointing at each other.
    pub fn cycle(&self) -> Value {
        let a = RecordRef::new(self.node.clone(), vec![Value::Int(1), Value::Null]);
        let b = RecordRef::new(self.node.clone(), vec![Value::Int(2), Value::Record(a.clone())]);
        a.set_field("next", Value::Record(b));
        Value::Record(a)
    }
}

impl Default for Types {
    fn default() -> Self {
        Self::new()
    }
}

/// Every sample, in the order they are written.
pub fn all() -> Vec<Sample> {
    let types = Types::new();
    let foo1 = types.foo1();

    let objects = Value::array(
        TypeDesc::record(FOO),
        vec![foo1.clone(), types.foo2(), types.foo3()],
    );
    let array_list = Value::collection(
        [0xaaaaaa, 0xbbbbbb, 0xcccccc, 0xdddddd]
            .into_iter()
            .map(Value::Int)
            .collect(),
    );
    let strings = Value::array(
        TypeDesc::Text,
        vec![Value::from("abc"), Value::from("def"), Value::from("ghi")],
    );
    let shared_bar = Value::record(types.bar.clone(), vec![Value::Int(0x1111)]);
    let shared = Value::collection(vec![
        foo1.clone(),
        foo1.clone(),
        shared_bar.clone(),
        shared_bar,
    ]);

    vec![
        Sample { name: "object", value: foo1 },
        Sample { name: "objects", value: objects },
        Sample { name: "ArrayList", value: array_list },
        Sample { name: "Boolean", value: Value::Bool(true) },
        Sample { name: "Byte", value: Value::Byte(-1) },
        Sample { name: "Character", value: Value::Char(u16::from(b'a')) },
        Sample { name: "Double", value: Value::Double(2.718) },
        Sample { name: "Float", value: Value::Float(3.14) },
        Sample { name: "Integer", value: Value::Int(1234567890) },
        Sample { name: "Long", value: Value::Long(9876543210) },
        Sample { name: "Short", value: Value::Short(32767) },
        Sample { name: "long-string", value: Value::from("0123456789abcdef".repeat(4096)) },
        Sample { name: "int", value: Value::Int(456789) },
        Sample { name: "string", value: Value::from("hi") },
        Sample { name: "enum", value: Value::Enum(EnumConstant::new(STATUS, "FUBAR")) },
        Sample { name: "bytes", value: Value::Bytes(vec![0x11, 0x22, 0x33, 0x44]) },
        Sample { name: "strings", value: strings },
        Sample { name: "shared", value: shared },
        Sample { name: "cycle", value: types.cycle() },
    ]
}

//! Graph comparison and traversal.
//!
//! Both operations are iterative and track object identity, so they
//! terminate on cyclic graphs and do not grow the call stack with depth.

use std::cell::Ref;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::model::Value;

/// Borrows the slots of an object value; None for scalars and for objects
/// that are currently mutably borrowed.
pub(crate) fn slots_of(value: &Value) -> Option<Ref<'_, Vec<Value>>> {
    match value {
        Value::Record(r) => r.try_slots(),
        Value::Array(a) => a.try_slots(),
        Value::Collection(c) => c.try_slots(),
        _ => None,
    }
}

/// Returns true if the graphs rooted at `a` and `b` are isomorphic.
///
/// Scalars compare exactly (floats by bit pattern). Objects compare by header
/// and slots, and the pairing between objects of `a` and objects of `b` must
/// be one-to-one: a graph with two references to one record is not equal to a
/// graph with two equal but distinct records.
pub fn isomorphic(a: &Value, b: &Value) -> bool {
    let mut pairing = Pairing::default();
    let mut pending = Vec::new();
    if !pairing.step(a, b, &mut pending) {
        return false;
    }

    while let Some((left, right)) = pending.pop() {
        let headers_match = match (&left, &right) {
            (Value::Record(l), Value::Record(r)) => l.record_type() == r.record_type(),
            (Value::Array(l), Value::Array(r)) => l.element_type() == r.element_type(),
            (Value::Collection(_), Value::Collection(_)) => true,
            _ => false,
        };
        if !headers_match {
            return false;
        }

        let (Some(left_slots), Some(right_slots)) = (slots_of(&left), slots_of(&right)) else {
            return false;
        };
        if left_slots.len() != right_slots.len() {
            return false;
        }
        for (l, r) in left_slots.iter().zip(right_slots.iter()) {
            if !pairing.step(l, r, &mut pending) {
                return false;
            }
        }
    }

    true
}

#[derive(Default)]
struct Pairing {
    left: FxHashMap<usize, usize>,
    right: FxHashMap<usize, usize>,
}

impl Pairing {
    fn step(&mut self, a: &Value, b: &Value, pending: &mut Vec<(Value, Value)>) -> bool {
        match (a.object_addr(), b.object_addr()) {
            (Some(l), Some(r)) => match (self.left.get(&l), self.right.get(&r)) {
                (Some(&paired_r), Some(&paired_l)) => paired_r == r && paired_l == l,
                (None, None) => {
                    self.left.insert(l, r);
                    self.right.insert(r, l);
                    pending.push((a.clone(), b.clone()));
                    true
                }
                _ => false,
            },
            (None, None) => scalar_eq(a, b),
            _ => false,
        }
    }
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Byte(x), Value::Byte(y)) => x == y,
        (Value::Char(x), Value::Char(y)) => x == y,
        (Value::Short(x), Value::Short(y)) => x == y,
        (Value::Int(x), Value::Int(y)) => x == y,
        (Value::Long(x), Value::Long(y)) => x == y,
        (Value::Float(x), Value::Float(y)) => x.to_bits() == y.to_bits(),
        (Value::Double(x), Value::Double(y)) => x.to_bits() == y.to_bits(),
        (Value::Text(x), Value::Text(y)) => x == y,
        (Value::Bytes(x), Value::Bytes(y)) => x == y,
        (Value::Enum(x), Value::Enum(y)) => x == y,
        _ => false,
    }
}

/// Calls `f` once for every value reachable from `root`.
///
/// Objects are visited once no matter how many references lead to them.
/// Scalars are visited once per occurrence. Order is unspecified. Objects
/// that are mutably borrowed are visited but not descended into.
pub fn visit<F: FnMut(&Value)>(root: &Value, mut f: F) {
    let mut seen = FxHashSet::default();
    let mut stack = Vec::new();

    match root.object_addr() {
        Some(addr) => {
            seen.insert(addr);
            stack.push(root.clone());
        }
        None => f(root),
    }

    while let Some(object) = stack.pop() {
        f(&object);
        let Some(slots) = slots_of(&object) else {
            continue;
        };
        for child in slots.iter() {
            match child.object_addr() {
                Some(addr) => {
                    if seen.insert(addr) {
                        stack.push(child.clone());
                    }
                }
                None => f(child),
            }
        }
    }
}

/// Empties every object reachable from `root`.
///
/// Objects are reference counted, so a cyclic graph is never freed on its
/// own. Detaching it breaks every cycle; the objects are released once the
/// caller drops its handles.
pub fn detach(root: &Value) {
    let mut objects = Vec::new();
    visit(root, |value| {
        if value.object_addr().is_some() {
            objects.push(value.clone());
        }
    });
    for object in &objects {
        clear(object);
    }
}

pub(crate) fn clear(value: &Value) {
    match value {
        Value::Record(r) => {
            r.clear();
        }
        Value::Array(a) => {
            a.clear();
        }
        Value::Collection(c) => {
            c.clear();
        }
        _ => {}
    }
}

//! Simple dumper to inspect object-graph stream files.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};

use objgraph::{Value, decode_all};

fn format_scalar(v: &Value) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("{}", b),
        Value::Byte(b) => format!("byte {}", b),
        Value::Char(c) => match v.as_char() {
            Some(ch) => format!("char {:?}", ch),
            None => format!("char \\u{:04x}", c),
        },
        Value::Short(s) => format!("short {}", s),
        Value::Int(i) => format!("int {}", i),
        Value::Long(l) => format!("long {}", l),
        Value::Float(f) => format!("float {}", f),
        Value::Double(d) => format!("double {}", d),
        Value::Text(s) => {
            let preview: String = s.chars().take(80).collect();
            if s.len() > 80 {
                format!("\"{}...\" ({} bytes)", preview, s.len())
            } else {
                format!("\"{}\"", preview)
            }
        }
        Value::Bytes(b) => format!("BYTES[{}]", b.len()),
        Value::Enum(e) => format!("{}", e),
        _ => String::new(),
    }
}

enum Step {
    Value {
        value: Value,
        indent: usize,
        label: String,
    },
    Close {
        indent: usize,
        bracket: char,
    },
}

/// Prints a value tree. Objects get a number on first sight; later
/// occurrences print as `-> #n`. Uses an explicit stack, so deep graphs print
/// without recursion.
fn dump(
    out: &mut impl Write,
    root: &Value,
    label: String,
    seen: &mut HashMap<usize, usize>,
) -> io::Result<()> {
    let mut stack = vec![Step::Value {
        value: root.clone(),
        indent: 0,
        label,
    }];

    while let Some(step) = stack.pop() {
        let (value, indent, label) = match step {
            Step::Value { value, indent, label } => (value, indent, label),
            Step::Close { indent, bracket } => {
                writeln!(out, "{}{}", "  ".repeat(indent), bracket)?;
                continue;
            }
        };

        let pad = "  ".repeat(indent);
        let Some(addr) = value.object_addr() else {
            writeln!(out, "{}{}{}", pad, label, format_scalar(&value))?;
            continue;
        };
        if let Some(n) = seen.get(&addr) {
            writeln!(out, "{}{}-> #{}", pad, label, n)?;
            continue;
        }
        let n = seen.len() + 1;
        seen.insert(addr, n);

        let (bracket, children): (char, Vec<(String, Value)>) = match &value {
            Value::Record(r) => {
                writeln!(out, "{}{}#{} {} {{", pad, label, n, r.type_name())?;
                let names = r.record_type().fields().iter().map(|f| format!("{}: ", f.name));
                ('}', names.zip(r.slots().iter().cloned()).collect())
            }
            Value::Array(a) => {
                writeln!(out, "{}{}#{} {}[{}] [", pad, label, n, a.element_type(), a.len())?;
                (']', a.slots().iter().map(|v| (String::new(), v.clone())).collect())
            }
            Value::Collection(c) => {
                writeln!(out, "{}{}#{} collection({}) [", pad, label, n, c.len())?;
                (']', c.slots().iter().map(|v| (String::new(), v.clone())).collect())
            }
            _ => continue,
        };

        stack.push(Step::Close { indent, bracket });
        for (label, child) in children.into_iter().rev() {
            stack.push(Step::Value {
                value: child,
                indent: indent + 1,
                label,
            });
        }
    }
    Ok(())
}

fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "fixtures/object.og".to_string());

    println!("Reading: {}", path);

    let data = fs::read(&path).expect("Failed to read file");
    println!("File size: {} bytes", data.len());

    let values = match decode_all(&data) {
        Ok(values) => values,
        Err(e) => {
            eprintln!("Failed to decode ({:?}): {}", e.kind(), e);
            std::process::exit(1);
        }
    };

    println!("\n=== Values ({}) ===", values.len());
    let mut seen = HashMap::new();
    let mut out = io::stdout().lock();
    for (i, value) in values.iter().enumerate() {
        dump(&mut out, value, format!("[{}] ", i), &mut seen).expect("Failed to write output");
    }
    println!("\nDistinct objects: {}", seen.len());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_marks_repeats() {
        let shared = Value::collection(vec![Value::Int(1)]);
        let root = Value::collection(vec![shared.clone(), shared]);
        let mut out = Vec::new();
        dump(&mut out, &root, String::new(), &mut HashMap::new()).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "#1 collection(2) [\n  #2 collection(1) [\n    int 1\n  ]\n  -> #2\n]\n"
        );
    }

    #[test]
    fn test_dump_deep_graph() {
        let mut root = Value::collection(vec![]);
        for _ in 0..100_000 {
            root = Value::collection(vec![root]);
        }
        let mut seen = HashMap::new();
        dump(&mut io::sink(), &root, String::new(), &mut seen).unwrap();
        assert_eq!(seen.len(), 100_001);
    }
}

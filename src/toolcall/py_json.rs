//! JSON text identical to Python's `json.dumps` with default arguments.
//!
//! Prompt templates embed JSON produced by Python tooling, and models are
//! sensitive to the exact bytes: `", "` and `": "` separators, and every
//! non-ASCII character escaped as `\uXXXX`.

use serde::Serialize;
use serde_json::ser::Formatter;
use std::io::{self, Write};

#[derive(Default)]
pub struct PyFormatter;

impl Formatter for PyFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        if first { Ok(()) } else { writer.write_all(b", ") }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        let mut start = 0;
        for (i, c) in fragment.char_indices() {
            if c.is_ascii() {
                continue;
            }
            writer.write_all(fragment[start..i].as_bytes())?;
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                write!(writer, "\\u{:04x}", unit)?;
            }
            start = i + c.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

pub fn to_string<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, PyFormatter);
    value.serialize(&mut ser)?;
    // The formatter only ever writes ASCII.
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn separators_match_python() {
        let v = json!({"a": [1, 2, {"b": null}], "c": true});
        assert_eq!(to_string(&v).unwrap(), r#"{"a": [1, 2, {"b": null}], "c": true}"#);
        assert_eq!(to_string(&json!([])).unwrap(), "[]");
        assert_eq!(to_string(&json!({})).unwrap(), "{}");
    }

    #[test]
    fn non_ascii_is_escaped() {
        assert_eq!(to_string("Montréal").unwrap(), r#""Montr\u00e9al""#);
        // Outside the BMP Python writes a surrogate pair.
        assert_eq!(to_string("a😀b").unwrap(), r#""a\ud83d\ude00b""#);
        assert_eq!(to_string("tab\there \"q\"").unwrap(), r#""tab\there \"q\"""#);
    }

    #[test]
    fn keeps_insertion_order() {
        let v = json!({"type": "object", "properties": {}, "required": []});
        assert_eq!(
            to_string(&v).unwrap(),
            r#"{"type": "object", "properties": {}, "required": []}"#
        );
    }
}

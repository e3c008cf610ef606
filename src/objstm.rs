//! Object stream parsing (PDF 1.5+).
//!
//! An object stream (/Type /ObjStm) packs several objects into one
//! compressed stream:
//!
//! ```text
//! << /Type /ObjStm /N 3 /First 14 /Filter /FlateDecode >>
//! stream
//! 10 0 11 15 12 28     % pairs of (object number, offset from /First)
//! << ... >>            % object 10
//! ...
//! endstream
//! ```
//!
//! Forms produced by modern authoring tools frequently keep their field
//! dictionaries in object streams, so they have to be unpacked on load.

use crate::error::{Error, Result};
use crate::object::Object;
use crate::parser::parse_object;
use std::collections::HashMap;

const MAX_OBJECTS: i64 = 1_000_000;

/// Parse an object stream and return its objects keyed by object number.
///
/// Objects that fail to parse are skipped with a warning so one broken
/// entry does not hide the rest of the stream.
pub fn parse_object_stream(stream_obj: &Object) -> Result<HashMap<u32, Object>> {
    let dict = match stream_obj {
        Object::Stream { dict, .. } => dict,
        _ => return Err(Error::InvalidPdf("object stream is not a Stream object".to_string())),
    };

    if let Some(type_name) = dict.get("Type").and_then(Object::as_name) {
        if type_name != "ObjStm" {
            return Err(Error::InvalidPdf(format!(
                "expected /Type /ObjStm, got /Type /{}",
                type_name
            )));
        }
    }

    let n = dict
        .get("N")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /N entry".to_string()))?;
    let first = dict
        .get("First")
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf("object stream missing /First entry".to_string()))?;

    if !(0..=MAX_OBJECTS).contains(&n) {
        return Err(Error::InvalidPdf(format!("invalid object stream /N value: {}", n)));
    }
    if first < 0 {
        return Err(Error::InvalidPdf(format!("invalid object stream /First value: {}", first)));
    }
    let (n, first) = (n as usize, first as usize);

    let decoded = stream_obj.decode_stream_data()?;
    if decoded.len() < first {
        return Err(Error::InvalidPdf(format!(
            "object stream data too short: {} bytes, expected at least {}",
            decoded.len(),
            first
        )));
    }

    let pairs = parse_object_number_pairs(&decoded[..first], n)?;
    let objects_data = &decoded[first..];
    let mut result = HashMap::with_capacity(pairs.len());

    for (obj_num, offset) in pairs {
        let Some(obj_data) = objects_data.get(offset..) else {
            log::warn!(
                "Object {} offset {} is beyond stream data length {}",
                obj_num,
                offset,
                objects_data.len()
            );
            continue;
        };
        match parse_object(obj_data) {
            Ok((_, obj)) => {
                result.insert(obj_num, obj);
            },
            Err(e) => {
                log::warn!("Failed to parse object {} from object stream: {:?}", obj_num, e);
            },
        }
    }

    Ok(result)
}

fn parse_object_number_pairs(data: &[u8], count: usize) -> Result<Vec<(u32, usize)>> {
    let text = String::from_utf8_lossy(data);
    let numbers: Vec<usize> = text
        .split_ascii_whitespace()
        .map(|word| {
            word.parse::<usize>().map_err(|_| {
                Error::InvalidPdf(format!("invalid number in object stream header: {}", word))
            })
        })
        .collect::<Result<_>>()?;

    if numbers.len() < count * 2 {
        return Err(Error::InvalidPdf(format!(
            "object stream header has {} numbers, expected {}",
            numbers.len(),
            count * 2
        )));
    }

    Ok(numbers
        .chunks_exact(2)
        .take(count)
        .map(|pair| (pair[0] as u32, pair[1]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dict;

    fn objstm(header: &str, body: &str) -> Object {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("ObjStm"));
        dict.insert("N".to_string(), Object::Integer(2));
        dict.insert("First".to_string(), Object::Integer(header.len() as i64));
        Object::Stream {
            dict,
            data: bytes::Bytes::from(format!("{}{}", header, body).into_bytes()),
        }
    }

    #[test]
    fn test_parse_two_objects() {
        let stream = objstm("10 0 11 12 ", "<< /A 1 >>  [1 2 3]");
        let objects = parse_object_stream(&stream).unwrap();
        assert_eq!(objects.len(), 2);
        assert!(objects[&10].as_dict().is_some());
        assert_eq!(objects[&11].as_array().map(Vec::len), Some(3));
    }

    #[test]
    fn test_offset_out_of_range_skipped() {
        let stream = objstm("10 0 11 999 ", "<< /A 1 >>");
        let objects = parse_object_stream(&stream).unwrap();
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn test_not_a_stream() {
        assert!(parse_object_stream(&Object::Integer(1)).is_err());
    }

    #[test]
    fn test_short_header() {
        let stream = objstm("10 0 ", "<< >>");
        assert!(parse_object_stream(&stream).is_err());
    }
}

//! Cross-reference reconstruction for damaged files.
//!
//! When the xref chain is missing or points at garbage, the whole file is
//! scanned for `N G obj` markers. Later definitions win, matching the
//! semantics of incremental updates. The trailer comes from the last
//! `trailer` dictionary in the file, or is synthesized around the catalog.

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::parser::{parse_indirect_object_at, parse_object};
use crate::xref::{CrossRefTable, XRefEntry};
use lazy_static::lazy_static;

lazy_static! {
    /// "N G obj" at the start of a line
    static ref RE_OBJ_PATTERN: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(?m)(?:^|[\r\n])\s*(\d+)\s+(\d+)\s+obj\b").expect("valid regex");

    /// "trailer <<"
    static ref RE_TRAILER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"trailer\s*<<").expect("valid regex");
}

/// Rebuild the cross-reference table by scanning `data`.
pub fn reconstruct_xref(data: &[u8]) -> Result<CrossRefTable> {
    log::warn!("Reconstructing xref table by scanning {} bytes", data.len());

    let mut table = CrossRefTable::new();
    let mut found = 0usize;
    let mut max_id = 0u32;

    for capture in RE_OBJ_PATTERN.captures_iter(data) {
        let (Some(id_match), Some(gen_match)) = (capture.get(1), capture.get(2)) else {
            continue;
        };
        let id = parse_ascii::<u32>(id_match.as_bytes());
        let gen = parse_ascii::<u16>(gen_match.as_bytes());
        let (Some(id), Some(gen)) = (id, gen) else {
            continue;
        };
        table.add_entry(
            id,
            XRefEntry::InUse {
                offset: id_match.start(),
                gen,
            },
        );
        max_id = max_id.max(id);
        found += 1;
    }

    if found == 0 {
        return Err(Error::InvalidPdf("no objects found during xref reconstruction".to_string()));
    }
    log::info!("Reconstructed xref with {} object definitions", found);

    let mut trailer = find_trailer(data).unwrap_or_default();
    if !trailer.contains_key("Root") {
        let root = find_catalog(data, &table)
            .ok_or_else(|| Error::InvalidPdf("could not find catalog in damaged file".to_string()))?;
        trailer.insert("Root".to_string(), Object::Reference(root));
    }
    trailer.insert("Size".to_string(), Object::Integer(i64::from(max_id) + 1));
    trailer.remove("Prev");
    trailer.remove("XRefStm");
    table.set_trailer(trailer);

    Ok(table)
}

fn parse_ascii<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

fn find_trailer(data: &[u8]) -> Option<Dict> {
    let last = RE_TRAILER.find_iter(data).last()?;
    let input = &data[last.start() + b"trailer".len()..];
    match parse_object(input) {
        Ok((_, Object::Dictionary(dict))) => Some(dict),
        _ => {
            log::warn!("Unparseable trailer dictionary at offset {}", last.start());
            None
        },
    }
}

fn find_catalog(data: &[u8], table: &CrossRefTable) -> Option<ObjectRef> {
    table.live_object_numbers().into_iter().rev().find_map(|id| {
        let XRefEntry::InUse { offset, .. } = table.get(id)? else {
            return None;
        };
        let (reference, object) = parse_indirect_object_at(data, *offset).ok()?;
        let dict = object.as_dict()?;
        (dict.get("Type").and_then(Object::as_name) == Some("Catalog")).then_some(reference)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reconstruct_without_xref() {
        let data = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n%%EOF";
        let table = reconstruct_xref(data).unwrap();
        assert_eq!(table.live_object_numbers(), vec![1, 2]);
        assert_eq!(
            table.trailer().get("Root"),
            Some(&Object::Reference(ObjectRef::new(1, 0)))
        );
    }

    #[test]
    fn test_later_definition_wins() {
        let data = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n1 0 obj\n<< /Type /Catalog /V 2 >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n";
        let table = reconstruct_xref(data).unwrap();
        match table.get(1) {
            Some(XRefEntry::InUse { offset, .. }) => assert!(*offset > 40),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_no_objects() {
        assert!(reconstruct_xref(b"%PDF-1.4\nnothing here").is_err());
    }
}

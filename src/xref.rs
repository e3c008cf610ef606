//! Cross-reference table reader.
//!
//! Maps object numbers to their location in the file. Both classic `xref`
//! tables and cross-reference streams (PDF 1.5+) are read, following the
//! `/Prev` chain of incremental updates and `/XRefStm` hybrid sections.
//! Entries from newer sections take precedence over older ones.

use crate::error::{Error, Result};
use crate::lexer::skip_ws;
use crate::object::{Dict, Object};
use crate::parser::{parse_indirect_object_at, parse_object};
use std::collections::{HashMap, HashSet};

/// Maximum number of sections followed through `/Prev`.
const MAX_SECTIONS: usize = 256;

/// Location of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free slot
    Free,
    /// Object stored directly at a byte offset
    InUse {
        /// Byte offset of `N G obj`
        offset: usize,
        /// Generation number
        gen: u16,
    },
    /// Object stored inside an object stream
    Compressed {
        /// Object number of the containing `/ObjStm`
        stream_id: u32,
        /// Index within that stream
        index: usize,
    },
}

/// Cross-reference table that maps object numbers to their locations.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dict,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The merged trailer dictionary (newest values win).
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Replace the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dict) {
        self.trailer = trailer;
    }

    /// Add an entry, replacing any existing one.
    pub fn add_entry(&mut self, object_number: u32, entry: XRefEntry) {
        self.entries.insert(object_number, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, object_number: u32) -> Option<&XRefEntry> {
        self.entries.get(&object_number)
    }

    /// All object numbers with in-use or compressed entries, ascending.
    pub fn live_object_numbers(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, e)| !matches!(e, XRefEntry::Free))
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Number of entries in the table.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge an older section: existing entries and trailer keys are kept.
    fn merge_older(&mut self, entries: Vec<(u32, XRefEntry)>, trailer: &Dict) {
        for (id, entry) in entries {
            self.entries.entry(id).or_insert(entry);
        }
        for (key, value) in trailer {
            if key != "Prev" && key != "XRefStm" {
                self.trailer.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
    }
}

/// Find the byte offset recorded after the last `startxref` keyword.
pub fn find_xref_offset(data: &[u8]) -> Result<usize> {
    let window_start = data.len().saturating_sub(2048);
    let tail = &data[window_start..];
    let keyword = b"startxref";
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or(Error::InvalidXref)?;

    let digits: String = skip_ws(&tail[pos + keyword.len()..])
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();
    digits.parse::<usize>().map_err(|_| Error::InvalidXref)
}

/// Read the cross-reference chain starting at `offset`.
pub fn parse_xref(data: &[u8], offset: usize) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    let mut visited = HashSet::new();
    let mut next = Some(offset);

    while let Some(section_offset) = next.take() {
        if !visited.insert(section_offset) {
            log::warn!("Circular /Prev chain at offset {}", section_offset);
            break;
        }
        if visited.len() > MAX_SECTIONS {
            return Err(Error::InvalidPdf("xref /Prev chain too long".to_string()));
        }

        let (entries, trailer) = parse_section(data, section_offset)?;
        log::debug!(
            "Read xref section at {} with {} entries",
            section_offset,
            entries.len()
        );
        table.merge_older(entries, &trailer);

        // Hybrid files: the stream entries rank between this section and /Prev
        if let Some(stm_offset) = trailer.get("XRefStm").and_then(Object::as_integer) {
            match parse_xref_stream(data, stm_offset as usize) {
                Ok((entries, _)) => table.merge_older(entries, &Dict::new()),
                Err(e) => log::warn!("Ignoring unreadable /XRefStm at {}: {}", stm_offset, e),
            }
        }

        next = trailer
            .get("Prev")
            .and_then(Object::as_integer)
            .filter(|p| *p >= 0)
            .map(|p| p as usize);
    }

    if table.is_empty() {
        return Err(Error::InvalidXref);
    }
    Ok(table)
}

fn parse_section(data: &[u8], offset: usize) -> Result<(Vec<(u32, XRefEntry)>, Dict)> {
    let input = data.get(offset..).ok_or(Error::InvalidXref)?;
    if skip_ws(input).starts_with(b"xref") {
        parse_classic_section(data, offset)
    } else {
        parse_xref_stream(data, offset)
    }
}

/// Minimal cursor over whitespace-separated ASCII words.
struct Words<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Words<'a> {
    fn peek(&self) -> Option<&'a [u8]> {
        let rest = skip_ws(&self.data[self.pos..]);
        let len = rest.iter().take_while(|c| !c.is_ascii_whitespace()).count();
        (len > 0).then(|| &rest[..len])
    }

    fn next(&mut self) -> Option<&'a [u8]> {
        let rest = skip_ws(&self.data[self.pos..]);
        let start = self.data.len() - rest.len();
        let len = rest.iter().take_while(|c| !c.is_ascii_whitespace()).count();
        self.pos = start + len;
        (len > 0).then(|| &rest[..len])
    }

    fn number(&mut self) -> Result<u64> {
        self.next()
            .and_then(|w| std::str::from_utf8(w).ok())
            .and_then(|s| s.parse().ok())
            .ok_or(Error::InvalidXref)
    }
}

fn parse_classic_section(data: &[u8], offset: usize) -> Result<(Vec<(u32, XRefEntry)>, Dict)> {
    let mut words = Words { data, pos: offset };
    if words.next() != Some(&b"xref"[..]) {
        return Err(Error::InvalidXref);
    }

    let mut entries = Vec::new();
    loop {
        match words.peek() {
            Some(w) if w.starts_with(b"trailer") => break,
            None => return Err(Error::InvalidXref),
            _ => {},
        }
        let start = words.number()? as u32;
        let count = words.number()? as u32;
        if count > 10_000_000 {
            return Err(Error::InvalidPdf("xref subsection count exceeds limit".to_string()));
        }
        for i in 0..count {
            let entry_offset = words.number()? as usize;
            let gen = words.number()? as u16;
            let entry = match words.next() {
                Some(b"n") if entry_offset > 0 => XRefEntry::InUse {
                    offset: entry_offset,
                    gen,
                },
                Some(b"n") | Some(b"f") => XRefEntry::Free,
                _ => return Err(Error::InvalidXref),
            };
            entries.push((start + i, entry));
        }
    }

    let rest = skip_ws(&data[words.pos..]);
    let after_keyword = &rest[b"trailer".len()..];
    let (_, trailer) = parse_object(after_keyword).map_err(|_| Error::InvalidXref)?;
    match trailer {
        Object::Dictionary(dict) => Ok((entries, dict)),
        _ => Err(Error::InvalidXref),
    }
}

fn parse_xref_stream(data: &[u8], offset: usize) -> Result<(Vec<(u32, XRefEntry)>, Dict)> {
    let (_, stream) = parse_indirect_object_at(data, offset)?;
    let dict = stream
        .as_dict()
        .cloned()
        .ok_or_else(|| Error::InvalidPdf("xref stream is not a stream object".to_string()))?;

    if dict.get("Type").and_then(Object::as_name) != Some("XRef") {
        return Err(Error::InvalidPdf("expected /Type /XRef".to_string()));
    }

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .map(|w| w.iter().filter_map(Object::as_integer).map(|v| v.max(0) as usize).collect())
        .unwrap_or_default();
    if widths.len() != 3 {
        return Err(Error::InvalidPdf("invalid /W array in xref stream".to_string()));
    }

    let size = dict.get("Size").and_then(Object::as_integer).unwrap_or(0);
    let ranges: Vec<(u32, u32)> = match dict.get("Index").and_then(Object::as_array) {
        Some(index) => index
            .chunks_exact(2)
            .filter_map(|pair| Some((pair[0].as_integer()? as u32, pair[1].as_integer()? as u32)))
            .collect(),
        None => vec![(0, size as u32)],
    };

    let decoded = stream.decode_stream_data()?;
    let record = widths.iter().sum::<usize>();
    if record == 0 {
        return Err(Error::InvalidPdf("zero-width xref stream records".to_string()));
    }

    let mut records = decoded.chunks_exact(record);
    let mut entries = Vec::new();
    for (start, count) in ranges {
        for i in 0..count {
            let Some(bytes) = records.next() else {
                log::warn!("Truncated xref stream at offset {}", offset);
                return Ok((entries, dict));
            };
            let (f1, rest) = bytes.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            let kind = if widths[0] == 0 { 1 } else { read_int(f1) };
            let entry = match kind {
                1 => XRefEntry::InUse {
                    offset: read_int(f2) as usize,
                    gen: read_int(f3) as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_id: read_int(f2) as u32,
                    index: read_int(f3) as usize,
                },
                _ => XRefEntry::Free,
            };
            entries.push((start + i, entry));
        }
    }

    Ok((entries, dict))
}

fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
}

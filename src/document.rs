//! In-memory PDF document.
//!
//! A [`PdfDocument`] keeps the original file bytes together with every live
//! object, so it can be edited and then written back either as a compact
//! full save or as an append-only incremental update that leaves all
//! existing bytes (and therefore existing signatures) untouched.
//!
//! # Example
//!
//! ```no_run
//! use pdf_cosign::document::PdfDocument;
//!
//! let doc = PdfDocument::open("form.pdf")?;
//! println!("PDF {}.{} with {} pages", doc.version().0, doc.version().1, doc.page_refs()?.len());
//! # Ok::<(), pdf_cosign::error::Error>(())
//! ```

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use crate::objstm::parse_object_stream;
use crate::parser::parse_indirect_object_at;
use crate::writer::ObjectSerializer;
use crate::xref::{find_xref_offset, parse_xref, CrossRefTable, XRefEntry};
use crate::xref_reconstruction::reconstruct_xref;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::ops::Range;
use std::path::Path;

/// Maximum depth when following reference chains
const MAX_RESOLVE_DEPTH: usize = 32;

/// Maximum depth of the page tree
const MAX_PAGE_TREE_DEPTH: usize = 64;

static NULL: Object = Object::Null;

/// Result of [`PdfDocument::write_incremental`].
#[derive(Debug, Clone)]
pub struct IncrementalUpdate {
    /// The complete file: original bytes followed by the appended revision
    pub bytes: Vec<u8>,
    /// Byte span of each written object (`N G obj` through `endobj`)
    pub offsets: BTreeMap<u32, Range<usize>>,
}

/// An editable PDF document.
pub struct PdfDocument {
    /// Original file bytes, kept verbatim for incremental saves
    data: Vec<u8>,
    /// PDF version (major, minor)
    version: (u8, u8),
    /// Every live object with its generation number
    objects: BTreeMap<u32, (u16, Object)>,
    /// Trailer of the newest revision
    trailer: Dict,
    /// Objects changed or added since load
    modified: BTreeSet<u32>,
    /// Next free object number
    next_id: u32,
    /// Offset of the newest xref section, `None` when it was reconstructed
    xref_offset: Option<usize>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("version", &self.version)
            .field("objects", &self.objects.len())
            .field("modified", &self.modified.len())
            .field("bytes", &self.data.len())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Open and load a PDF file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::load(&data)
    }

    /// Load a document from its bytes.
    ///
    /// The xref chain is used when it is sound. Otherwise the file is scanned
    /// for object definitions. Encrypted documents are rejected.
    pub fn load(data: &[u8]) -> Result<Self> {
        let version = parse_header(data)?;

        let regular = find_xref_offset(data).and_then(|offset| {
            let table = parse_xref(data, offset)?;
            Ok((table, offset))
        });

        let doc = match regular {
            Ok((table, offset)) if !table.is_empty() => {
                match Self::from_table(data, version, &table, Some(offset)) {
                    Ok(doc) => doc,
                    Err(e @ Error::Unsupported(_)) => return Err(e),
                    Err(e) => {
                        log::warn!("Xref table unusable ({}), reconstructing", e);
                        Self::reconstructed(data, version)?
                    },
                }
            },
            Ok(_) => {
                log::warn!("Xref table is empty, reconstructing");
                Self::reconstructed(data, version)?
            },
            Err(e) => {
                log::warn!("Failed to read xref ({}), reconstructing", e);
                Self::reconstructed(data, version)?
            },
        };

        log::debug!("Loaded {:?}", doc);
        Ok(doc)
    }

    fn reconstructed(data: &[u8], version: (u8, u8)) -> Result<Self> {
        Self::from_table(data, version, &reconstruct_xref(data)?, None)
    }

    fn from_table(
        data: &[u8],
        version: (u8, u8),
        table: &CrossRefTable,
        xref_offset: Option<usize>,
    ) -> Result<Self> {
        let trailer = table.trailer().clone();
        if trailer.contains_key("Encrypt") {
            return Err(Error::Unsupported("encrypted documents are not supported".to_string()));
        }

        let mut objects = BTreeMap::new();
        let mut compressed: BTreeMap<u32, Vec<u32>> = BTreeMap::new();

        for id in table.live_object_numbers() {
            match table.get(id) {
                Some(XRefEntry::InUse { offset, gen }) => {
                    match parse_indirect_object_at(data, *offset) {
                        Ok((reference, object)) if reference.id == id => {
                            objects.insert(id, (*gen, object));
                        },
                        Ok((reference, _)) => {
                            log::warn!("Xref entry {} points at object {}", id, reference);
                        },
                        Err(e) => log::warn!("Failed to parse object {}: {}", id, e),
                    }
                },
                Some(XRefEntry::Compressed { stream_id, .. }) => {
                    compressed.entry(*stream_id).or_default().push(id);
                },
                _ => {},
            }
        }

        for (stream_id, members) in compressed {
            let Some((_, stream)) = objects.get(&stream_id) else {
                log::warn!("Object stream {} is missing", stream_id);
                continue;
            };
            let mut unpacked = match parse_object_stream(stream) {
                Ok(unpacked) => unpacked,
                Err(e) => {
                    log::warn!("Failed to unpack object stream {}: {}", stream_id, e);
                    continue;
                },
            };
            for id in members {
                if let Some(object) = unpacked.remove(&id) {
                    objects.insert(id, (0, object));
                }
            }
        }

        let max_id = objects.keys().next_back().copied().unwrap_or(0);
        let size = trailer
            .get("Size")
            .and_then(Object::as_integer)
            .and_then(|s| u32::try_from(s).ok())
            .unwrap_or(0);

        let doc = Self {
            data: data.to_vec(),
            version,
            objects,
            trailer,
            modified: BTreeSet::new(),
            next_id: size.max(max_id + 1),
            xref_offset,
        };

        // A document whose catalog cannot be reached is unusable
        doc.catalog()?;
        Ok(doc)
    }

    /// PDF version from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The original bytes this document was loaded from.
    pub fn original_bytes(&self) -> &[u8] {
        &self.data
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Look up an object by reference.
    pub fn get(&self, reference: ObjectRef) -> Option<&Object> {
        self.objects.get(&reference.id).map(|(_, obj)| obj)
    }

    /// Mutable access to an object. The object is marked as modified.
    pub fn get_mut(&mut self, reference: ObjectRef) -> Option<&mut Object> {
        let (_, obj) = self.objects.get_mut(&reference.id)?;
        self.modified.insert(reference.id);
        Some(obj)
    }

    /// Mutable access to an indirect dictionary, marking it modified.
    pub fn dict_mut(&mut self, reference: ObjectRef) -> Result<&mut Dict> {
        let obj = self
            .get_mut(reference)
            .ok_or(Error::ObjectNotFound(reference.id, reference.gen))?;
        let found = obj.type_name();
        obj.as_dict_mut().ok_or_else(|| Error::InvalidObjectType {
            expected: "Dictionary".to_string(),
            found: found.to_string(),
        })
    }

    /// Follow references until a direct object is reached.
    /// Dangling references resolve to null.
    pub fn resolve<'a>(&'a self, obj: &'a Object) -> &'a Object {
        let mut current = obj;
        for _ in 0..MAX_RESOLVE_DEPTH {
            match current {
                Object::Reference(r) => match self.get(*r) {
                    Some(next) => current = next,
                    None => return &NULL,
                },
                _ => return current,
            }
        }
        log::warn!("Reference chain too deep, treating as null");
        &NULL
    }

    /// Resolve `obj` and return it as a dictionary (stream dictionaries included).
    pub fn resolve_dict<'a>(&'a self, obj: &'a Object) -> Option<&'a Dict> {
        self.resolve(obj).as_dict()
    }

    /// Resolve `obj` and return it as an array.
    pub fn resolve_array<'a>(&'a self, obj: &'a Object) -> Option<&'a Vec<Object>> {
        self.resolve(obj).as_array()
    }

    /// Reference to the document catalog.
    pub fn catalog_ref(&self) -> Result<ObjectRef> {
        self.trailer
            .get("Root")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root reference".to_string()))
    }

    /// The document catalog.
    pub fn catalog(&self) -> Result<&Dict> {
        let root = self.catalog_ref()?;
        self.get(root)
            .and_then(Object::as_dict)
            .ok_or_else(|| Error::InvalidPdf(format!("catalog {} is missing", root)))
    }

    /// References of every page, in document order.
    pub fn page_refs(&self) -> Result<Vec<ObjectRef>> {
        let pages_ref = self
            .catalog()?
            .get("Pages")
            .and_then(Object::as_reference)
            .ok_or_else(|| Error::InvalidPdf("catalog has no /Pages".to_string()))?;

        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        self.collect_pages(pages_ref, 0, &mut visited, &mut pages)?;
        Ok(pages)
    }

    fn collect_pages(
        &self,
        node_ref: ObjectRef,
        depth: usize,
        visited: &mut HashSet<ObjectRef>,
        pages: &mut Vec<ObjectRef>,
    ) -> Result<()> {
        if depth > MAX_PAGE_TREE_DEPTH {
            return Err(Error::InvalidPdf("page tree is too deep".to_string()));
        }
        if !visited.insert(node_ref) {
            return Err(Error::CircularReference(node_ref));
        }
        let Some(node) = self.get(node_ref).and_then(Object::as_dict) else {
            log::warn!("Page tree node {} is missing", node_ref);
            return Ok(());
        };

        let is_pages = node.get("Type").and_then(Object::as_name) == Some("Pages")
            || (node.get("Type").is_none() && node.contains_key("Kids"));
        if !is_pages {
            pages.push(node_ref);
            return Ok(());
        }

        let kids = node.get("Kids").and_then(|k| self.resolve_array(k)).cloned().unwrap_or_default();
        for kid in kids {
            if let Some(kid_ref) = kid.as_reference() {
                self.collect_pages(kid_ref, depth + 1, visited, pages)?;
            }
        }
        Ok(())
    }

    /// Map from page reference to page index.
    pub fn page_index_map(&self) -> Result<HashMap<ObjectRef, usize>> {
        Ok(self
            .page_refs()?
            .into_iter()
            .enumerate()
            .map(|(index, page)| (page, index))
            .collect())
    }

    /// Replace (or define) the object with the given reference.
    pub fn set_object(&mut self, reference: ObjectRef, obj: Object) {
        self.objects.insert(reference.id, (reference.gen, obj));
        self.modified.insert(reference.id);
        self.next_id = self.next_id.max(reference.id + 1);
    }

    /// Add a new indirect object and return its reference.
    pub fn add_object(&mut self, obj: Object) -> ObjectRef {
        let reference = ObjectRef::new(self.next_id, 0);
        self.set_object(reference, obj);
        reference
    }

    /// Whether anything changed since load.
    pub fn is_modified(&self) -> bool {
        !self.modified.is_empty()
    }

    /// Append changed objects as a new revision.
    ///
    /// When the xref had to be reconstructed there is no trustworthy section
    /// to chain to, so every live object is written and `/Prev` is omitted.
    pub fn write_incremental(&self) -> Result<IncrementalUpdate> {
        let serializer = ObjectSerializer::new();
        let mut bytes = self.data.clone();
        if !bytes.ends_with(b"\n") && !bytes.ends_with(b"\r") {
            bytes.push(b'\n');
        }

        let ids: Vec<u32> = match self.xref_offset {
            Some(_) => self.modified.iter().copied().collect(),
            None => self.objects.keys().copied().collect(),
        };

        let mut offsets = BTreeMap::new();
        let mut entries = Vec::with_capacity(ids.len());
        for id in ids {
            let Some((gen, obj)) = self.objects.get(&id) else {
                continue;
            };
            let start = bytes.len();
            bytes.extend_from_slice(&serializer.serialize_indirect(id, *gen, obj));
            offsets.insert(id, start..bytes.len());
            entries.push((id, start, *gen));
        }

        let xref_start = bytes.len();
        write_xref_table(&mut bytes, &entries, self.xref_offset.is_none());

        let mut trailer = Dict::new();
        trailer.insert("Size".to_string(), Object::Integer(i64::from(self.next_id)));
        for key in ["Root", "Info", "ID"] {
            if let Some(value) = self.trailer.get(key) {
                trailer.insert(key.to_string(), value.clone());
            }
        }
        if let Some(prev) = self.xref_offset {
            trailer.insert("Prev".to_string(), Object::Integer(prev as i64));
        }
        write_trailer(&mut bytes, &trailer, xref_start);

        log::info!(
            "Incremental update: {} objects, {} -> {} bytes",
            offsets.len(),
            self.data.len(),
            bytes.len()
        );
        Ok(IncrementalUpdate { bytes, offsets })
    }

    /// Append changed objects as a new revision and return the whole file.
    pub fn save_incremental(&self) -> Result<Vec<u8>> {
        Ok(self.write_incremental()?.bytes)
    }

    /// Write a fresh, compact file containing only reachable objects.
    ///
    /// Objects are renumbered densely in breadth-first order from the
    /// trailer. An `/ID` is generated when the document has none.
    pub fn save_full(&self) -> Result<Vec<u8>> {
        let mut roots = vec![self.catalog_ref()?];
        if let Some(info) = self.trailer.get("Info").and_then(Object::as_reference) {
            roots.push(info);
        }

        let mut renumber: HashMap<u32, u32> = HashMap::new();
        let mut order = Vec::new();
        let mut queue: VecDeque<u32> = VecDeque::new();
        for root in &roots {
            if self.objects.contains_key(&root.id) && !renumber.contains_key(&root.id) {
                renumber.insert(root.id, renumber.len() as u32 + 1);
                queue.push_back(root.id);
            }
        }
        while let Some(id) = queue.pop_front() {
            order.push(id);
            let Some((_, obj)) = self.objects.get(&id) else {
                continue;
            };
            let mut refs = Vec::new();
            collect_references(obj, &mut refs);
            for r in refs {
                if self.objects.contains_key(&r.id) && !renumber.contains_key(&r.id) {
                    renumber.insert(r.id, renumber.len() as u32 + 1);
                    queue.push_back(r.id);
                }
            }
        }

        let serializer = ObjectSerializer::new();
        let mut bytes = format!("%PDF-{}.{}\n", self.version.0, self.version.1).into_bytes();
        bytes.extend_from_slice(b"%\xE2\xE3\xCF\xD3\n");

        let mut entries = Vec::with_capacity(order.len());
        for id in &order {
            let Some((_, obj)) = self.objects.get(id) else {
                continue;
            };
            let new_id = renumber[id];
            let mut obj = obj.clone();
            remap_references(&mut obj, &renumber);
            entries.push((new_id, bytes.len(), 0));
            bytes.extend_from_slice(&serializer.serialize_indirect(new_id, 0, &obj));
        }

        let xref_start = bytes.len();
        write_xref_table(&mut bytes, &entries, true);

        let mut trailer = Dict::new();
        trailer.insert("Size".to_string(), Object::Integer(order.len() as i64 + 1));
        let remap = |r: ObjectRef| {
            renumber
                .get(&r.id)
                .map(|&id| Object::Reference(ObjectRef::new(id, 0)))
        };
        if let Some(root) = remap(roots[0]) {
            trailer.insert("Root".to_string(), root);
        }
        if let Some(info) = self
            .trailer
            .get("Info")
            .and_then(Object::as_reference)
            .and_then(remap)
        {
            trailer.insert("Info".to_string(), info);
        }
        let id = match self.trailer.get("ID") {
            Some(id @ Object::Array(_)) => id.clone(),
            _ => generate_file_id(),
        };
        trailer.insert("ID".to_string(), id);
        write_trailer(&mut bytes, &trailer, xref_start);

        log::info!("Full save: {} objects, {} bytes", order.len(), bytes.len());
        Ok(bytes)
    }
}

/// Parse the `%PDF-M.m` header. Up to 1024 bytes of leading garbage are tolerated.
pub fn parse_header(data: &[u8]) -> Result<(u8, u8)> {
    let window = &data[..data.len().min(1024)];
    let start = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| Error::InvalidHeader("missing %PDF- header".to_string()))?;
    if start > 0 {
        log::warn!("{} bytes of garbage before PDF header", start);
    }

    let version = data
        .get(start + 5..start + 8)
        .ok_or_else(|| Error::InvalidHeader("file too short for PDF header".to_string()))?;
    match version {
        [major @ b'0'..=b'9', b'.', minor @ b'0'..=b'9'] => Ok((major - b'0', minor - b'0')),
        _ => Err(Error::InvalidHeader(format!(
            "invalid version '{}'",
            String::from_utf8_lossy(version)
        ))),
    }
}

fn collect_references(obj: &Object, out: &mut Vec<ObjectRef>) {
    match obj {
        Object::Reference(r) => out.push(*r),
        Object::Array(items) => items.iter().for_each(|item| collect_references(item, out)),
        Object::Dictionary(dict) | Object::Stream { dict, .. } => {
            // Sorted for a stable numbering
            let mut keys: Vec<&String> = dict.keys().collect();
            keys.sort();
            for key in keys {
                collect_references(&dict[key], out);
            }
        },
        _ => {},
    }
}

fn remap_references(obj: &mut Object, renumber: &HashMap<u32, u32>) {
    match obj {
        Object::Reference(r) => match renumber.get(&r.id) {
            Some(&id) => *r = ObjectRef::new(id, 0),
            None => *obj = Object::Null,
        },
        Object::Array(items) => items.iter_mut().for_each(|item| remap_references(item, renumber)),
        Object::Dictionary(dict) | Object::Stream { dict, .. } => {
            dict.values_mut().for_each(|value| remap_references(value, renumber));
        },
        _ => {},
    }
}

fn generate_file_id() -> Object {
    let id = uuid::Uuid::new_v4().as_bytes().to_vec();
    Object::Array(vec![Object::String(id.clone()), Object::String(id)])
}

/// Classic xref table with one subsection per contiguous run of object numbers.
fn write_xref_table(buf: &mut Vec<u8>, entries: &[(u32, usize, u16)], with_free_head: bool) {
    let mut entries = entries.to_vec();
    entries.sort_by_key(|(id, _, _)| *id);

    buf.extend_from_slice(b"xref\n");
    if with_free_head {
        buf.extend_from_slice(b"0 1\n0000000000 65535 f\r\n");
    }

    let mut i = 0;
    while i < entries.len() {
        let mut j = i + 1;
        while j < entries.len() && entries[j].0 == entries[j - 1].0 + 1 {
            j += 1;
        }
        buf.extend_from_slice(format!("{} {}\n", entries[i].0, j - i).as_bytes());
        for (_, offset, gen) in &entries[i..j] {
            buf.extend_from_slice(format!("{:010} {:05} n\r\n", offset, gen).as_bytes());
        }
        i = j;
    }
}

fn write_trailer(buf: &mut Vec<u8>, trailer: &Dict, xref_start: usize) {
    buf.extend_from_slice(b"trailer\n");
    buf.extend_from_slice(&ObjectSerializer::compact().serialize(&Object::Dictionary(trailer.clone())));
    buf.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_start).as_bytes());
}

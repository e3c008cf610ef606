//! ByteRange calculation for PDF signatures.
//!
//! PDF digital signatures use a ByteRange array to specify which portions
//! of the document are covered by the signature. The signature itself is
//! stored in a placeholder that is excluded from the signed bytes.
//!
//! ## ByteRange Format
//!
//! The ByteRange is an array of four integers:
//! `[offset1, length1, offset2, length2]`
//!
//! Where:
//! - `offset1` = 0 (start of file)
//! - `length1` = byte offset of the `<` opening the signature value
//! - `offset2` = byte offset just past the closing `>`
//! - `length2` = remaining bytes to end of file
//!
//! Both the `/ByteRange` array and the `/Contents` string are written with
//! fixed-width placeholders and patched in place, so no offset moves.

use crate::error::{Error, Result};
use crate::object::Object;
use std::ops::Range;

/// Digits of each placeholder ByteRange entry; large enough for any offset
const PLACEHOLDER_ENTRY: i64 = 9_999_999_999;

/// Calculator for PDF signature byte ranges.
#[derive(Debug)]
pub struct ByteRangeCalculator {
    /// Size of the placeholder for the signature value (hex digits + 2 for angle brackets)
    placeholder_size: usize,
}

impl ByteRangeCalculator {
    /// Create a calculator for a CMS blob of at most `reserve` bytes.
    ///
    /// The placeholder is `reserve * 2 + 2` bytes: hex-encoded and enclosed
    /// in angle brackets.
    pub fn new(reserve: usize) -> Self {
        Self {
            placeholder_size: reserve * 2 + 2,
        }
    }

    /// Get the placeholder size (for the /Contents value).
    pub fn placeholder_size(&self) -> usize {
        self.placeholder_size
    }

    /// `/Contents` placeholder object. Zero bytes are not printable, so the
    /// serializer writes it as a hex string of exactly [`Self::placeholder_size`] bytes.
    pub fn contents_placeholder(&self) -> Object {
        Object::String(vec![0; (self.placeholder_size - 2) / 2])
    }

    /// `/ByteRange` placeholder object, patched by [`Self::patch_byte_range`].
    pub fn byte_range_placeholder() -> Object {
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(PLACEHOLDER_ENTRY),
            Object::Integer(PLACEHOLDER_ENTRY),
            Object::Integer(PLACEHOLDER_ENTRY),
        ])
    }

    /// Calculate the ByteRange array given the position of the /Contents value.
    ///
    /// Returns `[0, before_sig, after_sig_start, after_sig_len]`.
    pub fn calculate_byte_range(&self, file_size: usize, contents_offset: usize) -> [i64; 4] {
        let before_sig = contents_offset as i64;
        let after_sig_start = (contents_offset + self.placeholder_size) as i64;
        let after_sig_len = file_size as i64 - after_sig_start;

        [0, before_sig, after_sig_start, after_sig_len]
    }

    /// Format a ByteRange array as a PDF array string.
    pub fn format_byte_range(byte_range: &[i64; 4]) -> String {
        format!("[{} {} {} {}]", byte_range[0], byte_range[1], byte_range[2], byte_range[3])
    }

    /// Overwrite the ByteRange placeholder inside `span`, padding with spaces.
    pub fn patch_byte_range(pdf_data: &mut [u8], span: Range<usize>, byte_range: &[i64; 4]) -> Result<()> {
        let placeholder = Self::format_byte_range(&[0, PLACEHOLDER_ENTRY, PLACEHOLDER_ENTRY, PLACEHOLDER_ENTRY]);
        let window = pdf_data
            .get(span.clone())
            .ok_or_else(|| Error::Internal("signature object span out of bounds".to_string()))?;
        let pos = window
            .windows(placeholder.len())
            .position(|w| w == placeholder.as_bytes())
            .ok_or_else(|| Error::Internal("ByteRange placeholder not found".to_string()))?;

        let actual = Self::format_byte_range(byte_range);
        if actual.len() > placeholder.len() {
            return Err(Error::Internal(format!("ByteRange {} does not fit its placeholder", actual)));
        }
        let start = span.start + pos;
        let target = &mut pdf_data[start..start + placeholder.len()];
        target.fill(b' ');
        target[..actual.len()].copy_from_slice(actual.as_bytes());
        Ok(())
    }

    /// Extract the bytes to be signed: the concatenation of both ranges.
    pub fn extract_signed_bytes(pdf_data: &[u8], byte_range: &[i64; 4]) -> Result<Vec<u8>> {
        let offset1 = byte_range[0] as usize;
        let length1 = byte_range[1] as usize;
        let offset2 = byte_range[2] as usize;
        let length2 = byte_range[3] as usize;

        if offset1 + length1 > pdf_data.len() {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range exceeds file size: {} + {} > {}",
                offset1,
                length1,
                pdf_data.len()
            )));
        }
        if offset2 + length2 > pdf_data.len() {
            return Err(Error::InvalidPdf(format!(
                "ByteRange second range exceeds file size: {} + {} > {}",
                offset2,
                length2,
                pdf_data.len()
            )));
        }

        let mut signed_bytes = Vec::with_capacity(length1 + length2);
        signed_bytes.extend_from_slice(&pdf_data[offset1..offset1 + length1]);
        signed_bytes.extend_from_slice(&pdf_data[offset2..offset2 + length2]);

        Ok(signed_bytes)
    }

    /// Check that a ByteRange covers the entire document except the signature.
    pub fn validate_byte_range(byte_range: &[i64; 4], file_size: usize) -> Result<()> {
        let [offset1, length1, offset2, length2] = *byte_range;

        if offset1 != 0 {
            return Err(Error::InvalidPdf(format!("ByteRange must start at 0, got {}", offset1)));
        }
        let expected_end = file_size as i64;
        let actual_end = offset2 + length2;
        if actual_end != expected_end {
            return Err(Error::InvalidPdf(format!(
                "ByteRange must end at file size {}, got {}",
                expected_end, actual_end
            )));
        }
        if length1 > offset2 {
            return Err(Error::InvalidPdf(format!(
                "ByteRange first range ({}) overlaps with second range start ({})",
                length1, offset2
            )));
        }
        Ok(())
    }

    /// Offset of the `<` opening the `/Contents` value within `span`.
    pub fn find_contents_offset(pdf_data: &[u8], span: Range<usize>) -> Option<usize> {
        let window = pdf_data.get(span.clone())?;
        let pattern = b"/Contents";
        let mut pos = 0;
        while pos + pattern.len() < window.len() {
            if window[pos..].starts_with(pattern) {
                for (i, &byte) in window.iter().enumerate().skip(pos + pattern.len()) {
                    if byte == b'<' {
                        return Some(span.start + i);
                    }
                    if !matches!(byte, b' ' | b'\t' | b'\n' | b'\r') {
                        break;
                    }
                }
            }
            pos += 1;
        }
        None
    }

    /// Write `signature_hex` into the placeholder, zero-padded.
    pub fn insert_signature(&self, pdf_data: &mut [u8], contents_offset: usize, signature_hex: &str) -> Result<()> {
        let sig_len = signature_hex.len() + 2;
        if sig_len > self.placeholder_size {
            return Err(Error::Internal(format!(
                "Signature ({} bytes) exceeds placeholder size ({} bytes)",
                sig_len, self.placeholder_size
            )));
        }
        if contents_offset + self.placeholder_size > pdf_data.len() {
            return Err(Error::Internal("Signature insertion would exceed file bounds".to_string()));
        }

        let mut sig_value = String::with_capacity(self.placeholder_size);
        sig_value.push('<');
        sig_value.push_str(signature_hex);
        sig_value.extend(std::iter::repeat('0').take(self.placeholder_size - sig_len));
        sig_value.push('>');

        pdf_data[contents_offset..contents_offset + self.placeholder_size].copy_from_slice(sig_value.as_bytes());
        Ok(())
    }
}

/// Read the `/ByteRange` of a signature dictionary.
pub fn read_byte_range(sig: &crate::object::Dict) -> Option<[i64; 4]> {
    let values: Vec<i64> = sig
        .get("ByteRange")?
        .as_array()?
        .iter()
        .map(Object::as_integer)
        .collect::<Option<_>>()?;
    values.try_into().ok()
}

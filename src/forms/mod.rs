//! Form field lifecycle.
//!
//! - [`extract_fields`] detects the fields of an uploaded template;
//! - [`create_master_pdf`] rebuilds the form from field placements, tagging
//!   each field with its owner (`/Assign`) and semantic type (`/FieldType`);
//! - [`apply_field_values`] writes submitted values and locks the fields;
//! - [`flatten_pdf`] burns the current values into page content.
//!
//! Every placed field is a text field whatever its semantic type. Toggle
//! semantics live in the `/FieldType` entry and in the value conversion.

pub mod appearance;
mod extract;
pub mod field_flags;
mod flatten;
mod master;
pub mod tree;
mod values;

#[cfg(test)]
pub(crate) use crate::test_support;

pub use extract::{extract_fields, extract_from_document};
pub use flatten::{flatten_document, flatten_pdf};
pub use master::create_master_pdf;
pub use values::apply_field_values;

use serde::{Deserialize, Serialize};

/// Semantic type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// Free text
    #[default]
    Text,
    /// Check box
    Checkbox,
    /// Radio button
    Radio,
}

impl FieldKind {
    /// Parse a type tag; anything unknown or absent is text.
    pub fn parse(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            Some(t) if t.eq_ignore_ascii_case("checkbox") => Self::Checkbox,
            Some(t) if t.eq_ignore_ascii_case("radio") => Self::Radio,
            _ => Self::Text,
        }
    }

    /// Lowercase tag stored in `/FieldType`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Checkbox => "checkbox",
            Self::Radio => "radio",
        }
    }

    /// Whether the field holds a logical on/off value.
    pub fn is_toggle(&self) -> bool {
        matches!(self, Self::Checkbox | Self::Radio)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field found in an uploaded document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedField {
    /// Unique name within the result
    pub field_name: String,
    /// Semantic type
    pub field_type: FieldKind,
    /// Page index, 0-based
    pub page: usize,
    /// Lower-left x in points
    pub x: f64,
    /// Lower-left y in points
    pub y: f64,
    /// Width in points
    pub width: f64,
    /// Height in points
    pub height: f64,
    /// Radio group name
    pub group_name: Option<String>,
}

/// Where to create a field in the master document, and who owns it.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlacement {
    /// Field name, unique within the document
    pub field_name: String,
    /// Owning signer id
    pub assigned_to: String,
    /// Semantic type
    pub field_type: FieldKind,
    /// Page index, 0-based
    pub page: usize,
    /// Lower-left x in points
    pub x: f64,
    /// Lower-left y in points
    pub y: f64,
    /// Width in points
    pub width: f64,
    /// Height in points
    pub height: f64,
}

/// A value to write into a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValue {
    /// Fully qualified field name
    pub field_name: String,
    /// Raw value; "true"/"false" for toggles
    pub value: String,
}

impl FieldValue {
    /// Create a field value.
    pub fn new(field_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            value: value.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_kind_parse() {
        assert_eq!(FieldKind::parse(None), FieldKind::Text);
        assert_eq!(FieldKind::parse(Some("checkbox")), FieldKind::Checkbox);
        assert_eq!(FieldKind::parse(Some("Radio")), FieldKind::Radio);
        assert_eq!(FieldKind::parse(Some("signature")), FieldKind::Text);
    }

    #[test]
    fn test_field_kind_serde() {
        assert_eq!(serde_json::to_string(&FieldKind::Checkbox).unwrap(), "\"checkbox\"");
        let kind: FieldKind = serde_json::from_str("\"radio\"").unwrap();
        assert!(kind.is_toggle());
    }

    #[test]
    fn test_detected_field_camel_case() {
        let field = DetectedField {
            field_name: "a".to_string(),
            field_type: FieldKind::Text,
            page: 0,
            x: 1.0,
            y: 2.0,
            width: 3.0,
            height: 4.0,
            group_name: None,
        };
        let json = serde_json::to_value(&field).unwrap();
        assert!(json.get("fieldName").is_some());
        assert!(json.get("groupName").unwrap().is_null());
    }
}

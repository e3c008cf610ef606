//! Appearance stream generation.
//!
//! An appearance stream is a Form XObject (ISO 32000-1 §8.10) whose
//! bounding box matches its widget. Field values and signature widgets are
//! both drawn this way, and flattening paints the same XObjects onto pages.

use crate::error::Result;
use crate::fonts::StandardFont;
use crate::object::{Dict, Object};
use crate::writer::ContentStreamBuilder;
use bytes::Bytes;
use std::io::Write;

/// Builder for Form XObject appearance streams.
#[derive(Debug, Clone)]
pub struct AppearanceStreamBuilder {
    /// Bounding box width
    width: f64,
    /// Bounding box height
    height: f64,
    /// Content stream bytes
    content: Vec<u8>,
    /// Font resources by resource name
    fonts: Dict,
    /// Whether to Flate-compress the content
    compress: bool,
}

impl AppearanceStreamBuilder {
    /// Create a builder for a `width` x `height` box at the origin.
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(0.0),
            height: height.max(0.0),
            content: Vec::new(),
            fonts: Dict::new(),
            compress: false,
        }
    }

    /// Use the content of a built content stream.
    pub fn with_content(mut self, builder: &ContentStreamBuilder) -> Result<Self> {
        self.content = builder.build()?;
        Ok(self)
    }

    /// Register a standard font under a resource name.
    pub fn with_font(mut self, resource_name: &str, font: StandardFont) -> Self {
        self.fonts.insert(resource_name.to_string(), font.font_dict());
        self
    }

    /// Register an existing font object (usually a reference) under a resource name.
    pub fn with_font_object(mut self, resource_name: &str, font: Object) -> Self {
        self.fonts.insert(resource_name.to_string(), font);
        self
    }

    /// Enable Flate compression of the content.
    pub fn compressed(mut self) -> Self {
        self.compress = true;
        self
    }

    /// Bounding box width.
    pub fn width(&self) -> f64 {
        self.width
    }

    /// Bounding box height.
    pub fn height(&self) -> f64 {
        self.height
    }

    /// Build the Form XObject stream.
    pub fn build(&self) -> Result<Object> {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::name("XObject"));
        dict.insert("Subtype".to_string(), Object::name("Form"));
        dict.insert("FormType".to_string(), Object::Integer(1));
        dict.insert("BBox".to_string(), Object::rect(0.0, 0.0, self.width, self.height));

        let mut resources = Dict::new();
        if !self.fonts.is_empty() {
            resources.insert("Font".to_string(), Object::Dictionary(self.fonts.clone()));
        }
        dict.insert("Resources".to_string(), Object::Dictionary(resources));

        let data = if self.compress {
            dict.insert("Filter".to_string(), Object::name("FlateDecode"));
            compress_data(&self.content)?
        } else {
            self.content.clone()
        };

        Ok(Object::Stream {
            dict,
            data: Bytes::from(data),
        })
    }
}

/// Compress data using Flate/Deflate compression.
pub fn compress_data(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::write::ZlibEncoder;
    use flate2::Compression;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

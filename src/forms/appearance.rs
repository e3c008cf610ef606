//! Text field appearance generation.
//!
//! A field's `/DA` string selects the font and color (ISO 32000-1
//! §12.7.3.3). The value is drawn as a single line, vertically centred,
//! inside a 2pt padding. A font size of 0 means auto size.

use crate::document::PdfDocument;
use crate::error::Result;
use crate::fonts::StandardFont;
use crate::forms::tree::acroform;
use crate::object::Object;
use crate::writer::{format_real, AppearanceStreamBuilder, ContentStreamBuilder, ContentStreamOp};

/// Inner padding between the widget border and the text
const PADDING: f64 = 2.0;

/// Auto size never goes below this
const MIN_AUTO_SIZE: f64 = 2.0;

/// Auto size never goes above this
const MAX_AUTO_SIZE: f64 = 12.0;

/// Fill color operator from a `/DA` string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DaColor {
    /// `g`
    Gray(f64),
    /// `rg`
    Rgb(f64, f64, f64),
    /// `k`
    Cmyk(f64, f64, f64, f64),
}

/// Parsed default appearance string.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultAppearance {
    /// Font resource name, without the slash
    pub font_name: String,
    /// Font size; 0 means auto
    pub font_size: f64,
    /// Fill color
    pub color: DaColor,
}

impl Default for DefaultAppearance {
    fn default() -> Self {
        Self {
            font_name: "Helv".to_string(),
            font_size: 0.0,
            color: DaColor::Gray(0.0),
        }
    }
}

impl DefaultAppearance {
    /// Parse a `/DA` string. Unknown operators are ignored and missing
    /// parts keep their defaults.
    pub fn parse(da: &str) -> Self {
        let mut result = Self::default();
        let mut operands: Vec<&str> = Vec::new();
        for token in da.split_whitespace() {
            let num = |i: usize| -> Option<f64> {
                operands.len().checked_sub(i).and_then(|idx| operands[idx].parse().ok())
            };
            match token {
                "Tf" => {
                    if let (Some(name), Some(size)) =
                        (operands.len().checked_sub(2).map(|i| operands[i]), num(1))
                    {
                        result.font_name = name.trim_start_matches('/').to_string();
                        result.font_size = size;
                    }
                    operands.clear();
                },
                "g" => {
                    if let Some(g) = num(1) {
                        result.color = DaColor::Gray(g);
                    }
                    operands.clear();
                },
                "rg" => {
                    if let (Some(r), Some(g), Some(b)) = (num(3), num(2), num(1)) {
                        result.color = DaColor::Rgb(r, g, b);
                    }
                    operands.clear();
                },
                "k" => {
                    if let (Some(c), Some(m), Some(y), Some(k)) = (num(4), num(3), num(2), num(1)) {
                        result.color = DaColor::Cmyk(c, m, y, k);
                    }
                    operands.clear();
                },
                t if t.chars().all(|c| c.is_ascii_alphabetic() || c == '*' || c == '\'' || c == '"') => {
                    operands.clear();
                },
                operand => operands.push(operand),
            }
        }
        result
    }

    fn color_op(&self) -> ContentStreamOp {
        match self.color {
            DaColor::Gray(g) => ContentStreamOp::SetFillColorGray(g),
            DaColor::Rgb(r, g, b) => ContentStreamOp::SetFillColorRGB(r, g, b),
            DaColor::Cmyk(c, m, y, k) => ContentStreamOp::Raw(
                format!(
                    "{} {} {} {} k",
                    format_real(c),
                    format_real(m),
                    format_real(y),
                    format_real(k)
                )
                .into_bytes(),
            ),
        }
    }
}

/// Font size that fits `text` in a `width` x `height` box.
pub fn auto_font_size(text: &str, font: StandardFont, width: f64, height: f64) -> f64 {
    let em = (font.ascender() - font.descender()) / 1000.0;
    let by_height = (height - 2.0 * PADDING) / em;
    let unit_width = font.text_width(text, 1.0);
    let by_width = if unit_width > 0.0 {
        (width - 2.0 * PADDING) / unit_width
    } else {
        f64::MAX
    };
    by_height.min(by_width).clamp(MIN_AUTO_SIZE, MAX_AUTO_SIZE)
}

/// Build the normal appearance of a text field showing `value`.
pub fn text_field_appearance(
    doc: &PdfDocument,
    value: &str,
    da: Option<&str>,
    width: f64,
    height: f64,
) -> Result<Object> {
    let da = da.map(DefaultAppearance::parse).unwrap_or_default();
    let (font_object, metrics) = resolve_font(doc, &da.font_name);
    let size = if da.font_size > 0.0 {
        da.font_size
    } else {
        auto_font_size(value, metrics, width, height)
    };
    let descent = metrics.descender() * size / 1000.0;
    let line_height = (metrics.ascender() - metrics.descender()) * size / 1000.0;
    let baseline = (height - line_height) / 2.0 - descent;

    let mut content = ContentStreamBuilder::new();
    content
        .op(ContentStreamOp::BeginMarkedContent("Tx".to_string()))
        .save_state()
        .clip_rect(1.0, 1.0, (width - 2.0).max(0.0), (height - 2.0).max(0.0));
    if !value.is_empty() {
        content
            .begin_text()
            .set_font(&da.font_name, size)
            .op(da.color_op())
            .text(value, PADDING, baseline)
            .end_text();
    }
    content
        .restore_state()
        .op(ContentStreamOp::EndMarkedContent);

    let builder = AppearanceStreamBuilder::new(width, height).with_content(&content)?;
    let builder = match font_object {
        Some(font) => builder.with_font_object(&da.font_name, font),
        None => builder.with_font(&da.font_name, metrics),
    };
    builder.build()
}

/// Font object from the form's `/DR` and the metrics to lay it out with.
fn resolve_font(doc: &PdfDocument, name: &str) -> (Option<Object>, StandardFont) {
    let entry = acroform(doc)
        .and_then(|form| form.get("DR"))
        .and_then(|dr| doc.resolve_dict(dr))
        .and_then(|dr| dr.get("Font"))
        .and_then(|fonts| doc.resolve_dict(fonts))
        .and_then(|fonts| fonts.get(name))
        .cloned();
    let bold = entry
        .as_ref()
        .and_then(|f| doc.resolve_dict(f))
        .and_then(|f| f.get("BaseFont"))
        .and_then(Object::as_name)
        .is_some_and(|base| base.contains("Bold"));
    let metrics = if bold {
        StandardFont::HelveticaBold
    } else {
        StandardFont::Helvetica
    };
    (entry, metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::form_document;

    #[test]
    fn test_parse_da() {
        let da = DefaultAppearance::parse("/Helv 10 Tf 0 g");
        assert_eq!(da.font_name, "Helv");
        assert_eq!(da.font_size, 10.0);
        assert_eq!(da.color, DaColor::Gray(0.0));

        let da = DefaultAppearance::parse("0.2 0.4 0.6 rg /F1 0 Tf");
        assert_eq!(da.font_name, "F1");
        assert_eq!(da.font_size, 0.0);
        assert_eq!(da.color, DaColor::Rgb(0.2, 0.4, 0.6));
    }

    #[test]
    fn test_parse_da_garbage_keeps_defaults() {
        assert_eq!(DefaultAppearance::parse("nonsense Tf"), DefaultAppearance::default());
    }

    #[test]
    fn test_auto_size_bounds() {
        let tiny = auto_font_size("a very long value that will not fit", StandardFont::Helvetica, 20.0, 20.0);
        assert_eq!(tiny, MIN_AUTO_SIZE);
        let big = auto_font_size("x", StandardFont::Helvetica, 400.0, 100.0);
        assert_eq!(big, MAX_AUTO_SIZE);
    }

    #[test]
    fn test_text_appearance_content() {
        let doc = form_document("<< /T (a) /FT /Tx >>", &[]);
        let ap = text_field_appearance(&doc, "Jean", Some("/Helv 10 Tf 0 g"), 100.0, 20.0).unwrap();
        let Object::Stream { dict, data } = &ap else {
            panic!("expected a stream");
        };
        let text = String::from_utf8_lossy(data);
        assert!(text.starts_with("/Tx BMC"));
        assert!(text.contains("/Helv 10 Tf"));
        assert!(text.contains("(Jean) Tj"));
        let fonts = dict["Resources"].as_dict().unwrap()["Font"].as_dict().unwrap();
        assert!(fonts.contains_key("Helv"));
    }

    #[test]
    fn test_empty_value_has_no_text() {
        let doc = form_document("<< /T (a) /FT /Tx >>", &[]);
        let ap = text_field_appearance(&doc, "", None, 50.0, 12.0).unwrap();
        let Object::Stream { data, .. } = &ap else {
            panic!("expected a stream");
        };
        assert!(!String::from_utf8_lossy(data).contains("Tj"));
    }
}

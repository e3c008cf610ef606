//! Visible signature appearance.

use crate::error::Result;
use crate::fonts::StandardFont;
use crate::object::Object;
use crate::writer::{AppearanceStreamBuilder, ContentStreamBuilder};
use chrono::{DateTime, TimeZone};

const BACKGROUND: (f64, f64, f64) = (0.93, 0.95, 0.98);
const ACCENT: (f64, f64, f64) = (0.25, 0.41, 0.68);
const NAME_COLOR: (f64, f64, f64) = (0.15, 0.25, 0.50);
const CAPTION_GRAY: f64 = 0.5;
const ACCENT_WIDTH: f64 = 4.0;
const BORDER_WIDTH: f64 = 0.8;
const TEXT_X: f64 = 8.0;

/// Build the Form XObject drawn in a visible signature widget: a tinted
/// box with an accent bar, the caption, the signer name and the date.
pub fn signature_appearance<Tz: TimeZone>(
    width: f64,
    height: f64,
    label: &str,
    signer_name: &str,
    signed_at: &DateTime<Tz>,
) -> Result<Object>
where
    Tz::Offset: std::fmt::Display,
{
    let date = signed_at.format("%d/%m/%Y %H:%M").to_string();
    let half = BORDER_WIDTH / 2.0;

    let mut content = ContentStreamBuilder::new();
    content
        .save_state()
        .set_fill_color(BACKGROUND.0, BACKGROUND.1, BACKGROUND.2)
        .rect(0.0, 0.0, width, height)
        .fill()
        .set_fill_color(ACCENT.0, ACCENT.1, ACCENT.2)
        .rect(0.0, 0.0, ACCENT_WIDTH, height)
        .fill()
        .set_stroke_color(ACCENT.0, ACCENT.1, ACCENT.2)
        .set_line_width(BORDER_WIDTH)
        .rect(half, half, width - BORDER_WIDTH, height - BORDER_WIDTH)
        .stroke()
        .begin_text()
        .set_fill_gray(CAPTION_GRAY)
        .set_font("Helv", 7.0)
        .text(label, TEXT_X, height - 14.0)
        .set_fill_color(NAME_COLOR.0, NAME_COLOR.1, NAME_COLOR.2)
        .set_font("HeBo", 10.0)
        .text(signer_name, TEXT_X, height - 27.0)
        .set_fill_gray(CAPTION_GRAY)
        .set_font("Helv", 7.0)
        .text(&date, TEXT_X, 7.0)
        .end_text()
        .restore_state();

    AppearanceStreamBuilder::new(width, height)
        .with_content(&content)?
        .with_font("Helv", StandardFont::Helvetica)
        .with_font("HeBo", StandardFont::HelveticaBold)
        .compressed()
        .build()
}

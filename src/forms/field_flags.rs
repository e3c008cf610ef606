//! Field and annotation flags.
//!
//! Field flags per ISO 32000-1:2008 §12.7.3 (tables 221, 226 and 228) and
//! annotation flags per §12.5.3.

use bitflags::bitflags;

bitflags! {
    /// `/Ff` bits the form engine reads or writes.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FieldFlags: u32 {
        /// Bit 1: Field is read-only; user cannot change the value
        const READ_ONLY = 1 << 0;
        /// Bit 2: Field is required
        const REQUIRED = 1 << 1;
        /// Bit 3: Field should not be exported
        const NO_EXPORT = 1 << 2;
        /// Bit 13: (text) Multiple lines
        const MULTILINE = 1 << 12;
        /// Bit 14: (text) Password entry
        const PASSWORD = 1 << 13;
        /// Bit 15: (button) No toggle to off
        const NO_TOGGLE_TO_OFF = 1 << 14;
        /// Bit 16: (button) Radio button
        const RADIO = 1 << 15;
        /// Bit 17: (button) Push button
        const PUSHBUTTON = 1 << 16;
        /// Bit 25: (text) Comb field
        const COMB = 1 << 24;
    }
}

bitflags! {
    /// Annotation `/F` bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AnnotationFlags: u32 {
        /// Bit 1: Invisible
        const INVISIBLE = 1 << 0;
        /// Bit 2: Hidden
        const HIDDEN = 1 << 1;
        /// Bit 3: Print
        const PRINT = 1 << 2;
        /// Bit 8: Locked
        const LOCKED = 1 << 7;
    }
}

impl FieldFlags {
    /// Read flags from an `/Ff` value, keeping unknown bits.
    pub fn from_value(value: i64) -> Self {
        Self::from_bits_retain(value as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_flags_bits() {
        assert_eq!(FieldFlags::READ_ONLY.bits(), 1);
        assert_eq!(FieldFlags::RADIO.bits(), 1 << 15);
        assert_eq!(FieldFlags::PUSHBUTTON.bits(), 1 << 16);
    }

    #[test]
    fn test_unknown_bits_retained() {
        let flags = FieldFlags::from_value((1 << 22) | 1);
        assert!(flags.contains(FieldFlags::READ_ONLY));
        assert_eq!(flags.bits(), (1 << 22) | 1);
    }

    #[test]
    fn test_signature_widget_flags() {
        let flags = AnnotationFlags::PRINT | AnnotationFlags::LOCKED;
        assert_eq!(flags.bits(), 132);
    }
}

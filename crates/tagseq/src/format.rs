//! Formatting and parsing of human-readable asset tags.
//!
//! A tag is a fixed prefix followed by the sequence number, left-padded with
//! zeros to at least `zero_padding` digits:
//!
//! ```
//! use tagseq::format_identifier;
//!
//! assert_eq!(format_identifier("RT-LTP-", 1, 2), "RT-LTP-01");
//! assert_eq!(format_identifier("RT-LTP-", 123, 2), "RT-LTP-123");
//! ```
//!
//! Every component that produces or inspects a tag goes through this module so
//! that padding rules cannot drift between call sites.

/// Formats `number` behind `prefix`, zero-padded to at least `zero_padding`
/// digits. A padding of zero is treated as one. Numbers wider than the padding
/// are never truncated.
pub fn format_identifier(prefix: &str, number: u64, zero_padding: u32) -> String {
    let width = zero_padding.max(1) as usize;
    format!("{prefix}{number:0width$}")
}

/// Recovers the sequence number from a tag produced by [`format_identifier`]
/// with the same `prefix` and `zero_padding`.
///
/// Returns `None` if the prefix does not match, the remainder is not made of
/// ASCII digits, is narrower than the padding, or carries a leading zero that
/// the formatter would not have written.
pub fn parse_identifier(prefix: &str, zero_padding: u32, identifier: &str) -> Option<u64> {
    let digits = identifier.strip_prefix(prefix)?;
    let width = zero_padding.max(1) as usize;

    if digits.len() < width || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > width && digits.starts_with('0') {
        return None;
    }

    digits.parse().ok()
}

/// A borrowed view over a prefix and padding pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TagFormat<'a> {
    prefix: &'a str,
    zero_padding: u32,
}

impl<'a> TagFormat<'a> {
    pub const fn new(prefix: &'a str, zero_padding: u32) -> Self {
        Self {
            prefix,
            zero_padding,
        }
    }

    pub const fn prefix(&self) -> &'a str {
        self.prefix
    }

    pub const fn zero_padding(&self) -> u32 {
        self.zero_padding
    }

    pub fn format(&self, number: u64) -> String {
        format_identifier(self.prefix, number, self.zero_padding)
    }

    pub fn parse(&self, identifier: &str) -> Option<u64> {
        parse_identifier(self.prefix, self.zero_padding, identifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_to_requested_width() {
        assert_eq!(format_identifier("RT-LTP-", 1, 2), "RT-LTP-01");
        assert_eq!(format_identifier("RT-LTP-", 7, 4), "RT-LTP-0007");
        assert_eq!(format_identifier("", 42, 3), "042");
    }

    #[test]
    fn never_truncates_wide_numbers() {
        assert_eq!(format_identifier("A", 12345, 2), "A12345");
        assert_eq!(format_identifier("A", u64::MAX, 1), format!("A{}", u64::MAX));
    }

    #[test]
    fn zero_padding_is_clamped_to_one() {
        assert_eq!(format_identifier("A-", 0, 0), "A-0");
        assert_eq!(parse_identifier("A-", 0, "A-0"), Some(0));
    }

    #[test]
    fn parse_inverts_format() {
        let format = TagFormat::new("RT-LTP-", 2);
        for number in [0, 1, 9, 10, 99, 100, 4096, u64::MAX] {
            let id = format.format(number);
            assert_eq!(format.parse(&id), Some(number));
            assert_eq!(format.format(format.parse(&id).unwrap()), id);
        }
    }

    #[test]
    fn parse_rejects_foreign_identifiers() {
        let format = TagFormat::new("RT-LTP-", 3);
        assert_eq!(format.parse("RT-DSK-001"), None);
        assert_eq!(format.parse("RT-LTP-01"), None);
        assert_eq!(format.parse("RT-LTP-0a1"), None);
        assert_eq!(format.parse("RT-LTP-+01"), None);
        assert_eq!(format.parse("RT-LTP-01234"), None);
        assert_eq!(format.parse("RT-LTP-"), None);
    }
}

//! Hex dump of report bytes for the debug console.

use core::fmt;

/// Formats a byte slice as lower-case hex pairs, each followed by a space.
///
/// ```
/// use hid_proxy_core::HexDump;
///
/// let mut out = heapless::String::<32>::new();
/// core::fmt::write(&mut out, format_args!("{}", HexDump(&[0x00, 0x0a, 0xff]))).unwrap();
/// assert_eq!(out.as_str(), "00 0a ff ");
/// ```
#[derive(Clone, Copy)]
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02x} ", byte)?;
        }
        Ok(())
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for HexDump<'_> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=[u8]:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::format;

    #[test]
    fn test_empty() {
        assert_eq!(format!("{}", HexDump(&[])), "");
    }

    #[test]
    fn test_keyboard_report() {
        let report = [0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert_eq!(
            format!("{}", HexDump(&report)),
            "02 00 04 00 00 00 00 00 "
        );
    }

    #[test]
    fn test_lower_case() {
        assert_eq!(format!("{}", HexDump(&[0xAB, 0xCD])), "ab cd ");
    }
}

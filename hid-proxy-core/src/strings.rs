//! String table and UTF-16 string descriptor encoding.

use crate::descriptor::desc_type;
use heapless::String;

/// Supported language: English (United States).
pub const LANGID_EN_US: u16 = 0x0409;

/// Maximum number of UTF-16 code units in one string descriptor.
pub const MAX_STRING_CHARS: usize = 31;

/// Strings presented to the PC, indexed as in the device descriptor.
///
/// | Index | Content |
/// |-------|---------|
/// | 0 | Language ID (0x0409) |
/// | 1 | Manufacturer |
/// | 2 | Product |
/// | 3 | Serial number |
/// | 4 | CDC interface |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringTable<'a> {
    pub manufacturer: &'a str,
    pub product: &'a str,
    pub serial: &'a str,
    pub cdc_interface: &'a str,
}

impl<'a> StringTable<'a> {
    /// Table used when no chip ID is available.
    pub const DEFAULT: StringTable<'static> = StringTable {
        manufacturer: "TinyUSB",
        product: "HID-Proxy",
        serial: "914784",
        cdc_interface: "TinyUSB CDC",
    };

    /// Number of entries, including the language ID at index 0.
    pub const LEN: u8 = 5;

    /// Same table with another serial number.
    #[must_use]
    pub const fn with_serial<'b>(self, serial: &'b str) -> StringTable<'b>
    where
        'a: 'b,
    {
        StringTable {
            manufacturer: self.manufacturer,
            product: self.product,
            serial,
            cdc_interface: self.cdc_interface,
        }
    }

    /// Look up a text entry. Index 0 is the language ID, not text.
    #[must_use]
    pub fn get(&self, index: u8) -> Option<&'a str> {
        match index {
            1 => Some(self.manufacturer),
            2 => Some(self.product),
            3 => Some(self.serial),
            4 => Some(self.cdc_interface),
            _ => None,
        }
    }
}

impl Default for StringTable<'static> {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Scratch buffer a string descriptor is encoded into.
///
/// Word 0 carries the descriptor header (`bDescriptorType << 8 | bLength`);
/// the following words are the UTF-16 payload.
#[derive(Debug, Clone)]
pub struct StringDescriptorBuffer {
    words: [u16; MAX_STRING_CHARS + 1],
}

impl StringDescriptorBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            words: [0; MAX_STRING_CHARS + 1],
        }
    }

    /// Encode entry `index` of `table`.
    ///
    /// Text longer than [`MAX_STRING_CHARS`] code units is truncated.
    /// Returns `None` when the index is past the table.
    pub fn encode(&mut self, table: &StringTable<'_>, index: u8) -> Option<&[u16]> {
        let count = if index == 0 {
            self.words[1] = LANGID_EN_US;
            1
        } else {
            let text = table.get(index)?;
            let mut count = 0;
            for (slot, unit) in self.words[1..]
                .iter_mut()
                .zip(text.encode_utf16().take(MAX_STRING_CHARS))
            {
                *slot = unit;
                count += 1;
            }
            count
        };

        // First byte is the total length in bytes, second the string type
        self.words[0] = (u16::from(desc_type::STRING) << 8) | (2 * count as u16 + 2);
        Some(&self.words[..=count])
    }
}

impl Default for StringDescriptorBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a chip unique ID as upper-case hex, for use as the serial number.
#[must_use]
pub fn serial_from_unique_id(id: &[u8; 8]) -> String<16> {
    const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

    let mut serial = String::new();
    for byte in id {
        // Capacity is exactly two digits per byte
        let _ = serial.push(HEX_DIGITS[(byte >> 4) as usize] as char);
        let _ = serial.push(HEX_DIGITS[(byte & 0xF) as usize] as char);
    }
    serial
}

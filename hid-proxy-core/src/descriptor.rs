//! USB descriptor tables served to the PC.
//!
//! The tables are built at compile time. Every length field inside them is
//! derived from the size of the table it describes, so the layout stays
//! consistent when a sub-descriptor changes.

use crate::config::{
    CDC_EP_BUFSIZE, CDC_NOTIF_EP_SIZE, CDC_NOTIF_POLL_MS, EP0_SIZE, EPNUM_CDC_IN, EPNUM_CDC_NOTIF, EPNUM_CDC_OUT,
    EPNUM_HID, HID_EP_BUFSIZE, HID_POLL_MS, USB_BCD_DEVICE, USB_MAX_POWER_MA, USB_PID, USB_VID,
};
use crate::strings::{StringDescriptorBuffer, StringTable};

/// Descriptor type codes.
pub mod desc_type {
    pub const DEVICE: u8 = 0x01;
    pub const CONFIGURATION: u8 = 0x02;
    pub const STRING: u8 = 0x03;
    pub const INTERFACE: u8 = 0x04;
    pub const ENDPOINT: u8 = 0x05;
    pub const INTERFACE_ASSOCIATION: u8 = 0x0B;
    pub const HID: u8 = 0x21;
    pub const HID_REPORT: u8 = 0x22;
    pub const CS_INTERFACE: u8 = 0x24;
}

/// Class codes used by the descriptors.
pub mod class {
    pub const CDC: u8 = 0x02;
    pub const HID: u8 = 0x03;
    pub const CDC_DATA: u8 = 0x0A;
    pub const MISC: u8 = 0xEF;

    /// Misc subclass "common class".
    pub const MISC_SUBCLASS_COMMON: u8 = 0x02;
    /// Misc protocol "interface association descriptor".
    pub const MISC_PROTOCOL_IAD: u8 = 0x01;

    pub const CDC_SUBCLASS_ACM: u8 = 0x02;
    pub const CDC_PROTOCOL_NONE: u8 = 0x00;

    pub const HID_SUBCLASS_NONE: u8 = 0x00;
    pub const HID_PROTOCOL_NONE: u8 = 0x00;
}

const XFER_BULK: u8 = 0x02;
const XFER_INTERRUPT: u8 = 0x03;

/// `bmAttributes` bit that must always be set.
const CONFIG_ATT_RESERVED: u8 = 0x80;
/// `bmAttributes` remote wake-up bit.
pub const CONFIG_ATT_REMOTE_WAKEUP: u8 = 0x20;

/// Number of interfaces: CDC control, CDC data, HID.
pub const INTERFACE_COUNT: u8 = 3;

/// Interface numbers.
pub const ITF_CDC_CONTROL: u8 = 0;
pub const ITF_CDC_DATA: u8 = 1;
pub const ITF_HID: u8 = 2;

/// String index of the CDC control interface.
pub const CDC_STRING_INDEX: u8 = 4;

#[inline]
const fn lo(v: u16) -> u8 {
    v.to_le_bytes()[0]
}

#[inline]
const fn hi(v: u16) -> u8 {
    v.to_le_bytes()[1]
}

/// Device descriptor.
///
/// The device class is Misc/Common/IAD so that hosts bind the CDC function
/// through its interface association descriptor.
pub const DEVICE_DESCRIPTOR: [u8; 18] = [
    18,                       // bLength
    desc_type::DEVICE,        // bDescriptorType
    0x00,                     // bcdUSB (2.00)
    0x02,                     //
    class::MISC,              // bDeviceClass
    class::MISC_SUBCLASS_COMMON,
    class::MISC_PROTOCOL_IAD,
    EP0_SIZE,                 // bMaxPacketSize0
    lo(USB_VID),
    hi(USB_VID),
    lo(USB_PID),
    hi(USB_PID),
    lo(USB_BCD_DEVICE),
    hi(USB_BCD_DEVICE),
    0x01, // iManufacturer
    0x02, // iProduct
    0x03, // iSerialNumber
    0x01, // bNumConfigurations
];

/// Boot-compatible keyboard report descriptor (no report ID).
///
/// Input report: modifiers (1 byte), reserved (1 byte), six key codes.
/// Output report: five LED bits padded to one byte.
pub const HID_REPORT_DESCRIPTOR: [u8; 65] = [
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xA1, 0x01, // Collection (Application)
    //
    // --- Modifier keys ---
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0xE0, //   Usage Minimum (Left Control)
    0x29, 0xE7, //   Usage Maximum (Right GUI)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x95, 0x08, //   Report Count (8)
    0x75, 0x01, //   Report Size (1)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    //
    // --- Reserved byte ---
    0x95, 0x01, //   Report Count (1)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x01, //   Input (Constant)
    //
    // --- LEDs: Num, Caps, Scroll, Compose, Kana ---
    0x05, 0x08, //   Usage Page (LEDs)
    0x19, 0x01, //   Usage Minimum (1)
    0x29, 0x05, //   Usage Maximum (5)
    0x95, 0x05, //   Report Count (5)
    0x75, 0x01, //   Report Size (1)
    0x91, 0x02, //   Output (Data, Variable, Absolute)
    0x95, 0x01, //   Report Count (1)
    0x75, 0x03, //   Report Size (3)
    0x91, 0x01, //   Output (Constant)
    //
    // --- Key codes ---
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0x00, //   Usage Minimum (0)
    0x2A, 0xFF, 0x00, //   Usage Maximum (255)
    0x15, 0x00, //   Logical Minimum (0)
    0x26, 0xFF, 0x00, //   Logical Maximum (255)
    0x95, 0x06, //   Report Count (6)
    0x75, 0x08, //   Report Size (8)
    0x81, 0x00, //   Input (Data, Array, Absolute)
    //
    0xC0, // End Collection
];

/// Length of the configuration descriptor header.
pub const CONFIG_DESC_LEN: usize = 9;
/// Length of the CDC-ACM function (IAD + two interfaces + endpoints).
pub const CDC_DESC_LEN: usize = 66;
/// Length of the HID function (interface + HID class + endpoint).
pub const HID_DESC_LEN: usize = 25;
/// Total length of the configuration descriptor.
pub const CONFIG_TOTAL_LEN: usize = CONFIG_DESC_LEN + CDC_DESC_LEN + HID_DESC_LEN;

const CONFIG_TOTAL_LEN_U16: u16 = CONFIG_TOTAL_LEN as u16;
const HID_REPORT_LEN_U16: u16 = HID_REPORT_DESCRIPTOR.len() as u16;

/// Copy `parts` back to back into one table; the sizes must add up to `N`.
const fn concat<const N: usize>(parts: &[&[u8]]) -> [u8; N] {
    let mut out = [0u8; N];
    let mut pos = 0;
    let mut p = 0;
    while p < parts.len() {
        let part = parts[p];
        let mut i = 0;
        while i < part.len() {
            out[pos] = part[i];
            pos += 1;
            i += 1;
        }
        p += 1;
    }
    assert!(pos == N, "descriptor parts do not fill the table");
    out
}

const fn endpoint(address: u8, xfer: u8, max_packet: u16, interval: u8) -> [u8; 7] {
    [
        7,
        desc_type::ENDPOINT,
        address,
        xfer,
        lo(max_packet),
        hi(max_packet),
        interval,
    ]
}

/// Configuration header.
pub const CONFIG_HEADER: [u8; CONFIG_DESC_LEN] = [
    9,
    desc_type::CONFIGURATION,
    lo(CONFIG_TOTAL_LEN_U16),
    hi(CONFIG_TOTAL_LEN_U16),
    INTERFACE_COUNT,
    1, // bConfigurationValue
    0, // iConfiguration
    CONFIG_ATT_RESERVED | CONFIG_ATT_REMOTE_WAKEUP,
    (USB_MAX_POWER_MA / 2) as u8,
];

/// CDC interface association.
pub const CDC_IAD: [u8; 8] = [
    8,
    desc_type::INTERFACE_ASSOCIATION,
    ITF_CDC_CONTROL,
    2, // bInterfaceCount
    class::CDC,
    class::CDC_SUBCLASS_ACM,
    class::CDC_PROTOCOL_NONE,
    0,
];

/// CDC control interface.
pub const CDC_CONTROL_INTERFACE: [u8; 9] = [
    9,
    desc_type::INTERFACE,
    ITF_CDC_CONTROL,
    0, // bAlternateSetting
    1, // bNumEndpoints
    class::CDC,
    class::CDC_SUBCLASS_ACM,
    class::CDC_PROTOCOL_NONE,
    CDC_STRING_INDEX,
];

/// Header functional descriptor, CDC 1.20.
pub const CDC_HEADER_FUNC: [u8; 5] = [5, desc_type::CS_INTERFACE, 0x00, 0x20, 0x01];

/// Call management functional descriptor: no call management, data on the
/// data interface.
pub const CDC_CALL_MANAGEMENT_FUNC: [u8; 5] =
    [5, desc_type::CS_INTERFACE, 0x01, 0x00, ITF_CDC_DATA];

/// Abstract control management: line coding and send break.
pub const CDC_ACM_FUNC: [u8; 4] = [4, desc_type::CS_INTERFACE, 0x02, 0x06];

/// Union functional descriptor.
pub const CDC_UNION_FUNC: [u8; 5] = [
    5,
    desc_type::CS_INTERFACE,
    0x06,
    ITF_CDC_CONTROL,
    ITF_CDC_DATA,
];

/// The CDC class-specific descriptors, in the order they follow the control
/// interface.
pub const CDC_FUNCTIONAL_DESCRIPTORS: [&[u8]; 4] = [
    &CDC_HEADER_FUNC,
    &CDC_CALL_MANAGEMENT_FUNC,
    &CDC_ACM_FUNC,
    &CDC_UNION_FUNC,
];

/// CDC notification endpoint.
pub const CDC_NOTIF_ENDPOINT: [u8; 7] = endpoint(
    EPNUM_CDC_NOTIF,
    XFER_INTERRUPT,
    CDC_NOTIF_EP_SIZE,
    CDC_NOTIF_POLL_MS,
);

/// CDC data interface.
pub const CDC_DATA_INTERFACE: [u8; 9] = [
    9,
    desc_type::INTERFACE,
    ITF_CDC_DATA,
    0,
    2,
    class::CDC_DATA,
    0,
    0,
    0,
];

pub const CDC_OUT_ENDPOINT: [u8; 7] = endpoint(EPNUM_CDC_OUT, XFER_BULK, CDC_EP_BUFSIZE, 0);
pub const CDC_IN_ENDPOINT: [u8; 7] = endpoint(EPNUM_CDC_IN, XFER_BULK, CDC_EP_BUFSIZE, 0);

/// HID interface.
pub const HID_INTERFACE: [u8; 9] = [
    9,
    desc_type::INTERFACE,
    ITF_HID,
    0,
    1,
    class::HID,
    class::HID_SUBCLASS_NONE,
    class::HID_PROTOCOL_NONE,
    0,
];

/// HID class descriptor, HID 1.11.
pub const HID_CLASS_DESCRIPTOR: [u8; 9] = [
    9,
    desc_type::HID,
    0x11,
    0x01,
    0, // bCountryCode
    1, // bNumDescriptors
    desc_type::HID_REPORT,
    lo(HID_REPORT_LEN_U16),
    hi(HID_REPORT_LEN_U16),
];

pub const HID_ENDPOINT: [u8; 7] = endpoint(EPNUM_HID, XFER_INTERRUPT, HID_EP_BUFSIZE, HID_POLL_MS);

/// Configuration descriptor: header, CDC-ACM function, HID function.
pub const CONFIGURATION_DESCRIPTOR: [u8; CONFIG_TOTAL_LEN] = concat(&[
    &CONFIG_HEADER,
    // CDC
    &CDC_IAD,
    &CDC_CONTROL_INTERFACE,
    &CDC_HEADER_FUNC,
    &CDC_CALL_MANAGEMENT_FUNC,
    &CDC_ACM_FUNC,
    &CDC_UNION_FUNC,
    &CDC_NOTIF_ENDPOINT,
    &CDC_DATA_INTERFACE,
    &CDC_OUT_ENDPOINT,
    &CDC_IN_ENDPOINT,
    // HID
    &HID_INTERFACE,
    &HID_CLASS_DESCRIPTOR,
    &HID_ENDPOINT,
]);

/// Device descriptor request.
#[inline]
#[must_use]
pub fn device() -> &'static [u8] {
    &DEVICE_DESCRIPTOR
}

/// Configuration descriptor request. Only configuration 0 exists.
#[inline]
#[must_use]
pub fn configuration(index: u8) -> Option<&'static [u8]> {
    let desc: &'static [u8] = &CONFIGURATION_DESCRIPTOR;
    (index == 0).then_some(desc)
}

/// HID report descriptor request. All instances share the keyboard layout.
#[inline]
#[must_use]
pub fn hid_report(_instance: u8) -> &'static [u8] {
    &HID_REPORT_DESCRIPTOR
}

/// Answers every descriptor request of the device stack.
///
/// String descriptors are encoded on request into a scratch buffer owned by
/// the set, so a returned string is valid until the next string request.
pub struct DescriptorSet<'a> {
    strings: StringTable<'a>,
    scratch: StringDescriptorBuffer,
}

impl<'a> DescriptorSet<'a> {
    /// Create a descriptor set serving the given string table.
    #[must_use]
    pub const fn new(strings: StringTable<'a>) -> Self {
        Self {
            strings,
            scratch: StringDescriptorBuffer::new(),
        }
    }

    /// The string table in use.
    #[must_use]
    pub fn strings(&self) -> &StringTable<'a> {
        &self.strings
    }

    pub fn device(&self) -> &'static [u8] {
        device()
    }

    pub fn configuration(&self, index: u8) -> Option<&'static [u8]> {
        configuration(index)
    }

    pub fn hid_report(&self, instance: u8) -> &'static [u8] {
        hid_report(instance)
    }

    /// String descriptor request.
    ///
    /// `langid` is ignored; only US English is offered. Returns `None` for an
    /// index past the table, which makes the device stack stall the request.
    pub fn string(&mut self, index: u8, _langid: u16) -> Option<&[u16]> {
        self.scratch.encode(&self.strings, index)
    }
}

impl Default for DescriptorSet<'static> {
    fn default() -> Self {
        Self::new(StringTable::DEFAULT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Walk the `bLength` chain of a descriptor blob and collect the types.
    fn walk(blob: &[u8]) -> ([u8; 32], usize) {
        let mut types = [0u8; 32];
        let mut count = 0;
        let mut pos = 0;
        while pos < blob.len() {
            let len = blob[pos] as usize;
            assert!(len >= 2, "zero-length descriptor at offset {}", pos);
            assert!(pos + len <= blob.len(), "descriptor at {} overruns", pos);
            types[count] = blob[pos + 1];
            count += 1;
            pos += len;
        }
        assert_eq!(pos, blob.len());
        (types, count)
    }

    #[test]
    fn test_device_descriptor_layout() {
        let d = device();
        assert_eq!(d.len(), 18);
        assert_eq!(d[0] as usize, d.len());
        assert_eq!(d[1], desc_type::DEVICE);
        assert_eq!(u16::from_le_bytes([d[2], d[3]]), 0x0200);
        assert_eq!(&d[4..7], &[0xEF, 0x02, 0x01]);
        assert_eq!(d[7], 64);
        assert_eq!(u16::from_le_bytes([d[8], d[9]]), 0xCAFE);
        assert_eq!(u16::from_le_bytes([d[10], d[11]]), 0x4005);
        assert_eq!(u16::from_le_bytes([d[12], d[13]]), 0x0100);
        assert_eq!(&d[14..18], &[1, 2, 3, 1]);
    }

    #[test]
    fn test_configuration_total_length() {
        let c = configuration(0).unwrap();
        assert_eq!(c.len(), 100);
        assert_eq!(u16::from_le_bytes([c[2], c[3]]) as usize, c.len());
        assert_eq!(c[4], 3);
        assert_eq!(c[7], 0xA0);
        assert_eq!(c[8], 50);
    }

    #[test]
    fn test_configuration_chain() {
        let (types, count) = walk(configuration(0).unwrap());
        use desc_type::*;
        let expected = [
            CONFIGURATION,
            INTERFACE_ASSOCIATION,
            INTERFACE,
            CS_INTERFACE,
            CS_INTERFACE,
            CS_INTERFACE,
            CS_INTERFACE,
            ENDPOINT,
            INTERFACE,
            ENDPOINT,
            ENDPOINT,
            INTERFACE,
            HID,
            ENDPOINT,
        ];
        assert_eq!(&types[..count], &expected);
    }

    #[test]
    fn test_function_lengths() {
        let c = configuration(0).unwrap();
        // IAD starts the CDC function, HID interface starts the HID function
        assert_eq!(c[CONFIG_DESC_LEN + 1], desc_type::INTERFACE_ASSOCIATION);
        let hid = CONFIG_DESC_LEN + CDC_DESC_LEN;
        assert_eq!(c[hid + 1], desc_type::INTERFACE);
        assert_eq!(c[hid + 2], ITF_HID);
        assert_eq!(c[hid + 5], class::HID);
    }

    #[test]
    fn test_hid_class_descriptor_points_at_report() {
        let c = configuration(0).unwrap();
        let hid_class = CONFIG_DESC_LEN + CDC_DESC_LEN + 9;
        assert_eq!(c[hid_class + 1], desc_type::HID);
        assert_eq!(c[hid_class + 6], desc_type::HID_REPORT);
        let len = u16::from_le_bytes([c[hid_class + 7], c[hid_class + 8]]);
        assert_eq!(len as usize, hid_report(0).len());
    }

    #[test]
    fn test_endpoints() {
        let c = configuration(0).unwrap();
        let mut eps = [0u8; 4];
        let mut n = 0;
        let mut pos = 0;
        while pos < c.len() {
            if c[pos + 1] == desc_type::ENDPOINT {
                eps[n] = c[pos + 2];
                n += 1;
            }
            pos += c[pos] as usize;
        }
        assert_eq!(&eps[..n], &[0x81, 0x02, 0x82, 0x83]);

        let hid_ep = CONFIG_TOTAL_LEN - 7;
        assert_eq!(c[hid_ep + 3], 0x03);
        assert_eq!(u16::from_le_bytes([c[hid_ep + 4], c[hid_ep + 5]]), 64);
        assert_eq!(c[hid_ep + 6], 10);
    }

    #[test]
    fn test_cdc_functional_descriptors_follow_control_interface() {
        let c = configuration(0).unwrap();
        let mut pos = CONFIG_DESC_LEN + CDC_IAD.len();
        assert_eq!(&c[pos..pos + 9], &CDC_CONTROL_INTERFACE);
        assert_eq!(c[pos + 8], CDC_STRING_INDEX);
        pos += 9;
        for func in CDC_FUNCTIONAL_DESCRIPTORS {
            assert_eq!(&c[pos..pos + func.len()], func);
            assert_eq!(func[0] as usize, func.len());
            assert_eq!(func[1], desc_type::CS_INTERFACE);
            pos += func.len();
        }
        assert_eq!(&c[pos..pos + 7], &CDC_NOTIF_ENDPOINT);
        assert_eq!(CDC_NOTIF_ENDPOINT[6], 16);
    }

    #[test]
    fn test_only_configuration_zero() {
        assert!(configuration(0).is_some());
        assert!(configuration(1).is_none());
        assert!(configuration(255).is_none());
    }

    #[test]
    fn test_report_descriptor_balanced() {
        let r = hid_report(0);
        assert_eq!(&r[..4], &[0x05, 0x01, 0x09, 0x06]);
        assert_eq!(*r.last().unwrap(), 0xC0);

        // Walk short items and check collections balance
        let mut depth = 0i32;
        let mut pos = 0;
        while pos < r.len() {
            let prefix = r[pos];
            let size = match prefix & 0x03 {
                3 => 4,
                n => n as usize,
            };
            match prefix & 0xFC {
                0xA0 => depth += 1,
                0xC0 => depth -= 1,
                _ => {}
            }
            pos += 1 + size;
        }
        assert_eq!(pos, r.len());
        assert_eq!(depth, 0);
    }

    #[test]
    fn test_same_report_descriptor_for_every_instance() {
        assert_eq!(hid_report(0), hid_report(3));
    }

    #[test]
    fn test_descriptor_set_requests() {
        let mut set = DescriptorSet::default();
        assert_eq!(set.device(), &DEVICE_DESCRIPTOR[..]);
        assert!(set.configuration(0).is_some());
        assert_eq!(set.hid_report(0).len(), 65);

        let product = set.string(2, 0x0409).unwrap();
        assert_eq!(product[0], (u16::from(desc_type::STRING) << 8) | 20);
        assert!(set.string(5, 0x0409).is_none());
    }
}

//! CDC-ACM class requests of the debug console interface.
//!
//! The console is output only, but terminals still set and read the line
//! coding and raise DTR before they read. Those requests are answered from
//! [`CdcControl`].

/// CDC PSTN class request codes.
pub mod request {
    pub const SEND_ENCAPSULATED_COMMAND: u8 = 0x00;
    pub const GET_ENCAPSULATED_RESPONSE: u8 = 0x01;
    pub const SET_LINE_CODING: u8 = 0x20;
    pub const GET_LINE_CODING: u8 = 0x21;
    pub const SET_CONTROL_LINE_STATE: u8 = 0x22;
    pub const SEND_BREAK: u8 = 0x23;
}

/// Line coding as carried by SET/GET_LINE_CODING.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineCoding {
    pub baud_rate: u32,
    /// 0 = 1 stop bit, 1 = 1.5, 2 = 2.
    pub stop_bits: u8,
    /// 0 = none, 1 = odd, 2 = even, 3 = mark, 4 = space.
    pub parity: u8,
    pub data_bits: u8,
}

impl LineCoding {
    /// Wire size.
    pub const LEN: usize = 7;

    /// 115200 8N1 until the PC says otherwise.
    pub const DEFAULT: Self = Self {
        baud_rate: 115_200,
        stop_bits: 0,
        parity: 0,
        data_bits: 8,
    };

    /// Decode the request payload. `None` if it is too short.
    #[must_use]
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let data = data.get(..Self::LEN)?;
        Some(Self {
            baud_rate: u32::from_le_bytes([data[0], data[1], data[2], data[3]]),
            stop_bits: data[4],
            parity: data[5],
            data_bits: data[6],
        })
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let baud = self.baud_rate.to_le_bytes();
        [
            baud[0],
            baud[1],
            baud[2],
            baud[3],
            self.stop_bits,
            self.parity,
            self.data_bits,
        ]
    }
}

impl Default for LineCoding {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// State of the CDC control interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdcControl {
    line_coding: LineCoding,
    dtr: bool,
    rts: bool,
}

impl CdcControl {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            line_coding: LineCoding::DEFAULT,
            dtr: false,
            rts: false,
        }
    }

    /// Host-to-device class request. Returns `false` to stall it.
    pub fn control_out(&mut self, req: u8, value: u16, data: &[u8]) -> bool {
        match req {
            request::SET_LINE_CODING => match LineCoding::from_bytes(data) {
                Some(coding) => {
                    self.line_coding = coding;
                    true
                }
                None => false,
            },
            request::SET_CONTROL_LINE_STATE => {
                self.dtr = value & 0x0001 != 0;
                self.rts = value & 0x0002 != 0;
                true
            }
            // Nothing to break or to encapsulate on a text console
            request::SEND_BREAK | request::SEND_ENCAPSULATED_COMMAND => true,
            _ => false,
        }
    }

    /// Device-to-host class request. Returns the answer length, or `None` to
    /// stall it.
    pub fn control_in(&self, req: u8, buf: &mut [u8]) -> Option<usize> {
        match req {
            request::GET_LINE_CODING => {
                let out = buf.get_mut(..LineCoding::LEN)?;
                out.copy_from_slice(&self.line_coding.to_bytes());
                Some(LineCoding::LEN)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn line_coding(&self) -> LineCoding {
        self.line_coding
    }

    /// Terminal present (DTR raised).
    #[must_use]
    pub fn dtr(&self) -> bool {
        self.dtr
    }

    #[must_use]
    pub fn rts(&self) -> bool {
        self.rts
    }
}

impl Default for CdcControl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_coding_wire_format() {
        let coding = LineCoding::from_bytes(&[0x00, 0xC2, 0x01, 0x00, 0, 0, 8]).unwrap();
        assert_eq!(coding, LineCoding::DEFAULT);
        assert_eq!(coding.to_bytes(), [0x00, 0xC2, 0x01, 0x00, 0, 0, 8]);
        assert!(LineCoding::from_bytes(&[0x00, 0xC2, 0x01]).is_none());
    }

    #[test]
    fn test_set_then_get_line_coding() {
        let mut cdc = CdcControl::new();
        // 9600 baud, 2 stop bits, even parity, 7 data bits
        let payload = [0x80, 0x25, 0x00, 0x00, 2, 2, 7];
        assert!(cdc.control_out(request::SET_LINE_CODING, 0, &payload));
        assert_eq!(cdc.line_coding().baud_rate, 9600);

        let mut buf = [0u8; 64];
        assert_eq!(cdc.control_in(request::GET_LINE_CODING, &mut buf), Some(7));
        assert_eq!(&buf[..7], &payload);
    }

    #[test]
    fn test_short_line_coding_stalls() {
        let mut cdc = CdcControl::new();
        assert!(!cdc.control_out(request::SET_LINE_CODING, 0, &[0x80, 0x25]));
        assert_eq!(cdc.line_coding(), LineCoding::DEFAULT);

        let mut small = [0u8; 4];
        assert_eq!(cdc.control_in(request::GET_LINE_CODING, &mut small), None);
    }

    #[test]
    fn test_control_line_state() {
        let mut cdc = CdcControl::new();
        assert!(!cdc.dtr());

        assert!(cdc.control_out(request::SET_CONTROL_LINE_STATE, 0x0003, &[]));
        assert!(cdc.dtr());
        assert!(cdc.rts());

        assert!(cdc.control_out(request::SET_CONTROL_LINE_STATE, 0x0002, &[]));
        assert!(!cdc.dtr());
        assert!(cdc.rts());
    }

    #[test]
    fn test_unknown_requests_stall() {
        let mut cdc = CdcControl::new();
        let mut buf = [0u8; 8];
        assert!(!cdc.control_out(0x42, 0, &[]));
        assert_eq!(cdc.control_in(request::GET_ENCAPSULATED_RESPONSE, &mut buf), None);
        assert!(cdc.control_out(request::SEND_BREAK, 0xFFFF, &[]));
    }
}

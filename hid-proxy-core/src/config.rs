//! Fixed configuration of the proxy.
//!
//! These values are baked into the descriptor tables and the firmware wiring;
//! there is no runtime configuration.

/// GPIO used as D+ by the PIO host PHY (D- is the next pin).
pub const HOST_PIN_DP: u8 = 2;

/// Root port of the host role (PIO USB).
pub const HOST_RHPORT: u8 = 1;

/// Crystal frequency on the board.
pub const XOSC_HZ: u32 = 12_000_000;

/// System clock. The PIO USB PHY samples at 48 MHz and needs `clk_sys` to be
/// a multiple of 12 MHz.
pub const SYS_CLOCK_HZ: u32 = 120_000_000;

/// System PLL: 12 MHz * 120 = 1440 MHz VCO, then / 6 / 2.
pub const SYS_PLL: PllSettings = PllSettings {
    refdiv: 1,
    fbdiv: 120,
    post_div1: 6,
    post_div2: 2,
};

/// Interval between host frames (SOF) on the PIO port, in microseconds.
pub const HOST_FRAME_US: u32 = 1_000;

/// Control endpoint size.
pub const EP0_SIZE: u8 = 64;

/// USB vendor ID presented to the PC.
pub const USB_VID: u16 = 0xCAFE;

/// USB product ID presented to the PC.
pub const USB_PID: u16 = 0x4005;

/// Device release number (BCD).
pub const USB_BCD_DEVICE: u16 = 0x0100;

/// Bus power draw in mA.
pub const USB_MAX_POWER_MA: u16 = 100;

/// HID interrupt IN endpoint address.
pub const EPNUM_HID: u8 = 0x83;

/// HID endpoint buffer size.
pub const HID_EP_BUFSIZE: u16 = 64;

/// HID polling interval in ms.
pub const HID_POLL_MS: u8 = 10;

/// CDC notification endpoint address.
pub const EPNUM_CDC_NOTIF: u8 = 0x81;

/// CDC notification endpoint size.
pub const CDC_NOTIF_EP_SIZE: u16 = 8;

/// CDC notification endpoint polling interval in ms.
pub const CDC_NOTIF_POLL_MS: u8 = 16;

/// CDC bulk OUT endpoint address.
pub const EPNUM_CDC_OUT: u8 = 0x02;

/// CDC bulk IN endpoint address.
pub const EPNUM_CDC_IN: u8 = 0x82;

/// CDC bulk endpoint size.
pub const CDC_EP_BUFSIZE: u16 = 64;

/// CDC transmit buffer size (also the console pipe capacity).
pub const CDC_TX_BUFSIZE: usize = 256;

/// Number of HID interfaces the host role keeps track of.
pub const MAX_HOST_HID_INSTANCES: usize = 4;

/// Largest HID report forwarded in either direction.
pub const MAX_REPORT_LEN: usize = HID_EP_BUFSIZE as usize;

/// Device-side HID instance that receives forwarded reports.
pub const DEVICE_HID_INSTANCE: u8 = 0;

/// RP2040 PLL divider settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllSettings {
    pub refdiv: u8,
    pub fbdiv: u16,
    pub post_div1: u8,
    pub post_div2: u8,
}

impl PllSettings {
    /// VCO frequency for a given reference clock.
    #[must_use]
    pub const fn vco_hz(&self, ref_hz: u32) -> u32 {
        ref_hz / self.refdiv as u32 * self.fbdiv as u32
    }

    /// Output frequency for a given reference clock.
    #[must_use]
    pub const fn output_hz(&self, ref_hz: u32) -> u32 {
        self.vco_hz(ref_hz) / (self.post_div1 as u32 * self.post_div2 as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sys_pll_gives_sys_clock() {
        assert_eq!(SYS_PLL.output_hz(XOSC_HZ), SYS_CLOCK_HZ);
    }

    #[test]
    fn test_sys_pll_within_rp2040_limits() {
        let vco = SYS_PLL.vco_hz(XOSC_HZ);
        assert!((750_000_000..=1_600_000_000).contains(&vco));
        assert!((16..=320).contains(&SYS_PLL.fbdiv));
        assert!((1..=7).contains(&SYS_PLL.post_div1));
        assert!((1..=7).contains(&SYS_PLL.post_div2));
        // Reference after refdiv must be at least 5 MHz
        assert!(XOSC_HZ / SYS_PLL.refdiv as u32 >= 5_000_000);
    }

    #[test]
    fn test_sys_clock_suits_pio_usb() {
        assert_eq!(SYS_CLOCK_HZ % 12_000_000, 0);
    }
}

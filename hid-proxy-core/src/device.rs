//! Device-role port: the stack that presents the proxy to the PC.

use crate::host::{Report, ReportType};

/// Something the PC asked of the device stack that needs the host role.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceCommand {
    /// SET_REPORT control request (keyboard LEDs, typically).
    SetReport {
        report_id: u8,
        report_type: ReportType,
        data: Report,
    },
}

/// Error type for device stack operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceError {
    /// Device not configured by the PC yet.
    NotReady,
    /// Endpoint busy with a previous report.
    Busy,
    /// Report dropped (queue to the device stack is full).
    Dropped,
    /// Report larger than the endpoint buffer.
    TooLong,
}

/// The device-role USB stack, as seen by the proxy.
pub trait HidDevice {
    /// Queue an IN report on a device HID instance.
    ///
    /// Fails with [`DeviceError::NotReady`] until the PC has configured the
    /// device.
    fn send_report(&mut self, instance: u8, report: &[u8]) -> Result<(), DeviceError>;
}

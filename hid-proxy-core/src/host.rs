//! Host-role port: the stack that talks to the physical HID device.

use crate::config::MAX_REPORT_LEN;
use heapless::Vec;

/// A HID report as moved between the two roles.
pub type Report = Vec<u8, MAX_REPORT_LEN>;

/// Copy `data` into a [`Report`], dropping bytes past [`MAX_REPORT_LEN`].
#[must_use]
pub fn report_from_slice(data: &[u8]) -> Report {
    let mut report = Report::new();
    let len = data.len().min(MAX_REPORT_LEN);
    // Cannot fail: length is clamped to the capacity
    let _ = report.extend_from_slice(&data[..len]);
    report
}

/// HID report type, wire values per HID 1.11 (GET/SET_REPORT `wValue` high byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ReportType {
    Input = 1,
    Output = 2,
    Feature = 3,
}

impl ReportType {
    /// Decode the wire value.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Input),
            2 => Some(Self::Output),
            3 => Some(Self::Feature),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Something the host stack reported about an attached HID interface.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostEvent {
    /// A HID interface finished enumeration.
    Mounted {
        dev_addr: u8,
        instance: u8,
        report_descriptor_len: u16,
    },
    /// A HID interface went away.
    Unmounted { dev_addr: u8, instance: u8 },
    /// An IN report arrived.
    Report {
        dev_addr: u8,
        instance: u8,
        report: Report,
    },
    /// A SET_REPORT control transfer finished.
    SetReportComplete {
        dev_addr: u8,
        instance: u8,
        len: u16,
    },
}

/// Error type for host stack requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HostError {
    /// The stack refused the request (interface busy or not mounted).
    Rejected,
}

/// The host-role USB stack, as seen by the proxy.
///
/// Enumeration, HID class handling and transfer scheduling all live behind
/// this trait. Calls only queue work; completion is reported back through
/// [`HostEvent`]s.
pub trait HidHost {
    /// Arm the next IN transfer on an interface.
    fn receive_report(&mut self, dev_addr: u8, instance: u8) -> Result<(), HostError>;

    /// Send a SET_REPORT control request to an interface.
    ///
    /// `data` past [`MAX_REPORT_LEN`] is not sent.
    fn set_report(
        &mut self,
        dev_addr: u8,
        instance: u8,
        report_id: u8,
        report_type: ReportType,
        data: &[u8],
    ) -> Result<(), HostError>;

    /// The SET_REPORT on an interface is over: it completed or the interface
    /// went away.
    fn set_report_complete(&mut self, dev_addr: u8, instance: u8);
}

/// Data stage of the single SET_REPORT the host stack can have in flight.
///
/// The stack reads the buffer after accepting the request, so the buffer
/// stays locked until [`release`](Self::release) for the interface that
/// claimed it. A claim while locked is refused and leaves the buffer alone.
#[derive(Debug, Default)]
pub struct SetReportSlot {
    data: Report,
    owner: Option<(u8, u8)>,
}

impl SetReportSlot {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            data: Report::new(),
            owner: None,
        }
    }

    /// Lock the buffer for `(dev_addr, instance)` and fill it with `data`.
    pub fn claim(
        &mut self,
        dev_addr: u8,
        instance: u8,
        data: &[u8],
    ) -> Result<&mut Report, HostError> {
        if self.owner.is_some() {
            return Err(HostError::Rejected);
        }
        self.data = report_from_slice(data);
        self.owner = Some((dev_addr, instance));
        Ok(&mut self.data)
    }

    /// Unlock the buffer if `(dev_addr, instance)` holds it.
    pub fn release(&mut self, dev_addr: u8, instance: u8) {
        if self.owner == Some((dev_addr, instance)) {
            self.owner = None;
        }
    }

    /// Interface whose request is in flight.
    #[must_use]
    pub fn owner(&self) -> Option<(u8, u8)> {
        self.owner
    }

    /// Current buffer contents.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_type_wire_values() {
        assert_eq!(ReportType::Input.as_u8(), 1);
        assert_eq!(ReportType::from_u8(2), Some(ReportType::Output));
        assert_eq!(ReportType::from_u8(3), Some(ReportType::Feature));
        assert_eq!(ReportType::from_u8(0), None);
        assert_eq!(ReportType::from_u8(4), None);
    }

    #[test]
    fn test_report_from_slice_clamps() {
        let report = report_from_slice(&[0xAA; 100]);
        assert_eq!(report.len(), MAX_REPORT_LEN);

        let report = report_from_slice(&[1, 2, 3]);
        assert_eq!(&report[..], &[1, 2, 3]);
    }

    #[test]
    fn test_set_report_slot_locked_while_in_flight() {
        let mut slot = SetReportSlot::new();
        assert_eq!(&slot.claim(1, 0, &[0x02]).unwrap()[..], &[0x02]);

        // A second request must not clobber the data stage of the first
        assert_eq!(slot.claim(1, 0, &[0x05]), Err(HostError::Rejected));
        assert_eq!(slot.data(), &[0x02]);
        assert_eq!(slot.owner(), Some((1, 0)));

        slot.release(1, 0);
        assert_eq!(slot.owner(), None);
        assert_eq!(&slot.claim(1, 0, &[0x05]).unwrap()[..], &[0x05]);
    }

    #[test]
    fn test_set_report_slot_release_by_other_interface_ignored() {
        let mut slot = SetReportSlot::new();
        slot.claim(2, 1, &[0x01]).unwrap();

        slot.release(2, 0);
        slot.release(3, 1);
        assert_eq!(slot.owner(), Some((2, 1)));
        assert!(slot.claim(3, 0, &[0x00]).is_err());
    }

    #[test]
    fn test_set_report_slot_clamps_data() {
        let mut slot = SetReportSlot::new();
        let claimed = slot.claim(1, 0, &[0xEE; 80]).unwrap();
        assert_eq!(claimed.len(), MAX_REPORT_LEN);
    }
}

//! HidProxy: forwards reports between the host and device roles.

use crate::config::{DEVICE_HID_INSTANCE, MAX_HOST_HID_INSTANCES};
use crate::device::{DeviceCommand, DeviceError, HidDevice};
use crate::hexdump::HexDump;
use crate::host::{HidHost, HostError, HostEvent, ReportType};
use core::fmt::Write;
use heapless::Vec;

/// HID interfaces currently mounted on the host port, in mount order.
#[derive(Debug, Clone, Default)]
pub struct MountTable {
    entries: Vec<(u8, u8), MAX_HOST_HID_INSTANCES>,
}

impl MountTable {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Record an interface. Returns `false` when the table is full.
    pub fn insert(&mut self, dev_addr: u8, instance: u8) -> bool {
        if self.contains(dev_addr, instance) {
            return true;
        }
        self.entries.push((dev_addr, instance)).is_ok()
    }

    /// Forget an interface, keeping the order of the others.
    pub fn remove(&mut self, dev_addr: u8, instance: u8) {
        if let Some(pos) = self
            .entries
            .iter()
            .position(|&entry| entry == (dev_addr, instance))
        {
            self.entries.remove(pos);
        }
    }

    #[must_use]
    pub fn contains(&self, dev_addr: u8, instance: u8) -> bool {
        self.entries.contains(&(dev_addr, instance))
    }

    /// Earliest mounted interface still present.
    #[must_use]
    pub fn first(&self) -> Option<(u8, u8)> {
        self.entries.first().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Passthrough between a [`HidHost`] and a [`HidDevice`].
///
/// Each `on_*` method is one callback of the glue layer. Every callback
/// writes a line to the debug console; console write errors are ignored so a
/// full or disconnected console never stalls forwarding.
pub struct HidProxy<H, D, W> {
    host: H,
    device: D,
    console: W,
    mounted: MountTable,
}

impl<H: HidHost, D: HidDevice, W: Write> HidProxy<H, D, W> {
    /// Create a new proxy from the two ports and a console writer.
    pub fn new(host: H, device: D, console: W) -> Self {
        Self {
            host,
            device,
            console,
            mounted: MountTable::new(),
        }
    }

    /// A HID interface was mounted on the host port: start receiving reports.
    pub fn on_mount(
        &mut self,
        dev_addr: u8,
        instance: u8,
        _report_descriptor_len: u16,
    ) -> Result<(), ProxyError> {
        let _ = writeln!(
            self.console,
            "HID device mounted: addr {}, instance {}",
            dev_addr, instance
        );

        if !self.mounted.insert(dev_addr, instance) {
            let _ = writeln!(self.console, "mount table full, SET_REPORT will not reach it");
        }

        self.host
            .receive_report(dev_addr, instance)
            .map_err(ProxyError::Host)
    }

    /// A HID interface was removed from the host port.
    pub fn on_unmount(&mut self, dev_addr: u8, instance: u8) {
        let _ = writeln!(
            self.console,
            "HID device unmounted: addr {}, instance {}",
            dev_addr, instance
        );
        self.mounted.remove(dev_addr, instance);
        // A SET_REPORT still in flight on it will never complete
        self.host.set_report_complete(dev_addr, instance);
    }

    /// An IN report arrived from the physical device.
    ///
    /// The report goes to the PC unchanged and the next transfer is armed on
    /// the same interface even when forwarding failed.
    pub fn on_report(&mut self, dev_addr: u8, instance: u8, report: &[u8]) -> Result<(), ProxyError> {
        let _ = writeln!(
            self.console,
            "HID report from device {}, instance {}, len {}",
            dev_addr,
            instance,
            report.len()
        );
        let _ = writeln!(self.console, "{}", HexDump(report));

        let forwarded = self.device.send_report(DEVICE_HID_INSTANCE, report);
        if let Err(e) = forwarded {
            let _ = writeln!(self.console, "forward to PC failed: {:?}", e);
        }

        let rearmed = self.host.receive_report(dev_addr, instance);

        forwarded.map_err(ProxyError::Device)?;
        rearmed.map_err(ProxyError::Host)
    }

    /// GET_REPORT from the PC. Not served: always answers with zero bytes.
    pub fn get_report(
        &mut self,
        _instance: u8,
        _report_id: u8,
        _report_type: ReportType,
        _buf: &mut [u8],
    ) -> usize {
        0
    }

    /// SET_REPORT from the PC (keyboard LED state): pass it to the keyboard.
    pub fn on_set_report(
        &mut self,
        report_id: u8,
        report_type: ReportType,
        data: &[u8],
    ) -> Result<(), ProxyError> {
        let _ = writeln!(
            self.console,
            "HID SET_REPORT from host PC: report_id {}, type {}, len {}",
            report_id,
            report_type.as_u8(),
            data.len()
        );
        let _ = writeln!(self.console, "{}", HexDump(data));

        let Some((dev_addr, instance)) = self.mounted.first() else {
            let _ = writeln!(self.console, "no HID device mounted, SET_REPORT dropped");
            return Err(ProxyError::NoDevice);
        };

        self.host
            .set_report(dev_addr, instance, report_id, report_type, data)
            .map_err(ProxyError::Host)
    }

    /// The SET_REPORT sent to an interface finished.
    pub fn on_set_report_complete(&mut self, dev_addr: u8, instance: u8, _len: u16) {
        self.host.set_report_complete(dev_addr, instance);
    }

    /// Dispatch an event from the host stack.
    pub fn handle_host_event(&mut self, event: &HostEvent) -> Result<(), ProxyError> {
        match event {
            HostEvent::Mounted {
                dev_addr,
                instance,
                report_descriptor_len,
            } => self.on_mount(*dev_addr, *instance, *report_descriptor_len),
            HostEvent::Unmounted { dev_addr, instance } => {
                self.on_unmount(*dev_addr, *instance);
                Ok(())
            }
            HostEvent::Report {
                dev_addr,
                instance,
                report,
            } => self.on_report(*dev_addr, *instance, report),
            HostEvent::SetReportComplete {
                dev_addr,
                instance,
                len,
            } => {
                self.on_set_report_complete(*dev_addr, *instance, *len);
                Ok(())
            }
        }
    }

    /// Dispatch a command raised by the device stack.
    pub fn handle_device_command(&mut self, command: &DeviceCommand) -> Result<(), ProxyError> {
        match command {
            DeviceCommand::SetReport {
                report_id,
                report_type,
                data,
            } => self.on_set_report(*report_id, *report_type, data),
        }
    }

    /// Interfaces currently mounted on the host port.
    pub fn mounted(&self) -> &MountTable {
        &self.mounted
    }

    /// Get a reference to the host port.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Get a mutable reference to the host port.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Get a reference to the device port.
    pub fn device(&self) -> &D {
        &self.device
    }

    /// Get a reference to the console writer.
    pub fn console(&self) -> &W {
        &self.console
    }

    /// Decompose the proxy into its ports and console.
    pub fn into_parts(self) -> (H, D, W) {
        (self.host, self.device, self.console)
    }
}

/// Error type for proxy operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProxyError {
    /// Error from the host stack.
    Host(HostError),
    /// Error from the device stack.
    Device(DeviceError),
    /// SET_REPORT arrived with no HID interface mounted.
    NoDevice,
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::host::{report_from_slice, SetReportSlot};
    use std::string::String;
    use std::vec;
    use std::vec::Vec;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum HostCall {
        Receive(u8, u8),
        SetReport(u8, u8, u8, ReportType, Vec<u8>),
        SetReportComplete(u8, u8),
    }

    // Records every request; optionally refuses them
    #[derive(Default)]
    struct MockHost {
        calls: Vec<HostCall>,
        reject: bool,
    }

    impl HidHost for MockHost {
        fn receive_report(&mut self, dev_addr: u8, instance: u8) -> Result<(), HostError> {
            self.calls.push(HostCall::Receive(dev_addr, instance));
            if self.reject {
                Err(HostError::Rejected)
            } else {
                Ok(())
            }
        }

        fn set_report(
            &mut self,
            dev_addr: u8,
            instance: u8,
            report_id: u8,
            report_type: ReportType,
            data: &[u8],
        ) -> Result<(), HostError> {
            self.calls.push(HostCall::SetReport(
                dev_addr,
                instance,
                report_id,
                report_type,
                data.to_vec(),
            ));
            if self.reject {
                Err(HostError::Rejected)
            } else {
                Ok(())
            }
        }

        fn set_report_complete(&mut self, dev_addr: u8, instance: u8) {
            self.calls.push(HostCall::SetReportComplete(dev_addr, instance));
        }
    }

    #[derive(Default)]
    struct MockDevice {
        sent: Vec<(u8, Vec<u8>)>,
        fail: Option<DeviceError>,
    }

    impl HidDevice for MockDevice {
        fn send_report(&mut self, instance: u8, report: &[u8]) -> Result<(), DeviceError> {
            if let Some(e) = self.fail {
                return Err(e);
            }
            self.sent.push((instance, report.to_vec()));
            Ok(())
        }
    }

    fn proxy() -> HidProxy<MockHost, MockDevice, String> {
        HidProxy::new(MockHost::default(), MockDevice::default(), String::new())
    }

    #[test]
    fn test_mount_requests_report() {
        let mut proxy = proxy();
        assert!(proxy.on_mount(1, 0, 65).is_ok());

        assert_eq!(proxy.host().calls, vec![HostCall::Receive(1, 0)]);
        assert!(proxy.mounted().contains(1, 0));
        assert_eq!(proxy.console(), "HID device mounted: addr 1, instance 0\n");
    }

    #[test]
    fn test_report_forwarded_and_rearmed() {
        let mut proxy = proxy();
        let report = [0x02, 0x00, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00];

        assert!(proxy.on_report(1, 0, &report).is_ok());

        assert_eq!(proxy.device().sent, vec![(0, report.to_vec())]);
        assert_eq!(proxy.host().calls, vec![HostCall::Receive(1, 0)]);
        assert_eq!(
            proxy.console(),
            "HID report from device 1, instance 0, len 8\n02 00 04 00 00 00 00 00 \n"
        );
    }

    #[test]
    fn test_report_rearmed_when_forward_fails() {
        let mut proxy = proxy();
        proxy.device.fail = Some(DeviceError::Dropped);

        let result = proxy.on_report(2, 1, &[0x01]);
        assert_eq!(result, Err(ProxyError::Device(DeviceError::Dropped)));
        assert_eq!(proxy.host().calls, vec![HostCall::Receive(2, 1)]);
        assert!(proxy.console().contains("forward to PC failed: Dropped"));
    }

    #[test]
    fn test_host_rejection_reported() {
        let mut proxy = proxy();
        proxy.host_mut().reject = true;

        assert_eq!(
            proxy.on_mount(1, 0, 65),
            Err(ProxyError::Host(HostError::Rejected))
        );
        assert_eq!(
            proxy.on_report(1, 0, &[0x00]),
            Err(ProxyError::Host(HostError::Rejected))
        );
        // The report still reached the PC
        assert_eq!(proxy.device().sent.len(), 1);
    }

    #[test]
    fn test_unmount_forgets_interface() {
        let mut proxy = proxy();
        let _ = proxy.on_mount(1, 0, 65);
        proxy.on_unmount(1, 0);

        assert!(proxy.mounted().is_empty());
        assert!(proxy
            .console()
            .ends_with("HID device unmounted: addr 1, instance 0\n"));
    }

    #[test]
    fn test_set_report_goes_to_first_mounted() {
        let mut proxy = proxy();
        let _ = proxy.on_mount(3, 1, 65);
        let _ = proxy.on_mount(4, 0, 65);

        assert!(proxy.on_set_report(0, ReportType::Output, &[0x02]).is_ok());
        assert_eq!(
            proxy.host().calls.last(),
            Some(&HostCall::SetReport(3, 1, 0, ReportType::Output, vec![0x02]))
        );
        assert!(proxy
            .console()
            .contains("HID SET_REPORT from host PC: report_id 0, type 2, len 1\n02 \n"));

        // Once the first one is gone the next in mount order takes over
        proxy.on_unmount(3, 1);
        let _ = proxy.on_set_report(0, ReportType::Output, &[0x01]);
        assert_eq!(
            proxy.host().calls.last(),
            Some(&HostCall::SetReport(4, 0, 0, ReportType::Output, vec![0x01]))
        );
    }

    // Host that holds one SET_REPORT buffer the way the real stack binding does
    #[derive(Default)]
    struct SlotHost {
        slot: SetReportSlot,
        sent: Vec<Vec<u8>>,
    }

    impl HidHost for SlotHost {
        fn receive_report(&mut self, _dev_addr: u8, _instance: u8) -> Result<(), HostError> {
            Ok(())
        }

        fn set_report(
            &mut self,
            dev_addr: u8,
            instance: u8,
            _report_id: u8,
            _report_type: ReportType,
            data: &[u8],
        ) -> Result<(), HostError> {
            let buf = self.slot.claim(dev_addr, instance, data)?;
            self.sent.push(buf.to_vec());
            Ok(())
        }

        fn set_report_complete(&mut self, dev_addr: u8, instance: u8) {
            self.slot.release(dev_addr, instance);
        }
    }

    #[test]
    fn test_back_to_back_set_report_keeps_first_data() {
        let mut proxy = HidProxy::new(SlotHost::default(), MockDevice::default(), String::new());
        let _ = proxy.on_mount(1, 0, 65);

        assert!(proxy.on_set_report(0, ReportType::Output, &[0x02]).is_ok());
        assert_eq!(
            proxy.on_set_report(0, ReportType::Output, &[0x07]),
            Err(ProxyError::Host(HostError::Rejected))
        );
        // The transfer in flight still sends the first request's bytes
        assert_eq!(proxy.host().slot.data(), &[0x02]);

        let _ = proxy.handle_host_event(&HostEvent::SetReportComplete {
            dev_addr: 1,
            instance: 0,
            len: 1,
        });
        assert!(proxy.on_set_report(0, ReportType::Output, &[0x07]).is_ok());
        assert_eq!(proxy.host().sent, vec![vec![0x02], vec![0x07]]);
    }

    #[test]
    fn test_unmount_releases_set_report() {
        let mut proxy = HidProxy::new(SlotHost::default(), MockDevice::default(), String::new());
        let _ = proxy.on_mount(1, 0, 65);
        let _ = proxy.on_mount(2, 0, 65);
        assert!(proxy.on_set_report(0, ReportType::Output, &[0x01]).is_ok());

        // Unplugged mid-transfer: no completion will come
        proxy.on_unmount(1, 0);
        assert_eq!(proxy.host().slot.owner(), None);
        assert!(proxy.on_set_report(0, ReportType::Output, &[0x02]).is_ok());
        assert_eq!(proxy.host().slot.owner(), Some((2, 0)));
    }

    #[test]
    fn test_set_report_without_device() {
        let mut proxy = proxy();
        assert_eq!(
            proxy.on_set_report(0, ReportType::Output, &[0x02]),
            Err(ProxyError::NoDevice)
        );
        assert!(proxy.host().calls.is_empty());
    }

    #[test]
    fn test_get_report_is_empty() {
        let mut proxy = proxy();
        let mut buf = [0xFFu8; 8];
        assert_eq!(proxy.get_report(0, 0, ReportType::Input, &mut buf), 0);
        assert_eq!(buf, [0xFF; 8]);
    }

    #[test]
    fn test_dispatch() {
        let mut proxy = proxy();
        let events = [
            HostEvent::Mounted {
                dev_addr: 1,
                instance: 0,
                report_descriptor_len: 63,
            },
            HostEvent::Report {
                dev_addr: 1,
                instance: 0,
                report: report_from_slice(&[0x00, 0x00, 0x1D]),
            },
        ];
        for event in &events {
            assert!(proxy.handle_host_event(event).is_ok());
        }

        let command = DeviceCommand::SetReport {
            report_id: 0,
            report_type: ReportType::Output,
            data: report_from_slice(&[0x04]),
        };
        assert!(proxy.handle_device_command(&command).is_ok());

        let _ = proxy.handle_host_event(&HostEvent::SetReportComplete {
            dev_addr: 1,
            instance: 0,
            len: 1,
        });
        let _ = proxy.handle_host_event(&HostEvent::Unmounted {
            dev_addr: 1,
            instance: 0,
        });
        assert!(proxy.mounted().is_empty());

        let (host, device, _) = proxy.into_parts();
        assert_eq!(
            host.calls,
            vec![
                HostCall::Receive(1, 0),
                HostCall::Receive(1, 0),
                HostCall::SetReport(1, 0, 0, ReportType::Output, vec![0x04]),
                HostCall::SetReportComplete(1, 0),
                HostCall::SetReportComplete(1, 0),
            ]
        );
        assert_eq!(device.sent, vec![(0, vec![0x00, 0x00, 0x1D])]);
    }

    #[test]
    fn test_mount_table_capacity() {
        let mut table = MountTable::new();
        for i in 0..MAX_HOST_HID_INSTANCES as u8 {
            assert!(table.insert(1, i));
        }
        assert!(!table.insert(2, 0));
        // Re-inserting a known interface is not an error
        assert!(table.insert(1, 0));
        assert_eq!(table.len(), MAX_HOST_HID_INSTANCES);
        assert_eq!(table.first(), Some((1, 0)));
    }
}

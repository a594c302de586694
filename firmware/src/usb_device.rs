//! Device role: composite CDC-ACM + HID keyboard on the native USB port.
//!
//! Interfaces 0 and 1 are the CDC debug console, interface 2 is the HID
//! keyboard that replays reports from the host role. The identity, report
//! descriptor and endpoint sizes come from [`hid_proxy_core`].
//!
//! The CDC function is laid out here from the core descriptor pieces: its
//! class-specific descriptors, its interface string and its endpoint
//! addresses are the ones in [`CONFIGURATION_DESCRIPTOR`]. embassy-usb puts
//! an interface association in front of every function of a composite
//! device, so the served configuration carries one more (8 bytes) ahead of
//! the HID interface than the core table does.
//!
//! [`CONFIGURATION_DESCRIPTOR`]: hid_proxy_core::descriptor::CONFIGURATION_DESCRIPTOR

use crate::queues::{post_device_command, FORWARDED_REPORTS};
use defmt::{info, warn};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_usb::class::hid::{
    Config as HidConfig, HidBootProtocol, HidSubclass, HidWriter, ReportId, RequestHandler,
    State as HidState,
};
use embassy_usb::control::{InResponse, OutResponse, Recipient, Request, RequestType};
use embassy_usb::driver::EndpointAddress;
use embassy_usb::types::{InterfaceNumber, StringIndex};
use embassy_usb::{Builder, Config as UsbConfig, Handler, UsbDevice};
use hid_proxy_core::config::{
    CDC_EP_BUFSIZE, CDC_NOTIF_EP_SIZE, CDC_NOTIF_POLL_MS, EP0_SIZE, EPNUM_CDC_IN,
    EPNUM_CDC_NOTIF, EPNUM_CDC_OUT, HID_EP_BUFSIZE, HID_POLL_MS, MAX_REPORT_LEN, USB_BCD_DEVICE,
    USB_MAX_POWER_MA, USB_PID, USB_VID,
};
use hid_proxy_core::descriptor::{
    class, CDC_FUNCTIONAL_DESCRIPTORS, CDC_STRING_INDEX, HID_REPORT_DESCRIPTOR, ITF_CDC_CONTROL,
};
use hid_proxy_core::host::report_from_slice;
use hid_proxy_core::{
    CdcControl, DescriptorSet, DeviceCommand, DeviceError, HexDump, HidDevice, ReportType,
    StringTable,
};
use portable_atomic::{AtomicBool, Ordering};
use static_cell::StaticCell;

/// The native USB driver.
pub type UsbDriver = Driver<'static, USB>;

/// IN endpoint of the native USB driver.
pub type UsbEndpointIn = <UsbDriver as embassy_usb::driver::Driver<'static>>::EndpointIn;

/// OUT endpoint of the native USB driver.
pub type UsbEndpointOut = <UsbDriver as embassy_usb::driver::Driver<'static>>::EndpointOut;

/// HID writer sized to the HID endpoint buffer.
pub type KeyboardWriter = HidWriter<'static, UsbDriver, MAX_REPORT_LEN>;

static CONFIG_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static BOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static MSOS_DESCRIPTOR: StaticCell<[u8; 256]> = StaticCell::new();
static CONTROL_BUF: StaticCell<[u8; 64]> = StaticCell::new();

static HID_STATE: StaticCell<HidState> = StaticCell::new();
static REQUEST_HANDLER: StaticCell<KeyboardRequestHandler> = StaticCell::new();
static DEVICE_HANDLER: StaticCell<DeviceStateHandler> = StaticCell::new();
static CDC_HANDLER: StaticCell<CdcControlHandler> = StaticCell::new();

static CONFIGURED: AtomicBool = AtomicBool::new(false);

/// Tracks whether the PC has configured the device and serves the strings
/// embassy-usb does not know about.
struct DeviceStateHandler {
    descriptors: DescriptorSet<'static>,
}

impl Handler for DeviceStateHandler {
    fn configured(&mut self, configured: bool) {
        CONFIGURED.store(configured, Ordering::Release);
        info!("USB device configured: {}", configured);
    }

    fn reset(&mut self) {
        CONFIGURED.store(false, Ordering::Release);
    }

    fn get_string(&mut self, index: StringIndex, _lang_id: u16) -> Option<&str> {
        self.descriptors.strings().get(u8::from(index))
    }
}

/// Class requests addressed to the CDC control interface.
struct CdcControlHandler {
    comm_if: InterfaceNumber,
    control: CdcControl,
}

impl CdcControlHandler {
    fn is_ours(&self, req: &Request) -> bool {
        req.request_type == RequestType::Class
            && req.recipient == Recipient::Interface
            && req.index == u16::from(self.comm_if.0)
    }
}

impl Handler for CdcControlHandler {
    fn reset(&mut self) {
        self.control = CdcControl::new();
    }

    fn control_out(&mut self, req: Request, data: &[u8]) -> Option<OutResponse> {
        if !self.is_ours(&req) {
            return None;
        }

        let dtr = self.control.dtr();
        let accepted = self.control.control_out(req.request, req.value, data);
        if self.control.dtr() != dtr {
            info!("CDC DTR: {}", self.control.dtr());
        }

        Some(if accepted {
            OutResponse::Accepted
        } else {
            OutResponse::Rejected
        })
    }

    fn control_in<'a>(&'a mut self, req: Request, buf: &'a mut [u8]) -> Option<InResponse<'a>> {
        if !self.is_ours(&req) {
            return None;
        }

        Some(match self.control.control_in(req.request, buf) {
            Some(n) => InResponse::Accepted(&buf[..n]),
            None => InResponse::Rejected,
        })
    }
}

/// HID control requests from the PC.
///
/// GET_REPORT is not served. SET_REPORT (LED state) is queued for the host
/// role, which passes it on to the physical keyboard.
pub struct KeyboardRequestHandler;

impl RequestHandler for KeyboardRequestHandler {
    fn get_report(&mut self, _id: ReportId, _buf: &mut [u8]) -> Option<usize> {
        None
    }

    fn set_report(&mut self, id: ReportId, data: &[u8]) -> OutResponse {
        let (report_type, report_id) = match id {
            ReportId::In(id) => (ReportType::Input, id),
            ReportId::Out(id) => (ReportType::Output, id),
            ReportId::Feature(id) => (ReportType::Feature, id),
        };

        post_device_command(DeviceCommand::SetReport {
            report_id,
            report_type,
            data: report_from_slice(data),
        });
        OutResponse::Accepted
    }

    fn set_idle_ms(&mut self, _id: Option<ReportId>, _duration_ms: u32) {}

    fn get_idle_ms(&mut self, _id: Option<ReportId>) -> Option<u32> {
        None
    }
}

/// Endpoints of the CDC-ACM console function.
pub struct CdcEndpoints {
    /// Serial state notifications; never written.
    pub notify: UsbEndpointIn,
    /// Text from the PC; ignored.
    pub data_out: UsbEndpointOut,
    /// Console text to the PC.
    pub data_in: UsbEndpointIn,
}

/// Build result: the device runner and the class endpoints.
pub struct ProxyUsb {
    pub device: UsbDevice<'static, UsbDriver>,
    pub keyboard: KeyboardWriter,
    pub console: CdcEndpoints,
}

/// Add the CDC-ACM console function.
fn add_cdc(builder: &mut Builder<'static, UsbDriver>) -> CdcEndpoints {
    let cdc_string = builder.string();
    if u8::from(cdc_string) != CDC_STRING_INDEX {
        warn!("CDC interface string landed on index {}", u8::from(cdc_string));
    }

    let mut func = builder.function(class::CDC, class::CDC_SUBCLASS_ACM, class::CDC_PROTOCOL_NONE);

    // Control interface: functional descriptors + notification endpoint
    let mut iface = func.interface();
    let comm_if = iface.interface_number();
    if comm_if.0 != ITF_CDC_CONTROL {
        warn!("CDC control interface landed on {}", comm_if.0);
    }
    let mut alt = iface.alt_setting(
        class::CDC,
        class::CDC_SUBCLASS_ACM,
        class::CDC_PROTOCOL_NONE,
        Some(cdc_string),
    );
    for desc in CDC_FUNCTIONAL_DESCRIPTORS {
        alt.descriptor(desc[1], &desc[2..]);
    }
    let notify = alt.endpoint_interrupt_in(
        Some(EndpointAddress::from(EPNUM_CDC_NOTIF)),
        CDC_NOTIF_EP_SIZE,
        CDC_NOTIF_POLL_MS,
    );

    // Data interface
    let mut iface = func.interface();
    let mut alt = iface.alt_setting(class::CDC_DATA, 0, 0, None);
    let data_out = alt.endpoint_bulk_out(Some(EndpointAddress::from(EPNUM_CDC_OUT)), CDC_EP_BUFSIZE);
    let data_in = alt.endpoint_bulk_in(Some(EndpointAddress::from(EPNUM_CDC_IN)), CDC_EP_BUFSIZE);
    drop(func);

    builder.handler(CDC_HANDLER.init(CdcControlHandler {
        comm_if,
        control: CdcControl::new(),
    }));

    CdcEndpoints {
        notify,
        data_out,
        data_in,
    }
}

/// Build the composite device.
///
/// Must be called exactly once; all static buffers are consumed here.
pub fn init(driver: UsbDriver, strings: StringTable<'static>) -> ProxyUsb {
    let mut usb_config = UsbConfig::new(USB_VID, USB_PID);
    usb_config.manufacturer = Some(strings.manufacturer);
    usb_config.product = Some(strings.product);
    usb_config.serial_number = Some(strings.serial);
    usb_config.device_release = USB_BCD_DEVICE;
    usb_config.max_power = USB_MAX_POWER_MA;
    usb_config.max_packet_size_0 = EP0_SIZE;
    usb_config.supports_remote_wakeup = true;
    // Misc/Common/IAD so the CDC function binds through its association
    usb_config.device_class = class::MISC;
    usb_config.device_sub_class = class::MISC_SUBCLASS_COMMON;
    usb_config.device_protocol = class::MISC_PROTOCOL_IAD;
    usb_config.composite_with_iads = true;

    let mut builder = Builder::new(
        driver,
        usb_config,
        CONFIG_DESCRIPTOR.init([0; 256]),
        BOS_DESCRIPTOR.init([0; 256]),
        MSOS_DESCRIPTOR.init([0; 256]),
        CONTROL_BUF.init([0; 64]),
    );
    builder.handler(DEVICE_HANDLER.init(DeviceStateHandler {
        descriptors: DescriptorSet::new(strings),
    }));

    // CDC first so it takes interfaces 0 and 1 and the low endpoints
    let console = add_cdc(&mut builder);

    // The allocator hands the HID function the next free IN endpoint, 0x83
    let hid_config = HidConfig {
        report_descriptor: &HID_REPORT_DESCRIPTOR,
        request_handler: Some(REQUEST_HANDLER.init(KeyboardRequestHandler)),
        poll_ms: HID_POLL_MS,
        max_packet_size: HID_EP_BUFSIZE,
        hid_subclass: HidSubclass::No,
        hid_boot_protocol: HidBootProtocol::None,
    };
    let keyboard = HidWriter::new(&mut builder, HID_STATE.init(HidState::new()), hid_config);

    let device = builder.build();
    info!(
        "USB device built: {:04x}:{:04x} serial {}",
        USB_VID, USB_PID, strings.serial
    );

    ProxyUsb {
        device,
        keyboard,
        console,
    }
}

/// Run the USB device stack.
pub async fn run_device(mut device: UsbDevice<'static, UsbDriver>) -> ! {
    device.run().await
}

/// Write forwarded reports to the HID IN endpoint.
pub async fn run_keyboard(mut writer: KeyboardWriter) -> ! {
    writer.ready().await;
    info!("HID interface ready, forwarding reports");

    loop {
        let report = FORWARDED_REPORTS.receive().await;
        if let Err(e) = writer.write(&report).await {
            warn!("HID write of [{}] failed: {:?}", HexDump(&report), e);
        }
    }
}

/// The device role as seen from the host loop on core 1.
///
/// Reports are queued for [`run_keyboard`] on core 0.
#[derive(Clone, Copy, Default)]
pub struct ReportForwarder;

impl ReportForwarder {
    /// Check if the PC has configured the device.
    pub fn is_ready(&self) -> bool {
        CONFIGURED.load(Ordering::Acquire)
    }
}

impl HidDevice for ReportForwarder {
    fn send_report(&mut self, _instance: u8, report: &[u8]) -> Result<(), DeviceError> {
        if !self.is_ready() {
            return Err(DeviceError::NotReady);
        }
        if report.len() > MAX_REPORT_LEN {
            return Err(DeviceError::TooLong);
        }
        FORWARDED_REPORTS
            .try_send(report_from_slice(report))
            .map_err(|_| DeviceError::Dropped)
    }
}

//! Host role on core 1: TinyUSB host stack over a PIO USB PHY.
//!
//! Enumeration, hub handling, HID class parsing and the software PHY are all
//! inside the prebuilt `tinyusb_pio_host` library; this module binds to its C
//! API. The stack's callbacks only post [`HostEvent`]s. The loop in [`run`]
//! feeds them to [`HidProxy`] between passes of the stack, so the proxy never
//! re-enters the stack from inside a callback.
//!
//! The library owns PIO0 (TX), PIO1 (RX), DMA channel 0 and GPIO 2/3.
//! [`HostResources`] holds those peripherals so Embassy on core 0 cannot
//! claim them.
//!
//! The library is built against the pico-sdk but runs without its runtime:
//!
//! - Clocks are set up by Embassy, so the library is told `clk_sys` through
//!   `clock_set_reported_hz` before it computes its PIO dividers.
//! - Its own SOF alarm pool is disabled (`skip_alarm_pool`). Hardware alarm 1
//!   of the system timer raises `TIMER_IRQ_1` on core 1 every millisecond
//!   and the handler runs `pio_usb_host_frame`. Embassy's time driver keeps
//!   alarm 0.

use crate::console::ConsoleWriter;
use crate::queues::{post_host_event, DEVICE_COMMANDS, HOST_EVENTS};
use crate::usb_device::ReportForwarder;
use core::ffi::c_void;
use defmt::{error, info, warn};
use embassy_rp::interrupt;
use embassy_rp::interrupt::InterruptExt;
use embassy_rp::pac;
use embassy_rp::peripherals::{DMA_CH0, PIN_2, PIN_3, PIO0, PIO1};
use embassy_rp::Peri;
use hid_proxy_core::config::{HOST_FRAME_US, HOST_PIN_DP, HOST_RHPORT, SYS_CLOCK_HZ};
use hid_proxy_core::host::report_from_slice;
use hid_proxy_core::{
    DeviceCommand, HexDump, HidHost, HidProxy, HostError, HostEvent, ReportType, SetReportSlot,
};
use portable_atomic::{AtomicU32, Ordering};

mod ffi {
    use core::ffi::c_void;

    /// `TUH_CFGID_RPI_PIO_USB_CONFIGURATION` (`OPT_MCU_RP2040 << 8`).
    pub const TUH_CFGID_RPI_PIO_USB_CONFIGURATION: u32 = 1100 << 8;

    /// `clk_sys` in the pico-sdk `clock_index` enum (RP2040).
    pub const CLK_SYS: u32 = 5;

    /// `pio_usb_configuration_t`.
    #[repr(C)]
    pub struct PioUsbConfiguration {
        pub pin_dp: u8,
        pub pio_tx_num: u8,
        pub sm_tx: u8,
        pub tx_ch: u8,
        pub pio_rx_num: u8,
        pub sm_rx: u8,
        pub sm_eop: u8,
        pub alarm_pool: *mut c_void,
        pub debug_pin_rx: i8,
        pub debug_pin_eop: i8,
        pub skip_alarm_pool: bool,
        pub pinout: u32,
    }

    impl PioUsbConfiguration {
        /// `PIO_USB_DEFAULT_CONFIG`.
        pub const DEFAULT: Self = Self {
            pin_dp: 0,
            pio_tx_num: 0,
            sm_tx: 0,
            tx_ch: 0,
            pio_rx_num: 1,
            sm_rx: 0,
            sm_eop: 1,
            alarm_pool: core::ptr::null_mut(),
            debug_pin_rx: -1,
            debug_pin_eop: -1,
            skip_alarm_pool: false,
            pinout: 0, // D+ then D-
        };
    }

    extern "C" {
        pub fn clock_set_reported_hz(clk_index: u32, hz: u32);
        pub fn pio_usb_host_frame();
        pub fn tuh_configure(rhport: u8, cfg_id: u32, cfg_param: *const c_void) -> bool;
        pub fn tuh_init(rhport: u8) -> bool;
        pub fn tuh_task_ext(timeout_ms: u32, in_isr: bool);
        pub fn tuh_hid_receive_report(dev_addr: u8, idx: u8) -> bool;
        pub fn tuh_hid_set_report(
            dev_addr: u8,
            idx: u8,
            report_id: u8,
            report_type: u8,
            report: *mut c_void,
            len: u16,
        ) -> bool;
    }
}

/// Peripherals driven by the host stack library.
pub struct HostResources {
    pub pio_tx: Peri<'static, PIO0>,
    pub pio_rx: Peri<'static, PIO1>,
    pub dma_tx: Peri<'static, DMA_CH0>,
    pub dp: Peri<'static, PIN_2>,
    pub dm: Peri<'static, PIN_3>,
}

/// [`HidHost`] over the TinyUSB host API.
pub struct TusbHost {
    /// Data stage of the SET_REPORT in flight. The stack reads it after
    /// `tuh_hid_set_report` returns, so it stays locked until completion.
    set_report: SetReportSlot,
}

impl TusbHost {
    fn new() -> Self {
        Self {
            set_report: SetReportSlot::new(),
        }
    }
}

impl HidHost for TusbHost {
    fn receive_report(&mut self, dev_addr: u8, instance: u8) -> Result<(), HostError> {
        // SAFETY: plain request into the host stack, called from the core that runs it
        if unsafe { ffi::tuh_hid_receive_report(dev_addr, instance) } {
            Ok(())
        } else {
            Err(HostError::Rejected)
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
        let buf = self.set_report.claim(dev_addr, instance, data)?;

        // SAFETY: the buffer lives in `self`, which the host loop owns for the
        // rest of the program, and stays locked until the stack reports
        // completion or the interface goes away
        let accepted = unsafe {
            ffi::tuh_hid_set_report(
                dev_addr,
                instance,
                report_id,
                report_type.as_u8(),
                buf.as_mut_ptr().cast::<c_void>(),
                buf.len() as u16,
            )
        };
        if accepted {
            Ok(())
        } else {
            self.set_report.release(dev_addr, instance);
            Err(HostError::Rejected)
        }
    }

    fn set_report_complete(&mut self, dev_addr: u8, instance: u8) {
        self.set_report.release(dev_addr, instance);
    }
}

/// Host stack callback: a HID interface was mounted.
#[no_mangle]
pub extern "C" fn tuh_hid_mount_cb(
    dev_addr: u8,
    instance: u8,
    _desc_report: *const u8,
    desc_len: u16,
) {
    post_host_event(HostEvent::Mounted {
        dev_addr,
        instance,
        report_descriptor_len: desc_len,
    });
}

/// Host stack callback: a HID interface was unmounted.
#[no_mangle]
pub extern "C" fn tuh_hid_umount_cb(dev_addr: u8, instance: u8) {
    post_host_event(HostEvent::Unmounted { dev_addr, instance });
}

/// Host stack callback: an IN report arrived.
#[no_mangle]
pub extern "C" fn tuh_hid_report_received_cb(
    dev_addr: u8,
    instance: u8,
    report: *const u8,
    len: u16,
) {
    let data = if report.is_null() {
        &[][..]
    } else {
        // SAFETY: the stack passes its receive buffer, valid for `len` bytes
        // for the duration of the callback; it is copied before returning
        unsafe { core::slice::from_raw_parts(report, usize::from(len)) }
    };

    post_host_event(HostEvent::Report {
        dev_addr,
        instance,
        report: report_from_slice(data),
    });
}

/// Host stack callback: a SET_REPORT control transfer finished.
#[no_mangle]
pub extern "C" fn tuh_hid_set_report_complete_cb(
    dev_addr: u8,
    instance: u8,
    _report_id: u8,
    _report_type: u8,
    len: u16,
) {
    post_host_event(HostEvent::SetReportComplete {
        dev_addr,
        instance,
        len,
    });
}

/// Hardware alarm of the system timer that paces host frames.
const FRAME_ALARM: usize = 1;

/// Timer deadline of the next frame (low 32 bits of the microsecond counter).
static NEXT_FRAME: AtomicU32 = AtomicU32::new(0);

/// Start the 1 ms frame alarm. Its interrupt is taken by the calling core.
fn start_frame_timer() {
    let timer = pac::TIMER;
    let next = timer.timerawl().read().wrapping_add(HOST_FRAME_US);
    NEXT_FRAME.store(next, Ordering::Relaxed);

    timer.inte().modify(|w| w.set_alarm(FRAME_ALARM, true));
    timer.alarm(FRAME_ALARM).write_value(next);

    interrupt::TIMER_IRQ_1.unpend();
    // SAFETY: the handler below only touches the frame alarm and the PIO host
    unsafe { interrupt::TIMER_IRQ_1.enable() };
}

#[interrupt]
fn TIMER_IRQ_1() {
    let timer = pac::TIMER;
    timer.intr().write(|w| w.set_alarm(FRAME_ALARM, true));

    // Keep a fixed 1 ms cadence; after a stall, restart from now
    let now = timer.timerawl().read();
    let mut next = NEXT_FRAME.load(Ordering::Relaxed).wrapping_add(HOST_FRAME_US);
    if now.wrapping_sub(next) as i32 >= 0 {
        next = now.wrapping_add(HOST_FRAME_US);
    }
    NEXT_FRAME.store(next, Ordering::Relaxed);
    timer.alarm(FRAME_ALARM).write_value(next);

    // SAFETY: the alarm pool of the library is disabled, this is the only
    // caller, and it runs on the core that initialised the host
    unsafe { ffi::pio_usb_host_frame() };
}

/// Core 1 entry: bring up the host stack and run the passthrough forever.
pub fn run(resources: HostResources, console: ConsoleWriter) -> ! {
    // Held for the life of the loop so nothing else claims them
    let _resources = resources;

    let sys_hz = embassy_rp::clocks::clk_sys_freq();
    if sys_hz != SYS_CLOCK_HZ {
        error!("clk_sys is {} Hz, PIO USB needs {} Hz", sys_hz, SYS_CLOCK_HZ);
    }
    // SAFETY: only fills the SDK's clock table, read by the PIO divider setup
    unsafe { ffi::clock_set_reported_hz(ffi::CLK_SYS, sys_hz) };

    let mut pio_cfg = ffi::PioUsbConfiguration::DEFAULT;
    pio_cfg.pin_dp = HOST_PIN_DP;
    pio_cfg.skip_alarm_pool = true;

    // SAFETY: the stack copies the configuration before returning
    let configured = unsafe {
        ffi::tuh_configure(
            HOST_RHPORT,
            ffi::TUH_CFGID_RPI_PIO_USB_CONFIGURATION,
            (&pio_cfg as *const ffi::PioUsbConfiguration).cast::<c_void>(),
        )
    };
    if !configured {
        error!("PIO USB configuration rejected");
    }

    // SAFETY: called once, on the core that runs the stack
    if !unsafe { ffi::tuh_init(HOST_RHPORT) } {
        error!("USB host stack failed to start");
    }
    start_frame_timer();
    info!("USB host running on PIO, D+ = GPIO{}", HOST_PIN_DP);

    let mut proxy = HidProxy::new(TusbHost::new(), ReportForwarder, console);

    loop {
        // SAFETY: only core 1 runs the host stack
        unsafe { ffi::tuh_task_ext(u32::MAX, false) };

        while let Ok(event) = HOST_EVENTS.try_receive() {
            if let Err(e) = proxy.handle_host_event(&event) {
                warn!("host event {:?} failed: {:?}", event, e);
            }
        }

        while let Ok(command) = DEVICE_COMMANDS.try_receive() {
            if let Err(e) = proxy.handle_device_command(&command) {
                let DeviceCommand::SetReport { data, .. } = &command;
                warn!("SET_REPORT [{}] failed: {:?}", HexDump(data), e);
            }
        }
    }
}

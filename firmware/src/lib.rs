//! USB HID proxy for RP2040.
//!
//! The firmware reads HID reports from a keyboard on a PIO-driven USB host
//! port and replays them on the native USB port, where the board enumerates
//! as a composite CDC-ACM + HID keyboard.
//!
//! # Hardware Configuration
//!
//! | Function | GPIO | Description |
//! |----------|------|-------------|
//! | Host D+  | 2    | PIO USB host, keyboard side |
//! | Host D-  | 3    | PIO USB host, keyboard side |
//! | USB      | -    | Native USB device, PC side |
//!
//! # Architecture
//!
//! The two USB roles run on separate cores:
//!
//! - **Core 0** (Embassy executor): the device stack, the HID writer that
//!   drains forwarded reports, and the CDC console that drains debug text
//! - **Core 1** (blocking loop): the TinyUSB host stack and the
//!   [`HidProxy`](hid_proxy_core::HidProxy) callbacks. A 1 ms hardware
//!   alarm on core 1 drives the host port's frames.
//!
//! The system clock runs at 120 MHz, a multiple of the 12 Mbit/s full-speed
//! bit rate the PIO PHY is timed from.
//!
//! The cores exchange data only through the queues in [`queues`] and the
//! console pipe.
//!
//! # Modules
//!
//! - [`usb_device`]: Composite device, HID request handler, report writer
//! - [`host`]: TinyUSB host binding and the core 1 loop
//! - [`console`]: Debug text stream over CDC-ACM
//! - [`queues`]: Cross-core queues
//!
//! # Features
//!
//! - **`dev-panic`** (default): Use `panic-probe` for development (prints panic info via RTT)
//! - **`prod-panic`**: Use `panic-reset` for production (silent watchdog reset)

#![no_std]

#[cfg(all(feature = "dev-panic", feature = "prod-panic"))]
compile_error!("Cannot enable both `dev-panic` and `prod-panic` features");

// Re-export core types for convenience
pub use hid_proxy_core::{
    descriptor, CdcControl, DeviceCommand, DeviceError, HidDevice, HidHost, HidProxy, HostError,
    HostEvent, ProxyError, Report, ReportType, StringTable,
};

pub mod console;
pub mod host;
pub mod queues;
pub mod usb_device;

pub use console::{run_console, ConsoleWriter};
pub use host::HostResources;
pub use usb_device::{run_device, run_keyboard, CdcEndpoints, ProxyUsb, ReportForwarder};

//! Platform-agnostic core of the USB HID proxy.
//!
//! The proxy reads HID reports from a physical device attached to a USB host
//! port and replays them on a USB device port, presenting itself to the PC as
//! a composite CDC-ACM + HID keyboard. Both USB stacks are external; this
//! crate holds everything that does not depend on them and can be tested on
//! the host.
//!
//! # Overview
//!
//! - [`cdc`]: CDC-ACM class requests of the console interface
//! - [`config`]: Fixed endpoint numbers, buffer sizes, pins and clocks
//! - [`console`]: CR LF line writer over a non-blocking byte sink
//! - [`descriptor`]: Device, configuration and HID report descriptor tables
//! - [`strings`]: String table and UTF-16 string descriptor encoding
//! - [`hexdump`]: Byte dump used by the debug console
//! - [`host`]: Host-role port trait ([`HidHost`]), its events and the
//!   SET_REPORT buffer slot
//! - [`device`]: Device-role port trait ([`HidDevice`]) and its commands
//! - [`proxy`]: The passthrough callbacks ([`HidProxy`])
//!
//! # Example
//!
//! ```rust
//! use hid_proxy_core::{descriptor, HexDump};
//!
//! assert_eq!(descriptor::device()[0] as usize, descriptor::DEVICE_DESCRIPTOR.len());
//!
//! let mut line = heapless::String::<16>::new();
//! core::fmt::write(&mut line, format_args!("{}", HexDump(&[0x02, 0x04]))).unwrap();
//! assert_eq!(line.as_str(), "02 04 ");
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support (for host testing)
//! - **`defmt`**: Enable defmt formatting (for embedded logging)

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

pub mod cdc;
pub mod config;
pub mod console;
pub mod descriptor;
pub mod device;
pub mod hexdump;
pub mod host;
pub mod proxy;
pub mod strings;

// Re-export main types at crate root
pub use cdc::{CdcControl, LineCoding};
pub use console::{ByteSink, LineWriter};
pub use descriptor::DescriptorSet;
pub use device::{DeviceCommand, DeviceError, HidDevice};
pub use hexdump::HexDump;
pub use host::{HidHost, HostError, HostEvent, Report, ReportType, SetReportSlot};
pub use proxy::{HidProxy, MountTable, ProxyError};
pub use strings::{serial_from_unique_id, StringDescriptorBuffer, StringTable};

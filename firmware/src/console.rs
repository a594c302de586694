//! Debug text console on the CDC-ACM interface.
//!
//! Any core formats into [`ConsoleWriter`], which copies the text into a pipe
//! without blocking. The console task on core 0 drains the pipe into the CDC
//! data endpoint while a terminal is attached. Text that does not fit the
//! pipe is dropped.

use crate::usb_device::CdcEndpoints;
use core::fmt;
use defmt::info;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::pipe::Pipe;
use embassy_usb::driver::{Endpoint, EndpointIn};
use hid_proxy_core::config::{CDC_EP_BUFSIZE, CDC_TX_BUFSIZE};
use hid_proxy_core::{ByteSink, LineWriter};
use portable_atomic::{AtomicU32, Ordering};

static CONSOLE_PIPE: Pipe<CriticalSectionRawMutex, CDC_TX_BUFSIZE> = Pipe::new();
static DROPPED_BYTES: AtomicU32 = AtomicU32::new(0);

/// The console pipe as a [`ByteSink`].
#[derive(Clone, Copy, Default)]
pub struct PipeSink;

impl ByteSink for PipeSink {
    fn try_write(&mut self, bytes: &[u8]) -> usize {
        CONSOLE_PIPE.try_write(bytes).unwrap_or(0)
    }

    fn dropped(&mut self, count: usize) {
        DROPPED_BYTES.fetch_add(count as u32, Ordering::Relaxed);
    }
}

/// Non-blocking writer into the console pipe.
///
/// Line feeds are sent as CR LF so plain serial terminals render lines.
#[derive(Clone, Copy, Default)]
pub struct ConsoleWriter;

impl ConsoleWriter {
    /// Bytes lost because the pipe was full.
    pub fn dropped_bytes() -> u32 {
        DROPPED_BYTES.load(Ordering::Relaxed)
    }
}

impl fmt::Write for ConsoleWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        fmt::Write::write_str(&mut LineWriter(PipeSink), s)
    }
}

/// Drain the console pipe into the CDC data IN endpoint.
pub async fn run_console(endpoints: CdcEndpoints) -> ! {
    let mut ep_in = endpoints.data_in;
    let mut buf = [0u8; CDC_EP_BUFSIZE as usize];

    loop {
        ep_in.wait_enabled().await;
        info!("CDC console attached");

        loop {
            let n = CONSOLE_PIPE.read(&mut buf).await;
            if ep_in.write(&buf[..n]).await.is_err() {
                break;
            }
        }

        info!(
            "CDC console detached ({} bytes dropped so far)",
            ConsoleWriter::dropped_bytes()
        );
    }
}

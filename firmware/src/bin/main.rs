#![no_std]
#![no_main]

use core::fmt::Write;
use defmt::{info, warn};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_rp::bind_interrupts;
use embassy_rp::clocks::{ClockConfig, PllConfig};
use embassy_rp::flash::{Blocking, Flash};
use embassy_rp::multicore::{spawn_core1, Stack};
use embassy_rp::peripherals::USB;
use embassy_rp::usb::Driver;
use embassy_usb::UsbDevice;
use hid_proxy::host::{self, HostResources};
use hid_proxy::usb_device::{self, CdcEndpoints, KeyboardWriter, UsbDriver};
use hid_proxy::{run_console, run_device, run_keyboard, ConsoleWriter, StringTable};
use hid_proxy_core::config::{SYS_PLL, XOSC_HZ};
use hid_proxy_core::serial_from_unique_id;
use static_cell::StaticCell;

#[cfg(feature = "dev-panic")]
use panic_probe as _;
#[cfg(feature = "prod-panic")]
use panic_reset as _;

bind_interrupts!(struct Irqs {
    USBCTRL_IRQ => embassy_rp::usb::InterruptHandler<USB>;
});

const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Stack for the host loop on core 1.
static CORE1_STACK: StaticCell<Stack<8192>> = StaticCell::new();

/// Serial number string, rendered from the flash unique ID.
static SERIAL: StaticCell<heapless::String<16>> = StaticCell::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("HID proxy starting...");

    let p = embassy_rp::init(embassy_rp::config::Config::new(clock_config()));

    // Read the chip ID before core 1 runs: flash commands stall XIP on both cores
    let mut flash = Flash::<_, Blocking, FLASH_SIZE>::new_blocking(p.FLASH);
    let mut uid = [0u8; 8];
    let serial: &'static str = match flash.blocking_unique_id(&mut uid) {
        Ok(()) => SERIAL.init(serial_from_unique_id(&uid)).as_str(),
        Err(e) => {
            warn!("Flash unique ID unavailable: {:?}", e);
            StringTable::DEFAULT.serial
        }
    };
    let strings = StringTable::DEFAULT.with_serial(serial);

    // --- Device role (core 0) ---
    let usb = usb_device::init(Driver::new(p.USB, Irqs), strings);

    spawner.spawn(usb_task(usb.device).unwrap());
    spawner.spawn(keyboard_task(usb.keyboard).unwrap());
    spawner.spawn(console_task(usb.console).unwrap());

    let _ = writeln!(ConsoleWriter, "USB HID proxy");

    // --- Host role (core 1) ---
    let resources = HostResources {
        pio_tx: p.PIO0,
        pio_rx: p.PIO1,
        dma_tx: p.DMA_CH0,
        dp: p.PIN_2,
        dm: p.PIN_3,
    };
    spawn_core1(p.CORE1, CORE1_STACK.init(Stack::new()), move || {
        host::run(resources, ConsoleWriter)
    });

    info!("HID proxy initialized, waiting for devices...");
}

/// Clocks for the PIO USB PHY: crystal reference, system PLL at 120 MHz.
fn clock_config() -> ClockConfig {
    let mut clocks = ClockConfig::crystal(XOSC_HZ);
    if let Some(xosc) = clocks.xosc.as_mut() {
        xosc.sys_pll = Some(PllConfig {
            refdiv: SYS_PLL.refdiv,
            fbdiv: SYS_PLL.fbdiv,
            post_div1: SYS_PLL.post_div1,
            post_div2: SYS_PLL.post_div2,
        });
    }
    clocks
}

/// USB device task - runs the device stack.
#[embassy_executor::task]
async fn usb_task(device: UsbDevice<'static, UsbDriver>) {
    run_device(device).await
}

/// HID task - writes reports forwarded by core 1 to the PC.
#[embassy_executor::task]
async fn keyboard_task(writer: KeyboardWriter) {
    run_keyboard(writer).await
}

/// Console task - streams debug text over CDC.
#[embassy_executor::task]
async fn console_task(endpoints: CdcEndpoints) {
    run_console(endpoints).await
}

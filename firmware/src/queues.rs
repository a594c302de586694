//! Queues shared by the two cores.
//!
//! Core 0 runs the device stack under Embassy, core 1 runs the blocking host
//! loop. Everything that crosses between them goes through one of these
//! statics. The mutex is the RP2040 critical section (interrupts off plus a
//! hardware spinlock), so they are safe to use from both cores.
//!
//! Core 1 never awaits: it only uses the `try_*` operations and drops on a
//! full queue rather than stall the host stack.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use hid_proxy_core::{DeviceCommand, HostEvent, Report};
use portable_atomic::{AtomicU32, Ordering};

/// Events posted by the host stack callbacks (core 1 to core 1).
pub static HOST_EVENTS: Channel<CriticalSectionRawMutex, HostEvent, 8> = Channel::new();

/// Reports on their way to the PC (core 1 to core 0).
pub static FORWARDED_REPORTS: Channel<CriticalSectionRawMutex, Report, 8> = Channel::new();

/// SET_REPORT requests from the PC (core 0 to core 1).
pub static DEVICE_COMMANDS: Channel<CriticalSectionRawMutex, DeviceCommand, 4> = Channel::new();

static DROPPED_HOST_EVENTS: AtomicU32 = AtomicU32::new(0);
static DROPPED_DEVICE_COMMANDS: AtomicU32 = AtomicU32::new(0);

/// Post a host stack event, counting it if the queue is full.
pub fn post_host_event(event: HostEvent) {
    if HOST_EVENTS.try_send(event).is_err() {
        let dropped = DROPPED_HOST_EVENTS.fetch_add(1, Ordering::Relaxed) + 1;
        defmt::warn!("host event queue full, {} dropped", dropped);
    }
}

/// Post a command for the host role, counting it if the queue is full.
pub fn post_device_command(command: DeviceCommand) {
    if DEVICE_COMMANDS.try_send(command).is_err() {
        let dropped = DROPPED_DEVICE_COMMANDS.fetch_add(1, Ordering::Relaxed) + 1;
        defmt::warn!("device command queue full, {} dropped", dropped);
    }
}

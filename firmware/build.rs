//! Build script - copies the linker script into the output directory and
//! points the linker at the prebuilt TinyUSB host stack.

use std::env;
use std::fs;
use std::path::PathBuf;

/// Static library holding TinyUSB (host role) and Pico-PIO-USB.
const TUSB_LIB: &str = "tinyusb_pio_host";

fn main() {
    let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());

    // Copy memory.x to OUT_DIR
    fs::copy("memory.x", out_dir.join("memory.x")).unwrap();
    println!("cargo:rustc-link-search={}", out_dir.display());

    match env::var("HID_PROXY_TUSB_LIB_DIR") {
        Ok(dir) => println!("cargo:rustc-link-search=native={dir}"),
        Err(_) => println!(
            "cargo:warning=HID_PROXY_TUSB_LIB_DIR is not set; lib{TUSB_LIB}.a must already be on the link path"
        ),
    }
    println!("cargo:rustc-link-lib=static={TUSB_LIB}");

    println!("cargo:rerun-if-env-changed=HID_PROXY_TUSB_LIB_DIR");
    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}

//! Build script - wires the ESP32 linker scripts into the firmware image.
//!
//! Only the `[[bin]]` target is linked against `linkall.x` / `defmt.x`, and
//! only when the `embedded` feature is on, so host `cargo test` runs see
//! nothing from here.

use std::env;

fn main() {
    if env::var_os("CARGO_FEATURE_EMBEDDED").is_some() {
        println!("cargo:rustc-link-arg-bins=-Tlinkall.x");
        println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    }

    println!("cargo:rerun-if-changed=build.rs");
}

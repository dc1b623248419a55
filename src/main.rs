#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod board;
#[cfg(target_os = "none")]
mod firmware;

// The firmware only exists for the RP2040. Host builds get an empty binary
// so the library and its tests build with a plain `cargo test`.
#[cfg(not(target_os = "none"))]
fn main() {}

#![cfg_attr(not(test), no_std)]
//! Input and profile core for a dual-joystick macro keyboard.
//!
//! Everything in here is hardware agnostic: the board, the host keyboard
//! framework, non-volatile storage and the touchscreen are injected through
//! the traits in [`hal`], [`host`], [`embedded_storage`] and [`touch`]. The
//! RP2040 binary in `main.rs` wires them to real peripherals.

#[macro_use]
mod fmt;

pub mod analog;
pub mod combo;
pub mod config;
pub mod controller;
pub mod hal;
pub mod helpers;
pub mod host;
pub mod joystick;
pub mod matrix;
pub mod profile;
pub mod touch;
pub mod tracker;

#[cfg(test)]
mod testing;

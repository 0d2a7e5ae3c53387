//! Platform layer for the DDR PHY training controller.
//!
//! This crate provides the pieces the training core consumes but does not
//! own: the 16-bit register access abstraction over the PHY's CSR window,
//! and the DRAM topology description that value-resolution functions read.
//!
//! # Architecture Layers
//!
//! ```text
//! Boot entry (board support, selects training method)
//!         ↓
//! Training core (ddr-training: sections, mailbox, sequencer)
//!         ↓
//! Platform (this crate - register access + topology)
//!         ↓
//! Hardware (PHY CSR window, memory mapped)
//! ```
//!
//! # Features
//!
//! - `std`: Enable the host register-file mocks outside of tests
//! - `hardware`: Enable the volatile MMIO register block
//! - `defmt`: Enable defmt logging derives

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer defmt/tracing over println! in lib code
// Pedantic lints suppressed for this hardware crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // register accessors, callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod registers;
pub mod topology;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

pub use registers::{PhyRegisters, RegisterError};
pub use topology::{DdrFreq, DeviceWidth, DramTopology, Ohm};

#[cfg(feature = "hardware")]
pub use registers::MmioPhy;

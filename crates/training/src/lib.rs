//! DDR PHY training core.
//!
//! Drives the PHY's training microcontroller (PMU) through configuration,
//! 1D and 2D training and PHY init engine programming.
//!
//! # Architecture
//!
//! ```text
//! Sequencer (state machine, run evaluation)
//!     ├── Section loader (static → static update → dynamic update)
//!     │       └── value functions (topology → register values)
//!     ├── Mailbox (polled handshake, message classification, message log)
//!     └── Result log (message-block fields per committed run)
//!             ↓
//! platform::PhyRegisters (16-bit CSR window)
//! ```
//!
//! # Features
//!
//! - `std`: host builds; exposes [`mocks::SimulatedPmu`] outside of tests
//! - `hardware`: MMIO register block and defmt logging
//! - `defmt`: log through defmt
//! - `tracing`: log through tracing (ignored when `defmt` is on)
//!
//! # Example
//!
//! ```ignore
//! static mut MESSAGES: MessageLog = MessageLog::new();
//!
//! let images = FirmwareImages { /* vendor images */ };
//! let messages = unsafe { &mut *core::ptr::addr_of_mut!(MESSAGES) };
//! let mut sequencer = Sequencer::new(phy, delay, images.sections(), topology, TrainingConfig::default(), messages);
//! sequencer.run()?;
//! ```

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
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::print_stdout)] // prefer defmt/tracing over println! in lib code
#![allow(clippy::doc_markdown)] // register names in doc comments
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// must come first: the logging macros are textually scoped
mod fmt;

pub mod config;
pub mod error;
pub mod mailbox;
pub mod regs;
pub mod results;
pub mod section;
pub mod sequencer;
pub mod state;
pub mod tables;
pub mod values;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

pub use config::{TrainingConfig, TrainingMethod};
pub use error::{TrainingError, Violation};
pub use mailbox::{Mailbox, MailboxMessage, MajorMessage, MessageLog, StreamFormat};
pub use results::{ResultId, ResultLog, MAX_RUN_COUNT};
pub use section::{load_section, Section, SectionId, SectionSet, UpdateContext};
pub use sequencer::{MessageBlockEvaluator, RunEvaluator, RunOutcome, RunReport, Sequencer, TrainingContext};
pub use state::{SequenceCtrl, TrainingState};
pub use tables::FirmwareImages;

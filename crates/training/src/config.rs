//! Training configuration.
//!
//! The poll bound, poll interval and message log size are provisional
//! values carried over from bring-up; they are inputs, not architectural
//! limits, and every layer reads them from here.

use core::fmt;

use crate::mailbox::StreamFormat;

/// Default number of mailbox status polls before giving up.
pub const DEFAULT_MAILBOX_RETRY_COUNT: u32 = 20_000;

/// Default delay between mailbox status polls, in microseconds.
pub const DEFAULT_POLLING_DELAY_US: u32 = 500;

/// Default number of RETRY evaluations tolerated per training step.
pub const DEFAULT_MAX_STEP_RETRIES: u8 = 3;

/// Default message log capacity (records per firmware run).
pub const DEFAULT_MESSAGE_LOG_CAPACITY: usize = 1000;

/// How the 1D and 2D states are split into firmware runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrainingMethod {
    /// One firmware run per sub-step, evaluated after each.
    #[default]
    StepByStep,
    /// One firmware run per state with every sub-step enabled.
    Full,
}

impl fmt::Display for TrainingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StepByStep => f.write_str("step-by-step"),
            Self::Full => f.write_str("full sequence"),
        }
    }
}

/// Sequencer configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TrainingConfig {
    /// Step-by-step or full-sequence execution.
    pub method: TrainingMethod,
    /// Mailbox status polls before a read times out.
    pub mailbox_retry_count: u32,
    /// Delay between mailbox status polls, in microseconds.
    pub polling_delay_us: u32,
    /// RETRY evaluations tolerated per step before training fails.
    pub max_step_retries: u8,
    /// Records kept per firmware run (clamped to the log's compile-time
    /// capacity).
    pub message_log_capacity: usize,
    /// Stream-format table from the firmware's strings file. Empty by
    /// default: stream messages are then logged with raw ids and arguments.
    pub stream_formats: &'static [StreamFormat],
}

impl TrainingConfig {
    /// Default configuration with the given method.
    pub const fn with_method(method: TrainingMethod) -> Self {
        Self {
            method,
            mailbox_retry_count: DEFAULT_MAILBOX_RETRY_COUNT,
            polling_delay_us: DEFAULT_POLLING_DELAY_US,
            max_step_retries: DEFAULT_MAX_STEP_RETRIES,
            message_log_capacity: DEFAULT_MESSAGE_LOG_CAPACITY,
            stream_formats: &[],
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self::with_method(TrainingMethod::default())
    }
}

//! Training error type.

use core::fmt;

use crate::results::ResultId;
use crate::section::SectionId;
use crate::state::{SequenceCtrl, TrainingState};

/// Legacy return code for a mailbox poll that exceeded its retry bound.
pub const MAILBOX_ERROR_CODE: i32 = -100;

/// Errors raised by the training core.
///
/// Only [`TrainingError::RegisterTimeout`] is recovered from, and only by the
/// sequencer (the run is evaluated as failed). Everything else aborts the
/// boot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrainingError {
    /// Mailbox poll exceeded the retry bound.
    #[error("mailbox poll of {address:#x} exceeded the retry bound")]
    RegisterTimeout {
        /// Register being polled
        address: u32,
    },
    /// Framing mismatch with the PMU firmware, or a bad result lookup.
    #[error("protocol violation: {0}")]
    ProtocolViolation(Violation),
    /// A value function has no case for the board configuration.
    #[error("unsupported configuration: {parameter}")]
    UnsupportedConfiguration {
        /// Topology parameter that has no matching case
        parameter: &'static str,
    },
    /// The PMU reported failure, or the run evaluation failed.
    #[error("training failed in {state} (sequence {sequence})")]
    TrainingFailed {
        /// State being trained
        state: TrainingState,
        /// Step active when training failed
        sequence: SequenceCtrl,
    },
    /// The register access layer rejected an access.
    #[error("register access to {address:#x} failed")]
    RegisterAccess {
        /// Word offset of the failed access
        address: u32,
    },
    /// A section was defined without static data.
    #[error("section {section} has an empty static table")]
    EmptySection {
        /// Offending section
        section: SectionId,
    },
    /// A bounded log is full.
    #[error("{log} is full ({capacity} entries)")]
    CapacityExceeded {
        /// Which log
        log: LogKind,
        /// Its capacity
        capacity: usize,
    },
}

impl TrainingError {
    /// Legacy integer code: `-100` for a mailbox timeout, `-1` otherwise.
    pub const fn code(&self) -> i32 {
        match self {
            Self::RegisterTimeout { .. } => MAILBOX_ERROR_CODE,
            _ => -1,
        }
    }
}

impl From<Violation> for TrainingError {
    fn from(violation: Violation) -> Self {
        Self::ProtocolViolation(violation)
    }
}

/// Protocol violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Violation {
    /// Stream message announced more arguments than the protocol allows.
    ArgumentCount {
        /// Announced count
        count: u32,
    },
    /// Log record starts with neither the stream nor the major marker.
    UnknownMarker {
        /// Field 0 of the record
        marker: u32,
    },
    /// Log record carries a verbosity level outside the known range.
    UnknownLogLevel {
        /// Raw level field
        level: u32,
    },
    /// Log record is shorter than its header announces.
    TruncatedRecord {
        /// Words present
        len: usize,
    },
    /// Result lookup for a run that has not been committed.
    RunOutOfRange {
        /// Requested run
        run: usize,
        /// Runs committed so far
        current: usize,
    },
    /// Result kind not captured by the run's message-block layout.
    UnknownResult {
        /// Requested result
        result: ResultId,
    },
    /// Result lookup with a sequence control the run was not captured under.
    SequenceMismatch {
        /// Sequence control the run was captured under
        captured: SequenceCtrl,
        /// Sequence control requested
        requested: SequenceCtrl,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgumentCount { count } => {
                write!(f, "stream message with {count} arguments")
            }
            Self::UnknownMarker { marker } => write!(f, "unknown record marker {marker:#x}"),
            Self::UnknownLogLevel { level } => write!(f, "unknown log level {level}"),
            Self::TruncatedRecord { len } => write!(f, "truncated record ({len} words)"),
            Self::RunOutOfRange { run, current } => {
                write!(f, "run {run} not committed ({current} runs logged)")
            }
            Self::UnknownResult { result } => {
                write!(f, "{result} is not part of the message-block layout")
            }
            Self::SequenceMismatch { captured, requested } => {
                write!(f, "run captured under sequence {captured}, not {requested}")
            }
        }
    }
}

/// Bounded logs owned by the training core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogKind {
    /// Mailbox message log
    Messages,
    /// Per-run result log
    Results,
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Messages => f.write_str("message log"),
            Self::Results => f.write_str("result log"),
        }
    }
}

//! Mailbox message classification and rendering.
//!
//! The PMU sends two kinds of messages:
//!
//! - **Major**: a single 16-bit milestone code (`0x00..=0xFF`).
//! - **Stream**: the major code `0x08`, followed by a 32-bit header
//!   (`string id << 16 | argument count`) and that many 32-bit arguments,
//!   which fill in a format string from the stream-format table.
//!
//! In the message log each message is stored as a flat record whose first
//! word is a marker outside the major range, so classifying a record never
//! needs more than one comparison:
//!
//! ```text
//! major:  [0xFFFF, id]
//! stream: [0xFFFE, string_id, arg_count, log_level, arg0, arg1, ...]
//! ```

use core::fmt;

use heapless::Vec;

use crate::error::{TrainingError, Violation};

/// Maximum stream message arguments.
pub const MAX_STREAM_ARGS: usize = 36;

/// Record marker of a stream message.
pub const STREAM_RECORD_MARKER: u32 = 0xFFFE;
/// Record marker of a major message.
pub const MAJOR_RECORD_MARKER: u32 = 0xFFFF;

/// Header words of a stream record.
pub const STREAM_HEADER_WORDS: usize = 4;
/// Longest possible record.
pub const MAX_RECORD_WORDS: usize = STREAM_HEADER_WORDS + MAX_STREAM_ARGS;

/// Stream message argument vector.
pub type StreamArgs = Vec<u32, MAX_STREAM_ARGS>;

/// Major message identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MajorMessage {
    /// 0x00
    EndOfInit,
    /// 0x01
    FineWriteLeveling,
    /// 0x02
    ReadEnableTraining,
    /// 0x03
    ReadDelayCenter,
    /// 0x04
    WriteDelayCenter,
    /// 0x05
    WriteDelayCenter2d,
    /// 0x06
    ReadDelayCenter2d,
    /// 0x07
    TrainingSuccess,
    /// 0x08: a stream message follows
    StreamMessage,
    /// 0x09
    MaxReadLatency,
    /// 0x0A
    MaxReadDqDeskew,
    /// 0x0B
    Reserved,
    /// 0x0C
    LrdimmTraining,
    /// 0x0D
    CaTraining,
    /// 0xFD
    MprReadDelayCenter,
    /// 0xFE
    WriteLevelingCoarseDelay,
    /// 0xFF
    TrainingFailed,
    /// Any other identifier; logged, never fatal.
    Unrecognized(u16),
}

impl MajorMessage {
    /// Decode a major identifier.
    pub const fn from_id(id: u16) -> Self {
        match id {
            0x00 => Self::EndOfInit,
            0x01 => Self::FineWriteLeveling,
            0x02 => Self::ReadEnableTraining,
            0x03 => Self::ReadDelayCenter,
            0x04 => Self::WriteDelayCenter,
            0x05 => Self::WriteDelayCenter2d,
            0x06 => Self::ReadDelayCenter2d,
            0x07 => Self::TrainingSuccess,
            0x08 => Self::StreamMessage,
            0x09 => Self::MaxReadLatency,
            0x0A => Self::MaxReadDqDeskew,
            0x0B => Self::Reserved,
            0x0C => Self::LrdimmTraining,
            0x0D => Self::CaTraining,
            0xFD => Self::MprReadDelayCenter,
            0xFE => Self::WriteLevelingCoarseDelay,
            0xFF => Self::TrainingFailed,
            other => Self::Unrecognized(other),
        }
    }

    /// Wire identifier.
    pub const fn id(self) -> u16 {
        match self {
            Self::EndOfInit => 0x00,
            Self::FineWriteLeveling => 0x01,
            Self::ReadEnableTraining => 0x02,
            Self::ReadDelayCenter => 0x03,
            Self::WriteDelayCenter => 0x04,
            Self::WriteDelayCenter2d => 0x05,
            Self::ReadDelayCenter2d => 0x06,
            Self::TrainingSuccess => 0x07,
            Self::StreamMessage => 0x08,
            Self::MaxReadLatency => 0x09,
            Self::MaxReadDqDeskew => 0x0A,
            Self::Reserved => 0x0B,
            Self::LrdimmTraining => 0x0C,
            Self::CaTraining => 0x0D,
            Self::MprReadDelayCenter => 0xFD,
            Self::WriteLevelingCoarseDelay => 0xFE,
            Self::TrainingFailed => 0xFF,
            Self::Unrecognized(id) => id,
        }
    }

    /// Fixed description.
    pub const fn description(self) -> &'static str {
        match self {
            Self::EndOfInit => "end of initialization",
            Self::FineWriteLeveling => "end of fine write leveling",
            Self::ReadEnableTraining => "end of read enable training",
            Self::ReadDelayCenter => "end of read delay center optimization",
            Self::WriteDelayCenter => "end of write delay center optimization",
            Self::WriteDelayCenter2d => "end of 2D write delay/voltage center optimization",
            Self::ReadDelayCenter2d => "end of 2D read delay/voltage center optimization",
            Self::TrainingSuccess => "training has run successfully",
            Self::StreamMessage => "start streaming message mode",
            Self::MaxReadLatency => "end of max read latency training",
            Self::MaxReadDqDeskew => "end of read dq deskew training",
            Self::Reserved => "reserved",
            Self::LrdimmTraining => "end of LRDIMM specific training",
            Self::CaTraining => "end of CA training",
            Self::MprReadDelayCenter => "end of MPR read delay center optimization",
            Self::WriteLevelingCoarseDelay => "end of write leveling coarse delay",
            Self::TrainingFailed => "training has failed",
            Self::Unrecognized(_) => "reserved/unrecognized major message",
        }
    }

    /// Success or failure: the PMU sends nothing after these.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::TrainingSuccess | Self::TrainingFailed)
    }
}

impl fmt::Display for MajorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "major {:#04x}: {}", self.id(), self.description())
    }
}

/// Stream message verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LogLevel {
    /// Most detailed
    Level10,
    /// Detailed
    Level20,
    /// Coarse
    Level30,
    /// Stage completion
    Level40,
    /// Assertion / firmware completion
    Level50,
}

impl LogLevel {
    /// Decode the record field.
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Level10),
            1 => Some(Self::Level20),
            2 => Some(Self::Level30),
            3 => Some(Self::Level40),
            4 => Some(Self::Level50),
            _ => None,
        }
    }

    /// Record field.
    pub const fn raw(self) -> u32 {
        match self {
            Self::Level10 => 0,
            Self::Level20 => 1,
            Self::Level30 => 2,
            Self::Level40 => 3,
            Self::Level50 => 4,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self {
            Self::Level10 => 10,
            Self::Level20 => 20,
            Self::Level30 => 30,
            Self::Level40 => 40,
            Self::Level50 => 50,
        };
        write!(f, "L{level}")
    }
}

/// One entry of a stream-format table.
///
/// The table itself ships with the training firmware as its strings file
/// and is supplied through
/// [`TrainingConfig::stream_formats`](crate::TrainingConfig::stream_formats).
/// Ids missing from the table are logged and rendered raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StreamFormat {
    /// String identifier
    pub id: u16,
    /// Verbosity
    pub level: LogLevel,
    /// printf-style format: `%d`, `%u` and `%x` are substituted in order
    pub format: &'static str,
}

impl StreamFormat {
    /// Table entry.
    pub const fn new(id: u16, level: LogLevel, format: &'static str) -> Self {
        Self { id, level, format }
    }
}

/// Look up a stream string id in `formats`.
pub fn stream_format(formats: &[StreamFormat], id: u16) -> Option<&StreamFormat> {
    formats.iter().find(|entry| entry.id == id)
}

/// A decoded mailbox message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxMessage {
    /// Milestone code
    Major(MajorMessage),
    /// Debug message with arguments
    Stream {
        /// String identifier
        string_id: u16,
        /// Verbosity
        log_level: LogLevel,
        /// Arguments in order
        args: StreamArgs,
    },
}

impl MailboxMessage {
    /// Build a stream message, resolving its level from `formats`.
    ///
    /// Unknown string ids get the lowest verbosity level.
    pub fn stream(formats: &[StreamFormat], string_id: u16, args: StreamArgs) -> Self {
        let log_level = stream_format(formats, string_id).map_or(LogLevel::Level10, |entry| entry.level);
        Self::Stream {
            string_id,
            log_level,
            args,
        }
    }

    /// Terminating major message, if this is one.
    pub fn terminal(&self) -> Option<MajorMessage> {
        match self {
            Self::Major(major) if major.is_terminal() => Some(*major),
            _ => None,
        }
    }

    /// Write the message, substituting stream arguments into their format
    /// from `formats`.
    pub fn render<W: fmt::Write>(&self, out: &mut W, formats: &[StreamFormat]) -> fmt::Result {
        match self {
            Self::Major(major) => write!(out, "{major}"),
            Self::Stream {
                string_id,
                log_level,
                args,
            } => {
                write!(out, "stream [{log_level}] ")?;
                match stream_format(formats, *string_id) {
                    Some(entry) => render_format(out, entry.format, args),
                    None => write!(out, "string {string_id:#06x} args {:x?}", args.as_slice()),
                }
            }
        }
    }
}

/// Renders stream messages raw; see [`MailboxMessage::render`].
impl fmt::Display for MailboxMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, &[])
    }
}

/// Write `format` with `%d`, `%u` and `%x` replaced by `args` in order.
///
/// `%%` is a literal percent; placeholders without an argument render as
/// `<?>`; surplus arguments are ignored.
pub fn render_format<W: fmt::Write>(out: &mut W, format: &str, args: &[u32]) -> fmt::Result {
    let mut args = args.iter();
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.write_char(c)?;
            continue;
        }
        match chars.next() {
            Some('%') => out.write_char('%')?,
            Some(spec @ ('d' | 'u' | 'x')) => match args.next() {
                Some(&arg) => match spec {
                    'd' => write!(out, "{}", i32::from_ne_bytes(arg.to_ne_bytes()))?,
                    'u' => write!(out, "{arg}")?,
                    _ => write!(out, "{arg:x}")?,
                },
                None => out.write_str("<?>")?,
            },
            Some(other) => {
                out.write_char('%')?;
                out.write_char(other)?;
            }
            None => out.write_char('%')?,
        }
    }
    Ok(())
}

/// Flat message log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    words: Vec<u32, MAX_RECORD_WORDS>,
}

impl MessageRecord {
    /// Encode a message.
    pub fn from_message(message: &MailboxMessage) -> Self {
        let mut words = Vec::new();
        match message {
            MailboxMessage::Major(major) => {
                // capacity is at least 2
                let _ = words.push(MAJOR_RECORD_MARKER);
                let _ = words.push(u32::from(major.id()));
            }
            MailboxMessage::Stream {
                string_id,
                log_level,
                args,
            } => {
                let count = u32::try_from(args.len()).unwrap_or(u32::MAX);
                for word in [STREAM_RECORD_MARKER, u32::from(*string_id), count, log_level.raw()] {
                    let _ = words.push(word);
                }
                // header + MAX_STREAM_ARGS fits by construction
                let _ = words.extend_from_slice(args);
            }
        }
        Self { words }
    }

    /// Copy a record from raw words, classifying it first.
    pub fn from_words(words: &[u32]) -> Result<Self, TrainingError> {
        classify(words)?;
        let words = Vec::from_slice(words).map_err(|_| Violation::TruncatedRecord { len: words.len() })?;
        Ok(Self { words })
    }

    /// Raw words.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    /// Decode the record.
    pub fn classify(&self) -> Result<MailboxMessage, TrainingError> {
        classify(&self.words)
    }
}

/// Classify a flat log record by its marker word.
///
/// A stream record announcing more than [`MAX_STREAM_ARGS`] arguments is
/// rejected before its arguments are looked at.
pub fn classify(words: &[u32]) -> Result<MailboxMessage, TrainingError> {
    let truncated = || TrainingError::from(Violation::TruncatedRecord { len: words.len() });

    match words {
        [] => Err(truncated()),
        [MAJOR_RECORD_MARKER, id, ..] => {
            let id = u16::try_from(*id).map_err(|_| Violation::UnknownMarker { marker: *id })?;
            Ok(MailboxMessage::Major(MajorMessage::from_id(id)))
        }
        [MAJOR_RECORD_MARKER] => Err(truncated()),
        [STREAM_RECORD_MARKER, string_id, count, level, rest @ ..] => {
            let announced = *count;
            let count = usize::try_from(announced)
                .ok()
                .filter(|&n| n <= MAX_STREAM_ARGS)
                .ok_or(Violation::ArgumentCount { count: announced })?;
            let log_level =
                LogLevel::from_raw(*level).ok_or(Violation::UnknownLogLevel { level: *level })?;
            let string_id = u16::try_from(*string_id)
                .map_err(|_| Violation::UnknownMarker { marker: *string_id })?;
            let args = rest.get(..count).ok_or_else(truncated)?;
            let args = Vec::from_slice(args).map_err(|_| truncated())?;
            Ok(MailboxMessage::Stream {
                string_id,
                log_level,
                args,
            })
        }
        [STREAM_RECORD_MARKER, ..] => Err(truncated()),
        [marker, ..] => Err(Violation::UnknownMarker { marker: *marker }.into()),
    }
}

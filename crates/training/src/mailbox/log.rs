//! Bounded mailbox message log.

use core::fmt;

use heapless::Vec;

use super::message::{MailboxMessage, MessageRecord, StreamFormat};
use crate::config::DEFAULT_MESSAGE_LOG_CAPACITY;
use crate::error::{LogKind, TrainingError};

/// Ordered log of the messages of one firmware run.
///
/// Appends never overwrite: once `limit` records are held, further appends
/// fail with [`TrainingError::CapacityExceeded`] until [`MessageLog::reset`].
/// At the default capacity this is ~170 KB: keep it in a `static` and lend
/// it to the [`Sequencer`](crate::Sequencer), never as a local on a boot
/// stack.
pub struct MessageLog<const N: usize = DEFAULT_MESSAGE_LOG_CAPACITY> {
    records: Vec<MessageRecord, N>,
    limit: usize,
    formats: &'static [StreamFormat],
}

impl<const N: usize> MessageLog<N> {
    /// Empty log using the full capacity `N`.
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            limit: N,
            formats: &[],
        }
    }

    /// Empty log holding at most `min(limit, N)` records.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            records: Vec::new(),
            limit: limit.min(N),
            formats: &[],
        }
    }

    /// Change the effective capacity to `min(limit, N)`.
    ///
    /// Records already held are kept; appends fail until the log is reset
    /// below the new limit.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.min(N);
    }

    /// Render stream messages with the texts in `formats`.
    pub fn set_stream_formats(&mut self, formats: &'static [StreamFormat]) {
        self.formats = formats;
    }

    /// Start a new logging session.
    pub fn reset(&mut self) {
        self.records.clear();
    }

    /// Append a message at the write cursor.
    pub fn append(&mut self, message: &MailboxMessage) -> Result<(), TrainingError> {
        let full = TrainingError::CapacityExceeded {
            log: LogKind::Messages,
            capacity: self.limit,
        };
        if self.records.len() >= self.limit {
            return Err(full);
        }
        self.records
            .push(MessageRecord::from_message(message))
            .map_err(|_| full)
    }

    /// Records in arrival order.
    pub fn records(&self) -> &[MessageRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing was logged this session.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Effective capacity.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Render every record, one per line, in arrival order.
    ///
    /// A record that fails to classify is rendered with its error instead of
    /// stopping the dump.
    pub fn render<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        for (index, record) in self.records.iter().enumerate() {
            match record.classify() {
                Ok(message) => {
                    write!(out, "{index:4}: ")?;
                    message.render(out, self.formats)?;
                    out.write_char('\n')?;
                }
                Err(err) => writeln!(out, "{index:4}: <{err}>")?,
            }
        }
        Ok(())
    }

    /// Emit every record to the log sink at info level.
    pub fn dump(&self) {
        for (index, record) in self.records.iter().enumerate() {
            let mut line: heapless::String<256> = heapless::String::new();
            // a line longer than the buffer is cut short, not dropped
            let _ = match record.classify() {
                Ok(message) => message.render(&mut line, self.formats),
                Err(err) => fmt::write(&mut line, format_args!("<{err}>")),
            };
            info!("mailbox {}: {}", index, line.as_str());
        }
    }
}

impl<const N: usize> Default for MessageLog<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::mailbox::message::{MajorMessage, StreamArgs};
    use crate::mocks::SAMPLE_STREAM_FORMATS;

    fn major(id: u16) -> MailboxMessage {
        MailboxMessage::Major(MajorMessage::from_id(id))
    }

    #[test]
    fn test_append_past_limit_fails_without_overwrite() {
        let mut log: MessageLog<4> = MessageLog::with_limit(2);
        log.append(&major(0x00)).unwrap();
        log.append(&major(0x01)).unwrap();
        assert_eq!(
            log.append(&major(0x07)),
            Err(TrainingError::CapacityExceeded {
                log: LogKind::Messages,
                capacity: 2
            })
        );
        assert_eq!(log.len(), 2);
        assert_eq!(log.records()[1].classify().unwrap(), major(0x01));
    }

    #[test]
    fn test_limit_is_clamped_to_capacity() {
        let log: MessageLog<8> = MessageLog::with_limit(1000);
        assert_eq!(log.limit(), 8);
    }

    #[test]
    fn test_set_limit_reclamps_a_borrowed_log() {
        let mut log: MessageLog<8> = MessageLog::new();
        log.set_limit(2);
        log.append(&major(0x00)).unwrap();
        log.append(&major(0x01)).unwrap();
        assert!(log.append(&major(0x02)).is_err());
        log.set_limit(64);
        assert_eq!(log.limit(), 8);
    }

    #[test]
    fn test_reset_starts_a_new_session() {
        let mut log: MessageLog<4> = MessageLog::new();
        log.append(&major(0x02)).unwrap();
        log.reset();
        assert!(log.is_empty());
        log.append(&major(0x03)).unwrap();
        assert_eq!(log.records()[0].classify().unwrap(), major(0x03));
    }

    #[test]
    fn test_render_in_arrival_order() {
        let mut log: MessageLog<4> = MessageLog::new();
        log.set_stream_formats(SAMPLE_STREAM_FORMATS);
        let mut args = StreamArgs::new();
        args.extend_from_slice(&[0, 1, 4, 0x20]).unwrap();
        log.append(&MailboxMessage::stream(SAMPLE_STREAM_FORMATS, 0x0010, args)).unwrap();
        log.append(&major(0x07)).unwrap();
        let mut out = String::new();
        log.render(&mut out).unwrap();
        assert_eq!(
            out,
            "   0: stream [L30] PMU: write leveling CS 0 DB 1 coarse 4 fine 32\n   \
             1: major 0x07: training has run successfully\n"
        );
    }

    #[test]
    fn test_render_without_formats_keeps_raw_ids() {
        let mut log: MessageLog<2> = MessageLog::new();
        let mut args = StreamArgs::new();
        args.push(0xFF).unwrap();
        log.append(&MailboxMessage::stream(&[], 0x00F0, args)).unwrap();
        let mut out = String::new();
        log.render(&mut out).unwrap();
        assert_eq!(out, "   0: stream [L10] string 0x00f0 args [ff]\n");
    }
}

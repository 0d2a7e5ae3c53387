//! Simulated PMU for host tests.
//!
//! [`SimulatedPmu`] is a register file that plays the PMU side of the
//! mailbox handshake. Mailbox words are queued, either directly or as a
//! [`ScriptedRun`] that is released when the CPU writes `MicroReset = 0`.
//! A word can stay "not ready" for a number of status polls before it is
//! posted.

use core::convert::Infallible;
use std::collections::{BTreeMap, VecDeque};

use platform::PhyRegisters;

use crate::mailbox::message::{LogLevel, StreamFormat};
use crate::regs::{
    CSR_ACCESS_CPU, CSR_ACCESS_PMU, DCT_WRITE_PROT, MICRO_CONT_MUX_SEL, MICRO_RESET, MICRO_RESET_RUN,
    UCT_DAT_WRITE_ONLY_SHADOW, UCT_SHADOW_REGS, UCT_WRITE_ONLY_SHADOW, UCT_WRITE_PROT_SHADOW,
};

const STREAM_INDICATOR: u16 = 0x08;
const TRAINING_SUCCESS: u16 = 0x07;
const TRAINING_FAILED: u16 = 0xFF;

/// Stand-in stream strings for host tests.
///
/// Not the firmware's strings file: ids and texts only give rendering
/// tests something to substitute into.
pub const SAMPLE_STREAM_FORMATS: &[StreamFormat] = &[
    StreamFormat::new(0x0010, LogLevel::Level30, "PMU: write leveling CS %d DB %d coarse %d fine %d"),
    StreamFormat::new(0x0030, LogLevel::Level20, "PMU: read DQS center CS %d DB %d lane %d delay %d"),
    StreamFormat::new(0x00FF, LogLevel::Level50, "PMU: assertion at line %u, value 0x%x"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingWord {
    value: u32,
    not_ready_polls: u32,
}

/// Mailbox words and message-block values of one firmware run.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRun {
    words: Vec<PendingWord>,
    message_block: Vec<(u32, u16)>,
}

impl ScriptedRun {
    /// Run that posts nothing; the CPU side times out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run ending with the training-success message.
    pub fn success() -> Self {
        Self::new().major(TRAINING_SUCCESS)
    }

    /// Run ending with the training-failed message.
    pub fn failed() -> Self {
        Self::new().major(TRAINING_FAILED)
    }

    /// Append a raw mailbox word posted after `not_ready_polls` polls.
    #[must_use]
    pub fn word(mut self, value: u32, not_ready_polls: u32) -> Self {
        self.words.push(PendingWord { value, not_ready_polls });
        self
    }

    /// Append a major message.
    #[must_use]
    pub fn major(self, id: u16) -> Self {
        self.word(u32::from(id), 0)
    }

    /// Append a stream message.
    #[must_use]
    pub fn stream(mut self, string_id: u16, args: &[u32]) -> Self {
        self.words.extend(stream_words(string_id, args));
        self
    }

    /// Message-block value the firmware leaves behind.
    #[must_use]
    pub fn result(mut self, address: u32, value: u16) -> Self {
        self.message_block.push((address, value));
        self
    }

    /// Append the words and message-block values of `run`.
    #[must_use]
    pub fn then(mut self, run: Self) -> Self {
        self.words.extend(run.words);
        self.message_block.extend(run.message_block);
        self
    }
}

fn stream_words(string_id: u16, args: &[u32]) -> impl Iterator<Item = PendingWord> + '_ {
    let count = u16::try_from(args.len()).unwrap_or(u16::MAX);
    let [c0, c1] = count.to_le_bytes();
    let [s0, s1] = string_id.to_le_bytes();
    let header = u32::from_le_bytes([c0, c1, s0, s1]);
    [u32::from(STREAM_INDICATOR), header]
        .into_iter()
        .chain(args.iter().copied())
        .map(|value| PendingWord {
            value,
            not_ready_polls: 0,
        })
}

/// Register file with a scripted PMU behind the mailbox.
#[derive(Debug, Default)]
pub struct SimulatedPmu {
    registers: BTreeMap<u32, u16>,
    writes: Vec<(u32, u16)>,
    pending: VecDeque<PendingWord>,
    runs: VecDeque<ScriptedRun>,
    ack_phase: bool,
    message_polls: u32,
    acquires: u32,
    releases: u32,
    runs_started: usize,
}

impl SimulatedPmu {
    /// Idle PMU with an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// PMU that plays `runs` in order, one per firmware start.
    pub fn with_runs(runs: impl IntoIterator<Item = ScriptedRun>) -> Self {
        let mut pmu = Self::new();
        pmu.runs.extend(runs);
        pmu
    }

    /// Queue a run after the ones already scripted.
    pub fn push_run(&mut self, run: ScriptedRun) {
        self.runs.push_back(run);
    }

    /// Post a raw mailbox word now.
    pub fn push_word(&mut self, value: u32, not_ready_polls: u32) {
        self.pending.push_back(PendingWord { value, not_ready_polls });
    }

    /// Post a major message now.
    pub fn push_major(&mut self, id: u16) {
        self.push_word(u32::from(id), 0);
    }

    /// Post a stream message now.
    pub fn push_stream(&mut self, string_id: u16, args: &[u32]) {
        self.pending.extend(stream_words(string_id, args));
    }

    /// Preset a register value.
    pub fn preset(&mut self, offset: u32, value: u16) {
        self.registers.insert(offset, value);
    }

    /// Current register value (0 if never written).
    pub fn value(&self, offset: u32) -> u16 {
        self.registers.get(&offset).copied().unwrap_or(0)
    }

    /// Every CPU write, in order.
    pub fn writes(&self) -> &[(u32, u16)] {
        &self.writes
    }

    /// Status polls spent waiting for a message (acknowledge polls excluded).
    pub fn message_polls(&self) -> u32 {
        self.message_polls
    }

    /// Restart the poll counter.
    pub fn reset_message_polls(&mut self) {
        self.message_polls = 0;
    }

    /// `MicroContMuxSel = 0` writes.
    pub fn acquires(&self) -> u32 {
        self.acquires
    }

    /// `MicroContMuxSel = 1` writes.
    pub fn releases(&self) -> u32 {
        self.releases
    }

    /// True if the CPU currently holds the CSR bus.
    pub fn csr_held_by_cpu(&self) -> bool {
        self.value(MICRO_CONT_MUX_SEL) == CSR_ACCESS_CPU && self.acquires > self.releases
    }

    /// Firmware runs started so far.
    pub fn runs_started(&self) -> usize {
        self.runs_started
    }

    /// Mailbox words not yet consumed.
    pub fn pending_words(&self) -> usize {
        self.pending.len()
    }

    fn status(&mut self) -> u16 {
        if self.ack_phase {
            return UCT_WRITE_PROT_SHADOW;
        }
        self.message_polls = self.message_polls.saturating_add(1);
        match self.pending.front_mut() {
            Some(word) if word.not_ready_polls == 0 => 0,
            Some(word) => {
                word.not_ready_polls = word.not_ready_polls.saturating_sub(1);
                UCT_WRITE_PROT_SHADOW
            }
            None => UCT_WRITE_PROT_SHADOW,
        }
    }

    fn front_half(&self, high: bool) -> u16 {
        let [b0, b1, b2, b3] = self.pending.front().map_or(0, |word| word.value).to_le_bytes();
        if high {
            u16::from_le_bytes([b2, b3])
        } else {
            u16::from_le_bytes([b0, b1])
        }
    }

    fn start_run(&mut self) {
        let Some(run) = self.runs.pop_front() else {
            return;
        };
        self.runs_started = self.runs_started.saturating_add(1);
        self.pending.extend(run.words);
        for (address, value) in run.message_block {
            self.registers.insert(address, value);
        }
    }
}

impl PhyRegisters for SimulatedPmu {
    type Error = Infallible;

    fn read16(&mut self, offset: u32) -> Result<u16, Self::Error> {
        Ok(match offset {
            UCT_SHADOW_REGS => self.status(),
            UCT_WRITE_ONLY_SHADOW => self.front_half(false),
            UCT_DAT_WRITE_ONLY_SHADOW => self.front_half(true),
            _ => self.value(offset),
        })
    }

    fn write16(&mut self, offset: u32, value: u16) -> Result<(), Self::Error> {
        self.writes.push((offset, value));
        self.registers.insert(offset, value);
        match (offset, value) {
            (DCT_WRITE_PROT, 0) => {
                self.pending.pop_front();
                self.ack_phase = true;
            }
            (DCT_WRITE_PROT, _) => self.ack_phase = false,
            (MICRO_CONT_MUX_SEL, CSR_ACCESS_CPU) => self.acquires = self.acquires.saturating_add(1),
            (MICRO_CONT_MUX_SEL, CSR_ACCESS_PMU) => self.releases = self.releases.saturating_add(1),
            (MICRO_RESET, MICRO_RESET_RUN) => self.start_run(),
            _ => {}
        }
        Ok(())
    }
}

//! Training sequencer.
//!
//! Drives the four training states in order. The firmware states load their
//! IMEM once, then for every step of the plan load the DMEM (message block),
//! start the PMU, drain the mailbox until a terminating major message,
//! capture the message-block results and evaluate the run.
//!
//! ```text
//! PhyConfig ──► Training1d ──► Training2d ──► PhyInitEngine
//!                 │  ▲            │  ▲
//!                 └──┘ RETRY      └──┘ RETRY   (per step, bounded)
//! ```
//!
//! `PASS` commits the run and moves on, `RETRY` re-runs the same step up to
//! `max_step_retries` times, `FAIL` aborts with
//! [`TrainingError::TrainingFailed`].

use embedded_hal::delay::DelayNs;
use platform::{DramTopology, PhyRegisters};

use crate::config::{TrainingConfig, TrainingMethod, DEFAULT_MESSAGE_LOG_CAPACITY};
use crate::error::TrainingError;
use crate::mailbox::{CsrAccess, Mailbox, MajorMessage, MessageLog};
use crate::regs::{self, MICRO_RESET, MICRO_RESET_RUN, MICRO_RESET_STALL, MICRO_RESET_STALL_RESET};
use crate::results::{ResultId, ResultLog, ResultLogEntry};
use crate::section::{load_section, LoadSummary, SectionId, SectionSet, UpdateContext};
use crate::state::{SequenceCtrl, TrainingState};

const FULL_1D: [SequenceCtrl; 1] = [SequenceCtrl::DEV_INIT
    .union(SequenceCtrl::WR_LVL)
    .union(SequenceCtrl::RX_EN)
    .union(SequenceCtrl::RD_DQS_1D)
    .union(SequenceCtrl::WR_DQ_1D)
    .union(SequenceCtrl::RD_DESKEW)
    .union(SequenceCtrl::MX_RD_LAT)];

const STEPS_1D: [SequenceCtrl; 3] = [
    SequenceCtrl::DEV_INIT.union(SequenceCtrl::WR_LVL),
    SequenceCtrl::RX_EN,
    SequenceCtrl::RD_DQS_1D
        .union(SequenceCtrl::WR_DQ_1D)
        .union(SequenceCtrl::RD_DESKEW)
        .union(SequenceCtrl::MX_RD_LAT),
];

const FULL_2D: [SequenceCtrl; 1] = [SequenceCtrl::DEV_INIT
    .union(SequenceCtrl::RD_DQS_2D)
    .union(SequenceCtrl::WR_DQ_2D)];

const STEPS_2D: [SequenceCtrl; 2] = [
    SequenceCtrl::DEV_INIT.union(SequenceCtrl::RD_DQS_2D),
    SequenceCtrl::WR_DQ_2D,
];

/// Firmware runs of `state` under `method`; empty for states that run no
/// firmware.
pub const fn plan(method: TrainingMethod, state: TrainingState) -> &'static [SequenceCtrl] {
    match (state, method) {
        (TrainingState::Training1d, TrainingMethod::Full) => &FULL_1D,
        (TrainingState::Training1d, TrainingMethod::StepByStep) => &STEPS_1D,
        (TrainingState::Training2d, TrainingMethod::Full) => &FULL_2D,
        (TrainingState::Training2d, TrainingMethod::StepByStep) => &STEPS_2D,
        (TrainingState::PhyConfig | TrainingState::PhyInitEngine, _) => &[],
    }
}

/// Verdict on one firmware run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunOutcome {
    /// Commit the run and continue.
    Pass,
    /// Run the same step again.
    Retry,
    /// Abort training.
    Fail,
}

/// What a firmware run produced.
#[derive(Debug, Clone, Copy)]
pub struct RunReport<'a> {
    /// State the run belonged to
    pub state: TrainingState,
    /// Steps the run executed
    pub sequence: SequenceCtrl,
    /// Terminating major message, if one arrived
    pub terminal: Option<MajorMessage>,
    /// The mailbox timed out before a terminating message
    pub timed_out: bool,
    /// Message-block results staged for this run
    pub captured: Option<&'a ResultLogEntry>,
}

/// Decides the outcome of a firmware run.
pub trait RunEvaluator {
    /// Evaluate one run.
    fn evaluate(&mut self, report: &RunReport<'_>) -> RunOutcome;
}

impl<F> RunEvaluator for F
where
    F: FnMut(&RunReport<'_>) -> RunOutcome,
{
    fn evaluate(&mut self, report: &RunReport<'_>) -> RunOutcome {
        self(report)
    }
}

/// Default evaluation from the terminating message and the message block.
///
/// A timeout or a training-failed message fails the run; a non-zero
/// CsTestFail asks for a retry.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageBlockEvaluator;

impl RunEvaluator for MessageBlockEvaluator {
    fn evaluate(&mut self, report: &RunReport<'_>) -> RunOutcome {
        if report.timed_out || report.terminal == Some(MajorMessage::TrainingFailed) {
            return RunOutcome::Fail;
        }
        match report.captured.and_then(|entry| entry.field(ResultId::CsTestFail)) {
            Some(fail) if fail != 0 => RunOutcome::Retry,
            _ => RunOutcome::Pass,
        }
    }
}

/// Training state owned by the sequencer.
#[derive(Debug, Clone)]
pub struct TrainingContext {
    /// Current state
    pub state: TrainingState,
    /// Steps of the run being prepared or executed
    pub sequence: SequenceCtrl,
    /// Committed results
    pub results: ResultLog,
    /// Board topology
    pub topology: DramTopology,
}

impl TrainingContext {
    /// Fresh context at [`TrainingState::PhyConfig`].
    pub const fn new(topology: DramTopology) -> Self {
        Self {
            state: TrainingState::PhyConfig,
            sequence: SequenceCtrl::empty(),
            results: ResultLog::new(),
            topology,
        }
    }

    /// Read-only view for value functions.
    pub const fn update_context(&self) -> UpdateContext<'_> {
        UpdateContext::new(self.state, self.sequence, &self.topology, &self.results)
    }
}

struct Drain {
    terminal: Option<MajorMessage>,
    timed_out: bool,
}

/// The training state machine.
///
/// The message log is borrowed: at its default capacity it is far too large
/// to live inside a value that is returned by value on a boot stack.
pub struct Sequencer<'s, 'm, R, D, E = MessageBlockEvaluator, const N: usize = DEFAULT_MESSAGE_LOG_CAPACITY> {
    regs: R,
    mailbox: Mailbox<D>,
    sections: SectionSet<'s>,
    config: TrainingConfig,
    evaluator: E,
    context: TrainingContext,
    messages: &'m mut MessageLog<N>,
    retries: u32,
    finished: bool,
}

impl<'s, 'm, R: PhyRegisters, D: DelayNs, const N: usize> Sequencer<'s, 'm, R, D, MessageBlockEvaluator, N> {
    /// Sequencer with the default run evaluation, logging into `messages`.
    pub fn new(
        regs: R,
        delay: D,
        sections: SectionSet<'s>,
        topology: DramTopology,
        config: TrainingConfig,
        messages: &'m mut MessageLog<N>,
    ) -> Self {
        Self::with_evaluator(regs, delay, sections, topology, config, messages, MessageBlockEvaluator)
    }
}

impl<'s, 'm, R, D, E, const N: usize> Sequencer<'s, 'm, R, D, E, N>
where
    R: PhyRegisters,
    D: DelayNs,
    E: RunEvaluator,
{
    /// Sequencer with a custom run evaluation.
    ///
    /// `messages` is clamped to `config.message_log_capacity` and renders
    /// with `config.stream_formats`.
    pub fn with_evaluator(
        regs: R,
        delay: D,
        sections: SectionSet<'s>,
        topology: DramTopology,
        config: TrainingConfig,
        messages: &'m mut MessageLog<N>,
        evaluator: E,
    ) -> Self {
        messages.reset();
        messages.set_limit(config.message_log_capacity);
        messages.set_stream_formats(config.stream_formats);
        Self {
            regs,
            mailbox: Mailbox::new(delay, &config),
            sections,
            config,
            evaluator,
            context: TrainingContext::new(topology),
            messages,
            retries: 0,
            finished: false,
        }
    }

    /// Run every remaining state.
    pub fn run(&mut self) -> Result<(), TrainingError> {
        info!("DDR PHY training ({})", self.config.method);
        while self.run_state()?.is_some() {}
        info!("DDR PHY training done: {} runs, {} retries", self.context.results.current_run(), self.retries);
        self.context.results.log_results();
        Ok(())
    }

    /// Execute the current state and advance.
    ///
    /// Returns the next state, or `None` once the last state has completed.
    pub fn run_state(&mut self) -> Result<Option<TrainingState>, TrainingError> {
        if self.finished {
            return Ok(None);
        }
        let state = self.context.state;
        info!("{}: start", state);
        match state {
            TrainingState::PhyConfig => {
                self.load(SectionId::PhyConfig)?;
            }
            TrainingState::Training1d => self.train(state, SectionId::Imem1d, SectionId::Dmem1d)?,
            TrainingState::Training2d => self.train(state, SectionId::Imem2d, SectionId::Dmem2d)?,
            TrainingState::PhyInitEngine => {
                self.load(SectionId::PhyInitEngine)?;
            }
        }
        info!("{}: done", state);

        let next = state.next();
        match next {
            Some(next) => self.context.state = next,
            None => self.finished = true,
        }
        Ok(next)
    }

    /// Current state.
    pub fn state(&self) -> TrainingState {
        self.context.state
    }

    /// True once every state has completed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Training context.
    pub fn context(&self) -> &TrainingContext {
        &self.context
    }

    /// Committed results.
    pub fn results(&self) -> &ResultLog {
        &self.context.results
    }

    /// Messages of the most recent firmware run.
    pub fn messages(&self) -> &MessageLog<N> {
        &*self.messages
    }

    /// RETRY evaluations so far, over all steps.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Register block.
    pub fn registers(&self) -> &R {
        &self.regs
    }

    /// Register block, mutably.
    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    /// Give back the register block.
    pub fn into_registers(self) -> R {
        self.regs
    }

    fn load(&mut self, id: SectionId) -> Result<LoadSummary, TrainingError> {
        let section = *self.sections.get(id);
        let ctx = self.context.update_context();
        let mut csr = CsrAccess::acquire(&mut self.regs)?;
        let summary = load_section(&mut csr, &section, &ctx)?;
        debug!("{}: {} writes", id, summary.total());
        Ok(summary)
    }

    fn train(&mut self, state: TrainingState, imem: SectionId, dmem: SectionId) -> Result<(), TrainingError> {
        self.load(imem)?;
        for &sequence in plan(self.config.method, state) {
            self.train_step(state, dmem, sequence)?;
        }
        Ok(())
    }

    fn train_step(&mut self, state: TrainingState, dmem: SectionId, sequence: SequenceCtrl) -> Result<(), TrainingError> {
        let mut attempts: u8 = 0;
        loop {
            self.context.sequence = sequence;
            self.load(dmem)?;
            self.start_firmware()?;
            let drain = self.drain()?;

            if drain.timed_out {
                self.context.results.stage_empty(state, sequence);
            } else {
                let mut csr = CsrAccess::acquire(&mut self.regs)?;
                self.context.results.capture(&mut csr, state, sequence)?;
            }
            self.messages.dump();

            let report = RunReport {
                state,
                sequence,
                terminal: drain.terminal,
                timed_out: drain.timed_out,
                captured: self.context.results.pending(),
            };
            match self.evaluator.evaluate(&report) {
                RunOutcome::Pass => {
                    let runs = self.context.results.commit()?;
                    info!("{} {}: pass (run {})", state, sequence, runs);
                    return Ok(());
                }
                RunOutcome::Retry if attempts < self.config.max_step_retries => {
                    self.context.results.discard();
                    attempts = attempts.saturating_add(1);
                    self.retries = self.retries.saturating_add(1);
                    warn!("{} {}: retry {}", state, sequence, attempts);
                }
                RunOutcome::Retry | RunOutcome::Fail => {
                    self.context.results.discard();
                    error!("{} {}: failed after {} retries", state, sequence, attempts);
                    return Err(TrainingError::TrainingFailed { state, sequence });
                }
            }
        }
    }

    /// Stall and reset the PMU, then let it run.
    fn start_firmware(&mut self) -> Result<(), TrainingError> {
        let mut csr = CsrAccess::acquire(&mut self.regs)?;
        regs::write(&mut csr, MICRO_RESET, MICRO_RESET_STALL_RESET)?;
        regs::write(&mut csr, MICRO_RESET, MICRO_RESET_STALL)?;
        regs::write(&mut csr, MICRO_RESET, MICRO_RESET_RUN)?;
        Ok(())
    }

    /// Read messages until a terminating major message or a timeout.
    ///
    /// Messages past the log limit are dropped, not fatal.
    fn drain(&mut self) -> Result<Drain, TrainingError> {
        self.messages.reset();
        let mut dropped: usize = 0;
        let drain = loop {
            match self.mailbox.read_message(&mut self.regs) {
                Ok(message) => {
                    if self.messages.append(&message).is_err() {
                        dropped = dropped.saturating_add(1);
                    }
                    if let Some(major) = message.terminal() {
                        break Drain {
                            terminal: Some(major),
                            timed_out: false,
                        };
                    }
                }
                Err(TrainingError::RegisterTimeout { address }) => {
                    warn!("mailbox timeout polling {:#x}", address);
                    break Drain {
                        terminal: None,
                        timed_out: true,
                    };
                }
                Err(err) => return Err(err),
            }
        };
        if dropped > 0 {
            warn!("message log full: {} messages dropped", dropped);
        }
        Ok(drain)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use crate::results::MAX_RUN_COUNT;

    #[test]
    fn test_step_by_step_plans() {
        assert_eq!(plan(TrainingMethod::StepByStep, TrainingState::Training1d).len(), 3);
        assert_eq!(plan(TrainingMethod::StepByStep, TrainingState::Training2d).len(), 2);
        assert_eq!(plan(TrainingMethod::Full, TrainingState::Training1d)[0].bits(), 0x031F);
        assert_eq!(plan(TrainingMethod::Full, TrainingState::Training2d)[0].bits(), 0x0061);
        assert!(plan(TrainingMethod::Full, TrainingState::PhyConfig).is_empty());
    }

    #[test]
    fn test_full_plan_covers_every_step() {
        for state in [TrainingState::Training1d, TrainingState::Training2d] {
            let steps = plan(TrainingMethod::StepByStep, state)
                .iter()
                .fold(SequenceCtrl::empty(), |acc, &s| acc | s);
            assert_eq!(steps, plan(TrainingMethod::Full, state)[0]);
        }
        // every plan fits the result log
        let runs: usize = TrainingState::ALL
            .iter()
            .map(|&s| plan(TrainingMethod::StepByStep, s).len())
            .sum();
        assert!(runs <= MAX_RUN_COUNT);
    }

    fn report(terminal: Option<MajorMessage>, timed_out: bool) -> RunReport<'static> {
        RunReport {
            state: TrainingState::Training1d,
            sequence: SequenceCtrl::RX_EN,
            terminal,
            timed_out,
            captured: None,
        }
    }

    #[test]
    fn test_default_evaluation() {
        let mut eval = MessageBlockEvaluator;
        assert_eq!(eval.evaluate(&report(Some(MajorMessage::TrainingSuccess), false)), RunOutcome::Pass);
        assert_eq!(eval.evaluate(&report(Some(MajorMessage::TrainingFailed), false)), RunOutcome::Fail);
        assert_eq!(eval.evaluate(&report(None, true)), RunOutcome::Fail);
    }

    #[test]
    fn test_closures_are_evaluators() {
        let mut seen = 0;
        let mut eval = |r: &RunReport<'_>| {
            seen += 1;
            if r.timed_out {
                RunOutcome::Fail
            } else {
                RunOutcome::Retry
            }
        };
        assert_eq!(eval.evaluate(&report(None, false)), RunOutcome::Retry);
        assert_eq!(eval.evaluate(&report(None, true)), RunOutcome::Fail);
        assert_eq!(seen, 2);
    }
}

//! Mailbox handshake against the simulated PMU.
//!
//! Covers the bounded poll (ready after k polls, timeout at the bound), the
//! release on every exit path, and the stream argument limit.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects, clippy::panic)]

use ddr_training::config::DEFAULT_MAILBOX_RETRY_COUNT;
use ddr_training::mocks::SimulatedPmu;
use ddr_training::regs::{CSR_ACCESS_PMU, MICRO_CONT_MUX_SEL, UCT_SHADOW_REGS};
use ddr_training::{Mailbox, MailboxMessage, MajorMessage, TrainingConfig, TrainingError, Violation};
use embedded_hal::delay::DelayNs;
use embedded_hal_mock::eh1::delay::NoopDelay;
use proptest::prelude::*;

/// Delay that counts calls and total nanoseconds.
#[derive(Default)]
struct CountingDelay {
    calls: u32,
    total_ns: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.calls += 1;
        self.total_ns += u64::from(ns);
    }
}

fn assert_released(pmu: &SimulatedPmu) {
    assert_eq!(pmu.acquires(), pmu.releases());
    assert_eq!(pmu.value(MICRO_CONT_MUX_SEL), CSR_ACCESS_PMU);
    assert!(!pmu.csr_held_by_cpu());
}

/// A message posted after k not-ready polls is read on poll k + 1, with the
/// poll interval between polls only.
#[test]
fn read_succeeds_after_k_plus_one_polls() {
    for k in [0u32, 1, 5, 137] {
        let mut pmu = SimulatedPmu::new();
        pmu.push_word(0x0007, k);
        let mut mailbox = Mailbox::new(CountingDelay::default(), &TrainingConfig::default());

        assert_eq!(
            mailbox.read_message(&mut pmu).unwrap(),
            MailboxMessage::Major(MajorMessage::TrainingSuccess)
        );
        assert_eq!(pmu.message_polls(), k + 1);
        assert_eq!(mailbox.last_poll_count(), k + 1);
        assert_released(&pmu);
    }
}

/// The last poll inside the bound still succeeds.
#[test]
fn read_succeeds_on_the_last_allowed_poll() {
    let k = DEFAULT_MAILBOX_RETRY_COUNT - 1;
    let mut pmu = SimulatedPmu::new();
    pmu.push_word(0x0000, k);
    let mut mailbox = Mailbox::new(NoopDelay::new(), &TrainingConfig::default());
    assert_eq!(
        mailbox.read_message(&mut pmu).unwrap(),
        MailboxMessage::Major(MajorMessage::EndOfInit)
    );
    assert_eq!(pmu.message_polls(), DEFAULT_MAILBOX_RETRY_COUNT);
    assert_released(&pmu);
}

/// Not ready for the whole bound: timeout, legacy code -100, bus released,
/// message left in place.
#[test]
fn read_times_out_at_the_bound_and_still_releases() {
    let mut pmu = SimulatedPmu::new();
    pmu.push_word(0x0007, DEFAULT_MAILBOX_RETRY_COUNT);
    let mut delay = CountingDelay::default();
    let mut mailbox = Mailbox::new(&mut delay, &TrainingConfig::default());

    let err = mailbox.read_message(&mut pmu).unwrap_err();
    assert_eq!(err, TrainingError::RegisterTimeout { address: UCT_SHADOW_REGS });
    assert_eq!(err.code(), -100);
    assert_eq!(pmu.message_polls(), DEFAULT_MAILBOX_RETRY_COUNT);
    assert_eq!(pmu.pending_words(), 1);
    assert_released(&pmu);

    // 500 us between polls, none after the last one
    assert_eq!(delay.calls, DEFAULT_MAILBOX_RETRY_COUNT - 1);
    assert_eq!(delay.total_ns, u64::from(DEFAULT_MAILBOX_RETRY_COUNT - 1) * 500_000);
}

/// An empty mailbox times out the same way.
#[test]
fn empty_mailbox_times_out() {
    let mut pmu = SimulatedPmu::new();
    let mut mailbox = Mailbox::with_bounds(NoopDelay::new(), 50, 500);
    assert!(matches!(
        mailbox.read16(&mut pmu),
        Err(TrainingError::RegisterTimeout { .. })
    ));
    assert_eq!(pmu.message_polls(), 50);
    assert_released(&pmu);
}

/// Every word of a stream message is its own acquire/release exchange.
#[test]
fn stream_message_with_36_arguments_is_accepted() {
    let args: Vec<u32> = (0..36).collect();
    let mut pmu = SimulatedPmu::new();
    pmu.push_stream(0x0010, &args);
    let mut mailbox = Mailbox::with_bounds(NoopDelay::new(), 10, 500);

    match mailbox.read_message(&mut pmu).unwrap() {
        MailboxMessage::Stream { string_id, args: read, .. } => {
            assert_eq!(string_id, 0x0010);
            assert_eq!(read.as_slice(), args.as_slice());
        }
        other => panic!("expected a stream message, got {other:?}"),
    }
    // major word, header, 36 arguments
    assert_eq!(pmu.acquires(), 38);
    assert_released(&pmu);
}

/// 37 arguments is a protocol violation, raised before any argument is
/// read.
#[test]
fn stream_message_with_37_arguments_is_rejected() {
    let args: Vec<u32> = (0..37).collect();
    let mut pmu = SimulatedPmu::new();
    pmu.push_stream(0x0010, &args);
    let mut mailbox = Mailbox::with_bounds(NoopDelay::new(), 10, 500);

    assert_eq!(
        mailbox.read_message(&mut pmu),
        Err(TrainingError::ProtocolViolation(Violation::ArgumentCount { count: 37 }))
    );
    assert_eq!(pmu.pending_words(), 37);
    assert_released(&pmu);
}

/// Unknown major ids are reported, not rejected.
#[test]
fn unknown_major_message_is_not_an_error() {
    let mut pmu = SimulatedPmu::new();
    pmu.push_major(0x42);
    let mut mailbox = Mailbox::with_bounds(NoopDelay::new(), 10, 500);
    let message = mailbox.read_message(&mut pmu).unwrap();
    assert_eq!(message, MailboxMessage::Major(MajorMessage::Unrecognized(0x42)));
    assert_eq!(message.terminal(), None);
    assert!(message.to_string().contains("reserved/unrecognized"));
}

/// 32-bit reads join the two shadow registers, low half first.
#[test]
fn read32_joins_both_halves() {
    let mut pmu = SimulatedPmu::new();
    pmu.push_word(0xDEAD_BEEF, 0);
    let mut mailbox = Mailbox::with_bounds(NoopDelay::new(), 10, 500);
    assert_eq!(mailbox.read32(&mut pmu).unwrap(), 0xDEAD_BEEF);
}

proptest! {
    /// For any k below the bound the read takes exactly k + 1 polls; at or
    /// above it, it times out after exactly `bound` polls.
    #[test]
    fn poll_count_matches_readiness(k in 0u32..400, bound in 1u32..300) {
        let mut pmu = SimulatedPmu::new();
        pmu.push_word(0x0007, k);
        let mut mailbox = Mailbox::with_bounds(NoopDelay::new(), bound, 500);
        let result = mailbox.read16(&mut pmu);
        if k < bound {
            prop_assert_eq!(result, Ok(0x0007));
            prop_assert_eq!(pmu.message_polls(), k + 1);
        } else {
            prop_assert!(matches!(result, Err(TrainingError::RegisterTimeout { .. })), "expected RegisterTimeout, got {:?}", result);
            prop_assert_eq!(pmu.message_polls(), bound);
        }
        prop_assert_eq!(pmu.acquires(), pmu.releases());
    }
}

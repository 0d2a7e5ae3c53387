//! Section loader ordering.
//!
//! A load must produce exactly static ++ static update ++ dynamic update,
//! and each value function must run once, between the write before its entry
//! and its own write.

#![allow(clippy::unwrap_used, clippy::indexing_slicing, clippy::arithmetic_side_effects)]

use std::cell::RefCell;
use std::convert::Infallible;

use ddr_training::section::{AddressData, DynamicUpdate, StaticData, StaticUpdate};
use ddr_training::{load_section, ResultLog, Section, SectionId, SequenceCtrl, TrainingError, TrainingState, UpdateContext};
use platform::mocks::MockRegisters;
use platform::{DramTopology, PhyRegisters};

const IMAGE: [u16; 3] = [0x1111, 0x2222, 0x3333];
const FIRST_WORD: [u16; 1] = [0x1111];
const PAIRS: [AddressData; 2] = [AddressData::new(0x2_0010, 0xA), AddressData::new(0x2_0003, 0xB)];
const OVERRIDES: [AddressData; 2] = [AddressData::new(0x5_4001, 0x77), AddressData::new(0x5_4000, 0x88)];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Event {
    Write(u32, u16),
    Call(TrainingState, SequenceCtrl),
}

/// Register block that logs writes into the same event list the value
/// functions log into.
struct Recorder<'a> {
    events: &'a RefCell<Vec<Event>>,
}

impl PhyRegisters for Recorder<'_> {
    type Error = Infallible;

    fn read16(&mut self, _offset: u32) -> Result<u16, Self::Error> {
        Ok(0)
    }

    fn write16(&mut self, offset: u32, value: u16) -> Result<(), Self::Error> {
        self.events.borrow_mut().push(Event::Write(offset, value));
        Ok(())
    }
}

/// Sequential static, separate static update and two dynamic entries are
/// written in table order, one after the other.
#[test]
fn writes_are_static_then_static_update_then_dynamic() {
    let topology = DramTopology::default();
    let results = ResultLog::new();
    let ctx = UpdateContext::new(TrainingState::Training1d, SequenceCtrl::RX_EN, &topology, &results);
    let seq_value = |ctx: &UpdateContext<'_>| -> Result<u16, TrainingError> { Ok(ctx.sequence.bits()) };
    let fixed = |_: &UpdateContext<'_>| -> Result<u16, TrainingError> { Ok(0xBEEF) };
    let dynamic = [
        DynamicUpdate {
            address: 0x5_400B,
            value: &seq_value,
        },
        DynamicUpdate {
            address: 0x5_4001,
            value: &fixed,
        },
    ];
    let section = Section::new(
        SectionId::Dmem1d,
        StaticData::Sequential {
            base: 0x5_4000,
            values: &IMAGE,
        },
    )
    .with_static_update(StaticUpdate::Separate, &OVERRIDES)
    .with_dynamic_update(&dynamic);

    let mut regs = MockRegisters::new();
    let summary = load_section(&mut regs, &section, &ctx).unwrap();

    assert_eq!(
        regs.writes(),
        vec![
            (0x5_4000, 0x1111),
            (0x5_4001, 0x2222),
            (0x5_4002, 0x3333),
            (0x5_4001, 0x77),
            (0x5_4000, 0x88),
            (0x5_400B, 0x0004),
            (0x5_4001, 0xBEEF),
        ]
    );
    assert_eq!(summary.total(), 7);
    // later writes win
    assert_eq!(regs.value(0x5_4001), 0xBEEF);
}

/// Random-style static tables keep their pair order, including addresses
/// that go backwards.
#[test]
fn random_pairs_keep_table_order() {
    let topology = DramTopology::default();
    let results = ResultLog::new();
    let ctx = UpdateContext::new(TrainingState::PhyConfig, SequenceCtrl::empty(), &topology, &results);
    let section = Section::new(SectionId::PhyConfig, StaticData::Random(&PAIRS));
    let mut regs = MockRegisters::new();
    load_section(&mut regs, &section, &ctx).unwrap();
    assert_eq!(regs.writes(), vec![(0x2_0010, 0xA), (0x2_0003, 0xB)]);
}

/// Each value function runs exactly once, after the previous write and
/// before its own, and sees the state and sequence of the load.
#[test]
fn value_functions_run_once_when_their_entry_is_reached() {
    let events = RefCell::new(Vec::new());
    let record_call = |ctx: &UpdateContext<'_>| -> Result<u16, TrainingError> {
        events.borrow_mut().push(Event::Call(ctx.state, ctx.sequence));
        Ok(0x42)
    };
    let dynamic = [
        DynamicUpdate {
            address: 0x5_400C,
            value: &record_call,
        },
        DynamicUpdate {
            address: 0x5_400D,
            value: &record_call,
        },
    ];
    let section = Section::new(
        SectionId::Dmem2d,
        StaticData::Sequential {
            base: 0x5_4000,
            values: &FIRST_WORD,
        },
    )
    .with_dynamic_update(&dynamic);

    let topology = DramTopology::default();
    let results = ResultLog::new();
    let sequence = SequenceCtrl::DEV_INIT | SequenceCtrl::RD_DQS_2D;
    let ctx = UpdateContext::new(TrainingState::Training2d, sequence, &topology, &results);

    let mut regs = Recorder { events: &events };
    load_section(&mut regs, &section, &ctx).unwrap();

    assert_eq!(
        events.into_inner(),
        vec![
            Event::Write(0x5_4000, 0x1111),
            Event::Call(TrainingState::Training2d, sequence),
            Event::Write(0x5_400C, 0x42),
            Event::Call(TrainingState::Training2d, sequence),
            Event::Write(0x5_400D, 0x42),
        ]
    );
}

/// Loading the same section twice calls each value function twice, once
/// per load.
#[test]
fn each_load_calls_value_functions_again() {
    let calls = RefCell::new(0u32);
    let counter = |_: &UpdateContext<'_>| -> Result<u16, TrainingError> {
        *calls.borrow_mut() += 1;
        Ok(u16::try_from(*calls.borrow()).unwrap())
    };
    let dynamic = [DynamicUpdate {
        address: 0x2_000B,
        value: &counter,
    }];
    let section = Section::new(SectionId::PhyInitEngine, StaticData::Random(&PAIRS)).with_dynamic_update(&dynamic);
    let topology = DramTopology::default();
    let results = ResultLog::new();
    let ctx = UpdateContext::new(TrainingState::PhyInitEngine, SequenceCtrl::empty(), &topology, &results);

    let mut regs = MockRegisters::new();
    load_section(&mut regs, &section, &ctx).unwrap();
    load_section(&mut regs, &section, &ctx).unwrap();
    assert_eq!(*calls.borrow(), 2);
    assert_eq!(regs.value(0x2_000B), 2);
}

/// Value functions can read results of committed runs through the context.
#[test]
fn value_functions_see_committed_results() {
    let mut regs = MockRegisters::new();
    regs.preset(0x5_4058, 0x1200);
    let mut results = ResultLog::new();
    results
        .capture(&mut regs, TrainingState::Training1d, SequenceCtrl::DEV_INIT | SequenceCtrl::WR_LVL)
        .unwrap();
    results.commit().unwrap();

    let from_results = |ctx: &UpdateContext<'_>| -> Result<u16, TrainingError> {
        let cdd = ctx.results.decode_result(
            ddr_training::ResultId::CdDRw1_0,
            0,
            SequenceCtrl::DEV_INIT | SequenceCtrl::WR_LVL,
        )?;
        Ok(if cdd < 0x20 { 0x1 } else { 0x2 })
    };
    let dynamic = [DynamicUpdate {
        address: 0x5_4020,
        value: &from_results,
    }];
    let section = Section::new(SectionId::Dmem1d, StaticData::Random(&OVERRIDES)).with_dynamic_update(&dynamic);
    let topology = DramTopology::default();
    let ctx = UpdateContext::new(TrainingState::Training1d, SequenceCtrl::RX_EN, &topology, &results);
    load_section(&mut regs, &section, &ctx).unwrap();
    assert_eq!(regs.value(0x5_4020), 0x1);
}

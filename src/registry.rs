// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The ordered set of constraints and the selection algorithm over it.

use crate::{
    condition::{ConditionShape, ConditionTable},
    conservation::ConservationSession,
    constraint::{
        CONSTRAINT_MAX, Constraint, HookContext, SelectContext, UpdateRequest, ValidFlags,
    },
    platform::LpmPlatform,
    resource::ResourceMask,
};
use arrayvec::ArrayVec;
use log::{debug, trace, warn};
use num_enum::TryFromPrimitive;
use thiserror::Error;

/// A failed registry operation.
#[derive(Clone, Copy, Debug, Eq, Error, PartialEq)]
pub enum RmError {
    /// The constraint id is outside the registered set.
    #[error("Unknown constraint {0}")]
    UnknownConstraint(u32),
    /// The request does not make sense for the constraint.
    #[error("Invalid argument")]
    InvalidArgument,
}

/// Which constraints an update or status query applies to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConstraintId {
    /// Every registered constraint.
    All,
    /// The constraint at the given registry index.
    Index(usize),
}

impl ConstraintId {
    /// The raw id meaning [`ConstraintId::All`].
    pub const ALL_RAW: u32 = u32::MAX;
}

impl From<u32> for ConstraintId {
    fn from(raw: u32) -> Self {
        if raw == Self::ALL_RAW {
            Self::All
        } else {
            Self::Index(raw as usize)
        }
    }
}

/// What [`ConstraintRegistry::get_status`] reports.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum StatusKind {
    /// Validity flags, ORed across constraints.
    Valid = 0xD000_0000,
    /// Entry count, summed across constraints.
    EnterCount = 0xD000_0001,
    /// Idle residency, summed across constraints.
    Residency = 0xD000_0002,
    /// Blocked report, ORed across constraints.
    CondBlock = 0xD000_0004,
    /// Latched blocking intersection, ORed across constraints.
    CondBlockDetail = 0xD000_0006,
    /// Resources kept on, ORed across constraints.
    ResourceRequest = 0xD000_0008,
}

/// A status value read from one or all constraints.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StatusValue {
    /// See [`StatusKind::Valid`].
    Valid(ValidFlags),
    /// See [`StatusKind::EnterCount`].
    EnterCount(u64),
    /// See [`StatusKind::Residency`].
    Residency(u64),
    /// See [`StatusKind::CondBlock`].
    CondBlock(u32),
    /// See [`StatusKind::CondBlockDetail`].
    CondBlockDetail(ConditionTable),
    /// See [`StatusKind::ResourceRequest`].
    ResourceRequest(ResourceMask),
}

impl StatusValue {
    fn empty(kind: StatusKind) -> Self {
        match kind {
            StatusKind::Valid => Self::Valid(ValidFlags::empty()),
            StatusKind::EnterCount => Self::EnterCount(0),
            StatusKind::Residency => Self::Residency(0),
            StatusKind::CondBlock => Self::CondBlock(0),
            StatusKind::CondBlockDetail => Self::CondBlockDetail(ConditionTable::EMPTY),
            StatusKind::ResourceRequest => Self::ResourceRequest(ResourceMask::empty()),
        }
    }

    fn fold(&mut self, constraint: &Constraint) {
        let status = constraint.status();
        match self {
            Self::Valid(valid) => *valid |= status.valid,
            Self::EnterCount(count) => *count += u64::from(status.enter_count),
            Self::Residency(residency) => *residency += status.residency,
            Self::CondBlock(blocked) => *blocked |= status.cond_blocked,
            Self::CondBlockDetail(latch) => {
                for (word, latched) in latch.domains.iter_mut().zip(status.cond_latch.domains) {
                    *word |= latched;
                }
                latch.pll |= status.cond_latch.pll;
            }
            Self::ResourceRequest(mask) => *mask |= constraint.keeps(),
        }
    }

    /// Returns the value as a single register-sized word. For a latched table this is the
    /// blocked report it produces.
    pub fn raw(&self) -> u64 {
        match self {
            Self::Valid(valid) => valid.bits().into(),
            Self::EnterCount(count) => *count,
            Self::Residency(residency) => *residency,
            Self::CondBlock(blocked) => (*blocked).into(),
            Self::CondBlockDetail(latch) => ConditionTable::report(latch).into(),
            Self::ResourceRequest(mask) => mask.bits().into(),
        }
    }
}

/// The ordered set of constraints.
///
/// Index order is selection order: the platform registers its deepest constraint first, and a
/// blocked constraint degrades to the next index.
#[derive(Debug, Default)]
pub struct ConstraintRegistry {
    constraints: ArrayVec<Constraint, CONSTRAINT_MAX>,
    shape: ConditionShape,
    registered: bool,
}

impl ConstraintRegistry {
    /// Creates an empty registry.
    pub const fn new() -> Self {
        Self {
            constraints: ArrayVec::new_const(),
            shape: ConditionShape {
                domains: 0,
                plls: 0,
            },
            registered: false,
        }
    }

    /// Stores the platform's constraints and runs their one-time initialisation.
    ///
    /// Panics if called more than once, or with more than [`CONSTRAINT_MAX`] constraints.
    pub fn register(
        &mut self,
        constraints: impl IntoIterator<Item = Constraint>,
        shape: ConditionShape,
    ) {
        assert!(!self.registered, "Constraint registry registered twice");
        self.registered = true;
        self.shape = shape;
        for mut constraint in constraints {
            constraint.init();
            debug!(
                "Registered constraint {} as {}",
                constraint.name(),
                self.constraints.len()
            );
            if self.constraints.try_push(constraint).is_err() {
                panic!("More than {CONSTRAINT_MAX} constraints registered");
            }
        }
    }

    /// Returns the number of registered constraints.
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Returns whether no constraints are registered.
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Returns the constraint at the given index.
    pub fn get(&self, index: usize) -> Option<&Constraint> {
        self.constraints.get(index)
    }

    /// Returns every registered constraint in selection order.
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Recomputes every constraint's blocked report against a fresh condition table.
    pub fn update(&mut self, table: &ConditionTable) {
        for constraint in &mut self.constraints {
            constraint.check_conditions(table);
        }
    }

    /// Applies a request to one constraint or to all of them, stopping at the first refusal.
    pub fn do_update(&mut self, id: ConstraintId, request: &UpdateRequest) -> Result<(), RmError> {
        let shape = self.shape;
        match id {
            ConstraintId::All => self
                .constraints
                .iter_mut()
                .try_for_each(|constraint| constraint.update(request, shape)),
            ConstraintId::Index(index) => self
                .constraints
                .get_mut(index)
                .ok_or(RmError::UnknownConstraint(index as u32))?
                .update(request, shape),
        }
    }

    /// Returns the index of the first eligible constraint at or after `start` whose `allow` hook
    /// accepts the context, or `None` if the caller should fall back to the baseline.
    pub fn select(&self, start: usize, ctx: &SelectContext) -> Option<usize> {
        let selected = self
            .constraints
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, constraint)| constraint.is_eligible() && constraint.allow(ctx))
            .map(|(index, _)| index);
        trace!("Selected {selected:?} from {start} for {ctx:?}");
        selected
    }

    /// Runs the selected constraint's `enter` hook and counts the entry.
    pub fn run<P: LpmPlatform>(
        &mut self,
        index: usize,
        ctx: &mut HookContext<'_, P>,
        session: &mut ConservationSession,
    ) {
        let Some(constraint) = self.constraints.get_mut(index) else {
            warn!("Ignoring run of unknown constraint {index}");
            return;
        };
        constraint.enter(ctx, session);
        let status = constraint.status_mut();
        status.enter_count = status.enter_count.wrapping_add(1);
    }

    /// Runs the constraint's `reset` hook. Safe to call more than once for the same session.
    pub fn reset<P: LpmPlatform>(
        &mut self,
        index: usize,
        ctx: &mut HookContext<'_, P>,
        session: &mut ConservationSession,
    ) {
        let Some(constraint) = self.constraints.get_mut(index) else {
            warn!("Ignoring reset of unknown constraint {index}");
            return;
        };
        constraint.reset(ctx, session);
    }

    /// Reads a status value from one constraint, or folds it across all of them.
    ///
    /// With `clear`, a residency query also zeroes the residency it has read.
    pub fn get_status(
        &mut self,
        id: ConstraintId,
        kind: StatusKind,
        clear: bool,
    ) -> Result<StatusValue, RmError> {
        let targets = match id {
            ConstraintId::All => &mut self.constraints[..],
            ConstraintId::Index(index) => {
                let end = index.checked_add(1).filter(|&end| end <= self.constraints.len());
                let end = end.ok_or(RmError::UnknownConstraint(index as u32))?;
                &mut self.constraints[index..end]
            }
        };

        let mut value = StatusValue::empty(kind);
        for constraint in targets {
            value.fold(constraint);
            if clear && kind == StatusKind::Residency {
                constraint.status_mut().residency = 0;
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        conservation::{ConservationSequencer, PowerControl, SessionKind},
        constraint::{Bus26m, CpuBuckLdo, Dram, Syspll},
        platform::LpmPlatform,
        platform::test::{TEST_REGISTER_MAP, TestPlatform},
        regs::RegisterIo,
        trace::TraceRecorder,
    };

    const SHAPE: ConditionShape = ConditionShape {
        domains: 3,
        plls: 2,
    };

    const IDLE: SelectContext = SelectContext {
        required: ResourceMask::empty(),
        kind: SessionKind::Idle,
    };

    fn ready(registry: &mut ConstraintRegistry) {
        registry
            .do_update(ConstraintId::All, &UpdateRequest::SetValid(ValidFlags::FW))
            .unwrap();
    }

    /// B is evaluated before A; A forbids the bit which is set in domain 2.
    fn blocking_pair() -> ConstraintRegistry {
        let mut registry = ConstraintRegistry::new();
        registry.register(
            [
                Constraint::Syspll(Syspll::new(ConditionTable::new(&[0, 0, 0], 0))),
                Constraint::Dram(Dram::new(ConditionTable::new(&[0, 0, 0x200], 0))),
            ],
            SHAPE,
        );
        ready(&mut registry);
        registry
    }

    fn full() -> ConstraintRegistry {
        let platform = TestPlatform::new();
        let mut registry = ConstraintRegistry::new();
        registry.register(platform.constraints(), SHAPE);
        ready(&mut registry);
        registry
    }

    #[test]
    fn blocking_case() {
        let mut registry = blocking_pair();
        registry.update(&ConditionTable::new(&[0x000, 0x000, 0x200], 0));

        assert_eq!(registry.select(0, &IDLE), Some(0));
        assert_eq!(registry.get(1).unwrap().status().cond_blocked, 1 << 2);

        registry
            .do_update(
                ConstraintId::Index(0),
                &UpdateRequest::ClearValid(ValidFlags::SW),
            )
            .unwrap();
        assert_eq!(registry.select(0, &IDLE), None);
    }

    #[test]
    fn selection_is_deterministic() {
        let mut registry = full();
        registry.update(&ConditionTable::new(&[0, 0, 0x100], 0b10));
        let first = registry.select(0, &IDLE);
        for _ in 0..10 {
            assert_eq!(registry.select(0, &IDLE), first);
        }
        // Bus26m is blocked by PLL 1, syspll is not.
        assert_eq!(first, Some(1));
    }

    #[test]
    fn priority_law() {
        let mut registry = full();
        registry.update(&ConditionTable::EMPTY);
        for start in 0..registry.len() {
            assert_eq!(registry.select(start, &IDLE), Some(start));
        }
        assert_eq!(registry.select(registry.len(), &IDLE), None);

        // Blocking the three deepest leaves only the CPU buck constraint.
        registry.update(&ConditionTable::new(&[0, 0, 0x200], 0));
        assert_eq!(registry.select(0, &IDLE), Some(3));
    }

    #[test]
    fn resource_veto() {
        let mut registry = full();
        registry.update(&ConditionTable::EMPTY);

        let dram_needed = SelectContext {
            required: ResourceMask::DRAM_S0,
            ..IDLE
        };
        let selected = registry.select(0, &dram_needed).unwrap();
        let keeps = registry.get(selected).unwrap().keeps();
        assert!(keeps.contains(ResourceMask::DRAM_S0));
        assert_eq!(selected, 3);

        let bus_needed = SelectContext {
            required: ResourceMask::BUS26M,
            ..IDLE
        };
        assert_eq!(registry.select(0, &bus_needed), Some(1));
    }

    #[test]
    fn idempotent_reset() {
        let platform = TestPlatform::new();
        let mut registry = full();
        let mut sequencer = ConservationSequencer::new();
        let mut trace = TraceRecorder::new();
        let mut ctx = HookContext {
            platform: &platform,
            sequencer: &mut sequencer,
            trace: &mut trace,
            votes: ResourceMask::empty(),
        };
        let mut session =
            ConservationSession::new(0, 2, SessionKind::Idle, PowerControl::default());

        registry.run(2, &mut ctx, &mut session);
        assert_eq!(registry.get(2).unwrap().status().enter_count, 1);

        registry.reset(2, &mut ctx, &mut session);
        let writes = platform.regs().write_count();
        registry.reset(2, &mut ctx, &mut session);

        assert_eq!(registry.get(2).unwrap().status().enter_count, 1);
        assert_eq!(platform.regs().write_count(), writes);
    }

    #[test]
    fn residency_accumulates_and_clears() {
        let platform = TestPlatform::new();
        let mut registry = full();
        registry
            .do_update(
                ConstraintId::Index(1),
                &UpdateRequest::SetValid(ValidFlags::RESIDENCY | ValidFlags::TRACE_EVENT),
            )
            .unwrap();
        let mut sequencer = ConservationSequencer::new();
        let mut trace = TraceRecorder::new();
        let mut ctx = HookContext {
            platform: &platform,
            sequencer: &mut sequencer,
            trace: &mut trace,
            votes: ResourceMask::empty(),
        };

        for _ in 0..2 {
            let mut session =
                ConservationSession::new(0, 1, SessionKind::Idle, PowerControl::default());
            registry.run(1, &mut ctx, &mut session);
            platform.write_32(TEST_REGISTER_MAP.bk_pcm_timer, 100);
            registry.reset(1, &mut ctx, &mut session);
        }
        assert_eq!(ctx.trace.area().low_power.written(), 2);

        assert_eq!(
            registry.get_status(ConstraintId::Index(1), StatusKind::Residency, true),
            Ok(StatusValue::Residency(200))
        );
        assert_eq!(
            registry.get_status(ConstraintId::All, StatusKind::Residency, false),
            Ok(StatusValue::Residency(0))
        );
        assert_eq!(
            registry.get_status(ConstraintId::All, StatusKind::EnterCount, false),
            Ok(StatusValue::EnterCount(2))
        );
    }

    #[test]
    fn aggregate_status() {
        let mut registry = ConstraintRegistry::new();
        registry.register(
            [
                Constraint::Bus26m(Bus26m::new(ConditionTable::EMPTY)),
                Constraint::CpuBuckLdo(CpuBuckLdo::new()),
            ],
            SHAPE,
        );
        registry.constraints[0].status_mut().enter_count = 3;
        registry.constraints[1].status_mut().enter_count = 4;

        assert_eq!(
            registry.get_status(ConstraintId::All, StatusKind::EnterCount, false),
            Ok(StatusValue::EnterCount(7))
        );
        assert_eq!(
            registry.get_status(ConstraintId::Index(1), StatusKind::EnterCount, false),
            Ok(StatusValue::EnterCount(4))
        );
        let valid = registry
            .get_status(ConstraintId::All, StatusKind::Valid, false)
            .unwrap();
        assert_eq!(
            valid,
            StatusValue::Valid(ValidFlags::SW | ValidFlags::COND_CHECK | ValidFlags::COND_LATCH)
        );
        assert_eq!(
            registry
                .get_status(ConstraintId::All, StatusKind::ResourceRequest, false)
                .unwrap()
                .raw(),
            u64::from(ResourceMask::all().bits())
        );
        assert_eq!(
            registry.get_status(ConstraintId::Index(2), StatusKind::Valid, false),
            Err(RmError::UnknownConstraint(2))
        );
    }

    #[test]
    fn cond_block_detail() {
        let mut registry = blocking_pair();
        registry.update(&ConditionTable::new(&[0x1, 0, 0x300], 0));

        let detail = registry
            .get_status(ConstraintId::Index(1), StatusKind::CondBlockDetail, false)
            .unwrap();
        assert_eq!(
            detail,
            StatusValue::CondBlockDetail(ConditionTable::new(&[0, 0, 0x200], 0))
        );
        assert_eq!(detail.raw(), 1 << 2);
    }

    #[test]
    fn update_unknown_constraint() {
        let mut registry = blocking_pair();
        assert_eq!(
            registry.do_update(ConstraintId::Index(5), &UpdateRequest::ClearResidency),
            Err(RmError::UnknownConstraint(5))
        );
        assert_eq!(ConstraintId::from(u32::MAX), ConstraintId::All);
        assert_eq!(ConstraintId::from(1), ConstraintId::Index(1));
    }

    #[test]
    #[should_panic(expected = "registered twice")]
    fn double_register() {
        let mut registry = blocking_pair();
        registry.register(core::iter::empty(), SHAPE);
    }

    #[test]
    #[should_panic(expected = "More than 8 constraints")]
    fn capacity_overflow() {
        let mut registry = ConstraintRegistry::new();
        registry.register(
            (0..=CONSTRAINT_MAX).map(|_| Constraint::CpuBuckLdo(CpuBuckLdo::new())),
            SHAPE,
        );
    }
}

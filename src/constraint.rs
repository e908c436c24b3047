// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Low-power constraints: one selectable power-down depth each.

mod bus26m;
mod cpu_buck_ldo;
mod dram;
mod syspll;

pub use bus26m::{Bus26m, REMAIN_IRQ_MAX, RemainIrq, RemainIrqs};
pub use cpu_buck_ldo::CpuBuckLdo;
pub use dram::Dram;
pub use syspll::Syspll;

use crate::{
    condition::{ConditionShape, ConditionTable},
    conservation::{
        ConservationSequencer, ConservationSession, ExtOp, PcmFlags, PcmFlags1, SessionKind,
        WakeStatus,
    },
    notifier::{self, LpEvent},
    platform::LpmPlatform,
    registry::RmError,
    regs::{RegisterIo, SpmRegisterMap},
    resource::ResourceMask,
    suspend::SuspendFlavor,
    trace::TraceRecorder,
};
use bitflags::bitflags;
use log::{debug, info};

/// The maximum number of constraints a registry can hold.
pub const CONSTRAINT_MAX: usize = 8;

bitflags! {
    /// Validity and configuration flags of a constraint.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct ValidFlags: u16 {
        /// Enabled by static configuration.
        const SW = 1 << 0;
        /// Enabled once the coprocessor firmware handshake has completed.
        const FW = 1 << 1;
        /// Accumulate residency on the idle path.
        const RESIDENCY = 1 << 2;
        /// The forbidden mask takes part in eligibility.
        const COND_CHECK = 1 << 3;
        /// Keep the blocking intersection for diagnostics.
        const COND_LATCH = 1 << 4;
        /// The UFS reference clock is off (hibern8).
        const UFS_H8 = 1 << 5;
        /// The modem is in flight mode.
        const FLIGHT_MODE = 1 << 6;
        /// Crystal buffer low-power mode is supported.
        const XSOC_BBLPM = 1 << 7;
        /// Record idle-path wakes in the trace.
        const TRACE_EVENT = 1 << 8;

        /// Both enables.
        const READY = Self::SW.bits() | Self::FW.bits();
        /// Everything needed before the crystal buffer may enter low-power mode.
        const BBLPM_MODE = Self::UFS_H8.bits() | Self::FLIGHT_MODE.bits() | Self::XSOC_BBLPM.bits();
    }
}

impl ValidFlags {
    /// Returns whether both the software and firmware enables are set.
    pub fn is_ready(self) -> bool {
        self.contains(Self::READY)
    }

    /// Returns whether the crystal buffer may enter low-power mode.
    pub fn is_bblpm_mode(self) -> bool {
        self.contains(Self::BBLPM_MODE)
    }
}

bitflags! {
    /// Resources which a constraint lets the coprocessors switch off.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct AllowFlags: u32 {
        /// The CPU buck regulator may be switched to LDO.
        const CPU_BUCK_OFF = 1 << 0;
        /// DRAM may enter self-refresh S0.
        const DRAM_S0 = 1 << 1;
        /// DRAM may enter self-refresh S1.
        const DRAM_S1 = 1 << 2;
        /// VCORE may drop to its low-power voltage.
        const VCORE_LP = 1 << 3;
        /// The infrastructure may be powered down.
        const INFRA_PDN = 1 << 4;
        /// The 26 MHz bus clock may be stopped.
        const BUS26M_OFF = 1 << 5;
        /// Set for system suspend rather than idle.
        const AP_SUSPEND = 1 << 6;
        /// The crystal buffer may enter low-power mode.
        const BBLPM = 1 << 7;
        /// The UFS crystal may be switched off.
        const XO_UFS = 1 << 8;
        /// GPS is idle.
        const GPS = 1 << 9;
        /// The thermal sensors may be parked.
        const LVTS = 1 << 10;
    }
}

/// Runtime status of one constraint.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ConstraintStatus {
    /// Validity and configuration flags.
    pub valid: ValidFlags,
    /// Blocked report from the most recent condition check, 0 if nothing blocks.
    pub cond_blocked: u32,
    /// Number of entries, wrapping.
    pub enter_count: u32,
    /// Accumulated idle residency in 32 kHz ticks.
    pub residency: u64,
    /// The blocking intersection from the most recent check, when latching is enabled.
    pub cond_latch: ConditionTable,
}

impl ConstraintStatus {
    /// Returns whether the constraint may be selected, ignoring resource vetoes.
    pub fn is_eligible(&self) -> bool {
        self.valid.is_ready()
            && !(self.cond_blocked != 0 && self.valid.contains(ValidFlags::COND_CHECK))
    }
}

/// State shared by every constraint variant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConstraintCommon {
    /// Runtime status.
    pub status: ConstraintStatus,
    /// Clock-gating and PLL bits which must all be clear for this constraint to be entered.
    pub forbidden: ConditionTable,
}

impl ConstraintCommon {
    /// Creates the state for a constraint with the given forbidden mask and every flag clear.
    pub const fn new(forbidden: ConditionTable) -> Self {
        Self {
            status: ConstraintStatus {
                valid: ValidFlags::empty(),
                cond_blocked: 0,
                enter_count: 0,
                residency: 0,
                cond_latch: ConditionTable::EMPTY,
            },
            forbidden,
        }
    }

    fn check(&mut self, table: &ConditionTable) {
        let intersection = table.intersection(&self.forbidden);
        self.status.cond_blocked = ConditionTable::report(&intersection);
        if self.status.valid.contains(ValidFlags::COND_LATCH) {
            self.status.cond_latch = intersection;
        }
    }

    /// Applies the requests which every variant handles the same way. Requests aimed at a
    /// specific variant are ignored.
    fn apply(&mut self, request: &UpdateRequest, shape: ConditionShape) -> Result<(), RmError> {
        match request {
            UpdateRequest::SetValid(flags) => self.status.valid |= *flags,
            UpdateRequest::ClearValid(flags) => self.status.valid &= !*flags,
            UpdateRequest::ClearResidency => self.status.residency = 0,
            UpdateRequest::ModifyCondition {
                cond_id,
                value,
                set,
            } => {
                self.forbidden
                    .modify(shape.domains, shape.plls, *cond_id, *value, *set)
                    .ok_or(RmError::InvalidArgument)?;
            }
            UpdateRequest::FlightMode(_)
            | UpdateRequest::UfsRefClockOff(_)
            | UpdateRequest::RemainIrqs(_) => {}
        }
        Ok(())
    }
}

/// A change to constraint state other than a fresh condition table.
#[derive(Clone, Debug)]
pub enum UpdateRequest {
    /// Sets validity flags.
    SetValid(ValidFlags),
    /// Clears validity flags.
    ClearValid(ValidFlags),
    /// Zeroes the accumulated residency.
    ClearResidency,
    /// Sets or clears bits of the forbidden mask; see [`ConditionTable::modify`].
    ModifyCondition {
        /// Domain index, or domain count plus PLL index.
        cond_id: usize,
        /// Bits to change.
        value: u32,
        /// Set rather than clear.
        set: bool,
    },
    /// The modem entered or left flight mode.
    FlightMode(bool),
    /// The UFS reference clock was switched off or back on.
    UfsRefClockOff(bool),
    /// Interrupts which must be re-raised after a wake with the bus clock off.
    RemainIrqs(RemainIrqs),
}

/// What the arbiter knows when choosing a constraint.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SelectContext {
    /// Resources with outstanding votes.
    pub required: ResourceMask,
    /// Idle or suspend.
    pub kind: SessionKind,
}

/// Everything an `enter` or `reset` hook may touch.
pub struct HookContext<'a, P: LpmPlatform> {
    /// Register bus and platform hooks.
    pub platform: &'a P,
    /// Per-core sequencing state.
    pub sequencer: &'a mut ConservationSequencer,
    /// Wake history.
    pub trace: &'a mut TraceRecorder,
    /// Aggregate of outstanding resource votes.
    pub votes: ResourceMask,
}

/// The behaviour of one constraint variant.
///
/// Variants describe themselves through the required items; the provided methods implement the
/// shared enter and reset flow on top of that description.
pub trait ConstraintOps {
    /// Name used in diagnostics.
    const NAME: &'static str;

    /// Resources this constraint keeps on while entered.
    const KEEPS: ResourceMask;

    /// Flags set by [`init`](Self::init).
    const INIT_VALID: ValidFlags;

    /// Returns the shared state.
    fn common(&self) -> &ConstraintCommon;

    /// Returns the shared state mutably.
    fn common_mut(&mut self) -> &mut ConstraintCommon;

    /// Returns what the coprocessors may switch off, given the current validity flags.
    fn allows(&self) -> AllowFlags;

    /// Returns the PCM flag words for an idle entry.
    fn idle_pcm_flags(&self) -> (PcmFlags, PcmFlags1);

    /// Returns the extended operations for an entry of the given kind.
    fn ext_op(&self, kind: SessionKind) -> ExtOp;

    /// One-time setup at registration.
    fn init(&mut self) {
        self.common_mut().status.valid |= Self::INIT_VALID;
    }

    /// Applies an update request.
    fn update(&mut self, request: &UpdateRequest, shape: ConditionShape) -> Result<(), RmError> {
        self.common_mut().apply(request, shape)
    }

    /// Recomputes the blocked report against a fresh condition table.
    fn check_conditions(&mut self, table: &ConditionTable) {
        self.common_mut().check(table);
    }

    /// Returns whether the constraint is enabled and unblocked.
    fn is_eligible(&self) -> bool {
        self.common().status.is_eligible()
    }

    /// Returns whether the constraint can honour the context. Vetoes whenever a required resource
    /// is one this constraint does not keep.
    fn allow(&self, ctx: &SelectContext) -> bool {
        Self::KEEPS.contains(ctx.required)
    }

    /// Prepares the session and arms the hardware.
    fn enter<P: LpmPlatform>(
        &mut self,
        ctx: &mut HookContext<'_, P>,
        session: &mut ConservationSession,
    ) {
        let map = ctx.platform.register_map();
        let mut allows = self.allows();
        if session.kind == SessionKind::Suspend {
            allows |= AllowFlags::AP_SUSPEND;
        }
        notifier::notify(ctx.platform, map, LpEvent::Enter, allows);

        session.ext_op |= self.ext_op(session.kind);
        session.resource_req |= Self::KEEPS;
        let pwrctrl = &mut session.power_control;
        match session.kind {
            SessionKind::Idle => {
                (pwrctrl.pcm_flags, pwrctrl.pcm_flags1) = self.idle_pcm_flags();
            }
            SessionKind::Suspend => {
                if session.ext_op.contains(ExtOp::SET_SUSPEND_MODE) {
                    (pwrctrl.pcm_flags, pwrctrl.pcm_flags1) = SuspendFlavor::Sleep.pcm_flags();
                }
                ctx.platform
                    .write_32(map.mcupm_pdn_mailbox, SpmRegisterMap::MCUPM_POWER_DOWN);
                ctx.platform.suspend_prepare();
            }
        }

        debug!("{}: entering {:?}", Self::NAME, session.kind);
        ctx.sequencer.enter(ctx.platform, map, session, ctx.votes);
    }

    /// Undoes [`enter`](Self::enter) and accounts for the wake. Does nothing if the session's
    /// core is not asleep.
    fn reset<P: LpmPlatform>(
        &mut self,
        ctx: &mut HookContext<'_, P>,
        session: &mut ConservationSession,
    ) {
        let map = ctx.platform.register_map();
        let valid = self.common().status.valid;
        match session.kind {
            SessionKind::Idle if valid.contains(ValidFlags::TRACE_EVENT) => {
                session.ext_op |= ExtOp::TRACE_LP;
            }
            SessionKind::Idle => {}
            SessionKind::Suspend => session.ext_op |= ExtOp::TRACE_SUSPEND,
        }

        let Some(wake) = ctx.sequencer.leave(ctx.platform, map, session, ctx.trace) else {
            return;
        };

        match session.kind {
            SessionKind::Idle => {
                if valid.contains(ValidFlags::RESIDENCY) {
                    let status = &mut self.common_mut().status;
                    status.residency += u64::from(wake.record.timer_out);
                }
            }
            SessionKind::Suspend => {
                ctx.platform.suspend_finish();
                ctx.platform.write_32(map.mcupm_pdn_mailbox, 0);
            }
        }
        notifier::notify(ctx.platform, map, LpEvent::Leave, self.allows());

        self.after_leave(ctx.platform, &wake);
    }

    /// Called once per wake, after the shared reset flow.
    fn after_leave<P: LpmPlatform>(&mut self, platform: &P, wake: &WakeStatus) {
        let _ = (platform, wake);
    }
}

/// The closed set of constraint variants.
#[derive(Clone, Debug)]
pub enum Constraint {
    /// 26 MHz bus clock off.
    Bus26m(Bus26m),
    /// System PLL off.
    Syspll(Syspll),
    /// DRAM in self-refresh.
    Dram(Dram),
    /// CPU buck switched to LDO.
    CpuBuckLdo(CpuBuckLdo),
}

macro_rules! dispatch {
    ($constraint:expr, $variant:ident => $body:expr) => {
        match $constraint {
            Constraint::Bus26m($variant) => $body,
            Constraint::Syspll($variant) => $body,
            Constraint::Dram($variant) => $body,
            Constraint::CpuBuckLdo($variant) => $body,
        }
    };
}

impl Constraint {
    /// Returns the variant's name.
    pub fn name(&self) -> &'static str {
        fn name<C: ConstraintOps>(_: &C) -> &'static str {
            C::NAME
        }
        dispatch!(self, c => name(c))
    }

    /// Returns the resources this constraint keeps on.
    pub fn keeps(&self) -> ResourceMask {
        fn keeps<C: ConstraintOps>(_: &C) -> ResourceMask {
            C::KEEPS
        }
        dispatch!(self, c => keeps(c))
    }

    /// Returns what the coprocessors may switch off.
    pub fn allows(&self) -> AllowFlags {
        dispatch!(self, c => c.allows())
    }

    /// Returns the runtime status.
    pub fn status(&self) -> &ConstraintStatus {
        dispatch!(self, c => &c.common().status)
    }

    /// Returns the runtime status mutably.
    pub fn status_mut(&mut self) -> &mut ConstraintStatus {
        dispatch!(self, c => &mut c.common_mut().status)
    }

    /// Returns the forbidden mask.
    pub fn forbidden(&self) -> &ConditionTable {
        dispatch!(self, c => &c.common().forbidden)
    }

    /// See [`ConstraintOps::init`].
    pub fn init(&mut self) {
        dispatch!(self, c => c.init())
    }

    /// See [`ConstraintOps::update`].
    pub fn update(
        &mut self,
        request: &UpdateRequest,
        shape: ConditionShape,
    ) -> Result<(), RmError> {
        dispatch!(self, c => c.update(request, shape))
    }

    /// See [`ConstraintOps::check_conditions`].
    pub fn check_conditions(&mut self, table: &ConditionTable) {
        dispatch!(self, c => c.check_conditions(table))
    }

    /// See [`ConstraintOps::is_eligible`].
    pub fn is_eligible(&self) -> bool {
        dispatch!(self, c => c.is_eligible())
    }

    /// See [`ConstraintOps::allow`].
    pub fn allow(&self, ctx: &SelectContext) -> bool {
        dispatch!(self, c => c.allow(ctx))
    }

    /// See [`ConstraintOps::enter`].
    pub fn enter<P: LpmPlatform>(
        &mut self,
        ctx: &mut HookContext<'_, P>,
        session: &mut ConservationSession,
    ) {
        dispatch!(self, c => c.enter(ctx, session))
    }

    /// See [`ConstraintOps::reset`].
    pub fn reset<P: LpmPlatform>(
        &mut self,
        ctx: &mut HookContext<'_, P>,
        session: &mut ConservationSession,
    ) {
        dispatch!(self, c => c.reset(ctx, session))
    }
}

/// Logs the blocking intersection of every latched constraint, for suspend diagnostics.
pub fn log_blocked(constraints: &[Constraint]) {
    for constraint in constraints {
        let status = constraint.status();
        if status.cond_blocked != 0 {
            info!(
                "{}: blocked {:#x}, latch {:x?}",
                constraint.name(),
                status.cond_blocked,
                status.cond_latch
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPE: ConditionShape = ConditionShape {
        domains: 3,
        plls: 2,
    };

    fn dram() -> Constraint {
        let mut constraint = Constraint::Dram(Dram::new(ConditionTable::new(&[0, 0, 0x200], 0b01)));
        constraint.init();
        constraint
    }

    #[test]
    fn init_sets_configured_flags() {
        let constraint = dram();
        let valid = constraint.status().valid;
        assert!(valid.contains(ValidFlags::SW | ValidFlags::COND_CHECK));
        assert!(!valid.contains(ValidFlags::FW));
        assert!(!constraint.is_eligible());
    }

    #[test]
    fn eligibility_needs_both_enables() {
        let mut constraint = dram();
        constraint
            .update(&UpdateRequest::SetValid(ValidFlags::FW), SHAPE)
            .unwrap();
        assert!(constraint.is_eligible());

        constraint
            .update(&UpdateRequest::ClearValid(ValidFlags::SW), SHAPE)
            .unwrap();
        assert!(!constraint.is_eligible());
    }

    #[test]
    fn blocked_only_with_cond_check() {
        let mut constraint = dram();
        constraint
            .update(&UpdateRequest::SetValid(ValidFlags::FW), SHAPE)
            .unwrap();

        constraint.check_conditions(&ConditionTable::new(&[0xffff, 0, 0x300], 0b10));
        assert_eq!(constraint.status().cond_blocked, 1 << 2);
        assert_eq!(constraint.status().cond_latch.domains[2], 0x200);
        assert!(!constraint.is_eligible());

        constraint
            .update(&UpdateRequest::ClearValid(ValidFlags::COND_CHECK), SHAPE)
            .unwrap();
        assert!(constraint.is_eligible());
    }

    #[test]
    fn pll_block_report() {
        let mut constraint = dram();
        constraint.check_conditions(&ConditionTable::new(&[], 0b11));
        assert_eq!(
            constraint.status().cond_blocked,
            crate::condition::BLOCKED_PLL | (1 << crate::condition::BLOCKED_PLL_SHIFT)
        );
    }

    #[test]
    fn modify_forbidden_mask() {
        let mut constraint = dram();
        constraint
            .update(
                &UpdateRequest::ModifyCondition {
                    cond_id: 0,
                    value: 0x11,
                    set: true,
                },
                SHAPE,
            )
            .unwrap();
        constraint
            .update(
                &UpdateRequest::ModifyCondition {
                    cond_id: 4,
                    value: 1,
                    set: true,
                },
                SHAPE,
            )
            .unwrap();
        assert_eq!(constraint.forbidden().domains[0], 0x11);
        assert_eq!(constraint.forbidden().pll, 0b11);

        assert!(matches!(
            constraint.update(
                &UpdateRequest::ModifyCondition {
                    cond_id: 5,
                    value: 1,
                    set: true,
                },
                SHAPE,
            ),
            Err(RmError::InvalidArgument)
        ));
    }

    #[test]
    fn allow_vetoes_unkept_resources() {
        let cpu_buck = Constraint::CpuBuckLdo(CpuBuckLdo::new());
        let bus26m = Constraint::Bus26m(Bus26m::new(ConditionTable::EMPTY));
        let ctx = SelectContext {
            required: ResourceMask::DRAM_S0,
            kind: SessionKind::Idle,
        };

        assert!(cpu_buck.allow(&ctx));
        assert!(!bus26m.allow(&ctx));
        assert!(bus26m.allow(&SelectContext {
            required: ResourceMask::empty(),
            ..ctx
        }));
    }

    #[test]
    fn bblpm_mode_needs_all_three() {
        let partial = ValidFlags::UFS_H8 | ValidFlags::FLIGHT_MODE;
        assert!(!partial.is_bblpm_mode());
        assert!(ValidFlags::BBLPM_MODE.is_bblpm_mode());
    }
}

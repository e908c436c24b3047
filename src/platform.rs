// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The hooks a platform provides to the low-power arbiter.

pub mod mt8192;

use crate::{
    condition::ConditionLayout,
    conservation::PowerControl,
    constraint::{CONSTRAINT_MAX, Constraint},
    regs::{RegisterIo, SpmRegisterMap},
};
use arm_gic::IntId;
use arrayvec::ArrayVec;

/// The maximum number of cores any platform may have.
pub const CORE_MAX: usize = 16;

/// The hooks implemented by all platforms.
///
/// The platform is also the register bus: every SPM, clock and mailbox access goes through its
/// [`RegisterIo`] implementation.
pub trait LpmPlatform: RegisterIo + Sync {
    /// The number of CPU cores. Must not exceed [`CORE_MAX`].
    const CORE_COUNT: usize;

    /// Wake sources and timer for the idle path. The PCM flags are filled in by the selected
    /// constraint.
    const IDLE_POWER_CONTROL: PowerControl;

    /// Wake sources and timer for system suspend. The PCM flags come from the suspend flavor.
    const SUSPEND_POWER_CONTROL: PowerControl;

    /// Returns where the SPM registers live.
    fn register_map(&self) -> &SpmRegisterMap;

    /// Returns the clock-gating domains and PLLs which are observed before every selection.
    fn condition_layout(&self) -> &ConditionLayout;

    /// Returns the platform's constraints in selection order, deepest first.
    fn constraints(&self) -> ArrayVec<Constraint, CONSTRAINT_MAX>;

    /// Marks an interrupt as pending, for wake sources whose edge was lost while the interrupt
    /// controller's clock was off.
    fn set_interrupt_pending(&self, int_id: IntId) {
        let _ = int_id;
    }

    /// Called just before the SPM is armed for system suspend, for example to save the console
    /// UART state.
    fn suspend_prepare(&self) {}

    /// Called after resuming from system suspend, before the coprocessors are told.
    fn suspend_finish(&self) {}
}

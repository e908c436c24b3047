// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Low-power constraint arbitration for MediaTek SPM based SoCs.
//!
//! Before each idle or suspend entry the [`Spm`] samples clock-gating and PLL state, updates
//! every registered constraint from it, picks the deepest constraint whose conditions and
//! resource votes allow it, and programs the SPM accordingly. On wake it decodes why the core
//! woke and records the entry in a trace area that the normal world can read back.
//!
//! The normal world controls the arbiter through the SiP call handled by
//! [`services::lpm::LpmService`].

#![cfg_attr(not(test), no_std)]

pub mod condition;
pub mod conservation;
pub mod constraint;
mod debug;
pub mod dispatcher;
pub mod logger;
pub mod notifier;
pub mod platform;
pub mod registry;
pub mod regs;
pub mod resource;
pub mod services;
pub mod smccc;
pub mod suspend;
pub mod trace;

pub use crate::{
    conservation::WakeReason,
    constraint::UpdateRequest,
    dispatcher::{CommandResult, LpmCommand, RmStatus, SelectedDepth, Spm},
    platform::LpmPlatform,
    registry::{ConstraintId, RmError, StatusKind},
    resource::Resource,
    suspend::SuspendFlavor,
};

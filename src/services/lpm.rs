// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The SiP call through which the normal world controls the low-power arbiter.

use crate::{
    constraint::{UpdateRequest, ValidFlags},
    dispatcher::{CommandResult, LpmCommand, RmStatus, Spm},
    platform::LpmPlatform,
    registry::{ConstraintId, StatusKind},
    services::{Service, World, owns},
    smccc::{FunctionId, OwningEntityNumber, SetFrom, SmcReturn, SmcccCallType},
    suspend::SuspendFlavor,
};
use bitflags::bitflags;
use log::{debug, trace};
use num_enum::TryFromPrimitive;

const LPM_CONTROL_NUMBER: u16 = 0x0515;

/// The SMC64 function ID of the low-power control call.
pub const LPM_CONTROL: FunctionId =
    FunctionId::new(SmcccCallType::Fast64, OwningEntityNumber::SIP, LPM_CONTROL_NUMBER);

const LP_ID_MAGIC: u32 = 0xDA00_0000;
const LP_ID_USER_SHIFT: u32 = 16;
const LP_ID_USER_MASK: u32 = 0xff;
const LP_ID_UID_MASK: u32 = 0xffff;

/// Suspend flavor bit of the `STATUS` argument: set for the audio-retaining flavor.
pub const STATUS_SUSPEND_SLEEP: u64 = 1 << 27;

/// Which subsystem a low-power id is addressed to.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum LpmUser {
    /// CPU power management.
    CpuPm = 0,
    /// SPM diagnostics: constraint status.
    SpmDbg = 1,
    /// SPM control.
    Spm = 2,
}

/// Ids under [`LpmUser::Spm`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum SpmUid {
    /// Suspend flavor.
    Status = 0,
    /// Resume watchdog.
    PcmWdt = 1,
    /// PHY PLL mode.
    PhypllMode = 2,
}

/// Ids under [`LpmUser::SpmDbg`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum SpmDbgUid {
    /// Constraint validity and statistics.
    RcStatus = 0,
}

/// Builds the low-power id for a user and one of its ids.
pub const fn lp_id(user: LpmUser, uid: u32) -> u64 {
    (LP_ID_MAGIC | ((user as u32 & LP_ID_USER_MASK) << LP_ID_USER_SHIFT) | (uid & LP_ID_UID_MASK))
        as u64
}

bitflags! {
    /// What a low-power call asks for.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct Action: u64 {
        /// Set or enable.
        const SET = 1 << 0;
        /// Clear or disable.
        const CLR = 1 << 1;
        /// Read.
        const GET = 1 << 2;
    }
}

/// Decodes the arguments of a low-power call. Returns `None` if they are malformed.
pub fn decode(id: u64, action: u64, arg1: u64, arg2: u64) -> Option<LpmCommand> {
    let id = u32::try_from(id).ok()?;
    if id & LP_ID_MAGIC != LP_ID_MAGIC {
        return None;
    }
    let user = LpmUser::try_from((id >> LP_ID_USER_SHIFT) & LP_ID_USER_MASK).ok()?;
    let uid = id & LP_ID_UID_MASK;
    let action = Action::from_bits_truncate(action);

    match user {
        LpmUser::Spm => match SpmUid::try_from(uid).ok()? {
            SpmUid::Status if arg2 & STATUS_SUSPEND_SLEEP == 0 => None,
            SpmUid::Status if action.contains(Action::SET) => {
                Some(LpmCommand::SetSuspendFlavor(SuspendFlavor::Sleep))
            }
            SpmUid::Status if action.contains(Action::CLR) => {
                Some(LpmCommand::SetSuspendFlavor(SuspendFlavor::SystemPdn))
            }
            SpmUid::PcmWdt if action.intersects(Action::SET | Action::CLR) => {
                Some(LpmCommand::SetWatchdog {
                    enable: action.contains(Action::SET),
                    ticks: u32::try_from(arg2).ok()?,
                })
            }
            SpmUid::PhypllMode if action.contains(Action::GET) => Some(LpmCommand::QueryPllMode),
            _ => None,
        },
        LpmUser::SpmDbg => match SpmDbgUid::try_from(uid).ok()? {
            SpmDbgUid::RcStatus => {
                let target = ConstraintId::from(u32::try_from(arg1).ok()?);
                if action.contains(Action::GET) {
                    Some(LpmCommand::GetStatus {
                        target,
                        kind: StatusKind::try_from(u32::try_from(arg2).ok()?).ok()?,
                        clear: action.contains(Action::CLR),
                    })
                } else {
                    let flags = ValidFlags::from_bits(u16::try_from(arg2).ok()?)?;
                    let request = if action.contains(Action::SET) {
                        UpdateRequest::SetValid(flags)
                    } else if action.contains(Action::CLR) {
                        UpdateRequest::ClearValid(flags)
                    } else {
                        return None;
                    };
                    Some(LpmCommand::SetStatus { target, request })
                }
            }
        },
        LpmUser::CpuPm => None,
    }
}

/// The low-power control SiP service.
pub struct LpmService<'a, P: LpmPlatform> {
    spm: &'a Spm<P>,
}

impl<'a, P: LpmPlatform> LpmService<'a, P> {
    /// Creates the service for the given arbiter.
    pub fn new(spm: &'a Spm<P>) -> Self {
        Self { spm }
    }

    fn handle(&self, regs: &mut SmcReturn) {
        let in_regs = regs.values();
        let result = match in_regs {
            [_, id, action, arg1, arg2, ..] => match decode(*id, *action, *arg1, *arg2) {
                Some(command) => self.spm.control(&command),
                None => {
                    debug!("Malformed LPM call {id:#x} action {action:#x}");
                    CommandResult::new(RmStatus::Bad, 0)
                }
            },
            _ => CommandResult::new(RmStatus::Bad, 0),
        };
        trace!("LPM call result: {result:?}");
        regs.set_from([i64::from(result.status as i32) as u64, result.value]);
    }
}

impl<P: LpmPlatform> Service for LpmService<'_, P> {
    owns!(
        OwningEntityNumber::SIP,
        LPM_CONTROL_NUMBER..=LPM_CONTROL_NUMBER
    );

    fn handle_non_secure_smc(&self, regs: &mut SmcReturn) -> World {
        self.handle(regs);
        World::NonSecure
    }
}

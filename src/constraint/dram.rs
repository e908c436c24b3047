// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use super::{AllowFlags, ConstraintCommon, ConstraintOps, UpdateRequest, ValidFlags};
use crate::{
    condition::{ConditionShape, ConditionTable},
    conservation::{ExtOp, PcmFlags, PcmFlags1, SessionKind},
    registry::RmError,
    resource::ResourceMask,
};
use log::debug;

const ALLOWS: AllowFlags = AllowFlags::DRAM_S0
    .union(AllowFlags::DRAM_S1)
    .union(AllowFlags::CPU_BUCK_OFF);

const PCM_FLAGS: PcmFlags = PcmFlags::DISABLE_INFRA_PDN
    .union(PcmFlags::DISABLE_VCORE_DVS)
    .union(PcmFlags::DISABLE_VCORE_DFS)
    .union(PcmFlags::SRAM_SLEEP_CTRL)
    .union(PcmFlags::KEEP_CSYSPWRACK_HIGH);

/// DRAM enters self-refresh while the system PLL, infrastructure and 26 MHz clock stay on.
#[derive(Clone, Debug)]
pub struct Dram {
    common: ConstraintCommon,
}

impl Dram {
    /// Creates the constraint with the given forbidden mask.
    pub const fn new(forbidden: ConditionTable) -> Self {
        Self {
            common: ConstraintCommon::new(forbidden),
        }
    }

    fn set_flag(&mut self, flag: ValidFlags, on: bool) {
        self.common.status.valid.set(flag, on);
        debug!("dram: {flag:?} = {on}");
    }
}

impl ConstraintOps for Dram {
    const NAME: &'static str = "dram";
    const KEEPS: ResourceMask = ResourceMask::SYSPLL
        .union(ResourceMask::INFRA)
        .union(ResourceMask::BUS26M);
    const INIT_VALID: ValidFlags = ValidFlags::SW
        .union(ValidFlags::COND_CHECK)
        .union(ValidFlags::COND_LATCH)
        .union(ValidFlags::XSOC_BBLPM);

    fn common(&self) -> &ConstraintCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut ConstraintCommon {
        &mut self.common
    }

    fn allows(&self) -> AllowFlags {
        if self.common.status.valid.is_bblpm_mode() {
            ALLOWS | AllowFlags::BBLPM
        } else {
            ALLOWS
        }
    }

    fn idle_pcm_flags(&self) -> (PcmFlags, PcmFlags1) {
        (PCM_FLAGS, PcmFlags1::empty())
    }

    fn ext_op(&self, kind: SessionKind) -> ExtOp {
        match kind {
            SessionKind::Idle if self.common.status.valid.is_bblpm_mode() => {
                ExtOp::HW_S1_DETECT | ExtOp::SRCLKEN_RC_BBLPM
            }
            SessionKind::Idle => ExtOp::HW_S1_DETECT,
            SessionKind::Suspend => {
                ExtOp::CLR_26M_RECORD | ExtOp::SET_WDT | ExtOp::HW_S1_DETECT
            }
        }
    }

    fn update(&mut self, request: &UpdateRequest, shape: ConditionShape) -> Result<(), RmError> {
        match request {
            UpdateRequest::FlightMode(on) => self.set_flag(ValidFlags::FLIGHT_MODE, *on),
            UpdateRequest::UfsRefClockOff(off) => self.set_flag(ValidFlags::UFS_H8, *off),
            _ => {}
        }
        self.common.apply(request, shape)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifications_drive_bblpm() {
        let mut constraint = Dram::new(ConditionTable::EMPTY);
        constraint.init();
        let shape = ConditionShape::default();

        constraint
            .update(&UpdateRequest::FlightMode(true), shape)
            .unwrap();
        assert!(!constraint.common().status.valid.is_bblpm_mode());
        constraint
            .update(&UpdateRequest::UfsRefClockOff(true), shape)
            .unwrap();
        assert!(constraint.common().status.valid.is_bblpm_mode());
        assert_eq!(
            constraint.ext_op(SessionKind::Idle),
            ExtOp::HW_S1_DETECT | ExtOp::SRCLKEN_RC_BBLPM
        );

        constraint
            .update(&UpdateRequest::FlightMode(false), shape)
            .unwrap();
        let valid = constraint.common().status.valid;
        assert!(!valid.contains(ValidFlags::FLIGHT_MODE));
        assert_eq!(constraint.allows(), ALLOWS);
    }

    #[test]
    fn suspend_ext_op() {
        let constraint = Dram::new(ConditionTable::EMPTY);
        assert_eq!(
            constraint.ext_op(SessionKind::Suspend),
            ExtOp::CLR_26M_RECORD | ExtOp::SET_WDT | ExtOp::HW_S1_DETECT
        );
    }
}

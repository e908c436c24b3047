// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use super::{AllowFlags, ConstraintCommon, ConstraintOps, ValidFlags};
use crate::{
    condition::ConditionTable,
    conservation::{ExtOp, PcmFlags, PcmFlags1, SessionKind},
    resource::ResourceMask,
};

const PCM_FLAGS: PcmFlags = PcmFlags::DISABLE_INFRA_PDN
    .union(PcmFlags::DISABLE_VCORE_DVS)
    .union(PcmFlags::DISABLE_VCORE_DFS)
    .union(PcmFlags::SRAM_SLEEP_CTRL)
    .union(PcmFlags::KEEP_CSYSPWRACK_HIGH);

/// The shallowest constraint: only the CPU buck regulator is switched to LDO, everything else
/// stays on. It has no forbidden mask.
#[derive(Clone, Debug)]
pub struct CpuBuckLdo {
    common: ConstraintCommon,
}

impl CpuBuckLdo {
    /// Creates the constraint.
    pub const fn new() -> Self {
        Self {
            common: ConstraintCommon::new(ConditionTable::EMPTY),
        }
    }
}

impl Default for CpuBuckLdo {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintOps for CpuBuckLdo {
    const NAME: &'static str = "cpu_buck_ldo";
    const KEEPS: ResourceMask = ResourceMask::all();
    const INIT_VALID: ValidFlags = ValidFlags::SW;

    fn common(&self) -> &ConstraintCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut ConstraintCommon {
        &mut self.common
    }

    fn allows(&self) -> AllowFlags {
        AllowFlags::CPU_BUCK_OFF
    }

    fn idle_pcm_flags(&self) -> (PcmFlags, PcmFlags1) {
        (PCM_FLAGS, PcmFlags1::empty())
    }

    fn ext_op(&self, kind: SessionKind) -> ExtOp {
        match kind {
            SessionKind::Idle => ExtOp::empty(),
            SessionKind::Suspend => ExtOp::CLR_26M_RECORD | ExtOp::SET_WDT,
        }
    }
}

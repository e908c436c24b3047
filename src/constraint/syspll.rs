// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use super::{AllowFlags, ConstraintCommon, ConstraintOps, ValidFlags};
use crate::{
    condition::ConditionTable,
    conservation::{ExtOp, PcmFlags, PcmFlags1, SessionKind},
    resource::ResourceMask,
};

const ALLOWS: AllowFlags = AllowFlags::CPU_BUCK_OFF
    .union(AllowFlags::DRAM_S0)
    .union(AllowFlags::DRAM_S1)
    .union(AllowFlags::VCORE_LP);

const PCM_FLAGS: PcmFlags = PcmFlags::DISABLE_INFRA_PDN
    .union(PcmFlags::DISABLE_VCORE_DVS)
    .union(PcmFlags::DISABLE_VCORE_DFS)
    .union(PcmFlags::SRAM_SLEEP_CTRL)
    .union(PcmFlags::KEEP_CSYSPWRACK_HIGH)
    .union(PcmFlags::ENABLE_6315_CTRL)
    .union(PcmFlags::USE_SRCCLKENO2);

/// The system PLL is stopped, with the 26 MHz clock kept running.
#[derive(Clone, Debug)]
pub struct Syspll {
    common: ConstraintCommon,
}

impl Syspll {
    /// Creates the constraint with the given forbidden mask.
    pub const fn new(forbidden: ConditionTable) -> Self {
        Self {
            common: ConstraintCommon::new(forbidden),
        }
    }
}

impl ConstraintOps for Syspll {
    const NAME: &'static str = "syspll";
    const KEEPS: ResourceMask = ResourceMask::BUS26M;
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
                ExtOp::SET_WDT | ExtOp::HW_S1_DETECT | ExtOp::SET_SUSPEND_MODE
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        conservation::{ConservationSequencer, ConservationSession},
        constraint::{HookContext, UpdateRequest},
        condition::ConditionShape,
        platform::{LpmPlatform, test::TestPlatform},
        regs::{RegisterIo, SpmRegisterMap},
        suspend::SuspendFlavor,
        trace::TraceRecorder,
    };

    #[test]
    fn bblpm_follows_validity() {
        let mut constraint = Syspll::new(ConditionTable::EMPTY);
        constraint.init();
        assert_eq!(constraint.ext_op(SessionKind::Idle), ExtOp::HW_S1_DETECT);
        assert!(!constraint.allows().contains(AllowFlags::BBLPM));

        constraint
            .update(
                &UpdateRequest::SetValid(ValidFlags::UFS_H8 | ValidFlags::FLIGHT_MODE),
                ConditionShape::default(),
            )
            .unwrap();
        assert_eq!(
            constraint.ext_op(SessionKind::Idle),
            ExtOp::HW_S1_DETECT | ExtOp::SRCLKEN_RC_BBLPM
        );
        assert!(constraint.allows().contains(AllowFlags::BBLPM));
    }

    #[test]
    fn suspend_uses_sleep_flavor() {
        let platform = TestPlatform::new();
        let map = platform.register_map();
        let mut sequencer = ConservationSequencer::new();
        let mut trace = TraceRecorder::new();
        let mut ctx = HookContext {
            platform: &platform,
            sequencer: &mut sequencer,
            trace: &mut trace,
            votes: ResourceMask::empty(),
        };
        let mut constraint = Syspll::new(ConditionTable::EMPTY);
        constraint.init();
        let mut pwrctrl = TestPlatform::SUSPEND_POWER_CONTROL;
        (pwrctrl.pcm_flags, pwrctrl.pcm_flags1) = SuspendFlavor::SystemPdn.pcm_flags();
        let mut session = ConservationSession::new(0, 1, SessionKind::Suspend, pwrctrl);

        constraint.enter(&mut ctx, &mut session);

        let (sleep, sleep1) = SuspendFlavor::Sleep.pcm_flags();
        assert_eq!(platform.read_32(map.sw_flag_0), sleep.bits());
        assert_eq!(platform.read_32(map.sw_flag_1), sleep1.bits());
        assert_eq!(
            platform.read_32(map.mcupm_pdn_mailbox),
            SpmRegisterMap::MCUPM_POWER_DOWN
        );
        assert_eq!(platform.read_32(map.src_req), ResourceMask::BUS26M.bits());
        assert_eq!(
            platform.read_32(map.lp_mailbox),
            (ALLOWS | AllowFlags::AP_SUSPEND).bits()
        );
        assert_eq!(platform.suspend_hooks(), (1, 0));

        constraint.reset(&mut ctx, &mut session);
        assert_eq!(platform.read_32(map.mcupm_pdn_mailbox), 0);
        assert_eq!(platform.suspend_hooks(), (1, 1));
        assert!(session.wake.is_some());
    }
}

// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use super::{AllowFlags, ConstraintCommon, ConstraintOps, UpdateRequest, ValidFlags};
use crate::{
    condition::{ConditionShape, ConditionTable},
    conservation::{ExtOp, PcmFlags, PcmFlags1, SessionKind, WakeStatus},
    platform::LpmPlatform,
    registry::RmError,
    resource::ResourceMask,
};
use arm_gic::IntId;
use arrayvec::ArrayVec;
use log::info;

/// The maximum number of interrupts which can be re-raised after a wake.
pub const REMAIN_IRQ_MAX: usize = 8;

/// A wake source whose interrupt must be set pending by hand, because the interrupt controller
/// misses edges while the 26 MHz clock is off.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RemainIrq {
    /// The interrupt to set pending.
    pub int_id: IntId,
    /// Wake-source bits which indicate this interrupt.
    pub wake_src: u32,
    /// Log each delivery.
    pub log: bool,
}

/// The interrupts to re-raise after a wake.
pub type RemainIrqs = ArrayVec<RemainIrq, REMAIN_IRQ_MAX>;

const ALLOWS: AllowFlags = AllowFlags::CPU_BUCK_OFF
    .union(AllowFlags::DRAM_S0)
    .union(AllowFlags::DRAM_S1)
    .union(AllowFlags::VCORE_LP)
    .union(AllowFlags::LVTS)
    .union(AllowFlags::BUS26M_OFF);

const PCM_FLAGS: PcmFlags = PcmFlags::DISABLE_INFRA_PDN
    .union(PcmFlags::DISABLE_VCORE_DVS)
    .union(PcmFlags::DISABLE_VCORE_DFS)
    .union(PcmFlags::SRAM_SLEEP_CTRL)
    .union(PcmFlags::ENABLE_TIA_WORKAROUND)
    .union(PcmFlags::ENABLE_LVTS_WORKAROUND)
    .union(PcmFlags::KEEP_CSYSPWRACK_HIGH);

/// The deepest constraint: the 26 MHz bus clock is stopped.
#[derive(Clone, Debug)]
pub struct Bus26m {
    common: ConstraintCommon,
    remain_irqs: RemainIrqs,
}

impl Bus26m {
    /// Creates the constraint with the given forbidden mask.
    pub const fn new(forbidden: ConditionTable) -> Self {
        Self {
            common: ConstraintCommon::new(forbidden),
            remain_irqs: ArrayVec::new_const(),
        }
    }

    /// Returns the interrupts which are re-raised after a wake.
    pub fn remain_irqs(&self) -> &[RemainIrq] {
        &self.remain_irqs
    }
}

impl ConstraintOps for Bus26m {
    const NAME: &'static str = "bus26m";
    const KEEPS: ResourceMask = ResourceMask::empty();
    const INIT_VALID: ValidFlags = ValidFlags::SW
        .union(ValidFlags::COND_CHECK)
        .union(ValidFlags::COND_LATCH);

    fn common(&self) -> &ConstraintCommon {
        &self.common
    }

    fn common_mut(&mut self) -> &mut ConstraintCommon {
        &mut self.common
    }

    fn allows(&self) -> AllowFlags {
        ALLOWS
    }

    fn idle_pcm_flags(&self) -> (PcmFlags, PcmFlags1) {
        (PCM_FLAGS, PcmFlags1::DISABLE_MD26M_CK_OFF)
    }

    fn ext_op(&self, kind: SessionKind) -> ExtOp {
        match kind {
            SessionKind::Idle => ExtOp::HW_S1_DETECT,
            SessionKind::Suspend => ExtOp::SET_WDT | ExtOp::HW_S1_DETECT,
        }
    }

    fn update(&mut self, request: &UpdateRequest, shape: ConditionShape) -> Result<(), RmError> {
        if let UpdateRequest::RemainIrqs(irqs) = request {
            self.remain_irqs = irqs.clone();
        }
        self.common.apply(request, shape)
    }

    fn after_leave<P: LpmPlatform>(&mut self, platform: &P, wake: &WakeStatus) {
        let record = &wake.record;
        for irq in &self.remain_irqs {
            if (record.r12 | record.raw_sta) & irq.wake_src == 0 {
                continue;
            }
            if irq.log {
                info!(
                    "r12 = {:#010x}, flag = {:#010x} {:#010x} {:#010x}",
                    record.r12, record.debug_flag, record.sw_flag0, record.sw_flag1
                );
                info!("irq {:?} ({:#010x}) set pending", irq.int_id, irq.wake_src);
            }
            platform.set_interrupt_pending(irq.int_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        conservation::{
            ConservationSequencer, ConservationSession, R12_PCM_TIMER, SequencerPhase,
        },
        constraint::HookContext,
        platform::test::TestPlatform,
        regs::RegisterIo,
        trace::{TraceCategory, TraceRecorder},
    };

    const UART_IRQ: IntId = IntId::spi(91);
    const KEYPAD_IRQ: IntId = IntId::spi(106);

    fn irqs() -> RemainIrqs {
        [
            RemainIrq {
                int_id: UART_IRQ,
                wake_src: 1 << 6,
                log: true,
            },
            RemainIrq {
                int_id: KEYPAD_IRQ,
                wake_src: 1 << 2,
                log: false,
            },
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn redelivers_matching_irqs() {
        let platform = TestPlatform::new();
        let mut sequencer = ConservationSequencer::new();
        let mut trace = TraceRecorder::new();
        let mut constraint = Bus26m::new(ConditionTable::EMPTY);
        constraint.init();
        constraint
            .update(&UpdateRequest::RemainIrqs(irqs()), ConditionShape::default())
            .unwrap();
        assert_eq!(constraint.remain_irqs().len(), 2);

        let mut ctx = HookContext {
            platform: &platform,
            sequencer: &mut sequencer,
            trace: &mut trace,
            votes: ResourceMask::empty(),
        };
        let mut session =
            ConservationSession::new(0, 0, SessionKind::Idle, TestPlatform::IDLE_POWER_CONTROL);
        constraint.enter(&mut ctx, &mut session);
        assert_eq!(ctx.sequencer.phase(0), SequencerPhase::Asleep);
        assert_eq!(session.ext_op, ExtOp::HW_S1_DETECT);
        assert_eq!(session.resource_req, ResourceMask::empty());

        let map = platform.register_map();
        platform.write_32(map.bk_wake_event, R12_PCM_TIMER | (1 << 6));
        constraint.reset(&mut ctx, &mut session);

        assert_eq!(platform.pending_interrupts(), [UART_IRQ]);
        assert_eq!(ctx.trace.latest(TraceCategory::LowPower), None);
    }

    #[test]
    fn raw_status_also_matches() {
        let platform = TestPlatform::new();
        let mut sequencer = ConservationSequencer::new();
        let mut trace = TraceRecorder::new();
        let mut constraint = Bus26m::new(ConditionTable::EMPTY);
        constraint
            .update(&UpdateRequest::RemainIrqs(irqs()), ConditionShape::default())
            .unwrap();
        let mut ctx = HookContext {
            platform: &platform,
            sequencer: &mut sequencer,
            trace: &mut trace,
            votes: ResourceMask::empty(),
        };
        let mut session =
            ConservationSession::new(1, 0, SessionKind::Idle, TestPlatform::IDLE_POWER_CONTROL);

        constraint.enter(&mut ctx, &mut session);
        platform.write_32(platform.register_map().wakeup_sta, 1 << 2);
        constraint.reset(&mut ctx, &mut session);
        // A second reset finds nothing to undo and delivers nothing.
        constraint.reset(&mut ctx, &mut session);

        assert_eq!(platform.pending_interrupts(), [KEYPAD_IRQ]);
    }
}

// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! MediaTek MT8192.

use super::LpmPlatform;
use crate::{
    condition::{ClkMux, ConditionDomain, ConditionLayout, ConditionTable, PllProbe},
    conservation::{PcmFlags, PcmFlags1, PowerControl, R12_PCM_TIMER},
    constraint::{Bus26m, CONSTRAINT_MAX, Constraint, CpuBuckLdo, Dram, Syspll},
    regs::{RegisterIo, SpmRegisterMap},
};
use arm_gic::IntId;
use arrayvec::ArrayVec;

const SPM_BASE: usize = 0x1000_6000;
const INFRACFG_AO_BASE: usize = 0x1000_1000;
const MMSYS_BASE: usize = 0x1400_0000;
const TOPCKGEN_BASE: usize = 0x1000_0000;
const APMIXEDSYS_BASE: usize = 0x1000_C000;
const SSPM_MBOX_BASE: usize = 0x1044_0000;
const MCUPM_MBOX_LP: usize = 0x0C55_FDA4;

const fn clk_cfg(id: usize) -> usize {
    TOPCKGEN_BASE + 0x20 + id * 0x10
}

/// The SPM register map.
pub const REGISTER_MAP: SpmRegisterMap = SpmRegisterMap {
    pwr_status: SPM_BASE + 0x016C,
    pwr_status_2nd: SPM_BASE + 0x0170,
    pcm_con1: SPM_BASE + 0x001C,
    pcm_timer_val: SPM_BASE + 0x0034,
    pcm_wdt_val: SPM_BASE + 0x0038,
    wakeup_event_mask: SPM_BASE + 0x00D0,
    cpu_wakeup_event: SPM_BASE + 0x00B0,
    src_req: SPM_BASE + 0x0818,
    sw_flag_0: SPM_BASE + 0x0600,
    sw_flag_1: SPM_BASE + 0x0608,
    cpu_scratch: SPM_BASE + 0x0620,
    wakeup_cpu_mailbox: SPM_BASE + 0x0624,
    clk_26m_record: SPM_BASE + 0x0300,
    xo_bblpm: SPM_BASE + 0x0304,
    s1_monitor_con: SPM_BASE + 0x0310,
    s1_monitor_sta: SPM_BASE + 0x0314,
    ext_int_wakeup_req_clr: SPM_BASE + 0x0214,
    bk_wake_event: SPM_BASE + 0x08A4,
    wake_event_ext: SPM_BASE + 0x0148,
    wakeup_sta: SPM_BASE + 0x0144,
    bk_wake_misc: SPM_BASE + 0x08AC,
    bk_pcm_timer: SPM_BASE + 0x08B0,
    pcm_reg13: SPM_BASE + 0x0110,
    src_req_sta: SPM_BASE + 0x0114,
    debug_flag: SPM_BASE + 0x0604,
    debug_flag1: SPM_BASE + 0x060C,
    irq_sta: SPM_BASE + 0x0128,
    power_on_val0: SPM_BASE + 0x0004,
    lp_mailbox: SSPM_MBOX_BASE + 0x0004,
    lp_event_mailbox: SSPM_MBOX_BASE + 0x0008,
    mcupm_pdn_mailbox: MCUPM_MBOX_LP,
};

const INFRA_RAIL: u32 = 0x0000_0200;
const MMSYS_RAIL: u32 = 0x0010_0000;
const CLKMUX_DISP: ClkMux = ClkMux {
    cfg_reg: clk_cfg(0),
    index: 0,
};

const fn infra(name: &'static str, offset: usize) -> ConditionDomain {
    ConditionDomain {
        name,
        power_mask: INFRA_RAIL,
        gate_reg: INFRACFG_AO_BASE + offset,
        active_low: true,
        clk_mux: None,
    }
}

const fn mmsys(name: &'static str, offset: usize) -> ConditionDomain {
    ConditionDomain {
        name,
        power_mask: MMSYS_RAIL,
        gate_reg: MMSYS_BASE + offset,
        active_low: true,
        clk_mux: Some(CLKMUX_DISP),
    }
}

static DOMAINS: [ConditionDomain; 10] = [
    ConditionDomain {
        name: "mtcmos",
        power_mask: 0xffff_ffff,
        gate_reg: REGISTER_MAP.pwr_status,
        active_low: false,
        clk_mux: None,
    },
    infra("infra_cg0", 0x0094),
    infra("infra_cg1", 0x0090),
    infra("infra_cg2", 0x00AC),
    infra("infra_cg3", 0x00C8),
    infra("infra_cg4", 0x00D8),
    infra("infra_cg5", 0x00E8),
    mmsys("mmsys_cg0", 0x0100),
    mmsys("mmsys_cg1", 0x0110),
    mmsys("mmsys_cg2", 0x01A0),
];

/// Bit of the condition PLL word for UNIVPLL.
pub const PLL_UNIVPLL: u32 = 1 << 0;

static PLLS: [PllProbe; 5] = [
    PllProbe {
        name: "univpll",
        reg: APMIXEDSYS_BASE + 0x0308,
    },
    PllProbe {
        name: "mfgpll",
        reg: APMIXEDSYS_BASE + 0x0268,
    },
    PllProbe {
        name: "msdcpll",
        reg: APMIXEDSYS_BASE + 0x0350,
    },
    PllProbe {
        name: "tvdpll",
        reg: APMIXEDSYS_BASE + 0x0380,
    },
    PllProbe {
        name: "mmpll",
        reg: APMIXEDSYS_BASE + 0x0360,
    },
];

/// The domains and PLLs which are checked before every selection.
pub const CONDITION_LAYOUT: ConditionLayout = ConditionLayout {
    domains: &DOMAINS,
    plls: &PLLS,
};

/// Forbidden mask of the 26 MHz bus constraint.
pub const BUS26M_FORBIDDEN: ConditionTable = ConditionTable::new(
    &[
        0x07CB_F1FC,
        0x0A0D_8856,
        0x03AF_9A00,
        0x8600_0650,
        0xC800_C000,
        0x0000_0000,
        0x4000_007C,
        0x280E_0800,
        0x0000_0001,
        0x0000_0000,
    ],
    0x1f,
);

/// Forbidden mask of the system PLL constraint.
pub const SYSPLL_FORBIDDEN: ConditionTable = ConditionTable::new(
    &[
        0x078B_F1FC,
        0x080D_8856,
        0x03AF_9A00,
        0x8600_0640,
        0xC800_C000,
        0x0000_0000,
        0x0000_007C,
        0x280E_0800,
        0x0000_0001,
        0x0000_0000,
    ],
    0,
);

/// Forbidden mask of the DRAM constraint.
pub const DRAM_FORBIDDEN: ConditionTable = ConditionTable::new(
    &[
        0x078B_F1FC,
        0x080D_8856,
        0x03AF_9A00,
        0x8600_0640,
        0xC800_C000,
        0x0000_0000,
        0x0000_0000,
        0x200C_0000,
        0x0000_0000,
        0x0000_0000,
    ],
    0,
);

const R12_KP_IRQ_B: u32 = 1 << 2;
const R12_APWDT_EVENT_B: u32 = 1 << 3;
const R12_APXGPT1_EVENT_B: u32 = 1 << 4;
const R12_CONN2AP_SPM_WAKEUP_B: u32 = 1 << 5;
const R12_EINT_EVENT_B: u32 = 1 << 6;
const R12_CONN_WDT_IRQ_B: u32 = 1 << 7;
const R12_CCIF0_EVENT_B: u32 = 1 << 8;
const R12_SSPM2SPM_WAKEUP_B: u32 = 1 << 10;
const R12_SCP2SPM_WAKEUP_B: u32 = 1 << 11;
const R12_ADSP2SPM_WAKEUP_B: u32 = 1 << 12;
const R12_USB_CDSC_B: u32 = 1 << 14;
const R12_USB_POWERDWN_B: u32 = 1 << 15;
const R12_SYS_TIMER_EVENT_B: u32 = 1 << 16;
const R12_EINT_EVENT_SECURE_B: u32 = 1 << 17;
const R12_CCIF1_EVENT_B: u32 = 1 << 18;
const R12_AFE_IRQ_MCU_B: u32 = 1 << 20;
const R12_SYS_CIRQ_IRQ_B: u32 = 1 << 22;
const R12_MD2AP_PEER_EVENT_B: u32 = 1 << 23;
const R12_MD1_WDT_B: u32 = 1 << 25;
const R12_AP2AP_PEER_WAKEUPEVENT_B: u32 = 1 << 26;
const R12_SEJ_EVENT_B: u32 = 1 << 27;
const R12_SPM_CPU_WAKEUPEVENT_B: u32 = 1 << 28;
const R12_APUSYS: u32 = 1 << 29;

const WAKE_SRC_FOR_SUSPEND: u32 = R12_PCM_TIMER
    | R12_KP_IRQ_B
    | R12_APWDT_EVENT_B
    | R12_CONN2AP_SPM_WAKEUP_B
    | R12_EINT_EVENT_B
    | R12_CONN_WDT_IRQ_B
    | R12_CCIF0_EVENT_B
    | R12_SSPM2SPM_WAKEUP_B
    | R12_SCP2SPM_WAKEUP_B
    | R12_ADSP2SPM_WAKEUP_B
    | R12_USB_CDSC_B
    | R12_USB_POWERDWN_B
    | R12_SYS_TIMER_EVENT_B
    | R12_EINT_EVENT_SECURE_B
    | R12_CCIF1_EVENT_B
    | R12_SYS_CIRQ_IRQ_B
    | R12_MD2AP_PEER_EVENT_B
    | R12_MD1_WDT_B
    | R12_AP2AP_PEER_WAKEUPEVENT_B
    | R12_SEJ_EVENT_B;

const WAKE_SRC_FOR_IDLE: u32 = WAKE_SRC_FOR_SUSPEND
    | R12_APXGPT1_EVENT_B
    | R12_AFE_IRQ_MCU_B
    | R12_SPM_CPU_WAKEUPEVENT_B
    | R12_APUSYS;

/// MT8192 with its registers reached through `R`.
#[derive(Debug)]
pub struct Mt8192<R: RegisterIo + Sync> {
    regs: R,
    set_pending: fn(IntId),
}

impl<R: RegisterIo + Sync> Mt8192<R> {
    /// Creates the platform. `set_pending` marks an interrupt pending in the interrupt
    /// controller.
    pub const fn new(regs: R, set_pending: fn(IntId)) -> Self {
        Self { regs, set_pending }
    }
}

impl<R: RegisterIo + Sync> RegisterIo for Mt8192<R> {
    fn read_32(&self, addr: usize) -> u32 {
        self.regs.read_32(addr)
    }

    fn write_32(&self, addr: usize, value: u32) {
        self.regs.write_32(addr, value)
    }
}

impl<R: RegisterIo + Sync> LpmPlatform for Mt8192<R> {
    const CORE_COUNT: usize = 8;

    const IDLE_POWER_CONTROL: PowerControl = PowerControl {
        pcm_flags: PcmFlags::empty(),
        pcm_flags1: PcmFlags1::empty(),
        wake_src: WAKE_SRC_FOR_IDLE,
        timer_ticks: 0,
    };

    const SUSPEND_POWER_CONTROL: PowerControl = PowerControl {
        pcm_flags: PcmFlags::empty(),
        pcm_flags1: PcmFlags1::empty(),
        wake_src: WAKE_SRC_FOR_SUSPEND,
        timer_ticks: 0,
    };

    fn register_map(&self) -> &SpmRegisterMap {
        &REGISTER_MAP
    }

    fn condition_layout(&self) -> &ConditionLayout {
        &CONDITION_LAYOUT
    }

    fn constraints(&self) -> ArrayVec<Constraint, CONSTRAINT_MAX> {
        [
            Constraint::Bus26m(Bus26m::new(BUS26M_FORBIDDEN)),
            Constraint::Syspll(Syspll::new(SYSPLL_FORBIDDEN)),
            Constraint::Dram(Dram::new(DRAM_FORBIDDEN)),
            Constraint::CpuBuckLdo(CpuBuckLdo::new()),
        ]
        .into_iter()
        .collect()
    }

    fn set_interrupt_pending(&self, int_id: IntId) {
        (self.set_pending)(int_id);
    }
}

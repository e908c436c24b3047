// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Programming the SPM around one low-power entry, and decoding why it woke up.

use crate::{
    platform::CORE_MAX,
    regs::{RegisterIo, SPM_REGWR_CFG_KEY, SpmRegisterMap},
    resource::ResourceMask,
    trace::{TraceCategory, TraceRecord, TraceRecorder},
};
use bitflags::bitflags;
use log::{debug, info, warn};

/// Extra watchdog time on top of the PCM timer, in 32 kHz ticks.
const PCM_WDT_MARGIN: u32 = 5 * 32_768;
/// Largest PCM timer value which still leaves room for the watchdog margin.
const PCM_TIMER_MAX: u32 = u32::MAX - PCM_WDT_MARGIN;

/// `r12` bit set when the PCM timer expired.
pub const R12_PCM_TIMER: u32 = 1 << 0;
/// `r12` bit set when the wake came through the TWAM/miscellaneous path; see `wake_misc`.
pub const R12_TWAM_IRQ_B: u32 = 1 << 1;

/// `wake_misc` bit for a DVFSRC interrupt.
pub const WAKE_MISC_DVFSRC_IRQ: u32 = 1 << 16;
/// `wake_misc` bit for a TWAM interrupt.
pub const WAKE_MISC_TWAM_IRQ_B: u32 = 1 << 17;
/// `wake_misc` bits for the power-meter interrupts.
pub const WAKE_MISC_PMSR_IRQ_B: u32 = 0b111 << 18;
/// `wake_misc` bits for the SPM acknowledge checker.
pub const WAKE_MISC_SPM_ACK_CHK: u32 = 0b1_1111 << 21;

/// `debug_flag` bits reporting that the SPM firmware aborted the sequence.
pub const DEBUG_ABORT_MASK: u32 = (1 << 30) | (1 << 31);
/// `debug_flag` bits folded in when the S1 edge monitor saw DRAM enter and leave S1.
pub const DEBUG_DDREN_S1: u32 = (1 << 20) | (1 << 21);

bitflags! {
    /// Optional behaviours of one conservation session.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct ExtOp: u32 {
        /// Clear the 26 MHz off-duration record before entry.
        const CLR_26M_RECORD = 1 << 0;
        /// Arm the PCM resume watchdog for the duration of the sleep.
        const SET_WDT = 1 << 1;
        /// Program only the constraint's own resource request, ignoring outstanding votes.
        const NON_GENERIC_RESOURCE_REQ = 1 << 2;
        /// Use the audio-retaining suspend flag bundle for this session.
        const SET_SUSPEND_MODE = 1 << 3;
        /// The audio DSP is active.
        const SET_IS_ADSP = 1 << 4;
        /// Request crystal buffer low-power mode through the SRCLKEN pin.
        const SRCLKEN_RC_BBLPM = 1 << 5;
        /// Monitor DRAM S1 transitions while asleep.
        const HW_S1_DETECT = 1 << 6;
        /// Record the wake in the low-power trace ring.
        const TRACE_LP = 1 << 7;
        /// Record the wake in the suspend trace ring.
        const TRACE_SUSPEND = 1 << 8;
    }
}

bitflags! {
    /// The first PCM flag word, telling the SPM firmware what it must leave on.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct PcmFlags: u32 {
        /// Keep the CSYSPWRACK handshake high.
        const KEEP_CSYSPWRACK_HIGH = 1 << 0;
        /// Do not scale the VCORE voltage.
        const DISABLE_VCORE_DVS = 1 << 3;
        /// Do not scale the VCORE frequency.
        const DISABLE_VCORE_DFS = 1 << 4;
        /// Keep the infrastructure powered.
        const DISABLE_INFRA_PDN = 1 << 6;
        /// Keep the DRAM controller MCU SRAM awake.
        const DISABLE_DRAMC_MCU_SRAM_SLEEP = 1 << 8;
        /// Keep the SSPM SRAM awake.
        const DISABLE_SSPM_SRAM_SLEEP = 1 << 9;
        /// Keep the system SRAM awake.
        const DISABLE_SYSRAM_SLEEP = 1 << 10;
        /// Keep the MCUPM SRAM awake.
        const DISABLE_MCUPM_SRAM_SLEEP = 1 << 11;
        /// Do not generate SRAM sleep events.
        const DISABLE_SRAM_EVENT = 1 << 12;
        /// Apply the TIA workaround.
        const ENABLE_TIA_WORKAROUND = 1 << 13;
        /// Apply the LVTS workaround.
        const ENABLE_LVTS_WORKAROUND = 1 << 14;
        /// Let the SPM control the 6315 PMIC.
        const ENABLE_6315_CTRL = 1 << 15;
        /// Use SRCCLKENO2 as the clock request output.
        const USE_SRCCLKENO2 = 1 << 16;

        /// Every SRAM-sleep inhibit at once.
        const SRAM_SLEEP_CTRL = Self::DISABLE_SSPM_SRAM_SLEEP.bits()
            | Self::DISABLE_DRAMC_MCU_SRAM_SLEEP.bits()
            | Self::DISABLE_SYSRAM_SLEEP.bits()
            | Self::DISABLE_MCUPM_SRAM_SLEEP.bits()
            | Self::DISABLE_SRAM_EVENT.bits();
    }
}

bitflags! {
    /// The second PCM flag word.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct PcmFlags1: u32 {
        /// Keep the modem 26 MHz clock running.
        const DISABLE_MD26M_CK_OFF = 1 << 8;
    }
}

/// What the SPM is told to do for one entry.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct PowerControl {
    /// First PCM flag word.
    pub pcm_flags: PcmFlags,
    /// Second PCM flag word.
    pub pcm_flags1: PcmFlags1,
    /// Wake sources which are left unmasked.
    pub wake_src: u32,
    /// PCM timer reload in 32 kHz ticks, or 0 for no timer.
    pub timer_ticks: u32,
}

/// Whether a session is a per-core idle entry or a system-wide suspend.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SessionKind {
    /// CPU idle, entered from the idle loop.
    Idle,
    /// System suspend, the deepest system-wide state.
    Suspend,
}

/// The decoded cause of a wake-up, in descending order of precedence.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum WakeReason {
    /// No conservation session ran.
    None = 0,
    /// The SPM firmware aborted the sequence.
    Abort = 1,
    /// A peripheral wake source fired.
    Peripheral = 2,
    /// The SPM acknowledge checker fired.
    AckCheck = 3,
    /// A power-meter interrupt fired.
    Pmsr = 4,
    /// A TWAM interrupt fired.
    Twam = 5,
    /// A DVFSRC interrupt fired.
    Dvfsrc = 6,
    /// The PCM timer expired.
    Timer = 7,
    /// Nothing recognisable was set.
    Unknown = 8,
}

impl WakeReason {
    /// Decodes the wake reason from the captured wake registers.
    ///
    /// Precedence is fixed: abort, then any peripheral bit of `r12`, then the miscellaneous
    /// sources behind `R12_TWAM_IRQ_B` (acknowledge checker, power meter, TWAM, DVFSRC), then the
    /// PCM timer, then unknown.
    pub fn decode(record: &TraceRecord) -> Self {
        let r12 = record.r12;
        let misc = record.wake_misc;

        if record.debug_flag & DEBUG_ABORT_MASK != 0 {
            Self::Abort
        } else if r12 & !(R12_PCM_TIMER | R12_TWAM_IRQ_B) != 0 {
            Self::Peripheral
        } else if r12 & R12_TWAM_IRQ_B != 0 && misc & WAKE_MISC_SPM_ACK_CHK != 0 {
            Self::AckCheck
        } else if r12 & R12_TWAM_IRQ_B != 0 && misc & WAKE_MISC_PMSR_IRQ_B != 0 {
            Self::Pmsr
        } else if r12 & R12_TWAM_IRQ_B != 0 && misc & WAKE_MISC_TWAM_IRQ_B != 0 {
            Self::Twam
        } else if r12 & R12_TWAM_IRQ_B != 0 && misc & WAKE_MISC_DVFSRC_IRQ != 0 {
            Self::Dvfsrc
        } else if r12 & R12_PCM_TIMER != 0 {
            Self::Timer
        } else {
            Self::Unknown
        }
    }
}

/// The outcome of one conservation session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct WakeStatus {
    /// Raw register snapshot, also used as the trace payload.
    pub record: TraceRecord,
    /// SPM interrupt status at wake.
    pub isr: u32,
    /// Resource request programmed at entry.
    pub src_req: u32,
    /// Decoded wake reason.
    pub reason: WakeReason,
}

/// One enter/sleep/leave cycle.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConservationSession {
    /// The core which is entering.
    pub core: usize,
    /// Index of the selected constraint in the registry.
    pub constraint: usize,
    /// Idle or suspend.
    pub kind: SessionKind,
    /// Optional behaviours.
    pub ext_op: ExtOp,
    /// Resources the selected constraint keeps on.
    pub resource_req: ResourceMask,
    /// Flags and wake sources to program.
    pub power_control: PowerControl,
    /// Set by [`ConservationSequencer::leave`].
    pub wake: Option<WakeStatus>,
}

impl ConservationSession {
    /// Creates a session with no extended operations and no resource request.
    pub fn new(
        core: usize,
        constraint: usize,
        kind: SessionKind,
        power_control: PowerControl,
    ) -> Self {
        Self {
            core,
            constraint,
            kind,
            ext_op: ExtOp::empty(),
            resource_req: ResourceMask::empty(),
            power_control,
            wake: None,
        }
    }
}

/// Where one core is in the conservation sequence.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum SequencerPhase {
    /// Not in a session.
    #[default]
    Idle,
    /// Programming the hardware for entry.
    Preparing,
    /// Armed; the caller is expected to wait for an interrupt.
    Asleep,
    /// Undoing the entry programming and capturing wake status.
    Resuming,
}

/// Arms the SPM before a low-power entry and captures the wake status afterwards.
#[derive(Debug)]
pub struct ConservationSequencer {
    phases: [SequencerPhase; CORE_MAX],
    last_wake: Option<WakeStatus>,
}

impl ConservationSequencer {
    /// Creates a sequencer with every core idle.
    pub const fn new() -> Self {
        Self {
            phases: [SequencerPhase::Idle; CORE_MAX],
            last_wake: None,
        }
    }

    /// Returns the phase of the given core. A core beyond [`CORE_MAX`] is always idle.
    pub fn phase(&self, core: usize) -> SequencerPhase {
        self.phases.get(core).copied().unwrap_or(SequencerPhase::Idle)
    }

    /// Returns the status captured by the most recent `leave` on any core.
    pub fn last_wake(&self) -> Option<&WakeStatus> {
        self.last_wake.as_ref()
    }

    /// Arms the hardware for the given session.
    ///
    /// `votes` is the aggregate of the resource vote table, merged into the resource request
    /// unless the session asks for [`ExtOp::NON_GENERIC_RESOURCE_REQ`]. This does not wait for
    /// an interrupt; the caller does that once this returns.
    pub fn enter<R: RegisterIo + ?Sized>(
        &mut self,
        regs: &R,
        map: &SpmRegisterMap,
        session: &ConservationSession,
        votes: ResourceMask,
    ) {
        let core = session.core;
        let Some(&phase) = self.phases.get(core) else {
            warn!("cpu{core}: no such core, not arming");
            return;
        };
        if phase != SequencerPhase::Idle {
            warn!("cpu{core}: entering from phase {phase:?}, re-arming");
        }
        self.phases[core] = SequencerPhase::Preparing;

        let pwrctrl = &session.power_control;
        let ext_op = session.ext_op;

        regs.write_32(map.cpu_scratch, 1 << core);
        regs.write_32(map.wakeup_cpu_mailbox, core as u32);

        regs.write_32(map.wakeup_event_mask, !pwrctrl.wake_src);
        if pwrctrl.timer_ticks != 0 {
            regs.write_32(map.pcm_timer_val, pwrctrl.timer_ticks);
            set_pcm_con1(regs, map, SpmRegisterMap::PCM_TIMER_EN, true);
        }

        regs.write_32(map.sw_flag_0, pwrctrl.pcm_flags.bits());
        regs.write_32(map.sw_flag_1, pwrctrl.pcm_flags1.bits());

        let mut src_req = session.resource_req;
        if !ext_op.contains(ExtOp::NON_GENERIC_RESOURCE_REQ) {
            src_req |= votes;
        }
        regs.write_32(map.src_req, src_req.bits());

        if ext_op.contains(ExtOp::CLR_26M_RECORD) {
            regs.write_32(map.clk_26m_record, SpmRegisterMap::CLK_26M_RECORD_CLR);
        }
        if ext_op.contains(ExtOp::SET_WDT) {
            set_pcm_wdt(regs, map, true);
        }
        if ext_op.contains(ExtOp::SRCLKEN_RC_BBLPM) {
            regs.write_32(map.xo_bblpm, 1);
        }
        if ext_op.contains(ExtOp::HW_S1_DETECT) {
            regs.set_bits_32(map.s1_monitor_con, SpmRegisterMap::S1_MONITOR_EN);
        }

        regs.write_32(map.cpu_wakeup_event, 1);
        regs.write_32(map.cpu_wakeup_event, 0);

        if session.kind == SessionKind::Suspend {
            set_pcm_con1(regs, map, SpmRegisterMap::PCM_TIMER_EN, false);
        }

        info!(
            "cpu{core}: wakesrc = {:#x}, sec = {}, ext_op = {:?}",
            pwrctrl.wake_src,
            regs.read_32(map.pcm_timer_val) / 32_768,
            ext_op
        );
        info!(
            "sw_flag = {:#x} {:#x}, req = {:#x}, pwr = {:#x} {:#x}",
            pwrctrl.pcm_flags.bits(),
            pwrctrl.pcm_flags1.bits(),
            regs.read_32(map.src_req),
            regs.read_32(map.pwr_status),
            regs.read_32(map.pwr_status_2nd)
        );

        self.phases[core] = SequencerPhase::Asleep;
    }

    /// Undoes the entry programming of the given session and captures the wake status.
    ///
    /// Returns `None`, without touching the hardware, if the session's core is not asleep. This
    /// makes it safe to call more than once for the same session.
    pub fn leave<R: RegisterIo + ?Sized>(
        &mut self,
        regs: &R,
        map: &SpmRegisterMap,
        session: &mut ConservationSession,
        trace: &mut TraceRecorder,
    ) -> Option<WakeStatus> {
        let core = session.core;
        let phase = self.phase(core);
        if phase != SequencerPhase::Asleep {
            debug!("cpu{core}: nothing to undo in phase {phase:?}");
            return None;
        }
        self.phases[core] = SequencerPhase::Resuming;
        let ext_op = session.ext_op;

        if ext_op.contains(ExtOp::SET_WDT) {
            set_pcm_wdt(regs, map, false);
        }
        if ext_op.contains(ExtOp::SRCLKEN_RC_BBLPM) {
            regs.write_32(map.xo_bblpm, 0);
        }
        let mut s1_hit = false;
        if ext_op.contains(ExtOp::HW_S1_DETECT) {
            regs.clr_bits_32(map.s1_monitor_con, SpmRegisterMap::S1_MONITOR_EN);
            s1_hit = regs.read_32(map.s1_monitor_sta) & SpmRegisterMap::S1_MONITOR_HIT != 0;
        }
        regs.write_32(map.ext_int_wakeup_req_clr, 1);

        let mut record = TraceRecord {
            constraint: session.constraint as u32,
            core: core as u32,
            r12: regs.read_32(map.bk_wake_event),
            r12_ext: regs.read_32(map.wake_event_ext),
            raw_sta: regs.read_32(map.wakeup_sta),
            wake_misc: regs.read_32(map.bk_wake_misc),
            timer_out: regs.read_32(map.bk_pcm_timer),
            r13: regs.read_32(map.pcm_reg13),
            req_sta: regs.read_32(map.src_req_sta),
            debug_flag: regs.read_32(map.debug_flag),
            debug_flag1: regs.read_32(map.debug_flag1),
            sw_flag0: regs.read_32(map.sw_flag_0),
            sw_flag1: regs.read_32(map.sw_flag_1),
            wake_reason: 0,
        };
        if s1_hit {
            record.debug_flag |= DEBUG_DDREN_S1;
            regs.write_32(map.debug_flag, record.debug_flag);
        }
        let reason = WakeReason::decode(&record);
        record.wake_reason = reason as u32;

        if ext_op.contains(ExtOp::TRACE_LP) {
            trace.write(TraceCategory::LowPower, &record);
        } else if ext_op.contains(ExtOp::TRACE_SUSPEND) {
            trace.write(TraceCategory::Suspend, &record);
        }

        let status = WakeStatus {
            record,
            isr: regs.read_32(map.irq_sta),
            src_req: regs.read_32(map.src_req),
            reason,
        };
        info!(
            "cpu{core}: woken by {reason:?}, r12 = {:#x}, timer_out = {}, debug_flag = {:#x}",
            record.r12, record.timer_out, record.debug_flag
        );

        session.wake = Some(status);
        self.last_wake = Some(status);
        self.phases[core] = SequencerPhase::Idle;
        Some(status)
    }
}

impl Default for ConservationSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Sets or clears bits of `PCM_CON1`, which only accepts writes carrying the config key.
fn set_pcm_con1<R: RegisterIo + ?Sized>(regs: &R, map: &SpmRegisterMap, bits: u32, set: bool) {
    let con1 = regs.read_32(map.pcm_con1) & 0xffff;
    let con1 = if set { con1 | bits } else { con1 & !bits };
    regs.write_32(map.pcm_con1, SPM_REGWR_CFG_KEY | con1);
}

/// Arms or disarms the PCM resume watchdog.
///
/// The watchdog runs in normal mode: on expiry it resets the system rather than waking it. When
/// armed it fires [`PCM_WDT_MARGIN`] ticks after the PCM timer, which is clamped to
/// [`PCM_TIMER_MAX`] first.
pub(crate) fn set_pcm_wdt<R: RegisterIo + ?Sized>(regs: &R, map: &SpmRegisterMap, enable: bool) {
    if enable {
        set_pcm_con1(regs, map, SpmRegisterMap::PCM_WDT_WAKE, false);
        let mut timer = regs.read_32(map.pcm_timer_val);
        if timer > PCM_TIMER_MAX {
            timer = PCM_TIMER_MAX;
            regs.write_32(map.pcm_timer_val, timer);
        }
        regs.write_32(map.pcm_wdt_val, timer + PCM_WDT_MARGIN);
        set_pcm_con1(regs, map, SpmRegisterMap::PCM_WDT_EN, true);
    } else {
        set_pcm_con1(regs, map, SpmRegisterMap::PCM_WDT_EN, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::test::{FakeRegisters, TEST_REGISTER_MAP as MAP};

    const PWRCTRL: PowerControl = PowerControl {
        pcm_flags: PcmFlags::DISABLE_INFRA_PDN,
        pcm_flags1: PcmFlags1::empty(),
        wake_src: 0x00ff_00ff,
        timer_ticks: 32_768,
    };

    fn session(kind: SessionKind, ext_op: ExtOp) -> ConservationSession {
        let mut session = ConservationSession::new(2, 1, kind, PWRCTRL);
        session.ext_op = ext_op;
        session.resource_req = ResourceMask::BUS26M;
        session
    }

    fn record(r12: u32, wake_misc: u32, debug_flag: u32) -> TraceRecord {
        TraceRecord {
            r12,
            wake_misc,
            debug_flag,
            ..Default::default()
        }
    }

    #[test]
    fn peripheral_outranks_timer() {
        let both = record(R12_PCM_TIMER | (1 << 6), 0, 0);
        assert_eq!(WakeReason::decode(&both), WakeReason::Peripheral);
    }

    #[test]
    fn timer_outranks_unknown() {
        assert_eq!(
            WakeReason::decode(&record(R12_PCM_TIMER, 0, 0)),
            WakeReason::Timer
        );
        assert_eq!(WakeReason::decode(&record(0, 0, 0)), WakeReason::Unknown);
    }

    #[test]
    fn misc_sources() {
        let twam = |misc| WakeReason::decode(&record(R12_TWAM_IRQ_B | R12_PCM_TIMER, misc, 0));
        assert_eq!(twam(WAKE_MISC_DVFSRC_IRQ), WakeReason::Dvfsrc);
        assert_eq!(
            twam(WAKE_MISC_DVFSRC_IRQ | WAKE_MISC_TWAM_IRQ_B),
            WakeReason::Twam
        );
        assert_eq!(twam(WAKE_MISC_TWAM_IRQ_B | (1 << 19)), WakeReason::Pmsr);
        assert_eq!(twam(1 << 23 | (1 << 19)), WakeReason::AckCheck);
        // Without any misc bit the timer still explains the wake.
        assert_eq!(twam(0), WakeReason::Timer);
        // Misc bits are only meaningful with the TWAM bit.
        assert_eq!(
            WakeReason::decode(&record(0, WAKE_MISC_DVFSRC_IRQ, 0)),
            WakeReason::Unknown
        );
    }

    #[test]
    fn abort_outranks_everything() {
        let aborted = record(R12_PCM_TIMER | (1 << 6), 0, 1 << 31);
        assert_eq!(WakeReason::decode(&aborted), WakeReason::Abort);
    }

    #[test]
    fn enter_programs_hardware() {
        let regs = FakeRegisters::new();
        let mut sequencer = ConservationSequencer::new();
        let session = session(
            SessionKind::Idle,
            ExtOp::CLR_26M_RECORD | ExtOp::SRCLKEN_RC_BBLPM | ExtOp::HW_S1_DETECT,
        );

        sequencer.enter(&regs, &MAP, &session, ResourceMask::DRAM_S0);

        assert_eq!(sequencer.phase(2), SequencerPhase::Asleep);
        assert_eq!(sequencer.phase(0), SequencerPhase::Idle);
        assert_eq!(regs.read_32(MAP.cpu_scratch), 1 << 2);
        assert_eq!(regs.read_32(MAP.wakeup_cpu_mailbox), 2);
        assert_eq!(regs.read_32(MAP.wakeup_event_mask), 0xff00_ff00);
        assert_eq!(regs.read_32(MAP.pcm_timer_val), 32_768);
        assert_eq!(
            regs.read_32(MAP.sw_flag_0),
            PcmFlags::DISABLE_INFRA_PDN.bits()
        );
        assert_eq!(
            regs.read_32(MAP.src_req),
            (ResourceMask::BUS26M | ResourceMask::DRAM_S0).bits()
        );
        assert_eq!(
            regs.read_32(MAP.clk_26m_record),
            SpmRegisterMap::CLK_26M_RECORD_CLR
        );
        assert_eq!(regs.read_32(MAP.xo_bblpm), 1);
        assert_eq!(
            regs.read_32(MAP.s1_monitor_con),
            SpmRegisterMap::S1_MONITOR_EN
        );
        assert_eq!(regs.read_32(MAP.cpu_wakeup_event), 0);
        assert_eq!(regs.writes_to(MAP.cpu_wakeup_event), [1, 0]);
        // The PCM timer stays enabled on the idle path, and no watchdog was asked for.
        let con1 = regs.read_32(MAP.pcm_con1);
        assert_ne!(con1 & SpmRegisterMap::PCM_TIMER_EN, 0);
        assert_eq!(con1 & SpmRegisterMap::PCM_WDT_EN, 0);
    }

    #[test]
    fn non_generic_request_ignores_votes() {
        let regs = FakeRegisters::new();
        let mut sequencer = ConservationSequencer::new();
        let session = session(SessionKind::Idle, ExtOp::NON_GENERIC_RESOURCE_REQ);

        sequencer.enter(&regs, &MAP, &session, ResourceMask::DRAM_S0);
        assert_eq!(regs.read_32(MAP.src_req), ResourceMask::BUS26M.bits());
    }

    #[test]
    fn suspend_disables_pcm_timer() {
        let regs = FakeRegisters::new();
        let mut sequencer = ConservationSequencer::new();

        sequencer.enter(
            &regs,
            &MAP,
            &session(SessionKind::Suspend, ExtOp::SET_WDT),
            ResourceMask::empty(),
        );

        let con1 = regs.read_32(MAP.pcm_con1);
        assert_eq!(con1 & SpmRegisterMap::PCM_TIMER_EN, 0);
        assert_ne!(con1 & SpmRegisterMap::PCM_WDT_EN, 0);
        assert_eq!(con1 & 0xffff_0000, SPM_REGWR_CFG_KEY);
        assert_eq!(regs.read_32(MAP.pcm_wdt_val), 32_768 + PCM_WDT_MARGIN);
    }

    #[test]
    fn leave_undoes_and_decodes() {
        let regs = FakeRegisters::new();
        let mut sequencer = ConservationSequencer::new();
        let mut trace = TraceRecorder::new();
        let mut session = session(
            SessionKind::Suspend,
            ExtOp::SET_WDT | ExtOp::SRCLKEN_RC_BBLPM | ExtOp::HW_S1_DETECT | ExtOp::TRACE_SUSPEND,
        );

        sequencer.enter(&regs, &MAP, &session, ResourceMask::empty());
        regs.write_32(MAP.bk_wake_event, R12_PCM_TIMER | (1 << 6));
        regs.write_32(MAP.bk_pcm_timer, 1234);
        regs.write_32(MAP.s1_monitor_sta, SpmRegisterMap::S1_MONITOR_HIT);

        let status = sequencer.leave(&regs, &MAP, &mut session, &mut trace).unwrap();

        assert_eq!(status.reason, WakeReason::Peripheral);
        assert_eq!(status.record.timer_out, 1234);
        assert_eq!(status.record.core, 2);
        assert_eq!(status.record.constraint, 1);
        assert_eq!(status.record.debug_flag, DEBUG_DDREN_S1);
        assert_eq!(regs.read_32(MAP.debug_flag), DEBUG_DDREN_S1);
        assert_eq!(session.wake, Some(status));
        assert_eq!(sequencer.last_wake(), Some(&status));
        assert_eq!(sequencer.phase(2), SequencerPhase::Idle);

        assert_eq!(regs.read_32(MAP.pcm_con1) & SpmRegisterMap::PCM_WDT_EN, 0);
        assert_eq!(regs.read_32(MAP.xo_bblpm), 0);
        assert_eq!(regs.read_32(MAP.s1_monitor_con), 0);
        assert_eq!(regs.read_32(MAP.ext_int_wakeup_req_clr), 1);

        assert_eq!(trace.latest(TraceCategory::LowPower), None);
        assert_eq!(trace.latest(TraceCategory::Suspend), Some(&status.record));
        assert_eq!(status.record.wake_reason, WakeReason::Peripheral as u32);
    }

    #[test]
    fn leave_twice_is_harmless() {
        let regs = FakeRegisters::new();
        let mut sequencer = ConservationSequencer::new();
        let mut trace = TraceRecorder::new();
        let mut session = session(SessionKind::Idle, ExtOp::TRACE_LP);

        sequencer.enter(&regs, &MAP, &session, ResourceMask::empty());
        assert!(
            sequencer
                .leave(&regs, &MAP, &mut session, &mut trace)
                .is_some()
        );
        let writes = regs.write_count();
        assert_eq!(sequencer.leave(&regs, &MAP, &mut session, &mut trace), None);
        assert_eq!(regs.write_count(), writes);
        assert_eq!(trace.area().low_power.written(), 1);
    }

    #[test]
    fn watchdog_resets_instead_of_waking() {
        let regs = FakeRegisters::new();
        regs.write_32(MAP.pcm_con1, SpmRegisterMap::PCM_WDT_WAKE);
        regs.write_32(MAP.pcm_timer_val, u32::MAX);

        set_pcm_wdt(&regs, &MAP, true);

        let con1 = regs.read_32(MAP.pcm_con1);
        assert_eq!(con1 & SpmRegisterMap::PCM_WDT_WAKE, 0);
        assert_ne!(con1 & SpmRegisterMap::PCM_WDT_EN, 0);
        assert_eq!(regs.read_32(MAP.pcm_timer_val), PCM_TIMER_MAX);
        assert_eq!(regs.read_32(MAP.pcm_wdt_val), u32::MAX);

        set_pcm_wdt(&regs, &MAP, false);
        assert_eq!(regs.read_32(MAP.pcm_con1) & SpmRegisterMap::PCM_WDT_EN, 0);
    }

    #[test]
    fn low_power_trace_takes_precedence() {
        let regs = FakeRegisters::new();
        let mut sequencer = ConservationSequencer::new();
        let mut trace = TraceRecorder::new();
        let mut session = session(SessionKind::Idle, ExtOp::TRACE_LP | ExtOp::TRACE_SUSPEND);

        sequencer.enter(&regs, &MAP, &session, ResourceMask::empty());
        sequencer.leave(&regs, &MAP, &mut session, &mut trace);
        assert_eq!(trace.area().low_power.written(), 1);
        assert_eq!(trace.area().suspend.written(), 0);
    }

    #[test]
    fn out_of_range_core() {
        let regs = FakeRegisters::new();
        let mut sequencer = ConservationSequencer::new();
        let mut trace = TraceRecorder::new();
        let mut session = ConservationSession::new(CORE_MAX, 0, SessionKind::Idle, PWRCTRL);

        sequencer.enter(&regs, &MAP, &session, ResourceMask::empty());
        assert_eq!(regs.write_count(), 0);
        assert_eq!(sequencer.phase(CORE_MAX), SequencerPhase::Idle);
        assert_eq!(sequencer.leave(&regs, &MAP, &mut session, &mut trace), None);
    }

    #[test]
    fn leave_without_enter() {
        let regs = FakeRegisters::new();
        let mut sequencer = ConservationSequencer::new();
        let mut trace = TraceRecorder::new();
        let mut session = session(SessionKind::Idle, ExtOp::empty());

        assert_eq!(sequencer.leave(&regs, &MAP, &mut session, &mut trace), None);
        assert_eq!(session.wake, None);
    }
}

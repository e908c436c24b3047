// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Register access for the SPM and the blocks it observes.

use core::ptr;

/// Key which must accompany writes to the SPM's PCM control registers.
pub const SPM_REGWR_CFG_KEY: u32 = 0x0B16 << 16;

/// A bus on which 32-bit device registers can be read and written.
///
/// Register access in this crate is assumed infallible: the registers are memory-mapped and every
/// access completes in bounded time.
pub trait RegisterIo {
    /// Reads the 32-bit register at the given physical address.
    fn read_32(&self, addr: usize) -> u32;

    /// Writes the 32-bit register at the given physical address.
    fn write_32(&self, addr: usize, value: u32);

    /// Sets the given bits of a register, leaving the others untouched.
    fn set_bits_32(&self, addr: usize, bits: u32) {
        self.write_32(addr, self.read_32(addr) | bits);
    }

    /// Clears the given bits of a register, leaving the others untouched.
    fn clr_bits_32(&self, addr: usize, bits: u32) {
        self.write_32(addr, self.read_32(addr) & !bits);
    }
}

impl<T: RegisterIo + ?Sized> RegisterIo for &T {
    fn read_32(&self, addr: usize) -> u32 {
        (**self).read_32(addr)
    }

    fn write_32(&self, addr: usize, value: u32) {
        (**self).write_32(addr, value)
    }
}

/// Volatile access to physical memory, for use once the device regions are mapped.
#[derive(Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// Returns a handle for volatile register access.
    ///
    /// # Safety
    ///
    /// Every address later passed to [`RegisterIo::read_32`] or [`RegisterIo::write_32`] through
    /// this handle must be a 4-byte aligned device register which is mapped in the current
    /// translation regime, and which nothing else treats as normal memory.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterIo for Mmio {
    fn read_32(&self, addr: usize) -> u32 {
        // SAFETY: The caller of `Mmio::new` promised that every address we are given is a mapped,
        // aligned device register.
        unsafe { ptr::read_volatile(addr as *const u32) }
    }

    fn write_32(&self, addr: usize, value: u32) {
        // SAFETY: The caller of `Mmio::new` promised that every address we are given is a mapped,
        // aligned device register.
        unsafe { ptr::write_volatile(addr as *mut u32, value) }
    }
}

/// Addresses and field positions of the SPM registers touched by the conservation sequence.
///
/// Each platform supplies its own map; the sequencer only ever goes through these fields.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SpmRegisterMap {
    /// Primary power status, one bit per power rail.
    pub pwr_status: usize,
    /// Secondary power status, sampled after the rail acknowledges.
    pub pwr_status_2nd: usize,
    /// PCM control register 1: timer and watchdog enables.
    pub pcm_con1: usize,
    /// PCM timer reload value, in 32 kHz ticks.
    pub pcm_timer_val: usize,
    /// PCM resume watchdog expiry, in 32 kHz ticks.
    pub pcm_wdt_val: usize,
    /// Wake-up event mask; a set bit masks the source.
    pub wakeup_event_mask: usize,
    /// Writing 1 then 0 kicks the SPM to start the low-power sequence.
    pub cpu_wakeup_event: usize,
    /// Resource request bits presented to the SPM.
    pub src_req: usize,
    /// Software flag registers carrying the PCM flag bundle.
    pub sw_flag_0: usize,
    /// Second software flag register.
    pub sw_flag_1: usize,
    /// Scratch register holding the bitmask of the core that entered.
    pub cpu_scratch: usize,
    /// Mailbox telling the SPM firmware which core to wake.
    pub wakeup_cpu_mailbox: usize,
    /// Control of the 26 MHz duration record.
    pub clk_26m_record: usize,
    /// Crystal buffer low-power mode request.
    pub xo_bblpm: usize,
    /// Control of the S1 edge monitor.
    pub s1_monitor_con: usize,
    /// Status captured by the S1 edge monitor.
    pub s1_monitor_sta: usize,
    /// Write-one-to-clear for the latched external interrupt wake request.
    pub ext_int_wakeup_req_clr: usize,
    /// Backup of the wake event register (`r12`).
    pub bk_wake_event: usize,
    /// Extended wake event register.
    pub wake_event_ext: usize,
    /// Raw wake-up status.
    pub wakeup_sta: usize,
    /// Backup of miscellaneous wake status.
    pub bk_wake_misc: usize,
    /// Backup of the PCM timer at wake.
    pub bk_pcm_timer: usize,
    /// PCM register 13.
    pub pcm_reg13: usize,
    /// Resource request status.
    pub src_req_sta: usize,
    /// SPM firmware debug flags.
    pub debug_flag: usize,
    /// Second SPM firmware debug flag register.
    pub debug_flag1: usize,
    /// SPM interrupt status.
    pub irq_sta: usize,
    /// PHY PLL mode, written by the SPM firmware at init.
    pub power_on_val0: usize,
    /// Coprocessor mailbox carrying the low-power allow flags.
    pub lp_mailbox: usize,
    /// Second coprocessor mailbox carrying the enter/leave event word.
    pub lp_event_mailbox: usize,
    /// Mailbox through which the MCUPM is told to power down for system suspend.
    pub mcupm_pdn_mailbox: usize,
}

impl SpmRegisterMap {
    /// `PCM_CON1` bit which enables the PCM timer.
    pub const PCM_TIMER_EN: u32 = 1 << 5;
    /// `PCM_CON1` bit which lets the PCM timer fire the watchdog.
    pub const PCM_WDT_EN: u32 = 1 << 4;
    /// `PCM_CON1` bit which routes the watchdog into a wake-up.
    pub const PCM_WDT_WAKE: u32 = 1 << 9;
    /// `POWER_ON_VAL0` bit set when the software controls PHYPLL.
    pub const PHYPLL_SW: u32 = 1 << 14;
    /// `POWER_ON_VAL0` bit set when the software controls PHYPLL2.
    pub const PHYPLL2_SW: u32 = 1 << 15;
    /// `S1_MONITOR_CON` enable bit.
    pub const S1_MONITOR_EN: u32 = 1 << 0;
    /// `S1_MONITOR_STA` bit set when an S1 entry was observed.
    pub const S1_MONITOR_HIT: u32 = 1 << 0;
    /// `CLK_26M_RECORD` bit which clears the duration record.
    pub const CLK_26M_RECORD_CLR: u32 = 1 << 0;
    /// Value written to the MCUPM mailbox to request power down ("MPDN").
    pub const MCUPM_POWER_DOWN: u32 = 0x4D50_444E;
}

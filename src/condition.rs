// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Snapshots of the clock-gating and PLL state which can block a low-power constraint.

use crate::regs::{RegisterIo, SpmRegisterMap};
use log::trace;

/// The maximum number of clock-gating domains a platform may observe.
pub const COND_DOMAIN_MAX: usize = 16;

/// Bit position of the first PLL bit in a blocked report.
pub const BLOCKED_PLL_SHIFT: u32 = 16;
/// Set in a blocked report whenever any PLL blocks.
pub const BLOCKED_PLL: u32 = 1 << 30;

/// Power-down bit within a clock-mux configuration byte.
const CLK_MUX_PDN: u32 = 1 << 7;
/// Enable bit of a PLL control register.
const PLL_EN: u32 = 1 << 0;

/// Per-domain clock-gating words plus a PLL-enable word.
///
/// The same shape is used for the live snapshot taken by [`ConditionObserver::refresh`] and for
/// the forbidden mask of each constraint. A bit set in both means the constraint is blocked.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ConditionTable {
    /// One word per clock-gating domain, in platform order. Unused trailing words are 0.
    pub domains: [u32; COND_DOMAIN_MAX],
    /// One bit per PLL, in platform order.
    pub pll: u32,
}

impl ConditionTable {
    /// A table with no bits set.
    pub const EMPTY: Self = Self {
        domains: [0; COND_DOMAIN_MAX],
        pll: 0,
    };

    /// Builds a table from the given per-domain words and PLL bits.
    ///
    /// Panics if more than [`COND_DOMAIN_MAX`] domain words are given.
    pub const fn new(domains: &[u32], pll: u32) -> Self {
        assert!(domains.len() <= COND_DOMAIN_MAX);
        let mut table = Self::EMPTY;
        let mut i = 0;
        while i < domains.len() {
            table.domains[i] = domains[i];
            i += 1;
        }
        table.pll = pll;
        table
    }

    /// Returns the bitwise AND of this table and `other`.
    pub fn intersection(&self, other: &Self) -> Self {
        let mut result = Self::EMPTY;
        for (out, (a, b)) in result
            .domains
            .iter_mut()
            .zip(self.domains.iter().zip(other.domains.iter()))
        {
            *out = a & b;
        }
        result.pll = self.pll & other.pll;
        result
    }

    /// Returns whether every word is 0.
    pub fn is_empty(&self) -> bool {
        self.pll == 0 && self.domains.iter().all(|&word| word == 0)
    }

    /// Checks this live table against a forbidden mask and returns the blocked report.
    ///
    /// Bit `i` of the report is set when domain `i` blocks. Blocking PLLs are reported shifted up
    /// by [`BLOCKED_PLL_SHIFT`], together with [`BLOCKED_PLL`]. A report of 0 means nothing
    /// blocks.
    pub fn blocked_by(&self, forbidden: &Self) -> u32 {
        Self::report(&self.intersection(forbidden))
    }

    /// Turns an intersection of a live table and a forbidden mask into a blocked report.
    pub fn report(intersection: &Self) -> u32 {
        let mut report: u32 = intersection
            .domains
            .iter()
            .enumerate()
            .filter(|(_, word)| **word != 0)
            .fold(0, |report, (i, _)| report | (1 << i));
        if intersection.pll != 0 {
            report |= (intersection.pll << BLOCKED_PLL_SHIFT) | BLOCKED_PLL;
        }
        report
    }

    /// Sets or clears bits of one entry of a forbidden mask.
    ///
    /// Condition ids below `domain_count` address a domain word and `value` is a mask of bits.
    /// The following ids address single PLLs, for which any non-zero `value` selects the PLL's
    /// bit. Returns `None` if `cond_id` is out of range.
    pub fn modify(
        &mut self,
        domain_count: usize,
        pll_count: usize,
        cond_id: usize,
        value: u32,
        set: bool,
    ) -> Option<()> {
        let (word, bits) = if cond_id < domain_count {
            (&mut self.domains[cond_id], value)
        } else if cond_id - domain_count < pll_count {
            (
                &mut self.pll,
                u32::from(value != 0) << (cond_id - domain_count),
            )
        } else {
            return None;
        };
        if set {
            *word |= bits;
        } else {
            *word &= !bits;
        }
        Some(())
    }
}

/// A clock mux whose power-down state hides a domain's gating register.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClkMux {
    /// Address of the clock configuration register holding the mux.
    pub cfg_reg: usize,
    /// Which of the four mux bytes in `cfg_reg` belongs to this mux.
    pub index: u8,
}

/// Static description of one clock-gating domain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConditionDomain {
    /// Name used in diagnostics.
    pub name: &'static str,
    /// Bits of the power status registers belonging to the domain's power rail.
    pub power_mask: u32,
    /// Address of the domain's clock-gating register.
    pub gate_reg: usize,
    /// The gating register reads 1 for a gated clock, so it must be inverted to mean "running".
    pub active_low: bool,
    /// Clock mux which, when parked, makes the gating register meaningless.
    pub clk_mux: Option<ClkMux>,
}

/// A PLL whose enable bit is observed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PllProbe {
    /// Name used in diagnostics.
    pub name: &'static str,
    /// Address of the PLL control register.
    pub reg: usize,
}

/// The domains and PLLs a platform observes, in table order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ConditionLayout {
    /// Clock-gating domains, at most [`COND_DOMAIN_MAX`].
    pub domains: &'static [ConditionDomain],
    /// PLLs, few enough that their bits fit below [`BLOCKED_PLL`] in a report.
    pub plls: &'static [PllProbe],
}

/// The number of domains and PLLs in a [`ConditionLayout`], which is all a forbidden-mask edit
/// needs to know.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ConditionShape {
    /// Number of domain words in use.
    pub domains: usize,
    /// Number of PLL bits in use.
    pub plls: usize,
}

impl ConditionLayout {
    /// Returns the number of domains and PLLs.
    pub fn shape(&self) -> ConditionShape {
        ConditionShape {
            domains: self.domains.len(),
            plls: self.plls.len(),
        }
    }

    /// Panics if the layout does not fit in a [`ConditionTable`].
    pub fn validate(&self) {
        assert!(
            self.domains.len() <= COND_DOMAIN_MAX,
            "{} condition domains exceed the maximum of {COND_DOMAIN_MAX}",
            self.domains.len()
        );
        assert!(
            self.plls.len() < (30 - BLOCKED_PLL_SHIFT) as usize,
            "{} PLL probes do not fit in a blocked report",
            self.plls.len()
        );
    }
}

/// Reads the hardware state described by a [`ConditionLayout`].
pub struct ConditionObserver<'a, R: RegisterIo + ?Sized> {
    regs: &'a R,
    map: &'a SpmRegisterMap,
    layout: &'a ConditionLayout,
}

impl<'a, R: RegisterIo + ?Sized> ConditionObserver<'a, R> {
    /// Creates an observer over the given register bus.
    pub fn new(regs: &'a R, map: &'a SpmRegisterMap, layout: &'a ConditionLayout) -> Self {
        Self { regs, map, layout }
    }

    /// Takes a fresh snapshot of every domain and PLL.
    pub fn refresh(&self) -> ConditionTable {
        let mut table = ConditionTable::EMPTY;
        let pwr_status = self.regs.read_32(self.map.pwr_status);
        let pwr_status_2nd = self.regs.read_32(self.map.pwr_status_2nd);

        for (word, domain) in table.domains.iter_mut().zip(self.layout.domains) {
            if (pwr_status | pwr_status_2nd) & domain.power_mask == 0 {
                continue;
            }
            if domain.clk_mux.is_some_and(|mux| self.mux_parked(mux)) {
                continue;
            }
            let value = self.regs.read_32(domain.gate_reg);
            *word = if domain.active_low { !value } else { value };
        }

        for (i, pll) in self.layout.plls.iter().enumerate() {
            if self.regs.read_32(pll.reg) & PLL_EN != 0 {
                table.pll |= 1 << i;
            }
        }

        trace!("Condition snapshot: {table:x?}");
        table
    }

    fn mux_parked(&self, mux: ClkMux) -> bool {
        let cfg = self.regs.read_32(mux.cfg_reg);
        (cfg >> (u32::from(mux.index % 4) * 8)) & CLK_MUX_PDN != 0
    }
}

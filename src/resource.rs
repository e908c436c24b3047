// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Votes from other subsystems to keep resources powered.

use bitflags::bitflags;
use log::debug;
use num_enum::TryFromPrimitive;

bitflags! {
    /// A set of resources which the SPM can keep on or switch off.
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct ResourceMask: u32 {
        /// DRAM self-refresh state S0.
        const DRAM_S0 = 1 << Resource::DramS0 as u32;
        /// DRAM self-refresh state S1.
        const DRAM_S1 = 1 << Resource::DramS1 as u32;
        /// External memory interface.
        const EMI = 1 << Resource::Emi as u32;
        /// System PLL.
        const SYSPLL = 1 << Resource::Syspll as u32;
        /// Infrastructure bus power.
        const INFRA = 1 << Resource::Infra as u32;
        /// 26 MHz reference clock.
        const BUS26M = 1 << Resource::Bus26m as u32;
        /// Crystal oscillator full power mode.
        const XO_FPM = 1 << Resource::XoFpm as u32;
    }
}

/// A resource which can be voted for.
#[derive(Clone, Copy, Debug, Eq, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum Resource {
    /// DRAM self-refresh state S0.
    DramS0 = 0,
    /// DRAM self-refresh state S1.
    DramS1 = 1,
    /// External memory interface.
    Emi = 2,
    /// System PLL.
    Syspll = 3,
    /// Infrastructure bus power.
    Infra = 4,
    /// 26 MHz reference clock.
    Bus26m = 5,
    /// Crystal oscillator full power mode.
    XoFpm = 6,
}

impl Resource {
    /// The number of resources.
    pub const COUNT: usize = 7;

    /// Returns the mask containing just this resource.
    pub const fn mask(self) -> ResourceMask {
        ResourceMask::from_bits_retain(1 << self as u32)
    }
}

/// Saturating vote counts, one per [`Resource`].
///
/// The table has no hardware side effects. The arbiter only reads the aggregate, to veto
/// constraints which would remove a resource someone still needs.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ResourceVoteTable {
    votes: [u16; Resource::COUNT],
}

impl ResourceVoteTable {
    /// Creates a table with no outstanding votes.
    pub const fn new() -> Self {
        Self {
            votes: [0; Resource::COUNT],
        }
    }

    /// Records a vote for (`requested = true`) or a release of (`requested = false`) the given
    /// resource. Counts saturate at both ends.
    pub fn add(&mut self, resource: Resource, requested: bool) {
        let count = &mut self.votes[resource as usize];
        *count = if requested {
            count.saturating_add(1)
        } else {
            count.saturating_sub(1)
        };
        debug!("Resource {resource:?} votes: {count}");
    }

    /// Drops every outstanding vote for the given resource.
    pub fn remove(&mut self, resource: Resource) {
        self.votes[resource as usize] = 0;
    }

    /// Returns the outstanding vote count for the given resource.
    pub fn count(&self, resource: Resource) -> u16 {
        self.votes[resource as usize]
    }

    /// Returns the required bit of one resource, or with `None` the set of every resource which
    /// has at least one vote.
    pub fn status(&self, resource: Option<Resource>) -> ResourceMask {
        match resource {
            Some(resource) if self.count(resource) != 0 => resource.mask(),
            Some(_) => ResourceMask::empty(),
            None => self
                .votes
                .iter()
                .enumerate()
                .filter(|(_, count)| **count != 0)
                .fold(ResourceMask::empty(), |mask, (i, _)| {
                    mask | ResourceMask::from_bits_retain(1 << i)
                }),
        }
    }
}

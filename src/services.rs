// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

pub mod lpm;

use crate::smccc::{FunctionId, NOT_SUPPORTED, SetFrom, SmcReturn};

/// Helper macro to define the range of SMC function ID values covered by a service
#[macro_export]
macro_rules! owns {
    // service handles the entire Owning Entity Number (OEN)
    ($owning_entity:expr) => {
        #[inline(always)]
        fn owns(&self, function: $crate::smccc::FunctionId) -> bool {
            function.oen() == $owning_entity
                && matches!(
                    function.call_type(),
                    $crate::smccc::SmcccCallType::Fast32 | $crate::smccc::SmcccCallType::Fast64
                )
        }
    };
    // service handles a sub-range of the OEN
    // range refers to the lower 16 bits [15:0] of the SMC FunctionId
    ($owning_entity:expr, $range:expr) => {
        #[inline(always)]
        fn owns(&self, function: $crate::smccc::FunctionId) -> bool {
            function.oen() == $owning_entity
                && $range.contains(&function.number())
                && matches!(
                    function.call_type(),
                    $crate::smccc::SmcccCallType::Fast32 | $crate::smccc::SmcccCallType::Fast64
                )
        }
    };
}
pub(crate) use owns;

/// The security state an SMC came from, and which one to return to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum World {
    /// Normal world.
    NonSecure,
    /// Secure world.
    Secure,
}

/// A service which handles some range of SMC calls.
///
/// According to SMCCC v1.3+ the implementation must disregard the SVE hint bit in the function ID
/// and consider it to be 0 for the purpose of function identification.
pub trait Service {
    /// Returns whether this service is intended to handle the given function ID.
    fn owns(&self, function: FunctionId) -> bool;

    /// Handles the given SMC call from Normal World.
    fn handle_non_secure_smc(&self, regs: &mut SmcReturn) -> World {
        regs.set_from(NOT_SUPPORTED);
        World::NonSecure
    }

    /// Handles the given SMC call from Secure World.
    fn handle_secure_smc(&self, regs: &mut SmcReturn) -> World {
        regs.set_from(NOT_SUPPORTED);
        World::Secure
    }
}

/// Routes an SMC to the first of `services` which owns it.
///
/// `regs` holds the caller's arguments on entry and the values to return on exit.
pub fn handle_smc(services: &[&dyn Service], regs: &mut SmcReturn, world: World) -> World {
    let Some(&raw) = regs.values().first() else {
        regs.set_from(NOT_SUPPORTED);
        return world;
    };
    let mut function = FunctionId(raw as u32);
    function.clear_sve_hint();

    if !function.valid() {
        regs.set_from(NOT_SUPPORTED);
        return world;
    }

    let Some(service) = services.iter().find(|service| service.owns(function)) else {
        regs.set_from(NOT_SUPPORTED);
        return world;
    };

    match world {
        World::NonSecure => service.handle_non_secure_smc(regs),
        World::Secure => service.handle_secure_smc(regs),
    }
}

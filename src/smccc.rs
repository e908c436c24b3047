// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Types and helpers related to the SMC Calling Convention.

use core::fmt::{self, Debug, Display, Formatter};

const FAST_CALL: u32 = 0x8000_0000;
const SMC64: u32 = 0x4000_0000;
const OEN_MASK: u32 = 0x3f00_0000;
const OEN_SHIFT: u8 = 24;
const SVE_HINT: u32 = 1 << 16;
const RESERVED_BITS: u32 = 0x7f << 17;

/// The call is not supported by the implementation.
pub const NOT_SUPPORTED: i32 = -1;

/// The type of an SMCCC call: whether it is a fast call or yielding call, and which calling
/// convention it uses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SmcccCallType {
    /// An SMC32/HVC32 fast call.
    Fast32,
    /// An SMC64/HVC64 fast call.
    Fast64,
    /// A yielding call.
    Yielding,
}

/// Owning Entity Number (OEN)
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OwningEntityNumber(pub u8);

impl OwningEntityNumber {
    /// Silicon partner calls.
    pub const SIP: Self = Self(2);
}

impl Display for OwningEntityNumber {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An SMCCC function ID.
#[derive(Copy, Clone, Eq, PartialEq)]
#[repr(transparent)]
pub struct FunctionId(pub u32);

impl FunctionId {
    /// Creates a new `FunctionId` from its components.
    pub const fn new(call_type: SmcccCallType, oen: OwningEntityNumber, number: u16) -> Self {
        let type_bits = match call_type {
            SmcccCallType::Fast32 => FAST_CALL,
            SmcccCallType::Fast64 => FAST_CALL | SMC64,
            SmcccCallType::Yielding => 0,
        };
        Self(type_bits | (((oen.0 as u32) << OEN_SHIFT) & OEN_MASK) | (number as u32))
    }

    /// Returns the Owning Entity Number of the function ID.
    pub fn oen(self) -> OwningEntityNumber {
        OwningEntityNumber(((self.0 & OEN_MASK) >> OEN_SHIFT) as u8)
    }

    /// Returns the lower 16 bits of the function ID.
    pub fn number(self) -> u16 {
        self.0 as u16
    }

    /// Returns what type of call this is.
    pub fn call_type(self) -> SmcccCallType {
        if self.0 & FAST_CALL != 0 {
            if self.0 & SMC64 != 0 {
                SmcccCallType::Fast64
            } else {
                SmcccCallType::Fast32
            }
        } else {
            SmcccCallType::Yielding
        }
    }

    /// Sets the SVE hint bit.
    #[allow(unused)]
    pub fn set_sve_hint(&mut self) {
        self.0 |= SVE_HINT
    }

    /// Clears the SVE hint bit.
    pub fn clear_sve_hint(&mut self) {
        self.0 &= !SVE_HINT
    }

    /// Returns false if this is a fast call but has any of bits 17-23 set.
    ///
    /// They are reserved for future use and should always be 0.
    pub fn valid(self) -> bool {
        self.call_type() == SmcccCallType::Yielding || self.0 & RESERVED_BITS == 0
    }
}

impl Display for FunctionId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl Debug for FunctionId {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{:#010x} ({:?} OEN {})",
            self.0,
            self.call_type(),
            self.oen()
        )
    }
}

/// The caller's registers, used both for the SMC arguments and for the values returned.
///
/// Only the first `used` values are written back to the caller.
#[derive(Clone, Default, Eq, PartialEq)]
pub struct SmcReturn {
    used: usize,
    values: [u64; Self::MAX_VALUES],
}

impl SmcReturn {
    /// The number of registers which can carry arguments or results.
    pub const MAX_VALUES: usize = 18;

    /// No values.
    pub const EMPTY: Self = Self {
        used: 0,
        values: [0; Self::MAX_VALUES],
    };

    /// Returns a slice containing the used values.
    pub fn values(&self) -> &[u64] {
        &self.values[0..self.used]
    }

    /// Returns true if no values are used.
    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    /// Marks every value as used and returns all of them for writing.
    pub fn mark_all_used(&mut self) -> &mut [u64; Self::MAX_VALUES] {
        self.used = Self::MAX_VALUES;
        &mut self.values
    }

    /// Marks every value as unused, so nothing is written back to the caller.
    pub fn mark_empty(&mut self) {
        self.used = 0;
    }
}

impl Debug for SmcReturn {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "SmcReturn([")?;
        let values = self.values();
        if let Some(first) = values.first() {
            write!(f, "{first:#x}")?;
            for value in &values[1..] {
                write!(f, ", {value:#x}")?;
            }
        }
        write!(f, "])")?;
        Ok(())
    }
}

impl From<[u64; Self::MAX_VALUES]> for SmcReturn {
    fn from(values: [u64; Self::MAX_VALUES]) -> Self {
        Self {
            used: Self::MAX_VALUES,
            values,
        }
    }
}

/// Overwrites the caller's registers with a result.
pub trait SetFrom<T> {
    /// Replaces the used values with `value`.
    fn set_from(&mut self, value: T);
}

impl SetFrom<u64> for SmcReturn {
    fn set_from(&mut self, value: u64) {
        self.used = 1;
        self.values[0] = value;
    }
}

impl SetFrom<i32> for SmcReturn {
    fn set_from(&mut self, value: i32) {
        self.set_from(i64::from(value) as u64)
    }
}

impl SetFrom<[u64; 2]> for SmcReturn {
    fn set_from(&mut self, value: [u64; 2]) {
        self.used = 2;
        self.values[..2].copy_from_slice(&value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_id_fields() {
        let function = FunctionId::new(SmcccCallType::Fast64, OwningEntityNumber::SIP, 0x515);
        assert_eq!(function.0, 0xC200_0515);
        assert_eq!(function.oen(), OwningEntityNumber::SIP);
        assert_eq!(function.number(), 0x515);
        assert_eq!(function.call_type(), SmcccCallType::Fast64);
        assert!(function.valid());
        assert!(!FunctionId(0x8200_0000 | (1 << 20)).valid());
    }

    #[test]
    fn sve_hint() {
        let mut function = FunctionId(0xC200_0515);
        function.set_sve_hint();
        assert_eq!(function.0, 0xC201_0515);
        function.clear_sve_hint();
        assert_eq!(function.0, 0xC200_0515);
    }

    #[test]
    fn set_from_narrows_used() {
        let mut regs = SmcReturn::from([7; SmcReturn::MAX_VALUES]);
        regs.set_from(NOT_SUPPORTED);
        assert_eq!(regs.values(), [u64::MAX]);

        regs.set_from([0, 42]);
        assert_eq!(regs.values(), [0, 42]);

        regs.mark_empty();
        assert!(regs.is_empty());
        assert_eq!(regs.mark_all_used()[1], 42);
        assert!(format!("{regs:?}").starts_with("SmcReturn([0x0, 0x2a, 0x7"));
    }
}

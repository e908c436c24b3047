// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Bounded history of wake events, laid out so that it can be read back raw after a reset.

use log::trace;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Value of [`TraceArea::magic`] once the area has been initialised.
pub const TRACE_MAGIC: u32 = 0x1000_5731;

/// Number of slots in the general low-power ring.
pub const LP_RING_SLOTS: usize = 5;
/// Number of slots in the suspend ring.
pub const SUSPEND_RING_SLOTS: usize = 1;

/// The category of a trace record, which selects the ring it is written to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraceCategory {
    /// Idle-path low-power events.
    LowPower,
    /// System suspend events.
    Suspend,
}

/// One wake event, as captured by the conservation sequence.
#[derive(
    Clone, Copy, Debug, Default, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq,
)]
#[repr(C)]
pub struct TraceRecord {
    /// Index of the constraint which was entered.
    pub constraint: u32,
    /// Index of the core which entered.
    pub core: u32,
    /// Wake event register.
    pub r12: u32,
    /// Extended wake event register.
    pub r12_ext: u32,
    /// Raw wake-up status.
    pub raw_sta: u32,
    /// Miscellaneous wake status.
    pub wake_misc: u32,
    /// Time spent asleep, in 32 kHz ticks.
    pub timer_out: u32,
    /// PCM register 13.
    pub r13: u32,
    /// Resource request status.
    pub req_sta: u32,
    /// SPM firmware debug flags.
    pub debug_flag: u32,
    /// Second SPM firmware debug flag word.
    pub debug_flag1: u32,
    /// Software flags programmed before entry.
    pub sw_flag0: u32,
    /// Second software flag word programmed before entry.
    pub sw_flag1: u32,
    /// Decoded [`WakeReason`](crate::conservation::WakeReason).
    pub wake_reason: u32,
}

/// A ring buffer of trace records.
#[derive(Clone, Debug, FromBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct TraceRing<const SLOTS: usize> {
    /// The slot which the next record will be written to.
    cursor: u32,
    /// The total number of records written since initialisation. This may be greater than `SLOTS`,
    /// in which case the oldest records have been overwritten.
    written: u32,
    slots: [TraceRecord; SLOTS],
}

impl<const SLOTS: usize> TraceRing<SLOTS> {
    /// Creates an empty ring.
    pub const fn new() -> Self {
        Self {
            cursor: 0,
            written: 0,
            slots: [TraceRecord {
                constraint: 0,
                core: 0,
                r12: 0,
                r12_ext: 0,
                raw_sta: 0,
                wake_misc: 0,
                timer_out: 0,
                r13: 0,
                req_sta: 0,
                debug_flag: 0,
                debug_flag1: 0,
                sw_flag0: 0,
                sw_flag1: 0,
                wake_reason: 0,
            }; SLOTS],
        }
    }

    /// Stores a record in the slot under the cursor and advances the cursor, overwriting the
    /// oldest record once the ring is full.
    pub fn write(&mut self, record: &TraceRecord) {
        // A corrupted cursor read back from a previous boot must not index out of bounds.
        let slot = self.cursor as usize % SLOTS;
        self.slots[slot] = *record;
        self.cursor = ((slot + 1) % SLOTS) as u32;
        self.written = self.written.wrapping_add(1);
    }

    /// Returns the slot which the next record will be written to.
    pub fn cursor(&self) -> usize {
        self.cursor as usize
    }

    /// Returns the number of records written since the ring was created.
    pub fn written(&self) -> u32 {
        self.written
    }

    /// Returns the raw slots, in storage order.
    pub fn slots(&self) -> &[TraceRecord; SLOTS] {
        &self.slots
    }

    /// Returns the most recently written record, if any.
    pub fn latest(&self) -> Option<&TraceRecord> {
        if self.written == 0 {
            return None;
        }
        Some(&self.slots[(self.cursor as usize + SLOTS - 1) % SLOTS])
    }

    /// Iterates over the records which are still held, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TraceRecord> {
        let held = (self.written as usize).min(SLOTS);
        let start = if held < SLOTS { 0 } else { self.cursor as usize };
        (0..held).map(move |i| &self.slots[(start + i) % SLOTS])
    }
}

impl<const SLOTS: usize> Default for TraceRing<SLOTS> {
    fn default() -> Self {
        Self::new()
    }
}

/// The persistent trace area: a header followed by one ring per [`TraceCategory`].
#[derive(Clone, Debug, FromBytes, Immutable, KnownLayout)]
#[repr(C)]
pub struct TraceArea {
    /// [`TRACE_MAGIC`] once initialised.
    pub magic: u32,
    /// Size in bytes of one [`TraceRecord`], so that a reader can check its own layout.
    pub record_size: u32,
    /// Idle-path low-power events.
    pub low_power: TraceRing<LP_RING_SLOTS>,
    /// System suspend events.
    pub suspend: TraceRing<SUSPEND_RING_SLOTS>,
}

impl TraceArea {
    /// Creates an initialised, empty trace area.
    pub const fn new() -> Self {
        Self {
            magic: TRACE_MAGIC,
            record_size: size_of::<TraceRecord>() as u32,
            low_power: TraceRing::new(),
            suspend: TraceRing::new(),
        }
    }
}

impl Default for TraceArea {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes trace records into a [`TraceArea`].
///
/// The recorder itself does no locking; it is only ever reached through the registry lock, so at
/// most one core writes at a time.
#[derive(Debug, Default)]
pub struct TraceRecorder {
    area: TraceArea,
}

impl TraceRecorder {
    /// Creates a recorder with an empty trace area.
    pub const fn new() -> Self {
        Self {
            area: TraceArea::new(),
        }
    }

    /// Appends a record to the ring for the given category.
    pub fn write(&mut self, category: TraceCategory, record: &TraceRecord) {
        trace!(
            "Trace {category:?}: constraint {} r12 {:#010x}",
            record.constraint, record.r12
        );
        match category {
            TraceCategory::LowPower => self.area.low_power.write(record),
            TraceCategory::Suspend => self.area.suspend.write(record),
        }
    }

    /// Returns the most recent record of the given category.
    pub fn latest(&self, category: TraceCategory) -> Option<&TraceRecord> {
        match category {
            TraceCategory::LowPower => self.area.low_power.latest(),
            TraceCategory::Suspend => self.area.suspend.latest(),
        }
    }

    /// Returns the trace area, for dumping.
    pub fn area(&self) -> &TraceArea {
        &self.area
    }
}

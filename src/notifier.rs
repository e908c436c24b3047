// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Mailbox notifications to the power-management coprocessors around each low-power entry.

use crate::{
    constraint::AllowFlags,
    regs::{RegisterIo, SpmRegisterMap},
};
use log::trace;

const EVENT_ENTER: u32 = 0x454e_0000;
const EVENT_LEAVE: u32 = 0x4c45_0000;
const EVENT_MODE_MASK: u32 = 0xffff;

/// The kind of transition being announced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LpEvent {
    /// About to arm the SPM.
    Enter,
    /// The wake status has been captured.
    Leave,
}

/// Announces a transition together with the resources which may be switched off.
pub fn notify<R: RegisterIo + ?Sized>(
    regs: &R,
    map: &SpmRegisterMap,
    event: LpEvent,
    allows: AllowFlags,
) {
    let tag = match event {
        LpEvent::Enter => EVENT_ENTER,
        LpEvent::Leave => EVENT_LEAVE,
    };
    trace!("LP notify {event:?}: {allows:?}");
    regs.write_32(map.lp_mailbox, allows.bits());
    regs.write_32(map.lp_event_mailbox, tag | (allows.bits() & EVENT_MODE_MASK));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::test::{FakeRegisters, TEST_REGISTER_MAP as MAP};

    #[test]
    fn enter_and_leave_words() {
        let regs = FakeRegisters::new();
        let allows = AllowFlags::DRAM_S0 | AllowFlags::AP_SUSPEND;

        notify(&regs, &MAP, LpEvent::Enter, allows);
        assert_eq!(regs.read_32(MAP.lp_mailbox), allows.bits());
        assert_eq!(regs.read_32(MAP.lp_event_mailbox), 0x454e_0042);

        notify(&regs, &MAP, LpEvent::Leave, AllowFlags::empty());
        assert_eq!(regs.read_32(MAP.lp_mailbox), 0);
        assert_eq!(regs.read_32(MAP.lp_event_mailbox), 0x4c45_0000);
    }
}

// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! System suspend profiles.

use crate::conservation::{PcmFlags, PcmFlags1};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Which PCM flag bundle a system suspend programs.
#[derive(Clone, Copy, Debug, Default, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum SuspendFlavor {
    /// Power down everything the constraint allows.
    #[default]
    SystemPdn = 0,
    /// Keep enough of the infrastructure and the 26 MHz clock alive for audio playback.
    Sleep = 1,
}

impl SuspendFlavor {
    /// Returns the PCM flag words for this flavor.
    pub const fn pcm_flags(self) -> (PcmFlags, PcmFlags1) {
        match self {
            Self::SystemPdn => (SUSPEND_PCM_FLAGS, PcmFlags1::empty()),
            Self::Sleep => (
                SUSPEND_PCM_FLAGS
                    .union(PcmFlags::DISABLE_INFRA_PDN)
                    .union(PcmFlags::KEEP_CSYSPWRACK_HIGH),
                PcmFlags1::DISABLE_MD26M_CK_OFF,
            ),
        }
    }
}

const SUSPEND_PCM_FLAGS: PcmFlags = PcmFlags::DISABLE_VCORE_DVS
    .union(PcmFlags::DISABLE_VCORE_DFS)
    .union(PcmFlags::ENABLE_LVTS_WORKAROUND)
    .union(PcmFlags::USE_SRCCLKENO2);

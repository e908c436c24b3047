// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The entry points used by the power-state coordination glue and the control plane.

use crate::{
    condition::{ConditionObserver, ConditionTable},
    conservation::{
        self, ConservationSequencer, ConservationSession, ExtOp, SessionKind, WakeReason,
    },
    constraint::{self, HookContext, SelectContext, UpdateRequest},
    platform::{CORE_MAX, LpmPlatform},
    registry::{ConstraintId, ConstraintRegistry, RmError, StatusKind},
    regs::{RegisterIo, SpmRegisterMap},
    resource::{Resource, ResourceVoteTable},
    smccc::{SetFrom, SmcReturn},
    suspend::SuspendFlavor,
    trace::{TraceArea, TraceRecorder},
};
use log::{debug, info, warn};
use spin::mutex::SpinMutex;

/// A status code returned to the control plane.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(i32)]
pub enum RmStatus {
    /// The command succeeded.
    Ok = 0,
    /// The command was malformed or named an unknown constraint.
    Bad = -1,
    /// The command answered for a single constraint; the caller should not keep iterating.
    Stop = -2,
}

impl From<RmError> for RmStatus {
    fn from(_: RmError) -> Self {
        Self::Bad
    }
}

impl SetFrom<RmStatus> for SmcReturn {
    fn set_from(&mut self, status: RmStatus) {
        self.set_from(status as i32)
    }
}

/// A control-plane command.
#[derive(Clone, Debug)]
pub enum LpmCommand {
    /// Chooses the PCM flag bundle used for system suspend.
    SetSuspendFlavor(SuspendFlavor),
    /// Programs the PCM timer and arms or disarms the resume watchdog.
    SetWatchdog {
        /// Arm rather than disarm.
        enable: bool,
        /// PCM timer value in 32 kHz ticks.
        ticks: u32,
    },
    /// Reads the PHY PLL mode.
    QueryPllMode,
    /// Changes the state of one or all constraints.
    SetStatus {
        /// Which constraints to change.
        target: ConstraintId,
        /// What to change.
        request: UpdateRequest,
    },
    /// Reads the state of one or all constraints.
    GetStatus {
        /// Which constraints to read.
        target: ConstraintId,
        /// What to read.
        kind: StatusKind,
        /// Zero the residency after reading it.
        clear: bool,
    },
}

/// The outcome of an [`LpmCommand`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CommandResult {
    /// Status code.
    pub status: RmStatus,
    /// Value read by a query, otherwise 0.
    pub value: u64,
}

impl CommandResult {
    const OK: Self = Self::new(RmStatus::Ok, 0);
    const BAD: Self = Self::new(RmStatus::Bad, 0);

    /// Creates a result.
    pub const fn new(status: RmStatus, value: u64) -> Self {
        Self { status, value }
    }
}

/// The depth an entry actually used.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SelectedDepth {
    /// The constraint at the given registry index was entered.
    Constraint(usize),
    /// Nothing was eligible; the caller should fall back to plain WFI.
    Baseline,
}

#[derive(Debug)]
struct SpmState {
    registry: ConstraintRegistry,
    votes: ResourceVoteTable,
    sequencer: ConservationSequencer,
    trace: TraceRecorder,
    suspend_flavor: SuspendFlavor,
    /// PCM timer ticks while the watchdog is armed through the control plane.
    watchdog: Option<u32>,
    conditions: ConditionTable,
    sessions: [Option<ConservationSession>; CORE_MAX],
}

/// The low-power arbiter for one SPM.
///
/// Constructed once at boot and shared by reference. Every method takes the single internal lock
/// for the whole call, and none of them waits for an interrupt while holding it.
#[derive(Debug)]
pub struct Spm<P: LpmPlatform> {
    platform: P,
    state: SpinMutex<SpmState>,
}

impl<P: LpmPlatform> Spm<P> {
    /// Creates the arbiter and registers the platform's constraints.
    ///
    /// Panics if the platform's core count or condition layout is out of range.
    pub fn new(platform: P) -> Self {
        assert!(
            P::CORE_COUNT <= CORE_MAX,
            "{} cores exceed the maximum of {CORE_MAX}",
            P::CORE_COUNT
        );
        let layout = platform.condition_layout();
        layout.validate();

        let mut registry = ConstraintRegistry::new();
        registry.register(platform.constraints(), layout.shape());
        info!("Low-power arbiter ready with {} constraints", registry.len());

        Self {
            platform,
            state: SpinMutex::new(SpmState {
                registry,
                votes: ResourceVoteTable::new(),
                sequencer: ConservationSequencer::new(),
                trace: TraceRecorder::new(),
                suspend_flavor: SuspendFlavor::default(),
                watchdog: None,
                conditions: ConditionTable::EMPTY,
                sessions: [const { None }; CORE_MAX],
            }),
        }
    }

    /// Returns the platform.
    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Picks the deepest eligible constraint at or after `hint` and arms the hardware for it.
    ///
    /// The caller executes the wait-for-interrupt instruction once this returns, and then calls
    /// [`idle_leave`](Self::idle_leave).
    pub fn idle_enter(&self, core: usize, hint: usize) -> SelectedDepth {
        self.enter(core, hint, SessionKind::Idle, ExtOp::empty())
    }

    /// Undoes the idle entry of the given core and returns why it woke up.
    pub fn idle_leave(&self, core: usize) -> WakeReason {
        self.leave(core)
    }

    /// Picks the deepest eligible constraint for system suspend and arms the hardware for it,
    /// adding `extra` to the selected constraint's extended operations.
    pub fn suspend_enter(&self, core: usize, extra: ExtOp) -> SelectedDepth {
        self.enter(core, 0, SessionKind::Suspend, extra)
    }

    /// Undoes the suspend entry and returns why the system woke up.
    pub fn suspend_leave(&self, core: usize) -> WakeReason {
        self.leave(core)
    }

    /// Records a vote for or against keeping a resource on.
    pub fn vote(&self, resource: Resource, requested: bool) {
        self.state.lock().votes.add(resource, requested);
    }

    /// Removes any vote for a resource.
    pub fn withdraw(&self, resource: Resource) {
        self.state.lock().votes.remove(resource);
    }

    /// Applies an asynchronous notification, such as the coprocessor firmware becoming ready.
    pub fn notify(&self, target: ConstraintId, request: &UpdateRequest) -> Result<(), RmError> {
        self.state.lock().registry.do_update(target, request)
    }

    /// Returns a copy of the wake trace.
    pub fn trace(&self) -> TraceArea {
        self.state.lock().trace.area().clone()
    }

    /// Returns the condition table used by the most recent selection.
    pub fn conditions(&self) -> ConditionTable {
        self.state.lock().conditions
    }

    /// Returns the suspend flavor which the next system suspend will use.
    pub fn suspend_flavor(&self) -> SuspendFlavor {
        self.state.lock().suspend_flavor
    }

    /// Runs a control-plane command.
    pub fn control(&self, command: &LpmCommand) -> CommandResult {
        let map = self.platform.register_map();
        let mut state = self.state.lock();
        debug!("LPM control: {command:?}");

        match command {
            LpmCommand::SetSuspendFlavor(flavor) => {
                state.suspend_flavor = *flavor;
                CommandResult::OK
            }
            LpmCommand::SetWatchdog { enable, ticks } => {
                self.platform.write_32(map.pcm_timer_val, *ticks);
                conservation::set_pcm_wdt(&self.platform, map, *enable);
                state.watchdog = enable.then_some(*ticks);
                CommandResult::OK
            }
            LpmCommand::QueryPllMode => CommandResult::new(RmStatus::Ok, self.pll_mode(map)),
            LpmCommand::SetStatus { target, request } => {
                match state.registry.do_update(*target, request) {
                    Ok(()) => CommandResult::OK,
                    Err(e) => {
                        warn!("Rejected {request:?} for {target:?}: {e}");
                        CommandResult::BAD
                    }
                }
            }
            LpmCommand::GetStatus {
                target,
                kind,
                clear,
            } => match state.registry.get_status(*target, *kind, *clear) {
                Ok(value) => {
                    let status = match target {
                        ConstraintId::All => RmStatus::Ok,
                        ConstraintId::Index(_) => RmStatus::Stop,
                    };
                    CommandResult::new(status, value.raw())
                }
                Err(e) => {
                    warn!("Status query for {target:?} failed: {e}");
                    CommandResult::BAD
                }
            },
        }
    }

    /// Reports 0 when only the first PHY PLL is in software mode, otherwise the raw register.
    fn pll_mode(&self, map: &SpmRegisterMap) -> u64 {
        let value = self.platform.read_32(map.power_on_val0);
        let mode_bits = SpmRegisterMap::PHYPLL_SW | SpmRegisterMap::PHYPLL2_SW;
        if value & mode_bits == SpmRegisterMap::PHYPLL_SW {
            0
        } else {
            value.into()
        }
    }

    fn enter(&self, core: usize, start: usize, kind: SessionKind, extra: ExtOp) -> SelectedDepth {
        if core >= P::CORE_COUNT {
            warn!("Ignoring {kind:?} entry for invalid core {core}");
            return SelectedDepth::Baseline;
        }
        let map = self.platform.register_map();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if let Some(mut stale) = state.sessions[core].take() {
            warn!("cpu{core}: entering with session still open, unwinding it");
            let mut ctx = HookContext {
                platform: &self.platform,
                sequencer: &mut state.sequencer,
                trace: &mut state.trace,
                votes: state.votes.status(None),
            };
            state.registry.reset(stale.constraint, &mut ctx, &mut stale);
        }

        let observer =
            ConditionObserver::new(&self.platform, map, self.platform.condition_layout());
        state.conditions = observer.refresh();
        state.registry.update(&state.conditions);

        let votes = state.votes.status(None);
        let select = SelectContext {
            required: votes,
            kind,
        };
        if kind == SessionKind::Suspend {
            constraint::log_blocked(state.registry.constraints());
        }
        let Some(index) = state.registry.select(start, &select) else {
            debug!("cpu{core}: no constraint eligible for {kind:?}");
            return SelectedDepth::Baseline;
        };

        let mut power_control = match kind {
            SessionKind::Idle => P::IDLE_POWER_CONTROL,
            SessionKind::Suspend => {
                let mut power_control = P::SUSPEND_POWER_CONTROL;
                (power_control.pcm_flags, power_control.pcm_flags1) =
                    state.suspend_flavor.pcm_flags();
                power_control
            }
        };
        if kind == SessionKind::Suspend
            && let Some(ticks) = state.watchdog
            && power_control.timer_ticks == 0
        {
            power_control.timer_ticks = ticks;
        }

        let mut session = ConservationSession::new(core, index, kind, power_control);
        session.ext_op = extra;
        let mut ctx = HookContext {
            platform: &self.platform,
            sequencer: &mut state.sequencer,
            trace: &mut state.trace,
            votes,
        };
        state.registry.run(index, &mut ctx, &mut session);
        state.sessions[core] = Some(session);
        SelectedDepth::Constraint(index)
    }

    fn leave(&self, core: usize) -> WakeReason {
        if core >= P::CORE_COUNT {
            warn!("Ignoring leave for invalid core {core}");
            return WakeReason::None;
        }
        let mut guard = self.state.lock();
        let state = &mut *guard;

        let Some(mut session) = state.sessions[core].take() else {
            return WakeReason::None;
        };
        let mut ctx = HookContext {
            platform: &self.platform,
            sequencer: &mut state.sequencer,
            trace: &mut state.trace,
            votes: state.votes.status(None),
        };
        state.registry.reset(session.constraint, &mut ctx, &mut session);
        session.wake.map_or(WakeReason::None, |wake| wake.reason)
    }
}

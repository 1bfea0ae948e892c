//! `CommandCore`: owns every piece of interpreter state and drives it one
//! cooperative slice at a time.
//!
//! `run_slice` never blocks and never recurses: it refills the ring from
//! whichever source is active, advances `Mode` and the sleep machine if
//! either is waiting on a timeout or a collaborator condition, and attempts
//! at most one opcode dispatch. Calling it at high, steady frequency from a
//! single cooperative loop is the entire scheduling model; there is no
//! other entry point that touches this state.

use crate::clock::Timeout;
use crate::collaborators::{
    AuxiliaryOutputs, BoardStatus, Card, Collaborators, Heater, Host, Interface, Planner,
    SleepMessage, UtilityScript,
};
use crate::dispatcher::{self, DispatchOutcome};
use crate::error::ErrorCode;
use crate::mode::{ButtonWaitContext, Mode};
use crate::priority::{Isr, Thread};
use crate::sleep::{
    SleepContext, SleepState, SleepType, FILAMENT_INPUT_TIMEOUT_US, POT_VALUE_NORMAL,
    POT_VALUE_REDUCED, RESTART_COLD_ONLY_POT_AXES, RESTART_HEATER_TIMEOUT_US,
    RESTART_NORMAL_POT_AXES, RESTART_PROGRESS_BAR_LINES, RESTART_PROGRESS_BAR_PERCENT_STEP,
    RESTART_PROGRESS_BAR_START, REDUCED_POT_AXES, RETRACT_MM, TUNE_FILAMENT_START,
    TUNE_PRINT_START, AB_RATE, WAIT_X_MM, WAIT_Y_MM, WAIT_Z_MM, XY_RATE, Z_RATE,
};
use crate::source_mux::{Source, SD_FAIL_THRESHOLD, STATICFAIL_RETRACT_RATE, STATICFAIL_RETRACT_Z_MM};
use crate::util::ring::CommandBuffer;

pub struct CommandCore {
    pub(crate) buffer: CommandBuffer,
    pub(crate) mode: Mode,
    sleep_state: SleepState,
    sleep_type: SleepType,
    sleep_ctx: SleepContext,
    source: Source,
    pub(crate) timeout: Timeout,
    pub(crate) line_number: u32,
    pub(crate) current_tool_index: u8,
    sd_bytes_consumed: u32,
    sd_fail_count: u8,
    /// Latched once the STATICFAIL recovery has run, so the watchdog doesn't
    /// re-trip every slice while the card is still reporting no further
    /// bytes. Cleared only by `reset()`.
    sdcard_reset: bool,
    pub(crate) paused: bool,
    heat_shutdown: bool,
    pub(crate) check_temp_state: bool,
    pub(crate) start_build_flag: bool,
    pub(crate) platform_on_flag: bool,
    /// Carried on the struct for parity with the rest of the core's flags,
    /// but has no reader on this side of the boundary: its producer/consumer
    /// belongs to the host-link pause/unpause plumbing. Kept as a field with
    /// no reader rather than inventing a use for it -- see DESIGN.md.
    #[allow(dead_code)]
    pub(crate) outstanding_tool_command: bool,
    pub(crate) button_ctx: ButtonWaitContext,
}

impl Default for CommandCore {
    fn default() -> Self {
        CommandCore {
            buffer: CommandBuffer::new(),
            mode: Mode::default(),
            sleep_state: SleepState::default(),
            sleep_type: SleepType::default(),
            sleep_ctx: SleepContext::default(),
            source: Source::default(),
            timeout: Timeout::inactive(),
            line_number: 0,
            current_tool_index: 0,
            sd_bytes_consumed: 0,
            sd_fail_count: 0,
            sdcard_reset: false,
            paused: false,
            heat_shutdown: false,
            check_temp_state: false,
            start_build_flag: false,
            platform_on_flag: false,
            outstanding_tool_command: false,
            button_ctx: ButtonWaitContext::default(),
        }
    }
}

impl CommandCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every piece of state to its power-on default, including
    /// dropping any buffered bytes. Used both at boot and by
    /// `RESET_TO_FACTORY`.
    pub fn reset(&mut self) {
        *self = CommandCore::default();
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn line_number(&self) -> u32 {
        self.line_number
    }

    pub fn current_tool_index(&self) -> u8 {
        self.current_tool_index
    }

    /// Sets or clears the top-level pause. The core itself never calls
    /// this: `ToolSubCommand::PauseUnpause` forwards the flip request to
    /// `Host::pause_build`, and whatever sits behind that collaborator (the
    /// host-link/button-matrix layer, out of scope here) is expected to call
    /// this back once it has decided to honor the request.
    pub fn pause(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Latches `heat_shutdown`, halting dispatch until the next full
    /// `reset()`. Called by the heater-supervisor collaborator, not by
    /// anything inside the core itself.
    pub fn heat_shutdown(&mut self) {
        self.heat_shutdown = true;
    }

    pub fn is_heat_shutdown(&self) -> bool {
        self.heat_shutdown
    }

    /// `true` exactly while the nested sleep machine owns `Mode::Ready`.
    pub fn is_active_paused(&self) -> bool {
        self.sleep_state.is_active_pause()
    }

    pub fn sleep_state(&self) -> SleepState {
        self.sleep_state
    }

    /// Feeds one byte in from the host-link receive interrupt.
    pub fn push_from_host_link(&mut self, byte: u8, isr: &Isr) -> Result<(), crate::util::ring::Overflow> {
        self.buffer.push(byte, isr)
    }

    /// Starts or ends an active pause. A no-op if the core is already in the
    /// requested `on`/`off` state. Turning a pause off doesn't clear
    /// `is_active_paused()` immediately unless the pause hadn't actually
    /// started moving yet (`StartWait`); otherwise it hands off to the
    /// reheat-and-restart sequence, which clears it once the print has
    /// physically resumed (`advance_sleep`, `SleepState::Finished`).
    pub fn active_pause(&mut self, on: bool, sleep_type: SleepType, collabs: &mut Collaborators) {
        if self.is_active_paused() == on {
            return;
        }
        if on {
            self.sleep_type = sleep_type;
            match sleep_type {
                SleepType::Cold => {
                    self.sleep_ctx.cold_pause = true;
                    collabs.interface.show_sleep_message(SleepMessage::ColdPauseWait);
                }
                SleepType::Filament => {
                    self.sleep_ctx.cold_pause = false;
                    collabs
                        .interface
                        .show_sleep_message(SleepMessage::FilamentChangeWait);
                }
                SleepType::None => return,
            }
            self.sleep_state = SleepState::StartWait;
        } else {
            match self.sleep_state {
                SleepState::StartWait => {
                    self.sleep_state = SleepState::None;
                }
                SleepState::Moving => {
                    self.sleep_reheat(collabs);
                    self.sleep_state = SleepState::MovingWait;
                }
                SleepState::Active => {
                    self.sleep_reheat(collabs);
                    self.sleep_state = SleepState::Restart;
                }
                _ => {}
            }
        }
    }

    /// Restores the three saved heater targets and re-pauses an extruder
    /// that shouldn't resume heating while the platform is still climbing.
    fn sleep_reheat(&mut self, collabs: &mut Collaborators) {
        collabs.extruders[0].set_target(self.sleep_ctx.saved_extruder_targets[0]);
        collabs.extruders[1].set_target(self.sleep_ctx.saved_extruder_targets[1]);
        collabs.platform.set_target(self.sleep_ctx.saved_platform_target);

        if collabs.platform.is_heating() && !collabs.platform.is_cooling() {
            if !collabs.extruders[0].is_cooling() {
                collabs.extruders[0].pause(true);
                self.check_temp_state = true;
            }
            if !collabs.extruders[1].is_cooling() {
                collabs.extruders[1].pause(true);
                self.check_temp_state = true;
            }
        }
    }

    /// One non-blocking step of the interpreter. Call this at a fixed,
    /// frequent interval from the main loop; it is the only path that
    /// advances buffered state or dispatches a command.
    pub fn run_slice(&mut self, collabs: &mut Collaborators, thread: Thread) {
        self.refill_from_active_source(collabs, &thread);
        self.clear_check_temp_state(collabs);

        if self.paused || self.heat_shutdown {
            return;
        }

        self.advance_mode(collabs);

        if self.mode != Mode::Ready {
            return;
        }

        if self.is_active_paused() {
            self.advance_sleep(collabs);
            return;
        }

        match dispatcher::try_dispatch_one(self, collabs, &thread) {
            DispatchOutcome::Dispatched => collabs.host.reset_user_input_timeout(),
            DispatchOutcome::WaitingForPipelineBarrier
            | DispatchOutcome::WaitingForMorePacketBytes
            | DispatchOutcome::EmptyBuffer
            | DispatchOutcome::UnknownOpcodeSkipped => {}
        }
    }

    fn refill_from_active_source(&mut self, collabs: &mut Collaborators, thread: &Thread) {
        match self.source {
            Source::HostLink => {}
            Source::CardPlayback => self.refill_from_card(collabs, thread),
            Source::UtilityScript => self.refill_from_utility(collabs, thread),
        }

        if self.source == Source::HostLink {
            if collabs.card.is_playing() {
                self.source = Source::CardPlayback;
                self.sd_fail_count = 0;
            } else if collabs.utility.is_playing() {
                self.source = Source::UtilityScript;
            }
        }
    }

    fn refill_from_card(&mut self, collabs: &mut Collaborators, thread: &Thread) {
        while self.buffer.remaining_capacity() > 0 && collabs.card.playback_has_next() {
            let byte = collabs.card.playback_next();
            if self.buffer.push_from_thread(byte, thread).is_err() {
                break;
            }
            self.sd_bytes_consumed += 1;
        }

        if !collabs.card.playback_has_next() {
            if self.sd_bytes_consumed < collabs.card.get_file_size() && !self.sdcard_reset {
                self.sd_fail_count = self.sd_fail_count.saturating_add(1);
                crate::util::log::debug!(
                    "card playback short read, sd_fail_count={}",
                    self.sd_fail_count
                );
                if self.sd_fail_count >= SD_FAIL_THRESHOLD {
                    self.run_staticfail_recovery(collabs, thread);
                }
            } else if self.buffer.length() == 0 && self.mode == Mode::Ready {
                collabs.card.finish_playback();
            }
        }
    }

    /// Six consecutive short-read observations from card playback: safe
    /// abort (STATICFAIL).
    fn run_staticfail_recovery(&mut self, collabs: &mut Collaborators, thread: &Thread) {
        crate::util::log::warn!("STATICFAIL: card playback stalled, aborting build");
        collabs.interface.reset_lcd();
        collabs
            .interface
            .error_response(ErrorCode::StaticFail, false, false);
        self.sdcard_reset = true;
        collabs.planner.abort();
        self.buffer.reset(thread);

        collabs.extruders[0].set_target(0);
        collabs.extruders[1].set_target(0);
        collabs.platform.set_target(0);

        let mut target = collabs.planner.get_planner_position();
        target.z = collabs.planner.mm_to_steps(STATICFAIL_RETRACT_Z_MM, 2);
        self.paused = false;
        collabs.planner.set_target(target, STATICFAIL_RETRACT_RATE);

        collabs.card.finish_playback();
        self.source = Source::HostLink;
        self.sd_fail_count = 0;
    }

    fn refill_from_utility(&mut self, collabs: &mut Collaborators, thread: &Thread) {
        while self.buffer.remaining_capacity() > 0 && collabs.utility.playback_has_next() {
            let byte = collabs.utility.playback_next();
            if self.buffer.push_from_thread(byte, thread).is_err() {
                break;
            }
        }
        if !collabs.utility.playback_has_next() {
            collabs.utility.finish_playback();
            self.source = Source::HostLink;
        }
    }

    fn clear_check_temp_state(&mut self, collabs: &mut Collaborators) {
        if !self.check_temp_state {
            return;
        }
        if collabs.platform.has_reached_target() {
            collabs.extruders[0].pause(false);
            collabs.extruders[1].pause(false);
            self.check_temp_state = false;
        }
    }

    fn advance_mode(&mut self, collabs: &mut Collaborators) {
        match self.mode {
            Mode::Ready => {}
            Mode::Homing => {
                if !collabs.planner.is_running() {
                    self.mode = Mode::Ready;
                    self.timeout.cancel();
                } else if self.timeout.has_elapsed(collabs.clock) {
                    collabs.planner.abort();
                    self.mode = Mode::Ready;
                    self.timeout.cancel();
                }
            }
            Mode::Moving => {
                if collabs.planner.queue_empty() && !collabs.planner.is_running() {
                    self.mode = Mode::Ready;
                }
            }
            Mode::Delay => {
                if self.timeout.has_elapsed(collabs.clock) {
                    self.mode = Mode::Ready;
                    self.timeout.cancel();
                }
            }
            Mode::WaitOnTool => {
                let tool = self.current_tool_index as usize;
                if self.timeout.has_elapsed(collabs.clock) {
                    collabs
                        .interface
                        .error_response(ErrorCode::HeatingTimeout, false, false);
                    self.mode = Mode::Ready;
                    self.timeout.cancel();
                } else if collabs.extruders[tool].has_reached_target()
                    && !collabs.extruders[tool].is_paused()
                {
                    collabs.piezo.play_tune(TUNE_PRINT_START);
                    self.mode = Mode::Ready;
                    self.timeout.cancel();
                } else if !collabs.extruders[tool].is_heating() && !collabs.extruders[tool].is_paused()
                {
                    self.mode = Mode::Ready;
                    self.timeout.cancel();
                }
            }
            Mode::WaitOnPlatform => {
                if self.timeout.has_elapsed(collabs.clock) {
                    collabs
                        .interface
                        .error_response(ErrorCode::PlatformHeatingTimeout, false, false);
                    self.mode = Mode::Ready;
                    self.timeout.cancel();
                } else if !collabs.platform.is_heating() {
                    self.mode = Mode::Ready;
                    self.timeout.cancel();
                } else if collabs.platform.has_reached_target() {
                    self.mode = Mode::Ready;
                    self.timeout.cancel();
                }
            }
            Mode::WaitOnButton => {
                if collabs.interface.button_pressed(self.button_ctx.button_mask) {
                    if self.button_ctx.behavior.clear_screen_on_press() {
                        collabs.interface.pop_screen();
                    }
                    collabs.interface.interface_blink(0, 0);
                    collabs
                        .interface
                        .set_board_status(BoardStatus::WaitingForButton, false);
                    collabs.led.set_default_color();
                    self.mode = Mode::Ready;
                    self.timeout.cancel();
                } else if self.timeout.is_active() && self.timeout.has_elapsed(collabs.clock) {
                    if self.button_ctx.behavior.abort_on_timeout() {
                        // Catastrophic abort: a full reset.
                        self.reset();
                        return;
                    }
                    collabs
                        .interface
                        .set_board_status(BoardStatus::WaitingForButton, false);
                    self.mode = Mode::Ready;
                    self.timeout.cancel();
                }
            }
        }
    }

    /// Advances the sleep machine one step. Only ever called from
    /// `run_slice` while `mode == Mode::Ready`; several branches here hand
    /// `mode` off to `Mode::WaitOnPlatform`/`Mode::WaitOnTool` and rely on
    /// `run_slice`'s own gate (`if self.mode != Mode::Ready { return }`) to
    /// keep this function from re-entering until the ordinary mode machine
    /// has driven that wait back to `Ready`. The sleep machine parasitizes
    /// `Ready` rather than running as an independent state machine.
    fn advance_sleep(&mut self, collabs: &mut Collaborators) {
        match self.sleep_state {
            SleepState::None => {}
            SleepState::StartWait => {
                if collabs.planner.queue_empty() {
                    collabs.interface.show_sleep_message(if self.sleep_ctx.cold_pause {
                        SleepMessage::ColdPausePrep
                    } else {
                        SleepMessage::FilamentChangePrep
                    });
                    self.start_sleep_motion(collabs);
                    self.sleep_state = SleepState::Moving;
                }
            }
            SleepState::Moving => {
                if collabs.planner.queue_empty() {
                    collabs.interface.pop_screen();
                    self.sleep_state = SleepState::Active;
                    if self.sleep_type == SleepType::Filament {
                        self.timeout.start(collabs.clock, FILAMENT_INPUT_TIMEOUT_US);
                        collabs.piezo.play_tune(TUNE_FILAMENT_START);
                    }
                    if self.sleep_type == SleepType::Cold {
                        for axis in REDUCED_POT_AXES {
                            collabs.planner.set_axis_pot(axis, POT_VALUE_REDUCED);
                        }
                    }
                }
            }
            SleepState::Active => {
                if self.sleep_type == SleepType::Filament && self.timeout.has_elapsed(collabs.clock) {
                    self.timeout.cancel();
                    self.sleep_type = SleepType::Cold;
                    collabs.interface.pop_screen();
                    collabs
                        .interface
                        .error_response(ErrorCode::TimedOutOfChangeFilament, false, false);
                    for axis in REDUCED_POT_AXES {
                        collabs.planner.set_axis_pot(axis, POT_VALUE_REDUCED);
                    }
                    collabs.extruders[0].set_target(0);
                    collabs.extruders[1].set_target(0);
                    collabs.platform.set_target(0);
                }
            }
            SleepState::MovingWait => {
                if collabs.planner.queue_empty() {
                    self.enter_restart_heating(collabs);
                }
            }
            SleepState::Restart => self.enter_restart_heating(collabs),
            SleepState::HeatingPlatform => {
                self.current_tool_index = 0;
                self.mode = Mode::WaitOnTool;
                self.timeout.start(collabs.clock, RESTART_HEATER_TIMEOUT_US);
                self.sleep_state = SleepState::HeatingExtruderA;
            }
            SleepState::HeatingExtruderA => {
                self.current_tool_index = 1;
                self.mode = Mode::WaitOnTool;
                self.timeout.start(collabs.clock, RESTART_HEATER_TIMEOUT_US);
                self.sleep_state = SleepState::Return;
            }
            SleepState::Return => {
                collabs.interface.stop_progress_bar();
                self.stop_sleep_motion(collabs);
                self.sleep_state = SleepState::Finished;
            }
            SleepState::Finished => {
                if collabs.planner.queue_empty() {
                    collabs.interface.pop_to_onboard_start();
                    self.sleep_type = SleepType::None;
                    self.sleep_state = SleepState::None;
                }
            }
        }
    }

    /// Captures the park position and heater/fan state, retracts A/B, and
    /// queues the two moves to the wait position.
    fn start_sleep_motion(&mut self, collabs: &mut Collaborators) {
        let position = collabs.planner.get_stepper_position();
        self.sleep_ctx.saved_position = position;
        self.sleep_ctx.saved_fan_state = collabs.aux.is_fan_enabled();
        self.sleep_ctx.saved_extruder_targets =
            [collabs.extruders[0].get_set_target(), collabs.extruders[1].get_set_target()];
        self.sleep_ctx.saved_platform_target = collabs.platform.get_set_target();

        let mut retract = position;
        retract.a += (collabs.planner.steps_per_mm(3) * RETRACT_MM) as i32;
        retract.b += (collabs.planner.steps_per_mm(4) * RETRACT_MM) as i32;
        collabs.planner.set_target(retract, AB_RATE);

        if self.sleep_ctx.cold_pause {
            collabs.extruders[0].set_target(0);
            collabs.extruders[1].set_target(0);
            collabs.platform.set_target(0);
        }

        let mut z_pos = retract;
        z_pos.z = collabs.planner.mm_to_steps(WAIT_Z_MM, 2);
        collabs.planner.set_target(z_pos, Z_RATE);

        let mut wait_pos = z_pos;
        wait_pos.x = collabs.planner.mm_to_steps(WAIT_X_MM, 0);
        wait_pos.y = collabs.planner.mm_to_steps(WAIT_Y_MM, 1);
        collabs.planner.set_target(wait_pos, XY_RATE);

        collabs.aux.set_fan(false);
    }

    /// Redefines A/B back to the saved position (the retract is "undone" by
    /// redefinition, not by motion), then physically returns Z and XY.
    fn stop_sleep_motion(&mut self, collabs: &mut Collaborators) {
        let mut z_pos = collabs.planner.get_stepper_position();
        z_pos.a = self.sleep_ctx.saved_position.a;
        z_pos.b = self.sleep_ctx.saved_position.b;
        collabs.planner.define_position(z_pos);

        z_pos.z = self.sleep_ctx.saved_position.z;
        collabs.planner.set_target(z_pos, Z_RATE);
        collabs.planner.set_target(self.sleep_ctx.saved_position, XY_RATE);

        collabs.aux.set_fan(self.sleep_ctx.saved_fan_state);
    }

    /// Shared tail of `MOVING_WAIT`/`RESTART`: restore pot values, show the
    /// restarting message, and hand off to `Mode::WaitOnPlatform`.
    fn enter_restart_heating(&mut self, collabs: &mut Collaborators) {
        if self.sleep_type != SleepType::Filament {
            for axis in RESTART_NORMAL_POT_AXES {
                collabs.planner.set_axis_pot(axis, POT_VALUE_NORMAL);
            }
        }
        if self.sleep_type == SleepType::Cold {
            for axis in RESTART_COLD_ONLY_POT_AXES {
                collabs.planner.set_axis_pot(axis, POT_VALUE_NORMAL);
            }
        }
        collabs.interface.show_sleep_message(SleepMessage::Restarting);
        self.current_tool_index = 0;
        self.mode = Mode::WaitOnPlatform;
        self.timeout.start(collabs.clock, RESTART_HEATER_TIMEOUT_US);
        collabs.interface.start_progress_bar(
            RESTART_PROGRESS_BAR_LINES,
            RESTART_PROGRESS_BAR_START,
            RESTART_PROGRESS_BAR_PERCENT_STEP,
        );
        self.sleep_state = SleepState::HeatingPlatform;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_restores_defaults() {
        let mut core = CommandCore::new();
        core.line_number = 42;
        core.mode = Mode::Moving;
        core.reset();
        assert_eq!(core.line_number(), 0);
        assert_eq!(core.mode(), Mode::Ready);
    }

    // `active_pause`'s idempotency and full state-machine progression are
    // covered by the integration tests in `tests/scenarios.rs`, which have
    // the mock collaborator set this method requires.
}

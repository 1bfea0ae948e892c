//! Trait surfaces for every external collaborator the core talks to.
//!
//! The core never touches hardware directly. A host application implements
//! these traits over its concrete planner, heaters, display, etc. and hands
//! them to [`crate::engine::CommandCore::run_slice`].

use crate::clock::MonotonicClock;
use crate::error::ErrorCode;
use crate::point::CorePoint;

/// The stepper-motion planner.
pub trait Planner {
    fn set_target(&mut self, point: CorePoint, rate: i32);
    fn set_target_new(&mut self, point: CorePoint, us: i32, relative_mask: u8);
    fn set_target_new_ext(
        &mut self,
        point: CorePoint,
        dda: i32,
        relative_mask: u8,
        distance: f32,
        feedrate_mult_64: i16,
    );
    fn define_position(&mut self, point: CorePoint);
    fn define_home(&mut self, point: CorePoint);
    fn start_homing(&mut self, to_max: bool, axis_mask: u8, feedrate: u32);
    fn abort(&mut self);
    fn is_running(&self) -> bool;
    /// True once every queued motion has been physically executed. This is
    /// the planner-queue-empty test behind the pipeline barrier, and the
    /// sleep machine's own "queue drained" check between park/return moves.
    fn queue_empty(&self) -> bool;
    fn get_stepper_position(&self) -> CorePoint;
    fn get_planner_position(&self) -> CorePoint;
    fn change_tool(&mut self, index: u8);
    fn enable_axis(&mut self, axis: usize, enabled: bool);
    fn set_axis_pot(&mut self, axis: usize, value: u8);
    fn set_acceleration(&mut self, enabled: bool);
    fn steps_per_mm(&self, axis: usize) -> f32;
    fn steps_to_mm(&self, steps: i32, axis: usize) -> f32;
    fn mm_to_steps(&self, mm: f32, axis: usize) -> i32;
}

/// One channel of a heater (an extruder, or the build platform).
pub trait Heater {
    fn set_target(&mut self, celsius: u16);
    fn get_set_target(&self) -> u16;
    fn abort(&mut self);
    fn pause(&mut self, paused: bool);
    fn is_heating(&self) -> bool;
    fn is_cooling(&self) -> bool;
    fn is_paused(&self) -> bool;
    fn has_reached_target(&self) -> bool;
}

/// Board status flags toggled on the `Interface`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BoardStatus {
    Preheating,
    WaitingForButton,
}

/// Canned message screens shown while the sleep machine runs. These get
/// their own small enum rather than overloading [`ErrorCode`] with things
/// that aren't error conditions.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SleepMessage {
    /// Shown immediately on `active_pause(true, Cold)`, before the current
    /// move has drained.
    ColdPauseWait,
    /// Shown immediately on `active_pause(true, Filament)`.
    FilamentChangeWait,
    /// Shown once the queue has drained and the park sequence is about to
    /// start, cold-pause variant.
    ColdPausePrep,
    /// Same, filament-change variant.
    FilamentChangePrep,
    /// Shown while the restart sequence reheats and returns to the print.
    Restarting,
}

/// The LCD / button-matrix front panel.
pub trait Interface {
    fn error_message(&mut self, code: ErrorCode);
    /// `reset_request`/`silent` gate informational errors that should not
    /// latch a reset request (`STREAM_VERSION`/`BOT_TYPE` mismatches,
    /// `TIMED_OUT_OF_CHANGE_FILAMENT`).
    fn error_response(&mut self, code: ErrorCode, reset_request: bool, silent: bool);
    fn wait_for_button(&mut self, mask: u8);
    /// True if any button in `mask` has been pressed since the last call
    /// that observed it. Polled once per slice while `Mode::WaitOnButton`
    /// is active.
    fn button_pressed(&self, mask: u8) -> bool;
    fn reset_lcd(&mut self);
    fn push_screen(&mut self);
    fn pop_screen(&mut self);
    fn pop_to_onboard_start(&mut self);
    fn start_progress_bar(&mut self, lines: u8, start: u8, percent_step: u8);
    fn stop_progress_bar(&mut self);
    fn set_build_percentage(&mut self, percent: u8);
    fn interface_blink(&mut self, on_ticks: u8, off_ticks: u8);
    fn set_board_status(&mut self, flag: BoardStatus, on: bool);
    /// Begins (or refreshes) the message screen for a `DISPLAY_MESSAGE`
    /// command. Bytes of the message text are forwarded one at a time as the
    /// core pops them from the ring, never owning a copy of the text itself.
    fn message_set_position(&mut self, xpos: u8, ypos: u8);
    fn message_clear(&mut self);
    fn message_append_byte(&mut self, byte: u8);
    fn message_set_timeout_seconds(&mut self, timeout_seconds: u8);
    fn message_is_current_screen(&self) -> bool;
    /// Pushes a canned sleep/active-pause message screen.
    fn show_sleep_message(&mut self, msg: SleepMessage);
}

/// Piezo buzzer.
pub trait Piezo {
    fn play_tune(&mut self, id: u8);
    fn set_tone(&mut self, freq: u16, ms: u16);
}

/// RGB indicator LED.
pub trait Led {
    fn set_blink(&mut self, rate: u8);
    fn set_custom_color(&mut self, r: u8, g: u8, b: u8);
    fn set_default_color(&mut self);
}

/// The board's fan and valve outputs, toggled by `TOOL_COMMAND` and by the
/// sleep machine's park/return sequence.
pub trait AuxiliaryOutputs {
    fn set_fan(&mut self, enabled: bool);
    fn is_fan_enabled(&self) -> bool;
    fn set_valve(&mut self, enabled: bool);
    /// Marks the build platform as in use (or not), independent of its
    /// heater target. Set unconditionally whenever `SET_PLATFORM_TEMP` is
    /// handled, and cleared when the board has no heated platform at all.
    fn set_platform_in_use(&mut self, in_use: bool);
}

/// Storage-card playback.
pub trait Card {
    fn is_playing(&self) -> bool;
    fn playback_has_next(&self) -> bool;
    fn playback_next(&mut self) -> u8;
    fn get_file_size(&self) -> u32;
    fn finish_playback(&mut self);
}

/// Onboard utility-script playback.
pub trait UtilityScript {
    fn is_playing(&self) -> bool;
    fn playback_has_next(&self) -> bool;
    fn playback_next(&mut self) -> u8;
    fn finish_playback(&mut self);
}

/// Host-side state the core reports into / reads from.
pub trait Host {
    fn pause_build(&mut self, paused: bool);
    /// Drains a build-name byte as it's popped from the ring; called once
    /// per byte of the `BUILD_START_NOTIFICATION` name payload.
    fn handle_build_start_byte(&mut self, byte: u8);
    fn handle_build_stop(&mut self, flags: u8);
    fn get_host_state(&self) -> HostState;
    /// Resets the user-input idle timeout. Called on every successful
    /// packet decode.
    fn reset_user_input_timeout(&mut self);
    /// Cancels a pending heat-hold timeout. Called by
    /// `BUILD_START_NOTIFICATION`.
    fn abort_heat_hold_timeout(&mut self);
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HostState {
    Idle,
    BuildingFromHost,
    BuildingOnboard,
}

/// Persistent settings store.
pub trait Settings {
    /// Reads an axis home position, in millimeters, with interrupts
    /// disabled around the underlying byte-at-a-time read.
    fn read_axis_home_position_mm(&mut self, axis: usize) -> f32;
    /// Writes an axis home position, in millimeters, with interrupts
    /// disabled around the underlying byte-at-a-time write.
    fn write_axis_home_position_mm(&mut self, axis: usize, mm: f32);
    fn factory_reset(&mut self);
    fn is_single_tool(&self) -> bool;
    fn has_heated_platform(&self) -> bool;
}

/// A borrow of every collaborator, bundled for the lifetime of a single
/// `run_slice` call. Plain `&mut dyn Trait` references rather than a
/// generic parameter per collaborator: the core is dispatched through once
/// per slice from a single call site, so there's no benefit to monomorphizing
/// it per concrete collaborator set, and `dyn` keeps call sites (and test
/// mocks) simple.
pub struct Collaborators<'a> {
    pub planner: &'a mut dyn Planner,
    /// Indexed by tool number: `extruders[0]` is tool 0, `extruders[1]` is
    /// tool 1. A single-tool board still implements both; `Settings::
    /// is_single_tool` is what rejects tool 1 commands.
    pub extruders: [&'a mut dyn Heater; 2],
    pub platform: &'a mut dyn Heater,
    pub interface: &'a mut dyn Interface,
    pub piezo: &'a mut dyn Piezo,
    pub led: &'a mut dyn Led,
    pub aux: &'a mut dyn AuxiliaryOutputs,
    pub card: &'a mut dyn Card,
    pub utility: &'a mut dyn UtilityScript,
    pub host: &'a mut dyn Host,
    pub settings: &'a mut dyn Settings,
    pub clock: &'a dyn MonotonicClock,
}

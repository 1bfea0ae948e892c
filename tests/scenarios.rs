//! End-to-end interpreter scenarios, driven through hand-written mock
//! collaborators rather than real hardware.

use mightyboard_command_core::priority::{Isr, Thread};
use mightyboard_command_core::*;

struct FakeClock {
    now: std::cell::Cell<u32>,
}

impl FakeClock {
    fn new() -> Self {
        FakeClock {
            now: std::cell::Cell::new(0),
        }
    }

    fn advance(&self, us: u32) {
        self.now.set(self.now.get().wrapping_add(us));
    }
}

impl MonotonicClock for FakeClock {
    fn now_us(&self) -> u32 {
        self.now.get()
    }
}

#[derive(Default)]
struct MockPlanner {
    queue_empty: bool,
    is_running: bool,
    stepper_position: CorePoint,
    planner_position: CorePoint,
    set_target_calls: Vec<(CorePoint, i32)>,
    defined_positions: Vec<CorePoint>,
    pot_calls: Vec<(usize, u8)>,
    aborted: bool,
    changed_tool: Option<u8>,
}

impl Planner for MockPlanner {
    fn set_target(&mut self, point: CorePoint, rate: i32) {
        self.stepper_position = point;
        self.set_target_calls.push((point, rate));
    }
    fn set_target_new(&mut self, point: CorePoint, _us: i32, _relative_mask: u8) {
        self.stepper_position = point;
    }
    fn set_target_new_ext(
        &mut self,
        point: CorePoint,
        _dda: i32,
        _relative_mask: u8,
        _distance: f32,
        _feedrate_mult_64: i16,
    ) {
        self.stepper_position = point;
    }
    fn define_position(&mut self, point: CorePoint) {
        self.stepper_position = point;
        self.defined_positions.push(point);
    }
    fn define_home(&mut self, _point: CorePoint) {}
    fn start_homing(&mut self, _to_max: bool, _axis_mask: u8, _feedrate: u32) {
        self.is_running = true;
    }
    fn abort(&mut self) {
        self.aborted = true;
        self.is_running = false;
    }
    fn is_running(&self) -> bool {
        self.is_running
    }
    fn queue_empty(&self) -> bool {
        self.queue_empty
    }
    fn get_stepper_position(&self) -> CorePoint {
        self.stepper_position
    }
    fn get_planner_position(&self) -> CorePoint {
        self.planner_position
    }
    fn change_tool(&mut self, index: u8) {
        self.changed_tool = Some(index);
    }
    fn enable_axis(&mut self, _axis: usize, _enabled: bool) {}
    fn set_axis_pot(&mut self, axis: usize, value: u8) {
        self.pot_calls.push((axis, value));
    }
    fn set_acceleration(&mut self, _enabled: bool) {}
    fn steps_per_mm(&self, _axis: usize) -> f32 {
        100.0
    }
    fn steps_to_mm(&self, steps: i32, _axis: usize) -> f32 {
        steps as f32 / 100.0
    }
    fn mm_to_steps(&self, mm: f32, _axis: usize) -> i32 {
        (mm * 100.0).round() as i32
    }
}

#[derive(Default)]
struct MockHeater {
    target: u16,
    is_heating: bool,
    is_cooling: bool,
    is_paused: bool,
    has_reached_target: bool,
    abort_calls: u32,
}

impl Heater for MockHeater {
    fn set_target(&mut self, celsius: u16) {
        self.target = celsius;
    }
    fn get_set_target(&self) -> u16 {
        self.target
    }
    fn abort(&mut self) {
        self.abort_calls += 1;
        self.target = 0;
    }
    fn pause(&mut self, paused: bool) {
        self.is_paused = paused;
    }
    fn is_heating(&self) -> bool {
        self.is_heating
    }
    fn is_cooling(&self) -> bool {
        self.is_cooling
    }
    fn is_paused(&self) -> bool {
        self.is_paused
    }
    fn has_reached_target(&self) -> bool {
        self.has_reached_target
    }
}

#[derive(Default)]
struct MockInterface {
    error_messages: Vec<ErrorCode>,
    error_responses: Vec<(ErrorCode, bool, bool)>,
    sleep_messages: Vec<SleepMessage>,
    reset_lcd_calls: u32,
    progress_bars: Vec<(u8, u8, u8)>,
    stop_progress_bar_calls: u32,
    pop_screen_calls: u32,
    pop_to_onboard_start_calls: u32,
    board_status: Vec<(BoardStatus, bool)>,
    button_pressed_flag: bool,
}

impl Interface for MockInterface {
    fn error_message(&mut self, code: ErrorCode) {
        self.error_messages.push(code);
    }
    fn error_response(&mut self, code: ErrorCode, reset_request: bool, silent: bool) {
        self.error_responses.push((code, reset_request, silent));
    }
    fn wait_for_button(&mut self, _mask: u8) {}
    fn button_pressed(&self, _mask: u8) -> bool {
        self.button_pressed_flag
    }
    fn reset_lcd(&mut self) {
        self.reset_lcd_calls += 1;
    }
    fn push_screen(&mut self) {}
    fn pop_screen(&mut self) {
        self.pop_screen_calls += 1;
    }
    fn pop_to_onboard_start(&mut self) {
        self.pop_to_onboard_start_calls += 1;
    }
    fn start_progress_bar(&mut self, lines: u8, start: u8, percent_step: u8) {
        self.progress_bars.push((lines, start, percent_step));
    }
    fn stop_progress_bar(&mut self) {
        self.stop_progress_bar_calls += 1;
    }
    fn set_build_percentage(&mut self, _percent: u8) {}
    fn interface_blink(&mut self, _on_ticks: u8, _off_ticks: u8) {}
    fn set_board_status(&mut self, flag: BoardStatus, on: bool) {
        self.board_status.push((flag, on));
    }
    fn message_set_position(&mut self, _xpos: u8, _ypos: u8) {}
    fn message_clear(&mut self) {}
    fn message_append_byte(&mut self, _byte: u8) {}
    fn message_set_timeout_seconds(&mut self, _timeout_seconds: u8) {}
    fn message_is_current_screen(&self) -> bool {
        false
    }
    fn show_sleep_message(&mut self, msg: SleepMessage) {
        self.sleep_messages.push(msg);
    }
}

#[derive(Default)]
struct MockPiezo {
    tunes_played: Vec<u8>,
}

impl Piezo for MockPiezo {
    fn play_tune(&mut self, id: u8) {
        self.tunes_played.push(id);
    }
    fn set_tone(&mut self, _freq: u16, _ms: u16) {}
}

#[derive(Default)]
struct MockLed {
    default_calls: u32,
}

impl Led for MockLed {
    fn set_blink(&mut self, _rate: u8) {}
    fn set_custom_color(&mut self, _r: u8, _g: u8, _b: u8) {}
    fn set_default_color(&mut self) {
        self.default_calls += 1;
    }
}

#[derive(Default)]
struct MockAux {
    fan_enabled: bool,
    valve_enabled: bool,
    fan_calls: Vec<bool>,
    valve_calls: Vec<bool>,
    platform_in_use_calls: Vec<bool>,
}

impl AuxiliaryOutputs for MockAux {
    fn set_fan(&mut self, enabled: bool) {
        self.fan_enabled = enabled;
        self.fan_calls.push(enabled);
    }
    fn is_fan_enabled(&self) -> bool {
        self.fan_enabled
    }
    fn set_valve(&mut self, enabled: bool) {
        self.valve_enabled = enabled;
        self.valve_calls.push(enabled);
    }
    fn set_platform_in_use(&mut self, in_use: bool) {
        self.platform_in_use_calls.push(in_use);
    }
}

#[derive(Default)]
struct MockCard {
    is_playing: bool,
    has_next: bool,
    file_size: u32,
    finish_calls: u32,
}

impl Card for MockCard {
    fn is_playing(&self) -> bool {
        self.is_playing
    }
    fn playback_has_next(&self) -> bool {
        self.has_next
    }
    fn playback_next(&mut self) -> u8 {
        0
    }
    fn get_file_size(&self) -> u32 {
        self.file_size
    }
    fn finish_playback(&mut self) {
        self.finish_calls += 1;
        self.is_playing = false;
    }
}

#[derive(Default)]
struct MockUtility {
    is_playing: bool,
    has_next: bool,
}

impl UtilityScript for MockUtility {
    fn is_playing(&self) -> bool {
        self.is_playing
    }
    fn playback_has_next(&self) -> bool {
        self.has_next
    }
    fn playback_next(&mut self) -> u8 {
        0
    }
    fn finish_playback(&mut self) {
        self.is_playing = false;
    }
}

#[derive(Default)]
struct MockHost {
    pause_calls: Vec<bool>,
    build_start_bytes: Vec<u8>,
    build_stop_flags: Vec<u8>,
    reset_timeout_calls: u32,
    abort_heat_hold_calls: u32,
}

impl Host for MockHost {
    fn pause_build(&mut self, paused: bool) {
        self.pause_calls.push(paused);
    }
    fn handle_build_start_byte(&mut self, byte: u8) {
        self.build_start_bytes.push(byte);
    }
    fn handle_build_stop(&mut self, flags: u8) {
        self.build_stop_flags.push(flags);
    }
    fn get_host_state(&self) -> HostState {
        HostState::Idle
    }
    fn reset_user_input_timeout(&mut self) {
        self.reset_timeout_calls += 1;
    }
    fn abort_heat_hold_timeout(&mut self) {
        self.abort_heat_hold_calls += 1;
    }
}

#[derive(Default)]
struct MockSettings {
    home_positions_mm: [f32; 5],
    single_tool: bool,
    heated_platform: bool,
}

impl Settings for MockSettings {
    fn read_axis_home_position_mm(&mut self, axis: usize) -> f32 {
        self.home_positions_mm[axis]
    }
    fn write_axis_home_position_mm(&mut self, axis: usize, mm: f32) {
        self.home_positions_mm[axis] = mm;
    }
    fn factory_reset(&mut self) {
        *self = MockSettings::default();
    }
    fn is_single_tool(&self) -> bool {
        self.single_tool
    }
    fn has_heated_platform(&self) -> bool {
        self.heated_platform
    }
}

struct Mocks {
    planner: MockPlanner,
    extruder0: MockHeater,
    extruder1: MockHeater,
    platform: MockHeater,
    interface: MockInterface,
    piezo: MockPiezo,
    led: MockLed,
    aux: MockAux,
    card: MockCard,
    utility: MockUtility,
    host: MockHost,
    settings: MockSettings,
    clock: FakeClock,
}

impl Default for Mocks {
    fn default() -> Self {
        Mocks {
            planner: MockPlanner {
                queue_empty: true,
                ..Default::default()
            },
            extruder0: MockHeater::default(),
            extruder1: MockHeater::default(),
            platform: MockHeater::default(),
            interface: MockInterface::default(),
            piezo: MockPiezo::default(),
            led: MockLed::default(),
            aux: MockAux::default(),
            card: MockCard::default(),
            utility: MockUtility::default(),
            host: MockHost::default(),
            settings: MockSettings::default(),
            clock: FakeClock::new(),
        }
    }
}

fn collabs(m: &mut Mocks) -> Collaborators<'_> {
    Collaborators {
        planner: &mut m.planner,
        extruders: [&mut m.extruder0, &mut m.extruder1],
        platform: &mut m.platform,
        interface: &mut m.interface,
        piezo: &mut m.piezo,
        led: &mut m.led,
        aux: &mut m.aux,
        card: &mut m.card,
        utility: &mut m.utility,
        host: &mut m.host,
        settings: &mut m.settings,
        clock: &m.clock,
    }
}

fn push_bytes(core: &mut CommandCore, bytes: &[u8]) {
    let isr = unsafe { Isr::new() };
    for &b in bytes {
        core.push_from_host_link(b, &isr).unwrap();
    }
}

#[test]
fn delay_command_sets_mode_and_advances_on_timeout() {
    let mut m = Mocks::default();
    let mut core = CommandCore::new();
    let thread = unsafe { Thread::new() };

    push_bytes(&mut core, &[0x89, 0xE8, 0x03, 0x00, 0x00]);
    core.run_slice(&mut collabs(&mut m), thread);

    assert_eq!(core.mode(), Mode::Delay);
    assert_eq!(core.line_number(), 1);

    m.clock.advance(1_000_001);
    core.run_slice(&mut collabs(&mut m), thread);
    assert_eq!(core.mode(), Mode::Ready);
}

#[test]
fn non_pipeline_safe_opcode_waits_for_planner_queue_to_drain() {
    let mut m = Mocks::default();
    m.planner.queue_empty = false;
    let mut core = CommandCore::new();
    let thread = unsafe { Thread::new() };

    // SET_POT_VALUE, axis=2, value=64 (not pipeline-safe).
    push_bytes(&mut core, &[0x87, 2, 64]);
    core.run_slice(&mut collabs(&mut m), thread);
    assert!(m.planner.pot_calls.is_empty(), "must wait for queue to drain");

    m.planner.queue_empty = true;
    core.run_slice(&mut collabs(&mut m), thread);
    assert_eq!(m.planner.pot_calls, vec![(2, 64)]);
}

#[test]
fn cold_active_pause_runs_full_park_and_restart_cycle() {
    let mut m = Mocks::default();
    m.planner.stepper_position = CorePoint::new(100, 200, 300, 400, 500);
    m.extruder0.target = 180;
    m.extruder1.target = 0;
    m.platform.target = 110;
    m.aux.fan_enabled = true;
    // Keep the platform "not heating" across sleep_reheat/restart so the
    // WAIT_ON_PLATFORM/WAIT_ON_TOOL resolution below takes the simple
    // "stopped heating" branch rather than the re-pause or reached-target one.
    m.platform.is_heating = false;
    m.extruder0.is_heating = false;
    m.extruder1.is_heating = false;

    let mut core = CommandCore::new();
    let thread = unsafe { Thread::new() };

    core.active_pause(true, SleepType::Cold, &mut collabs(&mut m));
    assert!(core.is_active_paused());
    assert_eq!(m.interface.sleep_messages, vec![SleepMessage::ColdPauseWait]);
    assert_eq!(core.sleep_state(), SleepState::StartWait);

    // START_WAIT -> MOVING: queue is idle, so the park sequence is queued.
    core.run_slice(&mut collabs(&mut m), thread);
    assert_eq!(core.sleep_state(), SleepState::Moving);
    assert_eq!(m.extruder0.target, 0);
    assert_eq!(m.extruder1.target, 0);
    assert_eq!(m.platform.target, 0);
    assert_eq!(m.aux.fan_calls.last(), Some(&false));
    assert_eq!(m.planner.set_target_calls.len(), 3);
    let (retract, ab_rate) = m.planner.set_target_calls[0];
    assert_eq!(ab_rate, 520);
    assert_eq!(retract.a, 500); // 400 + steps_per_mm(3)*RETRACT_MM
    assert_eq!(retract.b, 600); // 500 + steps_per_mm(4)*RETRACT_MM
    let (z_move, z_rate) = m.planner.set_target_calls[1];
    assert_eq!(z_rate, 140);
    assert_eq!(z_move.z, 15000); // WAIT_Z_MM * 100
    let (xy_move, xy_rate) = m.planner.set_target_calls[2];
    assert_eq!(xy_rate, 130);
    assert_eq!(xy_move.x, -11050); // WAIT_X_MM * 100
    assert_eq!(xy_move.y, -7400); // WAIT_Y_MM * 100

    // MOVING -> ACTIVE: pop the prep screen, reduce pot values for cold pause.
    core.run_slice(&mut collabs(&mut m), thread);
    assert_eq!(core.sleep_state(), SleepState::Active);
    assert_eq!(m.interface.pop_screen_calls, 1);
    assert_eq!(m.planner.pot_calls, vec![(0, 20), (1, 20), (3, 20), (4, 20)]);

    // Caller ends the pause: heater targets restored, handed to RESTART.
    core.active_pause(false, SleepType::None, &mut collabs(&mut m));
    assert_eq!(core.sleep_state(), SleepState::Restart);
    assert_eq!(m.extruder0.target, 180);
    assert_eq!(m.extruder1.target, 0);
    assert_eq!(m.platform.target, 110);

    // RESTART: pot values restored, progress bar shown, handed off to the
    // outer WAIT_ON_PLATFORM mode.
    core.run_slice(&mut collabs(&mut m), thread);
    assert_eq!(core.mode(), Mode::WaitOnPlatform);
    assert_eq!(core.sleep_state(), SleepState::HeatingPlatform);
    assert_eq!(
        m.planner.pot_calls[4..],
        [(0, 127), (1, 127), (3, 127), (4, 127)]
    );
    assert_eq!(m.interface.progress_bars, vec![(3, 0, 20)]);
    assert_eq!(
        m.interface.sleep_messages.last(),
        Some(&SleepMessage::Restarting)
    );

    // Platform stopped heating: WAIT_ON_PLATFORM -> READY, then handed to
    // WAIT_ON_TOOL for tool 0.
    core.run_slice(&mut collabs(&mut m), thread);
    assert_eq!(core.mode(), Mode::WaitOnTool);
    assert_eq!(core.current_tool_index(), 0);
    assert_eq!(core.sleep_state(), SleepState::HeatingExtruderA);

    // Tool 0 stopped heating: WAIT_ON_TOOL -> READY, then WAIT_ON_TOOL for
    // tool 1.
    core.run_slice(&mut collabs(&mut m), thread);
    assert_eq!(core.mode(), Mode::WaitOnTool);
    assert_eq!(core.current_tool_index(), 1);
    assert_eq!(core.sleep_state(), SleepState::Return);

    // Tool 1 stopped heating: WAIT_ON_TOOL -> READY, then RETURN undoes the
    // park sequence.
    core.run_slice(&mut collabs(&mut m), thread);
    assert_eq!(core.mode(), Mode::Ready);
    assert_eq!(core.sleep_state(), SleepState::Finished);
    assert_eq!(m.interface.stop_progress_bar_calls, 1);
    assert_eq!(m.aux.fan_calls.last(), Some(&true));

    // FINISHED -> NONE: queue is idle, so the pause fully clears.
    core.run_slice(&mut collabs(&mut m), thread);
    assert!(!core.is_active_paused());
    assert_eq!(core.sleep_state(), SleepState::None);
    assert_eq!(m.interface.pop_to_onboard_start_calls, 1);

    // The final planner position matches the position captured at pause
    // start (A/B undone by redefinition, not motion).
    let final_target = m.planner.set_target_calls.last().unwrap().0;
    assert_eq!(final_target, CorePoint::new(100, 200, 300, 400, 500));
}

#[test]
fn staticfail_watchdog_trips_after_six_short_reads() {
    let mut m = Mocks::default();
    m.card.is_playing = true;
    m.card.has_next = false;
    m.card.file_size = 100;
    m.planner.planner_position = CorePoint::new(10, 20, 30, 40, 50);

    let mut core = CommandCore::new();
    let thread = unsafe { Thread::new() };

    // First slice just switches the active source to card playback.
    core.run_slice(&mut collabs(&mut m), thread);
    // Six further consecutive short-read observations trip the watchdog.
    for _ in 0..6 {
        core.run_slice(&mut collabs(&mut m), thread);
    }

    assert_eq!(m.interface.reset_lcd_calls, 1);
    assert_eq!(
        m.interface.error_responses,
        vec![(ErrorCode::StaticFail, false, false)]
    );
    assert!(m.planner.aborted);
    assert_eq!(m.extruder0.target, 0);
    assert_eq!(m.extruder1.target, 0);
    assert_eq!(m.platform.target, 0);
    let (retract_target, rate) = *m.planner.set_target_calls.last().unwrap();
    assert_eq!(rate, 150);
    assert_eq!(retract_target, CorePoint::new(10, 20, 15000, 40, 50));
    assert_eq!(m.card.finish_calls, 1);
}

#[test]
fn single_tool_board_rejects_tool_one_set_temp() {
    let mut m = Mocks::default();
    m.settings.single_tool = true;
    m.platform.is_heating = false;

    let mut core = CommandCore::new();
    let thread = unsafe { Thread::new() };

    // TOOL_COMMAND{tool=1, sub=SET_TEMP, payload_len=2, temp=230}
    push_bytes(&mut core, &[0x91, 1, 0x00, 2, 0xE6, 0x00]);
    core.run_slice(&mut collabs(&mut m), thread);

    assert_eq!(m.interface.error_messages, vec![ErrorCode::InvalidTool]);
    assert_eq!(m.extruder1.target, 0);
}

#[test]
fn set_platform_temp_marks_platform_in_use() {
    let mut m = Mocks::default();
    m.settings.heated_platform = true;

    let mut core = CommandCore::new();
    let thread = unsafe { Thread::new() };

    // TOOL_COMMAND{tool=0, sub=SET_PLATFORM_TEMP, payload_len=2, temp=110}
    push_bytes(&mut core, &[0x91, 0, 0x01, 2, 110, 0]);
    core.run_slice(&mut collabs(&mut m), thread);

    assert_eq!(m.aux.platform_in_use_calls, vec![true]);
    assert_eq!(m.platform.target, 110);
}

#[test]
fn set_platform_temp_clears_platform_in_use_without_heated_platform() {
    let mut m = Mocks::default();
    m.settings.heated_platform = false;

    let mut core = CommandCore::new();
    let thread = unsafe { Thread::new() };

    push_bytes(&mut core, &[0x91, 0, 0x01, 2, 110, 0]);
    core.run_slice(&mut collabs(&mut m), thread);

    assert_eq!(m.aux.platform_in_use_calls, vec![true, false]);
    assert_eq!(m.interface.error_messages, vec![ErrorCode::InvalidPlatform]);
    assert_eq!(m.platform.target, 0);
}

#[test]
fn display_message_minimal_packet_dispatches_with_empty_text() {
    let mut m = Mocks::default();
    let mut core = CommandCore::new();
    let thread = unsafe { Thread::new() };

    // DISPLAY_MESSAGE: options=PUSH_NOW(bit1), xpos=0, ypos=0, timeout=0,
    // immediately followed by the NUL terminator -- the minimal 6-byte
    // packet spec.md's table allows (">=6").
    push_bytes(&mut core, &[0x8B, 0b10, 0, 0, 0, 0x00]);
    core.run_slice(&mut collabs(&mut m), thread);

    assert_eq!(core.line_number(), 1, "packet must dispatch, not stall");
}

#[test]
fn filament_pause_upgrades_to_cold_on_input_timeout() {
    let mut m = Mocks::default();
    m.extruder0.target = 180;
    m.extruder1.target = 0;
    m.platform.target = 110;

    let mut core = CommandCore::new();
    let thread = unsafe { Thread::new() };

    core.active_pause(true, SleepType::Filament, &mut collabs(&mut m));
    assert_eq!(
        m.interface.sleep_messages,
        vec![SleepMessage::FilamentChangeWait]
    );

    core.run_slice(&mut collabs(&mut m), thread); // START_WAIT -> MOVING
    core.run_slice(&mut collabs(&mut m), thread); // MOVING -> ACTIVE
    assert_eq!(core.sleep_state(), SleepState::Active);
    assert_eq!(m.piezo.tunes_played, vec![1]); // TUNE_FILAMENT_START

    m.clock.advance(5 * 60 * 1_000_000 + 1);
    core.run_slice(&mut collabs(&mut m), thread);

    assert_eq!(
        m.interface.error_responses,
        vec![(ErrorCode::TimedOutOfChangeFilament, false, false)]
    );
    assert!(m
        .planner
        .pot_calls
        .iter()
        .any(|&(axis, value)| axis == 0 && value == 20));
    assert_eq!(m.extruder0.target, 0);
    assert_eq!(m.extruder1.target, 0);
    assert_eq!(m.platform.target, 0);
}

#[test]
fn unknown_opcode_is_dropped_and_does_not_stall_the_dispatcher() {
    let mut m = Mocks::default();
    let mut core = CommandCore::new();
    let thread = unsafe { Thread::new() };

    // 0xFF isn't an assigned opcode, followed by a well-formed DELAY packet.
    push_bytes(&mut core, &[0xFF, 0x89, 0xE8, 0x03, 0x00, 0x00]);

    // First slice: the unknown byte is popped and dropped; nothing dispatches.
    core.run_slice(&mut collabs(&mut m), thread);
    assert_eq!(core.mode(), Mode::Ready);
    assert_eq!(core.line_number(), 0);

    // Second slice: the DELAY packet behind it dispatches normally.
    core.run_slice(&mut collabs(&mut m), thread);
    assert_eq!(core.mode(), Mode::Delay);
    assert_eq!(core.line_number(), 1);
}

#[test]
fn queue_point_ext_sets_moving_and_forwards_target_to_planner() {
    let mut m = Mocks::default();
    let mut core = CommandCore::new();
    let thread = unsafe { Thread::new() };

    // QUEUE_POINT_EXT: x=10, y=20, z=30, a=40, b=50, dda=1000.
    let mut bytes = vec![0x80];
    for v in [10i32, 20, 30, 40, 50, 1000] {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    push_bytes(&mut core, &bytes);

    core.run_slice(&mut collabs(&mut m), thread);

    assert_eq!(core.mode(), Mode::Moving);
    assert_eq!(core.line_number(), 1);
    assert_eq!(
        m.planner.set_target_calls,
        vec![(CorePoint::new(10, 20, 30, 40, 50), 1000)]
    );
}

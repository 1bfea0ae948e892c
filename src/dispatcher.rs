//! Packet decode and per-opcode dispatch.
//!
//! Nothing here ever pops a field before confirming the whole packet is
//! buffered: decoding never commits a partial packet. Variable-length
//! packets (`DisplayMessage`, `ToolCommand`, `BuildStartNotification`'s name
//! payload) peek ahead for their true length before popping anything.

use crate::collaborators::{
    AuxiliaryOutputs, BoardStatus, Collaborators, Heater, Host, Interface, Led, Piezo, Planner,
    Settings,
};
use crate::engine::CommandCore;
use crate::error::ErrorCode;
use crate::mode::{ButtonTimeoutBehavior, ButtonWaitContext, Mode};
use crate::opcode::{Opcode, ToolSubCommand};
use crate::point::{CorePoint, STEPPER_COUNT};
use crate::priority::Thread;
use crate::MAX_LINE_COUNT;

/// Expected stream protocol version, encoded as `major * 100 + minor`. The
/// concrete value lives in a board-config header that wasn't recoverable;
/// kept as a named constant so the mismatch check has something real to
/// compare against (see DESIGN.md).
pub const EXPECTED_STREAM_VERSION: u16 = 200;

/// Expected `STREAM_VERSION` bot-type ID, `0xD314` for the Replicator board
/// (see DESIGN.md).
pub const EXPECTED_BOT_TYPE: u16 = 0xD314;

/// Fixed header length of `DISPLAY_MESSAGE`, in bytes: opcode + options +
/// xpos + ypos + timeout_seconds. Message text starts here.
const DISPLAY_MESSAGE_HEADER_LEN: usize = 5;

pub(crate) enum DispatchOutcome {
    Dispatched,
    WaitingForPipelineBarrier,
    WaitingForMorePacketBytes,
    EmptyBuffer,
    UnknownOpcodeSkipped,
}

/// Scans forward from `start` (relative to the head of the ring) for a NUL
/// terminator, without popping anything. Returns the offset of the
/// terminator if one is already buffered.
fn find_nul_offset(core: &CommandCore, start: usize, thread: &Thread) -> Option<usize> {
    let len = core.buffer.length();
    let mut i = start;
    while i < len {
        if core.buffer.peek(i, thread) == 0 {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn bump_line_number(core: &mut CommandCore) {
    core.line_number += 1;
    if core.line_number > MAX_LINE_COUNT {
        core.line_number = MAX_LINE_COUNT + 1;
    }
}

pub(crate) fn try_dispatch_one(
    core: &mut CommandCore,
    collabs: &mut Collaborators,
    thread: &Thread,
) -> DispatchOutcome {
    if core.buffer.length() == 0 {
        return DispatchOutcome::EmptyBuffer;
    }

    let opcode_byte = core.buffer.peek(0, thread);
    let opcode = match Opcode::from_byte(opcode_byte) {
        Some(op) => op,
        None => {
            core.buffer.pop_u8(thread);
            crate::util::log::debug!("dropping unknown opcode byte {:#x}", opcode_byte);
            return DispatchOutcome::UnknownOpcodeSkipped;
        }
    };

    if !opcode.is_pipeline_safe() && !collabs.planner.queue_empty() {
        return DispatchOutcome::WaitingForPipelineBarrier;
    }

    let required = match opcode {
        Opcode::DisplayMessage => {
            // Fixed header is opcode+options+xpos+ypos+timeout_seconds = 5
            // bytes; text starts there. `min_packet_size()` reports 6 (the
            // header plus the minimum 1-byte terminator), which is one past
            // where the scan must start.
            match find_nul_offset(core, DISPLAY_MESSAGE_HEADER_LEN, thread) {
                Some(nul_offset) => nul_offset + 1,
                None => return DispatchOutcome::WaitingForMorePacketBytes,
            }
        }
        Opcode::ToolCommand => {
            if core.buffer.length() < opcode.min_packet_size() {
                return DispatchOutcome::WaitingForMorePacketBytes;
            }
            let payload_length = core.buffer.peek(3, thread) as usize;
            4 + payload_length
        }
        Opcode::BuildStartNotification => {
            match find_nul_offset(core, opcode.min_packet_size(), thread) {
                Some(nul_offset) => nul_offset + 1,
                None => return DispatchOutcome::WaitingForMorePacketBytes,
            }
        }
        _ => opcode.min_packet_size(),
    };

    if core.buffer.length() < required {
        return DispatchOutcome::WaitingForMorePacketBytes;
    }

    dispatch(core, collabs, opcode, thread);
    DispatchOutcome::Dispatched
}

fn pop_point(core: &mut CommandCore, thread: &Thread) -> CorePoint {
    let x = core.buffer.pop_i32(thread);
    let y = core.buffer.pop_i32(thread);
    let z = core.buffer.pop_i32(thread);
    let a = core.buffer.pop_i32(thread);
    let b = core.buffer.pop_i32(thread);
    CorePoint::new(x, y, z, a, b)
}

fn dispatch(
    core: &mut CommandCore,
    collabs: &mut Collaborators,
    opcode: Opcode,
    thread: &Thread,
) {
    core.buffer.pop_u8(thread); // opcode byte

    match opcode {
        Opcode::QueuePointExt => {
            core.mode = Mode::Moving;
            let point = pop_point(core, thread);
            let dda = core.buffer.pop_i32(thread);
            bump_line_number(core);
            collabs.planner.set_target(point, dda);
        }
        Opcode::QueuePointNew => {
            core.mode = Mode::Moving;
            let point = pop_point(core, thread);
            let us = core.buffer.pop_i32(thread);
            let relative = core.buffer.pop_u8(thread);
            bump_line_number(core);
            collabs.planner.set_target_new(point, us, relative);
        }
        Opcode::QueuePointNewExt => {
            core.mode = Mode::Moving;
            let point = pop_point(core, thread);
            let dda = core.buffer.pop_i32(thread);
            let relative = core.buffer.pop_u8(thread);
            let distance = core.buffer.pop_f32(thread);
            let feedrate_mult_64 = core.buffer.pop_i16(thread);
            bump_line_number(core);
            collabs
                .planner
                .set_target_new_ext(point, dda, relative, distance, feedrate_mult_64);
        }
        Opcode::ChangeTool => {
            let tool = core.buffer.pop_u8(thread);
            bump_line_number(core);
            core.current_tool_index = tool;
            collabs.planner.change_tool(tool);
        }
        Opcode::EnableAxes => {
            let bits = core.buffer.pop_u8(thread);
            bump_line_number(core);
            if collabs.planner.queue_empty() {
                let enable = bits & 0x80 != 0;
                for axis in 0..STEPPER_COUNT {
                    if bits & (1 << axis) != 0 {
                        collabs.planner.enable_axis(axis, enable);
                    }
                }
            }
        }
        Opcode::SetPositionExt => {
            let point = pop_point(core, thread);
            bump_line_number(core);
            collabs.planner.define_position(point);
        }
        Opcode::Delay => {
            let ms = core.buffer.pop_i32(thread);
            bump_line_number(core);
            core.mode = Mode::Delay;
            core.timeout.start(collabs.clock, (ms as u32).saturating_mul(1000));
        }
        Opcode::PauseForButton => {
            let mask = core.buffer.pop_u8(thread);
            let timeout_s = core.buffer.pop_i16(thread) as u16;
            let behavior = core.buffer.pop_u8(thread);
            bump_line_number(core);
            if timeout_s != 0 {
                core.timeout
                    .start(collabs.clock, (timeout_s as u32).saturating_mul(1_000_000));
            } else {
                core.timeout.cancel();
            }
            core.button_ctx = ButtonWaitContext {
                button_mask: mask,
                behavior: ButtonTimeoutBehavior(behavior),
            };
            collabs.interface.interface_blink(25, 15);
            collabs.interface.wait_for_button(mask);
            collabs
                .interface
                .set_board_status(BoardStatus::WaitingForButton, true);
            core.mode = Mode::WaitOnButton;
        }
        Opcode::DisplayMessage => dispatch_display_message(core, collabs, thread),
        Opcode::FindAxesMin | Opcode::FindAxesMax => {
            let flags = core.buffer.pop_u8(thread);
            let feedrate = core.buffer.pop_i32(thread) as u32;
            let timeout_s = core.buffer.pop_i16(thread) as u16;
            bump_line_number(core);
            core.mode = Mode::Homing;
            core.timeout
                .start(collabs.clock, (timeout_s as u32).saturating_mul(1_000_000));
            collabs
                .planner
                .start_homing(opcode == Opcode::FindAxesMax, flags, feedrate);
        }
        Opcode::WaitForTool | Opcode::WaitForPlatform => {
            let tool_index = core.buffer.pop_u8(thread);
            let _ping_delay = core.buffer.pop_i16(thread);
            let timeout_s = core.buffer.pop_i16(thread) as u16;
            bump_line_number(core);
            core.current_tool_index = tool_index;
            core.mode = if opcode == Opcode::WaitForTool {
                Mode::WaitOnTool
            } else {
                Mode::WaitOnPlatform
            };
            core.timeout
                .start(collabs.clock, (timeout_s as u32).saturating_mul(1_000_000));
        }
        Opcode::StoreHomePosition => {
            let mask = core.buffer.pop_u8(thread);
            bump_line_number(core);
            let position = collabs.planner.get_stepper_position();
            for axis in 0..STEPPER_COUNT {
                if mask & (1 << axis) != 0 {
                    let mm = collabs.planner.steps_to_mm(position.axis(axis), axis);
                    collabs.settings.write_axis_home_position_mm(axis, mm);
                }
            }
        }
        Opcode::RecallHomePosition => {
            let mask = core.buffer.pop_u8(thread);
            bump_line_number(core);
            let mut new_point = collabs.planner.get_stepper_position();
            for axis in 0..STEPPER_COUNT {
                if mask & (1 << axis) != 0 {
                    let mm = collabs.settings.read_axis_home_position_mm(axis);
                    new_point.set_axis(axis, collabs.planner.mm_to_steps(mm, axis));
                }
            }
            collabs.planner.define_home(new_point);
        }
        Opcode::SetPotValue => {
            let axis = core.buffer.pop_u8(thread);
            let value = core.buffer.pop_u8(thread);
            bump_line_number(core);
            collabs.planner.set_axis_pot(axis as usize, value);
        }
        Opcode::SetRgbLed => {
            let red = core.buffer.pop_u8(thread);
            let green = core.buffer.pop_u8(thread);
            let blue = core.buffer.pop_u8(thread);
            let blink_rate = core.buffer.pop_u8(thread);
            core.buffer.pop_u8(thread); // reserved
            bump_line_number(core);
            collabs.led.set_blink(blink_rate);
            collabs.led.set_custom_color(red, green, blue);
        }
        Opcode::SetBeep => {
            let freq = core.buffer.pop_i16(thread) as u16;
            let length_ms = core.buffer.pop_i16(thread) as u16;
            core.buffer.pop_u8(thread); // reserved
            bump_line_number(core);
            collabs.piezo.set_tone(freq, length_ms);
        }
        Opcode::ToolCommand => {
            bump_line_number(core);
            dispatch_tool_command(core, collabs, thread);
        }
        Opcode::SetBuildPercent => {
            let percent = core.buffer.pop_u8(thread);
            core.buffer.pop_u8(thread); // reserved
            bump_line_number(core);
            collabs.interface.set_build_percentage(percent);
        }
        Opcode::QueueSong => {
            let tune_id = core.buffer.pop_u8(thread);
            bump_line_number(core);
            collabs.piezo.play_tune(tune_id);
        }
        Opcode::ResetToFactory => {
            core.buffer.pop_u8(thread); // reserved options byte
            bump_line_number(core);
            collabs.settings.factory_reset();
            core.reset();
        }
        Opcode::BuildStartNotification => {
            core.buffer.pop_i32(thread); // step count, ignored
            bump_line_number(core);
            loop {
                let byte = core.buffer.pop_u8(thread);
                if byte == 0 {
                    break;
                }
                collabs.host.handle_build_start_byte(byte);
            }
            core.start_build_flag = true;
            collabs.host.abort_heat_hold_timeout();
        }
        Opcode::BuildEndNotification => {
            let flags = core.buffer.pop_u8(thread);
            bump_line_number(core);
            collabs.host.handle_build_stop(flags);
        }
        Opcode::SetAccelerationToggle => {
            let status = core.buffer.pop_u8(thread);
            bump_line_number(core);
            collabs.planner.set_acceleration(status == 1);
        }
        Opcode::StreamVersion => dispatch_stream_version(core, collabs, thread),
    }
}

fn dispatch_display_message(core: &mut CommandCore, collabs: &mut Collaborators, thread: &Thread) {
    let options = core.buffer.pop_u8(thread);
    let xpos = core.buffer.pop_u8(thread);
    let ypos = core.buffer.pop_u8(thread);
    let timeout_seconds = core.buffer.pop_u8(thread);
    bump_line_number(core);

    const PRESERVE_PREVIOUS: u8 = 1 << 0;
    const PUSH_NOW: u8 = 1 << 1;
    const BUTTON_WAIT: u8 = 1 << 2;

    if options & PRESERVE_PREVIOUS == 0 {
        collabs.interface.message_clear();
    }
    collabs.interface.message_set_position(xpos, ypos);
    loop {
        let byte = core.buffer.pop_u8(thread);
        if byte == 0 {
            break;
        }
        collabs.interface.message_append_byte(byte);
    }

    if options & PUSH_NOW != 0 {
        if !collabs.interface.message_is_current_screen() {
            collabs.interface.push_screen();
        }
        if timeout_seconds != 0 && options & BUTTON_WAIT == 0 {
            collabs.interface.message_set_timeout_seconds(timeout_seconds);
        }
        if options & BUTTON_WAIT != 0 {
            if timeout_seconds != 0 {
                core.timeout
                    .start(collabs.clock, (timeout_seconds as u32).saturating_mul(1_000_000));
            } else {
                core.timeout.cancel();
            }
            const CENTER_BUTTON: u8 = 1 << 0;
            core.button_ctx = ButtonWaitContext {
                button_mask: CENTER_BUTTON,
                behavior: ButtonTimeoutBehavior(
                    core.button_ctx.behavior.0 & ButtonTimeoutBehavior::CLEAR_SCREEN_ON_PRESS,
                ),
            };
            collabs.interface.interface_blink(25, 15);
            collabs.interface.wait_for_button(CENTER_BUTTON);
            collabs
                .interface
                .set_board_status(BoardStatus::WaitingForButton, true);
            core.mode = Mode::WaitOnButton;
        }
    }
}

fn dispatch_stream_version(core: &mut CommandCore, collabs: &mut Collaborators, thread: &Thread) {
    let version_major = core.buffer.pop_u8(thread) as u16;
    let version_minor = core.buffer.pop_u8(thread) as u16;
    core.buffer.pop_u8(thread); // extra version byte, ignored
    core.buffer.pop_i32(thread); // checksum, not implemented
    let bot_type = core.buffer.pop_i16(thread) as u16;
    core.buffer.pop_u8(thread); // reserved
    bump_line_number(core);

    if version_major * 100 + version_minor != EXPECTED_STREAM_VERSION {
        collabs.interface.error_message(ErrorCode::StreamVersionMismatch);
    }
    if bot_type != EXPECTED_BOT_TYPE {
        collabs
            .interface
            .error_response(ErrorCode::BotTypeMismatch, false, false);
    }
}

fn dispatch_tool_command(core: &mut CommandCore, collabs: &mut Collaborators, thread: &Thread) {
    let tool_id = core.buffer.pop_u8(thread);
    let sub_command_byte = core.buffer.pop_u8(thread);
    let payload_length = core.buffer.pop_u8(thread) as usize;

    let sub_command = match ToolSubCommand::from_byte(sub_command_byte) {
        Some(s) => s,
        None => {
            for _ in 0..payload_length {
                core.buffer.pop_u8(thread);
            }
            return;
        }
    };

    let tool_index = tool_id as usize;
    match sub_command {
        ToolSubCommand::SetTemp => {
            if core.start_build_flag {
                collabs.extruders[0].abort();
                collabs.extruders[1].abort();
                if !core.platform_on_flag {
                    collabs.platform.abort();
                }
                core.platform_on_flag = false;
                core.start_build_flag = false;
            }
            let mut target = core.buffer.pop_i16(thread) as u16;

            let platform_heating = collabs.platform.is_heating() && !collabs.platform.is_cooling();
            let extruder_cooling = collabs.extruders[tool_index].is_cooling();
            if platform_heating && !extruder_cooling {
                core.check_temp_state = true;
                collabs.extruders[tool_index].pause(true);
            } else {
                collabs.extruders[tool_index].pause(false);
            }
            collabs
                .interface
                .set_board_status(BoardStatus::Preheating, false);

            if tool_index == 1 && collabs.settings.is_single_tool() {
                collabs.interface.error_message(ErrorCode::InvalidTool);
                target = 0;
            }
            collabs.extruders[tool_index].set_target(target);
        }
        ToolSubCommand::SetPlatformTemp => {
            let mut target = core.buffer.pop_i16(thread) as u16;
            collabs.aux.set_platform_in_use(true);
            if core.start_build_flag {
                core.platform_on_flag = true;
            }
            let pause_state = !collabs.platform.is_cooling();
            core.check_temp_state = pause_state;
            collabs.extruders[0].pause(pause_state);
            collabs.extruders[1].pause(pause_state);
            collabs
                .interface
                .set_board_status(BoardStatus::Preheating, false);

            if !collabs.settings.has_heated_platform() {
                collabs.interface.error_message(ErrorCode::InvalidPlatform);
                collabs.aux.set_platform_in_use(false);
                target = 0;
            }
            collabs.platform.set_target(target);
        }
        ToolSubCommand::PauseUnpause => {
            collabs.host.pause_build(!core.paused);
        }
        ToolSubCommand::ToggleFan => {
            let on = core.buffer.pop_u8(thread) & 0x01 != 0;
            collabs.aux.set_fan(on);
        }
        ToolSubCommand::ToggleValve => {
            let on = core.buffer.pop_u8(thread) & 0x01 != 0;
            collabs.aux.set_valve(on);
        }
        ToolSubCommand::ToggleMotor1
        | ToolSubCommand::ToggleMotor2
        | ToolSubCommand::SetMotor1Pwm
        | ToolSubCommand::SetMotor2Pwm
        | ToolSubCommand::SetMotor1Dir
        | ToolSubCommand::SetMotor2Dir
        | ToolSubCommand::SetServo1Pos
        | ToolSubCommand::SetServo2Pos => {
            core.buffer.pop_u8(thread);
        }
        ToolSubCommand::SetMotor1Rpm | ToolSubCommand::SetMotor2Rpm => {
            core.buffer.pop_i32(thread);
        }
    }
}

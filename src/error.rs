//! Error kinds surfaced to the `Interface` collaborator.
//!
//! None of these unwind through the dispatcher: each is reported in place
//! via `Interface::error_message` / `Interface::error_response`, and the
//! state machine continues running afterward.

/// The error kinds the core can observe.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorCode {
    /// A `TOOL_COMMAND`/`SET_TEMP` named a tool index the board doesn't have.
    InvalidTool,
    /// A `TOOL_COMMAND`/`SET_PLATFORM_TEMP` was issued on a board with no
    /// heated platform.
    InvalidPlatform,
    /// `WAIT_ON_TOOL` timed out before the extruder reached target.
    HeatingTimeout,
    /// `WAIT_ON_PLATFORM` timed out before the platform reached target.
    PlatformHeatingTimeout,
    /// `STREAM_VERSION`'s major/minor version didn't match this firmware.
    StreamVersionMismatch,
    /// `STREAM_VERSION`'s declared bot type didn't match this board.
    BotTypeMismatch,
    /// Six consecutive short-read observations from card playback.
    StaticFail,
    /// The filament-input wait during a filament-change active pause
    /// elapsed; the pause auto-downgrades to a cold pause.
    TimedOutOfChangeFilament,
}

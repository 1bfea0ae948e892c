//! `ModeMachine`: the primary state machine gating dispatch.

/// The primary state machine. No terminal state; `reset()` always returns to
/// `Ready`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Mode {
    Ready,
    Moving,
    Delay,
    Homing,
    WaitOnTool,
    WaitOnPlatform,
    WaitOnButton,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Ready
    }
}

/// Behavior bits carried by `PAUSE_FOR_BUTTON` and the button-wait path of
/// `DISPLAY_MESSAGE`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ButtonTimeoutBehavior(pub u8);

impl ButtonTimeoutBehavior {
    pub const ABORT_ON_TIMEOUT: u8 = 1 << 0;
    pub const CLEAR_SCREEN_ON_PRESS: u8 = 1 << 1;

    pub fn abort_on_timeout(self) -> bool {
        self.0 & Self::ABORT_ON_TIMEOUT != 0
    }

    pub fn clear_screen_on_press(self) -> bool {
        self.0 & Self::CLEAR_SCREEN_ON_PRESS != 0
    }
}

/// State captured while `Mode::WaitOnButton` is active.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ButtonWaitContext {
    pub button_mask: u8,
    pub behavior: ButtonTimeoutBehavior,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn behavior_bits_decode() {
        let b = ButtonTimeoutBehavior(ButtonTimeoutBehavior::ABORT_ON_TIMEOUT);
        assert!(b.abort_on_timeout());
        assert!(!b.clear_screen_on_press());

        let b = ButtonTimeoutBehavior(ButtonTimeoutBehavior::CLEAR_SCREEN_ON_PRESS);
        assert!(!b.abort_on_timeout());
        assert!(b.clear_screen_on_press());
    }
}

//! `SourceMux`: selects the active byte producer.
//!
//! Exactly one of `{HostLink, CardPlayback, UtilityScript}` contributes
//! bytes to the ring during any given slice. The host-link path pushes
//! directly into the ring from its own receive interrupt and isn't
//! represented here; this module only tracks which of the two *playback*
//! sources (if either) currently owns the ring, and the reliability
//! watchdog counters for card playback.

/// Which byte producer is active.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Source {
    /// Bytes arrive asynchronously via the host-link receive interrupt;
    /// nothing for the slice to pull.
    HostLink,
    CardPlayback,
    UtilityScript,
}

impl Default for Source {
    fn default() -> Self {
        Source::HostLink
    }
}

/// After this many consecutive short-read observations, the card watchdog
/// trips `STATICFAIL` (the 6th consecutive such observation).
pub const SD_FAIL_THRESHOLD: u8 = 6;

/// Height the STATICFAIL recovery retracts Z to, in millimeters.
pub const STATICFAIL_RETRACT_Z_MM: f32 = 150.0;

/// Rate (µs/step) used for the STATICFAIL recovery Z retract, distinct from
/// the sleep machine's own `Z_RATE`.
pub const STATICFAIL_RETRACT_RATE: i32 = 150;

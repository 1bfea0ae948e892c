//! Type-level representation of execution context.
//!
//! The command ring (`crate::util::ring::CommandBuffer`) has exactly one
//! producer and one consumer, but they run at different priorities: the
//! producer is the host-link receive path, which may run from an interrupt
//! handler, while the consumer is `CommandCore::run_slice`, which always runs
//! at thread priority. These tokens are zero-sized proof that the caller is
//! on the side of that boundary it claims to be on.

use core::marker::PhantomData;

type NotSyncOrSend = PhantomData<*mut ()>;

/// Proof that the caller executes at thread priority (the cooperative
/// scheduler's call into `run_slice`, never an interrupt handler).
#[derive(Copy, Clone)]
pub struct Thread(NotSyncOrSend);

/// Proof that the caller executes from the host-link receive interrupt.
#[derive(Copy, Clone)]
pub struct Isr(NotSyncOrSend);

impl Thread {
    /// # Safety
    /// The caller must guarantee this is not invoked from within an
    /// interrupt handler that could race a `CommandBuffer` consumer.
    pub unsafe fn new() -> Self {
        Thread(PhantomData)
    }
}

impl Isr {
    /// # Safety
    /// The caller must guarantee this is only invoked from the host-link
    /// receive interrupt, never reentrantly, and never concurrently with
    /// another `Isr` token for the same buffer.
    pub unsafe fn new() -> Self {
        Isr(PhantomData)
    }
}

#[cfg(target_os = "none")]
impl Thread {
    /// Returns a `Thread` token only if the current execution context is
    /// outside any exception handler, by reading the active vector number
    /// out of `ICSR` (`0` means thread mode).
    pub fn new_checked() -> Option<Self> {
        // Safety: reads of the ICSR are always safe.
        let icsr = unsafe { &(*cortex_m::peripheral::SCB::ptr()).icsr }.read();
        if icsr & 0xFF == 0 {
            Some(unsafe { Self::new() })
        } else {
            None
        }
    }
}

#[cfg(target_os = "none")]
impl Isr {
    /// Returns an `Isr` token only if the current execution context is
    /// inside an exception handler (the host-link receive interrupt).
    pub fn new_checked() -> Option<Self> {
        // Safety: reads of the ICSR are always safe.
        let icsr = unsafe { &(*cortex_m::peripheral::SCB::ptr()).icsr }.read();
        if icsr & 0xFF != 0 {
            Some(unsafe { Self::new() })
        } else {
            None
        }
    }
}

//! Test-only helpers for minting priority tokens outside real interrupt
//! context.

use crate::priority::{Isr, Thread};

pub(crate) fn thread() -> Thread {
    unsafe { Thread::new() }
}

pub(crate) fn isr() -> Isr {
    unsafe { Isr::new() }
}

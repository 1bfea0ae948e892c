//! `CommandBuffer`: a fixed-capacity, single-producer/single-consumer byte
//! ring.
//!
//! The producer (host-link receive path) may run from an interrupt handler;
//! the consumer (`CommandCore::run_slice`) always runs at thread priority.
//! `CommandBuffer` keeps one atomic `length` counter that both sides
//! observe, while `head` (consumer-owned) and `tail` (producer-owned) are
//! plain indices nobody else ever touches -- a reader at one priority and a
//! writer at another never need a full lock. Capacity queries are therefore
//! atomic with respect to the producer without requiring interrupts to be
//! masked for the whole operation: only the counter update is atomic.

use core::sync::atomic::{AtomicUsize, Ordering};

use crate::priority::{Isr, Thread};
use crate::COMMAND_BUFFER_CAPACITY as CAPACITY;

/// Producer-side error: the ring was full.
///
/// An overflowing `push` is a producer error and must not silently
/// overwrite buffered data.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Overflow;

pub struct CommandBuffer {
    data: [u8; CAPACITY],
    head: usize,
    tail: usize,
    length: AtomicUsize,
}

impl CommandBuffer {
    pub const fn new() -> Self {
        CommandBuffer {
            data: [0; CAPACITY],
            head: 0,
            tail: 0,
            length: AtomicUsize::new(0),
        }
    }

    /// Number of bytes currently buffered.
    ///
    /// Safe to call from either producer or consumer context.
    pub fn length(&self) -> usize {
        self.length.load(Ordering::Acquire)
    }

    /// Bytes of headroom before the ring is full.
    ///
    /// `length() + remaining_capacity() == CAPACITY` always holds.
    pub fn remaining_capacity(&self) -> usize {
        CAPACITY - self.length()
    }

    /// Pushes one byte onto the tail of the ring.
    ///
    /// Callers must hold an [`Isr`] token (or a [`Thread`] token, if the host
    /// runtime feeds bytes in from thread context instead of an interrupt --
    /// either way, there must only ever be one producer live at a time).
    pub fn push(&mut self, byte: u8, _producer: &Isr) -> Result<(), Overflow> {
        self.push_inner(byte)
    }

    /// Same as [`CommandBuffer::push`], for producers that run at thread
    /// priority instead of in an interrupt handler (e.g. a test harness, or
    /// a host runtime that polls its transport from the main loop).
    pub fn push_from_thread(&mut self, byte: u8, _producer: &Thread) -> Result<(), Overflow> {
        self.push_inner(byte)
    }

    fn push_inner(&mut self, byte: u8) -> Result<(), Overflow> {
        if self.remaining_capacity() == 0 {
            return Err(Overflow);
        }
        self.data[self.tail] = byte;
        self.tail = (self.tail + 1) % CAPACITY;
        self.length.fetch_add(1, Ordering::Release);
        Ok(())
    }

    /// Looks at the byte `index` positions from the head without consuming
    /// it. Panics if `index >= length()`; callers are required to check
    /// `length()` first: reads never occur unless `length >= expected
    /// packet size`.
    pub fn peek(&self, index: usize, _consumer: &Thread) -> u8 {
        assert!(index < self.length(), "peek past buffered length");
        self.data[(self.head + index) % CAPACITY]
    }

    fn pop_byte(&mut self) -> u8 {
        debug_assert!(self.length() > 0, "pop from empty CommandBuffer");
        let byte = self.data[self.head];
        self.head = (self.head + 1) % CAPACITY;
        self.length.fetch_sub(1, Ordering::Release);
        byte
    }

    pub fn pop_u8(&mut self, _consumer: &Thread) -> u8 {
        self.pop_byte()
    }

    /// Pops a little-endian `i16`, independent of host endianness.
    pub fn pop_i16(&mut self, consumer: &Thread) -> i16 {
        let lo = self.pop_u8(consumer);
        let hi = self.pop_u8(consumer);
        i16::from_le_bytes([lo, hi])
    }

    /// Pops a little-endian `i32`, independent of host endianness.
    pub fn pop_i32(&mut self, consumer: &Thread) -> i32 {
        let mut bytes = [0u8; 4];
        for b in &mut bytes {
            *b = self.pop_u8(consumer);
        }
        i32::from_le_bytes(bytes)
    }

    /// Pops a 32-bit IEEE-754 float from its little-endian bit pattern.
    pub fn pop_f32(&mut self, consumer: &Thread) -> f32 {
        let mut bytes = [0u8; 4];
        for b in &mut bytes {
            *b = self.pop_u8(consumer);
        }
        f32::from_bits(u32::from_le_bytes(bytes))
    }

    /// Drops every buffered byte and rewinds the ring to empty.
    pub fn reset(&mut self, _consumer: &Thread) {
        self.head = 0;
        self.tail = 0;
        self.length.store(0, Ordering::Release);
    }
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_support::{isr, thread};

    #[test]
    fn push_pop_roundtrip() {
        let mut buf = CommandBuffer::new();
        buf.push(1, &isr()).unwrap();
        buf.push(2, &isr()).unwrap();
        buf.push(3, &isr()).unwrap();
        assert_eq!(buf.length(), 3);
        assert_eq!(buf.pop_u8(&thread()), 1);
        assert_eq!(buf.pop_u8(&thread()), 2);
        assert_eq!(buf.pop_u8(&thread()), 3);
        assert_eq!(buf.length(), 0);
    }

    #[test]
    fn capacity_invariant_holds() {
        let buf = CommandBuffer::new();
        assert_eq!(buf.length() + buf.remaining_capacity(), CAPACITY);
    }

    #[test]
    fn overflow_does_not_overwrite() {
        let mut buf = CommandBuffer::new();
        for i in 0..CAPACITY {
            buf.push((i % 256) as u8, &isr()).unwrap();
        }
        assert_eq!(buf.push(0xAA, &isr()), Err(Overflow));
        assert_eq!(buf.length(), CAPACITY);
        assert_eq!(buf.pop_u8(&thread()), 0);
    }

    #[test]
    fn little_endian_i32_roundtrip() {
        let mut buf = CommandBuffer::new();
        let values: [i32; 3] = [1, -12345, i32::MAX];
        for v in &values {
            for b in v.to_le_bytes().iter() {
                buf.push(*b, &isr()).unwrap();
            }
        }
        for v in &values {
            assert_eq!(buf.pop_i32(&thread()), *v);
        }
    }

    #[test]
    fn little_endian_f32_roundtrip() {
        let mut buf = CommandBuffer::new();
        let v: f32 = -12.5;
        for b in v.to_bits().to_le_bytes().iter() {
            buf.push(*b, &isr()).unwrap();
        }
        assert_eq!(buf.pop_f32(&thread()), v);
    }

    #[test]
    fn wraps_around_ring() {
        let mut buf = CommandBuffer::new();
        // Fill and drain repeatedly so head/tail wrap past the end of the
        // backing array.
        for round in 0..5 {
            for i in 0..100 {
                buf.push(((round * 100 + i) % 256) as u8, &isr()).unwrap();
            }
            for i in 0..100 {
                assert_eq!(buf.pop_u8(&thread()), ((round * 100 + i) % 256) as u8);
            }
        }
    }
}

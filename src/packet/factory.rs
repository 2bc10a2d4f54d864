//! Packet and buffer allocation
//!
//! [`PacketPool`] recycles fixed-size buffers through a lock-free queue so
//! that the steady state of a stream performs no allocations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use crossbeam::queue::ArrayQueue;
use tracing::warn;

use crate::packet::packet::Packet;

/// Allocates packets and their backing buffers.
///
/// Allocation failure is reported as `None`.
pub trait PacketFactory: Send + Sync {
    fn new_packet(&self) -> Option<Packet>;

    /// Zero-filled buffer of the factory's packet size
    fn new_packet_buffer(&self) -> Option<BytesMut>;
}

/// Bounded pool of fixed-size packet buffers
pub struct PacketPool {
    buffer_size: usize,
    free: ArrayQueue<BytesMut>,
    max_buffers: Option<usize>,
    allocated: AtomicUsize,
    exhausted_count: AtomicUsize,
}

impl PacketPool {
    /// Create a pool of `buffer_size` byte buffers keeping up to
    /// `capacity` buffers for reuse
    pub fn new(buffer_size: usize, capacity: usize) -> Self {
        Self {
            buffer_size,
            free: ArrayQueue::new(capacity.max(1)),
            max_buffers: None,
            allocated: AtomicUsize::new(0),
            exhausted_count: AtomicUsize::new(0),
        }
    }

    /// Limit the number of buffers handed out and not yet recycled
    pub fn with_max_buffers(mut self, max_buffers: usize) -> Self {
        self.max_buffers = Some(max_buffers);
        self
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Buffers currently handed out
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }

    /// Buffers waiting for reuse
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Number of failed allocations
    pub fn exhausted_count(&self) -> usize {
        self.exhausted_count.load(Ordering::Relaxed)
    }

    /// Return a packet's buffer to the pool
    pub fn recycle(&self, packet: Packet) {
        self.recycle_buffer(packet.into_buffer());
    }

    pub fn recycle_buffer(&self, mut buffer: BytesMut) {
        let _ = self
            .allocated
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| Some(v.saturating_sub(1)));

        buffer.clear();
        buffer.resize(self.buffer_size, 0);
        // Dropped when the pool is full
        let _ = self.free.push(buffer);
    }
}

impl PacketFactory for PacketPool {
    fn new_packet(&self) -> Option<Packet> {
        Some(Packet::new())
    }

    fn new_packet_buffer(&self) -> Option<BytesMut> {
        if let Some(max) = self.max_buffers {
            let reserved = self
                .allocated
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| (v < max).then_some(v + 1));
            if reserved.is_err() {
                self.exhausted_count.fetch_add(1, Ordering::Relaxed);
                warn!("packet pool: exhausted: max_buffers={}", max);
                return None;
            }
        } else {
            self.allocated.fetch_add(1, Ordering::Relaxed);
        }

        Some(
            self.free
                .pop()
                .unwrap_or_else(|| BytesMut::zeroed(self.buffer_size)),
        )
    }
}

/// Thread-safe handle to a packet pool
pub type SharedPacketPool = Arc<PacketPool>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_recycle() {
        let pool = PacketPool::new(64, 4);

        let buffer = pool.new_packet_buffer().unwrap();
        assert_eq!(buffer.len(), 64);
        assert_eq!(pool.allocated(), 1);

        let mut packet = pool.new_packet().unwrap();
        packet.set_buffer(buffer);
        packet.buffer_mut()[0] = 0xff;
        pool.recycle(packet);

        assert_eq!(pool.allocated(), 0);
        assert_eq!(pool.available(), 1);

        let reused = pool.new_packet_buffer().unwrap();
        assert_eq!(reused.len(), 64);
        assert_eq!(reused[0], 0);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_max_buffers() {
        let pool = PacketPool::new(16, 4).with_max_buffers(2);

        let a = pool.new_packet_buffer().unwrap();
        let _b = pool.new_packet_buffer().unwrap();
        assert!(pool.new_packet_buffer().is_none());
        assert_eq!(pool.exhausted_count(), 1);

        pool.recycle_buffer(a);
        assert!(pool.new_packet_buffer().is_some());
    }
}

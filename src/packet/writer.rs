//! Downstream packet sinks

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::error::PacketError;
use crate::packet::packet::Packet;

/// Consumes composed packets
pub trait PacketWriter {
    /// Take ownership of `packet`
    fn write(&mut self, packet: Packet) -> Result<(), PacketError>;
}

/// Forwards packets to a bounded channel without blocking
pub struct ChannelWriter {
    tx: Sender<Packet>,
}

impl ChannelWriter {
    pub fn new(tx: Sender<Packet>) -> Self {
        Self { tx }
    }
}

impl PacketWriter for ChannelWriter {
    fn write(&mut self, packet: Packet) -> Result<(), PacketError> {
        self.tx.try_send(packet).map_err(|e| match e {
            TrySendError::Full(_) => PacketError::Full,
            TrySendError::Disconnected(_) => PacketError::Disconnected,
        })
    }
}

/// Collects packets in memory
#[derive(Debug, Default)]
pub struct VecWriter {
    packets: Vec<Packet>,
}

impl VecWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    pub fn take(&mut self) -> Vec<Packet> {
        std::mem::take(&mut self.packets)
    }
}

impl PacketWriter for VecWriter {
    fn write(&mut self, packet: Packet) -> Result<(), PacketError> {
        self.packets.push(packet);
        Ok(())
    }
}

/// Create a writer and the receiving end of its channel
pub fn packet_channel(capacity: usize) -> (ChannelWriter, Receiver<Packet>) {
    let (tx, rx) = bounded(capacity);
    (ChannelWriter::new(tx), rx)
}

//! Packet composers
//!
//! Source packets are laid out as an RTP packet followed by the FEC payload
//! ID; the whole RTP packet is protected. Repair packets carry the payload ID
//! first, followed by the repair symbol.
//!
//! ```text
//! source: [ RTP header 12 | audio payload | payload ID 8 ]
//!          \____ FEC payload ___________/
//! repair: [ payload ID 8 | repair symbol ]
//! ```

use bytes::{Buf, BytesMut};

use crate::packet::packet::{Fec, FecScheme, Packet, PacketFlags, Rtp};
use crate::packet::units::BlkNum;

pub const RTP_HEADER_SIZE: usize = 12;
pub const PAYLOAD_ID_SIZE: usize = 8;

const RTP_VERSION: u8 = 2;

/// Lays out and finalizes packet headers
pub trait Composer: Send + Sync {
    /// Advance `buffer` so that the payload of a packet placed after
    /// `header_size` bytes of outer headers starts at a multiple of
    /// `alignment`.
    fn align(&self, buffer: &mut BytesMut, header_size: usize, alignment: usize) -> bool;

    /// Attach `buffer` to `packet` and reserve room for headers and a
    /// payload of `payload_size` bytes
    fn prepare(&self, packet: &mut Packet, buffer: BytesMut, payload_size: usize) -> bool;

    /// Write headers from packet metadata
    fn compose(&self, packet: &mut Packet) -> bool;
}

/// FEC payload ID: block number, symbol id and block lengths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadId {
    pub source_block_number: BlkNum,
    pub encoding_symbol_id: u16,
    pub source_block_length: u16,
    pub block_length: u16,
}

impl PayloadId {
    pub fn read_from(data: &[u8]) -> Option<Self> {
        if data.len() < PAYLOAD_ID_SIZE {
            return None;
        }
        let field = |i: usize| u16::from_be_bytes([data[i], data[i + 1]]);
        Some(Self {
            source_block_number: field(0),
            encoding_symbol_id: field(2),
            source_block_length: field(4),
            block_length: field(6),
        })
    }

    fn from_fec(fec: &Fec) -> Option<Self> {
        Some(Self {
            source_block_number: fec.source_block_number,
            encoding_symbol_id: u16::try_from(fec.encoding_symbol_id).ok()?,
            source_block_length: u16::try_from(fec.source_block_length).ok()?,
            block_length: u16::try_from(fec.block_length).ok()?,
        })
    }

    fn write_to(&self, out: &mut [u8]) {
        out[0..2].copy_from_slice(&self.source_block_number.to_be_bytes());
        out[2..4].copy_from_slice(&self.encoding_symbol_id.to_be_bytes());
        out[4..6].copy_from_slice(&self.source_block_length.to_be_bytes());
        out[6..8].copy_from_slice(&self.block_length.to_be_bytes());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Source,
    Repair,
}

/// Composer for RTP source packets and repair packets of one FEC scheme
#[derive(Debug, Clone)]
pub struct FecComposer {
    scheme: FecScheme,
    layout: Layout,
}

impl FecComposer {
    pub fn source(scheme: FecScheme) -> Self {
        Self {
            scheme,
            layout: Layout::Source,
        }
    }

    pub fn repair(scheme: FecScheme) -> Self {
        Self {
            scheme,
            layout: Layout::Repair,
        }
    }

    pub fn scheme(&self) -> FecScheme {
        self.scheme
    }

    /// Offset of the FEC payload inside the packet
    fn payload_offset(&self) -> usize {
        match self.layout {
            Layout::Source => 0,
            Layout::Repair => PAYLOAD_ID_SIZE,
        }
    }

    fn compose_source(&self, packet: &mut Packet) -> Option<()> {
        let rtp = packet.rtp()?.clone();
        let fec = packet.fec()?;
        let payload_id = PayloadId::from_fec(fec)?;
        let id_range = fec.payload_id.clone();

        let buffer = packet.buffer_mut();
        let header = buffer.get_mut(rtp.header.clone())?;
        header[0] = RTP_VERSION << 6;
        header[1] = ((rtp.marker as u8) << 7) | (rtp.payload_type & 0x7f);
        header[2..4].copy_from_slice(&rtp.seqnum.to_be_bytes());
        header[4..8].copy_from_slice(&rtp.stream_timestamp.to_be_bytes());
        header[8..12].copy_from_slice(&rtp.source_id.to_be_bytes());

        payload_id.write_to(buffer.get_mut(id_range)?);
        Some(())
    }

    fn compose_repair(&self, packet: &mut Packet) -> Option<()> {
        let fec = packet.fec()?;
        let payload_id = PayloadId::from_fec(fec)?;
        let id_range = fec.payload_id.clone();

        payload_id.write_to(packet.buffer_mut().get_mut(id_range)?);
        Some(())
    }
}

impl Composer for FecComposer {
    fn align(&self, buffer: &mut BytesMut, header_size: usize, alignment: usize) -> bool {
        if !alignment.is_power_of_two() {
            return false;
        }

        let payload = buffer.as_ptr() as usize + header_size + self.payload_offset();
        let padding = payload.wrapping_neg() & (alignment - 1);
        if padding > buffer.len() {
            return false;
        }

        buffer.advance(padding);
        true
    }

    fn prepare(&self, packet: &mut Packet, mut buffer: BytesMut, payload_size: usize) -> bool {
        let needed = match self.layout {
            Layout::Source => RTP_HEADER_SIZE + payload_size + PAYLOAD_ID_SIZE,
            Layout::Repair => PAYLOAD_ID_SIZE + payload_size,
        };
        if buffer.len() < needed {
            return false;
        }
        buffer.truncate(needed);
        packet.set_buffer(buffer);

        let mut fec = Fec::new(self.scheme);
        match self.layout {
            Layout::Source => {
                let payload_end = RTP_HEADER_SIZE + payload_size;
                packet.set_rtp(Rtp {
                    header: 0..RTP_HEADER_SIZE,
                    payload: RTP_HEADER_SIZE..payload_end,
                    duration: 0,
                    ..Rtp::default()
                });
                fec.payload = 0..payload_end;
                fec.payload_id = payload_end..needed;
                packet.add_flags(PacketFlags::AUDIO);
            }
            Layout::Repair => {
                fec.payload_id = 0..PAYLOAD_ID_SIZE;
                fec.payload = PAYLOAD_ID_SIZE..needed;
                packet.add_flags(PacketFlags::REPAIR);
            }
        }
        packet.set_fec(fec);

        true
    }

    fn compose(&self, packet: &mut Packet) -> bool {
        match self.layout {
            Layout::Source => self.compose_source(packet).is_some(),
            Layout::Repair => self.compose_repair(packet).is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_layout() {
        let composer = FecComposer::source(FecScheme::ReedSolomonM8);
        let mut packet = Packet::new();
        assert!(composer.prepare(&mut packet, BytesMut::zeroed(128), 40));

        assert_eq!(packet.data().len(), RTP_HEADER_SIZE + 40 + PAYLOAD_ID_SIZE);
        assert_eq!(packet.rtp_payload().len(), 40);
        assert_eq!(packet.fec_payload().len(), RTP_HEADER_SIZE + 40);
        assert!(packet.has_flags(PacketFlags::RTP | PacketFlags::FEC | PacketFlags::AUDIO));

        {
            let rtp = packet.rtp_mut().unwrap();
            rtp.seqnum = 0x1234;
            rtp.stream_timestamp = 0xdeadbeef;
            rtp.payload_type = 11;
            rtp.source_id = 7;
        }
        {
            let fec = packet.fec_mut().unwrap();
            fec.source_block_number = 3;
            fec.encoding_symbol_id = 1;
            fec.source_block_length = 4;
            fec.block_length = 6;
        }
        assert!(composer.compose(&mut packet));

        let data = packet.data();
        assert_eq!(data[0] >> 6, 2);
        assert_eq!(data[1], 11);
        assert_eq!(&data[2..4], &[0x12, 0x34]);
        assert_eq!(&data[4..8], &[0xde, 0xad, 0xbe, 0xef]);

        let id = PayloadId::read_from(&data[RTP_HEADER_SIZE + 40..]).unwrap();
        assert_eq!(
            id,
            PayloadId {
                source_block_number: 3,
                encoding_symbol_id: 1,
                source_block_length: 4,
                block_length: 6,
            }
        );
    }

    #[test]
    fn test_repair_layout() {
        let composer = FecComposer::repair(FecScheme::LdpcStaircase);
        let mut packet = Packet::new();
        assert!(composer.prepare(&mut packet, BytesMut::zeroed(64), 32));
        assert!(packet.has_flags(PacketFlags::REPAIR));
        assert!(packet.rtp().is_none());
        assert_eq!(packet.fec_payload().len(), 32);

        packet.fec_mut().unwrap().encoding_symbol_id = 5;
        assert!(composer.compose(&mut packet));
        let id = PayloadId::read_from(packet.data()).unwrap();
        assert_eq!(id.encoding_symbol_id, 5);
    }

    #[test]
    fn test_prepare_small_buffer() {
        let composer = FecComposer::repair(FecScheme::ReedSolomonM8);
        let mut packet = Packet::new();
        assert!(!composer.prepare(&mut packet, BytesMut::zeroed(16), 32));
        assert!(packet.fec().is_none());
    }

    #[test]
    fn test_align() {
        let composer = FecComposer::repair(FecScheme::ReedSolomonM8);
        let mut buffer = BytesMut::zeroed(256);
        assert!(composer.align(&mut buffer, 4, 16));
        let payload = buffer.as_ptr() as usize + 4 + PAYLOAD_ID_SIZE;
        assert_eq!(payload % 16, 0);

        assert!(!composer.align(&mut buffer, 0, 3));
        assert!(!composer.align(&mut buffer, 0, 0));
    }

    #[test]
    fn test_compose_rejects_large_fields() {
        let composer = FecComposer::repair(FecScheme::ReedSolomonM8);
        let mut packet = Packet::new();
        assert!(composer.prepare(&mut packet, BytesMut::zeroed(64), 8));
        packet.fec_mut().unwrap().block_length = 70_000;
        assert!(!composer.compose(&mut packet));
    }
}

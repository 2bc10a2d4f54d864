//! Network packet with RTP and FEC metadata

use std::fmt;
use std::ops::{BitOr, BitOrAssign, Range};

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use crate::packet::units::{BlkNum, SeqNum, StreamTimestamp};

/// Set of packet flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFlags(u32);

impl PacketFlags {
    /// Packet carries RTP metadata
    pub const RTP: PacketFlags = PacketFlags(1 << 0);
    /// Packet carries FEC metadata
    pub const FEC: PacketFlags = PacketFlags(1 << 1);
    /// Packet carries audio samples
    pub const AUDIO: PacketFlags = PacketFlags(1 << 2);
    /// Packet carries a repair symbol
    pub const REPAIR: PacketFlags = PacketFlags(1 << 3);
    /// Buffer attached and headers reserved
    pub const PREPARED: PacketFlags = PacketFlags(1 << 4);
    /// Headers written, ready for the wire
    pub const COMPOSED: PacketFlags = PacketFlags(1 << 5);

    const NAMES: [(PacketFlags, &'static str); 6] = [
        (Self::RTP, "rtp"),
        (Self::FEC, "fec"),
        (Self::AUDIO, "audio"),
        (Self::REPAIR, "repair"),
        (Self::PREPARED, "prepared"),
        (Self::COMPOSED, "composed"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    /// All flags of `other` are set
    pub const fn contains(self, other: PacketFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: PacketFlags) {
        self.0 |= other.0;
    }
}

impl BitOr for PacketFlags {
    type Output = PacketFlags;

    fn bitor(self, rhs: PacketFlags) -> PacketFlags {
        PacketFlags(self.0 | rhs.0)
    }
}

impl BitOrAssign for PacketFlags {
    fn bitor_assign(&mut self, rhs: PacketFlags) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for PacketFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    write!(f, ",")?;
                }
                write!(f, "{}", name)?;
                first = false;
            }
        }
        write!(f, "]")
    }
}

/// FEC scheme of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FecScheme {
    ReedSolomonM8,
    LdpcStaircase,
}

impl FecScheme {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReedSolomonM8 => "rs8m",
            Self::LdpcStaircase => "ldpc",
        }
    }
}

impl fmt::Display for FecScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RTP metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rtp {
    pub source_id: u32,
    pub seqnum: SeqNum,
    pub stream_timestamp: StreamTimestamp,
    /// Samples per channel carried by the packet
    pub duration: u32,
    pub payload_type: u8,
    pub marker: bool,
    /// RTP header location in the packet buffer
    pub header: Range<usize>,
    /// Audio payload location in the packet buffer
    pub payload: Range<usize>,
}

/// FEC metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fec {
    pub fec_scheme: FecScheme,
    /// Position of the packet inside its block
    pub encoding_symbol_id: usize,
    pub source_block_number: BlkNum,
    pub source_block_length: usize,
    /// Source plus repair packets in the block
    pub block_length: usize,
    /// Sequence number in the repair stream, set for repair packets
    pub repair_seqnum: Option<SeqNum>,
    /// Payload ID location in the packet buffer
    pub payload_id: Range<usize>,
    /// Protected bytes (source) or repair symbol (repair)
    pub payload: Range<usize>,
}

impl Fec {
    pub fn new(fec_scheme: FecScheme) -> Self {
        Self {
            fec_scheme,
            encoding_symbol_id: 0,
            source_block_number: 0,
            source_block_length: 0,
            block_length: 0,
            repair_seqnum: None,
            payload_id: 0..0,
            payload: 0..0,
        }
    }
}

/// Audio or repair packet
#[derive(Debug, Default)]
pub struct Packet {
    flags: PacketFlags,
    rtp: Option<Rtp>,
    fec: Option<Fec>,
    buffer: BytesMut,
}

impl Packet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flags(&self) -> PacketFlags {
        self.flags
    }

    pub fn has_flags(&self, flags: PacketFlags) -> bool {
        self.flags.contains(flags)
    }

    pub fn add_flags(&mut self, flags: PacketFlags) {
        self.flags |= flags;
    }

    pub fn rtp(&self) -> Option<&Rtp> {
        self.rtp.as_ref()
    }

    pub fn rtp_mut(&mut self) -> Option<&mut Rtp> {
        self.rtp.as_mut()
    }

    pub fn set_rtp(&mut self, rtp: Rtp) {
        self.rtp = Some(rtp);
        self.add_flags(PacketFlags::RTP);
    }

    pub fn fec(&self) -> Option<&Fec> {
        self.fec.as_ref()
    }

    pub fn fec_mut(&mut self) -> Option<&mut Fec> {
        self.fec.as_mut()
    }

    pub fn set_fec(&mut self, fec: Fec) {
        self.fec = Some(fec);
        self.add_flags(PacketFlags::FEC);
    }

    /// Attach the backing buffer
    pub fn set_buffer(&mut self, buffer: BytesMut) {
        self.buffer = buffer;
    }

    /// Whole packet as it goes on the wire
    pub fn data(&self) -> &[u8] {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Detach the backing buffer, e.g. for recycling
    pub fn into_buffer(self) -> BytesMut {
        self.buffer
    }

    /// Stream position of the audio payload, zero for non-RTP packets
    pub fn stream_timestamp(&self) -> StreamTimestamp {
        self.rtp.as_ref().map_or(0, |rtp| rtp.stream_timestamp)
    }

    pub fn rtp_payload(&self) -> &[u8] {
        match &self.rtp {
            Some(rtp) => &self.buffer[rtp.payload.clone()],
            None => &[],
        }
    }

    pub fn rtp_payload_mut(&mut self) -> &mut [u8] {
        match &self.rtp {
            Some(rtp) => &mut self.buffer[rtp.payload.clone()],
            None => &mut [],
        }
    }

    pub fn fec_payload(&self) -> &[u8] {
        match &self.fec {
            Some(fec) => &self.buffer[fec.payload.clone()],
            None => &[],
        }
    }

    pub fn fec_payload_mut(&mut self) -> &mut [u8] {
        match &self.fec {
            Some(fec) => &mut self.buffer[fec.payload.clone()],
            None => &mut [],
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "@ packet {} size={}", self.flags, self.buffer.len())?;

        if let Some(rtp) = &self.rtp {
            writeln!(
                f,
                " rtp: src={} m={} sn={} sts={} dur={} pt={} payload_sz={}",
                rtp.source_id,
                rtp.marker as u8,
                rtp.seqnum,
                rtp.stream_timestamp,
                rtp.duration,
                rtp.payload_type,
                rtp.payload.len()
            )?;
        }

        if let Some(fec) = &self.fec {
            write!(
                f,
                " fec: {} esi={} sbn={} sblen={} blen={} payload_sz={}",
                fec.fec_scheme,
                fec.encoding_symbol_id,
                fec.source_block_number,
                fec.source_block_length,
                fec.block_length,
                fec.payload.len()
            )?;
            if let Some(sn) = fec.repair_seqnum {
                write!(f, " rsn={}", sn)?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags() {
        let mut flags = PacketFlags::RTP | PacketFlags::FEC;
        assert!(flags.contains(PacketFlags::RTP));
        assert!(!flags.contains(PacketFlags::PREPARED));
        assert!(!flags.contains(PacketFlags::RTP | PacketFlags::PREPARED));

        flags.insert(PacketFlags::PREPARED);
        assert_eq!(flags.to_string(), "[rtp,fec,prepared]");
        assert_eq!(PacketFlags::empty().to_string(), "[]");
    }

    #[test]
    fn test_payload_views() {
        let mut packet = Packet::new();
        packet.set_buffer(BytesMut::zeroed(32));
        packet.set_rtp(Rtp {
            header: 0..12,
            payload: 12..24,
            ..Rtp::default()
        });
        let mut fec = Fec::new(FecScheme::ReedSolomonM8);
        fec.payload = 0..24;
        packet.set_fec(fec);

        packet.rtp_payload_mut().fill(7);
        assert_eq!(packet.rtp_payload().len(), 12);
        assert_eq!(&packet.fec_payload()[12..], &[7u8; 12][..]);
        assert!(packet.fec_payload()[..12].iter().all(|&b| b == 0));
        assert!(packet.has_flags(PacketFlags::RTP | PacketFlags::FEC));
    }

    #[test]
    fn test_display() {
        let mut packet = Packet::new();
        let mut fec = Fec::new(FecScheme::LdpcStaircase);
        fec.encoding_symbol_id = 5;
        fec.repair_seqnum = Some(9);
        packet.set_fec(fec);

        let text = packet.to_string();
        assert!(text.contains("fec: ldpc esi=5"));
        assert!(text.contains("rsn=9"));
    }
}

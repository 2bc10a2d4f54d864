//! Packets, their allocation, composition and delivery

pub mod composer;
pub mod factory;
#[allow(clippy::module_inception)]
pub mod packet;
pub mod units;
pub mod writer;

pub use composer::{Composer, FecComposer, PayloadId, PAYLOAD_ID_SIZE, RTP_HEADER_SIZE};
pub use factory::{PacketFactory, PacketPool, SharedPacketPool};
pub use packet::{Fec, FecScheme, Packet, PacketFlags, Rtp};
pub use units::{BlkNum, SeqNum, StreamTimestamp};
pub use writer::{packet_channel, ChannelWriter, PacketWriter, VecWriter};

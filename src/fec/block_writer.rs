//! FEC block writer
//!
//! Groups a stream of source packets into blocks of `sblen` packets. Every
//! source packet gets its FEC fields filled in, is composed and forwarded
//! right away. When the block is complete, the encoder computes `rblen`
//! repair symbols which are wrapped into repair packets and forwarded after
//! the sources.
//!
//! ```text
//! sbn=N:   S0 S1 .. S(sblen-1) R(sblen) .. R(sblen+rblen-1)
//! sbn=N+1: S0 S1 ..
//! ```

use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace};

use crate::error::FecError;
use crate::fec::encoder::BlockEncoder;
use crate::packet::units::{stream_timestamp_diff, BlkNum, SeqNum, StreamTimestamp};
use crate::packet::{Composer, FecScheme, Packet, PacketFactory, PacketFlags, PacketWriter};

/// Block sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockWriterConfig {
    /// Source packets per block
    pub n_source_packets: usize,
    /// Repair packets per block
    pub n_repair_packets: usize,
}

impl Default for BlockWriterConfig {
    fn default() -> Self {
        Self {
            n_source_packets: 18,
            n_repair_packets: 10,
        }
    }
}

/// Splits source packets into FEC blocks and appends repair packets.
///
/// Packets go out to `W` as soon as they are composed. After an
/// unrecoverable failure the writer stays dead and rejects further writes.
pub struct BlockWriter<W: PacketWriter> {
    cur_sblen: usize,
    next_sblen: usize,
    cur_rblen: usize,
    next_rblen: usize,
    cur_payload_size: usize,

    encoder: Box<dyn BlockEncoder>,
    writer: W,
    source_composer: Box<dyn Composer>,
    repair_composer: Box<dyn Composer>,
    packet_factory: Arc<dyn PacketFactory>,

    repair_block: Vec<Option<Packet>>,

    alive: bool,
    cur_packet: usize,
    cur_sbn: BlkNum,
    cur_block_repair_sn: SeqNum,
    fec_scheme: FecScheme,

    prev_block_timestamp: Option<StreamTimestamp>,
    block_max_duration: i32,

    init_status: Result<(), FecError>,
}

impl<W: PacketWriter> BlockWriter<W> {
    /// Create a writer forwarding to `writer`.
    ///
    /// The first block number and repair sequence number are drawn from
    /// `rng`. Construction failures are reported by [`init_status`]; any
    /// other call on a writer that failed to initialize panics.
    ///
    /// [`init_status`]: BlockWriter::init_status
    #[allow(clippy::too_many_arguments)]
    pub fn new<R: Rng>(
        config: &BlockWriterConfig,
        fec_scheme: FecScheme,
        encoder: Box<dyn BlockEncoder>,
        writer: W,
        source_composer: Box<dyn Composer>,
        repair_composer: Box<dyn Composer>,
        packet_factory: Arc<dyn PacketFactory>,
        rng: &mut R,
    ) -> Self {
        let init_status = encoder.init_status();
        if let Err(e) = &init_status {
            error!("fec block writer: encoder initialization failed: {}", e);
        }

        let mut block_writer = Self {
            cur_sblen: 0,
            next_sblen: 0,
            cur_rblen: 0,
            next_rblen: 0,
            cur_payload_size: 0,
            encoder,
            writer,
            source_composer,
            repair_composer,
            packet_factory,
            repair_block: Vec::new(),
            alive: true,
            cur_packet: 0,
            cur_sbn: 0,
            cur_block_repair_sn: 0,
            fec_scheme,
            prev_block_timestamp: None,
            block_max_duration: 0,
            init_status,
        };

        if block_writer.init_status.is_err() {
            return block_writer;
        }

        block_writer.cur_sbn = rng.gen();
        block_writer.cur_block_repair_sn = rng.gen();

        if let Err(e) = block_writer.update_sizes(config.n_source_packets, config.n_repair_packets)
        {
            block_writer.init_status = Err(e);
            return block_writer;
        }

        debug!(
            "fec block writer: initialized: scheme={} sblen={} rblen={} sbn={} rsn={}",
            fec_scheme,
            config.n_source_packets,
            config.n_repair_packets,
            block_writer.cur_sbn,
            block_writer.cur_block_repair_sn
        );

        block_writer
    }

    /// Outcome of construction: encoder init and initial block sizes
    pub fn init_status(&self) -> Result<(), FecError> {
        self.init_status.clone()
    }

    /// False once the writer stopped on an unrecoverable failure
    pub fn is_alive(&self) -> bool {
        self.check_init();
        self.alive
    }

    /// Largest distance between stream timestamps of consecutive block
    /// starts, since construction or the last successful [`resize`].
    ///
    /// [`resize`]: BlockWriter::resize
    pub fn max_block_duration(&self) -> StreamTimestamp {
        self.check_init();
        self.block_max_duration as StreamTimestamp
    }

    /// Number of the block being filled
    pub fn current_sbn(&self) -> BlkNum {
        self.check_init();
        self.cur_sbn
    }

    /// Repair sequence number of the first repair packet of the current block
    pub fn repair_seqnum_base(&self) -> SeqNum {
        self.check_init();
        self.cur_block_repair_sn
    }

    /// Source block length of the current block
    pub fn sblen(&self) -> usize {
        self.check_init();
        self.cur_sblen
    }

    /// Repair block length of the current block
    pub fn rblen(&self) -> usize {
        self.check_init();
        self.cur_rblen
    }

    /// Downstream packet writer
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Mutable access to the downstream writer, e.g. to drain it
    pub fn writer_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Request new block sizes, applied when the next block begins.
    ///
    /// Requesting the already pending sizes succeeds without effect. A
    /// rejected request leaves the writer unchanged.
    pub fn resize(&mut self, sblen: usize, rblen: usize) -> Result<(), FecError> {
        self.check_init();
        self.update_sizes(sblen, rblen)
    }

    /// Protect and forward a prepared source packet.
    ///
    /// # Panics
    ///
    /// If the packet is not prepared, is already composed, has no FEC
    /// metadata or belongs to a different FEC scheme.
    pub fn write(&mut self, packet: Packet) -> Result<(), FecError> {
        self.check_init();

        if !self.alive {
            return Err(FecError::Dead);
        }

        self.validate_fec_packet(&packet);

        if self.cur_packet == 0 {
            self.begin_block(&packet)?;
        }

        self.validate_source_packet(&packet)?;
        self.write_source_packet(packet)?;

        self.cur_packet += 1;

        if self.cur_packet == self.cur_sblen {
            self.end_block()?;
            self.next_block();
        }

        Ok(())
    }

    fn check_init(&self) {
        if let Err(e) = &self.init_status {
            panic!("fec block writer: used after failed construction: {}", e);
        }
    }

    fn shutdown(&mut self, err: FecError) -> FecError {
        self.alive = false;
        err
    }

    fn update_sizes(&mut self, sblen: usize, rblen: usize) -> Result<(), FecError> {
        if sblen == 0 {
            error!("fec block writer: resize: sblen can't be zero");
            return Err(FecError::ZeroSourceBlock);
        }

        if self.next_sblen == sblen && self.next_rblen == rblen {
            return Ok(());
        }

        let new_blen = sblen + rblen;
        let max_blen = self.encoder.max_block_length();

        if new_blen > max_blen {
            debug!(
                "fec block writer: can't update block length, maximum value exceeded: \
                 cur_sbl={} cur_rbl={} new_sbl={} new_rbl={} max_blen={}",
                self.cur_sblen, self.cur_rblen, sblen, rblen, max_blen
            );
            return Err(FecError::BlockTooLong {
                requested: new_blen,
                max: max_blen,
            });
        }

        debug!(
            "fec block writer: update block size: cur_sbl={} cur_rbl={} new_sbl={} new_rbl={}",
            self.cur_sblen, self.cur_rblen, sblen, rblen
        );

        self.next_sblen = sblen;
        self.next_rblen = rblen;

        self.prev_block_timestamp = None;
        self.block_max_duration = 0;

        Ok(())
    }

    fn begin_block(&mut self, packet: &Packet) -> Result<(), FecError> {
        self.update_block_duration(packet);

        let payload_size = packet.fec_payload().len();
        self.apply_sizes(self.next_sblen, self.next_rblen, payload_size)?;

        trace!(
            "fec block writer: begin block: sbn={} sblen={} rblen={} payload_size={}",
            self.cur_sbn,
            self.cur_sblen,
            self.cur_rblen,
            self.cur_payload_size
        );

        if !self
            .encoder
            .begin_block(self.cur_sblen, self.cur_rblen, self.cur_payload_size)
        {
            error!(
                "fec block writer: can't begin encoder block, shutting down: sblen={} rblen={}",
                self.cur_sblen, self.cur_rblen
            );
            return Err(self.shutdown(FecError::BlockRejected {
                sblen: self.cur_sblen,
                rblen: self.cur_rblen,
                payload_size: self.cur_payload_size,
            }));
        }

        Ok(())
    }

    fn apply_sizes(
        &mut self,
        sblen: usize,
        rblen: usize,
        payload_size: usize,
    ) -> Result<(), FecError> {
        if payload_size == 0 {
            error!("fec block writer: payload size can't be zero");
            return Err(self.shutdown(FecError::ZeroPayload));
        }

        if self.repair_block.len() != rblen {
            self.repair_block.resize_with(rblen, || None);
        }

        self.cur_sblen = sblen;
        self.cur_rblen = rblen;
        self.cur_payload_size = payload_size;

        Ok(())
    }

    fn end_block(&mut self) -> Result<(), FecError> {
        self.make_repair_packets();
        self.encode_repair_packets();
        let status = self.emit_repair_packets();

        self.encoder.end_block();

        status
    }

    fn next_block(&mut self) {
        self.cur_block_repair_sn = self.cur_block_repair_sn.wrapping_add(self.cur_rblen as SeqNum);
        self.cur_sbn = self.cur_sbn.wrapping_add(1);
        self.cur_packet = 0;
    }

    fn write_source_packet(&mut self, mut packet: Packet) -> Result<(), FecError> {
        self.fill_packet_fec_fields(&mut packet, self.cur_packet);

        if !self.source_composer.compose(&mut packet) {
            error!(
                "fec block writer: can't compose source packet: sbn={} esi={}",
                self.cur_sbn, self.cur_packet
            );
            return Err(self.shutdown(FecError::ComposeFailed("source")));
        }
        packet.add_flags(PacketFlags::COMPOSED);

        self.encoder.set_buffer(self.cur_packet, packet.fec_payload());

        if let Err(e) = self.writer.write(packet) {
            error!("fec block writer: can't write source packet, shutting down: {}", e);
            return Err(self.shutdown(e.into()));
        }

        Ok(())
    }

    fn make_repair_packets(&mut self) {
        for i in 0..self.cur_rblen {
            self.repair_block[i] = self.make_repair_packet(i);
        }
    }

    fn make_repair_packet(&self, index: usize) -> Option<Packet> {
        let Some(mut packet) = self.packet_factory.new_packet() else {
            error!("fec block writer: can't allocate packet");
            return None;
        };

        let Some(mut buffer) = self.packet_factory.new_packet_buffer() else {
            error!("fec block writer: can't allocate buffer");
            return None;
        };

        if !self
            .repair_composer
            .align(&mut buffer, 0, self.encoder.buffer_alignment())
        {
            error!("fec block writer: can't align packet buffer");
            return None;
        }

        if !self
            .repair_composer
            .prepare(&mut packet, buffer, self.cur_payload_size)
        {
            error!("fec block writer: can't prepare packet");
            return None;
        }
        packet.add_flags(PacketFlags::PREPARED);

        self.validate_fec_packet(&packet);
        self.fill_packet_fec_fields(&mut packet, self.cur_sblen + index);

        if let Some(fec) = packet.fec_mut() {
            fec.repair_seqnum = Some(self.cur_block_repair_sn.wrapping_add(index as SeqNum));
        }

        Some(packet)
    }

    fn encode_repair_packets(&mut self) {
        let mut buffers: Vec<Option<&mut [u8]>> = self
            .repair_block
            .iter_mut()
            .map(|slot| slot.as_mut().map(|packet| packet.fec_payload_mut()))
            .collect();

        self.encoder.fill_buffers(&mut buffers);
    }

    fn emit_repair_packets(&mut self) -> Result<(), FecError> {
        for i in 0..self.cur_rblen {
            let Some(mut packet) = self.repair_block[i].take() else {
                continue;
            };

            if !self.repair_composer.compose(&mut packet) {
                error!(
                    "fec block writer: can't compose repair packet: sbn={} index={}",
                    self.cur_sbn, i
                );
                self.clear_repair_block();
                return Err(self.shutdown(FecError::ComposeFailed("repair")));
            }
            packet.add_flags(PacketFlags::COMPOSED);

            if let Err(e) = self.writer.write(packet) {
                error!("fec block writer: can't write repair packet, shutting down: {}", e);
                self.clear_repair_block();
                return Err(self.shutdown(e.into()));
            }
        }

        Ok(())
    }

    fn clear_repair_block(&mut self) {
        self.repair_block.iter_mut().for_each(|slot| *slot = None);
    }

    fn fill_packet_fec_fields(&self, packet: &mut Packet, esi: usize) {
        if let Some(fec) = packet.fec_mut() {
            fec.encoding_symbol_id = esi;
            fec.source_block_number = self.cur_sbn;
            fec.source_block_length = self.cur_sblen;
            fec.block_length = self.cur_sblen + self.cur_rblen;
        }
    }

    fn validate_fec_packet(&self, packet: &Packet) {
        if !packet.has_flags(PacketFlags::PREPARED) {
            panic!("fec block writer: unexpected packet: should be prepared");
        }

        if packet.has_flags(PacketFlags::COMPOSED) {
            panic!("fec block writer: unexpected packet: should not be composed");
        }

        let Some(fec) = packet.fec() else {
            panic!("fec block writer: unexpected non-fec packet");
        };

        if fec.fec_scheme != self.fec_scheme {
            panic!(
                "fec block writer: unexpected packet fec scheme: packet_scheme={} session_scheme={}",
                fec.fec_scheme, self.fec_scheme
            );
        }
    }

    fn validate_source_packet(&mut self, packet: &Packet) -> Result<(), FecError> {
        let payload_size = packet.fec_payload().len();

        if payload_size != self.cur_payload_size {
            error!(
                "fec block writer: can't change payload size in the middle of a block: \
                 sbn={} esi={} old_size={} new_size={}",
                self.cur_sbn, self.cur_packet, self.cur_payload_size, payload_size
            );
            return Err(self.shutdown(FecError::PayloadSizeChanged {
                sbn: self.cur_sbn,
                esi: self.cur_packet,
                old: self.cur_payload_size,
                new: payload_size,
            }));
        }

        Ok(())
    }

    fn update_block_duration(&mut self, packet: &Packet) {
        let timestamp = packet.stream_timestamp();
        let block_dur = self
            .prev_block_timestamp
            .map_or(0, |prev| stream_timestamp_diff(timestamp, prev));

        if block_dur < 0 {
            trace!(
                "fec block writer: negative block duration: prev_ts={:?} curr_ts={}",
                self.prev_block_timestamp,
                timestamp
            );
            self.prev_block_timestamp = None;
        } else {
            self.block_max_duration = self.block_max_duration.max(block_dur);
            self.prev_block_timestamp = Some(timestamp);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PacketError;
    use crate::fec::parity::ParityEncoder;
    use crate::packet::{
        packet_channel, ChannelWriter, Fec, FecComposer, PacketPool, PayloadId, VecWriter,
        PAYLOAD_ID_SIZE, RTP_HEADER_SIZE,
    };
    use bytes::BytesMut;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SCHEME: FecScheme = FecScheme::ReedSolomonM8;
    const PAYLOAD_SIZE: usize = 32;

    fn make_writer<W: PacketWriter>(
        sblen: usize,
        rblen: usize,
        encoder: Box<dyn BlockEncoder>,
        factory: Arc<dyn PacketFactory>,
        writer: W,
    ) -> BlockWriter<W> {
        let mut rng = StdRng::seed_from_u64(7);
        BlockWriter::new(
            &BlockWriterConfig {
                n_source_packets: sblen,
                n_repair_packets: rblen,
            },
            SCHEME,
            encoder,
            writer,
            Box::new(FecComposer::source(SCHEME)),
            Box::new(FecComposer::repair(SCHEME)),
            factory,
            &mut rng,
        )
    }

    fn new_writer(sblen: usize, rblen: usize) -> BlockWriter<VecWriter> {
        make_writer(
            sblen,
            rblen,
            Box::new(ParityEncoder::new(16)),
            Arc::new(PacketPool::new(256, 16)),
            VecWriter::new(),
        )
    }

    fn source_packet(payload_size: usize, timestamp: StreamTimestamp) -> Packet {
        let composer = FecComposer::source(SCHEME);
        let mut packet = Packet::new();
        let buffer = BytesMut::zeroed(RTP_HEADER_SIZE + payload_size + PAYLOAD_ID_SIZE);
        assert!(composer.prepare(&mut packet, buffer, payload_size));
        packet.add_flags(PacketFlags::PREPARED);

        let rtp = packet.rtp_mut().unwrap();
        rtp.stream_timestamp = timestamp;
        rtp.seqnum = timestamp as SeqNum;
        for (i, b) in packet.rtp_payload_mut().iter_mut().enumerate() {
            *b = (timestamp as usize * 31 + i) as u8;
        }
        packet
    }

    fn fec_of(packet: &Packet) -> &Fec {
        packet.fec().unwrap()
    }

    #[test]
    fn test_block_layout() {
        let mut writer = new_writer(4, 2);
        assert!(writer.init_status().is_ok());

        let sbn = writer.current_sbn();
        let rsn = writer.repair_seqnum_base();

        for n in 0..4 {
            writer.write(source_packet(PAYLOAD_SIZE, n * 10)).unwrap();
        }

        let packets = writer.writer_mut().take();
        assert_eq!(packets.len(), 6);

        for (esi, packet) in packets.iter().enumerate() {
            let fec = fec_of(packet);
            assert_eq!(fec.encoding_symbol_id, esi);
            assert_eq!(fec.source_block_number, sbn);
            assert_eq!(fec.source_block_length, 4);
            assert_eq!(fec.block_length, 6);
            assert!(packet.has_flags(PacketFlags::PREPARED | PacketFlags::COMPOSED));
            assert_eq!(fec.payload.len(), RTP_HEADER_SIZE + PAYLOAD_SIZE);

            let id_offset = fec.payload_id.start;
            let id = PayloadId::read_from(&packet.data()[id_offset..]).unwrap();
            assert_eq!(id.encoding_symbol_id as usize, esi);
            assert_eq!(id.source_block_number, sbn);
        }

        assert!(packets[..4].iter().all(|p| p.has_flags(PacketFlags::AUDIO)));
        assert!(packets[4..].iter().all(|p| p.has_flags(PacketFlags::REPAIR)));
        assert_eq!(fec_of(&packets[4]).repair_seqnum, Some(rsn));
        assert_eq!(fec_of(&packets[5]).repair_seqnum, Some(rsn.wrapping_add(1)));

        assert_eq!(writer.current_sbn(), sbn.wrapping_add(1));
        assert_eq!(writer.repair_seqnum_base(), rsn.wrapping_add(2));
    }

    #[test]
    fn test_repair_payload() {
        let mut writer = new_writer(4, 2);
        for n in 0..4 {
            writer.write(source_packet(PAYLOAD_SIZE, n * 10)).unwrap();
        }
        let packets = writer.writer_mut().take();

        for r in 0..2 {
            let mut expected = vec![0u8; RTP_HEADER_SIZE + PAYLOAD_SIZE];
            for source in packets[..4].iter().skip(r).step_by(2) {
                for (dst, src) in expected.iter_mut().zip(source.fec_payload()) {
                    *dst ^= src;
                }
            }
            assert_eq!(packets[4 + r].fec_payload(), &expected[..]);
        }
    }

    #[test]
    fn test_next_block() {
        let mut writer = new_writer(4, 2);
        let sbn = writer.current_sbn();

        for n in 0..6 {
            writer.write(source_packet(PAYLOAD_SIZE, n * 10)).unwrap();
        }

        let packets = writer.writer_mut().take();
        assert_eq!(packets.len(), 8);

        let fec = fec_of(&packets[6]);
        assert_eq!(fec.source_block_number, sbn.wrapping_add(1));
        assert_eq!(fec.encoding_symbol_id, 0);
        assert_eq!(fec_of(&packets[7]).encoding_symbol_id, 1);
    }

    #[test]
    fn test_resize_deferred() {
        let mut writer = new_writer(4, 2);

        writer.write(source_packet(PAYLOAD_SIZE, 0)).unwrap();
        writer.write(source_packet(PAYLOAD_SIZE, 10)).unwrap();

        writer.resize(2, 1).unwrap();
        assert_eq!(writer.sblen(), 4);
        assert_eq!(writer.rblen(), 2);

        writer.write(source_packet(PAYLOAD_SIZE, 20)).unwrap();
        writer.write(source_packet(PAYLOAD_SIZE, 30)).unwrap();

        let packets = writer.writer_mut().take();
        assert_eq!(packets.len(), 6);
        assert!(packets.iter().all(|p| fec_of(p).block_length == 6));

        writer.write(source_packet(PAYLOAD_SIZE, 40)).unwrap();
        writer.write(source_packet(PAYLOAD_SIZE, 50)).unwrap();
        assert_eq!(writer.sblen(), 2);
        assert_eq!(writer.rblen(), 1);

        let packets = writer.writer_mut().take();
        assert_eq!(packets.len(), 3);
        assert!(packets.iter().all(|p| fec_of(p).source_block_length == 2));
        assert!(packets.iter().all(|p| fec_of(p).block_length == 3));
        assert_eq!(fec_of(&packets[2]).encoding_symbol_id, 2);
    }

    #[test]
    fn test_resize_rejected() {
        let mut writer = new_writer(4, 2);

        assert_eq!(writer.resize(0, 2), Err(FecError::ZeroSourceBlock));
        assert_eq!(
            writer.resize(10, 7),
            Err(FecError::BlockTooLong {
                requested: 17,
                max: 16
            })
        );
        assert!(writer.resize(4, 2).is_ok());
        assert!(writer.resize(10, 6).is_ok());
        assert!(writer.is_alive());
    }

    #[test]
    fn test_block_duration() {
        let mut writer = new_writer(1, 1);

        for ts in [0, 100, 250] {
            writer.write(source_packet(PAYLOAD_SIZE, ts)).unwrap();
        }
        assert_eq!(writer.max_block_duration(), 150);

        // regression: not recorded, baseline dropped
        writer.write(source_packet(PAYLOAD_SIZE, 200)).unwrap();
        assert_eq!(writer.max_block_duration(), 150);

        writer.write(source_packet(PAYLOAD_SIZE, 5000)).unwrap();
        assert_eq!(writer.max_block_duration(), 150);

        writer.write(source_packet(PAYLOAD_SIZE, 5400)).unwrap();
        assert_eq!(writer.max_block_duration(), 400);

        writer.resize(2, 1).unwrap();
        assert_eq!(writer.max_block_duration(), 0);
    }

    #[test]
    fn test_payload_size_change() {
        let mut writer = new_writer(4, 2);

        writer.write(source_packet(PAYLOAD_SIZE, 0)).unwrap();
        let err = writer.write(source_packet(PAYLOAD_SIZE + 8, 10)).unwrap_err();
        assert!(matches!(
            err,
            FecError::PayloadSizeChanged {
                esi: 1,
                old: 44,
                new: 52,
                ..
            }
        ));
        assert!(!writer.is_alive());

        assert_eq!(
            writer.write(source_packet(PAYLOAD_SIZE, 20)),
            Err(FecError::Dead)
        );
        assert_eq!(writer.writer().len(), 1);
    }

    #[test]
    fn test_zero_payload() {
        let mut writer = new_writer(4, 2);

        let mut packet = Packet::new();
        packet.set_fec(Fec::new(SCHEME));
        packet.add_flags(PacketFlags::PREPARED);

        assert_eq!(writer.write(packet), Err(FecError::ZeroPayload));
        assert!(!writer.is_alive());
    }

    struct RejectingEncoder;

    impl BlockEncoder for RejectingEncoder {
        fn init_status(&self) -> Result<(), FecError> {
            Ok(())
        }

        fn max_block_length(&self) -> usize {
            255
        }

        fn buffer_alignment(&self) -> usize {
            8
        }

        fn begin_block(&mut self, _sblen: usize, _rblen: usize, _payload_size: usize) -> bool {
            false
        }

        fn set_buffer(&mut self, _index: usize, _data: &[u8]) {
            unreachable!()
        }

        fn fill_buffers(&mut self, _repair: &mut [Option<&mut [u8]>]) {
            unreachable!()
        }

        fn end_block(&mut self) {}
    }

    /// Fills repair symbol `i` with byte `0xa0 + i` and records which slots
    /// were present
    struct PatternEncoder {
        filled: Arc<std::sync::Mutex<Vec<bool>>>,
    }

    impl BlockEncoder for PatternEncoder {
        fn init_status(&self) -> Result<(), FecError> {
            Ok(())
        }

        fn max_block_length(&self) -> usize {
            255
        }

        fn buffer_alignment(&self) -> usize {
            8
        }

        fn begin_block(&mut self, _sblen: usize, _rblen: usize, _payload_size: usize) -> bool {
            true
        }

        fn set_buffer(&mut self, _index: usize, _data: &[u8]) {}

        fn fill_buffers(&mut self, repair: &mut [Option<&mut [u8]>]) {
            let mut filled = self.filled.lock().unwrap();
            filled.clear();
            for (i, slot) in repair.iter_mut().enumerate() {
                filled.push(slot.is_some());
                if let Some(buffer) = slot {
                    buffer.fill(0xa0 + i as u8);
                }
            }
        }

        fn end_block(&mut self) {}
    }

    #[test]
    fn test_encoder_fills_repair_packets() {
        let filled = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut writer = make_writer(
            2,
            3,
            Box::new(PatternEncoder {
                filled: filled.clone(),
            }),
            Arc::new(PacketPool::new(256, 16).with_max_buffers(2)),
            VecWriter::new(),
        );

        writer.write(source_packet(PAYLOAD_SIZE, 0)).unwrap();
        writer.write(source_packet(PAYLOAD_SIZE, 10)).unwrap();

        // Third repair packet has no buffer left.
        assert_eq!(*filled.lock().unwrap(), vec![true, true, false]);

        let packets = writer.writer_mut().take();
        assert_eq!(packets.len(), 4);
        for (i, packet) in packets[2..].iter().enumerate() {
            assert!(packet.has_flags(PacketFlags::REPAIR));
            assert_eq!(packet.fec_payload().len(), RTP_HEADER_SIZE + PAYLOAD_SIZE);
            assert!(packet.fec_payload().iter().all(|&b| b == 0xa0 + i as u8));
        }
    }

    #[test]
    fn test_block_rejected() {
        let mut writer = make_writer(
            4,
            2,
            Box::new(RejectingEncoder),
            Arc::new(PacketPool::new(256, 16)),
            VecWriter::new(),
        );

        assert_eq!(
            writer.write(source_packet(PAYLOAD_SIZE, 0)),
            Err(FecError::BlockRejected {
                sblen: 4,
                rblen: 2,
                payload_size: RTP_HEADER_SIZE + PAYLOAD_SIZE
            })
        );
        assert!(!writer.is_alive());
        assert!(writer.writer().is_empty());
    }

    #[test]
    fn test_failing_factory() {
        let mut writer = make_writer(
            2,
            2,
            Box::new(ParityEncoder::new(16)),
            Arc::new(PacketPool::new(256, 16).with_max_buffers(0)),
            VecWriter::new(),
        );
        let sbn = writer.current_sbn();

        for n in 0..4 {
            writer.write(source_packet(PAYLOAD_SIZE, n * 10)).unwrap();
        }

        let packets = writer.writer_mut().take();
        assert_eq!(packets.len(), 4);
        assert!(packets.iter().all(|p| p.has_flags(PacketFlags::AUDIO)));
        assert!(writer.is_alive());
        assert_eq!(writer.current_sbn(), sbn.wrapping_add(2));
    }

    #[test]
    fn test_downstream_failure() {
        let (channel, rx) = packet_channel(1);
        let mut writer: BlockWriter<ChannelWriter> = make_writer(
            4,
            2,
            Box::new(ParityEncoder::new(16)),
            Arc::new(PacketPool::new(256, 16)),
            channel,
        );

        writer.write(source_packet(PAYLOAD_SIZE, 0)).unwrap();
        assert_eq!(
            writer.write(source_packet(PAYLOAD_SIZE, 10)),
            Err(FecError::Downstream(PacketError::Full))
        );
        assert!(!writer.is_alive());
        assert_eq!(rx.len(), 1);
    }

    #[test]
    fn test_init_failure() {
        let writer = make_writer(
            4,
            2,
            Box::new(ParityEncoder::new(1)),
            Arc::new(PacketPool::new(256, 16)),
            VecWriter::new(),
        );
        assert!(matches!(writer.init_status(), Err(FecError::EncoderInit(_))));

        let writer = new_writer(12, 8);
        assert_eq!(
            writer.init_status(),
            Err(FecError::BlockTooLong {
                requested: 20,
                max: 16
            })
        );
    }

    #[test]
    #[should_panic(expected = "used after failed construction")]
    fn test_use_after_init_failure() {
        let mut writer = new_writer(0, 2);
        let _ = writer.write(source_packet(PAYLOAD_SIZE, 0));
    }

    #[test]
    #[should_panic(expected = "used after failed construction")]
    fn test_accessor_after_init_failure() {
        let writer = new_writer(0, 2);
        let _ = writer.current_sbn();
    }

    #[test]
    #[should_panic(expected = "should be prepared")]
    fn test_unprepared_packet() {
        let mut writer = new_writer(4, 2);
        let mut packet = Packet::new();
        packet.set_fec(Fec::new(SCHEME));
        let _ = writer.write(packet);
    }

    #[test]
    #[should_panic(expected = "should not be composed")]
    fn test_composed_packet() {
        let mut writer = new_writer(4, 2);
        let mut packet = source_packet(PAYLOAD_SIZE, 0);
        packet.add_flags(PacketFlags::COMPOSED);
        let _ = writer.write(packet);
    }

    #[test]
    #[should_panic(expected = "unexpected non-fec packet")]
    fn test_non_fec_packet() {
        let mut writer = new_writer(4, 2);
        let mut packet = Packet::new();
        packet.add_flags(PacketFlags::PREPARED);
        let _ = writer.write(packet);
    }

    #[test]
    #[should_panic(expected = "unexpected packet fec scheme")]
    fn test_wrong_scheme() {
        let mut writer = new_writer(4, 2);
        let mut packet = Packet::new();
        packet.set_fec(Fec::new(FecScheme::LdpcStaircase));
        packet.add_flags(PacketFlags::PREPARED);
        let _ = writer.write(packet);
    }
}

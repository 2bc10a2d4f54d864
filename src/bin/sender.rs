//! Audio Sender Application
//!
//! Generates a test tone, resamples it to the output rate, packetizes it into
//! 16-bit PCM RTP packets and protects them with FEC blocks. Composed packets
//! are drained by a consumer thread standing in for the network transport.

use anyhow::{anyhow, Context, Result};
use bytes::BytesMut;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audio_fec_stream::{
    audio::StreamResampler,
    config::AppConfig,
    fec::{BlockWriter, ParityEncoder},
    packet::{
        packet_channel, ChannelWriter, Composer, FecComposer, Packet, PacketFactory,
        PacketFlags, PacketPool,
    },
};

/// Sine generator producing interleaved frames
struct ToneSource {
    phase: f32,
    step: f32,
    channels: usize,
}

impl ToneSource {
    fn new(tone_hz: f32, sample_rate: u32, channels: usize) -> Self {
        Self {
            phase: 0.0,
            step: std::f32::consts::TAU * tone_hz / sample_rate as f32,
            channels,
        }
    }

    fn fill(&mut self, frame: &mut [f32]) {
        for samples in frame.chunks_mut(self.channels) {
            samples.fill(0.5 * self.phase.sin());
            self.phase = (self.phase + self.step) % std::f32::consts::TAU;
        }
    }
}

/// Pull resampled samples, pushing generated input as needed
fn render(resampler: &mut StreamResampler, source: &mut ToneSource, out: &mut [f32]) {
    let mut filled = 0;
    while filled < out.len() {
        filled += resampler.pop_output(&mut out[filled..]);
        if filled < out.len() {
            source.fill(resampler.begin_push_input());
            resampler.end_push_input();
        }
    }
}

struct Packetizer {
    composer: FecComposer,
    pool: Arc<PacketPool>,
    source_id: u32,
    seqnum: u16,
    timestamp: u32,
    payload_type: u8,
}

impl Packetizer {
    fn packetize(&mut self, samples: &[f32], duration: u32) -> Option<Packet> {
        let mut packet = self.pool.new_packet()?;
        let buffer: BytesMut = self.pool.new_packet_buffer()?;

        let payload_size = samples.len() * 2;
        if !self.composer.prepare(&mut packet, buffer, payload_size) {
            tracing::warn!("Packet buffer too small for {} byte payload", payload_size);
            return None;
        }
        packet.add_flags(PacketFlags::PREPARED);

        for (out, sample) in packet.rtp_payload_mut().chunks_exact_mut(2).zip(samples) {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            out.copy_from_slice(&value.to_be_bytes());
        }

        let rtp = packet.rtp_mut()?;
        rtp.source_id = self.source_id;
        rtp.seqnum = self.seqnum;
        rtp.stream_timestamp = self.timestamp;
        rtp.duration = duration;
        rtp.payload_type = self.payload_type;

        self.seqnum = self.seqnum.wrapping_add(1);
        self.timestamp = self.timestamp.wrapping_add(duration);

        Some(packet)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting FEC audio sender");

    // Config path from args or the per-user default
    let config_path = match std::env::args().nth(1) {
        Some(path) => PathBuf::from(path),
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let in_spec = config.stream.input_spec();
    let out_spec = config.stream.output_spec();
    let channels = out_spec.num_channels();

    let mut resampler = StreamResampler::new(config.resampler.profile, in_spec, out_spec)?;
    resampler.set_scaling(
        in_spec.sample_rate(),
        out_spec.sample_rate(),
        config.resampler.scaling_multiplier,
    )?;

    tracing::info!(
        "Resampler initialized: {} -> {}, profile {}, frame size {}",
        in_spec,
        out_spec,
        config.resampler.profile.as_str(),
        resampler.frame_size()
    );

    let pool = Arc::new(PacketPool::new(
        config.fec.packet_buffer_size,
        config.fec.pool_capacity,
    ));
    let (channel_writer, rx) = packet_channel(config.stream.channel_capacity);

    let mut rng = rand::thread_rng();
    let scheme = config.fec.scheme;

    let mut block_writer: BlockWriter<ChannelWriter> = BlockWriter::new(
        &config.fec.block,
        scheme,
        Box::new(ParityEncoder::new(config.fec.max_block_length)),
        channel_writer,
        Box::new(FecComposer::source(scheme)),
        Box::new(FecComposer::repair(scheme)),
        pool.clone(),
        &mut rng,
    );
    block_writer.init_status()?;

    tracing::info!(
        "FEC block writer initialized: scheme {}, {} source + {} repair packets",
        scheme,
        config.fec.block.n_source_packets,
        config.fec.block.n_repair_packets
    );

    // Consumer thread standing in for the transport
    let consumer_pool = pool.clone();
    let consumer = std::thread::spawn(move || {
        let mut source_packets = 0u64;
        let mut repair_packets = 0u64;
        let mut bytes = 0u64;

        for packet in rx.iter() {
            if packet.has_flags(PacketFlags::REPAIR) {
                repair_packets += 1;
            } else {
                source_packets += 1;
            }
            bytes += packet.data().len() as u64;

            if (source_packets + repair_packets) % 1000 == 0 {
                tracing::info!(
                    "Stats: {} source packets, {} repair packets, {:.1} KB",
                    source_packets,
                    repair_packets,
                    bytes as f64 / 1024.0
                );
            }

            consumer_pool.recycle(packet);
        }

        (source_packets, repair_packets)
    });

    let mut packetizer = Packetizer {
        composer: FecComposer::source(scheme),
        pool: pool.clone(),
        source_id: rng.gen(),
        seqnum: rng.gen(),
        timestamp: rng.gen(),
        payload_type: config.stream.payload_type,
    };

    let mut source = ToneSource::new(config.stream.tone_hz, in_spec.sample_rate(), channels);
    let packet_samples = config.stream.packet_samples;
    let mut samples = vec![0.0f32; packet_samples * channels];

    let packet_duration = Duration::from_micros(out_spec.duration_us(samples.len()));
    let mut interval = tokio::time::interval(packet_duration);
    let mut sent = 0usize;

    tracing::info!("Starting main loop - press Ctrl+C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                break;
            }
            _ = interval.tick() => {}
        }

        render(&mut resampler, &mut source, &mut samples);

        let Some(packet) = packetizer.packetize(&samples, packet_samples as u32) else {
            tracing::warn!("Dropping packet: allocation failed");
            continue;
        };

        if let Err(e) = block_writer.write(packet) {
            tracing::error!("FEC writer stopped: {}", e);
            break;
        }

        sent += 1;
        if config.stream.packet_count != 0 && sent >= config.stream.packet_count {
            break;
        }
    }

    tracing::info!(
        "Max block duration: {} samples",
        block_writer.max_block_duration()
    );

    // Dropping the writer closes the channel
    drop(block_writer);
    let (source_packets, repair_packets) = consumer
        .join()
        .map_err(|_| anyhow!("Consumer thread panicked"))?;

    tracing::info!(
        "Done: {} source packets, {} repair packets, {} packets dropped by pool",
        source_packets,
        repair_packets,
        pool.exhausted_count()
    );

    Ok(())
}

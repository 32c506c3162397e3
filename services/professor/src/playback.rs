//! Audio output through the default cpal device.
//!
//! The cpal stream is not `Send`, so it lives on a dedicated playback thread
//! that owns the ring-buffer producer; the async side only talks to that
//! thread over a channel. Clips are resampled from the voice payload rate to
//! the device rate before being pushed.

use anasagashi_utils::audio;
use anasagashi_utils::sink::AudioSink;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FrameCount, StreamConfig};
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use rubato::Resampler;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, watch};

/// Fixed frame count per output-stream callback.
const OUTPUT_CHUNK_SIZE: usize = 1024;
/// How much audio the hand-off buffer holds before the pusher blocks.
const OUTPUT_LATENCY_MS: usize = 1000;

struct PlayRequest {
    samples: Vec<f32>,
    sample_rate: u32,
    done: oneshot::Sender<()>,
}

pub struct CpalSink {
    cmd_tx: std::sync::mpsc::Sender<PlayRequest>,
    playing_tx: Arc<watch::Sender<bool>>,
}

fn default_output() -> Result<cpal::Device> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| anyhow!("No default audio output device"))
}

impl CpalSink {
    pub fn new() -> Result<CpalSink> {
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<PlayRequest>();
        let (playing_tx, _) = watch::channel(false);
        let playing_tx = Arc::new(playing_tx);
        let playing_for_thread = playing_tx.clone();
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();

        std::thread::Builder::new()
            .name("audio-playback".to_string())
            .spawn(move || {
                playback_thread(cmd_rx, playing_for_thread, ready_tx);
            })
            .context("Failed to spawn playback thread")?;

        ready_rx
            .recv()
            .context("Playback thread exited before reporting readiness")??;

        Ok(CpalSink {
            cmd_tx,
            playing_tx,
        })
    }
}

#[async_trait]
impl AudioSink for CpalSink {
    async fn play(&self, samples: Vec<f32>, sample_rate: u32) {
        if samples.is_empty() {
            return;
        }
        let (done_tx, done_rx) = oneshot::channel();
        let request = PlayRequest {
            samples,
            sample_rate,
            done: done_tx,
        };
        if self.cmd_tx.send(request).is_err() {
            // Playback thread is gone; treat as environment rejection.
            tracing::warn!("Playback thread unavailable, dropping clip");
            self.playing_tx.send_replace(false);
            return;
        }
        if done_rx.await.is_err() {
            tracing::warn!("Playback thread dropped a clip mid-play");
            self.playing_tx.send_replace(false);
        }
    }

    fn is_playing(&self) -> watch::Receiver<bool> {
        self.playing_tx.subscribe()
    }
}

fn playback_thread(
    cmd_rx: std::sync::mpsc::Receiver<PlayRequest>,
    playing_tx: Arc<watch::Sender<bool>>,
    ready_tx: std::sync::mpsc::Sender<Result<()>>,
) {
    let setup = || -> Result<(cpal::Stream, ringbuf::HeapProd<f32>, u32)> {
        let output = default_output()?;
        tracing::info!("Using output device: {:?}", output.name()?);

        let output_config = output
            .default_output_config()
            .context("Failed to get default output config")?;
        let output_config = StreamConfig {
            channels: output_config.channels(),
            sample_rate: output_config.sample_rate(),
            buffer_size: cpal::BufferSize::Fixed(FrameCount::from(OUTPUT_CHUNK_SIZE as u32)),
        };
        let output_channel_count = output_config.channels as usize;
        let output_sample_rate = output_config.sample_rate.0;
        tracing::debug!("Output stream config: {:?}", &output_config);

        let buffer =
            audio::shared_buffer(output_sample_rate as usize * OUTPUT_LATENCY_MS / 1000);
        let (producer, mut consumer) = buffer.split();

        // Mono samples fanned out to the first two channels; silence when the
        // buffer runs dry.
        let output_data_fn = move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let mut sample_index = 0;
            while sample_index < data.len() {
                let sample = consumer.try_pop().unwrap_or(0.0);
                if sample_index < data.len() {
                    data[sample_index] = sample;
                    sample_index += 1;
                }
                if output_channel_count > 1 && sample_index < data.len() {
                    data[sample_index] = sample;
                    sample_index += 1;
                }
                sample_index += output_channel_count.saturating_sub(2);
            }
        };

        let stream = output.build_output_stream(
            &output_config,
            output_data_fn,
            move |err| tracing::error!("An error occurred on output stream: {}", err),
            None,
        )?;
        stream.play()?;
        Ok((stream, producer, output_sample_rate))
    };

    // The stream must outlive the loop; dropping it stops the device.
    let (_stream, mut producer, device_rate) = match setup() {
        Ok(parts) => {
            let _ = ready_tx.send(Ok(()));
            parts
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    while let Ok(request) = cmd_rx.recv() {
        playing_tx.send_replace(true);
        if let Err(e) = play_one(&mut producer, device_rate, &request) {
            tracing::warn!("Playback failed: {e:#}");
        }
        playing_tx.send_replace(false);
        let _ = request.done.send(());
    }
}

fn play_one(
    producer: &mut ringbuf::HeapProd<f32>,
    device_rate: u32,
    request: &PlayRequest,
) -> Result<()> {
    let mut push = |sample: f32| {
        // Blocking this thread on a full buffer is the backpressure.
        let mut s = sample;
        loop {
            match producer.try_push(s) {
                Ok(()) => break,
                Err(rejected) => {
                    s = rejected;
                    std::thread::sleep(Duration::from_millis(5));
                }
            }
        }
    };

    if request.sample_rate == device_rate {
        for &sample in &request.samples {
            push(sample);
        }
    } else {
        let mut resampler = audio::create_resampler(
            request.sample_rate as f64,
            device_rate as f64,
            OUTPUT_CHUNK_SIZE,
        )?;
        let chunk_size = resampler.input_frames_next();
        for chunk in audio::split_for_chunks(&request.samples, chunk_size) {
            let resampled = resampler.process(&[chunk.as_slice()], None)?;
            if let Some(channel) = resampled.first() {
                for &sample in channel {
                    push(sample);
                }
            }
        }
    }

    // Drain before declaring the clip finished.
    while producer.occupied_len() > 0 {
        std::thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}

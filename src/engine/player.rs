//! Real-time audio playback using cpal
//!
//! Every allocated stream is its own cpal output stream on the same device,
//! so several drivers playing at once rely on the host's mixer to combine
//! them. Blocks reach the callback through a lock-free ring: neither side
//! ever waits on the other.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};

use super::backend::{AudioBackend, StreamHandle, StreamSpec};
use super::{Error, Result};
use crate::synth::Sample;

/// One cpal output stream and the producer half of the ring it drains
struct PlayerStream {
    stream: Stream,
    producer: HeapProd<Sample>,
    block_size: usize,
}

/// Ring holding up to two blocks.
///
/// Readiness admits a block only while less than one block is queued, so an
/// admitted block always fits.
fn sample_ring(block_size: usize) -> (HeapProd<Sample>, HeapCons<Sample>) {
    HeapRb::new(block_size.max(1) * 2).split()
}

/// Whether the ring has drained below one block
fn has_room(producer: &HeapProd<Sample>, block_size: usize) -> bool {
    producer.occupied_len() < block_size
}

/// Fill an interleaved device buffer from the ring.
///
/// Each mono sample is copied to every channel of its frame; an empty ring
/// plays silence.
fn drain_into<T: cpal::Sample + cpal::FromSample<Sample>>(
    consumer: &mut HeapCons<Sample>,
    data: &mut [T],
    channels: usize,
) {
    for frame in data.chunks_mut(channels.max(1)) {
        let sample = consumer.try_pop().unwrap_or(0);
        for channel_sample in frame.iter_mut() {
            *channel_sample = T::from_sample(sample);
        }
    }
}

/// Real-time audio output through the default cpal host
pub struct CpalBackend {
    device: Device,
    streams: Vec<Option<PlayerStream>>,
}

impl CpalBackend {
    /// Open the named output device, or the default one
    pub fn new(device_name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();
        let device = match device_name {
            Some(search) => {
                let search_lower = search.to_lowercase();
                let devices = host
                    .output_devices()
                    .map_err(|e| Error::Stream(e.to_string()))?;
                devices
                    .into_iter()
                    .find(|d| {
                        d.name()
                            .map(|n| n.to_lowercase().contains(&search_lower))
                            .unwrap_or(false)
                    })
                    .ok_or_else(|| Error::DeviceNotFound(search.to_string()))?
            }
            None => host.default_output_device().ok_or(Error::NoDevice)?,
        };

        tracing::info!(
            host = host.id().name(),
            device = %device.name().unwrap_or_default(),
            "cpal backend initialized"
        );

        Ok(Self {
            device,
            streams: Vec::new(),
        })
    }

    fn stream(&self, handle: &StreamHandle) -> Option<&PlayerStream> {
        self.streams.get(handle.id()).and_then(Option::as_ref)
    }

    fn build_stream<T: cpal::Sample + cpal::SizedSample + cpal::FromSample<Sample>>(
        &self,
        config: &StreamConfig,
        mut consumer: HeapCons<Sample>,
    ) -> Result<Stream> {
        let channels = config.channels as usize;

        let stream = self
            .device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    drain_into(&mut consumer, data, channels);
                },
                |err| {
                    tracing::error!(%err, "audio stream error");
                },
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;

        Ok(stream)
    }
}

impl AudioBackend for CpalBackend {
    fn name(&self) -> &'static str {
        "cpal"
    }

    fn allocate(&mut self, spec: StreamSpec) -> Result<StreamHandle> {
        let default_config = self
            .device
            .default_output_config()
            .map_err(|e| Error::Stream(e.to_string()))?;
        let sample_format = default_config.sample_format();
        let config = StreamConfig {
            channels: spec.channel_count,
            sample_rate: cpal::SampleRate(spec.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (producer, consumer) = sample_ring(spec.block_size);
        let stream = match sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(&config, consumer)?,
            SampleFormat::I16 => self.build_stream::<i16>(&config, consumer)?,
            SampleFormat::U16 => self.build_stream::<u16>(&config, consumer)?,
            other => return Err(Error::UnsupportedFormat(format!("{:?}", other))),
        };

        self.streams.push(Some(PlayerStream {
            stream,
            producer,
            block_size: spec.block_size,
        }));
        let id = self.streams.len() - 1;
        tracing::info!(
            stream = id,
            sample_rate = spec.sample_rate,
            channels = spec.channel_count,
            block_size = spec.block_size,
            format = ?sample_format,
            "output stream allocated"
        );
        Ok(StreamHandle::new(id))
    }

    fn begin(&mut self, handle: &StreamHandle) -> Result<()> {
        let player = self.stream(handle).ok_or(Error::UnknownStream(handle.id()))?;
        player.stream.play().map_err(|e| Error::Stream(e.to_string()))
    }

    fn is_ready_for_more_data(&self, handle: &StreamHandle) -> bool {
        self.stream(handle)
            .map(|player| has_room(&player.producer, player.block_size))
            .unwrap_or(false)
    }

    fn write(&mut self, handle: &StreamHandle, block: &[Sample]) -> Result<()> {
        let player = self
            .streams
            .get_mut(handle.id())
            .and_then(Option::as_mut)
            .ok_or(Error::UnknownStream(handle.id()))?;
        let pushed = player.producer.push_slice(block);
        if pushed < block.len() {
            return Err(Error::Stream(format!(
                "sample ring full, dropped {} of {} samples",
                block.len() - pushed,
                block.len()
            )));
        }
        Ok(())
    }

    fn release(&mut self, handle: StreamHandle) {
        if let Some(slot) = self.streams.get_mut(handle.id()) {
            if let Some(player) = slot.take() {
                if let Err(e) = player.stream.pause() {
                    tracing::warn!(stream = handle.id(), %e, "failed to pause stream");
                }
                tracing::info!(stream = handle.id(), "output stream released");
            }
        }
    }
}

/// Get the default output device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device()
        .and_then(|d| d.name().ok())
}

/// List all available output devices
pub fn list_output_devices() -> Vec<(String, StreamConfig)> {
    let host = cpal::default_host();
    let mut devices = Vec::new();

    if let Ok(output_devices) = host.output_devices() {
        for device in output_devices {
            if let (Ok(name), Ok(config)) = (device.name(), device.default_output_config()) {
                devices.push((name, config.into()));
            }
        }
    }

    devices
}

//! WAV file recorder
//!
//! Offline backend that sums every stream into a single 16-bit WAV file.
//! It never applies backpressure: every begun stream is always ready.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use super::backend::{AudioBackend, StreamHandle, StreamSpec};
use super::{Error, Result};
use crate::synth::{Sample, SAMPLE_BITS};

#[derive(Debug)]
struct RecordedStream {
    /// Frames this stream has contributed so far
    cursor: u64,
    playing: bool,
    released: bool,
}

/// WAV file recorder
pub struct WavBackend {
    writer: WavWriter<BufWriter<File>>,
    sample_rate: u32,
    channels: u16,
    streams: Vec<RecordedStream>,
    /// Summed frames not yet written, starting at frame `committed`
    pending: VecDeque<i32>,
    committed: u64,
}

impl WavBackend {
    /// Create a new recorder
    ///
    /// # Arguments
    /// * `path` - Output file path
    /// * `sample_rate` - Sample rate in Hz
    /// * `channels` - Channels in the file; each mono frame is copied to all of them
    pub fn new(path: &Path, sample_rate: u32, channels: u16) -> Result<Self> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: SAMPLE_BITS,
            sample_format: SampleFormat::Int,
        };

        let writer = WavWriter::create(path, spec)?;
        tracing::info!(path = ?path, sample_rate, channels, "recording to WAV");

        Ok(Self {
            writer,
            sample_rate,
            channels,
            streams: Vec::new(),
            pending: VecDeque::new(),
            committed: 0,
        })
    }

    /// Get the sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the number of frames written to the file
    pub fn frames_written(&self) -> u64 {
        self.committed
    }

    /// Get the duration written in seconds
    pub fn duration_secs(&self) -> f64 {
        self.committed as f64 / self.sample_rate as f64
    }

    /// Write out every frame all live streams have moved past
    fn flush_ready(&mut self) -> Result<()> {
        let live_cursor = self
            .streams
            .iter()
            .filter(|s| s.playing && !s.released)
            .map(|s| s.cursor)
            .min();

        let upto = match live_cursor {
            Some(cursor) => cursor,
            None => self.committed + self.pending.len() as u64,
        };
        self.commit_until(upto)
    }

    fn commit_until(&mut self, frame: u64) -> Result<()> {
        while self.committed < frame {
            let Some(sum) = self.pending.pop_front() else {
                break;
            };
            let sample = sum.clamp(Sample::MIN as i32, Sample::MAX as i32) as Sample;
            for _ in 0..self.channels {
                self.writer.write_sample(sample)?;
            }
            self.committed += 1;
        }
        Ok(())
    }

    /// Finalize the WAV file
    ///
    /// Writes whatever is still pending. This must be called to properly
    /// close the file and write the header.
    pub fn finalize(mut self) -> Result<()> {
        let end = self.committed + self.pending.len() as u64;
        self.commit_until(end)?;
        tracing::info!(frames = self.committed, "WAV recording finalized");
        self.writer.finalize()?;
        Ok(())
    }
}

impl AudioBackend for WavBackend {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn allocate(&mut self, spec: StreamSpec) -> Result<StreamHandle> {
        if spec.sample_rate != self.sample_rate {
            return Err(Error::Stream(format!(
                "stream at {} Hz cannot be recorded into a {} Hz file",
                spec.sample_rate, self.sample_rate
            )));
        }
        if spec.bit_depth != SAMPLE_BITS {
            return Err(Error::UnsupportedFormat(format!("{}-bit samples", spec.bit_depth)));
        }

        // Late streams start at the current write position
        self.streams.push(RecordedStream {
            cursor: self.committed,
            playing: false,
            released: false,
        });
        Ok(StreamHandle::new(self.streams.len() - 1))
    }

    fn begin(&mut self, handle: &StreamHandle) -> Result<()> {
        let stream = self
            .streams
            .get_mut(handle.id())
            .filter(|s| !s.released)
            .ok_or(Error::UnknownStream(handle.id()))?;
        stream.cursor = stream.cursor.max(self.committed);
        stream.playing = true;
        Ok(())
    }

    fn is_ready_for_more_data(&self, handle: &StreamHandle) -> bool {
        self.streams
            .get(handle.id())
            .map(|s| s.playing && !s.released)
            .unwrap_or(false)
    }

    fn write(&mut self, handle: &StreamHandle, block: &[Sample]) -> Result<()> {
        let stream = self
            .streams
            .get_mut(handle.id())
            .filter(|s| s.playing && !s.released)
            .ok_or(Error::UnknownStream(handle.id()))?;

        let start = (stream.cursor - self.committed) as usize;
        stream.cursor += block.len() as u64;

        let needed = start + block.len();
        if self.pending.len() < needed {
            self.pending.resize(needed, 0);
        }
        for (i, &sample) in block.iter().enumerate() {
            self.pending[start + i] += sample as i32;
        }

        self.flush_ready()
    }

    fn release(&mut self, handle: StreamHandle) {
        if let Some(stream) = self.streams.get_mut(handle.id()) {
            stream.playing = false;
            stream.released = true;
        }
        if let Err(e) = self.flush_ready() {
            tracing::warn!(%e, "failed to flush WAV frames on release");
        }
    }
}

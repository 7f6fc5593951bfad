//! Paces one waveform against an audio backend

use super::backend::{AudioBackend, StreamHandle, StreamSpec};
use super::Result;
use crate::synth::{Waveform, SAMPLE_BITS};

/// Lifecycle of a [`SynthDriver`]
#[derive(Debug, PartialEq, Eq)]
enum DriverState {
    Created,
    Started(StreamHandle),
    Finished,
}

/// Owns a waveform and the output stream it plays through.
///
/// Blocks are only produced when the backend says it has room, and a
/// not-ready backend makes [`process`](Self::process) return at once rather
/// than wait. Calling `process` outside `start..finish`, or `finish` twice,
/// is a programming error and panics.
#[derive(Debug)]
pub struct SynthDriver {
    waveform: Waveform,
    sample_rate: u32,
    channel_count: u16,
    state: DriverState,
    blocks_written: u64,
}

impl SynthDriver {
    /// Take ownership of a waveform
    pub fn new(waveform: Waveform, sample_rate: u32, channel_count: u16) -> Self {
        Self {
            waveform,
            sample_rate,
            channel_count,
            state: DriverState::Created,
            blocks_written: 0,
        }
    }

    pub fn waveform(&self) -> &Waveform {
        &self.waveform
    }

    /// Mutable access for setting control targets
    pub fn waveform_mut(&mut self) -> &mut Waveform {
        &mut self.waveform
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn blocks_written(&self) -> u64 {
        self.blocks_written
    }

    pub fn is_started(&self) -> bool {
        matches!(self.state, DriverState::Started(_))
    }

    pub fn is_finished(&self) -> bool {
        self.state == DriverState::Finished
    }

    /// The stream shape this driver requests
    pub fn stream_spec(&self) -> StreamSpec {
        StreamSpec {
            block_size: self.waveform.block_size(),
            bit_depth: SAMPLE_BITS,
            sample_rate: self.sample_rate,
            channel_count: self.channel_count,
        }
    }

    /// Settle the waveform, allocate a stream and begin playback
    pub fn start(&mut self, backend: &mut dyn AudioBackend) -> Result<()> {
        assert!(
            self.state == DriverState::Created,
            "synth driver started more than once"
        );

        self.waveform.start();
        let handle = backend.allocate(self.stream_spec())?;
        if let Err(e) = backend.begin(&handle) {
            backend.release(handle);
            return Err(e);
        }

        tracing::debug!(
            backend = backend.name(),
            stream = handle.id(),
            block_size = self.waveform.block_size(),
            shape = self.waveform.shape().name(),
            "synth driver started"
        );
        self.state = DriverState::Started(handle);
        Ok(())
    }

    /// One tick: advance smoothing, then hand over a block if the backend has room.
    ///
    /// Returns whether a block was written.
    pub fn process(&mut self, backend: &mut dyn AudioBackend) -> Result<bool> {
        let handle = match &self.state {
            DriverState::Started(handle) => handle,
            DriverState::Created => panic!("synth driver processed before start"),
            DriverState::Finished => panic!("synth driver processed after finish"),
        };

        self.waveform.process();

        if !backend.is_ready_for_more_data(handle) {
            return Ok(false);
        }

        self.waveform.fill_sample_block();
        backend.write(handle, self.waveform.samples())?;
        self.blocks_written += 1;
        Ok(true)
    }

    /// Release the stream. Must be called exactly once after `start`.
    pub fn finish(&mut self, backend: &mut dyn AudioBackend) {
        match std::mem::replace(&mut self.state, DriverState::Finished) {
            DriverState::Started(handle) => {
                tracing::debug!(
                    stream = handle.id(),
                    blocks = self.blocks_written,
                    "synth driver finished"
                );
                backend.release(handle);
            }
            DriverState::Created => panic!("synth driver finished before start"),
            DriverState::Finished => panic!("synth driver finished twice"),
        }
    }
}

impl Drop for SynthDriver {
    fn drop(&mut self) {
        if let DriverState::Started(handle) = &self.state {
            tracing::warn!(stream = handle.id(), "synth driver dropped without finish");
        }
    }
}

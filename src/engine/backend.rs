//! Audio backend interface
//!
//! A backend is a shared output service. Each [`SynthDriver`](super::SynthDriver)
//! allocates its own stream from it and is the only holder of the returned
//! [`StreamHandle`]; the handle cannot be cloned and is consumed on release.

use super::Result;
use crate::synth::Sample;

/// Shape of a stream requested from a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    /// Samples per block handed to [`AudioBackend::write`]
    pub block_size: usize,
    /// Bits per sample
    pub bit_depth: u16,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Output channels
    pub channel_count: u16,
}

/// Exclusive token for one allocated stream
#[derive(Debug, PartialEq, Eq)]
pub struct StreamHandle {
    id: usize,
}

impl StreamHandle {
    /// Mint a handle. Only backends should call this.
    pub fn new(id: usize) -> Self {
        Self { id }
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

/// Sink that accepts fixed-size blocks of mono PCM
pub trait AudioBackend {
    /// Short backend name for logging
    fn name(&self) -> &'static str;

    /// Reserve a stream sized for `spec`
    fn allocate(&mut self, spec: StreamSpec) -> Result<StreamHandle>;

    /// Start playback of an allocated stream
    fn begin(&mut self, handle: &StreamHandle) -> Result<()>;

    /// Whether the stream has drained enough to take another block.
    ///
    /// This is a poll and must never block.
    fn is_ready_for_more_data(&self, handle: &StreamHandle) -> bool;

    /// Queue one block for playback
    fn write(&mut self, handle: &StreamHandle, block: &[Sample]) -> Result<()>;

    /// Stop and free the stream
    fn release(&mut self, handle: StreamHandle);
}

impl<B: AudioBackend + ?Sized> AudioBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn allocate(&mut self, spec: StreamSpec) -> Result<StreamHandle> {
        (**self).allocate(spec)
    }

    fn begin(&mut self, handle: &StreamHandle) -> Result<()> {
        (**self).begin(handle)
    }

    fn is_ready_for_more_data(&self, handle: &StreamHandle) -> bool {
        (**self).is_ready_for_more_data(handle)
    }

    fn write(&mut self, handle: &StreamHandle, block: &[Sample]) -> Result<()> {
        (**self).write(handle, block)
    }

    fn release(&mut self, handle: StreamHandle) {
        (**self).release(handle)
    }
}

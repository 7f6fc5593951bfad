//! In-process audio sink
//!
//! Keeps every written block in memory and lets the caller decide when a
//! stream reports itself ready. Used for tests and dry runs.

use super::backend::{AudioBackend, StreamHandle, StreamSpec};
use super::{Error, Result};
use crate::synth::Sample;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

/// State of one stream
#[derive(Debug, Clone)]
pub struct MemoryStream {
    pub spec: StreamSpec,
    pub playing: bool,
    pub released: bool,
    /// Every block written, oldest first
    pub blocks: Vec<Vec<Sample>>,
    /// Readiness answers consumed one per poll before falling back to the global flag
    readiness: RefCell<VecDeque<bool>>,
}

/// Audio backend that records instead of playing
#[derive(Debug)]
pub struct MemoryBackend {
    streams: Vec<MemoryStream>,
    ready: bool,
    polls: Cell<u64>,
}

impl MemoryBackend {
    /// Create a backend whose streams always report ready
    pub fn new() -> Self {
        Self {
            streams: Vec::new(),
            ready: true,
            polls: Cell::new(0),
        }
    }

    /// Set the readiness reported when no scripted answer is queued
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    /// Queue readiness answers for one stream
    pub fn script_readiness(&mut self, stream: usize, answers: impl IntoIterator<Item = bool>) {
        if let Some(s) = self.streams.get_mut(stream) {
            s.readiness.borrow_mut().extend(answers);
        }
    }

    pub fn stream(&self, id: usize) -> Option<&MemoryStream> {
        self.streams.get(id)
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// Total blocks written across all streams
    pub fn total_writes(&self) -> usize {
        self.streams.iter().map(|s| s.blocks.len()).sum()
    }

    /// Number of readiness polls answered
    pub fn poll_count(&self) -> u64 {
        self.polls.get()
    }

    fn stream_mut(&mut self, handle: &StreamHandle) -> Result<&mut MemoryStream> {
        self.streams
            .get_mut(handle.id())
            .filter(|s| !s.released)
            .ok_or(Error::UnknownStream(handle.id()))
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn allocate(&mut self, spec: StreamSpec) -> Result<StreamHandle> {
        self.streams.push(MemoryStream {
            spec,
            playing: false,
            released: false,
            blocks: Vec::new(),
            readiness: RefCell::new(VecDeque::new()),
        });
        Ok(StreamHandle::new(self.streams.len() - 1))
    }

    fn begin(&mut self, handle: &StreamHandle) -> Result<()> {
        self.stream_mut(handle)?.playing = true;
        Ok(())
    }

    fn is_ready_for_more_data(&self, handle: &StreamHandle) -> bool {
        self.polls.set(self.polls.get() + 1);
        match self.streams.get(handle.id()) {
            Some(stream) if stream.playing && !stream.released => {
                stream.readiness.borrow_mut().pop_front().unwrap_or(self.ready)
            }
            _ => false,
        }
    }

    fn write(&mut self, handle: &StreamHandle, block: &[Sample]) -> Result<()> {
        let stream = self.stream_mut(handle)?;
        if block.len() != stream.spec.block_size {
            return Err(Error::Stream(format!(
                "block of {} samples written to a stream of {}",
                block.len(),
                stream.spec.block_size
            )));
        }
        stream.blocks.push(block.to_vec());
        Ok(())
    }

    fn release(&mut self, handle: StreamHandle) {
        if let Some(stream) = self.streams.get_mut(handle.id()) {
            stream.playing = false;
            stream.released = true;
        }
    }
}

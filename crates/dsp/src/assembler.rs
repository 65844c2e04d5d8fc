//! Sliding analysis frame built from the most recent input blocks.

use crate::{ring::BlockRing, Sample};

/// Keeps the last `blocks` input blocks and concatenates them oldest-first
/// into one analysis frame of `blocks * block_len` samples.
#[derive(Debug, Clone)]
pub struct FrameAssembler {
    history: BlockRing,
    frame: Vec<Sample>,
}

impl FrameAssembler {
    pub fn new(blocks: usize, block_len: usize) -> Self {
        Self {
            history: BlockRing::new(blocks, block_len),
            frame: vec![0.0; blocks * block_len],
        }
    }

    #[inline]
    pub fn frame_len(&self) -> usize {
        self.frame.len()
    }

    /// Stores `block` and rebuilds the frame in chronological order,
    /// regardless of where the ring cursor currently sits.
    pub fn push_block(&mut self, block: &[Sample]) -> &mut [Sample] {
        self.history.push(block);
        let block_len = self.history.block_len();
        for (chunk, stored) in self
            .frame
            .chunks_exact_mut(block_len)
            .zip(self.history.ordered())
        {
            chunk.copy_from_slice(stored);
        }
        &mut self.frame
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.frame.fill(0.0);
    }
}

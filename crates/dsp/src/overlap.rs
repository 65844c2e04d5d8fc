//! Overlap-add of synthesized frames into a ring of pending output blocks.

use crate::{ring::BlockRing, Sample};

/// Accumulates synthesis frames of `blocks * block_len` samples and emits one
/// block per call.
///
/// Sub-block 0 of each frame completes the oldest pending block, which is
/// emitted immediately; sub-blocks `1..blocks` are added into the remaining
/// `blocks - 1` pending blocks. A sample entering at position 0 of a frame
/// therefore leaves in the same call, and the frame as a whole spans
/// `blocks` consecutive output blocks.
#[derive(Debug, Clone)]
pub struct OverlapAdd {
    pending: BlockRing,
    block_len: usize,
}

impl OverlapAdd {
    /// # Panics
    ///
    /// Panics if `blocks` is smaller than 2.
    pub fn new(blocks: usize, block_len: usize) -> Self {
        assert!(blocks >= 2, "overlap-add needs at least two blocks per frame");
        Self {
            pending: BlockRing::new(blocks - 1, block_len),
            block_len,
        }
    }

    /// Number of pending blocks still waiting for contributions.
    #[inline]
    pub fn pending_blocks(&self) -> usize {
        self.pending.slots()
    }

    /// Adds `frame` and writes the completed oldest block into `out`.
    pub fn add_frame(&mut self, frame: &[Sample], out: &mut [Sample]) {
        let block_len = self.block_len;
        debug_assert_eq!(frame.len(), (self.pending.slots() + 1) * block_len);
        debug_assert_eq!(out.len(), block_len);

        let mut sub_blocks = frame.chunks_exact(block_len);
        if let Some(head) = sub_blocks.next() {
            for ((dest, pending), fresh) in out.iter_mut().zip(self.pending.get(0)).zip(head) {
                *dest = pending + fresh;
            }
        }

        // The emitted slot comes back as the newest, zero-filled pending block.
        self.pending.recycle_oldest();

        for (age, sub_block) in sub_blocks.enumerate() {
            for (pending, fresh) in self.pending.get_mut(age).iter_mut().zip(sub_block) {
                *pending += fresh;
            }
        }
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_frame_spreads_over_four_output_blocks() {
        let block_len = 3;
        let mut ola = OverlapAdd::new(4, block_len);
        let frame: Vec<Sample> = (0..12).map(|i| i as Sample + 1.0).collect();
        let zeros = vec![0.0; 12];
        let mut out = vec![0.0; block_len];

        let mut emitted = Vec::new();
        ola.add_frame(&frame, &mut out);
        emitted.extend_from_slice(&out);
        for _ in 0..4 {
            ola.add_frame(&zeros, &mut out);
            emitted.extend_from_slice(&out);
        }

        let mut expected: Vec<Sample> = frame.clone();
        expected.extend_from_slice(&[0.0; 3]);
        assert_eq!(emitted, expected);
    }

    #[test]
    fn consecutive_frames_overlap_by_one_block_hop() {
        let mut ola = OverlapAdd::new(4, 1);
        let mut out = [0.0];
        let mut emitted = Vec::new();
        for _ in 0..6 {
            ola.add_frame(&[1.0, 1.0, 1.0, 1.0], &mut out);
            emitted.push(out[0]);
        }
        assert_eq!(emitted, vec![1.0, 2.0, 3.0, 4.0, 4.0, 4.0]);
    }

    #[test]
    fn reset_drops_pending_contributions() {
        let mut ola = OverlapAdd::new(4, 1);
        let mut out = [0.0];
        ola.add_frame(&[1.0, 1.0, 1.0, 1.0], &mut out);
        ola.reset();
        ola.add_frame(&[0.0; 4], &mut out);
        assert_eq!(out, [0.0]);
        assert_eq!(ola.pending_blocks(), 3);
    }
}

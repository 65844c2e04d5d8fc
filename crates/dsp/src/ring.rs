//! Fixed-capacity circular buffer of equal-length audio blocks.
//!
//! Both the frame assembler and the overlap-add accumulator keep their
//! history here, so there is exactly one place that knows how the write
//! cursor maps onto chronological order.

use crate::Sample;

/// Ring of `slots` blocks, each `block_len` samples long.
///
/// The cursor always points at the newest slot. Chronological position `k`
/// (0 = oldest) lives at physical slot `(cursor + 1 + k) % slots`.
#[derive(Debug, Clone)]
pub struct BlockRing {
    data: Vec<Sample>,
    block_len: usize,
    slots: usize,
    cursor: usize,
}

impl BlockRing {
    /// Creates a zero-filled ring.
    ///
    /// # Panics
    ///
    /// Panics if `slots` or `block_len` is zero.
    pub fn new(slots: usize, block_len: usize) -> Self {
        assert!(slots > 0, "ring needs at least one slot");
        assert!(block_len > 0, "block length must be non-zero");
        Self {
            data: vec![0.0; slots * block_len],
            block_len,
            slots,
            // Start on the last slot so the first push lands in slot 0.
            cursor: slots - 1,
        }
    }

    #[inline]
    pub fn slots(&self) -> usize {
        self.slots
    }

    #[inline]
    pub fn block_len(&self) -> usize {
        self.block_len
    }

    /// Physical slot index of chronological position `age` (0 = oldest).
    #[inline]
    pub fn slot_index(&self, age: usize) -> usize {
        (self.cursor + 1 + age) % self.slots
    }

    /// Advances the cursor and stores `block` in the newly newest slot,
    /// overwriting the oldest block.
    pub fn push(&mut self, block: &[Sample]) {
        debug_assert_eq!(block.len(), self.block_len, "block length mismatch");
        let slot = self.recycle_oldest();
        let len = slot.len().min(block.len());
        slot[..len].copy_from_slice(&block[..len]);
    }

    /// Advances the cursor, turning the oldest slot into the newest one,
    /// and returns it zero-filled.
    pub fn recycle_oldest(&mut self) -> &mut [Sample] {
        self.cursor = (self.cursor + 1) % self.slots;
        let slot = self.slot_mut(self.cursor);
        slot.fill(0.0);
        slot
    }

    /// Block at chronological position `age` (0 = oldest).
    pub fn get(&self, age: usize) -> &[Sample] {
        let index = self.slot_index(age);
        let start = index * self.block_len;
        &self.data[start..start + self.block_len]
    }

    /// Mutable block at chronological position `age` (0 = oldest).
    pub fn get_mut(&mut self, age: usize) -> &mut [Sample] {
        let index = self.slot_index(age);
        self.slot_mut(index)
    }

    /// Blocks in oldest-first order.
    pub fn ordered(&self) -> impl Iterator<Item = &[Sample]> + '_ {
        (0..self.slots).map(move |age| self.get(age))
    }

    /// Zeroes every slot and rewinds the cursor.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
        self.cursor = self.slots - 1;
    }

    fn slot_mut(&mut self, index: usize) -> &mut [Sample] {
        let start = index * self.block_len;
        &mut self.data[start..start + self.block_len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(ring: &BlockRing) -> Vec<Sample> {
        ring.ordered().flatten().copied().collect()
    }

    #[test]
    fn first_push_lands_in_slot_zero() {
        let mut ring = BlockRing::new(4, 2);
        ring.push(&[1.0, 1.0]);
        assert_eq!(ring.slot_index(3), 0);
        assert_eq!(ring.get(3), &[1.0, 1.0]);
        assert_eq!(collect(&ring), vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn ordered_view_is_oldest_first_after_wrap() {
        let mut ring = BlockRing::new(4, 1);
        for value in 1..=6 {
            ring.push(&[value as Sample]);
        }
        assert_eq!(collect(&ring), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn recycled_slot_becomes_newest_and_is_zeroed() {
        let mut ring = BlockRing::new(3, 1);
        ring.push(&[1.0]);
        ring.push(&[2.0]);
        ring.push(&[3.0]);
        let slot = ring.recycle_oldest();
        assert_eq!(slot, &[0.0]);
        assert_eq!(collect(&ring), vec![2.0, 3.0, 0.0]);
    }

    #[test]
    fn get_mut_addresses_chronological_position() {
        let mut ring = BlockRing::new(3, 2);
        ring.push(&[1.0, 1.0]);
        ring.get_mut(0)[1] = 9.0;
        assert_eq!(collect(&ring), vec![0.0, 9.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn clear_resets_contents_and_cursor() {
        let mut ring = BlockRing::new(2, 2);
        ring.push(&[1.0, 2.0]);
        ring.push(&[3.0, 4.0]);
        ring.clear();
        assert_eq!(collect(&ring), vec![0.0; 4]);
        ring.push(&[5.0, 6.0]);
        assert_eq!(ring.slot_index(1), 0);
    }
}

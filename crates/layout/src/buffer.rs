use smallvec::SmallVec;

/// Index into a [`ByteBuffer`]. A newtype instead of a raw pointer: the buffer
/// underneath is free to reallocate as it grows, and an index survives that
/// where a pointer wouldn't.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BufIndex(pub u32);

/// A growable byte arena. The planner uses one to hold the encoded size-chain
/// records for variable-length leaves — each record is a fixed
/// 12-byte `(u32 size_reader_leaf, u64 stride)` pair written with
/// [`ByteBuffer::push_chain_entry`], and read back with
/// [`ByteBuffer::read_chain_entry`].
///
/// Inline capacity covers the common case (a handful of var-leaves per
/// struct) without heap-allocating at all.
#[derive(Debug, Default)]
pub struct ByteBuffer {
    bytes: SmallVec<[u8; 128]>,
}

impl ByteBuffer {
    pub fn new() -> Self {
        ByteBuffer::default()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Appends raw bytes, returning the index they start at.
    pub fn push_bytes(&mut self, data: &[u8]) -> BufIndex {
        let idx = BufIndex(self.bytes.len() as u32);
        self.bytes.extend_from_slice(data);
        idx
    }

    pub fn read_bytes(&self, idx: BufIndex, len: usize) -> &[u8] {
        let start = idx.0 as usize;
        &self.bytes[start..start + len]
    }

    /// Appends one size-chain entry: which variable-length leaf supplies the
    /// runtime size, and the per-element stride it's multiplied by.
    pub fn push_chain_entry(&mut self, size_reader_leaf: u32, stride: u64) -> BufIndex {
        let mut buf = [0u8; 12];
        buf[0..4].copy_from_slice(&size_reader_leaf.to_le_bytes());
        buf[4..12].copy_from_slice(&stride.to_le_bytes());
        self.push_bytes(&buf)
    }

    pub fn read_chain_entry(&self, idx: BufIndex) -> (u32, u64) {
        let raw = self.read_bytes(idx, 12);
        let size_reader_leaf = u32::from_le_bytes(raw[0..4].try_into().unwrap());
        let stride = u64::from_le_bytes(raw[4..12].try_into().unwrap());
        (size_reader_leaf, stride)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_chain_entries() {
        let mut buf = ByteBuffer::new();
        let a = buf.push_chain_entry(3, 16);
        let b = buf.push_chain_entry(9, 1);
        assert_eq!(buf.read_chain_entry(a), (3, 16));
        assert_eq!(buf.read_chain_entry(b), (9, 1));
    }

    #[test]
    fn indices_are_stable_across_growth() {
        let mut buf = ByteBuffer::new();
        let first = buf.push_chain_entry(0, 1);
        for i in 1..500 {
            buf.push_chain_entry(i, i as u64);
        }
        assert_eq!(buf.read_chain_entry(first), (0, 1));
    }
}

//! Groups a scope's not-yet-placed fixed leaves by alignment and commits them
//! to contiguous offsets.
//!
//! Fields are placed back to back in descending-alignment order with no gaps
//! — there is no padding pass to converge to, incremental or otherwise, since
//! unaligned `reinterpret_cast` reads are the point of this layout scheme
//! rather than something to pack around. A queued field's own byte size is
//! usually a multiple of its own alignment (true for scalars, fixed strings,
//! and any array/identifier sub-block, since those are explicitly padded to
//! their element stride before being queued), with one deliberate exception:
//! a variant's raw extent (tag plus envelope, unpadded) is not, since nothing
//! requires the byte right after a variant's last arm byte to fall on an
//! alignment boundary.

use recgen_schema::Align;

/// What one queued field ultimately contributes to the owning scope's offset
/// table.
#[derive(Clone, Debug)]
pub enum FieldInfo {
    /// A single addressable leaf identified by its preorder occurrence index.
    Simple { occurrence: u32 },
    /// An already-laid-out sub-block (a fixed array's per-element fields, or
    /// a variant's packed arms) whose own leaf offsets are relative to this
    /// block's start and get shifted once the block's final position is
    /// known. Each entry also carries its own alignment, since a sub-block
    /// can mix leaves of different natural alignment internally.
    Packed { leaves: Vec<(u32, u64, Align)> },
}

#[derive(Clone, Debug)]
pub struct QueuedField {
    pub size: u64,
    pub align: Align,
    pub info: FieldInfo,
}

/// A committed leaf: preorder occurrence index paired with its final
/// byte offset and alignment within the owning scope.
#[derive(Clone, Copy, Debug)]
pub struct Committed {
    pub occurrence: u32,
    pub offset: u64,
    pub align: Align,
}

#[derive(Default)]
pub struct FieldQueue {
    pending: Vec<QueuedField>,
}

impl FieldQueue {
    pub fn new() -> Self {
        FieldQueue::default()
    }

    pub fn push(&mut self, field: QueuedField) {
        self.pending.push(field);
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Lays every queued field out from `base_offset`, alignment-descending,
    /// arrival order preserved within a band. Returns every leaf this scope
    /// now owns (flattening `Packed` entries), the scope's raw fixed size
    /// (the committed fields' extent, with no trailing pad), and its
    /// strongest alignment. Callers that nest this scope as an array element
    /// (where every copy must sit at a stride that keeps its own strongest
    /// alignment) round the raw size up to that alignment themselves via
    /// [`Self::padded_size`]; a top-level struct's own `fixed_size` is this
    /// raw size unrounded, since nothing requires it to be self-aligned.
    pub fn commit(mut self, base_offset: u64) -> (Vec<Committed>, u64, Align) {
        self.pending.sort_by_key(|f| std::cmp::Reverse(f.align.bytes()));
        let mut cursor = base_offset;
        let mut out = Vec::new();
        let mut max_align = 1u64;
        for field in &self.pending {
            max_align = max_align.max(field.align.bytes());
            let start = cursor;
            match &field.info {
                FieldInfo::Simple { occurrence } => {
                    out.push(Committed { occurrence: *occurrence, offset: start, align: field.align });
                }
                FieldInfo::Packed { leaves } => {
                    for (occurrence, rel_offset, align) in leaves {
                        out.push(Committed { occurrence: *occurrence, offset: start + rel_offset, align: *align });
                    }
                }
            }
            cursor += field.size;
        }
        let size = cursor - base_offset;
        let align = match max_align {
            8 => Align::Eight,
            4 => Align::Four,
            2 => Align::Two,
            _ => Align::One,
        };
        (out, size, align)
    }

    /// Rounds a raw `commit()` size up to `align`'s own byte width — the
    /// stride a fixed array needs between copies of a scope committed by
    /// `commit()`, so each element lands naturally aligned.
    pub fn padded_size(size: u64, align: Align) -> u64 {
        size.div_ceil(align.bytes()) * align.bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descending_alignment_commit_has_no_padding() {
        let mut q = FieldQueue::new();
        q.push(QueuedField { size: 1, align: Align::One, info: FieldInfo::Simple { occurrence: 0 } });
        q.push(QueuedField { size: 8, align: Align::Eight, info: FieldInfo::Simple { occurrence: 1 } });
        q.push(QueuedField { size: 2, align: Align::Two, info: FieldInfo::Simple { occurrence: 2 } });
        let (committed, size, align) = q.commit(0);
        let by_occ = |occ: u32| committed.iter().find(|c| c.occurrence == occ).unwrap().offset;
        assert_eq!(by_occ(1), 0); // u64 first
        assert_eq!(by_occ(2), 8); // u16 next, naturally aligned
        assert_eq!(by_occ(0), 10); // u8 last
        assert_eq!(size, 11); // raw extent, no trailing pad
        assert_eq!(align, Align::Eight);
        assert_eq!(FieldQueue::padded_size(size, align), 16); // only an array-of-this-scope stride needs this
    }

    #[test]
    fn packed_sub_block_offsets_shift_with_its_placement() {
        let mut q = FieldQueue::new();
        q.push(QueuedField {
            size: 8,
            align: Align::Four,
            info: FieldInfo::Packed { leaves: vec![(5, 0, Align::Four), (6, 4, Align::Four)] },
        });
        q.push(QueuedField { size: 1, align: Align::One, info: FieldInfo::Simple { occurrence: 7 } });
        let (committed, _, _) = q.commit(16);
        let by_occ = |occ: u32| committed.iter().find(|c| c.occurrence == occ).unwrap().offset;
        assert_eq!(by_occ(5), 16);
        assert_eq!(by_occ(6), 20);
        assert_eq!(by_occ(7), 24);
    }
}

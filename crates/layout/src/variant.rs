//! Packs a tagged union's arms into one shared envelope: find the smallest
//! per-alignment-band size that every sufficiently-large arm can fill
//! exactly with some subset of its own fields, and place each arm's fields
//! inside that shared envelope accordingly.

use recgen_schema::Align;

use crate::error::LayoutWarning;
use crate::subset_sum::{self, Bitset, Item};

/// A flattened field of one variant arm, ready for the envelope solver:
/// nested structure (fixed arrays, nested structs, nested variants) has
/// already been reduced to "this many bytes at this alignment" by the
/// visitor that builds the arm's leaf list: nested aggregates inside a
/// variant arm are addressed through their own accessor, not flattened into
/// the parent's field list, but the envelope solver only needs their
/// footprint.
#[derive(Clone, Copy, Debug)]
pub struct VariantLeaf {
    pub size: u64,
    pub align: Align,
}

/// The four alignment-band boundaries of a solved envelope, each a multiple
/// of its own alignment and non-decreasing as alignment shrinks:
/// `l8 <= l4 <= l2 <= l1`. `l1` is the envelope's total size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvelopeLayout {
    pub l8: u64,
    pub l4: u64,
    pub l2: u64,
    pub l1: u64,
}

impl EnvelopeLayout {
    pub fn band(&self, align: Align) -> u64 {
        match align {
            Align::Eight => self.l8,
            Align::Four => self.l4,
            Align::Two => self.l2,
            Align::One => self.l1,
        }
    }
}

/// Where each of one arm's leaves landed inside the shared envelope,
/// parallel to the arm's leaf list.
#[derive(Clone, Debug, Default)]
pub struct ArmPlacement {
    pub offsets: Vec<u64>,
}

fn round_down(value: u64, multiple: u64) -> u64 {
    value - value % multiple
}

fn arm_required(leaves: &[VariantLeaf]) -> u64 {
    leaves.iter().map(|l| l.size).sum()
}

/// Subset-sum reachable sums for an arm, restricted to leaves whose
/// alignment is `<= max_align` and capped at `cap`.
fn reachable_leq(leaves: &[VariantLeaf], max_align: Align, cap: u64) -> Bitset {
    let mut bits = Bitset::new(cap);
    for leaf in leaves {
        if leaf.align.bytes() <= max_align.bytes() {
            bits.apply(leaf.size.min(cap));
        }
    }
    bits
}

/// Solves the shared envelope across `arms`: work down from the biggest
/// alignment band, at each step looking for the largest multiple of that
/// alignment that every "big enough" arm can fill exactly using only its
/// own same-or-smaller-aligned leaves.
pub fn solve_envelope(arms: &[Vec<VariantLeaf>]) -> EnvelopeLayout {
    let required: Vec<u64> = arms.iter().map(|a| arm_required(a)).collect();
    let m = required.iter().copied().max().unwrap_or(0);

    let mut layout = EnvelopeLayout::default();
    let mut prev = 0u64;
    for &align in &Align::ALL_DESCENDING {
        let a = align.bytes();
        let mut candidate = round_down(m, a);
        let found = loop {
            if candidate < prev {
                break None;
            }
            let participating: Vec<usize> =
                (0..arms.len()).filter(|&i| required[i] >= candidate).collect();
            if participating.is_empty() {
                break Some(prev);
            }
            let mut merged: Option<Bitset> = None;
            for &i in &participating {
                let bits = reachable_leq(&arms[i], align, candidate);
                merged = Some(match merged {
                    None => bits,
                    Some(mut acc) => {
                        acc.and_merge(&bits);
                        acc
                    }
                });
            }
            if merged.map(|b| b.get(candidate)).unwrap_or(false) {
                break Some(candidate);
            }
            if candidate == prev || candidate < a {
                break Some(prev);
            }
            candidate -= a;
        };
        let value = found.unwrap_or(prev);
        match align {
            Align::Eight => layout.l8 = value,
            Align::Four => layout.l4 = value,
            Align::Two => layout.l2 = value,
            Align::One => layout.l1 = value,
        }
        prev = value;
    }
    // l1 is the envelope size; it must cover the largest arm even if no
    // alignment band search landed exactly on m (can happen when every arm's
    // required space already divides evenly — l1 then simply equals m).
    if layout.l1 < m {
        layout.l1 = m;
    }
    layout
}

/// Places one arm's leaves inside an already-solved envelope, band by band:
/// each band's own natural-alignment leaves go first in arrival order, then
/// any leftover slack in that band is filled by a subset-sum selection among
/// the arm's remaining same-or-smaller-aligned leaves.
/// Returns the arm's placement, any warnings, and the arm's *actual* extent
/// in bytes — normally `envelope.l1`, but possibly more if the solver's
/// envelope turned out too small for this particular arm's leaves and the
/// non-fatal tail-append fallback kicked in. Callers must size the shared
/// envelope to the max of every arm's actual extent, not just `envelope.l1`.
pub fn place_arm(
    field: &str,
    arm_index: usize,
    leaves: &[VariantLeaf],
    envelope: &EnvelopeLayout,
) -> (ArmPlacement, Vec<LayoutWarning>, u64) {
    let mut offsets = vec![0u64; leaves.len()];
    let mut placed = vec![false; leaves.len()];
    let mut warnings = Vec::new();
    let mut band_start = 0u64;

    for &align in &Align::ALL_DESCENDING {
        let band_end = envelope.band(align);
        let mut cursor = band_start;
        let budget = band_end.saturating_sub(band_start);

        // Own-alignment leaves first, in arrival order.
        let mut own: Vec<usize> = (0..leaves.len())
            .filter(|&i| !placed[i] && leaves[i].align == align)
            .collect();
        let own_total: u64 = own.iter().map(|&i| leaves[i].size).sum();
        if own_total <= budget {
            for &i in &own {
                offsets[i] = cursor;
                cursor += leaves[i].size;
                placed[i] = true;
            }
        } else {
            // Shouldn't happen if the envelope search above is consistent,
            // but never panic: place what fits and warn.
            tracing::warn!(field, arm_index, align_bytes = align.bytes(), "variant arm overflows its own band");
            warnings.push(LayoutWarning::ImperfectVariantLayout {
                field: field.to_string(),
                align_bytes: align.bytes(),
                arm_index,
            });
            own.retain(|&i| {
                if cursor + leaves[i].size <= band_end {
                    offsets[i] = cursor;
                    cursor += leaves[i].size;
                    placed[i] = true;
                    false
                } else {
                    true
                }
            });
        }

        // Fill remaining slack in this band with smaller-or-equal-aligned
        // leaves not yet placed, chosen by exact subset-sum.
        let slack = band_end.saturating_sub(cursor);
        if slack > 0 {
            let candidates: Vec<Item> = (0..leaves.len())
                .filter(|&i| !placed[i] && leaves[i].align.bytes() <= align.bytes())
                .map(|i| Item { size: leaves[i].size, index: i })
                .collect();
            if let Some(chosen) = subset_sum::solve(&candidates, slack) {
                for i in chosen {
                    offsets[i] = cursor;
                    cursor += leaves[i].size;
                    placed[i] = true;
                }
            }
        }
        band_start = band_end;
    }

    // Anything left over (imperfect envelope, or a leaf whose alignment
    // exceeds every band boundary) gets appended past the envelope rather
    // than panicking — a locally recovered, padded layout instead of a
    // hard failure.
    let mut tail = envelope.l1;
    for i in 0..leaves.len() {
        if !placed[i] {
            tracing::warn!(
                field,
                arm_index,
                align_bytes = leaves[i].align.bytes(),
                "variant arm leaf fell outside the solved envelope, appending past it"
            );
            warnings.push(LayoutWarning::ImperfectVariantLayout {
                field: field.to_string(),
                align_bytes: leaves[i].align.bytes(),
                arm_index,
            });
            let align = leaves[i].align.bytes();
            tail = tail.div_ceil(align) * align;
            offsets[i] = tail;
            tail += leaves[i].size;
            placed[i] = true;
        }
    }

    let extent = tail.max(envelope.l1);
    (ArmPlacement { offsets }, warnings, extent)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(size: u64, align: Align) -> VariantLeaf {
        VariantLeaf { size, align }
    }

    #[test]
    fn single_u64_arm_envelope_is_eight() {
        let arms = vec![vec![leaf(8, Align::Eight)]];
        let env = solve_envelope(&arms);
        assert_eq!(env.l1, 8);
    }

    #[test]
    fn two_u32_arm_matches_one_u64_arm_envelope() {
        // arm0: u64 (align8, size8); arm1: (u32,u32) (align4, size4 each)
        let arms = vec![vec![leaf(8, Align::Eight)], vec![leaf(4, Align::Four), leaf(4, Align::Four)]];
        let env = solve_envelope(&arms);
        assert_eq!(env.l1, 8);
        // Both arms fully fill the envelope; l4 should also reach 8 since
        // arm1 fills it exactly using only align<=4 leaves.
        assert_eq!(env.l4, 8);
    }

    #[test]
    fn placement_stays_within_envelope_and_alignment() {
        let leaves = vec![leaf(4, Align::Four), leaf(2, Align::Two), leaf(1, Align::One), leaf(1, Align::One)];
        let arms = vec![leaves.clone()];
        let env = solve_envelope(&arms);
        let (placement, warnings, extent) = place_arm("v", 0, &leaves, &env);
        assert!(warnings.is_empty(), "expected a clean placement: {warnings:?}");
        assert_eq!(extent, env.l1);
        for (leaf, &offset) in leaves.iter().zip(&placement.offsets) {
            assert_eq!(offset % leaf.align.bytes(), 0, "leaf at {offset} violates its own alignment");
            assert!(offset + leaf.size <= env.l1, "leaf at {offset} escapes the envelope ({})", env.l1);
        }
    }

    #[test]
    fn mismatched_arms_fall_back_without_panicking() {
        // arm0 needs 3 bytes of padding-unfriendly align1 data that can't be
        // perfectly absorbed alongside a lone align8 in arm1; the solver
        // must still produce *some* valid, non-overlapping placement.
        let arm0 = vec![leaf(3, Align::One)];
        let arm1 = vec![leaf(8, Align::Eight)];
        let arms = vec![arm0.clone(), arm1.clone()];
        let env = solve_envelope(&arms);
        let (p0, _, extent0) = place_arm("v", 0, &arm0, &env);
        let (p1, _, extent1) = place_arm("v", 1, &arm1, &env);
        assert_eq!(p0.offsets.len(), 1);
        assert_eq!(p1.offsets.len(), 1);
        assert_eq!(p1.offsets[0] % 8, 0);
        assert!(extent0 >= arm0[0].size);
        assert!(extent1 >= arm1[0].size);
    }
}

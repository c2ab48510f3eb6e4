//! Assigns byte offsets (and, for variable-length data, size-chains) to
//! every leaf of a [`recgen_schema::Module`], and packs tagged-union arms
//! into shared envelopes.
//!
//! The output, a [`LayoutPlan`], is everything `recgen-codegen` needs to
//! emit closed-form accessor expressions: it never walks the schema tree
//! itself, it only reads the plan.

mod buffer;
mod error;
mod planner;
mod queue;
pub mod reference;
mod variant;

pub mod subset_sum;

pub use buffer::{BufIndex, ByteBuffer};
pub use error::{LayoutError, LayoutWarning, ResourceError};
pub use variant::{ArmPlacement, EnvelopeLayout, VariantLeaf};

use recgen_schema::{Align, Module, StructId};

/// One fixed-offset leaf: a byte position known at compile time, plus the
/// alignment it was placed at (the emitter uses this to pick the right
/// unaligned-safe read width).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedOffset {
    pub byte_offset: u64,
    pub align: Align,
}

/// Points an AST preorder leaf occurrence at either a fixed offset or a
/// variable-length leaf. [`LayoutPlan::idx_map`] is indexed by occurrence
/// number; every entry in [`LayoutPlan::fixed_offsets`] and
/// [`LayoutPlan::var_leaves`] is targeted by exactly one `LeafRef` (a
/// coverage / bijection property).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeafRef {
    Fixed(u32),
    Variable(u32),
}

/// A variable-length leaf: everything the emitter needs to compute both this
/// leaf's byte length and, by summing the lengths of every earlier entry in
/// [`LayoutPlan::var_leaves`], its runtime position in the variable region
/// (the size-chain).
#[derive(Clone, Debug, PartialEq)]
pub enum VarLeaf {
    /// A dynamically sized string: `min_len + *size_reader` bytes.
    String { size_reader_occurrence: u32, min_len: u32 },
    /// A dynamically sized array: `(min_len + *size_reader) * element_stride`
    /// bytes, `element_stride` being the padded per-element size computed
    /// while laying out one representative element.
    Array { size_reader_occurrence: u32, min_len: u32, element_stride: u64 },
    /// A dynamic variant's exposed `size()`: the *active* arm's true,
    /// unpadded byte count, looked up by the tag leaf's runtime value.
    VariantSize { tag_occurrence: u32, arm_byte_sizes: Vec<u64> },
}

/// The complete layout for one struct: where every fixed leaf lives, how
/// every variable leaf's length is computed, and the bijective map between
/// AST leaf occurrences and those two tables.
#[derive(Clone, Debug, PartialEq)]
pub struct LayoutPlan {
    pub fixed_offsets: Vec<FixedOffset>,
    pub var_leaves: Vec<VarLeaf>,
    pub idx_map: Vec<LeafRef>,
    /// Total size of the fixed region: the last committed field's end, with
    /// no trailing pad to the struct's own alignment (nothing requires a
    /// top-level struct to be self-aligned — only its use as a repeated
    /// array/identifier element does, and that rounds up separately).
    pub fixed_size: u64,
    pub warnings: Vec<LayoutWarning>,
    /// For every `FixedArray`'s base occurrence (the slot pushed before its
    /// representative element is visited), the padded byte width of one
    /// element — the per-element stride `idx * sizeof(T)` is multiplied by
    /// when computing an indexed element's address.
    pub array_element_stride: std::collections::HashMap<u32, u64>,
}

impl LayoutPlan {
    /// Whether this struct has any variable-length leaves at all (a struct
    /// with none is entirely fixed-size and needs no variable region).
    pub fn is_fixed_size(&self) -> bool {
        self.var_leaves.is_empty()
    }
}

/// Computes the layout of `root` within `module`.
pub fn plan(module: &Module, root: StructId) -> Result<LayoutPlan, LayoutError> {
    planner::plan_struct(module, root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recgen_schema::{FieldDef, Scalar, StructDef, Type};

    #[test]
    fn plain_struct_has_no_variable_leaves() {
        let s = StructDef::new(
            "P",
            vec![
                FieldDef::new("a", Type::Scalar(Scalar::U8)),
                FieldDef::new("b", Type::Scalar(Scalar::U64)),
            ],
        );
        let module = Module::build(vec![s]).unwrap();
        let layout = plan(&module, StructId(0)).unwrap();
        assert!(layout.is_fixed_size());
        assert_eq!(layout.fixed_offsets.len(), 2);
    }
}

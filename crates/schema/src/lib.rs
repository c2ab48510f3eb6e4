//! The type tree consumed by `recgen-layout`: a typed, acyclic AST describing the
//! fixed- and variable-sized fields of a record, plus the per-node leaf-count
//! metadata the layout planner needs to size its scratch buffers up front.
//!
//! A real front end (lexer + parser) would build a [`Module`] from schema source
//! text; callers here build one directly through [`Module::build`], which
//! performs the structural validation a parser would otherwise have baked into
//! the tree (no nested dynamic arrays, no variable-length data inside an array
//! or variant arm, no packed variants, bounded array nesting).

mod error;
mod leaf_counts;
mod validate;

pub use error::SchemaError;
pub use leaf_counts::{Counts, LeafCounts};

/// Maximum nesting depth for fixed-size arrays (mirrors the precomputed
/// constructor-string table's depth cap in `recgen-codegen`).
pub const MAX_ARRAY_DEPTH: u32 = 64;

/// The byte width (and required alignment) of a scalar or size-reader field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Align {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
}

impl Align {
    pub const ALL_DESCENDING: [Align; 4] = [Align::Eight, Align::Four, Align::Two, Align::One];

    pub fn bytes(self) -> u64 {
        self as u64
    }

    /// The next smaller alignment class, or `None` below [`Align::One`].
    pub fn next_smaller(self) -> Option<Align> {
        match self {
            Align::Eight => Some(Align::Four),
            Align::Four => Some(Align::Two),
            Align::Two => Some(Align::One),
            Align::One => None,
        }
    }

    /// The next bigger alignment class, or `None` above [`Align::Eight`].
    pub fn next_bigger(self) -> Option<Align> {
        match self {
            Align::One => Some(Align::Two),
            Align::Two => Some(Align::Four),
            Align::Four => Some(Align::Eight),
            Align::Eight => None,
        }
    }
}

/// Opaque index of a scalar type, used both for its byte size and its natural
/// alignment (every scalar in this schema language is naturally aligned).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scalar {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl Scalar {
    pub fn size(self) -> u64 {
        match self {
            Scalar::Bool | Scalar::U8 | Scalar::I8 => 1,
            Scalar::U16 | Scalar::I16 => 2,
            Scalar::U32 | Scalar::I32 | Scalar::F32 => 4,
            Scalar::U64 | Scalar::I64 | Scalar::F64 => 8,
        }
    }

    pub fn align(self) -> Align {
        match self.size() {
            1 => Align::One,
            2 => Align::Two,
            4 => Align::Four,
            8 => Align::Eight,
            _ => unreachable!("scalar sizes are 1, 2, 4 or 8"),
        }
    }

    /// The C++ spelling the emitter uses for this type's reads.
    pub fn rust_like_name(self) -> &'static str {
        match self {
            Scalar::Bool => "bool",
            Scalar::U8 => "uint8_t",
            Scalar::U16 => "uint16_t",
            Scalar::U32 => "uint32_t",
            Scalar::U64 => "uint64_t",
            Scalar::I8 => "int8_t",
            Scalar::I16 => "int16_t",
            Scalar::I32 => "int32_t",
            Scalar::I64 => "int64_t",
            Scalar::F32 => "float",
            Scalar::F64 => "double",
        }
    }
}

/// Index of a [`StructDef`] within a [`Module`]; stands in for the AST's
/// `Identifier { idx }` cross-reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StructId(pub u32);

/// One arm of a [`Type::FixedVariant`] or [`Type::DynamicVariant`]: an ordered,
/// unnamed list of field types, laid out contiguously like a tuple — a
/// single-field arm like `u64`, or a multi-field arm like `(u32, u32)`.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantArm {
    pub fields: Vec<Type>,
}

impl VariantArm {
    pub fn single(ty: Type) -> Self {
        VariantArm { fields: vec![ty] }
    }
}

/// A fixed or dynamic variant's arm list. `variant_count` is implied by
/// `arms.len()`; tag width is `u8` for up to 255 arms, else `u16`.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantDef {
    pub arms: Vec<VariantArm>,
}

impl VariantDef {
    pub fn tag_align(&self) -> Align {
        if self.arms.len() <= u8::MAX as usize {
            Align::One
        } else {
            Align::Two
        }
    }
}

/// One node of the type tree. Modeled as a tagged sum so every visitor match
/// below is exhaustive and total — there is no "next sibling" pointer
/// arithmetic to get wrong, the compiler checks coverage for us.
#[derive(Clone, Debug, PartialEq)]
pub enum Type {
    Scalar(Scalar),
    /// Fixed-size, null-terminated string storage of `len` bytes (including
    /// the terminator) — `length()` is `len - 1`.
    FixedString { len: u32 },
    /// Dynamically sized string: total length is `min_len + *size_reader`.
    String { min_len: u32, stored_size_align: Align },
    /// A compile-time-length array of `len` copies of `inner`.
    FixedArray { len: u32, inner: Box<Type> },
    /// A runtime-length array of `len()` copies of `inner`, `len()` read from
    /// a `stored_size_align`-wide size field. `inner` must be fixed-size —
    /// a dynamic array nested inside another dynamic array is rejected.
    Array { min_len: u32, stored_size_align: Align, inner: Box<Type> },
    /// A tagged union whose envelope is the largest arm's packed size.
    FixedVariant(VariantDef),
    /// Like `FixedVariant`, but additionally exposes a `size()` reporting the
    /// active arm's true (unpadded) byte count, for use as a var-leaf upstream
    /// of later fields.
    DynamicVariant(VariantDef),
    /// Rejected outright during validation: kept as an AST tag so a
    /// hand-built schema can exercise that rejection path the way a parsed
    /// one would.
    PackedVariant(VariantDef),
    /// A reference to a previously defined struct.
    Identifier(StructId),
}

impl Type {
    pub fn fixed_array(len: u32, inner: Type) -> Self {
        Type::FixedArray { len, inner: Box::new(inner) }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: Type,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        FieldDef { name: name.into(), ty }
    }
}

/// A named record. Per-subtree leaf counts are recovered on demand via
/// [`Module::leaf_counts`] rather than stored redundantly, since nothing else
/// needs to mutate them in place.
#[derive(Clone, Debug, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

impl StructDef {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDef>) -> Self {
        StructDef { name: name.into(), fields }
    }
}

/// An acyclic collection of struct definitions, the root container the
/// layout planner and code emitter both traverse.
#[derive(Clone, Debug, Default)]
pub struct Module {
    structs: Vec<StructDef>,
}

impl Module {
    /// Validates `structs` the way a schema lexer would have while building
    /// the tree in the first place, then takes ownership.
    pub fn build(structs: Vec<StructDef>) -> Result<Module, SchemaError> {
        let module = Module { structs };
        validate::validate_module(&module)?;
        Ok(module)
    }

    pub fn structs(&self) -> &[StructDef] {
        &self.structs
    }

    pub fn get(&self, id: StructId) -> &StructDef {
        &self.structs[id.0 as usize]
    }

    pub fn find(&self, name: &str) -> Option<StructId> {
        self.structs.iter().position(|s| s.name == name).map(|i| StructId(i as u32))
    }

    /// Cumulative fixed/variable leaf counts for `ty`, recursing through
    /// identifiers. Computed on demand since there is no lexer pass to cache
    /// it in.
    pub fn leaf_counts(&self, ty: &Type) -> LeafCounts {
        leaf_counts::leaf_counts(self, ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(s: Scalar) -> Type {
        Type::Scalar(s)
    }

    #[test]
    fn accepts_plain_struct() {
        let p = StructDef::new(
            "P",
            vec![
                FieldDef::new("a", scalar(Scalar::U8)),
                FieldDef::new("b", scalar(Scalar::U64)),
                FieldDef::new("c", scalar(Scalar::U16)),
            ],
        );
        let module = Module::build(vec![p]).unwrap();
        let counts = module.leaf_counts(&module.get(StructId(0)).fields[0].ty);
        assert_eq!(counts.fixed.align1, 1);
    }

    #[test]
    fn rejects_dynamic_string_in_array() {
        let bad = StructDef::new(
            "Bad",
            vec![FieldDef::new(
                "xs",
                Type::fixed_array(3, Type::String { min_len: 0, stored_size_align: Align::One }),
            )],
        );
        let err = Module::build(vec![bad]).unwrap_err();
        assert!(matches!(err, SchemaError::DynamicSizeInArray { .. }));
    }

    #[test]
    fn rejects_nested_dynamic_array() {
        let bad = StructDef::new(
            "Bad",
            vec![FieldDef::new(
                "xs",
                Type::Array {
                    min_len: 0,
                    stored_size_align: Align::Four,
                    inner: Box::new(Type::Array {
                        min_len: 0,
                        stored_size_align: Align::Four,
                        inner: Box::new(scalar(Scalar::U8)),
                    }),
                },
            )],
        );
        let err = Module::build(vec![bad]).unwrap_err();
        assert!(matches!(err, SchemaError::NestedDynamicArray { .. }));
    }

    #[test]
    fn rejects_packed_variant() {
        let bad = StructDef::new(
            "Bad",
            vec![FieldDef::new(
                "v",
                Type::PackedVariant(VariantDef { arms: vec![VariantArm::single(scalar(Scalar::U8))] }),
            )],
        );
        let err = Module::build(vec![bad]).unwrap_err();
        assert!(matches!(err, SchemaError::PackedVariantRequested { .. }));
    }

    #[test]
    fn rejects_array_depth_overflow() {
        let mut ty = scalar(Scalar::U8);
        for _ in 0..(MAX_ARRAY_DEPTH + 1) {
            ty = Type::fixed_array(1, ty);
        }
        let bad = StructDef::new("Bad", vec![FieldDef::new("xs", ty)]);
        let err = Module::build(vec![bad]).unwrap_err();
        assert!(matches!(err, SchemaError::ArrayDepthExceeded { .. }));
    }

    #[test]
    fn rejects_unknown_identifier() {
        let bad = StructDef::new("Bad", vec![FieldDef::new("x", Type::Identifier(StructId(7)))]);
        let err = Module::build(vec![bad]).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownIdentifier(..)));
    }

    #[test]
    fn accepts_nested_struct_reference() {
        let inner = StructDef::new(
            "Inner",
            vec![FieldDef::new("x", scalar(Scalar::U32)), FieldDef::new("y", scalar(Scalar::U32))],
        );
        let outer =
            StructDef::new("Outer", vec![FieldDef::new("i", Type::fixed_array(2, Type::Identifier(StructId(0))))]);
        Module::build(vec![inner, outer]).unwrap();
    }
}

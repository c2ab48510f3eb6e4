/// Failures while walking an already-validated schema. These are all
/// resource/arity limits, not type errors — `recgen-schema` has already
/// rejected anything structurally wrong by the time a [`crate::plan`] call
/// sees the tree.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("variant in field `{field}` has no arms to lay out")]
    EmptyVariant { field: String },

    #[error("field `{field}` references struct `{struct_name}`, which has variable-length fields; nested structs must be fixed-size")]
    NestedStructHasVariableFields { field: String, struct_name: String },
}

/// Hard resource limits the planner enforces so a pathological schema fails
/// fast with a message instead of exhausting memory or overflowing an offset.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("field `{field}` would overflow a 64-bit byte offset")]
    OffsetOverflow { field: String },

    #[error("struct `{name}` has more than {max} leaf fields")]
    TooManyLeaves { name: String, max: u32 },
}

/// A non-fatal layout decision worth surfacing to the caller: the variant
/// solver falls back to a locally recovered, padded layout rather than
/// failing outright, but that fallback is worth a warning.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayoutWarning {
    /// The variant solver could not find a perfect (zero-padding) envelope at
    /// the given alignment band and fell back to appending the arm's
    /// remaining leaves sequentially past the envelope it did find.
    ImperfectVariantLayout { field: String, align_bytes: u64, arm_index: usize },
}

impl std::fmt::Display for LayoutWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayoutWarning::ImperfectVariantLayout { field, align_bytes, arm_index } => write!(
                f,
                "variant `{field}` arm {arm_index}: no perfect packing found at {align_bytes}-byte \
                 alignment, falling back to a padded layout"
            ),
        }
    }
}

/// Structural problems in the type tree that a parser would normally reject
/// before the layout planner ever sees them.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("struct `{0}` references unknown identifier index {1}")]
    UnknownIdentifier(String, u32),

    #[error("struct `{0}` is part of a cyclic nested-struct reference")]
    CyclicStruct(String),

    #[error("field `{field}` nests a dynamic array/string inside an array scope, which is unsupported")]
    DynamicSizeInArray { field: String },

    #[error("field `{field}` nests a dynamic array/string inside a variant arm, which is unsupported")]
    DynamicSizeInVariant { field: String },

    #[error("field `{field}` nests a dynamic array inside another dynamic array, which is unsupported")]
    NestedDynamicArray { field: String },

    #[error("field `{field}` requests a packed variant, which is rejected outright")]
    PackedVariantRequested { field: String },

    #[error("field `{field}` nests fixed arrays {depth} levels deep, exceeding the cap of {max}")]
    ArrayDepthExceeded { field: String, depth: u32, max: u32 },

    #[error("variant in field `{field}` has zero arms")]
    EmptyVariant { field: String },
}

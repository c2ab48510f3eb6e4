/// Everything that can stop [`crate::Driver::compile`] short: a bad schema, a
/// layout the planner couldn't resolve, or a write failure.
/// `LayoutImpossibleError` does not appear here — it is always locally
/// recovered into a padded layout plus a warning inside `recgen-layout`,
/// never propagated this far.
#[derive(thiserror::Error, Debug)]
pub enum CodegenError {
    #[error(transparent)]
    Schema(#[from] recgen_schema::SchemaError),

    #[error(transparent)]
    Layout(#[from] recgen_layout::LayoutError),

    #[error("writing the generated header failed")]
    Output(#[from] std::io::Error),

    #[error("no struct named `{0}` in this module")]
    UnknownTarget(String),

    #[error("nested-array recursion depth {depth} exceeds the cap of {max}")]
    DepthExceeded { depth: usize, max: usize },
}

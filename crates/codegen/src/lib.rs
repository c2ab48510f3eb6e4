//! Accessor code emitter: turns a [`recgen_layout::LayoutPlan`] into
//! closed-form accessor source, and a [`Driver`] that ties a
//! [`recgen_schema::Module`] and a chosen target struct name to that output.
//!
//! This crate never parses schema source and never touches the filesystem —
//! it takes a module and a target name, and hands back (or writes out)
//! generated text. Schema parsing and file I/O are collaborators a caller
//! supplies.

mod code_indenter;
mod ctor_strings;
mod emit;
mod error;

pub use code_indenter::{CodeIndenter, Indenter};
pub use ctor_strings::{for_depth as ctor_strings_for_depth, CtorStrs, MAX_CTOR_DEPTH};
pub use emit::emit_struct;
pub use error::CodegenError;

use recgen_schema::{Module, StructId, Type};

/// The driver's tunables: the leading include line and a depth override.
/// No environment variables are read; every knob here is passed by value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodegenOptions {
    /// The single `#include` line the generated header opens with.
    pub header_include: String,
    /// Overrides `recgen_schema::MAX_ARRAY_DEPTH` for callers that want a
    /// tighter cap than the crate default; never looser (checked against the
    /// crate constant at construction).
    pub max_fixed_array_depth: u32,
}

impl Default for CodegenOptions {
    fn default() -> Self {
        CodegenOptions {
            header_include: "#include <cstdint>".to_string(),
            max_fixed_array_depth: recgen_schema::MAX_ARRAY_DEPTH,
        }
    }
}

/// Ties one [`Module`] to the accessor emitter.
pub struct Driver<'a> {
    pub module: &'a Module,
    pub options: CodegenOptions,
}

impl<'a> Driver<'a> {
    pub fn new(module: &'a Module) -> Self {
        Driver { module, options: CodegenOptions::default() }
    }

    pub fn with_options(module: &'a Module, options: CodegenOptions) -> Self {
        Driver { module, options }
    }

    /// Emits the header text for `target` (and every struct it transitively
    /// references through `Identifier` fields, each defined before its first
    /// use).
    pub fn compile(&self, target: &str) -> Result<String, CodegenError> {
        let root = self.module.find(target).ok_or_else(|| CodegenError::UnknownTarget(target.to_string()))?;
        let order = dependency_order(self.module, root);
        tracing::debug!(target, struct_count = order.len(), "compiling target to accessor header");

        let mut buf = code_indenter::Indenter::new(String::new());
        writeln!(&mut buf, "{}", self.options.header_include);
        buf.newline();
        for id in order {
            let plan = recgen_layout::plan(self.module, id)?;
            emit::emit_struct(&mut buf, self.module, id, &plan)?;
        }
        Ok(buf.into_inner())
    }

    /// Same as [`Driver::compile`], but writes straight to `out`; any write
    /// failure comes back as `CodegenError::Output`.
    pub fn compile_into(&self, target: &str, out: &mut impl std::io::Write) -> Result<(), CodegenError> {
        let text = self.compile(target)?;
        out.write_all(text.as_bytes()).map_err(CodegenError::Output)
    }
}

/// Every struct `root` needs defined before it (its own `Identifier`
/// dependencies, recursively), in a valid definition order, with `root`
/// itself last; a post-order walk naturally yields "dependencies first"
/// since it only appends a struct after all of its own children have been
/// visited.
fn dependency_order(module: &Module, root: StructId) -> Vec<StructId> {
    let mut visited = vec![false; module.structs().len()];
    let mut order = Vec::new();
    visit_deps(module, root, &mut visited, &mut order);
    order
}

fn visit_deps(module: &Module, id: StructId, visited: &mut [bool], order: &mut Vec<StructId>) {
    if visited[id.0 as usize] {
        return;
    }
    visited[id.0 as usize] = true;
    let def = module.get(id);
    for field in &def.fields {
        collect_identifier_deps(module, &field.ty, visited, order);
    }
    order.push(id);
}

fn collect_identifier_deps(module: &Module, ty: &Type, visited: &mut [bool], order: &mut Vec<StructId>) {
    match ty {
        Type::Scalar(_) | Type::FixedString { .. } | Type::String { .. } => {}
        Type::FixedArray { inner, .. } | Type::Array { inner, .. } => {
            collect_identifier_deps(module, inner, visited, order)
        }
        Type::FixedVariant(v) | Type::DynamicVariant(v) | Type::PackedVariant(v) => {
            for arm in &v.arms {
                for f in &arm.fields {
                    collect_identifier_deps(module, f, visited, order);
                }
            }
        }
        Type::Identifier(id) => visit_deps(module, *id, visited, order),
    }
}

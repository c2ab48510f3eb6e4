//! Accessor code emitter: walks a [`Module`]'s schema tree in lockstep with
//! the [`LayoutPlan`] the same struct produced, writing one C++ value type
//! per struct with closed-form offset-expression accessor bodies — no
//! parsing, copying, or allocation at access time.
//!
//! The walk mirrors `recgen_layout::planner::visit_type`'s traversal order
//! exactly (same recursion shape, same order of `Fixed`/`Variable` leaf
//! allocation), so a single cursor into [`LayoutPlan::idx_map`] stays in
//! sync with the schema tree without this crate needing its own copy of the
//! planner's bookkeeping.
//!
//! Every compound type (fixed array, variant, identifier) is addressed
//! through a *representative element*: a nested view type whose own `base`
//! field is the absolute, struct-relative address of that element's first
//! byte. Because `recgen-layout` already flattens nested aggregates into one
//! struct-relative offset table, every nested view's constructor only ever
//! needs that one already-shifted `base` — never the `idx_0, idx_1, ...`
//! ambient index chain `ctor_strings`'s table builds strings for (see that
//! module's doc for why the table is still implemented, just unused past
//! depth 0 in this design).

use std::fmt::Write as _;

use convert_case::{Case, Casing};
use itertools::Itertools;
use recgen_layout::{LayoutPlan, LeafRef, VarLeaf};
use recgen_schema::{Align, Module, Scalar, StructId, Type, VariantDef};

use crate::code_indenter::{block, Indenter};
use crate::error::CodegenError;

/// Where an accessor is being generated *for*: a named zero-argument field
/// method, or the indexed `get(uint32_t idx)` of an enclosing array view.
enum Site<'a> {
    Field(&'a str),
    /// An enclosing array's `get(uint32_t idx)`; the `u64` is the stride
    /// (in bytes) between consecutive copies of *this* node as laid out by
    /// that enclosing array — computed once by the caller from its own
    /// `array_element_stride` entry and threaded down rather than
    /// recomputed here, since this node's own per-element stride (if it is
    /// itself an array or variant) means something different: the spacing
    /// of *its* children, not the spacing the enclosing array uses between
    /// whole copies of it.
    Element(u64),
}

fn to_pascal(name: &str) -> String {
    name.to_case(Case::Pascal)
}

/// `base`, optionally `+ delta`, optionally `+ idx * stride` — the one
/// offset-expression shape every accessor body in this emitter reduces to.
/// Omits the `+ 0` term entirely when the delta is zero.
fn addr_expr(delta: u64, idx_stride: Option<u64>) -> String {
    match (delta, idx_stride) {
        (0, None) => "base".to_string(),
        (d, None) => format!("base + {d}"),
        (0, Some(s)) => format!("base + idx * {s}"),
        (d, Some(s)) => format!("base + {d} + idx * {s}"),
    }
}

fn take_fixed(cursor: &mut usize, plan: &LayoutPlan) -> u32 {
    match plan.idx_map[*cursor] {
        LeafRef::Fixed(slot) => {
            *cursor += 1;
            slot
        }
        LeafRef::Variable(_) => {
            unreachable!("idx_map desynchronized: expected a fixed leaf at occurrence {}", cursor)
        }
    }
}

fn take_var(cursor: &mut usize, plan: &LayoutPlan) -> u32 {
    match plan.idx_map[*cursor] {
        LeafRef::Variable(slot) => {
            *cursor += 1;
            slot
        }
        LeafRef::Fixed(_) => {
            unreachable!("idx_map desynchronized: expected a variable leaf at occurrence {}", cursor)
        }
    }
}

fn reader_c_type(align: Align) -> &'static str {
    match align {
        Align::One => "uint8_t",
        Align::Two => "uint16_t",
        Align::Four => "uint32_t",
        Align::Eight => "uint64_t",
    }
}

fn tag_c_type(arm_count: usize) -> &'static str {
    if arm_count <= u8::MAX as usize {
        "uint8_t"
    } else {
        "uint16_t"
    }
}

fn align_of_stride(stride: u64) -> u64 {
    for candidate in [8, 4, 2] {
        if stride % candidate == 0 {
            return candidate;
        }
    }
    1
}

fn round_up(value: u64, multiple: u64) -> u64 {
    if multiple == 0 {
        value
    } else {
        value.div_ceil(multiple) * multiple
    }
}

/// Byte offset, from the struct's own base, where its variable-length
/// region starts: the fixed region rounded up to the strongest alignment
/// any occupying (string/array) variable leaf needs.
fn var_region_start(plan: &LayoutPlan) -> u64 {
    let max_align = plan
        .var_leaves
        .iter()
        .filter_map(|v| match v {
            VarLeaf::String { .. } => Some(1u64),
            VarLeaf::Array { element_stride, .. } => Some(align_of_stride(*element_stride)),
            VarLeaf::VariantSize { .. } => None,
        })
        .max()
        .unwrap_or(1);
    round_up(plan.fixed_size, max_align)
}

/// One term of a variable leaf's size chain: the index of an earlier,
/// byte-occupying var leaf and the per-unit stride its reported size is
/// multiplied by.
struct ChainTerm {
    size_fn_index: usize,
    stride: u64,
}

fn chain_terms_before(plan: &LayoutPlan, var_index: usize) -> Vec<ChainTerm> {
    plan.var_leaves[..var_index]
        .iter()
        .enumerate()
        .filter_map(|(i, v)| match v {
            VarLeaf::String { .. } => Some(ChainTerm { size_fn_index: i, stride: 1 }),
            VarLeaf::Array { element_stride, .. } => Some(ChainTerm { size_fn_index: i, stride: *element_stride }),
            VarLeaf::VariantSize { .. } => None,
        })
        .collect()
}

/// The closed-form expression for where variable leaf `var_index` starts,
/// in terms of the struct's own `size_<i>(base)` static readers, each of
/// which was already emitted for an earlier variable leaf.
fn chain_expr(struct_name: &str, plan: &LayoutPlan, var_index: usize) -> String {
    let mut expr = var_region_start(plan).to_string();
    for term in chain_terms_before(plan, var_index) {
        if term.stride == 1 {
            write!(expr, " + {struct_name}::size{}(base)", term.size_fn_index).unwrap();
        } else {
            write!(expr, " + {struct_name}::size{}(base) * {}", term.size_fn_index, term.stride).unwrap();
        }
    }
    expr
}

/// Emits the struct's static `size<i>(size_t base)` readers, one per entry
/// of [`LayoutPlan::var_leaves`].
fn emit_size_readers(out: &mut Indenter, plan: &LayoutPlan) {
    for (i, var) in plan.var_leaves.iter().enumerate() {
        match var {
            VarLeaf::String { size_reader_occurrence, min_len } => {
                let off = plan.fixed_offsets[*size_reader_occurrence as usize];
                let rt = reader_c_type(off.align);
                let addr = addr_expr(off.byte_offset, None);
                writeln!(
                    out,
                    "static uint64_t size{i}(size_t base) {{ return {min_len} + *reinterpret_cast<const {rt}*>({addr}); }}"
                );
            }
            VarLeaf::Array { size_reader_occurrence, min_len, .. } => {
                let off = plan.fixed_offsets[*size_reader_occurrence as usize];
                let rt = reader_c_type(off.align);
                let addr = addr_expr(off.byte_offset, None);
                writeln!(
                    out,
                    "static uint64_t size{i}(size_t base) {{ return {min_len} + *reinterpret_cast<const {rt}*>({addr}); }}"
                );
            }
            VarLeaf::VariantSize { tag_occurrence, arm_byte_sizes } => {
                let off = plan.fixed_offsets[*tag_occurrence as usize];
                let tt = tag_c_type(arm_byte_sizes.len());
                let addr = addr_expr(off.byte_offset, None);
                let literal = arm_byte_sizes.iter().join(", ");
                writeln!(
                    out,
                    "static uint64_t size{i}(size_t base) {{ static constexpr uint64_t arm_sizes[{}] = {{{literal}}}; return arm_sizes[*reinterpret_cast<const {tt}*>({addr})]; }}",
                    arm_byte_sizes.len()
                );
            }
        }
    }
}

/// Emits one struct's full accessor type: constructor, one method per field
/// in source order, then the struct's `size<i>(base)` static readers.
pub fn emit_struct(
    out: &mut Indenter,
    module: &Module,
    id: StructId,
    plan: &LayoutPlan,
) -> Result<(), CodegenError> {
    let def = module.get(id);
    let name = &def.name;
    tracing::debug!(struct_name = %name, field_count = def.fields.len(), fixed_size = plan.fixed_size, "emitting struct accessor");
    let mut cursor = 0usize;
    block(
        out,
        &format!("struct {name} {{"),
        "};",
        |out| -> Result<(), CodegenError> {
            writeln!(out, "size_t base;");
            writeln!(out, "{name}(size_t base) : base(base) {{}}");
            for field in &def.fields {
                emit_leaf(out, module, plan, &mut cursor, &field.ty, 0, 0, name, &field.name, Site::Field(&field.name))?;
            }
            emit_size_readers(out, plan);
            Ok(())
        },
    )?;
    out.newline();
    debug_assert_eq!(cursor, plan.idx_map.len(), "emitter consumed a different number of leaves than the planner produced");
    Ok(())
}

/// Recursively emits one leaf's accessor, consuming exactly as many
/// `idx_map` entries as `recgen_layout::planner::visit_type` allocated for
/// the same node (so the shared cursor stays in sync with sibling fields).
///
/// `enclosing_base` is the struct-relative byte offset the *caller's*
/// `base` variable already represents; `hint` names any nested view type
/// this leaf needs to synthesize; `site` selects between a plain field
/// method and an array's `get(uint32_t idx)`.
#[allow(clippy::too_many_arguments)]
fn emit_leaf(
    out: &mut Indenter,
    module: &Module,
    plan: &LayoutPlan,
    cursor: &mut usize,
    ty: &Type,
    enclosing_base: u64,
    variant_depth: u32,
    struct_name: &str,
    hint: &str,
    site: Site,
) -> Result<(), CodegenError> {
    match ty {
        Type::Scalar(s) => emit_scalar(out, plan, cursor, *s, enclosing_base, site),
        Type::FixedString { len } => emit_fixed_string(out, plan, cursor, *len, enclosing_base, hint, site),
        Type::String { min_len, stored_size_align } => {
            emit_dynamic_string(out, plan, cursor, *min_len, *stored_size_align, struct_name, hint, site)
        }
        Type::Array { min_len, stored_size_align, inner } => {
            emit_dynamic_array(out, plan, cursor, *min_len, *stored_size_align, inner, struct_name, hint, site)
        }
        Type::FixedArray { len, inner } => {
            emit_fixed_array(out, module, plan, cursor, *len, inner, enclosing_base, variant_depth, struct_name, hint, site)
        }
        Type::FixedVariant(v) => {
            emit_variant(out, module, plan, cursor, v, false, enclosing_base, variant_depth, struct_name, hint, site)
        }
        Type::DynamicVariant(v) => {
            emit_variant(out, module, plan, cursor, v, true, enclosing_base, variant_depth, struct_name, hint, site)
        }
        Type::PackedVariant(_) => unreachable!("packed variants are rejected during schema validation"),
        Type::Identifier(id) => emit_identifier(out, module, plan, cursor, *id, enclosing_base, site),
    }
}

fn emit_scalar(
    out: &mut Indenter,
    plan: &LayoutPlan,
    cursor: &mut usize,
    s: Scalar,
    enclosing_base: u64,
    site: Site,
) -> Result<(), CodegenError> {
    let slot = take_fixed(cursor, plan);
    let delta = plan.fixed_offsets[slot as usize].byte_offset - enclosing_base;
    let ty = s.rust_like_name();
    match site {
        Site::Field(name) => {
            let addr = addr_expr(delta, None);
            writeln!(out, "{ty} {name}() const {{ return *reinterpret_cast<const {ty}*>({addr}); }}");
        }
        Site::Element(stride) => {
            let addr = addr_expr(delta, Some(stride));
            writeln!(out, "{ty} get(uint32_t idx) const {{ return *reinterpret_cast<const {ty}*>({addr}); }}");
        }
    }
    Ok(())
}

fn emit_fixed_string_view_body(out: &mut Indenter, len: u32) {
    writeln!(out, "const char* c_str() const {{ return reinterpret_cast<const char*>(base); }}");
    writeln!(out, "constexpr uint32_t size() const {{ return {len}; }}");
    writeln!(out, "constexpr uint32_t length() const {{ return {len} - 1; }}");
}

fn emit_fixed_string(
    out: &mut Indenter,
    plan: &LayoutPlan,
    cursor: &mut usize,
    len: u32,
    enclosing_base: u64,
    hint: &str,
    site: Site,
) -> Result<(), CodegenError> {
    let slot = take_fixed(cursor, plan);
    let delta = plan.fixed_offsets[slot as usize].byte_offset - enclosing_base;
    let view_name = format!("{}View", to_pascal(hint));
    block(
        out,
        &format!("struct {view_name} {{"),
        "};",
        |out| {
            writeln!(out, "size_t base;");
            writeln!(out, "{view_name}(size_t base) : base(base) {{}}");
            emit_fixed_string_view_body(out, len);
        },
    );
    match site {
        Site::Field(name) => {
            let addr = addr_expr(delta, None);
            writeln!(out, "{view_name} {name}() const {{ return {view_name}({addr}); }}");
        }
        Site::Element(stride) => {
            let addr = addr_expr(delta, Some(stride));
            writeln!(out, "{view_name} get(uint32_t idx) const {{ return {view_name}({addr}); }}");
        }
    }
    Ok(())
}

/// Dynamic strings and dynamic arrays only ever appear as direct struct
/// fields (`recgen_schema::validate` rejects one nested in an array or
/// variant arm), so both of these only need to handle `Site::Field` for
/// real; the `Site::Element` arm exists for completeness but is never hit.
fn emit_dynamic_string(
    out: &mut Indenter,
    plan: &LayoutPlan,
    cursor: &mut usize,
    min_len: u32,
    stored_size_align: Align,
    struct_name: &str,
    hint: &str,
    site: Site,
) -> Result<(), CodegenError> {
    let _ = stored_size_align;
    let reader_slot = take_fixed(cursor, plan);
    let var_slot = take_var(cursor, plan) as usize;
    let _ = reader_slot;
    let data_addr = format!("base + {}", chain_expr(struct_name, plan, var_slot));
    let view_name = format!("{}View", to_pascal(hint));
    let min_len_u64 = min_len as u64;
    block(
        out,
        &format!("struct {view_name} {{"),
        "};",
        |out| {
            writeln!(out, "size_t base;");
            writeln!(out, "{view_name}(size_t base) : base(base) {{}}");
            writeln!(out, "const char* c_str() const {{ return reinterpret_cast<const char*>({data_addr}); }}");
            writeln!(out, "uint64_t size() const {{ return {struct_name}::size{var_slot}(base); }}");
            let _ = min_len_u64;
        },
    );
    let name = match site {
        Site::Field(name) => name,
        Site::Element(_) => "get",
    };
    writeln!(out, "{view_name} {name}() const {{ return {view_name}(base); }}");
    Ok(())
}

fn emit_dynamic_array(
    out: &mut Indenter,
    plan: &LayoutPlan,
    cursor: &mut usize,
    min_len: u32,
    stored_size_align: Align,
    inner: &Type,
    struct_name: &str,
    hint: &str,
    site: Site,
) -> Result<(), CodegenError> {
    let _ = (min_len, stored_size_align);
    let reader_slot = take_fixed(cursor, plan);
    let var_slot = take_var(cursor, plan) as usize;
    let _ = reader_slot;
    let VarLeaf::Array { element_stride, .. } = &plan.var_leaves[var_slot] else {
        unreachable!("idx_map desynchronized: expected an Array var leaf");
    };
    let stride = *element_stride;
    let base_expr = chain_expr(struct_name, plan, var_slot);
    let view_name = format!("{}View", to_pascal(hint));
    block(
        out,
        &format!("struct {view_name} {{"),
        "};",
        |out| {
            writeln!(out, "size_t base;");
            writeln!(out, "{view_name}(size_t base) : base(base) {{}}");
            writeln!(out, "uint32_t length() const {{ return {struct_name}::size{var_slot}(base); }}");
            match inner.as_ref() {
                Type::Scalar(s) => {
                    let ty = s.rust_like_name();
                    writeln!(
                        out,
                        "{ty} get(uint32_t idx) const {{ return *reinterpret_cast<const {ty}*>(base + {base_expr} + idx * {stride}); }}"
                    );
                }
                Type::FixedString { len } => {
                    let elem_view = format!("{}ElemView", to_pascal(hint));
                    block(
                        out,
                        &format!("struct {elem_view} {{"),
                        "};",
                        |out| {
                            writeln!(out, "size_t base;");
                            writeln!(out, "{elem_view}(size_t base) : base(base) {{}}");
                            emit_fixed_string_view_body(out, *len);
                        },
                    );
                    writeln!(
                        out,
                        "{elem_view} get(uint32_t idx) const {{ return {elem_view}(base + {base_expr} + idx * {stride}); }}"
                    );
                }
                other => unreachable!("dynamic array of {other:?} is rejected during schema validation"),
            }
        },
    );
    let name = match site {
        Site::Field(name) => name,
        Site::Element(_) => "get",
    };
    writeln!(out, "{view_name} {name}() const {{ return {view_name}(base); }}");
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn emit_fixed_array(
    out: &mut Indenter,
    module: &Module,
    plan: &LayoutPlan,
    cursor: &mut usize,
    len: u32,
    inner: &Type,
    enclosing_base: u64,
    variant_depth: u32,
    struct_name: &str,
    hint: &str,
    site: Site,
) -> Result<(), CodegenError> {
    let base_slot = take_fixed(cursor, plan);
    let array_abs = plan.fixed_offsets[base_slot as usize].byte_offset;
    let delta = array_abs - enclosing_base;
    // Stride between consecutive elements *of this array*, i.e. the spacing
    // `inner`'s own Site::Element accessor must use — not to be confused
    // with the stride this whole array occupies as someone else's element,
    // which arrives (if at all) via our own `site` parameter below.
    let own_elem_stride = plan.array_element_stride.get(&base_slot).copied().unwrap_or(0);
    let view_name = format!("{}View", to_pascal(hint));
    let elem_hint = format!("{hint}Elem");
    block(
        out,
        &format!("struct {view_name} {{"),
        "};",
        |out| -> Result<(), CodegenError> {
            writeln!(out, "size_t base;");
            writeln!(out, "{view_name}(size_t base) : base(base) {{}}");
            writeln!(out, "constexpr uint32_t length() const {{ return {len}; }}");
            emit_leaf(
                out,
                module,
                plan,
                cursor,
                inner,
                array_abs,
                variant_depth,
                struct_name,
                &elem_hint,
                Site::Element(own_elem_stride),
            )?;
            Ok(())
        },
    )?;
    match site {
        Site::Field(name) => {
            let addr = addr_expr(delta, None);
            writeln!(out, "{view_name} {name}() const {{ return {view_name}({addr}); }}");
        }
        Site::Element(enclosing_stride) => {
            let addr = addr_expr(delta, Some(enclosing_stride));
            writeln!(out, "{view_name} get(uint32_t idx) const {{ return {view_name}({addr}); }}");
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn emit_variant(
    out: &mut Indenter,
    module: &Module,
    plan: &LayoutPlan,
    cursor: &mut usize,
    v: &VariantDef,
    dynamic: bool,
    enclosing_base: u64,
    variant_depth: u32,
    struct_name: &str,
    hint: &str,
    site: Site,
) -> Result<(), CodegenError> {
    let tag_slot = take_fixed(cursor, plan);
    let tag_abs = plan.fixed_offsets[tag_slot as usize].byte_offset;
    let delta = tag_abs - enclosing_base;
    let tag_ty = tag_c_type(v.arms.len());
    let view_name = format!("{}View", to_pascal(hint));

    block(
        out,
        &format!("struct {view_name} {{"),
        "};",
        |out| -> Result<(), CodegenError> {
            writeln!(out, "size_t base;");
            writeln!(out, "{view_name}(size_t base) : base(base) {{}}");
            writeln!(out, "{tag_ty} tag() const {{ return *reinterpret_cast<const {tag_ty}*>(base); }}");
            for (arm_index, arm) in v.arms.iter().enumerate() {
                let accessor_name = format!("as_{variant_depth}_{arm_index}");
                if arm.fields.len() == 1 {
                    emit_leaf(
                        out,
                        module,
                        plan,
                        cursor,
                        &arm.fields[0],
                        tag_abs,
                        variant_depth + 1,
                        struct_name,
                        &format!("{hint}Arm{arm_index}"),
                        Site::Field(&accessor_name),
                    )?;
                } else {
                    let arm_view = format!("{}Arm{arm_index}View", to_pascal(hint));
                    block(
                        out,
                        &format!("struct {arm_view} {{"),
                        "};",
                        |out| -> Result<(), CodegenError> {
                            writeln!(out, "size_t base;");
                            writeln!(out, "{arm_view}(size_t base) : base(base) {{}}");
                            for (field_index, field_ty) in arm.fields.iter().enumerate() {
                                emit_leaf(
                                    out,
                                    module,
                                    plan,
                                    cursor,
                                    field_ty,
                                    tag_abs,
                                    variant_depth + 1,
                                    struct_name,
                                    &format!("{hint}Arm{arm_index}Field{field_index}"),
                                    Site::Field(&format!("field_{field_index}")),
                                )?;
                            }
                            Ok(())
                        },
                    )?;
                    writeln!(out, "{arm_view} {accessor_name}() const {{ return {arm_view}(base); }}");
                }
            }
            if dynamic {
                let var_slot = take_var(cursor, plan) as usize;
                writeln!(out, "uint64_t size() const {{ return {struct_name}::size{var_slot}(base); }}");
            }
            Ok(())
        },
    )?;

    match site {
        Site::Field(name) => {
            let addr = addr_expr(delta, None);
            writeln!(out, "{view_name} {name}() const {{ return {view_name}({addr}); }}");
        }
        Site::Element(stride) => {
            let addr = addr_expr(delta, Some(stride));
            writeln!(out, "{view_name} get(uint32_t idx) const {{ return {view_name}({addr}); }}");
        }
    }
    Ok(())
}

fn emit_identifier(
    out: &mut Indenter,
    module: &Module,
    plan: &LayoutPlan,
    cursor: &mut usize,
    id: StructId,
    enclosing_base: u64,
    site: Site,
) -> Result<(), CodegenError> {
    let base_slot = take_fixed(cursor, plan);
    let abs = plan.fixed_offsets[base_slot as usize].byte_offset;
    let delta = abs - enclosing_base;
    let inner_plan = recgen_layout::plan(module, id)?;
    *cursor += inner_plan.idx_map.len();
    let type_name = module.get(id).name.clone();
    match site {
        Site::Field(name) => {
            let addr = addr_expr(delta, None);
            writeln!(out, "{type_name} {name}() const {{ return {type_name}({addr}); }}");
        }
        Site::Element(stride) => {
            let addr = addr_expr(delta, Some(stride));
            writeln!(out, "{type_name} get(uint32_t idx) const {{ return {type_name}({addr}); }}");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recgen_schema::{FieldDef, StructDef, VariantArm};

    fn compile_one(def: StructDef) -> String {
        let name = def.name.clone();
        let module = Module::build(vec![def]).unwrap();
        crate::Driver::new(&module).compile(&name).unwrap()
    }

    /// S1: `struct P { a: u8; b: u64; c: u16; }` packs to `b@0, c@8, a@10`;
    /// each accessor reads from its own packed offset regardless of source
    /// order, and a zero delta omits the `+ 0` term entirely.
    #[test]
    fn s1_scalar_struct_reads_from_packed_offsets() {
        let text = compile_one(StructDef::new(
            "P",
            vec![
                FieldDef::new("a", Type::Scalar(Scalar::U8)),
                FieldDef::new("b", Type::Scalar(Scalar::U64)),
                FieldDef::new("c", Type::Scalar(Scalar::U16)),
            ],
        ));
        assert!(text.contains("uint8_t a() const { return *reinterpret_cast<const uint8_t*>(base + 10); }"));
        assert!(text.contains("uint64_t b() const { return *reinterpret_cast<const uint64_t*>(base); }"));
        assert!(text.contains("uint16_t c() const { return *reinterpret_cast<const uint16_t*>(base + 8); }"));
    }

    /// S2: `struct Q { xs: FixedArray<u32, 3>; }` — `xs().get(2)` is
    /// `base + idx * 4`, and `length()` is the compile-time constant `3`.
    #[test]
    fn s2_fixed_array_indexes_by_constant_stride() {
        let text = compile_one(StructDef::new(
            "Q",
            vec![FieldDef::new("xs", Type::fixed_array(3, Type::Scalar(Scalar::U32)))],
        ));
        assert!(text.contains("constexpr uint32_t length() const { return 3; }"));
        assert!(text.contains(
            "uint32_t get(uint32_t idx) const { return *reinterpret_cast<const uint32_t*>(base + idx * 4); }"
        ));
        assert!(text.contains("XsView xs() const { return XsView(base); }"));
    }

    /// S3: `V = u64 | (u32,u32) | u8`. Single-field arms get a direct
    /// `as_0_0`/`as_0_2` accessor; the two-field arm gets its own nested view
    /// with `as_0_1`, and the whole variant exposes a `tag()` reader.
    #[test]
    fn s3_fixed_variant_exposes_tag_and_per_arm_accessors() {
        let v = VariantDef {
            arms: vec![
                VariantArm::single(Type::Scalar(Scalar::U64)),
                VariantArm { fields: vec![Type::Scalar(Scalar::U32), Type::Scalar(Scalar::U32)] },
                VariantArm::single(Type::Scalar(Scalar::U8)),
            ],
        };
        let text = compile_one(StructDef::new("S", vec![FieldDef::new("v", Type::FixedVariant(v))]));
        assert!(text.contains("uint8_t tag() const { return *reinterpret_cast<const uint8_t*>(base); }"));
        assert!(text.contains("as_0_0() const"));
        assert!(text.contains("as_0_1() const"));
        assert!(text.contains("as_0_2() const"));
        // the envelope starts immediately after the 1-byte tag, unaligned
        assert!(text.contains("uint64_t as_0_0() const { return *reinterpret_cast<const uint64_t*>(base + 1); }"));
        // arm 1 (two u32s) gets its own nested view rather than a direct read
        assert!(text.contains("VArm1View as_0_1() const { return VArm1View(base); }"));
    }

    /// S6: `struct Inner { x: u32; y: u32 }; struct Outer { i: FixedArray<Inner, 2> }`
    /// — `i().get(1).x()` and `.y()` compute `base + 8` and `base + 12`
    /// through the nested struct's own accessors, not flattened offsets.
    #[test]
    fn s6_nested_struct_through_fixed_array_addresses_by_element_stride() {
        let inner = StructDef::new(
            "Inner",
            vec![FieldDef::new("x", Type::Scalar(Scalar::U32)), FieldDef::new("y", Type::Scalar(Scalar::U32))],
        );
        let outer =
            StructDef::new("Outer", vec![FieldDef::new("i", Type::fixed_array(2, Type::Identifier(StructId(0))))]);
        let module = Module::build(vec![inner, outer]).unwrap();
        let text = crate::Driver::new(&module).compile("Outer").unwrap();

        assert!(text.contains("uint32_t x() const { return *reinterpret_cast<const uint32_t*>(base); }"));
        assert!(text.contains("uint32_t y() const { return *reinterpret_cast<const uint32_t*>(base + 4); }"));
        // one Inner per 8-byte element, addressed from the array's own base
        assert!(text.contains("Inner get(uint32_t idx) const { return Inner(base + idx * 8); }"));
    }

    /// `struct M { g: FixedArray<FixedArray<u32, 3>, 4>; }` — the outer
    /// array's `get(idx)` must stride by the whole 12-byte inner array, not
    /// by the inner array's own 4-byte element stride.
    #[test]
    fn nested_fixed_array_outer_get_strides_by_whole_inner_array() {
        let text = compile_one(StructDef::new(
            "M",
            vec![FieldDef::new("g", Type::fixed_array(4, Type::fixed_array(3, Type::Scalar(Scalar::U32))))],
        ));
        assert!(text.contains(
            "uint32_t get(uint32_t idx) const { return *reinterpret_cast<const uint32_t*>(base + idx * 4); }"
        ));
        assert!(text.contains("GElemView get(uint32_t idx) const { return GElemView(base + idx * 12); }"));
    }

    /// A fixed array of a fixed variant: the outer array must stride by the
    /// variant's whole envelope size, not by any one arm's field width.
    #[test]
    fn fixed_array_of_variant_strides_by_variant_envelope() {
        let v = VariantDef { arms: vec![VariantArm::single(Type::Scalar(Scalar::U64)), VariantArm::single(Type::Scalar(Scalar::U8))] };
        let text = compile_one(StructDef::new(
            "N",
            vec![FieldDef::new("vs", Type::fixed_array(2, Type::FixedVariant(v)))],
        ));
        // raw envelope is tag (1 byte) + u64 payload = 9 bytes; the array
        // element stride pads that up to the envelope's own 8-byte alignment
        assert!(text.contains("get(uint32_t idx) const { return VsElemView(base + idx * 16); }"));
    }
}

//! Recursive type-tree visitor that drives [`crate::queue::FieldQueue`] and
//! [`crate::variant`] to build a whole struct's [`crate::LayoutPlan`].
//!
//! One visitor function handles every [`Type`] variant with a single
//! exhaustive match: there is no per-tag virtual dispatch to wire up, the
//! compiler checks that every case is handled.

use std::collections::HashMap;
use std::rc::Rc;

use recgen_schema::{Align, Module, Scalar, StructId, Type, VariantDef};

use crate::error::LayoutError;
use crate::queue::{FieldInfo, FieldQueue, QueuedField};
use crate::variant::{self, VariantLeaf};
use crate::{FixedOffset, LayoutPlan, LeafRef, VarLeaf};

fn align_from_bytes(bytes: u64) -> Align {
    match bytes {
        8 => Align::Eight,
        4 => Align::Four,
        2 => Align::Two,
        _ => Align::One,
    }
}

/// A previously computed struct layout, cached by [`StructId`] so a struct
/// referenced from several places (or nested inside an array) is only laid
/// out once. Nested structs must be entirely fixed-size; `has_variable`
/// records whether that's true so [`visit_type`] can reject the reference
/// otherwise.
struct CachedStruct {
    /// Each leaf's offset and alignment, relative to the struct's own start.
    leaves: Vec<(u64, Align)>,
    size: u64,
    align: Align,
    has_variable: bool,
}

struct PlanCtx<'m> {
    module: &'m Module,
    next_fixed_slot: u32,
    next_var_slot: u32,
    idx_map: Vec<LeafRef>,
    var_leaves: Vec<VarLeaf>,
    warnings: Vec<crate::LayoutWarning>,
    array_element_stride: HashMap<u32, u64>,
}

impl<'m> PlanCtx<'m> {
    fn new(module: &'m Module) -> Self {
        PlanCtx {
            module,
            next_fixed_slot: 0,
            next_var_slot: 0,
            idx_map: Vec::new(),
            var_leaves: Vec::new(),
            warnings: Vec::new(),
            array_element_stride: HashMap::new(),
        }
    }

    fn alloc_fixed_slot(&mut self) -> u32 {
        let slot = self.next_fixed_slot;
        self.next_fixed_slot += 1;
        slot
    }

    fn alloc_var_slot(&mut self) -> u32 {
        let slot = self.next_var_slot;
        self.next_var_slot += 1;
        slot
    }
}

pub(crate) fn plan_struct(module: &Module, root: StructId) -> Result<LayoutPlan, LayoutError> {
    let mut cache: HashMap<u32, Rc<CachedStruct>> = HashMap::new();
    let def = module.get(root);
    tracing::debug!(struct_name = %def.name, field_count = def.fields.len(), "planning struct layout");
    let mut ctx = PlanCtx::new(module);
    let mut queue = FieldQueue::new();
    for field in &def.fields {
        let qf = visit_type(&field.ty, &mut ctx, &mut cache, &field.name)?;
        queue.push(qf);
    }
    let (committed, fixed_size, _align) = queue.commit(0);
    let max_slot = committed.iter().map(|c| c.occurrence).max().map(|m| m + 1).unwrap_or(0);
    let mut fixed_offsets = vec![FixedOffset { byte_offset: 0, align: Align::One }; max_slot as usize];
    for c in committed {
        fixed_offsets[c.occurrence as usize] = FixedOffset { byte_offset: c.offset, align: c.align };
    }
    Ok(LayoutPlan {
        fixed_offsets,
        var_leaves: ctx.var_leaves,
        idx_map: ctx.idx_map,
        fixed_size,
        warnings: ctx.warnings,
        array_element_stride: ctx.array_element_stride,
    })
}

fn get_or_build_struct_shape(
    id: StructId,
    cache: &mut HashMap<u32, Rc<CachedStruct>>,
    module: &Module,
) -> Result<Rc<CachedStruct>, LayoutError> {
    if let Some(shape) = cache.get(&id.0) {
        return Ok(shape.clone());
    }
    let def = module.get(id);
    let mut local_ctx = PlanCtx::new(module);
    let mut queue = FieldQueue::new();
    for field in &def.fields {
        let qf = visit_type(&field.ty, &mut local_ctx, cache, &field.name)?;
        queue.push(qf);
    }
    let (committed, raw_size, align) = queue.commit(0);
    // Padded to its own alignment: this shape is only ever reused through an
    // `Identifier` reference, which `FixedArray` strides by copies of — each
    // copy must land naturally aligned.
    let size = FieldQueue::padded_size(raw_size, align);
    let has_variable = !local_ctx.var_leaves.is_empty();
    let leaves = committed.iter().map(|c| (c.offset, c.align)).collect();
    let shape = Rc::new(CachedStruct { leaves, size, align, has_variable });
    cache.insert(id.0, shape.clone());
    Ok(shape)
}

fn visit_type(
    ty: &Type,
    ctx: &mut PlanCtx,
    cache: &mut HashMap<u32, Rc<CachedStruct>>,
    field_name: &str,
) -> Result<QueuedField, LayoutError> {
    match ty {
        Type::Scalar(s) => visit_scalar(*s, ctx),

        Type::FixedString { len } => {
            let slot = ctx.alloc_fixed_slot();
            ctx.idx_map.push(LeafRef::Fixed(slot));
            Ok(QueuedField { size: *len as u64, align: Align::One, info: FieldInfo::Simple { occurrence: slot } })
        }

        Type::String { min_len, stored_size_align } => {
            let reader_slot = ctx.alloc_fixed_slot();
            ctx.idx_map.push(LeafRef::Fixed(reader_slot));
            let var_slot = ctx.alloc_var_slot();
            ctx.var_leaves.push(VarLeaf::String { size_reader_occurrence: reader_slot, min_len: *min_len });
            ctx.idx_map.push(LeafRef::Variable(var_slot));
            Ok(QueuedField {
                size: stored_size_align.bytes(),
                align: *stored_size_align,
                info: FieldInfo::Simple { occurrence: reader_slot },
            })
        }

        Type::FixedArray { len, inner } => {
            let base_slot = ctx.alloc_fixed_slot();
            ctx.idx_map.push(LeafRef::Fixed(base_slot));
            let element_qf = visit_type(inner, ctx, cache, field_name)?;
            let elem_align = element_qf.align;
            // Stride between copies must keep every copy naturally aligned,
            // even when the element's own raw extent (e.g. an unpadded
            // variant envelope) isn't already a multiple of its alignment.
            let elem_size = FieldQueue::padded_size(element_qf.size, elem_align);
            let mut leaves: Vec<(u32, u64, Align)> = match element_qf.info {
                FieldInfo::Simple { occurrence } => vec![(occurrence, 0, elem_align)],
                FieldInfo::Packed { leaves } => leaves,
            };
            leaves.push((base_slot, 0, elem_align));
            let total_size = elem_size * (*len as u64);
            ctx.array_element_stride.insert(base_slot, elem_size);
            tracing::debug!(field = field_name, len, elem_size, total_size, "fixed array laid out");
            Ok(QueuedField { size: total_size, align: elem_align, info: FieldInfo::Packed { leaves } })
        }

        Type::Array { min_len, stored_size_align, inner } => {
            let (element_size, element_align) = match inner.as_ref() {
                Type::Scalar(s) => (s.size(), s.align()),
                Type::FixedString { len } => (*len as u64, Align::One),
                // Rejected by validation already for anything dynamically sized;
                // composing arrays of structs/arrays/variants dynamically is a
                // known limitation of this layout engine (see DESIGN.md) rather
                // than a schema-level rule, so it's enforced here instead.
                other => {
                    return Err(LayoutError::Resource(crate::ResourceError::TooManyLeaves {
                        name: format!("unsupported dynamic-array element in field `{field_name}`: {other:?}"),
                        max: 0,
                    }));
                }
            };
            let _ = element_align;
            let reader_slot = ctx.alloc_fixed_slot();
            ctx.idx_map.push(LeafRef::Fixed(reader_slot));
            let var_slot = ctx.alloc_var_slot();
            ctx.var_leaves.push(VarLeaf::Array {
                size_reader_occurrence: reader_slot,
                min_len: *min_len,
                element_stride: element_size,
            });
            ctx.idx_map.push(LeafRef::Variable(var_slot));
            Ok(QueuedField {
                size: stored_size_align.bytes(),
                align: *stored_size_align,
                info: FieldInfo::Simple { occurrence: reader_slot },
            })
        }

        Type::FixedVariant(v) => visit_variant(v, false, ctx, cache, field_name),
        Type::DynamicVariant(v) => visit_variant(v, true, ctx, cache, field_name),

        Type::PackedVariant(_) => {
            unreachable!("packed variants are rejected during schema validation")
        }

        Type::Identifier(id) => {
            let shape = get_or_build_struct_shape(*id, cache, ctx.module)?;
            if shape.has_variable {
                return Err(LayoutError::NestedStructHasVariableFields {
                    field: field_name.to_string(),
                    struct_name: ctx.module.get(*id).name.clone(),
                });
            }
            let base_slot = ctx.alloc_fixed_slot();
            ctx.idx_map.push(LeafRef::Fixed(base_slot));
            let mut leaves = vec![(base_slot, 0u64, shape.align)];
            for &(rel_off, align) in &shape.leaves {
                let slot = ctx.alloc_fixed_slot();
                ctx.idx_map.push(LeafRef::Fixed(slot));
                leaves.push((slot, rel_off, align));
            }
            Ok(QueuedField { size: shape.size, align: shape.align, info: FieldInfo::Packed { leaves } })
        }
    }
}

fn visit_scalar(s: Scalar, ctx: &mut PlanCtx) -> Result<QueuedField, LayoutError> {
    let slot = ctx.alloc_fixed_slot();
    ctx.idx_map.push(LeafRef::Fixed(slot));
    Ok(QueuedField { size: s.size(), align: s.align(), info: FieldInfo::Simple { occurrence: slot } })
}

fn visit_variant(
    v: &VariantDef,
    dynamic: bool,
    ctx: &mut PlanCtx,
    cache: &mut HashMap<u32, Rc<CachedStruct>>,
    field_name: &str,
) -> Result<QueuedField, LayoutError> {
    if v.arms.is_empty() {
        return Err(LayoutError::EmptyVariant { field: field_name.to_string() });
    }
    let tag_align = v.tag_align();
    let tag_slot = ctx.alloc_fixed_slot();
    ctx.idx_map.push(LeafRef::Fixed(tag_slot));

    let mut arm_queued: Vec<Vec<QueuedField>> = Vec::with_capacity(v.arms.len());
    for arm in &v.arms {
        let mut fields = Vec::with_capacity(arm.fields.len());
        for f in &arm.fields {
            fields.push(visit_type(f, ctx, cache, field_name)?);
        }
        arm_queued.push(fields);
    }

    let arm_leaves_for_solver: Vec<Vec<VariantLeaf>> = arm_queued
        .iter()
        .map(|fields| fields.iter().map(|f| VariantLeaf { size: f.size, align: f.align }).collect())
        .collect();

    if dynamic {
        let arm_byte_sizes: Vec<u64> =
            arm_leaves_for_solver.iter().map(|leaves| leaves.iter().map(|l| l.size).sum()).collect();
        let var_slot = ctx.alloc_var_slot();
        ctx.var_leaves.push(VarLeaf::VariantSize { tag_occurrence: tag_slot, arm_byte_sizes });
        ctx.idx_map.push(LeafRef::Variable(var_slot));
    }

    let envelope = variant::solve_envelope(&arm_leaves_for_solver);
    tracing::debug!(
        field = field_name,
        arms = arm_leaves_for_solver.len(),
        l8 = envelope.l8,
        l4 = envelope.l4,
        l2 = envelope.l2,
        l1 = envelope.l1,
        "variant envelope solved"
    );
    let envelope_align = if envelope.l8 > 0 {
        Align::Eight
    } else if envelope.l4 > 0 {
        Align::Four
    } else if envelope.l2 > 0 {
        Align::Two
    } else {
        Align::One
    };
    // Unaligned `reinterpret_cast` reads are the whole point here, so the
    // envelope starts immediately after the tag with no naturally-aligned
    // padding between them.
    let envelope_start = tag_align.bytes();

    let mut packed_leaves: Vec<(u32, u64, Align)> = vec![(tag_slot, 0, tag_align)];
    let mut envelope_extent = envelope.l1;
    for (arm_index, fields) in arm_queued.iter().enumerate() {
        let (placement, warns, extent) =
            variant::place_arm(field_name, arm_index, &arm_leaves_for_solver[arm_index], &envelope);
        ctx.warnings.extend(warns);
        envelope_extent = envelope_extent.max(extent);
        for (qf, &rel_off) in fields.iter().zip(&placement.offsets) {
            match &qf.info {
                FieldInfo::Simple { occurrence } => {
                    packed_leaves.push((*occurrence, envelope_start + rel_off, qf.align));
                }
                FieldInfo::Packed { leaves } => {
                    for (occ, inner_rel, align) in leaves {
                        packed_leaves.push((*occ, envelope_start + rel_off + inner_rel, *align));
                    }
                }
            }
        }
    }

    let whole_align_bytes = tag_align.bytes().max(envelope_align.bytes());
    let whole_align = align_from_bytes(whole_align_bytes);
    // Raw extent, no trailing pad to `whole_align`: a variant embedded
    // directly in a struct reads no further than its own last byte. Callers
    // that repeat this variant as a fixed-array element round this up to
    // `whole_align` themselves, the same way they do for any other element.
    let total_size = envelope_start + envelope_extent;

    Ok(QueuedField { size: total_size, align: whole_align, info: FieldInfo::Packed { leaves: packed_leaves } })
}

#[cfg(test)]
mod tests {
    use super::*;
    use recgen_schema::{FieldDef, StructDef, VariantArm};

    fn build(structs: Vec<StructDef>) -> Module {
        Module::build(structs).unwrap()
    }

    #[test]
    fn fixed_array_reuses_one_representative_element() {
        let s = StructDef::new("S", vec![FieldDef::new("xs", Type::fixed_array(10, Type::Scalar(Scalar::U32)))]);
        let module = build(vec![s]);
        let plan = plan_struct(&module, StructId(0)).unwrap();
        // one slot for the array's own base, one for the representative element's leaf
        assert_eq!(plan.fixed_offsets.len(), 2);
        assert_eq!(plan.fixed_size, 40); // 10 * 4 bytes
    }

    #[test]
    fn fixed_variant_envelope_covers_every_arm() {
        let v = VariantDef {
            arms: vec![
                VariantArm::single(Type::Scalar(Scalar::U64)),
                VariantArm { fields: vec![Type::Scalar(Scalar::U32), Type::Scalar(Scalar::U32)] },
            ],
        };
        let s = StructDef::new("S", vec![FieldDef::new("v", Type::FixedVariant(v))]);
        let module = build(vec![s]);
        let plan = plan_struct(&module, StructId(0)).unwrap();
        assert_eq!(plan.fixed_size, 9); // 1-byte tag, envelope starts immediately after
        assert!(plan.is_fixed_size());
    }

    #[test]
    fn dynamic_variant_exposes_a_size_reader() {
        let v = VariantDef {
            arms: vec![
                VariantArm::single(Type::Scalar(Scalar::U64)),
                VariantArm::single(Type::Scalar(Scalar::U8)),
            ],
        };
        let s = StructDef::new("S", vec![FieldDef::new("v", Type::DynamicVariant(v))]);
        let module = build(vec![s]);
        let plan = plan_struct(&module, StructId(0)).unwrap();
        assert_eq!(plan.var_leaves.len(), 1);
        assert!(matches!(plan.var_leaves[0], VarLeaf::VariantSize { .. }));
    }

    #[test]
    fn nested_struct_is_addressed_through_its_own_layout() {
        let inner = StructDef::new(
            "Inner",
            vec![FieldDef::new("a", Type::Scalar(Scalar::U8)), FieldDef::new("b", Type::Scalar(Scalar::U32))],
        );
        let outer = StructDef::new("Outer", vec![FieldDef::new("i", Type::Identifier(StructId(0)))]);
        let module = build(vec![inner, outer]);
        let plan = plan_struct(&module, StructId(1)).unwrap();
        // one slot for the nested struct's own base, plus one per inner leaf
        assert_eq!(plan.fixed_offsets.len(), 3);
        assert_eq!(plan.fixed_size, 8); // Inner: u32 @0, u8 @4, padded to align 4
    }

    #[test]
    fn dynamic_array_of_scalars_is_a_single_variable_leaf() {
        let s = StructDef::new(
            "S",
            vec![FieldDef::new(
                "xs",
                Type::Array { min_len: 0, stored_size_align: Align::Four, inner: Box::new(Type::Scalar(Scalar::U16)) },
            )],
        );
        let module = build(vec![s]);
        let plan = plan_struct(&module, StructId(0)).unwrap();
        assert_eq!(plan.var_leaves.len(), 1);
        assert!(matches!(plan.var_leaves[0], VarLeaf::Array { element_stride: 2, .. }));
    }
}

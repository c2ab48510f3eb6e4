use crate::{Module, SchemaError, StructId, Type, MAX_ARRAY_DEPTH};

#[derive(Clone, Copy, Default)]
struct Ctx {
    in_array: bool,
    in_variant: bool,
    array_depth: u32,
}

pub(crate) fn validate_module(module: &Module) -> Result<(), SchemaError> {
    for def in module.structs() {
        let mut visiting = vec![false; module.structs().len()];
        for field in &def.fields {
            validate_type(module, &field.name, &field.ty, Ctx::default(), &mut visiting)?;
        }
    }
    Ok(())
}

fn validate_type(
    module: &Module,
    field_name: &str,
    ty: &Type,
    ctx: Ctx,
    visiting: &mut [bool],
) -> Result<(), SchemaError> {
    match ty {
        Type::Scalar(_) | Type::FixedString { .. } => Ok(()),

        Type::String { .. } => {
            if ctx.in_array {
                return Err(SchemaError::DynamicSizeInArray { field: field_name.to_string() });
            }
            if ctx.in_variant {
                return Err(SchemaError::DynamicSizeInVariant { field: field_name.to_string() });
            }
            Ok(())
        }

        Type::FixedArray { inner, .. } => {
            let depth = ctx.array_depth + 1;
            if depth > MAX_ARRAY_DEPTH {
                return Err(SchemaError::ArrayDepthExceeded {
                    field: field_name.to_string(),
                    depth,
                    max: MAX_ARRAY_DEPTH,
                });
            }
            let inner_ctx = Ctx { in_array: true, array_depth: depth, ..ctx };
            validate_type(module, field_name, inner, inner_ctx, visiting)
        }

        Type::Array { inner, .. } => {
            if ctx.in_array {
                return Err(SchemaError::NestedDynamicArray { field: field_name.to_string() });
            }
            if ctx.in_variant {
                return Err(SchemaError::DynamicSizeInVariant { field: field_name.to_string() });
            }
            if matches!(**inner, Type::Array { .. }) {
                return Err(SchemaError::NestedDynamicArray { field: field_name.to_string() });
            }
            let inner_ctx = Ctx { in_array: true, ..ctx };
            validate_type(module, field_name, inner, inner_ctx, visiting)
        }

        Type::PackedVariant(_) => Err(SchemaError::PackedVariantRequested { field: field_name.to_string() }),

        Type::FixedVariant(v) | Type::DynamicVariant(v) => {
            if v.arms.is_empty() {
                return Err(SchemaError::EmptyVariant { field: field_name.to_string() });
            }
            let inner_ctx = Ctx { in_variant: true, ..ctx };
            for arm in &v.arms {
                for f in &arm.fields {
                    validate_type(module, field_name, f, inner_ctx, visiting)?;
                }
            }
            Ok(())
        }

        Type::Identifier(id) => {
            validate_identifier(module, field_name, *id, ctx, visiting)
        }
    }
}

fn validate_identifier(
    module: &Module,
    field_name: &str,
    id: StructId,
    ctx: Ctx,
    visiting: &mut [bool],
) -> Result<(), SchemaError> {
    let idx = id.0 as usize;
    if idx >= module.structs().len() {
        return Err(SchemaError::UnknownIdentifier(field_name.to_string(), id.0));
    }
    if visiting[idx] {
        return Err(SchemaError::CyclicStruct(module.get(id).name.clone()));
    }
    visiting[idx] = true;
    let def = module.get(id);
    for f in &def.fields {
        validate_type(module, &f.name, &f.ty, ctx, visiting)?;
    }
    visiting[idx] = false;
    Ok(())
}

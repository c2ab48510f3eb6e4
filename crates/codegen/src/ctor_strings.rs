//! Precomputed constructor-argument strings for nested-view types, indexed
//! by the number of ambient array indices a view's constructor would need to
//! carry.
//!
//! Sizing a shared character pool for depths `0..=64` in one pass avoids
//! allocating at code-emission time; this builds the table lazily on first
//! use behind a [`std::sync::OnceLock`] instead, so it's built at most once.
//!
//! This emitter's own nested-struct views (see [`crate::emit`]) always
//! reconstruct themselves from a single already-shifted `base` rather than
//! threading extra `idx_N` parameters through a chain of view constructors —
//! every offset this crate computes is closed-form at emit time, so no
//! accessor ever needs more than one pointer-sized argument to find its
//! data. `depth` here is therefore always 0 in practice; the table is kept
//! general, and tested at several depths, for the benefit of any future
//! accessor shape that does thread ambient indices through nested views.

use std::sync::OnceLock;

use crate::error::CodegenError;

/// Depth cap mirrored from `recgen_schema::MAX_ARRAY_DEPTH`. Depth overflow
/// is fatal rather than silently truncated.
pub const MAX_CTOR_DEPTH: usize = 64;

/// The strings a nested-view's constructor, its field-initializer list, and
/// its two forwarding calls (plain and element-indexed) are built from. We
/// don't hand-roll a shared character-pool allocation trick in Rust — an
/// owned `String` per field is idiomatic, and there's no `alloca`/placement-new
/// step left to feed by sizing a pool up front.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CtorStrs {
    pub ctor_args: String,
    pub ctor_inits: String,
    pub ctor_used: String,
    pub el_ctor_used: String,
}

fn build_for_depth(depth: usize) -> CtorStrs {
    let idx_names: Vec<String> = (0..depth).map(|i| format!("idx_{i}")).collect();

    let mut ctor_args = String::from("size_t base");
    for name in &idx_names {
        ctor_args.push_str(&format!(", uint32_t {name}"));
    }

    let mut ctor_inits = String::from("base(base)");
    for name in &idx_names {
        ctor_inits.push_str(&format!(", {name}({name})"));
    }

    let mut used_args: Vec<&str> = Vec::with_capacity(idx_names.len() + 2);
    used_args.push("base");
    used_args.extend(idx_names.iter().map(String::as_str));
    let ctor_used = format!("return {{{}}};", used_args.join(", "));
    used_args.push("idx");
    let el_ctor_used = format!("return {{{}}};", used_args.join(", "));

    CtorStrs { ctor_args, ctor_inits, ctor_used, el_ctor_used }
}

fn table() -> &'static Vec<CtorStrs> {
    static TABLE: OnceLock<Vec<CtorStrs>> = OnceLock::new();
    TABLE.get_or_init(|| (0..=MAX_CTOR_DEPTH).map(build_for_depth).collect())
}

/// Looks up the precomputed strings for `depth` ambient indices, building
/// the table on first use. `Err` past `MAX_CTOR_DEPTH`.
pub fn for_depth(depth: usize) -> Result<&'static CtorStrs, CodegenError> {
    if depth > MAX_CTOR_DEPTH {
        return Err(CodegenError::DepthExceeded { depth, max: MAX_CTOR_DEPTH });
    }
    Ok(&table()[depth])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depth_zero_ctor_takes_only_base() {
        let s = for_depth(0).unwrap();
        assert_eq!(s.ctor_args, "size_t base");
        assert_eq!(s.ctor_inits, "base(base)");
        assert_eq!(s.ctor_used, "return {base};");
        assert_eq!(s.el_ctor_used, "return {base, idx};");
    }

    #[test]
    fn depth_two_threads_two_ambient_indices() {
        let s = for_depth(2).unwrap();
        assert_eq!(s.ctor_args, "size_t base, uint32_t idx_0, uint32_t idx_1");
        assert_eq!(s.ctor_inits, "base(base), idx_0(idx_0), idx_1(idx_1)");
        assert_eq!(s.ctor_used, "return {base, idx_0, idx_1};");
        assert_eq!(s.el_ctor_used, "return {base, idx_0, idx_1, idx};");
    }

    #[test]
    fn depth_past_cap_is_fatal() {
        let err = for_depth(MAX_CTOR_DEPTH + 1).unwrap_err();
        assert!(matches!(err, CodegenError::DepthExceeded { .. }));
    }

    #[test]
    fn table_is_built_once_and_is_stable() {
        let a = for_depth(5).unwrap() as *const CtorStrs;
        let b = for_depth(5).unwrap() as *const CtorStrs;
        assert_eq!(a, b);
    }
}

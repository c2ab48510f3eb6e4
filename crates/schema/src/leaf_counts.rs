use crate::{Align, Module, Type};

/// Fixed-leaf counts broken down by alignment class. Layout proceeds
/// alignment-descending, so every consumer of this wants the buckets kept
/// separate rather than summed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Counts {
    pub align8: u32,
    pub align4: u32,
    pub align2: u32,
    pub align1: u32,
}

impl Counts {
    pub fn zero() -> Self {
        Counts::default()
    }

    pub fn of_align(align: Align, n: u32) -> Self {
        let mut c = Counts::zero();
        *c.get_mut(align) = n;
        c
    }

    pub fn get(&self, align: Align) -> u32 {
        match align {
            Align::Eight => self.align8,
            Align::Four => self.align4,
            Align::Two => self.align2,
            Align::One => self.align1,
        }
    }

    pub fn get_mut(&mut self, align: Align) -> &mut u32 {
        match align {
            Align::Eight => &mut self.align8,
            Align::Four => &mut self.align4,
            Align::Two => &mut self.align2,
            Align::One => &mut self.align1,
        }
    }

    pub fn total(&self) -> u32 {
        self.align8 + self.align4 + self.align2 + self.align1
    }

    pub fn scaled(&self, n: u32) -> Counts {
        Counts {
            align8: self.align8 * n,
            align4: self.align4 * n,
            align2: self.align2 * n,
            align1: self.align1 * n,
        }
    }
}

impl std::ops::Add for Counts {
    type Output = Counts;
    fn add(self, rhs: Counts) -> Counts {
        Counts {
            align8: self.align8 + rhs.align8,
            align4: self.align4 + rhs.align4,
            align2: self.align2 + rhs.align2,
            align1: self.align1 + rhs.align1,
        }
    }
}

impl std::ops::AddAssign for Counts {
    fn add_assign(&mut self, rhs: Counts) {
        *self = *self + rhs;
    }
}

/// Cumulative fixed and variable leaf counts for a type subtree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeafCounts {
    pub fixed: Counts,
    pub variable: u32,
}

impl LeafCounts {
    pub fn zero() -> Self {
        LeafCounts::default()
    }

    pub fn scaled(&self, n: u32) -> LeafCounts {
        LeafCounts { fixed: self.fixed.scaled(n), variable: self.variable * n }
    }
}

impl std::ops::Add for LeafCounts {
    type Output = LeafCounts;
    fn add(self, rhs: LeafCounts) -> LeafCounts {
        LeafCounts { fixed: self.fixed + rhs.fixed, variable: self.variable + rhs.variable }
    }
}

impl std::ops::AddAssign for LeafCounts {
    fn add_assign(&mut self, rhs: LeafCounts) {
        *self = *self + rhs;
    }
}

pub(crate) fn leaf_counts(module: &Module, ty: &Type) -> LeafCounts {
    match ty {
        Type::Scalar(s) => LeafCounts { fixed: Counts::of_align(s.align(), 1), variable: 0 },
        Type::FixedString { .. } => LeafCounts { fixed: Counts::of_align(Align::One, 1), variable: 0 },
        Type::String { stored_size_align, .. } => {
            LeafCounts { fixed: Counts::of_align(*stored_size_align, 1), variable: 1 }
        }
        Type::FixedArray { len, inner } => leaf_counts(module, inner).scaled(*len),
        Type::Array { stored_size_align, .. } => {
            LeafCounts { fixed: Counts::of_align(*stored_size_align, 1), variable: 1 }
        }
        Type::FixedVariant(v) | Type::PackedVariant(v) => {
            let mut total = LeafCounts::zero();
            for arm in &v.arms {
                for f in &arm.fields {
                    total += leaf_counts(module, f);
                }
            }
            // the tag itself
            total.fixed += Counts::of_align(v.tag_align(), 1);
            total
        }
        Type::DynamicVariant(v) => {
            let mut total = LeafCounts::zero();
            for arm in &v.arms {
                for f in &arm.fields {
                    total += leaf_counts(module, f);
                }
            }
            total.fixed += Counts::of_align(v.tag_align(), 1);
            total.variable += 1; // the exposed size() reader
            total
        }
        Type::Identifier(id) => {
            let def = module.get(*id);
            let mut total = LeafCounts::zero();
            for f in &def.fields {
                total += leaf_counts(module, &f.ty);
            }
            total
        }
    }
}

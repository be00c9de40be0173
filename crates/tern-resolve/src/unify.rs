//! First-order structural unification over [`Type`].
//!
//! The unifier is parameterized by a *bindable set*: only parameters in
//! the set may receive bindings, everything else is rigid. One-way
//! matching (goal against a candidate pattern) is the same algorithm with
//! only the candidate's parameters bindable. Failure is control flow, not
//! an error; callers decide what a failed match means.

use std::collections::BTreeSet;

use tern_types::{free_params, SubstitutionBuilder, Type, TypeParamId, TypeWithMods};

pub struct Unifier {
    bindable: BTreeSet<TypeParamId>,
    subst: SubstitutionBuilder,
}

impl Unifier {
    /// One-way matching: only `bindable` parameters (the pattern's own)
    /// may be bound. Parameters on the other side are rigid and unify
    /// only with themselves.
    pub fn matching(bindable: impl IntoIterator<Item = TypeParamId>) -> Self {
        Unifier {
            bindable: bindable.into_iter().collect(),
            subst: SubstitutionBuilder::new(),
        }
    }

    /// Bidirectional unification: parameters from both sides may be bound.
    pub fn bidirectional(
        left: impl IntoIterator<Item = TypeParamId>,
        right: impl IntoIterator<Item = TypeParamId>,
    ) -> Self {
        Unifier {
            bindable: left.into_iter().chain(right).collect(),
            subst: SubstitutionBuilder::new(),
        }
    }

    /// Seed the unifier with bindings accumulated by an earlier phase.
    pub fn with_substitution(mut self, subst: SubstitutionBuilder) -> Self {
        self.subst = subst;
        self
    }

    pub fn substitution(&self) -> &SubstitutionBuilder {
        &self.subst
    }

    pub fn into_substitution(self) -> SubstitutionBuilder {
        self.subst
    }

    /// Unify two types under the accumulated substitution. On success the
    /// substitution is extended; on failure it is left with whatever
    /// bindings were made before the mismatch, so a failed unifier should
    /// be discarded.
    pub fn unify(&mut self, left: &Type, right: &Type) -> bool {
        let left = self.subst.apply(left);
        let right = self.subst.apply(right);
        if left == right {
            return true;
        }
        match (&left, &right) {
            // An error type unifies with anything without binding, so one
            // malformed input does not cascade into spurious mismatches.
            (Type::Error, _) | (_, Type::Error) => true,
            (Type::Param(p), _) if self.bindable.contains(p) => self.bind(*p, &right),
            (_, Type::Param(p)) if self.bindable.contains(p) => self.bind(*p, &left),
            (Type::Named(a), Type::Named(b)) => {
                if a.name != b.name || a.args.len() != b.args.len() {
                    return false;
                }
                for (x, y) in a.args.iter().zip(&b.args) {
                    if !self.unify(x, y) {
                        return false;
                    }
                }
                true
            }
            (Type::Tuple(a), Type::Tuple(b)) => {
                if a.len() != b.len() {
                    return false;
                }
                for (x, y) in a.iter().zip(b) {
                    if !self.unify(x, y) {
                        return false;
                    }
                }
                true
            }
            (
                Type::Function { params: ap, ret: ar },
                Type::Function { params: bp, ret: br },
            ) => {
                if ap.len() != bp.len() {
                    return false;
                }
                for (x, y) in ap.iter().zip(bp) {
                    if !self.unify(x, y) {
                        return false;
                    }
                }
                self.unify(ar, br)
            }
            _ => false,
        }
    }

    /// Unify two argument lists pairwise, left to right.
    pub fn unify_all(&mut self, left: &[Type], right: &[Type]) -> bool {
        if left.len() != right.len() {
            return false;
        }
        for (l, r) in left.iter().zip(right) {
            if !self.unify(l, r) {
                return false;
            }
        }
        true
    }

    fn bind(&mut self, param: TypeParamId, value: &Type) -> bool {
        // Occurs check: binding a parameter to a type containing itself
        // would make the substitution non-normalizable.
        if free_params(value).contains(&param) {
            return false;
        }
        self.subst
            .extend_and_propagate(param, TypeWithMods::value(value.clone()))
    }
}

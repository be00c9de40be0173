//! Semantic types and substitution maps for Tern's concept subsystem.
//!
//! This crate defines the type term language the resolution engine works
//! over, plus the two flavors of substitution map:
//!
//! - [`SubstitutionBuilder`]: a build-in-progress map, mutated while a
//!   resolution attempt unifies a candidate against a goal. Bindings are
//!   single-assignment within one attempt.
//! - [`Unification`]: a frozen, normalized map. Normalization means that
//!   applying the map to any of its own right-hand sides is a no-op, so a
//!   mapping like `{T -> U, U -> Int}` can never silently leave `T` bound
//!   to `U` instead of `Int`. Freezing asserts this invariant.
//!
//! Substitution application is a single structural pass: a normalized map
//! never needs chain-following, and making application single-pass is what
//! gives the idempotence check its teeth.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers and modifiers
// ---------------------------------------------------------------------------

/// Unique identifier for a declared type parameter.
///
/// Allocated by the binder's symbol arena; stable for the lifetime of one
/// compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeParamId(pub u32);

/// Ref-qualifier carried by a substitution value.
///
/// Qualifiers ride on substitution entries rather than on the type term
/// language: two bindings for the same parameter conflict when their
/// qualifiers differ, and ground-type equality compares them, but
/// structural types stay qualifier-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefKind {
    #[default]
    Value,
    Ref,
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A semantic type in Tern.
///
/// `Ord` is structural (declaration order of variants) and exists so
/// types can key ordered collections and sort deterministically; it has
/// no subtyping meaning.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Type {
    // -- Primitives --
    Int,
    Float,
    Bool,
    String,
    Unit,

    /// A declared type parameter.
    Param(TypeParamId),

    /// Nominal constructed type: a head type constructor applied to zero
    /// or more arguments.
    Named(NamedType),

    Tuple(Vec<Type>),
    Function {
        params: Vec<Type>,
        ret: Box<Type>,
    },

    /// Error-witness placeholder spliced in after a failed resolution so
    /// downstream checking can continue without cascading.
    Error,
}

/// A nominal type: head constructor name plus instantiated arguments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NamedType {
    pub name: String,
    pub args: Vec<Type>,
}

impl Type {
    /// Convenience constructor for a nominal type.
    pub fn named(name: impl Into<String>, args: Vec<Type>) -> Self {
        Type::Named(NamedType {
            name: name.into(),
            args,
        })
    }

    /// Whether this type mentions no type parameters.
    pub fn is_ground(&self) -> bool {
        free_params(self).is_empty()
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "Int"),
            Type::Float => write!(f, "Float"),
            Type::Bool => write!(f, "Bool"),
            Type::String => write!(f, "String"),
            Type::Unit => write!(f, "Unit"),
            Type::Param(p) => write!(f, "p{}", p.0),
            Type::Named(named) => {
                write!(f, "{}", named.name)?;
                if !named.args.is_empty() {
                    write!(f, "(")?;
                    for (i, arg) in named.args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{arg}")?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Type::Tuple(elems) => {
                write!(f, "#(")?;
                for (i, elem) in elems.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Type::Function { params, ret } => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {ret}")
            }
            Type::Error => write!(f, "<error>"),
        }
    }
}

/// Collect every type parameter mentioned in `ty`.
pub fn free_params(ty: &Type) -> BTreeSet<TypeParamId> {
    let mut out = BTreeSet::new();
    collect_free_params(ty, &mut out);
    out
}

fn collect_free_params(ty: &Type, out: &mut BTreeSet<TypeParamId>) {
    match ty {
        Type::Param(p) => {
            out.insert(*p);
        }
        Type::Named(named) => {
            for arg in &named.args {
                collect_free_params(arg, out);
            }
        }
        Type::Tuple(elems) => {
            for elem in elems {
                collect_free_params(elem, out);
            }
        }
        Type::Function { params, ret } => {
            for param in params {
                collect_free_params(param, out);
            }
            collect_free_params(ret, out);
        }
        Type::Int | Type::Float | Type::Bool | Type::String | Type::Unit | Type::Error => {}
    }
}

/// A substitution value: a type plus its ref-qualifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeWithMods {
    pub ty: Type,
    pub ref_kind: RefKind,
}

impl TypeWithMods {
    pub fn value(ty: Type) -> Self {
        Self {
            ty,
            ref_kind: RefKind::Value,
        }
    }

    pub fn by_ref(ty: Type) -> Self {
        Self {
            ty,
            ref_kind: RefKind::Ref,
        }
    }
}

impl From<Type> for TypeWithMods {
    fn from(ty: Type) -> Self {
        TypeWithMods::value(ty)
    }
}

// ---------------------------------------------------------------------------
// Substitution builder
// ---------------------------------------------------------------------------

/// A build-in-progress substitution map from type parameters to
/// types-with-modifiers.
///
/// Created per resolution attempt, mutated during unification, then frozen
/// into a [`Unification`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionBuilder {
    map: BTreeMap<TypeParamId, TypeWithMods>,
}

impl SubstitutionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn get(&self, param: TypeParamId) -> Option<&TypeWithMods> {
        self.map.get(&param)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (TypeParamId, &TypeWithMods)> {
        self.map.iter().map(|(p, v)| (*p, v))
    }

    /// Bind `param` to `value`. Witness bindings are single-assignment
    /// within one resolution attempt: returns `false` (and leaves the map
    /// unchanged) if `param` is already bound to a different value.
    /// Re-binding to a structurally equal value is a no-op success.
    pub fn extend(&mut self, param: TypeParamId, value: TypeWithMods) -> bool {
        match self.map.get(&param) {
            Some(existing) => *existing == value,
            None => {
                self.map.insert(param, value);
                true
            }
        }
    }

    /// Bind `param` to `value` normalized against the current map, then
    /// substitute the new binding through every previously accumulated
    /// right-hand side.
    ///
    /// This keeps the map incrementally normalized (absent self-reference,
    /// which unification's occurs check rules out), so no final
    /// normalization pass is needed before freezing.
    pub fn extend_and_propagate(&mut self, param: TypeParamId, value: TypeWithMods) -> bool {
        let value = TypeWithMods {
            ty: self.apply(&value.ty),
            ref_kind: value.ref_kind,
        };
        if !self.extend(param, value.clone()) {
            return false;
        }
        let rhs_keys: Vec<TypeParamId> = self.map.keys().copied().collect();
        for key in rhs_keys {
            if key == param {
                continue;
            }
            let entry = self.map.get_mut(&key).expect("key collected above");
            entry.ty = replace_param(&entry.ty, param, &value.ty);
        }
        true
    }

    /// Apply this substitution to a type in a single structural pass.
    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Param(p) => match self.map.get(p) {
                Some(bound) => bound.ty.clone(),
                None => ty.clone(),
            },
            Type::Named(named) => Type::Named(NamedType {
                name: named.name.clone(),
                args: named.args.iter().map(|arg| self.apply(arg)).collect(),
            }),
            Type::Tuple(elems) => Type::Tuple(elems.iter().map(|t| self.apply(t)).collect()),
            Type::Function { params, ret } => Type::Function {
                params: params.iter().map(|t| self.apply(t)).collect(),
                ret: Box::new(self.apply(ret)),
            },
            Type::Int | Type::Float | Type::Bool | Type::String | Type::Unit | Type::Error => {
                ty.clone()
            }
        }
    }

    /// Compose two maps applied in sequence: every value of `first` is
    /// substituted through `second`, every key of `second` not already
    /// present is added, and the merged map is normalized so cross-map
    /// chains (`second` binding a parameter to a key of `first`) resolve
    /// transitively rather than leaving a dangling indirection.
    pub fn compose_sequential(first: &Self, second: &Self) -> Self {
        let mut map = BTreeMap::new();
        for (param, value) in &first.map {
            map.insert(
                *param,
                TypeWithMods {
                    ty: second.apply(&value.ty),
                    ref_kind: value.ref_kind,
                },
            );
        }
        for (param, value) in &second.map {
            map.entry(*param).or_insert_with(|| value.clone());
        }
        let mut composed = Self { map };
        composed.normalize();
        composed
    }

    /// Substitute the map through its own values until every value is a
    /// fixed point. Chain length is bounded by the key count, so the loop
    /// is too; a genuinely self-referential map stops early and is caught
    /// at `freeze`.
    fn normalize(&mut self) {
        for _ in 0..self.map.len() {
            if self.is_normalized() {
                return;
            }
            let snapshot = self.clone();
            for value in self.map.values_mut() {
                value.ty = snapshot.apply(&value.ty);
            }
        }
    }

    /// Whether every bound value is a fixed point of the whole map.
    pub fn is_normalized(&self) -> bool {
        self.map.values().all(|value| self.apply(&value.ty) == value.ty)
    }

    /// Freeze into an immutable, normalized [`Unification`].
    ///
    /// A non-normalized map escaping here indicates an internal resolution
    /// bug, never a user error.
    pub fn freeze(self) -> Unification {
        debug_assert!(
            self.is_normalized(),
            "substitution map escaped freeze without normalization: {self:?}"
        );
        Unification { map: self.map }
    }
}

/// Substitute `replacement` for `param` throughout `ty`.
fn replace_param(ty: &Type, param: TypeParamId, replacement: &Type) -> Type {
    match ty {
        Type::Param(p) if *p == param => replacement.clone(),
        Type::Param(_)
        | Type::Int
        | Type::Float
        | Type::Bool
        | Type::String
        | Type::Unit
        | Type::Error => ty.clone(),
        Type::Named(named) => Type::Named(NamedType {
            name: named.name.clone(),
            args: named
                .args
                .iter()
                .map(|arg| replace_param(arg, param, replacement))
                .collect(),
        }),
        Type::Tuple(elems) => Type::Tuple(
            elems
                .iter()
                .map(|t| replace_param(t, param, replacement))
                .collect(),
        ),
        Type::Function { params, ret } => Type::Function {
            params: params
                .iter()
                .map(|t| replace_param(t, param, replacement))
                .collect(),
            ret: Box::new(replace_param(ret, param, replacement)),
        },
    }
}

// ---------------------------------------------------------------------------
// Frozen unification
// ---------------------------------------------------------------------------

/// A finalized, normalized substitution: the output of a successful
/// unification or resolution attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Unification {
    map: BTreeMap<TypeParamId, TypeWithMods>,
}

impl Unification {
    /// The identity unification.
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn is_identity(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn get(&self, param: TypeParamId) -> Option<&TypeWithMods> {
        self.map.get(&param)
    }

    pub fn bindings(&self) -> impl Iterator<Item = (TypeParamId, &TypeWithMods)> {
        self.map.iter().map(|(p, v)| (*p, v))
    }

    /// Apply this unification to a type in a single structural pass.
    ///
    /// Single-pass is complete here because frozen maps are normalized by
    /// construction.
    pub fn apply(&self, ty: &Type) -> Type {
        self.as_builder_ref().apply(ty)
    }

    /// Sequential composition of two frozen maps.
    pub fn compose_sequential(first: &Self, second: &Self) -> Self {
        SubstitutionBuilder::compose_sequential(
            &first.clone().into_builder(),
            &second.clone().into_builder(),
        )
        .freeze()
    }

    /// Reopen this unification for further extension.
    pub fn into_builder(self) -> SubstitutionBuilder {
        SubstitutionBuilder { map: self.map }
    }

    fn as_builder_ref(&self) -> SubstitutionBuilder {
        SubstitutionBuilder {
            map: self.map.clone(),
        }
    }
}

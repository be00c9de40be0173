//! Concept witness resolution.
//!
//! This crate binds concept and instance declarations into a symbol graph
//! and resolves witness goals against it: given `Eq(List(Int))` and a
//! scope, find the instance (or ambient witness parameter) that proves
//! it, discharging conditional requirements recursively and breaking ties
//! by specificity.
//!
//! The graph is built single-threaded, then read-only; resolution
//! sessions are call-local and any number may run concurrently. Failures
//! are values ([`ResolveFailure`]) until the caller chooses to render
//! them as diagnostics.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tern_ast::Span;
use tern_diag::SourceLocation;

pub mod bind;
pub mod defaults;
pub mod lookup;
pub mod resolve;
pub mod symbols;
pub mod trace;
pub mod unify;

pub use tern_diag::{Category, Diagnostic, DiagnosticError, DiagnosticSink, Severity};
pub use tern_types::{SubstitutionBuilder, Type, TypeParamId, TypeWithMods, Unification};

pub use crate::defaults::{
    DefaultStruct, MemberOrigin, ResolvedMember, default_struct, witness_member,
};
pub use crate::lookup::visible_instances;
pub use crate::resolve::{
    Goal, ResolveConfig, ResolveFailure, ResolvedWitness, WitnessRequest, WitnessResolver,
    WitnessSource, resolve_witness,
};
pub use crate::symbols::{
    Compilation, ConceptId, ConceptInstantiation, ContainerId, InstanceId, Scope,
};
pub use crate::trace::{ResolveAction, ResolveStep};
pub use crate::unify::Unifier;

/// Cooperative cancellation shared between a host session and in-flight
/// resolution work. Long-running loops poll it between units of work;
/// cancellation is observed at the next poll, never preemptively.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub(crate) fn span_to_location(span: Span) -> SourceLocation {
    SourceLocation {
        file_id: span.file.0,
        start: span.start,
        end: span.end,
    }
}

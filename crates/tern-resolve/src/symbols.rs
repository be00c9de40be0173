//! The bound symbol graph: concepts, instances, containers, and scopes.
//!
//! Symbols are arena-addressed: every symbol kind gets a small copyable ID
//! into a `Vec` owned by [`Compilation`]. This keeps the graph free of
//! reference cycles (instances reference concepts which reference default
//! carriers which reference concepts) while giving every symbol a stable
//! identity for the compilation's lifetime.
//!
//! The graph is built single-threaded by the binder (`&mut Compilation`)
//! and is read-only afterwards. Derived per-symbol state that is expensive
//! or self-referential — the extends closure and the default carrier — is
//! computed lazily and published once via `OnceLock`: racing threads may
//! compute the value redundantly, exactly one result is retained, and the
//! losers' work is discarded. Computing these values has no side effect
//! beyond the publish, which is what makes the race safe.

use std::collections::{BTreeMap, VecDeque};
use std::sync::OnceLock;

use tern_ast::{Accessibility, Span};
use tern_types::{SubstitutionBuilder, Type, TypeParamId};

use crate::CancellationToken;
use crate::defaults::DefaultStruct;

// ---------------------------------------------------------------------------
// Symbol identifiers
// ---------------------------------------------------------------------------

/// Identity of a bound concept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConceptId(pub u32);

/// Identity of a bound instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

/// Identity of a lexical container (namespace or type body).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub u32);

// ---------------------------------------------------------------------------
// Symbol payloads
// ---------------------------------------------------------------------------

/// A concept applied to argument types: `Eq(Int)`, `Ord(List(T))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptInstantiation {
    pub concept: ConceptId,
    pub args: Vec<Type>,
}

/// A member signature, shared between concepts and the default carrier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
    /// Whether the declaring concept supplies a default body.
    pub has_default: bool,
    pub doc: Option<String>,
}

/// A bound type parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamInfo {
    pub name: String,
    /// Whether this is a witness (implicit) parameter. Witness parameters
    /// always carry at least one concept constraint; the binder demotes
    /// shape-invalid implicit parameters to ordinary ones.
    pub is_witness: bool,
    pub constraints: Vec<ConceptInstantiation>,
}

/// A bound concept declaration.
#[derive(Debug)]
pub struct ConceptInfo {
    pub name: String,
    /// The concept's own type parameters — exactly its instantiation
    /// signature, in declaration order.
    pub params: Vec<TypeParamId>,
    /// Direct superconcept instantiations, in terms of `params`.
    pub extends: Vec<ConceptInstantiation>,
    pub members: Vec<MemberInfo>,
    pub span: Option<Span>,
    pub doc: Option<String>,
    /// The extra "calling witness" parameter for the default carrier.
    /// Reserved eagerly at bind time when any member has a default body,
    /// so carrier synthesis never needs to mutate the arena.
    pub default_witness_param: Option<TypeParamId>,
    /// Lazily published transitive extends closure (self included).
    pub(crate) extends_closure: OnceLock<Vec<ConceptInstantiation>>,
    /// Lazily published default carrier, shared by all call sites.
    pub(crate) default_struct: OnceLock<std::sync::Arc<DefaultStruct>>,
}

/// A bound instance declaration.
#[derive(Debug, Clone)]
pub struct InstanceInfo {
    pub name: String,
    /// All own type parameters, witness parameters included.
    pub params: Vec<TypeParamId>,
    /// The subset of `params` that are conditional witness requirements.
    pub witness_params: Vec<TypeParamId>,
    /// The implemented concept instantiation. References only `params`.
    pub concept: ConceptInstantiation,
    /// Names of the concept members this instance implements or overrides.
    pub members: std::collections::BTreeSet<String>,
    pub accessibility: Accessibility,
    pub container: ContainerId,
    pub span: Option<Span>,
}

/// A lexical container holding instance declarations.
#[derive(Debug, Clone)]
pub struct ContainerInfo {
    pub name: String,
    pub parent: Option<ContainerId>,
    pub instances: Vec<InstanceId>,
}

// ---------------------------------------------------------------------------
// Scopes
// ---------------------------------------------------------------------------

/// A lexical position from which resolution happens: the innermost
/// container, statically imported containers, and the witness parameters
/// ambient at this position (the enclosing declaration's implicit
/// parameters).
#[derive(Debug, Clone)]
pub struct Scope {
    pub container: ContainerId,
    pub imports: Vec<ContainerId>,
    pub witness_params: Vec<TypeParamId>,
}

impl Scope {
    pub fn new(container: ContainerId) -> Self {
        Self {
            container,
            imports: Vec::new(),
            witness_params: Vec::new(),
        }
    }

    pub fn with_imports(mut self, imports: Vec<ContainerId>) -> Self {
        self.imports = imports;
        self
    }

    pub fn with_witness_params(mut self, params: Vec<TypeParamId>) -> Self {
        self.witness_params = params;
        self
    }
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// One compilation's symbol graph and shared context.
///
/// All resolution state lives here or in call-local resolver stacks; there
/// are no ambient statics. Discarding the compilation discards everything.
#[derive(Debug, Default)]
pub struct Compilation {
    concepts: Vec<ConceptInfo>,
    instances: Vec<InstanceInfo>,
    containers: Vec<ContainerInfo>,
    params: Vec<ParamInfo>,
    concept_names: BTreeMap<String, ConceptId>,
    cancel: CancellationToken,
}

impl Compilation {
    /// The root container every compilation starts with.
    pub const ROOT: ContainerId = ContainerId(0);

    pub fn new() -> Self {
        let mut comp = Self::default();
        comp.containers.push(ContainerInfo {
            name: String::new(),
            parent: None,
            instances: Vec::new(),
        });
        comp
    }

    pub fn root(&self) -> ContainerId {
        Self::ROOT
    }

    /// The token long-running completion loops poll.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn add_container(&mut self, name: impl Into<String>, parent: ContainerId) -> ContainerId {
        let id = ContainerId(self.containers.len() as u32);
        self.containers.push(ContainerInfo {
            name: name.into(),
            parent: Some(parent),
            instances: Vec::new(),
        });
        id
    }

    // -- Accessors --

    pub fn concept(&self, id: ConceptId) -> &ConceptInfo {
        &self.concepts[id.0 as usize]
    }

    pub fn instance(&self, id: InstanceId) -> &InstanceInfo {
        &self.instances[id.0 as usize]
    }

    pub fn container(&self, id: ContainerId) -> &ContainerInfo {
        &self.containers[id.0 as usize]
    }

    pub fn param(&self, id: TypeParamId) -> &ParamInfo {
        &self.params[id.0 as usize]
    }

    pub fn concept_by_name(&self, name: &str) -> Option<ConceptId> {
        self.concept_names.get(name).copied()
    }

    pub fn concept_count(&self) -> usize {
        self.concepts.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    // -- Binder-side mutation (single-threaded, before resolution) --

    pub(crate) fn alloc_param(&mut self, info: ParamInfo) -> TypeParamId {
        let id = TypeParamId(self.params.len() as u32);
        self.params.push(info);
        id
    }

    pub(crate) fn param_mut(&mut self, id: TypeParamId) -> &mut ParamInfo {
        &mut self.params[id.0 as usize]
    }

    pub(crate) fn push_concept(&mut self, info: ConceptInfo) -> ConceptId {
        let id = ConceptId(self.concepts.len() as u32);
        self.concept_names.insert(info.name.clone(), id);
        self.concepts.push(info);
        id
    }

    pub(crate) fn push_instance(&mut self, info: InstanceInfo) -> InstanceId {
        let id = InstanceId(self.instances.len() as u32);
        let container = info.container;
        self.instances.push(info);
        self.containers[container.0 as usize].instances.push(id);
        id
    }

    pub(crate) fn instances_in(&self, container: ContainerId) -> &[InstanceId] {
        &self.containers[container.0 as usize].instances
    }

    // -- Derived, lazily published state --

    /// The transitive extends closure of a concept, self-instantiation
    /// first, expressed in terms of the concept's own parameters.
    ///
    /// Computed on first access and published via compare-and-set; the
    /// computation is pure, so a racing thread's redundant result is
    /// safely discarded.
    pub fn extends_closure(&self, id: ConceptId) -> &[ConceptInstantiation] {
        self.concept(id)
            .extends_closure
            .get_or_init(|| self.compute_extends_closure(id))
    }

    fn compute_extends_closure(&self, id: ConceptId) -> Vec<ConceptInstantiation> {
        let info = self.concept(id);
        let mut out = vec![ConceptInstantiation {
            concept: id,
            args: info.params.iter().map(|p| Type::Param(*p)).collect(),
        }];
        let mut seen = std::collections::BTreeSet::from([id]);
        let mut queue: VecDeque<ConceptInstantiation> = info.extends.iter().cloned().collect();
        while let Some(inst) = queue.pop_front() {
            if !seen.insert(inst.concept) {
                // Diamond inheritance: the first path wins. Coherent
                // declarations agree on the arguments either way.
                continue;
            }
            let sup = self.concept(inst.concept);
            let mut subst = SubstitutionBuilder::new();
            for (param, arg) in sup.params.iter().zip(&inst.args) {
                let _ = subst.extend(*param, arg.clone().into());
            }
            for further in &sup.extends {
                queue.push_back(ConceptInstantiation {
                    concept: further.concept,
                    args: further.args.iter().map(|a| subst.apply(a)).collect(),
                });
            }
            out.push(inst);
        }
        out
    }

    /// Whether `sub` extends `sup` transitively (strictly or reflexively).
    pub fn concept_extends(&self, sub: ConceptId, sup: ConceptId) -> bool {
        self.extends_closure(sub).iter().any(|e| e.concept == sup)
    }

    /// Every concept instantiation an instance provides: its implemented
    /// concept plus everything that concept extends, with the instance's
    /// head arguments substituted through the inheritance chain.
    pub fn instance_provided(&self, id: InstanceId) -> Vec<ConceptInstantiation> {
        let inst = self.instance(id);
        self.instantiations_provided_by(&inst.concept)
    }

    /// The extends closure of an instantiation, with its arguments
    /// substituted in.
    pub fn instantiations_provided_by(
        &self,
        head: &ConceptInstantiation,
    ) -> Vec<ConceptInstantiation> {
        let concept = self.concept(head.concept);
        let mut subst = SubstitutionBuilder::new();
        for (param, arg) in concept.params.iter().zip(&head.args) {
            let _ = subst.extend(*param, arg.clone().into());
        }
        self.extends_closure(head.concept)
            .iter()
            .map(|entry| ConceptInstantiation {
                concept: entry.concept,
                args: entry.args.iter().map(|a| subst.apply(a)).collect(),
            })
            .collect()
    }

    // -- Display --

    /// Render a type with parameter names instead of raw IDs.
    pub fn display_type(&self, ty: &Type) -> String {
        match ty {
            Type::Param(p) => self.param(*p).name.clone(),
            Type::Named(named) => {
                if named.args.is_empty() {
                    named.name.clone()
                } else {
                    let args: Vec<String> =
                        named.args.iter().map(|a| self.display_type(a)).collect();
                    format!("{}({})", named.name, args.join(", "))
                }
            }
            Type::Tuple(elems) => {
                let elems: Vec<String> = elems.iter().map(|t| self.display_type(t)).collect();
                format!("#({})", elems.join(", "))
            }
            Type::Function { params, ret } => {
                let params: Vec<String> = params.iter().map(|t| self.display_type(t)).collect();
                format!("({}) -> {}", params.join(", "), self.display_type(ret))
            }
            _ => ty.to_string(),
        }
    }

    /// Render a concept instantiation, e.g. `Eq(Int)`.
    pub fn display_instantiation(&self, inst: &ConceptInstantiation) -> String {
        let concept = self.concept(inst.concept);
        if inst.args.is_empty() {
            concept.name.clone()
        } else {
            let args: Vec<String> = inst.args.iter().map(|a| self.display_type(a)).collect();
            format!("{}({})", concept.name, args.join(", "))
        }
    }
}

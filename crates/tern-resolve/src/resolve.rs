//! The witness resolver.
//!
//! Resolution turns a goal (a concept applied to argument types) into a
//! witness: either an ambient witness parameter of the enclosing
//! declaration, or a visible instance whose head unifies with the goal
//! and whose conditional witnesses recursively resolve.
//!
//! The resolver is call-local: it borrows the read-only symbol graph and
//! keeps its own goal stack and trace, so any number of resolutions can
//! run concurrently over one compilation. Failures are values; rendering
//! them as diagnostics is the caller's choice.

use tern_diag::{Category, Diagnostic, DiagnosticSink, SourceLocation};
use tern_types::{SubstitutionBuilder, Type, TypeParamId, TypeWithMods, Unification};

use crate::lookup::visible_instances;
use crate::symbols::{Compilation, ConceptId, ConceptInstantiation, InstanceId, Scope};
use crate::trace::{ResolveAction, ResolveStep, ResolveTrace};
use crate::unify::Unifier;

// ---------------------------------------------------------------------------
// Requests and results
// ---------------------------------------------------------------------------

/// Resolver tuning knobs.
#[derive(Debug, Clone)]
pub struct ResolveConfig {
    /// Maximum recursion depth before a goal is abandoned. Bounds both
    /// deeply nested conditional instances and genuine cycles.
    pub max_depth: usize,
    /// Whether to record a [`ResolveStep`] per resolver decision.
    pub trace: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            max_depth: 32,
            trace: false,
        }
    }
}

/// A resolution goal: a concept applied to argument types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Goal {
    pub concept: ConceptId,
    pub args: Vec<Type>,
}

/// A witness resolution request.
#[derive(Debug, Clone)]
pub struct WitnessRequest {
    pub concept: ConceptId,
    pub args: Vec<Type>,
    /// Only accept ambient witness parameters; never search instances.
    /// Used inside default member bodies, where the calling witness is
    /// the only legitimate source.
    pub explicit_only: bool,
}

impl WitnessRequest {
    pub fn new(concept: ConceptId, args: Vec<Type>) -> Self {
        Self {
            concept,
            args,
            explicit_only: false,
        }
    }

    pub fn explicit_only(concept: ConceptId, args: Vec<Type>) -> Self {
        Self {
            concept,
            args,
            explicit_only: true,
        }
    }
}

/// Where a resolved witness came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WitnessSource {
    /// A visible instance declaration.
    Instance(InstanceId),
    /// An ambient witness parameter of the enclosing declaration.
    Ambient(TypeParamId),
    /// Recovery placeholder after a reported failure.
    Error,
}

/// A successfully resolved witness.
#[derive(Debug, Clone)]
pub struct ResolvedWitness {
    /// The witness as a type argument: the instance type applied to the
    /// resolved arguments, or the ambient parameter itself.
    pub witness: Type,
    /// Bindings for the winning instance's own parameters. Identity for
    /// ambient witnesses.
    pub substitution: Unification,
    pub source: WitnessSource,
}

impl ResolvedWitness {
    /// The recovery witness used after a failure has been reported, so
    /// downstream phases see one diagnostic instead of a cascade.
    pub fn error() -> Self {
        Self {
            witness: Type::Error,
            substitution: Unification::identity(),
            source: WitnessSource::Error,
        }
    }
}

/// Why a goal failed to resolve.
#[derive(Debug, Clone)]
pub enum ResolveFailure {
    /// No visible instance matched.
    NoInstance { goal: Goal },
    /// Several instances matched with no strict specificity winner.
    Ambiguous {
        goal: Goal,
        candidates: Vec<InstanceId>,
    },
    /// The depth bound was exceeded, or every matching candidate led
    /// back into a goal already being resolved.
    RecursionLimit { goal: Goal },
    /// The compilation's cancellation token fired.
    Cancelled,
}

impl ResolveFailure {
    /// Render the failure as a diagnostic.
    pub fn to_diagnostic(
        &self,
        comp: &Compilation,
        location: Option<SourceLocation>,
    ) -> Diagnostic {
        let diag = match self {
            ResolveFailure::NoInstance { goal } => Diagnostic::error(
                Category::NoInstanceFound,
                format!("no instance found for `{}`", display_goal(comp, goal)),
            )
            .with_help("declare an instance, or import a container that provides one"),
            ResolveFailure::Ambiguous { goal, candidates } => {
                let names: Vec<&str> = candidates
                    .iter()
                    .map(|c| comp.instance(*c).name.as_str())
                    .collect();
                Diagnostic::error(
                    Category::AmbiguousInstances,
                    format!(
                        "ambiguous instances for `{}`: {}",
                        display_goal(comp, goal),
                        names.join(", ")
                    ),
                )
                .with_help("pass a witness explicitly to disambiguate")
            }
            ResolveFailure::RecursionLimit { goal } => Diagnostic::error(
                Category::RecursionLimitExceeded,
                format!(
                    "recursion limit exceeded while resolving `{}`",
                    display_goal(comp, goal)
                ),
            )
            .with_help("an instance may depend on itself, possibly through other instances"),
            ResolveFailure::Cancelled => {
                Diagnostic::warning(Category::NoInstanceFound, "witness resolution was cancelled")
            }
        };
        match location {
            Some(loc) => diag.at(loc),
            None => diag,
        }
    }
}

fn display_goal(comp: &Compilation, goal: &Goal) -> String {
    comp.display_instantiation(&ConceptInstantiation {
        concept: goal.concept,
        args: goal.args.clone(),
    })
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// A surviving candidate after head unification and obligation discharge.
struct Candidate {
    instance: InstanceId,
    witness: Type,
    substitution: SubstitutionBuilder,
    /// Number of conditional witnesses discharged; the tie-break prefers
    /// fewer when heads are equally specific.
    obligations: usize,
}

enum CandidateOutcome {
    Survived(Candidate),
    Discarded,
    /// The candidate led back into a goal already on the stack.
    Cycled,
}

/// One resolution session. Cheap to create per request; holds the
/// call-local goal stack so concurrent sessions never interfere.
pub struct WitnessResolver<'a> {
    comp: &'a Compilation,
    config: ResolveConfig,
    in_progress: Vec<Goal>,
    trace: ResolveTrace,
}

impl<'a> WitnessResolver<'a> {
    pub fn new(comp: &'a Compilation, config: ResolveConfig) -> Self {
        let trace = ResolveTrace::new(config.trace);
        Self {
            comp,
            config,
            in_progress: Vec::new(),
            trace,
        }
    }

    pub fn trace(&self) -> &[ResolveStep] {
        self.trace.steps()
    }

    pub fn into_trace(self) -> Vec<ResolveStep> {
        self.trace.into_steps()
    }

    /// Resolve one request from the given scope.
    pub fn resolve(
        &mut self,
        request: &WitnessRequest,
        scope: &Scope,
    ) -> Result<ResolvedWitness, ResolveFailure> {
        debug_assert!(self.in_progress.is_empty());
        let goal = Goal {
            concept: request.concept,
            args: request.args.clone(),
        };
        self.resolve_goal(&goal, scope, request.explicit_only, 0)
    }

    fn resolve_goal(
        &mut self,
        goal: &Goal,
        scope: &Scope,
        explicit_only: bool,
        depth: usize,
    ) -> Result<ResolvedWitness, ResolveFailure> {
        if self.comp.cancellation_token().is_cancelled() {
            return Err(ResolveFailure::Cancelled);
        }
        let rendered = display_goal(self.comp, goal);
        if depth >= self.config.max_depth {
            self.trace
                .record(depth, ResolveAction::RecursionLimit, &rendered, None);
            return Err(ResolveFailure::RecursionLimit { goal: goal.clone() });
        }
        self.trace
            .record(depth, ResolveAction::GoalEntered, &rendered, None);

        // Ambient witness parameters always win over instance search.
        if let Some((param, found)) = self.ambient_witness(goal, scope) {
            self.trace.record(
                depth,
                ResolveAction::AmbientWitness,
                &rendered,
                Some(self.comp.param(param).name.clone()),
            );
            return Ok(found);
        }
        if explicit_only {
            self.trace
                .record(depth, ResolveAction::NoInstance, &rendered, None);
            return Err(ResolveFailure::NoInstance { goal: goal.clone() });
        }

        self.in_progress.push(goal.clone());
        let gathered = self.gather_candidates(goal, scope, depth, &rendered);
        self.in_progress.pop();
        let (mut survivors, cycled) = gathered?;

        if survivors.is_empty() {
            if cycled {
                // Every matching candidate required the goal it was
                // trying to discharge.
                self.trace
                    .record(depth, ResolveAction::RecursionLimit, &rendered, None);
                return Err(ResolveFailure::RecursionLimit { goal: goal.clone() });
            }
            self.trace
                .record(depth, ResolveAction::NoInstance, &rendered, None);
            return Err(ResolveFailure::NoInstance { goal: goal.clone() });
        }
        if survivors.len() == 1 {
            let winner = survivors.remove(0);
            self.trace.record(
                depth,
                ResolveAction::Winner,
                &rendered,
                Some(self.comp.instance(winner.instance).name.clone()),
            );
            return Ok(self.finish(winner));
        }
        self.tie_break(goal, survivors, depth, &rendered)
    }

    fn gather_candidates(
        &mut self,
        goal: &Goal,
        scope: &Scope,
        depth: usize,
        rendered: &str,
    ) -> Result<(Vec<Candidate>, bool), ResolveFailure> {
        let mut survivors = Vec::new();
        let mut cycled = false;
        for instance in visible_instances(self.comp, scope) {
            if self.comp.cancellation_token().is_cancelled() {
                return Err(ResolveFailure::Cancelled);
            }
            match self.try_candidate(goal, scope, instance, depth, rendered)? {
                CandidateOutcome::Survived(candidate) => survivors.push(candidate),
                CandidateOutcome::Discarded => {}
                CandidateOutcome::Cycled => cycled = true,
            }
        }
        Ok((survivors, cycled))
    }

    fn try_candidate(
        &mut self,
        goal: &Goal,
        scope: &Scope,
        instance: InstanceId,
        depth: usize,
        rendered: &str,
    ) -> Result<CandidateOutcome, ResolveFailure> {
        let inst = self.comp.instance(instance);
        let Some(target) = self
            .comp
            .instance_provided(instance)
            .into_iter()
            .find(|p| p.concept == goal.concept)
        else {
            return Ok(CandidateOutcome::Discarded);
        };
        self.trace.record(
            depth,
            ResolveAction::CandidateConsidered,
            rendered,
            Some(inst.name.clone()),
        );

        // One-way match: only the candidate's own parameters bind; goal
        // parameters are rigid.
        let mut unifier = Unifier::matching(inst.params.iter().copied());
        if !unifier.unify_all(&goal.args, &target.args) {
            self.trace.record(
                depth,
                ResolveAction::CandidateDiscarded,
                rendered,
                Some(inst.name.clone()),
            );
            return Ok(CandidateOutcome::Discarded);
        }
        self.trace.record(
            depth,
            ResolveAction::CandidateUnified,
            rendered,
            Some(inst.name.clone()),
        );
        let mut subst = unifier.into_substitution();

        // Discharge the candidate's conditional witnesses recursively.
        let witness_params = inst.witness_params.clone();
        let name = inst.name.clone();
        let own_params = inst.params.clone();
        for wp in witness_params {
            let constraints = self.comp.param(wp).constraints.clone();
            // Witness parameters carry at least one constraint; the
            // binder demotes any that do not.
            let Some((first, rest)) = constraints.split_first() else {
                return Ok(CandidateOutcome::Discarded);
            };
            let witness = match self.discharge(first, &subst, scope, depth)? {
                DischargeOutcome::Resolved(w) => w,
                DischargeOutcome::Failed => {
                    self.trace.record(
                        depth,
                        ResolveAction::CandidateDiscarded,
                        rendered,
                        Some(name.clone()),
                    );
                    return Ok(CandidateOutcome::Discarded);
                }
                DischargeOutcome::Cycled => {
                    self.trace.record(
                        depth,
                        ResolveAction::CandidateCycled,
                        rendered,
                        Some(name.clone()),
                    );
                    return Ok(CandidateOutcome::Cycled);
                }
            };
            // Additional constraints on the same parameter must resolve
            // to the same witness type.
            for extra in rest {
                match self.discharge(extra, &subst, scope, depth)? {
                    DischargeOutcome::Resolved(w) if w.witness == witness.witness => {}
                    DischargeOutcome::Cycled => {
                        self.trace.record(
                            depth,
                            ResolveAction::CandidateCycled,
                            rendered,
                            Some(name.clone()),
                        );
                        return Ok(CandidateOutcome::Cycled);
                    }
                    _ => {
                        self.trace.record(
                            depth,
                            ResolveAction::CandidateDiscarded,
                            rendered,
                            Some(name.clone()),
                        );
                        return Ok(CandidateOutcome::Discarded);
                    }
                }
            }
            if !subst.extend_and_propagate(wp, TypeWithMods::value(witness.witness.clone())) {
                return Ok(CandidateOutcome::Discarded);
            }
        }

        self.trace.record(
            depth,
            ResolveAction::CandidateDischarged,
            rendered,
            Some(name.clone()),
        );
        let witness = Type::named(
            name,
            own_params
                .iter()
                .map(|p| subst.apply(&Type::Param(*p)))
                .collect(),
        );
        Ok(CandidateOutcome::Survived(Candidate {
            instance,
            witness,
            substitution: subst,
            obligations: inst_obligations(self.comp, instance),
        }))
    }

    fn discharge(
        &mut self,
        constraint: &ConceptInstantiation,
        subst: &SubstitutionBuilder,
        scope: &Scope,
        depth: usize,
    ) -> Result<DischargeOutcome, ResolveFailure> {
        let sub_goal = Goal {
            concept: constraint.concept,
            args: constraint.args.iter().map(|a| subst.apply(a)).collect(),
        };
        if self.in_progress.contains(&sub_goal) {
            return Ok(DischargeOutcome::Cycled);
        }
        match self.resolve_goal(&sub_goal, scope, false, depth + 1) {
            Ok(witness) => Ok(DischargeOutcome::Resolved(witness)),
            Err(ResolveFailure::NoInstance { .. }) | Err(ResolveFailure::Ambiguous { .. }) => {
                Ok(DischargeOutcome::Failed)
            }
            Err(fatal) => Err(fatal),
        }
    }

    /// Pick the winner among multiple survivors, or report ambiguity.
    ///
    /// Specificity is a strict partial order: a candidate wins only when
    /// it beats every other survivor, either by a strictly more specific
    /// head pattern or, for equally specific heads, by discharging fewer
    /// conditional witnesses.
    fn tie_break(
        &mut self,
        goal: &Goal,
        survivors: Vec<Candidate>,
        depth: usize,
        rendered: &str,
    ) -> Result<ResolvedWitness, ResolveFailure> {
        let winner = survivors.iter().position(|a| {
            survivors
                .iter()
                .all(|b| std::ptr::eq(a, b) || self.strictly_better(a, b, goal.concept))
        });
        match winner {
            Some(index) => {
                let mut survivors = survivors;
                let winner = survivors.swap_remove(index);
                self.trace.record(
                    depth,
                    ResolveAction::Winner,
                    rendered,
                    Some(self.comp.instance(winner.instance).name.clone()),
                );
                Ok(self.finish(winner))
            }
            None => {
                let candidates: Vec<InstanceId> = survivors.iter().map(|c| c.instance).collect();
                self.trace.record(
                    depth,
                    ResolveAction::Ambiguous,
                    rendered,
                    Some(
                        candidates
                            .iter()
                            .map(|c| self.comp.instance(*c).name.as_str())
                            .collect::<Vec<_>>()
                            .join(", "),
                    ),
                );
                Err(ResolveFailure::Ambiguous {
                    goal: goal.clone(),
                    candidates,
                })
            }
        }
    }

    fn strictly_better(&self, a: &Candidate, b: &Candidate, concept: ConceptId) -> bool {
        let a_over_b = self.at_least_as_specific(a.instance, b.instance, concept);
        let b_over_a = self.at_least_as_specific(b.instance, a.instance, concept);
        match (a_over_b, b_over_a) {
            (true, false) => true,
            (true, true) => a.obligations < b.obligations,
            _ => false,
        }
    }

    /// Whether `a`'s declared head pattern is at least as specific as
    /// `b`'s: `b`'s pattern matches `a`'s with only `b`'s parameters
    /// binding.
    fn at_least_as_specific(&self, a: InstanceId, b: InstanceId, concept: ConceptId) -> bool {
        let (Some(pat_a), Some(pat_b)) = (
            self.head_pattern(a, concept),
            self.head_pattern(b, concept),
        ) else {
            return false;
        };
        let mut unifier = Unifier::matching(self.comp.instance(b).params.iter().copied());
        unifier.unify_all(&pat_a, &pat_b)
    }

    fn head_pattern(&self, instance: InstanceId, concept: ConceptId) -> Option<Vec<Type>> {
        self.comp
            .instance_provided(instance)
            .into_iter()
            .find(|p| p.concept == concept)
            .map(|p| p.args)
    }

    fn finish(&self, winner: Candidate) -> ResolvedWitness {
        ResolvedWitness {
            witness: winner.witness,
            substitution: winner.substitution.freeze(),
            source: WitnessSource::Instance(winner.instance),
        }
    }

    /// An ambient witness parameter satisfies a goal when any of its
    /// constraints provides the goal instantiation, directly or through
    /// the constraint concept's extends closure.
    fn ambient_witness(
        &self,
        goal: &Goal,
        scope: &Scope,
    ) -> Option<(TypeParamId, ResolvedWitness)> {
        for &wp in &scope.witness_params {
            let info = self.comp.param(wp);
            if !info.is_witness {
                continue;
            }
            for constraint in &info.constraints {
                let provides = self
                    .comp
                    .instantiations_provided_by(constraint)
                    .into_iter()
                    .any(|p| p.concept == goal.concept && p.args == goal.args);
                if provides {
                    return Some((wp, ResolvedWitness {
                        witness: Type::Param(wp),
                        substitution: Unification::identity(),
                        source: WitnessSource::Ambient(wp),
                    }));
                }
            }
        }
        None
    }
}

enum DischargeOutcome {
    Resolved(ResolvedWitness),
    Failed,
    Cycled,
}

fn inst_obligations(comp: &Compilation, instance: InstanceId) -> usize {
    comp.instance(instance).witness_params.len()
}

// ---------------------------------------------------------------------------
// Convenience entry points
// ---------------------------------------------------------------------------

/// Resolve one request, reporting any failure to the sink and recovering
/// with the error witness so callers can keep going.
pub fn resolve_witness(
    comp: &Compilation,
    config: ResolveConfig,
    request: &WitnessRequest,
    scope: &Scope,
    location: Option<SourceLocation>,
    sink: &DiagnosticSink,
) -> ResolvedWitness {
    let mut resolver = WitnessResolver::new(comp, config);
    match resolver.resolve(request, scope) {
        Ok(witness) => witness,
        Err(failure) => {
            sink.push(failure.to_diagnostic(comp, location));
            ResolvedWitness::error()
        }
    }
}

//! Declaration binding: turning concept/instance syntax into the symbol
//! graph.
//!
//! Binding is where every declaration-shape rule is checked, exactly once
//! per declaration. Structurally broken declarations (unknown concept,
//! wrong arity, duplicate name) are fatal for that declaration and return
//! `Err`. Witness-parameter shape errors are reported to the sink and
//! recovered from by demoting the parameter to an ordinary unconstrained
//! one, so later phases never see an implicit parameter without a concept
//! constraint.

use std::collections::{BTreeMap, BTreeSet};

use tern_ast::{ConceptDef, InstanceDef, Span, TypeAnnotation, TypeParamDecl};
use tern_diag::{Category, Diagnostic, DiagnosticSink};
use tern_types::{Type, TypeParamId};

use crate::span_to_location;
use crate::symbols::{
    Compilation, ConceptId, ConceptInfo, ConceptInstantiation, ContainerId, InstanceId,
    InstanceInfo, MemberInfo, ParamInfo,
};

type ParamScope = BTreeMap<String, TypeParamId>;

impl Compilation {
    /// Register a concept declaration.
    ///
    /// A concept's own type parameters are exactly its instantiation
    /// signature; that invariant holds by construction here. When any
    /// member carries a default body, the carrier's extra "calling
    /// witness" parameter is reserved eagerly so default-struct synthesis
    /// never has to mutate the arena.
    pub fn register_concept(&mut self, def: &ConceptDef) -> Result<ConceptId, Diagnostic> {
        if self.concept_by_name(&def.name.node).is_some() {
            return Err(Diagnostic::error(
                Category::DuplicateDeclaration,
                format!("concept `{}` is already defined", def.name.node),
            )
            .at(span_to_location(def.name.span)));
        }

        let mut scope = ParamScope::new();
        let mut params = Vec::new();
        for param in &def.type_params {
            if scope.contains_key(&param.node) {
                return Err(Diagnostic::error(
                    Category::DuplicateDeclaration,
                    format!(
                        "duplicate type parameter `{}` on concept `{}`",
                        param.node, def.name.node
                    ),
                )
                .at(span_to_location(param.span)));
            }
            let id = self.alloc_param(ParamInfo {
                name: param.node.clone(),
                is_witness: false,
                constraints: Vec::new(),
            });
            scope.insert(param.node.clone(), id);
            params.push(id);
        }

        let mut extends = Vec::new();
        let mut seen_supers = BTreeSet::new();
        for sup in &def.extends {
            if sup.node.head() == Some(def.name.node.as_str()) {
                return Err(Diagnostic::error(
                    Category::InvalidDeclaration,
                    format!("concept `{}` cannot extend itself", def.name.node),
                )
                .at(span_to_location(sup.span)));
            }
            let Some(inst) = self.resolve_constraint(&sup.node, &scope, sup.span)? else {
                return Err(Diagnostic::error(
                    Category::UndefinedName,
                    format!(
                        "unknown superconcept `{}` in concept `{}`",
                        sup.node.head().unwrap_or("<unnamed>"),
                        def.name.node
                    ),
                )
                .at(span_to_location(sup.span)));
            };
            if !seen_supers.insert(inst.concept) {
                return Err(Diagnostic::error(
                    Category::DuplicateDeclaration,
                    format!(
                        "duplicate superconcept `{}` in concept `{}`",
                        self.concept(inst.concept).name,
                        def.name.node
                    ),
                )
                .at(span_to_location(sup.span)));
            }
            extends.push(inst);
        }

        let mut members = Vec::new();
        let mut seen_members = BTreeSet::new();
        for member in &def.members {
            if !seen_members.insert(member.name.node.clone()) {
                return Err(Diagnostic::error(
                    Category::DuplicateDeclaration,
                    format!(
                        "duplicate member `{}` in concept `{}`",
                        member.name.node, def.name.node
                    ),
                )
                .at(span_to_location(member.name.span)));
            }
            let mut param_types = Vec::new();
            for ann in &member.params {
                param_types.push(self.resolve_annotation(&ann.node, &scope, ann.span)?);
            }
            let return_type = match &member.return_type {
                Some(ann) => self.resolve_annotation(&ann.node, &scope, ann.span)?,
                None => Type::Unit,
            };
            members.push(MemberInfo {
                name: member.name.node.clone(),
                params: param_types,
                return_type,
                has_default: member.has_default,
                doc: member.doc.clone(),
            });
        }

        // The concept ID is known before insertion, which lets the calling
        // witness parameter constrain itself with the concept being bound.
        let id = ConceptId(self.concept_count() as u32);
        let default_witness_param = members.iter().any(|m| m.has_default).then(|| {
            self.alloc_param(ParamInfo {
                name: format!("{}Caller", def.name.node),
                is_witness: true,
                constraints: vec![ConceptInstantiation {
                    concept: id,
                    args: params.iter().map(|p| Type::Param(*p)).collect(),
                }],
            })
        });

        let bound = self.push_concept(ConceptInfo {
            name: def.name.node.clone(),
            params,
            extends,
            members,
            span: Some(def.name.span),
            doc: def.doc.clone(),
            default_witness_param,
            extends_closure: Default::default(),
            default_struct: Default::default(),
        });
        debug_assert_eq!(bound, id);
        Ok(bound)
    }

    /// Register an instance declaration in a container.
    ///
    /// Coherence: a second instance with the same canonicalized head and
    /// the same conditional-witness requirements in the same container is
    /// rejected. Instances with the same head under *different* conditions
    /// are allowed — they only conflict at resolution time, when both
    /// conditions discharge for the same concrete types.
    pub fn register_instance(
        &mut self,
        def: &InstanceDef,
        container: ContainerId,
        sink: &DiagnosticSink,
    ) -> Result<InstanceId, Diagnostic> {
        let (params, scope) = self.bind_type_params_inner(&def.type_params, sink);

        let head = match self.resolve_constraint(&def.concept.node, &scope, def.concept.span)? {
            Some(head) => head,
            None => {
                return Err(Diagnostic::error(
                    Category::UndefinedName,
                    format!(
                        "`{}` is not a defined concept",
                        def.concept.node.head().unwrap_or("<unnamed>")
                    ),
                )
                .at(span_to_location(def.concept.span)));
            }
        };

        // The head may reference only the instance's own parameters; any
        // other name resolved as a nominal type, so this holds by
        // construction.
        debug_assert!(
            head.args
                .iter()
                .flat_map(tern_types::free_params)
                .all(|p| params.contains(&p)),
            "instance head references foreign type parameters"
        );

        let key = self.instance_coherence_key(&head, &params);
        for &other in self.instances_in(container) {
            let existing = self.instance(other);
            if existing.concept.concept != head.concept {
                continue;
            }
            let other_key = self.instance_coherence_key(&existing.concept, &existing.params);
            if other_key == key {
                return Err(Diagnostic::error(
                    Category::DuplicateDeclaration,
                    format!(
                        "instance `{}` duplicates `{}` for `{}`",
                        def.name.node,
                        existing.name,
                        self.display_instantiation(&head)
                    ),
                )
                .at(span_to_location(def.name.span)));
            }
        }

        let provided_members = self.member_names(&def.name, def.members.iter(), sink);
        self.check_member_completeness(def, &head, &provided_members, sink);

        let witness_params: Vec<TypeParamId> = params
            .iter()
            .copied()
            .filter(|p| self.param(*p).is_witness)
            .collect();

        Ok(self.push_instance(InstanceInfo {
            name: def.name.node.clone(),
            params,
            witness_params,
            concept: head,
            members: provided_members,
            accessibility: def.accessibility,
            container,
            span: Some(def.name.span),
        }))
    }

    fn member_names<'a>(
        &self,
        instance_name: &tern_ast::Spanned<String>,
        members: impl Iterator<Item = &'a tern_ast::Spanned<String>>,
        sink: &DiagnosticSink,
    ) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        for member in members {
            if !out.insert(member.node.clone()) {
                sink.push(
                    Diagnostic::error(
                        Category::DuplicateDeclaration,
                        format!(
                            "duplicate member `{}` in instance `{}`",
                            member.node, instance_name.node
                        ),
                    )
                    .at(span_to_location(member.span)),
                );
            }
        }
        out
    }

    /// Every non-default member the instance's concept (and everything it
    /// extends) declares is an obligation.
    fn check_member_completeness(
        &self,
        def: &InstanceDef,
        head: &ConceptInstantiation,
        provided: &BTreeSet<String>,
        sink: &DiagnosticSink,
    ) {
        let mut known = BTreeSet::new();
        for inst in self.instantiations_provided_by(head) {
            for member in &self.concept(inst.concept).members {
                known.insert(member.name.clone());
                if !member.has_default && !provided.contains(&member.name) {
                    sink.push(
                        Diagnostic::error(
                            Category::MissingMember,
                            format!(
                                "instance `{}` does not implement member `{}` of concept `{}`",
                                def.name.node,
                                member.name,
                                self.concept(inst.concept).name
                            ),
                        )
                        .at(span_to_location(def.name.span))
                        .with_help(
                            "implement the member, or give the concept a default body for it",
                        ),
                    );
                }
            }
        }
        for member in &def.members {
            if !known.contains(&member.node) {
                sink.push(
                    Diagnostic::error(
                        Category::InvalidDeclaration,
                        format!(
                            "concept `{}` has no member `{}`",
                            self.concept(head.concept).name,
                            member.node
                        ),
                    )
                    .at(span_to_location(member.span)),
                );
            }
        }
    }

    /// Bind a declaration's type parameter list, performing the one-time
    /// witness-parameter shape validation.
    ///
    /// Hosts use this for any generic declaration that can carry implicit
    /// parameters (functions as well as instances); the returned IDs are
    /// what goes into a [`crate::symbols::Scope`]'s ambient witness list.
    pub fn bind_type_params(
        &mut self,
        decls: &[TypeParamDecl],
        sink: &DiagnosticSink,
    ) -> Vec<TypeParamId> {
        self.bind_type_params_inner(decls, sink).0
    }

    fn bind_type_params_inner(
        &mut self,
        decls: &[TypeParamDecl],
        sink: &DiagnosticSink,
    ) -> (Vec<TypeParamId>, ParamScope) {
        // Phase 1: allocate every parameter so constraints can reference
        // siblings (and the parameter itself, as in `T : Eq(T)`).
        let mut scope = ParamScope::new();
        let mut params = Vec::new();
        for decl in decls {
            if scope.contains_key(&decl.name.node) {
                sink.push(
                    Diagnostic::error(
                        Category::DuplicateDeclaration,
                        format!("duplicate type parameter `{}`", decl.name.node),
                    )
                    .at(span_to_location(decl.name.span)),
                );
            }
            let id = self.alloc_param(ParamInfo {
                name: decl.name.node.clone(),
                is_witness: false,
                constraints: Vec::new(),
            });
            scope.entry(decl.name.node.clone()).or_insert(id);
            params.push(id);
        }

        // Phase 2: resolve constraints and validate shapes.
        for (decl, &id) in decls.iter().zip(&params) {
            let mut constraints = Vec::new();
            for ann in &decl.constraints {
                match self.resolve_constraint(&ann.node, &scope, ann.span) {
                    Ok(Some(inst)) => {
                        if decl.implicit {
                            constraints.push(inst);
                        } else {
                            sink.push(
                                Diagnostic::error(
                                    Category::ConceptConstraintOnNonImplicitParameter,
                                    format!(
                                        "concept constraint `{}` on non-implicit parameter `{}`",
                                        self.display_instantiation(&inst),
                                        decl.name.node
                                    ),
                                )
                                .at(span_to_location(ann.span))
                                .with_help("mark the parameter implicit to make it a witness"),
                            );
                        }
                    }
                    Ok(None) => {
                        // Not a concept. Ordinary bounds on ordinary
                        // parameters belong to the host type checker;
                        // on implicit parameters they are a shape error.
                        if decl.implicit {
                            sink.push(
                                Diagnostic::error(
                                    Category::NonConceptConstraintOnImplicitParameter,
                                    format!(
                                        "constraint on implicit parameter `{}` is not a concept",
                                        decl.name.node
                                    ),
                                )
                                .at(span_to_location(ann.span)),
                            );
                        }
                    }
                    Err(diag) => sink.push(diag),
                }
            }

            if decl.implicit {
                if constraints.is_empty() {
                    sink.push(
                        Diagnostic::error(
                            Category::ImplicitParameterMissingConstraint,
                            format!(
                                "implicit parameter `{}` has no concept constraint",
                                decl.name.node
                            ),
                        )
                        .at(span_to_location(decl.name.span))
                        .with_help("add a concept constraint, or drop the implicit marker"),
                    );
                    // Recovery: the parameter is treated as an ordinary
                    // unconstrained parameter from here on.
                } else {
                    let info = self.param_mut(id);
                    info.is_witness = true;
                    info.constraints = constraints;
                }
            }
        }

        (params, scope)
    }

    /// Resolve a constraint annotation to a concept instantiation.
    ///
    /// `Ok(None)` means the annotation is not a concept application at
    /// all; the caller decides whether that is an error.
    pub(crate) fn resolve_constraint(
        &self,
        ann: &TypeAnnotation,
        scope: &ParamScope,
        span: Span,
    ) -> Result<Option<ConceptInstantiation>, Diagnostic> {
        let Some(head) = ann.head() else {
            return Ok(None);
        };
        let Some(concept) = self.concept_by_name(head) else {
            return Ok(None);
        };
        let expected = self.concept(concept).params.len();
        let args_ann = ann.head_args();
        if args_ann.len() != expected {
            return Err(Diagnostic::error(
                Category::ArityMismatch,
                format!(
                    "concept `{head}` expects {expected} type argument(s), got {}",
                    args_ann.len()
                ),
            )
            .at(span_to_location(span)));
        }
        let mut args = Vec::new();
        for arg in args_ann {
            args.push(self.resolve_annotation(arg, scope, span)?);
        }
        Ok(Some(ConceptInstantiation { concept, args }))
    }

    /// Resolve a type annotation against the parameters in scope.
    ///
    /// Unknown names become nominal types; concepts are rejected in type
    /// position.
    pub(crate) fn resolve_annotation(
        &self,
        ann: &TypeAnnotation,
        scope: &ParamScope,
        span: Span,
    ) -> Result<Type, Diagnostic> {
        match ann {
            TypeAnnotation::Name(name) => {
                if let Some(prim) = primitive_type(name) {
                    return Ok(prim);
                }
                if let Some(&param) = scope.get(name) {
                    return Ok(Type::Param(param));
                }
                if self.concept_by_name(name).is_some() {
                    return Err(concept_in_type_position(name, span));
                }
                Ok(Type::named(name.clone(), Vec::new()))
            }
            TypeAnnotation::Applied(name, args) => {
                if primitive_type(name).is_some() || scope.contains_key(name.as_str()) {
                    return Err(Diagnostic::error(
                        Category::InvalidDeclaration,
                        format!("`{name}` cannot be applied to type arguments"),
                    )
                    .at(span_to_location(span)));
                }
                if self.concept_by_name(name).is_some() {
                    return Err(concept_in_type_position(name, span));
                }
                let mut resolved = Vec::new();
                for arg in args {
                    resolved.push(self.resolve_annotation(arg, scope, span)?);
                }
                Ok(Type::named(name.clone(), resolved))
            }
            TypeAnnotation::Tuple(elems) => {
                let mut resolved = Vec::new();
                for elem in elems {
                    resolved.push(self.resolve_annotation(elem, scope, span)?);
                }
                Ok(Type::Tuple(resolved))
            }
            TypeAnnotation::Function { params, ret } => {
                let mut resolved = Vec::new();
                for param in params {
                    resolved.push(self.resolve_annotation(param, scope, span)?);
                }
                Ok(Type::Function {
                    params: resolved,
                    ret: Box::new(self.resolve_annotation(ret, scope, span)?),
                })
            }
        }
    }

    /// Canonical key for coherence checks: the head arguments and the
    /// conditional-witness requirements with own parameters renumbered by
    /// first occurrence, so alpha-equivalent declarations compare equal.
    fn instance_coherence_key(
        &self,
        head: &ConceptInstantiation,
        params: &[TypeParamId],
    ) -> (Vec<Type>, Vec<(ConceptId, Vec<Type>)>) {
        let mut renames: BTreeMap<TypeParamId, TypeParamId> = BTreeMap::new();
        let head_args: Vec<Type> = head
            .args
            .iter()
            .map(|a| canonicalize(a, &mut renames))
            .collect();
        let mut conditions = Vec::new();
        for &param in params {
            let info = self.param(param);
            if !info.is_witness {
                continue;
            }
            for constraint in &info.constraints {
                conditions.push((
                    constraint.concept,
                    constraint
                        .args
                        .iter()
                        .map(|a| canonicalize(a, &mut renames))
                        .collect(),
                ));
            }
        }
        conditions.sort();
        (head_args, conditions)
    }
}

fn primitive_type(name: &str) -> Option<Type> {
    match name {
        "Int" => Some(Type::Int),
        "Float" => Some(Type::Float),
        "Bool" => Some(Type::Bool),
        "String" => Some(Type::String),
        "Unit" => Some(Type::Unit),
        _ => None,
    }
}

fn concept_in_type_position(name: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        Category::InvalidDeclaration,
        format!("concept `{name}` cannot be used in type position"),
    )
    .at(span_to_location(span))
    .with_help("concepts appear only as constraints on implicit parameters")
}

/// Renumber parameters by first occurrence for alpha-equivalence checks.
fn canonicalize(ty: &Type, renames: &mut BTreeMap<TypeParamId, TypeParamId>) -> Type {
    match ty {
        Type::Param(p) => {
            let next = TypeParamId(renames.len() as u32);
            Type::Param(*renames.entry(*p).or_insert(next))
        }
        Type::Named(named) => Type::Named(tern_types::NamedType {
            name: named.name.clone(),
            args: named.args.iter().map(|a| canonicalize(a, renames)).collect(),
        }),
        Type::Tuple(elems) => {
            Type::Tuple(elems.iter().map(|t| canonicalize(t, renames)).collect())
        }
        Type::Function { params, ret } => Type::Function {
            params: params.iter().map(|t| canonicalize(t, renames)).collect(),
            ret: Box::new(canonicalize(ret, renames)),
        },
        _ => ty.clone(),
    }
}

// ---------------------------------------------------------------------------
// Test support
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use tern_diag::{Category, DiagnosticSink};
    use tern_types::Type;

    use crate::symbols::Compilation;

    #[test]
    fn duplicate_concept_is_rejected() {
        let mut comp = Compilation::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);
        let def = tern_ast::ConceptDef {
            name: sp("Eq".to_string()),
            type_params: vec![sp("A".to_string())],
            extends: Vec::new(),
            members: Vec::new(),
            doc: None,
        };
        let err = comp.register_concept(&def).unwrap_err();
        assert_eq!(err.category, Category::DuplicateDeclaration);
    }

    #[test]
    fn unknown_superconcept_is_rejected() {
        let mut comp = Compilation::new();
        let def = tern_ast::ConceptDef {
            name: sp("Ord".to_string()),
            type_params: vec![sp("A".to_string())],
            extends: vec![sp(ann("Eq(A)"))],
            members: Vec::new(),
            doc: None,
        };
        let err = comp.register_concept(&def).unwrap_err();
        assert_eq!(err.category, Category::UndefinedName);
    }

    #[test]
    fn implicit_param_without_constraint_is_demoted() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        let params = comp.bind_type_params(&[implicit("W", &[])], &sink);

        let diags = sink.drain();
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags[0].category,
            Category::ImplicitParameterMissingConstraint
        );
        // Recovery: the parameter is ordinary and unconstrained.
        let info = comp.param(params[0]);
        assert!(!info.is_witness);
        assert!(info.constraints.is_empty());
    }

    #[test]
    fn concept_constraint_on_plain_param_is_reported() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);

        let mut decl = plain("T");
        decl.constraints = vec![sp(ann("Eq(T)"))];
        let params = comp.bind_type_params(&[decl], &sink);

        let diags = sink.drain();
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags[0].category,
            Category::ConceptConstraintOnNonImplicitParameter
        );
        assert!(!comp.param(params[0]).is_witness);
    }

    #[test]
    fn non_concept_constraint_on_implicit_param_is_reported() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);

        let params = comp.bind_type_params(&[implicit("W", &["Counter", "Eq(W)"])], &sink);

        let diags = sink.drain();
        assert_eq!(diags.len(), 1);
        assert_eq!(
            diags[0].category,
            Category::NonConceptConstraintOnImplicitParameter
        );
        // The valid concept constraint survives; the parameter is still a
        // witness.
        let info = comp.param(params[0]);
        assert!(info.is_witness);
        assert_eq!(info.constraints.len(), 1);
    }

    #[test]
    fn constraint_can_reference_its_own_parameter() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);

        let params = comp.bind_type_params(&[implicit("T", &["Eq(T)"])], &sink);
        assert!(sink.is_empty());
        let info = comp.param(params[0]);
        assert_eq!(info.constraints[0].args, vec![Type::Param(params[0])]);
    }

    #[test]
    fn instance_with_wrong_concept_arity_is_rejected() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);

        let def = tern_ast::InstanceDef {
            name: sp("EqIntInt".to_string()),
            type_params: Vec::new(),
            concept: sp(ann("Eq(Int, Int)")),
            members: vec![sp("equals".to_string())],
            accessibility: tern_ast::Accessibility::Public,
        };
        let err = comp
            .register_instance(&def, Compilation::ROOT, &sink)
            .unwrap_err();
        assert_eq!(err.category, Category::ArityMismatch);
    }

    #[test]
    fn duplicate_instance_head_is_rejected() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);
        instance(&mut comp, &sink, "EqInt", &[], "Eq(Int)", &["equals"]);

        let def = tern_ast::InstanceDef {
            name: sp("EqIntAgain".to_string()),
            type_params: Vec::new(),
            concept: sp(ann("Eq(Int)")),
            members: vec![sp("equals".to_string())],
            accessibility: tern_ast::Accessibility::Public,
        };
        let err = comp
            .register_instance(&def, Compilation::ROOT, &sink)
            .unwrap_err();
        assert_eq!(err.category, Category::DuplicateDeclaration);
    }

    #[test]
    fn alpha_equivalent_generic_heads_are_duplicates() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);
        instance(
            &mut comp,
            &sink,
            "EqList",
            &[implicit("T", &["Eq(T)"])],
            "Eq(List(T))",
            &["equals"],
        );

        let def = tern_ast::InstanceDef {
            name: sp("EqListAgain".to_string()),
            type_params: vec![implicit("U", &["Eq(U)"])],
            concept: sp(ann("Eq(List(U))")),
            members: vec![sp("equals".to_string())],
            accessibility: tern_ast::Accessibility::Public,
        };
        let err = comp
            .register_instance(&def, Compilation::ROOT, &sink)
            .unwrap_err();
        assert_eq!(err.category, Category::DuplicateDeclaration);
    }

    #[test]
    fn same_head_under_different_conditions_is_allowed() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);
        concept(&mut comp, "Hash", &["A"], &[], &[("hash", false)]);
        instance(
            &mut comp,
            &sink,
            "EqListByEq",
            &[implicit("T", &["Eq(T)"])],
            "Eq(List(T))",
            &["equals"],
        );
        // Same head shape, different condition: allowed at bind time.
        instance(
            &mut comp,
            &sink,
            "EqListByHash",
            &[implicit("T", &["Hash(T)"])],
            "Eq(List(T))",
            &["equals"],
        );
        assert!(sink.is_empty());
    }

    #[test]
    fn condition_order_does_not_affect_coherence() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);
        concept(&mut comp, "Hash", &["A"], &[], &[("hash", false)]);
        instance(
            &mut comp,
            &sink,
            "EqListBoth",
            &[
                plain("T"),
                implicit("W", &["Eq(T)"]),
                implicit("V", &["Hash(T)"]),
            ],
            "Eq(List(T))",
            &["equals"],
        );

        // Same conditions declared in the opposite order still collide.
        let def = tern_ast::InstanceDef {
            name: sp("EqListBothAgain".to_string()),
            type_params: vec![
                plain("T"),
                implicit("V", &["Hash(T)"]),
                implicit("W", &["Eq(T)"]),
            ],
            concept: sp(ann("Eq(List(T))")),
            members: vec![sp("equals".to_string())],
            accessibility: tern_ast::Accessibility::Public,
        };
        let err = comp
            .register_instance(&def, Compilation::ROOT, &sink)
            .unwrap_err();
        assert_eq!(err.category, Category::DuplicateDeclaration);
    }

    #[test]
    fn missing_member_is_reported_and_recovered() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[
            ("equals", false),
            ("not_equals", true),
        ]);
        // `not_equals` has a default, so omitting it is fine; `equals`
        // does not.
        instance(&mut comp, &sink, "EqInt", &[], "Eq(Int)", &[]);

        let diags = sink.drain();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].category, Category::MissingMember);
        assert!(diags[0].message.contains("equals"));
    }

    #[test]
    fn inherited_members_are_obligations() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);
        concept(&mut comp, "Ord", &["A"], &["Eq(A)"], &[("compare", false)]);

        instance(&mut comp, &sink, "OrdInt", &[], "Ord(Int)", &["compare"]);
        let diags = sink.drain();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].category, Category::MissingMember);
        assert!(diags[0].message.contains("equals"));
    }

    #[test]
    fn unknown_member_in_instance_is_reported() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);
        instance(&mut comp, &sink, "EqInt", &[], "Eq(Int)", &[
            "equals", "compare",
        ]);

        let diags = sink.drain();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].category, Category::InvalidDeclaration);
        assert!(diags[0].message.contains("compare"));
    }
}

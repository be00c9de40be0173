//! Synthesized default-member carriers.
//!
//! A concept whose members carry default bodies gets one synthesized
//! zero-field carrier type. The carrier is generic over the concept's
//! parameters plus one extra witness parameter, the *calling witness*:
//! the actual instance on whose behalf a default body runs, so a default
//! can call sibling members through it and pick up overrides.
//!
//! Carriers are synthesized on first request and published once per
//! concept; every call site for the lifetime of the compilation shares
//! the same carrier.

use std::sync::Arc;

use tern_types::TypeParamId;

use crate::symbols::{Compilation, ConceptId, InstanceId, MemberInfo};

/// The synthesized carrier for one concept's default member bodies.
#[derive(Debug)]
pub struct DefaultStruct {
    pub concept: ConceptId,
    pub name: String,
    /// The calling-witness parameter, constrained to the carrier's own
    /// concept. Reserved by the binder, not allocated here.
    pub calling_witness: TypeParamId,
    members: std::sync::OnceLock<Vec<MemberInfo>>,
}

impl DefaultStruct {
    /// The defaulted members this carrier provides, lazily computed from
    /// the concept's member list.
    pub fn members<'a>(&'a self, comp: &Compilation) -> &'a [MemberInfo] {
        self.members.get_or_init(|| {
            comp.concept(self.concept)
                .members
                .iter()
                .filter(|m| m.has_default)
                .cloned()
                .collect()
        })
    }
}

/// The default carrier for a concept, or `None` when no member has a
/// default body. The first caller synthesizes it; everyone else gets the
/// published one.
pub fn default_struct<'a>(comp: &'a Compilation, concept: ConceptId) -> Option<&'a Arc<DefaultStruct>> {
    let info = comp.concept(concept);
    let calling_witness = info.default_witness_param?;
    Some(info.default_struct.get_or_init(|| {
        Arc::new(DefaultStruct {
            concept,
            name: format!("{}Defaults", info.name),
            calling_witness,
            members: Default::default(),
        })
    }))
}

/// Where a resolved member body comes from.
#[derive(Debug, Clone, Copy)]
pub enum MemberOrigin<'a> {
    /// The instance implements the member itself.
    Instance(InstanceId),
    /// The member falls back to the concept's default carrier.
    Default(&'a DefaultStruct),
}

/// A member looked up through a witness.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedMember<'a> {
    pub signature: &'a MemberInfo,
    pub origin: MemberOrigin<'a>,
}

/// Look up a member through an instance witness. An instance-provided
/// member wins; otherwise a defaulted member falls back to the carrier.
/// `None` means the member does not exist on the concept (or exists but
/// is neither implemented nor defaulted, which binding already reported).
pub fn witness_member<'a>(
    comp: &'a Compilation,
    instance: InstanceId,
    member: &str,
) -> Option<ResolvedMember<'a>> {
    let inst = comp.instance(instance);
    for provided in comp.instance_provided(instance) {
        let concept = comp.concept(provided.concept);
        let Some(signature) = concept.members.iter().find(|m| m.name == member) else {
            continue;
        };
        if inst.members.contains(member) {
            return Some(ResolvedMember {
                signature,
                origin: MemberOrigin::Instance(instance),
            });
        }
        if signature.has_default {
            let carrier = default_struct(comp, provided.concept)?;
            let signature = carrier.members(comp).iter().find(|m| m.name == member)?;
            return Some(ResolvedMember {
                signature,
                origin: MemberOrigin::Default(carrier),
            });
        }
        return None;
    }
    None
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tern_diag::DiagnosticSink;
    use tern_types::Type;

    use super::*;
    use crate::bind::test_support::{concept, instance};
    use crate::symbols::Compilation;

    fn eq_with_default(comp: &mut Compilation) -> ConceptId {
        concept(comp, "Eq", &["A"], &[], &[
            ("equals", false),
            ("not_equals", true),
        ])
    }

    #[test]
    fn concept_without_defaults_has_no_carrier() {
        let mut comp = Compilation::new();
        let eq = concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);
        assert!(default_struct(&comp, eq).is_none());
    }

    #[test]
    fn carrier_is_synthesized_once_and_shared() {
        let mut comp = Compilation::new();
        let eq = eq_with_default(&mut comp);

        let first = default_struct(&comp, eq).unwrap();
        let second = default_struct(&comp, eq).unwrap();
        assert!(Arc::ptr_eq(first, second));
        assert_eq!(first.name, "EqDefaults");
        assert_eq!(first.concept, eq);
    }

    #[test]
    fn calling_witness_is_constrained_to_the_concept() {
        let mut comp = Compilation::new();
        let eq = eq_with_default(&mut comp);

        let carrier = default_struct(&comp, eq).unwrap();
        let info = comp.param(carrier.calling_witness);
        assert!(info.is_witness);
        assert_eq!(info.constraints.len(), 1);
        assert_eq!(info.constraints[0].concept, eq);
    }

    #[test]
    fn carrier_members_are_the_defaulted_subset() {
        let mut comp = Compilation::new();
        let eq = eq_with_default(&mut comp);

        let carrier = default_struct(&comp, eq).unwrap();
        let members = carrier.members(&comp);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].name, "not_equals");
    }

    #[test]
    fn instance_member_wins_over_default() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        let _eq = eq_with_default(&mut comp);
        let id = instance(&mut comp, &sink, "EqInt", &[], "Eq(Int)", &[
            "equals",
            "not_equals",
        ]);

        let resolved = witness_member(&comp, id, "not_equals").unwrap();
        assert!(matches!(resolved.origin, MemberOrigin::Instance(i) if i == id));
    }

    #[test]
    fn omitted_default_member_falls_back_to_carrier() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        let eq = eq_with_default(&mut comp);
        let id = instance(&mut comp, &sink, "EqInt", &[], "Eq(Int)", &["equals"]);
        assert!(sink.is_empty());

        let resolved = witness_member(&comp, id, "not_equals").unwrap();
        match resolved.origin {
            MemberOrigin::Default(carrier) => assert_eq!(carrier.concept, eq),
            other => panic!("expected default origin, got {other:?}"),
        }
        assert_eq!(resolved.signature.name, "not_equals");
    }

    #[test]
    fn inherited_members_resolve_through_the_closure() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        let _eq = eq_with_default(&mut comp);
        concept(&mut comp, "Ord", &["A"], &["Eq(A)"], &[("compare", false)]);
        let id = instance(&mut comp, &sink, "OrdInt", &[], "Ord(Int)", &[
            "compare", "equals",
        ]);
        assert!(sink.is_empty());

        // `not_equals` is declared on Eq, provided via Ord's closure, and
        // defaulted.
        let resolved = witness_member(&comp, id, "not_equals").unwrap();
        assert!(matches!(resolved.origin, MemberOrigin::Default(_)));
        // Unknown members resolve to nothing.
        assert!(witness_member(&comp, id, "hash").is_none());
    }

    #[test]
    fn racing_carrier_synthesis_publishes_one_arc() {
        let mut comp = Compilation::new();
        let eq = eq_with_default(&mut comp);

        let carriers: Vec<Arc<DefaultStruct>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| Arc::clone(default_struct(&comp, eq).unwrap())))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(carriers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[test]
    fn carrier_usable_as_goal_argument() {
        // The carrier's calling witness can appear as a resolution goal
        // argument like any other parameter.
        let mut comp = Compilation::new();
        let eq = eq_with_default(&mut comp);
        let carrier = default_struct(&comp, eq).unwrap();
        let goal_arg = Type::Param(carrier.calling_witness);
        assert_eq!(comp.display_type(&goal_arg), "EqCaller");
    }
}

//! Visible-instance collection.
//!
//! The candidate set for a resolution goal is an ordered walk of the
//! scope's container chain (innermost first) followed by its static
//! imports in declaration order. Each instance is kept at its first
//! encounter only, which makes candidate order deterministic for a given
//! scope regardless of how often a container is reachable.

use std::collections::BTreeSet;

use tern_ast::Accessibility;

use crate::symbols::{Compilation, ContainerId, InstanceId, Scope};

/// Collect the instances visible from `scope`, innermost container first,
/// then imports. Accessibility is applied per instance.
pub fn visible_instances(comp: &Compilation, scope: &Scope) -> Vec<InstanceId> {
    let mut out = Vec::new();
    let mut seen = BTreeSet::new();

    let mut chain = Vec::new();
    let mut cursor = Some(scope.container);
    while let Some(container) = cursor {
        chain.push(container);
        cursor = comp.container(container).parent;
    }

    for &container in chain.iter().chain(&scope.imports) {
        for &instance in comp.instances_in(container) {
            if seen.insert(instance) && is_accessible(comp, scope, instance, &chain) {
                out.push(instance);
            }
        }
    }
    out
}

fn is_accessible(
    comp: &Compilation,
    _scope: &Scope,
    instance: InstanceId,
    chain: &[ContainerId],
) -> bool {
    let info = comp.instance(instance);
    match info.accessibility {
        Accessibility::Public | Accessibility::Internal => true,
        // Private: visible only from within the declaring container.
        Accessibility::Private => chain.contains(&info.container),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tern_ast::Accessibility;
    use tern_diag::DiagnosticSink;

    use crate::bind::test_support::{concept, instance, instance_in};
    use crate::symbols::Compilation;

    #[test]
    fn container_chain_precedes_imports() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);

        let inner = comp.add_container("inner", Compilation::ROOT);
        let lib = comp.add_container("lib", Compilation::ROOT);

        let from_lib = instance_in(
            &mut comp,
            &sink,
            "EqIntLib",
            &[],
            "Eq(Int)",
            &["equals"],
            lib,
            Accessibility::Public,
        );
        let from_root = instance(&mut comp, &sink, "EqIntRoot", &[], "Eq(Int)", &["equals"]);
        let from_inner = instance_in(
            &mut comp,
            &sink,
            "EqIntInner",
            &[],
            "Eq(Int)",
            &["equals"],
            inner,
            Accessibility::Public,
        );

        let scope = Scope::new(inner).with_imports(vec![lib]);
        assert_eq!(
            visible_instances(&comp, &scope),
            vec![from_inner, from_root, from_lib]
        );
    }

    #[test]
    fn first_encounter_wins_on_repeated_containers() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);

        let id = instance(&mut comp, &sink, "EqInt", &[], "Eq(Int)", &["equals"]);
        // Importing the root again must not duplicate its instances.
        let scope = Scope::new(Compilation::ROOT).with_imports(vec![Compilation::ROOT]);
        assert_eq!(visible_instances(&comp, &scope), vec![id]);
    }

    #[test]
    fn private_instances_are_scoped_to_their_container() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);

        let lib = comp.add_container("lib", Compilation::ROOT);
        let hidden = instance_in(
            &mut comp,
            &sink,
            "EqIntHidden",
            &[],
            "Eq(Int)",
            &["equals"],
            lib,
            Accessibility::Private,
        );

        // Importing the container does not expose its private instances.
        let outside = Scope::new(Compilation::ROOT).with_imports(vec![lib]);
        assert!(visible_instances(&comp, &outside).is_empty());

        // From inside the container the instance is visible.
        let inside = Scope::new(lib);
        assert_eq!(visible_instances(&comp, &inside), vec![hidden]);
    }

    #[test]
    fn nested_scope_sees_private_instances_of_ancestors() {
        let mut comp = Compilation::new();
        let sink = DiagnosticSink::new();
        concept(&mut comp, "Eq", &["A"], &[], &[("equals", false)]);

        let outer = comp.add_container("outer", Compilation::ROOT);
        let inner = comp.add_container("inner", outer);
        let id = instance_in(
            &mut comp,
            &sink,
            "EqIntOuter",
            &[],
            "Eq(Int)",
            &["equals"],
            outer,
            Accessibility::Private,
        );

        let scope = Scope::new(inner);
        assert_eq!(visible_instances(&comp, &scope), vec![id]);
    }
}

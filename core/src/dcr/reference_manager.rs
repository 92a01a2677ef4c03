//! Reference satisfaction and offline static cycle detection.

use std::collections::HashMap;

use forge_abi::manifest::ComponentDescription;

use crate::service::{Filter, Registry as ServiceRegistry, ServiceReference};

/// Computes the ordered, cardinality-truncated candidate binding set for
/// every declared reference, using the current registry snapshot and
/// the ranking/id tie-break already implemented by `ServiceReference`'s
/// `Ord`.
pub fn candidate_bindings(
    description: &ComponentDescription,
    services: &ServiceRegistry,
) -> HashMap<String, Vec<ServiceReference>> {
    description
        .references
        .iter()
        .map(|r| {
            let filter = r.target.as_deref().and_then(|f| Filter::parse(f).ok());
            let mut candidates = services.find(&r.interface, filter.as_ref());
            if !r.cardinality.is_multiple() {
                candidates.truncate(1);
            }
            (r.name.clone(), candidates)
        })
        .collect()
}

/// Whether every mandatory reference of `description` currently has at
/// least one matching service registered. Optional
/// (`0..1`/`0..n`) references never block satisfaction.
pub fn is_satisfied(description: &ComponentDescription, services: &ServiceRegistry) -> bool {
    let bound = candidate_bindings(description, services);
    description
        .references
        .iter()
        .filter(|r| r.cardinality.is_mandatory())
        .all(|r| bound.get(&r.name).map(|c| !c.is_empty()).unwrap_or(false))
}

/// Finds cycles in the *static* dependency graph among `descriptions`:
/// an edge `A -> B` exists when `A` declares a mandatory reference to an
/// interface `B` implements. Optional references never contribute an
/// edge, since a cycle through one is resolvable (one side starts
/// without the other) rather than a deadlock.
///
/// This is an offline diagnostic over declared descriptions, not the
/// runtime's cycle detector: the live mechanism is exclusively the
/// per-activation thread-local stack in [`super::activation`], since a
/// persistent graph would need its own lock and go stale on every
/// rebind.
///
/// Returns each distinct cycle once, components listed in traversal
/// order with the closing node repeated last (e.g. `["A", "B", "A"]`).
pub fn detect_cycles(descriptions: &[ComponentDescription]) -> Vec<Vec<String>> {
    let mut providers: HashMap<&str, Vec<&str>> = HashMap::new();
    for d in descriptions {
        for iface in &d.interfaces {
            providers.entry(iface.as_str()).or_default().push(d.name.as_str());
        }
    }

    let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
    for d in descriptions {
        let deps: Vec<&str> = d
            .references
            .iter()
            .filter(|r| r.cardinality.is_mandatory())
            .filter_map(|r| providers.get(r.interface.as_str()))
            .flatten()
            .copied()
            .collect();
        graph.insert(d.name.as_str(), deps);
    }

    #[derive(PartialEq)]
    enum Mark {
        OnStack,
        Done,
    }

    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut stack: Vec<&str> = Vec::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();
    let mut seen_cycles: std::collections::HashSet<Vec<String>> = std::collections::HashSet::new();

    fn visit<'a>(
        node: &'a str,
        graph: &HashMap<&'a str, Vec<&'a str>>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
        cycles: &mut Vec<Vec<String>>,
        seen: &mut std::collections::HashSet<Vec<String>>,
    ) {
        match marks.get(node) {
            Some(Mark::Done) => return,
            Some(Mark::OnStack) => {
                if let Some(pos) = stack.iter().position(|n| *n == node) {
                    let mut cycle: Vec<String> = stack[pos..].iter().map(|s| s.to_string()).collect();
                    cycle.push(node.to_string());
                    let mut key = cycle.clone();
                    key.sort();
                    key.dedup();
                    if seen.insert(key) {
                        cycles.push(cycle);
                    }
                }
                return;
            }
            None => {}
        }
        marks.insert(node, Mark::OnStack);
        stack.push(node);
        if let Some(deps) = graph.get(node) {
            for dep in deps {
                visit(dep, graph, marks, stack, cycles, seen);
            }
        }
        stack.pop();
        marks.insert(node, Mark::Done);
    }

    for d in descriptions {
        visit(
            d.name.as_str(),
            &graph,
            &mut marks,
            &mut stack,
            &mut cycles,
            &mut seen_cycles,
        );
    }

    cycles
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_abi::manifest::{BindingPolicy, Cardinality, ConfigurationPolicy, PolicyOption, ReferenceDescription};

    fn component(name: &str, interfaces: &[&str], requires: &[&str]) -> ComponentDescription {
        ComponentDescription {
            name: name.to_owned(),
            implementation: format!("{name}Impl"),
            interfaces: interfaces.iter().map(|s| s.to_string()).collect(),
            enabled: true,
            immediate: true,
            configuration_policy: ConfigurationPolicy::Ignore,
            references: requires
                .iter()
                .map(|interface| ReferenceDescription {
                    name: interface.to_string(),
                    interface: interface.to_string(),
                    cardinality: Cardinality::OneToOne,
                    policy: BindingPolicy::Static,
                    policy_option: PolicyOption::Reluctant,
                    target: None,
                })
                .collect(),
        }
    }

    #[test]
    fn no_cycle_in_linear_chain() {
        let descriptions = vec![
            component("A", &["IA"], &[]),
            component("B", &["IB"], &["IA"]),
            component("C", &["IC"], &["IB"]),
        ];
        assert!(detect_cycles(&descriptions).is_empty());
    }

    #[test]
    fn detects_two_node_cycle() {
        let descriptions = vec![component("A", &["IA"], &["IB"]), component("B", &["IB"], &["IA"])];
        let cycles = detect_cycles(&descriptions);
        assert_eq!(cycles.len(), 1);
    }

    #[test]
    fn optional_reference_does_not_count_as_an_edge() {
        let mut b = component("B", &["IB"], &["IA"]);
        b.references[0].cardinality = Cardinality::ZeroToOne;
        let descriptions = vec![component("A", &["IA"], &["IB"]), b];
        assert!(detect_cycles(&descriptions).is_empty());
    }
}

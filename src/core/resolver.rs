//! Reference resolution and dependency DAG construction.
//!
//! Collects the edges implied by property references and explicit
//! `depends_on` addresses, rejects self-references and unknown addresses, and
//! computes a topological order using Kahn's algorithm with deterministic
//! (alphabetical) tie-breaking. Leftover nodes that can reach themselves form the cycle.

use super::builder::Stack;
use super::error::SynthesisError;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Resolve every reference in `stack` and return addressable nodes in
/// dependency order.
pub fn build_reference_order(stack: &Stack) -> Result<Vec<String>, SynthesisError> {
    let order = stack.walk();

    let mut in_degree: HashMap<String, usize> = HashMap::new();
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    for id in &order {
        if let Some(address) = stack.node(*id).and_then(|n| n.address()) {
            in_degree.insert(address.clone(), 0);
            adjacency.insert(address, Vec::new());
        }
    }

    for id in &order {
        let Some(node) = stack.node(*id) else {
            continue;
        };
        if node.kind().block().is_none() {
            continue;
        }
        let own = node.address();

        let mut targets: Vec<(String, String)> = Vec::new();
        for value in node.properties().values() {
            value.for_each_reference(&mut |r| {
                targets.push((r.address().to_string(), r.to_string()));
            });
        }
        for dep in node.depends_on() {
            targets.push((dep.clone(), dep.clone()));
        }

        for (address, reference) in targets {
            if own.as_deref() == Some(address.as_str()) {
                return Err(SynthesisError::SelfReference {
                    path: node.path().to_string(),
                    reference,
                });
            }
            let Some(edges) = adjacency.get_mut(&address) else {
                return Err(SynthesisError::UnresolvedReference {
                    path: node.path().to_string(),
                    address,
                });
            };
            // Providers are never referenced, so they cannot close a cycle.
            let Some(dependent) = own.as_ref() else {
                continue;
            };
            if !edges.contains(dependent) {
                edges.push(dependent.clone());
                if let Some(d) = in_degree.get_mut(dependent) {
                    *d += 1;
                }
            }
        }
    }

    // Kahn's algorithm with sorted tie-breaking
    let mut zero_degree: Vec<String> = in_degree
        .iter()
        .filter(|(_, &d)| d == 0)
        .map(|(a, _)| a.clone())
        .collect();
    zero_degree.sort();
    let mut queue: VecDeque<String> = zero_degree.into();

    let mut resolved = Vec::new();
    while let Some(current) = queue.pop_front() {
        let mut next_ready: Vec<String> = Vec::new();
        for neighbor in adjacency.get(&current).into_iter().flatten() {
            if let Some(degree) = in_degree.get_mut(neighbor) {
                *degree -= 1;
                if *degree == 0 {
                    next_ready.push(neighbor.clone());
                }
            }
        }
        resolved.push(current);
        next_ready.sort();
        queue.extend(next_ready);
    }

    if resolved.len() != in_degree.len() {
        let done: BTreeSet<&String> = resolved.iter().collect();
        let pending: BTreeSet<&String> = in_degree.keys().filter(|a| !done.contains(a)).collect();
        let members = pending
            .iter()
            .filter(|a| on_cycle(&adjacency, &pending, a))
            .map(|a| (*a).clone())
            .collect();
        return Err(SynthesisError::ReferenceCycle { members });
    }

    Ok(resolved)
}

/// True if `start` can reach itself through unresolved nodes. Nodes that
/// merely depend on a cycle are left out.
fn on_cycle(
    adjacency: &HashMap<String, Vec<String>>,
    pending: &BTreeSet<&String>,
    start: &String,
) -> bool {
    let mut seen: HashSet<&String> = HashSet::new();
    let mut stack: Vec<&String> = adjacency.get(start).into_iter().flatten().collect();
    while let Some(current) = stack.pop() {
        if current == start {
            return true;
        }
        if !pending.contains(current) || !seen.insert(current) {
            continue;
        }
        stack.extend(adjacency.get(current).into_iter().flatten());
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::App;
    use crate::core::types::{props, Properties, Reference};

    fn empty_stack() -> Stack {
        App::new().create_stack("stack").unwrap()
    }

    #[test]
    fn test_resolver_empty_stack() {
        let stack = empty_stack();
        assert!(build_reference_order(&stack).unwrap().is_empty());
    }

    #[test]
    fn test_resolver_linear() {
        let mut stack = empty_stack();
        let root = stack.root();
        let img = stack.add_resource(root, "docker_image", "img", Properties::new()).unwrap();
        let name = stack.reference(img, "name").unwrap();
        let ctr = stack
            .add_resource(root, "docker_container", "ctr", props([("image", name)]))
            .unwrap();
        let vol = stack.add_resource(root, "docker_volume", "vol", Properties::new()).unwrap();
        stack.add_dependency(vol, ctr).unwrap();
        let order = build_reference_order(&stack).unwrap();
        assert_eq!(
            order,
            vec!["docker_image.img", "docker_container.ctr", "docker_volume.vol"]
        );
    }

    #[test]
    fn test_resolver_parallel_alphabetical() {
        let mut stack = empty_stack();
        let root = stack.root();
        stack.add_resource(root, "docker_network", "beta", Properties::new()).unwrap();
        stack.add_resource(root, "docker_network", "alpha", Properties::new()).unwrap();
        let order = build_reference_order(&stack).unwrap();
        assert_eq!(order, vec!["docker_network.alpha", "docker_network.beta"]);
    }

    #[test]
    fn test_resolver_data_source_reference() {
        let mut stack = empty_stack();
        let root = stack.root();
        let remote = stack
            .add_data_source(root, "docker_registry_image", "app", Properties::new())
            .unwrap();
        let digest = stack.reference(remote, "sha256_digest").unwrap();
        stack
            .add_resource(root, "docker_image", "app", props([("pull_triggers", vec![digest].into())]))
            .unwrap();
        let order = build_reference_order(&stack).unwrap();
        assert_eq!(order, vec!["data.docker_registry_image.app", "docker_image.app"]);
    }

    #[test]
    fn test_resolver_self_reference() {
        let mut stack = empty_stack();
        let root = stack.root();
        let own = Reference::parse("docker_image.img.name").unwrap();
        stack
            .add_resource(root, "docker_image", "img", props([("name", own.into())]))
            .unwrap();
        let err = build_reference_order(&stack).unwrap_err();
        assert_eq!(
            err,
            SynthesisError::SelfReference {
                path: "stack/img".to_string(),
                reference: "docker_image.img.name".to_string()
            }
        );
    }

    #[test]
    fn test_resolver_unresolved() {
        let mut stack = empty_stack();
        let root = stack.root();
        let ghost = Reference::parse("docker_image.ghost.name").unwrap();
        stack
            .add_resource(root, "docker_container", "ctr", props([("image", ghost.into())]))
            .unwrap();
        let err = build_reference_order(&stack).unwrap_err();
        assert!(matches!(err, SynthesisError::UnresolvedReference { ref address, .. } if address == "docker_image.ghost"));
    }

    #[test]
    fn test_resolver_unresolved_dependency_address() {
        let mut stack = empty_stack();
        let root = stack.root();
        let ctr = stack.add_resource(root, "docker_container", "ctr", Properties::new()).unwrap();
        stack.add_dependency_address(ctr, "docker_network.missing").unwrap();
        assert!(matches!(
            build_reference_order(&stack),
            Err(SynthesisError::UnresolvedReference { .. })
        ));
    }

    #[test]
    fn test_resolver_cycle() {
        let mut stack = empty_stack();
        let root = stack.root();
        let a_ref = Reference::parse("docker_network.b.id").unwrap();
        let a = stack
            .add_resource(root, "docker_network", "a", props([("peer", a_ref.into())]))
            .unwrap();
        let b = stack.add_resource(root, "docker_network", "b", Properties::new()).unwrap();
        stack.add_dependency(b, a).unwrap();
        let err = build_reference_order(&stack).unwrap_err();
        assert_eq!(
            err,
            SynthesisError::ReferenceCycle {
                members: vec!["docker_network.a".to_string(), "docker_network.b".to_string()]
            }
        );
    }

    #[test]
    fn test_resolver_cycle_excludes_dependents() {
        let mut stack = empty_stack();
        let root = stack.root();
        let a = stack.add_resource(root, "docker_network", "a", Properties::new()).unwrap();
        let b = stack.add_resource(root, "docker_network", "b", Properties::new()).unwrap();
        let c = stack.add_resource(root, "docker_network", "c", Properties::new()).unwrap();
        stack.add_dependency(a, b).unwrap();
        stack.add_dependency(b, a).unwrap();
        stack.add_dependency(c, a).unwrap();
        let err = build_reference_order(&stack).unwrap_err();
        assert_eq!(
            err,
            SynthesisError::ReferenceCycle {
                members: vec!["docker_network.a".to_string(), "docker_network.b".to_string()]
            }
        );
    }

    #[test]
    fn test_resolver_provider_references_resource() {
        let mut stack = empty_stack();
        let root = stack.root();
        let net = stack.add_resource(root, "docker_network", "net", Properties::new()).unwrap();
        let id = stack.reference(net, "id").unwrap();
        stack.add_provider(root, "docker", "docker", props([("network", id)])).unwrap();
        assert_eq!(build_reference_order(&stack).unwrap(), vec!["docker_network.net"]);
    }
}

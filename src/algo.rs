use std::collections::{BTreeSet, VecDeque};

use ahash::{AHashMap, AHashSet};

use crate::{errors::OrmGraphError, graph::GraphView};

pub fn connected_components<G: GraphView>(graph: &G) -> Vec<Vec<G::Vertex>> {
    let mut components = Vec::new();
    let mut visited = AHashSet::new();
    for id in graph.vertices() {
        if !visited.insert(id) {
            continue;
        }
        let mut queue = VecDeque::new();
        queue.push_back(id);
        let mut component = Vec::new();
        while let Some(node) = queue.pop_front() {
            component.push(node);
            for next in graph.outgoing_neighbours(node) {
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
            for prev in graph.incoming_neighbours(node) {
                if visited.insert(prev) {
                    queue.push_back(prev);
                }
            }
        }
        component.sort();
        components.push(component);
    }
    components.sort_by(|a, b| a[0].cmp(&b[0]));
    components
}

pub fn find_cycles_limited<G: GraphView>(graph: &G, limit: usize) -> Vec<Vec<G::Vertex>> {
    if limit == 0 {
        return Vec::new();
    }
    let all_ids = graph.vertices();
    let max_len = all_ids.len();
    let mut cycles = Vec::new();
    for &start in &all_ids {
        let mut stack = vec![(start, vec![start])];
        while let Some((node, path)) = stack.pop() {
            for next in graph.outgoing_neighbours(node) {
                if next == start {
                    let mut cycle = path.clone();
                    cycle.push(start);
                    cycles.push(cycle);
                    if cycles.len() >= limit {
                        return normalize_cycles(cycles);
                    }
                    continue;
                }
                if path.contains(&next) || path.len() >= max_len {
                    continue;
                }
                let mut new_path = path.clone();
                new_path.push(next);
                stack.push((next, new_path));
            }
        }
    }
    normalize_cycles(cycles)
}

fn normalize_cycles<V: Ord + Clone>(mut cycles: Vec<Vec<V>>) -> Vec<Vec<V>> {
    for cycle in cycles.iter_mut() {
        // drop the closing repeat, rotate so smallest node first, then close again
        cycle.pop();
        if let Some((min_idx, _)) = cycle.iter().enumerate().min_by_key(|(_, value)| *value) {
            cycle.rotate_left(min_idx);
        }
        if let Some(first) = cycle.first().cloned() {
            cycle.push(first);
        }
    }
    cycles.sort();
    cycles.dedup();
    cycles
}

/// Kahn ordering. Ties are broken by the position in `graph.vertices()`, so the
/// result is deterministic. Fails with the labels of the vertices that sit on
/// or between cycles when no order exists.
pub fn topological_sort<G: GraphView>(graph: &G) -> Result<Vec<G::Vertex>, OrmGraphError> {
    let vertices = graph.vertices();
    let position: AHashMap<G::Vertex, usize> =
        vertices.iter().enumerate().map(|(i, v)| (*v, i)).collect();
    let mut in_degree: Vec<usize> = vec![0; vertices.len()];
    let mut outgoing: Vec<Vec<usize>> = Vec::with_capacity(vertices.len());
    for vertex in &vertices {
        let targets: Vec<usize> = graph
            .outgoing_neighbours(*vertex)
            .into_iter()
            .filter_map(|n| position.get(&n).copied())
            .collect();
        for target in &targets {
            in_degree[*target] += 1;
        }
        outgoing.push(targets);
    }

    let mut ready: BTreeSet<usize> = (0..vertices.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut order = Vec::with_capacity(vertices.len());
    while let Some(next) = ready.pop_first() {
        order.push(vertices[next]);
        for target in &outgoing[next] {
            in_degree[*target] -= 1;
            if in_degree[*target] == 0 {
                ready.insert(*target);
            }
        }
    }
    if order.len() == vertices.len() {
        return Ok(order);
    }

    let mut remaining: BTreeSet<usize> = (0..vertices.len())
        .filter(|i| in_degree[*i] > 0)
        .collect();
    // prune vertices that only hang off a cycle
    loop {
        let sinks: Vec<usize> = remaining
            .iter()
            .copied()
            .filter(|v| !outgoing[*v].iter().any(|t| remaining.contains(t)))
            .collect();
        if sinks.is_empty() {
            break;
        }
        for sink in sinks {
            remaining.remove(&sink);
        }
    }
    Err(OrmGraphError::cyclic(
        remaining.into_iter().map(|i| graph.vertex_label(vertices[i])),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Edges(Vec<(u32, u32)>, u32);

    impl GraphView for Edges {
        type Vertex = u32;

        fn vertices(&self) -> Vec<u32> {
            (0..self.1).collect()
        }

        fn outgoing_neighbours(&self, vertex: u32) -> Vec<u32> {
            self.0.iter().filter(|(a, _)| *a == vertex).map(|(_, b)| *b).collect()
        }

        fn incoming_neighbours(&self, vertex: u32) -> Vec<u32> {
            self.0.iter().filter(|(_, b)| *b == vertex).map(|(a, _)| *a).collect()
        }

        fn vertex_label(&self, vertex: u32) -> String {
            format!("v{vertex}")
        }
    }

    #[test]
    fn test_topological_sort_is_stable() {
        let graph = Edges(vec![(2, 0), (3, 1)], 4);
        let order = topological_sort(&graph).expect("acyclic");
        assert_eq!(order, vec![2, 0, 3, 1]);
    }

    #[test]
    fn test_cycle_lists_only_participants() {
        let graph = Edges(vec![(0, 1), (1, 2), (2, 1), (2, 3)], 4);
        match topological_sort(&graph) {
            Err(OrmGraphError::CyclicDependency(labels)) => {
                assert_eq!(labels, vec!["v1".to_string(), "v2".to_string()])
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn test_cycles_are_normalized() {
        let graph = Edges(vec![(1, 2), (2, 1), (3, 3)], 4);
        let cycles = find_cycles_limited(&graph, 10);
        assert_eq!(cycles, vec![vec![1, 2, 1], vec![3, 3]]);
        assert_eq!(connected_components(&graph), vec![vec![0], vec![1, 2], vec![3]]);
    }
}

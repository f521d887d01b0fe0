use std::collections::BTreeSet;

fn adjacency(vertex_count: usize, edges: &[(usize, usize)]) -> Vec<Vec<usize>> {
    let mut links = vec![Vec::new(); vertex_count];
    for &(a, b) in edges {
        if a >= vertex_count || b >= vertex_count || a == b {
            continue;
        }
        if !links[a].contains(&b) {
            links[a].push(b);
        }
        if !links[b].contains(&a) {
            links[b].push(a);
        }
    }
    links
}

/// Flood-fill the vertex/edge graph into islands.
///
/// Components come out in the order their lowest vertex index is first seen.
/// Isolated vertices form single-vertex islands. Edges referencing vertices
/// outside `0..vertex_count` are ignored.
pub fn connected_components(vertex_count: usize, edges: &[(usize, usize)]) -> Vec<BTreeSet<usize>> {
    let links = adjacency(vertex_count, edges);
    let mut seen = vec![false; vertex_count];
    let mut components = Vec::new();

    for start in 0..vertex_count {
        if seen[start] {
            continue;
        }
        let mut component = BTreeSet::new();
        let mut stack = vec![start];
        seen[start] = true;
        while let Some(v) = stack.pop() {
            component.insert(v);
            for &next in &links[v] {
                if !seen[next] {
                    seen[next] = true;
                    stack.push(next);
                }
            }
        }
        components.push(component);
    }

    components
}

/// Like [`connected_components`], but each island lists its vertices in link
/// order.
///
/// The walk starts at an endpoint (a vertex with one link) that leads its
/// edge when there is one, otherwise at the lowest vertex, and follows edges
/// in the order they were given. A polyline stored as `0-1, 1-2, ...` therefore keeps
/// its direction. The flag is true for islands that form a simple cycle.
pub fn sorted_islands(vertex_count: usize, edges: &[(usize, usize)]) -> Vec<(Vec<usize>, bool)> {
    let links = adjacency(vertex_count, edges);
    let mut islands = Vec::new();

    for component in connected_components(vertex_count, edges) {
        let is_endpoint = |v: usize| links[v].len() == 1;
        let start = component
            .iter()
            .copied()
            .find(|&v| is_endpoint(v) && edges.iter().any(|&(a, _)| a == v))
            .or_else(|| component.iter().copied().find(|&v| is_endpoint(v)))
            .or_else(|| component.iter().next().copied());
        let Some(start) = start else {
            continue;
        };

        let mut order = Vec::with_capacity(component.len());
        let mut visited = BTreeSet::new();
        let mut stack = vec![start];
        while let Some(v) = stack.pop() {
            if !visited.insert(v) {
                continue;
            }
            order.push(v);
            // reversed so the first listed neighbour is walked first
            for &next in links[v].iter().rev() {
                if !visited.contains(&next) {
                    stack.push(next);
                }
            }
        }

        let is_cycle =
            component.len() > 2 && component.iter().all(|&v| links[v].len() == 2);
        islands.push((order, is_cycle));
    }

    islands
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_disjoint_triangles() {
        let edges = [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)];
        let components = connected_components(6, &edges);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0], BTreeSet::from([0, 1, 2]));
        assert_eq!(components[1], BTreeSet::from([3, 4, 5]));
    }

    #[test]
    fn test_isolated_vertex_is_its_own_island() {
        let components = connected_components(3, &[(0, 1)]);
        assert_eq!(components.len(), 2);
        assert_eq!(components[1], BTreeSet::from([2]));
    }

    #[test]
    fn test_sorted_island_keeps_polyline_direction() {
        // polyline 3 -> 1 -> 0 -> 2, stored out of index order
        let edges = [(3, 1), (1, 0), (0, 2)];
        let islands = sorted_islands(4, &edges);
        assert_eq!(islands.len(), 1);
        let (order, is_cycle) = &islands[0];
        assert!(!is_cycle);
        assert_eq!(order, &vec![3, 1, 0, 2]);
    }

    #[test]
    fn test_sorted_island_ring() {
        let edges = [(0, 1), (1, 2), (2, 3), (3, 0)];
        let islands = sorted_islands(4, &edges);
        assert_eq!(islands, vec![(vec![0, 1, 2, 3], true)]);
    }
}

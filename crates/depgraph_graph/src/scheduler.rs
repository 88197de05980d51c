//! Schedule computation — topological order and wavefront stages.
//!
//! Operations are indexed 0..n in the graph's flat schedule table; edges are
//! adjacency lists over those indices. The scheduler produces wavefront
//! stages: every operation in a stage depends only on operations in earlier
//! stages, so a stage's operations are free to run in parallel. Flattening
//! the stages yields a valid topological order.

use tracing::warn;

/// One wavefront: operations with no dependencies among themselves.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Indices into the graph's schedule table.
    pub ops: Vec<usize>,
}

/// Compute wavefront stages for `count` operations under `edges`.
///
/// `edges[i]` lists the operations that depend on operation `i`. A
/// dependency cycle cannot be scheduled; the operations caught in one are
/// reported and appended as a trailing stage so the build stays total —
/// their relative order is then meaningless, which matches the garbage-in
/// nature of a cyclic build.
#[must_use]
pub fn compute_stages(count: usize, edges: &[Vec<usize>]) -> Vec<Stage> {
    debug_assert_eq!(edges.len(), count);
    if count == 0 {
        return Vec::new();
    }

    let mut indegree = vec![0usize; count];
    for targets in edges {
        for &t in targets {
            indegree[t] += 1;
        }
    }

    let mut stages = Vec::new();
    let mut frontier: Vec<usize> = (0..count).filter(|&i| indegree[i] == 0).collect();
    let mut scheduled = 0usize;

    while !frontier.is_empty() {
        frontier.sort_unstable();
        let mut next = Vec::new();
        for &i in &frontier {
            for &t in &edges[i] {
                indegree[t] -= 1;
                if indegree[t] == 0 {
                    next.push(t);
                }
            }
        }
        scheduled += frontier.len();
        stages.push(Stage { ops: frontier });
        frontier = next;
    }

    if scheduled < count {
        let stuck: Vec<usize> = (0..count).filter(|&i| indegree[i] > 0).collect();
        warn!(
            ops = stuck.len(),
            "dependency cycle detected, scheduling affected operations last"
        );
        stages.push(Stage { ops: stuck });
    }

    stages
}

/// Flatten stages into a topological order over the schedule table.
#[must_use]
pub fn topological_order(stages: &[Stage]) -> Vec<usize> {
    stages.iter().flat_map(|stage| stage.ops.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_graph_has_no_stages() {
        assert!(compute_stages(0, &[]).is_empty());
    }

    #[test]
    fn test_chain_produces_one_stage_per_op() {
        // 0 → 1 → 2
        let edges = vec![vec![1], vec![2], vec![]];
        let stages = compute_stages(3, &edges);
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0].ops, vec![0]);
        assert_eq!(stages[1].ops, vec![1]);
        assert_eq!(stages[2].ops, vec![2]);
    }

    #[test]
    fn test_diamond_middle_ops_share_a_stage() {
        // 0 → {1, 2} → 3
        let edges = vec![vec![1, 2], vec![3], vec![3], vec![]];
        let stages = compute_stages(4, &edges);
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[1].ops, vec![1, 2]);
    }

    #[test]
    fn test_independent_ops_share_the_first_stage() {
        let edges = vec![vec![], vec![], vec![]];
        let stages = compute_stages(3, &edges);
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].ops, vec![0, 1, 2]);
    }

    #[test]
    fn test_cycle_is_scheduled_last() {
        // 0 → 1, then 1 ⇄ 2 cycle.
        let edges = vec![vec![1], vec![2], vec![1]];
        let stages = compute_stages(3, &edges);
        let order = topological_order(&stages);
        assert_eq!(order.len(), 3, "every op must still be scheduled");
        assert_eq!(stages[0].ops, vec![0]);
        let last = &stages[stages.len() - 1].ops;
        assert!(last.contains(&1) && last.contains(&2));
    }

    #[test]
    fn test_topological_order_respects_edges() {
        let edges = vec![vec![2], vec![2], vec![3], vec![]];
        let stages = compute_stages(4, &edges);
        let order = topological_order(&stages);
        let pos = |i: usize| order.iter().position(|&x| x == i).expect("scheduled");
        assert!(pos(0) < pos(2));
        assert!(pos(1) < pos(2));
        assert!(pos(2) < pos(3));
    }
}

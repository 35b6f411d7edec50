//! Union-find (disjoint set union) used while selecting spanning tree edges.
//!
//! The structure lives for one tree construction call. `find` compresses
//! paths; `union` attaches the lower-ranked root beneath the higher-ranked
//! one, and on equal ranks attaches the second root beneath the first.

#[derive(Clone, Debug)]
pub(crate) struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
    components: usize,
}

impl DisjointSet {
    pub(crate) fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
            components: n,
        }
    }

    pub(crate) fn components(&self) -> usize {
        self.components
    }

    pub(crate) fn find(&mut self, mut node: usize) -> usize {
        let mut root = node;
        while self.parent[root] != root {
            root = self.parent[root];
        }

        while self.parent[node] != node {
            let parent = self.parent[node];
            self.parent[node] = root;
            node = parent;
        }

        root
    }

    /// Merges the sets containing `left` and `right`.
    ///
    /// Returns `false` when both already share a root.
    pub(crate) fn union(&mut self, left: usize, right: usize) -> bool {
        let mut left = self.find(left);
        let mut right = self.find(right);
        if left == right {
            return false;
        }
        let left_rank = self.rank[left];
        let right_rank = self.rank[right];
        if left_rank < right_rank {
            std::mem::swap(&mut left, &mut right);
        }
        self.parent[right] = left;
        if left_rank == right_rank {
            self.rank[left] = left_rank.saturating_add(1);
        }
        self.components -= 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::DisjointSet;

    #[rstest]
    fn starts_with_singletons() {
        let mut sets = DisjointSet::new(4);
        assert_eq!(sets.components(), 4);
        for node in 0..4 {
            assert_eq!(sets.find(node), node);
        }
    }

    #[rstest]
    fn equal_ranks_attach_second_root_under_first() {
        let mut sets = DisjointSet::new(2);
        assert!(sets.union(0, 1));
        assert_eq!(sets.find(1), 0);
        assert_eq!(sets.rank[0], 1);
        assert_eq!(sets.components(), 1);
    }

    #[rstest]
    fn lower_rank_root_moves_under_higher_rank() {
        let mut sets = DisjointSet::new(3);
        assert!(sets.union(1, 2));
        // {1, 2} has rank 1; the singleton {0} joins beneath it.
        assert!(sets.union(0, 1));
        assert_eq!(sets.find(0), 1);
        assert_eq!(sets.rank[1], 1);
    }

    #[rstest]
    fn rejects_redundant_unions() {
        let mut sets = DisjointSet::new(3);
        assert!(sets.union(0, 1));
        assert!(sets.union(1, 2));
        assert!(!sets.union(0, 2));
        assert_eq!(sets.components(), 1);
    }

    #[rstest]
    fn find_compresses_paths() {
        let mut sets = DisjointSet::new(4);
        sets.union(0, 1);
        sets.union(2, 3);
        sets.union(0, 2);
        assert_eq!(sets.find(3), 0);
        assert_eq!(sets.parent[3], 0);
    }
}

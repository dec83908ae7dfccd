//! Implementation of kd-tree creation and querying over (mz, rt, ook0).
//!
//! A batch of records is built into a balanced tree by repeatedly splitting at the median of
//! the axis `depth % 3`. Single records added afterwards are threaded down to an empty child
//! slot without any rebalancing, so a long run of incremental inserts can leave the tree
//! lopsided; `rebuild_after` (or an explicit [`KdTree::rebuild`]) restores the balanced shape.
//!
//! Every traversal uses an explicit stack, so depth is bounded only by memory.
use log::{debug, trace};

use crate::boundary::Boundary;
use crate::data::Psm;
use crate::error::{Error, Result};
use crate::index::PsmIndex;
use crate::node::{split_axis, Attach, KdNode, Point, Side, K};

#[derive(Debug, Clone, Default)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    root: Option<usize>,
    rebuild_after: Option<usize>,
    inserted_since_build: usize,
}

impl KdTree {

    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(n)` rebuilds the whole tree once `n` records have been added one at a time since
    /// the last build. `None` never rebuilds on its own.
    pub fn with_rebuild_after(rebuild_after: Option<usize>) -> Self {
        Self {
            rebuild_after,
            ..Self::default()
        }
    }

    pub fn from_psms(psms: Vec<Psm>) -> Self {
        let mut tree = Self::new();
        tree.bulk_load(psms);
        tree
    }

    /// Relinks every node into a median-split tree. O(n log^2 n).
    pub fn rebuild(&mut self) {

        for node in self.nodes.iter_mut() {
            node.left = None;
            node.right = None;
        }
        self.root = None;
        self.inserted_since_build = 0;

        let mut order: Vec<usize> = (0..self.nodes.len()).collect();

        // (start, end, depth, where the median of order[start..end] hangs)
        let mut to_visit: Vec<(usize, usize, usize, Attach)> = vec![(0, order.len(), 0, Attach::Root)];

        while let Some((start, end, depth, attach)) = to_visit.pop() {

            if start >= end {
                continue;
            }

            let axis = split_axis(depth);
            let nodes = &self.nodes;
            order[start..end].sort_by(|a, b| nodes[*a].point[axis].total_cmp(&nodes[*b].point[axis]));

            let mid = start + (end - start) / 2;
            let index = order[mid];

            match attach {
                Attach::Root => self.root = Some(index),
                Attach::Child(parent, side) => self.nodes[parent].set_child(side, Some(index)),
            }

            to_visit.push((start, mid, depth + 1, Attach::Child(index, Side::Left)));
            to_visit.push((mid + 1, end, depth + 1, Attach::Child(index, Side::Right)));
        }

        debug!("rebuilt kd tree over {} records, depth {}", self.nodes.len(), self.depth());
    }

    /// Number of nodes on the longest root-to-leaf path
    pub fn depth(&self) -> usize {

        let mut deepest = 0;
        let mut to_visit: Vec<(usize, usize)> = self.root.map(|root| (root, 1)).into_iter().collect();

        while let Some((index, level)) = to_visit.pop() {
            deepest = deepest.max(level);
            let node = &self.nodes[index];
            for child in [node.left, node.right].into_iter().flatten() {
                to_visit.push((child, level + 1));
            }
        }

        deepest
    }

    /// Descends from the root, ties going left, and hangs the new node in the first empty slot.
    fn insert(&mut self, psm: Psm) {

        let index = self.nodes.len();
        self.nodes.push(KdNode::new(psm));

        let mut current = match self.root {
            None => {
                self.root = Some(index);
                return;
            }
            Some(root) => root,
        };

        let point = self.nodes[index].point;
        let mut depth = 0;

        loop {
            let axis = split_axis(depth);
            let side = match point[axis] <= self.nodes[current].point[axis] {
                true => Side::Left,
                false => Side::Right,
            };

            match self.nodes[current].child(side) {
                Some(next) => {
                    current = next;
                    depth += 1;
                }
                None => {
                    self.nodes[current].set_child(side, Some(index));
                    break;
                }
            }
        }
    }

    /// Returns indices of nodes inside `bounds` and how many nodes were visited.
    ///
    /// A node whose split coordinate is above the box only sends the search left, one below the
    /// box only sends it right, and one inside sends it both ways.
    fn bounded(&self, bounds: &[Boundary; K]) -> (Vec<usize>, usize) {

        let mut found = Vec::new();
        let mut visited = 0;
        let mut to_visit: Vec<(usize, usize)> = self.root.map(|root| (root, 0)).into_iter().collect();

        while let Some((index, depth)) = to_visit.pop() {

            visited += 1;
            let node = &self.nodes[index];

            if node.within(bounds) {
                found.push(index);
            }

            let axis = split_axis(depth);
            let value = node.point[axis];
            let bound = &bounds[axis];

            if value > bound.upper {
                to_visit.extend(node.left.map(|child| (child, depth + 1)));
            } else if value < bound.lower {
                to_visit.extend(node.right.map(|child| (child, depth + 1)));
            } else {
                to_visit.extend(node.left.map(|child| (child, depth + 1)));
                to_visit.extend(node.right.map(|child| (child, depth + 1)));
            }
        }

        trace!("kd range query visited {} of {} nodes", visited, self.nodes.len());

        (found, visited)
    }

    /// Index of the node closest (euclidean) to `point`
    fn nearest(&self, point: &Point) -> Option<usize> {

        let mut best: Option<(f64, usize)> = None;

        // third element: squared distance from `point` to the splitting plane that was crossed
        let mut to_visit: Vec<(usize, usize, f64)> = self.root.map(|root| (root, 0, 0.0)).into_iter().collect();

        while let Some((index, depth, plane)) = to_visit.pop() {

            if let Some((best_distance, _)) = best {
                if plane >= best_distance {
                    continue;
                }
            }

            let node = &self.nodes[index];
            let distance = node.squared_distance(point);

            let improves = match best {
                None => true,
                Some((best_distance, _)) => distance < best_distance || best_distance.is_nan(),
            };
            if improves {
                best = Some((distance, index));
            }

            let axis = split_axis(depth);
            let delta = node.point[axis] - point[axis];

            let (near, far) = match delta < 0.0 {
                true => (node.right, node.left),
                false => (node.left, node.right),
            };

            to_visit.extend(far.map(|child| (child, depth + 1, delta * delta)));
            to_visit.extend(near.map(|child| (child, depth + 1, 0.0)));
        }

        best.map(|(_, index)| index)
    }

    fn exact_bounds(mz: f64, rt: f64, ook0: f64) -> [Boundary; K] {
        [Boundary::new(mz, mz), Boundary::new(rt, rt), Boundary::new(ook0, ook0)]
    }
}

impl PsmIndex for KdTree {

    fn add(&mut self, psm: Psm) {

        self.insert(psm);
        self.inserted_since_build += 1;

        if let Some(limit) = self.rebuild_after {
            if self.inserted_since_build >= limit {
                self.rebuild();
            }
        }
    }

    /// Appends the batch to the arena and rebuilds from scratch.
    fn bulk_load(&mut self, psms: Vec<Psm>) {
        let psms = self.order_for_bulk_load(psms);
        self.nodes.extend(psms.into_iter().map(KdNode::new));
        self.rebuild();
    }

    /// Drops the node from the arena and rebuilds everything, so this is O(n log^2 n) rather
    /// than the logarithmic cost of the other operations.
    fn remove(&mut self, psm: &Psm) -> Result<()> {

        let bounds = Self::exact_bounds(psm.mz, psm.rt, psm.ook0);
        let (candidates, _) = self.bounded(&bounds);

        let index = candidates
            .into_iter()
            .find(|index| self.nodes[*index].psm == *psm)
            .ok_or_else(|| Error::NotFound(format!("record {}", psm)))?;

        self.nodes.swap_remove(index);
        self.rebuild();

        Ok(())
    }

    fn get(&self, mz: f64, rt: f64, ook0: f64) -> Result<Vec<Psm>> {

        let nearest = self
            .nearest(&[mz, rt, ook0])
            .ok_or_else(|| Error::NotFound(format!("no record at ({}, {}, {})", mz, rt, ook0)))?;

        if !self.nodes[nearest].psm.is_at(mz, rt, ook0) {
            return Err(Error::NotFound(format!("no record at ({}, {}, {})", mz, rt, ook0)));
        }

        let (found, _) = self.bounded(&Self::exact_bounds(mz, rt, ook0));

        Ok(found.into_iter().map(|index| self.nodes[index].psm.clone()).collect())
    }

    fn range_search(&self, mz: &Boundary, rt: &Boundary, ook0: &Boundary) -> Vec<Psm> {
        let (found, _) = self.bounded(&[*mz, *rt, *ook0]);
        found.into_iter().map(|index| self.nodes[index].psm.clone()).collect()
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.inserted_since_build = 0;
    }

    fn all_records(&self) -> Vec<Psm> {
        self.nodes.iter().map(|node| node.psm.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::boundary::{mz_boundary, ook0_boundary, rt_boundary};
    use crate::data::testing::{fixture, psm, random_psm};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Left subtree never exceeds a node on its split axis; right subtree never undercuts it.
    fn assert_kd_invariant(tree: &KdTree) {

        let mut to_visit: Vec<(usize, usize)> = tree.root.map(|root| (root, 0)).into_iter().collect();

        while let Some((index, depth)) = to_visit.pop() {
            let node = &tree.nodes[index];
            let axis = split_axis(depth);

            for (side, child) in [(Side::Left, node.left), (Side::Right, node.right)] {
                let Some(child) = child else { continue };

                let mut subtree = vec![child];
                while let Some(i) = subtree.pop() {
                    let value = tree.nodes[i].point[axis];
                    match side {
                        Side::Left => assert!(value <= node.point[axis]),
                        Side::Right => assert!(value >= node.point[axis]),
                    }
                    subtree.extend(tree.nodes[i].left);
                    subtree.extend(tree.nodes[i].right);
                }

                to_visit.push((child, depth + 1));
            }
        }
    }

    fn random_records(n: usize, seed: u64) -> Vec<Psm> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n).map(|_| random_psm(&mut rng)).collect()
    }

    #[test]
    fn bulk_build_splits_on_median_mz() {
        let tree = KdTree::from_psms(fixture());

        // sorted mz: 1005 1050 1100 1150 1200 2000 3000 5000 -> index 4
        let root = tree.root.unwrap();
        assert_eq!(tree.nodes[root].point[0], 1200.0);
        assert_eq!(tree.len(), 8);
        assert_kd_invariant(&tree);
    }

    #[test]
    fn bulk_build_is_balanced() {
        let tree = KdTree::from_psms(random_records(1000, 7));

        // ceil(log2(1001)) == 10
        assert_eq!(tree.depth(), 10);
        assert_kd_invariant(&tree);
    }

    #[test]
    fn incremental_ties_go_left() {
        let mut tree = KdTree::new();
        tree.add(psm(1, 1000.0, 10.0, 1.0, "A"));
        tree.add(psm(1, 1000.0, 20.0, 1.0, "B"));
        tree.add(psm(1, 1001.0, 20.0, 1.0, "C"));

        let root = &tree.nodes[tree.root.unwrap()];
        assert_eq!(root.left, Some(1));
        assert_eq!(root.right, Some(2));
        assert_kd_invariant(&tree);
    }

    #[test]
    fn incremental_inserts_do_not_rebalance() {
        let mut tree = KdTree::new();
        for i in 0..50 {
            tree.add(psm(1, 1000.0 + i as f64, 100.0 + i as f64, 1.0 + i as f64, "A"));
        }
        assert_eq!(tree.depth(), 50);

        tree.rebuild();
        assert_eq!(tree.depth(), 6);
        assert_kd_invariant(&tree);
    }

    #[test]
    fn rebuild_after_threshold() {
        let mut tree = KdTree::with_rebuild_after(Some(16));
        for i in 0..16 {
            tree.add(psm(1, 1000.0 + i as f64, 100.0 + i as f64, 1.0 + i as f64, "A"));
        }

        assert_eq!(tree.depth(), 5);
        assert_eq!(tree.inserted_since_build, 0);
        assert_eq!(tree.len(), 16);
    }

    #[test]
    fn range_query_prunes() {
        let tree = KdTree::from_psms(random_records(4096, 11));

        let target = &tree.nodes[0].psm;
        let bounds = [
            mz_boundary(target.mz, 5.0),
            rt_boundary(target.rt, 1.0),
            ook0_boundary(target.ook0, 0.01),
        ];

        let (found, visited) = tree.bounded(&bounds);
        assert!(found.contains(&0));
        assert!(visited < tree.len() / 4, "visited {} nodes", visited);
    }

    #[test]
    fn range_query_matches_linear_scan() {
        let records = random_records(2000, 3);
        let mut tree = KdTree::from_psms(records[..1000].to_vec());
        for record in records[1000..].iter().cloned() {
            tree.add(record);
        }

        let mz = mz_boundary(1000.0, 2000.0);
        let rt = rt_boundary(100.0, 40.0);
        let ook0 = ook0_boundary(1.0, 0.05);

        let mut expected: Vec<String> = records
            .iter()
            .filter(|p| p.in_boundary(&mz, &rt, &ook0))
            .map(|p| p.serialize())
            .collect();
        let mut actual: Vec<String> = tree.range_search(&mz, &rt, &ook0).iter().map(|p| p.serialize()).collect();

        expected.sort();
        actual.sort();
        assert!(!expected.is_empty());
        assert_eq!(actual, expected);
    }

    #[test]
    fn nearest_finds_closest() {
        let records = random_records(500, 5);
        let tree = KdTree::from_psms(records.clone());

        for query in [[990.0, 12.0, 0.9], [1025.0, 240.0, 1.2], [1000.0, 125.0, 1.0]] {
            let brute = records
                .iter()
                .map(|p| KdNode::new(p.clone()).squared_distance(&query))
                .fold(f64::INFINITY, f64::min);

            let index = tree.nearest(&query).unwrap();
            assert_eq!(tree.nodes[index].squared_distance(&query), brute);
        }
    }

    #[test]
    fn get_requires_exact_match() {
        let tree = KdTree::from_psms(fixture());

        let found = tree.get(1005.0, 250.0, 0.9).unwrap();
        assert_eq!(found, vec![fixture()[0].clone()]);

        assert!(matches!(tree.get(1005.0, 250.0, 0.91), Err(Error::NotFound(_))));
        assert!(matches!(KdTree::new().get(1.0, 1.0, 1.0), Err(Error::NotFound(_))));
    }

    #[test]
    fn get_returns_every_duplicate() {
        let mut tree = KdTree::from_psms(vec![fixture()[0].clone(), fixture()[0].clone()]);
        tree.add(fixture()[0].clone());

        assert_eq!(tree.get(1005.0, 250.0, 0.9).unwrap().len(), 3);
    }

    #[test]
    fn remove_rebuilds_without_target() {
        let mut tree = KdTree::from_psms(fixture());
        let target = fixture()[3].clone();

        tree.remove(&target).unwrap();

        assert_eq!(tree.len(), 7);
        assert!(!tree.all_records().contains(&target));
        assert_kd_invariant(&tree);
        assert!(matches!(tree.remove(&target), Err(Error::NotFound(_))));
    }

    #[test]
    fn remove_takes_one_duplicate() {
        let record = fixture()[0].clone();
        let mut tree = KdTree::from_psms(vec![record.clone(), record.clone()]);

        tree.remove(&record).unwrap();
        assert_eq!(tree.len(), 1);
        tree.remove(&record).unwrap();
        assert!(tree.is_empty());
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn bulk_load_merges_existing() {
        let mut tree = KdTree::new();
        tree.add(fixture()[0].clone());
        tree.bulk_load(fixture()[1..].to_vec());

        assert_eq!(tree.len(), 8);
        assert_eq!(tree.depth(), 4);
        assert_kd_invariant(&tree);
    }
}

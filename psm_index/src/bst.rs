//! Ordered tree keyed by `f64`, stored in an arena with parent/child links held as indices.
//!
//! One structure covers three balancing disciplines: none (plain binary search tree), AVL and
//! red-black. Each key owns a bucket value. Every node also caches the largest
//! [`Bucket::reach`] found in its subtree, which turns the same tree into an interval tree
//! when buckets hold intervals starting at the key.
//!
//! Buckets are never unlinked on their own. A bucket emptied by a removal stays in place as a
//! vacant node and is reused if its key comes back; once vacant nodes outnumber live ones the
//! arena is rebuilt from the live buckets.

use std::collections::VecDeque;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Balance {
    Plain,
    #[default]
    Avl,
    RedBlack,
}

/// Value stored under each key.
pub trait Bucket: Default {
    /// Largest coordinate covered by the bucket stored under `key`.
    fn reach(&self, key: f64) -> f64;

    fn is_empty(&self) -> bool;
}

const COMPACT_MIN_NODES: usize = 32;

#[derive(Debug, Clone)]
struct Node<V> {
    key: OrderedFloat<f64>,
    value: V,
    left: Option<usize>,
    right: Option<usize>,
    parent: Option<usize>,
    height: usize,
    red: bool,
    max_reach: f64,
}

#[derive(Debug, Clone)]
pub struct Bst<V> {
    nodes: Vec<Node<V>>,
    root: Option<usize>,
    balance: Balance,
    vacant: usize,
}

/// Positions of a sorted slice of length `n` in the order that rebuilds it as a balanced
/// tree under plain insertion: the median first, then the medians of each half, level by level.
pub fn median_first_order(n: usize) -> Vec<usize> {

    let mut order = Vec::with_capacity(n);
    let mut ranges: VecDeque<(usize, usize)> = VecDeque::new();
    ranges.push_back((0, n));

    while let Some((start, end)) = ranges.pop_front() {
        if start >= end {
            continue;
        }
        let mid = start + (end - start) / 2;
        order.push(mid);
        ranges.push_back((start, mid));
        ranges.push_back((mid + 1, end));
    }

    order
}

impl<V: Bucket> Bst<V> {

    pub fn new(balance: Balance) -> Self {
        Self {
            nodes: Vec::new(),
            root: None,
            balance,
            vacant: 0,
        }
    }

    pub fn balance(&self) -> Balance {
        self.balance
    }

    /// Nodes in the arena, vacant ones included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Keys holding a non-empty bucket
    pub fn live_count(&self) -> usize {
        self.nodes.len() - self.vacant
    }

    pub fn height(&self) -> usize {
        self.subtree_height(self.root)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.vacant = 0;
    }

    pub fn get(&self, key: f64) -> Option<&V> {
        self.find(OrderedFloat(key)).map(|index| &self.nodes[index].value)
    }

    /// Applies `f` to the bucket under `key`, creating an empty bucket first if needed.
    pub fn update<R>(&mut self, key: f64, f: impl FnOnce(&mut V) -> R) -> R {
        let index = self.find_or_insert(OrderedFloat(key));
        self.apply(index, f)
    }

    /// Applies `f` to an existing bucket; `None` if `key` was never inserted.
    pub fn modify<R>(&mut self, key: f64, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        let index = self.find(OrderedFloat(key))?;
        let result = self.apply(index, f);
        self.maybe_compact();
        Some(result)
    }

    /// Buckets in arena order, vacant ones included
    pub fn buckets(&self) -> impl Iterator<Item = (f64, &V)> + '_ {
        self.nodes.iter().map(|node| (node.key.0, &node.value))
    }

    /// In-order walk over keys in `[lower, upper]`
    pub fn range(&self, lower: f64, upper: f64) -> Range<'_, V> {

        let lower = OrderedFloat(lower);
        let mut stack = Vec::new();
        let mut cursor = self.root;

        while let Some(index) = cursor {
            let node = &self.nodes[index];
            if node.key >= lower {
                stack.push(index);
                cursor = node.left;
            } else {
                cursor = node.right;
            }
        }

        Range {
            tree: self,
            stack,
            upper: OrderedFloat(upper),
        }
    }

    /// Buckets keyed at or below `point` whose reach is at least `point`.
    ///
    /// Subtrees whose cached reach falls short of `point` are skipped whole.
    pub fn stab(&self, point: f64) -> Vec<(f64, &V)> {

        let at = OrderedFloat(point);
        let mut found = Vec::new();
        let mut to_visit: Vec<usize> = self.root.into_iter().collect();

        while let Some(index) = to_visit.pop() {

            let node = &self.nodes[index];
            if !(node.max_reach >= point) {
                continue;
            }

            if node.key <= at {
                if node.value.reach(node.key.0) >= point {
                    found.push((node.key.0, &node.value));
                }
                to_visit.extend(node.right);
            }
            to_visit.extend(node.left);
        }

        found
    }

    fn find(&self, key: OrderedFloat<f64>) -> Option<usize> {

        let mut cursor = self.root;
        while let Some(index) = cursor {
            let node = &self.nodes[index];
            cursor = match key.cmp(&node.key) {
                std::cmp::Ordering::Equal => return Some(index),
                std::cmp::Ordering::Less => node.left,
                std::cmp::Ordering::Greater => node.right,
            };
        }

        None
    }

    fn apply<R>(&mut self, index: usize, f: impl FnOnce(&mut V) -> R) -> R {

        let was_empty = self.nodes[index].value.is_empty();
        let result = f(&mut self.nodes[index].value);
        let now_empty = self.nodes[index].value.is_empty();

        match (was_empty, now_empty) {
            (true, false) => self.vacant -= 1,
            (false, true) => self.vacant += 1,
            _ => {}
        }

        self.refresh_upwards(index);
        result
    }

    fn find_or_insert(&mut self, key: OrderedFloat<f64>) -> usize {

        let mut parent = None;
        let mut went_left = false;
        let mut cursor = self.root;

        while let Some(index) = cursor {
            let node = &self.nodes[index];
            parent = Some(index);
            cursor = match key.cmp(&node.key) {
                std::cmp::Ordering::Equal => return index,
                std::cmp::Ordering::Less => {
                    went_left = true;
                    node.left
                }
                std::cmp::Ordering::Greater => {
                    went_left = false;
                    node.right
                }
            };
        }

        let index = self.nodes.len();
        let value = V::default();
        let max_reach = value.reach(key.0);
        self.nodes.push(Node {
            key,
            value,
            left: None,
            right: None,
            parent,
            height: 1,
            red: true,
            max_reach,
        });
        self.vacant += 1;

        match parent {
            None => self.root = Some(index),
            Some(p) if went_left => self.nodes[p].left = Some(index),
            Some(p) => self.nodes[p].right = Some(index),
        }

        match self.balance {
            Balance::Plain => self.refresh_upwards(index),
            Balance::Avl => self.rebalance_avl(Some(index)),
            Balance::RedBlack => {
                self.refresh_upwards(index);
                self.fix_red_black(index);
                // rotations can change the heights of ancestors
                self.refresh_upwards(index);
            }
        }

        index
    }

    fn subtree_height(&self, index: Option<usize>) -> usize {
        index.map_or(0, |i| self.nodes[i].height)
    }

    fn subtree_reach(&self, index: Option<usize>) -> f64 {
        index.map_or(f64::NEG_INFINITY, |i| self.nodes[i].max_reach)
    }

    /// Recomputes cached height and reach from the children
    fn refresh(&mut self, index: usize) {
        let (left, right) = (self.nodes[index].left, self.nodes[index].right);
        let height = 1 + self.subtree_height(left).max(self.subtree_height(right));
        let own = self.nodes[index].value.reach(self.nodes[index].key.0);
        let max_reach = own.max(self.subtree_reach(left)).max(self.subtree_reach(right));

        let node = &mut self.nodes[index];
        node.height = height;
        node.max_reach = max_reach;
    }

    fn refresh_upwards(&mut self, index: usize) {
        let mut cursor = Some(index);
        while let Some(i) = cursor {
            self.refresh(i);
            cursor = self.nodes[i].parent;
        }
    }

    fn replace_child(&mut self, parent: Option<usize>, old: usize, new: usize) {
        match parent {
            None => self.root = Some(new),
            Some(p) => {
                if self.nodes[p].left == Some(old) {
                    self.nodes[p].left = Some(new);
                } else {
                    self.nodes[p].right = Some(new);
                }
            }
        }
    }

    /// Lifts the right child of `x` into its place; returns the new subtree root.
    fn rotate_left(&mut self, x: usize) -> usize {

        let Some(y) = self.nodes[x].right else {
            return x;
        };

        let inner = self.nodes[y].left;
        self.nodes[x].right = inner;
        if let Some(inner) = inner {
            self.nodes[inner].parent = Some(x);
        }

        let parent = self.nodes[x].parent;
        self.nodes[y].parent = parent;
        self.replace_child(parent, x, y);

        self.nodes[y].left = Some(x);
        self.nodes[x].parent = Some(y);

        self.refresh(x);
        self.refresh(y);
        y
    }

    /// Lifts the left child of `x` into its place; returns the new subtree root.
    fn rotate_right(&mut self, x: usize) -> usize {

        let Some(y) = self.nodes[x].left else {
            return x;
        };

        let inner = self.nodes[y].right;
        self.nodes[x].left = inner;
        if let Some(inner) = inner {
            self.nodes[inner].parent = Some(x);
        }

        let parent = self.nodes[x].parent;
        self.nodes[y].parent = parent;
        self.replace_child(parent, x, y);

        self.nodes[y].right = Some(x);
        self.nodes[x].parent = Some(y);

        self.refresh(x);
        self.refresh(y);
        y
    }

    fn balance_factor(&self, index: usize) -> isize {
        let node = &self.nodes[index];
        self.subtree_height(node.left) as isize - self.subtree_height(node.right) as isize
    }

    /// Walks from `start` to the root restoring the AVL height condition.
    fn rebalance_avl(&mut self, start: Option<usize>) {

        let mut cursor = start;

        while let Some(index) = cursor {

            self.refresh(index);
            let factor = self.balance_factor(index);

            let top = if factor > 1 {
                if let Some(left) = self.nodes[index].left {
                    if self.balance_factor(left) < 0 {
                        self.rotate_left(left);
                    }
                }
                self.rotate_right(index)
            } else if factor < -1 {
                if let Some(right) = self.nodes[index].right {
                    if self.balance_factor(right) > 0 {
                        self.rotate_right(right);
                    }
                }
                self.rotate_left(index)
            } else {
                index
            };

            cursor = self.nodes[top].parent;
        }
    }

    fn is_red(&self, index: Option<usize>) -> bool {
        index.map_or(false, |i| self.nodes[i].red)
    }

    /// Restores the red-black colouring after `node` was attached red.
    fn fix_red_black(&mut self, mut node: usize) {

        while let Some(mut parent) = self.nodes[node].parent {

            if !self.nodes[parent].red {
                break;
            }
            let Some(grandparent) = self.nodes[parent].parent else {
                break;
            };

            let parent_is_left = self.nodes[grandparent].left == Some(parent);
            let uncle = match parent_is_left {
                true => self.nodes[grandparent].right,
                false => self.nodes[grandparent].left,
            };

            if self.is_red(uncle) {
                if let Some(uncle) = uncle {
                    self.nodes[uncle].red = false;
                }
                self.nodes[parent].red = false;
                self.nodes[grandparent].red = true;
                node = grandparent;
                continue;
            }

            if parent_is_left {
                if self.nodes[parent].right == Some(node) {
                    self.rotate_left(parent);
                    std::mem::swap(&mut node, &mut parent);
                }
                self.nodes[parent].red = false;
                self.nodes[grandparent].red = true;
                self.rotate_right(grandparent);
            } else {
                if self.nodes[parent].left == Some(node) {
                    self.rotate_right(parent);
                    std::mem::swap(&mut node, &mut parent);
                }
                self.nodes[parent].red = false;
                self.nodes[grandparent].red = true;
                self.rotate_left(grandparent);
            }
        }

        if let Some(root) = self.root {
            self.nodes[root].red = false;
        }
    }

    fn maybe_compact(&mut self) {
        if self.nodes.len() >= COMPACT_MIN_NODES && self.vacant * 2 > self.nodes.len() {
            self.compact();
        }
    }

    /// Rebuilds the arena from live buckets only, inserted median first.
    fn compact(&mut self) {

        let mut live: Vec<(OrderedFloat<f64>, V)> = std::mem::take(&mut self.nodes)
            .into_iter()
            .filter(|node| !node.value.is_empty())
            .map(|node| (node.key, node.value))
            .collect();
        live.sort_by_key(|(key, _)| *key);

        self.root = None;
        self.vacant = 0;

        let mut slots: Vec<Option<(OrderedFloat<f64>, V)>> = live.into_iter().map(Some).collect();
        for position in median_first_order(slots.len()) {
            if let Some((key, value)) = slots[position].take() {
                let index = self.find_or_insert(key);
                self.apply(index, move |bucket| *bucket = value);
            }
        }
    }
}

pub struct Range<'a, V> {
    tree: &'a Bst<V>,
    stack: Vec<usize>,
    upper: OrderedFloat<f64>,
}

impl<'a, V> Iterator for Range<'a, V> {
    type Item = (f64, &'a V);

    fn next(&mut self) -> Option<Self::Item> {

        let index = self.stack.pop()?;
        let nodes = &self.tree.nodes;

        if nodes[index].key > self.upper {
            self.stack.clear();
            return None;
        }

        let mut cursor = nodes[index].right;
        while let Some(i) = cursor {
            self.stack.push(i);
            cursor = nodes[i].left;
        }

        Some((nodes[index].key.0, &nodes[index].value))
    }
}

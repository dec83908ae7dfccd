//! Holds structs for the nodes of the kd tree.
//!
//! Nodes live in a single arena (`Vec<KdNode>`) and point at their children by arena index, so a
//! rebuild only rewrites the child links and never moves a record.

use crate::boundary::Boundary;
use crate::data::Psm;

/// Number of indexed axes: mz, rt, ook0
pub const K: usize = 3;

pub type Point = [f64; K];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Side {
    Left,
    Right,
}

/// Where a freshly placed node hangs: the tree root or a parent's child slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Attach {
    Root,
    Child(usize, Side),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KdNode {
    pub point: Point,
    pub psm: Psm,
    pub left: Option<usize>,
    pub right: Option<usize>,
}

impl KdNode {

    pub fn new(psm: Psm) -> Self {
        Self {
            point: psm.coordinates(),
            psm,
            left: None,
            right: None,
        }
    }

    pub fn child(&self, side: Side) -> Option<usize> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    pub fn set_child(&mut self, side: Side, index: Option<usize>) {
        match side {
            Side::Left => self.left = index,
            Side::Right => self.right = index,
        }
    }

    pub fn within(&self, bounds: &[Boundary; K]) -> bool {
        self.point
            .iter()
            .zip(bounds.iter())
            .all(|(value, bound)| bound.contains(*value))
    }

    pub fn squared_distance(&self, point: &Point) -> f64 {
        self.point
            .iter()
            .zip(point.iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum()
    }
}

/// Axis used to split at `depth`
pub fn split_axis(depth: usize) -> usize {
    depth % K
}

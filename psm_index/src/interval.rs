//! Interval tree backend.
//!
//! Each record is stored as the mz interval `[mz - mz*ppm/1e6, mz + mz*ppm/1e6]`, with `ppm`
//! fixed when the backend is created. Intervals live in a [`Bst`] keyed by their low end;
//! every node caches the highest interval end in its subtree so a point query can skip
//! subtrees that end before the point.
//!
//! A range query stabs the tree at the midpoint of the query's mz boundary only, then
//! filters the records found there on all three coordinates. Records whose stored interval
//! does not cover that midpoint are not returned even when their mz is inside the boundary,
//! so this backend can return fewer records than the others for wide boundaries or small
//! `ppm`.

use crate::bst::{Balance, Bst, Bucket};
use crate::boundary::Boundary;
use crate::data::Psm;
use crate::error::{Error, Result};
use crate::index::PsmIndex;

pub const DEFAULT_PPM: f64 = 50.0;

/// Records whose interval starts at the same low end, with each interval's high end
#[derive(Debug, Clone, Default)]
pub struct Intervals(Vec<(f64, Psm)>);

impl Bucket for Intervals {
    fn reach(&self, key: f64) -> f64 {
        self.0.iter().map(|(high, _)| *high).fold(key, f64::max)
    }

    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct IntervalTree {
    tree: Bst<Intervals>,
    ppm: f64,
    len: usize,
}

impl Default for IntervalTree {
    fn default() -> Self {
        Self::new(DEFAULT_PPM)
    }
}

impl IntervalTree {

    pub fn new(ppm: f64) -> Self {
        Self {
            tree: Bst::new(Balance::Avl),
            ppm,
            len: 0,
        }
    }

    pub fn ppm(&self) -> f64 {
        self.ppm
    }

    /// `(low, high)` of the interval stored for `mz`
    pub fn interval(&self, mz: f64) -> (f64, f64) {
        let offset = mz * self.ppm / 1_000_000.0;
        let (a, b) = (mz - offset, mz + offset);
        (a.min(b), a.max(b))
    }

    /// Records whose stored interval contains `point`
    fn overlapping(&self, point: f64) -> impl Iterator<Item = &Psm> + '_ {
        self.tree
            .stab(point)
            .into_iter()
            .flat_map(move |(low, intervals)| {
                intervals
                    .0
                    .iter()
                    .filter(move |(high, _)| low <= point && point <= *high)
                    .map(|(_, psm)| psm)
            })
    }
}

impl PsmIndex for IntervalTree {

    fn add(&mut self, psm: Psm) {
        let (low, high) = self.interval(psm.mz);
        self.tree.update(low, |intervals| intervals.0.push((high, psm)));
        self.len += 1;
    }

    fn order_for_bulk_load(&self, mut psms: Vec<Psm>) -> Vec<Psm> {
        psms.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        psms
    }

    fn remove(&mut self, psm: &Psm) -> Result<()> {

        let (low, _) = self.interval(psm.mz);
        let removed = self.tree.modify(low, |intervals| {
            match intervals.0.iter().position(|(_, stored)| stored == psm) {
                Some(position) => {
                    intervals.0.swap_remove(position);
                    true
                }
                None => false,
            }
        });

        match removed {
            Some(true) => {
                self.len -= 1;
                Ok(())
            }
            _ => Err(Error::NotFound(format!("record {}", psm))),
        }
    }

    /// Looks up the intervals covering `mz`, then keeps records exactly at the point.
    fn get(&self, mz: f64, rt: f64, ook0: f64) -> Result<Vec<Psm>> {

        let at_mz: Vec<&Psm> = self.overlapping(mz).filter(|psm| psm.mz == mz).collect();
        if at_mz.is_empty() {
            return Err(Error::NotFound(format!("mz {}", mz)));
        }

        Ok(at_mz
            .into_iter()
            .filter(|psm| psm.rt == rt && psm.ook0 == ook0)
            .cloned()
            .collect())
    }

    fn range_search(&self, mz: &Boundary, rt: &Boundary, ook0: &Boundary) -> Vec<Psm> {
        self.overlapping(mz.midpoint())
            .filter(|psm| psm.in_boundary(mz, rt, ook0))
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.tree.clear();
        self.len = 0;
    }

    fn all_records(&self) -> Vec<Psm> {
        self.tree
            .buckets()
            .flat_map(|(_, intervals)| intervals.0.iter().map(|(_, psm)| psm))
            .cloned()
            .collect()
    }
}

//! The contract every range index implements, and [`Backend`], the closed set of
//! implementations a coordinator can be configured with.
//!
//! All backends hold an unordered multiset of [`Psm`]s. They differ only in how they find
//! candidates for a query; every candidate is still checked against all three boundaries, so
//! for the same contents every backend answers a range query with the same set of records.
//! The one exception is the interval backend, which looks up only the midpoint of the mz boundary
//! instead of overlapping the whole boundary (see [`crate::interval`]).

use std::path::Path;

use crate::bintree::BinTree;
use crate::boundary::{mz_boundary, ook0_boundary, rt_boundary, Boundary};
use crate::config::BackendKind;
use crate::data::Psm;
use crate::error::Result;
use crate::hashtable::Hashtable;
use crate::interval::IntervalTree;
use crate::io;
use crate::list::PsmList;
use crate::sorted_map::SortedMap;
use crate::tree::KdTree;

pub trait PsmIndex {

    /// Stores one record. Identical records are kept as separate entries.
    fn add(&mut self, psm: Psm);

    /// Order in which [`PsmIndex::bulk_load`] inserts a batch
    fn order_for_bulk_load(&self, psms: Vec<Psm>) -> Vec<Psm> {
        psms
    }

    fn bulk_load(&mut self, psms: Vec<Psm>) {
        for psm in self.order_for_bulk_load(psms) {
            self.add(psm);
        }
    }

    /// Removes exactly one stored entry equal to `psm`, or fails with `NotFound`.
    fn remove(&mut self, psm: &Psm) -> Result<()>;

    /// Like [`PsmIndex::remove`] but reports absence as `false`
    fn discard(&mut self, psm: &Psm) -> bool {
        self.remove(psm).is_ok()
    }

    /// Records at exactly `(mz, rt, ook0)`; `NotFound` when nothing is stored under `mz`.
    fn get(&self, mz: f64, rt: f64, ook0: f64) -> Result<Vec<Psm>>;

    fn range_search(&self, mz: &Boundary, rt: &Boundary, ook0: &Boundary) -> Vec<Psm>;

    fn tolerance_search(
        &self,
        mz: f64,
        rt: f64,
        ook0: f64,
        ppm: f64,
        rt_offset: f64,
        ook0_tolerance: f64,
    ) -> Vec<Psm> {
        self.range_search(
            &mz_boundary(mz, ppm),
            &rt_boundary(rt, rt_offset),
            &ook0_boundary(ook0, ook0_tolerance),
        )
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Snapshot of every stored record, in no particular order
    fn all_records(&self) -> Vec<Psm>;

    /// Writes every record to `path`, one line each.
    fn save(&self, path: &Path) -> Result<()> {
        io::write_psms(path, &self.all_records())?;
        Ok(())
    }

    /// Replaces the contents with the records in `path`. Nothing changes if the file
    /// cannot be read or parsed.
    fn load(&mut self, path: &Path) -> Result<()> {
        let psms = io::read_psms(path)?;
        self.clear();
        self.bulk_load(psms);
        Ok(())
    }
}

/// One of the index implementations, chosen from a [`BackendKind`]
#[derive(Debug, Clone)]
pub enum Backend {
    Kd(KdTree),
    SortedMap(SortedMap),
    Hashtable(Hashtable),
    BinTree(BinTree),
    Interval(IntervalTree),
    List(PsmList),
}

macro_rules! dispatch {
    ($backend:expr, $inner:ident => $call:expr) => {
        match $backend {
            Backend::Kd($inner) => $call,
            Backend::SortedMap($inner) => $call,
            Backend::Hashtable($inner) => $call,
            Backend::BinTree($inner) => $call,
            Backend::Interval($inner) => $call,
            Backend::List($inner) => $call,
        }
    };
}

impl Backend {

    /// Empty backend of the given kind. Parameters are not checked here; see
    /// [`BackendKind::validate`].
    pub fn new(kind: &BackendKind) -> Self {
        match kind {
            BackendKind::Kd { rebuild_after } => Backend::Kd(KdTree::with_rebuild_after(*rebuild_after)),
            BackendKind::SortedMap => Backend::SortedMap(SortedMap::new()),
            BackendKind::Hashtable { precision } => Backend::Hashtable(Hashtable::new(*precision)),
            BackendKind::BalancedBst { balance } => Backend::BinTree(BinTree::new(*balance)),
            BackendKind::Interval { ppm } => Backend::Interval(IntervalTree::new(*ppm)),
            BackendKind::List => Backend::List(PsmList::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Backend::Kd(_) => "kd",
            Backend::SortedMap(_) => "sorted_map",
            Backend::Hashtable(_) => "hashtable",
            Backend::BinTree(_) => "balanced_bst",
            Backend::Interval(_) => "interval",
            Backend::List(_) => "list",
        }
    }
}

impl PsmIndex for Backend {

    fn add(&mut self, psm: Psm) {
        dispatch!(self, index => index.add(psm))
    }

    fn order_for_bulk_load(&self, psms: Vec<Psm>) -> Vec<Psm> {
        dispatch!(self, index => index.order_for_bulk_load(psms))
    }

    fn bulk_load(&mut self, psms: Vec<Psm>) {
        dispatch!(self, index => index.bulk_load(psms))
    }

    fn remove(&mut self, psm: &Psm) -> Result<()> {
        dispatch!(self, index => index.remove(psm))
    }

    fn discard(&mut self, psm: &Psm) -> bool {
        dispatch!(self, index => index.discard(psm))
    }

    fn get(&self, mz: f64, rt: f64, ook0: f64) -> Result<Vec<Psm>> {
        dispatch!(self, index => index.get(mz, rt, ook0))
    }

    fn range_search(&self, mz: &Boundary, rt: &Boundary, ook0: &Boundary) -> Vec<Psm> {
        dispatch!(self, index => index.range_search(mz, rt, ook0))
    }

    fn len(&self) -> usize {
        dispatch!(self, index => index.len())
    }

    fn clear(&mut self) {
        dispatch!(self, index => index.clear())
    }

    fn all_records(&self) -> Vec<Psm> {
        dispatch!(self, index => index.all_records())
    }

    fn save(&self, path: &Path) -> Result<()> {
        dispatch!(self, index => index.save(path))
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        dispatch!(self, index => index.load(path))
    }
}

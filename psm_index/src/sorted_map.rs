//! Records bucketed by exact mz in a `BTreeMap`.
//!
//! A range query seeks to the first key at or above the lower mz bound and walks keys upward
//! until one passes the upper bound, filtering each bucket on rt and ook0.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;

use crate::boundary::Boundary;
use crate::data::Psm;
use crate::error::{Error, Result};
use crate::index::PsmIndex;

#[derive(Debug, Clone, Default)]
pub struct SortedMap {
    buckets: BTreeMap<OrderedFloat<f64>, Vec<Psm>>,
    len: usize,
}

impl SortedMap {

    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct mz keys
    pub fn key_count(&self) -> usize {
        self.buckets.len()
    }
}

impl PsmIndex for SortedMap {

    fn add(&mut self, psm: Psm) {
        self.buckets.entry(OrderedFloat(psm.mz)).or_default().push(psm);
        self.len += 1;
    }

    /// Presorted by mz so that buckets fill key by key
    fn order_for_bulk_load(&self, mut psms: Vec<Psm>) -> Vec<Psm> {
        psms.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        psms
    }

    fn remove(&mut self, psm: &Psm) -> Result<()> {

        let key = OrderedFloat(psm.mz);
        let bucket = self
            .buckets
            .get_mut(&key)
            .ok_or_else(|| Error::NotFound(format!("record {}", psm)))?;

        let position = bucket
            .iter()
            .position(|stored| stored == psm)
            .ok_or_else(|| Error::NotFound(format!("record {}", psm)))?;
        bucket.swap_remove(position);

        if bucket.is_empty() {
            self.buckets.remove(&key);
        }
        self.len -= 1;

        Ok(())
    }

    fn get(&self, mz: f64, rt: f64, ook0: f64) -> Result<Vec<Psm>> {
        let bucket = self
            .buckets
            .get(&OrderedFloat(mz))
            .ok_or_else(|| Error::NotFound(format!("mz {}", mz)))?;

        Ok(bucket.iter().filter(|psm| psm.rt == rt && psm.ook0 == ook0).cloned().collect())
    }

    fn range_search(&self, mz: &Boundary, rt: &Boundary, ook0: &Boundary) -> Vec<Psm> {
        if mz.is_inverted() {
            return Vec::new();
        }

        let upper = OrderedFloat(mz.upper);
        self.buckets
            .range(OrderedFloat(mz.lower)..)
            .take_while(|(key, _)| **key <= upper)
            .flat_map(|(_, bucket)| bucket.iter())
            .filter(|psm| psm.in_boundary(mz, rt, ook0))
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.len
    }

    fn clear(&mut self) {
        self.buckets.clear();
        self.len = 0;
    }

    fn all_records(&self) -> Vec<Psm> {
        self.buckets.values().flatten().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::{fixture, psm};

    #[test]
    fn equal_mz_shares_a_bucket() {
        let mut map = SortedMap::new();
        map.add(psm(1, 1005.0, 250.0, 0.9, "A"));
        map.add(psm(1, 1005.0, 120.0, 0.9, "B"));
        map.add(psm(1, 1006.0, 250.0, 0.9, "C"));

        assert_eq!(map.key_count(), 2);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(1005.0, 120.0, 0.9).unwrap()[0].data, psm(1, 0.0, 0.0, 0.0, "B").data);
    }

    #[test]
    fn empty_buckets_are_dropped() {
        let mut map = SortedMap::new();
        map.bulk_load(fixture());
        map.remove(&fixture()[0]).unwrap();

        assert_eq!(map.key_count(), 7);
        assert!(matches!(map.get(1005.0, 250.0, 0.9), Err(Error::NotFound(_))));
    }

    #[test]
    fn present_key_without_match_is_empty() {
        let mut map = SortedMap::new();
        map.bulk_load(fixture());
        assert!(map.get(1005.0, 251.0, 0.9).unwrap().is_empty());
    }

    #[test]
    fn bulk_order_is_by_mz() {
        let map = SortedMap::new();
        let ordered: Vec<f64> = map.order_for_bulk_load(fixture()).iter().map(|p| p.mz).collect();
        assert_eq!(ordered, vec![1005.0, 1050.0, 1100.0, 1150.0, 1200.0, 2000.0, 3000.0, 5000.0]);
    }

    #[test]
    fn inverted_mz_boundary_matches_nothing() {
        let mut map = SortedMap::new();
        map.bulk_load(fixture());
        let found = map.range_search(
            &Boundary::new(1200.0, 1000.0),
            &Boundary::new(0.0, 1000.0),
            &Boundary::new(0.0, 2.0),
        );
        assert!(found.is_empty());
    }
}

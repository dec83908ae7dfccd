//! Records bucketed by mz quantized to a fixed number of decimal places.
//!
//! A record lands in bucket `floor(round(mz, p) * 10^p)`. A query enumerates every bucket key
//! from the floor key of its lower mz bound to the ceiling key of its upper bound, then
//! filters the candidates on all three coordinates. Higher precision means narrower buckets
//! but more keys per query; when a query would enumerate more keys than there are buckets,
//! the buckets are scanned directly instead.

use std::collections::HashMap;

use crate::boundary::Boundary;
use crate::data::Psm;
use crate::error::{Error, Result};
use crate::index::PsmIndex;

pub const DEFAULT_PRECISION: u32 = 2;

#[derive(Debug, Clone)]
pub struct Hashtable {
    buckets: HashMap<i64, Vec<Psm>>,
    precision: u32,
    len: usize,
}

impl Default for Hashtable {
    fn default() -> Self {
        Self::new(DEFAULT_PRECISION)
    }
}

impl Hashtable {

    pub fn new(precision: u32) -> Self {
        Self {
            buckets: HashMap::new(),
            precision,
            len: 0,
        }
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// `round(mz, p) * 10^p`, before flooring or ceiling into a key
    fn scaled(&self, mz: f64) -> f64 {
        let scale = 10f64.powi(self.precision as i32);
        (mz * scale).round() / scale * scale
    }

    fn lower_key(&self, mz: f64) -> i64 {
        self.scaled(mz).floor() as i64
    }

    fn upper_key(&self, mz: f64) -> i64 {
        self.scaled(mz).ceil() as i64
    }

    fn candidates(&self, mz: &Boundary) -> Vec<&Psm> {

        let lower = self.lower_key(mz.lower);
        let upper = self.upper_key(mz.upper);
        if lower > upper {
            return Vec::new();
        }

        let span = i128::from(upper) - i128::from(lower) + 1;
        match span > self.buckets.len() as i128 {
            true => self
                .buckets
                .iter()
                .filter(|(key, _)| (lower..=upper).contains(*key))
                .flat_map(|(_, bucket)| bucket.iter())
                .collect(),
            false => (lower..=upper)
                .filter_map(|key| self.buckets.get(&key))
                .flatten()
                .collect(),
        }
    }
}

impl PsmIndex for Hashtable {

    fn add(&mut self, psm: Psm) {
        let key = self.lower_key(psm.mz);
        self.buckets.entry(key).or_default().push(psm);
        self.len += 1;
    }

    fn remove(&mut self, psm: &Psm) -> Result<()> {

        let key = self.lower_key(psm.mz);
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

    /// `NotFound` unless some record in the bucket has exactly this mz
    fn get(&self, mz: f64, rt: f64, ook0: f64) -> Result<Vec<Psm>> {

        let bucket = self
            .buckets
            .get(&self.lower_key(mz))
            .filter(|bucket| bucket.iter().any(|psm| psm.mz == mz))
            .ok_or_else(|| Error::NotFound(format!("mz {}", mz)))?;

        Ok(bucket.iter().filter(|psm| psm.is_at(mz, rt, ook0)).cloned().collect())
    }

    fn range_search(&self, mz: &Boundary, rt: &Boundary, ook0: &Boundary) -> Vec<Psm> {
        self.candidates(mz)
            .into_iter()
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

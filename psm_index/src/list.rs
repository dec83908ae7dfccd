//! Unordered vector of records answering every query by a full scan.

use crate::boundary::Boundary;
use crate::data::Psm;
use crate::error::{Error, Result};
use crate::index::PsmIndex;

#[derive(Debug, Clone, Default)]
pub struct PsmList {
    psms: Vec<Psm>,
}

impl PsmList {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PsmIndex for PsmList {

    fn add(&mut self, psm: Psm) {
        self.psms.push(psm);
    }

    fn remove(&mut self, psm: &Psm) -> Result<()> {
        let position = self
            .psms
            .iter()
            .position(|stored| stored == psm)
            .ok_or_else(|| Error::NotFound(format!("record {}", psm)))?;
        self.psms.swap_remove(position);
        Ok(())
    }

    fn get(&self, mz: f64, rt: f64, ook0: f64) -> Result<Vec<Psm>> {
        if !self.psms.iter().any(|psm| psm.mz == mz) {
            return Err(Error::NotFound(format!("mz {}", mz)));
        }
        Ok(self.psms.iter().filter(|psm| psm.is_at(mz, rt, ook0)).cloned().collect())
    }

    fn range_search(&self, mz: &Boundary, rt: &Boundary, ook0: &Boundary) -> Vec<Psm> {
        self.psms
            .iter()
            .filter(|psm| psm.in_boundary(mz, rt, ook0))
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.psms.len()
    }

    fn clear(&mut self) {
        self.psms.clear();
    }

    fn all_records(&self) -> Vec<Psm> {
        self.psms.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::fixture;

    #[test]
    fn get_distinguishes_missing_key_from_no_match() {
        let mut list = PsmList::new();
        list.bulk_load(fixture());

        assert!(list.get(1005.0, 251.0, 0.9).unwrap().is_empty());
        assert!(matches!(list.get(1006.0, 250.0, 0.9), Err(Error::NotFound(_))));
    }

    #[test]
    fn bulk_load_keeps_order() {
        let mut list = PsmList::new();
        list.bulk_load(fixture());
        assert_eq!(list.all_records(), fixture());
    }
}

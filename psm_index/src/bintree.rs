//! Balanced binary search tree backend: records bucketed by exact mz in a [`Bst`], balanced as
//! AVL, red-black or not at all.

use crate::bst::{median_first_order, Balance, Bst, Bucket};
use crate::boundary::Boundary;
use crate::data::Psm;
use crate::error::{Error, Result};
use crate::index::PsmIndex;

impl Bucket for Vec<Psm> {
    fn reach(&self, key: f64) -> f64 {
        key
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone)]
pub struct BinTree {
    tree: Bst<Vec<Psm>>,
    len: usize,
}

impl Default for BinTree {
    fn default() -> Self {
        Self::new(Balance::default())
    }
}

impl BinTree {

    pub fn new(balance: Balance) -> Self {
        Self {
            tree: Bst::new(balance),
            len: 0,
        }
    }

    pub fn balance(&self) -> Balance {
        self.tree.balance()
    }

    pub fn height(&self) -> usize {
        self.tree.height()
    }
}

impl PsmIndex for BinTree {

    fn add(&mut self, psm: Psm) {
        self.tree.update(psm.mz, |bucket| bucket.push(psm));
        self.len += 1;
    }

    /// Sorted by mz, then median first, so even the plain tree comes out balanced.
    fn order_for_bulk_load(&self, mut psms: Vec<Psm>) -> Vec<Psm> {

        psms.sort_by(|a, b| a.mz.total_cmp(&b.mz));

        let mut slots: Vec<Option<Psm>> = psms.into_iter().map(Some).collect();
        median_first_order(slots.len())
            .into_iter()
            .filter_map(|position| slots[position].take())
            .collect()
    }

    fn remove(&mut self, psm: &Psm) -> Result<()> {

        let removed = self.tree.modify(psm.mz, |bucket| {
            match bucket.iter().position(|stored| stored == psm) {
                Some(position) => {
                    bucket.swap_remove(position);
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

    fn get(&self, mz: f64, rt: f64, ook0: f64) -> Result<Vec<Psm>> {
        let bucket = self
            .tree
            .get(mz)
            .filter(|bucket| !bucket.is_empty())
            .ok_or_else(|| Error::NotFound(format!("mz {}", mz)))?;

        Ok(bucket.iter().filter(|psm| psm.rt == rt && psm.ook0 == ook0).cloned().collect())
    }

    fn range_search(&self, mz: &Boundary, rt: &Boundary, ook0: &Boundary) -> Vec<Psm> {
        self.tree
            .range(mz.lower, mz.upper)
            .flat_map(|(_, bucket)| bucket.iter())
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
            .flat_map(|(_, bucket)| bucket.iter())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::testing::psm;

    fn ascending(n: usize) -> Vec<Psm> {
        (0..n).map(|i| psm(2, 500.0 + i as f64, 10.0, 1.0, "K")).collect()
    }

    #[test]
    fn sorted_adds_keep_balanced_variants_shallow() {
        for balance in [Balance::Avl, Balance::RedBlack] {
            let mut tree = BinTree::new(balance);
            for record in ascending(1023) {
                tree.add(record);
            }
            assert!(tree.height() <= 20, "{:?} height {}", balance, tree.height());
        }

        let mut plain = BinTree::new(Balance::Plain);
        for record in ascending(200) {
            plain.add(record);
        }
        assert_eq!(plain.height(), 200);
    }

    #[test]
    fn bulk_load_balances_plain_tree() {
        let mut records = ascending(1023);
        records.reverse();

        for balance in [Balance::Plain, Balance::Avl] {
            let mut tree = BinTree::new(balance);
            tree.bulk_load(records.clone());
            assert_eq!(tree.height(), 10, "{:?}", balance);
            assert_eq!(tree.len(), 1023);
        }
    }

    #[test]
    fn emptied_key_reports_not_found() {
        let mut tree = BinTree::default();
        let record = psm(1, 1005.0, 250.0, 0.9, "PEPTIDE");
        tree.add(record.clone());
        tree.remove(&record).unwrap();

        assert!(matches!(tree.get(1005.0, 250.0, 0.9), Err(Error::NotFound(_))));
        assert!(matches!(tree.remove(&record), Err(Error::NotFound(_))));
        assert_eq!(tree.all_records(), Vec::<Psm>::new());
    }

    #[test]
    fn shared_key_kept_until_last_record_leaves() {
        let mut tree = BinTree::new(Balance::RedBlack);
        let a = psm(1, 1005.0, 250.0, 0.9, "A");
        let b = psm(1, 1005.0, 100.0, 0.9, "B");
        tree.add(a.clone());
        tree.add(b.clone());

        tree.remove(&a).unwrap();
        assert_eq!(tree.get(1005.0, 100.0, 0.9).unwrap(), vec![b]);
        assert!(tree.get(1005.0, 250.0, 0.9).unwrap().is_empty());
    }
}

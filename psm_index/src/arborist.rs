//! The coordinator: one index backend per charge state.
//!
//! Partitions are created lazily on the first record of a new charge, all of the kind fixed
//! at construction. The charge map sits behind a read-write lock and each partition behind
//! its own mutex, so work on different charges proceeds in parallel while a partition is
//! only ever touched by one thread at a time. Creating a partition takes the map's write
//! lock; `save` and `load` additionally serialize against each other.
//!
//! A saved coordinator is a directory holding one `<charge>.txt` file of record lines per
//! partition.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::{Mutex, RwLock};

use crate::boundary::Boundary;
use crate::config::{ArboristConfig, BackendKind, SearchTolerance};
use crate::data::{Payload, Psm};
use crate::error::{Error, Result};
use crate::index::{Backend, PsmIndex};
use crate::io;

type Partition = Arc<Mutex<Backend>>;

#[derive(Debug)]
pub struct Arborist {
    kind: BackendKind,
    partitions: RwLock<HashMap<i32, Partition>>,
    persist: Mutex<()>,
}

impl Arborist {

    /// Fails with `Configuration` if the backend parameters are invalid.
    pub fn new(kind: BackendKind) -> Result<Self> {
        kind.validate()?;
        Ok(Self {
            kind,
            partitions: RwLock::new(HashMap::new()),
            persist: Mutex::new(()),
        })
    }

    pub fn from_config(config: &ArboristConfig) -> Result<Self> {
        Self::new(config.backend.clone())
    }

    /// Backend chosen by name, see [`BackendKind`]'s `FromStr`
    pub fn from_name(name: &str) -> Result<Self> {
        Self::new(name.parse()?)
    }

    pub fn backend_kind(&self) -> &BackendKind {
        &self.kind
    }

    fn partition(&self, charge: i32) -> Option<Partition> {
        self.partitions.read().get(&charge).cloned()
    }

    fn partition_or_create(&self, charge: i32) -> Partition {

        if let Some(partition) = self.partition(charge) {
            return partition;
        }

        let mut partitions = self.partitions.write();
        partitions
            .entry(charge)
            .or_insert_with(|| {
                debug!("creating {:?} partition for charge {}", self.kind, charge);
                Arc::new(Mutex::new(Backend::new(&self.kind)))
            })
            .clone()
    }

    pub fn add(&self, charge: i32, mz: f64, rt: f64, ook0: f64, payload: Payload) {
        self.add_psm(Psm::new(charge, mz, rt, ook0, payload));
    }

    pub fn add_psm(&self, psm: Psm) {
        let partition = self.partition_or_create(psm.charge);
        partition.lock().add(psm);
    }

    /// Groups the records by charge and bulk loads each group into its partition.
    pub fn bulk_add<I: IntoIterator<Item = Psm>>(&self, psms: I) {

        let mut groups: BTreeMap<i32, Vec<Psm>> = BTreeMap::new();
        for psm in psms {
            groups.entry(psm.charge).or_default().push(psm);
        }

        for (charge, group) in groups {
            let partition = self.partition_or_create(charge);
            partition.lock().bulk_load(group);
        }
    }

    /// Matches within the tolerance window; empty when nothing was ever added for `charge`.
    #[allow(clippy::too_many_arguments)]
    pub fn tolerance_search(
        &self,
        charge: i32,
        mz: f64,
        rt: f64,
        ook0: f64,
        ppm: f64,
        rt_offset: f64,
        ook0_tolerance: f64,
    ) -> Vec<Psm> {
        self.partition(charge)
            .map(|partition| partition.lock().tolerance_search(mz, rt, ook0, ppm, rt_offset, ook0_tolerance))
            .unwrap_or_default()
    }

    pub fn search(&self, charge: i32, mz: f64, rt: f64, ook0: f64, tolerance: &SearchTolerance) -> Vec<Psm> {
        let [mz, rt, ook0] = tolerance.boundaries(mz, rt, ook0);
        self.range_search(charge, &mz, &rt, &ook0)
    }

    pub fn range_search(&self, charge: i32, mz: &Boundary, rt: &Boundary, ook0: &Boundary) -> Vec<Psm> {
        self.partition(charge)
            .map(|partition| partition.lock().range_search(mz, rt, ook0))
            .unwrap_or_default()
    }

    /// Removes one record equal to the given fields. Never creates a partition.
    pub fn remove(&self, charge: i32, mz: f64, rt: f64, ook0: f64, payload: Payload) -> Result<()> {
        let psm = Psm::new(charge, mz, rt, ook0, payload);
        self.partition(charge).ok_or(Error::UnknownCharge(charge))?.lock().remove(&psm)
    }

    /// `false` if the record, or its whole charge, is absent
    pub fn discard(&self, psm: &Psm) -> bool {
        self.partition(psm.charge)
            .map_or(false, |partition| partition.lock().discard(psm))
    }

    pub fn get(&self, charge: i32, mz: f64, rt: f64, ook0: f64) -> Result<Vec<Psm>> {
        self.partition(charge).ok_or(Error::UnknownCharge(charge))?.lock().get(mz, rt, ook0)
    }

    /// Records across every partition
    pub fn len(&self) -> usize {
        self.partitions.read().values().map(|partition| partition.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn charges(&self) -> Vec<i32> {
        let mut charges: Vec<i32> = self.partitions.read().keys().copied().collect();
        charges.sort();
        charges
    }

    pub fn partition_len(&self, charge: i32) -> Option<usize> {
        self.partition(charge).map(|partition| partition.lock().len())
    }

    /// Drops every partition
    pub fn clear(&self) {
        let _persist = self.persist.lock();
        self.partitions.write().clear();
    }

    /// Replaces `directory` with one file per partition.
    ///
    /// The old directory is removed before anything is written, so a failure part way
    /// through leaves a partial directory behind.
    pub fn save(&self, directory: &Path) -> Result<()> {

        let _persist = self.persist.lock();
        let partitions = self.partitions.read();

        if directory.exists() {
            std::fs::remove_dir_all(directory)?;
        }
        std::fs::create_dir_all(directory)?;

        let mut charges: Vec<&i32> = partitions.keys().collect();
        charges.sort();

        let mut records = 0;
        for charge in charges {
            let backend = partitions[charge].lock();
            backend.save(&io::partition_path(directory, *charge))?;
            records += backend.len();
        }

        info!(
            "saved {} records in {} partitions to {}",
            records,
            partitions.len(),
            directory.display()
        );

        Ok(())
    }

    /// Replaces every partition with those saved in `directory`.
    ///
    /// All files are read before anything changes; on any error the current partitions
    /// are kept as they were.
    pub fn load(&self, directory: &Path) -> Result<()> {

        let _persist = self.persist.lock();

        let mut loaded: HashMap<i32, Partition> = HashMap::new();
        let mut records = 0;

        for (charge, path) in io::partition_files(directory)? {
            let mut backend = Backend::new(&self.kind);
            backend.load(&path)?;
            debug!("loaded {} records for charge {} from {}", backend.len(), charge, path.display());
            records += backend.len();
            loaded.insert(charge, Arc::new(Mutex::new(backend)));
        }

        info!(
            "loaded {} records in {} partitions from {}",
            records,
            loaded.len(),
            directory.display()
        );

        *self.partitions.write() = loaded;

        Ok(())
    }
}

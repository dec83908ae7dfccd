//! Backend selection and coordinator settings, stored as YAML.
//!
//! ```yaml
//! directory: /tmp/psm_index
//! backend:
//!   kind: hashtable
//!   precision: 2
//! tolerance:
//!   ppm: 50.0
//!   rt_offset: 100.0
//!   ook0_tolerance: 0.05
//! ```

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::boundary::{mz_boundary, ook0_boundary, rt_boundary, Boundary};
use crate::error::{Error, Result};
use crate::hashtable::DEFAULT_PRECISION;
use crate::interval::DEFAULT_PPM;

pub use crate::bst::Balance;

/// Largest hashtable precision whose bucket keys stay exact for realistic mz values
pub const MAX_PRECISION: u32 = 12;

/// Which index backend every charge partition uses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendKind {
    Kd {
        #[serde(default)]
        rebuild_after: Option<usize>,
    },
    SortedMap,
    Hashtable {
        #[serde(default = "default_precision")]
        precision: u32,
    },
    BalancedBst {
        #[serde(default)]
        balance: Balance,
    },
    Interval {
        #[serde(default = "default_ppm")]
        ppm: f64,
    },
    List,
}

fn default_precision() -> u32 {
    DEFAULT_PRECISION
}

fn default_ppm() -> f64 {
    DEFAULT_PPM
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::Kd { rebuild_after: None }
    }
}

impl BackendKind {

    /// Rejects parameters no backend can work with.
    pub fn validate(&self) -> Result<()> {
        match self {
            BackendKind::Hashtable { precision } if *precision > MAX_PRECISION => Err(Error::Configuration(format!(
                "hashtable precision {} exceeds {}",
                precision, MAX_PRECISION
            ))),
            BackendKind::Interval { ppm } if !ppm.is_finite() || *ppm < 0.0 => {
                Err(Error::Configuration(format!("interval ppm must be finite and non-negative, got {}", ppm)))
            }
            BackendKind::Kd { rebuild_after: Some(0) } => {
                Err(Error::Configuration("kd rebuild_after must be at least 1".to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    /// Backend by name, with default parameters
    fn from_str(s: &str) -> Result<Self> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "kd" | "kd_tree" => BackendKind::Kd { rebuild_after: None },
            "sorted_map" | "sorted_list" => BackendKind::SortedMap,
            "hashtable" => BackendKind::Hashtable { precision: DEFAULT_PRECISION },
            // more buckets, each one narrower
            "hashtable_med" => BackendKind::Hashtable { precision: DEFAULT_PRECISION + 1 },
            "hashtable_large" => BackendKind::Hashtable { precision: DEFAULT_PRECISION + 2 },
            "bst" | "binary" | "fast_binary" => BackendKind::BalancedBst { balance: Balance::Plain },
            "avl" | "fast_avl" => BackendKind::BalancedBst { balance: Balance::Avl },
            "rb" | "red_black" | "fast_rb" => BackendKind::BalancedBst { balance: Balance::RedBlack },
            "interval" => BackendKind::Interval { ppm: DEFAULT_PPM },
            "list" => BackendKind::List,
            other => return Err(Error::Configuration(format!("unknown backend kind: {}", other))),
        };
        Ok(kind)
    }
}

/// Tolerances used to turn a query point into three boundaries
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchTolerance {
    pub ppm: f64,
    pub rt_offset: f64,
    pub ook0_tolerance: f64,
}

impl Default for SearchTolerance {
    fn default() -> Self {
        Self {
            ppm: 50.0,
            rt_offset: 100.0,
            ook0_tolerance: 0.05,
        }
    }
}

impl SearchTolerance {
    pub fn boundaries(&self, mz: f64, rt: f64, ook0: f64) -> [Boundary; 3] {
        [
            mz_boundary(mz, self.ppm),
            rt_boundary(rt, self.rt_offset),
            ook0_boundary(ook0, self.ook0_tolerance),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArboristConfig {
    /// Where partitions are saved and loaded
    pub directory: String,
    pub backend: BackendKind,
    pub tolerance: SearchTolerance,
}

impl Default for ArboristConfig {
    fn default() -> Self {
        Self {
            directory: "/tmp/psm_index".to_string(),
            backend: BackendKind::default(),
            tolerance: SearchTolerance::default(),
        }
    }
}

impl ArboristConfig {

    pub fn from_file(path: &Path) -> Result<Self> {

        let serialized = std::fs::read_to_string(path)?;
        let deserialized: Self =
            serde_yaml::from_str(&serialized).map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))?;
        deserialized.backend.validate()?;

        Ok(deserialized)
    }

    pub fn to_file(&self, path: &Path) -> Result<()> {

        let serialized = serde_yaml::to_string(&self).map_err(|e| Error::Configuration(e.to_string()))?;
        let mut file = File::create(path)?;
        file.write_all(serialized.as_bytes())?;

        Ok(())
    }
}

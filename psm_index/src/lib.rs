//! In-memory range indexes for peptide-spectrum matches (PSMs).
//!
//! Every record carries a charge state, three coordinates (mz, retention time and ion
//! mobility `ook0`) and an opaque JSON payload. Given a query point and a tolerance, the
//! index returns every record of the same charge whose coordinates all fall inside the
//! derived windows.
//!
//! Several interchangeable backends implement the same [`index::PsmIndex`] contract: a 3-d
//! kd tree, an mz-bucketed hashtable, a sorted map, a balanced binary search tree (AVL,
//! red-black or plain) and an interval tree. All but the kd tree index mz alone and filter
//! on rt and ook0 afterwards. [`arborist::Arborist`] keeps one backend per charge and saves
//! or restores them as a directory of text files.
//!
//! TODO
//! - [x] kd tree, hashtable, sorted map, balanced tree and interval backends with tests
//! - [x] per-charge coordinator with save/load
//! - [ ] remove from the kd tree without rebuilding the whole tree
//!
pub mod error;
pub mod boundary;
pub mod data;
pub mod io;
pub mod node;
pub mod tree;
pub mod bst;
pub mod bintree;
pub mod interval;
pub mod sorted_map;
pub mod hashtable;
pub mod list;
pub mod index;
pub mod config;
pub mod arborist;

pub use arborist::Arborist;
pub use boundary::Boundary;
pub use config::{ArboristConfig, BackendKind};
pub use data::Psm;
pub use error::{Error, Result};
pub use index::{Backend, PsmIndex};

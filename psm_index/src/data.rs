//! The indexed record: a peptide-spectrum match with a charge state, three coordinates and an
//! opaque payload.
//!
//! Records travel through persistence as single text lines:
//!
//! ```text
//! charge,mz,rt,ook0,{"json":"object"}
//! ```
//!
//! The payload is always the last field, so commas inside the JSON object never split it.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::boundary::Boundary;
use crate::error::{Error, Result};

/// Insertion-ordered key -> value map carried alongside a record but never searched.
pub type Payload = Map<String, Value>;

const FIELD_COUNT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct Psm {
    pub charge: i32,
    pub mz: f64,
    pub rt: f64,
    pub ook0: f64,
    pub data: Payload,
}

impl Psm {

    pub fn new(charge: i32, mz: f64, rt: f64, ook0: f64, data: Payload) -> Self {
        Self { charge, mz, rt, ook0, data }
    }

    /// Checks mz, then rt, then ook0 against their closed boundaries.
    pub fn in_boundary(&self, mz: &Boundary, rt: &Boundary, ook0: &Boundary) -> bool {
        mz.contains(self.mz) && rt.contains(self.rt) && ook0.contains(self.ook0)
    }

    pub fn coordinates(&self) -> [f64; 3] {
        [self.mz, self.rt, self.ook0]
    }

    /// Exact equality on all three coordinates
    pub fn is_at(&self, mz: f64, rt: f64, ook0: f64) -> bool {
        self.mz == mz && self.rt == rt && self.ook0 == ook0
    }

    /// Single line without the trailing newline
    pub fn serialize(&self) -> String {
        self.to_string()
    }

    pub fn deserialize(line: &str) -> Result<Self> {
        let trimmed = line.trim_end_matches(['\n', '\r']);
        let fields: Vec<&str> = trimmed.splitn(FIELD_COUNT, ',').collect();

        if fields.len() != FIELD_COUNT {
            return Err(Error::malformed(
                line,
                format!("expected {} fields, found {}", FIELD_COUNT, fields.len()),
            ));
        }

        let charge = fields[0]
            .trim()
            .parse::<i32>()
            .map_err(|e| Error::malformed(line, format!("charge: {}", e)))?;
        let mz = parse_coordinate(line, "mz", fields[1])?;
        let rt = parse_coordinate(line, "rt", fields[2])?;
        let ook0 = parse_coordinate(line, "ook0", fields[3])?;

        let data: Payload = serde_json::from_str(fields[4])
            .map_err(|e| Error::malformed(line, format!("payload: {}", e)))?;

        Ok(Self { charge, mz, rt, ook0, data })
    }
}

fn parse_coordinate(line: &str, name: &str, field: &str) -> Result<f64> {
    field
        .trim()
        .parse::<f64>()
        .map_err(|e| Error::malformed(line, format!("{}: {}", name, e)))
}

impl fmt::Display for Psm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        // a string-keyed map of json values always serializes
        let payload = serde_json::to_string(&self.data).map_err(|_| fmt::Error)?;
        write!(f, "{},{},{},{},{}", self.charge, self.mz, self.rt, self.ook0, payload)
    }
}

impl FromStr for Psm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::deserialize(s)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use rand::Rng;

    const RESIDUES: &[u8] = b"ARNDCEQGHILKMFPSTWYV";

    pub fn payload(sequence: &str) -> Payload {
        let mut data = Payload::new();
        data.insert("sequence".to_string(), Value::from(sequence));
        data
    }

    pub fn psm(charge: i32, mz: f64, rt: f64, ook0: f64, sequence: &str) -> Psm {
        Psm::new(charge, mz, rt, ook0, payload(sequence))
    }

    /// Fixed set used by the behavioural suites
    pub fn fixture() -> Vec<Psm> {
        vec![
            psm(1, 1005.0, 250.0, 0.9, "PEPTIDE"),
            psm(1, 1100.0, 260.0, 0.9, "PETIDE"),
            psm(1, 1150.0, 260.0, 0.9, "PETIDE"),
            psm(1, 1200.0, 252.0, 0.9, "PEP"),
            psm(2, 2000.0, 250.0, 0.9, "PEP"),
            psm(2, 1050.0, 300.0, 0.9, "PEPTI"),
            psm(3, 5000.0, 250.0, 0.9, "PEPTIDE"),
            psm(1, 3000.0, 250.0, 0.9, "PEPTIDE"),
        ]
    }

    /// mz clustered near 1000 so that tolerance windows overlap many records
    pub fn random_psm<R: Rng>(rng: &mut R) -> Psm {
        let length = rng.gen_range(6..30);
        let sequence: String = (0..length)
            .map(|_| RESIDUES[rng.gen_range(0..RESIDUES.len())] as char)
            .collect();

        let mz = 1000.0 + rng.gen_range(-30.0..30.0);
        let rt = rng.gen_range(0.0..250.0);
        let ook0 = mz / 1000.0 + rng.gen_range(-0.2..0.2);

        psm(rng.gen_range(1..=5), mz, rt, ook0, &sequence)
    }
}

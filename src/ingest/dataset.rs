//! The gridded glider dataset for one line.
//!
//! Mirrors the layout of the CUGN "potential" files: a fixed set of depth
//! levels (10 m spacing), one column per profile, and named
//! `(depth, profile)` variables.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::model::{CugnError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDataset {
    /// Depth of each level in metres.
    pub depth: Vec<f64>,
    /// Profile identifiers, unique within a line.
    pub profile: Vec<i64>,
    pub time: Vec<DateTime<Utc>>,
    #[serde(with = "super::nan_null::vec")]
    pub lon: Vec<f64>,
    #[serde(with = "super::nan_null::vec")]
    pub lat: Vec<f64>,
    /// Glider mission number per profile; may be omitted.
    #[serde(default)]
    pub mission: Vec<i64>,
    /// Named fields of shape `(depth.len(), profile.len())`.
    #[serde(with = "super::nan_null::fields")]
    pub variables: BTreeMap<String, Array2<f64>>,
}

impl ProfileDataset {
    pub fn n_depth(&self) -> usize {
        self.depth.len()
    }

    pub fn n_profile(&self) -> usize {
        self.profile.len()
    }

    /// Read and validate a dataset stored as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        let ds: ProfileDataset = super::read_json(path)?;
        ds.validate()?;
        Ok(ds)
    }

    /// Checks that every per-profile vector and variable matches the axes.
    pub fn validate(&self) -> Result<()> {
        let np = self.n_profile();
        for (name, len) in [
            ("time", self.time.len()),
            ("lon", self.lon.len()),
            ("lat", self.lat.len()),
        ] {
            if len != np {
                return Err(CugnError::ShapeMismatch(format!(
                    "{} has {} entries for {} profiles",
                    name, len, np
                )));
            }
        }
        if !self.mission.is_empty() && self.mission.len() != np {
            return Err(CugnError::ShapeMismatch(format!(
                "mission has {} entries for {} profiles",
                self.mission.len(),
                np
            )));
        }
        for (name, field) in &self.variables {
            if field.dim() != (self.n_depth(), np) {
                return Err(CugnError::ShapeMismatch(format!(
                    "variable '{}' has shape {:?}, expected ({}, {})",
                    name,
                    field.dim(),
                    self.n_depth(),
                    np
                )));
            }
        }
        Ok(())
    }

    pub fn variable(&self, name: &str) -> Result<&Array2<f64>> {
        self.variables
            .get(name)
            .ok_or_else(|| CugnError::MissingColumn(name.to_string()))
    }

    /// Map from profile id to its column index.
    pub fn profile_lookup(&self) -> HashMap<i64, usize> {
        self.profile
            .iter()
            .enumerate()
            .map(|(i, &p)| (p, i))
            .collect()
    }

    /// Keep only the profiles where `mask` is true.
    pub fn select_profiles(&self, mask: &[bool]) -> Result<ProfileDataset> {
        if mask.len() != self.n_profile() {
            return Err(CugnError::ShapeMismatch(format!(
                "profile mask has {} entries for {} profiles",
                mask.len(),
                self.n_profile()
            )));
        }
        let keep: Vec<usize> = (0..mask.len()).filter(|&i| mask[i]).collect();
        let pick_f = |v: &[f64]| keep.iter().map(|&i| v[i]).collect::<Vec<_>>();

        Ok(ProfileDataset {
            depth: self.depth.clone(),
            profile: keep.iter().map(|&i| self.profile[i]).collect(),
            time: keep.iter().map(|&i| self.time[i]).collect(),
            lon: pick_f(&self.lon),
            lat: pick_f(&self.lat),
            mission: if self.mission.is_empty() {
                Vec::new()
            } else {
                keep.iter().map(|&i| self.mission[i]).collect()
            },
            variables: self
                .variables
                .iter()
                .map(|(k, v)| (k.clone(), v.select(Axis(1), &keep)))
                .collect(),
        })
    }
}

//! Serde adapters that write missing values (NaN) as JSON `null`.
//!
//! Use with `#[serde(with = "...")]` on the numeric fields of stored
//! structures; plain `f64` fields would fail to read back a `null`.

use std::collections::BTreeMap;

use ndarray::Array2;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

fn to_opt(v: f64) -> Option<f64> {
    if v.is_nan() { None } else { Some(v) }
}

fn from_opt(v: Option<f64>) -> f64 {
    v.unwrap_or(f64::NAN)
}

/// `Vec<f64>`
pub mod vec {
    use super::*;

    pub fn serialize<S: Serializer>(values: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let wire: Vec<Option<f64>> = values.iter().map(|&v| to_opt(v)).collect();
        wire.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let wire = Vec::<Option<f64>>::deserialize(d)?;
        Ok(wire.into_iter().map(from_opt).collect())
    }
}

/// `BTreeMap<String, Vec<f64>>`
pub mod columns {
    use super::*;

    pub fn serialize<S: Serializer>(
        cols: &BTreeMap<String, Vec<f64>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let wire: BTreeMap<&str, Vec<Option<f64>>> = cols
            .iter()
            .map(|(k, v)| (k.as_str(), v.iter().map(|&x| to_opt(x)).collect()))
            .collect();
        wire.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<String, Vec<f64>>, D::Error> {
        let wire = BTreeMap::<String, Vec<Option<f64>>>::deserialize(d)?;
        Ok(wire
            .into_iter()
            .map(|(k, v)| (k, v.into_iter().map(from_opt).collect()))
            .collect())
    }
}

/// `BTreeMap<String, Array2<f64>>`, stored as `{shape, data}` in row-major order.
pub mod fields {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Field {
        shape: (usize, usize),
        data: Vec<Option<f64>>,
    }

    pub fn serialize<S: Serializer>(
        fields: &BTreeMap<String, Array2<f64>>,
        s: S,
    ) -> Result<S::Ok, S::Error> {
        let wire: BTreeMap<&str, Field> = fields
            .iter()
            .map(|(k, a)| {
                let field = Field {
                    shape: a.dim(),
                    data: a.iter().map(|&x| to_opt(x)).collect(),
                };
                (k.as_str(), field)
            })
            .collect();
        wire.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<BTreeMap<String, Array2<f64>>, D::Error> {
        let wire = BTreeMap::<String, Field>::deserialize(d)?;
        wire.into_iter()
            .map(|(k, f)| {
                let data: Vec<f64> = f.data.into_iter().map(from_opt).collect();
                Array2::from_shape_vec(f.shape, data)
                    .map(|a| (k, a))
                    .map_err(D::Error::custom)
            })
            .collect()
    }
}

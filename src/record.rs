// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A flat, named-field record used to save and restore convolution functions.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use indexmap::IndexMap;
use ndarray::prelude::*;
use num_complex::Complex64 as c64;
use serde::{Deserialize, Serialize};

use crate::store::StoreError;

/// A single value in a [`Record`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Int(i64),
    Float(f64),
    Str(String),
    IntVec(Vec<i64>),
    FloatVec(Vec<f64>),
    /// A 3D complex array. `data` holds interleaved real and imaginary parts
    /// in logical (row-major) order.
    ComplexCube { shape: [usize; 3], data: Vec<f64> },
}

impl RecordField {
    /// Copy a complex cube into a [`RecordField::ComplexCube`].
    pub fn from_cube(cube: ArrayView3<c64>) -> RecordField {
        let (a, b, c) = cube.dim();
        let mut data = Vec::with_capacity(cube.len() * 2);
        for v in cube.iter() {
            data.push(v.re);
            data.push(v.im);
        }
        RecordField::ComplexCube {
            shape: [a, b, c],
            data,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            RecordField::Int(_) => "int",
            RecordField::Float(_) => "float",
            RecordField::Str(_) => "string",
            RecordField::IntVec(_) => "int vector",
            RecordField::FloatVec(_) => "float vector",
            RecordField::ComplexCube { .. } => "complex cube",
        }
    }
}

/// Named fields, kept in the order they were defined.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record(IndexMap<String, RecordField>);

impl Record {
    /// An empty record.
    pub fn new() -> Record {
        Record::default()
    }

    /// Define (or redefine) a field.
    pub fn define<S: Into<String>>(&mut self, name: S, value: RecordField) {
        self.0.insert(name.into(), value);
    }

    /// Remove a field, keeping the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<RecordField> {
        self.0.shift_remove(name)
    }

    /// Get a field of any type.
    pub fn get(&self, name: &str) -> Option<&RecordField> {
        self.0.get(name)
    }

    /// Does this record have a field called `name`?
    pub fn is_defined(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The field names, in the order they were defined.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    fn require(&self, name: &str) -> Result<&RecordField, StoreError> {
        self.0.get(name).ok_or_else(|| StoreError::Deserialization {
            field: name.to_string(),
            reason: "field is absent".to_string(),
        })
    }

    fn wrong_type(name: &str, expected: &str, got: &RecordField) -> StoreError {
        StoreError::Deserialization {
            field: name.to_string(),
            reason: format!("expected a {expected}, but got a {}", got.type_name()),
        }
    }

    /// Get an int field. A missing field or a field of another type is a
    /// [`StoreError::Deserialization`] naming the field; the other getters
    /// behave the same way.
    pub fn get_int(&self, name: &str) -> Result<i64, StoreError> {
        match self.require(name)? {
            RecordField::Int(i) => Ok(*i),
            other => Err(Self::wrong_type(name, "int", other)),
        }
    }

    /// Get a non-negative int as a `usize`.
    pub fn get_usize(&self, name: &str) -> Result<usize, StoreError> {
        let i = self.get_int(name)?;
        usize::try_from(i).map_err(|_| StoreError::Deserialization {
            field: name.to_string(),
            reason: format!("{i} is negative"),
        })
    }

    /// Get a float field.
    pub fn get_float(&self, name: &str) -> Result<f64, StoreError> {
        match self.require(name)? {
            RecordField::Float(f) => Ok(*f),
            other => Err(Self::wrong_type(name, "float", other)),
        }
    }

    /// Get a string field.
    pub fn get_str(&self, name: &str) -> Result<&str, StoreError> {
        match self.require(name)? {
            RecordField::Str(s) => Ok(s),
            other => Err(Self::wrong_type(name, "string", other)),
        }
    }

    /// Get an int-vector field.
    pub fn get_int_vec(&self, name: &str) -> Result<&[i64], StoreError> {
        match self.require(name)? {
            RecordField::IntVec(v) => Ok(v),
            other => Err(Self::wrong_type(name, "int vector", other)),
        }
    }

    /// Get a vector of non-negative ints as `usize`s.
    pub fn get_usize_vec(&self, name: &str) -> Result<Vec<usize>, StoreError> {
        self.get_int_vec(name)?
            .iter()
            .map(|&i| {
                usize::try_from(i).map_err(|_| StoreError::Deserialization {
                    field: name.to_string(),
                    reason: format!("{i} is negative"),
                })
            })
            .collect()
    }

    /// Get a float-vector field.
    pub fn get_float_vec(&self, name: &str) -> Result<&[f64], StoreError> {
        match self.require(name)? {
            RecordField::FloatVec(v) => Ok(v),
            other => Err(Self::wrong_type(name, "float vector", other)),
        }
    }

    /// Get a complex-cube field as an array. The stored shape must match
    /// the number of stored values.
    pub fn get_complex_cube(&self, name: &str) -> Result<Array3<c64>, StoreError> {
        match self.require(name)? {
            RecordField::ComplexCube { shape, data } => {
                let n = shape.iter().product::<usize>();
                if data.len() != n * 2 {
                    return Err(StoreError::Deserialization {
                        field: name.to_string(),
                        reason: format!(
                            "shape {shape:?} needs {} values, but {} are present",
                            n * 2,
                            data.len()
                        ),
                    });
                }
                let values = data
                    .chunks_exact(2)
                    .map(|c| c64::new(c[0], c[1]))
                    .collect();
                Array3::from_shape_vec((shape[0], shape[1], shape[2]), values).map_err(|e| {
                    StoreError::Deserialization {
                        field: name.to_string(),
                        reason: e.to_string(),
                    }
                })
            }
            other => Err(Self::wrong_type(name, "complex cube", other)),
        }
    }

    /// Write this record as JSON.
    pub fn to_writer<W: Write>(&self, writer: W) -> Result<(), StoreError> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Read a record from JSON.
    pub fn from_reader<R: Read>(reader: R) -> Result<Record, StoreError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Save this record to a JSON file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let mut f = BufWriter::new(File::create(path)?);
        self.to_writer(&mut f)?;
        f.flush()?;
        Ok(())
    }

    /// Load a record from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Record, StoreError> {
        let f = BufReader::new(File::open(path)?);
        Record::from_reader(f)
    }
}

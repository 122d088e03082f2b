use std::collections::BTreeSet;

use log::info;
use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::error::{Error, Result};

/// A named column of raw cells; `None` marks a missing value.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<String>>,
}

impl Column {
    pub fn new(name: &str, values: Vec<Option<String>>) -> Self {
        Column {
            name: name.to_string(),
            values,
        }
    }

    /// Builds a fully observed column from numbers.
    pub fn from_f64(name: &str, values: &[f64]) -> Self {
        Column::new(name, values.iter().map(|v| Some(v.to_string())).collect())
    }
}

/// Column-oriented table as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let n = first.values.len();
            if let Some(bad) = columns.iter().find(|c| c.values.len() != n) {
                return Err(Error::Dimension(format!(
                    "column `{}` has {} rows, expected {}",
                    bad.name,
                    bad.values.len(),
                    n
                )));
            }
        }
        Ok(Table { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn nrows(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    /*
    What it does: Drops every row that has a missing value in any of the given columns

    Inputs: Column names to inspect (an empty slice inspects every column)
    Outputs: New table holding only the complete rows

    High-level logic:
    - Resolves the column names first so a typo is an error and not a silent no-op
    - Marks a row to keep when all inspected cells are Some
    - Rebuilds each column from the kept rows
     */
    pub fn drop_missing(&self, names: &[&str]) -> Result<Table> {
        let inspected: Vec<&Column> = if names.is_empty() {
            self.columns.iter().collect()
        } else {
            names
                .iter()
                .map(|name| self.column(name))
                .collect::<Result<_>>()?
        };

        let keep: Vec<bool> = (0..self.nrows())
            .map(|row| inspected.iter().all(|c| c.values[row].is_some()))
            .collect();

        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                values: c
                    .values
                    .iter()
                    .zip(&keep)
                    .filter(|&(_, &k)| k)
                    .map(|(v, _)| v.clone())
                    .collect(),
            })
            .collect();

        let dropped = keep.iter().filter(|&&k| !k).count();
        if dropped > 0 {
            info!("dropped {} of {} rows with missing values", dropped, keep.len());
        }
        Table::new(columns)
    }

    /// Parses a column as numbers. Missing or non-numeric cells are errors.
    pub fn numeric(&self, name: &str) -> Result<Array1<f64>> {
        let column = self.column(name)?;
        column
            .values
            .iter()
            .enumerate()
            .map(|(row, cell)| {
                let not_numeric = || Error::NotNumeric {
                    column: name.to_string(),
                    row,
                    value: cell.clone().unwrap_or_else(|| "<missing>".to_string()),
                };
                let text = cell.as_deref().ok_or_else(not_numeric)?;
                match text.trim().parse::<f64>() {
                    Ok(v) if v.is_finite() => Ok(v),
                    _ => Err(not_numeric()),
                }
            })
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from)
    }

    /// Distinct observed labels of a column, sorted.
    pub fn levels(&self, name: &str) -> Result<Vec<String>> {
        let column = self.column(name)?;
        let levels: BTreeSet<&str> = column.values.iter().flatten().map(|s| s.as_str()).collect();
        Ok(levels.into_iter().map(str::to_string).collect())
    }

    /*
    What it does: Recodes a two-label categorical column into 1.0 / 0.0

    Inputs: Column name and the label that should become 1.0
    Outputs: Array of 0/1 values

    High-level logic:
    - Collects the distinct labels and rejects columns with more than two labels
      or without the positive label
    - Missing cells are rejected, drop_missing should run first
     */
    pub fn binary(&self, name: &str, positive: &str) -> Result<Array1<f64>> {
        let levels = self.levels(name)?;
        let invalid = |reason: String| Error::InvalidLabels {
            column: name.to_string(),
            reason,
        };
        if levels.len() > 2 {
            return Err(invalid(format!(
                "{} distinct labels ({}), expected at most two",
                levels.len(),
                levels.join(", ")
            )));
        }
        if !levels.iter().any(|l| l == positive) {
            return Err(invalid(format!("label `{}` never occurs", positive)));
        }

        let column = self.column(name)?;
        column
            .values
            .iter()
            .enumerate()
            .map(|(row, cell)| match cell {
                Some(label) if label == positive => Ok(1.0),
                Some(_) => Ok(0.0),
                None => Err(invalid(format!("row {} is missing", row))),
            })
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from)
    }

    /// Treatment coding: one indicator per non-reference level, named `column[level]`.
    /// The first sorted level is the reference when none is given.
    pub fn dummies(&self, name: &str, reference: Option<&str>) -> Result<Vec<(String, Array1<f64>)>> {
        let levels = self.levels(name)?;
        let reference = match reference {
            Some(r) if levels.iter().any(|l| l == r) => r.to_string(),
            Some(r) => {
                return Err(Error::InvalidLabels {
                    column: name.to_string(),
                    reason: format!("reference level `{}` never occurs", r),
                });
            }
            None => levels
                .first()
                .cloned()
                .ok_or_else(|| Error::Empty(format!("column `{}` has no observed labels", name)))?,
        };

        let column = self.column(name)?;
        if let Some(row) = column.values.iter().position(Option::is_none) {
            return Err(Error::InvalidLabels {
                column: name.to_string(),
                reason: format!("row {} is missing", row),
            });
        }

        Ok(levels
            .iter()
            .filter(|level| **level != reference)
            .map(|level| {
                let indicator = column
                    .values
                    .iter()
                    .map(|cell| if cell.as_deref() == Some(level.as_str()) { 1.0 } else { 0.0 })
                    .collect::<Array1<f64>>();
                (format!("{}[{}]", name, level), indicator)
            })
            .collect())
    }
}

/// Mean and sample standard deviation of a covariate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Standardizer {
    pub mean: f64,
    pub sd: f64,
}

impl Standardizer {
    /// Fits on the given values; the column name is only used in the error.
    pub fn fit(name: &str, values: &Array1<f64>) -> Result<Self> {
        if values.len() < 2 {
            return Err(Error::ZeroVariance(name.to_string()));
        }
        let mean = values.mean().ok_or_else(|| Error::ZeroVariance(name.to_string()))?;
        let sd = values.std(1.0);
        if !(sd.is_finite() && sd > 0.0) {
            return Err(Error::ZeroVariance(name.to_string()));
        }
        Ok(Standardizer { mean, sd })
    }

    pub fn transform(&self, values: &Array1<f64>) -> Array1<f64> {
        values.mapv(|v| (v - self.mean) / self.sd)
    }

    pub fn inverse(&self, values: &Array1<f64>) -> Array1<f64> {
        values.mapv(|v| v * self.sd + self.mean)
    }

    /// Slope per raw unit from a slope per standard deviation.
    pub fn rescale_coefficient(&self, coefficient: f64) -> f64 {
        coefficient / self.sd
    }
}

#[derive(Debug, Clone)]
enum Term {
    Numeric(String),
    Categorical { name: String, reference: Option<String> },
}

/// How each design column was produced, kept to prepare new data identically.
#[derive(Debug, Clone, Serialize)]
pub struct DesignColumn {
    pub name: String,
    /// Table column the values come from.
    pub source: String,
    /// Level indicated by a dummy column; `None` for numeric predictors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    pub standardizer: Option<Standardizer>,
}

/// Design matrix (no intercept column) and its provenance.
#[derive(Debug, Clone)]
pub struct Design {
    pub x: Array2<f64>,
    pub columns: Vec<DesignColumn>,
    /// Every level seen per categorical predictor, reference included.
    levels: Vec<(String, Vec<String>)>,
}

impl Design {
    pub fn names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /*
    What it does: Applies the fitted design to new rows, e.g. for prediction

    Inputs: Table with the same predictor columns as the training data
    Outputs: Matrix with one column per design column (no intercept)

    High-level logic:
    - Numeric predictors are parsed and scaled with the standardizer fitted on
      the training data, never refitted
    - Dummy columns are rebuilt from their level; a label not seen in training
      is an error rather than a silent reference level
     */
    pub fn transform(&self, table: &Table) -> Result<Array2<f64>> {
        for (name, known) in &self.levels {
            let column = table.column(name)?;
            for (row, cell) in column.values.iter().enumerate() {
                match cell {
                    Some(label) if known.contains(label) => {}
                    Some(label) => {
                        return Err(Error::InvalidLabels {
                            column: name.clone(),
                            reason: format!("row {}: label `{}` was not seen when fitting", row, label),
                        });
                    }
                    None => {
                        return Err(Error::InvalidLabels {
                            column: name.clone(),
                            reason: format!("row {} is missing", row),
                        });
                    }
                }
            }
        }

        let blocks = self
            .columns
            .iter()
            .map(|c| match &c.level {
                Some(level) => Ok(table
                    .column(&c.source)?
                    .values
                    .iter()
                    .map(|cell| if cell.as_deref() == Some(level.as_str()) { 1.0 } else { 0.0 })
                    .collect::<Array1<f64>>()),
                None => {
                    let raw = table.numeric(&c.source)?;
                    Ok(match c.standardizer {
                        Some(scaler) => scaler.transform(&raw),
                        None => raw,
                    })
                }
            })
            .collect::<Result<Vec<Array1<f64>>>>()?;
        Ok(Array2::from_shape_fn((table.nrows(), blocks.len()), |(i, j)| blocks[j][i]))
    }
}

/// Assembles predictors from a table into a design matrix.
#[derive(Debug, Clone)]
pub struct DesignBuilder {
    terms: Vec<Term>,
    standardize: bool,
}

impl Default for DesignBuilder {
    fn default() -> Self {
        DesignBuilder {
            terms: Vec::new(),
            standardize: true,
        }
    }
}

impl DesignBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn numeric(mut self, name: &str) -> Self {
        self.terms.push(Term::Numeric(name.to_string()));
        self
    }

    pub fn categorical(mut self, name: &str, reference: Option<&str>) -> Self {
        self.terms.push(Term::Categorical {
            name: name.to_string(),
            reference: reference.map(str::to_string),
        });
        self
    }

    pub fn standardize(mut self, standardize: bool) -> Self {
        self.standardize = standardize;
        self
    }

    /// Column names whose missing values make a row unusable.
    pub fn referenced_columns(&self) -> Vec<&str> {
        self.terms
            .iter()
            .map(|t| match t {
                Term::Numeric(name) => name.as_str(),
                Term::Categorical { name, .. } => name.as_str(),
            })
            .collect()
    }

    pub fn build(&self, table: &Table) -> Result<Design> {
        let n = table.nrows();
        let mut blocks: Vec<Array1<f64>> = Vec::new();
        let mut columns = Vec::new();
        let mut levels = Vec::new();

        for term in &self.terms {
            match term {
                Term::Numeric(name) => {
                    let raw = table.numeric(name)?;
                    let standardizer = if self.standardize {
                        Some(Standardizer::fit(name, &raw)?)
                    } else {
                        None
                    };
                    blocks.push(match standardizer {
                        Some(scaler) => scaler.transform(&raw),
                        None => raw,
                    });
                    columns.push(DesignColumn {
                        name: name.clone(),
                        source: name.clone(),
                        level: None,
                        standardizer,
                    });
                }
                Term::Categorical { name, reference } => {
                    let dummies = table.dummies(name, reference.as_deref())?;
                    let coded: Vec<String> = table.levels(name)?;
                    for (dummy, values) in dummies {
                        let level = coded.iter().find(|l| dummy == format!("{}[{}]", name, l)).cloned();
                        blocks.push(values);
                        columns.push(DesignColumn {
                            name: dummy,
                            source: name.clone(),
                            level,
                            standardizer: None,
                        });
                    }
                    levels.push((name.clone(), coded));
                }
            }
        }

        let x = Array2::from_shape_fn((n, blocks.len()), |(i, j)| blocks[j][i]);
        Ok(Design { x, columns, levels })
    }
}

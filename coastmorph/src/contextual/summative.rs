//! Summative (contextual) characters of settlements.
//!
//! Every building row carries the primary characters of the building, its
//! street segment, tessellation cell and block. A settlement, or each of its
//! parts, is described by three statistics per character:
//!
//! * `<metric>_meanIQ`: mean of the interquartile-trimmed observations
//! * `<metric>_rangeIQ`: interquartile range of the untrimmed observations
//! * `<metric>_TheilID`: Theil index of the inter-decile-trimmed observations
//!
//! Characters of the seashore street (`sdsLen`) are computed on the rows
//! flagged `case` only.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::collect::global_variables::{SEASHORE_METRICS, SUMMATIVE_METRICS};
use crate::commons::error::{MorphoError, MorphoResult};
use crate::commons::statistics::{mean_iq, range_iq, theil_id};

/// Settlement, plus the part when the settlement was split manually
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey {
    pub settlement: String,
    pub part: Option<String>,
}

impl GroupKey {
    pub fn new(settlement: impl Into<String>, part: Option<String>) -> Self {
        GroupKey {
            settlement: settlement.into(),
            part,
        }
    }

    /// Row label of the output tables: the settlement name with the part
    /// appended
    pub fn label(&self) -> String {
        match &self.part {
            Some(part) => format!("{}{}", self.settlement, part),
            None => self.settlement.clone(),
        }
    }
}

/// One building (or feature) with its measured characters
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRow {
    pub key: GroupKey,
    /// Linked to the seashore street
    pub case: bool,
    /// Aligned with `MeasurementTable::columns`, `None` when missing
    pub values: Vec<Option<f64>>,
}

/// Per-feature characters of one or more settlements
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementTable {
    columns: Vec<String>,
    rows: Vec<MeasurementRow>,
}

impl MeasurementTable {
    pub fn new(columns: Vec<String>) -> Self {
        MeasurementTable {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[MeasurementRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(
        &mut self,
        key: GroupKey,
        case: bool,
        values: Vec<Option<f64>>,
    ) -> MorphoResult<()> {
        if values.len() != self.columns.len() {
            return Err(MorphoError::MissingColumn(format!(
                "row has {} values for {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.rows.push(MeasurementRow { key, case, values });
        Ok(())
    }

    /// Append the rows of another table; columns are matched by name and
    /// columns unknown to `other` are left missing
    pub fn extend(&mut self, other: MeasurementTable) {
        let mut positions: Vec<Option<usize>> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            positions.push(other.columns.iter().position(|c| c == column));
        }
        for (idx, column) in other.columns.iter().enumerate() {
            if !self.columns.contains(column) {
                self.columns.push(column.clone());
                for row in &mut self.rows {
                    row.values.push(None);
                }
                positions.push(Some(idx));
            }
        }
        for row in other.rows {
            let values = positions
                .iter()
                .map(|&pos| pos.and_then(|p| row.values[p]))
                .collect();
            self.rows.push(MeasurementRow {
                key: row.key,
                case: row.case,
                values,
            });
        }
    }

    pub fn column_index(&self, name: &str) -> MorphoResult<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| MorphoError::MissingColumn(name.to_string()))
    }

    /// Rows grouped by settlement and part, groups in order of first
    /// appearance
    pub fn groups(&self) -> Vec<(GroupKey, Vec<&MeasurementRow>)> {
        let mut order: Vec<(GroupKey, Vec<&MeasurementRow>)> = Vec::new();
        let mut index: HashMap<&GroupKey, usize> = HashMap::new();
        for row in &self.rows {
            match index.get(&row.key) {
                Some(&slot) => order[slot].1.push(row),
                None => {
                    index.insert(&row.key, order.len());
                    order.push((row.key.clone(), vec![row]));
                }
            }
        }
        order
    }
}

/// What to do with a statistic that cannot be computed for a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UndefinedPolicy {
    /// Write NaN (an empty CSV cell) and carry on
    #[default]
    Nan,
    /// Abort the group with the underlying error
    Fail,
}

impl UndefinedPolicy {
    fn apply(self, value: MorphoResult<f64>) -> MorphoResult<f64> {
        match (value, self) {
            (Ok(v), _) => Ok(v),
            (Err(e), UndefinedPolicy::Nan) if e.is_undefined() => Ok(f64::NAN),
            (Err(e), _) => Err(e),
        }
    }
}

/// Characters to summarise and how
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryOptions {
    /// Summarised over every row of a group
    pub metrics: Vec<String>,
    /// Summarised over the `case` rows of a group only
    pub restricted_metrics: Vec<String>,
    pub policy: UndefinedPolicy,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        SummaryOptions {
            metrics: SUMMATIVE_METRICS.iter().map(|m| m.to_string()).collect(),
            restricted_metrics: SEASHORE_METRICS.iter().map(|m| m.to_string()).collect(),
            policy: UndefinedPolicy::Nan,
        }
    }
}

impl SummaryOptions {
    pub fn new(metrics: &[&str], restricted_metrics: &[&str]) -> Self {
        SummaryOptions {
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
            restricted_metrics: restricted_metrics.iter().map(|m| m.to_string()).collect(),
            policy: UndefinedPolicy::Nan,
        }
    }

    pub fn with_policy(mut self, policy: UndefinedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Output column order; a name listed in both sets is only summarised
    /// over the `case` rows
    fn summarised(&self) -> Vec<(&str, bool)> {
        let mut out: Vec<(&str, bool)> = self
            .metrics
            .iter()
            .filter(|m| !self.restricted_metrics.contains(m))
            .map(|m| (m.as_str(), false))
            .collect();
        out.extend(self.restricted_metrics.iter().map(|m| (m.as_str(), true)));
        out
    }
}

/// The three statistics of one character within one group
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSummary {
    pub mean_iq: f64,
    pub range_iq: f64,
    pub theil_id: f64,
}

impl MetricSummary {
    fn compute(observations: &[f64], policy: UndefinedPolicy) -> MorphoResult<Self> {
        // trimmed paths
        let mean_iq = policy.apply(mean_iq(observations))?;
        let theil_id = policy.apply(theil_id(observations))?;
        // untrimmed path
        let range_iq = policy.apply(range_iq(observations))?;
        Ok(MetricSummary {
            mean_iq,
            range_iq,
            theil_id,
        })
    }
}

/// Output row: one settlement or settlement part
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub key: GroupKey,
    /// Aligned with `SummaryTable::metrics`
    pub summaries: Vec<MetricSummary>,
}

impl SummaryRow {
    pub fn label(&self) -> String {
        self.key.label()
    }

    /// Flattened values in `SummaryTable::header` order
    pub fn values(&self) -> Vec<f64> {
        self.summaries
            .iter()
            .flat_map(|s| [s.mean_iq, s.range_iq, s.theil_id])
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryTable {
    metrics: Vec<String>,
    rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    pub fn rows(&self) -> &[SummaryRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Derived column names, three per metric
    pub fn columns(&self) -> Vec<String> {
        self.metrics
            .iter()
            .flat_map(|m| {
                [
                    format!("{}_meanIQ", m),
                    format!("{}_rangeIQ", m),
                    format!("{}_TheilID", m),
                ]
            })
            .collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.rows.iter().map(SummaryRow::label).collect()
    }

    /// Row-major matrix of all derived values
    pub fn matrix(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(SummaryRow::values).collect()
    }

    /// Value of a derived column (e.g. `sdbAre_meanIQ`) for a row label
    pub fn get(&self, label: &str, column: &str) -> Option<f64> {
        let col = self.columns().iter().position(|c| c == column)?;
        let row = self.rows.iter().find(|r| r.label() == label)?;
        row.values().get(col).copied()
    }

    /// Append the rows of another table with the same metrics
    pub fn append(&mut self, other: SummaryTable) -> MorphoResult<()> {
        if self.rows.is_empty() && self.metrics.is_empty() {
            *self = other;
            return Ok(());
        }
        if other.metrics != self.metrics {
            let missing = other
                .metrics
                .iter()
                .chain(self.metrics.iter())
                .find(|m| !self.metrics.contains(m) || !other.metrics.contains(m))
                .cloned()
                .unwrap_or_default();
            return Err(MorphoError::MissingColumn(missing));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    /// Drop the rows holding an undefined (NaN) value and return their labels
    pub fn retain_complete(&mut self) -> Vec<String> {
        let mut dropped = Vec::new();
        self.rows.retain(|row| {
            let complete = row.values().iter().all(|v| !v.is_nan());
            if !complete {
                dropped.push(row.label());
            }
            complete
        });
        dropped
    }

    /// Convert to a Polars DataFrame with a `place` label column
    #[cfg(feature = "polars")]
    pub fn to_polars_df(&self) -> anyhow::Result<polars::prelude::DataFrame> {
        use anyhow::Context;
        use polars::prelude::*;

        let mut columns: Vec<Column> = Vec::with_capacity(1 + self.metrics.len() * 3);
        columns.push(Column::new("place".into(), self.labels()));
        let matrix = self.matrix();
        for (idx, name) in self.columns().into_iter().enumerate() {
            let values: Vec<f64> = matrix.iter().map(|row| row[idx]).collect();
            columns.push(Column::new(name.into(), values));
        }

        DataFrame::new(columns).context("Failed to create DataFrame")
    }
}

/// Present values of a column; missing cells are dropped, so they never turn
/// a statistic into NaN on their own
fn observations(rows: &[&MeasurementRow], column: usize, seashore_only: bool) -> Vec<f64> {
    rows.iter()
        .filter(|row| !seashore_only || row.case)
        .filter_map(|row| row.values[column])
        .collect()
}

/// Summative characters of every group of the table.
///
/// Produces exactly one row per distinct (settlement, part) pair, in order of
/// first appearance. A missing column fails the whole call; undefined
/// statistics follow `options.policy`.
pub fn summarize(table: &MeasurementTable, options: &SummaryOptions) -> MorphoResult<SummaryTable> {
    let summarised = options.summarised();
    let columns: Vec<(usize, bool)> = summarised
        .iter()
        .map(|(name, seashore_only)| Ok((table.column_index(name)?, *seashore_only)))
        .collect::<MorphoResult<_>>()?;

    let summarize_group = |(key, rows): (GroupKey, Vec<&MeasurementRow>)| -> MorphoResult<SummaryRow> {
        let summaries = columns
            .iter()
            .map(|&(column, seashore_only)| {
                MetricSummary::compute(&observations(&rows, column, seashore_only), options.policy)
            })
            .collect::<MorphoResult<Vec<_>>>()?;
        Ok(SummaryRow { key, summaries })
    };

    #[cfg(feature = "rayon")]
    let rows = table
        .groups()
        .into_par_iter()
        .map(summarize_group)
        .collect::<MorphoResult<Vec<_>>>()?;

    #[cfg(not(feature = "rayon"))]
    let rows = table
        .groups()
        .into_iter()
        .map(summarize_group)
        .collect::<MorphoResult<Vec<_>>>()?;

    Ok(SummaryTable {
        metrics: summarised.iter().map(|(name, _)| name.to_string()).collect(),
        rows,
    })
}

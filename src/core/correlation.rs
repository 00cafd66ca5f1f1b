//! Pairwise-complete Pearson and Spearman correlation over a pruned panel.
//!
//! Every reduction runs sequentially in row order, so the same panel always
//! yields bit-identical matrices. A cell that cannot be estimated (too little
//! overlap, or a constant input) is `None`, never `0.0` or `1.0`.
use crate::core::error::{PipelineError, Result};
use crate::core::panel::Panel;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use tracing::debug;

/// Fewest panel rows for which a correlation is meaningful.
pub const MIN_ROWS: usize = 3;
pub const MIN_COLUMNS: usize = 2;
/// Fewest overlapping observations behind a single cell.
pub const MIN_PAIR_OBSERVATIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CorrelationKind {
    Pearson,
    Spearman,
}

impl CorrelationKind {
    pub const ALL: [CorrelationKind; 2] = [CorrelationKind::Pearson, CorrelationKind::Spearman];

    pub fn slug(&self) -> &'static str {
        match self {
            CorrelationKind::Pearson => "pearson",
            CorrelationKind::Spearman => "spearman",
        }
    }
}

impl Display for CorrelationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CorrelationKind::Pearson => "Pearson",
                CorrelationKind::Spearman => "Spearman",
            }
        )
    }
}

impl FromStr for CorrelationKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pearson" => Ok(CorrelationKind::Pearson),
            "spearman" => Ok(CorrelationKind::Spearman),
            _ => Err(anyhow::anyhow!("Invalid correlation kind: {}", s)),
        }
    }
}

/// Square, symmetric matrix over the panel's columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub kind: CorrelationKind,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

impl CorrelationMatrix {
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.values.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    pub fn get_by_name(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.columns.iter().position(|c| c == a)?;
        let j = self.columns.iter().position(|c| c == b)?;
        self.get(i, j)
    }

    pub fn size(&self) -> usize {
        self.columns.len()
    }
}

/// Both matrices, computed from the same panel rows.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationSet {
    pub pearson: CorrelationMatrix,
    pub spearman: CorrelationMatrix,
}

impl CorrelationSet {
    pub fn get(&self, kind: CorrelationKind) -> &CorrelationMatrix {
        match kind {
            CorrelationKind::Pearson => &self.pearson,
            CorrelationKind::Spearman => &self.spearman,
        }
    }
}

pub fn correlate(panel: &Panel) -> Result<CorrelationSet> {
    if panel.column_count() < MIN_COLUMNS || panel.row_count() < MIN_ROWS {
        return Err(PipelineError::InsufficientPanelData {
            rows: panel.row_count(),
            columns: panel.column_count(),
            min_rows: MIN_ROWS,
            min_columns: MIN_COLUMNS,
        });
    }

    let columns: Vec<Vec<Option<f64>>> = (0..panel.column_count())
        .map(|c| panel.column_values(c))
        .collect();

    Ok(CorrelationSet {
        pearson: matrix(panel, &columns, CorrelationKind::Pearson),
        spearman: matrix(panel, &columns, CorrelationKind::Spearman),
    })
}

fn matrix(panel: &Panel, columns: &[Vec<Option<f64>>], kind: CorrelationKind) -> CorrelationMatrix {
    let n = columns.len();
    let mut values = vec![vec![None; n]; n];

    for i in 0..n {
        for j in i..n {
            let (xs, ys) = pairwise_complete(&columns[i], &columns[j]);
            let cell = match kind {
                CorrelationKind::Pearson => pearson(&xs, &ys),
                CorrelationKind::Spearman => spearman(&xs, &ys),
            };
            // Self-correlation is exactly one whenever it is defined at all.
            let cell = if i == j { cell.map(|_| 1.0) } else { cell };
            values[i][j] = cell;
            values[j][i] = cell;
        }
    }

    let undefined = values.iter().flatten().filter(|v| v.is_none()).count();
    debug!(%kind, size = n, undefined, "Computed correlation matrix");

    CorrelationMatrix {
        kind,
        columns: panel.columns().to_vec(),
        values,
    }
}

/// Values of two columns restricted to rows where both are present.
fn pairwise_complete(a: &[Option<f64>], b: &[Option<f64>]) -> (Vec<f64>, Vec<f64>) {
    a.iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip()
}

fn is_constant(values: &[f64]) -> bool {
    values.iter().all(|v| *v == values[0])
}

pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let n = xs.len();
    if n < MIN_PAIR_OBSERVATIONS || n != ys.len() || is_constant(xs) || is_constant(ys) {
        return None;
    }

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}

pub fn spearman(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() {
        return None;
    }
    pearson(&average_ranks(xs), &average_ranks(ys))
}

/// 1-based ranks; tied values share the mean of the ranks they span.
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]).then(a.cmp(b)));

    let mut ranks = vec![0.0; values.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        // Positions start..end hold ranks start+1..=end.
        let rank = (start + 1 + end) as f64 / 2.0;
        for idx in &order[start..end] {
            ranks[*idx] = rank;
        }
        start = end;
    }
    ranks
}

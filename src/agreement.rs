//! Inter-rater reliability: pairwise nominal Krippendorff's alpha.
//!
//! Alpha is computed head-to-head for each rater pair over the sub-table
//! of items both raters labeled, rather than from a single global
//! coincidence matrix. That is the intended comparison semantics for this
//! harness, not an approximation of the multi-rater form.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use serde::Serialize;

/// Categorical label code. The causal task uses {0, 1}; the math below
/// works over any finite category set actually observed in the data.
pub type Label = u8;

// =============================================================================
// Data model
// =============================================================================

/// One annotated sentence: identity text plus one cell per rater.
///
/// Missing ratings are `None`, never a sentinel value.
#[derive(Debug, Clone)]
pub struct RatingRow {
    pub sentence: String,
    /// Parallel to `RatingMatrix::raters`.
    pub cells: Vec<Option<Label>>,
}

/// Items × raters label table, produced by the dataset layer.
#[derive(Debug, Clone, Default)]
pub struct RatingMatrix {
    /// Rater identifiers, in column order.
    pub raters: Vec<String>,
    pub items: Vec<RatingRow>,
}

/// Head-to-head agreement for one unordered rater pair.
#[derive(Debug, Clone, Serialize)]
pub struct PairwiseAgreement {
    pub rater_a: String,
    pub rater_b: String,
    /// Items where both raters have a label. Always >= 2.
    pub n_items: usize,
    /// `None` when alpha is undefined (degenerate denominator).
    pub alpha: Option<f64>,
}

/// Ranked pairwise agreement table.
#[derive(Debug, Clone, Default)]
pub struct AgreementTable {
    /// Sorted by alpha descending; undefined alphas sort last.
    pub pairs: Vec<PairwiseAgreement>,
}

impl AgreementTable {
    /// Mean alpha over pairs where alpha is defined.
    pub fn mean_alpha(&self) -> Option<f64> {
        let defined: Vec<f64> = self.pairs.iter().filter_map(|p| p.alpha).collect();
        if defined.is_empty() {
            return None;
        }
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    }

    /// Median alpha over pairs where alpha is defined. Even counts
    /// interpolate between the two middle values.
    pub fn median_alpha(&self) -> Option<f64> {
        let mut defined: Vec<f64> = self.pairs.iter().filter_map(|p| p.alpha).collect();
        if defined.is_empty() {
            return None;
        }
        defined.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let mid = defined.len() / 2;
        if defined.len() % 2 == 1 {
            Some(defined[mid])
        } else {
            Some((defined[mid - 1] + defined[mid]) / 2.0)
        }
    }
}

// =============================================================================
// Alpha
// =============================================================================

/// Nominal Krippendorff's alpha over an items × raters sub-table.
///
/// Observed disagreement:
///   Do = Σ_i Σ_c n_ic (m_i − n_ic) / Σ_i m_i (m_i − 1)
/// over items with at least two ratings; expected disagreement
///   De = 1 − Σ_c p_c²
/// with p_c the category's share of all non-missing cells. Categories with
/// zero observed count are excluded, not assumed.
///
/// Returns `None` when alpha is undefined: no item has two ratings, or
/// De = 0 with Do ≠ 0. A single observed category with perfect agreement
/// yields exactly 1.0.
pub fn alpha_nominal<R: AsRef<[Option<Label>]>>(rows: &[R]) -> Option<f64> {
    let categories: BTreeSet<Label> = rows
        .iter()
        .flat_map(|r| r.as_ref().iter().flatten().copied())
        .collect();

    let mut do_num: u64 = 0;
    let mut do_den: u64 = 0;
    for row in rows {
        let vals: Vec<Label> = row.as_ref().iter().flatten().copied().collect();
        let m = vals.len() as u64;
        if m <= 1 {
            continue;
        }
        do_den += m * (m - 1);
        for &c in &categories {
            let n = vals.iter().filter(|&&v| v == c).count() as u64;
            do_num += n * (m - n);
        }
    }
    if do_den == 0 {
        return None;
    }
    let do_ = do_num as f64 / do_den as f64;

    let n_tot: u64 = rows
        .iter()
        .map(|r| r.as_ref().iter().flatten().count() as u64)
        .sum();
    if n_tot == 0 {
        return None;
    }
    let de = 1.0
        - categories
            .iter()
            .map(|&c| {
                let n = rows
                    .iter()
                    .map(|r| r.as_ref().iter().flatten().filter(|&&v| v == c).count() as u64)
                    .sum::<u64>();
                let p = n as f64 / n_tot as f64;
                p * p
            })
            .sum::<f64>();

    if de == 0.0 {
        return if do_num == 0 { Some(1.0) } else { None };
    }
    Some(1.0 - do_ / de)
}

/// Alpha for every unordered rater pair with at least two jointly labeled
/// items. Pairs below that threshold are skipped entirely; they do not
/// appear in the output, not even as undefined.
///
/// The result is sorted by alpha descending; pairs whose alpha is
/// undefined sort after every defined value.
pub fn pairwise_table(matrix: &RatingMatrix) -> AgreementTable {
    let mut pairs = Vec::new();
    for a in 0..matrix.raters.len() {
        for b in (a + 1)..matrix.raters.len() {
            let sub: Vec<[Option<Label>; 2]> = matrix
                .items
                .iter()
                .filter(|row| row.cells[a].is_some() && row.cells[b].is_some())
                .map(|row| [row.cells[a], row.cells[b]])
                .collect();
            if sub.len() < 2 {
                continue;
            }
            pairs.push(PairwiseAgreement {
                rater_a: matrix.raters[a].clone(),
                rater_b: matrix.raters[b].clone(),
                n_items: sub.len(),
                alpha: alpha_nominal(&sub),
            });
        }
    }

    pairs.sort_by(|x, y| match (x.alpha, y.alpha) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });

    AgreementTable { pairs }
}

// =============================================================================
// TESTS
// =============================================================================

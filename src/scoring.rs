//! Prediction-vs-gold evaluation: label normalization, text join, and
//! confusion-matrix metrics for the positive class 1.

use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

// =============================================================================
// Data model
// =============================================================================

/// One gold row: sentence text plus the label column's raw value, kept
/// un-normalized until evaluation.
#[derive(Debug, Clone)]
pub struct GoldRecord {
    pub text: String,
    pub raw_label: String,
}

/// One model prediction row as loaded from a prediction file.
#[derive(Debug, Clone)]
pub struct PredictionRecord {
    pub text: String,
    pub raw_label: String,
    pub confidence: Option<f64>,
}

/// A gold/prediction pair that survived the join and normalization.
#[derive(Debug, Clone, Serialize)]
pub struct MergedRow {
    pub text: String,
    pub y_true: i64,
    pub y_pred: i64,
    pub confidence: Option<f64>,
}

/// Scalar classification metrics. Confusion counts follow the
/// (tn, fp, fn, tp) order.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Metrics {
    pub n: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub true_neg: usize,
    pub false_pos: usize,
    pub false_neg: usize,
    pub true_pos: usize,
}

/// Full evaluation output: scalar metrics plus the merged rows for
/// inspection/export.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub metrics: Metrics,
    pub rows: Vec<MergedRow>,
}

#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("no overlapping rows between gold and predictions; make sure 'text' matches exactly")]
    EmptyOverlap,
}

// =============================================================================
// Normalization
// =============================================================================

/// Normalize a raw label value to an integer, or `None` if it does not
/// parse.
///
/// Blank and "nan" mean missing. "true"/"yes" and "false"/"no" map to
/// 1 and 0 case-insensitively; anything else coerces float-then-int, so
/// "1.0" is 1 and "2.0" stays 2 (the metrics treat exactly 1 as the
/// positive class).
pub fn normalize_label(raw: &str) -> Option<i64> {
    let t = raw.trim().to_lowercase();
    if t.is_empty() || t == "nan" {
        return None;
    }
    match t.as_str() {
        "1" | "true" | "yes" => return Some(1),
        "0" | "false" | "no" => return Some(0),
        _ => {}
    }
    let v: f64 = t.parse().ok()?;
    if !v.is_finite() {
        return None;
    }
    Some(v.trunc() as i64)
}

// =============================================================================
// Evaluation
// =============================================================================

/// Join gold and predictions on exact text, normalize both label sides,
/// and compute metrics over the rows where both normalize.
///
/// The join is inner: rows present on only one side are dropped. Gold
/// order drives the output; duplicate prediction texts resolve to the
/// last occurrence. An empty surviving row set is an error, never a
/// silent zero-metric report.
pub fn evaluate(
    gold: &[GoldRecord],
    predictions: &[PredictionRecord],
) -> Result<Evaluation, ScoringError> {
    let by_text: HashMap<&str, &PredictionRecord> =
        predictions.iter().map(|p| (p.text.as_str(), p)).collect();

    let mut rows = Vec::new();
    for g in gold {
        let Some(pred) = by_text.get(g.text.as_str()) else {
            continue;
        };
        let (Some(y_true), Some(y_pred)) = (
            normalize_label(&g.raw_label),
            normalize_label(&pred.raw_label),
        ) else {
            continue;
        };
        rows.push(MergedRow {
            text: g.text.clone(),
            y_true,
            y_pred,
            confidence: pred.confidence,
        });
    }

    if rows.is_empty() {
        return Err(ScoringError::EmptyOverlap);
    }

    Ok(Evaluation {
        metrics: compute_metrics(&rows),
        rows,
    })
}

/// Accuracy is exact match over normalized integers; precision, recall,
/// and F1 take 1 as the positive class, with zero-division yielding 0.
fn compute_metrics(rows: &[MergedRow]) -> Metrics {
    let n = rows.len();
    let mut true_neg = 0;
    let mut false_pos = 0;
    let mut false_neg = 0;
    let mut true_pos = 0;
    let mut matches = 0;
    for r in rows {
        if r.y_true == r.y_pred {
            matches += 1;
        }
        match (r.y_true == 1, r.y_pred == 1) {
            (true, true) => true_pos += 1,
            (false, true) => false_pos += 1,
            (true, false) => false_neg += 1,
            (false, false) => true_neg += 1,
        }
    }

    let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let precision = ratio(true_pos, true_pos + false_pos);
    let recall = ratio(true_pos, true_pos + false_neg);
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    Metrics {
        n,
        accuracy: ratio(matches, n),
        precision,
        recall,
        f1,
        true_neg,
        false_pos,
        false_neg,
        true_pos,
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! CSV loaders and writers for the harness's tabular interfaces.
//!
//! Column conventions follow the annotated data sets: a `Sentence`
//! identity column plus one column per rater in the rating table; `text`
//! as the identity column everywhere downstream; blank cells and the
//! literal "nan" both mean missing.

use std::path::Path;

use thiserror::Error;

use crate::agreement::{AgreementTable, Label, RatingMatrix, RatingRow};
use crate::annotator::AnnotationResult;
use crate::scoring::{GoldRecord, MergedRow, PredictionRecord};

/// Identity column in rating and gold files.
pub const SENTENCE_COLUMN: &str = "Sentence";
/// Identity column in sentence, prediction, and merged files.
pub const TEXT_COLUMN: &str = "text";
/// Default gold-label column.
pub const DEFAULT_GOLD_COLUMN: &str = "Causal";

#[derive(Debug, Error)]
pub enum DatasetError {
    /// A required column is absent. Terminal before any processing.
    #[error("missing required column '{column}' in {path}")]
    MissingColumn { column: String, path: String },

    #[error("invalid rating '{value}' at row {row}, column '{column}'")]
    InvalidRating {
        row: usize,
        column: String,
        value: String,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

fn column_index(
    headers: &csv::StringRecord,
    column: &str,
    path: &Path,
) -> Result<usize, DatasetError> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| DatasetError::MissingColumn {
            column: column.into(),
            path: path.display().to_string(),
        })
}

/// Blank and "nan" (any case) are missing; anything else must be a
/// numeric category code.
fn parse_rating_cell(
    raw: &str,
    row: usize,
    column: &str,
) -> Result<Option<Label>, DatasetError> {
    let t = raw.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    let invalid = || DatasetError::InvalidRating {
        row,
        column: column.into(),
        value: raw.into(),
    };
    let v: f64 = t.parse().map_err(|_| invalid())?;
    if !v.is_finite() {
        return Err(invalid());
    }
    Label::try_from(v.trunc() as i64).map(Some).map_err(|_| invalid())
}

// =============================================================================
// Loaders
// =============================================================================

/// Load the items × raters rating table. Every non-`Sentence` column is a
/// rater.
pub fn load_rating_matrix(path: &Path) -> Result<RatingMatrix, DatasetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let sentence_idx = column_index(&headers, SENTENCE_COLUMN, path)?;

    let rater_columns: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != sentence_idx)
        .map(|(i, h)| (i, h.to_string()))
        .collect();

    let mut items = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        let mut cells = Vec::with_capacity(rater_columns.len());
        for (col_idx, name) in &rater_columns {
            let raw = record.get(*col_idx).unwrap_or_default();
            cells.push(parse_rating_cell(raw, row_idx, name)?);
        }
        items.push(RatingRow {
            sentence: record.get(sentence_idx).unwrap_or_default().to_string(),
            cells,
        });
    }

    Ok(RatingMatrix {
        raters: rater_columns.into_iter().map(|(_, name)| name).collect(),
        items,
    })
}

/// Load sentences from a `text` column, skipping blanks.
pub fn load_sentences(path: &Path) -> Result<Vec<String>, DatasetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let text_idx = column_index(&headers, TEXT_COLUMN, path)?;

    let mut sentences = Vec::new();
    for record in reader.records() {
        let record = record?;
        let text = record.get(text_idx).unwrap_or_default().trim();
        if !text.is_empty() {
            sentences.push(text.to_string());
        }
    }
    Ok(sentences)
}

/// Load the `Sentence` column of a gold CSV verbatim, for extraction
/// into a sentences-only file.
pub fn load_sentence_column(path: &Path) -> Result<Vec<String>, DatasetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let idx = column_index(&headers, SENTENCE_COLUMN, path)?;

    let mut sentences = Vec::new();
    for record in reader.records() {
        let record = record?;
        sentences.push(record.get(idx).unwrap_or_default().to_string());
    }
    Ok(sentences)
}

/// Load gold rows: identity text (from `text`, falling back to
/// `Sentence`) plus the configured label column's raw value.
pub fn load_gold(path: &Path, label_column: &str) -> Result<Vec<GoldRecord>, DatasetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let text_idx = headers
        .iter()
        .position(|h| h == TEXT_COLUMN)
        .map_or_else(|| column_index(&headers, SENTENCE_COLUMN, path), Ok)?;
    let label_idx = column_index(&headers, label_column, path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(GoldRecord {
            text: record.get(text_idx).unwrap_or_default().trim().to_string(),
            raw_label: record.get(label_idx).unwrap_or_default().to_string(),
        });
    }
    Ok(rows)
}

/// Load prediction rows: `text`, `model_label`, optional `confidence`.
pub fn load_predictions(path: &Path) -> Result<Vec<PredictionRecord>, DatasetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    let text_idx = column_index(&headers, TEXT_COLUMN, path)?;
    let label_idx = column_index(&headers, "model_label", path)?;
    let confidence_idx = headers.iter().position(|h| h == "confidence");

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let confidence = confidence_idx
            .and_then(|i| record.get(i))
            .and_then(|s| s.trim().parse::<f64>().ok());
        rows.push(PredictionRecord {
            text: record.get(text_idx).unwrap_or_default().trim().to_string(),
            raw_label: record.get(label_idx).unwrap_or_default().to_string(),
            confidence,
        });
    }
    Ok(rows)
}

// =============================================================================
// Writers
// =============================================================================

/// Write a one-column `text` file (sentence extraction).
pub fn write_sentences(path: &Path, sentences: &[String]) -> Result<(), DatasetError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([TEXT_COLUMN])?;
    for s in sentences {
        writer.write_record([s.as_str()])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write prediction rows as `text,model_label,confidence`.
pub fn write_predictions(path: &Path, results: &[AnnotationResult]) -> Result<(), DatasetError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([TEXT_COLUMN, "model_label", "confidence"])?;
    for r in results {
        writer.write_record(&[
            r.text.clone(),
            r.label.to_string(),
            r.confidence.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the ranked pairwise table. Undefined alphas become empty cells.
pub fn write_pairwise(path: &Path, table: &AgreementTable) -> Result<(), DatasetError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["rater_a", "rater_b", "n_items", "alpha"])?;
    for p in &table.pairs {
        writer.write_record(&[
            p.rater_a.clone(),
            p.rater_b.clone(),
            p.n_items.to_string(),
            p.alpha.map(|a| a.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Write merged evaluation rows as `text,y_true,y_pred,confidence`.
pub fn write_merged(path: &Path, rows: &[MergedRow]) -> Result<(), DatasetError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([TEXT_COLUMN, "y_true", "y_pred", "confidence"])?;
    for r in rows {
        writer.write_record(&[
            r.text.clone(),
            r.y_true.to_string(),
            r.y_pred.to_string(),
            r.confidence.map(|c| c.to_string()).unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_cells_parse_missing_forms() {
        assert_eq!(parse_rating_cell("", 0, "r").unwrap(), None);
        assert_eq!(parse_rating_cell("  ", 0, "r").unwrap(), None);
        assert_eq!(parse_rating_cell("nan", 0, "r").unwrap(), None);
        assert_eq!(parse_rating_cell("NaN", 0, "r").unwrap(), None);
        assert_eq!(parse_rating_cell("1", 0, "r").unwrap(), Some(1));
        assert_eq!(parse_rating_cell("0.0", 0, "r").unwrap(), Some(0));
        assert!(parse_rating_cell("maybe", 0, "r").is_err());
        assert!(parse_rating_cell("-3", 0, "r").is_err());
    }
}

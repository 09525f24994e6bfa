#![forbid(unsafe_code)]

//! # cira-harness
//!
//! Agreement and evaluation harness for binary causal-relation annotations
//! on sentences.
//!
//! Three engines do the real work:
//! - [`agreement`] computes pairwise nominal Krippendorff's alpha between
//!   human raters and ranks every rater pair head-to-head.
//! - [`annotator`] obtains one binary causal judgment + confidence per
//!   sentence from an LLM provider, tolerating transient failures and the
//!   several reply envelope shapes the provider family is known to emit.
//! - [`scoring`] reconciles model predictions against gold labels into
//!   accuracy / precision / recall / F1 and a 2×2 confusion matrix.
//!
//! The [`batch`] driver and [`dataset`] CSV layer feed the engines; the
//! `cira` binary wires everything into a CLI.

pub mod agreement;
pub mod annotator;
pub mod batch;
pub mod dataset;
pub mod prompts;
pub mod scoring;

pub use agreement::{pairwise_table, AgreementTable, PairwiseAgreement, RatingMatrix};
pub use annotator::{
    AnnotationClient, AnnotationError, AnnotationResult, AnnotatorConfig, ApiFlavor,
    NoopUsageSink, StderrUsageSink, UsageSink,
};
pub use batch::{annotate_batch, BatchOptions, BatchOutcome};
pub use scoring::{evaluate, normalize_label, Evaluation, Metrics, ScoringError};

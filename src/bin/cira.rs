#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use cira_harness::agreement::pairwise_table;
use cira_harness::annotator::{
    AnnotationClient, AnnotatorConfig, ApiFlavor, NoopUsageSink, ProviderAdapter,
    SentenceAnnotator, StderrUsageSink,
};
use cira_harness::batch::{annotate_batch, BatchOptions};
use cira_harness::dataset::{
    self, load_gold, load_predictions, load_rating_matrix, load_sentences,
    write_merged, write_pairwise, write_predictions, write_sentences, DEFAULT_GOLD_COLUMN,
};
use cira_harness::scoring::evaluate;

#[derive(Parser)]
#[command(name = "cira", version, about = "Causal-annotation agreement and evaluation harness")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliApiFlavor {
    Chat,
    Responses,
}

impl From<CliApiFlavor> for ApiFlavor {
    fn from(f: CliApiFlavor) -> Self {
        match f {
            CliApiFlavor::Chat => ApiFlavor::ChatCompletions,
            CliApiFlavor::Responses => ApiFlavor::Responses,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Rank rater pairs by head-to-head Krippendorff's alpha
    Agreement {
        /// Rating CSV: a "Sentence" column plus one column per rater
        #[arg(long)]
        ratings: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Extract the sentence column of a gold CSV into a "text" CSV
    ExtractSentences {
        #[arg(long)]
        gold: PathBuf,
        #[arg(long)]
        out: PathBuf,
    },
    /// Label sentences with the LLM annotator (reads OPENAI_API_KEY)
    Annotate {
        /// Input CSV with a "text" column
        #[arg(long)]
        in_csv: PathBuf,
        /// Output predictions CSV (text,model_label,confidence)
        #[arg(long)]
        out_csv: PathBuf,
        /// Only label the first N rows
        #[arg(long)]
        limit: Option<usize>,
        /// Seconds to sleep between calls (sequential mode)
        #[arg(long, default_value_t = 0.0)]
        sleep: f64,
        /// Model name (default from OPENAI_MODEL or gpt-4o)
        #[arg(long)]
        model: Option<String>,
        /// Provider API surface
        #[arg(long, value_enum, default_value = "chat")]
        api: CliApiFlavor,
        /// Number of in-flight calls
        #[arg(long, default_value_t = 1)]
        parallel: usize,
        /// Emit one JSON line per provider attempt to stderr
        #[arg(long)]
        log_usage: bool,
    },
    /// Score predictions against gold labels
    Score {
        #[arg(long)]
        gold_csv: PathBuf,
        #[arg(long)]
        pred_csv: PathBuf,
        /// Gold-label column name
        #[arg(long, default_value = DEFAULT_GOLD_COLUMN)]
        label_col: String,
        /// Merged rows output CSV
        #[arg(long)]
        out_csv: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Agreement { ratings, out } => {
            let matrix = load_rating_matrix(&ratings)?;
            let table = pairwise_table(&matrix);
            if table.pairs.is_empty() {
                println!("No overlapping rater pairs with >=2 items.");
                return Ok(());
            }
            write_pairwise(&out, &table)?;
            println!("Pairs: {}", table.pairs.len());
            if let Some(mean) = table.mean_alpha() {
                println!("Mean α: {mean:.4}");
            }
            if let Some(median) = table.median_alpha() {
                println!("Median α: {median:.4}");
            }
            println!("{:<12} {:<12} {:>8} {:>9}", "rater_a", "rater_b", "n_items", "alpha");
            for p in table.pairs.iter().take(10) {
                let alpha = p
                    .alpha
                    .map(|a| format!("{a:.4}"))
                    .unwrap_or_else(|| "undef".into());
                println!(
                    "{:<12} {:<12} {:>8} {:>9}",
                    p.rater_a, p.rater_b, p.n_items, alpha
                );
            }
            println!("Wrote {}", out.display());
        }

        Commands::ExtractSentences { gold, out } => {
            let sentences = dataset::load_sentence_column(&gold)?;
            write_sentences(&out, &sentences)?;
            println!("Wrote {} with {} rows", out.display(), sentences.len());
        }

        Commands::Annotate {
            in_csv,
            out_csv,
            limit,
            sleep,
            model,
            api,
            parallel,
            log_usage,
        } => {
            let sentences = load_sentences(&in_csv)?;

            // Environment is read here, at the process boundary, and
            // nowhere else.
            let provider = ProviderAdapter::from_env()?;
            let config = AnnotatorConfig {
                model: model
                    .or_else(|| std::env::var("OPENAI_MODEL").ok())
                    .unwrap_or_else(|| "gpt-4o".into()),
                flavor: api.into(),
                ..Default::default()
            };

            let run_id = Uuid::new_v4();
            eprintln!(
                "[annotate] run {run_id}: {} sentences, model {}",
                sentences.len(),
                config.model
            );

            let client: Box<dyn SentenceAnnotator> = if log_usage {
                Box::new(
                    AnnotationClient::with_config(provider, Arc::new(StderrUsageSink), config)
                        .for_run(run_id),
                )
            } else {
                Box::new(
                    AnnotationClient::with_config(provider, Arc::new(NoopUsageSink), config)
                        .for_run(run_id),
                )
            };

            let options = BatchOptions {
                limit,
                sleep_between: Duration::from_secs_f64(sleep),
                concurrency: parallel,
            };
            let outcome = annotate_batch(client.as_ref(), &sentences, &options).await;

            write_predictions(&out_csv, &outcome.results)?;
            if !outcome.failures.is_empty() {
                eprintln!("[annotate] {} sentences failed and were skipped", outcome.failures.len());
            }
            println!("Wrote {} with {} rows.", out_csv.display(), outcome.results.len());
        }

        Commands::Score {
            gold_csv,
            pred_csv,
            label_col,
            out_csv,
        } => {
            let gold = load_gold(&gold_csv, &label_col)?;
            let predictions = load_predictions(&pred_csv)?;
            let eval = evaluate(&gold, &predictions)?;
            let m = eval.metrics;
            println!(
                "N={} | Accuracy={:.3} Precision={:.3} Recall={:.3} F1={:.3}",
                m.n, m.accuracy, m.precision, m.recall, m.f1
            );
            println!(
                "Confusion: [[{}, {}],[{}, {}]]",
                m.true_neg, m.false_pos, m.false_neg, m.true_pos
            );
            write_merged(&out_csv, &eval.rows)?;
            println!("Wrote {}", out_csv.display());
        }
    }

    Ok(())
}

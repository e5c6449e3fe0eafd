use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agents::{self, EVAL_VARIANTS};
use crate::benchmark::{BenchContext, serialize_duration_ms};
use crate::checks::{CheckKind, EvalCheck, run_checks};
use crate::driver::start_and_drain;
use crate::error::redacted_error_chain;
use crate::table::{Column, render_table};
use crate::telemetry::unix_ms_now;

pub const DEFAULT_EVAL_OUTPUT_PATH: &str = ".aigentic-bench/evals/latest.json";
pub const DEFAULT_EVAL_PROMPT: &str = "What is the capital of France?";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptVariant {
    pub name: String,
    pub instructions: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvalDataset {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub prompt: String,
    pub iterations: Option<usize>,
    pub variants: Vec<PromptVariant>,
    pub checks: Vec<EvalCheck>,
}

/// Built-in suite: the capital-of-France prompt under three instruction styles.
pub fn default_dataset() -> EvalDataset {
    EvalDataset {
        name: "capital-baseline".to_string(),
        version: "v1".to_string(),
        description: "Built-in prompt variant comparison".to_string(),
        prompt: DEFAULT_EVAL_PROMPT.to_string(),
        iterations: None,
        variants: EVAL_VARIANTS
            .iter()
            .map(|(name, instructions)| PromptVariant {
                name: name.to_string(),
                instructions: instructions.to_string(),
            })
            .collect(),
        checks: vec![
            EvalCheck::new(
                "answer_contains_paris",
                CheckKind::ContainsIgnoreCase {
                    value: "paris".to_string(),
                },
            ),
            EvalCheck::new(
                "correct_country",
                CheckKind::ContainsIgnoreCase {
                    value: "france".to_string(),
                },
            ),
            EvalCheck::new(
                "topic_relevance",
                CheckKind::NotContains {
                    value: "weather".to_string(),
                },
            ),
            EvalCheck::new("min_length", CheckKind::MinLength { chars: 5 }),
            EvalCheck::new("max_length", CheckKind::MaxLength { chars: 800 }),
        ],
    }
}

pub fn validate_dataset(dataset: &EvalDataset, source: &str) -> Result<()> {
    if dataset.prompt.trim().is_empty() {
        return Err(anyhow::anyhow!(
            "eval dataset '{}' has an empty prompt",
            source
        ));
    }
    if dataset.variants.is_empty() {
        return Err(anyhow::anyhow!(
            "eval dataset '{}' has no variants; add at least one variant",
            source
        ));
    }
    if dataset.checks.is_empty() {
        return Err(anyhow::anyhow!(
            "eval dataset '{}' has no checks; add at least one check",
            source
        ));
    }
    let mut seen = std::collections::BTreeSet::new();
    for variant in &dataset.variants {
        if variant.name.trim().is_empty() {
            return Err(anyhow::anyhow!(
                "eval dataset '{}' contains a variant with an empty name",
                source
            ));
        }
        if !seen.insert(variant.name.as_str()) {
            return Err(anyhow::anyhow!(
                "eval dataset '{}' declares variant '{}' more than once",
                source,
                variant.name
            ));
        }
    }
    Ok(())
}

pub fn load_eval_dataset(path: &str) -> Result<EvalDataset> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read eval dataset at '{}'", path))?;
    let dataset = serde_json::from_str::<EvalDataset>(&content)
        .with_context(|| format!("invalid eval dataset json at '{}'", path))?;
    validate_dataset(&dataset, path)?;
    Ok(dataset)
}

pub fn round_metric(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalResult {
    pub variant: String,
    pub pass_rate: f64,
    pub avg_score: f64,
    pub accuracy_score: f64,
    pub relevance_score: f64,
    #[serde(rename = "duration_ms", serialize_with = "serialize_duration_ms")]
    pub duration: Duration,
    pub error_count: usize,
    pub content: String,
    pub failed_checks: Vec<String>,
}

/// Per-variant score aggregation across iterations.
///
/// A failed run scores 0 and counts every accuracy/relevance check as failed.
/// A bucket with no checks reports 0.
#[derive(Debug, Default)]
pub struct EvalAccumulator {
    iterations: usize,
    fully_passed: usize,
    score_sum: f64,
    accuracy_passed: usize,
    accuracy_total: usize,
    relevance_passed: usize,
    relevance_total: usize,
    error_count: usize,
    content: String,
    failed_checks: Vec<String>,
}

impl EvalAccumulator {
    pub fn record_response(&mut self, checks: &[EvalCheck], text: &str) {
        self.iterations += 1;
        let outcomes = run_checks(checks, text);
        let passed = outcomes.iter().filter(|o| o.passed).count();
        if !outcomes.is_empty() {
            self.score_sum += passed as f64 / outcomes.len() as f64;
        }
        if passed == outcomes.len() {
            self.fully_passed += 1;
        }

        for outcome in &outcomes {
            if outcome.accuracy {
                self.accuracy_total += 1;
                self.accuracy_passed += usize::from(outcome.passed);
            }
            if outcome.relevance {
                self.relevance_total += 1;
                self.relevance_passed += usize::from(outcome.passed);
            }
            if !outcome.passed && !self.failed_checks.contains(&outcome.name) {
                self.failed_checks.push(outcome.name.clone());
            }
        }
        self.content = text.to_string();
    }

    pub fn record_error(&mut self, checks: &[EvalCheck]) {
        self.iterations += 1;
        self.error_count += 1;
        self.accuracy_total += checks.iter().filter(|c| c.is_accuracy()).count();
        self.relevance_total += checks.iter().filter(|c| c.is_relevance()).count();
    }

    pub fn finish(self, variant: &str, duration: Duration) -> EvalResult {
        let ratio = |num: usize, den: usize| {
            if den == 0 {
                0.0
            } else {
                num as f64 / den as f64
            }
        };
        EvalResult {
            variant: variant.to_string(),
            pass_rate: ratio(self.fully_passed, self.iterations),
            avg_score: if self.iterations == 0 {
                0.0
            } else {
                self.score_sum / self.iterations as f64
            },
            accuracy_score: ratio(self.accuracy_passed, self.accuracy_total),
            relevance_score: ratio(self.relevance_passed, self.relevance_total),
            duration,
            error_count: self.error_count,
            content: self.content,
            failed_checks: self.failed_checks,
        }
    }
}

pub async fn run_eval_variant(
    ctx: &BenchContext,
    prompt: &str,
    variant: &PromptVariant,
    checks: &[EvalCheck],
    iterations: usize,
) -> Result<EvalResult> {
    let agent = agents::eval_agent(ctx.model.clone(), &variant.name, &variant.instructions)?;
    let mut acc = EvalAccumulator::default();
    let started = Instant::now();

    for iteration in 0..iterations.max(1) {
        match start_and_drain(
            ctx.runtime.as_ref(),
            &agent,
            prompt,
            ctx.run_timeout,
            &ctx.telemetry,
        )
        .await
        {
            Ok(outcome) => acc.record_response(checks, &outcome.text),
            Err(err) => {
                tracing::warn!(
                    variant = %variant.name,
                    iteration,
                    error = %redacted_error_chain(&err),
                    "eval iteration failed"
                );
                acc.record_error(checks);
            }
        }
    }

    let result = acc.finish(&variant.name, started.elapsed());
    ctx.telemetry.emit(
        "eval.variant_scored",
        json!({
            "variant": result.variant,
            "avg_score": round_metric(result.avg_score),
            "pass_rate": round_metric(result.pass_rate),
            "error_count": result.error_count
        }),
    );
    Ok(result)
}

/// Stable bubble sort by descending `avg_score`; equal scores keep their
/// input order.
pub fn rank_results(results: &mut [EvalResult]) {
    let len = results.len();
    for pass in 0..len {
        let mut swapped = false;
        for idx in 0..len - 1 - pass {
            if results[idx].avg_score < results[idx + 1].avg_score {
                results.swap(idx, idx + 1);
                swapped = true;
            }
        }
        if !swapped {
            break;
        }
    }
}

pub fn format_eval_table(results: &[EvalResult]) -> String {
    let columns = [
        Column::right("Rank", 4),
        Column::left("Variant", 16),
        Column::right("Pass", 6),
        Column::right("Score", 6),
        Column::right("Accuracy", 8),
        Column::right("Relevance", 9),
        Column::right("Errors", 6),
        Column::right("Duration", 11),
        Column::left("Failed checks", 36),
    ];
    let rows = results
        .iter()
        .enumerate()
        .map(|(idx, result)| {
            vec![
                (idx + 1).to_string(),
                result.variant.clone(),
                format!("{:.0}%", result.pass_rate * 100.0),
                format!("{:.2}", result.avg_score),
                format!("{:.2}", result.accuracy_score),
                format!("{:.2}", result.relevance_score),
                result.error_count.to_string(),
                format!("{:.1}ms", result.duration.as_secs_f64() * 1000.0),
                if result.failed_checks.is_empty() {
                    "-".to_string()
                } else {
                    result.failed_checks.join(", ")
                },
            ]
        })
        .collect::<Vec<Vec<String>>>();
    render_table(&columns, &rows)
}

#[derive(Debug, Serialize)]
pub struct EvalRunReport {
    pub generated_at_unix_ms: u128,
    pub dataset_name: String,
    pub dataset_version: String,
    pub dataset_description: String,
    pub model: String,
    pub prompt: String,
    pub iterations: usize,
    pub results: Vec<EvalResult>,
}

pub fn write_eval_report(path: &str, report: &EvalRunReport) -> Result<()> {
    let path_buf = PathBuf::from(path);
    if let Some(parent) = path_buf.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create eval report directory '{}'",
                parent.display()
            )
        })?;
    }

    let payload =
        serde_json::to_string_pretty(report).context("failed to serialize eval report to json")?;
    std::fs::write(&path_buf, payload)
        .with_context(|| format!("failed to write eval report to '{}'", path_buf.display()))
}

pub async fn run_eval_suite(
    ctx: &BenchContext,
    dataset: &EvalDataset,
    iterations: usize,
) -> Result<Vec<EvalResult>> {
    validate_dataset(dataset, &dataset.name)?;
    let mut results = Vec::with_capacity(dataset.variants.len());
    for variant in &dataset.variants {
        results.push(
            run_eval_variant(ctx, &dataset.prompt, variant, &dataset.checks, iterations).await?,
        );
    }
    rank_results(&mut results);
    Ok(results)
}

pub async fn run_eval(
    ctx: &BenchContext,
    dataset_path: Option<String>,
    output_path: Option<String>,
    iterations: usize,
    fail_under: Option<f64>,
) -> Result<Vec<EvalResult>> {
    let dataset = match dataset_path.as_deref() {
        Some(path) => load_eval_dataset(path)?,
        None => default_dataset(),
    };
    let iterations = dataset.iterations.unwrap_or(iterations).max(1);
    let output_path = output_path.unwrap_or_else(|| DEFAULT_EVAL_OUTPUT_PATH.to_string());

    let results = run_eval_suite(ctx, &dataset, iterations).await?;

    println!(
        "Eval: dataset={} version={} variants={} iterations={} model={}",
        dataset.name,
        dataset.version,
        dataset.variants.len(),
        iterations,
        ctx.model_label()
    );
    print!("{}", format_eval_table(&results));

    let report = EvalRunReport {
        generated_at_unix_ms: unix_ms_now(),
        dataset_name: dataset.name.clone(),
        dataset_version: dataset.version.clone(),
        dataset_description: dataset.description.clone(),
        model: ctx.model_label(),
        prompt: dataset.prompt.clone(),
        iterations,
        results: results.clone(),
    };
    write_eval_report(&output_path, &report)?;
    println!("Report written to {}", output_path);

    let best = results.first().map(|r| r.avg_score).unwrap_or_default();
    ctx.telemetry.emit(
        "eval.completed",
        json!({
            "dataset": dataset.name,
            "variants": results.len(),
            "best_variant": results.first().map(|r| r.variant.clone()),
            "best_score": round_metric(best),
            "output_path": output_path
        }),
    );

    if let Some(threshold) = fail_under {
        let threshold = threshold.clamp(0.0, 1.0);
        if best < threshold {
            return Err(anyhow::anyhow!(
                "best variant score {:.3} is below threshold {:.3}",
                best,
                threshold
            ));
        }
    }

    Ok(results)
}

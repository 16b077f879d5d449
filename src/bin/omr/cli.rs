//! CLI mode for answer inference.

use crate::config::RunConfig;
use omr_answers::core::InferenceConfig;
use omr_answers::domain::{AnalyzeResult, Choice, ScoreReport, score};
use omr_answers::omr::{AnswerSheetInferencer, InferenceSummary, SheetInference};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// JSON document printed by `--output json`.
#[derive(Serialize)]
struct InferenceReport<'a> {
    answers: Vec<String>,
    confidences: Vec<f32>,
    methods: Vec<String>,
    orientation: Option<String>,
    gap_filling_applied: bool,
    summary: InferenceSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    score: Option<&'a ScoreReport>,
    processing_time_ms: f64,
}

/// Process a local document-analysis result.
pub fn process_file(run: &RunConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let start = Instant::now();

    let config = run.inference_config()?;
    let key = run.answer_key()?;

    info!("Loading analysis result...");
    let result = AnalyzeResult::from_json_file(&run.input)?;
    info!(
        "Loaded {} pages and {} tables in {:.2}ms",
        result.pages.len(),
        result.tables.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let inferencer = AnswerSheetInferencer::new(config)?;
    let infer_start = Instant::now();
    let inference = inferencer.infer_result(&result);
    let processing_time = infer_start.elapsed();
    info!(
        "Inference completed in {:.2}ms",
        processing_time.as_secs_f64() * 1000.0
    );

    let report = key.as_deref().map(|key| score_against(&inference, key));
    output_result(
        &inference,
        report.as_ref(),
        &run.output,
        processing_time.as_secs_f64() * 1000.0,
    )
}

/// Print the default configuration.
pub fn print_default_config() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    println!(
        "{}",
        serde_json::to_string_pretty(&InferenceConfig::default())?
    );
    Ok(())
}

fn score_against(inference: &SheetInference, key: &[Choice]) -> ScoreReport {
    let key: Vec<&str> = key.iter().map(|c| c.as_str()).collect();
    score(&inference.answers(), &key)
}

/// Output the inference in the specified format
fn output_result(
    inference: &SheetInference,
    report: Option<&ScoreReport>,
    format: &str,
    processing_time_ms: f64,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match format {
        "json" => {
            let response = InferenceReport {
                answers: inference.answers(),
                confidences: inference.confidences(),
                methods: inference.methods(),
                orientation: inference.orientation.map(|o| o.to_string()),
                gap_filling_applied: inference.gap_filling_applied(),
                summary: inference.summary(),
                score: report,
                processing_time_ms,
            };
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        _ => {
            println!("\n=== Answer Sheet ===");
            println!("Processing time: {processing_time_ms:.2}ms");
            print!("{inference}");
            println!();
            println!("Answers: {}", inference.answers().concat());
            if let Some(report) = report {
                println!("Score: {report}");
                if !report.incorrect_questions.is_empty() {
                    println!("Incorrect: {:?}", report.incorrect_questions);
                }
            }
        }
    }

    Ok(())
}

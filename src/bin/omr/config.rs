//! Configuration types for the CLI.

use omr_answers::core::constants::QUESTION_COUNT;
use omr_answers::core::{InferenceConfig, OMRError, OmrResult, ProcessingStage};
use omr_answers::domain::{Choice, parse_answer_key};
use std::path::PathBuf;

/// Arguments of one `infer` run.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub input: PathBuf,
    pub config_path: Option<PathBuf>,
    pub key: Option<String>,
    pub output: String,
}

impl RunConfig {
    /// The inference configuration from `--config`, or the defaults.
    pub fn inference_config(&self) -> OmrResult<InferenceConfig> {
        match &self.config_path {
            Some(path) => InferenceConfig::from_json_file(path),
            None => Ok(InferenceConfig::default()),
        }
    }

    /// The parsed `--key`, which must hold one letter per question.
    pub fn answer_key(&self) -> OmrResult<Option<Vec<Choice>>> {
        let Some(text) = &self.key else {
            return Ok(None);
        };
        let key = parse_answer_key(text)
            .map_err(|e| OMRError::decoding(ProcessingStage::AnswerKey, "--key", e))?;
        if key.len() != QUESTION_COUNT {
            return Err(OMRError::invalid_input(format!(
                "answer key must hold {QUESTION_COUNT} letters, got {}",
                key.len()
            )));
        }
        Ok(Some(key))
    }
}

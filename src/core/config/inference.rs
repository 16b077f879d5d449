//! Configuration for answer inference.
//!
//! Every threshold and layout constant used by the pipeline lives here. The
//! defaults describe the reference sheet: four choice rows per question block,
//! ten questions per column, and a grid of five-row bands by eight columns.

use super::errors::{
    ConfigError, ConfigValidator, ensure_non_negative, ensure_positive, ensure_unit_interval,
};
use crate::core::constants::QUESTION_COUNT;
use crate::core::errors::{OMRError, OmrResult, ProcessingStage};
use crate::domain::sheet::Choice;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Last-known-good answer pattern of the reference sheet, questions 1..=40.
pub const REFERENCE_FALLBACK_PATTERN: &str = "CAADABABDACAADBCDABCBDCADCCCBDBDABCBBDAB";

/// Physical layout of the answer grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetLayout {
    /// Vertical tables: choice rows per question block.
    #[serde(default = "SheetLayout::default_rows_per_block")]
    pub rows_per_block: usize,
    /// Vertical tables: questions stacked in one column.
    #[serde(default = "SheetLayout::default_questions_per_column")]
    pub questions_per_column: usize,
    /// Grid tables: rows per question band.
    #[serde(default = "SheetLayout::default_grid_row_band")]
    pub grid_row_band: usize,
    /// Grid tables: questions per band.
    #[serde(default = "SheetLayout::default_grid_columns")]
    pub grid_columns: usize,
    /// Column count that identifies the answer table when several are present.
    #[serde(default = "SheetLayout::default_preferred_table_columns")]
    pub preferred_table_columns: usize,
    /// Below this many mapped questions the structural mapping is replaced by
    /// positional grouping.
    #[serde(default = "SheetLayout::default_min_mapped_questions")]
    pub min_mapped_questions: usize,
}

impl SheetLayout {
    fn default_rows_per_block() -> usize {
        4
    }

    fn default_questions_per_column() -> usize {
        10
    }

    fn default_grid_row_band() -> usize {
        5
    }

    fn default_grid_columns() -> usize {
        8
    }

    fn default_preferred_table_columns() -> usize {
        8
    }

    fn default_min_mapped_questions() -> usize {
        QUESTION_COUNT / 2
    }
}

impl Default for SheetLayout {
    fn default() -> Self {
        Self {
            rows_per_block: Self::default_rows_per_block(),
            questions_per_column: Self::default_questions_per_column(),
            grid_row_band: Self::default_grid_row_band(),
            grid_columns: Self::default_grid_columns(),
            preferred_table_columns: Self::default_preferred_table_columns(),
            min_mapped_questions: Self::default_min_mapped_questions(),
        }
    }
}

impl ConfigValidator for SheetLayout {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive("layout.rows_per_block", self.rows_per_block)?;
        ensure_positive("layout.grid_row_band", self.grid_row_band)?;
        ensure_positive("layout.grid_columns", self.grid_columns)?;
        if self.min_mapped_questions > QUESTION_COUNT {
            return Err(ConfigError::invalid(
                "layout.min_mapped_questions",
                format!("must not exceed {QUESTION_COUNT}"),
            ));
        }
        Ok(())
    }
}

/// Thresholds and fixed confidences for the three mark channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkPolicy {
    /// Explicit marks that are not "selected" are kept above this confidence.
    #[serde(default = "MarkPolicy::default_explicit_min_confidence")]
    pub explicit_min_confidence: f32,
    /// Confidence assigned to marks synthesized from cross text.
    #[serde(default = "MarkPolicy::default_text_mark_confidence")]
    pub text_mark_confidence: f32,
    /// Confidence assigned to marks synthesized from crossing strokes.
    #[serde(default = "MarkPolicy::default_stroke_pair_confidence")]
    pub stroke_pair_confidence: f32,
    /// Two lines whose centroids are closer than this form a stroke pair.
    #[serde(default = "MarkPolicy::default_stroke_pair_max_distance")]
    pub stroke_pair_max_distance: f32,
}

impl MarkPolicy {
    fn default_explicit_min_confidence() -> f32 {
        0.3
    }

    fn default_text_mark_confidence() -> f32 {
        0.9
    }

    fn default_stroke_pair_confidence() -> f32 {
        0.7
    }

    fn default_stroke_pair_max_distance() -> f32 {
        10.0
    }
}

impl Default for MarkPolicy {
    fn default() -> Self {
        Self {
            explicit_min_confidence: Self::default_explicit_min_confidence(),
            text_mark_confidence: Self::default_text_mark_confidence(),
            stroke_pair_confidence: Self::default_stroke_pair_confidence(),
            stroke_pair_max_distance: Self::default_stroke_pair_max_distance(),
        }
    }
}

impl ConfigValidator for MarkPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_unit_interval("marks.explicit_min_confidence", self.explicit_min_confidence)?;
        ensure_unit_interval("marks.text_mark_confidence", self.text_mark_confidence)?;
        ensure_unit_interval("marks.stroke_pair_confidence", self.stroke_pair_confidence)?;
        ensure_non_negative("marks.stroke_pair_max_distance", self.stroke_pair_max_distance)
    }
}

/// Weights of the composite mark-to-cell confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatcherPolicy {
    /// Fraction of the cell width/height added on each side before testing containment.
    #[serde(default = "MatcherPolicy::default_margin_ratio")]
    pub margin_ratio: f32,
    /// Bonus for marks carrying explicit cross text.
    #[serde(default = "MatcherPolicy::default_cross_text_bonus")]
    pub cross_text_bonus: f32,
    /// Source weight for marks read from cross text.
    #[serde(default = "MatcherPolicy::default_text_source_weight")]
    pub text_source_weight: f32,
    /// Source weight for marks reported by the document analysis service.
    #[serde(default = "MatcherPolicy::default_explicit_source_weight")]
    pub explicit_source_weight: f32,
    /// Source weight for marks built from crossing strokes.
    #[serde(default = "MatcherPolicy::default_stroke_source_weight")]
    pub stroke_source_weight: f32,
    /// Multiplier applied to the mark's own confidence.
    #[serde(default = "MatcherPolicy::default_reported_confidence_weight")]
    pub reported_confidence_weight: f32,
    /// Maximum reward for a mark centred on the cell.
    #[serde(default = "MatcherPolicy::default_centrality_weight")]
    pub centrality_weight: f32,
    /// Cross-text marks within this many cell widths/heights of the centre count as inside.
    #[serde(default = "MatcherPolicy::default_relaxed_extent")]
    pub relaxed_extent: f32,
    /// Bonus granted by the relaxed cross-text rule.
    #[serde(default = "MatcherPolicy::default_relaxed_bonus")]
    pub relaxed_bonus: f32,
}

impl MatcherPolicy {
    fn default_margin_ratio() -> f32 {
        0.2
    }

    fn default_cross_text_bonus() -> f32 {
        0.4
    }

    fn default_text_source_weight() -> f32 {
        0.3
    }

    fn default_explicit_source_weight() -> f32 {
        0.2
    }

    fn default_stroke_source_weight() -> f32 {
        0.1
    }

    fn default_reported_confidence_weight() -> f32 {
        0.2
    }

    fn default_centrality_weight() -> f32 {
        0.4
    }

    fn default_relaxed_extent() -> f32 {
        1.5
    }

    fn default_relaxed_bonus() -> f32 {
        0.2
    }
}

impl Default for MatcherPolicy {
    fn default() -> Self {
        Self {
            margin_ratio: Self::default_margin_ratio(),
            cross_text_bonus: Self::default_cross_text_bonus(),
            text_source_weight: Self::default_text_source_weight(),
            explicit_source_weight: Self::default_explicit_source_weight(),
            stroke_source_weight: Self::default_stroke_source_weight(),
            reported_confidence_weight: Self::default_reported_confidence_weight(),
            centrality_weight: Self::default_centrality_weight(),
            relaxed_extent: Self::default_relaxed_extent(),
            relaxed_bonus: Self::default_relaxed_bonus(),
        }
    }
}

impl ConfigValidator for MatcherPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_non_negative("matcher.margin_ratio", self.margin_ratio)?;
        ensure_non_negative("matcher.cross_text_bonus", self.cross_text_bonus)?;
        ensure_non_negative("matcher.text_source_weight", self.text_source_weight)?;
        ensure_non_negative("matcher.explicit_source_weight", self.explicit_source_weight)?;
        ensure_non_negative("matcher.stroke_source_weight", self.stroke_source_weight)?;
        ensure_non_negative(
            "matcher.reported_confidence_weight",
            self.reported_confidence_weight,
        )?;
        ensure_non_negative("matcher.centrality_weight", self.centrality_weight)?;
        ensure_non_negative("matcher.relaxed_extent", self.relaxed_extent)?;
        ensure_non_negative("matcher.relaxed_bonus", self.relaxed_bonus)
    }
}

/// Fixed confidences of the non-geometric strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPolicy {
    #[serde(default = "StrategyPolicy::default_complement_confidence")]
    pub table_complement_confidence: f32,
    #[serde(default = "StrategyPolicy::default_complement_confidence")]
    pub line_complement_confidence: f32,
    /// Used when the row-crossed strategy falls back to the missing-letter rule.
    #[serde(default = "StrategyPolicy::default_row_crossed_complement_confidence")]
    pub row_crossed_complement_confidence: f32,
    /// Lines read after a question number as that question's visible choices.
    #[serde(default = "StrategyPolicy::default_line_choice_window")]
    pub line_choice_window: usize,
}

impl StrategyPolicy {
    fn default_complement_confidence() -> f32 {
        0.6
    }

    fn default_row_crossed_complement_confidence() -> f32 {
        0.5
    }

    fn default_line_choice_window() -> usize {
        3
    }
}

impl Default for StrategyPolicy {
    fn default() -> Self {
        Self {
            table_complement_confidence: Self::default_complement_confidence(),
            line_complement_confidence: Self::default_complement_confidence(),
            row_crossed_complement_confidence: Self::default_row_crossed_complement_confidence(),
            line_choice_window: Self::default_line_choice_window(),
        }
    }
}

impl ConfigValidator for StrategyPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        ensure_unit_interval(
            "strategies.table_complement_confidence",
            self.table_complement_confidence,
        )?;
        ensure_unit_interval(
            "strategies.line_complement_confidence",
            self.line_complement_confidence,
        )?;
        ensure_unit_interval(
            "strategies.row_crossed_complement_confidence",
            self.row_crossed_complement_confidence,
        )?;
        ensure_positive("strategies.line_choice_window", self.line_choice_window)
    }
}

/// Escalation applied when too many questions remain unresolved after fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFillingPolicy {
    /// Disabling gap-filling is the only way unresolved slots reach the output
    /// past the threshold.
    #[serde(default = "GapFillingPolicy::default_enabled")]
    pub enabled: bool,
    /// Gap-filling runs when more than this many slots are unresolved.
    #[serde(default = "GapFillingPolicy::default_unresolved_threshold")]
    pub unresolved_threshold: usize,
    /// Largest question distance over which a neighbor's letter is copied.
    #[serde(default = "GapFillingPolicy::default_neighbor_max_distance")]
    pub neighbor_max_distance: usize,
    /// Letters for questions 1..=40 used as the last resort.
    #[serde(default = "GapFillingPolicy::default_fallback_pattern")]
    pub fallback_pattern: Vec<Choice>,
}

impl GapFillingPolicy {
    fn default_enabled() -> bool {
        true
    }

    fn default_unresolved_threshold() -> usize {
        15
    }

    fn default_neighbor_max_distance() -> usize {
        3
    }

    fn default_fallback_pattern() -> Vec<Choice> {
        REFERENCE_FALLBACK_PATTERN
            .chars()
            .filter_map(Choice::from_char)
            .collect()
    }

    /// Replaces the fallback pattern.
    pub fn with_fallback_pattern(mut self, pattern: Vec<Choice>) -> Self {
        self.fallback_pattern = pattern;
        self
    }
}

impl Default for GapFillingPolicy {
    fn default() -> Self {
        Self {
            enabled: Self::default_enabled(),
            unresolved_threshold: Self::default_unresolved_threshold(),
            neighbor_max_distance: Self::default_neighbor_max_distance(),
            fallback_pattern: Self::default_fallback_pattern(),
        }
    }
}

impl ConfigValidator for GapFillingPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.fallback_pattern.len() != QUESTION_COUNT {
            return Err(ConfigError::invalid(
                "gap_filling.fallback_pattern",
                format!(
                    "must hold {QUESTION_COUNT} letters, got {}",
                    self.fallback_pattern.len()
                ),
            ));
        }
        Ok(())
    }
}

/// Complete configuration of an [`AnswerSheetInferencer`](crate::omr::AnswerSheetInferencer).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceConfig {
    #[serde(default)]
    pub layout: SheetLayout,
    #[serde(default)]
    pub marks: MarkPolicy,
    #[serde(default)]
    pub matcher: MatcherPolicy,
    #[serde(default)]
    pub strategies: StrategyPolicy,
    #[serde(default)]
    pub gap_filling: GapFillingPolicy,
}

impl InferenceConfig {
    /// Creates a configuration with the reference sheet defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(mut self, layout: SheetLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_marks(mut self, marks: MarkPolicy) -> Self {
        self.marks = marks;
        self
    }

    pub fn with_matcher(mut self, matcher: MatcherPolicy) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_strategies(mut self, strategies: StrategyPolicy) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_gap_filling(mut self, gap_filling: GapFillingPolicy) -> Self {
        self.gap_filling = gap_filling;
        self
    }

    /// Loads and validates a configuration from a JSON document.
    ///
    /// Missing sections and fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> OmrResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            OMRError::decoding(ProcessingStage::ConfigLoading, path.display().to_string(), e)
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            OMRError::decoding(ProcessingStage::ConfigLoading, path.display().to_string(), e)
        })?;
        config.validate()?;
        Ok(config)
    }
}

impl ConfigValidator for InferenceConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        self.layout.validate()?;
        self.marks.validate()?;
        self.matcher.validate()?;
        self.strategies.validate()?;
        self.gap_filling.validate()
    }
}

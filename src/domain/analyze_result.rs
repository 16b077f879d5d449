//! Document-analysis result as it arrives on the wire, and the immutable
//! snapshot the pipeline runs on.
//!
//! The raw types mirror the JSON a layout-analysis service emits. Field names
//! are accepted in snake_case as well as the service's camelCase, and every
//! field is optional so partially populated results still decode. Geometry is
//! normalized exactly once, when a raw result is turned into a
//! [`SheetSnapshot`].

use crate::core::errors::{OMRError, OmrResult, ProcessingStage};
use crate::domain::sheet::{Cell, Line, Table};
use crate::processors::{Polygon, RawPolygon, normalize_polygon};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level analysis result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeResult {
    #[serde(default)]
    pub pages: Vec<RawPage>,
    #[serde(default)]
    pub tables: Vec<RawTable>,
}

/// One analyzed page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPage {
    #[serde(default = "RawPage::default_page_number", alias = "pageNumber")]
    pub page_number: u32,
    #[serde(default)]
    pub lines: Vec<RawLine>,
    #[serde(default, alias = "selectionMarks")]
    pub selection_marks: Vec<RawSelectionMark>,
}

impl RawPage {
    fn default_page_number() -> u32 {
        1
    }
}

/// Location of an element on a page.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawBoundingRegion {
    #[serde(default, alias = "pageNumber")]
    pub page_number: Option<u32>,
    #[serde(default)]
    pub polygon: Option<RawPolygon>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLine {
    #[serde(default, alias = "text")]
    pub content: String,
    #[serde(default)]
    pub polygon: Option<RawPolygon>,
    #[serde(default, alias = "boundingRegions")]
    pub bounding_regions: Vec<RawBoundingRegion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSelectionMark {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub polygon: Option<RawPolygon>,
    #[serde(default, alias = "boundingRegions")]
    pub bounding_regions: Vec<RawBoundingRegion>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTable {
    #[serde(default, alias = "rowCount")]
    pub row_count: usize,
    #[serde(default, alias = "columnCount")]
    pub column_count: usize,
    #[serde(default)]
    pub cells: Vec<RawCell>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawCell {
    #[serde(default)]
    pub content: String,
    #[serde(default, alias = "rowIndex")]
    pub row_index: usize,
    #[serde(default, alias = "columnIndex")]
    pub column_index: usize,
    #[serde(default)]
    pub polygon: Option<RawPolygon>,
    #[serde(default, alias = "boundingRegions")]
    pub bounding_regions: Vec<RawBoundingRegion>,
}

/// An element's own polygon, or the first bounding region's when it has none.
fn resolve_polygon(own: Option<&RawPolygon>, regions: &[RawBoundingRegion]) -> Polygon {
    let polygon = normalize_polygon(own);
    if !polygon.is_empty() {
        return polygon;
    }
    normalize_polygon(regions.first().and_then(|r| r.polygon.as_ref()))
}

impl AnalyzeResult {
    /// Decodes a result from JSON.
    ///
    /// Accepts the bare result as well as a service response that wraps it in
    /// an `analyzeResult` envelope.
    pub fn from_json_str(json: &str) -> OmrResult<Self> {
        let mut value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(inner) = value
            .as_object_mut()
            .and_then(|obj| obj.remove("analyzeResult").or_else(|| obj.remove("analyze_result")))
        {
            value = inner;
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Reads and decodes a result file.
    pub fn from_json_file(path: impl AsRef<Path>) -> OmrResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            OMRError::decoding(ProcessingStage::InputDecoding, path.display().to_string(), e)
        })?;
        Self::from_json_str(&text).map_err(|e| {
            OMRError::decoding(ProcessingStage::InputDecoding, path.display().to_string(), e)
        })
    }

    /// Normalizes every polygon and produces the pipeline's input snapshot.
    pub fn to_snapshot(&self) -> SheetSnapshot {
        let pages = self
            .pages
            .iter()
            .map(|page| PageSnapshot {
                page_number: page.page_number,
                lines: page
                    .lines
                    .iter()
                    .map(|line| {
                        Line::new(
                            line.content.clone(),
                            resolve_polygon(line.polygon.as_ref(), &line.bounding_regions),
                        )
                    })
                    .collect(),
                selection_marks: page
                    .selection_marks
                    .iter()
                    .map(|mark| SelectionMark {
                        state: mark.state.clone(),
                        confidence: mark.confidence,
                        polygon: resolve_polygon(mark.polygon.as_ref(), &mark.bounding_regions),
                    })
                    .collect(),
            })
            .collect();

        let tables = self
            .tables
            .iter()
            .map(|table| Table {
                row_count: table.row_count,
                column_count: table.column_count,
                cells: table
                    .cells
                    .iter()
                    .map(|cell| {
                        Cell::new(
                            cell.content.clone(),
                            cell.row_index,
                            cell.column_index,
                            resolve_polygon(cell.polygon.as_ref(), &cell.bounding_regions),
                        )
                    })
                    .collect(),
            })
            .collect();

        SheetSnapshot { pages, tables }
    }
}

/// A selection mark reported by the analysis service, before filtering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionMark {
    pub state: String,
    pub confidence: f32,
    pub polygon: Polygon,
}

impl SelectionMark {
    /// True when the reported state is "selected", ignoring case.
    pub fn is_selected(&self) -> bool {
        self.state.trim().eq_ignore_ascii_case("selected")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub page_number: u32,
    pub lines: Vec<Line>,
    pub selection_marks: Vec<SelectionMark>,
}

/// Immutable input of one inference run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SheetSnapshot {
    pub pages: Vec<PageSnapshot>,
    pub tables: Vec<Table>,
}

impl SheetSnapshot {
    pub fn new(pages: Vec<PageSnapshot>, tables: Vec<Table>) -> Self {
        Self { pages, tables }
    }

    /// All text lines in page order.
    pub fn lines(&self) -> impl Iterator<Item = &Line> + '_ {
        self.pages.iter().flat_map(|p| p.lines.iter())
    }
}

impl From<&AnalyzeResult> for SheetSnapshot {
    fn from(result: &AnalyzeResult) -> Self {
        result.to_snapshot()
    }
}

impl From<AnalyzeResult> for SheetSnapshot {
    fn from(result: AnalyzeResult) -> Self {
        result.to_snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::Point;

    #[test]
    fn test_decode_snake_case_contract() {
        let json = r#"{
            "pages": [{
                "page_number": 2,
                "lines": [{"text": "X", "polygon": [[0, 0], [4, 0], [4, 4], [0, 4]]}],
                "selection_marks": [{"state": "selected", "confidence": 0.8, "polygon": [1, 1, 2, 1, 2, 2, 1, 2]}]
            }],
            "tables": [{
                "row_count": 1,
                "column_count": 2,
                "cells": [{"content": "A", "row_index": 0, "column_index": 1}]
            }]
        }"#;
        let snapshot = AnalyzeResult::from_json_str(json).unwrap().to_snapshot();
        assert_eq!(snapshot.pages[0].page_number, 2);
        assert_eq!(snapshot.pages[0].lines[0].text, "X");
        assert_eq!(snapshot.pages[0].lines[0].polygon.points.len(), 4);
        assert!(snapshot.pages[0].selection_marks[0].is_selected());
        assert_eq!(snapshot.pages[0].selection_marks[0].polygon.points.len(), 4);

        let cell = &snapshot.tables[0].cells[0];
        assert_eq!(cell.column_index, 1);
        assert!(cell.polygon.is_empty());
    }

    #[test]
    fn test_decode_service_envelope_with_bounding_regions() {
        let json = r#"{
            "status": "succeeded",
            "analyzeResult": {
                "pages": [{
                    "pageNumber": 1,
                    "lines": [{"content": "12."}],
                    "selectionMarks": [{"state": "Unselected", "confidence": 0.2}]
                }],
                "tables": [{
                    "rowCount": 4,
                    "columnCount": 8,
                    "cells": [{
                        "content": "B",
                        "rowIndex": 3,
                        "columnIndex": 7,
                        "kind": "content",
                        "boundingRegions": [{"pageNumber": 1, "polygon": [10, 10, 20, 10, 20, 20, 10, 20]}]
                    }]
                }]
            }
        }"#;
        let snapshot: SheetSnapshot = AnalyzeResult::from_json_str(json).unwrap().into();
        assert_eq!(snapshot.lines().count(), 1);
        assert!(!snapshot.pages[0].selection_marks[0].is_selected());

        let table = &snapshot.tables[0];
        assert_eq!((table.row_count, table.column_count), (4, 8));
        let cell = &table.cells[0];
        assert_eq!((cell.row_index, cell.column_index), (3, 7));
        assert_eq!(cell.polygon.points[0], Point::new(10.0, 10.0));
    }

    #[test]
    fn test_malformed_polygon_degrades_to_empty() {
        let json = r#"{"pages": [{"lines": [{"content": "A", "polygon": [{"x": 1, "y": 2}, [3, 4]]}]}]}"#;
        let snapshot = AnalyzeResult::from_json_str(json).unwrap().to_snapshot();
        assert_eq!(snapshot.pages[0].page_number, 1);
        assert!(snapshot.pages[0].lines[0].polygon.is_empty());
    }

    #[test]
    fn test_empty_document_decodes() {
        let snapshot = AnalyzeResult::from_json_str("{}").unwrap().to_snapshot();
        assert!(snapshot.pages.is_empty());
        assert!(snapshot.tables.is_empty());
    }

    #[test]
    fn test_missing_file_reports_input_stage() {
        let err = AnalyzeResult::from_json_file("/nonexistent/ocr.json").unwrap_err();
        assert!(err.to_string().starts_with("input decoding failed"));
    }
}

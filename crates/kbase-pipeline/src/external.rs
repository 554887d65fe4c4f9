//! Contracts for the external converter and structural extractor.
//!
//! The binaries behind these traits (an office-to-PDF converter, a PDF
//! layout model) are deployed separately; the pipeline only depends on
//! these contracts.

use std::path::{Path, PathBuf};

use kbase_core::Result;
use serde::{Deserialize, Serialize};

/// Structural role of a parsed block, in reading order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    /// Body text.
    Text,
    /// Section or table/figure heading.
    Title,
    /// Table with an HTML body.
    Table,
    /// Extracted image.
    Image,
    /// Caption line tagged by the extractor.
    Caption,
    /// Footnote line tagged by the extractor.
    Footnote,
}

/// One structural block produced by the extractor, in reading order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedBlock {
    /// Structural role.
    #[serde(rename = "type")]
    pub block_type: Option<BlockType>,
    /// Text content for text/title/caption/footnote blocks.
    #[serde(default)]
    pub text: String,
    /// Table body HTML for table blocks.
    #[serde(default)]
    pub table_body: String,
    /// Captions the extractor already associated with a table.
    #[serde(default)]
    pub table_caption: Vec<String>,
    /// Footnotes the extractor already associated with a table.
    #[serde(default)]
    pub table_footnote: Vec<String>,
    /// Extracted image path for image blocks.
    #[serde(default)]
    pub img_path: String,
    /// Captions the extractor already associated with an image.
    #[serde(default)]
    pub img_caption: Vec<String>,
    /// Footnotes the extractor already associated with an image.
    #[serde(default)]
    pub img_footnote: Vec<String>,
    /// 0-based page index as emitted by the extractor.
    pub page_idx: i32,
}

/// Artifacts produced by the structural extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseArtifacts {
    /// Path of the block list JSON (a serialized `Vec<ParsedBlock>`).
    pub json_path: PathBuf,
    /// Path of the character span artifact.
    pub spans_path: Option<PathBuf>,
    /// Path of the layout artifact.
    pub layout_path: Option<PathBuf>,
    /// Directory of extracted images.
    ///
    /// Rendered page images follow the `page_{idx}.png` naming convention
    /// inside this directory, with `idx` the 1-based page index.
    pub images_dir: Option<PathBuf>,
}

/// Converts uploaded office documents to PDF.
#[async_trait::async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Converts `source` into a PDF under `output_dir`, returning the PDF
    /// path. Sources that are already PDFs are not passed here.
    async fn convert(&self, source: &Path, output_dir: &Path) -> Result<PathBuf>;
}

/// Extracts page-aligned structural blocks from a PDF.
#[async_trait::async_trait]
pub trait StructureParser: Send + Sync {
    /// Parses `pdf` and writes artifacts under `output_dir`.
    ///
    /// The block list artifact must deserialize as `Vec<ParsedBlock>` in
    /// reading order.
    async fn parse(&self, pdf: &Path, output_dir: &Path) -> Result<ParseArtifacts>;
}

//! Concrete external collaborators: the LibreOffice converter and the
//! remote structural extraction service.

use std::path::{Path, PathBuf};

use kbase_core::{Error, Result};
use kbase_pipeline::{DocumentConverter, ParseArtifacts, StructureParser};
use serde::{Deserialize, Serialize};
use url::Url;

/// Tracing target for external collaborator calls.
const TRACING_TARGET: &str = "kbase::external";

/// Converts office documents to PDF through a headless LibreOffice.
pub struct SofficeConverter {
    soffice_path: String,
}

impl SofficeConverter {
    /// Creates a converter using the given `soffice` executable.
    pub fn new(soffice_path: impl Into<String>) -> Self {
        Self {
            soffice_path: soffice_path.into(),
        }
    }
}

#[async_trait::async_trait]
impl DocumentConverter for SofficeConverter {
    async fn convert(&self, source: &Path, output_dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            Error::external_error()
                .with_message(format!("cannot create {}", output_dir.display()))
                .with_source(Box::new(e))
        })?;

        tracing::info!(
            target: TRACING_TARGET,
            source = %source.display(),
            "Converting document to PDF"
        );

        let output = tokio::process::Command::new(&self.soffice_path)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(output_dir)
            .arg(source)
            .output()
            .await
            .map_err(|e| {
                Error::external_error()
                    .with_message("failed to launch the PDF converter")
                    .with_source(Box::new(e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::external_error().with_message(format!(
                "PDF conversion exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let stem = source
            .file_stem()
            .ok_or_else(|| Error::invalid_input().with_message("source has no file name"))?;
        let pdf_path = output_dir.join(stem).with_extension("pdf");

        if !tokio::fs::try_exists(&pdf_path).await.unwrap_or(false) {
            return Err(Error::external_error().with_message(format!(
                "converter reported success but {} is missing",
                pdf_path.display()
            )));
        }

        Ok(pdf_path)
    }
}

#[derive(Serialize)]
struct ParseRequestBody<'a> {
    pdf_path: &'a str,
    output_dir: &'a str,
}

#[derive(Deserialize)]
struct ParseResponseBody {
    json_path: PathBuf,
    #[serde(default)]
    spans_path: Option<PathBuf>,
    #[serde(default)]
    layout_path: Option<PathBuf>,
    #[serde(default)]
    images_dir: Option<PathBuf>,
}

/// Calls the remote layout-extraction service over HTTP.
pub struct RemoteParser {
    endpoint: Url,
    http: reqwest::Client,
}

impl RemoteParser {
    /// Creates a parser client for the given endpoint.
    pub fn new(endpoint: Url) -> Result<Self> {
        let http = reqwest::Client::builder().build().map_err(|e| {
            Error::configuration()
                .with_message("failed to build parser HTTP client")
                .with_source(Box::new(e))
        })?;
        Ok(Self { endpoint, http })
    }
}

#[async_trait::async_trait]
impl StructureParser for RemoteParser {
    async fn parse(&self, pdf: &Path, output_dir: &Path) -> Result<ParseArtifacts> {
        tracing::info!(
            target: TRACING_TARGET,
            pdf = %pdf.display(),
            "Requesting structural extraction"
        );

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&ParseRequestBody {
                pdf_path: &pdf.to_string_lossy(),
                output_dir: &output_dir.to_string_lossy(),
            })
            .send()
            .await
            .map_err(|e| {
                let base = if e.is_timeout() {
                    Error::timeout()
                } else {
                    Error::network_error()
                };
                base.with_message("structural extraction request failed")
                    .with_source(Box::new(e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let error = if status.is_server_error() {
                Error::service_unavailable()
            } else {
                Error::external_error()
            };
            return Err(error.with_message(format!(
                "structural extraction returned {status}: {}",
                detail.chars().take(512).collect::<String>()
            )));
        }

        let body: ParseResponseBody = response.json().await.map_err(|e| {
            Error::serialization()
                .with_message("malformed structural extraction response")
                .with_source(Box::new(e))
        })?;

        Ok(ParseArtifacts {
            json_path: body.json_path,
            spans_path: body.spans_path,
            layout_path: body.layout_path,
            images_dir: body.images_dir,
        })
    }
}

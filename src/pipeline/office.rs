//! Word-processor → PDF conversion through headless LibreOffice.
//!
//! `soffice --headless --convert-to pdf --outdir <dir> <file>` writes
//! `<dir>/<stem>.pdf`. Each conversion gets its own LibreOffice profile
//! directory inside the workspace: two `soffice` processes sharing the
//! default profile block on its lock, which breaks concurrent extractions.
//!
//! Conversion failure is fatal for the document and is not retried.

use crate::error::LeaseError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Converter invocation settings.
#[derive(Debug, Clone)]
pub struct Converter {
    pub program: String,
    pub timeout_secs: u64,
}

impl Converter {
    /// Convert `input` to PDF inside `out_dir` and return the PDF's path.
    pub async fn to_pdf(
        &self,
        input: &Path,
        out_dir: &Path,
        document: &str,
    ) -> Result<PathBuf, LeaseError> {
        let profile = out_dir.join("lo-profile");
        let mut cmd = Command::new(&self.program);
        cmd.arg(format!("-env:UserInstallation={}", file_url(&profile)))
            .args(["--headless", "--norestore", "--convert-to", "pdf", "--outdir"])
            .arg(out_dir)
            .arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("Converting {} to PDF with {}", document, self.program);
        let output = tokio::time::timeout(Duration::from_secs(self.timeout_secs), cmd.output())
            .await
            .map_err(|_| LeaseError::ConversionTimeout {
                document: document.to_string(),
                secs: self.timeout_secs,
            })?
            .map_err(|e| LeaseError::ConverterUnavailable {
                program: self.program.clone(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(LeaseError::ConversionFailed {
                document: document.to_string(),
                detail: format!(
                    "{} exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        let pdf = expected_output(input, out_dir);
        match tokio::fs::metadata(&pdf).await {
            Ok(meta) if meta.len() > 0 => {
                debug!("Converted {} → {} ({} bytes)", document, pdf.display(), meta.len());
                Ok(pdf)
            }
            _ => Err(LeaseError::ConversionFailed {
                document: document.to_string(),
                detail: format!(
                    "no PDF produced at {}; converter said: {}",
                    pdf.display(),
                    String::from_utf8_lossy(&output.stdout).trim()
                ),
            }),
        }
    }
}

/// `<out_dir>/<input stem>.pdf`
fn expected_output(input: &Path, out_dir: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string());
    out_dir.join(format!("{stem}.pdf"))
}

fn file_url(path: &Path) -> String {
    let s = path.to_string_lossy().replace('\\', "/");
    if s.starts_with('/') {
        format!("file://{s}")
    } else {
        format!("file:///{s}")
    }
}

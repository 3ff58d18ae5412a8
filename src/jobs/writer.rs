//! # Result writers.
//!
//! [`ResultWriter`] receives each document once it is produced. [`ReportWriter`]
//! is the built-in implementation:
//!
//! | Mode     | Rendering                                  |
//! |----------|--------------------------------------------|
//! | `Json`   | pretty-printed JSON of the whole document  |
//! | `Html`   | standalone page embedding the escaped JSON |
//! | `Pretty` | one line per top-level body field          |

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::config::{Destination, OutputMode};
use crate::error::WriteError;
use crate::jobs::ResultDocument;

/// Shared handle to a writer.
pub type ResultWriterRef = Arc<dyn ResultWriter>;

/// Sink for result documents.
#[async_trait]
pub trait ResultWriter: Send + Sync + 'static {
    /// Writes `doc` in `mode` to `destination` and hands back the (possibly transformed) document.
    async fn write(
        &self,
        doc: ResultDocument,
        mode: OutputMode,
        destination: &Destination,
    ) -> Result<ResultDocument, WriteError>;
}

/// Built-in writer for stdout and files.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReportWriter;

impl ReportWriter {
    pub fn new() -> Self {
        Self
    }

    /// Renders `doc` in the given mode.
    pub fn render(&self, doc: &ResultDocument, mode: OutputMode) -> Result<String, WriteError> {
        match mode {
            OutputMode::Json => Ok(serde_json::to_string_pretty(doc)?),
            OutputMode::Html => render_html(doc),
            OutputMode::Pretty => Ok(render_pretty(doc)),
        }
    }
}

#[async_trait]
impl ResultWriter for ReportWriter {
    async fn write(
        &self,
        doc: ResultDocument,
        mode: OutputMode,
        destination: &Destination,
    ) -> Result<ResultDocument, WriteError> {
        let rendered = self.render(&doc, mode)?;

        match destination {
            Destination::Stdout => {
                let mut out = tokio::io::stdout();
                out.write_all(rendered.as_bytes()).await?;
                out.write_all(b"\n").await?;
                out.flush().await?;
            }
            Destination::File(path) => {
                create_parent(path).await?;
                tokio::fs::write(path, rendered).await?;
                tracing::info!(path = %path.display(), mode = %mode, "report written");
            }
        }
        Ok(doc)
    }
}

async fn create_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir).await,
        _ => Ok(()),
    }
}

fn render_pretty(doc: &ResultDocument) -> String {
    let mut out = format!("Results for {}\n", doc.address);
    match &doc.body {
        Value::Object(map) => {
            for (key, value) in map {
                let _ = writeln!(out, "  {key}: {}", inline(value));
            }
        }
        other => {
            let _ = writeln!(out, "  {}", inline(other));
        }
    }
    out
}

fn inline(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_html(doc: &ResultDocument) -> Result<String, WriteError> {
    let json = serde_json::to_string_pretty(doc)?;
    Ok(format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Report for {title}</title>\n</head>\n\
         <body>\n<h1>{title}</h1>\n<pre>{body}</pre>\n</body>\n</html>\n",
        title = escape_html(&doc.address),
        body = escape_html(&json),
    ))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

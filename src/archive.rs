//! On-disk archive of migrated jobs.
//!
//! Layout, one directory per job named after its tracking id:
//!
//! ```text
//! <dir>/<tracking-id>/message      metadata dump
//! <dir>/<tracking-id>/properties   key=value lines
//! <dir>/<tracking-id>/body.<ext>   string | map | bytes | object
//! ```
//!
//! Archiving is a local side effect and runs in dry-run mode too.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::broker::MessageBody;
use crate::error::MigrateError;
use crate::helpers::amqp_value::{map_to_json, value_to_json};
use crate::record::TransformedJob;
use crate::removal::SinkOutcome;

pub const MESSAGE_FILE: &str = "message";
pub const PROPERTIES_FILE: &str = "properties";

/// File name for an archived body, or `None` when the body is not archived.
pub fn body_file_name(body: &MessageBody) -> Option<&'static str> {
    match body {
        MessageBody::Text(_) => Some("body.string"),
        MessageBody::Map(_) => Some("body.map"),
        MessageBody::Binary(_) => Some("body.bytes"),
        MessageBody::Opaque(_) | MessageBody::Sequence(_) => Some("body.object"),
        MessageBody::Unclassified => None,
    }
}

/// Serialized bytes of an archived body. Structured bodies become pretty JSON.
fn encode_body(body: &MessageBody) -> Result<Option<Vec<u8>>> {
    let bytes = match body {
        MessageBody::Text(text) => text.as_bytes().to_vec(),
        MessageBody::Map(map) => serde_json::to_vec_pretty(&map_to_json(map))?,
        MessageBody::Binary(bytes) => bytes.clone(),
        MessageBody::Opaque(value) => serde_json::to_vec_pretty(&value_to_json(value))?,
        MessageBody::Sequence(sections) => {
            let sections: Vec<serde_json::Value> = sections
                .iter()
                .map(|section| section.iter().map(value_to_json).collect())
                .collect();
            serde_json::to_vec_pretty(&sections)?
        }
        MessageBody::Unclassified => return Ok(None),
    };
    Ok(Some(bytes))
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Renders properties as `key=value` lines. `=` in keys and line breaks in
/// either part are escaped so each entry stays on one line.
pub fn render_properties<'a, I>(properties: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut out = String::new();
    for (key, value) in properties {
        out.push_str(&escape(key).replace('=', "\\="));
        out.push('=');
        out.push_str(&escape(value));
        out.push('\n');
    }
    out
}

/// Directory name for a tracking id. Path separators are replaced so an id
/// can never escape the archive root.
fn directory_name(tracking_id: &str) -> String {
    let name: String = tracking_id
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    match name.as_str() {
        "" | "." | ".." => name.replace('.', "_") + "_",
        _ => name,
    }
}

/// Writes migrated jobs under an optional archive root.
#[derive(Debug, Clone, Default)]
pub struct Archiver {
    root: Option<PathBuf>,
}

impl Archiver {
    /// An archiver that does nothing.
    pub fn disabled() -> Self {
        Self { root: None }
    }

    /// Creates the archive root if needed.
    pub async fn prepare(root: Option<PathBuf>) -> Result<Self, MigrateError> {
        let Some(root) = root else {
            info!("Target directory not specified");
            return Ok(Self::disabled());
        };

        fs::create_dir_all(&root)
            .await
            .map_err(|source| MigrateError::ArchiveSetup {
                path: root.clone(),
                source,
            })?;
        info!(dir = %root.display(), "Target directory ready");
        Ok(Self { root: Some(root) })
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn is_enabled(&self) -> bool {
        self.root.is_some()
    }

    /// Archives one job. Any I/O problem is logged and reported as a single failure.
    pub async fn store(&self, job: &TransformedJob) -> SinkOutcome {
        let Some(root) = &self.root else {
            return SinkOutcome::Done;
        };

        match self.write(root, job).await {
            Ok(()) => SinkOutcome::Done,
            Err(e) => {
                warn!(
                    tracking_id = job.tracking_id().unwrap_or("<none>"),
                    error = %format!("{:#}", e),
                    "Failed to archive job"
                );
                SinkOutcome::Failed
            }
        }
    }

    async fn write(&self, root: &Path, job: &TransformedJob) -> Result<()> {
        let tracking_id = job
            .tracking_id()
            .ok_or_else(|| anyhow!("job has no '{}' property", job.tracking_property))?;

        let dir = root.join(directory_name(tracking_id));
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
        debug!(dir = %dir.display(), "Archiving job");

        let message_path = dir.join(MESSAGE_FILE);
        fs::write(&message_path, job.to_string())
            .await
            .with_context(|| format!("writing {}", message_path.display()))?;

        let properties_path = dir.join(PROPERTIES_FILE);
        fs::write(&properties_path, render_properties(&job.properties))
            .await
            .with_context(|| format!("writing {}", properties_path.display()))?;

        match (body_file_name(&job.body), encode_body(&job.body)?) {
            (Some(name), Some(bytes)) => {
                let body_path = dir.join(name);
                fs::write(&body_path, bytes)
                    .await
                    .with_context(|| format!("writing {}", body_path.display()))?;
                debug!(body = %body_path.display(), "Body archived");
            }
            _ => {
                warn!(
                    tracking_id,
                    kind = job.body.kind(),
                    "Unknown message body type, body not archived"
                );
            }
        }

        Ok(())
    }
}

//! Writing documents to disk.

use std::path::Path;

use serde::Serialize;

use crate::error::{ExportError, ExportResult};

/// Pretty JSON with a trailing newline, the format of every file this tool writes.
pub fn render_json<T: Serialize + ?Sized>(value: &T) -> ExportResult<String> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    Ok(body)
}

/// Serialize `value` to `path`, replacing whatever was there.
pub async fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> ExportResult<()> {
    let body = render_json(value)?;
    tokio::fs::write(path, body.as_bytes())
        .await
        .map_err(|e| ExportError::io(path, e))?;
    tracing::info!(path = %path.display(), bytes = body.len(), "wrote export");
    Ok(())
}

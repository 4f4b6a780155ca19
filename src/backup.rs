//! Zip bundles carrying a full snapshot of the gradebook.
//!
//! A bundle holds `manifest.json` and `data/snapshot.json`. Restores go
//! through `snapshot::import_full`, so a bundle is validated the same way a
//! snapshot file is.

use crate::error::StoreError;
use crate::snapshot;
use crate::store::{Store, StoreCounts};
use anyhow::Context;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const SNAPSHOT_ENTRY: &str = "data/snapshot.json";
pub const BUNDLE_FORMAT_V1: &str = "registro-bundle-v1";
pub const PLAIN_SNAPSHOT_FORMAT: &str = "registro-snapshot-json";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
    pub snapshot_sha256: String,
    pub counts: StoreCounts,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub restored: snapshot::ImportSummary,
}

fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

fn invalid(msg: impl Into<String>) -> anyhow::Error {
    StoreError::InvalidFormat(msg.into()).into()
}

pub fn export_bundle(store: &Store, out_path: &Path) -> anyhow::Result<ExportSummary> {
    let text = snapshot::export_full(store)?;
    let counts = store.counts()?;
    let snapshot_sha256 = sha256_hex(text.as_bytes());

    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT_V1,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
        "snapshotVersion": snapshot::FORMAT_VERSION,
        "snapshotSha256": snapshot_sha256,
        "counts": counts,
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(SNAPSHOT_ENTRY, opts)
        .context("failed to start snapshot entry")?;
    zip.write_all(text.as_bytes())
        .context("failed to write snapshot entry")?;

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT_V1.to_string(),
        entry_count: 2,
        snapshot_sha256,
        counts,
    })
}

/// Replaces the store's contents with the bundle's snapshot. A file that is
/// not a zip is read as a plain JSON snapshot.
pub fn import_bundle(store: &Store, in_path: &Path) -> anyhow::Result<ImportSummary> {
    if !is_zip_file(in_path)? {
        let bytes = std::fs::read(in_path)
            .with_context(|| format!("failed to read {}", in_path.to_string_lossy()))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| invalid("input is neither a bundle nor a JSON snapshot"))?;
        let restored = snapshot::import_full(store, &text)?;
        return Ok(ImportSummary {
            bundle_format_detected: PLAIN_SNAPSHOT_FORMAT.to_string(),
            restored,
        });
    }

    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive =
        ZipArchive::new(in_file).map_err(|e| invalid(format!("invalid zip archive: {e}")))?;

    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .map_err(|_| invalid("bundle missing manifest.json"))?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value = serde_json::from_str(&manifest_text)
        .map_err(|e| invalid(format!("manifest.json is invalid JSON: {e}")))?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT_V1 {
        return Err(invalid(format!("unsupported bundle format: {format}")));
    }
    let expected_sha = manifest
        .get("snapshotSha256")
        .and_then(|v| v.as_str())
        .map(|s| s.to_ascii_lowercase());

    let mut text = String::new();
    archive
        .by_name(SNAPSHOT_ENTRY)
        .map_err(|_| invalid(format!("bundle missing {SNAPSHOT_ENTRY}")))?
        .read_to_string(&mut text)
        .context("failed to extract snapshot entry")?;
    if let Some(expected) = expected_sha {
        let actual = sha256_hex(text.as_bytes());
        if actual != expected {
            return Err(invalid(format!(
                "snapshot checksum mismatch: manifest {expected} vs bundle {actual}"
            )));
        }
    }

    let restored = snapshot::import_full(store, &text)?;
    Ok(ImportSummary {
        bundle_format_detected: BUNDLE_FORMAT_V1.to_string(),
        restored,
    })
}

fn is_zip_file(path: &Path) -> anyhow::Result<bool> {
    let mut f = File::open(path)
        .with_context(|| format!("failed to open input file {}", path.to_string_lossy()))?;
    let mut sig = [0u8; 4];
    let read = f.read(&mut sig).context("failed to read file signature")?;
    if read < 4 {
        return Ok(false);
    }
    Ok(sig == [0x50, 0x4B, 0x03, 0x04])
}

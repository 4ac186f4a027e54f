//! FB2-specific intermediate step.
//!
//! A FB2 document embeds its images as `<binary id="..." content-type="...">`
//! elements holding base64 text. They are written to the workspace under their
//! id so that the rendered XHTML and the OPF manifest can refer to them, then the
//! three stylesheets produce the documents the compiler actually reads.

use std::path::{Path, PathBuf};

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use lazy_static::lazy_static;
use regex::bytes::Regex;
use tokio::task::spawn_blocking;

use crate::converter::transform::{Stylesheet, StylesheetTransform};
use crate::error::{Error, Result};
use crate::path_utils::sanitize_filename;
use crate::types::Variant;
use crate::workspace::Workspace;

lazy_static! {
    /// Matches a (possibly prefixed) `binary` element, capturing its attributes and body.
    /// A self-closing element matches without a body.
    /// Byte-level and ASCII-only so documents in legacy encodings still match.
    static ref BINARY_ELEMENT: Regex = Regex::new(
        r"(?s-u)<(?:[A-Za-z_][\w.-]*:)?binary\b((?:[^>/]|/[^>])*)(?:/>|>(.*?)</(?:[A-Za-z_][\w.-]*:)?binary\s*>)"
    )
    .unwrap();
    /// Matches the `id` attribute inside an element's attribute list.
    static ref ID_ATTRIBUTE: Regex =
        Regex::new(r#"(?-u)(?:^|\s)id\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap();
}

/// FB2 producers are sloppy about padding, so accept it either way.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// A decoded embedded attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Sanitized id, usable as a file name.
    pub id: String,
    pub data: Vec<u8>,
}

/// Finds and decodes every embedded attachment of a FB2 document.
///
/// Elements without an `id` or without a body are skipped; invalid base64 is an error.
pub fn extract_attachments(document: &[u8]) -> Result<Vec<Attachment>> {
    let mut attachments = Vec::new();

    for element in BINARY_ELEMENT.captures_iter(document) {
        let Some(body) = element.get(2) else {
            log::debug!("Skipping empty embedded binary");
            continue;
        };
        let attributes = &element[1];
        let Some(id) = ID_ATTRIBUTE
            .captures(attributes)
            .and_then(|c| c.get(1).or_else(|| c.get(2)))
            .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
            .filter(|id| !id.trim().is_empty())
        else {
            log::warn!("Skipping embedded binary without an id");
            continue;
        };

        let payload: Vec<u8> = body
            .as_bytes()
            .iter()
            .copied()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        let data = BASE64.decode(&payload).map_err(|e| {
            Error::Transform(format!("Embedded binary '{}' is not valid base64: {}", id, e))
        })?;

        attachments.push(Attachment {
            id: sanitize_filename(&id),
            data,
        });
    }

    Ok(attachments)
}

/// Reads the staged document and writes its attachments into `dir`.
/// Returns how many were written.
fn save_attachments(document_path: &Path, dir: &Path) -> Result<usize> {
    let document = std::fs::read(document_path)?;
    let attachments = extract_attachments(&document)?;
    for attachment in &attachments {
        std::fs::write(dir.join(&attachment.id), &attachment.data)?;
    }
    Ok(attachments.len())
}

/// Runs the FB2 intermediate step inside `workspace` and returns the document
/// to hand to the compiler (the OPF package).
pub async fn produce_intermediate(
    workspace: &Workspace,
    transformer: &dyn StylesheetTransform,
) -> Result<PathBuf> {
    let staged = workspace.local_input(Variant::Fb2);

    let document_path = staged.clone();
    let dir = workspace.path().to_path_buf();
    let saved = spawn_blocking(move || save_attachments(&document_path, &dir)).await??;
    log::debug!("Saved {} embedded binaries", saved);

    for stylesheet in Stylesheet::ALL {
        let output = workspace.file(stylesheet.output_file_name());
        transformer.transform(stylesheet, &staged, &output).await?;
    }

    Ok(workspace.file(Stylesheet::Package.output_file_name()))
}

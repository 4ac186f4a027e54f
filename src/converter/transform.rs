//! Structural transforms that turn a staged FB2 document into compiler input.
//!
//! The three rule sets ship with the crate as XSLT stylesheets. Applying them is
//! delegated to a [`StylesheetTransform`]; the default [`XsltProcessor`] runs the
//! `xsltproc` command-line processor.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::fs;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::path_utils::path_to_string_lossy;

/// Executable name of the default XSLT processor, resolved through `PATH`.
pub const DEFAULT_XSLT_PROCESSOR: &str = "xsltproc";

/// One of the FB2 rule sets.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Stylesheet {
    /// Renders the book body as a single XHTML page.
    Xhtml,
    /// Produces the OPF package manifest the compiler is pointed at.
    Package,
    /// Produces the NCX navigation map.
    Navigation,
}

impl Stylesheet {
    /// All rule sets, in the order they are applied.
    pub const ALL: [Stylesheet; 3] = [
        Stylesheet::Xhtml,
        Stylesheet::Package,
        Stylesheet::Navigation,
    ];

    /// XSLT source of the rule set.
    pub fn source(&self) -> &'static str {
        match self {
            Stylesheet::Xhtml => include_str!("../../templates/fb2_xhtml.xsl"),
            Stylesheet::Package => include_str!("../../templates/fb2_opf.xsl"),
            Stylesheet::Navigation => include_str!("../../templates/fb2_ncx.xsl"),
        }
    }

    /// Fixed name of the document this rule set produces inside a workspace.
    pub fn output_file_name(&self) -> &'static str {
        match self {
            Stylesheet::Xhtml => "index.html",
            Stylesheet::Package => "book.opf",
            Stylesheet::Navigation => "book.ncx",
        }
    }

    fn sheet_file_name(&self) -> &'static str {
        match self {
            Stylesheet::Xhtml => "fb2_xhtml.xsl",
            Stylesheet::Package => "fb2_opf.xsl",
            Stylesheet::Navigation => "fb2_ncx.xsl",
        }
    }
}

/// Applies a rule set to a staged document, producing one output document.
#[async_trait]
pub trait StylesheetTransform: Send + Sync {
    /// Transforms `input` with `stylesheet` and writes the result to `output`.
    ///
    /// Failures should be reported as [`Error::Transform`].
    async fn transform(&self, stylesheet: Stylesheet, input: &Path, output: &Path) -> Result<()>;
}

/// Runs `xsltproc -o <output> <sheet> <input>` for every transform.
#[derive(Debug, Clone)]
pub struct XsltProcessor {
    executable: PathBuf,
}

impl XsltProcessor {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }
}

impl Default for XsltProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_XSLT_PROCESSOR)
    }
}

#[async_trait]
impl StylesheetTransform for XsltProcessor {
    async fn transform(&self, stylesheet: Stylesheet, input: &Path, output: &Path) -> Result<()> {
        // The sheet sits next to its output, i.e. inside the job's workspace.
        let sheet_path = output.with_file_name(stylesheet.sheet_file_name());
        fs::write(&sheet_path, stylesheet.source())
            .await
            .map_err(|e| Error::Transform(format!("Failed to write stylesheet: {}", e)))?;

        log::debug!(
            "Applying {:?} stylesheet to '{}'",
            stylesheet,
            path_to_string_lossy(input)
        );

        let result = Command::new(&self.executable)
            .arg("-o")
            .arg(output)
            .arg(&sheet_path)
            .arg(input)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                Error::Transform(format!(
                    "Failed to run '{}': {}",
                    path_to_string_lossy(&self.executable),
                    e
                ))
            })?;

        if !result.status.success() {
            return Err(Error::Transform(format!(
                "{:?} stylesheet failed with exit code {:?}: {}",
                stylesheet,
                result.status.code(),
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }
        if !fs::try_exists(output).await.unwrap_or(false) {
            return Err(Error::Transform(format!(
                "{:?} stylesheet produced no '{}'",
                stylesheet,
                stylesheet.output_file_name()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stylesheets_are_embedded() {
        for sheet in Stylesheet::ALL {
            assert!(sheet.source().contains("xsl:stylesheet"));
            assert!(sheet.source().contains("http://www.gribuser.ru/xml/fictionbook/2.0"));
        }
    }

    #[test]
    fn test_output_names_are_distinct() {
        assert_eq!(Stylesheet::Xhtml.output_file_name(), "index.html");
        assert_eq!(Stylesheet::Package.output_file_name(), "book.opf");
        assert_eq!(Stylesheet::Navigation.output_file_name(), "book.ncx");
    }

    #[tokio::test]
    async fn test_missing_processor_is_a_transform_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("book.fb2");
        std::fs::write(&input, "<FictionBook/>").unwrap();

        let processor = XsltProcessor::new("definitely-not-an-xslt-processor");
        let err = processor
            .transform(Stylesheet::Xhtml, &input, &dir.path().join("index.html"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transform(_)));
    }
}

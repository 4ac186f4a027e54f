use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::path_utils::path_to_string_lossy;

/// What one run of the external compiler left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolRun {
    /// Standard output followed by standard error.
    pub output: String,
    /// `None` if the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

/// Runs the compiler on `input`, telling it to write `output_file_name` next to it.
///
/// Blocks the calling task until the process exits. A non-zero exit code is not an
/// error here: whether the job worked is decided by the output file existing.
pub async fn run_compiler(
    config: &EngineConfig,
    input: &Path,
    output_file_name: &str,
) -> Result<ToolRun> {
    let args = config.compiler_args(input, output_file_name);
    log::debug!(
        "Running '{}' {:?}",
        path_to_string_lossy(&config.compiler_path),
        args
    );

    let result = Command::new(&config.compiler_path)
        .args(&args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| {
            Error::ExternalTool(format!(
                "Failed to run '{}': {}",
                path_to_string_lossy(&config.compiler_path),
                e
            ))
        })?;

    let mut output = String::from_utf8_lossy(&result.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&result.stderr);
    if !stderr.trim().is_empty() {
        if !output.is_empty() && !output.ends_with('\n') {
            output.push('\n');
        }
        output.push_str(&stderr);
    }

    Ok(ToolRun {
        output: output.trim_end().to_string(),
        exit_code: result.status.code(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_compiler_is_an_external_tool_error() {
        let config = EngineConfig::builder()
            .compiler_path("no-such-ebook-compiler")
            .build()
            .unwrap();
        let err = run_compiler(&config, Path::new("book.epub"), "book.mobi")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ExternalTool(ref m) if m.contains("no-such-ebook-compiler")));
    }
}

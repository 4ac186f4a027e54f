//! Engine configuration, built declaratively with the builder pattern.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Executable name of the external e-book compiler, resolved through `PATH`.
pub const DEFAULT_COMPILER: &str = "kindlegen";
/// Highest compression level the compiler accepts (`-c0` .. `-c2`).
pub const MAX_COMPRESSION_LEVEL: u8 = 2;

/// How many jobs may do work at the same time.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum JobLimit {
    /// Every discovered file runs immediately.
    #[default]
    Unbounded,
    /// At most `n` jobs run at once; the rest wait for a permit.
    Fixed(usize),
    /// At most one job per logical CPU.
    PerCpu,
}

impl JobLimit {
    /// Number of permits to hand out, or `None` for no limit.
    pub fn permits(&self) -> Option<usize> {
        match self {
            JobLimit::Unbounded => None,
            JobLimit::Fixed(n) => Some(*n),
            JobLimit::PerCpu => Some(num_cpus::get().max(1)),
        }
    }
}

/// Immutable configuration snapshot read by every conversion of a batch.
///
/// ```rust,no_run
/// # use mobi_batch::prelude::*;
/// let config = EngineConfig::builder()
///     .overwrite_existing_output(true)
///     .compression_level(2u8)
///     .job_limit(JobLimit::PerCpu)
///     .build()
///     .expect("Invalid configuration");
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into), build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EngineConfig {
    /// Delete a source file once its destination file exists.
    #[builder(default = "false")]
    pub delete_input_on_success: bool,

    /// Convert again even if the destination file already exists.
    ///
    /// When `false`, a job whose destination exists is reported as already converted
    /// without staging or compiling anything.
    #[builder(default = "false")]
    pub overwrite_existing_output: bool,

    /// Compression level passed to the compiler as `-c<level>`.
    #[builder(default = "1")]
    pub compression_level: u8,

    /// Pass `-verbose` to the compiler.
    #[builder(default = "false")]
    pub verbose_tool_output: bool,

    /// Path or name of the compiler executable.
    #[builder(default = "PathBuf::from(DEFAULT_COMPILER)")]
    pub compiler_path: PathBuf,

    /// Directory under which per-job workspaces are created.
    #[builder(default = "std::env::temp_dir()")]
    pub workspace_root: PathBuf,

    #[builder(default)]
    pub job_limit: JobLimit,
}

impl EngineConfig {
    /// Creates a new builder for configuring `EngineConfig`.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Arguments for one compiler run, in order:
    /// `[-verbose] -c<level> <input> -o <output_file_name>`.
    pub fn compiler_args(&self, input: &Path, output_file_name: &str) -> Vec<OsString> {
        let mut args = Vec::with_capacity(5);
        if self.verbose_tool_output {
            args.push("-verbose".into());
        }
        args.push(format!("-c{}", self.compression_level).into());
        args.push(input.as_os_str().to_os_string());
        args.push("-o".into());
        args.push(output_file_name.into());
        args
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            delete_input_on_success: false,
            overwrite_existing_output: false,
            compression_level: 1,
            verbose_tool_output: false,
            compiler_path: PathBuf::from(DEFAULT_COMPILER),
            workspace_root: std::env::temp_dir(),
            job_limit: JobLimit::Unbounded,
        }
    }
}

impl EngineConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        if let Some(level) = self.compression_level {
            if level > MAX_COMPRESSION_LEVEL {
                return Err(format!(
                    "Compression level must be between 0 and {}, got {}.",
                    MAX_COMPRESSION_LEVEL, level
                ));
            }
        }
        if let Some(JobLimit::Fixed(0)) = self.job_limit {
            return Err("A fixed job limit must allow at least one job.".to_string());
        }
        if let Some(path) = &self.compiler_path {
            if path.as_os_str().is_empty() {
                return Err("Compiler path must not be empty.".to_string());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_default() {
        let built = EngineConfig::builder().build().unwrap();
        let default = EngineConfig::default();
        assert_eq!(built.compression_level, default.compression_level);
        assert_eq!(built.compiler_path, default.compiler_path);
        assert_eq!(built.job_limit, JobLimit::Unbounded);
        assert!(!built.overwrite_existing_output);
        assert!(!built.delete_input_on_success);
    }

    #[test]
    fn test_builder_rejects_compression_level() {
        let err = EngineConfig::builder()
            .compression_level(3u8)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Compression level"));
    }

    #[test]
    fn test_builder_rejects_zero_job_limit() {
        assert!(
            EngineConfig::builder()
                .job_limit(JobLimit::Fixed(0))
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_compiler_args() {
        let config = EngineConfig::builder()
            .compression_level(2u8)
            .build()
            .unwrap();
        let args = config.compiler_args(Path::new("/tmp/ws/book.epub"), "book.mobi");
        assert_eq!(args, vec!["-c2", "/tmp/ws/book.epub", "-o", "book.mobi"]);

        let verbose = EngineConfig::builder()
            .verbose_tool_output(true)
            .build()
            .unwrap();
        let args = verbose.compiler_args(Path::new("book.opf"), "book.mobi");
        assert_eq!(args, vec!["-verbose", "-c1", "book.opf", "-o", "book.mobi"]);
    }

    #[test]
    fn test_job_limit_permits() {
        assert_eq!(JobLimit::Unbounded.permits(), None);
        assert_eq!(JobLimit::Fixed(3).permits(), Some(3));
        assert!(JobLimit::PerCpu.permits().unwrap() >= 1);
    }
}

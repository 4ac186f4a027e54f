//! Per-job conversion.
//!
//! A [`Converter`] takes one [`ConversionJob`] through the fixed sequence
//! `stage input -> produce intermediate (FB2 only) -> run compiler -> publish output`
//! inside its own [`Workspace`]. Whatever happens, it returns exactly one
//! [`ConversionOutcome`]; step failures are recorded on it and never propagate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::task::spawn_blocking;

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::path_utils::path_to_string_lossy;
use crate::types::{ConversionJob, ConversionOutcome, Variant};
use crate::workspace::Workspace;

pub mod archive;
pub mod fb2;
pub mod kindlegen;
pub mod transform;

use kindlegen::{ToolRun, run_compiler};
use transform::StylesheetTransform;

/// Converts a single job. Cheap to construct; consumed by [`Converter::convert`].
pub struct Converter {
    job: ConversionJob,
    config: Arc<EngineConfig>,
    transformer: Arc<dyn StylesheetTransform>,
}

impl Converter {
    pub fn new(
        job: ConversionJob,
        config: Arc<EngineConfig>,
        transformer: Arc<dyn StylesheetTransform>,
    ) -> Self {
        Self {
            job,
            config,
            transformer,
        }
    }

    pub fn job(&self) -> &ConversionJob {
        &self.job
    }

    /// Runs the job to completion and reports how it went.
    pub async fn convert(self) -> ConversionOutcome {
        let destination = self.job.destination();

        if !self.config.overwrite_existing_output && exists(destination).await {
            log::debug!(
                "'{}' is already converted",
                path_to_string_lossy(self.job.source())
            );
            self.delete_source_if_converted(true).await;
            return self.outcome(Completion {
                already_converted: true,
                published: false,
                destination_exists: true,
                tool_run: ToolRun::default(),
                error: None,
            });
        }

        let mut tool_run = ToolRun::default();
        let (published, error) = match Workspace::create(&self.config.workspace_root) {
            Ok(workspace) => {
                let result = self.run_steps(&workspace, &mut tool_run).await;
                release(workspace).await;
                match result {
                    Ok(published) => (published, None),
                    Err(e) => (false, Some(e)),
                }
            }
            Err(e) => (false, Some(e)),
        };

        if let Some(e) = &error {
            log::warn!(
                "Conversion of '{}' failed: {}",
                path_to_string_lossy(self.job.source()),
                e
            );
        }

        let destination_exists = exists(destination).await;
        self.delete_source_if_converted(destination_exists).await;
        self.outcome(Completion {
            already_converted: false,
            published,
            destination_exists,
            tool_run,
            error,
        })
    }

    /// Runs the four steps and returns whether a destination file was written.
    async fn run_steps(&self, workspace: &Workspace, tool_run: &mut ToolRun) -> Result<bool> {
        self.stage_input(workspace)
            .await
            .map_err(|e| e.within_step(Error::Staging))?;

        let primary_input = self
            .produce_intermediate(workspace)
            .await
            .map_err(|e| e.within_step(Error::Transform))?;

        *tool_run = run_compiler(&self.config, &primary_input, &workspace.local_output_name())
            .await
            .map_err(|e| e.within_step(Error::ExternalTool))?;

        self.publish_output(workspace)
            .await
            .map_err(|e| e.within_step(Error::Publish))
    }

    /// Copies the source into the workspace, or extracts it if it is an archive.
    async fn stage_input(&self, workspace: &Workspace) -> Result<()> {
        let variant = self.job.format().variant();
        let target = workspace.local_input(variant);

        if self.job.format().is_archived() {
            let archive_path = self.job.source().to_path_buf();
            let entry = spawn_blocking(move || {
                archive::extract_first_matching(&archive_path, variant.extension(), &target)
            })
            .await??;
            log::debug!(
                "Extracted '{}' from '{}'",
                entry,
                path_to_string_lossy(self.job.source())
            );
        } else {
            fs::copy(self.job.source(), &target).await?;
        }
        Ok(())
    }

    /// Prepares what the compiler reads and returns its path.
    async fn produce_intermediate(&self, workspace: &Workspace) -> Result<PathBuf> {
        match self.job.format().variant() {
            Variant::Epub => Ok(workspace.local_input(Variant::Epub)),
            Variant::Fb2 => fb2::produce_intermediate(workspace, self.transformer.as_ref()).await,
        }
    }

    /// Copies the compiled book to the destination, if there is one to copy.
    /// Returns `false` when nothing was copied.
    async fn publish_output(&self, workspace: &Workspace) -> Result<bool> {
        let local_output = workspace.local_output();
        if !exists(&local_output).await {
            log::debug!(
                "Compiler produced no output for '{}'",
                path_to_string_lossy(self.job.source())
            );
            return Ok(false);
        }

        let destination = self.job.destination();
        if exists(destination).await && !self.config.overwrite_existing_output {
            return Ok(false);
        }

        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        fs::copy(&local_output, destination).await?;
        log::debug!("Published '{}'", path_to_string_lossy(destination));
        Ok(true)
    }

    async fn delete_source_if_converted(&self, converted: bool) {
        if !self.config.delete_input_on_success || !converted {
            return;
        }
        if let Err(e) = fs::remove_file(self.job.source()).await {
            log::warn!(
                "Failed to delete source '{}': {}",
                path_to_string_lossy(self.job.source()),
                e
            );
        }
    }

    fn outcome(&self, completion: Completion) -> ConversionOutcome {
        let Completion {
            already_converted,
            published,
            destination_exists,
            tool_run,
            error,
        } = completion;

        ConversionOutcome {
            source: self.job.source().to_path_buf(),
            destination: self.job.destination().to_path_buf(),
            succeeded: already_converted || (error.is_none() && published),
            already_converted,
            destination_exists,
            tool_output: tool_run.output,
            tool_exit_code: tool_run.exit_code,
            error_message: error.map(|e| e.to_string()),
        }
    }
}

/// What a finished job left behind.
struct Completion {
    already_converted: bool,
    /// This run copied a fresh book to the destination.
    published: bool,
    destination_exists: bool,
    tool_run: ToolRun,
    error: Option<Error>,
}

async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}

/// Removes a workspace off the async threads; failures are only logged.
async fn release(workspace: Workspace) {
    let path = workspace.path().to_path_buf();
    match spawn_blocking(move || workspace.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => log::warn!("{}", e),
        Err(e) => log::warn!(
            "Workspace cleanup task for '{}' failed: {}",
            path_to_string_lossy(&path),
            e
        ),
    }
}

//! Common test utilities and constants for the mobi-batch crate.
//!
//! Provides unique test directories, fixture books (plain, zipped and FB2),
//! a stand-in for the external compiler and in-process stylesheet transforms.

use async_trait::async_trait;
use mobi_batch::converter::transform::{Stylesheet, StylesheetTransform};
use mobi_batch::error::{Error, Result};
use rand::{Rng, distributions::Alphanumeric};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const LONG_TEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Marker that makes the fake compiler fail when found in its input.
#[allow(dead_code)]
pub const COMPILER_FAILURE_MARKER: &str = "FAIL";

/// Directories of one test case.
#[allow(dead_code)]
pub struct TestDirs {
    pub base: PathBuf,
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    /// Root for the per-job workspaces, so tests can check they are gone.
    pub workspace_root: PathBuf,
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

/// Creates a clean, uniquely named test directory with source, target and
/// workspace subdirectories. All returned paths are absolute.
#[allow(dead_code)]
pub fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let test_dir = PathBuf::from(TEST_TMP_DIR).join(format!("{}-{}", sub_path, random_suffix()));
    if test_dir.exists() {
        std::fs::remove_dir_all(&test_dir).unwrap();
    }
    std::fs::create_dir_all(&test_dir).unwrap();
    let base = test_dir.canonicalize().unwrap();

    let dirs = TestDirs {
        source_dir: base.join("source"),
        target_dir: base.join("target"),
        workspace_root: base.join("workspaces"),
        base,
    };
    std::fs::create_dir_all(&dirs.source_dir).unwrap();
    std::fs::create_dir_all(&dirs.workspace_root).unwrap();
    dirs
}

/// Writes `content` to `path`, creating parent directories.
#[allow(dead_code)]
pub fn write_file(path: &Path, content: impl AsRef<[u8]>) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

/// Writes a zip archive holding `entries` to `path`.
#[allow(dead_code)]
pub fn write_zip(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut zip = ZipWriter::new(std::fs::File::create(path).unwrap());
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap();
}

/// A small FB2 document with one embedded image (`cover.jpg`, decoding to `hello`).
#[allow(dead_code)]
pub fn fb2_document(title: &str) -> String {
    format!(
        r##"<?xml version="1.0" encoding="utf-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0" xmlns:l="http://www.w3.org/1999/xlink">
  <description>
    <title-info>
      <book-title>{title}</book-title>
      <coverpage><image l:href="#cover.jpg"/></coverpage>
    </title-info>
  </description>
  <body>
    <section><title><p>Chapter 1</p></title><p>Once upon a time.</p></section>
  </body>
  <binary id="cover.jpg" content-type="image/jpeg">aGVs
bG8=</binary>
</FictionBook>
"##
    )
}

#[allow(dead_code)]
const FAKE_COMPILER: &str = r#"#!/bin/sh
# Stand-in for the e-book compiler: copies its input to the requested output
# file next to it, or fails when the input contains the failure marker.
input=""
output=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) output="$2"; shift 2 ;;
    -verbose|-c*) shift ;;
    *) input="$1"; shift ;;
  esac
done
if grep -q FAIL "$input"; then
  echo "Error(prcgen):E23006: Input rejected"
  exit 2
fi
echo "compiled $input"
cp "$input" "$(dirname "$input")/$output"
"#;

#[allow(dead_code)]
static FAKE_COMPILER_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Path of the fake compiler script, written once per test binary.
#[cfg(unix)]
#[allow(dead_code)]
pub fn fake_compiler() -> PathBuf {
    FAKE_COMPILER_PATH
        .get_or_init(|| {
            use std::os::unix::fs::PermissionsExt;

            let dir = PathBuf::from(TEST_TMP_DIR).join(format!("bin-{}", random_suffix()));
            std::fs::create_dir_all(&dir).unwrap();
            let script = dir.canonicalize().unwrap().join("fake-kindlegen");
            std::fs::write(&script, FAKE_COMPILER).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            script
        })
        .clone()
}

/// Number of entries left in a directory.
#[allow(dead_code)]
pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Stylesheet transform that records which stylesheets ran and what the
/// workspace held at the time, instead of rendering anything.
#[derive(Default)]
#[allow(dead_code)]
pub struct RecordingTransform {
    pub calls: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingTransform {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StylesheetTransform for RecordingTransform {
    async fn transform(&self, stylesheet: Stylesheet, input: &Path, output: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let dir = input
            .parent()
            .ok_or_else(|| Error::Transform("staged input has no parent".to_string()))?;
        let mut names: Vec<String> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        tokio::fs::write(output, format!("{:?}\n{}\n", stylesheet, names.join("\n"))).await?;
        Ok(())
    }
}

/// Stylesheet transform that always fails.
#[allow(dead_code)]
pub struct FailingTransform;

#[async_trait]
impl StylesheetTransform for FailingTransform {
    async fn transform(&self, stylesheet: Stylesheet, _input: &Path, _output: &Path) -> Result<()> {
        Err(Error::Transform(format!("{:?} stylesheet is broken", stylesheet)))
    }
}

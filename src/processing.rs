//! Document-processing collaborator.
//!
//! The gateway hands downloaded inputs to a [`DocumentProcessor`] and gets an
//! [`OutputArtifact`] back. [`CommandProcessor`] runs an external program for
//! this; the PDF algorithms themselves live outside the bot.

use crate::analytics::TaskType;
use crate::gateway::{OutputArtifact, TempFileProvider};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Environment variable carrying the password to the processor
pub const PASSWORD_ENV: &str = "PDF_COURIER_PASSWORD";

/// Errors reported by the document processor
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// An input PDF could not be read
    #[error("Failed to read PDF file")]
    ReadError,
    /// The PDF could not be encrypted
    #[error("Failed to encrypt PDF file")]
    EncryptError,
    /// The PDF could not be decrypted
    #[error("Failed to decrypt PDF file")]
    DecryptError,
    /// The supplied password does not open the PDF
    #[error("Incorrect PDF password")]
    IncorrectPassword,
    /// The PDF contains no text
    #[error("No text found in PDF file")]
    NoTextFound,
    /// The PDF contains no images
    #[error("No images found in PDF file")]
    NoImagesFound,
    /// The processor did not finish in time
    #[error("Processing timed out after {0:?}")]
    Timeout(Duration),
    /// Any other processor failure
    #[error("Processing failed: {0}")]
    Failed(String),
    /// Local I/O while preparing or running the processor
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessingError {
    /// Map a processor exit code onto the taxonomy
    #[must_use]
    pub fn from_exit_code(code: Option<i32>, stderr: &str) -> Self {
        match code {
            Some(2) => Self::ReadError,
            Some(3) => Self::EncryptError,
            Some(4) => Self::DecryptError,
            Some(5) => Self::IncorrectPassword,
            Some(6) => Self::NoTextFound,
            Some(7) => Self::NoImagesFound,
            Some(code) => Self::Failed(format!("exit code {code}: {}", stderr.trim())),
            None => Self::Failed(format!("terminated by signal: {}", stderr.trim())),
        }
    }
}

/// Per-run options
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingOptions {
    /// Password for encrypt and decrypt tasks
    pub password: Option<String>,
}

/// Turns downloaded inputs into an output artifact
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    /// Run `task` over `inputs`, in order.
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessingError`] describing why no artifact was produced.
    async fn process(
        &self,
        task: TaskType,
        inputs: Vec<PathBuf>,
        options: ProcessingOptions,
    ) -> Result<OutputArtifact, ProcessingError>;
}

/// [`DocumentProcessor`] running an external program.
///
/// The program is invoked as `<program> [args...] <task> <output> <inputs...>`
/// with the password, if any, in [`PASSWORD_ENV`].
pub struct CommandProcessor {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    temp_files: Arc<dyn TempFileProvider>,
}

impl CommandProcessor {
    /// Create a processor for `program` with leading `args`
    #[must_use]
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
        temp_files: Arc<dyn TempFileProvider>,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
            temp_files,
        }
    }

    /// Create a processor from a whitespace-separated command line.
    ///
    /// Returns `None` for an empty command line.
    #[must_use]
    pub fn from_command_line(
        command_line: &str,
        timeout: Duration,
        temp_files: Arc<dyn TempFileProvider>,
    ) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_owned);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), timeout, temp_files))
    }
}

#[async_trait]
impl DocumentProcessor for CommandProcessor {
    async fn process(
        &self,
        task: TaskType,
        inputs: Vec<PathBuf>,
        options: ProcessingOptions,
    ) -> Result<OutputArtifact, ProcessingError> {
        let output = self.temp_files.create_temp_file(".pdf")?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(task.as_str())
            .arg(&*output)
            .args(&inputs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(password) = &options.password {
            cmd.env(PASSWORD_ENV, password);
        }

        debug!(task = %task, inputs = inputs.len(), program = %self.program, "Starting processor");
        let result = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| ProcessingError::Timeout(self.timeout))??;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let error = ProcessingError::from_exit_code(result.status.code(), &stderr);
            warn!(task = %task, error = %error, "Processor failed");
            return Err(error);
        }

        if tokio::fs::metadata(&output).await?.len() == 0 {
            return Err(ProcessingError::Failed(
                "processor exited successfully but wrote no output".to_string(),
            ));
        }

        info!(task = %task, inputs = inputs.len(), "Processing finished");
        Ok(OutputArtifact::new(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::TempDirProvider;
    use rstest::rstest;

    #[rstest]
    #[case(2, "ReadError")]
    #[case(3, "EncryptError")]
    #[case(4, "DecryptError")]
    #[case(5, "IncorrectPassword")]
    #[case(6, "NoTextFound")]
    #[case(7, "NoImagesFound")]
    #[case(1, "Failed")]
    fn test_exit_code_mapping(#[case] code: i32, #[case] expected: &str) {
        let error = ProcessingError::from_exit_code(Some(code), "boom");
        assert!(format!("{error:?}").starts_with(expected));
    }

    #[test]
    fn test_unknown_exit_code_keeps_stderr() {
        let error = ProcessingError::from_exit_code(Some(1), "  bad input\n");
        assert!(matches!(error, ProcessingError::Failed(ref msg) if msg.ends_with("bad input")));
    }

    #[test]
    fn test_empty_command_line() {
        let temp_files = Arc::new(TempDirProvider::default());
        assert!(CommandProcessor::from_command_line("  ", Duration::from_secs(1), temp_files)
            .is_none());
    }

    #[cfg(unix)]
    fn shell(script: &str, dir: &tempfile::TempDir) -> CommandProcessor {
        CommandProcessor::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            Duration::from_secs(10),
            Arc::new(TempDirProvider::in_dir(dir.path())),
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_processor_produces_artifact() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let input = dir.path().join("in.pdf");
        std::fs::write(&input, b"%PDF-1.7")?;

        let processor = shell(r#"[ "$1" = merge_pdf ] || exit 1; cat "$3" > "$2""#, &dir);
        let artifact = processor
            .process(TaskType::MergePdf, vec![input], ProcessingOptions::default())
            .await?;

        assert_eq!(artifact.extension(), Some("pdf"));
        assert_eq!(std::fs::read(artifact.path())?, b"%PDF-1.7");
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_processor_passes_password() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let processor = shell(
            r#"[ "$PDF_COURIER_PASSWORD" = secret ] || exit 5; echo ok > "$2""#,
            &dir,
        );

        let wrong = processor
            .process(
                TaskType::DecryptPdf,
                Vec::new(),
                ProcessingOptions {
                    password: Some("guess".to_string()),
                },
            )
            .await;
        assert!(matches!(wrong, Err(ProcessingError::IncorrectPassword)));

        processor
            .process(
                TaskType::DecryptPdf,
                Vec::new(),
                ProcessingOptions {
                    password: Some("secret".to_string()),
                },
            )
            .await?;
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_processor_failure_releases_output(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let processor = shell("exit 6", &dir);

        let result = processor
            .process(TaskType::MergePdf, Vec::new(), ProcessingOptions::default())
            .await;

        assert!(matches!(result, Err(ProcessingError::NoTextFound)));
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_command_processor_without_output() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let processor = shell("exit 0", &dir);

        let result = processor
            .process(TaskType::MergePdf, Vec::new(), ProcessingOptions::default())
            .await;

        assert!(matches!(result, Err(ProcessingError::Failed(_))));
        Ok(())
    }
}

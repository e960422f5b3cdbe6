//! Office document -> PDF conversion.
//!
//! Conversion is delegated to an external office suite. Each call gets its own
//! throwaway user profile so parallel instances do not fight over one profile
//! lock, and hung calls are killed after a timeout.

pub mod pool;

pub use pool::{optimal_batch_size, optimal_worker_count, run_blocking_pool, SystemResources};

use crate::config::ConverterConfig;
use crate::error::{DocsortError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Poll interval while waiting on a converter process
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Something that turns an office document into a PDF
pub trait DocumentConverter: Send + Sync {
    /// Check the converter can run at all; called once before any work
    fn preflight(&self) -> Result<()>;

    /// Convert `input` into `out_dir`, returning the produced PDF
    fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf>;

    /// Clear stuck converter processes between batches
    fn reset(&self);
}

/// LibreOffice/soffice running headless
#[derive(Debug, Clone)]
pub struct OfficeConverter {
    program: String,
    reset_process: Option<String>,
    timeout: Duration,
}

impl OfficeConverter {
    pub fn new(config: &ConverterConfig) -> Self {
        Self {
            program: config.program.clone(),
            reset_process: config.reset_process.clone(),
            timeout: config.timeout,
        }
    }

    /// `-env:UserInstallation` URL for a profile directory
    fn profile_url(dir: &Path) -> String {
        let path = dir.to_string_lossy().replace('\\', "/");
        if path.starts_with('/') {
            format!("file://{}", path)
        } else {
            format!("file:///{}", path)
        }
    }

    fn conversion_error(input: &Path, message: impl Into<String>) -> DocsortError {
        DocsortError::Conversion {
            path: input.to_path_buf(),
            attempts: 1,
            message: message.into(),
        }
    }
}

impl DocumentConverter for OfficeConverter {
    fn preflight(&self) -> Result<()> {
        let output = duct::cmd(&self.program, ["--version"])
            .stdout_null()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|e| DocsortError::ConverterUnavailable {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(DocsortError::ConverterUnavailable {
                program: self.program.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        tracing::info!("[Converter] using {}", self.program);
        Ok(())
    }

    fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
        let profile = tempfile::Builder::new()
            .prefix("docsort-profile")
            .tempdir()
            .map_err(|e| DocsortError::io(std::env::temp_dir(), e))?;

        let args: Vec<OsString> = vec![
            format!("-env:UserInstallation={}", Self::profile_url(profile.path())).into(),
            "--headless".into(),
            "--norestore".into(),
            "--convert-to".into(),
            "pdf".into(),
            "--outdir".into(),
            out_dir.as_os_str().to_owned(),
            input.as_os_str().to_owned(),
        ];

        let handle = duct::cmd(&self.program, args)
            .stdout_null()
            .stderr_capture()
            .unchecked()
            .start()
            .map_err(|e| Self::conversion_error(input, e.to_string()))?;

        let started = Instant::now();
        let (succeeded, stderr) = loop {
            match handle.try_wait() {
                Ok(Some(output)) => {
                    break (
                        output.status.success(),
                        String::from_utf8_lossy(&output.stderr).trim().to_string(),
                    )
                }
                Ok(None) if started.elapsed() > self.timeout => {
                    if let Err(e) = handle.kill() {
                        tracing::warn!("[Converter] could not kill hung process: {}", e);
                    }
                    return Err(Self::conversion_error(
                        input,
                        format!("timed out after {}s", self.timeout.as_secs()),
                    ));
                }
                Ok(None) => std::thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(Self::conversion_error(input, e.to_string())),
            }
        };

        if !succeeded {
            return Err(Self::conversion_error(input, stderr));
        }

        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        let produced = out_dir.join(format!("{}.pdf", stem));
        if !produced.is_file() {
            return Err(Self::conversion_error(input, "converter produced no PDF"));
        }
        Ok(produced)
    }

    fn reset(&self) {
        let Some(process) = self.reset_process.as_deref() else {
            return;
        };

        let expression = if cfg!(windows) {
            duct::cmd("taskkill", ["/f", "/im", process])
        } else {
            duct::cmd("pkill", ["-x", process])
        };

        match expression.stdout_null().stderr_null().unchecked().run() {
            Ok(_) => tracing::debug!("[Converter] cleared {} processes", process),
            Err(e) => tracing::debug!("[Converter] reset skipped: {}", e),
        }
    }
}

/// Convert with a fixed number of retries and a fixed pause between attempts
pub fn convert_with_retry(
    converter: &dyn DocumentConverter,
    input: &Path,
    out_dir: &Path,
    retries: u32,
    delay: Duration,
) -> Result<PathBuf> {
    let attempts = retries + 1;
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        match converter.convert(input, out_dir) {
            Ok(pdf) => return Ok(pdf),
            Err(e) => {
                last_error = e.to_string();
                if attempt < attempts {
                    tracing::warn!(
                        "[Converter] attempt {}/{} failed for {}: {}",
                        attempt,
                        attempts,
                        input.file_name().unwrap_or_default().to_string_lossy(),
                        e
                    );
                    std::thread::sleep(delay);
                }
            }
        }
    }

    Err(DocsortError::Conversion {
        path: input.to_path_buf(),
        attempts,
        message: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    /// Fails a fixed number of times, then writes the input bytes as the PDF
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    impl DocumentConverter for Flaky {
        fn preflight(&self) -> Result<()> {
            Ok(())
        }

        fn convert(&self, input: &Path, out_dir: &Path) -> Result<PathBuf> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(OfficeConverter::conversion_error(input, "busy"));
            }
            let stem = input.file_stem().unwrap().to_string_lossy();
            let out = out_dir.join(format!("{}.pdf", stem));
            std::fs::copy(input, &out).unwrap();
            Ok(out)
        }

        fn reset(&self) {}
    }

    fn input(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("memo.docx");
        std::fs::write(&path, b"docx").unwrap();
        path
    }

    #[test]
    fn test_retry_recovers() {
        let dir = TempDir::new().unwrap();
        let converter = Flaky {
            failures: 2,
            calls: AtomicU32::new(0),
        };
        let pdf = convert_with_retry(&converter, &input(&dir), dir.path(), 2, Duration::ZERO).unwrap();
        assert_eq!(pdf.file_name().unwrap(), "memo.pdf");
        assert_eq!(converter.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_retries_are_bounded() {
        let dir = TempDir::new().unwrap();
        let converter = Flaky {
            failures: 10,
            calls: AtomicU32::new(0),
        };
        let err = convert_with_retry(&converter, &input(&dir), dir.path(), 2, Duration::ZERO).unwrap_err();
        assert!(matches!(err, DocsortError::Conversion { attempts: 3, .. }));
        assert_eq!(converter.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_missing_program_fails_preflight() {
        let config = ConverterConfig {
            program: "docsort-no-such-converter".to_string(),
            ..Default::default()
        };
        let err = OfficeConverter::new(&config).preflight().unwrap_err();
        assert!(matches!(err, DocsortError::ConverterUnavailable { .. }));
    }

    #[test]
    fn test_profile_url() {
        assert_eq!(
            OfficeConverter::profile_url(Path::new("/tmp/profile")),
            "file:///tmp/profile"
        );
        assert_eq!(
            OfficeConverter::profile_url(Path::new("C:\\Temp\\profile")),
            "file:///C:/Temp/profile"
        );
    }
}

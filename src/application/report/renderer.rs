//! Gateway to the external report renderer.
//!
//! The renderer is an opaque process launched as
//! `<runtime> -cp <classpath> <entry point> <identifier>` inside a fixed
//! working directory. On success it prints the absolute path of the PDF it
//! wrote and exits 0. The gateway bounds the wait, validates the claimed path
//! and maps every other outcome onto [`RenderFailure`].

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use metrics::{counter, histogram};
use tokio::{
    fs,
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    time::timeout,
};
use tracing::{debug, info, warn};

use crate::config::RendererSettings;

use super::types::{RenderFailure, RenderRequest, RenderResult, RenderedArtifact};

const NO_STDERR_MARKER: &str = "no stderr output";
const CLASSPATH_SEPARATOR: &str = ":";
/// The renderer prints a single path; anything past this is dropped.
const STDOUT_CAPTURE_LIMIT: u64 = 8 * 1024;
const STDERR_CAPTURE_LIMIT: u64 = 64 * 1024;

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, request: RenderRequest) -> RenderResult;
}

/// How a zero-length output file is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyOutputPolicy {
    /// Fail with [`RenderFailure::OutputEmpty`] before the artifact is handed out.
    Reject,
    /// Hand the artifact out and log a warning; delivery decides what to do with it.
    Warn,
}

#[derive(Debug, Clone)]
pub struct RendererConfig {
    pub runtime: PathBuf,
    pub working_dir: PathBuf,
    pub classpath: String,
    pub entry_point: String,
    pub timeout: Duration,
    pub empty_output: EmptyOutputPolicy,
}

impl From<&RendererSettings> for RendererConfig {
    fn from(settings: &RendererSettings) -> Self {
        Self {
            runtime: settings.runtime.clone(),
            working_dir: settings.working_dir.clone(),
            classpath: settings.classpath.join(CLASSPATH_SEPARATOR),
            entry_point: settings.entry_point.clone(),
            timeout: settings.timeout,
            empty_output: if settings.reject_empty_output {
                EmptyOutputPolicy::Reject
            } else {
                EmptyOutputPolicy::Warn
            },
        }
    }
}

/// Launches the renderer as a child process for every request.
#[derive(Debug, Clone)]
pub struct ProcessRenderer {
    config: RendererConfig,
}

impl ProcessRenderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    fn command(&self, request: RenderRequest) -> Command {
        let mut command = Command::new(&self.config.runtime);
        command
            .arg("-cp")
            .arg(&self.config.classpath)
            .arg(&self.config.entry_point)
            .arg(request.identifier.to_string())
            .current_dir(&self.config.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // A timed-out render keeps running; its late output is swept externally.
            .kill_on_drop(false);
        command
    }

    async fn run(&self, request: RenderRequest) -> RenderResult {
        let started_at = Instant::now();
        let identifier = request.identifier;

        let mut child = self.command(request).spawn().map_err(|err| {
            warn!(
                target = "application::report::renderer",
                op = "renderer::render",
                result = "error",
                error_code = "spawn",
                identifier = identifier.get(),
                runtime = %self.config.runtime.display(),
                working_dir = %self.config.working_dir.display(),
                error = %err,
                "Failed to spawn report renderer"
            );
            let hint = if err.kind() == ErrorKind::NotFound {
                "runtime executable or working directory not found"
            } else {
                "failed to spawn renderer process"
            };
            RenderFailure::unexpected(format!("{hint}: {err}"))
        })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let collect = async {
            tokio::try_join!(
                child.wait(),
                read_capped(stdout_pipe, STDOUT_CAPTURE_LIMIT),
                read_capped(stderr_pipe, STDERR_CAPTURE_LIMIT),
            )
        };

        let (status, stdout_bytes, stderr_bytes) = match timeout(self.config.timeout, collect).await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(
                    target = "application::report::renderer",
                    op = "renderer::render",
                    result = "error",
                    error_code = "wait",
                    identifier = identifier.get(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    error = %err,
                    "Failed while waiting for report renderer"
                );
                return Err(RenderFailure::unexpected(format!(
                    "failed to collect renderer output: {err}"
                )));
            }
            Err(_) => {
                warn!(
                    target = "application::report::renderer",
                    op = "renderer::render",
                    result = "timeout",
                    identifier = identifier.get(),
                    timeout_secs = self.config.timeout.as_secs(),
                    elapsed_ms = started_at.elapsed().as_millis() as u64,
                    "Report renderer exceeded its time budget; abandoning wait"
                );
                return Err(RenderFailure::Timeout {
                    identifier,
                    timeout: self.config.timeout,
                });
            }
        };

        if !status.success() {
            let exit_code = status.code();
            let stderr = stderr_text(&stderr_bytes);
            warn!(
                target = "application::report::renderer",
                op = "renderer::render",
                result = "error",
                error_code = "exit_status",
                identifier = identifier.get(),
                exit_code = exit_code.map(i64::from).unwrap_or(-1),
                elapsed_ms = started_at.elapsed().as_millis() as u64,
                stderr = %stderr,
                "Report renderer exited with failure"
            );
            return Err(RenderFailure::ProcessFailed { exit_code, stderr });
        }

        let stdout = String::from_utf8_lossy(&stdout_bytes);
        let claimed = claimed_output_path(&stdout)?;
        let artifact = inspect_output(claimed, self.config.empty_output).await?;

        info!(
            target = "application::report::renderer",
            op = "renderer::render",
            result = "ok",
            identifier = identifier.get(),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            path = %artifact.path().display(),
            bytes = artifact.byte_length(),
            "Report renderer produced artifact"
        );

        Ok(artifact)
    }
}

#[async_trait]
impl ReportRenderer for ProcessRenderer {
    async fn render(&self, request: RenderRequest) -> RenderResult {
        let started_at = Instant::now();
        let result = self.run(request).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(failure) => failure.kind().as_str(),
        };
        counter!("payslip_render_total", "result" => outcome).increment(1);
        histogram!("payslip_render_ms").record(started_at.elapsed().as_secs_f64() * 1000.0);

        result
    }
}

/// Keep the first `limit` bytes of a pipe and drain the remainder.
async fn read_capped<R>(pipe: Option<R>, limit: u64) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let Some(mut pipe) = pipe else {
        return Ok(Vec::new());
    };

    let mut captured = Vec::new();
    (&mut pipe).take(limit).read_to_end(&mut captured).await?;
    tokio::io::copy(&mut pipe, &mut tokio::io::sink()).await?;
    Ok(captured)
}

fn stderr_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        NO_STDERR_MARKER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Interpret renderer stdout as a claimed absolute path. Never touches the filesystem.
pub(crate) fn claimed_output_path(stdout: &str) -> Result<PathBuf, RenderFailure> {
    let claimed = stdout.trim();
    if claimed.is_empty() {
        return Err(RenderFailure::InvalidOutputPath {
            claimed: String::new(),
            reason: "renderer printed no path",
        });
    }

    let path = Path::new(claimed);
    if !path.is_absolute() {
        return Err(RenderFailure::InvalidOutputPath {
            claimed: claimed.to_string(),
            reason: "path is not absolute",
        });
    }

    Ok(path.to_path_buf())
}

pub(crate) async fn inspect_output(
    path: PathBuf,
    policy: EmptyOutputPolicy,
) -> Result<RenderedArtifact, RenderFailure> {
    let metadata = match fs::metadata(&path).await {
        Ok(metadata) if metadata.is_file() => metadata,
        Ok(_) => return Err(RenderFailure::OutputMissing { path }),
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(RenderFailure::OutputMissing { path });
        }
        Err(err) => {
            return Err(RenderFailure::unexpected(format!(
                "failed to inspect `{}`: {err}",
                path.display()
            )));
        }
    };

    let byte_length = metadata.len();
    if byte_length == 0 {
        match policy {
            EmptyOutputPolicy::Reject => {
                debug!(
                    target = "application::report::renderer",
                    path = %path.display(),
                    "Rejecting zero-length renderer output"
                );
                return Err(RenderFailure::OutputEmpty { path });
            }
            EmptyOutputPolicy::Warn => {
                warn!(
                    target = "application::report::renderer",
                    path = %path.display(),
                    "Renderer produced a zero-length file"
                );
            }
        }
    }

    Ok(RenderedArtifact::new(path, byte_length))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::{application::report::RenderFailureKind, domain::types::Identifier};
    use std::{fs as std_fs, os::unix::fs::PermissionsExt};
    use tempfile::TempDir;

    fn make_executable(path: &Path) {
        let mut perms = std_fs::metadata(path).expect("metadata").permissions();
        perms.set_mode(0o755);
        std_fs::set_permissions(path, perms).expect("set perms");
    }

    fn fake_runtime(dir: &TempDir, body: &str) -> PathBuf {
        let script_path = dir.path().join("fake-java");
        std_fs::write(&script_path, format!("#!/bin/sh\n{body}\n")).expect("write script");
        make_executable(&script_path);
        script_path
    }

    fn renderer(dir: &TempDir, runtime: PathBuf, timeout: Duration) -> ProcessRenderer {
        ProcessRenderer::new(RendererConfig {
            runtime,
            working_dir: dir.path().to_path_buf(),
            classpath: "app.jar:lib/*".to_string(),
            entry_point: "reports.Main".to_string(),
            timeout,
            empty_output: EmptyOutputPolicy::Reject,
        })
    }

    fn request(value: i64) -> RenderRequest {
        RenderRequest::new(Identifier::new(value).expect("identifier"))
    }

    #[tokio::test]
    async fn passes_arguments_as_list_in_working_dir() {
        let dir = TempDir::new().expect("temp dir");
        let args_path = dir.path().join("args.log");
        let out_path = dir.path().join("out.pdf");
        let runtime = fake_runtime(
            &dir,
            &format!(
                "printf '%s|' \"$@\" > \"{args}\"\necho >> \"{args}\"\npwd >> \"{args}\"\nprintf '%%PDF-1.4' > \"{out}\"\necho \"{out}\"",
                args = args_path.display(),
                out = out_path.display()
            ),
        );

        let artifact = renderer(&dir, runtime, Duration::from_secs(10))
            .render(request(1234567))
            .await
            .expect("render succeeds");

        assert_eq!(artifact.path(), out_path.as_path());
        assert_eq!(artifact.byte_length(), 8);

        let logged = std_fs::read_to_string(&args_path).expect("read args");
        let mut lines = logged.lines();
        assert_eq!(
            lines.next(),
            Some("-cp|app.jar:lib/*|reports.Main|1234567|")
        );
        let cwd = lines.next().expect("cwd line");
        assert_eq!(
            std_fs::canonicalize(cwd).expect("canonical cwd"),
            std_fs::canonicalize(dir.path()).expect("canonical dir")
        );
    }

    #[tokio::test]
    async fn nonzero_exit_surfaces_stderr() {
        let dir = TempDir::new().expect("temp dir");
        let runtime = fake_runtime(&dir, "echo 'DB connection refused' >&2\nexit 1");

        let err = renderer(&dir, runtime, Duration::from_secs(10))
            .render(request(42))
            .await
            .expect_err("render fails");

        match err {
            RenderFailure::ProcessFailed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(stderr, "DB connection refused");
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_stderr_is_truncated() {
        let dir = TempDir::new().expect("temp dir");
        let runtime = fake_runtime(
            &dir,
            "head -c 300000 /dev/zero | tr '\\0' 'x' >&2\nexit 1",
        );

        let err = renderer(&dir, runtime, Duration::from_secs(10))
            .render(request(42))
            .await
            .expect_err("render fails");

        match err {
            RenderFailure::ProcessFailed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(1));
                assert_eq!(stderr.len() as u64, STDERR_CAPTURE_LIMIT);
                assert!(stderr.bytes().all(|byte| byte == b'x'));
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn noisy_stdout_does_not_stall_renderer() {
        let dir = TempDir::new().expect("temp dir");
        let runtime = fake_runtime(&dir, "head -c 500000 /dev/zero\nexit 0");

        let err = renderer(&dir, runtime, Duration::from_secs(10))
            .render(request(42))
            .await
            .expect_err("binary stdout is not a path");

        assert_eq!(err.kind(), RenderFailureKind::InvalidOutputPath);
    }

    #[tokio::test]
    async fn nonzero_exit_without_stderr_uses_marker() {
        let dir = TempDir::new().expect("temp dir");
        let runtime = fake_runtime(&dir, "exit 3");

        let err = renderer(&dir, runtime, Duration::from_secs(10))
            .render(request(42))
            .await
            .expect_err("render fails");

        match err {
            RenderFailure::ProcessFailed { exit_code, stderr } => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, NO_STDERR_MARKER);
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_renderer_times_out_without_waiting() {
        let dir = TempDir::new().expect("temp dir");
        let runtime = fake_runtime(&dir, "sleep 5\necho /tmp/never.pdf");

        let started_at = Instant::now();
        let err = renderer(&dir, runtime, Duration::from_millis(200))
            .render(request(42))
            .await
            .expect_err("render times out");

        assert_eq!(err.kind(), RenderFailureKind::Timeout);
        assert!(started_at.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn empty_stdout_is_invalid_path() {
        let dir = TempDir::new().expect("temp dir");
        let runtime = fake_runtime(&dir, "exit 0");

        let err = renderer(&dir, runtime, Duration::from_secs(10))
            .render(request(42))
            .await
            .expect_err("render fails");

        assert_eq!(err.kind(), RenderFailureKind::InvalidOutputPath);
    }

    #[tokio::test]
    async fn missing_output_is_reported() {
        let dir = TempDir::new().expect("temp dir");
        let missing = dir.path().join("missing.pdf");
        let runtime = fake_runtime(&dir, &format!("echo \"{}\"", missing.display()));

        let err = renderer(&dir, runtime, Duration::from_secs(10))
            .render(request(42))
            .await
            .expect_err("render fails");

        assert_eq!(err.kind(), RenderFailureKind::OutputMissing);
    }

    #[tokio::test]
    async fn missing_runtime_is_unexpected_error() {
        let dir = TempDir::new().expect("temp dir");
        let runtime = dir.path().join("does-not-exist");

        let err = renderer(&dir, runtime, Duration::from_secs(10))
            .render(request(42))
            .await
            .expect_err("render fails");

        assert_eq!(err.kind(), RenderFailureKind::UnexpectedError);
    }

    #[test]
    fn relative_path_is_rejected_before_any_filesystem_check() {
        // The relative path exists in the test's working directory, so an
        // existence check would have succeeded.
        let err = claimed_output_path("Cargo.toml\n").expect_err("relative path rejected");
        assert!(matches!(
            err,
            RenderFailure::InvalidOutputPath {
                reason: "path is not absolute",
                ..
            }
        ));
    }

    #[test]
    fn claimed_path_is_trimmed() {
        let path = claimed_output_path("  /tmp/out_1234567.pdf \r\n").expect("valid path");
        assert_eq!(path, PathBuf::from("/tmp/out_1234567.pdf"));
    }

    #[tokio::test]
    async fn empty_file_follows_policy() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("empty.pdf");
        std_fs::write(&path, b"").expect("write empty file");

        let err = inspect_output(path.clone(), EmptyOutputPolicy::Reject)
            .await
            .expect_err("empty rejected");
        assert_eq!(err.kind(), RenderFailureKind::OutputEmpty);

        let artifact = inspect_output(path.clone(), EmptyOutputPolicy::Warn)
            .await
            .expect("empty passed through");
        assert_eq!(artifact.byte_length(), 0);
    }

    #[tokio::test]
    async fn directory_is_not_an_artifact() {
        let dir = TempDir::new().expect("temp dir");
        let err = inspect_output(dir.path().to_path_buf(), EmptyOutputPolicy::Warn)
            .await
            .expect_err("directory rejected");
        assert_eq!(err.kind(), RenderFailureKind::OutputMissing);
    }

    #[test]
    fn config_joins_classpath_entries() {
        let settings = RendererSettings {
            runtime: PathBuf::from("java"),
            working_dir: PathBuf::from("jasper"),
            classpath: vec!["luciajasper.jar".to_string(), "lib/*".to_string()],
            entry_point: "luciareportes.GenerarReporte".to_string(),
            timeout: Duration::from_secs(45),
            reject_empty_output: false,
        };
        let config = RendererConfig::from(&settings);
        assert_eq!(config.classpath, "luciajasper.jar:lib/*");
        assert_eq!(config.empty_output, EmptyOutputPolicy::Warn);
    }
}

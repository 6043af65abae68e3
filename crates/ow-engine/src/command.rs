//! Running ffmpeg (or any external tool) as a child process.
//!
//! stderr is streamed line by line while the process runs; stdout is only
//! collected.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// What a finished process left behind, decoded as lossy UTF-8.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

/// One tool invocation: program, arguments, working directory and an
/// optional deadline.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ToolCommand {
    /// No arguments, inherited working directory, no deadline.
    pub fn new(program: PathBuf) -> Self {
        Self {
            program,
            args: Vec::new(),
            current_dir: None,
            timeout: None,
        }
    }

    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Run the process inside `dir`.
    pub fn current_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Kill the process if it runs longer than `d`.
    pub fn timeout(&mut self, d: Duration) -> &mut Self {
        self.timeout = Some(d);
        self
    }

    /// Bare program name used as the `tool` in errors.
    fn tool_name(&self) -> String {
        let name = self.program.file_name().unwrap_or(self.program.as_os_str());
        name.to_string_lossy().into_owned()
    }

    /// Run to completion and capture both streams.
    ///
    /// # Errors
    ///
    /// [`ow_core::Error::Tool`] when the process cannot be spawned, outlives
    /// its deadline, or exits unsuccessfully. The last stderr lines are kept
    /// in the message.
    pub async fn execute(&self) -> ow_core::Result<ToolOutput> {
        self.execute_with_stderr_callback(|_| {}).await
    }

    /// Like [`execute`](Self::execute) but hands every stderr line to
    /// `on_line` as it arrives.
    ///
    /// Lines are split on both `\n` and `\r`, so ffmpeg's in-place status
    /// line shows up once per refresh.
    pub async fn execute_with_stderr_callback(
        &self,
        mut on_line: impl FnMut(&str),
    ) -> ow_core::Result<ToolOutput> {
        let program_name = self.tool_name();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| ow_core::Error::tool(&program_name, format!("failed to spawn: {e}")))?;

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();

        let run = async {
            let read_stdout = async {
                let mut buf = Vec::new();
                if let Some(ref mut out) = stdout {
                    out.read_to_end(&mut buf).await?;
                }
                Ok::<_, std::io::Error>(buf)
            };

            let read_stderr = async {
                let mut captured = Vec::new();
                let mut pending = Vec::new();
                let mut chunk = [0u8; 4096];
                if let Some(ref mut err) = stderr {
                    loop {
                        let n = err.read(&mut chunk).await?;
                        if n == 0 {
                            break;
                        }
                        captured.extend_from_slice(&chunk[..n]);
                        for &b in &chunk[..n] {
                            if b == b'\n' || b == b'\r' {
                                emit_line(&mut pending, &mut on_line);
                            } else {
                                pending.push(b);
                            }
                        }
                    }
                    emit_line(&mut pending, &mut on_line);
                }
                Ok::<_, std::io::Error>(captured)
            };

            let (out, err) = tokio::try_join!(read_stdout, read_stderr)?;
            let status = child.wait().await?;
            Ok::<_, std::io::Error>((status, out, err))
        };

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(r) => r,
                Err(_elapsed) => {
                    // The child was created with kill_on_drop, so dropping the
                    // cancelled future reaps it.
                    return Err(ow_core::Error::tool(
                        program_name,
                        format!("timed out after {limit:?}"),
                    ));
                }
            },
            None => run.await,
        };

        let (status, out, err) = result.map_err(|e| {
            ow_core::Error::tool(&program_name, format!("I/O error waiting for process: {e}"))
        })?;

        let tool_output = ToolOutput {
            status,
            stdout: String::from_utf8_lossy(&out).to_string(),
            stderr: String::from_utf8_lossy(&err).to_string(),
        };

        if !status.success() {
            return Err(ow_core::Error::tool(
                program_name,
                format!("exited with status {}: {}", status, last_lines(&tool_output.stderr, 5)),
            ));
        }

        Ok(tool_output)
    }
}

fn emit_line(pending: &mut Vec<u8>, on_line: &mut impl FnMut(&str)) {
    if pending.is_empty() {
        return;
    }
    let line = String::from_utf8_lossy(pending);
    on_line(line.trim_end());
    pending.clear();
}

/// The last `n` non-empty lines of a tool's stderr, for error messages.
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text
        .split(['\n', '\r'])
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

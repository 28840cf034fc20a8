//! Subprocess runner for package-manager audit tools
//!
//! Audit tools conventionally exit non-zero when vulnerabilities are
//! found, so exit status is reported but never treated as failure by
//! itself; callers look at stdout.

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Result of running an external audit tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: Option<i32>,
    pub timed_out: bool,
    /// Set when the tool could not be run at all.
    pub error: Option<String>,
}

impl ToolOutput {
    fn failure(error: String) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            status: None,
            timed_out: false,
            error: Some(error),
        }
    }

    pub fn ran(&self) -> bool {
        self.error.is_none() && !self.timed_out
    }
}

/// Run an audit tool with a bounded timeout, killing it on expiry.
///
/// The child is polled rather than waited on so a hung tool cannot stall
/// the whole run past `timeout_secs`.
pub fn run_audit_tool(
    cmd: &[&str],
    tool_name: &str,
    timeout_secs: u64,
    cwd: &Path,
) -> ToolOutput {
    let (program, args) = match cmd.split_first() {
        Some(parts) => parts,
        None => return ToolOutput::failure("empty command".to_string()),
    };

    debug!("Running {}: {} {:?}", tool_name, program, args);

    let mut child = match Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return ToolOutput::failure(format!("{} not found. Please install it first.", tool_name));
        }
        Err(e) => return ToolOutput::failure(format!("failed to run {}: {}", tool_name, e)),
    };

    let start = Instant::now();
    let timeout = Duration::from_secs(timeout_secs);

    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = drain(child.stdout.take());
                let stderr = drain(child.stderr.take());
                return ToolOutput {
                    stdout,
                    stderr,
                    status: status.code(),
                    timed_out: false,
                    error: None,
                };
            }
            Ok(None) => {
                if start.elapsed() > timeout {
                    let _ = child.kill();
                    warn!("{} timed out after {}s", tool_name, timeout_secs);
                    return ToolOutput {
                        stdout: String::new(),
                        stderr: String::new(),
                        status: None,
                        timed_out: true,
                        error: Some(format!("{} timed out after {}s", tool_name, timeout_secs)),
                    };
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => {
                return ToolOutput::failure(format!("failed to wait for {}: {}", tool_name, e))
            }
        }
    }
}

fn drain(pipe: Option<impl std::io::Read>) -> String {
    pipe.map(|p| {
        BufReader::new(p)
            .lines()
            .map_while(Result::ok)
            .collect::<Vec<_>>()
            .join("\n")
    })
    .unwrap_or_default()
}

/// Check if a tool is installed
pub fn is_tool_installed(tool: &str) -> bool {
    Command::new(tool)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

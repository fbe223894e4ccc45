//! External tool invocation (ffprobe, ffmpeg).

use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid tool path: {0}")]
    InvalidPath(String),

    #[error("Failed to execute {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} did not finish within {limit:?}")]
    Timeout { tool: String, limit: Duration },
}

/// Reject tool paths carrying shell metacharacters or parent-directory hops.
///
/// Tools are spawned directly, never through a shell, so spaces and drive
/// prefixes such as `C:` are fine.
pub(crate) fn validate_tool_path(path: &str) -> Result<(), ToolError> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.is_empty() || path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(ToolError::InvalidPath(path.to_string()));
    }

    if path.contains("..") {
        return Err(ToolError::InvalidPath(path.to_string()));
    }

    Ok(())
}

/// Run `command` to completion with captured output, killing it after `limit`.
///
/// The child is also killed if the returned future is dropped (request cancelled).
pub(crate) async fn run_tool(
    tool: &str,
    mut command: Command,
    limit: Duration,
) -> Result<Output, ToolError> {
    command
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    match tokio::time::timeout(limit, command.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(source)) => Err(ToolError::Spawn {
            tool: tool.to_string(),
            source,
        }),
        Err(_) => Err(ToolError::Timeout {
            tool: tool.to_string(),
            limit,
        }),
    }
}

/// Last lines of a tool's stderr, for error messages.
pub(crate) fn stderr_tail(output: &Output) -> String {
    const MAX_CHARS: usize = 2000;
    let stderr = String::from_utf8_lossy(&output.stderr);
    let trimmed = stderr.trim();
    if trimmed.len() <= MAX_CHARS {
        return trimmed.to_string();
    }
    let mut start = trimmed.len() - MAX_CHARS;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    trimmed[start..].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tool_path() {
        assert!(validate_tool_path("ffprobe").is_ok());
        assert!(validate_tool_path("/usr/local/bin/ffmpeg").is_ok());
        assert!(validate_tool_path("").is_err());
        assert!(validate_tool_path("ffprobe; rm -rf /").is_err());
        assert!(validate_tool_path("$(evil)").is_err());
        assert!(validate_tool_path("../bin/ffprobe").is_err());
        assert!(validate_tool_path("/opt/Media Tools/ffmpeg").is_ok());
        assert!(validate_tool_path("C:\\ffmpeg\\bin\\ffmpeg.exe").is_ok());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_captures_output() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("echo out; echo err >&2; exit 3");

        let output = run_tool("sh", command, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(output.status.code(), Some(3));
        assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "out");
        assert_eq!(stderr_tail(&output), "err");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_tool_times_out() {
        let mut command = Command::new("sh");
        command.arg("-c").arg("sleep 5");

        let result = run_tool("sh", command, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(ToolError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_run_tool_missing_binary() {
        let command = Command::new("reelvault-definitely-not-installed");
        let result = run_tool(
            "reelvault-definitely-not-installed",
            command,
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }
}

//! Subprocess plumbing shared by the kubectl and helm implementations

use crate::error::{ClusterError, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one subprocess run
#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub command: String,
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// stdout followed by stderr, trimmed
    pub fn combined(&self) -> String {
        let mut out = self.stdout.trim_end().to_string();
        let stderr = self.stderr.trim_end();
        if !stderr.is_empty() {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(stderr);
        }
        out
    }

    /// Turn a non-zero exit into `CommandFailed`
    pub fn check(self) -> Result<CommandOutput> {
        if self.success {
            Ok(self)
        } else {
            Err(ClusterError::CommandFailed {
                output: self.combined(),
                command: self.command,
            })
        }
    }

    pub fn output_contains(&self, needle: &str) -> bool {
        self.stderr.contains(needle) || self.stdout.contains(needle)
    }
}

/// Run `program args..`, optionally in `cwd` and with `stdin` piped in
pub(crate) async fn run(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    stdin: Option<&str>,
) -> Result<CommandOutput> {
    let command = format!("{} {}", program, args.join(" "));
    debug!("Running: {}", command);

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let spawn_err = |source| ClusterError::Spawn {
        program: program.to_string(),
        source,
    };

    let mut child = cmd.spawn().map_err(spawn_err)?;
    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        pipe.write_all(input.as_bytes()).await.map_err(spawn_err)?;
        // closing stdin lets the child see EOF
        drop(pipe);
    }

    let output = child.wait_with_output().await.map_err(spawn_err)?;
    Ok(CommandOutput {
        command,
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Build an owned argument vector from string slices
pub(crate) fn args<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    items.into_iter().map(Into::into).collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_both_streams() {
        let out = run(
            "sh",
            &args(["-c", "echo out; echo err >&2; exit 3"]),
            None,
            None,
        )
        .await
        .unwrap();

        assert!(!out.success);
        assert_eq!(out.combined(), "out\nerr");
        let err = out.check().unwrap_err();
        assert!(matches!(err, ClusterError::CommandFailed { .. }));
    }

    #[tokio::test]
    async fn test_run_pipes_stdin() {
        let out = run("cat", &[], None, Some("kind: Namespace\n")).await.unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, "kind: Namespace\n");
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let err = run("berth-no-such-program", &[], None, None).await.unwrap_err();
        assert!(matches!(err, ClusterError::Spawn { .. }));
    }
}

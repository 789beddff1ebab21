//! Privileged external command execution

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

use crate::error::FragError;

/// Exit status shells and pkexec use for "command not found"
const EXIT_NOT_FOUND: i32 = 127;

/// A fully resolved command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Most useful human-readable failure detail
    pub fn failure_detail(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

/// Launches external processes and waits for them.
///
/// Implementations must not kill the child when the returned future is
/// dropped; cancelling a task only stops waiting for it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput>;
}

/// Runs commands on the host through `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> std::io::Result<CommandOutput> {
        tracing::debug!(command = %invocation.command_line(), "spawning external command");

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// How commands gain root privileges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elevation {
    helper: Option<String>,
}

impl Elevation {
    /// Use `helper` unless the process is already root
    pub fn detect(helper: &str) -> Self {
        if nix::unistd::geteuid().is_root() || helper.trim().is_empty() {
            Self::direct()
        } else {
            Self::via(helper)
        }
    }

    pub fn via(helper: &str) -> Self {
        Self {
            helper: Some(helper.to_string()),
        }
    }

    pub fn direct() -> Self {
        Self { helper: None }
    }

    pub fn helper(&self) -> Option<&str> {
        self.helper.as_deref()
    }

    pub fn wrap(&self, program: &str, args: Vec<String>) -> Invocation {
        match &self.helper {
            Some(helper) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(program.to_string());
                full.extend(args);
                Invocation::new(helper.clone(), full)
            }
            None => Invocation::new(program, args),
        }
    }
}

/// Whether a 127 exit means the tool is absent.
///
/// Run directly, 127 only comes from a failed exec. pkexec also exits 127
/// when authorization is refused or dismissed, and says so on stderr; it
/// reports a missing program as "Cannot run program".
fn tool_not_found(tool: &str, invocation: &Invocation, output: &CommandOutput) -> bool {
    if invocation.program == tool {
        return true;
    }
    let stderr = output.stderr.trim();
    stderr.is_empty()
        || stderr.contains("Cannot run program")
        || stderr.contains("No such file or directory")
}

/// Map a process result onto the domain error channels.
///
/// Only zero/non-zero is meaningful, except 127 which means the tool
/// itself could not be found unless the privilege helper said otherwise.
pub fn check_output(
    tool: &str,
    invocation: &Invocation,
    result: std::io::Result<CommandOutput>,
) -> Result<CommandOutput, FragError> {
    match result {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(FragError::ExternalToolMissing(invocation.program.clone()))
        }
        Err(e) => Err(FragError::ExternalToolFailed(e.to_string())),
        Ok(output)
            if output.code == Some(EXIT_NOT_FOUND) && tool_not_found(tool, invocation, &output) =>
        {
            Err(FragError::ExternalToolMissing(tool.to_string()))
        }
        Ok(output) if !output.success() => {
            Err(FragError::ExternalToolFailed(output.failure_detail()))
        }
        Ok(output) => Ok(output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn output(code: i32, stdout: &str, stderr: &str) -> CommandOutput {
        CommandOutput {
            code: Some(code),
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn elevation_prefixes_helper() {
        let inv = Elevation::via("pkexec").wrap("e4defrag", vec!["-c".into(), "/dev/sdb1".into()]);
        assert_eq!(inv.program, "pkexec");
        assert_eq!(inv.args, vec!["e4defrag", "-c", "/dev/sdb1"]);
        assert_eq!(inv.command_line(), "pkexec e4defrag -c /dev/sdb1");
    }

    #[test]
    fn direct_elevation_runs_tool() {
        let inv = Elevation::direct().wrap("e4defrag", vec!["/dev/sdb1".into()]);
        assert_eq!(inv, Invocation::new("e4defrag", vec!["/dev/sdb1".into()]));
    }

    #[test]
    fn classifies_exit_statuses() {
        let inv = Invocation::new("pkexec", vec![]);

        assert!(check_output("e4defrag", &inv, Ok(output(0, "ok", ""))).is_ok());
        assert_eq!(
            check_output("e4defrag", &inv, Ok(output(127, "", ""))),
            Err(FragError::ExternalToolMissing("e4defrag".into()))
        );
        assert_eq!(
            check_output("e4defrag", &inv, Ok(output(1, "partial", "Permission denied\n"))),
            Err(FragError::ExternalToolFailed("Permission denied".into()))
        );
        assert_eq!(
            check_output("e4defrag", &inv, Ok(output(3, "", ""))),
            Err(FragError::ExternalToolFailed("exit status 3".into()))
        );
    }

    #[test]
    fn helper_refusal_is_not_a_missing_tool() {
        let inv = Elevation::via("pkexec").wrap("e4defrag", vec!["/dev/sdb1".into()]);

        assert_eq!(
            check_output(
                "e4defrag",
                &inv,
                Ok(output(127, "", "Error executing command as another user: Not authorized\n"))
            ),
            Err(FragError::ExternalToolFailed(
                "Error executing command as another user: Not authorized".into()
            ))
        );
        assert_eq!(
            check_output(
                "e4defrag",
                &inv,
                Ok(output(127, "", "Error executing command as another user: Request dismissed\n"))
            ),
            Err(FragError::ExternalToolFailed(
                "Error executing command as another user: Request dismissed".into()
            ))
        );
        assert_eq!(
            check_output(
                "e4defrag",
                &inv,
                Ok(output(127, "", "Cannot run program e4defrag: No such file or directory\n"))
            ),
            Err(FragError::ExternalToolMissing("e4defrag".into()))
        );
    }

    #[test]
    fn direct_exit_127_is_a_missing_tool() {
        let inv = Elevation::direct().wrap("e4defrag", vec!["/dev/sdb1".into()]);
        assert_eq!(
            check_output("e4defrag", &inv, Ok(output(127, "", "sh: e4defrag: not found\n"))),
            Err(FragError::ExternalToolMissing("e4defrag".into()))
        );
    }

    #[test]
    fn spawn_not_found_names_the_launched_program() {
        let inv = Invocation::new("pkexec", vec![]);
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        assert_eq!(
            check_output("e4defrag", &inv, Err(err)),
            Err(FragError::ExternalToolMissing("pkexec".into()))
        );
    }

    #[tokio::test]
    async fn system_runner_captures_streams_and_status() {
        let inv = Invocation::new(
            "sh",
            vec!["-c".into(), "printf 'one\\n'; printf 'two\\n' >&2; exit 3".into()],
        );
        let out = SystemRunner.run(&inv).await.expect("run sh");

        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout, "one\n");
        assert_eq!(out.stderr, "two\n");
    }

    #[tokio::test]
    async fn system_runner_reports_missing_binary() {
        let inv = Invocation::new("fragscope-definitely-not-installed", vec![]);
        let result = SystemRunner.run(&inv).await;
        let err = check_output("x", &inv, result).unwrap_err();
        assert!(matches!(err, FragError::ExternalToolMissing(_)));
    }
}

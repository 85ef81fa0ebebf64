//! Process launching for `run` and `run_auo_setup` steps.

use aucat_errors::{Error, PlatformError};
use std::path::{Path, PathBuf};
use tokio::process::Command;

mod detect;

pub use detect::{is_pid_alive, is_process_running};

/// Maximum number of stderr characters carried into errors and logs.
pub const STDERR_LIMIT: usize = 500;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// Command builder for a single external invocation
#[derive(Debug, Clone)]
pub struct PlatformCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    #[cfg_attr(not(windows), allow(dead_code))]
    no_window: bool,
}

impl PlatformCommand {
    /// Create a new platform command
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            current_dir: None,
            no_window: false,
        }
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<str>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: Into<PathBuf>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Start the process without a console window (Windows only).
    pub fn no_window(&mut self) -> &mut Self {
        self.no_window = true;
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }

    #[must_use]
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn get_current_dir(&self) -> Option<&PathBuf> {
        self.current_dir.as_ref()
    }

    /// Run to completion, capturing stdout and stderr.
    ///
    /// Dropping the returned future kills the child, so a step abandoned on
    /// timeout or cancellation does not keep running in the background.
    ///
    /// # Errors
    ///
    /// Returns `PlatformError::ProcessExecutionFailed` if the process cannot
    /// be spawned.
    pub async fn execute(&self) -> Result<CommandOutput, Error> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }
        #[cfg(windows)]
        if self.no_window {
            command.creation_flags(CREATE_NO_WINDOW);
        }
        command.kill_on_drop(true);

        tracing::debug!(program = %self.program, args = ?self.args, "spawning process");
        let output = command
            .output()
            .await
            .map_err(|e| PlatformError::ProcessExecutionFailed {
                command: self.program.clone(),
                message: e.to_string(),
            })?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

/// Output from command execution
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Lossy stderr text cut to [`STDERR_LIMIT`] characters.
    #[must_use]
    pub fn stderr_snippet(&self) -> String {
        truncate_chars(String::from_utf8_lossy(&self.stderr).trim(), STDERR_LIMIT)
    }
}

pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

fn absolute(path: &Path) -> Result<PathBuf, Error> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().map_err(|e| Error::io_with_path(&e, path))?;
    Ok(cwd.join(path))
}

/// Quote a value as a PowerShell single-quoted literal.
fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Build the command that launches `exe` without a visible window and waits
/// for it. Elevated launches go through the platform's elevation mechanism.
///
/// On Windows an elevated launch runs `Start-Process -Verb RunAs` inside
/// PowerShell. Killing the wrapper does not reach the elevated child, which
/// runs under another token; it keeps going until it exits on its own.
#[must_use]
pub fn hidden_command(exe: &Path, args: &[String], elevate: bool) -> PlatformCommand {
    if cfg!(windows) && elevate {
        let mut script = format!(
            "$p = Start-Process -FilePath {} -WindowStyle Hidden -Wait -PassThru -Verb RunAs",
            ps_quote(&exe.to_string_lossy())
        );
        if !args.is_empty() {
            let list: Vec<String> = args.iter().map(|a| ps_quote(a)).collect();
            script.push_str(" -ArgumentList ");
            script.push_str(&list.join(","));
        }
        script.push_str("; exit $p.ExitCode");

        let mut cmd = PlatformCommand::new("powershell");
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", &script])
            .no_window();
        cmd
    } else if elevate {
        let mut cmd = PlatformCommand::new("sudo");
        cmd.arg("-n").arg(exe.to_string_lossy()).args(args);
        cmd
    } else {
        let mut cmd = PlatformCommand::new(&exe.to_string_lossy());
        cmd.args(args).no_window();
        cmd
    }
}

/// Launch `exe` hidden, optionally elevated, and wait for it to exit.
///
/// A relative `exe` is resolved against the current directory first. The
/// exit code is returned as-is; deciding what counts as failure is up to the
/// caller.
///
/// # Errors
///
/// Returns an error if the process cannot be started.
pub async fn run_hidden(exe: &Path, args: &[String], elevate: bool) -> Result<CommandOutput, Error> {
    let exe = absolute(exe)?;
    let mut cmd = hidden_command(&exe, args, elevate);
    if let Some(dir) = exe.parent() {
        cmd.current_dir(dir);
    }
    let output = cmd.execute().await?;
    tracing::info!(
        exe = %exe.display(),
        elevate,
        exit_code = output.exit_code,
        "process finished"
    );
    Ok(output)
}

/// Arguments handed to the host's bundled setup helper.
#[must_use]
pub fn special_setup_args(app_root: &Path, portable: bool) -> Vec<String> {
    if portable {
        vec![
            "-aviutldir".to_string(),
            app_root.to_string_lossy().into_owned(),
        ]
    } else {
        vec!["-aviutldir-default".to_string()]
    }
}

/// Launch the host's setup helper against the configured installation.
///
/// # Errors
///
/// Returns an error if the executable cannot be found or started.
pub async fn run_special_setup(
    exe: &Path,
    app_root: &Path,
    portable: bool,
) -> Result<CommandOutput, Error> {
    let exe = tokio::fs::canonicalize(exe)
        .await
        .map_err(|e| Error::io_with_path(&e, exe))?;
    let mut cmd = PlatformCommand::new(&exe.to_string_lossy());
    cmd.args(special_setup_args(app_root, portable));
    if let Some(dir) = exe.parent() {
        cmd.current_dir(dir);
    }
    tracing::info!(exe = %exe.display(), portable, "running setup helper");
    cmd.execute().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_on_char_boundaries() {
        let text = "あ".repeat(600);
        assert_eq!(truncate_chars(&text, STDERR_LIMIT).chars().count(), 500);
    }

    #[test]
    fn setup_args_follow_install_mode() {
        assert_eq!(
            special_setup_args(Path::new("/opt/host"), true),
            vec!["-aviutldir".to_string(), "/opt/host".to_string()]
        );
        assert_eq!(
            special_setup_args(Path::new("/opt/host"), false),
            vec!["-aviutldir-default".to_string()]
        );
    }

    #[test]
    fn powershell_quotes_are_doubled() {
        assert_eq!(ps_quote("it's"), "'it''s'");
    }

    #[cfg(not(windows))]
    #[test]
    fn elevated_launch_uses_non_interactive_sudo() {
        let cmd = hidden_command(Path::new("/opt/setup"), &["/S".to_string()], true);
        assert_eq!(cmd.program(), "sudo");
        assert_eq!(cmd.get_args(), &["-n", "/opt/setup", "/S"]);
    }

    #[cfg(windows)]
    #[test]
    fn windows_launch_goes_through_start_process() {
        let cmd = hidden_command(Path::new("C:/setup.exe"), &["/S".to_string()], true);
        assert_eq!(cmd.program(), "powershell");
        let script = cmd.get_args().last().unwrap();
        assert!(script.contains("-WindowStyle Hidden -Wait -PassThru"));
        assert!(script.contains("-Verb RunAs"));
    }

    #[cfg(windows)]
    #[test]
    fn plain_windows_launch_runs_the_exe_directly() {
        let cmd = hidden_command(Path::new("C:/setup.exe"), &["/S".to_string()], false);
        assert_eq!(cmd.program(), "C:/setup.exe");
        assert_eq!(cmd.get_args(), &["/S"]);
    }
}

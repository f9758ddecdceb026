//! Subprocess execution utilities.

use std::ffi::OsStr;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Output, Stdio};

use anyhow::{bail, Context, Result};

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    stdin: Option<Vec<u8>>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Set stdin data.
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute the command and wait for completion, capturing output.
    pub fn exec(&self) -> Result<Output> {
        let mut cmd = self.build_command();

        if self.stdin.is_some() {
            cmd.stdin(Stdio::piped());
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| self.spawn_failure())?;

        if let Some(ref stdin_data) = self.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(stdin_data)?;
            }
        }

        let output = child
            .wait_with_output()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;

        Ok(output)
    }

    /// Execute with captured output and require success.
    pub fn exec_and_check(&self) -> Result<Output> {
        let output = self.exec()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            bail!(
                "`{}` failed with exit code {:?}\n{}{}",
                self.display_command(),
                output.status.code(),
                stdout,
                stderr
            );
        }
        Ok(output)
    }

    /// Execute with stdout/stderr passed through to ours.
    ///
    /// Stdin is inherited unless data was set with [`ProcessBuilder::stdin`].
    pub fn status(&self) -> Result<ExitStatus> {
        let mut cmd = self.build_command();

        let Some(ref stdin_data) = self.stdin else {
            return cmd
                .status()
                .with_context(|| self.spawn_failure());
        };

        cmd.stdin(Stdio::piped());
        let mut child = cmd
            .spawn()
            .with_context(|| self.spawn_failure())?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(stdin_data)?;
        }
        child
            .wait()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))
    }

    /// Execute with output passed through and require success.
    pub fn status_and_check(&self) -> Result<()> {
        let status = self.status()?;
        check_status(status, || self.display_command())
    }

    /// Execute, handing every stdout line to `on_line`; stderr passes through.
    pub fn exec_with_lines(&self, mut on_line: impl FnMut(&str)) -> Result<()> {
        let mut cmd = self.build_command();
        cmd.stdout(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| self.spawn_failure())?;

        // output isn't necessarily UTF-8; only the exit code decides success
        let read = match child.stdout.take() {
            Some(stdout) => for_each_line(BufReader::new(stdout), &mut on_line),
            None => Ok(()),
        };

        let status = child
            .wait()
            .with_context(|| format!("failed to wait for `{}`", self.program.display()))?;
        read.with_context(|| format!("failed to read output of `{}`", self.program.display()))?;
        check_status(status, || self.display_command())
    }

    // a bare name that isn't on PATH is by far the most common cause
    fn spawn_failure(&self) -> String {
        let bare_name = self.program.components().count() == 1;
        if bare_name && which::which(&self.program).is_err() {
            format!("`{}` not found in PATH", self.program.display())
        } else {
            format!("failed to spawn `{}`", self.program.display())
        }
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn check_status(status: ExitStatus, display: impl FnOnce() -> String) -> Result<()> {
    if !status.success() {
        bail!("`{}` failed with exit code {:?}", display(), status.code());
    }
    Ok(())
}

/// Split `reader` on `\n`, decoding each line lossily.
fn for_each_line(mut reader: impl BufRead, on_line: &mut impl FnMut(&str)) -> std::io::Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        if buf.last() == Some(&b'\n') {
            buf.pop();
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
        }
        on_line(&String::from_utf8_lossy(&buf));
    }
}

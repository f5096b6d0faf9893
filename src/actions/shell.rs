//! `shell` action - runs a command through `sh -c`

use super::config_str;
use crate::workflow::{ActionContext, ActionHandler, Control, Engine, EngineError, HandlerResult};
use anyhow::{Context, bail};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Instant;

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

/// Runs `shell;<command>` or the config `command`
///
/// Config keys:
/// - `command`: used when the action has no argument; resolved as a token
/// - `dir`: working directory, `~` expanded
/// - `register`: var that receives the trimmed stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellAction;

impl ActionHandler for ShellAction {
    fn execute(&self, engine: &mut Engine, ctx: &mut ActionContext<'_>) -> HandlerResult {
        let command = if ctx.args.is_empty() {
            let token = config_str(ctx, "command")?.ok_or_else(|| EngineError::MissingConfig {
                action: ctx.name.to_string(),
                key: "command".to_string(),
            })?;
            engine.resolve(&token, ctx.model)?
        } else {
            // Commands may contain ';' themselves
            ctx.args.join(";")
        };

        let mut cmd = Command::new("sh");
        cmd.arg("-c")
            .arg(&command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = config_str(ctx, "dir")? {
            let dir = engine.resolve(&dir, ctx.model)?;
            cmd.current_dir(shellexpand::tilde(&dir).as_ref());
        }

        let start = Instant::now();
        tracing::debug!(command = %command, "Running shell command");
        let output = cmd
            .output()
            .with_context(|| format!("failed to spawn: {}", command))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::debug!(
            command = %command,
            duration_ms = start.elapsed().as_millis() as u64,
            exit_code = ?exit_code(&output.status),
            "Shell command finished"
        );

        if !output.status.success() {
            if !stderr.is_empty() {
                bail!("{}", stderr);
            }
            match exit_code(&output.status) {
                Some(code) => bail!("command exited with code {}", code),
                None => bail!("command terminated without an exit code"),
            }
        }

        if let Some(var) = config_str(ctx, "register")? {
            ctx.model.set_var(var, stdout);
        }
        Ok(Control::Continue)
    }
}

/// Exit code, using 128+signal for signal-terminated processes on Unix
fn exit_code(status: &ExitStatus) -> Option<i32> {
    if let Some(code) = status.code() {
        return Some(code);
    }
    #[cfg(unix)]
    {
        if let Some(signal) = status.signal() {
            return Some(128 + signal);
        }
    }
    None
}

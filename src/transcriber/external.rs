use crate::error::CollaboratorError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};

/// Run `command` once, sending `request` as a single JSON line on stdin and
/// reading the reply from the first non-empty line of stdout.
pub fn call_json_line<Req, Rep>(command: &[String], request: &Req) -> Result<Rep, CollaboratorError>
where
    Req: Serialize,
    Rep: DeserializeOwned,
{
    let (program, args) = command.split_first().ok_or_else(|| CollaboratorError::Spawn {
        command: String::new(),
        reason: "empty command".to_string(),
    })?;
    let display = command.join(" ");
    let mut line = serde_json::to_string(request).map_err(|e| CollaboratorError::Spawn {
        command: display.clone(),
        reason: format!("could not encode request: {e}"),
    })?;
    line.push('\n');
    log::debug!("Calling '{display}' with {line}");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| CollaboratorError::Spawn {
            command: display.clone(),
            reason: e.to_string(),
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        match stdin.write_all(line.as_bytes()) {
            Ok(()) => {}
            // the exit status tells what went wrong
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                log::debug!("'{display}' closed its input early");
            }
            Err(e) => {
                return Err(CollaboratorError::Spawn {
                    command: display,
                    reason: format!("could not write request: {e}"),
                })
            }
        }
    }

    let output = child.wait_with_output().map_err(|e| CollaboratorError::Spawn {
        command: display.clone(),
        reason: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(CollaboratorError::Exit {
            command: display,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    let reply = stdout
        .lines()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| CollaboratorError::Reply("empty output".to_string()))?;
    serde_json::from_str(reply).map_err(|e| CollaboratorError::Reply(format!("{e} in '{reply}'")))
}

/// Split a configured command line on whitespace.
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(str::to_string).collect()
}

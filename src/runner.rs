use std::fmt;
use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use crate::config::RemoteSettings;
use crate::error::RunnerError;

const DEFAULT_DOCKER_BIN: &str = "docker";
const SSH_BIN: &str = "ssh";
const REDACTED_ARG: &str = "'<redacted>'";

/// A single argument passed to the container command.
#[derive(Clone, PartialEq, Eq)]
pub enum CommandArg {
    Plain(String),
    Secret(String),
}

impl CommandArg {
    #[must_use]
    pub fn value(&self) -> &str {
        match self {
            Self::Plain(value) | Self::Secret(value) => value,
        }
    }

    fn display(&self) -> &str {
        match self {
            Self::Plain(value) => value,
            Self::Secret(_) => REDACTED_ARG,
        }
    }
}

impl fmt::Debug for CommandArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// A one-shot `docker run --rm` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub image: String,
    pub network: String,
    pub args: Vec<CommandArg>,
}

impl CommandSpec {
    /// Arguments after the `docker` binary.
    #[must_use]
    pub fn docker_args(&self) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "--rm".to_string(),
            "--network".to_string(),
            self.network.clone(),
            self.image.clone(),
        ];
        args.extend(self.args.iter().map(|arg| arg.value().to_string()));
        args
    }

    /// Human-readable command line with secret arguments masked.
    #[must_use]
    pub fn display_redacted(&self) -> String {
        let mut parts = vec![
            "docker run --rm --network".to_string(),
            shell_quote(&self.network),
            shell_quote(&self.image),
        ];
        for arg in &self.args {
            match arg {
                CommandArg::Plain(value) => parts.push(shell_quote(value)),
                CommandArg::Secret(_) => parts.push(REDACTED_ARG.to_string()),
            }
        }
        parts.join(" ")
    }
}

/// Output captured from a finished command.
pub struct CapturedOutput {
    /// Combined stdout followed by stderr.
    pub logs: String,
    pub exit_code: Option<i32>,
}

impl CapturedOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl fmt::Debug for CapturedOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedOutput")
            .field("log_bytes", &self.logs.len())
            .field("exit_code", &self.exit_code)
            .finish()
    }
}

/// Runs one-shot container commands and captures their output.
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> Result<CapturedOutput, RunnerError>;
}

/// Runs commands through the local docker CLI, or through `ssh` on a remote
/// docker host.
#[derive(Debug, Clone)]
pub struct DockerRunner {
    docker_bin: String,
    remote: Option<RemoteSettings>,
    max_output_bytes: usize,
}

impl DockerRunner {
    #[must_use]
    pub fn new(remote: Option<RemoteSettings>, max_output_bytes: usize) -> Self {
        Self {
            docker_bin: DEFAULT_DOCKER_BIN.to_string(),
            remote,
            max_output_bytes,
        }
    }

    #[must_use]
    pub fn with_docker_bin(mut self, docker_bin: impl Into<String>) -> Self {
        self.docker_bin = docker_bin.into();
        self
    }

    /// Program and arguments actually spawned for `spec`.
    #[must_use]
    pub fn invocation(&self, spec: &CommandSpec) -> (String, Vec<String>) {
        let docker_args = spec.docker_args();
        match &self.remote {
            None => (self.docker_bin.clone(), docker_args),
            Some(remote) => {
                let remote_command = std::iter::once(self.docker_bin.as_str())
                    .chain(docker_args.iter().map(String::as_str))
                    .map(shell_quote)
                    .collect::<Vec<_>>()
                    .join(" ");
                (
                    SSH_BIN.to_string(),
                    vec![
                        "-p".to_string(),
                        remote.port.to_string(),
                        format!("{}@{}", remote.user, remote.host),
                        "--".to_string(),
                        remote_command,
                    ],
                )
            }
        }
    }
}

#[async_trait::async_trait]
impl CommandRunner for DockerRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CapturedOutput, RunnerError> {
        let (program, args) = self.invocation(spec);
        debug!("Running: {}", spec.display_redacted());

        let mut child = Command::new(&program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdout = read_stream_limited(child.stdout.take(), self.max_output_bytes);
        let stderr = read_stream_limited(child.stderr.take(), self.max_output_bytes);
        let (stdout, stderr, status) = tokio::join!(stdout, stderr, child.wait());

        let output_err = |reason: String| RunnerError::Output {
            program: program.clone(),
            reason,
        };
        let status = status.map_err(|e| output_err(e.to_string()))?;
        let stdout = stdout.map_err(|e| output_err(e.to_string()))?;
        let stderr = stderr.map_err(|e| output_err(e.to_string()))?;

        debug!(
            "Command finished (status={status}, stdout_bytes={}, stderr_bytes={})",
            stdout.len(),
            stderr.len()
        );

        let mut logs = stdout;
        if !stderr.is_empty() {
            if !logs.is_empty() && !logs.ends_with('\n') {
                logs.push('\n');
            }
            logs.push_str(&stderr);
        }
        Ok(CapturedOutput {
            logs,
            exit_code: status.code(),
        })
    }
}

async fn read_stream_limited<R>(stream: Option<R>, max_bytes: usize) -> std::io::Result<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let Some(mut stream) = stream else {
        return Ok(String::new());
    };

    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        let remaining = max_bytes.saturating_sub(buf.len());
        // Keep draining so the child never blocks on a full pipe.
        buf.extend_from_slice(&chunk[..read.min(remaining)]);
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Quotes `value` for a POSIX shell when it contains anything unusual.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

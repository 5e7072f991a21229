//! External tunnel launcher.
//!
//! Exposes the local server through the `vk-tunnel` CLI. The server never
//! depends on the outcome of a launch; failures are only logged.

use async_trait::async_trait;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

const TUNNEL_PROGRAM: &str = "vk-tunnel";
const TUNNEL_PACKAGE: &str = "@vkontakte/vk-tunnel";
const VERSION_PROBE_TIMEOUT: Duration = Duration::from_secs(1);
const LINUX_TERMINALS: &[&str] = &["gnome-terminal", "konsole", "xterm", "x-terminal-emulator"];
const KEEP_OPEN_SUFFIX: &str = "; read -p 'Press Enter to close...'";

/// Errors from launching a tunnel.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The tunnel CLI was missing and could not be installed.
    #[error("failed to install {package}: {reason}")]
    Install { package: &'static str, reason: String },

    /// The tunnel process could not be started.
    #[error("failed to launch tunnel: {0}")]
    Launch(#[from] std::io::Error),
}

/// Tunnel settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelConfig {
    /// Local host the tunnel forwards to
    pub host: String,
    /// Local port the tunnel forwards to
    pub port: u16,
    /// Tunnel request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8082,
            timeout_ms: 5000,
        }
    }
}

impl TunnelConfig {
    /// Tunnel configuration for a local port.
    pub fn for_port(port: u16) -> Self {
        Self {
            port,
            ..Self::default()
        }
    }

    /// Shell command line that runs the tunnel.
    pub fn command_line(&self) -> String {
        format!(
            "{} --insecure=1 --http-protocol=http --ws-protocol=ws --host={} --port={} --timeout={}",
            TUNNEL_PROGRAM, self.host, self.port, self.timeout_ms
        )
    }
}

/// Something that can start an external tunnel process.
#[async_trait]
pub trait TunnelLauncher: Send + Sync {
    /// Start the tunnel. Returns once the process has been spawned.
    async fn start(&self, config: &TunnelConfig) -> Result<(), TunnelError>;
}

/// Launches `vk-tunnel`, installing it through npm if needed.
#[derive(Debug, Default, Clone)]
pub struct VkTunnelLauncher;

impl VkTunnelLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Probe `vk-tunnel --version`. A probe that hangs counts as installed.
    async fn is_installed(&self) -> bool {
        let probe = Command::new(TUNNEL_PROGRAM)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .status();

        match tokio::time::timeout(VERSION_PROBE_TIMEOUT, probe).await {
            Err(_) => {
                info!("Tunnel version check timed out, assuming it is installed");
                true
            }
            Ok(Ok(status)) => status.success(),
            Ok(Err(_)) => false,
        }
    }

    async fn install(&self) -> Result<(), TunnelError> {
        info!(package = TUNNEL_PACKAGE, "Installing tunnel via npm");
        let status = Command::new("npm")
            .args(["install", TUNNEL_PACKAGE, "-g"])
            .status()
            .await
            .map_err(|e| TunnelError::Install {
                package: TUNNEL_PACKAGE,
                reason: e.to_string(),
            })?;

        if !status.success() {
            return Err(TunnelError::Install {
                package: TUNNEL_PACKAGE,
                reason: format!("npm exited with {}", status),
            });
        }
        info!("Tunnel installed successfully");
        Ok(())
    }

    /// Spawn the command in the current terminal as a background task.
    fn run_in_current_terminal(&self, command_line: &str) -> Result<(), TunnelError> {
        let mut child = Command::new("sh")
            .args(["-c", command_line])
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;

        tokio::spawn(async move {
            info!("Tunnel running in current terminal; authorize and press ENTER when prompted");
            match child.wait().await {
                Ok(status) if status.success() => info!("Tunnel exited"),
                Ok(status) => warn!(%status, "Tunnel finished with error"),
                Err(e) => warn!(error = %e, "Tunnel finished with error"),
            }
        });
        Ok(())
    }
}

#[async_trait]
impl TunnelLauncher for VkTunnelLauncher {
    async fn start(&self, config: &TunnelConfig) -> Result<(), TunnelError> {
        info!("Starting tunnel");

        if !self.is_installed().await {
            info!("Tunnel not found, installing");
            self.install().await?;
        }

        let command_line = config.command_line();
        info!(os = std::env::consts::OS, "Opening new terminal window for tunnel");

        match open_terminal(std::env::consts::OS, &command_line) {
            Ok(()) => {
                info!("Tunnel started in new terminal window; complete authorization there");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Failed to open terminal, falling back to current terminal");
                self.run_in_current_terminal(&command_line)
            }
        }
    }
}

/// Program and arguments that open `command_line` in a new terminal window.
pub fn terminal_invocation(os: &str, terminal: &str, command_line: &str) -> (String, Vec<String>) {
    match os {
        "macos" => (
            "osascript".to_string(),
            vec![
                "-e".to_string(),
                format!(r#"tell application "Terminal" to do script "{}""#, command_line),
            ],
        ),
        "windows" => (
            "cmd".to_string(),
            ["/c", "start", "cmd", "/k", command_line]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        ),
        _ => {
            let separator = if terminal == "gnome-terminal" { "--" } else { "-e" };
            (
                terminal.to_string(),
                vec![
                    separator.to_string(),
                    "bash".to_string(),
                    "-c".to_string(),
                    format!("{}{}", command_line, KEEP_OPEN_SUFFIX),
                ],
            )
        }
    }
}

fn open_terminal(os: &str, command_line: &str) -> std::io::Result<()> {
    let terminal = match os {
        "macos" | "windows" => "",
        _ => LINUX_TERMINALS
            .iter()
            .copied()
            .find(|t| find_program(t, std::env::var_os("PATH")).is_some())
            .unwrap_or("xterm"),
    };

    let (program, args) = terminal_invocation(os, terminal, command_line);
    Command::new(program).args(args).spawn().map(|_| ())
}

/// Locate `program` in a `PATH`-style list of directories.
pub fn find_program(program: &str, path_var: Option<OsString>) -> Option<PathBuf> {
    let path_var = path_var?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU16, Ordering};
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_command_line() {
        let config = TunnelConfig::default();
        assert_eq!(
            config.command_line(),
            "vk-tunnel --insecure=1 --http-protocol=http --ws-protocol=ws --host=localhost --port=8082 --timeout=5000"
        );
        assert!(TunnelConfig::for_port(9000).command_line().contains("--port=9000"));
    }

    #[test]
    fn test_linux_invocation() {
        let (program, args) = terminal_invocation("linux", "gnome-terminal", "run");
        assert_eq!(program, "gnome-terminal");
        assert_eq!(args[0], "--");
        assert!(args[3].starts_with("run; read -p"));

        let (program, args) = terminal_invocation("linux", "konsole", "run");
        assert_eq!(program, "konsole");
        assert_eq!(args[0], "-e");
    }

    #[test]
    fn test_macos_and_windows_invocation() {
        let (program, args) = terminal_invocation("macos", "", "run");
        assert_eq!(program, "osascript");
        assert_eq!(args[1], r#"tell application "Terminal" to do script "run""#);

        let (program, args) = terminal_invocation("windows", "", "run");
        assert_eq!(program, "cmd");
        assert_eq!(args, vec!["/c", "start", "cmd", "/k", "run"]);
    }

    #[test]
    fn test_find_program() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("fake-term"), b"").unwrap();
        let path_var = std::env::join_paths([dir.path()]).unwrap();

        assert_eq!(
            find_program("fake-term", Some(path_var.clone())),
            Some(dir.path().join("fake-term"))
        );
        assert!(find_program("missing-term", Some(path_var)).is_none());
        assert!(find_program("fake-term", None).is_none());
    }

    struct RecordingLauncher {
        port: AtomicU16,
    }

    #[async_trait]
    impl TunnelLauncher for RecordingLauncher {
        async fn start(&self, config: &TunnelConfig) -> Result<(), TunnelError> {
            if config.port == 0 {
                return Err(TunnelError::Launch(std::io::Error::other("no port")));
            }
            self.port.store(config.port, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_launcher_trait_object() {
        let launcher = RecordingLauncher {
            port: AtomicU16::new(0),
        };
        let dyn_launcher: &dyn TunnelLauncher = &launcher;

        assert_ok!(dyn_launcher.start(&TunnelConfig::for_port(8082)).await);
        assert_eq!(launcher.port.load(Ordering::SeqCst), 8082);

        let err = assert_err!(dyn_launcher.start(&TunnelConfig::for_port(0)).await);
        assert!(err.to_string().starts_with("failed to launch tunnel"));
    }
}

//! SSH port forwarding
//!
//! `ssh -f` forks into the background once the forwarding is up, so the
//! spawned process exits almost immediately and its status tells whether the
//! tunnel came up. Teardown matches the background process by `user@host`.

use crate::config::SshConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::{Read, Seek, SeekFrom, Write};
use std::process::Stdio;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tracing::{debug, error, info, warn};

/// A tunnel a database source needs before it can connect
#[async_trait]
pub trait Tunnel: Send {
    /// Bring the tunnel up
    async fn open(&mut self) -> Result<()>;

    /// Tear the tunnel down; safe to call when `open` failed or never ran
    fn close(&mut self);
}

/// Background `ssh -L` tunnel
pub struct SshTunnel {
    config: SshConfig,
    key_file: Option<NamedTempFile>,
    spawned: bool,
    closed: bool,
}

impl SshTunnel {
    /// Create a tunnel, nothing is started yet
    pub fn new(config: SshConfig) -> Self {
        Self {
            config,
            key_file: None,
            spawned: false,
            closed: false,
        }
    }

    /// `user@host`, also the pattern used to find the process on teardown
    pub fn destination(&self) -> String {
        format!("{}@{}", self.config.user, self.config.host)
    }

    /// Local port the database is reachable on once open
    pub fn local_port(&self) -> u16 {
        self.config.local_port
    }

    /// Arguments passed to `ssh`, key path excluded
    pub fn forward_args(&self) -> Vec<String> {
        let mut args = vec![
            "-f".to_string(),
            "-N".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "HostKeyAlgorithms=+ssh-rsa".to_string(),
            "-o".to_string(),
            "PubkeyAcceptedAlgorithms=+ssh-rsa".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=60".to_string(),
            "-o".to_string(),
            "ExitOnForwardFailure=yes".to_string(),
        ];
        if self.config.port != 22 {
            args.push("-p".to_string());
            args.push(self.config.port.to_string());
        }
        args.push("-L".to_string());
        args.push(format!(
            "{}:{}:{}",
            self.config.local_port, self.config.remote_host, self.config.remote_port
        ));
        args.push(self.destination());
        args
    }

    /// Key material, from the inline value or the key file
    pub(super) fn key_material(&self) -> Result<String> {
        let mut key = match (&self.config.private_key, &self.config.private_key_path) {
            (Some(inline), _) if !inline.trim().is_empty() => inline.clone(),
            (_, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                Error::tunnel(format!("Cannot read key {}: {e}", path.display()))
            })?,
            _ => return Err(Error::tunnel("No SSH private key configured")),
        };
        if !key.ends_with('\n') {
            key.push('\n');
        }
        Ok(key)
    }

    /// Write the key to an owner-only temporary file
    pub(super) fn write_key(&mut self) -> Result<std::path::PathBuf> {
        let key = self.key_material()?;
        let mut file = tempfile::Builder::new()
            .prefix("daily_extract_key_")
            .tempfile()?;
        file.write_all(key.as_bytes())?;
        file.flush()?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o600))?;
        }

        let path = file.path().to_path_buf();
        self.key_file = Some(file);
        Ok(path)
    }
}

#[async_trait]
impl Tunnel for SshTunnel {
    async fn open(&mut self) -> Result<()> {
        let key_path = self.write_key()?;

        // stderr goes to a file; a pipe stays open in the forked ssh and
        // would block the wait below
        let mut stderr_file = tempfile::tempfile()?;
        let stderr = stderr_file.try_clone()?;

        let mut command = Command::new("ssh");
        command
            .arg("-i")
            .arg(&key_path)
            .args(self.forward_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr));

        info!(
            destination = %self.destination(),
            local_port = self.config.local_port,
            "Opening SSH tunnel"
        );
        self.spawned = true;
        let status = command
            .status()
            .await
            .map_err(|e| Error::tunnel(format!("Failed to spawn ssh: {e}")))?;

        if !status.success() {
            let mut message = String::new();
            stderr_file.seek(SeekFrom::Start(0))?;
            stderr_file.read_to_string(&mut message)?;
            let message = message.trim().to_string();
            error!(status = %status, stderr = %message, "SSH tunnel failed");
            return Err(Error::tunnel(if message.is_empty() {
                format!("ssh exited with {status}")
            } else {
                message
            }));
        }

        tokio::time::sleep(Duration::from_secs(self.config.settle_seconds)).await;
        info!("SSH tunnel established");
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if self.spawned {
            match std::process::Command::new("pkill")
                .arg("-f")
                .arg(self.destination())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
            {
                Ok(status) => debug!(status = %status, "pkill finished"),
                Err(e) => warn!(error = %e, "Failed to stop SSH tunnel"),
            }
        }

        if let Some(file) = self.key_file.take() {
            if let Err(e) = file.close() {
                warn!(error = %e, "Failed to remove key file");
            }
        }
        info!("SSH tunnel closed");
    }
}

impl Drop for SshTunnel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SshTunnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshTunnel")
            .field("destination", &self.destination())
            .field("local_port", &self.config.local_port)
            .field("spawned", &self.spawned)
            .field("closed", &self.closed)
            .finish()
    }
}

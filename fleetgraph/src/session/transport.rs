//! SSH connection setup on top of russh.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::{debug, warn};
use russh::Channel;
use russh::client::{self, Handle, Msg};
use russh::keys::{PrivateKeyWithHashAlg, PublicKey, load_secret_key};
use secrecy::ExposeSecret;

use crate::config::{AuthMethod, DeviceDescriptor, HostKeyVerification};
use crate::error::SessionError;

/// An authenticated SSH connection to one device.
pub(crate) struct SshTransport {
    session: Handle<DeviceHandler>,
    /// PTY columns and rows requested for the shell.
    terminal: (u32, u32),
}

impl SshTransport {
    /// Connect to the device and authenticate.
    pub(crate) async fn connect(device: &DeviceDescriptor) -> Result<Self, SessionError> {
        let rejected_key = Arc::new(Mutex::new(None));
        let handler = DeviceHandler {
            host: device.address.clone(),
            port: device.port,
            host_key_verification: device.host_key_verification,
            known_hosts_path: device.known_hosts_path.clone(),
            rejected_key: rejected_key.clone(),
        };

        let connect_timeout = device.connect_timeout();
        let connecting = client::connect(
            Arc::new(client_config(device)),
            (device.address.as_str(), device.port),
            handler,
        );
        let mut session = tokio::time::timeout(connect_timeout, connecting)
            .await
            .map_err(|_| SessionError::Timeout(connect_timeout))?
            .map_err(|e| {
                // russh reports a refused host key as a generic error
                let rejected = rejected_key.lock().ok().and_then(|mut slot| slot.take());
                rejected.unwrap_or_else(|| connect_error(device, e))
            })?;

        Self::authenticate(&mut session, device).await?;
        debug!("authenticated to {} as {}", device.socket_addr(), device.username);

        Ok(Self {
            session,
            terminal: (device.terminal_width, device.terminal_height),
        })
    }

    /// Open a PTY shell channel.
    pub(crate) async fn open_channel(&self) -> Result<Channel<Msg>, SessionError> {
        let (width, height) = self.terminal;
        let channel = self.session.channel_open_session().await?;
        channel
            .request_pty(true, "xterm", width, height, 0, 0, &[])
            .await?;
        channel.request_shell(true).await?;
        Ok(channel)
    }

    async fn authenticate(
        session: &mut Handle<DeviceHandler>,
        device: &DeviceDescriptor,
    ) -> Result<(), SessionError> {
        let user = device.username.as_str();
        let success = match device.auth() {
            AuthMethod::None => session.authenticate_none(user).await?.success(),
            AuthMethod::Password(password) => session
                .authenticate_password(user, password.expose_secret())
                .await?
                .success(),
            AuthMethod::PrivateKey { path, passphrase } => {
                let key = load_secret_key(path, passphrase.map(|p| p.expose_secret()))
                    .map_err(|e| SessionError::Key(e.to_string()))?;

                // Best RSA hash the server supports; ignored for non-RSA keys
                let hash_alg = session.best_supported_rsa_hash().await?.flatten();

                session
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg))
                    .await?
                    .success()
            }
        };

        if !success {
            return Err(SessionError::AuthenticationFailed {
                user: user.to_string(),
                host: device.address.clone(),
            });
        }

        Ok(())
    }

    /// Disconnect.
    pub(crate) async fn close(self) -> Result<(), SessionError> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

fn client_config(device: &DeviceDescriptor) -> client::Config {
    client::Config {
        inactivity_timeout: Some(device.idle_timeout()),
        ..Default::default()
    }
}

fn connect_error(device: &DeviceDescriptor, error: russh::Error) -> SessionError {
    match error {
        russh::Error::IO(source) => SessionError::ConnectionFailed {
            host: device.address.clone(),
            port: device.port,
            source,
        },
        other => SessionError::Ssh(other),
    }
}

/// Checks the device's host key against known_hosts.
struct DeviceHandler {
    host: String,
    port: u16,
    host_key_verification: HostKeyVerification,
    known_hosts_path: Option<PathBuf>,
    /// Why the key was refused, for `connect` to report.
    rejected_key: Arc<Mutex<Option<SessionError>>>,
}

impl DeviceHandler {
    /// `Ok(true)` if known, `Ok(false)` if unknown, `Err` if changed.
    fn check_known_hosts(&self, pubkey: &PublicKey) -> Result<bool, SessionError> {
        let result = match self.known_hosts_path {
            Some(ref path) => russh::keys::check_known_hosts_path(&self.host, self.port, pubkey, path),
            None => russh::keys::check_known_hosts(&self.host, self.port, pubkey),
        };

        match result {
            Ok(matched) => Ok(matched),
            Err(russh::keys::Error::KeyChanged { line }) => Err(SessionError::HostKeyChanged {
                host: self.host.clone(),
                port: self.port,
                line,
            }),
            Err(e) => Err(SessionError::KnownHosts(e.to_string())),
        }
    }

    fn learn_host_key(&self, pubkey: &PublicKey) -> Result<(), SessionError> {
        let result = match self.known_hosts_path {
            Some(ref path) => {
                russh::keys::known_hosts::learn_known_hosts_path(&self.host, self.port, pubkey, path)
            }
            None => russh::keys::known_hosts::learn_known_hosts(&self.host, self.port, pubkey),
        };

        result.map_err(|e| SessionError::KnownHosts(e.to_string()))
    }

    fn reject(&self, error: SessionError) -> bool {
        if let Ok(mut slot) = self.rejected_key.lock() {
            *slot = Some(error);
        }
        false
    }
}

impl client::Handler for DeviceHandler {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_public_key: &PublicKey) -> Result<bool, Self::Error> {
        let accepted = match self.host_key_verification {
            HostKeyVerification::Disabled => true,

            HostKeyVerification::AcceptNew => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => {
                    if let Err(e) = self.learn_host_key(server_public_key) {
                        warn!("Failed to save host key for {}: {}", self.host, e);
                    }
                    true
                }
                Err(e) => self.reject(e),
            },

            HostKeyVerification::Strict => match self.check_known_hosts(server_public_key) {
                Ok(true) => true,
                Ok(false) => self.reject(SessionError::HostKeyUnknown {
                    host: self.host.clone(),
                    port: self.port,
                }),
                Err(e) => self.reject(e),
            },
        };
        Ok(accepted)
    }
}

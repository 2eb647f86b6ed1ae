// SSH 客户端核心实现

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use russh::client::{AuthResult, Handle};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::config::{AuthMethod, JumpHostConfig, SshConfig};
use super::error::SshError;
use super::handler::SshClientHandler;
use super::session::SshSession;
use crate::models::HostIdentity;

/// SSH 客户端
/// 负责建立 SSH 连接并返回 SshSession
pub struct SshClient {
    /// 连接配置
    config: SshConfig,
    /// known_hosts 文件
    known_hosts: PathBuf,
}

impl SshClient {
    /// 创建新的 SSH 客户端
    pub fn new(config: SshConfig, known_hosts: PathBuf) -> Self {
        Self {
            config,
            known_hosts,
        }
    }

    /// 执行连接
    /// 返回 SshSession 用于后续操作
    pub async fn connect(&self) -> Result<SshSession, SshError> {
        info!(
            "[SSH] Connecting to {}@{}:{}",
            self.config.username, self.config.host, self.config.port
        );

        let target = HostIdentity::new(&self.config.host, self.config.port);
        let russh_config = Arc::new(self.config.to_russh_config());

        let (mut handle, jump) = match &self.config.jump_host {
            None => {
                let (stream, addr) = self.tcp_connect(&self.config.host, self.config.port).await?;
                let handler = SshClientHandler::new(target, Some(addr), self.known_hosts.clone());
                (self.handshake(russh_config, stream, handler).await?, None)
            }
            Some(jump) => {
                let jump_handle = self.connect_jump(jump).await?;

                info!(
                    "[SSH] Opening tunnel to {}:{} via {}",
                    self.config.host, self.config.port, jump.host
                );
                let channel = jump_handle
                    .channel_open_direct_tcpip(
                        self.config.host.clone(),
                        u32::from(self.config.port),
                        "127.0.0.1",
                        0,
                    )
                    .await
                    .map_err(|e| SshError::JumpHost(format!("failed to open tunnel: {}", e)))?;

                let handler = SshClientHandler::new(target, None, self.known_hosts.clone());
                let handle = self
                    .handshake(russh_config, channel.into_stream(), handler)
                    .await?;
                (handle, Some(jump_handle))
            }
        };

        authenticate(&mut handle, &self.config.username, &self.config.auth).await?;
        info!("[SSH] Authenticated as '{}'", self.config.username);

        Ok(SshSession::new(
            handle,
            jump,
            self.config.host.clone(),
            self.config.username.clone(),
        ))
    }

    /// 连接并认证跳板机
    async fn connect_jump(
        &self,
        jump: &JumpHostConfig,
    ) -> Result<Handle<SshClientHandler>, SshError> {
        info!(
            "[SSH] Connecting to jump host {}@{}:{}",
            jump.username, jump.host, jump.port
        );

        let (stream, addr) = self.tcp_connect(&jump.host, jump.port).await?;
        let handler = SshClientHandler::new(
            HostIdentity::new(&jump.host, jump.port),
            Some(addr),
            self.known_hosts.clone(),
        );
        let config = Arc::new(self.config.to_russh_config());
        let mut handle = self.handshake(config, stream, handler).await?;

        authenticate(&mut handle, &jump.username, &jump.auth)
            .await
            .map_err(|e| SshError::JumpHost(e.to_string()))?;

        Ok(handle)
    }

    /// 解析地址并建立 TCP 连接
    async fn tcp_connect(&self, host: &str, port: u16) -> Result<(TcpStream, SocketAddr), SshError> {
        let addr = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| SshError::Config(format!("Failed to resolve address {}: {}", host, e)))?
            .next()
            .ok_or_else(|| SshError::Config(format!("No valid address found for {}", host)))?;

        debug!("[SSH] Connecting to {}...", addr);
        let stream = timeout(self.config.connect_timeout(), TcpStream::connect(addr))
            .await
            .map_err(|_| SshError::Timeout(self.config.connect_timeout))??;

        Ok((stream, addr))
    }

    /// SSH 握手（包含主机公钥校验）
    async fn handshake<S>(
        &self,
        config: Arc<russh::client::Config>,
        stream: S,
        handler: SshClientHandler,
    ) -> Result<Handle<SshClientHandler>, SshError>
    where
        S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
    {
        // 主机公钥确认需要等待用户，不计入超时
        let handle = russh::client::connect_stream(config, stream, handler).await?;
        debug!("[SSH] Handshake completed");
        Ok(handle)
    }
}

/// 依次尝试各认证方式，任意一种成功即可
async fn authenticate(
    handle: &mut Handle<SshClientHandler>,
    username: &str,
    methods: &[AuthMethod],
) -> Result<(), SshError> {
    if methods.is_empty() {
        return Err(SshError::Auth(
            "no password or private key available".to_string(),
        ));
    }

    let mut remaining = None;
    for method in methods {
        debug!("[SSH] Trying {} authentication", method.name());

        let result = match method {
            AuthMethod::Password(password) => {
                handle.authenticate_password(username, password).await?
            }
            AuthMethod::PublicKey(key) => {
                let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
                let key = russh::keys::PrivateKeyWithHashAlg::new(key.clone(), hash_alg);
                handle.authenticate_publickey(username, key).await?
            }
        };

        match result {
            AuthResult::Success => return Ok(()),
            AuthResult::Failure {
                remaining_methods,
                partial_success,
            } => {
                if partial_success {
                    warn!("[SSH] Partial authentication, additional methods required");
                }
                remaining = Some(remaining_methods);
            }
        }
    }

    Err(SshError::Auth(match remaining {
        Some(methods) => format!("all methods rejected. Server suggests: {:?}", methods),
        None => "all methods rejected".to_string(),
    }))
}

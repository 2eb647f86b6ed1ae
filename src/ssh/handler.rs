// SSH 客户端 Handler 实现
// 实现 russh::client::Handler trait

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;

use russh::keys::PublicKey;
use tracing::{debug, warn};

use super::error::SshError;
use super::event::FramedPrompt;
use crate::models::HostIdentity;
use crate::services::{HostKeyVerifier, TrustOutcome};

/// SSH 客户端 Handler
/// 握手阶段按 known_hosts 校验服务器公钥
pub struct SshClientHandler {
    /// 主机标识
    host: HostIdentity,
    /// 实际连接的对端地址（经跳板机转发时为 None）
    remote: Option<SocketAddr>,
    /// known_hosts 文件
    known_hosts: PathBuf,
}

impl SshClientHandler {
    /// 创建新的 Handler
    pub fn new(host: HostIdentity, remote: Option<SocketAddr>, known_hosts: PathBuf) -> Self {
        Self {
            host,
            remote,
            known_hosts,
        }
    }
}

impl russh::client::Handler for SshClientHandler {
    type Error = SshError;

    /// 检查服务器公钥
    /// 确认需要阻塞读取标准输入，放到 blocking 线程中执行
    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        debug!(
            "[SSH] Server key for {}: {} {}",
            self.host.friendly,
            server_public_key.algorithm(),
            server_public_key.fingerprint(russh::keys::ssh_key::HashAlg::Sha256)
        );

        let host = self.host.clone();
        let remote = self.remote;
        let known_hosts = self.known_hosts.clone();
        let key = server_public_key.clone();

        async move {
            let outcome = tokio::task::spawn_blocking(move || {
                HostKeyVerifier::new(known_hosts, FramedPrompt::stdio()).verify(
                    &host,
                    remote.as_ref(),
                    &key,
                )
            })
            .await
            .map_err(|e| SshError::Protocol(format!("host key check aborted: {}", e)))??;

            if let TrustOutcome::Accepted {
                persist_error: Some(e),
            } = outcome
            {
                warn!("[SSH] Host key accepted but not saved: {}", e);
            }
            Ok(true)
        }
    }
}

// SSH 错误类型定义

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// SSH 错误类型
#[derive(Debug, Error)]
pub enum SshError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO 错误（网络连接等）
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// 认证失败
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// SSH 协议错误
    #[error("SSH protocol error: {0}")]
    Protocol(String),

    /// 跳板机错误
    #[error("Jump host error: {0}")]
    JumpHost(String),

    /// 连接超时
    #[error("Connection timeout after {0}s")]
    Timeout(u64),

    /// 通道错误
    #[error("Channel error: {0}")]
    Channel(String),

    /// 主机公钥校验失败
    #[error("Host key verification failed: {0}")]
    HostKey(#[from] TrustError),

    /// 输入转发失败
    #[error("Input forwarding failed: {0}")]
    Forward(#[from] ForwardError),
}

impl From<russh::Error> for SshError {
    fn from(e: russh::Error) -> Self {
        SshError::Protocol(e.to_string())
    }
}

/// 主机公钥信任判定错误
#[derive(Debug, Error)]
pub enum TrustError {
    /// 用户拒绝了该公钥
    #[error("user rejected host key for {host}")]
    Rejected { host: String },

    /// 打开或扫描 known_hosts 失败
    #[error("failed to {op} known_hosts file {}: {source}", .path.display())]
    Store {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// 与前端交换确认消息失败
    #[error("failed to {op} host key confirmation: {source}")]
    Prompt {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    /// 事件编码失败
    #[error("failed to build host key event: {0}")]
    Event(String),
}

/// 写入 known_hosts 失败（不影响本次已确认的连接）
#[derive(Debug, Error)]
pub enum TrustStoreError {
    #[error("failed to {op} known_hosts file: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("failed to encode public key: {0}")]
    Encode(String),
}

impl TrustStoreError {
    pub fn io(op: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Io { op, source }
    }
}

/// 输入转发循环错误
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("failed to read from input: {0}")]
    Read(#[source] io::Error),

    #[error("session input closed")]
    Closed,
}

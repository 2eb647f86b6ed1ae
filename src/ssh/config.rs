// SSH 连接配置

use std::sync::Arc;
use std::time::Duration;

use russh::keys::PrivateKey;

use crate::constants::{DEFAULT_KEEPALIVE_SECS, DEFAULT_SSH_PORT, DEFAULT_TIMEOUT_SECS};

/// SSH 连接配置
#[derive(Clone, Debug)]
pub struct SshConfig {
    /// 目标主机
    pub host: String,
    /// 端口
    pub port: u16,
    /// 用户名
    pub username: String,
    /// 认证方式，按顺序尝试
    pub auth: Vec<AuthMethod>,
    /// 连接超时（秒）
    pub connect_timeout: u64,
    /// 跳板机配置
    pub jump_host: Option<JumpHostConfig>,
    /// 心跳配置
    pub keepalive: KeepaliveConfig,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_SSH_PORT,
            username: String::new(),
            auth: Vec::new(),
            connect_timeout: DEFAULT_TIMEOUT_SECS,
            jump_host: None,
            keepalive: KeepaliveConfig::default(),
        }
    }
}

/// 认证方式
#[derive(Clone)]
pub enum AuthMethod {
    /// 密码认证
    Password(String),
    /// 公钥认证（已加载的私钥）
    PublicKey(Arc<PrivateKey>),
}

impl std::fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => f.write_str("Password(***)"),
            Self::PublicKey(key) => write!(f, "PublicKey({})", key.algorithm()),
        }
    }
}

impl AuthMethod {
    /// 日志中使用的名称
    pub fn name(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PublicKey(_) => "publickey",
        }
    }
}

/// 跳板机配置
#[derive(Clone, Debug)]
pub struct JumpHostConfig {
    /// 跳板机主机
    pub host: String,
    /// 跳板机端口
    pub port: u16,
    /// 用户名
    pub username: String,
    /// 认证方式
    pub auth: Vec<AuthMethod>,
}

/// 心跳配置
#[derive(Clone, Debug)]
pub struct KeepaliveConfig {
    /// 是否启用心跳
    pub enabled: bool,
    /// 心跳间隔（秒）
    pub interval: u64,
    /// 最大重试次数
    pub max_retries: u32,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_KEEPALIVE_SECS,
            max_retries: 3,
        }
    }
}

impl KeepaliveConfig {
    /// 间隔为 0 时关闭心跳
    pub fn from_interval(interval: u64) -> Self {
        Self {
            enabled: interval > 0,
            interval,
            ..Self::default()
        }
    }
}

/// russh 客户端配置构建
impl SshConfig {
    /// 构建 russh 配置
    pub fn to_russh_config(&self) -> russh::client::Config {
        let mut config = russh::client::Config::default();
        if self.keepalive.enabled {
            config.keepalive_interval = Some(Duration::from_secs(self.keepalive.interval));
            config.keepalive_max = self.keepalive.max_retries as usize;
        }
        config
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keepalive_from_interval() {
        let config = SshConfig {
            keepalive: KeepaliveConfig::from_interval(15),
            ..SshConfig::default()
        };
        let russh_config = config.to_russh_config();
        assert_eq!(russh_config.keepalive_interval, Some(Duration::from_secs(15)));
        assert_eq!(russh_config.keepalive_max, 3);

        let config = SshConfig {
            keepalive: KeepaliveConfig::from_interval(0),
            ..SshConfig::default()
        };
        assert!(!config.keepalive.enabled);
        assert_eq!(config.to_russh_config().keepalive_interval, None);
    }

    #[test]
    fn test_password_is_not_logged() {
        let method = AuthMethod::Password("hunter2".to_string());
        assert_eq!(format!("{:?}", method), "Password(***)");
        assert_eq!(method.name(), "password");
    }
}

// Settings 配置数据结构

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{self, DEFAULT_KEEPALIVE_SECS, DEFAULT_TIMEOUT_SECS, DEFAULT_USER};

// ======================== 主配置结构 ========================

/// 应用设置（持久化用）
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    pub connection: ConnectionSettings,
    pub terminal: TerminalSettings,
}

// ======================== 连接 ========================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub default_user: String,
    pub connection_timeout_secs: u32,
    /// 0 表示关闭心跳
    pub keepalive_interval_secs: u32,
    /// 覆盖默认的 ~/.ssh/known_hosts
    pub known_hosts_file: Option<PathBuf>,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            default_user: DEFAULT_USER.to_string(),
            connection_timeout_secs: DEFAULT_TIMEOUT_SECS as u32,
            keepalive_interval_secs: DEFAULT_KEEPALIVE_SECS as u32,
            known_hosts_file: None,
        }
    }
}

// ======================== 终端 ========================

/// 远端 PTY 的初始参数，前端会随后发送实际尺寸
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminalSettings {
    pub term: String,
    pub rows: u32,
    pub cols: u32,
}

impl Default for TerminalSettings {
    fn default() -> Self {
        Self {
            term: constants::terminal::TERM.to_string(),
            rows: constants::terminal::ROWS,
            cols: constants::terminal::COLS,
        }
    }
}

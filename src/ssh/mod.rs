// SSH 连接模块
//
// 模块结构:
// - config: 连接配置 (SshConfig, AuthMethod, JumpHostConfig)
// - error: 错误类型 (SshError, TrustError)
// - event: 前端事件帧与主机公钥确认 (HostKeyEvent, FramedPrompt)
// - handler: russh Handler 实现，负责 known_hosts 校验
// - client: SSH 客户端核心（直连或经跳板机）
// - session: 交互式 Shell 会话

pub mod client;
pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod session;

// 公开导出
pub use client::SshClient;
pub use config::{AuthMethod, JumpHostConfig, KeepaliveConfig, SshConfig};
pub use session::PtyRequest;

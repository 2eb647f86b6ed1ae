// 前端事件协议
//
// 帧格式: 0x02 + 事件名 + (0x1F + JSON 载荷)? + 0x03
// 前端收到 hostKeyNew / hostKeyChanged 后回复一行，首字节决定接受或拒绝

use std::io::{self, Read, Stdin, Stdout, Write};

use russh::keys::PublicKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::TrustError;
use crate::constants::DEFAULT_BUFFER_SIZE;
use crate::models::known_hosts::{fingerprint, openssh_key_text};

/// ASCII Start of Text
pub const EVENT_START: u8 = 0x02;
/// ASCII End of Text
pub const EVENT_END: u8 = 0x03;
/// ASCII Unit Separator
pub const EVENT_SEPARATOR: u8 = 0x1f;

/// 确认回复中表示接受的首字节
const ACCEPT_BYTES: &[u8] = b"yY1\r\n";

/// 事件名
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventName {
    /// 从未见过的主机
    HostKeyNew,
    /// 已知主机换了公钥
    HostKeyChanged,
    /// 从此开始透传 stdin/stdout/stderr
    SshStart,
}

impl EventName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HostKeyNew => "hostKeyNew",
            Self::HostKeyChanged => "hostKeyChanged",
            Self::SshStart => "sshStart",
        }
    }
}

/// 组装一帧事件
pub fn build_event<T: Serialize>(
    name: EventName,
    payload: Option<&T>,
) -> Result<Vec<u8>, serde_json::Error> {
    let mut data = vec![EVENT_START];
    data.extend_from_slice(name.as_str().as_bytes());
    if let Some(payload) = payload {
        data.push(EVENT_SEPARATOR);
        data.extend_from_slice(&serde_json::to_vec(payload)?);
    }
    data.push(EVENT_END);
    Ok(data)
}

/// 会话开始事件（无载荷）
pub fn start_event() -> Vec<u8> {
    let mut data = vec![EVENT_START];
    data.extend_from_slice(EventName::SshStart.as_str().as_bytes());
    data.push(EVENT_END);
    data
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostKeyNewPayload {
    pub host: String,
    pub public_key: String,
    pub fingerprint: String,
    /// 已经使用同一公钥的其他主机
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts_with_same_key: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostKeyChangedPayload {
    pub host: String,
    pub old_public_key: String,
    pub old_fingerprint: String,
    pub new_public_key: String,
    pub new_fingerprint: String,
}

/// 需要用户确认的主机公钥事件
#[derive(Clone, Debug)]
pub enum HostKeyEvent {
    New {
        host: String,
        key: PublicKey,
        hosts_with_same_key: Option<Vec<String>>,
    },
    Changed {
        host: String,
        old_key: PublicKey,
        new_key: PublicKey,
    },
}

impl HostKeyEvent {
    pub fn name(&self) -> EventName {
        match self {
            Self::New { .. } => EventName::HostKeyNew,
            Self::Changed { .. } => EventName::HostKeyChanged,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            Self::New { host, .. } | Self::Changed { host, .. } => host,
        }
    }

    /// 编码为完整帧
    pub fn to_frame(&self) -> Result<Vec<u8>, TrustError> {
        let key_text = |key: &PublicKey| {
            openssh_key_text(key).map_err(|e| TrustError::Event(e.to_string()))
        };

        let frame = match self {
            Self::New {
                host,
                key,
                hosts_with_same_key,
            } => {
                let payload = HostKeyNewPayload {
                    host: host.clone(),
                    public_key: key_text(key)?,
                    fingerprint: fingerprint(key),
                    hosts_with_same_key: hosts_with_same_key.clone(),
                };
                build_event(self.name(), Some(&payload))
            }
            Self::Changed {
                host,
                old_key,
                new_key,
            } => {
                let payload = HostKeyChangedPayload {
                    host: host.clone(),
                    old_public_key: key_text(old_key)?,
                    old_fingerprint: fingerprint(old_key),
                    new_public_key: key_text(new_key)?,
                    new_fingerprint: fingerprint(new_key),
                };
                build_event(self.name(), Some(&payload))
            }
        };

        frame.map_err(|e| TrustError::Event(e.to_string()))
    }
}

/// 主机公钥确认渠道
///
/// 调用会一直阻塞到用户作出选择，超时策略由调用方决定。
pub trait HostKeyPrompt {
    /// 返回 true 表示用户接受
    fn confirm(&mut self, event: &HostKeyEvent) -> Result<bool, TrustError>;
}

/// 通过字节流与前端交换确认消息
pub struct FramedPrompt<R, W> {
    reader: R,
    writer: W,
}

impl<R: Read, W: Write> FramedPrompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl FramedPrompt<Stdin, Stdout> {
    /// 使用进程的标准输入输出
    pub fn stdio() -> Self {
        Self::new(io::stdin(), io::stdout())
    }
}

impl<R: Read, W: Write> HostKeyPrompt for FramedPrompt<R, W> {
    fn confirm(&mut self, event: &HostKeyEvent) -> Result<bool, TrustError> {
        let frame = event.to_frame()?;
        self.writer
            .write_all(&frame)
            .and_then(|_| self.writer.flush())
            .map_err(|source| TrustError::Prompt {
                op: "send",
                source,
            })?;

        debug!(
            "[HostKey] Waiting for confirmation of {} ({})",
            event.host(),
            event.name().as_str()
        );

        let mut reply = [0u8; DEFAULT_BUFFER_SIZE];
        let n = self
            .reader
            .read(&mut reply)
            .map_err(|source| TrustError::Prompt {
                op: "read",
                source,
            })?;

        let accepted = n > 0 && ACCEPT_BYTES.contains(&reply[0]);
        info!(
            "[HostKey] Host key for {} {}",
            event.host(),
            if accepted { "accepted" } else { "rejected" }
        );
        Ok(accepted)
    }
}

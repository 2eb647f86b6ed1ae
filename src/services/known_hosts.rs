// known_hosts 信任库
//
// 每次连接打开一次文件：扫描 -> (需要时) 请求用户确认 -> 原地更新 -> 关闭

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, SeekFrom};
use std::iter;
use std::net::SocketAddr;
use std::path::PathBuf;

use russh::keys::PublicKey;
use tracing::{debug, info, warn};

use super::splice::{splice, SpliceTarget};
use crate::constants::DEFAULT_BUFFER_SIZE;
use crate::models::known_hosts::{address_identity, format_known_host_line};
use crate::models::{HostIdentity, KnownHostLine, Span, Verdict};
use crate::ssh::error::{TrustError, TrustStoreError};
use crate::ssh::event::{HostKeyEvent, HostKeyPrompt};

/// 顺序扫描 known_hosts，找出第一条相关的行
///
/// `host_id` 或 `addr_id` 出现在行内且算法相同视为主机匹配；公钥字节相同视为公钥匹配。
/// 无法解析的行跳过，但仍计入字节偏移。
pub fn classify<R: BufRead>(
    mut reader: R,
    host_id: &str,
    addr_id: Option<&str>,
    key: &PublicKey,
) -> io::Result<Verdict> {
    let mut offset = 0u64;
    let mut line = Vec::new();

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line)?;
        if n == 0 {
            break;
        }

        let span = Span::new(offset, offset + n as u64);
        offset = span.end;

        let Ok(text) = std::str::from_utf8(&line) else {
            continue;
        };
        let Some(entry) = KnownHostLine::parse(text) else {
            continue;
        };

        let host_match = (entry.contains_host(host_id)
            || addr_id.is_some_and(|addr| entry.contains_host(addr)))
            && entry.key.algorithm() == key.algorithm();
        let key_match = entry.key.key_data() == key.key_data();

        match (host_match, key_match) {
            (true, true) => return Ok(Verdict::PerfectMatch),
            (true, false) => {
                return Ok(Verdict::KeyChanged {
                    old_key: entry.key,
                    hosts: entry.hosts,
                    span,
                })
            }
            (false, true) => {
                return Ok(Verdict::SameKeyDifferentHost {
                    siblings: entry.hosts,
                    span,
                })
            }
            (false, false) => {}
        }
    }

    Ok(Verdict::NewHost {
        span: Span::at(offset),
    })
}

/// 按判定结果更新 known_hosts
///
/// - NewHost: 在文件末尾追加一行，必要时先补上换行符
/// - SameKeyDifferentHost: 原行追加新主机
/// - KeyChanged: 原行改写为仅包含该主机的新公钥
pub fn commit<T: SpliceTarget>(
    target: &mut T,
    host_id: &str,
    key: &PublicKey,
    verdict: &Verdict,
    buf_size: usize,
) -> Result<(), TrustStoreError> {
    let (hosts, span): (Vec<&str>, Span) = match verdict {
        Verdict::PerfectMatch => return Ok(()),
        Verdict::NewHost { span } | Verdict::KeyChanged { span, .. } => (vec![host_id], *span),
        Verdict::SameKeyDifferentHost { siblings, span } => (
            siblings
                .iter()
                .map(String::as_str)
                .chain(iter::once(host_id))
                .collect(),
            *span,
        ),
    };

    let line = format_known_host_line(&hosts, key)
        .map_err(|e| TrustStoreError::Encode(e.to_string()))?;
    let mut replacement = line.into_bytes();

    let size = target.byte_len().map_err(TrustStoreError::io("stat"))?;
    if span.is_empty() && span.start == size && size > 0 {
        // 最后一行没有换行符时不能直接追加
        let mut last = [0u8; 1];
        target
            .seek(SeekFrom::Start(size - 1))
            .and_then(|_| target.read_exact(&mut last))
            .map_err(TrustStoreError::io("read final byte of"))?;
        if last[0] != b'\n' {
            replacement.insert(0, b'\n');
        }
    }

    splice(target, span, &replacement, buf_size).map_err(TrustStoreError::io("update"))
}

/// 信任判定结果
#[derive(Debug)]
pub enum TrustOutcome {
    /// 已在 known_hosts 中
    Known,
    /// 用户确认接受；写入失败时附带错误，但连接照常进行
    Accepted {
        persist_error: Option<TrustStoreError>,
    },
}

/// 主机公钥校验器
pub struct HostKeyVerifier<P> {
    store_path: PathBuf,
    prompt: P,
    buf_size: usize,
}

impl<P: HostKeyPrompt> HostKeyVerifier<P> {
    pub fn new(store_path: impl Into<PathBuf>, prompt: P) -> Self {
        Self {
            store_path: store_path.into(),
            prompt,
            buf_size: DEFAULT_BUFFER_SIZE,
        }
    }

    #[cfg(test)]
    fn with_buffer_size(mut self, buf_size: usize) -> Self {
        self.buf_size = buf_size;
        self
    }

    /// 校验对端公钥
    ///
    /// `remote` 为实际连接的对端地址；经跳板机转发时没有该地址。
    pub fn verify(
        &mut self,
        host: &HostIdentity,
        remote: Option<&SocketAddr>,
        key: &PublicKey,
    ) -> Result<TrustOutcome, TrustError> {
        let mut file = self.open_store()?;
        self.verify_in(&mut file, host, remote, key)
    }

    /// 在已打开的存储上完成扫描、确认和写回
    fn verify_in<T: SpliceTarget>(
        &mut self,
        store: &mut T,
        host: &HostIdentity,
        remote: Option<&SocketAddr>,
        key: &PublicKey,
    ) -> Result<TrustOutcome, TrustError> {
        let addr_id = remote.map(address_identity);
        let verdict = classify(
            BufReader::new(&mut *store),
            &host.raw,
            addr_id.as_deref(),
            key,
        )
        .map_err(|source| TrustError::Store {
            op: "read",
            path: self.store_path.clone(),
            source,
        })?;

        let event = match &verdict {
            Verdict::PerfectMatch => {
                debug!("[KnownHosts] {} matches a known host key", host.friendly);
                return Ok(TrustOutcome::Known);
            }
            Verdict::NewHost { .. } => HostKeyEvent::New {
                host: host.friendly.clone(),
                key: key.clone(),
                hosts_with_same_key: None,
            },
            Verdict::SameKeyDifferentHost { siblings, .. } => HostKeyEvent::New {
                host: host.friendly.clone(),
                key: key.clone(),
                hosts_with_same_key: Some(siblings.clone()),
            },
            Verdict::KeyChanged { old_key, .. } => {
                warn!(
                    "[KnownHosts] Host key for {} has changed since last connection",
                    host.friendly
                );
                HostKeyEvent::Changed {
                    host: host.friendly.clone(),
                    old_key: old_key.clone(),
                    new_key: key.clone(),
                }
            }
        };

        if !self.prompt.confirm(&event)? {
            return Err(TrustError::Rejected {
                host: host.friendly.clone(),
            });
        }

        if let Verdict::KeyChanged { hosts, .. } = &verdict {
            let dropped: Vec<&str> = hosts
                .iter()
                .map(String::as_str)
                .filter(|h| *h != host.raw)
                .collect();
            if !dropped.is_empty() {
                warn!(
                    "[KnownHosts] Rewriting key for {} removes {} from that entry",
                    host.raw,
                    dropped.join(",")
                );
            }
        }

        let persist_error = match commit(store, &host.raw, key, &verdict, self.buf_size) {
            Ok(()) => {
                info!(
                    "[KnownHosts] Saved host key for {} to {}",
                    host.raw,
                    self.store_path.display()
                );
                None
            }
            Err(e) => {
                warn!("[KnownHosts] Failed to update known_hosts file: {}", e);
                Some(e)
            }
        };

        Ok(TrustOutcome::Accepted { persist_error })
    }

    /// 打开（不存在时创建）known_hosts
    fn open_store(&self) -> Result<File, TrustError> {
        let store_error = |op, source| TrustError::Store {
            op,
            path: self.store_path.clone(),
            source,
        };

        if let Some(parent) = self.store_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(|e| store_error("create directory for", e))?;
            }
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        options
            .open(&self.store_path)
            .map_err(|e| store_error("open", e))
    }
}

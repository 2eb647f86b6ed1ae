// Known Hosts 数据模型
// 与 OpenSSH known_hosts 文本格式兼容：每行 `host1,host2 <algorithm> <base64>`

use std::net::SocketAddr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use russh::keys::ssh_key::{self, HashAlg};
use russh::keys::PublicKey;

use crate::constants::DEFAULT_SSH_PORT;

/// 主机标识
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostIdentity {
    /// 写入 known_hosts 的形式，非默认端口为 `[host]:port`
    pub raw: String,
    /// 展示给用户的形式，非默认端口为 `host:port`
    pub friendly: String,
}

impl HostIdentity {
    pub fn new(host: &str, port: u16) -> Self {
        if port == DEFAULT_SSH_PORT {
            Self {
                raw: host.to_string(),
                friendly: host.to_string(),
            }
        } else {
            let friendly = if host.contains(':') {
                format!("[{}]:{}", host, port)
            } else {
                format!("{}:{}", host, port)
            };
            Self {
                raw: format!("[{}]:{}", host, port),
                friendly,
            }
        }
    }
}

/// 对端地址在 known_hosts 中的写法
pub fn address_identity(addr: &SocketAddr) -> String {
    if addr.port() == DEFAULT_SSH_PORT {
        addr.ip().to_string()
    } else {
        format!("[{}]:{}", addr.ip(), addr.port())
    }
}

/// 文件中的字节区间 [start, end)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: u64,
    pub end: u64,
}

impl Span {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// 空区间，表示插入点
    pub fn at(offset: u64) -> Self {
        Self::new(offset, offset)
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// 查询 known_hosts 的结论
#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    /// 主机和公钥都匹配
    PerfectMatch,
    /// 从未见过，`span` 为文件末尾的插入点
    NewHost { span: Span },
    /// 其他主机已经在用同一把公钥，该行会追加新主机
    SameKeyDifferentHost { siblings: Vec<String>, span: Span },
    /// 已知主机换了公钥，`hosts` 为原行上的全部主机
    KeyChanged {
        old_key: PublicKey,
        hosts: Vec<String>,
        span: Span,
    },
}

/// known_hosts 中解析成功的一行
#[derive(Clone, Debug)]
pub struct KnownHostLine {
    pub hosts: Vec<String>,
    pub key: PublicKey,
}

impl KnownHostLine {
    /// 解析一行，空行和格式错误的行返回 None
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }

        let (hosts, key) = line.split_once(' ')?;
        let key = PublicKey::from_openssh(key.trim()).ok()?;

        Some(Self {
            hosts: hosts.split(',').map(str::to_string).collect(),
            key,
        })
    }

    pub fn contains_host(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h == host)
    }
}

/// 公钥的 OpenSSH 文本形式（不含注释）
pub fn openssh_key_text(key: &PublicKey) -> Result<String, ssh_key::Error> {
    let blob = key.to_bytes()?;
    Ok(format!("{} {}", key.algorithm().as_str(), STANDARD.encode(blob)))
}

/// SHA256 指纹
pub fn fingerprint(key: &PublicKey) -> String {
    key.fingerprint(HashAlg::Sha256).to_string()
}

/// 生成一整行（带换行符）
pub fn format_known_host_line<S: AsRef<str>>(
    hosts: &[S],
    key: &PublicKey,
) -> Result<String, ssh_key::Error> {
    let hosts = hosts.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(",");
    Ok(format!("{} {}\n", hosts, openssh_key_text(key)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GITHUB_KEY: &str =
        "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIOMqqnkVzrm0SdG6UOoqKLsabgH5C9okWi0dh2l9GKJl";

    #[test]
    fn test_host_identity() {
        let cases = [
            ("candinya.com", 22, "candinya.com", "candinya.com"),
            ("candinya.com", 2233, "[candinya.com]:2233", "candinya.com:2233"),
            ("192.168.0.1", 22, "192.168.0.1", "192.168.0.1"),
            ("192.168.0.1", 2233, "[192.168.0.1]:2233", "192.168.0.1:2233"),
            ("fe80::1", 22, "fe80::1", "fe80::1"),
            ("fe80::1", 2233, "[fe80::1]:2233", "[fe80::1]:2233"),
        ];
        for (host, port, raw, friendly) in cases {
            let id = HostIdentity::new(host, port);
            assert_eq!(id.raw, raw);
            assert_eq!(id.friendly, friendly);
        }
    }

    #[test]
    fn test_address_identity() {
        let addr: SocketAddr = "192.168.3.117:22".parse().unwrap();
        assert_eq!(address_identity(&addr), "192.168.3.117");
        let addr: SocketAddr = "192.168.3.117:2233".parse().unwrap();
        assert_eq!(address_identity(&addr), "[192.168.3.117]:2233");
        let addr: SocketAddr = "[fe80::1]:2233".parse().unwrap();
        assert_eq!(address_identity(&addr), "[fe80::1]:2233");
    }

    #[test]
    fn test_parse_line() {
        let line = KnownHostLine::parse(&format!("github.com,[1.2.3.4]:2222 {}\r\n", GITHUB_KEY))
            .unwrap();
        assert_eq!(line.hosts, vec!["github.com", "[1.2.3.4]:2222"]);
        assert!(line.contains_host("[1.2.3.4]:2222"));
        assert!(!line.contains_host("1.2.3.4"));

        assert!(KnownHostLine::parse("").is_none());
        assert!(KnownHostLine::parse("   ").is_none());
        assert!(KnownHostLine::parse("github.com").is_none());
        assert!(KnownHostLine::parse("github.com ssh-ed25519 not-base64").is_none());
        assert!(KnownHostLine::parse("# comment line").is_none());
    }

    #[test]
    fn test_format_line_round_trips_key_text() {
        let key = PublicKey::from_openssh(GITHUB_KEY).unwrap();
        assert_eq!(openssh_key_text(&key).unwrap(), GITHUB_KEY);
        assert_eq!(
            format_known_host_line(&["github.com", "[example.com]:2233"], &key).unwrap(),
            format!("github.com,[example.com]:2233 {}\n", GITHUB_KEY)
        );
        assert!(fingerprint(&key).starts_with("SHA256:"));
    }
}

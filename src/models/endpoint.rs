// 连接目标解析
// 格式: [user[:password]@]host[:port]

use std::fmt;

use thiserror::Error;

use crate::constants::DEFAULT_SSH_PORT;

/// 地址解析错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("invalid server port {0:?}")]
    InvalidPort(String),

    #[error("missing host in {0:?}")]
    EmptyHost(String),

    #[error("unclosed bracket in {0:?}")]
    UnclosedBracket(String),
}

/// 连接目标
///
/// `host` 内部始终不带方括号（IPv6 字面量也一样），只在序列化为
/// 带非默认端口的地址时重新加上。用户名和密码为 `None` 表示未指定，
/// `Some("")` 表示显式给出了空值。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub username: Option<String>,
    pub password: Option<String>,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    /// 解析连接字符串
    pub fn parse(input: &str) -> Result<Self, EndpointError> {
        // 密码里可能含有 '@'，以最后一个为分界
        let (user_info, server) = match input.rsplit_once('@') {
            Some((user_info, server)) => (Some(user_info), server),
            None => (None, input),
        };

        let (username, password) = match user_info {
            Some(info) => match info.split_once(':') {
                Some((user, pass)) => (Some(user.to_string()), Some(pass.to_string())),
                None => (Some(info.to_string()), None),
            },
            None => (None, None),
        };

        let (host, port) = if let Some(rest) = server.strip_prefix('[') {
            // [fe80::1] 或 [fe80::1]:2233
            let (host, tail) = rest
                .split_once(']')
                .ok_or_else(|| EndpointError::UnclosedBracket(server.to_string()))?;
            let port = if tail.is_empty() {
                DEFAULT_SSH_PORT
            } else {
                let port = tail
                    .strip_prefix(':')
                    .ok_or_else(|| EndpointError::InvalidPort(tail.to_string()))?;
                parse_port(port)?
            };
            (host, port)
        } else if server.matches(':').count() > 1 {
            // 不带方括号的 IPv6，无法携带端口
            (server, DEFAULT_SSH_PORT)
        } else {
            match server.split_once(':') {
                Some((host, port)) => (host, parse_port(port)?),
                None => (server, DEFAULT_SSH_PORT),
            }
        };

        if host.is_empty() {
            return Err(EndpointError::EmptyHost(input.to_string()));
        }

        Ok(Self {
            username,
            password,
            host: host.to_string(),
            port,
        })
    }

    /// 覆盖端口
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// 用户名（未指定时使用给定的默认值）
    pub fn username_or(&self, default: &str) -> String {
        self.username.clone().unwrap_or_else(|| default.to_string())
    }

    pub fn is_ipv6_literal(&self) -> bool {
        self.host.contains(':')
    }
}

fn parse_port(port: &str) -> Result<u16, EndpointError> {
    port.parse::<u16>()
        .map_err(|_| EndpointError::InvalidPort(port.to_string()))
}

/// 只输出地址部分，不包含用户名和密码
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.port == DEFAULT_SSH_PORT {
            write!(f, "{}", self.host)
        } else if self.is_ipv6_literal() {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(user: Option<&str>, pass: Option<&str>, host: &str, port: u16) -> Endpoint {
        Endpoint {
            username: user.map(str::to_string),
            password: pass.map(str::to_string),
            host: host.to_string(),
            port,
        }
    }

    #[test]
    fn test_parse_host_and_port() {
        let cases = [
            ("candinya.com:2233", endpoint(None, None, "candinya.com", 2233)),
            ("candinya.com", endpoint(None, None, "candinya.com", 22)),
            ("127.0.0.1:2233", endpoint(None, None, "127.0.0.1", 2233)),
            ("127.0.0.1", endpoint(None, None, "127.0.0.1", 22)),
            ("[fe80::1]:2233", endpoint(None, None, "fe80::1", 2233)),
            ("[fe80::1]", endpoint(None, None, "fe80::1", 22)),
            ("fe80::1", endpoint(None, None, "fe80::1", 22)),
        ];
        for (input, want) in cases {
            assert_eq!(Endpoint::parse(input).unwrap(), want, "input {input:?}");
        }
    }

    #[test]
    fn test_parse_user_info() {
        let cases = [
            (
                "candinya@candinya.com:2233",
                endpoint(Some("candinya"), None, "candinya.com", 2233),
            ),
            (
                "candinya@candinya.com",
                endpoint(Some("candinya"), None, "candinya.com", 22),
            ),
            (
                "candinya:password@127.0.0.1:2233",
                endpoint(Some("candinya"), Some("password"), "127.0.0.1", 2233),
            ),
            (
                "candinya:password@[fe80::1]",
                endpoint(Some("candinya"), Some("password"), "fe80::1", 22),
            ),
            (
                "candinya:pass:word@candinya.com",
                endpoint(Some("candinya"), Some("pass:word"), "candinya.com", 22),
            ),
            (
                "candinya:p@ss@candinya.com",
                endpoint(Some("candinya"), Some("p@ss"), "candinya.com", 22),
            ),
        ];
        for (input, want) in cases {
            assert_eq!(Endpoint::parse(input).unwrap(), want, "input {input:?}");
        }
    }

    #[test]
    fn test_empty_user_info_is_not_absent() {
        let parsed = Endpoint::parse(":@example.com").unwrap();
        assert_eq!(parsed.username.as_deref(), Some(""));
        assert_eq!(parsed.password.as_deref(), Some(""));

        let parsed = Endpoint::parse("example.com").unwrap();
        assert_eq!(parsed.username, None);
        assert_eq!(parsed.password, None);
        assert_eq!(parsed.username_or("root"), "root");
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            Endpoint::parse("example.com:ssh"),
            Err(EndpointError::InvalidPort("ssh".to_string()))
        );
        assert_eq!(
            Endpoint::parse("example.com:70000"),
            Err(EndpointError::InvalidPort("70000".to_string()))
        );
        assert_eq!(
            Endpoint::parse("[fe80::1]2233"),
            Err(EndpointError::InvalidPort("2233".to_string()))
        );
        assert!(matches!(
            Endpoint::parse("[fe80::1"),
            Err(EndpointError::UnclosedBracket(_))
        ));
        assert!(matches!(
            Endpoint::parse("user@"),
            Err(EndpointError::EmptyHost(_))
        ));
        assert!(matches!(
            Endpoint::parse(":22"),
            Err(EndpointError::EmptyHost(_))
        ));
    }

    #[test]
    fn test_display() {
        let cases = [
            ("user:secret@example.com", "example.com"),
            ("example.com:2233", "example.com:2233"),
            ("[fe80::1]", "fe80::1"),
            ("[fe80::1]:2233", "[fe80::1]:2233"),
        ];
        for (input, want) in cases {
            assert_eq!(Endpoint::parse(input).unwrap().to_string(), want);
        }
        let overridden = Endpoint::parse("fe80::1").unwrap().with_port(2200);
        assert_eq!(overridden.to_string(), "[fe80::1]:2200");
    }
}

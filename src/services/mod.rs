// 服务层：信任库、密钥发现、本地配置

pub mod identity;
pub mod known_hosts;
pub mod splice;
pub mod storage;

pub use known_hosts::{HostKeyVerifier, TrustOutcome};

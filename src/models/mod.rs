// 数据模型模块

pub mod endpoint;
pub mod known_hosts;
pub mod settings;

pub use endpoint::Endpoint;
pub use known_hosts::{HostIdentity, KnownHostLine, Span, Verdict};
pub use settings::AppSettings;

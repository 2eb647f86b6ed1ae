// 命令行参数
// pipessh [-p PORT] [-J JUMP] [-i IDENTITY] [-o KEY=VALUE]... DESTINATION

use std::path::PathBuf;

use clap::Parser;
use tracing::debug;

use crate::models::Endpoint;

/// SSH client that speaks a framed event protocol over stdio
#[derive(Debug, Parser)]
#[command(name = "pipessh")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// SSH server port (overrides the port in DESTINATION)
    #[arg(short = 'p', value_name = "PORT")]
    pub port: Option<u16>,

    /// Connect through a jump server
    #[arg(short = 'J', value_name = "JUMP", value_parser = Endpoint::parse)]
    pub jump: Option<Endpoint>,

    /// Authenticate with a specific private key
    #[arg(short = 'i', value_name = "IDENTITY")]
    pub identity: Option<PathBuf>,

    /// SSH options in KEY=VALUE form
    #[arg(short = 'o', value_name = "KEY=VALUE")]
    pub options: Vec<String>,

    /// [user[:password]@]host[:port]
    #[arg(value_name = "DESTINATION", value_parser = Endpoint::parse)]
    pub destination: Endpoint,
}

/// 从 `-o` 中解析出的选项
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SshOptions {
    pub user_known_hosts_file: Option<PathBuf>,
}

impl SshOptions {
    /// 后出现的同名选项覆盖先前的
    pub fn parse<S: AsRef<str>>(options: &[S]) -> Self {
        let mut parsed = Self::default();
        for option in options {
            let option = option.as_ref();
            let Some((key, value)) = option.split_once('=') else {
                debug!("[Cli] Skipping malformed option {:?}", option);
                continue;
            };
            if key.eq_ignore_ascii_case("UserKnownHostsFile") {
                parsed.user_known_hosts_file = Some(PathBuf::from(value));
            } else {
                debug!("[Cli] Ignoring unsupported option {}", key);
            }
        }
        parsed
    }
}

impl Cli {
    /// 最终的目标地址（已应用 `-p`）
    pub fn target(&self) -> Endpoint {
        match self.port {
            Some(port) => self.destination.clone().with_port(port),
            None => self.destination.clone(),
        }
    }

    pub fn ssh_options(&self) -> SshOptions {
        SshOptions::parse(&self.options)
    }
}

// pipessh - 面向前端程序的 SSH 客户端
// 应用入口
//
// stdout 承载事件帧和远端输出，日志一律写到 stderr

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

mod cli;
mod constants;
mod models;
mod services;
mod ssh;
mod terminal;

use cli::Cli;
use models::{AppSettings, Endpoint};
use services::{identity, storage};
use ssh::{AuthMethod, JumpHostConfig, KeepaliveConfig, PtyRequest, SshClient, SshConfig};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // 初始化日志系统
    // 可以通过 RUST_LOG 环境变量控制日志级别，例如：RUST_LOG=debug pipessh host
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false) // 不显示 target（模块路径）
        .with_writer(std::io::stderr)
        .init();

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = runtime.block_on(run(cli));
    // stdin 读取线程可能仍阻塞着，不等待它
    runtime.shutdown_background();

    match result {
        Ok(status) => ExitCode::from(u8::try_from(status).unwrap_or(u8::MAX)),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// 建立连接并转发直到远端退出，返回远端退出码
async fn run(cli: Cli) -> Result<u32> {
    let settings = storage::load_settings().unwrap_or_else(|e| {
        warn!("Failed to load settings, using defaults: {:#}", e);
        AppSettings::default()
    });

    let target = cli.target();
    let username = target.username_or(&settings.connection.default_user);

    let known_hosts = match cli
        .ssh_options()
        .user_known_hosts_file
        .or_else(|| settings.connection.known_hosts_file.clone())
    {
        Some(path) => path,
        None => storage::default_known_hosts_file()?,
    };

    let key_paths = identity::discover_private_keys(cli.identity.as_deref(), &ssh_dir(&cli)?)?;
    let keys: Vec<_> = identity::load_private_keys(&key_paths)
        .into_iter()
        .map(Arc::new)
        .collect();

    let jump_host = cli.jump.as_ref().map(|jump| JumpHostConfig {
        host: jump.host.clone(),
        port: jump.port,
        username: jump.username_or(&username),
        auth: auth_methods(jump, &keys),
    });

    let config = SshConfig {
        host: target.host.clone(),
        port: target.port,
        username,
        auth: auth_methods(&target, &keys),
        connect_timeout: u64::from(settings.connection.connection_timeout_secs),
        jump_host,
        keepalive: KeepaliveConfig::from_interval(u64::from(
            settings.connection.keepalive_interval_secs,
        )),
    };

    let session = SshClient::new(config, known_hosts)
        .connect()
        .await
        .with_context(|| format!("failed to connect to {}", target))?;
    let shell = session
        .open_terminal(PtyRequest::from(&settings.terminal))
        .await
        .context("failed to start remote shell")?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&ssh::event::start_event()).await?;
    stdout.flush().await?;
    info!("Session started on {}@{}", session.username(), session.host());

    let (tx, rx) = mpsc::channel(constants::INPUT_QUEUE_CAPACITY);
    tokio::spawn(terminal::forward_input(tokio::io::stdin(), tx));

    match shell.run(rx, stdout, tokio::io::stderr()).await? {
        Some(status) => Ok(status),
        None => {
            warn!("Remote did not report an exit status");
            Ok(1)
        }
    }
}

/// 只在需要扫描默认私钥时才要求主目录存在
fn ssh_dir(cli: &Cli) -> Result<PathBuf> {
    match cli.identity {
        Some(_) => Ok(PathBuf::new()),
        None => storage::get_ssh_dir(),
    }
}

/// 地址中的密码优先，然后依次尝试各私钥
fn auth_methods(endpoint: &Endpoint, keys: &[Arc<russh::keys::PrivateKey>]) -> Vec<AuthMethod> {
    endpoint
        .password
        .iter()
        .map(|password| AuthMethod::Password(password.clone()))
        .chain(keys.iter().cloned().map(AuthMethod::PublicKey))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_methods_order() {
        let endpoint = Endpoint::parse("root:secret@example.com").unwrap();
        let methods = auth_methods(&endpoint, &[]);
        assert_eq!(methods.len(), 1);
        assert!(matches!(&methods[0], AuthMethod::Password(p) if p == "secret"));

        let endpoint = Endpoint::parse("example.com").unwrap();
        assert!(auth_methods(&endpoint, &[]).is_empty());

        // 显式给出的空密码也会尝试
        let endpoint = Endpoint::parse("root:@example.com").unwrap();
        assert!(matches!(&auth_methods(&endpoint, &[])[0], AuthMethod::Password(p) if p.is_empty()));
    }
}

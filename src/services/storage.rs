// 本地数据持久化服务

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::AppSettings;

/// 获取配置目录路径
/// macOS: ~/Library/Application Support/pipessh
/// Linux: ~/.config/pipessh
/// Windows: C:\Users\<用户名>\AppData\Roaming\pipessh
pub fn get_config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("无法获取系统配置目录")?
        .join("pipessh"))
}

/// 用户的 ~/.ssh 目录
pub fn get_ssh_dir() -> Result<PathBuf> {
    Ok(dirs::home_dir().context("无法获取用户主目录")?.join(".ssh"))
}

/// 默认 known_hosts 路径
pub fn default_known_hosts_file() -> Result<PathBuf> {
    Ok(get_ssh_dir()?.join("known_hosts"))
}

// ======================== Settings 配置持久化 ========================

/// 获取设置配置文件路径
pub fn get_settings_file() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("settings.json"))
}

/// 加载应用设置
pub fn load_settings() -> Result<AppSettings> {
    load_settings_from(&get_settings_file()?)
}

/// 从指定文件加载设置，文件不存在时返回默认值
pub fn load_settings_from(path: &Path) -> Result<AppSettings> {
    if !path.exists() {
        return Ok(AppSettings::default());
    }
    let content = fs::read_to_string(path).context("无法读取设置配置文件")?;
    let settings: AppSettings = serde_json::from_str(&content).context("无法解析设置配置文件")?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_settings_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("settings.json")).unwrap();
        assert_eq!(settings.connection.connection_timeout_secs, 30);
    }

    #[test]
    fn test_invalid_settings_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        let err = load_settings_from(&path).unwrap_err();
        assert!(err.to_string().contains("无法解析设置配置文件"));
    }

    #[test]
    fn test_settings_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(
            &path,
            r#"{"connection":{"default_user":"ops","known_hosts_file":"/tmp/kh"},"terminal":{"rows":50}}"#,
        )
        .unwrap();
        let settings = load_settings_from(&path).unwrap();
        assert_eq!(settings.connection.default_user, "ops");
        assert_eq!(
            settings.connection.known_hosts_file,
            Some(PathBuf::from("/tmp/kh"))
        );
        assert_eq!(settings.terminal.rows, 50);
        assert_eq!(settings.terminal.cols, 80);
    }
}

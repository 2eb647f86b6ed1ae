// 私钥发现与加载

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use russh::keys::PrivateKey;
use tracing::{debug, warn};

/// 找出候选私钥
///
/// 指定了 `-i` 时只用该文件；否则取 `ssh_dir` 下所有 `id_*` 且不以 `.pub` 结尾的文件。
pub fn discover_private_keys(explicit: Option<&Path>, ssh_dir: &Path) -> Result<Vec<PathBuf>> {
    if let Some(path) = explicit {
        return Ok(vec![path.to_path_buf()]);
    }

    let entries = match fs::read_dir(ssh_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("[Identity] {} does not exist", ssh_dir.display());
            return Ok(vec![]);
        }
        Err(e) => {
            return Err(e).with_context(|| format!("无法读取密钥目录 {}", ssh_dir.display()))
        }
    };

    let mut keys = Vec::new();
    for entry in entries {
        let entry = entry.context("无法读取密钥目录项")?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with("id_") && !name.ends_with(".pub") {
            keys.push(entry.path());
        }
    }
    keys.sort();

    Ok(keys)
}

/// 加载私钥，失败的跳过并记录
pub fn load_private_keys(paths: &[PathBuf]) -> Vec<PrivateKey> {
    paths
        .iter()
        .filter_map(|path| match russh::keys::load_secret_key(path, None) {
            Ok(key) => {
                debug!("[Identity] Loaded private key {}", path.display());
                Some(key)
            }
            Err(e) => {
                warn!(
                    "[Identity] Failed to load private key {}: {}",
                    path.display(),
                    e
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_filters_candidates() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["id_ed25519", "id_ed25519.pub", "id_rsa", "known_hosts", "config"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("id_dir")).unwrap();

        let keys = discover_private_keys(None, dir.path()).unwrap();
        assert_eq!(
            keys,
            vec![dir.path().join("id_ed25519"), dir.path().join("id_rsa")]
        );
    }

    #[test]
    fn test_explicit_identity_wins() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("id_rsa"), "").unwrap();
        let explicit = PathBuf::from("/keys/deploy");

        let keys = discover_private_keys(Some(&explicit), dir.path()).unwrap();
        assert_eq!(keys, vec![explicit]);
    }

    #[test]
    fn test_missing_ssh_dir_yields_no_keys() {
        let dir = tempfile::tempdir().unwrap();
        let keys = discover_private_keys(None, &dir.path().join("absent")).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_unloadable_keys_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("id_broken");
        fs::write(&path, "not a key").unwrap();
        assert!(load_private_keys(&[path]).is_empty());
    }
}

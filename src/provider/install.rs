//! Provider binary cache
//!
//! Binaries live at `<cache_dir>/<name>/<version>/terraform-provider-<name>_v<version>`.
//! A missing binary is fetched from the HashiCorp releases mirror: the
//! platform zip is checked against the release's `SHA256SUMS` and the
//! provider executable is extracted from it.

use super::ProviderConfig;
use crate::error::ExportError;
use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

pub const DEFAULT_RELEASES_URL: &str = "https://releases.hashicorp.com";

/// Default cache root: `~/.aztfgen/terraform/`
pub fn default_cache_dir() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".aztfgen").join("terraform"))
        .unwrap_or_else(|| PathBuf::from("/root/.aztfgen/terraform"))
}

/// Where the binary for `config` is cached
pub fn binary_path(config: &ProviderConfig) -> PathBuf {
    let mut file_name = format!("terraform-provider-{}_v{}", config.name, config.version);
    if cfg!(windows) {
        file_name.push_str(".exe");
    }
    config
        .cache_dir
        .join(&config.name)
        .join(&config.version)
        .join(file_name)
}

/// Release platform in HashiCorp's `os_arch` naming
pub fn platform() -> String {
    let os = match std::env::consts::OS {
        "macos" => "darwin",
        other => other,
    };
    let arch = match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    };
    format!("{}_{}", os, arch)
}

fn release_base(config: &ProviderConfig) -> String {
    format!(
        "{}/terraform-provider-{}/{}",
        config.releases_url.trim_end_matches('/'),
        config.name,
        config.version
    )
}

pub fn archive_name(config: &ProviderConfig) -> String {
    format!(
        "terraform-provider-{}_{}_{}.zip",
        config.name,
        config.version,
        platform()
    )
}

pub fn archive_url(config: &ProviderConfig) -> String {
    format!("{}/{}", release_base(config), archive_name(config))
}

pub fn checksums_url(config: &ProviderConfig) -> String {
    format!(
        "{}/terraform-provider-{}_{}_SHA256SUMS",
        release_base(config),
        config.name,
        config.version
    )
}

/// Make sure the pinned binary is present, downloading it if needed
pub async fn ensure_binary(config: &ProviderConfig) -> Result<PathBuf> {
    tokio::fs::create_dir_all(&config.cache_dir)
        .await
        .with_context(|| format!("Failed to create cache dir {:?}", config.cache_dir))?;

    let path = binary_path(config);
    if tokio::fs::try_exists(&path).await.unwrap_or(false) {
        tracing::debug!("Using cached provider binary {:?}", path);
        return Ok(path);
    }

    install(config, &path)
        .await
        .map_err(|e| ExportError::ProviderInit(format!("{:#}", e)))?;
    Ok(path)
}

async fn install(config: &ProviderConfig, path: &Path) -> Result<()> {
    let archive = archive_name(config);
    let sums = String::from_utf8(fetch(&checksums_url(config)).await?)
        .context("SHA256SUMS is not text")?;
    let expected = expected_checksum(&sums, &archive)
        .ok_or_else(|| anyhow!("{} is not listed in SHA256SUMS", archive))?;

    let bytes = fetch(&archive_url(config)).await?;
    let actual = format!("{:x}", Sha256::digest(&bytes));
    if !actual.eq_ignore_ascii_case(&expected) {
        return Err(anyhow!(
            "checksum mismatch for {}: expected {}, got {}",
            archive,
            expected,
            actual
        ));
    }

    let prefix = format!("terraform-provider-{}", config.name);
    let binary = tokio::task::spawn_blocking(move || extract(&bytes, &prefix)).await??;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    // Write next to the target and rename so a partial install is never picked up
    let partial = path.with_extension("partial");
    tokio::fs::write(&partial, &binary)
        .await
        .with_context(|| format!("Failed to write {:?}", partial))?;
    set_executable(&partial).await?;
    tokio::fs::rename(&partial, path).await?;

    tracing::info!("Installed provider at {:?} ({} bytes)", path, binary.len());
    Ok(())
}

async fn fetch(url: &str) -> Result<Vec<u8>> {
    tracing::info!("Downloading {}", url);
    let response = reqwest::get(url)
        .await
        .with_context(|| format!("Failed to download {}", url))?;
    let status = response.status();
    if !status.is_success() {
        return Err(anyhow!("download of {} failed: {}", url, status));
    }
    let bytes = response
        .bytes()
        .await
        .with_context(|| format!("Failed to read {}", url))?;
    Ok(bytes.to_vec())
}

/// Hex digest for `file` from a `SHA256SUMS` listing
fn expected_checksum(sums: &str, file: &str) -> Option<String> {
    sums.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        let digest = parts.next()?;
        (parts.next()? == file).then(|| digest.to_string())
    })
}

/// Pull the provider executable out of a release zip
fn extract(archive: &[u8], prefix: &str) -> Result<Vec<u8>> {
    let mut zip = zip::ZipArchive::new(Cursor::new(archive)).context("Invalid provider archive")?;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        if entry.is_dir() || !entry.name().starts_with(prefix) {
            continue;
        }
        let mut binary = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry.read_to_end(&mut binary)?;
        return Ok(binary);
    }
    Err(anyhow!("No {} executable in provider archive", prefix))
}

#[cfg(unix)]
async fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .with_context(|| format!("Failed to mark {:?} executable", path))
}

#[cfg(not(unix))]
async fn set_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(cache_dir: &Path, releases_url: &str) -> ProviderConfig {
        ProviderConfig {
            name: "azurerm".to_string(),
            version: "2.38.0".to_string(),
            config_hcl: "features {}".to_string(),
            cache_dir: cache_dir.to_path_buf(),
            releases_url: releases_url.to_string(),
        }
    }

    fn release_zip(binary: &[u8]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("terraform-provider-azurerm_v2.38.0_x5", zip::write::FileOptions::default())
            .unwrap();
        writer.write_all(binary).unwrap();
        writer.finish().unwrap().into_inner()
    }

    async fn mount_release(server: &MockServer, config: &ProviderConfig, zip: Vec<u8>, digest: String) {
        let base = "/terraform-provider-azurerm/2.38.0";
        Mock::given(method("GET"))
            .and(path(format!("{}/terraform-provider-azurerm_2.38.0_SHA256SUMS", base)))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "0000  terraform-provider-azurerm_2.38.0_other_arch.zip\n{}  {}\n",
                digest,
                archive_name(config)
            )))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{}/{}", base, archive_name(config))))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(zip))
            .mount(server)
            .await;
    }

    #[test]
    fn test_binary_path_is_versioned() {
        let config = config(Path::new("/cache"), DEFAULT_RELEASES_URL);
        let path = binary_path(&config);
        assert!(path.starts_with("/cache/azurerm/2.38.0"));
    }

    #[test]
    fn test_default_release_urls() {
        let config = config(Path::new("/cache"), DEFAULT_RELEASES_URL);
        assert_eq!(
            checksums_url(&config),
            "https://releases.hashicorp.com/terraform-provider-azurerm/2.38.0/terraform-provider-azurerm_2.38.0_SHA256SUMS"
        );
        let url = archive_url(&config);
        assert!(url.starts_with(
            "https://releases.hashicorp.com/terraform-provider-azurerm/2.38.0/terraform-provider-azurerm_2.38.0_"
        ));
        assert!(url.ends_with(&format!("{}.zip", platform())));
    }

    #[test]
    fn test_expected_checksum_picks_the_right_line() {
        let sums = "abc  a.zip\ndef  b.zip\n";
        assert_eq!(expected_checksum(sums, "b.zip").as_deref(), Some("def"));
        assert_eq!(expected_checksum(sums, "c.zip"), None);
    }

    #[tokio::test]
    async fn test_cached_binary_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), "http://127.0.0.1:9");
        let path = binary_path(&config);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"#!/bin/sh\n").unwrap();

        assert_eq!(ensure_binary(&config).await.unwrap(), path);
    }

    #[tokio::test]
    async fn test_release_is_verified_and_extracted() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &server.uri());
        let zip = release_zip(b"provider-binary");
        let digest = format!("{:x}", Sha256::digest(&zip));
        mount_release(&server, &config, zip, digest).await;

        let path = ensure_binary(&config).await.unwrap();
        assert_eq!(path, binary_path(&config));
        assert_eq!(std::fs::read(&path).unwrap(), b"provider-binary");
        assert!(!path.with_extension("partial").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[tokio::test]
    async fn test_checksum_mismatch_is_an_init_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), &server.uri());
        mount_release(&server, &config, release_zip(b"tampered"), "ff".repeat(32)).await;

        let err = ensure_binary(&config).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExportError>(),
            Some(ExportError::ProviderInit(message)) if message.contains("checksum mismatch")
        ));
        assert!(!binary_path(&config).exists());
    }

    #[tokio::test]
    async fn test_unreachable_mirror_is_an_init_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let config = config(&dir.path().join("nested"), &server.uri());

        let err = ensure_binary(&config).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ExportError>(),
            Some(ExportError::ProviderInit(message)) if message.contains("404")
        ));
        // The cache directory is still created
        assert!(dir.path().join("nested").is_dir());
    }
}

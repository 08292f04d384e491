//! Stages a prebuilt Pdfium library next to the build output so the renderer
//! can bind to it at runtime. Failures only produce a warning: the runtime
//! falls back to a library in the working directory or on the system path.

use std::env;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;
use ureq::AgentBuilder;
use walkdir::WalkDir;
use zip::read::ZipArchive;

const PDFIUM_VERSION: &str = "7350";
const RELEASE_BASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

const WATCHED_ENV: &[&str] = &[
    "PDFMARK_PDFIUM_SKIP_DOWNLOAD",
    "PDFMARK_PDFIUM_ARCHIVE_PATH",
    "PDFMARK_PDFIUM_VERSION",
    "PDFMARK_PDFIUM_PLATFORM",
    "PDFMARK_PDFIUM_BASE_URL",
    "PDFIUM_DYNAMIC_LIB_PATH",
    "PDFIUM_STATIC_LIB_PATH",
];

fn main() -> Result<()> {
    println!("cargo:rerun-if-changed=build.rs");
    for var in WATCHED_ENV {
        println!("cargo:rerun-if-env-changed={var}");
    }

    let user_provided = [
        "PDFMARK_PDFIUM_SKIP_DOWNLOAD",
        "PDFIUM_DYNAMIC_LIB_PATH",
        "PDFIUM_STATIC_LIB_PATH",
    ]
    .iter()
    .any(|var| env::var_os(var).is_some());
    if user_provided {
        return Ok(());
    }

    match stage_library() {
        Ok(path) => {
            let path = path
                .to_str()
                .ok_or_else(|| anyhow!("library path {:?} is not UTF-8", path))?;
            println!("cargo:rustc-env=PDFMARK_PDFIUM_LIBRARY_PATH={path}");
        }
        Err(err) => println!("cargo:warning=pdfium not staged: {err:#}"),
    }
    Ok(())
}

fn stage_library() -> Result<PathBuf> {
    let out_dir = PathBuf::from(env::var("OUT_DIR").context("OUT_DIR is not set")?);
    let target_os = env::var("CARGO_CFG_TARGET_OS").context("CARGO_CFG_TARGET_OS is not set")?;
    let target_arch =
        env::var("CARGO_CFG_TARGET_ARCH").context("CARGO_CFG_TARGET_ARCH is not set")?;

    let staging = out_dir.join("pdfium");
    fs::create_dir_all(&staging).context("failed to create staging directory")?;
    if let Some(existing) = find_library(&staging, &target_os) {
        return Ok(existing);
    }

    let archive = match env::var_os("PDFMARK_PDFIUM_ARCHIVE_PATH") {
        Some(path) => PathBuf::from(path),
        None => {
            let platform = env::var("PDFMARK_PDFIUM_PLATFORM")
                .unwrap_or_else(|_| platform_name(&target_os, &target_arch));
            download(&staging.join("downloads"), &platform)?
        }
    };
    unpack(&archive, &staging.join("lib"))?;

    find_library(&staging, &target_os)
        .ok_or_else(|| anyhow!("no pdfium library inside {:?}", archive))
}

fn platform_name(os: &str, arch: &str) -> String {
    let os = match os {
        "macos" => "mac",
        other => other,
    };
    let arch = match arch {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        other => other,
    };
    format!("{os}-{arch}")
}

fn find_library(root: &Path, target_os: &str) -> Option<PathBuf> {
    let wanted = match target_os {
        "windows" => "pdfium.dll",
        "macos" => "libpdfium.dylib",
        _ => "libpdfium.so",
    };
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| entry.file_type().is_file() && entry.file_name() == wanted)
        .map(|entry| entry.into_path())
}

fn download(dir: &Path, platform: &str) -> Result<PathBuf> {
    let version = env::var("PDFMARK_PDFIUM_VERSION").unwrap_or_else(|_| PDFIUM_VERSION.into());
    let base = env::var("PDFMARK_PDFIUM_BASE_URL").unwrap_or_else(|_| RELEASE_BASE_URL.into());
    fs::create_dir_all(dir).context("failed to create download directory")?;

    let agent = AgentBuilder::new()
        .timeout_read(Duration::from_secs(120))
        .build();
    let mut failures = Vec::new();
    for name in [format!("pdfium-{platform}.tgz"), format!("pdfium-{platform}.zip")] {
        let target = dir.join(&name);
        if target.exists() {
            return Ok(target);
        }
        let url = format!("{}/chromium/{version}/{name}", base.trim_end_matches('/'));
        match agent.get(&url).call() {
            Ok(response) => {
                let mut file = File::create(&target)
                    .with_context(|| format!("failed to create {:?}", target))?;
                io::copy(&mut response.into_reader(), &mut file)
                    .with_context(|| format!("failed to write {:?}", target))?;
                return Ok(target);
            }
            Err(err) => failures.push(format!("{url}: {err}")),
        }
    }
    bail!("download failed ({})", failures.join("; "))
}

fn unpack(archive: &Path, destination: &Path) -> Result<()> {
    if destination.exists() {
        fs::remove_dir_all(destination)
            .with_context(|| format!("failed to clear {:?}", destination))?;
    }
    fs::create_dir_all(destination)?;

    let file = File::open(archive).with_context(|| format!("failed to open {:?}", archive))?;
    let name = archive.to_string_lossy().to_ascii_lowercase();
    if name.ends_with(".tgz") || name.ends_with(".tar.gz") {
        Archive::new(GzDecoder::new(file))
            .unpack(destination)
            .with_context(|| format!("failed to unpack {:?}", archive))
    } else if name.ends_with(".zip") {
        ZipArchive::new(file)
            .and_then(|mut zip| zip.extract(destination))
            .with_context(|| format!("failed to unpack {:?}", archive))
    } else {
        bail!("unsupported archive {:?}", archive)
    }
}

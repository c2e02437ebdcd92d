//! Music storage and ingest.
//!
//! Tracks live as flat files in the music directory. Ingest copies local
//! files (or whole folders) into it, or downloads from an HTTP(S) URL with a
//! progress bar; the returned file names are what the playlist records.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};

/// Extensions accepted into the library. FLAC is stored and listed even
/// though the player currently skips it at decode time.
pub const MUSIC_EXTENSIONS: &[&str] = &["mp3", "wav", "flac"];

const DOWNLOAD_CHUNK: usize = 32 * 1024;
const PROGRESS_WIDTH: usize = 50;

/// Whether a path looks like a music file we accept.
pub fn is_music_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            MUSIC_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

/// Whether an `add` argument is a URL rather than a local path.
pub fn looks_like_url(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// Ingest a local file or folder into `music_dir`.
///
/// Returns the file names added. Folder ingest is recursive and per-file
/// errors are logged, not fatal; a single unsupported file is an error.
pub fn ingest(source: &Path, music_dir: &Path) -> Result<Vec<String>> {
    fs::create_dir_all(music_dir)
        .with_context(|| format!("create {}", music_dir.display()))?;

    let meta = fs::metadata(source)
        .with_context(|| format!("access {}", source.display()))?;

    if meta.is_dir() {
        let mut added = Vec::new();
        ingest_dir(source, music_dir, &mut added)?;
        return Ok(added);
    }

    if !is_music_file(source) {
        bail!(
            "{} is not a supported music format (.mp3, .wav, .flac)",
            source.display()
        );
    }
    Ok(vec![ingest_file(source, music_dir)?])
}

fn ingest_dir(dir: &Path, music_dir: &Path, added: &mut Vec<String>) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("read_dir {}", dir.display()))? {
        let entry = entry.context("read_dir entry")?;
        let path = entry.path();
        if path.is_dir() {
            ingest_dir(&path, music_dir, added)?;
        } else if path.is_file() && is_music_file(&path) {
            match ingest_file(&path, music_dir) {
                Ok(name) => added.push(name),
                Err(e) => tracing::warn!(file = %path.display(), "cannot add file: {e:#}"),
            }
        }
    }
    Ok(())
}

/// Stream-copy one file into the music directory under its base name.
fn ingest_file(source: &Path, music_dir: &Path) -> Result<String> {
    let name = source
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or_else(|| anyhow!("no usable file name: {}", source.display()))?
        .to_string();

    let mut src = File::open(source).with_context(|| format!("open {}", source.display()))?;
    let dest_path = music_dir.join(&name);
    let mut dest =
        File::create(&dest_path).with_context(|| format!("create {}", dest_path.display()))?;
    io::copy(&mut src, &mut dest).with_context(|| format!("copy {}", source.display()))?;

    Ok(name)
}

/// Download a music file from an HTTP(S) URL into `music_dir`.
///
/// The file name comes from the URL path and must look like a music file.
/// The body streams to disk in small chunks, drawing a progress bar when the
/// server reports a content length.
pub fn download(url: &str, music_dir: &Path) -> Result<String> {
    let name = file_name_from_url(url);
    if !is_music_file(Path::new(&name)) {
        bail!("URL does not point to a supported music format (.mp3, .wav, .flac)");
    }

    fs::create_dir_all(music_dir)
        .with_context(|| format!("create {}", music_dir.display()))?;

    let resp = ureq::get(url)
        .call()
        .map_err(|e| anyhow!("download failed: {e}"))?;
    if resp.status() != ureq::http::StatusCode::OK {
        bail!("download failed: HTTP {}", resp.status());
    }

    let total = resp
        .headers()
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok());
    match total {
        Some(total) => println!("Downloading {name} ({})...", format_bytes(total)),
        None => println!("Downloading {name}..."),
    }

    let dest_path = music_dir.join(&name);
    let mut dest =
        File::create(&dest_path).with_context(|| format!("create {}", dest_path.display()))?;

    let (_, body) = resp.into_parts();
    let written = copy_with_progress(&mut body.into_reader(), &mut dest, total, &name)
        .with_context(|| format!("save {}", dest_path.display()))?;

    println!();
    tracing::info!(file = %name, bytes = written, "download complete");
    Ok(name)
}

/// Copy `reader` to `writer`, redrawing a progress line as percent changes.
fn copy_with_progress(
    reader: &mut impl Read,
    writer: &mut impl Write,
    total: Option<u64>,
    name: &str,
) -> io::Result<u64> {
    let mut buf = [0u8; DOWNLOAD_CHUNK];
    let mut written = 0u64;
    let mut last_percent = 0u64;

    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        written += n as u64;

        if let Some(total) = total {
            if total > 0 {
                let percent = written * 100 / total;
                if percent > last_percent {
                    last_percent = percent;
                    print!("\r{name} {} {percent}%", progress_bar(percent));
                    let _ = io::stdout().flush();
                }
            }
        }
    }

    Ok(written)
}

fn progress_bar(percent: u64) -> String {
    let filled = (PROGRESS_WIDTH as u64 * percent.min(100) / 100) as usize;
    format!(
        "[{}{}]",
        "=".repeat(filled),
        " ".repeat(PROGRESS_WIDTH - filled)
    )
}

/// File name component of a URL path, with a fallback for bare hosts.
pub fn file_name_from_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let after_scheme = without_query
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(without_query);

    let name = match after_scheme.split_once('/') {
        Some((_, path)) => path.trim_end_matches('/').rsplit('/').next().unwrap_or(""),
        None => "",
    };
    if name.is_empty() {
        "downloaded_music.mp3".to_string()
    } else {
        name.to_string()
    }
}

/// Humanize a byte count (1024-based, one decimal).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

//! Moving a processed request into `<base>/processed/<date>-<n>.json`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::request::Request;

/// Give up looking for a free file name after this many attempts.
pub const MAX_ARCHIVE_PROBES: u32 = 100_000;

fn write_failed(path: &Path) -> impl FnOnce(std::io::Error) -> Error + '_ {
    move |e| Error::ArchiveWrite {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// `<base>/new/request.json` archives into `<base>/processed/`.
pub fn processed_dir(source: &Path) -> Result<PathBuf> {
    source
        .parent()
        .and_then(Path::parent)
        .map(|base| base.join("processed"))
        .ok_or_else(|| Error::ArchiveWrite {
            path: source.to_path_buf(),
            reason: "request file has no grandparent directory".to_string(),
        })
}

/// Claim the first free `<date>-<n>.json`. Each candidate is taken with an
/// exclusive create, so concurrent runs never share a file.
async fn create_unique(dir: &Path, date: NaiveDate) -> Result<(PathBuf, fs::File)> {
    let date = date.format("%Y-%m-%d").to_string();

    for n in 0..MAX_ARCHIVE_PROBES {
        let path = dir.join(format!("{}-{}.json", date, n));
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(write_failed(&path)(e)),
        }
    }

    Err(Error::ArchiveWrite {
        path: dir.to_path_buf(),
        reason: format!("no free file name for {} after {} attempts", date, MAX_ARCHIVE_PROBES),
    })
}

/// Write into a freshly claimed archive file. On failure the file is removed
/// again so no empty or partial archive is left behind.
async fn write_claimed<W: AsyncWrite + Unpin>(path: &Path, mut writer: W, data: &[u8]) -> Result<()> {
    let written = async {
        writer.write_all(data).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(writer);
        if let Err(cleanup) = fs::remove_file(path).await {
            warn!("Could not remove partial archive {}: {}", path.display(), cleanup);
        }
        return Err(write_failed(path)(e));
    }
    Ok(())
}

/// Archive under today's (UTC) date. See [`archive_on`].
pub async fn archive(requests: &[Request], source: &Path, rich_text_file: Option<&Path>) -> Result<PathBuf> {
    archive_on(requests, source, rich_text_file, Utc::now().date_naive()).await
}

/// Write the requests (one object, or an array for a thread) next to the
/// queue directory, then delete the request file and its rich-text file.
pub async fn archive_on(
    requests: &[Request],
    source: &Path,
    rich_text_file: Option<&Path>,
    date: NaiveDate,
) -> Result<PathBuf> {
    let json = match requests {
        [single] => serde_json::to_string_pretty(single)?,
        _ => serde_json::to_string_pretty(requests)?,
    };

    let dir = processed_dir(source)?;
    fs::create_dir_all(&dir).await.map_err(write_failed(&dir))?;

    let (path, file) = create_unique(&dir, date).await?;
    info!("Writing {}", path.display());
    write_claimed(&path, file, json.as_bytes()).await?;

    info!("Removing {}", source.display());
    fs::remove_file(source).await.map_err(write_failed(source))?;
    if let Some(rich_text_file) = rich_text_file {
        info!("Removing {}", rich_text_file.display());
        fs::remove_file(rich_text_file)
            .await
            .map_err(write_failed(rich_text_file))?;
    }

    Ok(path)
}

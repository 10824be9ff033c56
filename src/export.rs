use anyhow::{Context, Result};
use std::{
    borrow::Cow,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt, process::Command};
use tracing::{debug, info, warn};

use crate::{constants::GITIGNORE_FILE, error::Error, session::SessionEnvironment};

/// Render the environment as `export KEY=VALUE` lines
pub fn render(env: &SessionEnvironment) -> String {
    env.iter()
        .map(|(key, value)| format!("export {key}={}\n", shell_quote(value)))
        .collect()
}

/// Single-quote values the shell would otherwise split or expand
fn shell_quote(value: &str) -> Cow<'_, str> {
    let safe = !value.is_empty()
        && value.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(c, '_' | '.' | '/' | ':' | '@' | '%' | '+' | '=' | ',' | '-')
        });

    if safe {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("'{}'", value.replace('\'', r"'\''")))
    }
}

/// Write the environment file and make sure git ignores it.
///
/// The file is written atomically with owner-only permissions. Failing to
/// update `.gitignore` is logged and otherwise ignored.
pub async fn export(env: &SessionEnvironment, output_path: &Path, work_dir: &Path) -> Result<()> {
    let target = if output_path.is_absolute() {
        output_path.to_path_buf()
    } else {
        work_dir.join(output_path)
    };

    write_atomic(&target, &render(env)).await?;
    info!("Wrote {} variables to {}", env.len(), target.display());

    match ensure_ignored(work_dir, &target).await {
        Err(e) if e.is_fatal() => return Err(e.into()),
        Err(e) => warn!("{}", e),
        Ok(_) => {}
    }

    Ok(())
}

async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = temp_path(path);

    let written = match write_private(&tmp, contents).await {
        Ok(()) => fs::rename(&tmp, path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = written {
        fs::remove_file(&tmp).await.ok();
        return Err(e).with_context(|| format!("Failed to write {}", path.display()));
    }

    Ok(())
}

/// Create `path` readable by the owner only, then write `contents`
async fn write_private(path: &Path, contents: &str) -> std::io::Result<()> {
    // A leftover file would keep its old mode
    match fs::remove_file(path).await {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e),
        _ => {}
    }

    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents.as_bytes()).await?;
    file.flush().await
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.tmp"))
}

/// Add the output file to `.gitignore` when the working directory is a git
/// work tree that does not ignore it yet. Returns whether an entry was added.
pub async fn ensure_ignored(work_dir: &Path, target: &Path) -> Result<bool, Error> {
    let Some(entry) = ignore_entry(work_dir, target) else {
        debug!("{} is outside the working directory", target.display());
        return Ok(false);
    };

    if !git_succeeds(work_dir, &["rev-parse", "--is-inside-work-tree"]).await {
        debug!("{} is not a git work tree", work_dir.display());
        return Ok(false);
    }

    if git_succeeds(work_dir, &["check-ignore", "-q", &entry]).await {
        debug!("{} is already ignored by git", entry);
        return Ok(false);
    }

    let gitignore = work_dir.join(GITIGNORE_FILE);
    let added = append_ignore_entry(&gitignore, &entry)
        .await
        .map_err(|e| Error::IgnoreListUpdateFailed {
            path: gitignore.display().to_string(),
            reason: e.to_string(),
        })?;

    if added {
        println!("{entry} added to {GITIGNORE_FILE} so it is never committed by accident");
    }
    Ok(added)
}

/// Path of `target` relative to the working directory, as written to `.gitignore`
fn ignore_entry(work_dir: &Path, target: &Path) -> Option<String> {
    let relative = target.strip_prefix(work_dir).ok()?;
    let entry = relative.to_string_lossy().replace('\\', "/");
    (!entry.is_empty()).then_some(entry)
}

async fn git_succeeds(work_dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .current_dir(work_dir)
        .output()
        .await
        .is_ok_and(|output| output.status.success())
}

/// Append `entry` as its own line unless an identical line exists
async fn append_ignore_entry(gitignore: &Path, entry: &str) -> std::io::Result<bool> {
    let existing = match fs::read_to_string(gitignore).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };

    if existing.lines().any(|line| line.trim() == entry) {
        return Ok(false);
    }

    let mut updated = existing;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(entry);
    updated.push('\n');

    fs::write(gitignore, updated).await?;
    Ok(true)
}

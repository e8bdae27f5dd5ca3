use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};

/// Recursively mirrors `src` into `dst`, overwriting files that already exist
/// and recreating symlinks as symlinks.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("failed to read {}", src.display()))? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let metadata = fs::symlink_metadata(&src_path)
            .with_context(|| format!("failed to stat {}", src_path.display()))?;
        if metadata.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
            continue;
        }
        if metadata.file_type().is_symlink() {
            copy_symlink(&src_path, &dst_path)?;
            continue;
        }

        fs::copy(&src_path, &dst_path).with_context(|| {
            format!(
                "failed to copy {} to {}",
                src_path.display(),
                dst_path.display()
            )
        })?;
    }
    Ok(())
}

/// Like [`copy_dir_recursive`] but never replaces a file that already exists
/// at the destination. Returns the number of files added.
pub fn copy_dir_missing_only(src: &Path, dst: &Path) -> Result<usize> {
    fs::create_dir_all(dst).with_context(|| format!("failed to create {}", dst.display()))?;
    let mut added = 0;
    for entry in fs::read_dir(src).with_context(|| format!("failed to read {}", src.display()))? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        let metadata = fs::symlink_metadata(&src_path)
            .with_context(|| format!("failed to stat {}", src_path.display()))?;
        if metadata.is_dir() {
            added += copy_dir_missing_only(&src_path, &dst_path)?;
            continue;
        }
        if path_exists_no_follow(&dst_path) {
            continue;
        }
        copy_path(&src_path, &dst_path)?;
        added += 1;
    }
    Ok(added)
}

/// Copies a file, directory or symlink to `dst` verbatim.
pub fn copy_path(src: &Path, dst: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(src)
        .with_context(|| format!("failed to stat {}", src.display()))?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    if metadata.file_type().is_symlink() {
        return copy_symlink(src, dst);
    }
    if metadata.is_dir() {
        return copy_dir_recursive(src, dst);
    }

    fs::copy(src, dst)
        .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target =
        fs::read_link(src).with_context(|| format!("failed to read symlink {}", src.display()))?;
    if path_exists_no_follow(dst) {
        remove_path(dst)?;
    }
    let is_dir = src.is_dir();
    create_symlink(&target, dst, is_dir)
}

pub fn create_symlink(target: &Path, link: &Path, is_dir: bool) -> Result<()> {
    #[cfg(unix)]
    {
        let _ = is_dir;
        std::os::unix::fs::symlink(target, link).with_context(|| {
            format!(
                "failed to create symlink {} -> {}",
                link.display(),
                target.display()
            )
        })
    }

    #[cfg(windows)]
    {
        let created = if is_dir {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        };
        created.with_context(|| {
            format!(
                "failed to create symlink {} -> {}",
                link.display(),
                target.display()
            )
        })
    }
}

pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|metadata| metadata.file_type().is_symlink())
        .unwrap_or(false)
}

/// `exists()` follows links; a dangling symlink still occupies its path.
pub fn path_exists_no_follow(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

pub fn remove_path(path: &Path) -> Result<()> {
    let metadata = fs::symlink_metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;
    if metadata.file_type().is_symlink() {
        return remove_symlink(path);
    }
    if metadata.is_dir() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove {}", path.display()))?;
    } else {
        fs::remove_file(path).with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}

pub fn remove_symlink(path: &Path) -> Result<()> {
    // Directory symlinks on Windows are removed with remove_dir.
    let removed = fs::remove_file(path).or_else(|err| {
        if cfg!(windows) {
            fs::remove_dir(path)
        } else {
            Err(err)
        }
    });
    removed.with_context(|| format!("failed to remove symlink {}", path.display()))
}

/// Path of `target` as seen from `from_dir`, both given relative to the same
/// base (or both absolute).
pub fn relative_path(from_dir: &Path, target: &Path) -> PathBuf {
    let from: Vec<Component<'_>> = normalized_components(from_dir);
    let to: Vec<Component<'_>> = normalized_components(target);

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(left, right)| left == right)
        .count();

    let mut relative = PathBuf::new();
    for _ in common..from.len() {
        relative.push("..");
    }
    for component in &to[common..] {
        relative.push(component.as_os_str());
    }
    if relative.as_os_str().is_empty() {
        relative.push(".");
    }
    relative
}

fn normalized_components(path: &Path) -> Vec<Component<'_>> {
    let mut components = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(components.last(), Some(Component::Normal(_))) {
                    components.pop();
                } else {
                    components.push(component);
                }
            }
            other => components.push(other),
        }
    }
    components
}

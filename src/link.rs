//! Strategies for placing source frames into the dataset tree.

use log::debug;
use std::fs;
use std::io;
use std::path::Path;

use crate::config::LinkMode;

/// Materialize `src` at `dst`
pub trait LinkStrategy: Send + Sync {
    fn materialize(&self, src: &Path, dst: &Path) -> io::Result<()>;

    fn name(&self) -> &'static str;
}

/// Symbolic link pointing at the source file
#[derive(Debug, Default, Clone, Copy)]
pub struct Symlink;

/// Plain file copy
#[derive(Debug, Default, Clone, Copy)]
pub struct FileCopy;

/// Symbolic link, falling back to a copy when the platform or permissions refuse
#[derive(Debug, Default, Clone, Copy)]
pub struct SymlinkOrCopy;

impl LinkStrategy for Symlink {
    fn materialize(&self, src: &Path, dst: &Path) -> io::Result<()> {
        create_symlink(src, dst)
    }

    fn name(&self) -> &'static str {
        "symlink"
    }
}

impl LinkStrategy for FileCopy {
    fn materialize(&self, src: &Path, dst: &Path) -> io::Result<()> {
        fs::copy(src, dst).map(|_| ())
    }

    fn name(&self) -> &'static str {
        "copy"
    }
}

impl LinkStrategy for SymlinkOrCopy {
    fn materialize(&self, src: &Path, dst: &Path) -> io::Result<()> {
        match create_symlink(src, dst) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Err(e),
            Err(e) => {
                debug!(
                    "Symlink {} -> {} refused ({}), copying instead",
                    dst.display(),
                    src.display(),
                    e
                );
                fs::copy(src, dst).map(|_| ())
            }
        }
    }

    fn name(&self) -> &'static str {
        "auto"
    }
}

impl LinkMode {
    pub fn strategy(self) -> Box<dyn LinkStrategy> {
        match self {
            LinkMode::Symlink => Box::new(Symlink),
            LinkMode::Copy => Box::new(FileCopy),
            LinkMode::Auto => Box::new(SymlinkOrCopy),
        }
    }
}

// Links are made absolute so they survive moving the dataset directory
fn create_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = if src.is_absolute() {
        src.to_path_buf()
    } else {
        std::env::current_dir()?.join(src)
    };

    symlink_file(&target, dst)
}

#[cfg(unix)]
fn symlink_file(target: &Path, dst: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, dst)
}

#[cfg(windows)]
fn symlink_file(target: &Path, dst: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_file(target, dst)
}

#[cfg(not(any(unix, windows)))]
fn symlink_file(_target: &Path, _dst: &Path) -> io::Result<()> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "symbolic links are not supported on this platform",
    ))
}

use std::{
    fs::{self, File},
    io::{self, Write},
    path::Path,
    time::Instant,
};

use crate::utils::available_space;

/// Filesystem operations the fill loop depends on.
pub trait FillTarget {
    type File: Write;

    /// Creates `path`, truncating it if it exists.
    fn create(&self, path: &Path) -> io::Result<Self::File>;
    fn remove(&self, path: &Path) -> io::Result<()>;
    /// Free bytes on the filesystem holding `dir`, 0 when unknown.
    fn available_space(&self, dir: &Path) -> u64;
}

/// The local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDisk;

impl FillTarget for LocalDisk {
    type File = File;

    fn create(&self, path: &Path) -> io::Result<File> {
        File::create(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn available_space(&self, dir: &Path) -> u64 {
        available_space(dir)
    }
}

pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

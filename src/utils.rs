use std::{fs, path::Path, time::Duration};

use sysinfo::Disks;

/// Renders a byte count with 1024-based units and two decimals.
///
/// # Examples
///
/// ```
/// use diskfill::utils::format_size;
///
/// assert_eq!(format_size(1536), "1.50 KiB");
/// assert_eq!(format_size(3 * 1024 * 1024 * 1024), "3.00 GiB");
/// ```
pub fn format_size(size: u64) -> String {
    const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

    let mut value = size as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

/// Renders a remaining-time estimate, rounded to whole seconds.
pub fn format_eta(remaining: Duration) -> String {
    if remaining < Duration::from_secs(1) {
        return "0s".to_string();
    }
    humantime::format_duration(Duration::from_secs(remaining.as_secs())).to_string()
}

/// Free bytes available to an unprivileged user on the filesystem holding `dir`.
///
/// Asks the filesystem itself first, so tmpfs and other mounts `sysinfo` does
/// not list report their own space. Returns 0 when nothing can be resolved.
pub fn available_space(dir: &Path) -> u64 {
    statvfs_available(dir).unwrap_or_else(|| disks_available(dir))
}

#[cfg(unix)]
fn statvfs_available(dir: &Path) -> Option<u64> {
    use std::{ffi::CString, mem, os::unix::ffi::OsStrExt};

    let path = CString::new(dir.as_os_str().as_bytes()).ok()?;
    let mut stat: libc::statvfs = unsafe { mem::zeroed() };
    if unsafe { libc::statvfs(path.as_ptr(), &mut stat) } != 0 {
        return None;
    }
    Some((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
}

#[cfg(not(unix))]
fn statvfs_available(_dir: &Path) -> Option<u64> {
    None
}

// the disk whose mount point is the longest prefix of the canonical path
fn disks_available(dir: &Path) -> u64 {
    let Ok(dir) = fs::canonicalize(dir) else {
        return 0;
    };
    let disks = Disks::new_with_refreshed_list();
    disks
        .list()
        .iter()
        .filter(|disk| dir.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len())
        .map(|disk| disk.available_space())
        .unwrap_or(0)
}

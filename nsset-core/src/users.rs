//! # User Namespace ID Mappings
//!
//! Writing `/proc/<pid>/uid_map`, `/proc/<pid>/gid_map`, and
//! `/proc/<pid>/setgroups` for a freshly created user namespace.
//!
//! The kernel interface expects lines in the format:
//! ```text
//! ID-inside-ns ID-outside-ns length
//! ```
//! and applies a whole file atomically. An unprivileged writer must deny
//! `setgroups` before it is allowed to write `gid_map`.

use std::fmt::Write as _;
use std::fs;
use std::path::PathBuf;

use nix::unistd::{Pid, Uid};

use crate::errors::{Error, Result};

/// One contiguous range of an id mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdMap {
    /// First id inside the new user namespace.
    pub container_id: u32,
    /// First id outside (in the writer's namespace).
    pub host_id: u32,
    /// Number of consecutive ids mapped.
    pub size: u32,
}

fn render(maps: &[IdMap]) -> String {
    let mut out = String::new();
    for map in maps {
        // infallible on String
        let _ = writeln!(out, "{} {} {}", map.container_id, map.host_id, map.size);
    }
    out
}

fn write_proc(path: PathBuf, content: &str) -> Result<()> {
    fs::write(&path, content).map_err(|e| Error::WriteIdMap { path, source: e })
}

/// Writes the ordered uid and gid mappings for the user namespace held by
/// `pid`.
///
/// `setgroups` is denied first whenever the invoking user is unprivileged;
/// kernels without the `setgroups` file are tolerated.
pub(crate) fn write_id_maps(pid: Pid, uid_maps: &[IdMap], gid_maps: &[IdMap]) -> Result<()> {
    let proc_dir = PathBuf::from("/proc").join(pid.to_string());

    if !uid_maps.is_empty() {
        write_proc(proc_dir.join("uid_map"), &render(uid_maps))?;
    }

    if !gid_maps.is_empty() {
        if !Uid::effective().is_root() {
            let setgroups = proc_dir.join("setgroups");
            match fs::write(&setgroups, "deny\n") {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::WriteIdMap {
                        path: setgroups,
                        source: e,
                    });
                }
            }
        }
        write_proc(proc_dir.join("gid_map"), &render(gid_maps))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_one_triple_per_line_in_order() {
        let maps = [
            IdMap {
                container_id: 0,
                host_id: 0,
                size: 1,
            },
            IdMap {
                container_id: 10000,
                host_id: 1000,
                size: 1000,
            },
        ];
        assert_eq!(render(&maps), "0 0 1\n10000 1000 1000\n");
        assert_eq!(render(&[]), "");
    }
}

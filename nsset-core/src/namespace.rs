//! # Namespace Kinds
//!
//! This module defines the closed set of Linux namespace kinds and the
//! mapping between their procfs link names and `CLONE_NEW*` bits.

use nix::sched::CloneFlags;

/// `CLONE_NEWTIME` is absent from `nix`'s `CloneFlags` table, so the bit is
/// pulled in from `libc` and retained through the bitflags type unchanged.
pub const CLONE_NEWTIME: CloneFlags = CloneFlags::from_bits_retain(libc::CLONE_NEWTIME);

/// Every namespace bit this crate knows about.
pub(crate) const ALL_KINDS: CloneFlags = CloneFlags::CLONE_NEWCGROUP
    .union(CloneFlags::CLONE_NEWIPC)
    .union(CloneFlags::CLONE_NEWNS)
    .union(CloneFlags::CLONE_NEWNET)
    .union(CloneFlags::CLONE_NEWPID)
    .union(CLONE_NEWTIME)
    .union(CloneFlags::CLONE_NEWUSER)
    .union(CloneFlags::CLONE_NEWUTS);

/// The default capture mask: every kind except user.
///
/// `setns(2)` into a user namespace is not permitted from a multi-threaded
/// process, so including it by default would poison later executions.
pub(crate) const DEFAULT_CAPTURE: CloneFlags = ALL_KINDS.difference(CloneFlags::CLONE_NEWUSER);

/// Flags whose application to a thread cannot be undone with `setns(2)`.
const NON_REVERSIBLE: CloneFlags = CloneFlags::CLONE_NEWUSER
    .union(CloneFlags::CLONE_NEWIPC)
    .union(CloneFlags::CLONE_NEWNS)
    .union(CloneFlags::CLONE_FS);

/// Returns `true` if a thread that applied `mask` can later be returned to
/// its previous namespaces.
///
/// A mask containing user, ipc, or mount bits (or the `CLONE_FS` unshare a
/// mount entry implies) is not reversible; a worker thread that applied one
/// must be retired instead of reused.
pub fn reversible(mask: CloneFlags) -> bool {
    !mask.intersects(NON_REVERSIBLE)
}

/// One kind of Linux namespace.
///
/// Each variant corresponds to a link under `/proc/<pid>/ns/` and to a
/// single `CLONE_NEW*` bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    /// Cgroup root directory view (`CLONE_NEWCGROUP`).
    Cgroup,
    /// System V IPC and POSIX message queues (`CLONE_NEWIPC`).
    Ipc,
    /// Mount table (`CLONE_NEWNS`).
    Mnt,
    /// Network devices, stacks, ports (`CLONE_NEWNET`).
    Net,
    /// Process IDs (`CLONE_NEWPID`).
    Pid,
    /// Boottime and monotonic clock offsets (`CLONE_NEWTIME`).
    Time,
    /// User and group IDs (`CLONE_NEWUSER`).
    User,
    /// Hostname and NIS domain name (`CLONE_NEWUTS`).
    Uts,
}

impl Namespace {
    /// All kinds, in procfs name order.
    pub const ALL: [Namespace; 8] = [
        Namespace::Cgroup,
        Namespace::Ipc,
        Namespace::Mnt,
        Namespace::Net,
        Namespace::Pid,
        Namespace::Time,
        Namespace::User,
        Namespace::Uts,
    ];

    /// The link name under `/proc/<pid>/ns/`.
    pub fn name(self) -> &'static str {
        match self {
            Namespace::Cgroup => "cgroup",
            Namespace::Ipc => "ipc",
            Namespace::Mnt => "mnt",
            Namespace::Net => "net",
            Namespace::Pid => "pid",
            Namespace::Time => "time",
            Namespace::User => "user",
            Namespace::Uts => "uts",
        }
    }

    /// The `CLONE_NEW*` bit for this kind.
    pub fn flag(self) -> CloneFlags {
        match self {
            Namespace::Cgroup => CloneFlags::CLONE_NEWCGROUP,
            Namespace::Ipc => CloneFlags::CLONE_NEWIPC,
            Namespace::Mnt => CloneFlags::CLONE_NEWNS,
            Namespace::Net => CloneFlags::CLONE_NEWNET,
            Namespace::Pid => CloneFlags::CLONE_NEWPID,
            Namespace::Time => CLONE_NEWTIME,
            Namespace::User => CloneFlags::CLONE_NEWUSER,
            Namespace::Uts => CloneFlags::CLONE_NEWUTS,
        }
    }

    /// Looks a kind up by its procfs link name.
    pub fn from_name(name: &str) -> Option<Namespace> {
        Namespace::ALL.into_iter().find(|ns| ns.name() == name)
    }

    /// Looks a kind up by its flag bit. `None` unless `flag` is exactly one
    /// known namespace bit.
    pub fn from_flag(flag: CloneFlags) -> Option<Namespace> {
        Namespace::ALL.into_iter().find(|ns| ns.flag() == flag)
    }

    /// Iterates over the kinds present in `mask`, in `ALL` order. Bits that
    /// are not namespace bits are ignored.
    pub fn in_mask(mask: CloneFlags) -> impl Iterator<Item = Namespace> {
        Namespace::ALL
            .into_iter()
            .filter(move |ns| mask.contains(ns.flag()))
    }
}

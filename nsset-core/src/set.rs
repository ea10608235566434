//! # Namespace Sets
//!
//! A [`Set`] is an owned snapshot of Linux namespaces: one close-on-exec
//! handle per kind, plus the mask saying which kinds are present. Handles
//! are independent of the thread that opened them, so a set built on one
//! thread can be consumed on another. As long as a handle (or a bind mount
//! of the magic link) stays open, the namespace behind it persists.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};

use nix::sched::CloneFlags;
use nix::unistd::Pid;

use crate::errors::{Error, Result};
use crate::namespace::{Namespace, ALL_KINDS, DEFAULT_CAPTURE};
use crate::sys;

/// An owned set of namespace handles.
///
/// See [`Set::current`], [`Set::from_dir`], [`Set::from_pid`], and the
/// unshare operations for ways to obtain one.
pub struct Set {
    pub(crate) fds: BTreeMap<Namespace, OwnedFd>,
    pub(crate) flags: CloneFlags,
}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Set").field("flags", &self.flags).finish()
    }
}

fn fd_link(fd: RawFd) -> PathBuf {
    PathBuf::from(format!("/proc/self/fd/{fd}"))
}

impl Set {
    /// Captures the namespaces of the calling thread.
    ///
    /// An empty `mask` captures every kind except user: a user namespace
    /// handle cannot be entered from a multi-threaded process, so including
    /// it silently would poison later executions.
    pub fn current(mask: CloneFlags) -> Result<Set> {
        let mask = if mask.is_empty() { DEFAULT_CAPTURE } else { mask };
        Set::capture(mask)
    }

    /// Like [`Set::current`] but without the empty-mask default.
    pub(crate) fn capture(mask: CloneFlags) -> Result<Set> {
        Set::open_under(Path::new("/proc/thread-self/ns"), mask)
    }

    /// Captures the calling thread's namespaces right after an `unshare`.
    ///
    /// A bare `unshare` does not move the caller into new pid and time
    /// namespaces; those only apply to the thread's future children. The
    /// handles for these two kinds therefore come from the
    /// `*_for_children` links, which do show the freshly created
    /// namespaces.
    pub(crate) fn capture_unshared(mask: CloneFlags) -> Result<Set> {
        let dir = Path::new("/proc/thread-self/ns");
        let mut fds = BTreeMap::new();
        let mut flags = CloneFlags::empty();
        for ns in Namespace::in_mask(mask) {
            let path = match ns {
                Namespace::Pid => dir.join("pid_for_children"),
                Namespace::Time => dir.join("time_for_children"),
                _ => dir.join(ns.name()),
            };
            let fd = sys::open(&path).map_err(|e| Error::OpenNamespace { path, source: e })?;
            fds.insert(ns, fd);
            flags |= ns.flag();
        }
        Ok(Set { fds, flags })
    }

    /// Builds a set by opening `dir/<name>` for every kind in `mask`.
    ///
    /// `dir` is typically a directory previously populated by
    /// [`Set::mount`], or `/proc/<pid>/ns` itself. The files are not
    /// validated beyond the open; a file that is not a namespace of the
    /// right kind surfaces at `setns` time.
    pub fn from_dir(dir: impl AsRef<Path>, mask: CloneFlags) -> Result<Set> {
        Set::open_under(dir.as_ref(), mask)
    }

    /// Builds a set from the namespaces of a live process.
    pub fn from_pid(pid: Pid, mask: CloneFlags) -> Result<Set> {
        Set::from_dir(format!("/proc/{pid}/ns"), mask)
    }

    fn open_under(dir: &Path, mask: CloneFlags) -> Result<Set> {
        let mut fds = BTreeMap::new();
        let mut flags = CloneFlags::empty();
        for ns in Namespace::in_mask(mask) {
            let path = dir.join(ns.name());
            let fd = sys::open(&path).map_err(|e| Error::OpenNamespace { path, source: e })?;
            fds.insert(ns, fd);
            flags |= ns.flag();
        }
        Ok(Set { fds, flags })
    }

    /// The mask of kinds present in this set.
    pub fn flags(&self) -> CloneFlags {
        self.flags
    }

    /// Whether `ns` is present in this set.
    pub fn contains(&self, ns: Namespace) -> bool {
        self.fds.contains_key(&ns)
    }

    /// The kernel's identifier for the `ns` namespace in this set, e.g.
    /// `"net:[4026531969]"`.
    ///
    /// Two handles refer to the same namespace exactly when their ids are
    /// equal.
    pub fn id(&self, ns: Namespace) -> Result<String> {
        let fd = self.fds.get(&ns).ok_or(Error::NotInSet { name: ns.name() })?;
        let path = fd_link(fd.as_raw_fd());
        fs::read_link(&path)
            .map(|target| target.to_string_lossy().into_owned())
            .map_err(|e| Error::ReadNsId { path, source: e })
    }

    /// Duplicates the kinds in `mask` into a new, independently owned set.
    /// An empty `mask` duplicates everything.
    ///
    /// Duplicates are fresh descriptors allocated away from the low fd
    /// range; closing either set leaves the other usable. Anything created
    /// before a failure is closed on the way out.
    pub fn dup(&self, mask: CloneFlags) -> Result<Set> {
        let mask = if mask.is_empty() { self.flags } else { mask };
        let mut fds = BTreeMap::new();
        let mut flags = CloneFlags::empty();
        for (&ns, fd) in &self.fds {
            if !mask.contains(ns.flag()) {
                continue;
            }
            let nfd = sys::dup(fd.as_fd()).map_err(|e| Error::DupFailed {
                name: ns.name(),
                source: e,
            })?;
            fds.insert(ns, nfd);
            flags |= ns.flag();
        }
        Ok(Set { fds, flags })
    }

    /// Duplicates the kinds in `mask` as bare descriptors for handing off
    /// to a child process. An empty `mask` duplicates everything.
    ///
    /// The descriptors carry close-on-exec; to pass one across `execve`,
    /// dup it onto the target number first (which clears the flag).
    pub fn fds(&self, mask: CloneFlags) -> Result<FdSet> {
        Ok(FdSet {
            fds: self.dup(mask)?.fds,
        })
    }

    /// Fills this set out with duplicates of every kind `other` has and
    /// this set lacks. `other` is left untouched.
    ///
    /// On error nothing is added and all temporaries are closed.
    pub fn merge_from(&mut self, other: &Set) -> Result<()> {
        let mut staged: Vec<(Namespace, OwnedFd)> = Vec::new();
        for (&ns, fd) in &other.fds {
            if self.flags.contains(ns.flag()) {
                continue;
            }
            let nfd = sys::dup(fd.as_fd()).map_err(|e| Error::DupFailed {
                name: ns.name(),
                source: e,
            })?;
            staged.push((ns, nfd));
        }
        for (ns, fd) in staged {
            self.flags |= ns.flag();
            self.fds.insert(ns, fd);
        }
        Ok(())
    }

    /// Bind-mounts every namespace in the set into `target`, one file per
    /// kind named after its procfs link (`target/net`, `target/ipc`, ...).
    ///
    /// `target` must already exist. The mounts are not cleaned up here;
    /// they keep the namespaces alive until unmounted and can be picked
    /// back up with [`Set::from_dir`]. If the set contains a mount
    /// namespace it is the caller's job to make sure these mounts propagate
    /// into the mount namespace they should be visible in; note that
    /// bind-mounting an `mnt` magic link can fail with `EINVAL` under a
    /// shared parent mount (see `mount(2)`).
    pub fn mount(&self, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        for (&ns, fd) in &self.fds {
            let file = target.join(ns.name());
            fs::File::create(&file).map_err(|e| Error::CreateMountTarget {
                path: file.clone(),
                source: e,
            })?;
            mount_fd(ns, fd.as_fd(), &file)?;
        }
        Ok(())
    }

    /// Bind-mounts a single namespace onto `target`, which must be an
    /// existing file.
    pub fn mount_one(&self, ns: Namespace, target: impl AsRef<Path>) -> Result<()> {
        let target = target.as_ref();
        let fd = self.fds.get(&ns).ok_or(Error::NotInSet { name: ns.name() })?;
        target
            .symlink_metadata()
            .map_err(|e| Error::MountTargetMissing {
                path: target.to_owned(),
                source: e,
            })?;
        mount_fd(ns, fd.as_fd(), target)
    }

    /// Moves the calling thread into every namespace in the set, user
    /// first.
    ///
    /// This mutates the calling thread directly and is meant for contexts
    /// that own their thread outright, most usefully a just-forked child
    /// in a `pre_exec` hook, where the process is single-threaded and a
    /// user namespace can be joined too. From a multi-threaded process
    /// prefer [`Set::run`], which confines the transition to a disposable
    /// worker.
    pub fn enter(&self) -> Result<()> {
        self.apply(false)
    }

    /// Applies the set to the calling thread.
    ///
    /// A mount namespace entry requires the thread's `fs` structure to be
    /// unshared first, so `unshare(CLONE_FS)` precedes the `setns` calls
    /// whenever `mnt` is present. With `skip_user` the user namespace
    /// handle, if any, is left alone; the unshare engine uses this to enter
    /// everything else before cloning a child inside the original user
    /// namespace.
    pub(crate) fn apply(&self, skip_user: bool) -> Result<()> {
        if self.contains(Namespace::Mnt) {
            sys::unshare(CloneFlags::CLONE_FS).map_err(|e| Error::UnshareFailed {
                flags: CloneFlags::CLONE_FS,
                source: e,
            })?;
        }
        if !skip_user {
            if let Some(fd) = self.fds.get(&Namespace::User) {
                setns_one(Namespace::User, fd.as_fd())?;
            }
        }
        for (&ns, fd) in &self.fds {
            if ns == Namespace::User {
                continue;
            }
            setns_one(ns, fd.as_fd())?;
        }
        Ok(())
    }

    /// Closes every handle in the set.
    ///
    /// Close errors are logged, not returned. If these were the last
    /// references (and no bind mounts exist), the namespaces are destroyed.
    /// Dropping a set closes the handles too; this form exists for making
    /// the teardown point explicit.
    pub fn close(self) {
        for (ns, fd) in self.fds {
            sys::close(fd, ns.name());
        }
    }
}

/// Detaches the per-kind bind mounts a previous [`Set::mount`] left under
/// `dir`. An empty `mask` covers every kind.
///
/// Each mount is detached lazily and best-effort: failures are logged and
/// skipped, files that do not exist are ignored, and the (now empty) files
/// themselves are left in place. Namespaces without another live handle are
/// destroyed by the kernel once their mount is gone.
pub fn unmount(dir: impl AsRef<Path>, mask: CloneFlags) {
    let dir = dir.as_ref();
    let mask = if mask.is_empty() { ALL_KINDS } else { mask };
    for ns in Namespace::in_mask(mask) {
        let path = dir.join(ns.name());
        if path.symlink_metadata().is_ok() {
            sys::unmount_detach(&path);
        }
    }
}

fn mount_fd(ns: Namespace, fd: BorrowedFd<'_>, target: &Path) -> Result<()> {
    let source = fd_link(fd.as_raw_fd());
    sys::bind_mount(&source, target, false).map_err(|e| Error::MountFailed {
        name: ns.name(),
        path: target.to_owned(),
        source: e,
    })
}

fn setns_one(ns: Namespace, fd: BorrowedFd<'_>) -> Result<()> {
    match sys::setns(fd, ns.flag()) {
        Ok(()) => Ok(()),
        Err(errno) => {
            // setns can refuse a no-op transition; when both links read back
            // the same id the thread is already where it should be.
            let cur = fs::read_link(Path::new("/proc/thread-self/ns").join(ns.name())).ok();
            let target = fs::read_link(fd_link(fd.as_raw_fd())).ok();
            match (cur, target) {
                (Some(c), Some(t)) if c == t => Ok(()),
                _ => Err(Error::SetnsFailed {
                    name: ns.name(),
                    source: errno,
                }),
            }
        }
    }
}

/// Duplicated namespace descriptors for handing off to a child process.
///
/// Produced by [`Set::fds`]. Dropping the set closes every descriptor;
/// consume it with `into_iter` to take ownership of individual handles.
#[derive(Debug)]
pub struct FdSet {
    fds: BTreeMap<Namespace, OwnedFd>,
}

impl FdSet {
    /// Borrows the descriptor for `ns`, if present.
    pub fn get(&self, ns: Namespace) -> Option<BorrowedFd<'_>> {
        self.fds.get(&ns).map(|fd| fd.as_fd())
    }

    /// Iterates over the contained `(kind, descriptor)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Namespace, BorrowedFd<'_>)> {
        self.fds.iter().map(|(&ns, fd)| (ns, fd.as_fd()))
    }

    /// Number of descriptors in the set.
    pub fn len(&self) -> usize {
        self.fds.len()
    }

    /// Whether the set holds no descriptors.
    pub fn is_empty(&self) -> bool {
        self.fds.is_empty()
    }
}

impl IntoIterator for FdSet {
    type Item = (Namespace, OwnedFd);
    type IntoIter = std::collections::btree_map::IntoIter<Namespace, OwnedFd>;

    fn into_iter(self) -> Self::IntoIter {
        self.fds.into_iter()
    }
}

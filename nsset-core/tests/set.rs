//! Tests for capturing, duplicating, and persisting namespace sets.

mod common;

use std::path::Path;

use nix::mount::{mount, umount2, MntFlags, MsFlags};
use nsset_core::{CloneFlags, Error, Namespace, Set};

#[test]
fn current_ids_match_procfs() {
    let set = Set::current(CloneFlags::CLONE_NEWNET | CloneFlags::CLONE_NEWIPC).unwrap();
    for ns in [Namespace::Net, Namespace::Ipc] {
        assert_eq!(set.id(ns).unwrap(), common::thread_ns_id(ns.name()));
    }
    set.close();
}

#[test]
fn empty_mask_captures_everything_but_user() {
    let set = Set::current(CloneFlags::empty()).unwrap();
    assert!(!set.contains(Namespace::User));
    assert!(set.contains(Namespace::Net));
    assert!(set.contains(Namespace::Mnt));
    assert_eq!(Namespace::in_mask(set.flags()).count(), 7);
    set.close();
}

#[test]
fn dup_is_independent_of_the_source() {
    let set = Set::current(CloneFlags::empty()).unwrap();
    let dup = set
        .dup(CloneFlags::CLONE_NEWNET | CloneFlags::CLONE_NEWIPC)
        .unwrap();

    assert_eq!(
        dup.flags(),
        CloneFlags::CLONE_NEWNET | CloneFlags::CLONE_NEWIPC
    );
    assert_eq!(set.id(Namespace::Net).unwrap(), dup.id(Namespace::Net).unwrap());
    assert_eq!(set.id(Namespace::Ipc).unwrap(), dup.id(Namespace::Ipc).unwrap());

    // The duplicate must keep working after the source is gone.
    set.close();
    assert!(dup.id(Namespace::Net).is_ok());
    dup.run(|| {}).unwrap();
    dup.close();
}

#[test]
fn dup_with_empty_mask_copies_all_kinds() {
    let set = Set::current(CloneFlags::empty()).unwrap();
    let dup = set.dup(CloneFlags::empty()).unwrap();
    assert_eq!(dup.flags(), set.flags());
    for ns in Namespace::in_mask(set.flags()) {
        assert_eq!(set.id(ns).unwrap(), dup.id(ns).unwrap());
    }
    dup.close();
    set.close();
}

#[test]
fn fds_exposes_handles_for_handoff() {
    let set = Set::current(CloneFlags::CLONE_NEWNET | CloneFlags::CLONE_NEWUTS).unwrap();
    let fds = set.fds(CloneFlags::empty()).unwrap();
    assert_eq!(fds.len(), 2);
    assert!(fds.get(Namespace::Net).is_some());
    assert!(fds.get(Namespace::Uts).is_some());
    assert!(fds.get(Namespace::Ipc).is_none());
    assert_eq!(fds.iter().count(), 2);
    set.close();
}

#[test]
fn id_of_missing_kind_fails() {
    let set = Set::current(CloneFlags::CLONE_NEWNET).unwrap();
    assert!(matches!(
        set.id(Namespace::Uts),
        Err(Error::NotInSet { name: "uts" })
    ));
    set.close();
}

#[test]
fn mount_round_trips_through_from_dir() {
    if !common::have_ns_caps() {
        eprintln!("skipping mount_round_trips_through_from_dir: requires CAP_SYS_ADMIN");
        return;
    }

    let flags = CloneFlags::CLONE_NEWNET | CloneFlags::CLONE_NEWIPC;
    let set = nsset_core::unshare(flags).unwrap();

    let dir = tempfile::tempdir().unwrap();
    // self-bind the directory so cleanup is a single lazy detach
    mount(
        Some(dir.path()),
        dir.path(),
        None::<&str>,
        MsFlags::MS_BIND | MsFlags::MS_REC,
        None::<&str>,
    )
    .unwrap();

    set.mount(dir.path()).unwrap();

    // the mounts keep the namespaces alive without any open handle
    let net_id = set.id(Namespace::Net).unwrap();
    let ipc_id = set.id(Namespace::Ipc).unwrap();
    set.close();

    let restored = Set::from_dir(dir.path(), flags).unwrap();
    assert_eq!(restored.id(Namespace::Net).unwrap(), net_id);
    assert_eq!(restored.id(Namespace::Ipc).unwrap(), ipc_id);
    restored.run_raw(|| ((), true), true).unwrap();
    restored.close();

    // detaching the per-kind mounts leaves plain empty files behind; what
    // opens now is no longer the namespace
    nsset_core::unmount(dir.path(), flags);
    let reopened = Set::from_dir(dir.path(), flags).unwrap();
    assert_ne!(reopened.id(Namespace::Net).unwrap(), net_id);
    reopened.close();

    umount2(dir.path(), MntFlags::MNT_DETACH).unwrap();
}

#[test]
fn mount_one_checks_membership_and_target() {
    if !common::have_ns_caps() {
        eprintln!("skipping mount_one_checks_membership_and_target: requires CAP_SYS_ADMIN");
        return;
    }

    let set = nsset_core::unshare(CloneFlags::CLONE_NEWNET).unwrap();

    let target = tempfile::NamedTempFile::new().unwrap();
    set.mount_one(Namespace::Net, target.path()).unwrap();
    umount2(target.path(), MntFlags::MNT_DETACH).unwrap();

    assert!(matches!(
        set.mount_one(Namespace::Ipc, target.path()),
        Err(Error::NotInSet { name: "ipc" })
    ));
    assert!(matches!(
        set.mount_one(Namespace::Net, Path::new("/definitely/not/there")),
        Err(Error::MountTargetMissing { .. })
    ));

    set.close();
}

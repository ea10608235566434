//! Tests for user-namespace creation and id mappings.
//!
//! A set holding a user namespace cannot be entered from this (threaded)
//! process, so the mappings are read back by exec-ing `cat` in a forked
//! child that enters the set pre-exec.

mod common;

use std::process::Command;

use nsset_core::{enter_on_exec, CloneFlags, IdMap, Namespace, Set, UnshareOpts};

fn output_in_set(set: &Set, argv: &[&str]) -> String {
    let owned = set.dup(CloneFlags::empty()).unwrap();
    let mut command = Command::new(argv[0]);
    command.args(&argv[1..]);
    enter_on_exec(&mut command, owned);
    let output = command.output().unwrap();
    assert!(
        output.status.success(),
        "{argv:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

fn parse_map(content: &str) -> Vec<IdMap> {
    content
        .lines()
        .map(|line| {
            let fields: Vec<u32> = line
                .split_whitespace()
                .map(|f| f.parse().expect("numeric id map field"))
                .collect();
            assert_eq!(fields.len(), 3, "unexpected id map line {line:?}");
            IdMap {
                container_id: fields[0],
                host_id: fields[1],
                size: fields[2],
            }
        })
        .collect()
}

fn test_maps() -> (Vec<IdMap>, Vec<IdMap>) {
    if nix::unistd::Uid::effective().is_root() {
        let maps = vec![
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
        (maps.clone(), maps)
    } else {
        // an unprivileged writer may only map its own ids
        let uid = nix::unistd::getuid().as_raw();
        let gid = nix::unistd::getgid().as_raw();
        (
            vec![IdMap {
                container_id: 0,
                host_id: uid,
                size: 1,
            }],
            vec![IdMap {
                container_id: 0,
                host_id: gid,
                size: 1,
            }],
        )
    }
}

#[test]
fn id_maps_are_written_in_order() {
    let (uid_maps, gid_maps) = test_maps();
    let opts = UnshareOpts {
        uid_maps: uid_maps.clone(),
        gid_maps: gid_maps.clone(),
        ..Default::default()
    };

    let set = match nsset_core::unshare_with(
        CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNET,
        &opts,
    ) {
        Ok(set) => set,
        Err(e) => {
            eprintln!("skipping id_maps_are_written_in_order: cannot create user namespace: {e}");
            return;
        }
    };

    assert!(set.contains(Namespace::User));
    assert!(set.contains(Namespace::Net));

    let read_uid = parse_map(&output_in_set(&set, &["cat", "/proc/self/uid_map"]));
    assert_eq!(read_uid, uid_maps);

    let read_gid = parse_map(&output_in_set(&set, &["cat", "/proc/self/gid_map"]));
    assert_eq!(read_gid, gid_maps);

    set.close();
}

#[test]
fn unshare_inside_a_held_user_namespace_keeps_it() {
    if !common::have_ns_caps() {
        eprintln!("skipping unshare_inside_a_held_user_namespace_keeps_it: requires CAP_SYS_ADMIN");
        return;
    }

    let (uid_maps, gid_maps) = test_maps();
    let opts = UnshareOpts {
        uid_maps,
        gid_maps,
        ..Default::default()
    };
    let set = match nsset_core::unshare_with(
        CloneFlags::CLONE_NEWUSER | CloneFlags::CLONE_NEWNET,
        &opts,
    ) {
        Ok(set) => set,
        Err(e) => {
            eprintln!("skipping unshare_inside_a_held_user_namespace_keeps_it: {e}");
            return;
        }
    };

    // Creating more namespaces from a set holding a user namespace goes
    // through a holder child that joins the user namespace first; the
    // result shares it.
    let inner = set.unshare(CloneFlags::CLONE_NEWIPC).unwrap();
    assert_eq!(
        inner.id(Namespace::User).unwrap(),
        set.id(Namespace::User).unwrap()
    );
    assert_eq!(
        inner.id(Namespace::Net).unwrap(),
        set.id(Namespace::Net).unwrap()
    );

    let host_ipc = Set::current(CloneFlags::CLONE_NEWIPC).unwrap();
    assert_ne!(
        inner.id(Namespace::Ipc).unwrap(),
        host_ipc.id(Namespace::Ipc).unwrap()
    );

    host_ipc.close();
    inner.close();
    set.close();
}

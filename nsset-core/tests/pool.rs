//! Pool lifecycle test: depth, refill, and a leak-free shutdown.
//!
//! This lives in its own test binary because it compares open-descriptor
//! counts, which only works while nothing else in the process races fd
//! creation.

mod common;

use std::time::{Duration, Instant};

use nsset_core::{CloneFlags, Pool, UnshareOpts};

fn open_fd_count() -> usize {
    std::fs::read_dir("/proc/self/fd").unwrap().count()
}

fn wait_for_len(pool: &Pool, want: usize) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while pool.len() != want {
        assert!(
            Instant::now() < deadline,
            "pool stuck at {} sets, wanted {want}",
            pool.len()
        );
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn pool_fills_refills_and_drains() {
    if !common::have_ns_caps() {
        eprintln!("skipping pool_fills_refills_and_drains: requires CAP_SYS_ADMIN");
        return;
    }

    let pool = Pool::new(CloneFlags::CLONE_NEWNET, UnshareOpts::default());
    assert_eq!(pool.len(), 0);
    assert!(pool.is_empty());

    // an idle pool still serves gets by creating directly
    let set = pool.get().unwrap();
    pool.put(set);
    assert_eq!(pool.len(), 1);
    pool.get().unwrap().close();
    assert_eq!(pool.len(), 0);

    let fds_before = open_fd_count();

    let runner = pool.run(4);
    wait_for_len(&pool, 4);

    // draining the queue makes the producers refill it
    let mut taken = Vec::new();
    for _ in 0..4 {
        taken.push(pool.get().unwrap());
    }
    wait_for_len(&pool, 4);

    for set in taken {
        set.close();
    }

    runner.shutdown();
    assert_eq!(pool.len(), 0);

    // every queued and in-flight set was closed exactly once
    assert_eq!(open_fd_count(), fds_before);
}

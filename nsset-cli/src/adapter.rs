//! A module for adapting and validating command-line interface arguments
//! into structured configuration for the core library.

use anyhow::{anyhow, bail, Context, Result};
use nsset_core::{CloneFlags, IdMap, UnshareOpts, CLONE_NEWTIME};
use std::path::PathBuf;
use std::time::Duration;

use crate::parser::Cli;

/// Where the namespace set comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Create the selected kinds fresh.
    Unshare,
    /// Join the selected kinds of a live process.
    Pid(i32),
    /// Join the selected kinds from files in a directory.
    Dir(PathBuf),
}

/// The fully parsed and validated run configuration.
#[derive(Debug)]
pub struct Config {
    /// The selected namespace kinds.
    pub mask: CloneFlags,
    /// Where the set comes from.
    pub source: Source,
    /// Options for creating namespaces (id maps, holder-child timeout).
    pub opts: UnshareOpts,
    /// Directory to bind-mount the set into, if any.
    pub persist: Option<PathBuf>,
    /// The command to execute inside the set; may be empty with `persist`.
    pub command: Vec<String>,
}

/// Translates the parsed `Cli` arguments into a validated [`Config`].
pub fn adapt_and_validate(cli: Cli) -> Result<Config> {
    let mut mask = CloneFlags::empty();
    if cli.all {
        mask = CloneFlags::CLONE_NEWCGROUP
            | CloneFlags::CLONE_NEWIPC
            | CloneFlags::CLONE_NEWNS
            | CloneFlags::CLONE_NEWNET
            | CloneFlags::CLONE_NEWPID
            | CLONE_NEWTIME
            | CloneFlags::CLONE_NEWUTS;
    }
    if cli.cgroup {
        mask |= CloneFlags::CLONE_NEWCGROUP;
    }
    if cli.ipc {
        mask |= CloneFlags::CLONE_NEWIPC;
    }
    if cli.mnt {
        mask |= CloneFlags::CLONE_NEWNS;
    }
    if cli.net {
        mask |= CloneFlags::CLONE_NEWNET;
    }
    if cli.pid {
        mask |= CloneFlags::CLONE_NEWPID;
    }
    if cli.time {
        mask |= CLONE_NEWTIME;
    }
    if cli.user {
        mask |= CloneFlags::CLONE_NEWUSER;
    }
    if cli.uts {
        mask |= CloneFlags::CLONE_NEWUTS;
    }
    if mask.is_empty() {
        bail!("no namespaces selected");
    }

    let source = if let Some(pid) = cli.target_pid {
        Source::Pid(pid)
    } else if let Some(dir) = cli.from_dir {
        Source::Dir(dir)
    } else {
        Source::Unshare
    };

    if !cli.uid_map.is_empty() || !cli.gid_map.is_empty() {
        if !cli.user {
            bail!("--uid-map/--gid-map requires --user");
        }
        if source != Source::Unshare {
            bail!("--uid-map/--gid-map only applies when creating namespaces");
        }
    }

    let mut opts = UnshareOpts::default();
    for triple in &cli.uid_map {
        opts.uid_maps
            .push(parse_id_map(triple).with_context(|| format!("invalid --uid-map {triple:?}"))?);
    }
    for triple in &cli.gid_map {
        opts.gid_maps
            .push(parse_id_map(triple).with_context(|| format!("invalid --gid-map {triple:?}"))?);
    }
    if let Some(secs) = cli.timeout_secs {
        opts.child_wait_timeout = Duration::from_secs(secs);
    }

    if cli.command.is_empty() && cli.persist.is_none() {
        bail!("nothing to do: give a command to run or --persist DIR");
    }

    Ok(Config {
        mask,
        source,
        opts,
        persist: cli.persist,
        command: cli.command,
    })
}

fn parse_id_map(triple: &str) -> Result<IdMap> {
    let mut fields = triple.splitn(3, ':');
    match (fields.next(), fields.next(), fields.next()) {
        (Some(container), Some(host), Some(size)) => Ok(IdMap {
            container_id: container.parse().context("bad container id")?,
            host_id: host.parse().context("bad host id")?,
            size: size.parse().context("bad size")?,
        }),
        _ => Err(anyhow!("expected CONTAINER:HOST:SIZE")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn parse(args: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("nsrun").chain(args.iter().copied()))
    }

    #[test]
    fn builds_mask_from_flags() {
        let config = adapt_and_validate(parse(&["--net", "--ipc", "--", "true"])).unwrap();
        assert_eq!(
            config.mask,
            CloneFlags::CLONE_NEWNET | CloneFlags::CLONE_NEWIPC
        );
        assert_eq!(config.source, Source::Unshare);
    }

    #[test]
    fn all_excludes_user() {
        let config = adapt_and_validate(parse(&["--all", "--", "true"])).unwrap();
        assert!(!config.mask.contains(CloneFlags::CLONE_NEWUSER));
        assert!(config.mask.contains(CloneFlags::CLONE_NEWNS));
    }

    #[test]
    fn parses_id_map_triples_in_order() {
        let config = adapt_and_validate(parse(&[
            "--user", "--uid-map", "0:0:1", "--uid-map", "10000:1000:1000", "--", "true",
        ]))
        .unwrap();
        assert_eq!(
            config.opts.uid_maps,
            vec![
                IdMap {
                    container_id: 0,
                    host_id: 0,
                    size: 1
                },
                IdMap {
                    container_id: 10000,
                    host_id: 1000,
                    size: 1000
                },
            ]
        );
    }

    #[test]
    fn rejects_maps_without_user() {
        let err = adapt_and_validate(parse(&["--net", "--uid-map", "0:0:1", "--", "true"]))
            .unwrap_err();
        assert!(err.to_string().contains("requires --user"));
    }

    #[test]
    fn rejects_empty_selection_and_missing_action() {
        assert!(adapt_and_validate(parse(&["--", "true"])).is_err());
        assert!(adapt_and_validate(parse(&["--net"])).is_err());
    }

    #[test]
    fn rejects_malformed_id_map() {
        let err =
            adapt_and_validate(parse(&["--user", "--uid-map", "0:1", "--", "true"])).unwrap_err();
        assert!(format!("{err:#}").contains("CONTAINER:HOST:SIZE"));
    }
}

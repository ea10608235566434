//! Command-line argument parser using `clap` derive macros.

use clap::Parser;
use std::path::PathBuf;

/// Run a command inside new or existing Linux namespaces.
#[derive(Parser, Debug)]
#[command(
    name = "nsrun",
    version,
    about,
    long_about = "nsrun runs a command inside Linux namespaces. By default the selected \
namespace kinds are created fresh; with --target-pid or --from-dir an existing set is \
joined instead. The namespaces can also be bind-mounted into a directory with --persist \
and picked up again later."
)]
pub struct Cli {
    /// Select the cgroup namespace
    #[arg(long)]
    pub cgroup: bool,

    /// Select the IPC namespace
    #[arg(long)]
    pub ipc: bool,

    /// Select the mount namespace
    #[arg(long)]
    pub mnt: bool,

    /// Select the network namespace
    #[arg(long)]
    pub net: bool,

    /// Select the PID namespace
    #[arg(long)]
    pub pid: bool,

    /// Select the time namespace
    #[arg(long)]
    pub time: bool,

    /// Select the user namespace
    #[arg(long)]
    pub user: bool,

    /// Select the UTS namespace
    #[arg(long)]
    pub uts: bool,

    /// Select every namespace kind except user
    #[arg(long)]
    pub all: bool,

    /// Join the selected namespaces of PID instead of creating new ones
    #[arg(long, value_name = "PID")]
    pub target_pid: Option<i32>,

    /// Join the selected namespaces from files in DIR (as left by --persist)
    #[arg(long, value_name = "DIR", conflicts_with = "target_pid")]
    pub from_dir: Option<PathBuf>,

    /// Map uids into the new user namespace (repeatable; requires --user)
    #[arg(long = "uid-map", value_name = "CONTAINER:HOST:SIZE", action = clap::ArgAction::Append)]
    pub uid_map: Vec<String>,

    /// Map gids into the new user namespace (repeatable; requires --user)
    #[arg(long = "gid-map", value_name = "CONTAINER:HOST:SIZE", action = clap::ArgAction::Append)]
    pub gid_map: Vec<String>,

    /// Bind-mount the namespaces into DIR (the directory must exist)
    #[arg(long, value_name = "DIR")]
    pub persist: Option<PathBuf>,

    /// Seconds to wait for the namespace holder child before killing it
    #[arg(long, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// The command to run inside the namespaces
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

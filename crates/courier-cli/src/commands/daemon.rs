//! Daemon lifecycle: spawn the relay binary as a subprocess and record its
//! pid in settings, stop it again with SIGTERM.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use courier_store::Database;

/// How long a freshly spawned daemon gets to fail fast (port already in
/// use, broken database) before we record its pid.
const STARTUP_CHECK: Duration = Duration::from_secs(1);

/// The daemon binary ships next to the CLI; fall back to PATH lookup when
/// running from an unusual layout.
fn daemon_binary() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("courier-daemon");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("courier-daemon")
}

/// The command used to spawn the daemon.  An explicit database path must
/// reach the child too, otherwise the pid lands in one database while the
/// relay serves another.
fn daemon_command(db_path: Option<&Path>) -> Command {
    let mut command = Command::new(daemon_binary());
    if let Some(path) = db_path {
        command.env("COURIER_DB", path);
    }
    command
}

pub fn up(db: &Database, db_path: Option<&Path>) -> Result<()> {
    if let Some(pid) = db.daemon_pid()? {
        // Stale pids happen after a crash; a live one means a real daemon.
        if kill(Pid::from_raw(pid), None).is_ok() {
            bail!("Daemon already running with pid={pid}");
        }
        tracing::warn!(pid, "clearing stale daemon pid");
        db.clear_daemon_pid()?;
    }

    let mut child = daemon_command(db_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("could not spawn courier-daemon")?;

    std::thread::sleep(STARTUP_CHECK);
    if let Some(status) = child.try_wait()? {
        bail!("Daemon exited immediately with {status}; check that the port is not in use");
    }

    let pid = child.id() as i32;
    if let Err(e) = db.set_daemon_pid(pid) {
        let _ = child.kill();
        return Err(e).context("could not record daemon pid");
    }
    println!("Daemon started with pid={pid}");
    Ok(())
}

pub fn down(db: &Database) -> Result<()> {
    let Some(pid) = db.daemon_pid()? else {
        println!("Daemon is not running");
        return Ok(());
    };

    match kill(Pid::from_raw(pid), Signal::SIGTERM) {
        Ok(()) => println!("Daemon with pid={pid} shut down"),
        Err(Errno::ESRCH) => println!("Looks like the daemon was not running"),
        Err(e) => return Err(e).context("could not signal daemon"),
    }
    db.clear_daemon_pid()?;
    Ok(())
}

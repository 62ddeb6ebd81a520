//! Mount point inspection and the two-phase service launch
//!
//! The filesystem service backgrounds itself once mounted, so launching it
//! returns long before it can serve requests. [`launch`] hands back a
//! [`MountHandle`] and [`await_ready`] polls the mount point until the
//! configured probe passes, the service dies, or the deadline expires.

use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tokio::process::Child;

use crate::common::config::ReadyProbe;
use crate::common::{Error, Result};
use crate::executor::{describe_status, CommandExecutor, ProcessSpec};

/// Interval between readiness probes
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Check if a path is a mount point (different device from parent).
#[cfg(unix)]
pub fn is_mount_point(path: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let path_meta = std::fs::metadata(path)?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let parent_meta = std::fs::metadata(parent)?;

    Ok(path_meta.dev() != parent_meta.dev())
}

#[cfg(not(unix))]
pub fn is_mount_point(path: &Path) -> io::Result<bool> {
    Ok(path.is_dir())
}

/// True only when nothing at all exists at `path`
///
/// A dead FUSE mount fails `stat` with "transport endpoint is not
/// connected"; that still counts as present so it gets unmounted.
pub fn is_absent(path: &Path) -> bool {
    matches!(std::fs::symlink_metadata(path), Err(e) if e.kind() == io::ErrorKind::NotFound)
}

/// Evaluate a readiness probe once
pub fn probe_ready(path: &Path, probe: ReadyProbe) -> bool {
    let listable = std::fs::read_dir(path).is_ok();
    match probe {
        ReadyProbe::Listable => listable,
        ReadyProbe::Mounted => listable && is_mount_point(path).unwrap_or(false),
    }
}

/// A launched filesystem service
#[derive(Debug)]
pub struct MountHandle {
    child: Child,
    mount_dir: PathBuf,
}

/// Launch `<service> <args...> <mount_dir>` without waiting for it
pub fn launch(
    executor: &CommandExecutor,
    service: &ProcessSpec,
    mount_dir: &Path,
) -> Result<MountHandle> {
    let spec = service
        .clone()
        .arg(mount_dir.to_string_lossy().into_owned());
    let child = executor.launch_detached(&spec)?;

    tracing::debug!("Launched '{}' (pid {:?})", spec, child.id());

    Ok(MountHandle {
        child,
        mount_dir: mount_dir.to_path_buf(),
    })
}

/// Poll until the mount point passes `probe`
///
/// A launcher that exits successfully is assumed to have daemonized and
/// polling continues; a non-zero exit fails immediately.
pub async fn await_ready(
    handle: &mut MountHandle,
    probe: ReadyProbe,
    timeout: Duration,
) -> Result<()> {
    // A timeout too large to represent waits indefinitely
    let deadline = Instant::now().checked_add(timeout);
    let mut launcher_done = false;

    loop {
        if probe_ready(&handle.mount_dir, probe) {
            tracing::debug!("Mount point {} is ready", handle.mount_dir.display());
            return Ok(());
        }

        if !launcher_done {
            if let Some(status) = handle.child.try_wait()? {
                if !status.success() {
                    return Err(Error::ServiceExited {
                        status: describe_status(&status),
                    });
                }
                tracing::debug!("Service launcher exited cleanly, waiting for mount");
                launcher_done = true;
            }
        }

        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Error::mount_timeout(&handle.mount_dir, timeout.as_secs()));
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

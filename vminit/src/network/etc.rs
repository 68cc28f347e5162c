//! `/etc/hostname`, `/etc/hosts` and `/etc/resolv.conf` of the guest.

use crate::constants::{modes, paths};
use crate::world::{World, ensure_dir};
use nix::sys::stat::Mode;
use std::fmt::Write as _;
use std::path::Path;
use vminit_shared::{EtcHost, EtcResolv, InitError, InitResult};

const LOCALHOST_V4: &str =
    "127.0.0.1\tlocalhost localhost.localdomain localhost4 localhost4.localdomain4";
const LOCALHOST_V6: &str =
    "::1\tlocalhost localhost.localdomain localhost6 localhost6.localdomain6";

/// Loopback defaults followed by the configured entries.
pub fn render_hosts(entries: &[EtcHost]) -> String {
    let mut out = format!("{}\n{}\n", LOCALHOST_V4, LOCALHOST_V6);
    for entry in entries {
        if !entry.desc.is_empty() {
            let _ = writeln!(out, "# {}", entry.desc);
        }
        let _ = writeln!(out, "{}\t{}", entry.ip, entry.host);
    }
    out
}

pub fn render_resolv(resolv: &EtcResolv) -> String {
    let mut out = String::new();
    for nameserver in &resolv.nameservers {
        let _ = write!(out, "\nnameserver\t{}", nameserver);
    }
    out.push('\n');
    out
}

/// Kernel hostname and `/etc/hostname`, skipped for an empty name, then
/// `/etc/hosts` and `/etc/resolv.conf`.
pub fn write_host_files(
    world: &mut dyn World,
    hostname: &str,
    hosts: &[EtcHost],
    resolv: &EtcResolv,
) -> InitResult<()> {
    ensure_dir(world, Path::new(paths::ETC_DIR), Mode::from_bits_truncate(modes::DIR_0755))
        .map_err(|e| InitError::Storage(format!("failed to create {}: {}", paths::ETC_DIR, e)))?;

    if hostname.is_empty() {
        tracing::warn!("No hostname configured, keeping kernel default");
    } else {
        world
            .sethostname(hostname)
            .map_err(|e| InitError::Internal(format!("sethostname({}): {}", hostname, e)))?;
        write_etc(world, paths::ETC_HOSTNAME, format!("{}\n", hostname))?;
        tracing::info!(hostname = %hostname, "Hostname set");
    }

    write_etc(world, paths::ETC_HOSTS, render_hosts(hosts))?;
    write_etc(world, paths::ETC_RESOLV, render_resolv(resolv))?;
    Ok(())
}

fn write_etc(world: &mut dyn World, path: &str, contents: String) -> InitResult<()> {
    world
        .write_file(
            Path::new(path),
            contents.as_bytes(),
            Mode::from_bits_truncate(modes::FILE_0644),
        )
        .map_err(|e| InitError::Storage(format!("failed to write {}: {}", path, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Op, RecordingWorld};
    use nix::errno::Errno;

    fn host(ip: &str, host: &str, desc: &str) -> EtcHost {
        EtcHost {
            ip: ip.to_string(),
            host: host.to_string(),
            desc: desc.to_string(),
        }
    }

    #[test]
    fn test_render_hosts() {
        let out = render_hosts(&[
            host("10.0.0.2", "db", "database"),
            host("10.0.0.3", "cache", ""),
        ]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with("127.0.0.1\tlocalhost"));
        assert!(lines[1].starts_with("::1\tlocalhost"));
        assert_eq!(&lines[2..], &["# database", "10.0.0.2\tdb", "10.0.0.3\tcache"]);
    }

    #[test]
    fn test_render_resolv() {
        let resolv = EtcResolv {
            nameservers: vec!["1.1.1.1".into(), "8.8.8.8".into()],
        };
        assert_eq!(
            render_resolv(&resolv),
            "\nnameserver\t1.1.1.1\nnameserver\t8.8.8.8\n"
        );
        assert_eq!(render_resolv(&EtcResolv::default()), "\n");
    }

    #[test]
    fn test_writes_all_files() {
        let mut world = RecordingWorld::new();
        write_host_files(&mut world, "test", &[], &EtcResolv::default()).unwrap();

        assert_eq!(world.hostname(), Some("test"));
        assert_eq!(world.file("/etc/hostname"), Some(&b"test\n"[..]));
        assert!(world.file("/etc/hosts").is_some());
        assert_eq!(world.file("/etc/resolv.conf"), Some(&b"\n"[..]));
        assert!(world.ops().iter().all(|op| match op {
            Op::WriteFile { mode, .. } => *mode == 0o644,
            _ => true,
        }));
    }

    #[test]
    fn test_empty_hostname_skips_kernel_and_file() {
        let mut world = RecordingWorld::new().with_dir("/etc");
        write_host_files(&mut world, "", &[], &EtcResolv::default()).unwrap();

        assert_eq!(world.count(|op| matches!(op, Op::Sethostname(_))), 0);
        assert!(world.file("/etc/hostname").is_none());
        assert!(world.file("/etc/hosts").is_some());
    }

    #[test]
    fn test_sethostname_failure_is_fatal() {
        let mut world = RecordingWorld::new()
            .fail_when(|op| matches!(op, Op::Sethostname(_)), Errno::EPERM);
        write_host_files(&mut world, "test", &[], &EtcResolv::default()).unwrap_err();
        assert_eq!(world.count(|op| matches!(op, Op::WriteFile { .. })), 0);
    }
}

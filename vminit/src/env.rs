//! Workload environment validation and application.

use crate::identity::Identity;
use crate::world::World;
use std::fmt;
use vminit_shared::{InitError, InitResult};

/// One validated `NAME=VALUE` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl fmt::Display for EnvVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Split on the first `=`. The value may be empty; the name may not.
pub fn parse_env_entry(entry: &str) -> InitResult<EnvVar> {
    let (name, value) = entry
        .split_once('=')
        .ok_or_else(|| InitError::Config(format!("invalid env entry (missing '='): {:?}", entry)))?;
    if name.is_empty() {
        return Err(InitError::Config(format!(
            "invalid env entry (empty name): {:?}",
            entry
        )));
    }
    if name.contains('\0') || value.contains('\0') {
        return Err(InitError::Config(format!(
            "invalid env entry (contains NUL): {:?}",
            entry
        )));
    }
    Ok(EnvVar {
        name: name.to_string(),
        value: value.to_string(),
    })
}

/// Validate every entry, apply them in order, then default `HOME`.
///
/// Returns the workload environment: the validated entries plus `HOME` when
/// they did not name it.
pub fn apply_environment(
    world: &mut dyn World,
    entries: &[String],
    identity: &Identity,
) -> InitResult<Vec<EnvVar>> {
    let mut vars = entries
        .iter()
        .map(|entry| parse_env_entry(entry))
        .collect::<InitResult<Vec<_>>>()?;

    for var in &vars {
        world
            .set_env(&var.name, &var.value)
            .map_err(|e| InitError::Internal(format!("failed to set {}: {}", var.name, e)))?;
    }

    if world.get_env("HOME").is_none() {
        let home = identity.home.to_string_lossy().into_owned();
        tracing::debug!(home = %home, "HOME not set, using identity home");
        world
            .set_env("HOME", &home)
            .map_err(|e| InitError::Internal(format!("failed to set HOME: {}", e)))?;
    }

    if !vars.iter().any(|v| v.name == "HOME") {
        if let Some(home) = world.get_env("HOME") {
            vars.push(EnvVar {
                name: "HOME".to_string(),
                value: home,
            });
        }
    }

    Ok(vars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{Op, RecordingWorld};
    use nix::unistd::{Gid, Uid};
    use std::path::PathBuf;

    fn identity() -> Identity {
        Identity {
            uid: Uid::from_raw(1000),
            gid: Gid::from_raw(1000),
            home: PathBuf::from("/home/app"),
        }
    }

    #[test]
    fn test_rejects_malformed_entries() {
        for entry in ["NOEQUALSIGN", "=novalue", "KEY=va\0lue", "K\0EY=value"] {
            assert!(
                matches!(parse_env_entry(entry), Err(InitError::Config(_))),
                "{:?} should be rejected",
                entry
            );
        }
    }

    #[test]
    fn test_accepts_empty_value_and_extra_equals() {
        assert_eq!(
            parse_env_entry("KEY=value").unwrap(),
            EnvVar {
                name: "KEY".into(),
                value: "value".into()
            }
        );
        assert_eq!(parse_env_entry("KEY=").unwrap().value, "");
        assert_eq!(parse_env_entry("OPTS=a=b").unwrap().value, "a=b");
    }

    #[test]
    fn test_nothing_applied_when_any_entry_invalid() {
        let mut world = RecordingWorld::new();
        let entries = vec!["A=1".to_string(), "BROKEN".to_string()];
        apply_environment(&mut world, &entries, &identity()).unwrap_err();
        assert!(world.ops().is_empty());
    }

    #[test]
    fn test_home_defaults_to_identity() {
        let mut world = RecordingWorld::new();
        let entries = vec!["PATH=/bin".to_string(), "A=1".to_string(), "A=2".to_string()];
        let vars = apply_environment(&mut world, &entries, &identity()).unwrap();

        assert_eq!(world.env("A"), Some("2"));
        assert_eq!(world.env("HOME"), Some("/home/app"));
        assert_eq!(
            vars.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["PATH=/bin", "A=1", "A=2", "HOME=/home/app"]
        );
    }

    #[test]
    fn test_explicit_home_wins() {
        let mut world = RecordingWorld::new();
        let entries = vec!["HOME=/srv".to_string()];
        let vars = apply_environment(&mut world, &entries, &identity()).unwrap();

        assert_eq!(world.env("HOME"), Some("/srv"));
        assert_eq!(vars.len(), 1);
        assert_eq!(
            world.count(|op| matches!(op, Op::SetEnv { key, .. } if key == "HOME")),
            1
        );
    }

    #[test]
    fn test_inherited_home_is_kept() {
        let mut world = RecordingWorld::new().with_env("HOME", "/");
        let vars = apply_environment(&mut world, &[], &identity()).unwrap();
        assert_eq!(world.env("HOME"), Some("/"));
        assert_eq!(vars, vec![EnvVar { name: "HOME".into(), value: "/".into() }]);
    }
}

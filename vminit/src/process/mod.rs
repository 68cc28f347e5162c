//! The supervised workload: argument vector, environment, launch and wait.

mod launcher;
mod stdio;
mod supervisor;

pub use launcher::{HostLauncher, Launcher, Workload, WorkloadExit};
pub use stdio::{InheritedStdio, WorkloadStdio};
pub use supervisor::{Supervisor, SupervisorState};

use crate::constants;
use crate::env::EnvVar;
use std::path::{Path, PathBuf};
use vminit_shared::{InitError, InitResult, MachineConfig};

/// Everything needed to spawn the workload. Built once per boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProcess {
    pub argv: Vec<String>,
    pub env: Vec<EnvVar>,
    pub working_dir: Option<PathBuf>,
}

impl ResolvedProcess {
    /// `entrypoint ++ cmd`, or the override when it is non-empty.
    pub fn build(config: &MachineConfig, env: Vec<EnvVar>) -> InitResult<Self> {
        let argv = match config.cmd_override() {
            Some(argv) => argv.to_vec(),
            None => {
                let image = &config.image_config;
                if image.cmd.is_empty() {
                    return Err(InitError::Config(
                        "no command specified: imageConfig.cmd is empty".to_string(),
                    ));
                }
                image
                    .entrypoint
                    .iter()
                    .chain(image.cmd.iter())
                    .cloned()
                    .collect()
            }
        };

        let working_dir = Some(config.image_config.working_dir.as_str())
            .filter(|dir| !dir.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            argv,
            env,
            working_dir,
        })
    }

    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .rev()
            .find(|var| var.name == name)
            .map(|var| var.value.as_str())
    }

    pub fn env_pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.env
            .iter()
            .map(|var| (var.name.as_str(), var.value.as_str()))
    }
}

/// Locate `argv[0]` through the workload's `PATH`.
///
/// Names containing a `/` are checked relative to the working directory
/// instead of searched.
pub fn resolve_program(process: &ResolvedProcess) -> InitResult<PathBuf> {
    let program = process
        .argv
        .first()
        .ok_or_else(|| InitError::Config("empty argument vector".to_string()))?;
    let search_path = process
        .env_value("PATH")
        .unwrap_or(constants::process::DEFAULT_PATH);
    let cwd = process
        .working_dir
        .as_deref()
        .unwrap_or_else(|| Path::new("/"));

    which::which_in(program, Some(search_path), cwd).map_err(|e| {
        InitError::Workload(format!(
            "executable {} not found in {}: {}",
            program, search_path, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use vminit_shared::ImageConfig;

    fn config(entrypoint: &[&str], cmd: &[&str]) -> MachineConfig {
        MachineConfig {
            image_config: ImageConfig {
                entrypoint: entrypoint.iter().map(|s| s.to_string()).collect(),
                cmd: cmd.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn var(name: &str, value: &str) -> EnvVar {
        EnvVar {
            name: name.into(),
            value: value.into(),
        }
    }

    #[test]
    fn test_entrypoint_then_cmd() {
        let process =
            ResolvedProcess::build(&config(&["/bin/sh", "-c"], &["echo hi"]), vec![]).unwrap();
        assert_eq!(process.argv, vec!["/bin/sh", "-c", "echo hi"]);
        assert_eq!(process.working_dir, None);
    }

    #[test]
    fn test_missing_cmd_is_config_error() {
        let err = ResolvedProcess::build(&config(&["/bin/sh"], &[]), vec![]).unwrap_err();
        assert!(matches!(err, InitError::Config(_)));
    }

    #[test]
    fn test_override_replaces_entrypoint_and_cmd() {
        let mut cfg = config(&["/bin/sh", "-c"], &[]);
        cfg.cmd_override = vec!["/bin/echo".into(), "over".into()];
        let process = ResolvedProcess::build(&cfg, vec![]).unwrap();
        assert_eq!(process.argv, vec!["/bin/echo", "over"]);
    }

    #[test]
    fn test_working_dir() {
        let mut cfg = config(&[], &["/bin/true"]);
        cfg.image_config.working_dir = "/srv".into();
        let process = ResolvedProcess::build(&cfg, vec![]).unwrap();
        assert_eq!(process.working_dir, Some(PathBuf::from("/srv")));
    }

    #[test]
    fn test_resolve_program_searches_path() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("tool");
        std::fs::write(&bin, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&bin, std::fs::Permissions::from_mode(0o755)).unwrap();

        let process = ResolvedProcess {
            argv: vec!["tool".into()],
            env: vec![var("PATH", &dir.path().to_string_lossy())],
            working_dir: None,
        };
        assert_eq!(resolve_program(&process).unwrap(), bin);
    }

    #[test]
    fn test_resolve_program_default_path() {
        let process = ResolvedProcess {
            argv: vec!["sh".into()],
            env: vec![],
            working_dir: None,
        };
        let found = resolve_program(&process).unwrap();
        assert!(found.ends_with("sh"));
    }

    #[test]
    fn test_unknown_program_is_workload_error() {
        let process = ResolvedProcess {
            argv: vec!["definitely-not-installed-here".into()],
            env: vec![var("PATH", "/nonexistent")],
            working_dir: None,
        };
        assert!(matches!(
            resolve_program(&process),
            Err(InitError::Workload(_))
        ));
    }
}

//! Machine configuration document.
//!
//! The host writes a JSON document into the initial root before boot. Field
//! names are accepted both in the PascalCase emitted by the host tooling
//! (`ImageConfig`, `RootDevice`, `EtcResolv`, ...), in camelCase and in all
//! lowercase. `null` lists decode as empty lists.

use crate::errors::{InitError, InitResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

/// Complete guest configuration, read once and never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MachineConfig {
    #[serde(alias = "imageConfig", alias = "imageconfig", deserialize_with = "null_as_default")]
    pub image_config: ImageConfig,

    /// Block device holding the guest root filesystem.
    #[serde(alias = "rootDevice", alias = "rootdevice", deserialize_with = "null_as_default")]
    pub root_device: String,

    /// Attach the workload to a pseudo-terminal (default) or hand it the
    /// console descriptors directly.
    #[serde(rename = "TTY", alias = "tty", alias = "Tty")]
    pub tty: Option<bool>,

    #[serde(alias = "hostname", deserialize_with = "null_as_default")]
    pub hostname: String,

    /// Extra block devices to mount for the workload.
    #[serde(alias = "mounts", deserialize_with = "null_as_default")]
    pub mounts: Vec<MountRequest>,

    #[serde(alias = "etcResolv", alias = "etcresolv", deserialize_with = "null_as_default")]
    pub etc_resolv: EtcResolv,

    #[serde(
        alias = "etcHost",
        alias = "etchost",
        alias = "etcHosts",
        deserialize_with = "null_as_default"
    )]
    pub etc_host: Vec<EtcHost>,

    /// Replaces entrypoint + cmd entirely when non-empty.
    #[serde(alias = "cmdOverride", alias = "cmdoverride", deserialize_with = "null_as_default")]
    pub cmd_override: Vec<String>,

    /// Appended to the image environment.
    #[serde(alias = "extraEnv", alias = "extraenv", deserialize_with = "null_as_default")]
    pub extra_env: Vec<String>,

    #[serde(alias = "rootSwitch", alias = "rootswitch", deserialize_with = "null_as_default")]
    pub root_switch: RootSwitchMode,
}

impl MachineConfig {
    pub fn from_json(contents: &str) -> InitResult<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn tty_enabled(&self) -> bool {
        self.tty.unwrap_or(true)
    }

    /// Image environment followed by the extra entries, in order.
    pub fn workload_env(&self) -> Vec<String> {
        self.image_config
            .env
            .iter()
            .chain(self.extra_env.iter())
            .cloned()
            .collect()
    }

    pub fn cmd_override(&self) -> Option<&[String]> {
        if self.cmd_override.is_empty() {
            None
        } else {
            Some(&self.cmd_override)
        }
    }
}

/// Subset of the OCI image configuration needed to run the workload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageConfig {
    #[serde(alias = "cmd", deserialize_with = "null_as_default")]
    pub cmd: Vec<String>,
    #[serde(alias = "entrypoint", deserialize_with = "null_as_default")]
    pub entrypoint: Vec<String>,
    /// `NAME=VALUE` entries.
    #[serde(alias = "env", deserialize_with = "null_as_default")]
    pub env: Vec<String>,
    #[serde(alias = "workingDir", alias = "workingdir", deserialize_with = "null_as_default")]
    pub working_dir: String,
    /// `user[:group]`; empty means root.
    #[serde(alias = "user", deserialize_with = "null_as_default")]
    pub user: String,
}

/// Guest-declared extra volume: a block device and where to mount it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MountRequest {
    #[serde(alias = "mountPath", alias = "mountpath", deserialize_with = "null_as_default")]
    pub mount_path: String,
    #[serde(alias = "devicePath", alias = "devicepath", deserialize_with = "null_as_default")]
    pub device_path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EtcResolv {
    #[serde(alias = "nameservers", deserialize_with = "null_as_default")]
    pub nameservers: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EtcHost {
    #[serde(alias = "host", deserialize_with = "null_as_default")]
    pub host: String,
    #[serde(rename = "IP", alias = "ip", alias = "Ip", deserialize_with = "null_as_default")]
    pub ip: String,
    #[serde(
        rename = "Desc",
        alias = "desc",
        alias = "description",
        deserialize_with = "null_as_default"
    )]
    pub desc: String,
}

/// How the boot sequencer replaces the initial root with the root device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootSwitchMode {
    /// Move-mount the new root over `/` and chroot into it.
    #[default]
    Move,
    /// Bind the new root onto itself, pivot_root, detach the old root.
    Pivot,
}

/// Read and decode the machine configuration at `path`.
pub fn decode_machine(path: impl AsRef<Path>) -> InitResult<MachineConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| {
        InitError::Config(format!(
            "could not read machine config {}: {}",
            path.display(),
            e
        ))
    })?;
    MachineConfig::from_json(&contents)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_decode_host_tooling_document() {
        let json = r#"{
            "ImageConfig": {
                "Cmd": ["/bin/true"],
                "Entrypoint": null,
                "Env": ["PATH=/usr/bin:/bin"],
                "WorkingDir": "",
                "User": ""
            },
            "RootDevice": "/dev/vdb",
            "TTY": false,
            "Hostname": "test",
            "Mounts": [{"MountPath": "/data", "DevicePath": "/dev/vdc"}],
            "EtcResolv": {"Nameservers": ["8.8.8.8"]},
            "EtcHost": [{"Host": "db", "IP": "10.0.0.2", "Desc": "database"}]
        }"#;

        let config = MachineConfig::from_json(json).unwrap();
        assert_eq!(config.image_config.cmd, vec!["/bin/true"]);
        assert!(config.image_config.entrypoint.is_empty());
        assert_eq!(config.root_device, "/dev/vdb");
        assert!(!config.tty_enabled());
        assert_eq!(config.hostname, "test");
        assert_eq!(config.mounts[0].mount_path, "/data");
        assert_eq!(config.mounts[0].device_path, "/dev/vdc");
        assert_eq!(config.etc_resolv.nameservers, vec!["8.8.8.8"]);
        assert_eq!(config.etc_host[0].ip, "10.0.0.2");
        assert_eq!(config.etc_host[0].desc, "database");
        assert_eq!(config.root_switch, RootSwitchMode::Move);
    }

    #[test]
    fn test_decode_camel_case_document() {
        let json = r#"{
            "imageConfig": {"cmd": ["echo hi"], "entrypoint": ["/bin/sh", "-c"], "user": "app:staff"},
            "hostname": "vm",
            "etcHost": [{"host": "gw", "ip": "10.0.0.1", "description": "gateway"}],
            "cmdOverride": ["/bin/bash"],
            "rootSwitch": "pivot"
        }"#;

        let config = MachineConfig::from_json(json).unwrap();
        assert_eq!(config.image_config.entrypoint, vec!["/bin/sh", "-c"]);
        assert_eq!(config.image_config.user, "app:staff");
        assert_eq!(config.etc_host[0].desc, "gateway");
        assert_eq!(config.cmd_override(), Some(&["/bin/bash".to_string()][..]));
        assert_eq!(config.root_switch, RootSwitchMode::Pivot);
        assert!(config.tty_enabled());
    }

    #[test]
    fn test_decode_lowercase_document() {
        let json = r#"{
            "imageconfig": {"cmd": ["/bin/true"], "workingdir": "/srv"},
            "rootdevice": "/dev/vdc",
            "mounts": [{"mountpath": "/data", "devicepath": "/dev/vdb"}],
            "etcresolv": {"nameservers": ["1.1.1.1"]},
            "etchost": [{"host": "db", "ip": "10.0.0.2"}],
            "extraenv": ["A=1"],
            "rootswitch": "pivot"
        }"#;

        let config = MachineConfig::from_json(json).unwrap();
        assert_eq!(config.image_config.working_dir, "/srv");
        assert_eq!(config.root_device, "/dev/vdc");
        assert_eq!(config.mounts[0].mount_path, "/data");
        assert_eq!(config.mounts[0].device_path, "/dev/vdb");
        assert_eq!(config.etc_resolv.nameservers, vec!["1.1.1.1"]);
        assert_eq!(config.etc_host[0].host, "db");
        assert_eq!(config.extra_env, vec!["A=1"]);
        assert_eq!(config.root_switch, RootSwitchMode::Pivot);
    }

    #[test]
    fn test_workload_env_appends_extra_entries() {
        let config = MachineConfig {
            image_config: ImageConfig {
                env: vec!["A=1".into()],
                ..Default::default()
            },
            extra_env: vec!["B=2".into()],
            ..Default::default()
        };
        assert_eq!(config.workload_env(), vec!["A=1", "B=2"]);
        assert_eq!(config.cmd_override(), None);
    }

    #[test]
    fn test_decode_machine_missing_file() {
        let dir = tempdir().unwrap();
        let result = decode_machine(dir.path().join("run.json"));
        assert!(matches!(result, Err(InitError::Config(_))));
    }

    #[test]
    fn test_decode_machine_malformed_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(decode_machine(&path), Err(InitError::Json(_))));
    }
}

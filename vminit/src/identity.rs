//! Resolving the workload's `user[:group]` specifier to numeric credentials.

use crate::constants::paths;
use crate::world::World;
use nix::errno::Errno;
use nix::unistd::{Gid, Uid};
use std::path::{Path, PathBuf};
use vminit_shared::{InitError, InitResult};

/// Credentials the workload runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: Uid,
    pub gid: Gid,
    pub home: PathBuf,
}

/// Parsed `user[:group]` specifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSpec {
    pub user: String,
    pub group: Option<String>,
}

impl UserSpec {
    /// An empty specifier means `root`.
    pub fn parse(spec: &str) -> InitResult<Self> {
        let spec = if spec.is_empty() { "root" } else { spec };
        // Fields past the group are ignored.
        let mut fields = spec.split(':');
        let user = fields.next().unwrap_or_default();
        let group = fields.next().map(str::to_string);
        if user.is_empty() {
            return Err(InitError::Config(format!(
                "no username set in user specifier '{}'",
                spec
            )));
        }
        Ok(Self {
            user: user.to_string(),
            group,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswdEntry {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupEntry {
    pub name: String,
    pub gid: u32,
}

/// Contents of the guest's user and group databases.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDatabase {
    users: Vec<PasswdEntry>,
    groups: Vec<GroupEntry>,
}

impl UserDatabase {
    /// Parse `passwd(5)` and `group(5)` text. Malformed lines are skipped.
    pub fn parse(passwd: &str, group: &str) -> Self {
        let users = records(passwd)
            .filter_map(|fields| {
                Some(PasswdEntry {
                    name: fields.first()?.to_string(),
                    uid: fields.get(2)?.parse().ok()?,
                    gid: fields.get(3)?.parse().ok()?,
                    home: fields.get(5)?.to_string(),
                })
            })
            .collect();
        let groups = records(group)
            .filter_map(|fields| {
                Some(GroupEntry {
                    name: fields.first()?.to_string(),
                    gid: fields.get(2)?.parse().ok()?,
                })
            })
            .collect();
        Self { users, groups }
    }

    /// Read `/etc/passwd` and `/etc/group` of the current root. A missing
    /// file counts as an empty database.
    pub fn load(world: &dyn World) -> InitResult<Self> {
        let passwd = read_optional(world, Path::new(paths::ETC_PASSWD))?;
        let group = read_optional(world, Path::new(paths::ETC_GROUP))?;
        Ok(Self::parse(&passwd, &group))
    }

    /// Match by name first, then by numeric id.
    pub fn lookup_user(&self, user: &str) -> Option<&PasswdEntry> {
        self.users.iter().find(|u| u.name == user).or_else(|| {
            let uid: u32 = user.parse().ok()?;
            self.users.iter().find(|u| u.uid == uid)
        })
    }

    pub fn lookup_group(&self, group: &str) -> Option<&GroupEntry> {
        self.groups.iter().find(|g| g.name == group).or_else(|| {
            let gid: u32 = group.parse().ok()?;
            self.groups.iter().find(|g| g.gid == gid)
        })
    }
}

fn records(text: &str) -> impl Iterator<Item = Vec<&str>> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.split(':').collect())
}

fn read_optional(world: &dyn World, path: &Path) -> InitResult<String> {
    match world.read_file(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(Errno::ENOENT) => {
            tracing::debug!(path = %path.display(), "Database file missing, treating as empty");
            Ok(String::new())
        }
        Err(e) => Err(InitError::Storage(format!(
            "failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

/// Resolve `spec` against `db`.
///
/// The group part, when present, overrides the user's primary gid. A numeric
/// user that is not in the database resolves to that uid with gid 0 and home
/// `/`.
pub fn resolve_identity(spec: &str, db: &UserDatabase) -> InitResult<Identity> {
    let spec = UserSpec::parse(spec)?;

    let group_override = match &spec.group {
        Some(group) => {
            let entry = db.lookup_group(group).ok_or_else(|| {
                InitError::NotFound(format!("group not found: {}", group))
            })?;
            Some(Gid::from_raw(entry.gid))
        }
        None => None,
    };

    let (uid, gid, home) = match db.lookup_user(&spec.user) {
        Some(entry) => (entry.uid, entry.gid, PathBuf::from(&entry.home)),
        None => match spec.user.parse::<u32>() {
            Ok(uid) => (uid, 0, PathBuf::from("/")),
            Err(_) => {
                return Err(InitError::NotFound(format!(
                    "user not found: {}",
                    spec.user
                )));
            }
        },
    };

    Ok(Identity {
        uid: Uid::from_raw(uid),
        gid: group_override.unwrap_or(Gid::from_raw(gid)),
        home,
    })
}

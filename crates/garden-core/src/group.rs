//! Peer groups and the counts derived from them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The role a connected peer plays in the installation.
///
/// Each group gets its own channel endpoint and determines the
/// audience for broadcasts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Group {
    /// Control panel issuing commands and observing state.
    Config,
    /// Display client rendering the scene.
    Screen,
    /// Input device steering a reflector.
    Client,
}

impl Group {
    /// All groups, in announcement order.
    pub const ALL: [Group; 3] = [Group::Client, Group::Screen, Group::Config];

    /// Returns the lowercase group name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Screen => "screen",
            Self::Client => "client",
        }
    }

    /// Returns the request path this group connects on.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Config => "/config",
            Self::Screen => "/screen",
            Self::Client => "/client",
        }
    }

    /// Resolves a request path such as `/screen` or `/client/` to a group.
    ///
    /// Query strings are ignored. Returns `None` for any other path.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split('?').next().unwrap_or_default();
        let trimmed = path.trim_end_matches('/');
        Self::ALL.into_iter().find(|g| g.path() == trimmed)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live peer counts per group.
///
/// Always derived from the registry at read time, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedCounts {
    pub configs: usize,
    pub screens: usize,
    pub clients: usize,
}

impl ConnectedCounts {
    /// Returns the count for a single group.
    pub fn get(&self, group: Group) -> usize {
        match group {
            Group::Config => self.configs,
            Group::Screen => self.screens,
            Group::Client => self.clients,
        }
    }

    /// Builds counts by asking `count_of` for every group.
    pub fn collect(mut count_of: impl FnMut(Group) -> usize) -> Self {
        Self {
            configs: count_of(Group::Config),
            screens: count_of(Group::Screen),
            clients: count_of(Group::Client),
        }
    }

    /// Total number of peers across all groups.
    pub fn total(&self) -> usize {
        self.configs + self.screens + self.clients
    }
}

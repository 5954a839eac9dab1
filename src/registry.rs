//! Per-connection channel and user tracking.
//!
//! The registry is owned by the connection and lives exactly as long as
//! it does: entries appear optimistically when a join is requested, are
//! confirmed by the server's JOIN echo, and vanish on PART confirmation
//! or teardown.

use std::collections::{HashMap, HashSet};

use tracing::debug;

/// Normalize a channel name: leading `#` added if missing, ASCII
/// lowercased (channel names are case-insensitive).
pub fn normalize_channel(name: &str) -> String {
    let mut chan = if name.starts_with('#') {
        name.to_owned()
    } else {
        format!("#{name}")
    };
    chan.make_ascii_lowercase();
    chan
}

/// A joined (or join-pending) channel and the users seen in it.
#[derive(Debug, Clone)]
pub struct Channel {
    /// Channel name, including the leading `#`.
    pub name: String,
    /// Set once the server confirms our membership.
    pub joined: bool,
    /// Nicknames present, excluding the local user.
    pub users: HashSet<String>,
}

impl Channel {
    fn pending(name: &str) -> Self {
        Channel {
            name: name.to_owned(),
            joined: false,
            users: HashSet::new(),
        }
    }
}

/// What a registry mutation did, so the session can emit the matching
/// event after the state is already consistent.
#[derive(Debug, PartialEq, Eq)]
pub enum MembershipChange {
    /// Our own JOIN was confirmed.
    LocalJoined {
        /// Channel name.
        channel: String,
    },
    /// Our own PART was confirmed; the entry is gone.
    LocalParted {
        /// Channel name.
        channel: String,
    },
    /// Another user appeared in a tracked channel.
    UserJoined {
        /// Channel name.
        channel: String,
        /// The user's nickname.
        nickname: String,
    },
    /// Another user left a tracked channel.
    UserLeft {
        /// Channel name.
        channel: String,
        /// The user's nickname.
        nickname: String,
    },
    /// Nothing tracked changed.
    NoChange,
}

/// Registry of channels for a single connection.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    channels: HashMap<String, Channel>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        ChannelRegistry::default()
    }

    /// Record an optimistic join request. The entry starts unconfirmed;
    /// an existing entry is left as-is.
    pub fn track_pending(&mut self, channel: &str) {
        self.channels
            .entry(channel.to_owned())
            .or_insert_with(|| Channel::pending(channel));
    }

    /// Apply an inbound JOIN from `nick`.
    pub fn apply_join(&mut self, channel: &str, nick: &str, local_nick: &str) -> MembershipChange {
        let channel = normalize_channel(channel);
        if nick.eq_ignore_ascii_case(local_nick) {
            let entry = self
                .channels
                .entry(channel.clone())
                .or_insert_with(|| Channel::pending(&channel));
            entry.joined = true;
            debug!(channel = %channel, "membership confirmed");
            return MembershipChange::LocalJoined { channel };
        }
        match self.channels.get_mut(&channel) {
            Some(entry) => {
                if entry.users.insert(nick.to_owned()) {
                    MembershipChange::UserJoined {
                        channel,
                        nickname: nick.to_owned(),
                    }
                } else {
                    MembershipChange::NoChange
                }
            }
            None => MembershipChange::NoChange,
        }
    }

    /// Apply an inbound PART from `nick`.
    ///
    /// A confirmed local PART removes the whole entry, user state
    /// included.
    pub fn apply_part(&mut self, channel: &str, nick: &str, local_nick: &str) -> MembershipChange {
        let channel = normalize_channel(channel);
        if nick.eq_ignore_ascii_case(local_nick) {
            if self.channels.remove(&channel).is_some() {
                debug!(channel = %channel, "channel entry removed");
                return MembershipChange::LocalParted { channel };
            }
            return MembershipChange::NoChange;
        }
        match self.channels.get_mut(&channel) {
            Some(entry) => {
                if entry.users.remove(nick) {
                    MembershipChange::UserLeft {
                        channel,
                        nickname: nick.to_owned(),
                    }
                } else {
                    MembershipChange::NoChange
                }
            }
            None => MembershipChange::NoChange,
        }
    }

    /// Apply a NAMES reply: a space-separated nickname list, possibly
    /// carrying membership prefix sigils. The local nick is excluded.
    pub fn apply_names(&mut self, channel: &str, names: &str, local_nick: &str) {
        let channel = normalize_channel(channel);
        let Some(entry) = self.channels.get_mut(&channel) else {
            return;
        };
        for name in names.split_whitespace() {
            let nick = name.trim_start_matches(['@', '+', '%', '&', '~']);
            if nick.is_empty() || nick.eq_ignore_ascii_case(local_nick) {
                continue;
            }
            entry.users.insert(nick.to_owned());
        }
    }

    /// Look up a channel by normalized name.
    pub fn get(&self, channel: &str) -> Option<&Channel> {
        self.channels.get(channel)
    }

    /// Iterate over all tracked channels.
    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Number of tracked channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channels are tracked.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

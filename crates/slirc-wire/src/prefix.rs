//! Message source prefixes.

use std::fmt;

/// The source of a message: the server itself, or a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prefix {
    /// A server name, e.g. `chat.straylight.net`.
    Server(String),
    /// A user in `nick[!user][@host]` form.
    User {
        /// Nickname.
        nick: String,
        /// Ident/username; empty when absent.
        user: String,
        /// Hostname; empty when absent.
        host: String,
    },
}

impl Prefix {
    /// Parse a prefix string (without the leading `:`).
    ///
    /// Anything containing `!` or `@`, or containing no `.`, is a user
    /// prefix; everything else is taken to be a server name.
    pub fn parse(s: &str) -> Prefix {
        if !s.contains('!') && !s.contains('@') && s.contains('.') {
            return Prefix::Server(s.to_owned());
        }
        let (nick, rest) = match s.split_once('!') {
            Some((nick, rest)) => (nick, rest),
            None => match s.split_once('@') {
                Some((nick, host)) => {
                    return Prefix::User {
                        nick: nick.to_owned(),
                        user: String::new(),
                        host: host.to_owned(),
                    };
                }
                None => (s, ""),
            },
        };
        let (user, host) = match rest.split_once('@') {
            Some((user, host)) => (user, host),
            None => (rest, ""),
        };
        Prefix::User {
            nick: nick.to_owned(),
            user: user.to_owned(),
            host: host.to_owned(),
        }
    }

    /// The nickname, if this is a user prefix.
    pub fn nickname(&self) -> Option<&str> {
        match self {
            Prefix::User { nick, .. } => Some(nick),
            Prefix::Server(_) => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::Server(name) => f.write_str(name),
            Prefix::User { nick, user, host } => {
                f.write_str(nick)?;
                if !user.is_empty() {
                    write!(f, "!{user}")?;
                }
                if !host.is_empty() {
                    write!(f, "@{host}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_user_prefix() {
        let p = Prefix::parse("nick!user@host.tv");
        assert_eq!(
            p,
            Prefix::User {
                nick: "nick".into(),
                user: "user".into(),
                host: "host.tv".into(),
            }
        );
        assert_eq!(p.to_string(), "nick!user@host.tv");
        assert_eq!(p.nickname(), Some("nick"));
    }

    #[test]
    fn bare_nick() {
        let p = Prefix::parse("somenick");
        assert_eq!(p.nickname(), Some("somenick"));
        assert_eq!(p.to_string(), "somenick");
    }

    #[test]
    fn nick_with_host_only() {
        let p = Prefix::parse("nick@host.tv");
        assert_eq!(
            p,
            Prefix::User {
                nick: "nick".into(),
                user: String::new(),
                host: "host.tv".into(),
            }
        );
        assert_eq!(p.to_string(), "nick@host.tv");
    }

    #[test]
    fn server_name() {
        let p = Prefix::parse("chat.straylight.net");
        assert_eq!(p, Prefix::Server("chat.straylight.net".into()));
        assert_eq!(p.nickname(), None);
        assert_eq!(p.to_string(), "chat.straylight.net");
    }

    #[test]
    fn parse_display_round_trip() {
        for s in ["nick!user@host.tv", "nick@h.tv", "nick", "irc.example.com"] {
            assert_eq!(Prefix::parse(s).to_string(), s);
        }
    }
}

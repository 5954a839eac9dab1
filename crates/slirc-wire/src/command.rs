//! Typed IRC commands.
//!
//! Known commands get typed variants; anything else is carried verbatim
//! in [`Command::Raw`] so unknown traffic is never dropped by the codec.
//! Dispatch sites pattern-match exhaustively instead of comparing command
//! strings.

use std::fmt::{self, Write};

use crate::error::ParseError;

/// CAP negotiation subcommands relevant to a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapSubCommand {
    /// `CAP LS` - list available capabilities.
    LS,
    /// `CAP REQ` - request capabilities.
    REQ,
    /// `CAP ACK` - capabilities granted.
    ACK,
    /// `CAP NAK` - capabilities rejected.
    NAK,
    /// `CAP END` - end negotiation.
    END,
}

impl CapSubCommand {
    /// The wire form of the subcommand.
    pub fn as_str(&self) -> &'static str {
        match self {
            CapSubCommand::LS => "LS",
            CapSubCommand::REQ => "REQ",
            CapSubCommand::ACK => "ACK",
            CapSubCommand::NAK => "NAK",
            CapSubCommand::END => "END",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "LS" => Some(CapSubCommand::LS),
            "REQ" => Some(CapSubCommand::REQ),
            "ACK" => Some(CapSubCommand::ACK),
            "NAK" => Some(CapSubCommand::NAK),
            "END" => Some(CapSubCommand::END),
            _ => None,
        }
    }
}

/// A protocol command with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    /// `PRIVMSG target :text`
    PRIVMSG(String, String),
    /// `NOTICE target :text`
    NOTICE(String, String),
    /// `JOIN channel`
    JOIN(String),
    /// `PART channel [:reason]`
    PART(String, Option<String>),
    /// `PING [:token]`
    PING(Option<String>),
    /// `PONG [:token]`
    PONG(Option<String>),
    /// `NICK nickname`
    NICK(String),
    /// `PASS token`
    PASS(String),
    /// `CAP [target] subcommand [:args]`
    CAP(Option<String>, CapSubCommand, Option<String>),
    /// A numeric reply (e.g. `001`) with its parameters.
    Reply(u16, Vec<String>),
    /// Any other command, uppercased, with its parameters.
    Raw(String, Vec<String>),
}

fn need(command: &'static str, params: &[String], expected: usize) -> Result<(), ParseError> {
    if params.len() < expected {
        return Err(ParseError::NotEnoughArguments {
            command,
            expected,
            got: params.len(),
        });
    }
    Ok(())
}

impl Command {
    /// Build a typed command from an uppercased name and its parameters.
    ///
    /// Unknown names produce [`Command::Raw`]; known names with missing
    /// parameters fail with [`ParseError::NotEnoughArguments`].
    pub fn new(name: &str, mut params: Vec<String>) -> Result<Command, ParseError> {
        Ok(match name {
            "PRIVMSG" => {
                need("PRIVMSG", &params, 2)?;
                let text = params.remove(1);
                let target = params.remove(0);
                Command::PRIVMSG(target, text)
            }
            "NOTICE" => {
                need("NOTICE", &params, 2)?;
                let text = params.remove(1);
                let target = params.remove(0);
                Command::NOTICE(target, text)
            }
            "JOIN" => {
                need("JOIN", &params, 1)?;
                Command::JOIN(params.remove(0))
            }
            "PART" => {
                need("PART", &params, 1)?;
                let channel = params.remove(0);
                let reason = if params.is_empty() {
                    None
                } else {
                    Some(params.remove(0))
                };
                Command::PART(channel, reason)
            }
            "PING" => Command::PING(params.drain(..).next()),
            "PONG" => Command::PONG(params.drain(..).next()),
            "NICK" => {
                need("NICK", &params, 1)?;
                Command::NICK(params.remove(0))
            }
            "PASS" => {
                need("PASS", &params, 1)?;
                Command::PASS(params.remove(0))
            }
            "CAP" => {
                need("CAP", &params, 1)?;
                if let Some(sub) = CapSubCommand::from_token(&params[0]) {
                    params.remove(0);
                    let arg = if params.is_empty() {
                        None
                    } else {
                        Some(params.remove(0))
                    };
                    Command::CAP(None, sub, arg)
                } else if params.len() >= 2 {
                    if let Some(sub) = CapSubCommand::from_token(&params[1]) {
                        let target = params.remove(0);
                        params.remove(0);
                        let arg = if params.is_empty() {
                            None
                        } else {
                            Some(params.remove(0))
                        };
                        Command::CAP(Some(target), sub, arg)
                    } else {
                        Command::Raw("CAP".to_owned(), params)
                    }
                } else {
                    Command::Raw("CAP".to_owned(), params)
                }
            }
            _ => match numeric_code(name) {
                Some(code) => Command::Reply(code, params),
                None => Command::Raw(name.to_owned(), params),
            },
        })
    }
}

/// Numeric replies are exactly three ASCII digits.
fn numeric_code(name: &str) -> Option<u16> {
    if name.len() == 3 && name.bytes().all(|b| b.is_ascii_digit()) {
        name.parse().ok()
    } else {
        None
    }
}

/// Whether the final parameter must be written in trailing form.
fn needs_colon(param: &str) -> bool {
    param.is_empty() || param.starts_with(':') || param.contains(' ')
}

/// Write parameters with the trailing rule: the last one is
/// colon-prefixed iff it is empty, contains a space, or starts with `:`.
fn write_params(f: &mut fmt::Formatter<'_>, params: &[&str]) -> fmt::Result {
    let last = params.len().saturating_sub(1);
    for (i, param) in params.iter().enumerate() {
        f.write_char(' ')?;
        if i == last && needs_colon(param) {
            f.write_char(':')?;
        }
        f.write_str(param)?;
    }
    Ok(())
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::PRIVMSG(target, text) => {
                f.write_str("PRIVMSG")?;
                write_params(f, &[target.as_str(), text.as_str()])
            }
            Command::NOTICE(target, text) => {
                f.write_str("NOTICE")?;
                write_params(f, &[target.as_str(), text.as_str()])
            }
            Command::JOIN(channel) => {
                f.write_str("JOIN")?;
                write_params(f, &[channel.as_str()])
            }
            Command::PART(channel, Some(reason)) => {
                f.write_str("PART")?;
                write_params(f, &[channel.as_str(), reason.as_str()])
            }
            Command::PART(channel, None) => {
                f.write_str("PART")?;
                write_params(f, &[channel.as_str()])
            }
            Command::PING(Some(token)) => {
                f.write_str("PING")?;
                write_params(f, &[token.as_str()])
            }
            Command::PING(None) => f.write_str("PING"),
            Command::PONG(Some(token)) => {
                f.write_str("PONG")?;
                write_params(f, &[token.as_str()])
            }
            Command::PONG(None) => f.write_str("PONG"),
            Command::NICK(nickname) => {
                f.write_str("NICK")?;
                write_params(f, &[nickname.as_str()])
            }
            Command::PASS(token) => {
                f.write_str("PASS")?;
                write_params(f, &[token.as_str()])
            }
            Command::CAP(target, sub, arg) => {
                f.write_str("CAP")?;
                let mut params: Vec<&str> = Vec::with_capacity(3);
                if let Some(target) = target {
                    params.push(target.as_str());
                }
                params.push(sub.as_str());
                if let Some(arg) = arg {
                    params.push(arg.as_str());
                }
                write_params(f, &params)
            }
            Command::Reply(code, params) => {
                write!(f, "{code:03}")?;
                let params: Vec<&str> = params.iter().map(String::as_str).collect();
                write_params(f, &params)
            }
            Command::Raw(name, params) => {
                f.write_str(name)?;
                let params: Vec<&str> = params.iter().map(String::as_str).collect();
                write_params(f, &params)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(params: &[&str]) -> Vec<String> {
        params.iter().map(|p| (*p).to_owned()).collect()
    }

    #[test]
    fn privmsg_maps_target_and_text() {
        let cmd = Command::new("PRIVMSG", owned(&["#chan", "Hello world!"])).unwrap();
        assert_eq!(
            cmd,
            Command::PRIVMSG("#chan".into(), "Hello world!".into())
        );
    }

    #[test]
    fn privmsg_encodes_with_trailing_colon() {
        let cmd = Command::PRIVMSG("#chan".into(), "Hello world!".into());
        assert_eq!(cmd.to_string(), "PRIVMSG #chan :Hello world!");
    }

    #[test]
    fn single_word_text_needs_no_colon() {
        let cmd = Command::PRIVMSG("#chan".into(), "Hello".into());
        assert_eq!(cmd.to_string(), "PRIVMSG #chan Hello");
    }

    #[test]
    fn empty_trailing_is_colon_only() {
        let cmd = Command::PRIVMSG("#chan".into(), String::new());
        assert_eq!(cmd.to_string(), "PRIVMSG #chan :");
    }

    #[test]
    fn colon_starting_text_is_escaped_by_trailing_form() {
        let cmd = Command::PRIVMSG("#chan".into(), ":)".into());
        assert_eq!(cmd.to_string(), "PRIVMSG #chan ::)");
    }

    #[test]
    fn privmsg_requires_two_params() {
        let err = Command::new("PRIVMSG", owned(&["#chan"])).unwrap_err();
        assert_eq!(
            err,
            crate::ParseError::NotEnoughArguments {
                command: "PRIVMSG",
                expected: 2,
                got: 1,
            }
        );
    }

    #[test]
    fn part_with_and_without_reason() {
        assert_eq!(
            Command::new("PART", owned(&["#chan"])).unwrap(),
            Command::PART("#chan".into(), None)
        );
        assert_eq!(
            Command::new("PART", owned(&["#chan", "bye now"])).unwrap(),
            Command::PART("#chan".into(), Some("bye now".into()))
        );
        assert_eq!(
            Command::PART("#chan".into(), Some("bye now".into())).to_string(),
            "PART #chan :bye now"
        );
    }

    #[test]
    fn ping_token_is_optional() {
        assert_eq!(Command::new("PING", vec![]).unwrap(), Command::PING(None));
        assert_eq!(
            Command::new("PING", owned(&["chat.straylight.net"])).unwrap(),
            Command::PING(Some("chat.straylight.net".into()))
        );
        assert_eq!(Command::PING(None).to_string(), "PING");
    }

    #[test]
    fn numeric_reply() {
        let cmd = Command::new("001", owned(&["nick", "Welcome"])).unwrap();
        assert_eq!(cmd, Command::Reply(1, owned(&["nick", "Welcome"])));
        assert_eq!(cmd.to_string(), "001 nick :Welcome");
    }

    #[test]
    fn short_or_long_digit_runs_are_not_numerics() {
        assert!(matches!(
            Command::new("12", vec![]).unwrap(),
            Command::Raw(_, _)
        ));
        assert!(matches!(
            Command::new("1234", vec![]).unwrap(),
            Command::Raw(_, _)
        ));
    }

    #[test]
    fn cap_from_server_carries_target() {
        let cmd = Command::new("CAP", owned(&["*", "ACK", "message-tags"])).unwrap();
        assert_eq!(
            cmd,
            Command::CAP(
                Some("*".into()),
                CapSubCommand::ACK,
                Some("message-tags".into())
            )
        );
    }

    #[test]
    fn cap_req_encodes_caps_as_trailing() {
        let cmd = Command::CAP(
            None,
            CapSubCommand::REQ,
            Some("message-tags server-time".into()),
        );
        assert_eq!(cmd.to_string(), "CAP REQ :message-tags server-time");
    }

    #[test]
    fn unknown_command_is_raw() {
        let cmd = Command::new("RECONNECT", vec![]).unwrap();
        assert_eq!(cmd, Command::Raw("RECONNECT".into(), vec![]));
        assert_eq!(cmd.to_string(), "RECONNECT");
    }
}

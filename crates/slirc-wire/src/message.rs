//! Message parsing and serialization.
//!
//! The parser is nom-based and borrows from the input line; conversion
//! into the owned [`Message`] happens once the line shape is known.

use std::fmt::{self, Write};
use std::str::FromStr;

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

use crate::command::Command;
use crate::error::ParseError;
use crate::prefix::Prefix;
use crate::tags::{self, Tag};
use crate::MAX_PARAMS;

/// An owned protocol message: tags, optional source, and a typed command.
///
/// Decoding never produces a message without a command; a line that
/// yields no command token is a [`ParseError`], not a zero value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Message tags; empty when the line carried none.
    pub tags: Vec<Tag>,
    /// Message source; `None` for client-originated messages.
    pub prefix: Option<Prefix>,
    /// The command and its parameters.
    pub command: Command,
}

/// Tag block: the part after `@`, up to the first space. Escaped values
/// never contain a literal space, so the first space ends the block.
fn tag_block(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_until(" "))(input)
}

/// Prefix token: the part after `:`, up to the next space.
fn prefix_token(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_while1(|c| c != ' '))(input)
}

/// Command token: one run of ASCII alphanumerics.
fn command_token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric())(input)
}

/// Split the remainder of a line into parameters.
///
/// Runs of spaces separate parameters; a `:`-led token starts the
/// trailing parameter, which extends to the end of the line verbatim.
fn split_params(input: &str) -> SmallVec<[&str; 8]> {
    let mut params: SmallVec<[&str; 8]> = SmallVec::new();
    let mut rest = input;

    while rest.as_bytes().first() == Some(&b' ') {
        if params.len() >= MAX_PARAMS {
            break;
        }
        while rest.as_bytes().first() == Some(&b' ') {
            rest = &rest[1..];
        }
        if rest.is_empty() || rest.starts_with('\r') || rest.starts_with('\n') {
            break;
        }
        if let Some(trailing) = rest.strip_prefix(':') {
            let end = trailing.find(['\r', '\n']).unwrap_or(trailing.len());
            params.push(&trailing[..end]);
            break;
        }
        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    params
}

/// A line split into its raw components, borrowed from the input.
struct RawParts<'a> {
    tags: Option<&'a str>,
    prefix: Option<&'a str>,
    command: &'a str,
    params: SmallVec<[&'a str; 8]>,
}

fn parse_parts(input: &str) -> IResult<&str, RawParts<'_>> {
    let (input, tags) = opt(tag_block)(input)?;
    let (input, _) = space0(input)?;
    let (input, prefix) = opt(prefix_token)(input)?;
    let (input, _) = space0(input)?;
    let (input, command) = command_token(input)?;
    let params = split_params(input);
    Ok((
        "",
        RawParts {
            tags,
            prefix,
            command,
            params,
        },
    ))
}

impl<'a> RawParts<'a> {
    fn parse(input: &'a str) -> Result<Self, ParseError> {
        match parse_parts(input) {
            Ok((_rest, parts)) => Ok(parts),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(ParseError::MissingCommand {
                    position: input.len() - e.input.len(),
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(ParseError::Malformed {
                position: input.len(),
            }),
        }
    }
}

impl FromStr for Message {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Message, ParseError> {
        let line = s.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(ParseError::Empty);
        }

        let parts = RawParts::parse(line)?;
        let tags = parts.tags.map(tags::parse_tag_block).unwrap_or_default();
        let prefix = parts.prefix.map(Prefix::parse);
        let name = parts.command.to_ascii_uppercase();
        let params: Vec<String> = parts.params.iter().map(|p| (*p).to_owned()).collect();
        let command = Command::new(&name, params)?;

        Ok(Message {
            tags,
            prefix,
            command,
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            f.write_char('@')?;
            for (i, tag) in self.tags.iter().enumerate() {
                if i > 0 {
                    f.write_char(';')?;
                }
                f.write_str(&tag.key)?;
                if let Some(ref value) = tag.value {
                    f.write_char('=')?;
                    tags::escape_value(f, value)?;
                }
            }
            f.write_char(' ')?;
        }

        if let Some(ref prefix) = self.prefix {
            write!(f, ":{prefix} ")?;
        }

        write!(f, "{}\r\n", self.command)
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Message {
        Message {
            tags: Vec::new(),
            prefix: None,
            command,
        }
    }
}

impl Message {
    /// Create a PRIVMSG to a target.
    #[must_use]
    pub fn privmsg(target: impl Into<String>, text: impl Into<String>) -> Self {
        Command::PRIVMSG(target.into(), text.into()).into()
    }

    /// Create a JOIN for a channel.
    #[must_use]
    pub fn join(channel: impl Into<String>) -> Self {
        Command::JOIN(channel.into()).into()
    }

    /// Create a PART for a channel, with an optional reason.
    #[must_use]
    pub fn part(channel: impl Into<String>, reason: Option<String>) -> Self {
        Command::PART(channel.into(), reason).into()
    }

    /// Create a PING with an optional token.
    #[must_use]
    pub fn ping(token: Option<String>) -> Self {
        Command::PING(token).into()
    }

    /// Create a PONG echoing the PING token.
    #[must_use]
    pub fn pong(token: Option<String>) -> Self {
        Command::PONG(token).into()
    }

    /// Create a NICK registration message.
    #[must_use]
    pub fn nick(nickname: impl Into<String>) -> Self {
        Command::NICK(nickname.into()).into()
    }

    /// Create a PASS message carrying the auth token.
    #[must_use]
    pub fn pass(token: impl Into<String>) -> Self {
        Command::PASS(token.into()).into()
    }

    /// Create a `CAP REQ` for the given capabilities.
    #[must_use]
    pub fn cap_req(capabilities: &[String]) -> Self {
        Command::CAP(
            None,
            crate::command::CapSubCommand::REQ,
            Some(capabilities.join(" ")),
        )
        .into()
    }

    /// The nickname of the message source, if it has a user prefix.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nickname)
    }

    /// The value of a tag by key; `None` for absent or bare boolean tags.
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.key == key)
            .and_then(|tag| tag.value.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CapSubCommand;
    use proptest::prelude::*;

    #[test]
    fn parse_tagged_privmsg() {
        let raw = "@badge-info=subscriber/8;badges=subscriber/6 :nick!nick@host.tv PRIVMSG #chan :Hello!";
        let msg: Message = raw.parse().unwrap();

        assert_eq!(msg.tag_value("badge-info"), Some("subscriber/8"));
        assert_eq!(msg.tag_value("badges"), Some("subscriber/6"));
        assert_eq!(
            msg.prefix,
            Some(Prefix::User {
                nick: "nick".into(),
                user: "nick".into(),
                host: "host.tv".into(),
            })
        );
        assert_eq!(
            msg.command,
            Command::PRIVMSG("#chan".into(), "Hello!".into())
        );
    }

    #[test]
    fn encode_privmsg_with_spaces() {
        let msg = Message::privmsg("#chan", "Hello world!");
        assert_eq!(msg.to_string(), "PRIVMSG #chan :Hello world!\r\n");
    }

    #[test]
    fn parse_strips_crlf() {
        let msg: Message = "PING :chat.straylight.net\r\n".parse().unwrap();
        assert_eq!(msg.command, Command::PING(Some("chat.straylight.net".into())));
    }

    #[test]
    fn empty_input_is_an_error() {
        assert_eq!("".parse::<Message>().unwrap_err(), ParseError::Empty);
        assert_eq!("\r\n".parse::<Message>().unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn prefix_only_input_has_no_command() {
        let err = ":just.a.prefix".parse::<Message>().unwrap_err();
        assert!(matches!(err, ParseError::MissingCommand { .. }));
    }

    #[test]
    fn lowercase_command_is_uppercased() {
        let msg: Message = "privmsg #chan :hi there".parse().unwrap();
        assert_eq!(
            msg.command,
            Command::PRIVMSG("#chan".into(), "hi there".into())
        );
    }

    #[test]
    fn runs_of_spaces_separate_params() {
        let msg: Message = "JOIN   #chan".parse().unwrap();
        assert_eq!(msg.command, Command::JOIN("#chan".into()));
    }

    #[test]
    fn trailing_keeps_internal_spacing() {
        let msg: Message = "PRIVMSG #chan :a  b   c".parse().unwrap();
        assert_eq!(msg.command, Command::PRIVMSG("#chan".into(), "a  b   c".into()));
    }

    #[test]
    fn empty_trailing_parses_to_empty_param() {
        let msg: Message = "PRIVMSG #chan :".parse().unwrap();
        assert_eq!(msg.command, Command::PRIVMSG("#chan".into(), String::new()));
    }

    #[test]
    fn numeric_welcome() {
        let msg: Message = ":server 001 nick :Welcome to chat".parse().unwrap();
        assert_eq!(msg.prefix, Some(Prefix::Server("server".into())));
        assert_eq!(
            msg.command,
            Command::Reply(1, vec!["nick".into(), "Welcome to chat".into()])
        );
    }

    #[test]
    fn names_reply() {
        let msg: Message = ":server 353 me = #chan :me alice bob".parse().unwrap();
        match msg.command {
            Command::Reply(353, params) => {
                assert_eq!(params, vec!["me", "=", "#chan", "me alice bob"]);
            }
            other => panic!("expected 353 reply, got {other:?}"),
        }
    }

    #[test]
    fn cap_ack_from_server() {
        let msg: Message = ":server CAP * ACK :message-tags".parse().unwrap();
        assert_eq!(
            msg.command,
            Command::CAP(
                Some("*".into()),
                CapSubCommand::ACK,
                Some("message-tags".into())
            )
        );
    }

    #[test]
    fn escaped_tag_values_are_unescaped() {
        let msg: Message = "@system-msg=5\\sraiders PING :x".parse().unwrap();
        assert_eq!(msg.tag_value("system-msg"), Some("5 raiders"));
    }

    #[test]
    fn bare_tag_is_boolean() {
        let msg: Message = "@first-msg PING :x".parse().unwrap();
        assert_eq!(msg.tags[0].key, "first-msg");
        assert_eq!(msg.tags[0].value, None);
        assert_eq!(msg.tag_value("first-msg"), None);
    }

    #[test]
    fn params_are_capped() {
        let line = format!("CMD {}", (0..20).map(|i| i.to_string()).collect::<Vec<_>>().join(" "));
        let msg: Message = line.parse().unwrap();
        match msg.command {
            Command::Raw(_, params) => assert_eq!(params.len(), MAX_PARAMS),
            other => panic!("expected raw command, got {other:?}"),
        }
    }

    #[test]
    fn tagged_message_round_trip() {
        let raw = "@badges=subscriber/6;first-msg :nick!nick@host.tv PRIVMSG #chan :Hello world!";
        let msg: Message = raw.parse().unwrap();
        let rendered = msg.to_string();
        let reparsed: Message = rendered.parse().unwrap();
        assert_eq!(msg, reparsed);
    }

    /// Command names that decode into typed variants; the raw round-trip
    /// property below wants names that stay `Raw`.
    const KNOWN_COMMANDS: &[&str] = &[
        "PRIVMSG", "NOTICE", "JOIN", "PART", "PING", "PONG", "NICK", "PASS", "CAP",
    ];

    proptest! {
        #[test]
        fn raw_command_round_trip(
            name in "[A-Z]{3,10}",
            middles in prop::collection::vec("[a-zA-Z0-9#._/-]{1,12}", 0..5),
            trailing in "[a-zA-Z0-9 !?.,:']{0,40}",
        ) {
            prop_assume!(!KNOWN_COMMANDS.contains(&name.as_str()));

            let mut params = middles.clone();
            params.push(trailing.clone());
            let msg = Message {
                tags: Vec::new(),
                prefix: None,
                command: Command::Raw(name.clone(), params.clone()),
            };

            let decoded: Message = msg.to_string().parse().unwrap();
            prop_assert_eq!(decoded, msg);
        }

        #[test]
        fn privmsg_round_trip(
            target in "#[a-z0-9_]{1,15}",
            text in "[ -~]{0,40}",
        ) {
            let msg = Message::privmsg(target, text);
            let decoded: Message = msg.to_string().parse().unwrap();
            prop_assert_eq!(decoded, msg);
        }

        #[test]
        fn tagged_round_trip(
            key in "[a-zA-Z0-9-]{1,12}",
            value in "[ -~]{0,20}",
            token in "[a-z.]{1,20}",
        ) {
            let msg = Message {
                tags: vec![Tag::new(key, Some(value))],
                prefix: None,
                command: Command::PING(Some(token)),
            };
            let decoded: Message = msg.to_string().parse().unwrap();
            prop_assert_eq!(decoded, msg);
        }
    }
}

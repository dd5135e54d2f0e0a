//! Interactive command parsing and argument validation.
//!
//! Parsing only classifies the verb and captures raw arguments; whether the
//! arguments are acceptable depends on the connection phase, so validation
//! happens at dispatch time in [`crate::client`]. The verb is matched
//! case-insensitively against the fixed command set.

use crate::error::ClientError;
use crate::framing::MAX_NAME_LEN;

/// One parsed line of user input.
///
/// Arguments are kept raw here: a missing argument parses as an empty string
/// and is rejected later with the phase-appropriate error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Connect { port: String, name: String },
    Disconnect,
    Publish { topic: String, data: String },
    Subscribe { topic: String },
    Unsubscribe { topic: String },
}

impl Command {
    /// Parses a non-empty input line; unknown verbs are `WrongCommand`.
    pub fn parse(line: &str) -> Result<Self, ClientError> {
        let trimmed = line.trim();
        let (verb, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim_start()),
            None => (trimmed, ""),
        };

        match verb.to_uppercase().as_str() {
            "-H" | "HELP" => Ok(Command::Help),
            "CONNECT" => {
                let mut args = rest.split_whitespace();
                Ok(Command::Connect {
                    port: args.next().unwrap_or_default().to_string(),
                    name: args.next().unwrap_or_default().to_string(),
                })
            }
            "DISCONNECT" => Ok(Command::Disconnect),
            "PUBLISH" => {
                // Data is the rest of the line after the topic, whitespace and all.
                let (topic, data) = match rest.split_once(char::is_whitespace) {
                    Some((topic, data)) => (topic, data),
                    None => (rest, ""),
                };
                Ok(Command::Publish {
                    topic: topic.to_string(),
                    data: data.to_string(),
                })
            }
            "SUBSCRIBE" => Ok(Command::Subscribe {
                topic: first_word(rest),
            }),
            "UNSUBSCRIBE" => Ok(Command::Unsubscribe {
                topic: first_word(rest),
            }),
            _ => Err(ClientError::WrongCommand),
        }
    }
}

fn first_word(rest: &str) -> String {
    rest.split_whitespace().next().unwrap_or_default().to_string()
}

/// Validates a CONNECT port argument: decimal digits only, in (1024, 65535].
pub fn validate_port(arg: &str) -> Result<u16, ClientError> {
    if arg.is_empty() || !arg.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ClientError::WrongPort);
    }
    arg.parse::<u16>()
        .ok()
        .filter(|port| *port > 1024)
        .ok_or(ClientError::WrongPort)
}

/// Validates a CONNECT client name: 1 to 64 characters.
pub fn validate_name(arg: &str) -> Result<(), ClientError> {
    let length = arg.chars().count();
    if length == 0 || length > MAX_NAME_LEN {
        return Err(ClientError::WrongName);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(line: &str) -> Command {
        Command::parse(line).expect("line should parse")
    }

    #[test]
    fn verbs_are_case_insensitive() {
        assert_eq!(parsed("disconnect"), Command::Disconnect);
        assert_eq!(parsed("DISCONNECT"), Command::Disconnect);
        assert_eq!(parsed("DiScOnNeCt"), Command::Disconnect);
        assert_eq!(parsed("-h"), Command::Help);
        assert_eq!(parsed("-H"), Command::Help);
        assert_eq!(parsed("help"), Command::Help);
    }

    #[test]
    fn unknown_verb_is_rejected() {
        assert!(matches!(
            Command::parse("FROBNICATE news"),
            Err(ClientError::WrongCommand)
        ));
        assert!(matches!(
            Command::parse("PUB news hi"),
            Err(ClientError::WrongCommand)
        ));
    }

    #[test]
    fn connect_captures_raw_arguments() {
        assert_eq!(
            parsed("connect 5000 alice"),
            Command::Connect {
                port: "5000".into(),
                name: "alice".into()
            }
        );
        // Missing arguments stay empty and fail validation later.
        assert_eq!(
            parsed("CONNECT"),
            Command::Connect {
                port: String::new(),
                name: String::new()
            }
        );
    }

    #[test]
    fn publish_keeps_the_rest_of_the_line_as_data() {
        assert_eq!(
            parsed("publish news breaking story at 9"),
            Command::Publish {
                topic: "news".into(),
                data: "breaking story at 9".into()
            }
        );
        assert_eq!(
            parsed("PUBLISH news"),
            Command::Publish {
                topic: "news".into(),
                data: String::new()
            }
        );
    }

    #[test]
    fn subscribe_takes_one_topic() {
        assert_eq!(
            parsed("subscribe news extra words"),
            Command::Subscribe {
                topic: "news".into()
            }
        );
        assert_eq!(
            parsed("UNSUBSCRIBE  sports "),
            Command::Unsubscribe {
                topic: "sports".into()
            }
        );
    }

    #[test]
    fn port_must_be_decimal_and_in_range() {
        assert_eq!(validate_port("5000").expect("valid port"), 5000);
        assert_eq!(validate_port("65535").expect("valid port"), 65535);
        assert!(validate_port("1024").is_err());
        assert!(validate_port("1023").is_err());
        assert!(validate_port("65536").is_err());
        assert!(validate_port("").is_err());
        assert!(validate_port("50a0").is_err());
        assert!(validate_port("+5000").is_err());
        assert!(validate_port("-1").is_err());
    }

    #[test]
    fn name_must_be_one_to_sixty_four_characters() {
        assert!(validate_name("alice").is_ok());
        assert!(validate_name(&"a".repeat(64)).is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"a".repeat(65)).is_err());
    }
}

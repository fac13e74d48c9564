//! Command-line parsing.

use thiserror::Error;

use crate::types::Chain;

pub const DEFAULT_HISTORY_LIMIT: u32 = 20;

/// Symbol given to `analyze` tokens when none is passed.
pub const DEFAULT_ANALYZE_SYMBOL: &str = "UNKNOWN";

pub const USAGE: &str = "\
Usage: alpha-radar [COMMAND]

Commands:
  scan                                 Run one scan cycle (default)
  send                                 Send the last alert batch to Telegram
  analyze <ADDRESS> [CHAIN] [SYMBOL]   Score one token and print its snapshot
  publish                              Publish the private token list
  init-db                              Create the snapshot ledger schema
  history <ADDRESS> [LIMIT]            Print recorded snapshots for an address
  help                                 Show this message";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Scan,
    Send,
    Analyze { address: String, chain: Chain, symbol: String },
    Publish,
    InitDb,
    History { address: String, limit: u32 },
    Help,
}

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("missing argument <{argument}> for {command}")]
    MissingArgument { command: &'static str, argument: &'static str },

    #[error("invalid value {value:?} for <{argument}>")]
    InvalidValue { argument: &'static str, value: String },

    #[error("unexpected argument: {0}")]
    UnexpectedArgument(String),
}

/// Parse arguments (without the program name) into a command.
pub fn parse<I, S>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut args = args.into_iter().map(Into::into);

    let command = match args.next().as_deref() {
        None | Some("scan") => Command::Scan,
        Some("send") => Command::Send,
        Some("publish") => Command::Publish,
        Some("init-db") => Command::InitDb,
        Some("help") | Some("-h") | Some("--help") => Command::Help,
        Some("analyze") => {
            let address = required(args.next(), "analyze", "ADDRESS")?;
            let chain = match args.next() {
                Some(raw) => match Chain::parse(&raw) {
                    Chain::Unknown => {
                        return Err(CliError::InvalidValue {
                            argument: "CHAIN",
                            value: raw,
                        })
                    }
                    chain => chain,
                },
                None => Chain::Solana,
            };
            let symbol = args
                .next()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_ANALYZE_SYMBOL.to_string());
            Command::Analyze { address, chain, symbol }
        }
        Some("history") => {
            let address = required(args.next(), "history", "ADDRESS")?;
            let limit = match args.next() {
                Some(raw) => raw
                    .parse::<u32>()
                    .ok()
                    .filter(|limit| *limit > 0)
                    .ok_or(CliError::InvalidValue {
                        argument: "LIMIT",
                        value: raw,
                    })?,
                None => DEFAULT_HISTORY_LIMIT,
            };
            Command::History { address, limit }
        }
        Some(other) => return Err(CliError::UnknownCommand(other.to_string())),
    };

    if let Some(extra) = args.next() {
        return Err(CliError::UnexpectedArgument(extra));
    }
    Ok(command)
}

fn required(
    value: Option<String>,
    command: &'static str,
    argument: &'static str,
) -> Result<String, CliError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(CliError::MissingArgument { command, argument })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_scan() {
        assert_eq!(parse(Vec::<String>::new()), Ok(Command::Scan));
        assert_eq!(parse(["scan"]), Ok(Command::Scan));
    }

    #[test]
    fn test_analyze() {
        assert_eq!(
            parse(["analyze", "So11111111111111111111111111111111111111112"]),
            Ok(Command::Analyze {
                address: "So11111111111111111111111111111111111111112".into(),
                chain: Chain::Solana,
                symbol: DEFAULT_ANALYZE_SYMBOL.into(),
            })
        );
        assert_eq!(
            parse(["analyze", "0xabc", "evm"]),
            Ok(Command::Analyze {
                address: "0xabc".into(),
                chain: Chain::Evm,
                symbol: DEFAULT_ANALYZE_SYMBOL.into(),
            })
        );
        assert_eq!(
            parse(["analyze", "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN", "solana", "JUP"]),
            Ok(Command::Analyze {
                address: "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN".into(),
                chain: Chain::Solana,
                symbol: "JUP".into(),
            })
        );
        assert_eq!(
            parse(["analyze", "0xabc", "evm", "PEPE", "extra"]),
            Err(CliError::UnexpectedArgument("extra".into()))
        );
        assert!(matches!(
            parse(["analyze"]),
            Err(CliError::MissingArgument { argument: "ADDRESS", .. })
        ));
        assert!(matches!(
            parse(["analyze", "0xabc", "tron"]),
            Err(CliError::InvalidValue { argument: "CHAIN", .. })
        ));
    }

    #[test]
    fn test_history_limit() {
        assert_eq!(
            parse(["history", "Mint1"]),
            Ok(Command::History {
                address: "Mint1".into(),
                limit: DEFAULT_HISTORY_LIMIT,
            })
        );
        assert_eq!(
            parse(["history", "Mint1", "5"]),
            Ok(Command::History {
                address: "Mint1".into(),
                limit: 5,
            })
        );
        assert!(parse(["history", "Mint1", "0"]).is_err());
        assert!(parse(["history", "Mint1", "many"]).is_err());
    }

    #[test]
    fn test_rejects_unknown_and_extra() {
        assert_eq!(parse(["watch"]), Err(CliError::UnknownCommand("watch".into())));
        assert_eq!(parse(["send", "now"]), Err(CliError::UnexpectedArgument("now".into())));
    }
}

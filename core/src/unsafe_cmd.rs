//! Raw command sanitization
//!
//! Raw commands are passed to the tool as an argv, never through a shell.
//! Shell metacharacters are still rejected outright so a command that only
//! works in a shell is refused instead of silently misbehaving.

use crate::args::InvocationArgs;
use crate::errors::{DbtError, ValidationIssue};

const PROGRAM: &str = "dbt";

const FORBIDDEN_SEQUENCES: [&str; 6] = ["&&", "|", ";", "$(", "<", ">"];

const FIELD: &str = "unsafe_dbt_cli_command";

/// Validate a raw command line and return the arguments after the program name
pub fn sanitize(command: &str) -> Result<InvocationArgs, DbtError> {
    if let Some(sequence) = FORBIDDEN_SEQUENCES
        .iter()
        .find(|sequence| command.contains(**sequence))
    {
        return Err(invalid(format!(
            "shell metacharacter '{}' is not allowed",
            sequence
        )));
    }

    let tokens = split_command(command).map_err(invalid)?;

    let mut tokens = tokens.into_iter();
    match tokens.next() {
        Some(first) if first == PROGRAM => {}
        Some(_) => return Err(invalid(format!("command must start with '{}'", PROGRAM))),
        None => return Err(invalid("command must not be empty")),
    }

    let args: Vec<String> = tokens.collect();
    if args.is_empty() {
        return Err(invalid(format!("no subcommand given after '{}'", PROGRAM)));
    }
    if args.iter().any(|token| names_program(token)) {
        return Err(invalid(format!(
            "'{}' may only appear once, at the start of the command",
            PROGRAM
        )));
    }

    Ok(InvocationArgs::from_tokens(args))
}

fn names_program(token: &str) -> bool {
    token == PROGRAM || token.ends_with(&format!("/{}", PROGRAM))
}

fn invalid(message: impl Into<String>) -> DbtError {
    DbtError::validation(vec![ValidationIssue::new(FIELD, message)])
}

/// Split a command line on whitespace, honouring quotes and backslash escapes
///
/// Quotes group words and are removed from the resulting token.
pub fn split_command(input: &str) -> Result<Vec<String>, String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some('"'), '\\') | (None, '\\') => match chars.next() {
                Some(escaped) => {
                    current.push(escaped);
                    in_token = true;
                }
                None => return Err("trailing backslash".to_string()),
            },
            (Some(_), c) => current.push(c),
            (None, '\'' | '"') => {
                quote = Some(ch);
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!("unterminated {} quote", q));
    }
    if in_token {
        tokens.push(current);
    }
    Ok(tokens)
}

//! Assembly of the child's command line.
//!
//! The CLI's argument parser follows the MSVC runtime convention: arguments
//! are split on unquoted whitespace, `"` toggles quoting, and backslashes are
//! only special when they precede a `"`. Arguments are quoted and escaped so
//! that the parser hands the child exactly the strings we were given.

use crate::error::{RelaunchError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Smallest buffer ever reserved for a command line, whatever the inputs
pub const MIN_COMMAND_LINE_CAPACITY: usize = 2048;

/// Characters besides whitespace and `"` that [`QuotingPolicy::Strict`] quotes
const SHELL_METACHARACTERS: &[char] = &['&', '|', '^', '%', '<', '>', '\''];

/// When a caller argument gets wrapped in quotes
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QuotingPolicy {
    /// Quote empty arguments and those containing a space, tab or `"`
    #[default]
    Standard,
    /// Also quote shell metacharacters `& | ^ % < >` and `'`
    Strict,
}

impl QuotingPolicy {
    pub fn needs_quotes(self, arg: &str) -> bool {
        if arg.is_empty() {
            return true;
        }
        arg.chars().any(|c| match c {
            ' ' | '\t' | '"' => true,
            c => self == QuotingPolicy::Strict && SHELL_METACHARACTERS.contains(&c),
        })
    }
}

/// A fully assembled invocation of the CLI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    rendered: String,
    program_len: usize,
    args: Vec<String>,
}

impl CommandLine {
    /// The single escaped string, program name included
    pub fn as_str(&self) -> &str {
        &self.rendered
    }

    /// Arguments after the program name, unescaped
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The rendered string without the leading quoted program path
    pub fn raw_arguments(&self) -> &str {
        self.rendered[self.program_len..].trim_start_matches(' ')
    }

    /// Length in characters, the unit the limit is expressed in
    pub fn len(&self) -> usize {
        char_len(&self.rendered)
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.rendered)
    }
}

/// Build `"<cli>" --config "<config>" <subcommand> <args>...`.
///
/// The length check runs before anything is written: the estimate assumes
/// every argument doubles under escaping, so an oversized argument vector is
/// rejected without building the string. The rendered string is checked
/// against the same limit afterwards.
pub fn build_command_line<S: AsRef<str>>(
    cli_path: &Path,
    config_path: &Path,
    subcommand: &str,
    args: &[S],
    policy: QuotingPolicy,
    max_len: usize,
) -> Result<CommandLine> {
    let cli = path_str(cli_path)?;
    let config = path_str(config_path)?;

    let required = estimate_length(cli, config, subcommand, args).ok_or(
        RelaunchError::CommandLineTooLong {
            required: usize::MAX,
            limit: max_len,
        },
    )?;
    if required > max_len {
        return Err(RelaunchError::CommandLineTooLong {
            required,
            limit: max_len,
        });
    }

    let mut rendered = String::with_capacity(required.max(MIN_COMMAND_LINE_CAPACITY));
    push_quoted(&mut rendered, cli);
    let program_len = rendered.len();
    rendered.push_str(" --config ");
    push_quoted(&mut rendered, config);
    rendered.push(' ');
    rendered.push_str(subcommand);

    for arg in args {
        let arg = arg.as_ref();
        rendered.push(' ');
        if policy.needs_quotes(arg) {
            push_quoted(&mut rendered, arg);
        } else {
            rendered.push_str(arg);
        }
    }

    let rendered_len = char_len(&rendered);
    if rendered_len > max_len {
        return Err(RelaunchError::CommandLineTooLong {
            required: rendered_len,
            limit: max_len,
        });
    }

    let mut forwarded = Vec::with_capacity(args.len() + 3);
    forwarded.push("--config".to_string());
    forwarded.push(config.to_string());
    forwarded.push(subcommand.to_string());
    forwarded.extend(args.iter().map(|a| a.as_ref().to_string()));

    Ok(CommandLine {
        rendered,
        program_len,
        args: forwarded,
    })
}

/// Worst-case rendered length in characters: quoted paths, fixed prefix, and
/// each argument doubled plus two quotes and a separator. `None` on overflow.
fn estimate_length<S: AsRef<str>>(
    cli: &str,
    config: &str,
    subcommand: &str,
    args: &[S],
) -> Option<usize> {
    const FIXED_OVERHEAD: usize = " --config  ".len() + 4 * 2;

    let mut total = char_len(cli)
        .checked_mul(2)?
        .checked_add(char_len(config).checked_mul(2)?)?
        .checked_add(char_len(subcommand))?
        .checked_add(FIXED_OVERHEAD)?;

    for arg in args {
        let encoded = char_len(arg.as_ref()).checked_mul(2)?.checked_add(3)?;
        total = total.checked_add(encoded)?;
    }

    Some(total)
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str().ok_or_else(|| {
        RelaunchError::PathResolution(format!("path is not valid UTF-8: {}", path.display()))
    })
}

/// Append `arg` wrapped in quotes, escaping backslash runs that precede a
/// quote or the closing quote.
pub fn push_quoted(out: &mut String, arg: &str) {
    out.push('"');

    let mut backslashes = 0usize;
    for c in arg.chars() {
        match c {
            '\\' => backslashes += 1,
            '"' => {
                push_backslashes(out, backslashes * 2 + 1);
                out.push('"');
                backslashes = 0;
            }
            c => {
                push_backslashes(out, backslashes);
                out.push(c);
                backslashes = 0;
            }
        }
    }
    push_backslashes(out, backslashes * 2);

    out.push('"');
}

fn push_backslashes(out: &mut String, count: usize) {
    out.extend(std::iter::repeat_n('\\', count));
}

/// Split a command line into arguments the way the child's runtime does.
///
/// The first token is the program name and is included in the result.
pub fn split_command_line(line: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let mut count = 1;
                while chars.peek() == Some(&'\\') {
                    chars.next();
                    count += 1;
                }
                in_token = true;
                if chars.peek() == Some(&'"') {
                    push_backslashes(&mut current, count / 2);
                    if count % 2 == 1 {
                        chars.next();
                        current.push('"');
                    }
                } else {
                    push_backslashes(&mut current, count);
                }
            }
            '"' => {
                in_token = true;
                if in_quotes && chars.peek() == Some(&'"') {
                    // `""` inside quotes is a literal quote
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ' ' | '\t' if !in_quotes => {
                if in_token {
                    args.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            c => {
                in_token = true;
                current.push(c);
            }
        }
    }

    if in_token {
        args.push(current);
    }
    args
}

//! Shell-style splitting of the `extra_args` input.

use crate::error::{ActionError, Result};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// Split `input` into arguments the way a POSIX shell would, without expansion.
///
/// Whitespace separates arguments. Single quotes are literal. Double quotes
/// group and honor `\"` and `\\`. A backslash outside quotes escapes the next
/// character.
pub fn split_args(input: &str) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    // Distinguishes `''` (an empty argument) from no argument at all.
    let mut in_arg = false;
    let mut quote = Quote::None;
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        match quote {
            Quote::Single => match c {
                '\'' => quote = Quote::None,
                _ => current.push(c),
            },
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\')) => current.push(next),
                    Some(next) => {
                        current.push('\\');
                        current.push(next);
                    }
                    None => return Err(unterminated('"')),
                },
                _ => current.push(c),
            },
            Quote::None => match c {
                '\'' => {
                    quote = Quote::Single;
                    in_arg = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_arg = true;
                }
                '\\' => {
                    let next = chars
                        .next()
                        .ok_or_else(|| ActionError::InvalidArgs("trailing backslash".to_string()))?;
                    current.push(next);
                    in_arg = true;
                }
                c if c.is_whitespace() => {
                    if in_arg {
                        args.push(std::mem::take(&mut current));
                        in_arg = false;
                    }
                }
                _ => {
                    current.push(c);
                    in_arg = true;
                }
            },
        }
    }

    match quote {
        Quote::Single => return Err(unterminated('\'')),
        Quote::Double => return Err(unterminated('"')),
        Quote::None => {}
    }
    if in_arg {
        args.push(current);
    }
    Ok(args)
}

fn unterminated(quote: char) -> ActionError {
    ActionError::InvalidArgs(format!("unterminated {quote} quote"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_quoted_segment_is_one_arg() {
        let args = split_args("--hook-stage manual --foo 'bar baz'").unwrap();
        assert_eq!(args, vec!["--hook-stage", "manual", "--foo", "bar baz"]);
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert!(split_args("").unwrap().is_empty());
        assert!(split_args("   \t\n ").unwrap().is_empty());
    }

    #[test]
    fn test_default_extra_args() {
        assert_eq!(split_args("--all-files").unwrap(), vec!["--all-files"]);
    }

    #[test]
    fn test_double_quotes_with_escapes() {
        let args = split_args(r#"--msg "say \"hi\" \\ \n""#).unwrap();
        assert_eq!(args, vec!["--msg", r#"say "hi" \ \n"#]);
    }

    #[test]
    fn test_adjacent_quotes_join() {
        let args = split_args(r#"a'b c'"d e"f"#).unwrap();
        assert_eq!(args, vec!["ab cd ef"]);
    }

    #[test]
    fn test_empty_quoted_arg_is_kept() {
        let args = split_args("--files '' x").unwrap();
        assert_eq!(args, vec!["--files", "", "x"]);
    }

    #[test]
    fn test_backslash_escapes_space() {
        let args = split_args(r"path\ with\ spaces next").unwrap();
        assert_eq!(args, vec!["path with spaces", "next"]);
    }

    #[test]
    fn test_trailing_backslash_is_rejected() {
        assert!(matches!(
            split_args("foo \\"),
            Err(ActionError::InvalidArgs(_))
        ));
        assert!(matches!(split_args("\\"), Err(ActionError::InvalidArgs(_))));
    }

    #[test]
    fn test_unterminated_quote_is_rejected() {
        assert!(matches!(
            split_args("--foo 'bar"),
            Err(ActionError::InvalidArgs(_))
        ));
        assert!(matches!(
            split_args("--foo \"bar"),
            Err(ActionError::InvalidArgs(_))
        ));
    }
}

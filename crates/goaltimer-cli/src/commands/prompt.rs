//! Completion prompt on the terminal.

use std::io::{self, BufRead, Write};

use goaltimer_core::{CompletionPrompt, GoalSession, PromptChoice};

use super::{print_json, print_outcome, CliResult};

/// Show `prompt` and apply the answer read from stdin.
///
/// Empty input or end of input dismisses the prompt; the goal stays
/// pending and is not prompted again for this deadline.
pub fn present(session: &mut GoalSession, prompt: CompletionPrompt) -> CliResult {
    print_json(&prompt)?;
    eprint!(
        "Deadline reached for \"{}\". [c]ompleted / [f]ailed / [p]enalty [text] / enter to dismiss: ",
        prompt.title
    );
    io::stderr().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    match parse_choice(&line) {
        Some(choice) => {
            let out = session.resolve_prompt(prompt, choice)?;
            print_outcome(&out.value, &out.events)?;
        }
        None => {
            eprintln!();
            session.dismiss_prompt(prompt);
        }
    }
    Ok(())
}

fn parse_choice(line: &str) -> Option<PromptChoice> {
    let line = line.trim();
    let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
    match word.to_ascii_lowercase().as_str() {
        "c" | "completed" | "done" => Some(PromptChoice::Completed),
        "f" | "failed" => Some(PromptChoice::Failed),
        "p" | "penalty" | "constrain" => Some(PromptChoice::Constrain {
            penalty: Some(rest.trim().to_string()).filter(|t| !t.is_empty()),
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_choices() {
        assert_eq!(parse_choice("c\n"), Some(PromptChoice::Completed));
        assert_eq!(parse_choice("FAILED"), Some(PromptChoice::Failed));
        assert_eq!(
            parse_choice("p no coffee tomorrow"),
            Some(PromptChoice::Constrain {
                penalty: Some("no coffee tomorrow".into())
            })
        );
        assert_eq!(parse_choice("p"), Some(PromptChoice::Constrain { penalty: None }));
        assert_eq!(parse_choice(""), None);
        assert_eq!(parse_choice("later"), None);
    }
}

// Interactive selection on a terminal, used when selection flags are omitted

use crate::error::{Result, SsmTailError};
use crate::logs::FilterSpec;
use crate::select::{Environment, RunningInstance};
use std::io::{self, BufRead, StdinLock, Stdout, Write};

/// Asks the operator to pick or type a value
pub trait Prompter {
    /// Free text; an empty answer yields `default` when one is given
    fn prompt_text(&mut self, message: &str, default: Option<&str>) -> Result<String>;

    /// One entry of `choices`, by index
    fn prompt_choice(&mut self, message: &str, choices: &[String]) -> Result<usize>;

    /// Any number of entries of `choices`, by index, in the order given
    fn prompt_multi_choice(&mut self, message: &str, choices: &[String]) -> Result<Vec<usize>>;
}

/// Numbered menus over a line-oriented reader and writer
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
}

impl TerminalPrompter<StdinLock<'static>, Stdout> {
    /// Prompter on the process's own terminal
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `prompt` and read one answer without its line ending
    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut answer = String::new();
        if self.input.read_line(&mut answer)? == 0 {
            return Err(SsmTailError::Selection(
                "input closed before a selection was made".to_string(),
            ));
        }

        Ok(answer.trim_end_matches(['\n', '\r']).to_string())
    }

    fn list(&mut self, message: &str, choices: &[String]) -> Result<()> {
        if choices.is_empty() {
            return Err(SsmTailError::Selection(format!(
                "{}: nothing to choose from",
                message
            )));
        }

        write!(self.output, "{}", format_choices(message, choices))?;
        Ok(())
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn prompt_text(&mut self, message: &str, default: Option<&str>) -> Result<String> {
        let prompt = match default {
            Some(default) => format!("{} [{}]: ", message, default),
            None => format!("{}: ", message),
        };

        let answer = self.ask(&prompt)?;
        match default {
            Some(default) if answer.trim().is_empty() => Ok(default.to_string()),
            _ => Ok(answer),
        }
    }

    fn prompt_choice(&mut self, message: &str, choices: &[String]) -> Result<usize> {
        self.list(message, choices)?;

        let mut prompt = format!("Enter choice (1-{}): ", choices.len());
        loop {
            let answer = self.ask(&prompt)?;
            if let Some(index) = parse_choice(&answer, choices.len()) {
                return Ok(index);
            }
            prompt = format!("Invalid choice, enter a number between 1 and {}: ", choices.len());
        }
    }

    fn prompt_multi_choice(&mut self, message: &str, choices: &[String]) -> Result<Vec<usize>> {
        self.list(message, choices)?;

        let mut prompt = format!("Enter choices (e.g. 1,3; empty for all {}): ", choices.len());
        loop {
            let answer = self.ask(&prompt)?;
            if let Some(indices) = parse_multi_choice(&answer, choices.len()) {
                return Ok(indices);
            }
            prompt = format!("Invalid choice, use numbers between 1 and {}: ", choices.len());
        }
    }
}

/// Menu text: the message followed by one numbered line per choice
pub fn format_choices(message: &str, choices: &[String]) -> String {
    let mut output = format!("{}\n", message);
    for (i, choice) in choices.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, choice));
    }
    output
}

/// 1-based answer to a 0-based index
pub fn parse_choice(input: &str, num_choices: usize) -> Option<usize> {
    input
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|n| *n > 0 && *n <= num_choices)
        .map(|n| n - 1)
}

/// Comma- or space-separated answers; empty or `all` selects everything.
/// Repeated numbers count once.
pub fn parse_multi_choice(input: &str, num_choices: usize) -> Option<Vec<usize>> {
    let input = input.trim();
    if input.is_empty() || input.eq_ignore_ascii_case("all") {
        return Some((0..num_choices).collect());
    }

    let mut indices = Vec::new();
    for token in input.split([',', ' ']).filter(|t| !t.is_empty()) {
        let index = parse_choice(token, num_choices)?;
        if !indices.contains(&index) {
            indices.push(index);
        }
    }

    Some(indices)
}

/// Pick an environment by name
pub fn choose_environment(prompter: &mut dyn Prompter, environments: &[Environment]) -> Result<String> {
    let choices: Vec<String> = environments
        .iter()
        .map(|env| format!("{} ({})", env.name, env.platform))
        .collect();

    let index = prompter.prompt_choice("Select environment:", &choices)?;
    Ok(environments[index].name.clone())
}

/// Pick any subset of an environment's instances
pub fn choose_instances(prompter: &mut dyn Prompter, instance_ids: &[String]) -> Result<Vec<String>> {
    let indices = prompter.prompt_multi_choice("Select instances:", instance_ids)?;
    Ok(indices.into_iter().map(|i| instance_ids[i].clone()).collect())
}

/// Pick one running instance for an interactive session
pub fn choose_running_instance(
    prompter: &mut dyn Prompter,
    instances: &[RunningInstance],
) -> Result<String> {
    let choices: Vec<String> = instances
        .iter()
        .map(|instance| {
            if instance.name.is_empty() {
                instance.id.clone()
            } else {
                format!("{} ({})", instance.name, instance.id)
            }
        })
        .collect();

    let index = prompter.prompt_choice("Select instance:", &choices)?;
    Ok(instances[index].id.clone())
}

/// Ask for a grep pattern, then for its trailing context unless
/// `after_context` was already given. An empty pattern tails every line.
pub fn ask_filter(prompter: &mut dyn Prompter, after_context: usize) -> Result<FilterSpec> {
    let pattern = prompter.prompt_text("grep regex (empty for every line)", None)?;
    if pattern.trim().is_empty() {
        return Ok(FilterSpec::pass_through());
    }

    let context = if after_context > 0 {
        after_context
    } else {
        loop {
            let answer = prompter.prompt_text("grep -A", Some("0"))?;
            if let Ok(count) = answer.trim().parse::<usize>() {
                break count;
            }
        }
    };

    FilterSpec::new(Some(&pattern), context)
}

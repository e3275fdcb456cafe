// Output formatting and display for CLI

use crate::logs::color_for;
use crate::select::{Environment, RunningInstance, Target};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

/// Print an error message to stderr
pub fn print_error(error: &str) {
    eprintln!("{} {}", "✗ Error:".red().bold(), error);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print a success message
pub fn print_success_msg(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print the targets about to be tailed, each in its stream color
pub fn print_targets(targets: &[Target]) {
    print_info(&format!("Tailing {} instance(s)", targets.len()));
    for (index, target) in targets.iter().enumerate() {
        println!(
            "  {} {}",
            color_for(index).paint(&target.id),
            target.log_paths.join(", ").dimmed()
        );
    }
}

/// Print a table of Elastic Beanstalk environments
pub fn print_environment_table(environments: &[Environment]) {
    #[derive(Tabled)]
    struct EnvironmentRow {
        #[tabled(rename = "Environment")]
        name: String,
        #[tabled(rename = "Platform")]
        platform: String,
    }

    if environments.is_empty() {
        println!("{}", "No environments found".yellow());
        return;
    }

    let rows: Vec<EnvironmentRow> = environments
        .iter()
        .map(|env| EnvironmentRow {
            name: env.name.clone(),
            platform: truncate(&env.platform, 60),
        })
        .collect();

    print_table(Table::new(rows), environments.len(), "environment(s)");
}

/// Print a table of running EC2 instances
pub fn print_instance_table(instances: &[RunningInstance]) {
    #[derive(Tabled)]
    struct InstanceRow {
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Instance")]
        id: String,
    }

    if instances.is_empty() {
        println!("{}", "No running instances found".yellow());
        return;
    }

    let rows: Vec<InstanceRow> = instances
        .iter()
        .map(|instance| InstanceRow {
            name: if instance.name.is_empty() {
                "-".to_string()
            } else {
                truncate(&instance.name, 40)
            },
            id: instance.id.clone(),
        })
        .collect();

    print_table(Table::new(rows), instances.len(), "instance(s)");
}

fn print_table(mut table: Table, count: usize, noun: &str) {
    table
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()));

    println!("\n{}\n", table);
    println!("{}", format!("Total: {} {}", count, noun).dimmed().italic());
}

/// Truncate a string to a maximum number of characters
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Create a spinner on stderr for cloud lookups
pub fn create_progress_bar(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Finish a progress bar with success
pub fn finish_progress_success(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{} {}", "✓".green(), message));
}

/// Finish a progress bar with error
pub fn finish_progress_error(pb: ProgressBar, message: &str) {
    pb.finish_with_message(format!("{} {}", "✗".red(), message));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is a very long string", 10), "this is...");
    }

    #[test]
    fn test_truncate_multibyte() {
        assert_eq!(truncate("가나다라마바사", 5), "가나...");
    }
}

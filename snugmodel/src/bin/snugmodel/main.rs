mod commands;
mod examples;
mod output;
mod theme;

use std::fmt::Write;

use anyhow::Result;
use clap::{ColorChoice, Command, CommandFactory, FromArgMatches, Parser, Subcommand};
use colored::{Color, Colorize, control::ShouldColorize};

use commands::{
    key::{KeyCommands, handle_key_commands},
    schema::{SchemaCommands, handle_schema_commands},
};
use examples::{ExampleGroup, command_examples};
use output::{GlobalOptions, OutputFormat, OutputManager};
use theme::{ARROW, PALETTE, help_styles};

const ENVIRONMENT_VARIABLES: &[(&str, &str)] = &[("RUST_LOG", "Log filter, e.g. RUST_LOG=snugmodel=debug")];

#[derive(Parser)]
#[command(name = "snugmodel")]
#[command(version)]
#[command(
    about = "Inspect snugmodel keys and schema files",
    long_about = r#"Command line companion for snugmodel:

• Encode key paths into URL-safe resource ids
• Decode resource ids back into typed key paths
• Validate TOML model schemas before loading them in an application
"#
)]
#[command(subcommand_required = true, arg_required_else_help = true)]
struct Cli {
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Suppress output (only errors will be shown)
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Enable verbose output
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encode and decode resource ids
    #[command(subcommand)]
    Key(KeyCommands),

    /// Check model schema files
    #[command(subcommand)]
    Schema(SchemaCommands),
}

/// Full clap command with help styles, the environment appendix and per-command examples.
fn cli_command() -> Command {
    let use_color = ShouldColorize::from_env().should_colorize();
    let mut command = Cli::command()
        .styles(help_styles())
        .color(if use_color { ColorChoice::Auto } else { ColorChoice::Never })
        .after_long_help(render_appendix(use_color));
    for example in command_examples() {
        if let Some(subcommand) = command.find_subcommand_mut(example.name) {
            *subcommand = subcommand
                .clone()
                .after_long_help(render_examples(example.groups, use_color));
        }
    }
    command
}

fn paint(text: &str, color: Color, bold: bool, use_color: bool) -> String {
    match (use_color, bold) {
        (false, _) => text.to_string(),
        (true, true) => text.color(color).bold().to_string(),
        (true, false) => text.color(color).to_string(),
    }
}

fn render_examples(groups: &[ExampleGroup], use_color: bool) -> String {
    let mut buffer = String::new();
    let _ = writeln!(buffer, "{}", paint("Examples:", PALETTE.accent, true, use_color));
    for (index, group) in groups.iter().enumerate() {
        if index > 0 {
            buffer.push('\n');
        }
        let _ = writeln!(buffer, "  {}", paint(group.title, PALETTE.kind, true, use_color));
        for line in group.commands {
            let _ = writeln!(
                buffer,
                "    {} {}",
                paint(ARROW, PALETTE.dim, false, use_color),
                paint(line, PALETTE.token, false, use_color)
            );
        }
    }
    buffer
}

fn render_appendix(use_color: bool) -> String {
    let mut buffer = String::new();
    let _ = writeln!(buffer, "{}", paint("Environment Variables:", PALETTE.accent, true, use_color));
    for (name, description) in ENVIRONMENT_VARIABLES {
        let _ = writeln!(buffer, "  {}  {description}", paint(name, PALETTE.kind, true, use_color));
    }
    let _ = writeln!(
        buffer,
        "\n{} {}",
        paint("Tip:", PALETTE.accent, true, use_color),
        paint("Use 'snugmodel <command> --help' to view examples for each command.", PALETTE.dim, false, use_color)
    );
    buffer
}

fn main() {
    env_logger::init();

    let cli = match cli_command()
        .try_get_matches()
        .and_then(|matches| Cli::from_arg_matches(&matches))
    {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };
    if cli.no_color {
        colored::control::set_override(false);
    }
    let output = OutputManager::new(GlobalOptions {
        output_format: cli.output.clone(),
        quiet: cli.quiet,
        verbose: cli.verbose,
        no_color: cli.no_color,
    });

    if let Err(err) = execute(cli.command, &output) {
        output.error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

fn execute(command: Commands, output: &OutputManager) -> Result<()> {
    match command {
        Commands::Key(key_cmd) => handle_key_commands(key_cmd, output),
        Commands::Schema(schema_cmd) => handle_schema_commands(schema_cmd, output),
    }
}

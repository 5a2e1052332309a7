use anyhow::Result;
use clap::ValueEnum;
use colored::{Color, Colorize};
use comfy_table::{Attribute, Cell, Color as TableColor, Table, presets};
use serde::Serialize;

use crate::theme::{ARROW, BULLET, MARK_FAIL, MARK_OK, PALETTE};

/// How command reports are rendered.
#[derive(Clone, Debug, Default, PartialEq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables
    #[default]
    Table,
    /// Pretty-printed JSON
    Json,
    /// One line per report, for shell pipelines
    Compact,
}

#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub verbose: bool,
    pub no_color: bool,
}

/// A command report renderable in every [`OutputFormat`]; JSON comes from `Serialize`.
pub trait TableDisplay {
    fn to_table(&self, options: &GlobalOptions) -> Table;
    fn to_compact(&self) -> String;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    pub fn render<T>(&self, report: &T) -> Result<String>
    where
        T: Serialize + TableDisplay,
    {
        Ok(match self.options.output_format {
            OutputFormat::Table => report.to_table(&self.options).to_string(),
            OutputFormat::Json => serde_json::to_string_pretty(report)?,
            OutputFormat::Compact => report.to_compact(),
        })
    }

    /// Print `report` to stdout unless quiet.
    pub fn display<T>(&self, report: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if !self.options.quiet {
            println!("{}", self.render(report)?);
        }
        Ok(())
    }

    /// Decorative messages only accompany table output.
    fn chatty(&self) -> bool {
        !self.options.quiet && self.options.output_format == OutputFormat::Table
    }

    fn marked(&self, mark: &str, color: Color, message: &str) -> String {
        if self.options.no_color {
            format!("{mark} {message}")
        } else {
            format!("{} {}", mark.color(color), message.color(color))
        }
    }

    pub fn success(&self, message: &str) {
        if self.chatty() {
            println!("{}", self.marked(MARK_OK, PALETTE.ok, message));
        }
    }

    /// Errors are printed even in quiet mode.
    pub fn error(&self, message: &str) {
        eprintln!("{}", self.marked(MARK_FAIL, PALETTE.fail, message));
    }

    pub fn verbose(&self, message: &str) {
        if self.options.verbose && !self.options.quiet {
            eprintln!("{}", self.marked(ARROW, PALETTE.dim, message));
        }
    }

    pub fn heading(&self, text: &str) {
        if !self.chatty() {
            return;
        }
        if self.options.no_color {
            println!("\n{text}\n{}", "=".repeat(text.chars().count()));
        } else {
            println!("\n{}", text.color(PALETTE.kind).bold());
        }
    }

    pub fn bullet(&self, text: &str) {
        if self.chatty() {
            let bullet = if self.options.no_color { BULLET.normal() } else { BULLET.color(PALETTE.dim) };
            println!("  {bullet} {text}");
        }
    }
}

pub fn create_table(options: &GlobalOptions) -> Table {
    let mut table = Table::new();
    if options.no_color {
        table.load_preset(presets::ASCII_FULL);
    } else {
        table.load_preset(presets::UTF8_FULL_CONDENSED);
    }
    table
}

/// Bold header row, tinted unless color is off.
pub fn add_table_header(table: &mut Table, options: &GlobalOptions, headers: &[&str]) {
    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| {
            let cell = Cell::new(h).add_attribute(Attribute::Bold);
            if options.no_color { cell } else { cell.fg(TableColor::DarkCyan) }
        })
        .collect();
    table.set_header(header_cells);
}

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use comfy_table::{Cell, Table};
use serde::Serialize;

use snugmodel::{FieldDef, Model, schema};

use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, TableDisplay, add_table_header, create_table};

pub const EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Schema Check",
    commands: &[
        "snugmodel schema check models.toml              # Validate and list models",
        "snugmodel --output json schema check models.toml",
    ],
}];

#[derive(Subcommand)]
pub enum SchemaCommands {
    /// Load a TOML schema and list its models and fields
    #[command(name = "check")]
    Check {
        /// Schema file
        file: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct SchemaReport {
    models: Vec<ModelRow>,
}

#[derive(Debug, Serialize)]
struct ModelRow {
    kind: String,
    has_repeated: bool,
    fields: Vec<FieldRow>,
}

#[derive(Debug, Serialize)]
struct FieldRow {
    attr: String,
    name: String,
    #[serde(rename = "type")]
    field_type: String,
    indexed: bool,
    repeated: bool,
    required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    options: Vec<String>,
}

impl From<&Model> for ModelRow {
    fn from(model: &Model) -> Self {
        Self {
            kind: model.kind().to_string(),
            has_repeated: model.has_repeated(),
            fields: model.fields().iter().map(|field| FieldRow::from(field.as_ref())).collect(),
        }
    }
}

impl From<&FieldDef> for FieldRow {
    fn from(field: &FieldDef) -> Self {
        let mut options = Vec::new();
        if let Some(nested) = field.nested_model() {
            options.push(format!("model={}", nested.kind()));
        }
        if let Some(validator) = field.validator() {
            options.push(format!("validator={}", validator.label()));
        }
        if let Some(choices) = field.choices() {
            options.push(format!("choices={}", choices.len()));
        }
        if let Some(json_type) = field.json_type() {
            options.push(format!("json_type={}", json_type.as_str()));
        }
        if field.temporal().auto_now {
            options.push("auto_now".to_string());
        }
        if field.temporal().auto_now_add {
            options.push("auto_now_add".to_string());
        }
        if field.writes_empty_list() {
            options.push("write_empty_list".to_string());
        }
        if let Some(verbose_name) = field.verbose_name() {
            options.push(format!("verbose_name={verbose_name:?}"));
        }
        Self {
            attr: field.code_name().to_string(),
            name: field.name().to_string(),
            field_type: field.field_type().to_string(),
            indexed: field.is_indexed(),
            repeated: field.is_repeated(),
            required: field.is_required(),
            default: field.default_value().and_then(|value| serde_json::to_value(value).ok()),
            options,
        }
    }
}

fn flag(value: bool) -> &'static str {
    if value { "yes" } else { "" }
}

impl TableDisplay for SchemaReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = create_table(options);
        add_table_header(
            &mut table,
            options,
            &["Kind", "Attribute", "Name", "Type", "Indexed", "Repeated", "Required", "Default", "Options"],
        );
        for model in &self.models {
            for field in &model.fields {
                table.add_row(vec![
                    Cell::new(&model.kind),
                    Cell::new(&field.attr),
                    Cell::new(&field.name),
                    Cell::new(&field.field_type),
                    Cell::new(flag(field.indexed)),
                    Cell::new(flag(field.repeated)),
                    Cell::new(flag(field.required)),
                    Cell::new(field.default.as_ref().map(ToString::to_string).unwrap_or_default()),
                    Cell::new(field.options.join(", ")),
                ]);
            }
        }
        table
    }

    fn to_compact(&self) -> String {
        self.models
            .iter()
            .map(|model| format!("{}({})", model.kind, model.fields.len()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

pub fn handle_schema_commands(command: SchemaCommands, output: &OutputManager) -> Result<()> {
    match command {
        SchemaCommands::Check { file } => handle_check(&file, output),
    }
}

fn handle_check(file: &Path, output: &OutputManager) -> Result<()> {
    output.verbose(&format!("loading {}", file.display()));
    let models = schema::load_file(file).with_context(|| format!("schema {} is invalid", file.display()))?;

    let report = SchemaReport {
        models: models.iter().map(|model| ModelRow::from(model.as_ref())).collect(),
    };
    output.heading(&format!("Schema {}", file.display()));
    output.display(&report)?;
    output.success(&format!("{} model(s) loaded", report.models.len()));
    Ok(())
}

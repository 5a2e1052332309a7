use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Table};
use serde::Serialize;

use snugmodel::{Key, KeyId};

use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, TableDisplay, add_table_header, create_table};

pub const EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Encode",
        commands: &[
            "snugmodel key encode Parent:abc Child:123     # Integer id for Child",
            "snugmodel key encode Order:0042 --text-ids    # Keep 0042 as text",
        ],
    },
    ExampleGroup {
        title: "Decode",
        commands: &[
            "snugmodel key decode UGFyZW50HmFiYx5DaGlsZB4fMTIz",
            "snugmodel key decode <token> --kind Child      # Reject other leaf kinds",
        ],
    },
];

#[derive(Subcommand)]
pub enum KeyCommands {
    /// Encode a key path into a resource id
    #[command(name = "encode")]
    Encode {
        /// Path pairs as KIND:ID, root first
        #[arg(required = true, value_name = "KIND:ID")]
        pairs: Vec<String>,

        /// Treat every identifier as text, even when it parses as an integer
        #[arg(long)]
        text_ids: bool,
    },

    /// Decode a resource id into its key path
    #[command(name = "decode")]
    Decode {
        /// Resource id token
        token: String,

        /// Expected leaf kind
        #[arg(long)]
        kind: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct KeyReport {
    resource_id: String,
    pairs: Vec<PairRow>,
}

#[derive(Debug, Serialize)]
struct PairRow {
    kind: String,
    id: String,
    id_type: &'static str,
}

impl KeyReport {
    fn new(key: &Key) -> Self {
        let pairs = key
            .pairs()
            .iter()
            .map(|(kind, id)| match id {
                KeyId::Name(name) => PairRow {
                    kind: kind.clone(),
                    id: name.clone(),
                    id_type: "text",
                },
                KeyId::Id(id) => PairRow {
                    kind: kind.clone(),
                    id: id.to_string(),
                    id_type: "integer",
                },
            })
            .collect();
        Self {
            resource_id: key.to_resource_id(),
            pairs,
        }
    }
}

impl TableDisplay for KeyReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = create_table(options);
        add_table_header(&mut table, options, &["#", "Kind", "Id", "Id type"]);
        for (index, pair) in self.pairs.iter().enumerate() {
            table.add_row(vec![
                Cell::new(index + 1),
                Cell::new(&pair.kind),
                Cell::new(&pair.id),
                Cell::new(pair.id_type),
            ]);
        }
        table
    }

    fn to_compact(&self) -> String {
        self.resource_id.clone()
    }
}

pub fn handle_key_commands(command: KeyCommands, output: &OutputManager) -> Result<()> {
    match command {
        KeyCommands::Encode { pairs, text_ids } => handle_encode(&pairs, text_ids, output),
        KeyCommands::Decode { token, kind } => handle_decode(&token, kind.as_deref(), output),
    }
}

fn parse_pair(raw: &str, text_ids: bool) -> Result<(String, KeyId)> {
    let Some((kind, id)) = raw.split_once(':') else {
        bail!("expected KIND:ID, got {raw:?}");
    };
    let id = match id.parse::<i64>() {
        Ok(number) if !text_ids => KeyId::Id(number),
        _ => KeyId::Name(id.to_string()),
    };
    Ok((kind.to_string(), id))
}

fn handle_encode(raw_pairs: &[String], text_ids: bool, output: &OutputManager) -> Result<()> {
    let pairs = raw_pairs
        .iter()
        .map(|raw| parse_pair(raw, text_ids))
        .collect::<Result<Vec<_>>>()?;
    let key = Key::new(pairs).context("cannot build key")?;
    output.verbose(&format!("encoding {key}"));

    let report = KeyReport::new(&key);
    output.heading("Resource id");
    output.bullet(&report.resource_id);
    output.display(&report)
}

fn handle_decode(token: &str, kind: Option<&str>, output: &OutputManager) -> Result<()> {
    let key = match kind {
        Some(kind) => Key::from_resource_id_of_kind(kind, token),
        None => Key::from_resource_id(token),
    }
    .context("cannot decode resource id")?;
    output.verbose(&format!("decoded {key}"));

    output.heading("Key path");
    output.display(&KeyReport::new(&key))?;
    output.success(&format!("{} pair(s), leaf kind {}", key.pairs().len(), key.kind()));
    Ok(())
}

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use env_logger::Env;
use serde_json::Value;

use nodeconfig::{
    ConfigFormat, Session, Settings, StructuralValidator, Validator, types::NodeTypeGenerator,
};

#[derive(Parser)]
#[command(name = "nodeconfig", version)]
#[command(about = "Map configuration files onto schema-generated node graphs")]
struct Cli {
    /// Settings file (json, toml or yaml)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the generated node types, categories and variants
    Types {
        #[arg(long)]
        schema: PathBuf,
    },

    /// Load a config into a graph and print the extracted value
    Convert {
        #[arg(long)]
        schema: PathBuf,

        #[arg(long)]
        config: PathBuf,

        /// Output format, defaults to the config file's own
        #[arg(long, value_enum)]
        to: Option<ConfigFormat>,

        /// Emit schema defaults for absent properties
        #[arg(long)]
        fill_defaults: bool,

        /// Emit null for absent properties without a default
        #[arg(long)]
        fill_nulls: bool,
    },

    /// Print the node graph a config populates
    Graph {
        #[arg(long)]
        schema: PathBuf,

        #[arg(long)]
        config: PathBuf,
    },

    /// Check a config against the schema
    Validate {
        #[arg(long)]
        schema: PathBuf,

        #[arg(long)]
        config: PathBuf,
    },

    /// Print the JSON Schema of the settings file
    SettingsSchema,
}

fn read_schema(path: &Path) -> anyhow::Result<Value> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read schema {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid schema {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    let settings = match &cli.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    match cli.command {
        Command::Types { schema } => {
            let schema = read_schema(&schema)?;
            let generation = NodeTypeGenerator::new(settings.generate).generate(&schema)?;
            println!("{}", serde_json::to_string_pretty(&generation)?);
        }
        Command::Convert {
            schema,
            config,
            to,
            fill_defaults,
            fill_nulls,
        } => {
            let schema = read_schema(&schema)?;
            let mut session = Session::new_with_settings(Some(&config), &schema, &settings)?;
            session.extract.fill_defaults |= fill_defaults;
            session.extract.fill_nulls |= fill_nulls;

            let format = match to {
                Some(format) => format,
                None => ConfigFormat::from_path(&config)?,
            };
            let value = session.as_json()?;
            print!("{}", format.render(&value)?);
        }
        Command::Graph { schema, config } => {
            let schema = read_schema(&schema)?;
            let session = Session::new_with_settings(Some(&config), &schema, &settings)?;
            println!("{}", serde_json::to_string_pretty(&session.graph)?);
        }
        Command::Validate { schema, config } => {
            let schema = read_schema(&schema)?;
            if !StructuralValidator.check_schema(&schema) {
                bail!("schema is not usable");
            }
            let format = ConfigFormat::from_path(&config)?;
            let content = fs::read_to_string(&config)
                .with_context(|| format!("Failed to read {}", config.display()))?;
            let value = format.parse(&content)?;

            let issues = StructuralValidator.validate(&schema, &value);
            for issue in &issues {
                let path = if issue.path.is_empty() { "<root>" } else { &issue.path };
                println!("{path}: {}", issue.message);
            }
            if !issues.is_empty() {
                bail!("{} issue(s) in {}", issues.len(), config.display());
            }
            println!("{} is valid", config.display());
        }
        Command::SettingsSchema => {
            println!("{}", serde_json::to_string_pretty(&Settings::json_schema())?);
        }
    }
    Ok(())
}

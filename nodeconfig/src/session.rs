use std::{
    fs,
    path::{Path, PathBuf},
    time::SystemTime,
};

use anyhow::{Context, bail};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    diagnostics::Diagnostics,
    extract::{ConfigExtractor, ExtractOptions, FieldHook},
    format::ConfigFormat,
    graph::NodeGraph,
    populate::GraphPopulator,
    settings::Settings,
    types::{Generation, NodeTypeGenerator},
};

const DEFAULT_CONFIG_PATH: &str = ".config.toml";

/// Derive a default schema path from a config path.
pub fn default_schema_by_init(config: &Path) -> PathBuf {
    let stem = config
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    let name = format!("{stem}-schema.json");

    match config.parent() {
        Some(parent) => parent.join(name),
        None => PathBuf::from(name),
    }
}

/// One schema, one live graph and the config file they are saved to.
pub struct Session {
    pub generation: Generation,
    pub graph: NodeGraph,
    /// Path to the configuration file.
    pub config: PathBuf,
    /// Whether the graph has changes not yet written to `config`.
    pub needs_save: bool,
    pub extract: ExtractOptions,
    /// Diagnostics from the most recent load.
    pub diagnostics: Diagnostics,
    pub field_hooks: Vec<FieldHook>,
}

impl Session {
    /// Build a session from optional config and schema paths.
    ///
    /// When schema is not provided, it is derived from the config path.
    pub fn new(
        config: Option<impl AsRef<Path>>,
        schema: Option<impl AsRef<Path>>,
    ) -> anyhow::Result<Self> {
        let config_path = Self::config_path(config);

        let schema_path = match schema {
            Some(sch) => sch.as_ref().to_path_buf(),
            None => default_schema_by_init(&config_path),
        };
        if !schema_path.exists() {
            bail!("Schema file does not exist: {}", schema_path.display());
        }

        let schema_content = fs::read_to_string(&schema_path)?;
        let schema_json: Value = serde_json::from_str(&schema_content)
            .with_context(|| format!("Invalid schema {}", schema_path.display()))?;
        Self::new_with_schema(Some(config_path), &schema_json)
    }

    fn config_path(config: Option<impl AsRef<Path>>) -> PathBuf {
        config
            .map(|c| c.as_ref().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Build a session from a schema value and an optional config path.
    ///
    /// If the config file exists, it is loaded into the graph.
    pub fn new_with_schema(
        config: Option<impl AsRef<Path>>,
        schema: &Value,
    ) -> anyhow::Result<Self> {
        Self::new_with_settings(config, schema, &Settings::default())
    }

    /// Like [`new_with_schema`](Self::new_with_schema) with explicit settings.
    pub fn new_with_settings(
        config: Option<impl AsRef<Path>>,
        schema: &Value,
        settings: &Settings,
    ) -> anyhow::Result<Self> {
        let config_path = Self::config_path(config);
        let init = if config_path.exists() {
            fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?
        } else {
            String::new()
        };
        Self::open(&init, &config_path, schema, settings)
    }

    /// Build a session from content that has already been read.
    pub fn new_with_init_and_schema(
        init: &str,
        config: &Path,
        schema: &Value,
    ) -> anyhow::Result<Self> {
        Self::open(init, config, schema, &Settings::default())
    }

    fn open(
        init: &str,
        config: &Path,
        schema: &Value,
        settings: &Settings,
    ) -> anyhow::Result<Self> {
        let format = ConfigFormat::from_path(config)?;
        let generation = NodeTypeGenerator::new(settings.generate.clone()).generate(schema)?;

        let mut session = Session {
            generation,
            graph: NodeGraph::new(),
            config: config.to_path_buf(),
            needs_save: false,
            extract: settings.extract.clone(),
            diagnostics: Diagnostics::new(),
            field_hooks: Vec::new(),
        };
        let value = format
            .parse(init)
            .with_context(|| format!("Failed to parse {}", config.display()))?;
        session.load(&value)?;
        Ok(session)
    }

    fn load(&mut self, value: &Value) -> anyhow::Result<()> {
        let report = GraphPopulator::new(&self.generation).load(
            &mut self.graph,
            &self.generation.root_type_id,
            value,
        )?;
        self.diagnostics = report.diagnostics;
        Ok(())
    }

    /// Replace the whole graph with `value`.
    pub fn update(&mut self, value: &Value) -> anyhow::Result<()> {
        self.load(value)?;
        self.needs_save = true;
        Ok(())
    }

    /// Mutable graph access; marks the session dirty.
    pub fn graph_mut(&mut self) -> &mut NodeGraph {
        self.needs_save = true;
        &mut self.graph
    }

    /// Current configuration value extracted from the graph.
    pub fn as_json(&self) -> anyhow::Result<Value> {
        let extractor = self
            .field_hooks
            .iter()
            .fold(ConfigExtractor::new(&self.generation), |ex, hook| ex.with_hook(hook))
            .with_options(self.extract.clone());
        Ok(extractor.generate(&self.graph, &self.generation.root_type_id)?)
    }

    /// Deserialize the current value into a typed config.
    pub fn to_typed<C: DeserializeOwned>(&self) -> anyhow::Result<C> {
        let value = self.as_json()?;
        serde_json::from_value(value).context("Config does not match the target type")
    }

    /// Persist changes and keep a timestamped backup of the previous file.
    pub fn save(&mut self) -> anyhow::Result<()> {
        if !self.needs_save {
            return Ok(());
        }
        let format = ConfigFormat::from_path(&self.config)?;
        let content = format.render(&self.as_json()?)?;

        if self.config.exists() {
            let bk = format!(
                "bk-{}.{}",
                SystemTime::now()
                    .duration_since(SystemTime::UNIX_EPOCH)?
                    .as_secs(),
                self.config
                    .extension()
                    .and_then(|s| s.to_str())
                    .unwrap_or(format.extension())
            );
            let backup_path = self.config.with_extension(bk);
            fs::copy(&self.config, &backup_path)?;
            info!("backup written to {}", backup_path.display());
        }
        fs::write(&self.config, content)
            .with_context(|| format!("Failed to write {}", self.config.display()))?;
        self.needs_save = false;
        Ok(())
    }
}

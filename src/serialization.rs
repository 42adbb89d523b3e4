use crate::config::{NotebookConfig, CONFIG_FILE};
use crate::validation::Validator;
use crate::{ActionRecord, Cell, CellCollection, CellId};
use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Notebook manifest containing metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    pub version: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Manifest {
    /// Create a new manifest
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            version: "0.1.0".to_string(),
            created: now,
            modified: now,
        }
    }

    /// Update the modified timestamp
    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }

    /// Save manifest to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("Failed to create manifest file: {}", path.display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .with_context(|| format!("Failed to write manifest to: {}", path.display()))?;
        Ok(())
    }

    /// Load manifest from file
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open manifest file: {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse manifest from: {}", path.display()))
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self::new()
    }
}

/// On-disk form of a cell collection
#[derive(Debug, Serialize, Deserialize)]
struct SerializableCollection {
    order: Vec<CellId>,
    data: HashMap<CellId, Cell>,
}

impl SerializableCollection {
    fn from_collection(collection: &CellCollection) -> Self {
        Self {
            order: collection.order().to_vec(),
            data: collection.data().clone(),
        }
    }

    fn into_collection(self) -> CellCollection {
        CellCollection::from_parts(self.order, self.data)
    }
}

/// A notebook saved as a directory:
/// `manifest.json`, `cells.json`, `actions.jsonl` and an optional `notebook.toml`
pub struct NotebookDir {
    root_dir: PathBuf,
}

impl NotebookDir {
    /// Create a new notebook directory holding the seed collection
    pub fn create(path: &Path) -> Result<Self> {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create notebook directory: {}", path.display()))?;

        let dir = Self {
            root_dir: path.to_path_buf(),
        };
        dir.save_manifest(&Manifest::new())?;
        dir.save_cells(&CellCollection::seeded())?;

        File::create(dir.actions_path()).with_context(|| {
            format!("Failed to create actions.jsonl: {}", dir.actions_path().display())
        })?;

        Ok(dir)
    }

    /// Open an existing notebook directory
    pub fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(anyhow!("Notebook directory does not exist: {}", path.display()));
        }

        let manifest_path = path.join("manifest.json");
        if !manifest_path.exists() {
            return Err(anyhow!("manifest.json not found in notebook directory"));
        }

        Ok(Self {
            root_dir: path.to_path_buf(),
        })
    }

    /// Open a notebook directory, creating it when it has no manifest yet
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if path.join("manifest.json").exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Get the root directory
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Get path to manifest.json
    pub fn manifest_path(&self) -> PathBuf {
        self.root_dir.join("manifest.json")
    }

    /// Get path to cells.json
    pub fn cells_path(&self) -> PathBuf {
        self.root_dir.join("cells.json")
    }

    /// Get path to actions.jsonl
    pub fn actions_path(&self) -> PathBuf {
        self.root_dir.join("actions.jsonl")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root_dir.join(CONFIG_FILE)
    }

    /// Load `notebook.toml`, or defaults when there is none
    pub fn load_config(&self) -> Result<NotebookConfig> {
        NotebookConfig::load_or_default(&self.root_dir)
    }

    /// Save manifest
    pub fn save_manifest(&self, manifest: &Manifest) -> Result<()> {
        manifest.save(&self.manifest_path())
    }

    /// Load manifest
    pub fn load_manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.manifest_path())
    }

    /// Save the collection to cells.json
    pub fn save_cells(&self, collection: &CellCollection) -> Result<()> {
        let cells_path = self.cells_path();
        let serializable = SerializableCollection::from_collection(collection);

        let file = File::create(&cells_path)
            .with_context(|| format!("Failed to create cells.json: {}", cells_path.display()))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, &serializable)
            .with_context(|| format!("Failed to write cells.json: {}", cells_path.display()))?;

        debug!(path = %cells_path.display(), cells = collection.len(), "saved cells");
        Ok(())
    }

    /// Load and validate the collection from cells.json
    pub fn load_cells(&self) -> Result<CellCollection> {
        let cells_path = self.cells_path();

        let file = File::open(&cells_path)
            .with_context(|| format!("Failed to open cells.json: {}", cells_path.display()))?;
        let reader = BufReader::new(file);

        let serializable: SerializableCollection = serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse cells.json: {}", cells_path.display()))?;
        let collection = serializable.into_collection();

        let validation = Validator::validate(&collection);
        if !validation.is_valid() {
            bail!(
                "Invalid cells.json ({}): {}",
                cells_path.display(),
                validation.error_summary()
            );
        }
        for issue in validation.warnings() {
            warn!(path = %cells_path.display(), cells = ?issue.affected_cells, "{}", issue.message);
        }

        Ok(collection)
    }

    /// Load the collection, falling back to the seed when nothing was saved
    pub fn load_cells_or_seed(&self) -> Result<CellCollection> {
        if !self.cells_path().exists() {
            return Ok(CellCollection::seeded());
        }
        self.load_cells()
    }

    /// Append action records to actions.jsonl
    pub fn append_actions(&self, records: &[ActionRecord]) -> Result<()> {
        let actions_path = self.actions_path();

        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&actions_path)
            .with_context(|| format!("Failed to open actions.jsonl: {}", actions_path.display()))?;

        let mut writer = BufWriter::new(file);

        for record in records {
            let json = serde_json::to_string(record).with_context(|| {
                format!("Failed to serialize action: {}", actions_path.display())
            })?;
            writeln!(writer, "{}", json).with_context(|| {
                format!("Failed to write action to: {}", actions_path.display())
            })?;
        }

        writer
            .flush()
            .with_context(|| format!("Failed to flush actions.jsonl: {}", actions_path.display()))?;

        Ok(())
    }

    /// Load all action records from actions.jsonl
    pub fn load_actions(&self) -> Result<Vec<ActionRecord>> {
        let actions_path = self.actions_path();

        if !actions_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&actions_path)
            .with_context(|| format!("Failed to open actions.jsonl: {}", actions_path.display()))?;
        let reader = BufReader::new(file);

        let mut records = Vec::new();
        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| {
                format!(
                    "Failed to read line {} from: {}",
                    line_num + 1,
                    actions_path.display()
                )
            })?;

            if line.trim().is_empty() {
                continue;
            }

            let record: ActionRecord = serde_json::from_str(&line).with_context(|| {
                format!(
                    "Failed to parse action on line {} from: {}",
                    line_num + 1,
                    actions_path.display()
                )
            })?;

            records.push(record);
        }

        Ok(records)
    }

    /// Save the collection, touch the manifest and append `records`
    pub fn save(&self, collection: &CellCollection, records: &[ActionRecord]) -> Result<()> {
        let mut manifest = self.load_manifest().unwrap_or_default();
        manifest.touch();
        self.save_manifest(&manifest)?;

        self.save_cells(collection)?;
        self.append_actions(records)?;

        Ok(())
    }

    /// Load manifest and collection
    pub fn load(&self) -> Result<(Manifest, CellCollection)> {
        let manifest = self.load_manifest()?;
        let collection = self.load_cells_or_seed()?;

        Ok((manifest, collection))
    }
}

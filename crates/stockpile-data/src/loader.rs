//! Resolution pipeline: reads data files, resolves kind and pattern names,
//! and builds a ready-to-run [`Network`].
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers, plus [`load_network_data`] which ties them
//! together.

use log::{debug, info};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use stockpile_core::config::SchedulerConfig;
use stockpile_core::disk::StorageDisk;
use stockpile_core::disk_registry::DiskRegistryError;
use stockpile_core::fixed::f64_to_fixed64;
use stockpile_core::id::{FamilyId, KindId};
use stockpile_core::network::Network;
use stockpile_core::node::Crafter;
use stockpile_core::pattern::CraftingPattern;
use stockpile_core::stack::ResourceStack;

use crate::schema::*;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A definition is well-formed but unusable.
    #[error("invalid {what} '{name}' in {file}: {detail}")]
    Invalid {
        file: PathBuf,
        what: &'static str,
        name: String,
        detail: String,
    },

    /// A disk's initial contents exceed its capacity.
    #[error("disk {index} in {file} cannot hold its contents")]
    DiskOverflow { file: PathBuf, index: usize },

    #[error(transparent)]
    Registry(#[from] DiskRegistryError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let extensions = ["ron", "toml", "json"];
    let mut found: Option<PathBuf> = None;

    for ext in &extensions {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(ref existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        }),
        Format::Json => serde_json::from_str(&content).map_err(|e| DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        }),
        Format::Toml => toml::from_str(&content).map_err(|e| DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        }),
    }
}

/// Deserialize a list from a file. For TOML files, extracts the array at the
/// given `toml_key` from a top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        }),
        Format::Json => serde_json::from_str(&content).map_err(|e| DataLoadError::Parse {
            file: path.to_path_buf(),
            detail: e.to_string(),
        }),
        Format::Toml => {
            let table: toml::Value =
                toml::from_str(&content).map_err(|e| DataLoadError::Parse {
                    file: path.to_path_buf(),
                    detail: e.to_string(),
                })?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| DataLoadError::Parse {
                    file: path.to_path_buf(),
                    detail: format!("missing key '{toml_key}' in TOML file"),
                })?
                .clone();
            // Deserialize the array value into Vec<T>.
            array
                .try_into()
                .map_err(|e: toml::de::Error| DataLoadError::Parse {
                    file: path.to_path_buf(),
                    detail: e.to_string(),
                })
        }
    }
}

// ===========================================================================
// Name resolution helpers
// ===========================================================================

/// Look up a name in a map, returning an `UnresolvedRef` error if not found.
pub fn resolve_name<'a, V>(
    map: &'a HashMap<String, V>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    map.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.to_path_buf(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Check whether a name already exists in a map, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate<V>(
    map: &HashMap<String, V>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if map.contains_key(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Loading pipeline
// ===========================================================================

/// A crafter definition with its pattern names resolved.
#[derive(Debug, Clone)]
pub struct CrafterDef {
    pub name: String,
    pub patterns: Vec<CraftingPattern>,
    pub speed: u32,
    pub duration: u32,
    pub enabled: bool,
}

/// Everything loaded from a data directory, with names resolved to ids.
#[derive(Debug)]
pub struct NetworkData {
    pub kinds: HashMap<String, KindId>,
    pub patterns: HashMap<String, CraftingPattern>,
    pub crafters: Vec<CrafterDef>,
    pub disks: Vec<StorageDisk>,
    pub config: SchedulerConfig,
}

impl NetworkData {
    pub fn kind(&self, name: &str) -> Option<KindId> {
        self.kinds.get(name).copied()
    }

    pub fn pattern(&self, name: &str) -> Option<&CraftingPattern> {
        self.patterns.get(name)
    }

    /// Build a powered network: disks are registered and mounted in file
    /// order, then one crafter node per definition.
    pub fn build(&self) -> Result<Network, DataLoadError> {
        let mut network = Network::new(self.config.clone());
        for disk in &self.disks {
            network.add_disk(disk.clone())?;
        }
        for def in &self.crafters {
            let mut crafter = Crafter::new(def.patterns.clone(), def.speed, def.duration);
            crafter.set_enabled(def.enabled);
            network.add_node(Box::new(crafter));
        }
        Ok(network)
    }
}

/// Kind names resolved to ids, plus the family each kind belongs to.
struct KindTable {
    ids: HashMap<String, KindId>,
    families: HashMap<KindId, FamilyId>,
}

impl KindTable {
    fn stack(&self, data: &StackData, file: &Path) -> Result<ResourceStack, DataLoadError> {
        let kind = *resolve_name(&self.ids, data.kind_name(), file, "kind")?;
        let mut stack = match data {
            StackData::Short(_, quantity) => ResourceStack::new(kind, *quantity),
            StackData::Full {
                quantity,
                variant,
                metadata,
                ..
            } => {
                let mut stack = ResourceStack::new(kind, *quantity).with_variant(*variant);
                stack.metadata = metadata.clone();
                stack
            }
        };
        if let Some(family) = self.families.get(&kind) {
            stack = stack.with_family(*family);
        }
        Ok(stack)
    }

    fn stacks(&self, data: &[StackData], file: &Path) -> Result<Vec<ResourceStack>, DataLoadError> {
        data.iter().map(|s| self.stack(s, file)).collect()
    }
}

fn load_kinds(path: &Path) -> Result<KindTable, DataLoadError> {
    let data: Vec<KindData> = deserialize_list(path, "kinds")?;
    let mut ids = HashMap::new();
    let mut family_ids: HashMap<String, FamilyId> = HashMap::new();
    let mut families = HashMap::new();
    for (index, kind) in data.iter().enumerate() {
        check_duplicate(&ids, &kind.name, path)?;
        let id = KindId(index as u32);
        ids.insert(kind.name.clone(), id);
        if let Some(family) = &kind.family {
            let next = FamilyId(family_ids.len() as u32);
            let family_id = *family_ids.entry(family.clone()).or_insert(next);
            families.insert(id, family_id);
        }
    }
    Ok(KindTable { ids, families })
}

fn load_patterns(
    path: &Path,
    kinds: &KindTable,
) -> Result<HashMap<String, CraftingPattern>, DataLoadError> {
    let data: Vec<PatternData> = deserialize_list(path, "patterns")?;
    let mut patterns = HashMap::new();
    for p in &data {
        check_duplicate(&patterns, &p.name, path)?;
        if p.outputs.is_empty() {
            return Err(DataLoadError::Invalid {
                file: path.to_path_buf(),
                what: "pattern",
                name: p.name.clone(),
                detail: "no outputs".to_string(),
            });
        }
        let outputs = kinds.stacks(&p.outputs, path)?;
        if outputs.iter().any(|o| o.quantity == 0) {
            return Err(DataLoadError::Invalid {
                file: path.to_path_buf(),
                what: "pattern",
                name: p.name.clone(),
                detail: "zero quantity output".to_string(),
            });
        }
        let mut pattern = CraftingPattern::new(kinds.stacks(&p.inputs, path)?, outputs)
            .with_byproducts(kinds.stacks(&p.byproducts, path)?)
            .with_blocking(p.blocking)
            .with_fuzzy(p.fuzzy);
        if let Some(task) = &p.task {
            pattern = pattern.with_task_id(task);
        }
        patterns.insert(p.name.clone(), pattern);
    }
    Ok(patterns)
}

fn load_crafters(
    path: &Path,
    patterns: &HashMap<String, CraftingPattern>,
) -> Result<Vec<CrafterDef>, DataLoadError> {
    let data: Vec<CrafterData> = deserialize_list(path, "crafters")?;
    let mut seen: HashMap<String, ()> = HashMap::new();
    data.iter()
        .map(|c| {
            check_duplicate(&seen, &c.name, path)?;
            seen.insert(c.name.clone(), ());
            let resolved = c
                .patterns
                .iter()
                .map(|name| resolve_name(patterns, name, path, "pattern").cloned())
                .collect::<Result<Vec<_>, DataLoadError>>()?;
            Ok(CrafterDef {
                name: c.name.clone(),
                patterns: resolved,
                speed: c.speed,
                duration: c.duration,
                enabled: c.enabled,
            })
        })
        .collect()
}

fn load_disks(path: &Path, kinds: &KindTable) -> Result<Vec<StorageDisk>, DataLoadError> {
    let data: Vec<DiskData> = deserialize_list(path, "disks")?;
    data.iter()
        .enumerate()
        .map(|(index, d)| {
            let mut disk = match d.disk_type {
                DiskTypeData::Items => StorageDisk::items(d.capacity),
                DiskTypeData::Fluids => StorageDisk::fluids(d.capacity),
            };
            for stack in kinds.stacks(&d.contents, path)? {
                if disk.insert(stack, false).is_some() {
                    return Err(DataLoadError::DiskOverflow {
                        file: path.to_path_buf(),
                        index,
                    });
                }
            }
            Ok(disk)
        })
        .collect()
}

fn load_scheduler_config(path: &Path) -> Result<SchedulerConfig, DataLoadError> {
    let data: SchedulerData = deserialize_file(path)?;
    let defaults = SchedulerConfig::default();
    let config = SchedulerConfig {
        update_interval: data.update_interval.unwrap_or(defaults.update_interval),
        retry_interval: data.retry_interval.unwrap_or(defaults.retry_interval),
        retry_probability: data
            .retry_probability
            .map_or(defaults.retry_probability, f64_to_fixed64),
        rng_seed: data.rng_seed.unwrap_or(defaults.rng_seed),
    };
    Ok(config.normalized())
}

/// Load a network definition from `dir`.
///
/// `kinds` and `patterns` are required; `crafters`, `disks` and `scheduler`
/// are optional. Each may be `.ron`, `.toml` or `.json`.
pub fn load_network_data(dir: &Path) -> Result<NetworkData, DataLoadError> {
    let kinds_path = require_data_file(dir, "kinds")?;
    let kinds = load_kinds(&kinds_path)?;

    let patterns_path = require_data_file(dir, "patterns")?;
    let patterns = load_patterns(&patterns_path, &kinds)?;

    let crafters = match find_data_file(dir, "crafters")? {
        Some(path) => load_crafters(&path, &patterns)?,
        None => Vec::new(),
    };
    let disks = match find_data_file(dir, "disks")? {
        Some(path) => load_disks(&path, &kinds)?,
        None => Vec::new(),
    };
    let config = match find_data_file(dir, "scheduler")? {
        Some(path) => load_scheduler_config(&path)?,
        None => {
            debug!("No scheduler file in {}, using defaults", dir.display());
            SchedulerConfig::default()
        }
    };

    info!(
        "Loaded {} kinds, {} patterns, {} crafters, {} disks from {}",
        kinds.ids.len(),
        patterns.len(),
        crafters.len(),
        disks.len(),
        dir.display()
    );
    Ok(NetworkData {
        kinds: kinds.ids,
        patterns,
        crafters,
        disks,
        config,
    })
}

// ===========================================================================
// Tests
// ===========================================================================


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use stockpile_core::disk::DiskType;
    use stockpile_core::fixed::Fixed64;
    use stockpile_core::stack::CompareFlags;
    use stockpile_core::storage::StorageNetwork;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "stockpile_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    const KINDS_RON: &str = r#"[
        (name: "iron_plate"),
        (name: "copper_wire"),
        (name: "circuit"),
    ]"#;

    const PATTERNS_RON: &str = r#"[
        (
            name: "circuit",
            inputs: [("iron_plate", 4), ("copper_wire", 1)],
            outputs: [("circuit", 2)],
        ),
    ]"#;

    // -----------------------------------------------------------------------
    // Format helpers
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("kinds.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("kinds.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("kinds.json")).unwrap(), Format::Json);
        assert!(matches!(
            detect_format(Path::new("kinds.yaml")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
        assert!(matches!(
            detect_format(Path::new("kinds")),
            Err(DataLoadError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn find_data_file_prefers_the_single_match() {
        let dir = make_test_dir("find_single");
        assert_eq!(find_data_file(&dir, "disks").unwrap(), None);

        fs::write(dir.join("disks.toml"), "").unwrap();
        assert_eq!(
            find_data_file(&dir, "disks").unwrap(),
            Some(dir.join("disks.toml"))
        );

        fs::write(dir.join("disks.json"), "[]").unwrap();
        assert!(matches!(
            find_data_file(&dir, "disks"),
            Err(DataLoadError::ConflictingFormats { .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn require_data_file_names_the_missing_file() {
        let dir = make_test_dir("require_missing");
        let err = require_data_file(&dir, "kinds").unwrap_err();
        assert!(matches!(err, DataLoadError::MissingRequired { ref file, .. } if file == "kinds"));
        assert!(format!("{err}").contains("kinds"));
        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_reads_toml_arrays_by_key() {
        let dir = make_test_dir("list_toml");
        let path = dir.join("kinds.toml");
        fs::write(
            &path,
            r#"
[[kinds]]
name = "iron_plate"

[[kinds]]
name = "red_wire"
family = "wire"
"#,
        )
        .unwrap();
        let kinds: Vec<KindData> = deserialize_list(&path, "kinds").unwrap();
        assert_eq!(kinds.len(), 2);
        assert_eq!(kinds[1].family.as_deref(), Some("wire"));

        let missing: Result<Vec<KindData>, _> = deserialize_list(&path, "patterns");
        assert!(matches!(missing, Err(DataLoadError::Parse { .. })));
        cleanup(&dir);
    }

    #[test]
    fn deserialize_file_reports_parse_errors() {
        let dir = make_test_dir("parse_err");
        let path = dir.join("kinds.ron");
        fs::write(&path, "this is not valid RON {{{").unwrap();
        let result: Result<Vec<KindData>, _> = deserialize_file(&path);
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));
        cleanup(&dir);
    }

    #[test]
    fn resolve_and_duplicate_helpers() {
        let mut map = HashMap::new();
        map.insert("circuit".to_string(), KindId(2));
        assert_eq!(
            *resolve_name(&map, "circuit", Path::new("patterns.ron"), "kind").unwrap(),
            KindId(2)
        );
        assert!(matches!(
            resolve_name(&map, "gear", Path::new("patterns.ron"), "kind"),
            Err(DataLoadError::UnresolvedRef { ref name, expected_kind: "kind", .. }) if name == "gear"
        ));
        assert!(check_duplicate(&map, "gear", Path::new("kinds.ron")).is_ok());
        assert!(matches!(
            check_duplicate(&map, "circuit", Path::new("kinds.ron")),
            Err(DataLoadError::DuplicateName { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Pipeline
    // -----------------------------------------------------------------------

    #[test]
    fn loads_full_ron_directory() {
        let dir = make_test_dir("full_ron");
        fs::write(dir.join("kinds.ron"), KINDS_RON).unwrap();
        fs::write(dir.join("patterns.ron"), PATTERNS_RON).unwrap();
        fs::write(
            dir.join("crafters.ron"),
            r#"[(name: "assembler", patterns: ["circuit"], speed: 2, duration: 3)]"#,
        )
        .unwrap();
        fs::write(
            dir.join("disks.ron"),
            r#"[(type: items, contents: [("iron_plate", 20), ("copper_wire", 5)])]"#,
        )
        .unwrap();
        fs::write(
            dir.join("scheduler.toml"),
            "update_interval = 3\nretry_probability = 0.25\n",
        )
        .unwrap();

        let data = load_network_data(&dir).unwrap();
        assert_eq!(data.kind("iron_plate"), Some(KindId(0)));
        assert_eq!(data.kind("circuit"), Some(KindId(2)));
        assert_eq!(data.crafters.len(), 1);
        assert_eq!(data.crafters[0].speed, 2);
        assert_eq!(data.crafters[0].patterns[0].outputs[0].quantity, 2);
        assert_eq!(data.disks[0].stored(), 25);
        assert_eq!(data.config.update_interval, 3);
        // Rounded up to the next update cycle.
        assert_eq!(data.config.retry_interval, 102);
        assert_eq!(data.config.retry_probability, Fixed64::from_num(0.25));

        let mut network = data.build().unwrap();
        assert_eq!(network.nodes().len(), 1);
        assert_eq!(network.storage().mounted().len(), 1);
        let iron = ResourceStack::new(KindId(0), 1);
        assert_eq!(
            network
                .storage()
                .list(DiskType::Items)
                .count(&iron, CompareFlags::default()),
            20
        );
        let circuit = ResourceStack::new(KindId(2), 1);
        assert!(network.schedule(&circuit, 4, CompareFlags::default()).is_some());
        cleanup(&dir);
    }

    #[test]
    fn optional_files_fall_back_to_defaults() {
        let dir = make_test_dir("json_minimal");
        fs::write(
            dir.join("kinds.json"),
            r#"[{"name": "iron_plate"}, {"name": "gear"}]"#,
        )
        .unwrap();
        fs::write(
            dir.join("patterns.json"),
            r#"[{"name": "gear", "inputs": [["iron_plate", 2]], "outputs": [["gear", 1]], "blocking": true}]"#,
        )
        .unwrap();

        let data = load_network_data(&dir).unwrap();
        assert!(data.crafters.is_empty());
        assert!(data.disks.is_empty());
        assert_eq!(data.config.update_interval, 5);
        assert!(data.pattern("gear").unwrap().blocking);
        cleanup(&dir);
    }

    #[test]
    fn shared_family_names_share_a_family_id() {
        let dir = make_test_dir("families");
        fs::write(
            dir.join("kinds.ron"),
            r#"[(name: "red_wire", family: Some("wire")), (name: "blue_wire", family: Some("wire")), (name: "cable")]"#,
        )
        .unwrap();
        fs::write(
            dir.join("patterns.ron"),
            r#"[(name: "cable", inputs: [("red_wire", 2)], outputs: [("cable", 1)], fuzzy: true)]"#,
        )
        .unwrap();

        let data = load_network_data(&dir).unwrap();
        let pattern = data.pattern("cable").unwrap();
        assert!(pattern.fuzzy);
        let red = &pattern.inputs[0];
        let blue = ResourceStack::new(data.kind("blue_wire").unwrap(), 2).with_family(FamilyId(0));
        assert_eq!(red.family, Some(FamilyId(0)));
        assert!(blue.matches(red, pattern.input_flags()));
        assert_eq!(pattern.outputs[0].family, None);
        cleanup(&dir);
    }

    #[test]
    fn unresolved_kind_in_pattern_fails() {
        let dir = make_test_dir("bad_kind");
        fs::write(dir.join("kinds.ron"), KINDS_RON).unwrap();
        fs::write(
            dir.join("patterns.ron"),
            r#"[(name: "gear", inputs: [("steel", 2)], outputs: [("circuit", 1)])]"#,
        )
        .unwrap();
        let err = load_network_data(&dir).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::UnresolvedRef { ref name, expected_kind: "kind", .. } if name == "steel"
        ));
        cleanup(&dir);
    }

    #[test]
    fn unresolved_pattern_in_crafter_fails() {
        let dir = make_test_dir("bad_pattern");
        fs::write(dir.join("kinds.ron"), KINDS_RON).unwrap();
        fs::write(dir.join("patterns.ron"), PATTERNS_RON).unwrap();
        fs::write(
            dir.join("crafters.ron"),
            r#"[(name: "assembler", patterns: ["circuit", "gear"])]"#,
        )
        .unwrap();
        let err = load_network_data(&dir).unwrap_err();
        assert!(matches!(
            err,
            DataLoadError::UnresolvedRef { expected_kind: "pattern", .. }
        ));
        cleanup(&dir);
    }

    #[test]
    fn duplicate_kind_names_fail() {
        let dir = make_test_dir("dup_kind");
        fs::write(
            dir.join("kinds.ron"),
            r#"[(name: "iron_plate"), (name: "iron_plate")]"#,
        )
        .unwrap();
        fs::write(dir.join("patterns.ron"), "[]").unwrap();
        assert!(matches!(
            load_network_data(&dir),
            Err(DataLoadError::DuplicateName { .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn pattern_without_outputs_is_invalid() {
        let dir = make_test_dir("no_outputs");
        fs::write(dir.join("kinds.ron"), KINDS_RON).unwrap();
        fs::write(
            dir.join("patterns.ron"),
            r#"[(name: "void", inputs: [("iron_plate", 1)], outputs: [])]"#,
        )
        .unwrap();
        assert!(matches!(
            load_network_data(&dir),
            Err(DataLoadError::Invalid { what: "pattern", .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn overfull_disk_fails() {
        let dir = make_test_dir("overflow");
        fs::write(dir.join("kinds.ron"), KINDS_RON).unwrap();
        fs::write(dir.join("patterns.ron"), PATTERNS_RON).unwrap();
        fs::write(
            dir.join("disks.ron"),
            r#"[(type: items, capacity: Some(10), contents: [("iron_plate", 20)])]"#,
        )
        .unwrap();
        assert!(matches!(
            load_network_data(&dir),
            Err(DataLoadError::DiskOverflow { index: 0, .. })
        ));
        cleanup(&dir);
    }

    #[test]
    fn scheduler_probability_is_clamped() {
        let dir = make_test_dir("clamp");
        fs::write(dir.join("kinds.ron"), KINDS_RON).unwrap();
        fs::write(dir.join("patterns.ron"), PATTERNS_RON).unwrap();
        fs::write(
            dir.join("scheduler.json"),
            r#"{"retry_probability": 1.5, "update_interval": 0}"#,
        )
        .unwrap();
        let data = load_network_data(&dir).unwrap();
        assert_eq!(data.config.retry_probability, Fixed64::ONE);
        assert_eq!(data.config.update_interval, 1);
        cleanup(&dir);
    }
}

//! # Option declaration, aggregation, and parsing.
//!
//! Each plugin contributes declarations to two [`OptionGroup`]s: the
//! command-line-only group and the shared group (command line **and**
//! configuration file). The aggregator merges every registered plugin's
//! groups with the built-in options into one `clap` command, parses argv,
//! overlays the TOML configuration file, and produces the [`OptionMap`]
//! handed to each plugin's initialize hook.
//!
//! Precedence, lowest to highest: declared default, configuration file,
//! explicit command line. The aggregator checks names, not semantics: a
//! name declared by two plugins (or colliding with a built-in) is a
//! registration error.

use std::collections::HashMap;
use std::path::Path;

use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::error::{AppError, PluginError};
use crate::registry::PluginHandle;

/// Option names owned by the framework itself.
const BUILTIN_OPTIONS: &[&str] = &["plugin", "config-file", "help", "version"];

/// A parsed option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Flag(bool),
    U64(u64),
    Text(String),
}

/// Name → value map produced by the aggregator.
///
/// Typed accessors return [`PluginError`]s so plugin initialize hooks can
/// propagate them with `?`.
#[derive(Debug, Clone, Default)]
pub struct OptionMap {
    values: HashMap<String, OptionValue>,
}

impl OptionMap {
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// True when the flag was set (explicitly or via the config file).
    pub fn flag(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(OptionValue::Flag(true)))
    }

    pub fn u64(&self, name: &str) -> Result<u64, PluginError> {
        match self.values.get(name) {
            Some(OptionValue::U64(v)) => Ok(*v),
            Some(other) => Err(PluginError::InvalidOption {
                name: name.to_string(),
                reason: format!("expected an integer, got {other:?}"),
            }),
            None => Err(PluginError::MissingOption {
                name: name.to_string(),
            }),
        }
    }

    pub fn text(&self, name: &str) -> Result<&str, PluginError> {
        match self.values.get(name) {
            Some(OptionValue::Text(v)) => Ok(v),
            Some(other) => Err(PluginError::InvalidOption {
                name: name.to_string(),
                reason: format!("expected a string, got {other:?}"),
            }),
            None => Err(PluginError::MissingOption {
                name: name.to_string(),
            }),
        }
    }

    fn insert(&mut self, name: &str, value: OptionValue) {
        self.values.insert(name.to_string(), value);
    }
}

#[derive(Debug, Clone)]
enum DeclKind {
    Flag,
    U64 { default: Option<u64> },
    Text { default: Option<&'static str> },
}

/// A single declared option.
#[derive(Debug, Clone)]
pub struct OptionDecl {
    name: &'static str,
    help: &'static str,
    kind: DeclKind,
}

impl OptionDecl {
    fn to_arg(&self) -> Arg {
        let arg = Arg::new(self.name).long(self.name).help(self.help);
        match &self.kind {
            DeclKind::Flag => arg.action(ArgAction::SetTrue),
            DeclKind::U64 { default } => {
                let arg = arg.value_name("N").value_parser(clap::value_parser!(u64));
                match default {
                    Some(d) => arg.default_value(d.to_string()),
                    None => arg,
                }
            }
            DeclKind::Text { default } => {
                let arg = arg.value_name("VALUE");
                match default {
                    Some(d) => arg.default_value(*d),
                    None => arg,
                }
            }
        }
    }

    fn default_value(&self) -> Option<OptionValue> {
        match &self.kind {
            DeclKind::Flag => None,
            DeclKind::U64 { default } => default.map(OptionValue::U64),
            DeclKind::Text { default } => default.map(|d| OptionValue::Text(d.to_string())),
        }
    }
}

/// Ordered list of option declarations contributed by one plugin.
#[derive(Debug, Clone, Default)]
pub struct OptionGroup {
    decls: Vec<OptionDecl>,
}

impl OptionGroup {
    /// Declares a boolean switch (`--name`).
    pub fn flag(&mut self, name: &'static str, help: &'static str) -> &mut Self {
        self.decls.push(OptionDecl {
            name,
            help,
            kind: DeclKind::Flag,
        });
        self
    }

    /// Declares an unsigned integer option (`--name N`).
    pub fn u64(&mut self, name: &'static str, help: &'static str, default: Option<u64>) -> &mut Self {
        self.decls.push(OptionDecl {
            name,
            help,
            kind: DeclKind::U64 { default },
        });
        self
    }

    /// Declares a string option (`--name VALUE`).
    pub fn text(
        &mut self,
        name: &'static str,
        help: &'static str,
        default: Option<&'static str>,
    ) -> &mut Self {
        self.decls.push(OptionDecl {
            name,
            help,
            kind: DeclKind::Text { default },
        });
        self
    }
}

#[derive(Debug)]
struct SchemaEntry {
    owner: &'static str,
    shared: bool,
    decl: OptionDecl,
}

/// The merged option schema of one run.
#[derive(Debug)]
pub(crate) struct OptionSchema {
    entries: Vec<SchemaEntry>,
}

impl OptionSchema {
    /// Queries every plugin instance for its declarations.
    pub(crate) fn collect(handles: &[PluginHandle]) -> Result<Self, AppError> {
        let mut groups = Vec::with_capacity(handles.len());
        for handle in handles {
            let mut cli = OptionGroup::default();
            let mut cfg = OptionGroup::default();
            handle.plugin.declare_options(&mut cli, &mut cfg);
            groups.push((handle.name(), cli, cfg));
        }
        Self::from_groups(groups)
    }

    pub(crate) fn from_groups(
        mut groups: Vec<(&'static str, OptionGroup, OptionGroup)>,
    ) -> Result<Self, AppError> {
        // Deterministic help output regardless of registry iteration order.
        groups.sort_by_key(|(owner, _, _)| *owner);

        let mut owners: HashMap<&'static str, &'static str> = HashMap::new();
        let mut entries = Vec::new();
        for (owner, cli, cfg) in groups {
            for (group, shared) in [(cli, false), (cfg, true)] {
                for decl in group.decls {
                    if BUILTIN_OPTIONS.contains(&decl.name) {
                        return Err(AppError::DuplicateOption {
                            name: decl.name.to_string(),
                            first: "chassis".to_string(),
                            second: owner.to_string(),
                        });
                    }
                    if let Some(first) = owners.insert(decl.name, owner) {
                        return Err(AppError::DuplicateOption {
                            name: decl.name.to_string(),
                            first: first.to_string(),
                            second: owner.to_string(),
                        });
                    }
                    entries.push(SchemaEntry {
                        owner,
                        shared,
                        decl,
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    /// Builds the clap command: built-ins first, then every plugin option.
    pub(crate) fn command(&self, name: &str, version: &str, about: Option<&str>) -> Command {
        let mut cmd = Command::new(name.to_string())
            .version(version.to_string())
            .arg(
                Arg::new("plugin")
                    .long("plugin")
                    .value_name("NAME")
                    .action(ArgAction::Append)
                    .help("Activate the named plugin (repeatable)"),
            )
            .arg(
                Arg::new("config-file")
                    .long("config-file")
                    .value_name("PATH")
                    .help("Read additional option values from a TOML file"),
            );
        if let Some(about) = about {
            cmd = cmd.about(about.to_string());
        }
        for entry in &self.entries {
            cmd = cmd.arg(entry.decl.to_arg());
        }
        cmd
    }

    /// Merges defaults, config-file values, and explicit command-line
    /// values into the final map.
    pub(crate) fn option_map(
        &self,
        matches: &ArgMatches,
        config: Option<(&Path, &toml::Table)>,
    ) -> Result<OptionMap, AppError> {
        let mut map = OptionMap::default();

        for entry in &self.entries {
            if let Some(value) = entry.decl.default_value() {
                map.insert(entry.decl.name, value);
            }
        }

        if let Some((path, table)) = config {
            for (key, value) in table {
                let entry = self
                    .entries
                    .iter()
                    .find(|e| e.decl.name == key.as_str())
                    .ok_or_else(|| AppError::ConfigFile {
                        path: path.to_path_buf(),
                        reason: format!("unknown option '{key}'"),
                    })?;
                if !entry.shared {
                    return Err(AppError::ConfigFile {
                        path: path.to_path_buf(),
                        reason: format!(
                            "option '{key}' (declared by '{}') is command-line only",
                            entry.owner
                        ),
                    });
                }
                map.insert(entry.decl.name, convert_toml(path, key, value, &entry.decl.kind)?);
            }
        }

        for entry in &self.entries {
            let name = entry.decl.name;
            if matches.value_source(name) != Some(ValueSource::CommandLine) {
                continue;
            }
            match &entry.decl.kind {
                DeclKind::Flag => map.insert(name, OptionValue::Flag(matches.get_flag(name))),
                DeclKind::U64 { .. } => {
                    if let Some(v) = matches.get_one::<u64>(name) {
                        map.insert(name, OptionValue::U64(*v));
                    }
                }
                DeclKind::Text { .. } => {
                    if let Some(v) = matches.get_one::<String>(name) {
                        map.insert(name, OptionValue::Text(v.clone()));
                    }
                }
            }
        }

        Ok(map)
    }
}

fn convert_toml(
    path: &Path,
    key: &str,
    value: &toml::Value,
    kind: &DeclKind,
) -> Result<OptionValue, AppError> {
    let mismatch = |expected: &str| AppError::ConfigFile {
        path: path.to_path_buf(),
        reason: format!("option '{key}' expects {expected}, got {value}"),
    };
    match kind {
        DeclKind::Flag => match value {
            toml::Value::Boolean(b) => Ok(OptionValue::Flag(*b)),
            _ => Err(mismatch("a boolean")),
        },
        DeclKind::U64 { .. } => match value {
            toml::Value::Integer(i) if *i >= 0 => Ok(OptionValue::U64(*i as u64)),
            _ => Err(mismatch("a non-negative integer")),
        },
        DeclKind::Text { .. } => match value {
            toml::Value::String(s) => Ok(OptionValue::Text(s.clone())),
            _ => Err(mismatch("a string")),
        },
    }
}

/// Reads and parses the `--config-file` TOML table.
pub(crate) fn load_config_table(path: &Path) -> Result<toml::Table, AppError> {
    let contents = std::fs::read_to_string(path).map_err(|e| AppError::ConfigFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    toml::from_str(&contents).map_err(|e| AppError::ConfigFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_yaml::Value;
use tracing::{debug, instrument};

use crate::constants::{CONFIG_DIR_ENV, CONFIG_FILE, HOSTS_FILE, HOSTS_KEY};
use crate::error::ConfigError;
use crate::path::ConfigPath;
use crate::tree::{ConfigTree, Node};

/// Resolves the directory holding `config.yml` and `hosts.yml`.
///
/// Order: the explicit override, `GH_CONFIG_DIR`, `$XDG_CONFIG_HOME/gh`,
/// then `~/.config/gh`.
pub fn resolve_config_dir(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    resolve_with(explicit, |name| std::env::var(name).ok(), dirs::home_dir())
}

fn resolve_with(
    explicit: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
    home: Option<PathBuf>,
) -> Result<PathBuf, ConfigError> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = env(CONFIG_DIR_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = env("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(xdg).join("gh"));
    }
    home.map(|home| home.join(".config").join("gh"))
        .ok_or(ConfigError::NoConfigDir(CONFIG_DIR_ENV))
}

/// The pair of YAML files a [`ConfigTree`] is persisted to.
///
/// `hosts.yml` holds the `hosts` subtree; `config.yml` holds every other
/// top-level key, including the migration version marker.
#[derive(Debug, Clone)]
pub struct ConfigFiles {
    dir: PathBuf,
}

impl ConfigFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn hosts_path(&self) -> PathBuf {
        self.dir.join(HOSTS_FILE)
    }

    /// Loads both files into one tree. Missing files read as empty.
    #[instrument(skip(self), fields(dir = %self.dir.display()))]
    pub fn load(&self) -> Result<ConfigTree, ConfigError> {
        let mut entries = read_document(&self.config_path())?;

        // A non-empty hosts file is authoritative for the hosts subtree.
        // Otherwise any hosts kept in config.yml stay, and the next save
        // moves them to the hosts file.
        let hosts = read_document(&self.hosts_path())?;
        if !hosts.is_empty() {
            entries.insert(HOSTS_KEY.to_string(), Node::Map(hosts));
        }

        debug!("loaded {} top-level config entries", entries.len());
        Ok(ConfigTree::from_entries(entries))
    }

    /// Writes the tree back to both files, creating the directory if needed.
    #[instrument(skip(self, tree), fields(dir = %self.dir.display()))]
    pub fn save(&self, tree: &ConfigTree) -> Result<(), ConfigError> {
        fs::create_dir_all(&self.dir).map_err(|source| ConfigError::Write {
            path: self.dir.clone(),
            source,
        })?;

        let mut general = IndexMap::new();
        let mut hosts = None;
        for (key, node) in tree.entries() {
            if key == HOSTS_KEY {
                hosts = Some(node);
            } else {
                general.insert(key.clone(), node.clone());
            }
        }

        let general = Node::Map(general);
        write_document(&self.config_path(), &serde_yaml::to_string(&general)?, false)?;

        if let Some(hosts) = hosts {
            write_document(&self.hosts_path(), &serde_yaml::to_string(hosts)?, true)?;
        }

        debug!("saved config to {}", self.dir.display());
        Ok(())
    }
}

fn read_document(path: &Path) -> Result<IndexMap<String, Node>, ConfigError> {
    if !path.exists() {
        debug!("{} does not exist, treating as empty", path.display());
        return Ok(IndexMap::new());
    }

    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let value: Value = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    match node_from_yaml(value, path, &ConfigPath::root())? {
        Node::Map(children) => Ok(children),
        // An empty document parses as null.
        Node::Leaf(value) if value.is_empty() => Ok(IndexMap::new()),
        Node::Leaf(_) => Err(ConfigError::UnsupportedValue {
            file: path.to_path_buf(),
            path: ConfigPath::root(),
            kind: "top-level value is not a mapping",
        }),
    }
}

fn node_from_yaml(value: Value, file: &Path, at: &ConfigPath) -> Result<Node, ConfigError> {
    let unsupported = |kind| ConfigError::UnsupportedValue {
        file: file.to_path_buf(),
        path: at.clone(),
        kind,
    };

    match value {
        Value::Null => Ok(Node::leaf("")),
        Value::Bool(b) => Ok(Node::leaf(b.to_string())),
        Value::Number(n) => Ok(Node::leaf(n.to_string())),
        Value::String(s) => Ok(Node::Leaf(s)),
        Value::Sequence(_) => Err(unsupported("list")),
        Value::Tagged(_) => Err(unsupported("tagged value")),
        Value::Mapping(mapping) => {
            let mut children = IndexMap::with_capacity(mapping.len());
            for (key, child) in mapping {
                let key = match key {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => return Err(unsupported("non-scalar key")),
                };
                let child = node_from_yaml(child, file, &at.child(key.clone()))?;
                children.insert(key, child);
            }
            Ok(Node::Map(children))
        }
    }
}

/// Replaces `path` atomically: the content goes to a temporary file in the
/// same directory, which gets its final mode before being renamed over the
/// target.
fn write_document(path: &Path, content: &str, private: bool) -> Result<(), ConfigError> {
    let write_err = |source: io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = if private { 0o600 } else { 0o644 };
        file.as_file()
            .set_permissions(fs::Permissions::from_mode(mode))
            .map_err(write_err)?;
    }
    #[cfg(not(unix))]
    let _ = private;

    file.write_all(content.as_bytes()).map_err(write_err)?;
    file.as_file().sync_all().map_err(write_err)?;
    file.persist(path).map_err(|err| write_err(err.error))?;
    Ok(())
}

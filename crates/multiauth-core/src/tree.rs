use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::TreeError;
use crate::path::ConfigPath;

/// A single node of the config tree: either a scalar or an ordered section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(String),
    Map(IndexMap<String, Node>),
}

impl Node {
    pub fn empty_map() -> Self {
        Self::Map(IndexMap::new())
    }

    pub fn leaf(value: impl Into<String>) -> Self {
        Self::Leaf(value.into())
    }

    pub fn as_leaf(&self) -> Option<&str> {
        match self {
            Self::Leaf(value) => Some(value),
            Self::Map(_) => None,
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, Node>> {
        match self {
            Self::Map(children) => Some(children),
            Self::Leaf(_) => None,
        }
    }

    /// True for a section with at least one child.
    pub fn has_children(&self) -> bool {
        self.as_map().is_some_and(|children| !children.is_empty())
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Leaf(value) => serializer.serialize_str(value),
            Self::Map(children) => {
                let mut map = serializer.serialize_map(Some(children.len()))?;
                for (key, child) in children {
                    map.serialize_entry(key, child)?;
                }
                map.end()
            }
        }
    }
}

/// An in-memory, path-addressed configuration document.
///
/// The root is always a section. Reads distinguish a missing key
/// ([`TreeError::NotFound`]) from a key of the wrong shape, so callers can
/// treat absence as a normal condition without swallowing corruption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigTree {
    root: Node,
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigTree {
    pub fn new() -> Self {
        Self {
            root: Node::empty_map(),
        }
    }

    pub fn from_entries(entries: IndexMap<String, Node>) -> Self {
        Self {
            root: Node::Map(entries),
        }
    }

    /// Top-level entries in stored order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.root.as_map().into_iter().flat_map(|children| children.iter())
    }

    /// Returns the node stored at `path`.
    pub fn node(&self, path: &ConfigPath) -> Result<&Node, TreeError> {
        let mut current = &self.root;
        for segment in path.segments() {
            current = current
                .as_map()
                .and_then(|children| children.get(segment))
                .ok_or_else(|| TreeError::NotFound { path: path.clone() })?;
        }
        Ok(current)
    }

    /// Returns the scalar stored at `path`.
    pub fn get(&self, path: &ConfigPath) -> Result<&str, TreeError> {
        self.node(path)?
            .as_leaf()
            .ok_or_else(|| TreeError::NotALeaf { path: path.clone() })
    }

    /// Like [`get`](Self::get), but a missing key is `Ok(None)`.
    pub fn lookup(&self, path: &ConfigPath) -> Result<Option<&str>, TreeError> {
        match self.get(path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Returns the child names of the section at `path`, in stored order.
    pub fn keys(&self, path: &ConfigPath) -> Result<Vec<String>, TreeError> {
        self.node(path)?
            .as_map()
            .map(|children| children.keys().cloned().collect())
            .ok_or_else(|| TreeError::NotAMap { path: path.clone() })
    }

    /// Stores a scalar at `path`, creating missing sections on the way.
    ///
    /// Existing scalars are overwritten. A section is never replaced by a
    /// scalar, and a scalar is never turned into a section.
    pub fn set(&mut self, path: &ConfigPath, value: impl Into<String>) -> Result<(), TreeError> {
        let (parent, key) = path.split_last().ok_or(TreeError::EmptyPath)?;
        let children = self.section_mut(&parent)?;
        match children.get_mut(key) {
            Some(Node::Map(_)) => Err(TreeError::NotALeaf { path: path.clone() }),
            Some(slot) => {
                *slot = Node::Leaf(value.into());
                Ok(())
            }
            None => {
                children.insert(key.to_string(), Node::Leaf(value.into()));
                Ok(())
            }
        }
    }

    /// Makes sure a (possibly empty) section exists at `path`.
    pub fn ensure_map(&mut self, path: &ConfigPath) -> Result<(), TreeError> {
        self.section_mut(path).map(|_| ())
    }

    fn section_mut(&mut self, path: &ConfigPath) -> Result<&mut IndexMap<String, Node>, TreeError> {
        let mut current = &mut self.root;
        for (depth, segment) in path.segments().iter().enumerate() {
            let children = match current {
                Node::Map(children) => children,
                Node::Leaf(_) => {
                    return Err(TreeError::NotAMap {
                        path: ConfigPath::from_segments(&path.segments()[..depth]),
                    })
                }
            };
            current = children
                .entry(segment.clone())
                .or_insert_with(Node::empty_map);
        }
        match current {
            Node::Map(children) => Ok(children),
            Node::Leaf(_) => Err(TreeError::NotAMap { path: path.clone() }),
        }
    }
}

impl Serialize for ConfigTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.root.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> ConfigTree {
        let mut tree = ConfigTree::new();
        tree.set(&ConfigPath::host("github.com").child("user"), "monalisa")
            .expect("set user");
        tree.set(&ConfigPath::host("github.com").child("git_protocol"), "https")
            .expect("set protocol");
        tree
    }

    #[test]
    fn set_creates_intermediate_sections() {
        let tree = fixture();
        assert_eq!(tree.keys(&ConfigPath::hosts()).unwrap(), vec!["github.com"]);
        assert_eq!(
            tree.get(&ConfigPath::host("github.com").child("user")).unwrap(),
            "monalisa"
        );
    }

    #[test]
    fn keys_preserve_insertion_order() {
        let mut tree = fixture();
        tree.set(&ConfigPath::host("github.com").child("editor"), "vim")
            .unwrap();
        assert_eq!(
            tree.keys(&ConfigPath::host("github.com")).unwrap(),
            vec!["user", "git_protocol", "editor"]
        );
    }

    #[test]
    fn missing_key_is_distinguished_from_wrong_shape() {
        let tree = fixture();

        let missing = tree
            .get(&ConfigPath::host("ghe.io").child("user"))
            .expect_err("unknown host must not resolve");
        assert!(missing.is_not_found());

        let wrong_shape = tree
            .get(&ConfigPath::host("github.com"))
            .expect_err("a section is not a scalar");
        assert!(matches!(wrong_shape, TreeError::NotALeaf { .. }));

        let not_a_map = tree
            .keys(&ConfigPath::host("github.com").child("user"))
            .expect_err("a scalar has no keys");
        assert!(matches!(not_a_map, TreeError::NotAMap { .. }));
    }

    #[test]
    fn lookup_maps_absence_to_none() {
        let tree = fixture();
        let path = ConfigPath::host("github.com").child("oauth_token");
        assert_eq!(tree.lookup(&path).unwrap(), None);
        assert!(tree.lookup(&ConfigPath::hosts()).is_err());
    }

    #[test]
    fn set_refuses_to_replace_a_section() {
        let mut tree = fixture();
        let err = tree
            .set(&ConfigPath::host("github.com"), "flattened")
            .expect_err("section must survive");
        assert!(matches!(err, TreeError::NotALeaf { .. }));
        assert!(tree.node(&ConfigPath::host("github.com")).unwrap().has_children());
    }

    #[test]
    fn set_refuses_to_descend_through_a_scalar() {
        let mut tree = fixture();
        let err = tree
            .set(
                &ConfigPath::host("github.com").child("user").child("nested"),
                "x",
            )
            .expect_err("scalar must not become a section");
        assert_eq!(
            err,
            TreeError::NotAMap {
                path: ConfigPath::host("github.com").child("user")
            }
        );
    }

    #[test]
    fn ensure_map_creates_empty_section_once() {
        let mut tree = fixture();
        let path = ConfigPath::user("github.com", "monalisa");
        tree.ensure_map(&path).expect("create section");
        assert!(tree.keys(&path).unwrap().is_empty());

        tree.set(&path.child("git_protocol"), "ssh").unwrap();
        tree.ensure_map(&path).expect("existing section is kept");
        assert_eq!(tree.keys(&path).unwrap(), vec!["git_protocol"]);
    }

    #[test]
    fn root_set_is_rejected() {
        let mut tree = ConfigTree::new();
        assert_eq!(
            tree.set(&ConfigPath::root(), "x").unwrap_err(),
            TreeError::EmptyPath
        );
    }
}

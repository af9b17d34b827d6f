//! Unified error type for all preference operations.

/// Things that can go wrong when using the store.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The name already holds a child node (or a leaf, when creating a node).
    Conflict {
        /// Key that clashed, or the absolute path of a detached node whose
        /// name is now held by a leaf.
        key: String,
    },
    /// The node, or one of its ancestors, was removed.
    NodeRemoved {
        /// Absolute path of the removed node.
        path: String,
    },
    /// `remove_node` was called on the root.
    RootRemoval,
    /// Empty node name or one containing `/`.
    InvalidName(String),
    /// File system problem (read, write, rename).
    Io(String),
    /// Failed to serialize the document to bytes.
    Serialize(String),
    /// Failed to parse the backing file.
    Deserialize(String),
    /// Bad configuration (unresolvable path, etc.).
    Config(String),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Conflict { key } => {
                write!(f, "conflict: `{key}` is already used by a node or a key")
            }
            Error::NodeRemoved { path } => write!(f, "node `{path}` has been removed"),
            Error::RootRemoval => write!(f, "the root node cannot be removed"),
            Error::InvalidName(name) => write!(f, "invalid node name: {name:?}"),
            Error::Io(msg) => write!(f, "i/o error: {msg}"),
            Error::Serialize(msg) => write!(f, "serialization error: {msg}"),
            Error::Deserialize(msg) => write!(f, "deserialization error: {msg}"),
            Error::Config(msg) => write!(f, "config error: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        if err.is_io() {
            Error::Io(err.to_string())
        } else if err.is_syntax() || err.is_eof() || err.is_data() {
            Error::Deserialize(err.to_string())
        } else {
            Error::Serialize(err.to_string())
        }
    }
}

/// Result alias using our [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_offending_key() {
        let err = Error::Conflict { key: "window".into() };
        assert!(err.to_string().contains("window"));
        let err = Error::NodeRemoved {
            path: "/editor".into(),
        };
        assert_eq!(err.to_string(), "node `/editor` has been removed");
    }

    #[test]
    fn syntax_errors_map_to_deserialize() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(Error::from(err), Error::Deserialize(_)));
    }
}

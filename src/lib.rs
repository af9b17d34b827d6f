//! Hierarchical preference store mirrored to a single JSON file.
//!
//! A tree of named nodes, each holding string keys (and string lists) plus
//! child nodes. The whole tree is one JSON object on disk: strings and string
//! arrays are keys, nested objects are child nodes.
//!
//! ```rust,no_run
//! use json_prefs::PrefStore;
//!
//! let store = PrefStore::open("settings.json").unwrap();
//! let root = store.root();
//! root.put("theme", "dark").unwrap();
//! root.child("window").unwrap().put("width", "800").unwrap();
//! root.put_list("recent", ["a", "b"]).unwrap();
//! ```
//!
//! **Single-process only.** Reads and writes of a file are serialised inside
//! one process, but two processes writing the same file will clobber each
//! other: the last complete write wins.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod flush;
pub mod node;
pub mod persist;
pub mod serializer;
pub mod store;
mod sync;
mod tree;

pub use config::CorruptFilePolicy;
pub use error::{Error, Result};
pub use flush::FlushPolicy;
pub use node::Node;
pub use store::{PrefStore, PrefStoreBuilder, StoreFactory};

pub mod ai_client;
pub mod categorize;
pub mod error;
pub mod hierarchy;
pub mod model;
pub mod netscape;
pub mod settings;
pub mod store;
pub mod utils;

pub use categorize::{CancelFlag, Categorizer, ChunkOrder, OrganizeOptions};
pub use error::{Error, Result};
pub use model::{BookmarkNode, CategorizedRecord, Document, FlatLinkRecord};
pub use store::{BookmarkStore, OrganizeReport};

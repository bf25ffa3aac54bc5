//! Connector catalog: the records a scrape produces and the index lister.
//!
//! The index page links every connector's documentation page; the lister
//! turns those links into [`WorkItem`]s that the dispatcher fans out over.

mod lister;
mod types;

pub use lister::{
    CatalogLister, ListError, ListerConfig, DEFAULT_INDEX_SECTION_ID, DEFAULT_LINK_PATTERN,
};
pub use types::*;

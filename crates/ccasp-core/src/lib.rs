pub mod asset;
pub mod classify;
pub mod config;
pub mod decision;
pub mod deploy;
pub mod detect;
pub mod error;
pub mod feature;
pub mod frontmatter;
pub mod hash;
pub mod io;
pub mod paths;
pub mod store;
pub mod sync;
pub mod template;
pub mod update_state;
pub mod usage;
pub mod version_check;

pub use error::{CcaspError, Result};

pub mod config;
pub mod directory;
pub mod engine;
pub mod export;
pub mod identifier;
pub mod input;
pub mod normalize;
pub mod outcome;
pub mod record;
pub mod report;
pub mod resolver;
pub mod secret;
pub mod secret_log;

pub mod prelude {
    pub use crate::directory::{Directory, DirectoryLookup, DirectoryWriter};
    pub use crate::outcome::{Level, Outcome, OutcomeLog};
    pub use crate::record::{DepartmentMap, PersonRecord};
}

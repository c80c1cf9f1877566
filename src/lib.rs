//! Scaffolds throwaway projects from templates, patches them, runs them and
//! tears them down again.

pub mod clients;
pub mod config;
pub mod lifecycle;
pub mod materializer;
pub mod options;
pub mod patcher;
pub mod probe;
pub mod process;
pub mod shared;

pub use config::HarnessSettings;
pub use lifecycle::{ProjectCollection, TeardownPolicy, TemplateProject};
pub use materializer::Materializer;
pub use options::ProjectOptions;
pub use shared::errors::HarnessError;

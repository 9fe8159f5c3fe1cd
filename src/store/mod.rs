pub mod artifacts;
pub mod loader;

pub use artifacts::{load_artifact, save_artifact, ArtifactPaths};
pub use loader::{load_catalog, load_ratings};

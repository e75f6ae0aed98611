//! Quarry Core Library
//!
//! Hydrates git repositories, npm registry packages and local directories
//! into uniform, locally readable directory trees for a downstream indexer.

pub mod cache;
pub mod config;
pub mod error;
pub mod fs;
pub mod loader;
pub mod naming;
pub mod net;
pub mod npm;
pub mod process;
pub mod reference;
pub mod resource;
pub mod safety;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{EngineConfig, PackageManager};

    // Errors
    pub use crate::error::{ErrorKind, HydrationError, HydrationResult, ProcessFailure};

    // Resources
    pub use crate::resource::{
        EphemeralCleanup, GitResource, HydratedResource, LocalResource, NpmResource,
        ResourceCommon, ResourceDescriptor, ResourceKind,
    };

    // Loading
    pub use crate::loader::{LoadRequest, ResourceLoader, ResourceLoaderFacade};
    pub use crate::reference::parse_reference;

    // Seams
    pub use crate::net::{HttpFetcher, NetworkFetcher};
    pub use crate::process::{ProcessRunner, SystemProcessRunner};
    pub use crate::safety::SafetyGuard;
}

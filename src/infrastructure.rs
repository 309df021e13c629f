// Infrastructure layer modules
pub mod asset_staging;
pub mod cloud_assembly;
pub mod config;
pub mod logging;
pub mod parameter_store;

// Re-exports
pub use asset_staging::{stage_asset, AssetError, StagedAsset};
pub use cloud_assembly::{AssemblyError, AssemblyOutput, CloudAssemblyWriter};
pub use config::{ResolutionMode, SynthConfig, SynthConfigError};
pub use logging::init_logging;
pub use parameter_store::{
    resolve_parameters, AwsSsmParameterStore, ParameterStore, ParameterStoreError,
    StaticParameterStore,
};

// アプリケーション層モジュール
pub mod stack_builder;
pub mod synthesizer;

// 再エクスポート
pub use stack_builder::{ParameterResolution, StackBuildError, StackBuilder};
pub use synthesizer::{SynthError, SynthOutput, Synthesizer};

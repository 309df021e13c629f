/// 合成処理
///
/// アセットのステージング → パラメータ解決 → スタック組み立て → アセンブリ出力
/// を順に実行する。どの段階で失敗してもファイルは書き出さない。
use thiserror::Error;
use tracing::{error, info, info_span, Instrument};

use crate::domain::{CodeLocation, Stack};
use crate::infrastructure::{
    resolve_parameters, stage_asset, AssemblyError, AssemblyOutput, AssetError,
    CloudAssemblyWriter, ParameterStore, ParameterStoreError, ResolutionMode, StagedAsset,
    SynthConfig,
};

use super::stack_builder::{ParameterResolution, StackBuildError, StackBuilder};

/// 合成処理のエラー型
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("アセットエラー: {0}")]
    Asset(#[from] AssetError),
    #[error("パラメータ解決エラー: {0}")]
    Parameter(#[from] ParameterStoreError),
    #[error("スタック組み立てエラー: {0}")]
    Build(#[from] StackBuildError),
    #[error("アセンブリ出力エラー: {0}")]
    Assembly(#[from] AssemblyError),
}

/// 合成結果
#[derive(Debug, Clone)]
pub struct SynthOutput {
    pub stack: Stack,
    pub asset: StagedAsset,
    pub assembly: AssemblyOutput,
}

/// 合成処理
pub struct Synthesizer<'a> {
    store: &'a dyn ParameterStore,
}

impl<'a> Synthesizer<'a> {
    pub fn new(store: &'a dyn ParameterStore) -> Self {
        Self { store }
    }

    /// 設定に従ってスタックを合成し、アセンブリを書き出す
    pub async fn synthesize(&self, config: &SynthConfig) -> Result<SynthOutput, SynthError> {
        let span = info_span!(
            "synth",
            stack_id = %config.stack_id,
            variant = %config.variant
        );

        async {
            let result = self.run(config).await;
            if let Err(err) = &result {
                error!(error = %err, "合成失敗");
            }
            result
        }
        .instrument(span)
        .await
    }

    /// スタックを組み立てる（ファイル出力なし）
    pub async fn build_stack(
        &self,
        config: &SynthConfig,
        asset: &StagedAsset,
    ) -> Result<Stack, SynthError> {
        // 不正なスタックIDでParameter Storeに問い合わせない
        StackBuilder::validate_stack_id(&config.stack_id)?;

        let builder =
            StackBuilder::new(config.variant).with_parameter_prefix(&config.parameter_prefix);

        let parameters = match config.resolution {
            ResolutionMode::Synth => {
                let names = builder.parameter_names();
                info!(parameter_count = names.len(), "Parameter Storeから値を解決");
                ParameterResolution::Resolved(resolve_parameters(self.store, &names).await?)
            }
            ResolutionMode::Deploy => ParameterResolution::DeployTime,
        };

        let code = CodeLocation::bootstrap_asset(&asset.object_key);
        Ok(builder.build(&config.stack_id, Some(&config.props), &code, &parameters)?)
    }

    async fn run(&self, config: &SynthConfig) -> Result<SynthOutput, SynthError> {
        let asset = stage_asset(&config.asset_path)?;
        let stack = self.build_stack(config, &asset).await?;
        let assembly = CloudAssemblyWriter::new(&config.out_dir).write(&stack, &asset)?;

        info!(
            resource_count = stack.template().resource_count(),
            template = %assembly.template_path.display(),
            "合成完了"
        );

        Ok(SynthOutput {
            stack,
            asset,
            assembly,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StackVariant;
    use crate::infrastructure::StaticParameterStore;
    use async_trait::async_trait;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 呼び出し回数を数えるストア
    struct CountingStore {
        inner: StaticParameterStore,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ParameterStore for CountingStore {
        async fn get_parameter(&self, name: &str) -> Result<String, ParameterStoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.get_parameter(name).await
        }
    }

    fn store() -> StaticParameterStore {
        StaticParameterStore::new()
            .with_parameter("/chat-gpt-slack/OPEN_AI_API_KEY", "sk-test")
            .with_parameter("/chat-gpt-slack/SLACK_BOT_TOKEN", "xoxb-test")
            .with_parameter("/chat-gpt-slack/SLACK_SIGNING_SECRET", "signing-test")
    }

    fn config(dir: &Path) -> SynthConfig {
        let asset_path = dir.join("lambda.zip");
        fs::write(&asset_path, b"PK\x03\x04lambda").unwrap();
        SynthConfig {
            asset_path,
            out_dir: dir.join("cdk.out"),
            ..SynthConfig::default()
        }
    }

    #[tokio::test]
    async fn test_synthesize_writes_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let store = store();

        let output = Synthesizer::new(&store).synthesize(&config).await.unwrap();

        assert!(output.assembly.template_path.exists());
        assert!(output.assembly.manifest_path.exists());
        assert_eq!(output.stack.variant(), StackVariant::Full);
        assert_eq!(
            output.stack.template().resources_of_type("AWS::Lambda::Function").len(),
            1
        );
        // 合成時解決モードではテンプレートパラメータを使わない
        assert_eq!(output.stack.template().parameters().count(), 0);
    }

    #[tokio::test]
    async fn test_synthesize_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let store = store();
        let synthesizer = Synthesizer::new(&store);

        let first = synthesizer.synthesize(&config).await.unwrap();
        let first_template = fs::read_to_string(&first.assembly.template_path).unwrap();
        let second = synthesizer.synthesize(&config).await.unwrap();
        let second_template = fs::read_to_string(&second.assembly.template_path).unwrap();

        assert_eq!(first.stack, second.stack);
        assert_eq!(first_template, second_template);
    }

    #[tokio::test]
    async fn test_missing_parameter_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let store = StaticParameterStore::new()
            .with_parameter("/chat-gpt-slack/OPEN_AI_API_KEY", "sk-test");

        let result = Synthesizer::new(&store).synthesize(&config).await;

        match result {
            Err(SynthError::Parameter(ParameterStoreError::NotFound(name))) => {
                assert_eq!(name, "/chat-gpt-slack/SLACK_BOT_TOKEN");
            }
            other => panic!("Expected Parameter NotFound, got {:?}", other.map(|o| o.stack)),
        }
        assert!(!config.out_dir.exists());
    }

    #[tokio::test]
    async fn test_missing_asset_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = SynthConfig {
            asset_path: dir.path().join("missing.zip"),
            out_dir: dir.path().join("cdk.out"),
            ..SynthConfig::default()
        };
        let store = store();

        let result = Synthesizer::new(&store).synthesize(&config).await;

        assert!(matches!(result, Err(SynthError::Asset(AssetError::NotFound(_)))));
        assert!(!config.out_dir.exists());
    }

    #[tokio::test]
    async fn test_deploy_time_resolution_skips_store() {
        let dir = tempfile::tempdir().unwrap();
        let config = SynthConfig {
            resolution: ResolutionMode::Deploy,
            variant: StackVariant::Minimal,
            ..config(dir.path())
        };
        // 空のストアでも成功する
        let store = StaticParameterStore::new();

        let output = Synthesizer::new(&store).synthesize(&config).await.unwrap();

        assert_eq!(output.stack.template().parameters().count(), 3);
        let template = fs::read_to_string(&output.assembly.template_path).unwrap();
        assert!(template.contains("AWS::SSM::Parameter::Value<String>"));
    }

    #[tokio::test]
    async fn test_invalid_stack_id_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let config = SynthConfig {
            stack_id: "bad id".to_string(),
            ..config(dir.path())
        };
        let store = store();

        let result = Synthesizer::new(&store).synthesize(&config).await;

        assert!(matches!(
            result,
            Err(SynthError::Build(StackBuildError::InvalidStackId(_)))
        ));
        assert!(!config.out_dir.exists());
    }

    #[tokio::test]
    async fn test_invalid_stack_id_skips_parameter_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let config = SynthConfig {
            stack_id: "bad id".to_string(),
            ..config(dir.path())
        };
        let store = CountingStore {
            inner: store(),
            calls: AtomicUsize::new(0),
        };
        let asset = stage_asset(&config.asset_path).unwrap();

        let result = Synthesizer::new(&store).build_stack(&config, &asset).await;

        assert!(matches!(
            result,
            Err(SynthError::Build(StackBuildError::InvalidStackId(_)))
        ));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_code_location_uses_asset_hash() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let store = store();
        let asset = stage_asset(&config.asset_path).unwrap();

        let stack = Synthesizer::new(&store)
            .build_stack(&config, &asset)
            .await
            .unwrap();

        let (_, function) = stack.template().resources_of_type("AWS::Lambda::Function")[0];
        assert_eq!(
            function.properties()["Code"]["S3Key"],
            serde_json::json!(asset.object_key)
        );
    }
}

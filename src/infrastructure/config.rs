/// 合成設定
///
/// 環境変数から合成に必要な設定を読み込む。未設定の項目はデフォルト値を使う。
/// コマンドライン引数による上書きはバイナリ側で行う。
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::application::stack_builder::{DEFAULT_PARAMETER_PREFIX, DEFAULT_STACK_ID};
use crate::domain::{DeploymentEnvironment, StackProps, StackVariant};

use super::cloud_assembly::DEFAULT_OUTPUT_DIR;

/// デフォルトのアーティファクトパス
pub const DEFAULT_ASSET_PATH: &str = "../app/dist/lambda.zip";

pub const ENV_STACK_ID: &str = "STACK_ID";
pub const ENV_STACK_VARIANT: &str = "STACK_VARIANT";
pub const ENV_ASSET_PATH: &str = "LAMBDA_ASSET_PATH";
pub const ENV_PARAMETER_PREFIX: &str = "PARAMETER_PREFIX";
pub const ENV_PARAMETER_RESOLUTION: &str = "PARAMETER_RESOLUTION";
pub const ENV_OUTPUT_DIR: &str = "CDK_OUTDIR";
pub const ENV_STACK_DESCRIPTION: &str = "STACK_DESCRIPTION";
pub const ENV_DEFAULT_ACCOUNT: &str = "CDK_DEFAULT_ACCOUNT";
pub const ENV_DEFAULT_REGION: &str = "CDK_DEFAULT_REGION";

/// 合成設定のエラー型
#[derive(Debug, Error)]
pub enum SynthConfigError {
    #[error("環境変数の値が不正です: {name}={value}")]
    InvalidValue { name: String, value: String },
}

/// Parameter Store値を解決するタイミング
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolutionMode {
    /// 合成時にParameter Storeへ問い合わせる
    #[default]
    Synth,
    /// テンプレートパラメータとしてデプロイ時に解決させる
    Deploy,
}

impl FromStr for ResolutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synth" => Ok(ResolutionMode::Synth),
            "deploy" => Ok(ResolutionMode::Deploy),
            other => Err(format!("不明な解決モード: {}（synth または deploy）", other)),
        }
    }
}

/// 合成設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthConfig {
    pub stack_id: String,
    pub variant: StackVariant,
    pub asset_path: PathBuf,
    pub parameter_prefix: String,
    pub resolution: ResolutionMode,
    pub out_dir: PathBuf,
    pub props: StackProps,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            stack_id: DEFAULT_STACK_ID.to_string(),
            variant: StackVariant::default(),
            asset_path: PathBuf::from(DEFAULT_ASSET_PATH),
            parameter_prefix: DEFAULT_PARAMETER_PREFIX.to_string(),
            resolution: ResolutionMode::default(),
            out_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            props: StackProps::default(),
        }
    }
}

impl SynthConfig {
    /// 環境変数から設定を読み込む
    ///
    /// # 環境変数
    /// - STACK_ID: スタックID（デフォルト: ChatGPT-Lambda-Stack）
    /// - STACK_VARIANT: full / minimal（デフォルト: full）
    /// - LAMBDA_ASSET_PATH: 関数アーティファクトのパス
    /// - PARAMETER_PREFIX: Parameter Storeのプレフィックス
    /// - PARAMETER_RESOLUTION: synth / deploy（デフォルト: synth）
    /// - CDK_OUTDIR: 出力ディレクトリ（デフォルト: cdk.out）
    /// - STACK_DESCRIPTION: テンプレートの説明
    /// - CDK_DEFAULT_ACCOUNT / CDK_DEFAULT_REGION: デプロイ先環境
    ///
    /// # エラー
    /// STACK_VARIANTまたはPARAMETER_RESOLUTIONが不正な値の場合
    pub fn from_env() -> Result<Self, SynthConfigError> {
        let defaults = Self::default();

        let variant = match env_non_empty(ENV_STACK_VARIANT) {
            Some(value) => value
                .parse::<StackVariant>()
                .map_err(|_| SynthConfigError::InvalidValue {
                    name: ENV_STACK_VARIANT.to_string(),
                    value,
                })?,
            None => defaults.variant,
        };

        let resolution = match env_non_empty(ENV_PARAMETER_RESOLUTION) {
            Some(value) => value
                .parse::<ResolutionMode>()
                .map_err(|_| SynthConfigError::InvalidValue {
                    name: ENV_PARAMETER_RESOLUTION.to_string(),
                    value,
                })?,
            None => defaults.resolution,
        };

        let account = env_non_empty(ENV_DEFAULT_ACCOUNT);
        let region = env_non_empty(ENV_DEFAULT_REGION);
        let env = (account.is_some() || region.is_some())
            .then_some(DeploymentEnvironment { account, region });

        Ok(Self {
            stack_id: env_non_empty(ENV_STACK_ID).unwrap_or(defaults.stack_id),
            variant,
            asset_path: env_non_empty(ENV_ASSET_PATH)
                .map(PathBuf::from)
                .unwrap_or(defaults.asset_path),
            parameter_prefix: env_non_empty(ENV_PARAMETER_PREFIX)
                .unwrap_or(defaults.parameter_prefix),
            resolution,
            out_dir: env_non_empty(ENV_OUTPUT_DIR)
                .map(PathBuf::from)
                .unwrap_or(defaults.out_dir),
            props: StackProps {
                env,
                description: env_non_empty(ENV_STACK_DESCRIPTION),
            },
        })
    }
}

/// 空文字列を未設定として扱う
fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// スタックバリアント
///
/// 同じスタックの2つの構成を固定値として保持する。
/// - `full`: ユーザー設定テーブルあり、arm64、タイムアウト10分
/// - `minimal`: テーブルなし、x86_64、タイムアウト2分
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use super::function::{Architecture, Runtime};

/// 関数のエントリポイント
pub const FUNCTION_HANDLER: &str = "lambda_function.lambda_handler";

/// 関数メモリサイズ（MB）
pub const FUNCTION_MEMORY_SIZE: u32 = 256;

/// ユーザー設定テーブル名
pub const USER_CONFIG_TABLE_NAME: &str = "user_config";

/// ユーザー設定テーブルのパーティションキー
pub const USER_CONFIG_PARTITION_KEY: &str = "user_id";

/// テーブル名を渡す環境変数
pub const USER_CONFIG_TABLE_ENV: &str = "USER_CONFIG_TABLE";

/// Parameter Storeから解決する環境変数（環境変数名とパラメータ名の末尾が一致する）
pub const SECRET_ENV_KEYS: [&str; 3] = ["OPEN_AI_API_KEY", "SLACK_BOT_TOKEN", "SLACK_SIGNING_SECRET"];

#[derive(Debug, Error)]
#[error("不明なスタックバリアント: {0}（full または minimal）")]
pub struct UnknownVariantError(pub String);

/// スタックバリアント
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackVariant {
    #[default]
    Full,
    Minimal,
}

impl StackVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            StackVariant::Full => "full",
            StackVariant::Minimal => "minimal",
        }
    }

    /// ユーザー設定テーブルを持つか
    pub fn has_table(&self) -> bool {
        matches!(self, StackVariant::Full)
    }

    pub fn architecture(&self) -> Architecture {
        match self {
            StackVariant::Full => Architecture::Arm64,
            StackVariant::Minimal => Architecture::X86_64,
        }
    }

    pub fn runtime(&self) -> Runtime {
        Runtime::Python39
    }

    pub fn memory_size(&self) -> u32 {
        FUNCTION_MEMORY_SIZE
    }

    pub fn timeout(&self) -> Duration {
        match self {
            StackVariant::Full => Duration::from_secs(10 * 60),
            StackVariant::Minimal => Duration::from_secs(2 * 60),
        }
    }

    /// Parameter Storeから解決する環境変数名
    pub fn secret_env_keys(&self) -> &'static [&'static str] {
        &SECRET_ENV_KEYS
    }

    /// Parameter Storeのパラメータ名（`<prefix>/<環境変数名>`）
    pub fn parameter_names(&self, prefix: &str) -> Vec<String> {
        self.secret_env_keys()
            .iter()
            .map(|key| parameter_name(prefix, key))
            .collect()
    }
}

/// プレフィックスとキーからパラメータ名を組み立てる
pub fn parameter_name(prefix: &str, key: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), key)
}

impl fmt::Display for StackVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StackVariant {
    type Err = UnknownVariantError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(StackVariant::Full),
            "minimal" => Ok(StackVariant::Minimal),
            _ => Err(UnknownVariantError(s.to_string())),
        }
    }
}

//! Parameter Store操作モジュール
//!
//! 合成時に関数の環境変数へ埋め込むシークレットを名前で取得する。
//! - 実環境: SSM GetParameter（復号あり）
//! - オフライン/テスト: 事前に与えた値のマップ
//!
//! 取得は1件ずつ順番に行い、最初の失敗で中断する（部分的な解決結果は返さない）。

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use aws_sdk_ssm::Client as SsmClient;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Parameter Store操作のエラー型
#[derive(Debug, Error)]
pub enum ParameterStoreError {
    /// パラメータが存在しない
    #[error("パラメータが見つかりません: {0}")]
    NotFound(String),
    /// パラメータに値が設定されていない
    #[error("パラメータの値が空です: {0}")]
    EmptyValue(String),
    /// AWS SDK エラー
    #[error("AWS SSM APIエラー: {name}: {message}")]
    AwsSdkError { name: String, message: String },
}

/// Parameter Store操作トレイト（テスト用の抽象化）
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// パラメータ値を名前で取得する
    ///
    /// # 引数
    /// * `name` - パラメータ名（例: `/chat-gpt-slack/SLACK_BOT_TOKEN`）
    async fn get_parameter(&self, name: &str) -> Result<String, ParameterStoreError>;
}

/// 実際のAWS SSM SDKを使用したParameter Store実装
pub struct AwsSsmParameterStore {
    client: SsmClient,
}

impl AwsSsmParameterStore {
    pub fn new(client: SsmClient) -> Self {
        Self { client }
    }

    /// AWS設定からデフォルトのクライアントを作成
    pub async fn from_config() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(SsmClient::new(&config))
    }
}

#[async_trait]
impl ParameterStore for AwsSsmParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<String, ParameterStoreError> {
        let result = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(true)
            .send()
            .await;

        match result {
            Ok(response) => response
                .parameter()
                .and_then(|parameter| parameter.value())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ParameterStoreError::EmptyValue(name.to_string())),
            Err(err) => {
                let not_found = err
                    .as_service_error()
                    .map(|e| e.is_parameter_not_found())
                    .unwrap_or(false);
                if not_found {
                    Err(ParameterStoreError::NotFound(name.to_string()))
                } else {
                    warn!(parameter_name = %name, error = %err, "GetParameterエラー");
                    Err(ParameterStoreError::AwsSdkError {
                        name: name.to_string(),
                        message: err.to_string(),
                    })
                }
            }
        }
    }
}

/// 事前に与えた値を返すParameter Store実装
///
/// ネットワークに接続せずに合成する場合やテストで使用する。
#[derive(Debug, Clone, Default)]
pub struct StaticParameterStore {
    values: HashMap<String, String>,
}

impl StaticParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl FromIterator<(String, String)> for StaticParameterStore {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[async_trait]
impl ParameterStore for StaticParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<String, ParameterStoreError> {
        match self.values.get(name) {
            Some(value) if value.is_empty() => Err(ParameterStoreError::EmptyValue(name.to_string())),
            Some(value) => Ok(value.clone()),
            None => Err(ParameterStoreError::NotFound(name.to_string())),
        }
    }
}

/// 複数のパラメータを順番に解決する
///
/// 最初のエラーで中断する。値そのものはログに出力しない。
///
/// # 戻り値
/// * `Ok(BTreeMap)` - パラメータ名 → 値
/// * `Err(ParameterStoreError)` - 最初に失敗したパラメータのエラー
pub async fn resolve_parameters(
    store: &dyn ParameterStore,
    names: &[String],
) -> Result<BTreeMap<String, String>, ParameterStoreError> {
    let mut resolved = BTreeMap::new();

    for name in names {
        if resolved.contains_key(name) {
            continue;
        }
        let value = store.get_parameter(name).await.inspect_err(|err| {
            warn!(parameter_name = %name, error = %err, "パラメータ解決失敗");
        })?;
        debug!(parameter_name = %name, value_length = value.len(), "パラメータ解決");
        resolved.insert(name.clone(), value);
    }

    info!(parameter_count = resolved.len(), "全パラメータ解決完了");
    Ok(resolved)
}

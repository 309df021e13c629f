/// Lambda関数宣言
///
/// 実行ロール（`AWS::IAM::Role`）と関数本体（`AWS::Lambda::Function`）を記述する。
/// コードはビルド済みアーティファクト（zip）をアセットバケット経由で参照する。
use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use super::intrinsic::Expr;
use super::template::{Resource, TemplateError};

pub const FUNCTION_RESOURCE_TYPE: &str = "AWS::Lambda::Function";
pub const ROLE_RESOURCE_TYPE: &str = "AWS::IAM::Role";

/// ブートストラップ済みアセットバケット名
pub const ASSET_BUCKET_TEMPLATE: &str = "cdk-hnb659fds-assets-${AWS::AccountId}-${AWS::Region}";

/// メモリサイズの許容範囲（MB）
pub const MIN_MEMORY_SIZE: u32 = 128;
pub const MAX_MEMORY_SIZE: u32 = 10240;

/// タイムアウトの上限（秒）
pub const MAX_TIMEOUT_SECONDS: u64 = 900;

/// 関数宣言のエラー型
#[derive(Debug, Error)]
pub enum FunctionSpecError {
    #[error("メモリサイズが範囲外です: {0}MB（128〜10240）")]
    InvalidMemorySize(u32),
    #[error("タイムアウトが範囲外です: {0}秒（1〜900）")]
    InvalidTimeout(u64),
    #[error("環境変数名が不正です: {0}")]
    InvalidEnvironmentKey(String),
    #[error("ハンドラーが空です")]
    EmptyHandler,
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// 命令セットアーキテクチャ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Architecture {
    #[serde(rename = "arm64")]
    Arm64,
    #[serde(rename = "x86_64")]
    X86_64,
}

/// 関数ランタイム
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Runtime {
    #[serde(rename = "python3.9")]
    Python39,
}

impl Runtime {
    pub fn name(&self) -> &'static str {
        match self {
            Runtime::Python39 => "python3.9",
        }
    }
}

/// コードの配置場所
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeLocation {
    #[serde(rename = "S3Bucket")]
    pub s3_bucket: Expr,
    #[serde(rename = "S3Key")]
    pub s3_key: String,
}

impl CodeLocation {
    /// ブートストラップ済みアセットバケット上のオブジェクトを参照する
    pub fn bootstrap_asset(object_key: impl Into<String>) -> Self {
        Self {
            s3_bucket: Expr::sub(ASSET_BUCKET_TEMPLATE),
            s3_key: object_key.into(),
        }
    }
}

/// Lambda関数宣言
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpec {
    pub architecture: Architecture,
    pub runtime: Runtime,
    pub code: CodeLocation,
    pub handler: String,
    /// 環境変数（キー順で出力される）
    pub environment: BTreeMap<String, Expr>,
    pub memory_size: u32,
    pub timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct EnvironmentProperty<'a> {
    variables: &'a BTreeMap<String, Expr>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct FunctionProperties<'a> {
    code: &'a CodeLocation,
    role: Expr,
    architectures: [Architecture; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<EnvironmentProperty<'a>>,
    handler: &'a str,
    memory_size: u32,
    runtime: Runtime,
    timeout: u64,
}

impl FunctionSpec {
    /// 宣言内容を検証する
    pub fn validate(&self) -> Result<(), FunctionSpecError> {
        if !(MIN_MEMORY_SIZE..=MAX_MEMORY_SIZE).contains(&self.memory_size) {
            return Err(FunctionSpecError::InvalidMemorySize(self.memory_size));
        }
        let timeout = self.timeout.as_secs();
        if timeout == 0 || timeout > MAX_TIMEOUT_SECONDS {
            return Err(FunctionSpecError::InvalidTimeout(timeout));
        }
        if self.handler.trim().is_empty() {
            return Err(FunctionSpecError::EmptyHandler);
        }
        if let Some(key) = self.environment.keys().find(|k| !is_valid_env_key(k)) {
            return Err(FunctionSpecError::InvalidEnvironmentKey(key.clone()));
        }
        Ok(())
    }

    /// 実行ロールリソースを作成
    ///
    /// Lambdaサービスからの引き受けとCloudWatch Logs出力権限のみを持つ。
    pub fn role_resource(&self) -> Result<Resource, FunctionSpecError> {
        let properties = json!({
            "AssumeRolePolicyDocument": {
                "Statement": [{
                    "Action": "sts:AssumeRole",
                    "Effect": "Allow",
                    "Principal": {"Service": "lambda.amazonaws.com"}
                }],
                "Version": "2012-10-17"
            },
            "ManagedPolicyArns": [Expr::concat(vec![
                Expr::literal("arn:"),
                Expr::partition(),
                Expr::literal(":iam::aws:policy/service-role/AWSLambdaBasicExecutionRole"),
            ])]
        });
        Ok(Resource::new(ROLE_RESOURCE_TYPE, &properties)?)
    }

    /// 関数リソースを作成
    ///
    /// # 引数
    /// * `role_logical_id` - 実行ロールの論理ID（依存関係にも追加される）
    pub fn function_resource(&self, role_logical_id: &str) -> Result<Resource, FunctionSpecError> {
        self.validate()?;

        let properties = FunctionProperties {
            code: &self.code,
            role: Expr::get_att(role_logical_id, "Arn"),
            architectures: [self.architecture],
            environment: (!self.environment.is_empty()).then_some(EnvironmentProperty {
                variables: &self.environment,
            }),
            handler: &self.handler,
            memory_size: self.memory_size,
            runtime: self.runtime,
            timeout: self.timeout.as_secs(),
        };

        Ok(Resource::new(FUNCTION_RESOURCE_TYPE, &properties)?.with_depends_on(role_logical_id))
    }
}

/// 環境変数名の形式チェック（先頭は英字、以降は英数字と`_`）
fn is_valid_env_key(key: &str) -> bool {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> FunctionSpec {
        let mut environment = BTreeMap::new();
        environment.insert("SLACK_BOT_TOKEN".to_string(), Expr::literal("xoxb-test"));
        environment.insert("USER_CONFIG_TABLE".to_string(), Expr::reference("Table"));
        FunctionSpec {
            architecture: Architecture::Arm64,
            runtime: Runtime::Python39,
            code: CodeLocation::bootstrap_asset("abc123.zip"),
            handler: "lambda_function.lambda_handler".to_string(),
            environment,
            memory_size: 256,
            timeout: Duration::from_secs(600),
        }
    }

    #[test]
    fn test_function_resource_properties() {
        let resource = spec().function_resource("Role").unwrap();
        let props = resource.properties();

        assert_eq!(resource.resource_type(), FUNCTION_RESOURCE_TYPE);
        assert_eq!(props["Architectures"], json!(["arm64"]));
        assert_eq!(props["Runtime"], json!("python3.9"));
        assert_eq!(props["Handler"], json!("lambda_function.lambda_handler"));
        assert_eq!(props["MemorySize"], json!(256));
        assert_eq!(props["Timeout"], json!(600));
        assert_eq!(props["Role"], json!({"Fn::GetAtt": ["Role", "Arn"]}));
        assert_eq!(
            props["Code"],
            json!({
                "S3Bucket": {"Fn::Sub": ASSET_BUCKET_TEMPLATE},
                "S3Key": "abc123.zip"
            })
        );
        assert_eq!(
            props["Environment"]["Variables"],
            json!({
                "SLACK_BOT_TOKEN": "xoxb-test",
                "USER_CONFIG_TABLE": {"Ref": "Table"}
            })
        );
        assert_eq!(resource.depends_on(), &["Role".to_string()]);
    }

    #[test]
    fn test_function_without_environment_omits_property() {
        let mut spec = spec();
        spec.environment.clear();
        let resource = spec.function_resource("Role").unwrap();
        assert!(resource.property("Environment").is_none());
    }

    #[test]
    fn test_role_resource_trusts_lambda() {
        let role = spec().role_resource().unwrap();
        assert_eq!(role.resource_type(), ROLE_RESOURCE_TYPE);
        assert_eq!(
            role.properties()["AssumeRolePolicyDocument"]["Statement"][0]["Principal"]["Service"],
            json!("lambda.amazonaws.com")
        );
    }

    #[test]
    fn test_memory_size_bounds() {
        for memory_size in [0, 127, 10241] {
            let mut spec = spec();
            spec.memory_size = memory_size;
            assert!(matches!(
                spec.validate(),
                Err(FunctionSpecError::InvalidMemorySize(m)) if m == memory_size
            ));
        }
        let mut spec = spec();
        spec.memory_size = 128;
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_timeout_bounds() {
        let mut spec = spec();
        spec.timeout = Duration::from_secs(0);
        assert!(matches!(spec.validate(), Err(FunctionSpecError::InvalidTimeout(0))));

        spec.timeout = Duration::from_secs(901);
        assert!(matches!(spec.validate(), Err(FunctionSpecError::InvalidTimeout(901))));

        spec.timeout = Duration::from_secs(900);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_invalid_environment_key() {
        let mut spec = spec();
        spec.environment.insert("1BAD".to_string(), Expr::literal("x"));
        match spec.function_resource("Role") {
            Err(FunctionSpecError::InvalidEnvironmentKey(key)) => assert_eq!(key, "1BAD"),
            other => panic!("Expected InvalidEnvironmentKey, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_handler() {
        let mut spec = spec();
        spec.handler = String::new();
        assert!(matches!(spec.validate(), Err(FunctionSpecError::EmptyHandler)));
    }

    #[test]
    fn test_env_key_format() {
        assert!(is_valid_env_key("OPEN_AI_API_KEY"));
        assert!(is_valid_env_key("a1"));
        assert!(!is_valid_env_key(""));
        assert!(!is_valid_env_key("_KEY"));
        assert!(!is_valid_env_key("KEY-NAME"));
    }
}

/// スタック記述
///
/// スタックIDと継承プロパティ（デプロイ先環境など）、
/// 合成済みテンプレートをまとめた不変データ。
use std::fmt;

use super::stack_variant::StackVariant;
use super::template::{Template, TemplateError};

/// スタックIDの最大長（CloudFormationのスタック名制約）
pub const MAX_STACK_ID_LENGTH: usize = 128;

/// アカウント未指定時の表記
pub const UNKNOWN_ACCOUNT: &str = "unknown-account";

/// リージョン未指定時の表記
pub const UNKNOWN_REGION: &str = "unknown-region";

/// デプロイ先環境
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentEnvironment {
    pub account: Option<String>,
    pub region: Option<String>,
}

impl DeploymentEnvironment {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            region: Some(region.into()),
        }
    }

    /// アカウント・リージョンとも未指定か
    pub fn is_agnostic(&self) -> bool {
        self.account.is_none() && self.region.is_none()
    }

    /// `aws://<account>/<region>`形式
    pub fn uri(&self) -> String {
        format!(
            "aws://{}/{}",
            self.account.as_deref().unwrap_or(UNKNOWN_ACCOUNT),
            self.region.as_deref().unwrap_or(UNKNOWN_REGION)
        )
    }
}

impl fmt::Display for DeploymentEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

/// スタックに渡す継承プロパティ
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StackProps {
    pub env: Option<DeploymentEnvironment>,
    pub description: Option<String>,
}

/// スタックIDの形式チェック
///
/// 先頭は英字、以降は英数字とハイフンのみ、128文字以内。
pub fn is_valid_stack_id(id: &str) -> bool {
    let mut chars = id.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    starts_with_letter
        && id.len() <= MAX_STACK_ID_LENGTH
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// 合成済みスタック
#[derive(Debug, Clone, PartialEq)]
pub struct Stack {
    id: String,
    variant: StackVariant,
    environment: DeploymentEnvironment,
    template: Template,
}

impl Stack {
    pub(crate) fn new(
        id: String,
        variant: StackVariant,
        environment: DeploymentEnvironment,
        template: Template,
    ) -> Self {
        Self {
            id,
            variant,
            environment,
            template,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn variant(&self) -> StackVariant {
        self.variant
    }

    pub fn environment(&self) -> &DeploymentEnvironment {
        &self.environment
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    /// 宣言順の論理ID一覧
    pub fn declared(&self) -> Vec<&str> {
        self.template.logical_ids()
    }

    /// テンプレートファイル名
    pub fn template_file_name(&self) -> String {
        format!("{}.template.json", self.id)
    }

    /// テンプレートを整形済みJSONとして出力
    pub fn to_json(&self) -> Result<String, TemplateError> {
        self.template.to_json_pretty()
    }
}

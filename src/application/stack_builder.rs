/// スタック定義ビルダー
///
/// スタックID・継承プロパティ・コード配置場所・パラメータ解決結果から
/// 1つのスタック記述を組み立てる。処理は一方向で分岐なし:
///
/// 1. 実効プロパティの決定（未指定ならデフォルト）
/// 2. ユーザー設定テーブル（`full`のみ）
/// 3. 実行ロールと関数（Parameter Storeの値とテーブル名を環境変数に設定）
/// 4. テーブルへの読み書き権限付与（テーブルがある場合のみ）
/// 5. REST APIとLambda統合
/// 6. ルートへのPOSTメソッド
///
/// 外部I/Oは行わない。同じ入力からは常に同じ記述が得られる。
use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, info, info_span};

use crate::domain::rest_api::{deployment_digest, DEFAULT_STAGE_NAME, ROOT_METHOD};
use crate::domain::stack::is_valid_stack_id;
use crate::domain::stack_variant::{
    parameter_name, FUNCTION_HANDLER, USER_CONFIG_PARTITION_KEY, USER_CONFIG_TABLE_ENV,
    USER_CONFIG_TABLE_NAME,
};
use crate::domain::{
    logical_id, AccessGrant, CodeLocation, Expr, FunctionSpec, FunctionSpecError,
    LambdaIntegration, Parameter, RemovalPolicy, RestApiSpec, Stack, StackProps, StackVariant,
    TableSpec, TableSpecError, Template, TemplateError,
};

/// デフォルトのスタックID
pub const DEFAULT_STACK_ID: &str = "ChatGPT-Lambda-Stack";

/// Parameter Storeのデフォルトプレフィックス
pub const DEFAULT_PARAMETER_PREFIX: &str = "/chat-gpt-slack";

pub const TABLE_CONSTRUCT_ID: &str = "ChatGPT_DynamoDB_UserConfig";
pub const FUNCTION_CONSTRUCT_ID: &str = "ChatGPT_LambdaFunction";
pub const API_CONSTRUCT_ID: &str = "ChatGPT_API_Gateway";

pub const API_NAME: &str = "ChatGPT API Gateway";
pub const API_DESCRIPTION: &str = "This service serves chat gpt response";

/// デプロイ時解決パラメータの型
pub const SSM_PARAMETER_TYPE: &str = "AWS::SSM::Parameter::Value<String>";

/// スタック組み立てのエラー型
#[derive(Debug, Error)]
pub enum StackBuildError {
    #[error("スタックIDが不正です: {0}")]
    InvalidStackId(String),
    #[error("パラメータが解決されていません: {0}")]
    UnresolvedParameter(String),
    #[error("テーブル宣言エラー: {0}")]
    Table(#[from] TableSpecError),
    #[error("関数宣言エラー: {0}")]
    Function(#[from] FunctionSpecError),
    #[error("テンプレートエラー: {0}")]
    Template(#[from] TemplateError),
}

/// Parameter Store値の解決方法
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterResolution {
    /// 合成前に取得済みの値（パラメータ名 → 値）を埋め込む
    Resolved(BTreeMap<String, String>),
    /// テンプレートパラメータとして宣言し、デプロイ時に解決させる
    DeployTime,
}

/// スタック定義ビルダー
#[derive(Debug, Clone)]
pub struct StackBuilder {
    variant: StackVariant,
    parameter_prefix: String,
}

impl StackBuilder {
    pub fn new(variant: StackVariant) -> Self {
        Self {
            variant,
            parameter_prefix: DEFAULT_PARAMETER_PREFIX.to_string(),
        }
    }

    /// Parameter Storeのプレフィックスを設定
    pub fn with_parameter_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.parameter_prefix = prefix.into();
        self
    }

    pub fn variant(&self) -> StackVariant {
        self.variant
    }

    /// 解決が必要なパラメータ名
    pub fn parameter_names(&self) -> Vec<String> {
        self.variant.parameter_names(&self.parameter_prefix)
    }

    /// スタックIDがCloudFormationのスタック名規則を満たすか検証する
    pub fn validate_stack_id(id: &str) -> Result<(), StackBuildError> {
        if is_valid_stack_id(id) {
            Ok(())
        } else {
            Err(StackBuildError::InvalidStackId(id.to_string()))
        }
    }

    /// スタック記述を組み立てる
    ///
    /// # 引数
    /// * `id` - スタックID
    /// * `props` - 継承プロパティ（Noneならデフォルト）
    /// * `code` - 関数コードの配置場所
    /// * `parameters` - Parameter Store値の解決方法
    ///
    /// # エラー
    /// スタックIDが不正な場合、パラメータが未解決の場合、
    /// 各リソース宣言が不正な場合はスタック全体を生成しない
    pub fn build(
        &self,
        id: &str,
        props: Option<&StackProps>,
        code: &CodeLocation,
        parameters: &ParameterResolution,
    ) -> Result<Stack, StackBuildError> {
        Self::validate_stack_id(id)?;

        let span = info_span!("build_stack", stack_id = %id, variant = %self.variant);
        let _guard = span.enter();

        let props = props.cloned().unwrap_or_default();
        let environment = props.env.unwrap_or_default();

        let mut template = Template::new();
        if let Some(description) = &props.description {
            template.set_description(description);
        }

        // テーブル
        let table_id = if self.variant.has_table() {
            let table_id = logical_id(id, &[TABLE_CONSTRUCT_ID, "Resource"]);
            template.add_resource(&table_id, user_config_table().to_resource()?)?;
            info!(logical_id = %table_id, table_name = USER_CONFIG_TABLE_NAME, "テーブル宣言");
            Some(table_id)
        } else {
            None
        };

        // 関数
        let mut variables = BTreeMap::new();
        for key in self.variant.secret_env_keys() {
            let name = parameter_name(&self.parameter_prefix, key);
            let value = self.parameter_value(id, &name, parameters, &mut template)?;
            variables.insert(key.to_string(), value);
        }
        if let Some(table_id) = &table_id {
            variables.insert(USER_CONFIG_TABLE_ENV.to_string(), Expr::reference(table_id));
        }

        let function = FunctionSpec {
            architecture: self.variant.architecture(),
            runtime: self.variant.runtime(),
            code: code.clone(),
            handler: FUNCTION_HANDLER.to_string(),
            environment: variables,
            memory_size: self.variant.memory_size(),
            timeout: self.variant.timeout(),
        };

        let role_id = logical_id(id, &[FUNCTION_CONSTRUCT_ID, "ServiceRole", "Resource"]);
        let function_id = logical_id(id, &[FUNCTION_CONSTRUCT_ID, "Resource"]);
        template.add_resource(&role_id, function.role_resource()?)?;
        template.add_resource(&function_id, function.function_resource(&role_id)?)?;
        info!(
            logical_id = %function_id,
            runtime = function.runtime.name(),
            memory_size = function.memory_size,
            timeout_seconds = function.timeout.as_secs(),
            environment_keys = ?function.environment.keys().collect::<Vec<_>>(),
            "関数宣言"
        );

        // 権限付与（テーブルと関数の宣言後）
        if let Some(table_id) = &table_id {
            let grant = AccessGrant {
                role_logical_id: role_id.clone(),
                table_logical_id: table_id.clone(),
            };
            let policy_id = logical_id(
                id,
                &[FUNCTION_CONSTRUCT_ID, "ServiceRole", "DefaultPolicy", "Resource"],
            );
            template.add_resource(&policy_id, grant.to_resource(&policy_id)?)?;
            template.add_dependency(&function_id, &policy_id)?;
            info!(logical_id = %policy_id, table = %table_id, "テーブル読み書き権限付与");
        }

        // API
        let api = RestApiSpec {
            name: API_NAME.to_string(),
            description: API_DESCRIPTION.to_string(),
            stage_name: DEFAULT_STAGE_NAME.to_string(),
        };
        let api_id = logical_id(id, &[API_CONSTRUCT_ID, "Resource"]);
        template.add_resource(&api_id, api.api_resource()?)?;

        let integration = LambdaIntegration::with_success_template(&function_id);

        // ルートへのPOSTメソッド
        let method_id = logical_id(id, &[API_CONSTRUCT_ID, "Default", ROOT_METHOD, "Resource"]);
        let method = api.root_method_resource(&api_id, &integration)?;

        // メソッド定義が変わるとデプロイメントも作り直される
        let deployment_id = format!(
            "{}{}",
            logical_id(id, &[API_CONSTRUCT_ID, "Deployment", "Resource"]),
            deployment_digest(&[&method])?
        );
        template.add_resource(&method_id, method)?;
        template.add_resource(
            &deployment_id,
            api.deployment_resource(&api_id, &[method_id.as_str()])?,
        )?;

        let stage_id = logical_id(
            id,
            &[API_CONSTRUCT_ID, &format!("DeploymentStage.{}", api.stage_name), "Resource"],
        );
        template.add_resource(&stage_id, api.stage_resource(&api_id, &deployment_id)?)?;

        let permission_id = logical_id(
            id,
            &[API_CONSTRUCT_ID, "Default", ROOT_METHOD, "ApiPermission"],
        );
        template.add_resource(
            &permission_id,
            api.stage_invoke_permission_resource(&api_id, &stage_id, &integration)?,
        )?;

        let test_permission_id = logical_id(
            id,
            &[API_CONSTRUCT_ID, "Default", ROOT_METHOD, "ApiPermission", "Test"],
        );
        template.add_resource(
            &test_permission_id,
            api.console_invoke_permission_resource(&api_id, &integration)?,
        )?;

        template.add_output(
            logical_id(id, &[API_CONSTRUCT_ID, "Endpoint"]),
            api.endpoint_output(&api_id, &stage_id),
        )?;
        info!(logical_id = %api_id, method = ROOT_METHOD, path = "/", "API宣言");

        template.validate_references()?;

        info!(
            resource_count = template.resource_count(),
            environment = %environment,
            "スタック組み立て完了"
        );

        Ok(Stack::new(id.to_string(), self.variant, environment, template))
    }

    /// 環境変数に設定するParameter Store値
    fn parameter_value(
        &self,
        stack_id: &str,
        name: &str,
        parameters: &ParameterResolution,
        template: &mut Template,
    ) -> Result<Expr, StackBuildError> {
        match parameters {
            ParameterResolution::Resolved(values) => values
                .get(name)
                .map(|value| Expr::literal(value.as_str()))
                .ok_or_else(|| StackBuildError::UnresolvedParameter(name.to_string())),
            ParameterResolution::DeployTime => {
                let parameter_id = logical_id(stack_id, &["SsmParameterValue", name, "Parameter"]);
                template.add_parameter(
                    &parameter_id,
                    Parameter {
                        parameter_type: SSM_PARAMETER_TYPE.to_string(),
                        default: name.to_string(),
                        description: None,
                    },
                )?;
                debug!(parameter_name = %name, logical_id = %parameter_id, "デプロイ時解決パラメータ宣言");
                Ok(Expr::reference(parameter_id))
            }
        }
    }
}

/// ユーザー設定テーブルの宣言
fn user_config_table() -> TableSpec {
    TableSpec {
        table_name: USER_CONFIG_TABLE_NAME.to_string(),
        partition_key: USER_CONFIG_PARTITION_KEY.to_string(),
        removal_policy: RemovalPolicy::Destroy,
    }
}

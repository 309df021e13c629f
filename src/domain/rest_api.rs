/// REST API宣言
///
/// API Gateway（REST）とLambdaプロキシ統合を記述する。
/// 1つのAPIに対して以下のリソースを生成する:
/// - `AWS::ApiGateway::RestApi`
/// - `AWS::ApiGateway::Method`（ルートリソース上）
/// - `AWS::Lambda::Permission`（ステージ経由とコンソールのテスト呼び出しの2つ）
/// - `AWS::ApiGateway::Deployment` / `AWS::ApiGateway::Stage`
/// - エンドポイントURLの出力
use std::collections::BTreeMap;

use serde_json::json;
use sha2::{Digest, Sha256};

use super::intrinsic::Expr;
use super::template::{Output, Resource, TemplateError};

pub const REST_API_RESOURCE_TYPE: &str = "AWS::ApiGateway::RestApi";
pub const METHOD_RESOURCE_TYPE: &str = "AWS::ApiGateway::Method";
pub const DEPLOYMENT_RESOURCE_TYPE: &str = "AWS::ApiGateway::Deployment";
pub const STAGE_RESOURCE_TYPE: &str = "AWS::ApiGateway::Stage";
pub const PERMISSION_RESOURCE_TYPE: &str = "AWS::Lambda::Permission";

/// デフォルトのステージ名
pub const DEFAULT_STAGE_NAME: &str = "prod";

/// application/json用のリクエストテンプレート
pub const SUCCESS_REQUEST_TEMPLATE: &str = "{ \"statusCode\": \"200\"}";

/// ルートリソースに追加するメソッド
pub const ROOT_METHOD: &str = "POST";

/// コンソールからのテスト呼び出しで使われるステージ名
pub const TEST_INVOKE_STAGE: &str = "test-invoke-stage";

/// デプロイメント論理IDに付与するダイジェストの桁数
pub const DEPLOYMENT_DIGEST_LENGTH: usize = 32;

/// REST API本体の宣言
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestApiSpec {
    pub name: String,
    pub description: String,
    pub stage_name: String,
}

/// Lambdaプロキシ統合
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LambdaIntegration {
    /// 呼び出し先関数の論理ID
    pub function_logical_id: String,
    /// Content-Type → テンプレート
    pub request_templates: BTreeMap<String, String>,
}

impl LambdaIntegration {
    /// すべてのリクエストを成功テンプレートに対応付ける統合
    pub fn with_success_template(function_logical_id: impl Into<String>) -> Self {
        let mut request_templates = BTreeMap::new();
        request_templates.insert(
            "application/json".to_string(),
            SUCCESS_REQUEST_TEMPLATE.to_string(),
        );
        Self {
            function_logical_id: function_logical_id.into(),
            request_templates,
        }
    }

    fn invocation_uri(&self) -> Expr {
        Expr::concat(vec![
            Expr::literal("arn:"),
            Expr::partition(),
            Expr::literal(":apigateway:"),
            Expr::region(),
            Expr::literal(":lambda:path/2015-03-31/functions/"),
            Expr::get_att(&self.function_logical_id, "Arn"),
            Expr::literal("/invocations"),
        ])
    }
}

impl RestApiSpec {
    pub fn api_resource(&self) -> Result<Resource, TemplateError> {
        Resource::new(
            REST_API_RESOURCE_TYPE,
            &json!({
                "Description": self.description,
                "Name": self.name
            }),
        )
    }

    /// ルートリソースにメソッドを追加する
    pub fn root_method_resource(
        &self,
        api_logical_id: &str,
        integration: &LambdaIntegration,
    ) -> Result<Resource, TemplateError> {
        Resource::new(
            METHOD_RESOURCE_TYPE,
            &json!({
                "AuthorizationType": "NONE",
                "HttpMethod": ROOT_METHOD,
                "Integration": {
                    "IntegrationHttpMethod": "POST",
                    "RequestTemplates": integration.request_templates,
                    "Type": "AWS_PROXY",
                    "Uri": integration.invocation_uri()
                },
                "ResourceId": Expr::get_att(api_logical_id, "RootResourceId"),
                "RestApiId": Expr::reference(api_logical_id)
            }),
        )
    }

    /// デプロイ済みステージ経由で関数を呼び出す許可
    pub fn stage_invoke_permission_resource(
        &self,
        api_logical_id: &str,
        stage_logical_id: &str,
        integration: &LambdaIntegration,
    ) -> Result<Resource, TemplateError> {
        invoke_permission_resource(
            api_logical_id,
            Expr::reference(stage_logical_id),
            integration,
        )
    }

    /// コンソールのテスト呼び出し（`test-invoke-stage`）で関数を呼び出す許可
    pub fn console_invoke_permission_resource(
        &self,
        api_logical_id: &str,
        integration: &LambdaIntegration,
    ) -> Result<Resource, TemplateError> {
        invoke_permission_resource(
            api_logical_id,
            Expr::literal(TEST_INVOKE_STAGE),
            integration,
        )
    }

    /// デプロイメント（メソッド作成後に作られる必要がある）
    pub fn deployment_resource(
        &self,
        api_logical_id: &str,
        method_logical_ids: &[&str],
    ) -> Result<Resource, TemplateError> {
        let resource = Resource::new(
            DEPLOYMENT_RESOURCE_TYPE,
            &json!({
                "Description": self.description,
                "RestApiId": Expr::reference(api_logical_id)
            }),
        )?;

        Ok(method_logical_ids
            .iter()
            .fold(resource, |resource, id| resource.with_depends_on(*id)))
    }

    pub fn stage_resource(
        &self,
        api_logical_id: &str,
        deployment_logical_id: &str,
    ) -> Result<Resource, TemplateError> {
        Resource::new(
            STAGE_RESOURCE_TYPE,
            &json!({
                "DeploymentId": Expr::reference(deployment_logical_id),
                "RestApiId": Expr::reference(api_logical_id),
                "StageName": self.stage_name
            }),
        )
    }

    /// エンドポイントURL出力
    pub fn endpoint_output(&self, api_logical_id: &str, stage_logical_id: &str) -> Output {
        Output {
            value: Expr::concat(vec![
                Expr::literal("https://"),
                Expr::reference(api_logical_id),
                Expr::literal(".execute-api."),
                Expr::region(),
                Expr::literal("."),
                Expr::url_suffix(),
                Expr::literal("/"),
                Expr::reference(stage_logical_id),
                Expr::literal("/"),
            ]),
            description: Some(format!("{} endpoint", self.name)),
        }
    }
}

/// ルートパス（`/`）への`POST`に限定した呼び出し許可
fn invoke_permission_resource(
    api_logical_id: &str,
    stage: Expr,
    integration: &LambdaIntegration,
) -> Result<Resource, TemplateError> {
    let source_arn = Expr::concat(vec![
        Expr::literal("arn:"),
        Expr::partition(),
        Expr::literal(":execute-api:"),
        Expr::region(),
        Expr::literal(":"),
        Expr::account_id(),
        Expr::literal(":"),
        Expr::reference(api_logical_id),
        Expr::literal("/"),
        stage,
        Expr::literal(format!("/{}/", ROOT_METHOD)),
    ]);

    Resource::new(
        PERMISSION_RESOURCE_TYPE,
        &json!({
            "Action": "lambda:InvokeFunction",
            "FunctionName": Expr::get_att(&integration.function_logical_id, "Arn"),
            "Principal": "apigateway.amazonaws.com",
            "SourceArn": source_arn
        }),
    )
}

/// メソッド定義のダイジェスト（小文字16進）
///
/// デプロイメントの論理IDに付与する。メソッドや統合が変わると論理IDが変わり、
/// 新しいデプロイメントが作られてステージに反映される。
pub fn deployment_digest(methods: &[&Resource]) -> Result<String, TemplateError> {
    let mut hasher = Sha256::new();
    for method in methods {
        hasher.update(serde_json::to_vec(method)?);
    }
    let digest = hex::encode(hasher.finalize());
    Ok(digest[..DEPLOYMENT_DIGEST_LENGTH].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> RestApiSpec {
        RestApiSpec {
            name: "ChatGPT API Gateway".to_string(),
            description: "This service serves chat gpt response".to_string(),
            stage_name: DEFAULT_STAGE_NAME.to_string(),
        }
    }

    #[test]
    fn test_api_resource() {
        let resource = api().api_resource().unwrap();
        assert_eq!(resource.resource_type(), REST_API_RESOURCE_TYPE);
        assert_eq!(resource.properties()["Name"], json!("ChatGPT API Gateway"));
        assert_eq!(
            resource.properties()["Description"],
            json!("This service serves chat gpt response")
        );
    }

    #[test]
    fn test_root_method_with_success_template() {
        let integration = LambdaIntegration::with_success_template("Fn");
        let resource = api()
            .root_method_resource("Api", &integration)
            .unwrap();
        let props = resource.properties();

        assert_eq!(props["HttpMethod"], json!("POST"));
        assert_eq!(props["ResourceId"], json!({"Fn::GetAtt": ["Api", "RootResourceId"]}));
        assert_eq!(props["RestApiId"], json!({"Ref": "Api"}));
        assert_eq!(props["Integration"]["Type"], json!("AWS_PROXY"));
        assert_eq!(
            props["Integration"]["RequestTemplates"],
            json!({"application/json": "{ \"statusCode\": \"200\"}"})
        );
        assert_eq!(
            props["Integration"]["Uri"]["Fn::Join"][1][5],
            json!({"Fn::GetAtt": ["Fn", "Arn"]})
        );
    }

    fn source_arn_parts(resource: &Resource) -> Vec<serde_json::Value> {
        resource.properties()["SourceArn"]["Fn::Join"][1]
            .as_array()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_stage_invoke_permission_is_scoped_to_post() {
        let integration = LambdaIntegration::with_success_template("Fn");
        let resource = api()
            .stage_invoke_permission_resource("Api", "Stage", &integration)
            .unwrap();
        let props = resource.properties();

        assert_eq!(resource.resource_type(), PERMISSION_RESOURCE_TYPE);
        assert_eq!(props["Principal"], json!("apigateway.amazonaws.com"));
        assert_eq!(props["Action"], json!("lambda:InvokeFunction"));
        let parts = source_arn_parts(&resource);
        assert_eq!(parts[9], json!({"Ref": "Stage"}));
        assert_eq!(parts.last(), Some(&json!("/POST/")));
    }

    #[test]
    fn test_console_invoke_permission_uses_test_stage() {
        let integration = LambdaIntegration::with_success_template("Fn");
        let resource = api()
            .console_invoke_permission_resource("Api", &integration)
            .unwrap();

        assert_eq!(
            resource.properties()["FunctionName"],
            json!({"Fn::GetAtt": ["Fn", "Arn"]})
        );
        let parts = source_arn_parts(&resource);
        assert_eq!(parts[7], json!({"Ref": "Api"}));
        assert_eq!(parts[9], json!("test-invoke-stage"));
        assert_eq!(parts.last(), Some(&json!("/POST/")));
    }

    #[test]
    fn test_deployment_digest_follows_method_definition() {
        let first = api()
            .root_method_resource("Api", &LambdaIntegration::with_success_template("FnA"))
            .unwrap();
        let second = api()
            .root_method_resource("Api", &LambdaIntegration::with_success_template("FnB"))
            .unwrap();

        let digest = deployment_digest(&[&first]).unwrap();
        assert_eq!(digest.len(), DEPLOYMENT_DIGEST_LENGTH);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, deployment_digest(&[&first.clone()]).unwrap());
        assert_ne!(digest, deployment_digest(&[&second]).unwrap());
    }

    #[test]
    fn test_deployment_depends_on_methods() {
        let resource = api().deployment_resource("Api", &["MethodA", "MethodB"]).unwrap();
        assert_eq!(resource.resource_type(), DEPLOYMENT_RESOURCE_TYPE);
        assert_eq!(
            resource.depends_on(),
            &["MethodA".to_string(), "MethodB".to_string()]
        );
    }

    #[test]
    fn test_stage_resource() {
        let resource = api().stage_resource("Api", "Deployment").unwrap();
        assert_eq!(resource.properties()["StageName"], json!("prod"));
        assert_eq!(resource.properties()["DeploymentId"], json!({"Ref": "Deployment"}));
    }

    #[test]
    fn test_endpoint_output() {
        let output = api().endpoint_output("Api", "Stage");
        let value = serde_json::to_value(&output.value).unwrap();
        assert_eq!(value["Fn::Join"][1][0], json!("https://"));
        assert_eq!(value["Fn::Join"][1][1], json!({"Ref": "Api"}));
    }
}

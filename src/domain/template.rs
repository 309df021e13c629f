/// CloudFormationテンプレートモデル
///
/// スタック記述の出力形式。リソースは宣言順を保持する
/// （テーブル → 関数 → 権限付与 → API の順序がそのまま出力に現れる）。
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use super::intrinsic::Expr;

/// テンプレート操作のエラー型
#[derive(Debug, Error)]
pub enum TemplateError {
    /// 同じ論理IDのリソースが二重に宣言された
    #[error("論理IDが重複しています: {0}")]
    DuplicateLogicalId(String),
    /// 存在しないリソース・パラメータへの参照
    #[error("未定義の論理IDを参照しています: {from} -> {target}")]
    DanglingReference { from: String, target: String },
    /// JSONシリアライズ失敗
    #[error("テンプレートのシリアライズに失敗しました: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// スタック削除時・置換時のリソース扱い
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RemovalPolicy {
    /// スタックと共に削除する
    #[serde(rename = "Delete")]
    Destroy,
    /// スタック削除後も保持する
    Retain,
}

/// テンプレート内の1リソース
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Resource {
    #[serde(rename = "Type")]
    resource_type: String,
    properties: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    depends_on: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    update_replace_policy: Option<RemovalPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    deletion_policy: Option<RemovalPolicy>,
}

impl Resource {
    /// 型付きプロパティからリソースを作成
    pub fn new<P: Serialize>(
        resource_type: impl Into<String>,
        properties: &P,
    ) -> Result<Self, TemplateError> {
        Ok(Self {
            resource_type: resource_type.into(),
            properties: serde_json::to_value(properties)?,
            depends_on: Vec::new(),
            update_replace_policy: None,
            deletion_policy: None,
        })
    }

    /// 依存先リソースを追加（重複は無視）
    pub fn with_depends_on(mut self, logical_id: impl Into<String>) -> Self {
        let logical_id = logical_id.into();
        if !self.depends_on.contains(&logical_id) {
            self.depends_on.push(logical_id);
        }
        self
    }

    /// 削除ポリシーと置換ポリシーを同じ値で設定
    pub fn with_removal_policy(mut self, policy: RemovalPolicy) -> Self {
        self.update_replace_policy = Some(policy);
        self.deletion_policy = Some(policy);
        self
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn properties(&self) -> &Value {
        &self.properties
    }

    /// プロパティを名前で取得
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn depends_on(&self) -> &[String] {
        &self.depends_on
    }

    pub fn deletion_policy(&self) -> Option<RemovalPolicy> {
        self.deletion_policy
    }

    pub fn update_replace_policy(&self) -> Option<RemovalPolicy> {
        self.update_replace_policy
    }
}

/// テンプレートパラメータ（デプロイ時に値が決まる入力）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub parameter_type: String,
    pub default: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// テンプレート出力
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Output {
    pub value: Expr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// CloudFormationテンプレート
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    parameters: IndexMap<String, Parameter>,
    resources: IndexMap<String, Resource>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    outputs: IndexMap<String, Output>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// リソースを宣言順に追加する
    ///
    /// # エラー
    /// 同じ論理IDが既に宣言されている場合は`DuplicateLogicalId`
    pub fn add_resource(
        &mut self,
        logical_id: impl Into<String>,
        resource: Resource,
    ) -> Result<(), TemplateError> {
        let logical_id = logical_id.into();
        if self.resources.contains_key(&logical_id) || self.parameters.contains_key(&logical_id) {
            return Err(TemplateError::DuplicateLogicalId(logical_id));
        }
        self.resources.insert(logical_id, resource);
        Ok(())
    }

    /// パラメータを追加する（同一内容の再追加は無視）
    pub fn add_parameter(
        &mut self,
        logical_id: impl Into<String>,
        parameter: Parameter,
    ) -> Result<(), TemplateError> {
        let logical_id = logical_id.into();
        match self.parameters.get(&logical_id) {
            Some(existing) if *existing == parameter => Ok(()),
            Some(_) => Err(TemplateError::DuplicateLogicalId(logical_id)),
            None if self.resources.contains_key(&logical_id) => {
                Err(TemplateError::DuplicateLogicalId(logical_id))
            }
            None => {
                self.parameters.insert(logical_id, parameter);
                Ok(())
            }
        }
    }

    pub fn add_output(
        &mut self,
        name: impl Into<String>,
        output: Output,
    ) -> Result<(), TemplateError> {
        let name = name.into();
        if self.outputs.contains_key(&name) {
            return Err(TemplateError::DuplicateLogicalId(name));
        }
        self.outputs.insert(name, output);
        Ok(())
    }

    /// 宣言済みリソースに依存関係を追加する
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<(), TemplateError> {
        if !self.resources.contains_key(to) {
            return Err(TemplateError::DanglingReference {
                from: from.to_string(),
                target: to.to_string(),
            });
        }
        let resource = self
            .resources
            .get_mut(from)
            .ok_or_else(|| TemplateError::DanglingReference {
                from: to.to_string(),
                target: from.to_string(),
            })?;
        if !resource.depends_on.iter().any(|id| id == to) {
            resource.depends_on.push(to.to_string());
        }
        Ok(())
    }

    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    pub fn parameter(&self, logical_id: &str) -> Option<&Parameter> {
        self.parameters.get(logical_id)
    }

    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.parameters.iter().map(|(id, p)| (id.as_str(), p))
    }

    /// 指定した型のリソースを宣言順に列挙
    pub fn resources_of_type(&self, resource_type: &str) -> Vec<(&str, &Resource)> {
        self.resources
            .iter()
            .filter(|(_, resource)| resource.resource_type == resource_type)
            .map(|(id, resource)| (id.as_str(), resource))
            .collect()
    }

    /// 宣言順での位置
    pub fn position_of(&self, logical_id: &str) -> Option<usize> {
        self.resources.get_index_of(logical_id)
    }

    /// 宣言順の論理ID一覧
    pub fn logical_ids(&self) -> Vec<&str> {
        self.resources.keys().map(String::as_str).collect()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// すべてのRef / Fn::GetAtt / DependsOnが定義済みの論理IDを指していることを検証
    ///
    /// 疑似パラメータ（`AWS::`で始まるもの）は検証対象外。
    pub fn validate_references(&self) -> Result<(), TemplateError> {
        for (from, resource) in &self.resources {
            for target in &resource.depends_on {
                if !self.resources.contains_key(target) {
                    return Err(TemplateError::DanglingReference {
                        from: from.clone(),
                        target: target.clone(),
                    });
                }
            }
            self.check_value(from, &resource.properties)?;
        }

        for (name, output) in &self.outputs {
            self.check_value(name, &serde_json::to_value(&output.value)?)?;
        }

        Ok(())
    }

    fn check_value(&self, from: &str, value: &Value) -> Result<(), TemplateError> {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(target)) = map.get("Ref") {
                    self.check_target(from, target)?;
                }
                if let Some(Value::Array(args)) = map.get("Fn::GetAtt") {
                    if let Some(Value::String(target)) = args.first() {
                        self.check_target(from, target)?;
                    }
                }
                for nested in map.values() {
                    self.check_value(from, nested)?;
                }
                Ok(())
            }
            Value::Array(items) => items
                .iter()
                .try_for_each(|item| self.check_value(from, item)),
            _ => Ok(()),
        }
    }

    fn check_target(&self, from: &str, target: &str) -> Result<(), TemplateError> {
        if target.starts_with("AWS::")
            || self.resources.contains_key(target)
            || self.parameters.contains_key(target)
        {
            Ok(())
        } else {
            Err(TemplateError::DanglingReference {
                from: from.to_string(),
                target: target.to_string(),
            })
        }
    }

    /// 整形済みJSONとして出力
    pub fn to_json_pretty(&self) -> Result<String, TemplateError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

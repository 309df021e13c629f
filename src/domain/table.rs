/// DynamoDBテーブル宣言
///
/// パーティションキーのみのテーブルを`AWS::DynamoDB::Table`として記述する。
/// パーティションキーは作成後に変更できないため、宣言時に検証する。
use serde::Serialize;
use thiserror::Error;

use super::template::{RemovalPolicy, Resource, TemplateError};

pub const TABLE_RESOURCE_TYPE: &str = "AWS::DynamoDB::Table";

/// テーブル宣言のエラー型
#[derive(Debug, Error)]
pub enum TableSpecError {
    #[error("テーブル名が不正です: {0}")]
    InvalidTableName(String),
    #[error("パーティションキー名が空です")]
    EmptyPartitionKey,
    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// 課金モード（オンデマンドのみ）
pub const BILLING_MODE: &str = "PAY_PER_REQUEST";

/// パーティションキーの属性型（文字列）
pub const PARTITION_KEY_ATTRIBUTE_TYPE: &str = "S";

/// テーブル宣言
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub table_name: String,
    pub partition_key: String,
    pub removal_policy: RemovalPolicy,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct KeySchemaElement<'a> {
    attribute_name: &'a str,
    key_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct AttributeDefinition<'a> {
    attribute_name: &'a str,
    attribute_type: &'static str,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct TableProperties<'a> {
    key_schema: Vec<KeySchemaElement<'a>>,
    attribute_definitions: Vec<AttributeDefinition<'a>>,
    billing_mode: &'static str,
    table_name: &'a str,
}

impl TableSpec {
    /// 宣言内容を検証する
    ///
    /// - テーブル名: 3〜255文字、英数字と`_` `-` `.`のみ
    /// - パーティションキー名: 空でないこと
    pub fn validate(&self) -> Result<(), TableSpecError> {
        let name = &self.table_name;
        let valid_chars = name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if name.len() < 3 || name.len() > 255 || !valid_chars {
            return Err(TableSpecError::InvalidTableName(name.clone()));
        }
        if self.partition_key.trim().is_empty() {
            return Err(TableSpecError::EmptyPartitionKey);
        }
        Ok(())
    }

    /// テンプレートリソースに変換する
    pub fn to_resource(&self) -> Result<Resource, TableSpecError> {
        self.validate()?;

        let key_name = self.partition_key.as_str();
        let properties = TableProperties {
            key_schema: vec![KeySchemaElement {
                attribute_name: key_name,
                key_type: "HASH",
            }],
            attribute_definitions: vec![AttributeDefinition {
                attribute_name: key_name,
                attribute_type: PARTITION_KEY_ATTRIBUTE_TYPE,
            }],
            billing_mode: BILLING_MODE,
            table_name: &self.table_name,
        };

        Ok(Resource::new(TABLE_RESOURCE_TYPE, &properties)?.with_removal_policy(self.removal_policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_config_table() -> TableSpec {
        TableSpec {
            table_name: "user_config".to_string(),
            partition_key: "user_id".to_string(),
            removal_policy: RemovalPolicy::Destroy,
        }
    }

    #[test]
    fn test_table_resource_properties() {
        let resource = user_config_table().to_resource().unwrap();

        assert_eq!(resource.resource_type(), TABLE_RESOURCE_TYPE);
        assert_eq!(
            resource.properties(),
            &json!({
                "KeySchema": [{"AttributeName": "user_id", "KeyType": "HASH"}],
                "AttributeDefinitions": [{"AttributeName": "user_id", "AttributeType": "S"}],
                "BillingMode": "PAY_PER_REQUEST",
                "TableName": "user_config"
            })
        );
    }

    #[test]
    fn test_table_is_on_demand_without_provisioned_throughput() {
        let resource = user_config_table().to_resource().unwrap();
        let props = resource.properties();

        assert_eq!(props["BillingMode"], json!("PAY_PER_REQUEST"));
        // オンデマンドではスループット指定を出力しない
        assert!(props.get("ProvisionedThroughput").is_none());
    }

    #[test]
    fn test_table_destroy_policy() {
        let resource = user_config_table().to_resource().unwrap();
        assert_eq!(resource.deletion_policy(), Some(RemovalPolicy::Destroy));
        assert_eq!(resource.update_replace_policy(), Some(RemovalPolicy::Destroy));
    }

    #[test]
    fn test_table_retain_policy_is_passed_through() {
        let mut spec = user_config_table();
        spec.removal_policy = RemovalPolicy::Retain;
        let resource = spec.to_resource().unwrap();
        assert_eq!(resource.deletion_policy(), Some(RemovalPolicy::Retain));
    }

    #[test]
    fn test_invalid_table_names() {
        for name in ["ab", "user config", "テーブル", ""] {
            let mut spec = user_config_table();
            spec.table_name = name.to_string();
            match spec.validate() {
                Err(TableSpecError::InvalidTableName(n)) => assert_eq!(n, name),
                other => panic!("Expected InvalidTableName for {:?}, got {:?}", name, other),
            }
        }
    }

    #[test]
    fn test_valid_table_name_characters() {
        let mut spec = user_config_table();
        spec.table_name = "chat-gpt.user_config-2".to_string();
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_empty_partition_key() {
        let mut spec = user_config_table();
        spec.partition_key = "  ".to_string();
        assert!(matches!(
            spec.to_resource(),
            Err(TableSpecError::EmptyPartitionKey)
        ));
    }
}

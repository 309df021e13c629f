/// テーブルアクセス権限付与
///
/// 関数の実行ロールにDynamoDBテーブルへのデータアクセス権限を与える
/// `AWS::IAM::Policy`を記述する。テーブルと関数の両方が宣言済みであることが前提。
use serde_json::json;

use super::intrinsic::Expr;
use super::template::{Resource, TemplateError};

pub const POLICY_RESOURCE_TYPE: &str = "AWS::IAM::Policy";

/// 読み取り系アクション
pub const TABLE_READ_ACTIONS: [&str; 8] = [
    "dynamodb:BatchGetItem",
    "dynamodb:GetRecords",
    "dynamodb:GetShardIterator",
    "dynamodb:Query",
    "dynamodb:GetItem",
    "dynamodb:Scan",
    "dynamodb:ConditionCheckItem",
    "dynamodb:DescribeTable",
];

/// 書き込み系アクション
pub const TABLE_WRITE_ACTIONS: [&str; 4] = [
    "dynamodb:BatchWriteItem",
    "dynamodb:PutItem",
    "dynamodb:UpdateItem",
    "dynamodb:DeleteItem",
];

/// 読み書き権限として許可するアクション一覧
pub fn read_write_actions() -> Vec<&'static str> {
    TABLE_READ_ACTIONS
        .iter()
        .chain(TABLE_WRITE_ACTIONS.iter())
        .copied()
        .collect()
}

/// 関数からテーブルへの読み書き権限付与
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    /// 権限を受け取る実行ロールの論理ID
    pub role_logical_id: String,
    /// 対象テーブルの論理ID
    pub table_logical_id: String,
}

impl AccessGrant {
    /// ポリシーリソースを作成
    ///
    /// # 引数
    /// * `policy_logical_id` - ポリシー自身の論理ID（PolicyNameにも使う）
    pub fn to_resource(&self, policy_logical_id: &str) -> Result<Resource, TemplateError> {
        let properties = json!({
            "PolicyDocument": {
                "Statement": [{
                    "Action": read_write_actions(),
                    "Effect": "Allow",
                    "Resource": [Expr::get_att(&self.table_logical_id, "Arn")]
                }],
                "Version": "2012-10-17"
            },
            "PolicyName": policy_logical_id,
            "Roles": [Expr::reference(&self.role_logical_id)]
        });
        Resource::new(POLICY_RESOURCE_TYPE, &properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant() -> AccessGrant {
        AccessGrant {
            role_logical_id: "FnServiceRole".to_string(),
            table_logical_id: "UserConfig".to_string(),
        }
    }

    #[test]
    fn test_read_write_actions_cover_both_sets() {
        let actions = read_write_actions();
        assert_eq!(actions.len(), TABLE_READ_ACTIONS.len() + TABLE_WRITE_ACTIONS.len());
        assert!(actions.contains(&"dynamodb:GetItem"));
        assert!(actions.contains(&"dynamodb:PutItem"));
    }

    #[test]
    fn test_policy_resource() {
        let resource = grant().to_resource("FnPolicy").unwrap();
        let props = resource.properties();

        assert_eq!(resource.resource_type(), POLICY_RESOURCE_TYPE);
        assert_eq!(props["PolicyName"], json!("FnPolicy"));
        assert_eq!(props["Roles"], json!([{"Ref": "FnServiceRole"}]));
        assert_eq!(
            props["PolicyDocument"]["Statement"][0]["Resource"],
            json!([{"Fn::GetAtt": ["UserConfig", "Arn"]}])
        );
        assert_eq!(
            props["PolicyDocument"]["Statement"][0]["Action"]
                .as_array()
                .map(Vec::len),
            Some(12)
        );
    }
}

/// CloudFormation組み込み関数
///
/// テンプレート内の値を表す式。リテラル文字列のほか、
/// Ref / Fn::GetAtt / Fn::Join / Fn::Sub をCloudFormationの
/// JSON表現そのままにシリアライズする。
use serde::Serialize;

/// 疑似パラメータ: パーティション（aws, aws-cn など）
pub const PSEUDO_PARTITION: &str = "AWS::Partition";

/// 疑似パラメータ: リージョン
pub const PSEUDO_REGION: &str = "AWS::Region";

/// 疑似パラメータ: アカウントID
pub const PSEUDO_ACCOUNT_ID: &str = "AWS::AccountId";

/// 疑似パラメータ: URLサフィックス（amazonaws.com など）
pub const PSEUDO_URL_SUFFIX: &str = "AWS::URLSuffix";

/// テンプレート内の値
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Expr {
    /// そのまま出力される文字列
    Literal(String),
    /// `{"Ref": "<logical id>"}`
    Ref {
        #[serde(rename = "Ref")]
        target: String,
    },
    /// `{"Fn::GetAtt": ["<logical id>", "<attribute>"]}`
    GetAtt {
        #[serde(rename = "Fn::GetAtt")]
        target: (String, String),
    },
    /// `{"Fn::Join": ["<delimiter>", [...]]}`
    Join {
        #[serde(rename = "Fn::Join")]
        parts: (String, Vec<Expr>),
    },
    /// `{"Fn::Sub": "<template>"}`
    Sub {
        #[serde(rename = "Fn::Sub")]
        template: String,
    },
}

impl Expr {
    pub fn literal(value: impl Into<String>) -> Self {
        Expr::Literal(value.into())
    }

    /// リソースまたはパラメータへのRefを作成
    pub fn reference(target: impl Into<String>) -> Self {
        Expr::Ref {
            target: target.into(),
        }
    }

    /// リソース属性の参照を作成
    pub fn get_att(logical_id: impl Into<String>, attribute: impl Into<String>) -> Self {
        Expr::GetAtt {
            target: (logical_id.into(), attribute.into()),
        }
    }

    /// 区切り文字なしで結合する（ARN組み立て用）
    pub fn concat(parts: Vec<Expr>) -> Self {
        Expr::join("", parts)
    }

    pub fn join(delimiter: impl Into<String>, parts: Vec<Expr>) -> Self {
        Expr::Join {
            parts: (delimiter.into(), parts),
        }
    }

    pub fn sub(template: impl Into<String>) -> Self {
        Expr::Sub {
            template: template.into(),
        }
    }

    pub fn partition() -> Self {
        Expr::reference(PSEUDO_PARTITION)
    }

    pub fn region() -> Self {
        Expr::reference(PSEUDO_REGION)
    }

    pub fn account_id() -> Self {
        Expr::reference(PSEUDO_ACCOUNT_ID)
    }

    pub fn url_suffix() -> Self {
        Expr::reference(PSEUDO_URL_SUFFIX)
    }
}

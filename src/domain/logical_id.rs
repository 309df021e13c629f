/// 論理ID生成
///
/// コンストラクトパス（スタックID/コンストラクトID/...）から
/// CloudFormationの論理IDを決定的に生成する。
///
/// 形式: `<パス要素の英数字部分><パス全体のSHA-256先頭8桁（大文字16進）>`
/// - スタックIDは人間可読部分に含めない（ハッシュには含める）
/// - 末尾の`Resource`と途中の`Default`は人間可読部分から除く
use sha2::{Digest, Sha256};

/// CloudFormationの論理ID最大長
pub const MAX_LOGICAL_ID_LENGTH: usize = 255;

/// ハッシュサフィックスの桁数
const HASH_LENGTH: usize = 8;

/// パス要素のうち人間可読部分から除外される要素
const HIDDEN_COMPONENT: &str = "Default";

/// パス末尾で人間可読部分から除外される要素
const RESOURCE_COMPONENT: &str = "Resource";

/// コンストラクトパスから論理IDを生成する
///
/// # 引数
/// * `stack_id` - スタックID（パスの先頭要素）
/// * `path` - スタック配下のコンストラクトパス
pub fn logical_id(stack_id: &str, path: &[&str]) -> String {
    let hash = path_hash(stack_id, path);

    let mut visible: Vec<&str> = path
        .iter()
        .copied()
        .filter(|component| *component != HIDDEN_COMPONENT)
        .collect();
    if visible.len() > 1 && visible.last() == Some(&RESOURCE_COMPONENT) {
        visible.pop();
    }

    let mut human: String = visible
        .iter()
        .flat_map(|component| component.chars())
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    human.truncate(MAX_LOGICAL_ID_LENGTH - HASH_LENGTH);

    format!("{}{}", human, hash)
}

/// パス全体のハッシュ（大文字16進8桁）
fn path_hash(stack_id: &str, path: &[&str]) -> String {
    let mut full_path = Vec::with_capacity(path.len() + 1);
    full_path.push(stack_id);
    full_path.extend_from_slice(path);

    let digest = Sha256::digest(full_path.join("/").as_bytes());
    hex::encode_upper(&digest[..HASH_LENGTH / 2])
}

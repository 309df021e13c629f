/// コードアセットのステージング
///
/// ビルド済みの関数アーティファクト（zip）を検証し、内容のSHA-256を
/// アセットハッシュとして計算する。アセットバケット上のオブジェクトキーは
/// `<ハッシュ>.zip`となるため、内容が同じなら合成結果も変わらない。
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

/// アセットステージングのエラー型
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("アセットが見つかりません: {0}")]
    NotFound(PathBuf),
    #[error("アセットが通常ファイルではありません: {0}")]
    NotAFile(PathBuf),
    #[error("zip以外のアセットには対応していません: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("アセットの読み込みに失敗しました: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// ステージング済みアセット
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    /// 元ファイルのパス
    pub source_path: PathBuf,
    /// 内容のSHA-256（小文字16進）
    pub hash: String,
    /// アセットバケット上のオブジェクトキー
    pub object_key: String,
}

impl StagedAsset {
    /// クラウドアセンブリ内でのファイル名
    pub fn assembly_file_name(&self) -> String {
        format!("asset.{}.zip", self.hash)
    }
}

/// アーティファクトを検証してハッシュを計算する
pub fn stage_asset(path: &Path) -> Result<StagedAsset, AssetError> {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            return Err(AssetError::NotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(AssetError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    if !metadata.is_file() {
        return Err(AssetError::NotAFile(path.to_path_buf()));
    }

    let is_zip = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if !is_zip {
        return Err(AssetError::UnsupportedFormat(path.to_path_buf()));
    }

    let hash = hash_file(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        asset_path = %path.display(),
        asset_hash = %hash,
        size_bytes = metadata.len(),
        "アセットをステージング"
    );

    Ok(StagedAsset {
        source_path: path.to_path_buf(),
        object_key: format!("{}.zip", hash),
        hash,
    })
}

fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

//! クラウドアセンブリ出力
//!
//! 合成済みスタックをデプロイツールが読み込めるディレクトリ構成で書き出す。
//!
//! ```text
//! cdk.out/
//! ├── manifest.json
//! ├── <stack-id>.template.json
//! ├── <stack-id>.assets.json
//! └── asset.<hash>.zip
//! ```
//!
//! タイムスタンプ等は含めないため、同じ入力からは同じ内容が出力される。

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::domain::function::ASSET_BUCKET_TEMPLATE;
use crate::domain::{Stack, TemplateError};

use super::asset_staging::StagedAsset;

/// クラウドアセンブリのスキーマバージョン
pub const ASSEMBLY_SCHEMA_VERSION: &str = "36.0.0";

/// デフォルトの出力ディレクトリ
pub const DEFAULT_OUTPUT_DIR: &str = "cdk.out";

/// マニフェストファイル名
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// アセンブリ出力のエラー型
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("ファイル出力に失敗しました: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("マニフェストのシリアライズに失敗しました: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssemblyManifest {
    version: &'static str,
    artifacts: BTreeMap<String, ArtifactManifest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactManifest {
    #[serde(rename = "type")]
    artifact_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    environment: Option<String>,
    properties: BTreeMap<&'static str, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    dependencies: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssetManifest {
    version: &'static str,
    files: BTreeMap<String, FileAsset>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileAsset {
    source: FileAssetSource,
    destinations: BTreeMap<&'static str, FileAssetDestination>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileAssetSource {
    path: String,
    packaging: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileAssetDestination {
    bucket_name: &'static str,
    object_key: String,
}

/// 書き出したファイルの一覧
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblyOutput {
    pub directory: PathBuf,
    pub manifest_path: PathBuf,
    pub template_path: PathBuf,
    pub assets_path: PathBuf,
    pub asset_path: PathBuf,
}

/// クラウドアセンブリ出力
#[derive(Debug, Clone)]
pub struct CloudAssemblyWriter {
    out_dir: PathBuf,
}

impl CloudAssemblyWriter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    /// スタックとアセットを書き出す
    pub fn write(&self, stack: &Stack, asset: &StagedAsset) -> Result<AssemblyOutput, AssemblyError> {
        std::fs::create_dir_all(&self.out_dir).map_err(|source| AssemblyError::Io {
            path: self.out_dir.clone(),
            source,
        })?;

        // 先にすべての内容をシリアライズしてから書き込む
        let template_json = stack.to_json()?;
        let assets_file_name = format!("{}.assets.json", stack.id());
        let assets_json = serde_json::to_string_pretty(&asset_manifest(asset))?;
        let manifest_json =
            serde_json::to_string_pretty(&assembly_manifest(stack, &assets_file_name))?;

        let template_path = self.out_dir.join(stack.template_file_name());
        let assets_path = self.out_dir.join(&assets_file_name);
        let asset_path = self.out_dir.join(asset.assembly_file_name());
        let manifest_path = self.out_dir.join(MANIFEST_FILE_NAME);

        write_file(&template_path, &template_json)?;
        write_file(&assets_path, &assets_json)?;
        if asset.source_path != asset_path {
            std::fs::copy(&asset.source_path, &asset_path).map_err(|source| AssemblyError::Io {
                path: asset_path.clone(),
                source,
            })?;
        }
        write_file(&manifest_path, &manifest_json)?;

        info!(
            stack_id = stack.id(),
            out_dir = %self.out_dir.display(),
            template = %template_path.display(),
            "クラウドアセンブリ出力完了"
        );

        Ok(AssemblyOutput {
            directory: self.out_dir.clone(),
            manifest_path,
            template_path,
            assets_path,
            asset_path,
        })
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), AssemblyError> {
    std::fs::write(path, contents).map_err(|source| AssemblyError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn asset_manifest(asset: &StagedAsset) -> AssetManifest {
    let mut destinations = BTreeMap::new();
    destinations.insert(
        "current_account-current_region",
        FileAssetDestination {
            bucket_name: ASSET_BUCKET_TEMPLATE,
            object_key: asset.object_key.clone(),
        },
    );

    let mut files = BTreeMap::new();
    files.insert(
        asset.hash.clone(),
        FileAsset {
            source: FileAssetSource {
                path: asset.assembly_file_name(),
                packaging: "file",
            },
            destinations,
        },
    );

    AssetManifest {
        version: ASSEMBLY_SCHEMA_VERSION,
        files,
    }
}

fn assembly_manifest(stack: &Stack, assets_file_name: &str) -> AssemblyManifest {
    let assets_artifact_id = format!("{}.assets", stack.id());

    let mut artifacts = BTreeMap::new();
    artifacts.insert(
        assets_artifact_id.clone(),
        ArtifactManifest {
            artifact_type: "cdk:asset-manifest",
            environment: None,
            properties: BTreeMap::from([("file", assets_file_name.to_string())]),
            dependencies: Vec::new(),
        },
    );
    artifacts.insert(
        stack.id().to_string(),
        ArtifactManifest {
            artifact_type: "aws:cloudformation:stack",
            environment: Some(stack.environment().uri()),
            properties: BTreeMap::from([("templateFile", stack.template_file_name())]),
            dependencies: vec![assets_artifact_id],
        },
    );

    AssemblyManifest {
        version: ASSEMBLY_SCHEMA_VERSION,
        artifacts,
    }
}

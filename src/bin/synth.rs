/// スタック合成コマンド
///
/// ChatGPT Slack botのスタック（API Gateway + Lambda + DynamoDB）を
/// CloudFormationテンプレートとして合成し、クラウドアセンブリを書き出す。
///
/// # 環境変数
/// - STACK_ID / STACK_VARIANT / LAMBDA_ASSET_PATH / PARAMETER_PREFIX
/// - PARAMETER_RESOLUTION / CDK_OUTDIR / STACK_DESCRIPTION
/// - CDK_DEFAULT_ACCOUNT / CDK_DEFAULT_REGION
/// - AWS認証情報: aws-configにより自動読み込み（合成時解決モードのみ使用）
///
/// # シークレットの扱い
/// 合成時解決モード（デフォルト）ではParameter Storeの値が平文のまま
/// `cdk.out/<スタックID>.template.json`に書き込まれる。テンプレートに値を残さない場合は
/// `--resolve deploy`を使う（デプロイ時にCloudFormationが解決する）。
///
/// # 実行例
/// ```bash
/// # Parameter Storeから値を解決して合成
/// cargo run --bin synth
///
/// # テーブルなしの構成をデプロイ時解決で合成
/// cargo run --bin synth -- --variant minimal --resolve deploy
///
/// # オフライン合成（値を直接指定）
/// cargo run --bin synth -- \
///   --parameter /chat-gpt-slack/OPEN_AI_API_KEY=sk-xxx \
///   --parameter /chat-gpt-slack/SLACK_BOT_TOKEN=xoxb-xxx \
///   --parameter /chat-gpt-slack/SLACK_SIGNING_SECRET=xxx
/// ```
use std::path::PathBuf;

use chatgpt_slack_stack::application::Synthesizer;
use chatgpt_slack_stack::domain::StackVariant;
use chatgpt_slack_stack::infrastructure::{
    init_logging, AwsSsmParameterStore, ParameterStore, ResolutionMode, StaticParameterStore,
    SynthConfig,
};
use clap::Parser;
use tracing::info;

type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

/// コマンドライン引数（環境変数より優先される）
#[derive(Parser, Debug)]
#[command(name = "synth")]
#[command(about = "ChatGPT Slack botスタックをCloudFormationテンプレートとして合成")]
#[command(
    after_help = "注意: 合成時解決モード（--resolve synth、デフォルト）ではシークレット値が平文でテンプレートに書き込まれます。値をテンプレートに残さない場合は --resolve deploy を指定してください。"
)]
struct CliArgs {
    /// スタックID
    #[arg(long)]
    stack_id: Option<String>,

    /// スタックバリアント（full / minimal）
    #[arg(long)]
    variant: Option<StackVariant>,

    /// 関数アーティファクト（zip）のパス
    #[arg(long, short = 'a')]
    asset: Option<PathBuf>,

    /// Parameter Storeのプレフィックス
    #[arg(long)]
    parameter_prefix: Option<String>,

    /// パラメータ解決タイミング（synth / deploy）
    #[arg(long)]
    resolve: Option<ResolutionMode>,

    /// 出力ディレクトリ
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Parameter Storeの代わりに使う値（NAME=VALUE、複数指定可）
    #[arg(long = "parameter", short = 'p', value_parser = parse_key_value)]
    parameters: Vec<(String, String)>,

    /// テンプレートを標準出力にも出力する（--resolve deploy のときのみ）
    #[arg(long)]
    print: bool,
}

impl CliArgs {
    /// 環境変数から読んだ設定に引数を上書きする
    fn apply(&self, mut config: SynthConfig) -> SynthConfig {
        if let Some(stack_id) = &self.stack_id {
            config.stack_id = stack_id.clone();
        }
        if let Some(variant) = self.variant {
            config.variant = variant;
        }
        if let Some(asset) = &self.asset {
            config.asset_path = asset.clone();
        }
        if let Some(prefix) = &self.parameter_prefix {
            config.parameter_prefix = prefix.clone();
        }
        if let Some(resolve) = self.resolve {
            config.resolution = resolve;
        }
        if let Some(output) = &self.output {
            config.out_dir = output.clone();
        }
        config
    }
}

/// シークレット値を含むテンプレートは標準出力に出さない
fn check_print_allowed(print: bool, resolution: ResolutionMode) -> Result<(), String> {
    if print && resolution == ResolutionMode::Synth {
        return Err(
            "合成時解決モードのテンプレートはシークレット値を含むため --print できません（--resolve deploy を使用してください）"
                .to_string(),
        );
    }
    Ok(())
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("NAME=VALUE形式で指定してください: {}", s))?;
    if key.is_empty() {
        return Err(format!("パラメータ名が空です: {}", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    // 構造化ログを初期化
    init_logging();

    let args = CliArgs::parse();
    let config = args.apply(SynthConfig::from_env()?);
    check_print_allowed(args.print, config.resolution)?;

    info!(
        stack_id = %config.stack_id,
        variant = %config.variant,
        asset_path = %config.asset_path.display(),
        resolution = ?config.resolution,
        out_dir = %config.out_dir.display(),
        "合成設定を読み込み"
    );

    // 値の取得元を決定
    let store: Box<dyn ParameterStore> = if !args.parameters.is_empty() {
        info!(parameter_count = args.parameters.len(), "引数で指定された値を使用");
        Box::new(args.parameters.iter().cloned().collect::<StaticParameterStore>())
    } else if config.resolution == ResolutionMode::Deploy {
        Box::new(StaticParameterStore::new())
    } else {
        Box::new(AwsSsmParameterStore::from_config().await)
    };

    let output = Synthesizer::new(store.as_ref()).synthesize(&config).await?;

    if args.print {
        println!("{}", output.stack.to_json()?);
    }

    Ok(())
}

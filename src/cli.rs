use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bill-scan")]
#[command(about = "レシート画像のOCR・明細分類・編集ツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// レシート画像を解析して明細JSONを出力
    Process {
        /// 画像ファイルまたはフォルダ
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// テンプレートID（省略時は設定値、無ければカタログ先頭）
        #[arg(short, long)]
        template: Option<String>,

        /// 解析する画像の番号（0始まり、省略時は最初に補正が終わった画像）
        #[arg(long)]
        select: Option<usize>,

        /// 出力JSONファイル（デフォルト: ./bill-report.json）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Excelも出力（ファイルまたはフォルダ）
        #[arg(long)]
        excel: Option<PathBuf>,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,

        /// 参照バックエンドの待ち時間を省略
        #[arg(long)]
        no_delay: bool,
    },

    /// テンプレート一覧
    Templates {
        /// JSONで出力
        #[arg(long)]
        json: bool,
    },

    /// 明細JSONの合計・カテゴリ別小計を表示
    Summary {
        /// 明細JSONファイル
        #[arg(required = true)]
        input: PathBuf,
    },

    /// 対話的に明細を編集
    Review {
        /// 明細JSONファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 出力先（省略時は上書き）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 明細JSONからExcelを生成
    Export {
        /// 明細JSONファイル
        #[arg(required = true)]
        input: PathBuf,

        /// 出力ファイル/ディレクトリ（省略時は入力と同じフォルダ）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 設定を表示/編集
    Config {
        /// 設定を表示
        #[arg(long)]
        show: bool,

        /// 既定テンプレートを設定
        #[arg(long)]
        set_template: Option<String>,

        /// 外部OCRコマンドを設定（空文字で解除）
        #[arg(long)]
        set_ocr_command: Option<String>,

        /// 各段のタイムアウト秒（0で無効）
        #[arg(long)]
        set_timeout: Option<u64>,
    },
}

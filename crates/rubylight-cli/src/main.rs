/*
 * RubyLight CLI - メインエントリーポイント
 *
 * Rubyソースを解析してオブジェクトレジストリを構築するCLIツールのエントリーポイントです。
 * コマンドライン引数の解析と処理ロジックを呼び出します。
 */

use std::process;
use std::time::Instant;

use clap::Parser;
use log::{error, info};

mod cli;

fn main() {
    // コマンドライン引数の解析
    let cli = cli::Cli::parse();

    // ロギングの初期化
    cli::setup_logging(cli.verbose, cli.quiet);

    let start_time = Instant::now();
    let result = cli::run(&cli);
    let elapsed = start_time.elapsed();

    match result {
        Ok(()) => {
            info!("処理完了: {:.2}秒", elapsed.as_secs_f64());
        }
        Err(e) => {
            error!("{:#}", e);
            process::exit(1);
        }
    }
}

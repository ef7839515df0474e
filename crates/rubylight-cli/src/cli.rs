/*
 * RubyLight CLI - コマンドライン引数処理モジュール
 *
 * コマンドライン引数を解釈し、ロード順序コーディネーターとレジストリの呼び出しに変換します。
 */

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::{ColoredString, Colorize};
use log::{debug, info, warn};
use rubylight_parser::{
    BatchReport, CodeObject, DiagnosticKind, LoadOrderCoordinator, ObjectType, ParserConfig, Registry,
    RegistrySnapshot, ResolveOptions, Scope, VERSION,
};

/// Rubyソースのドキュメント解析ツール
#[derive(Parser)]
#[command(name = "rubylight")]
#[command(version = VERSION)]
#[command(about = "Rubyソースからドキュメント用のオブジェクトレジストリを構築する", long_about = None)]
pub struct Cli {
    /// 詳細なログ出力を有効にする
    #[arg(short, long, default_value = "false", global = true)]
    pub verbose: bool,

    /// 不要な出力を抑制する
    #[arg(short, long, default_value = "false", global = true)]
    pub quiet: bool,

    /// 設定ファイルへのパス（省略時はカレントディレクトリの .rubylight.toml）
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// サブコマンド
    #[command(subcommand)]
    pub command: Commands,
}

/// サブコマンド
#[derive(Subcommand)]
pub enum Commands {
    /// ファイルやディレクトリを解析して結果を表示
    Parse(ParseArgs),

    /// レジストリ内のオブジェクトの詳細を表示
    Show(ShowArgs),
}

/// parse サブコマンドの引数
#[derive(Args)]
pub struct ParseArgs {
    /// 入力ファイルまたはディレクトリ
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// 登録されたオブジェクトを一覧表示
    #[arg(short, long, default_value = "false")]
    pub list: bool,

    /// ドキュメントのないオブジェクトを表示
    #[arg(short, long, default_value = "false")]
    pub undocumented: bool,

    /// 種類ごとの件数を表示
    #[arg(short, long, default_value = "false")]
    pub stats: bool,

    /// 再試行の上限を上書き
    #[arg(long, value_name = "N")]
    pub max_retries: Option<usize>,

    /// レジストリのスナップショットを保存
    #[arg(long, value_name = "FILE")]
    pub save_cache: Option<PathBuf>,
}

/// show サブコマンドの引数
#[derive(Args)]
pub struct ShowArgs {
    /// オブジェクトのパス（例: Foo::Bar#baz）
    #[arg(required = true)]
    pub object: String,

    /// 読み込むスナップショット（省略時は設定の cache_path）
    #[arg(long, value_name = "FILE")]
    pub load_cache: Option<PathBuf>,

    /// スナップショットがない場合に解析する入力
    pub paths: Vec<PathBuf>,
}

/// ログ設定を初期化
pub fn setup_logging(verbose: bool, quiet: bool) {
    let env = env_logger::Env::default().filter_or(
        "RUBYLIGHT_LOG",
        if verbose {
            "debug"
        } else if quiet {
            "error"
        } else {
            "warn"
        },
    );

    env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_module_path(verbose)
        .init();
}

/// CLIからサブコマンドを実行
pub fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    debug!("設定: {:?}", config);

    match &cli.command {
        Commands::Parse(args) => parse(args, config, cli.quiet),
        Commands::Show(args) => show(args, config),
    }
}

fn load_config(path: Option<&Path>) -> Result<ParserConfig> {
    match path {
        Some(path) => ParserConfig::load(path)
            .with_context(|| format!("設定ファイル {} の読み込みに失敗しました", path.display())),
        None => ParserConfig::discover(".").context("設定ファイルの読み込みに失敗しました"),
    }
}

/// 入力パスを解析してレジストリを構築
fn build_registry(paths: &[PathBuf], config: ParserConfig) -> Result<(Registry, BatchReport)> {
    let mut coordinator = LoadOrderCoordinator::new(config);
    for path in paths {
        if path.is_dir() {
            coordinator
                .add_directory(path)
                .with_context(|| format!("{} の走査に失敗しました", path.display()))?;
        } else {
            coordinator
                .add_file(path)
                .with_context(|| format!("{} を読み込めません", path.display()))?;
        }
    }
    if coordinator.is_empty() {
        warn!("解析対象のファイルがありません");
    }

    let mut registry = Registry::new();
    let report = coordinator.run(&mut registry).context("レジストリの構築に失敗しました")?;
    Ok((registry, report))
}

/// parse サブコマンドの処理
fn parse(args: &ParseArgs, mut config: ParserConfig, quiet: bool) -> Result<()> {
    info!("rubylight v{} を起動中...", VERSION);
    if let Some(max_retries) = args.max_retries {
        config.max_retries = max_retries;
    }
    let cache_path = args.save_cache.clone().or_else(|| config.cache_path.clone());

    let (registry, report) = build_registry(&args.paths, config)?;

    if !quiet {
        for diagnostic in report.diagnostics.entries() {
            if diagnostic.kind != DiagnosticKind::Deferred {
                eprintln!("{}", diagnostic.to_string().yellow());
            }
        }
    }

    if args.list {
        let mut objects: Vec<&CodeObject> = registry.objects().map(|(_, object)| object).collect();
        objects.sort_by(|a, b| a.path.cmp(&b.path));
        for object in objects {
            println!("{} {}", kind_label(object.object_type()), object.path);
        }
    }

    if args.undocumented {
        let mut missing: Vec<&CodeObject> = registry
            .objects()
            .map(|(_, object)| object)
            .filter(|object| object.docstring.is_blank() && !object.dynamic)
            .collect();
        missing.sort_by(|a, b| a.path.cmp(&b.path));
        for object in missing {
            let location = object.files.first().map(ToString::to_string).unwrap_or_default();
            println!("{} {}", object.path.red(), location.dimmed());
        }
    }

    if args.stats {
        let mut counts: Vec<(ObjectType, usize)> = registry.count_by_type().into_iter().collect();
        counts.sort_by_key(|(object_type, _)| object_type.as_str());
        for (object_type, count) in counts {
            println!("{} {}", kind_label(object_type), count);
        }
    }

    if let Some(cache_path) = cache_path {
        RegistrySnapshot::from_registry(&registry)
            .save(&cache_path)
            .with_context(|| format!("{} に保存できません", cache_path.display()))?;
    }

    println!(
        "{} ファイル, {} オブジェクト, {} 回の延期, {} 件の未解決参照, {} 件の記述不能な文",
        report.files,
        report.objects.to_string().green(),
        report.deferrals,
        registry.unresolved_references().len().to_string().yellow(),
        report.undocumentable()
    );
    Ok(())
}

/// show サブコマンドの処理
fn show(args: &ShowArgs, config: ParserConfig) -> Result<()> {
    let cache_path = args.load_cache.clone().or_else(|| config.cache_path.clone());
    let registry = match cache_path {
        Some(cache_path) if args.paths.is_empty() => RegistrySnapshot::load(&cache_path)
            .and_then(RegistrySnapshot::into_registry)
            .with_context(|| format!("{} を読み込めません", cache_path.display()))?,
        _ if !args.paths.is_empty() => build_registry(&args.paths, config)?.0,
        _ => return Err(anyhow!("スナップショットか入力パスを指定してください")),
    };

    let id = match registry.at(&args.object) {
        Some(id) => id,
        None => registry
            .resolve(registry.root(), &args.object, &ResolveOptions::new().inherit(true))
            .and_then(|reference| reference.resolve(&registry))
            .ok_or_else(|| anyhow!("オブジェクト '{}' が見つかりません", args.object))?,
    };
    let object = registry
        .get(id)
        .ok_or_else(|| anyhow!("オブジェクト '{}' が見つかりません", args.object))?;

    println!("{} {}", kind_label(object.object_type()), object.path.bold());
    for location in &object.files {
        println!("  {} {}", "定義:".dimmed(), location);
    }
    if object.object_type() == ObjectType::Method {
        println!("  {} {} ({})", "可視性:".dimmed(), object.visibility, object.scope);
    }
    if let Some(signature) = &object.signature {
        println!("  {} {}", "シグネチャ:".dimmed(), signature);
    }
    if let Some(superclass) = object.superclass() {
        let marker = if superclass.is_resolved(&registry) { "" } else { " (未解決)" };
        println!("  {} {}{}", "スーパークラス:".dimmed(), superclass.path(&registry), marker);
    }
    if let Some(data) = object.namespace_data() {
        for (label, scope) in [("include:", Scope::Instance), ("extend:", Scope::Class)] {
            let mixins: Vec<String> = data.mixins(scope).iter().map(|m| m.path(&registry)).collect();
            if !mixins.is_empty() {
                println!("  {} {}", label.dimmed(), mixins.join(", "));
            }
        }
        let ancestors: Vec<String> = registry
            .resolver()
            .inheritance_tree(id)
            .into_iter()
            .skip(1)
            .filter_map(|ancestor| registry.get(ancestor).map(|o| o.path.clone()))
            .collect();
        if !ancestors.is_empty() {
            println!("  {} {}", "祖先:".dimmed(), ancestors.join(" < "));
        }
    }
    if let Some(value) = object.value() {
        println!("  {} {}", "値:".dimmed(), value);
    }

    if object.docstring.is_blank() {
        println!("\n{}", "(ドキュメントなし)".dimmed());
    } else {
        println!("\n{}", object.docstring);
        for tag in &object.docstring.tags {
            let types = if tag.types.is_empty() {
                String::new()
            } else {
                format!(" [{}]", tag.types.join(", "))
            };
            println!("  @{}{} {}", tag.tag_name.cyan(), types, tag.text);
        }
    }
    Ok(())
}

/// 種類ごとに色付けした表示名
fn kind_label(object_type: ObjectType) -> ColoredString {
    let label = format!("{:<14}", object_type.as_str());
    match object_type {
        ObjectType::Root => label.normal(),
        ObjectType::Module => label.cyan(),
        ObjectType::Class => label.green(),
        ObjectType::Method => label.blue(),
        ObjectType::Constant => label.magenta(),
        ObjectType::ClassVariable => label.yellow(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_cli_parses_parse_command() {
        let cli = Cli::try_parse_from(["rubylight", "parse", "lib", "--list", "--save-cache", "out.json"]).unwrap();
        match cli.command {
            Commands::Parse(args) => {
                assert_eq!(args.paths, vec![PathBuf::from("lib")]);
                assert!(args.list);
                assert_eq!(args.save_cache, Some(PathBuf::from("out.json")));
            }
            Commands::Show(_) => panic!("parse を期待しました"),
        }
    }

    #[test]
    fn test_build_registry_from_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("b.rb"), "class B < A\nend\n").unwrap();
        fs::write(dir.path().join("a.rb"), "class A\nend\n").unwrap();

        let paths = vec![dir.path().to_path_buf()];
        let (registry, report) = build_registry(&paths, ParserConfig::default()).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(
            registry.object_at("B").unwrap().superclass().unwrap().path(&registry),
            "A"
        );
    }

    #[test]
    fn test_missing_config_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(Some(dir.path().join("absent.toml").as_path())).unwrap();
        assert_eq!(config, ParserConfig::default());
    }
}

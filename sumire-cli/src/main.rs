//! Sumire CLI - コマンドラインインターフェース
//!
//! リモートランタイムメタデータインスペクタ sumire のサブコマンド
//! ディスパッチャ

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::sync::OnceLock;
use sumire_core::{locate, BacktraceStyle, CancelToken, DumpKind, Inspector, LocateError};

/// Sumire - Remote Runtime Metadata Inspector
#[derive(Parser)]
#[command(name = "sumire")]
#[command(version = "0.1.0")]
#[command(about = "Runtime metadata debug tool for remote processes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: InspectCommand,

    /// Maximum retries for transient memory read failures
    #[arg(long, global = true, default_value_t = 0)]
    read_retries: u32,
}

/// 全サブコマンド共通の引数
#[derive(Args)]
struct UniversalOptions {
    /// The pid or partial name of the target process
    name_or_pid: String,
}

/// バックトレース表示の選択
#[derive(Args)]
struct BacktraceOptions {
    /// Show the backtrace for each allocation
    #[arg(long)]
    backtrace: bool,

    /// Show a long-form backtrace for each allocation
    #[arg(long)]
    backtrace_long: bool,
}

impl BacktraceOptions {
    fn style(&self) -> Option<BacktraceStyle> {
        if self.backtrace_long {
            return Some(BacktraceStyle::Long);
        }
        if self.backtrace {
            return Some(BacktraceStyle::OneLine);
        }
        None
    }
}

#[derive(Subcommand)]
enum InspectCommand {
    /// Print the contents of the target's protocol conformance cache
    DumpConformanceCache {
        #[command(flatten)]
        options: UniversalOptions,
    },

    /// Print the target's raw metadata allocations
    DumpRawMetadata {
        #[command(flatten)]
        options: UniversalOptions,
    },

    /// Print the target's generic metadata instantiations
    DumpGenericMetadata {
        #[command(flatten)]
        options: UniversalOptions,
    },

    /// Print the target's metadata cache nodes
    DumpCacheNodes {
        #[command(flatten)]
        options: UniversalOptions,
    },

    /// Print the heap allocations of the target
    #[cfg(target_os = "linux")]
    DumpArrays {
        #[command(flatten)]
        options: UniversalOptions,

        #[command(flatten)]
        backtrace: BacktraceOptions,
    },

    /// Print the target's concurrency tasks and actors
    #[cfg(target_os = "linux")]
    DumpConcurrency {
        #[command(flatten)]
        options: UniversalOptions,
    },
}

impl InspectCommand {
    /// サブコマンドをダンプ種別・対象・表示スタイルに分解する
    fn plan(&self) -> (DumpKind, &UniversalOptions, Option<BacktraceStyle>) {
        match self {
            InspectCommand::DumpConformanceCache { options } => {
                (DumpKind::ConformanceCache, options, None)
            }
            InspectCommand::DumpRawMetadata { options } => (DumpKind::RawMetadata, options, None),
            InspectCommand::DumpGenericMetadata { options } => {
                (DumpKind::GenericMetadata, options, None)
            }
            InspectCommand::DumpCacheNodes { options } => (DumpKind::CacheNodes, options, None),
            #[cfg(target_os = "linux")]
            InspectCommand::DumpArrays { options, backtrace } => {
                (DumpKind::Arrays, options, backtrace.style())
            }
            #[cfg(target_os = "linux")]
            InspectCommand::DumpConcurrency { options } => (DumpKind::Concurrency, options, None),
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let (kind, options, style) = cli.command.plan();
    run_dump(&options.name_or_pid, kind, style, cli.read_retries)
}

/// ログ出力を初期化する（SUMIRE_LOGでフィルタ指定）
fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("SUMIRE_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// プロセスを特定してダンプを実行する
fn run_dump(
    pattern: &str,
    kind: DumpKind,
    style: Option<BacktraceStyle>,
    read_retries: u32,
) -> Result<()> {
    let pid = match locate(pattern) {
        Ok(pid) => pid,
        Err(LocateError::NotFound(_)) => {
            // プロセスが見つからないのはエラー終了ではなく情報表示
            println!("No process found matching {}", pattern);
            return Ok(());
        }
        Err(LocateError::Ambiguous {
            pattern,
            candidates,
        }) => {
            println!("Pattern {:?} matches multiple processes:", pattern);
            for candidate in &candidates {
                println!("  {:>7}  {}", candidate.pid, candidate.name);
            }
            println!("Specify a pid to disambiguate");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    tracing::debug!(pid, "target located");

    let mut inspector = Inspector::attach(pid)?;
    inspector.set_read_retries(read_retries);
    install_interrupt_handler(inspector.cancel_token());

    let output = inspector.dump(kind, style)?;
    print!("{}", output);

    // inspectorのdropでターゲットがデタッチ・再開される
    Ok(())
}

static INTERRUPT: OnceLock<CancelToken> = OnceLock::new();

extern "C" fn handle_sigint(_: i32) {
    if let Some(token) = INTERRUPT.get() {
        token.cancel();
    }
}

/// Ctrl-Cでウォークを中断できるようにする
///
/// 中断されたウォークはそれまでの結果を出力し、デタッチはDropで
/// 保証されるため、ターゲットが停止したまま残ることはない。
fn install_interrupt_handler(token: CancelToken) {
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    if INTERRUPT.set(token).is_err() {
        return;
    }

    let action = SigAction::new(
        SigHandler::Handler(handle_sigint),
        SaFlags::empty(),
        SigSet::empty(),
    );
    unsafe {
        let _ = sigaction(Signal::SIGINT, &action);
    }
}

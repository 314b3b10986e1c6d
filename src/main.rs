mod logging;
mod models;
mod scenario;
mod simulation;

use clap::{Arg, Command, parser::ValueSource};
use logging::{LogConfig, LogOutput, init_logging, parse_log_level};
use scenario::*;
use simulation::{SimulationEngine, print_stats};

fn main() {
    // コマンドライン引数の解析
    let matches = Command::new("wandersim")
        .version("0.1.0")
        .about("徘徊エージェントシミュレーション (Wander Simulation)")
        .long_about("扇状レイで障害物を感知し、歩行・走行・旋回を繰り返す\n\
                     徘徊エージェントを固定時間刻みでシミュレーションします。")
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("シナリオファイル(.yaml)のパスを指定（- で標準入力）")
                .conflicts_with("test")
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(clap::ArgAction::SetTrue)
                .help("シナリオの情報のみ表示して終了")
        )
        .arg(
            Arg::new("test")
                .short('t')
                .long("test")
                .action(clap::ArgAction::SetTrue)
                .help("組み込みのデモシナリオを実行")
        )
        .arg(
            Arg::new("realtime")
                .long("realtime")
                .action(clap::ArgAction::SetTrue)
                .help("時間刻みに合わせて実時間で実行")
        )
        .arg(
            Arg::new("draw-rays")
                .long("draw-rays")
                .action(clap::ArgAction::SetTrue)
                .help("毎ティックの扇状レイをtraceログへ出力")
        )
        .arg(
            Arg::new("initial-state")
                .long("initial-state")
                .value_name("INDEX")
                .value_parser(clap::value_parser!(i32))
                .allow_negative_numbers(true)
                .help("開始直後に番号指定で状態を要求 (0:Idle 〜 5:Turning、範囲外は無視)")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(clap::ArgAction::Count)
                .help("詳細出力レベル (-v: 基本, -vv: 詳細, -vvv: デバッグ)")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .default_value("info")
                .help("ログレベル (trace, debug, info, warn, error)")
        )
        .arg(
            Arg::new("log-output")
                .long("log-output")
                .value_name("TARGET")
                .default_value("console")
                .value_parser(clap::builder::ValueParser::new(|s: &str| s.parse::<LogOutput>()))
                .help("ログ出力先 (console, file, both)")
        )
        .get_matches();

    let verbose_level = matches.get_count("verbose");
    // --log-level を明示した場合は -v より優先
    let explicit_level = match matches.value_source("log-level") {
        Some(ValueSource::CommandLine) => matches.get_one::<String>("log-level").map(|s| parse_log_level(s)),
        _ => None,
    };
    let output = matches
        .get_one::<LogOutput>("log-output")
        .copied()
        .unwrap_or(LogOutput::Console);

    let log_config = LogConfig {
        output,
        ..LogConfig::default()
    }
    .with_level_or_verbosity(explicit_level, verbose_level);

    // ガードはmain終了まで保持してファイル出力を維持
    let _log_guard = match init_logging(log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("ログ初期化エラー: {}", e);
            std::process::exit(1);
        }
    };

    println!("徘徊エージェントシミュレーション - wandersim v0.1.0");
    println!();

    let scenario = if matches.get_flag("test") {
        println!("=== 組み込みデモシナリオ ===");
        Ok(ScenarioConfig::built_in())
    } else if let Some(scenario_path) = matches.get_one::<String>("scenario") {
        if scenario_path == "-" {
            ScenarioConfig::from_stdin()
        } else {
            ScenarioConfig::from_file(scenario_path)
        }
    } else {
        show_default_help();
        return;
    };

    let result = scenario
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|scenario| {
            let options = RunOptions {
                info_only: matches.get_flag("info"),
                realtime: matches.get_flag("realtime"),
                draw_rays: matches.get_flag("draw-rays"),
                initial_state: matches.get_one::<i32>("initial-state").copied(),
            };
            run_scenario(scenario, &options, verbose_level)
        });

    if let Err(e) = result {
        eprintln!("エラー: {}", e);
        std::process::exit(1);
    }
}

/// 実行オプション
struct RunOptions {
    info_only: bool,
    realtime: bool,
    draw_rays: bool,
    initial_state: Option<i32>,
}

/// シナリオの実行
fn run_scenario(
    scenario: ScenarioConfig,
    options: &RunOptions,
    verbose_level: u8,
) -> Result<(), Box<dyn std::error::Error>> {
    scenario.print_summary();
    println!();

    // 情報表示のみの場合
    if options.info_only {
        return Ok(());
    }

    let mut simulation = SimulationEngine::new(scenario, verbose_level);
    if options.draw_rays {
        simulation = simulation.with_ray_trace();
    }
    if let Some(raw_state) = options.initial_state {
        simulation = simulation.with_initial_state(raw_state);
    }
    simulation.initialize()?;

    let stats = if options.realtime {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        runtime.block_on(simulation.run_realtime())?
    } else {
        simulation.run()?
    };

    println!();
    print_stats(&stats);

    if verbose_level > 0 {
        println!("シナリオ実行が正常に完了しました。");
    }

    Ok(())
}

/// デフォルトヘルプとシナリオ一覧を表示
fn show_default_help() {
    println!("使用方法:");
    println!("  wandersim [オプション]");
    println!();
    println!("オプション:");
    println!("  -s, --scenario <FILE>     シナリオファイルを指定して実行 (- で標準入力)");
    println!("  -i, --info                シナリオ情報のみ表示");
    println!("  -t, --test                組み込みのデモシナリオを実行");
    println!("      --realtime            実時間で実行");
    println!("      --draw-rays           扇状レイをtraceログへ出力");
    println!("      --initial-state <N>   開始直後に番号指定で状態を要求");
    println!("  -v, --verbose             詳細出力 (複数指定で詳細レベル上昇)");
    println!("      --log-level <LEVEL>   ログレベル");
    println!("      --log-output <TARGET> ログ出力先 (console, file, both)");
    println!("  -h, --help                このヘルプを表示");
    println!();
    println!("利用可能なシナリオファイル:");
    println!("  scenarios/wander_room.yaml     - 柱のある部屋");
    println!("  scenarios/narrow_corridor.yaml - 細い通路（旋回の繰り返し）");
    println!();
    println!("例:");
    println!("  wandersim -s scenarios/wander_room.yaml");
    println!("  wandersim -s scenarios/wander_room.yaml -vv");
    println!("  wandersim -s scenarios/narrow_corridor.yaml -i");
    println!("  wandersim --test --realtime");
    println!("  cat scenarios/wander_room.yaml | wandersim -s -");
}

//! # Logging モジュール
//!
//! 徘徊シミュレーションのログ管理機能を提供します。
//!
//! tracing-appenderによる非同期ファイル出力とコンソール出力を組み合わせ、
//! 出力先とログレベルをコマンドラインから切り替えられるようにします。
//!
//! ## 設定可能な出力先
//!
//! - `Console`: コンソールのみ
//! - `File`: ファイルのみ（logs/wandersim.YYYY-MM-DD、JSON形式）
//! - `Both`: コンソールとファイルの両方

use std::str::FromStr;
use tracing::Level;
use tracing_appender::{
    non_blocking,
    non_blocking::{NonBlocking, WorkerGuard},
    rolling,
};
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// ログ出力先の設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogOutput {
    /// コンソールのみ
    Console,
    /// ファイルのみ
    File,
    /// コンソールとファイルの両方
    Both,
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" | "stdout" => Ok(LogOutput::Console),
            "file" => Ok(LogOutput::File),
            "both" | "all" => Ok(LogOutput::Both),
            _ => Err(format!("無効な出力先: {}. 利用可能: console, file, both", s)),
        }
    }
}

/// ログ設定構造体
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// ログレベル
    pub level: Level,
    /// 出力先
    pub output: LogOutput,
    /// ログファイルのディレクトリ（Fileまたは Bothの場合）
    pub log_dir: String,
    /// ログファイル名のプレフィックス
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            output: LogOutput::Console,
            log_dir: "logs".to_string(),
            file_prefix: "wandersim".to_string(),
        }
    }
}

impl LogConfig {
    /// 明示指定されたログレベルを優先し、無ければ詳細出力レベルから決定
    pub fn with_level_or_verbosity(mut self, explicit_level: Option<Level>, verbose_level: u8) -> Self {
        match explicit_level {
            Some(level) => {
                self.level = level;
                self
            }
            None => self.with_verbosity(verbose_level),
        }
    }

    /// 詳細出力レベル（-v の個数）からログレベルを決定
    pub fn with_verbosity(mut self, verbose_level: u8) -> Self {
        self.level = match verbose_level {
            0 => self.level,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };
        self
    }
}

fn console_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
}

fn file_layer<S>(writer: NonBlocking) -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .json()
}

/// ログシステムを初期化
///
/// ファイル出力を含む場合は非同期書き込みのガードを返します。
/// ガードを破棄するとバッファがフラッシュされ、以後のファイル出力は停止します。
pub fn init_logging(config: LogConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    // 環境変数またはconfigからログレベルを設定
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.to_string()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if config.output == LogOutput::Console {
        Registry::default().with(env_filter).with(console_layer()).try_init()?;
        return Ok(None);
    }

    ensure_log_directory(&config.log_dir)?;
    let file_appender = rolling::daily(&config.log_dir, &config.file_prefix);
    let (non_blocking_appender, guard) = non_blocking(file_appender);

    match config.output {
        LogOutput::File => Registry::default()
            .with(env_filter)
            .with(file_layer(non_blocking_appender))
            .try_init()?,
        _ => Registry::default()
            .with(env_filter)
            .with(console_layer())
            .with(file_layer(non_blocking_appender))
            .try_init()?,
    }

    Ok(Some(guard))
}

/// ログレベルを文字列から解析
///
/// 無効な文字列の場合はINFO
pub fn parse_log_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!("警告: 無効なログレベル '{}'. INFOを使用します", level_str);
            Level::INFO
        }
    }
}

/// ログディレクトリを作成
pub fn ensure_log_directory(log_dir: &str) -> Result<(), std::io::Error> {
    std::fs::create_dir_all(log_dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_output_from_str() {
        assert_eq!(LogOutput::from_str("console"), Ok(LogOutput::Console));
        assert_eq!(LogOutput::from_str("file"), Ok(LogOutput::File));
        assert_eq!(LogOutput::from_str("both"), Ok(LogOutput::Both));
        assert!(LogOutput::from_str("invalid").is_err());
    }

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("debug"), Level::DEBUG);
        assert_eq!(parse_log_level("INFO"), Level::INFO);
        assert_eq!(parse_log_level("invalid"), Level::INFO);
    }

    #[test]
    fn test_verbosity_overrides_level() {
        assert_eq!(LogConfig::default().with_verbosity(0).level, Level::INFO);
        assert_eq!(LogConfig::default().with_verbosity(2).level, Level::DEBUG);
        assert_eq!(LogConfig::default().with_verbosity(5).level, Level::TRACE);
    }

    #[test]
    fn test_explicit_level_wins_over_verbosity() {
        let config = LogConfig::default().with_level_or_verbosity(Some(Level::WARN), 1);
        assert_eq!(config.level, Level::WARN);

        let config = LogConfig::default().with_level_or_verbosity(None, 2);
        assert_eq!(config.level, Level::DEBUG);

        let config = LogConfig::default().with_level_or_verbosity(None, 0);
        assert_eq!(config.level, Level::INFO);
    }
}

use chrono::{DateTime, Local};
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Event, Subscriber};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const DEFAULT_LOG_FILTER: &str = "warn,askgpt=info";
const DEFAULT_LOG_FORMAT: &str = "transcript";
const DEFAULT_LOG_OUTPUT: &str = "file";
const FALLBACK_PROCESS_NAME: &str = "askgpt";

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
type InitResult = Result<(), BoxError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormat {
    Transcript,
    Pretty,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LogOutput {
    Stderr,
    File,
    Both,
}

/// One line per event:
/// `[2024-05-01 09:30:00.123] [info] [repl.rs:24 askgpt::repl] message`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TranscriptFormat;

fn write_entry_prefix(
    writer: &mut impl fmt::Write,
    timestamp: &DateTime<Local>,
    level: &tracing::Level,
    location: Option<(&str, u32, &str)>,
) -> fmt::Result {
    write!(
        writer,
        "[{}] [{}] ",
        timestamp.format("%Y-%m-%d %H:%M:%S%.3f"),
        level.to_string().to_ascii_lowercase()
    )?;
    if let Some((file, line, target)) = location {
        let file_name = Path::new(file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(file);
        write!(writer, "[{}:{} {}] ", file_name, line, target)?;
    }
    Ok(())
}

impl<S, N> FormatEvent<S, N> for TranscriptFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let location = meta
            .file()
            .zip(meta.line())
            .map(|(file, line)| (file, line, meta.target()));

        write_entry_prefix(&mut writer, &Local::now(), meta.level(), location)?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn parse_log_format(raw: Option<&str>) -> LogFormat {
    match raw
        .unwrap_or(DEFAULT_LOG_FORMAT)
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "json" => LogFormat::Json,
        "pretty" => LogFormat::Pretty,
        _ => LogFormat::Transcript,
    }
}

fn parse_log_output(raw: Option<&str>) -> LogOutput {
    match raw
        .unwrap_or(DEFAULT_LOG_OUTPUT)
        .trim()
        .to_ascii_lowercase()
        .as_str()
    {
        "stderr" => LogOutput::Stderr,
        "both" => LogOutput::Both,
        _ => LogOutput::File,
    }
}

fn process_name() -> String {
    env::current_exe()
        .ok()
        .and_then(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_PROCESS_NAME.to_string())
}

fn default_log_file_path(process_name: &str) -> PathBuf {
    PathBuf::from(format!("{process_name}.log"))
}

fn parse_log_file_path(raw: Option<&str>, process_name: &str) -> PathBuf {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| default_log_file_path(process_name))
}

/// A single append-only file, created when missing and never rotated.
fn build_file_appender(path: &Path) -> Result<RollingFileAppender, BoxError> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty())
        .ok_or_else(|| format!("'{}' does not name a file", path.display()))?;

    fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(dir)?;
    Ok(appender)
}

fn env_filter_from_env() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn stderr_writer() -> BoxMakeWriter {
    BoxMakeWriter::new(std::io::stderr)
}

fn init_with_writer(format: LogFormat, env_filter: EnvFilter, writer: BoxMakeWriter) -> InitResult {
    match format {
        LogFormat::Transcript => tracing_subscriber::fmt()
            .event_format(TranscriptFormat)
            .with_env_filter(env_filter)
            .with_writer(writer)
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(writer)
            .try_init(),
    }
}

fn init_file_output(format: LogFormat, file_path: &Path, include_stderr: bool) -> InitResult {
    let fallback_message = if include_stderr {
        "using stderr only"
    } else {
        "using stderr instead"
    };

    match build_file_appender(file_path) {
        Ok(appender) => {
            let writer = if include_stderr {
                BoxMakeWriter::new(std::io::stderr.and(appender))
            } else {
                BoxMakeWriter::new(appender)
            };
            init_with_writer(format, env_filter_from_env(), writer)
        }
        Err(err) => {
            let mode = if include_stderr { "both" } else { "file" };
            eprintln!(
                "askgpt: failed to initialize LOG_OUTPUT={} at '{}': {}; {}",
                mode,
                file_path.display(),
                err,
                fallback_message
            );
            init_with_writer(format, env_filter_from_env(), stderr_writer())
        }
    }
}

/// Installs the process-wide subscriber. Later calls are no-ops.
pub fn init() {
    let format = parse_log_format(env::var("LOG_FORMAT").ok().as_deref());
    let output = parse_log_output(env::var("LOG_OUTPUT").ok().as_deref());
    let file_path =
        parse_log_file_path(env::var("LOG_FILE_PATH").ok().as_deref(), &process_name());

    let init_result = match output {
        LogOutput::Stderr => init_with_writer(format, env_filter_from_env(), stderr_writer()),
        LogOutput::File => init_file_output(format, &file_path, false),
        LogOutput::Both => init_file_output(format, &file_path, true),
    };

    let _ = init_result;
}

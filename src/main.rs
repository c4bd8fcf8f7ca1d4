//! anamnesis - decode one raw AI provider response into the canonical
//! clinical-analysis record and print it as JSON.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use anamnesis::config::{self, DecoderConfig};
use anamnesis::pipeline::decoding::{DecodeError, RawResponse, ResponseNormalizer};

/// Command-line arguments for anamnesis
#[derive(Parser, Debug)]
#[command(name = "anamnesis")]
#[command(about = "Normalize an AI provider response into a canonical clinical analysis")]
#[command(version)]
struct Args {
    /// Raw response file; reads stdin when omitted
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Indent the JSON output
    #[arg(long)]
    pretty: bool,

    /// Print the decode report (source path, shape, repair tier) instead of the bare record
    #[arg(long)]
    report: bool,

    /// Reject inputs larger than this many bytes
    #[arg(long, env = "ANAMNESIS_MAX_INPUT_BYTES", default_value_t = config::DEFAULT_MAX_INPUT_BYTES)]
    max_input_bytes: usize,

    /// Maximum number of envelope layers to peel
    #[arg(long, env = "ANAMNESIS_MAX_UNWRAP_DEPTH", default_value_t = config::DEFAULT_MAX_UNWRAP_DEPTH)]
    max_unwrap_depth: usize,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input exceeds the {max} byte limit")]
    InputTooLarge { max: usize },

    #[error("{0}")]
    Decode(#[from] DecodeError),

    #[error("Output serialization error: {0}")]
    Output(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            Self::Decode(_) => ExitCode::from(1),
            Self::Io(_) | Self::InputTooLarge { .. } | Self::Output(_) => ExitCode::from(2),
        }
    }
}

fn main() -> ExitCode {
    // Logs go to stderr; stdout carries only the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}: {e}", config::APP_NAME);
            e.exit_code()
        }
    }
}

fn run(args: &Args) -> Result<(), CliError> {
    let decoder_config = DecoderConfig {
        max_unwrap_depth: args.max_unwrap_depth,
        max_input_bytes: args.max_input_bytes,
    };
    let bytes = read_input(args.input.as_deref(), &decoder_config)?;

    tracing::info!(
        version = config::APP_VERSION,
        input_len = bytes.len(),
        "Decoding response"
    );

    let normalizer = ResponseNormalizer::new(decoder_config);
    let raw = RawResponse::from_bytes(&bytes);
    let output = if args.report {
        let report = normalizer.decode(raw)?;
        render(&report, args.pretty)?
    } else {
        let analysis = normalizer.normalize(raw)?;
        render(&analysis, args.pretty)?
    };

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{output}")?;
    Ok(())
}

/// Read the whole input, refusing anything above the configured cap. Reads at
/// most one byte past the cap, so oversized inputs are never fully buffered.
fn read_input(path: Option<&Path>, config: &DecoderConfig) -> Result<Vec<u8>, CliError> {
    let limit = (config.max_input_bytes as u64).saturating_add(1);
    let mut bytes = Vec::new();
    match path {
        Some(path) => File::open(path)?.take(limit).read_to_end(&mut bytes)?,
        None => std::io::stdin().lock().take(limit).read_to_end(&mut bytes)?,
    };
    if !config.accepts_len(bytes.len()) {
        return Err(CliError::InputTooLarge {
            max: config.max_input_bytes,
        });
    }
    Ok(bytes)
}

fn render<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args_with_cap(input: &Path, cap: &str) -> Args {
        Args::parse_from([
            "anamnesis",
            "--input",
            input.to_str().unwrap(),
            "--max-input-bytes",
            cap,
        ])
    }

    fn args_for(input: &Path) -> Args {
        args_with_cap(input, "64")
    }

    #[test]
    fn reads_input_file_under_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response.json");
        std::fs::write(&path, r#"{"motivo_consulta": "knee"}"#).unwrap();

        let args = args_for(&path);
        assert_eq!(args.max_input_bytes, 64);
        assert_eq!(args.max_unwrap_depth, config::DEFAULT_MAX_UNWRAP_DEPTH);
        assert!(run(&args).is_ok());
    }

    #[test]
    fn oversized_input_is_rejected_before_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.json");
        std::fs::write(&path, "x".repeat(65)).unwrap();

        let err = run(&args_for(&path)).unwrap_err();
        assert!(matches!(err, CliError::InputTooLarge { max: 64 }));
    }

    #[test]
    fn large_file_is_read_only_up_to_cap() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.json");
        std::fs::write(&path, "x".repeat(10_000)).unwrap();

        let config = DecoderConfig {
            max_input_bytes: 64,
            ..DecoderConfig::default()
        };
        let err = read_input(Some(&path), &config).unwrap_err();
        assert_eq!(err.to_string(), "Input exceeds the 64 byte limit");
    }

    #[test]
    fn maximum_cap_does_not_overflow() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("response.json");
        std::fs::write(&path, r#"{"motivo_consulta": "knee"}"#).unwrap();

        let args = args_with_cap(&path, &usize::MAX.to_string());
        assert_eq!(args.max_input_bytes, usize::MAX);
        assert!(run(&args).is_ok());
    }

    #[test]
    fn upstream_error_maps_to_decode_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("error.json");
        std::fs::write(&path, r#"{"error": "overloaded"}"#).unwrap();

        let err = run(&args_for(&path)).unwrap_err();
        assert!(matches!(err, CliError::Decode(DecodeError::Upstream { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&args_for(&dir.path().join("absent.json"))).unwrap_err();
        assert!(matches!(err, CliError::Io(_)));
    }
}

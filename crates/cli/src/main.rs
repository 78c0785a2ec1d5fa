//! `mints`: strip TypeScript types from one file.

mod paths;

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::Context;
use clap::{ArgAction, Parser};
use mints::{StripConfig, TransformOutput, span::LineIndex, transform};

/// Boolean options toggle: repeating one an even number of times turns it back off.
#[derive(Parser, Debug)]
#[command(name = "mints", version)]
#[command(about = "Strip TypeScript type syntax, leaving runnable JavaScript", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// TypeScript file to read (`.ts` is appended when it has no extension)
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// JavaScript file to write; must not exist yet
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Emit const enums as regular enums instead of inlining them
    #[arg(long = "preserveConstEnums", action = ArgAction::Count)]
    preserve_const_enums: u8,

    /// Keep type-only exports as comments
    #[arg(long = "preserveExports", action = ArgAction::Count)]
    preserve_exports: u8,

    /// Keep ordinary comments
    #[arg(long = "preserveComments", action = ArgAction::Count)]
    preserve_comments: u8,

    /// Keep @ts-ignore and @ts-expect-error comments
    #[arg(long = "preserveTSIgnore", action = ArgAction::Count)]
    preserve_ts_ignore: u8,

    /// Log pipeline details to stderr
    #[arg(long, short, action = ArgAction::Count)]
    verbose: u8,
}

fn toggled(count: u8) -> bool {
    count % 2 == 1
}

impl Cli {
    fn config(&self) -> StripConfig {
        StripConfig {
            preserve_const_enums: toggled(self.preserve_const_enums),
            preserve_exports: toggled(self.preserve_exports),
            preserve_comments: toggled(self.preserve_comments),
            preserve_ts_ignore: toggled(self.preserve_ts_ignore),
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(toggled(cli.verbose));

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let paths = paths::resolve(cli.input.as_deref(), cli.output.as_deref())?;
    let config = cli.config();
    tracing::debug!(?config, input = %paths.input.display(), "starting");

    let source = fs::read_to_string(&paths.input)
        .with_context(|| format!("failed to read {}", paths.input.display()))?;
    let output = transform(&source, &config)
        .with_context(|| format!("failed to transform {}", paths.input.display()))?;

    report(&paths.input, &source, &output);

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&paths.output)
        .with_context(|| format!("failed to create {}", paths.output.display()))?;
    file.write_all(output.code.as_bytes())
        .with_context(|| format!("failed to write {}", paths.output.display()))?;

    tracing::info!(
        output = %paths.output.display(),
        warnings = output.diagnostics.len(),
        "done"
    );
    Ok(())
}

/// Print diagnostics as `path:line:col: warning: message`.
fn report(path: &Path, source: &str, output: &TransformOutput) {
    if output.diagnostics.is_empty() {
        return;
    }
    let index = LineIndex::new(source);
    for diagnostic in &output.diagnostics {
        let (line, col) = index.line_col(diagnostic.span.start);
        eprintln!(
            "{}:{}:{}: warning: {}",
            path.display(),
            line + 1,
            col + 1,
            diagnostic.message
        );
    }
}

/// Log filter comes from `MINTS_LOG`, then `RUST_LOG`, then `--verbose`.
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let default = if verbose {
        "mints=debug,mints_cli=debug"
    } else {
        "mints=warn,mints_cli=warn"
    };
    let filter = EnvFilter::try_from_env("MINTS_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

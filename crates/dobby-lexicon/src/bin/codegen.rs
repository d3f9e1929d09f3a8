use clap::Parser;
use dobby_lexicon::cli::CodegenArgs;
use dobby_lexicon::codegen::CodeGenerator;
use dobby_lexicon::config::{Config, Settings};
use dobby_lexicon::corpus::{LexiconCorpus, expand_all, load_file};
use dobby_lexicon::error::CodegenError;
use miette::IntoDiagnostic;
use std::fs;
use std::io::ErrorKind;
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> miette::Result<()> {
    let args = CodegenArgs::parse();
    init_tracing(args.verbose);

    let config = Config::discover(args.config.as_deref())?;
    let settings = Settings::resolve(&args, config)?;

    let paths = expand_all(&settings.inputs)?;
    tracing::info!(documents = paths.len(), "found lexicon documents");

    if settings.print_ir {
        let mut lexicons = Vec::with_capacity(paths.len());
        for path in &paths {
            match load_file(path) {
                Ok(lexicon) => lexicons.push(lexicon),
                Err(err) if err.is_document_error() => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping malformed lexicon");
                }
                Err(err) => return Err(err.into()),
            }
        }
        let json = serde_json::to_string_pretty(&lexicons).into_diagnostic()?;
        println!("{json}");
        return Ok(());
    }

    if settings.clean {
        match fs::remove_dir_all(&settings.output) {
            Ok(()) => tracing::info!(output = %settings.output.display(), "removed output directory"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(CodegenError::io_at(e, &settings.output).into()),
        }
    }

    let codegen = CodeGenerator::new(settings.runtime_module);
    let report = codegen.write_documents(&paths, &settings.output, settings.jobs)?;

    if settings.check_refs {
        let corpus: LexiconCorpus = report.lexicons.iter().cloned().collect();
        let unresolved = corpus.unresolved_refs();
        for dangling in &unresolved {
            tracing::warn!(from = %dangling.from, reference = %dangling.reference, "unresolved reference");
        }
        tracing::info!(unresolved = unresolved.len(), "checked references");
    }

    if !report.malformed.is_empty() {
        for (path, err) in &report.malformed {
            tracing::warn!(path = %path.display(), error = %err, "malformed lexicon was skipped");
        }
        tracing::warn!(skipped = report.malformed.len(), "some documents were not generated");
    }

    tracing::info!(
        files = report.written.len(),
        lexicons = report.lexicons.len(),
        empty = report.empty.len(),
        output = %settings.output.display(),
        "generation complete"
    );
    Ok(())
}

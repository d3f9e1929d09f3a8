use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate Elixir code from Lexicon schemas")]
pub struct CodegenArgs {
    /// Lexicon files, directories or glob patterns
    #[arg(value_name = "INPUT")]
    pub inputs: Vec<String>,

    /// Output directory for generated Elixir code [default: lib/lexicons]
    #[arg(short = 'o', long)]
    pub output: Option<PathBuf>,

    /// Delete the output directory before generating
    #[arg(short = 'd', long)]
    pub clean: bool,

    /// Number of documents processed in parallel
    #[arg(short = 'j', long)]
    pub jobs: Option<usize>,

    /// Module prefix for the shared TID and XRPC support modules [default: Lexicon]
    #[arg(long)]
    pub runtime_module: Option<String>,

    /// Warn about references to definitions missing from the inputs
    #[arg(long)]
    pub check_refs: bool,

    /// Print the compiled lexicons as JSON instead of writing files
    #[arg(long)]
    pub print_ir: bool,

    /// Verbose output, repeat for more
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to KDL config file [default: dobby.kdl, if present]
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,
}

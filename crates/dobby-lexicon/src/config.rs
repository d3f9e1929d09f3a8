use crate::cli::CodegenArgs;
use crate::error::{CodegenError, Result};
use kdl::{KdlDocument, KdlNode, KdlValue};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "dobby.kdl";
/// Output directory used when neither the CLI nor the config names one
pub const DEFAULT_OUTPUT_DIR: &str = "lib/lexicons";

/// Contents of a `dobby.kdl` file
///
/// ```kdl
/// output "lib/lexicons"
/// runtime-module "Lexicon"
/// clean #false
/// jobs 4
/// check-refs #true
/// input "lexicons/**/*.json"
/// input "vendor/lexicons"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    pub output: Option<PathBuf>,
    pub runtime_module: Option<String>,
    pub clean: Option<bool>,
    pub jobs: Option<usize>,
    pub check_refs: Option<bool>,
    pub inputs: Vec<String>,
}

impl Config {
    pub fn from_kdl(text: &str) -> Result<Self> {
        parse(text, None)
    }

    /// Read and parse a config file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| CodegenError::io_at(e, path))?;
        parse(&text, Some(path))
    }

    /// Load the explicitly named config, or `dobby.kdl` if it exists
    pub fn discover(explicit: Option<&Path>) -> Result<Option<Self>> {
        match explicit {
            Some(path) => Self::load(path).map(Some),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.is_file() {
                    Self::load(default).map(Some)
                } else {
                    Ok(None)
                }
            }
        }
    }
}

fn parse(text: &str, path: Option<&Path>) -> Result<Config> {
    let doc = text
        .parse::<KdlDocument>()
        .map_err(|e| CodegenError::config(format!("failed to parse KDL: {e}"), path))?;

    let mut config = Config::default();
    for node in doc.nodes() {
        let name = node.name().value();
        let value = single_value(node, path)?;
        match name {
            "output" => {
                let dir = expect_string(name, value, path)?;
                set_once(&mut config.output, PathBuf::from(dir), name, path)?;
            }
            "runtime-module" => {
                let module = expect_string(name, value, path)?;
                set_once(&mut config.runtime_module, module.to_string(), name, path)?;
            }
            "clean" => {
                let clean = expect_bool(name, value, path)?;
                set_once(&mut config.clean, clean, name, path)?;
            }
            "jobs" => {
                let jobs = value
                    .as_integer()
                    .and_then(|i| usize::try_from(i).ok())
                    .filter(|jobs| *jobs > 0)
                    .ok_or_else(|| {
                        CodegenError::config("jobs expects a positive integer", path)
                    })?;
                set_once(&mut config.jobs, jobs, name, path)?;
            }
            "check-refs" => {
                let check = expect_bool(name, value, path)?;
                set_once(&mut config.check_refs, check, name, path)?;
            }
            "input" => {
                config.inputs.push(expect_string(name, value, path)?.to_string());
            }
            other => {
                return Err(CodegenError::config(
                    format!("unknown config node: {other}"),
                    path,
                ));
            }
        }
    }
    Ok(config)
}

fn single_value<'a>(node: &'a KdlNode, path: Option<&Path>) -> Result<&'a KdlValue> {
    let name = node.name().value();
    if node.children().is_some() {
        return Err(CodegenError::config(
            format!("{name} does not take a block"),
            path,
        ));
    }
    match node.entries() {
        [entry] if entry.name().is_none() => Ok(entry.value()),
        _ => Err(CodegenError::config(
            format!("{name} expects exactly one value"),
            path,
        )),
    }
}

fn expect_string<'a>(name: &str, value: &'a KdlValue, path: Option<&Path>) -> Result<&'a str> {
    value
        .as_string()
        .ok_or_else(|| CodegenError::config(format!("{name} expects a string value"), path))
}

fn expect_bool(name: &str, value: &KdlValue, path: Option<&Path>) -> Result<bool> {
    value
        .as_bool()
        .ok_or_else(|| CodegenError::config(format!("{name} expects #true or #false"), path))
}

fn set_once<T>(slot: &mut Option<T>, value: T, name: &str, path: Option<&Path>) -> Result<()> {
    if slot.is_some() {
        return Err(CodegenError::config(format!("{name} set more than once"), path));
    }
    *slot = Some(value);
    Ok(())
}

/// Effective settings for a run: CLI arguments over config file over defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub inputs: Vec<String>,
    pub output: PathBuf,
    pub clean: bool,
    pub jobs: usize,
    pub runtime_module: String,
    pub check_refs: bool,
    pub print_ir: bool,
}

impl Settings {
    pub fn resolve(args: &CodegenArgs, config: Option<Config>) -> Result<Self> {
        let config = config.unwrap_or_default();
        let inputs = if args.inputs.is_empty() {
            config.inputs
        } else {
            args.inputs.clone()
        };
        if inputs.is_empty() {
            return Err(CodegenError::config(
                "no inputs given on the command line or in the config",
                args.config.as_deref(),
            ));
        }
        Ok(Self {
            inputs,
            output: args
                .output
                .clone()
                .or(config.output)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            clean: args.clean || config.clean.unwrap_or(false),
            jobs: args.jobs.or(config.jobs).unwrap_or_else(default_jobs).max(1),
            runtime_module: args
                .runtime_module
                .clone()
                .or(config.runtime_module)
                .unwrap_or_else(|| crate::codegen::DEFAULT_RUNTIME_MODULE.to_string()),
            check_refs: args.check_refs || config.check_refs.unwrap_or(false),
            print_ir: args.print_ir,
        })
    }
}

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

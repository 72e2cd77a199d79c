use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use phillip::{BuildConfig, TypeContext, TypeSystem, init_logging};
use serde_json::json;

#[derive(Parser, Debug)]
#[command(name = "phillip")]
#[command(about = "Inspect how native, array-library and FFI types line up on this host", long_about = None)]
struct Args {
    /// TOML build configuration (needs the `toml-config` feature)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Header included by the probe program, for user-defined types
    #[arg(long = "header", value_name = "HEADER", global = true)]
    headers: Vec<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Probe native types with the host toolchain and print their metadata
    Probe {
        /// Native type names; defaults to the built-in catalog
        #[arg(value_name = "TYPE")]
        types: Vec<String>,
    },

    /// Print the map from every registered type into one type system
    Typemap {
        /// Target system: native, arraylib or ffi
        #[arg(short, long, value_name = "SYSTEM")]
        target: TypeSystem,
    },
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => BuildConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?
            .merge_with_env(),
        None => BuildConfig::from_env(),
    };

    let mut ctx = TypeContext::new(config).context("creating type context")?;
    for header in &args.headers {
        ctx.add_probe_header(header.clone());
    }

    let output = match args.command {
        Command::Probe { types } => {
            ctx.ensure_native(&types).context("probing native types")?;
            let names = if types.is_empty() {
                ctx.registry()
                    .iter_system(TypeSystem::Native)
                    .map(|(descriptor, _)| descriptor.name.clone())
                    .collect()
            } else {
                types
            };

            let mut records = Vec::with_capacity(names.len());
            for name in &names {
                let info = ctx.native_info(name)?;
                records.push(json!({
                    "name": name,
                    "signage": info.signage,
                    "numeric_kind": info.numeric_kind,
                    "size_bytes": info.size_bytes,
                }));
            }
            serde_json::Value::Array(records)
        }
        Command::Typemap { target } => {
            let map = ctx
                .type_map(target)
                .with_context(|| format!("building the {target} type map"))?;
            serde_json::to_value(map.as_ref())?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

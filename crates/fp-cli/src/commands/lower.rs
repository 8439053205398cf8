//! `lower`: destructor lowering for a declaration file

use crate::config::CliConfig;
use crate::diagnostics::emit_lowering_notes;
use crate::{CliError, Result};
use clap::Args;
use fp_core::decl::DeclTable;
use fp_core::mir::Module;
use fp_core::pretty::pretty;
use fp_deinit::{DeinitLowering, DestructorKind};
use std::path::PathBuf;
use tracing::{debug, info};

/// Arguments for the lower command
#[derive(Debug, Clone, Args)]
pub struct LowerArgs {
    /// JSON array of nominal type declarations
    pub input: PathBuf,
    /// Only lower destructors of this type
    #[arg(long = "type", value_name = "NAME")]
    pub ty: Option<String>,
    /// Only lower this destructor kind (requires --type)
    #[arg(long, value_name = "KIND", requires = "ty")]
    pub kind: Option<String>,
    /// Write the result here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Emit the lowered module as JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Lowers the requested destructors and renders them.
pub fn lower_module(args: &LowerArgs, config: &CliConfig) -> Result<Module> {
    let source = std::fs::read_to_string(&args.input)?;
    let table = DeclTable::from_json(&source)?;
    debug!(types = table.len(), input = %args.input.display(), "loaded declarations");

    let mut lowering = DeinitLowering::new(config.lowering.clone());
    let module = match (&args.ty, &args.kind) {
        (Some(ty), Some(kind)) => {
            let kind = DestructorKind::from_name(kind)
                .ok_or_else(|| CliError::InvalidInput(format!("unknown destructor kind `{kind}`")))?;
            let mut module = Module::new();
            module.insert(lowering.lower(&table, ty, kind)?);
            module
        }
        (Some(ty), None) => {
            let decl = table.lookup(&ty.as_str().into())?;
            lowering.lower_type_destructors(&table, decl)?
        }
        (None, _) => lowering.lower_table(&table)?,
    };
    emit_lowering_notes(&lowering.take_diagnostics());
    Ok(module)
}

pub fn render_module(module: &Module, args: &LowerArgs, config: &CliConfig) -> Result<String> {
    if args.json {
        let functions: Vec<_> = module.functions.values().collect();
        return serde_json::to_string_pretty(&functions)
            .map_err(|e| CliError::InvalidInput(format!("failed to serialize module: {e}")));
    }
    Ok(pretty(module, config.pretty_options()).to_string())
}

/// Execute the lower command
pub fn lower_command(args: LowerArgs, config: &CliConfig) -> Result<()> {
    let module = lower_module(&args, config)?;
    let rendered = render_module(&module, &args, config)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            info!(functions = module.len(), output = %path.display(), "wrote lowered destructors");
        }
        None => println!("{rendered}"),
    }
    Ok(())
}

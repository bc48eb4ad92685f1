//! # CLI Layer
//!
//! One possible client of the registry. This is the only place that knows
//! about the terminal: it parses arguments, opens the document file, calls
//! [`VarsApi`], prints the results and turns errors into exit codes.
//!
//! - `run()`: dispatch (called by `main.rs`)
//! - `init_context()`: config, logging and the opened document
//! - `handle_*()`: one per subcommand

use super::logging;
use super::print::{print_messages, print_var_detail, print_vars};
use crate::args::{Cli, Commands};
use clap::Parser;
use colored::Colorize;
use directories::ProjectDirs;
use docvars::api::{CmdMessage, VarsApi};
use docvars::commands::NewVar;
use docvars::config::VarsConfig;
use docvars::convert;
use docvars::error::{Result, VarsError};
use docvars::model::{TypeTag, Value};
use docvars::ordering::Delta;
use docvars::store::document::{HostDocument, ReferenceEngine};
use docvars::store::fs_backend::FsBackend;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const CONFIG_DIR_ENV: &str = "DOCVARS_CONFIG_DIR";

struct AppContext {
    api: VarsApi<HostDocument<FsBackend>>,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let mut ctx = init_context(&cli)?;

    match cli.command {
        Some(Commands::List { group }) => handle_list(&ctx, group),
        Some(Commands::Groups) => handle_groups(&ctx),
        Some(Commands::Create {
            name,
            var_type,
            value,
            options,
            description,
            expression,
            group,
        }) => {
            let new = NewVar {
                name,
                var_type,
                value: None,
                options: (!options.is_empty()).then_some(options),
                description,
                expression,
                group,
            };
            handle_create(&mut ctx, new, value)
        }
        Some(Commands::Get { name }) => handle_get(&ctx, &name),
        Some(Commands::Set { name, value }) => handle_set(&mut ctx, &name, &value),
        Some(Commands::Describe { name, description }) => {
            handle_describe(&mut ctx, &name, &description)
        }
        Some(Commands::Rename {
            old,
            new,
            description,
        }) => handle_rename(&mut ctx, &old, &new, description.as_deref()),
        Some(Commands::Delete { name }) => handle_delete(&mut ctx, &name),
        Some(Commands::Retype {
            name,
            var_type,
            options,
        }) => handle_retype(&mut ctx, &name, var_type, options),
        Some(Commands::Regroup { name, group }) => handle_regroup(&mut ctx, &name, &group),
        Some(Commands::Expr { name, expression }) => {
            handle_expr(&mut ctx, &name, expression.as_deref())
        }
        Some(Commands::Flag {
            name,
            read_only,
            hidden,
        }) => handle_flag(&mut ctx, &name, read_only, hidden),
        Some(Commands::Move { name, delta }) => handle_move(&mut ctx, &name, delta),
        Some(Commands::MoveGroup { group, delta }) => handle_move_group(&mut ctx, &group, delta),
        Some(Commands::Deps { name }) => handle_deps(&ctx, &name),
        Some(Commands::Export { path }) => handle_export(&ctx, &path),
        Some(Commands::Import { path }) => handle_import(&mut ctx, &path),
        Some(Commands::Doctor) => handle_doctor(&mut ctx),
        None => handle_list(&ctx, None),
    }
}

fn config_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        return PathBuf::from(dir);
    }
    ProjectDirs::from("org", "docvars", "docvars")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".docvars"))
}

fn init_context(cli: &Cli) -> Result<AppContext> {
    let config_dir = config_dir();
    let (config, config_error) = match VarsConfig::load(&config_dir) {
        Ok(config) => (config, None),
        Err(err) => (VarsConfig::default(), Some(err)),
    };
    logging::init(&config.log_level, cli.verbose);
    if let Some(err) = config_error {
        warn!(config_dir = %config_dir.display(), %err, "unreadable config, using defaults");
    }
    debug!(config_dir = %config_dir.display(), doc = %cli.doc.display(), "starting");

    let document = HostDocument::open(FsBackend::new(&cli.doc))?.with_engine(ReferenceEngine);
    let api = VarsApi::open_with_config(document, config)?;
    Ok(AppContext { api })
}

/// Turn command-line text into a value of `var_type`.
///
/// Scalars go in as text and are cast by the registry. Lists take either a
/// JSON array or a comma-separated list.
fn parse_input(name: &str, text: &str, var_type: TypeTag) -> Result<Value> {
    if !var_type.is_list() {
        return Ok(Value::String(text.to_string()));
    }
    let json = match serde_json::from_str::<serde_json::Value>(text) {
        Ok(array @ serde_json::Value::Array(_)) => array,
        _ => serde_json::Value::Array(
            text.split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| serde_json::Value::String(item.to_string()))
                .collect(),
        ),
    };
    convert::from_json(var_type, &json, None).map_err(|reason| {
        debug!(%reason, "list input rejected");
        VarsError::InvalidValue {
            name: name.to_string(),
            var_type,
            value: text.to_string(),
        }
    })
}

fn handle_list(ctx: &AppContext, group: Option<String>) -> Result<()> {
    let records = match group {
        Some(group) => ctx.api.list_group(&group)?,
        None => ctx.api.list_all()?,
    };
    print_vars(&records);
    Ok(())
}

fn handle_groups(ctx: &AppContext) -> Result<()> {
    for group in ctx.api.list_groups()? {
        println!("{}", group);
    }
    Ok(())
}

fn handle_create(ctx: &mut AppContext, mut new: NewVar, value: Option<String>) -> Result<()> {
    if let Some(text) = value {
        let var_type = new.var_type.unwrap_or(ctx.api.config().default_type);
        new.value = Some(parse_input(&new.name, &text, var_type)?);
    }
    let name = new.name.clone();
    if !ctx.api.create(new)? {
        return Err(VarsError::DuplicateName(name));
    }
    let record = ctx.api.get(&name)?;
    print_messages(&[CmdMessage::success(format!(
        "Created {} variable '{}' in group '{}'",
        record.var_type, record.name, record.group
    ))]);
    Ok(())
}

fn handle_get(ctx: &AppContext, name: &str) -> Result<()> {
    print_var_detail(&ctx.api.get(name)?);
    Ok(())
}

fn handle_set(ctx: &mut AppContext, name: &str, text: &str) -> Result<()> {
    let var_type = ctx.api.var_type(name)?;
    let value = parse_input(name, text, var_type)?;
    ctx.api.set_value(name, value)?;
    print_messages(&[CmdMessage::success(format!(
        "{} = {}",
        name,
        ctx.api.value(name)?
    ))]);
    Ok(())
}

fn handle_describe(ctx: &mut AppContext, name: &str, description: &str) -> Result<()> {
    ctx.api.set_description(name, description)?;
    print_messages(&[CmdMessage::success(format!("Description of '{}' updated", name))]);
    Ok(())
}

fn handle_rename(
    ctx: &mut AppContext,
    old: &str,
    new: &str,
    description: Option<&str>,
) -> Result<()> {
    if !ctx.api.rename(old, new, description)? {
        return Err(VarsError::DuplicateName(new.to_string()));
    }
    print_messages(&[CmdMessage::success(format!("Renamed '{}' to '{}'", old, new))]);
    Ok(())
}

fn handle_delete(ctx: &mut AppContext, name: &str) -> Result<()> {
    if !ctx.api.delete(name)? {
        return Err(VarsError::NotFound(name.to_string()));
    }
    print_messages(&[CmdMessage::success(format!("Deleted '{}'", name))]);
    Ok(())
}

fn handle_retype(
    ctx: &mut AppContext,
    name: &str,
    var_type: TypeTag,
    options: Vec<String>,
) -> Result<()> {
    let options = (!options.is_empty()).then_some(options);
    let message = if ctx.api.set_type(name, var_type, options, None)? {
        CmdMessage::success(format!(
            "'{}' is now {} = {}",
            name,
            var_type,
            ctx.api.value(name)?
        ))
    } else {
        CmdMessage::info(format!("'{}' is already {}", name, var_type))
    };
    print_messages(&[message]);
    Ok(())
}

fn handle_regroup(ctx: &mut AppContext, name: &str, group: &str) -> Result<()> {
    let message = if ctx.api.set_group(name, group)? {
        CmdMessage::success(format!("Moved '{}' to '{}'", name, ctx.api.group(name)?))
    } else {
        CmdMessage::info(format!("'{}' is already in '{}'", name, ctx.api.group(name)?))
    };
    print_messages(&[message]);
    Ok(())
}

fn handle_expr(ctx: &mut AppContext, name: &str, expression: Option<&str>) -> Result<()> {
    match expression {
        None => match ctx.api.expression(name)? {
            Some(expr) => println!("{}", expr),
            None => println!("{}", "(no expression)".dimmed()),
        },
        Some(expr) => {
            ctx.api.set_expression(name, Some(expr))?;
            let message = match ctx.api.expression(name)? {
                Some(expr) => format!("{} = {} ({})", name, expr, ctx.api.value(name)?),
                None => format!("Expression of '{}' cleared", name),
            };
            print_messages(&[CmdMessage::success(message)]);
        }
    }
    Ok(())
}

fn handle_flag(
    ctx: &mut AppContext,
    name: &str,
    read_only: Option<bool>,
    hidden: Option<bool>,
) -> Result<()> {
    if let Some(on) = read_only {
        ctx.api.set_read_only(name, on)?;
    }
    if let Some(on) = hidden {
        ctx.api.set_hidden(name, on)?;
    }
    let record = ctx.api.get(name)?;
    print_messages(&[CmdMessage::info(format!(
        "'{}': read-only {}, hidden {}",
        record.name, record.read_only, record.hidden
    ))]);
    Ok(())
}

fn handle_move(ctx: &mut AppContext, name: &str, delta: Delta) -> Result<()> {
    let message = if ctx.api.reorder_variable(name, delta)? {
        CmdMessage::success(format!("Moved '{}' {}", name, delta))
    } else {
        CmdMessage::info(format!("'{}' did not move", name))
    };
    print_messages(&[message]);
    Ok(())
}

fn handle_move_group(ctx: &mut AppContext, group: &str, delta: Delta) -> Result<()> {
    let message = if ctx.api.reorder_group(group, delta)? {
        CmdMessage::success(format!("Moved group '{}' {}", group, delta))
    } else {
        CmdMessage::info(format!("Group '{}' did not move", group))
    };
    print_messages(&[message]);
    Ok(())
}

fn handle_deps(ctx: &AppContext, name: &str) -> Result<()> {
    let uses = ctx.api.dependencies(name)?;
    let used_by = ctx.api.references(name)?;
    println!("{} {}", "uses:".bold(), uses.join(", "));
    println!("{} {}", "used by:".bold(), used_by.join(", "));
    Ok(())
}

fn handle_export(ctx: &AppContext, path: &Path) -> Result<()> {
    let result = ctx.api.export_to_path(path)?;
    print_messages(&result.messages);
    Ok(())
}

fn handle_import(ctx: &mut AppContext, path: &Path) -> Result<()> {
    let result = ctx.api.import_from_path(path)?;
    print_messages(&result.messages);
    Ok(())
}

fn handle_doctor(ctx: &mut AppContext) -> Result<()> {
    let result = ctx.api.doctor()?;
    print_messages(&result.messages);
    Ok(())
}

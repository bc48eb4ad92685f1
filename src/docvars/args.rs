use clap::{Parser, Subcommand};
use docvars::model::TypeTag;
use docvars::ordering::Delta;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docvars")]
#[command(about = "Manage named, typed variables stored in a document", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Document file to operate on
    #[arg(long, global = true, env = "DOCVARS_DOC", default_value = "variables.json")]
    pub doc: PathBuf,

    /// Verbose output (debug logging on stderr)
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List variables, group by group
    #[command(alias = "ls")]
    List {
        /// Only show this group
        #[arg(short, long)]
        group: Option<String>,
    },

    /// List group names
    Groups,

    /// Create a new variable
    #[command(alias = "n")]
    Create {
        name: String,

        /// Variable type (e.g. Length, Integer, StringList); defaults to the configured type
        var_type: Option<TypeTag>,

        /// Initial value
        #[arg(short = 'V', long, allow_hyphen_values = true)]
        value: Option<String>,

        /// Enumeration option (repeat for each option)
        #[arg(short, long = "option")]
        options: Vec<String>,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Expression driving the value
        #[arg(short, long)]
        expression: Option<String>,

        #[arg(short, long)]
        group: Option<String>,
    },

    /// Show one variable
    Get { name: String },

    /// Assign a value
    Set {
        name: String,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Change a description
    Describe { name: String, description: String },

    /// Rename a variable
    #[command(alias = "mv")]
    Rename {
        old: String,
        new: String,

        /// Replace the description at the same time
        #[arg(short, long)]
        description: Option<String>,
    },

    /// Delete a variable
    #[command(alias = "rm")]
    Delete { name: String },

    /// Change a variable's type, converting its value
    Retype {
        name: String,
        var_type: TypeTag,

        /// Enumeration option (repeat for each option)
        #[arg(short, long = "option")]
        options: Vec<String>,
    },

    /// Move a variable to another group
    Regroup { name: String, group: String },

    /// Show, set or clear (with an empty string) the expression
    Expr {
        name: String,
        expression: Option<String>,
    },

    /// Toggle read-only and hidden flags
    Flag {
        name: String,

        #[arg(long)]
        read_only: Option<bool>,

        #[arg(long)]
        hidden: Option<bool>,
    },

    /// Move a variable within its group (integer, first or last)
    Move {
        name: String,
        #[arg(allow_hyphen_values = true)]
        delta: Delta,
    },

    /// Move a group among groups (integer, first or last)
    MoveGroup {
        group: String,
        #[arg(allow_hyphen_values = true)]
        delta: Delta,
    },

    /// Show what a variable's expression depends on, and what depends on it
    Deps { name: String },

    /// Export all variables to a JSON file
    Export { path: PathBuf },

    /// Import variables from a JSON file
    Import { path: PathBuf },

    /// Check and repair ordering keys
    Doctor,
}

use colored::Colorize;
use docvars::api::{CmdMessage, MessageLevel};
use docvars::model::VarRecord;

pub(super) fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
        }
    }
}

/// Variables under one header per group. `records` must already be in
/// display order.
pub(super) fn print_vars(records: &[VarRecord]) {
    if records.is_empty() {
        println!("No variables found.");
        return;
    }

    let name_width = records.iter().map(|r| r.name.len()).max().unwrap_or(0);
    let mut current_group: Option<&str> = None;
    for record in records {
        if current_group != Some(record.group.as_str()) {
            if current_group.is_some() {
                println!();
            }
            println!("{}", record.group.bold());
            current_group = Some(record.group.as_str());
        }
        println!("  {}", format_row(record, name_width));
    }
}

fn format_row(record: &VarRecord, name_width: usize) -> String {
    let mut line = format!(
        "{:<width$}  {}  {}",
        record.name,
        record.value,
        record.var_type.to_string().dimmed(),
        width = name_width
    );
    if let Some(expr) = &record.expression {
        line.push_str(&format!("  {}", format!("= {}", expr).cyan()));
    }
    let flags = flag_labels(record);
    if !flags.is_empty() {
        line.push_str(&format!("  [{}]", flags.join(", ")));
    }
    line
}

fn flag_labels(record: &VarRecord) -> Vec<&'static str> {
    let mut flags = Vec::new();
    if record.read_only {
        flags.push("read-only");
    }
    if record.hidden {
        flags.push("hidden");
    }
    flags
}

pub(super) fn print_var_detail(record: &VarRecord) {
    println!("{}", record.name.bold());
    println!("  type:        {}", record.var_type);
    println!("  value:       {}", record.value);
    println!("  group:       {}", record.group);
    if !record.description.is_empty() {
        println!("  description: {}", record.description);
    }
    if let Some(options) = &record.options {
        println!("  options:     {}", options.join(", "));
    }
    if let Some(expr) = &record.expression {
        println!("  expression:  {}", expr);
    }
    let flags = flag_labels(record);
    if !flags.is_empty() {
        println!("  flags:       {}", flags.join(", "));
    }
    println!(
        "  {}",
        format!("id {} / row {} / group {}", record.internal_id, record.row_key, record.group_key)
            .dimmed()
    );
}

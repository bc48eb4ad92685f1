use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::ordering;
use crate::store::DocumentStore;

pub fn run<S: DocumentStore>(store: &mut S) -> Result<CmdResult> {
    let report = ordering::repair(store)?;
    let mut result = CmdResult::default();

    if report.is_clean() {
        result.add_message(CmdMessage::success("No inconsistencies found."));
        return Ok(result.with_report(report));
    }

    result.add_message(CmdMessage::warning("Inconsistencies found and fixed:"));
    let lines = [
        (report.retitled_groups, "group name(s) normalized"),
        (report.filled_group_keys, "missing group key(s) assigned"),
        (report.reconciled_group_keys, "conflicting group key(s) reconciled"),
        (report.renumbered_groups, "group key(s) renumbered"),
        (report.filled_row_keys, "missing row key(s) assigned"),
        (report.renumbered_rows, "row key(s) renumbered"),
    ];
    for (count, what) in lines {
        if count > 0 {
            result.add_message(CmdMessage::info(format!("  - {} {}.", count, what)));
        }
    }

    Ok(result.with_report(report))
}

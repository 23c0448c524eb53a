use chrono::NaiveDate;
use std::fmt::Write;

use crate::db::INVOICE_DDL;
use crate::identity::User;
use crate::memory::TextMemory;
use crate::tools::memory_tools::{SAVE_QUESTION_TOOL_ARGS, SEARCH_SAVED_CORRECT_TOOL_USES};
use crate::tools::run_sql::RUN_SQL;
use crate::tools::visualize::VISUALIZE_DATA;

/// Inputs that vary per request.
pub struct PromptInputs<'a> {
    pub user: &'a User,
    pub today: NaiveDate,
    pub tool_names: &'a [String],
    pub notes: &'a [TextMemory],
    pub include_schema: bool,
}

pub fn build_system_prompt(inputs: &PromptInputs<'_>) -> String {
    let has = |name: &str| inputs.tool_names.iter().any(|t| t == name);
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are an analytics assistant for an invoice database (PostgreSQL). Today is {}.",
        inputs.today.format("%Y-%m-%d")
    );
    let _ = writeln!(
        prompt,
        "You are helping {} (groups: {}).",
        inputs.user.email,
        inputs.user.group_memberships.join(", ")
    );

    prompt.push_str("\nGuidelines:\n");
    if has(SEARCH_SAVED_CORRECT_TOOL_USES) {
        let _ = writeln!(
            prompt,
            "- Before writing new SQL, call {SEARCH_SAVED_CORRECT_TOOL_USES} to reuse queries that answered similar questions."
        );
    }
    if has(RUN_SQL) {
        let _ = writeln!(
            prompt,
            "- Answer data questions by calling {RUN_SQL}. Table and column names are mixed case and must be double-quoted."
        );
    }
    if has(VISUALIZE_DATA) {
        let _ = writeln!(
            prompt,
            "- When a chart helps, call {VISUALIZE_DATA} with the result_id returned by {RUN_SQL}."
        );
    }
    if has(SAVE_QUESTION_TOOL_ARGS) {
        let _ = writeln!(
            prompt,
            "- After a query answers the question correctly, call {SAVE_QUESTION_TOOL_ARGS} with the question, the tool name and its arguments."
        );
    }
    prompt.push_str("- Summarize results in plain language and never invent numbers.\n");

    if !inputs.notes.is_empty() {
        prompt.push_str("\nNotes saved from earlier conversations:\n");
        for note in inputs.notes {
            let _ = writeln!(prompt, "- {}", note.content);
        }
    }

    if inputs.include_schema {
        prompt.push_str("\nDatabase schema:\n");
        prompt.push_str(INVOICE_DDL.trim());
        prompt.push('\n');
    }

    prompt
}

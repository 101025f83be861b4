//! Display utilities for CLI output formatting
//!
//! Provides formatted output for conversation items, tool calls, and tool results

use colored::Colorize;
use switchback::{ConversationItem, CoreEvent, ToolCall, Usage};

const MAX_RESULT_CHARS: usize = 200;

/// Shortens long tool output to its first `MAX_RESULT_CHARS` characters.
fn truncate(text: &str) -> String {
    let total = text.chars().count();
    if total <= MAX_RESULT_CHARS {
        return text.to_string();
    }
    let end = text
        .char_indices()
        .nth(MAX_RESULT_CHARS)
        .map_or(text.len(), |(idx, _)| idx);
    format!("{}... ({total} chars)", &text[..end])
}

/// Display a tool call being requested by the assistant
pub fn display_tool_call(call: &ToolCall) {
    println!("{} {}", "⚙".bright_yellow(), call.name.bright_yellow().bold());

    if let Ok(args) = serde_json::from_str::<serde_json::Value>(&call.arguments)
        && let Some(obj) = args.as_object()
    {
        for (key, value) in obj {
            println!("  {} {}", format!("{key}:").dimmed(), value);
        }
    }
}

/// Display tool execution result
pub fn display_tool_result(name: &str, output: &str, success: bool) {
    let label = if success {
        format!("✓ {name}").bright_green()
    } else {
        format!("✗ {name}").bright_red()
    };
    println!("{label}");
    println!("  {}", truncate(output));
}

pub fn display_assistant(text: &str) {
    println!("{} {text}", "●".bright_magenta());
}

pub fn display_usage(usage: &Usage) {
    println!(
        "{} {} tokens (in: {}, out: {})",
        "○".bright_blue(),
        usage.total_tokens,
        usage.input_tokens,
        usage.output_tokens
    );
}

pub fn display_error(message: impl std::fmt::Display) {
    eprintln!("{} {message}", "Error:".bright_red());
}

/// Renders orchestrator progress as it happens.
pub fn display_event(event: &CoreEvent) {
    match event {
        CoreEvent::ToolCallRequested(call) => display_tool_call(call),
        CoreEvent::ToolResult {
            name,
            output,
            success,
            ..
        } => display_tool_result(name, output, *success),
        CoreEvent::UnsupportedItem { item_type } => {
            println!("{}", format!("(skipped {item_type} item)").dimmed());
        }
        CoreEvent::StateChanged { .. } | CoreEvent::Usage(_) => {}
    }
}

/// One line per logged item, for `:history`.
pub fn display_item(index: usize, item: &ConversationItem) {
    let index = format!("{index:>3}").dimmed();
    match item {
        ConversationItem::UserMessage { text, .. } => {
            println!("{index} {} {text}", "user".bright_cyan());
        }
        ConversationItem::AssistantMessage { text, .. } => {
            println!("{index} {} {text}", "assistant".bright_magenta());
        }
        ConversationItem::FunctionCallRequest {
            call_id,
            name,
            arguments,
        } => {
            println!(
                "{index} {} {name}({arguments}) {}",
                "call".bright_yellow(),
                format!("[{call_id}]").dimmed()
            );
        }
        ConversationItem::FunctionCallResult { call_id, output } => {
            println!(
                "{index} {} {} {}",
                "result".bright_green(),
                truncate(output),
                format!("[{call_id}]").dimmed()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_output_is_untouched() {
        assert_eq!(truncate("19°C"), "19°C");
    }

    #[test]
    fn test_long_output_is_cut_on_char_boundary() {
        let long = "°".repeat(250);
        let cut = truncate(&long);
        assert!(cut.starts_with(&"°".repeat(200)));
        assert!(cut.ends_with("... (250 chars)"));
    }
}

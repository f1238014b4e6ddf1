use promptledger_core::extract::count_turns;
use promptledger_core::model::{PromptSnapshot, Session, ToolCall, ToolCallRecord};

use super::OutputFormat;

pub fn format_session_list(sessions: &[Session], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => json_line(sessions),
        OutputFormat::Text => format_session_list_text(sessions),
    }
}

fn format_session_list_text(sessions: &[Session]) -> String {
    if sessions.is_empty() {
        return "No sessions found.\n".to_string();
    }

    let mut out = String::new();
    for s in sessions {
        let short_id = &s.id.as_str()[..8.min(s.id.as_str().len())];
        let time = s.updated_at.format("%Y-%m-%d %H:%M");
        out.push_str(&format!(
            "\u{25c6} {} [{}] {short_id}  {time}\n",
            s.key, s.status
        ));
    }
    out
}

pub fn format_session_detail(
    session: &Session,
    snapshots: &[PromptSnapshot],
    tool_call_count: usize,
    fmt: OutputFormat,
) -> String {
    match fmt {
        OutputFormat::Json => {
            let detail = serde_json::json!({
                "session": session,
                "snapshots": snapshots.len(),
                "latest_sequence": snapshots.last().map(|s| s.sequence),
                "prompt_length": snapshots.last().map(PromptSnapshot::len),
                "turns": snapshots.last().map(|s| count_turns(&s.text)).unwrap_or(0),
                "tool_calls": tool_call_count,
            });
            serde_json::to_string_pretty(&detail).unwrap_or_default()
        }
        OutputFormat::Text => {
            let mut out = String::new();
            out.push_str(&format!("Session: {}\n", session.key));
            out.push_str(&format!("Id:      {}\n", session.id));
            out.push_str(&format!("Status:  {}\n", session.status));
            out.push_str(&format!(
                "Created: {}\n",
                session.created_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            out.push_str(&format!(
                "Updated: {}\n",
                session.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
            ));
            out.push_str(&format!(
                "Template: {} chars\n",
                session.initial_prompt.chars().count()
            ));
            out.push_str(&format!("Snapshots: {}\n", snapshots.len()));
            if let Some(latest) = snapshots.last() {
                out.push_str(&format!(
                    "Latest:  #{} {} ({} chars)\n",
                    latest.sequence,
                    latest.kind,
                    latest.len()
                ));
                out.push_str(&format!("Turns:   {}\n", count_turns(&latest.text)));
            }
            out.push_str(&format!("Tool calls: {tool_call_count}"));
            out
        }
    }
}

pub fn format_snapshot_list(snapshots: &[PromptSnapshot], full: bool, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            if full {
                json_line(snapshots)
            } else {
                let summaries: Vec<_> = snapshots
                    .iter()
                    .map(|s| {
                        serde_json::json!({
                            "id": s.id,
                            "sequence": s.sequence,
                            "kind": s.kind,
                            "length": s.len(),
                            "created_at": s.created_at,
                        })
                    })
                    .collect();
                json_line(&summaries)
            }
        }
        OutputFormat::Text => {
            if snapshots.is_empty() {
                return "No snapshots found.\n".to_string();
            }
            let mut out = String::new();
            for s in snapshots {
                out.push_str(&format!(
                    "#{:<4} {:<14} {} {:>7} chars  {}\n",
                    s.sequence,
                    s.kind.as_str(),
                    s.id.short(),
                    s.len(),
                    s.created_at.format("%Y-%m-%d %H:%M:%S")
                ));
                if full {
                    out.push_str(&s.text);
                    out.push_str("\n\n");
                }
            }
            out
        }
    }
}

pub fn format_tool_call_records(records: &[ToolCallRecord], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => json_line(records),
        OutputFormat::Text => {
            if records.is_empty() {
                return "No tool calls found.\n".to_string();
            }
            let mut out = String::new();
            for r in records {
                out.push_str(&format!("#{}.{} ", r.sequence, r.index));
                push_call(&mut out, &r.call);
            }
            out
        }
    }
}

pub fn format_tool_calls(calls: &[ToolCall], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => json_line(calls),
        OutputFormat::Text => {
            if calls.is_empty() {
                return "No tool calls found.\n".to_string();
            }
            let mut out = String::new();
            for call in calls {
                push_call(&mut out, call);
            }
            out
        }
    }
}

fn push_call(out: &mut String, call: &ToolCall) {
    let raw_marker = if call.raw_arguments { " [RAW]" } else { "" };
    out.push_str(&format!("{}{raw_marker}\n", call.tool_name));
    if let Some(description) = &call.description {
        out.push_str(&format!("  {description}\n"));
    }
    out.push_str(&format!("  args: {}\n", call.arguments_value()));
}

fn json_line<T: serde::Serialize + ?Sized>(value: &T) -> String {
    let mut json = serde_json::to_string_pretty(value).unwrap_or_default();
    json.push('\n');
    json
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptledger_core::model::SessionKey;

    #[test]
    fn test_empty_lists() {
        assert_eq!(
            format_session_list(&[], OutputFormat::Text),
            "No sessions found.\n"
        );
        assert_eq!(format_tool_calls(&[], OutputFormat::Json), "[]\n");
    }

    #[test]
    fn test_raw_call_is_marked() {
        let call = ToolCall::raw("image_gen", Some("draw".into()), "{oops");
        let text = format_tool_calls(&[call], OutputFormat::Text);
        assert!(text.starts_with("image_gen [RAW]\n  draw\n"));
        assert!(text.contains(r#"args: {"raw":"{oops"}"#));
    }

    #[test]
    fn test_session_list_text() {
        let session = Session::new(SessionKey::from("demo"), "t".into());
        let text = format_session_list(&[session], OutputFormat::Text);
        assert!(text.contains("demo [active]"));
    }
}

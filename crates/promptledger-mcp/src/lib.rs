use std::path::PathBuf;

use rmcp::model::{ServerCapabilities, ServerInfo};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    tool, tool_handler, tool_router, ServerHandler,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use promptledger_core::model::{Fragment, SessionStatus, SnapshotKind};
use promptledger_core::storage::GitLedgerStore;
use promptledger_core::{CoreError, HistoryFilter, SessionFilter, SessionLedger};

/// MCP server recording agent prompts into a promptledger repository.
///
/// Stores `repo_path: PathBuf` instead of a ledger because
/// `git2::Repository` is `!Send` and rmcp requires `ServerHandler: Send + Sync + 'static`.
/// Each tool handler opens the ledger fresh per request.
#[derive(Debug, Clone)]
pub struct PromptLedgerMcpServer {
    repo_path: PathBuf,
    tool_router: ToolRouter<Self>,
}

impl PromptLedgerMcpServer {
    /// Create a new MCP server for the repository at the given path.
    pub fn new(repo_path: PathBuf) -> Self {
        Self {
            repo_path,
            tool_router: Self::tool_router(),
        }
    }

    fn open_ledger(&self) -> Result<SessionLedger<GitLedgerStore>, String> {
        SessionLedger::open(&self.repo_path).map_err(|e| format!("Failed to open ledger: {e}"))
    }

    fn append(&self, key: &str, fragment: Fragment) -> Result<String, String> {
        let outcome = self
            .open_ledger()?
            .append_fragment(key, fragment)
            .map_err(describe)?;
        to_json(&outcome)
    }
}

/// Map a core outcome to the message shown to the calling agent.
fn describe(err: CoreError) -> String {
    match err {
        CoreError::AlreadyExists { key } => format!("Session '{key}' already exists"),
        CoreError::NotFound { key } => format!("Session '{key}' not found"),
        other if other.is_persistence_failure() => format!("Storage failure: {other}"),
        other => other.to_string(),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("Failed to encode response: {e}"))
}

// -- Tool parameter structs --

#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateSessionParams {
    /// Caller-chosen session key (1 to 64 characters)
    pub session_key: String,
    /// Initial prompt; omitted or empty uses the configured default template
    pub template: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TextParams {
    /// Session key
    pub session_key: String,
    /// Text to append
    pub text: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct MarkerParams {
    /// Session key
    pub session_key: String,
    /// Why the next model turn starts (e.g. "UserInput")
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct KeyParams {
    /// Session key
    pub session_key: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListSessionsParams {
    /// Filter by status: active, completed or error
    pub status: Option<String>,
    /// Number of sessions to skip (default: 0)
    pub skip: Option<usize>,
    /// Maximum number of sessions (default: 20)
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListPromptsParams {
    /// Session key
    pub session_key: String,
    /// Filter by kind: init, user_input, system_marker or llm_output
    pub kind: Option<String>,
    /// Number of snapshots to skip (default: 0)
    pub skip: Option<usize>,
    /// Maximum number of snapshots (default: 20)
    pub limit: Option<usize>,
    /// Include full prompt text instead of lengths only
    pub full: Option<bool>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListToolCallsParams {
    /// Session key
    pub session_key: String,
    /// Number of calls to skip (default: 0)
    pub skip: Option<usize>,
    /// Maximum number of calls (default: 20)
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SetStatusParams {
    /// Session key
    pub session_key: String,
    /// New status: active, completed or error
    pub status: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExtractParams {
    /// Model output to scan for <Action>/<ActionInput> tool calls
    pub text: String,
}

#[derive(Debug, Serialize)]
struct SnapshotSummary<'a> {
    id: &'a str,
    sequence: u64,
    kind: SnapshotKind,
    length: usize,
    created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<&'a str>,
}

// -- Tool implementations --

#[tool_router]
impl PromptLedgerMcpServer {
    #[tool(
        description = "Create a prompt session. The first snapshot is the given template or the configured default system prompt."
    )]
    fn create_session(
        &self,
        Parameters(params): Parameters<CreateSessionParams>,
    ) -> Result<String, String> {
        let created = self
            .open_ledger()?
            .create_session(&params.session_key, params.template.as_deref())
            .map_err(describe)?;
        to_json(&created)
    }

    #[tool(description = "Append user input to a session's prompt, wrapped in <UserInput> tags.")]
    fn append_user_input(
        &self,
        Parameters(params): Parameters<TextParams>,
    ) -> Result<String, String> {
        self.append(&params.session_key, Fragment::UserInput(params.text))
    }

    #[tool(
        description = "Append a <Start> system marker carrying the session key and a reason, handing the next turn to the model."
    )]
    fn append_system_marker(
        &self,
        Parameters(params): Parameters<MarkerParams>,
    ) -> Result<String, String> {
        self.append(
            &params.session_key,
            Fragment::SystemMarker {
                reason: params.reason.unwrap_or_default(),
            },
        )
    }

    #[tool(
        description = "Append model output verbatim. Tool calls in <Action>/<ActionInput> tags are extracted and stored with the new snapshot."
    )]
    fn append_llm_output(
        &self,
        Parameters(params): Parameters<TextParams>,
    ) -> Result<String, String> {
        self.append(&params.session_key, Fragment::LlmOutput(params.text))
    }

    #[tool(description = "Return the full current prompt of a session.")]
    fn current_prompt(&self, Parameters(params): Parameters<KeyParams>) -> Result<String, String> {
        self.open_ledger()?
            .get_current_prompt(&params.session_key)
            .map_err(describe)?
            .ok_or_else(|| format!("Session '{}' not found", params.session_key))
    }

    #[tool(description = "List sessions, most recently updated first.")]
    fn list_sessions(
        &self,
        Parameters(params): Parameters<ListSessionsParams>,
    ) -> Result<String, String> {
        let status = params
            .status
            .as_deref()
            .map(str::parse::<SessionStatus>)
            .transpose()
            .map_err(describe)?;
        let filter = SessionFilter {
            status,
            skip: params.skip.unwrap_or(0),
            limit: Some(params.limit.unwrap_or(20)),
        };
        let sessions = self
            .open_ledger()?
            .list_sessions(&filter)
            .map_err(describe)?;
        if sessions.is_empty() {
            return Ok("No sessions found.".to_string());
        }

        let mut out = format!("{} session(s):\n\n", sessions.len());
        for s in &sessions {
            let date = s.updated_at.format("%Y-%m-%d %H:%M");
            out.push_str(&format!("- {} [{}] {date}\n", s.key, s.status));
        }
        Ok(out)
    }

    #[tool(
        description = "Show a session: status, timestamps, snapshot count, tool call count and template length."
    )]
    fn show_session(&self, Parameters(params): Parameters<KeyParams>) -> Result<String, String> {
        let ledger = self.open_ledger()?;
        let key = &params.session_key;
        let session = ledger
            .session(key)
            .map_err(describe)?
            .ok_or_else(|| format!("Session '{key}' not found"))?;
        let snapshots = ledger
            .history(key, &HistoryFilter::default())
            .map_err(describe)?;
        let tool_calls = ledger.tool_calls(key, 0, None).map_err(describe)?;

        let mut out = String::new();
        out.push_str(&format!("Session: {}\n", session.key));
        out.push_str(&format!("Id: {}\n", session.id));
        out.push_str(&format!("Status: {}\n", session.status));
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
                "Latest: #{} {} ({} chars)\n",
                latest.sequence,
                latest.kind,
                latest.len()
            ));
        }
        out.push_str(&format!("Tool calls: {}\n", tool_calls.len()));
        Ok(out)
    }

    #[tool(description = "List a session's prompt snapshots in sequence order.")]
    fn list_prompts(
        &self,
        Parameters(params): Parameters<ListPromptsParams>,
    ) -> Result<String, String> {
        let kind = params
            .kind
            .as_deref()
            .map(str::parse::<SnapshotKind>)
            .transpose()
            .map_err(describe)?;
        let filter = HistoryFilter {
            kind,
            skip: params.skip.unwrap_or(0),
            limit: Some(params.limit.unwrap_or(20)),
        };
        let snapshots = self
            .open_ledger()?
            .history(&params.session_key, &filter)
            .map_err(describe)?;
        let full = params.full.unwrap_or(false);
        let summaries: Vec<SnapshotSummary<'_>> = snapshots
            .iter()
            .map(|s| SnapshotSummary {
                id: s.id.as_str(),
                sequence: s.sequence,
                kind: s.kind,
                length: s.len(),
                created_at: s.created_at.to_rfc3339(),
                text: full.then_some(s.text.as_str()),
            })
            .collect();
        to_json(&summaries)
    }

    #[tool(description = "List tool calls recorded for a session, newest first.")]
    fn list_tool_calls(
        &self,
        Parameters(params): Parameters<ListToolCallsParams>,
    ) -> Result<String, String> {
        let records = self
            .open_ledger()?
            .tool_calls(
                &params.session_key,
                params.skip.unwrap_or(0),
                Some(params.limit.unwrap_or(20)),
            )
            .map_err(describe)?;
        to_json(&records)
    }

    #[tool(description = "Set a session's status to active, completed or error.")]
    fn set_status(
        &self,
        Parameters(params): Parameters<SetStatusParams>,
    ) -> Result<String, String> {
        let status: SessionStatus = params.status.parse().map_err(describe)?;
        let session = self
            .open_ledger()?
            .set_status(&params.session_key, status)
            .map_err(describe)?;
        Ok(format!("Session '{}' is now {}", session.key, session.status))
    }

    #[tool(
        description = "Extract tool calls from a block of model output without recording anything."
    )]
    fn extract_tool_calls(
        &self,
        Parameters(params): Parameters<ExtractParams>,
    ) -> Result<String, String> {
        let calls = self.open_ledger()?.extract_tool_calls(&params.text);
        to_json(&calls)
    }

    #[tool(description = "Totals of sessions, snapshots and tool calls in the ledger.")]
    fn stats(&self) -> Result<String, String> {
        let stats = self.open_ledger()?.stats().map_err(describe)?;
        to_json(&stats)
    }
}

#[tool_handler]
impl ServerHandler for PromptLedgerMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "promptledger MCP Server - Record an agent's evolving prompt in Git. \
                 Create sessions, append user input, markers and model output, and \
                 inspect the tool calls extracted from model output."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Start the MCP server on stdio transport.
pub async fn run_stdio(repo_path: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    use rmcp::transport::stdio;
    use rmcp::ServiceExt;

    tracing::info!("Serving promptledger MCP for {}", repo_path.display());
    let server = PromptLedgerMcpServer::new(repo_path);
    let service = server.serve(stdio()).await?;
    service.waiting().await?;
    Ok(())
}

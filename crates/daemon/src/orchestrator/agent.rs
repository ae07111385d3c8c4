use engine::{tool_declarations, ToolDeclaration};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::StudioError;
use crate::llm::{LanguageModel, ModelReply, Turn};
use crate::tools::ToolRouter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentOutcome {
    Answered,
    UnknownTool,
    StepLimit,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: serde_json::Value,
    pub result: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentReply {
    pub reply: String,
    pub outcome: AgentOutcome,
    pub tool_calls: Vec<ToolInvocation>,
}

/// Multi-turn tool-use loop over one append-only conversation.
///
/// A message runs to completion before the next one starts: the history lock
/// is held for the whole exchange, and tool calls are executed one at a time.
pub struct Agent {
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolRouter>,
    declarations: Vec<ToolDeclaration>,
    history: Mutex<Vec<Turn>>,
    max_steps: usize,
}

impl Agent {
    pub fn new(model: Arc<dyn LanguageModel>, tools: Arc<ToolRouter>, max_steps: usize) -> Self {
        Agent {
            model,
            tools,
            declarations: tool_declarations(),
            history: Mutex::new(Vec::new()),
            max_steps: max_steps.max(1),
        }
    }

    pub async fn history(&self) -> Vec<Turn> {
        self.history.lock().await.clone()
    }

    pub async fn handle_message(&self, text: &str) -> Result<AgentReply, StudioError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(StudioError::Input("Say something first".to_string()));
        }

        let mut history = self.history.lock().await;
        history.push(Turn::User { text: text.to_string() });
        info!("[Agent] User: {}", text);

        let mut tool_calls = Vec::new();
        for step in 0..self.max_steps {
            let call = match self.model.respond(&history, &self.declarations).await? {
                ModelReply::Text(reply) => {
                    info!("[Agent] Answered after {} tool call(s)", step);
                    history.push(Turn::Agent { text: reply.clone() });
                    return Ok(AgentReply {
                        reply,
                        outcome: AgentOutcome::Answered,
                        tool_calls,
                    });
                }
                ModelReply::ToolCall(call) => call,
            };

            info!("[Agent] Step {}: {}({})", step + 1, call.name, call.arguments);
            history.push(Turn::ToolCall { call: call.clone() });

            let result = match self.tools.dispatch_call(&call.name, &call.arguments).await {
                Ok(result) => result,
                Err(e) => {
                    warn!("[Agent] Stopping: {}", e);
                    let reply = format!("I tried to use a tool I don't have ({}), so I stopped here.", call.name);
                    history.push(Turn::Agent { text: reply.clone() });
                    return Ok(AgentReply {
                        reply,
                        outcome: AgentOutcome::UnknownTool,
                        tool_calls,
                    });
                }
            };

            history.push(Turn::ToolResult {
                name: call.name.clone(),
                result: result.clone(),
            });
            tool_calls.push(ToolInvocation {
                name: call.name,
                arguments: call.arguments,
                result,
            });
        }

        warn!("[Agent] Gave up after {} tool calls", self.max_steps);
        let reply = format!(
            "I made {} tool calls without finishing, so I stopped. Could you rephrase or break the request into smaller steps?",
            self.max_steps
        );
        history.push(Turn::Agent { text: reply.clone() });
        Ok(AgentReply {
            reply,
            outcome: AgentOutcome::StepLimit,
            tool_calls,
        })
    }
}

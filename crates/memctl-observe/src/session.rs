//! Session transcript model and tool call pairing

use serde::Deserialize;
use serde_json::Value;
use std::collections::VecDeque;

use memctl_core::ObserveLimits;

/// One line of a session transcript
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SessionLine {
    Session {
        #[serde(default)]
        id: String,
        #[serde(default)]
        timestamp: Option<String>,
        #[serde(default)]
        cwd: Option<String>,
    },
    Message {
        #[serde(default)]
        id: String,
        #[serde(default)]
        timestamp: Option<String>,
        message: Message,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Content,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<Part>),
    Other(Value),
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Part {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolCall {
        #[serde(default, rename = "toolName")]
        tool_name: String,
        #[serde(default, rename = "toolUseId")]
        tool_use_id: String,
        #[serde(default)]
        input: Value,
    },
    ToolResult {
        #[serde(default, rename = "toolUseId")]
        tool_use_id: String,
        #[serde(default)]
        result: Value,
    },
    #[serde(other)]
    Unknown,
}

/// Header timestamp of the transcript, if it has one
pub fn session_timestamp(lines: &[SessionLine]) -> Option<&str> {
    lines.iter().find_map(|line| match line {
        SessionLine::Session { timestamp, .. } => timestamp.as_deref(),
        _ => None,
    })
}

/// A tool call paired with its result
#[derive(Debug, Clone)]
pub struct ToolInteraction {
    pub tool_name: String,
    pub tool_use_id: String,
    pub input: Value,
    pub input_summary: String,
    /// Text the assistant wrote alongside the call
    pub assistant_text: String,
    pub output_summary: String,
    /// Characters in the full result
    pub output_size: usize,
    pub answered: bool,
    pub timestamp: Option<String>,
}

/// First `max` characters of `text`
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

struct Pairing<'l> {
    limits: &'l ObserveLimits,
    interactions: Vec<ToolInteraction>,
    /// Indices of calls still waiting for a result, oldest first
    pending: VecDeque<usize>,
}

impl<'l> Pairing<'l> {
    fn call(&mut self, tool_name: &str, tool_use_id: &str, input: &Value, assistant_text: &str, timestamp: Option<&str>) {
        self.pending.push_back(self.interactions.len());
        self.interactions.push(ToolInteraction {
            tool_name: if tool_name.is_empty() { "unknown".to_string() } else { tool_name.to_string() },
            tool_use_id: tool_use_id.to_string(),
            input: input.clone(),
            input_summary: truncate_chars(&value_text(input), self.limits.max_input_chars),
            assistant_text: assistant_text.to_string(),
            output_summary: String::new(),
            output_size: 0,
            answered: false,
            timestamp: timestamp.map(str::to_string),
        });
    }

    /// Attach `output` to the oldest unanswered call with this id, or to the
    /// oldest unanswered call when the id is empty
    fn answer(&mut self, tool_use_id: &str, output: &str) {
        let slot = self.pending.iter().position(|&idx| {
            tool_use_id.is_empty() || self.interactions[idx].tool_use_id == tool_use_id
        });
        let Some(slot) = slot else {
            tracing::debug!("tool result {:?} has no matching call", tool_use_id);
            return;
        };
        let Some(idx) = self.pending.remove(slot) else {
            return;
        };
        let interaction = &mut self.interactions[idx];
        interaction.output_summary = truncate_chars(output, self.limits.max_output_chars);
        interaction.output_size = output.chars().count();
        interaction.answered = true;
    }
}

/// Pair tool calls with their results in order of appearance
pub fn extract_interactions(lines: &[SessionLine], limits: &ObserveLimits) -> Vec<ToolInteraction> {
    let mut pairing = Pairing {
        limits,
        interactions: Vec::new(),
        pending: VecDeque::new(),
    };

    for line in lines {
        let SessionLine::Message { message, timestamp, .. } = line else {
            continue;
        };
        match (message.role, &message.content) {
            (Role::Assistant, Content::Parts(parts)) => {
                let text: Vec<&str> = parts
                    .iter()
                    .filter_map(|p| match p {
                        Part::Text { text } if !text.trim().is_empty() => Some(text.trim()),
                        _ => None,
                    })
                    .collect();
                let assistant_text = truncate_chars(&text.join(" "), limits.max_text_chars);
                for part in parts {
                    match part {
                        Part::ToolCall {
                            tool_name,
                            tool_use_id,
                            input,
                        } => pairing.call(tool_name, tool_use_id, input, &assistant_text, timestamp.as_deref()),
                        Part::ToolResult { tool_use_id, result } => {
                            pairing.answer(tool_use_id, &value_text(result))
                        }
                        _ => {}
                    }
                }
            }
            (Role::Tool | Role::User, Content::Parts(parts)) => {
                for part in parts {
                    if let Part::ToolResult { tool_use_id, result } = part {
                        pairing.answer(tool_use_id, &value_text(result));
                    }
                }
            }
            (Role::Tool, Content::Text(text)) => pairing.answer("", text),
            _ => {}
        }
    }
    pairing.interactions
}

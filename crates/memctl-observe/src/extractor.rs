//! Rule-based observations from paired tool interactions

use serde::Serialize;
use serde_json::Value;

use crate::session::{truncate_chars, ToolInteraction};
use memctl_core::ObserveLimits;

const TITLE_CHARS: usize = 80;
const MIN_FACT_CHARS: usize = 5;

const FILE_READ_TOOLS: &[&str] = &["read", "read_file", "readfile", "view", "open", "cat", "file_read"];
const COMMAND_TOOLS: &[&str] = &[
    "exec",
    "bash",
    "shell",
    "sh",
    "run",
    "terminal",
    "process",
    "run_command",
    "execute",
];
const MUTATING_TOOLS: &[&str] = &["write", "edit", "apply_patch", "write_file"];
const PAGER_COMMANDS: &[&str] = &["cat", "head", "tail", "less", "more", "bat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObservationKind {
    Discovery,
    CommandExecuted,
    FileRead,
}

impl ObservationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationKind::Discovery => "discovery",
            ObservationKind::CommandExecuted => "command-executed",
            ObservationKind::FileRead => "file-read",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub kind: ObservationKind,
    pub title: String,
    pub facts: Vec<String>,
    pub narrative: String,
}

fn command_of(input: &Value) -> Option<&str> {
    input
        .get("command")
        .or_else(|| input.get("cmd"))
        .and_then(Value::as_str)
}

fn path_of(input: &Value) -> Option<&str> {
    ["path", "file_path", "file", "filename"]
        .iter()
        .find_map(|key| input.get(*key).and_then(Value::as_str))
}

/// Classify a call by tool name, looking at the command for shell tools
pub fn classify(tool_name: &str, input: &Value) -> ObservationKind {
    let tool = tool_name.to_lowercase();
    if FILE_READ_TOOLS.contains(&tool.as_str()) {
        return ObservationKind::FileRead;
    }
    if COMMAND_TOOLS.contains(&tool.as_str()) {
        let program = command_of(input)
            .or_else(|| input.as_str())
            .and_then(|c| c.split_whitespace().next())
            .unwrap_or("");
        if PAGER_COMMANDS.contains(&program) {
            return ObservationKind::FileRead;
        }
        return ObservationKind::CommandExecuted;
    }
    if MUTATING_TOOLS.contains(&tool.as_str()) {
        return ObservationKind::CommandExecuted;
    }
    ObservationKind::Discovery
}

/// What the call acted on: the command, the path, or the input summary
fn subject(interaction: &ToolInteraction) -> String {
    let raw = command_of(&interaction.input)
        .or_else(|| path_of(&interaction.input))
        .map(str::to_string)
        .unwrap_or_else(|| interaction.input_summary.clone());
    let line = raw.lines().next().unwrap_or("").trim();
    line.to_string()
}

/// Build one observation from a paired call
pub fn extract_observation(interaction: &ToolInteraction, limits: &ObserveLimits) -> Observation {
    let kind = classify(&interaction.tool_name, &interaction.input);
    let subject = subject(interaction);

    let title = if !interaction.assistant_text.is_empty() {
        truncate_chars(&interaction.assistant_text, TITLE_CHARS)
    } else if subject.is_empty() {
        interaction.tool_name.clone()
    } else {
        truncate_chars(&format!("{}: {}", interaction.tool_name, subject), TITLE_CHARS)
    };

    let mut facts = vec![format!("Tool: {}", interaction.tool_name)];
    if !subject.is_empty() {
        let label = match kind {
            ObservationKind::FileRead if command_of(&interaction.input).is_none() => "File",
            ObservationKind::Discovery => "Input",
            _ => "Command",
        };
        facts.push(format!(
            "{}: {}",
            label,
            truncate_chars(&subject, limits.max_fact_chars)
        ));
    }
    facts.extend(
        interaction
            .output_summary
            .lines()
            .map(str::trim)
            .filter(|line| line.chars().count() > MIN_FACT_CHARS)
            .take(limits.max_facts)
            .map(|line| truncate_chars(line, limits.max_fact_chars)),
    );

    let narrative = if !interaction.assistant_text.is_empty() {
        interaction.assistant_text.clone()
    } else {
        let mut narrative = format!("Ran {}", interaction.tool_name);
        if !subject.is_empty() {
            narrative.push_str(&format!(" on {}", truncate_chars(&subject, limits.max_fact_chars)));
        }
        if interaction.answered {
            narrative.push_str(&format!(" ({} chars of output)", interaction.output_size));
        } else {
            narrative.push_str(" (no result recorded)");
        }
        narrative
    };

    Observation {
        kind,
        title,
        facts,
        narrative,
    }
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render observations as XML-tagged blocks separated by blank lines
pub fn format_observations(observations: &[Observation]) -> String {
    let mut blocks = Vec::with_capacity(observations.len());
    for obs in observations {
        let mut block = format!("<observation type=\"{}\">\n", obs.kind.as_str());
        block.push_str(&format!("  <title>{}</title>\n", escape_xml(&obs.title)));
        block.push_str("  <facts>\n");
        for fact in &obs.facts {
            block.push_str(&format!("    - {}\n", escape_xml(fact)));
        }
        block.push_str("  </facts>\n");
        block.push_str(&format!("  <narrative>{}</narrative>\n", escape_xml(&obs.narrative)));
        block.push_str("</observation>\n");
        blocks.push(block);
    }
    blocks.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interaction(tool: &str, input: Value, output: &str, text: &str) -> ToolInteraction {
        ToolInteraction {
            tool_name: tool.to_string(),
            tool_use_id: "t1".to_string(),
            input_summary: input.to_string(),
            input,
            assistant_text: text.to_string(),
            output_summary: output.to_string(),
            output_size: output.chars().count(),
            answered: true,
            timestamp: None,
        }
    }

    #[test]
    fn test_classification_table() {
        assert_eq!(classify("exec", &json!({"command": "uptime"})), ObservationKind::CommandExecuted);
        assert_eq!(classify("Bash", &json!({"cmd": "tail -n 5 log"})), ObservationKind::FileRead);
        assert_eq!(classify("read_file", &json!({"path": "a"})), ObservationKind::FileRead);
        assert_eq!(classify("apply_patch", &json!({})), ObservationKind::CommandExecuted);
        assert_eq!(classify("web_search", &json!({"query": "x"})), ObservationKind::Discovery);
        assert_eq!(classify("shell", &json!("cat notes.md")), ObservationKind::FileRead);
    }

    #[test]
    fn test_command_observation() {
        let obs = extract_observation(
            &interaction(
                "exec",
                json!({"command": "uptime"}),
                " 10:00  up 3 days,  load average: 0.10\nok\n",
                "",
            ),
            &ObserveLimits::default(),
        );
        assert_eq!(obs.kind, ObservationKind::CommandExecuted);
        assert_eq!(obs.title, "exec: uptime");
        assert_eq!(
            obs.facts,
            vec![
                "Tool: exec".to_string(),
                "Command: uptime".to_string(),
                "10:00  up 3 days,  load average: 0.10".to_string(),
            ]
        );
        assert!(obs.narrative.starts_with("Ran exec on uptime"));
    }

    #[test]
    fn test_assistant_text_becomes_title_and_narrative() {
        let text = "Reading the deployment notes to find the rollback procedure for the gateway service";
        let obs = extract_observation(
            &interaction("read", json!({"path": "DEPLOY.md"}), "", text),
            &ObserveLimits::default(),
        );
        assert_eq!(obs.title.chars().count(), TITLE_CHARS);
        assert_eq!(obs.narrative, text);
        assert_eq!(obs.facts[1], "File: DEPLOY.md");
    }

    #[test]
    fn test_fact_limits() {
        let output: String = (0..10).map(|i| format!("line number {i}\n")).collect();
        let limits = ObserveLimits {
            max_facts: 2,
            ..ObserveLimits::default()
        };
        let obs = extract_observation(&interaction("exec", json!({"command": "ls"}), &output, ""), &limits);
        assert_eq!(obs.facts.len(), 4);
    }

    #[test]
    fn test_format_escapes_markup() {
        let obs = Observation {
            kind: ObservationKind::Discovery,
            title: "a < b & c".to_string(),
            facts: vec!["x > y".to_string()],
            narrative: "said \"hi\"".to_string(),
        };
        let doc = format_observations(&[obs]);
        assert_eq!(
            doc,
            "<observation type=\"discovery\">\n  <title>a &lt; b &amp; c</title>\n  <facts>\n    - x &gt; y\n  </facts>\n  <narrative>said &quot;hi&quot;</narrative>\n</observation>\n"
        );
    }
}

// Model alias tables and model selection

use crate::models::AgentType;
use std::collections::HashMap;

/// Built-in shorthand names each CLI accepts from callers
pub fn builtin_aliases(agent: AgentType) -> &'static [(&'static str, &'static str)] {
    match agent {
        // The Claude CLI understands its family aliases natively
        AgentType::Claude => &[],
        AgentType::Gemini => &[
            ("pro", "gemini-2.5-pro"),
            ("flash", "gemini-2.5-flash"),
            ("flash-lite", "gemini-2.5-flash-lite"),
        ],
        AgentType::Codex => &[
            ("codex", "gpt-5-codex"),
            ("gpt5", "gpt-5"),
            ("mini", "gpt-5-mini"),
        ],
    }
}

/// Pick the model flag value for a request.
///
/// An empty request model falls back to the configured default; an empty
/// default means the CLI picks (no flag). Configured aliases shadow the
/// built-in table.
pub fn resolve_model(
    agent: AgentType,
    requested: &str,
    default_model: Option<&str>,
    overrides: &HashMap<String, String>,
) -> Option<String> {
    let name = match requested.trim() {
        "" => default_model.map(str::trim).filter(|m| !m.is_empty())?,
        name => name,
    };

    if let Some(target) = overrides.get(name) {
        return Some(target.clone());
    }

    let resolved = builtin_aliases(agent)
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, target)| *target)
        .unwrap_or(name);
    Some(resolved.to_string())
}

// Buffered-mode response decoders
//
// In non-streaming mode each CLI prints a single JSON document. These
// decoders map the vendor fields onto AIResult.

pub mod claude;
pub mod codex;
pub mod gemini;

use crate::agents::errors::AgentError;
use crate::models::AgentType;
use crate::utils::trimmed_output;
use serde::de::DeserializeOwned;

/// Decode a JSON document, classifying empty and malformed input
pub(crate) fn decode_json<T: DeserializeOwned>(agent: AgentType, data: &[u8]) -> Result<T, AgentError> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Err(AgentError::EmptyResponse { agent });
    }
    serde_json::from_slice(data).map_err(|source| AgentError::InvalidResponseFormat { agent, source })
}

/// First candidate that holds non-blank text
pub(crate) fn first_non_empty(candidates: &[Option<&String>]) -> String {
    candidates
        .iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .map(|s| s.to_string())
        .unwrap_or_default()
}

/// Failure text: structured error, then plain error string, then stderr
pub(crate) fn failure_text(
    structured: Option<String>,
    plain: Option<&String>,
    stderr: &[u8],
) -> Option<String> {
    structured
        .filter(|s| !s.trim().is_empty())
        .or_else(|| plain.filter(|s| !s.trim().is_empty()).cloned())
        .or_else(|| Some(trimmed_output(stderr)).filter(|s| !s.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_json_empty_and_whitespace() {
        let err = decode_json::<serde_json::Value>(AgentType::Claude, b"").unwrap_err();
        assert!(err.is_empty_response());
        let err = decode_json::<serde_json::Value>(AgentType::Claude, b" \n").unwrap_err();
        assert!(err.is_empty_response());
    }

    #[test]
    fn test_decode_json_malformed() {
        let err = decode_json::<serde_json::Value>(AgentType::Codex, b"{oops").unwrap_err();
        assert!(err.is_invalid_response_format());
        assert_eq!(err.agent(), Some(AgentType::Codex));
    }

    #[test]
    fn test_first_non_empty() {
        let blank = "  ".to_string();
        let text = "answer".to_string();
        assert_eq!(first_non_empty(&[None, Some(&blank), Some(&text)]), "answer");
        assert_eq!(first_non_empty(&[None, None]), "");
    }

    #[test]
    fn test_failure_text_preference() {
        let plain = "plain".to_string();
        assert_eq!(
            failure_text(Some("structured".into()), Some(&plain), b"stderr"),
            Some("structured".to_string())
        );
        assert_eq!(failure_text(None, Some(&plain), b"stderr"), Some("plain".to_string()));
        assert_eq!(failure_text(None, None, b" stderr\n"), Some("stderr".to_string()));
        assert_eq!(failure_text(None, None, b""), None);
    }
}

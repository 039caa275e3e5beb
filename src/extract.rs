use tracing::debug;

use crate::credentials::{InitializationResult, RootToken, UnsealKey};
use crate::error::ExtractionError;

const UNSEAL_KEY_MARKER: &str = "Unseal Key";
const ROOT_TOKEN_MARKER: &str = "Root Token";
const VALUE_SEPARATOR: &str = ": ";

/// Recovers unseal shares and the root token from `vault operator init` output.
///
/// Every line containing `Unseal Key` is a share; the first line containing
/// `Root Token` holds the token. Values follow the first `": "` on the line.
///
/// # Errors
/// Returns `ExtractionError` if either record is missing, a record has no
/// value, or the share count differs from `expected_shares`.
pub fn extract_credentials(
    logs: &str,
    expected_shares: usize,
) -> Result<InitializationResult, ExtractionError> {
    let mut unseal_keys = Vec::new();
    let mut root_token = None;

    for (idx, line) in logs.lines().enumerate() {
        if line.contains(UNSEAL_KEY_MARKER) {
            unseal_keys.push(UnsealKey::new(record_value(line, idx + 1)?));
        } else if root_token.is_none() && line.contains(ROOT_TOKEN_MARKER) {
            root_token = Some(RootToken::new(record_value(line, idx + 1)?));
        }
    }

    debug!(
        "Init output scanned: {} unseal key line(s), root token found: {}",
        unseal_keys.len(),
        root_token.is_some()
    );

    if unseal_keys.is_empty() {
        return Err(ExtractionError::MissingUnsealKeys);
    }
    let root_token = root_token.ok_or(ExtractionError::MissingRootToken)?;
    if unseal_keys.len() != expected_shares {
        return Err(ExtractionError::KeyCountMismatch {
            expected: expected_shares,
            found: unseal_keys.len(),
        });
    }

    Ok(InitializationResult {
        unseal_keys,
        root_token,
    })
}

fn record_value(line: &str, line_number: usize) -> Result<&str, ExtractionError> {
    line.split_once(VALUE_SEPARATOR)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or(ExtractionError::MalformedLine { line: line_number })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHARE_VALUES: [&str; 20] = [
        "AAA", "BBB", "CCC", "DDD", "EEE", "FFF", "GGG", "HHH", "III", "JJJ", "KKK", "LLL", "MMM",
        "NNN", "OOO", "PPP", "QQQ", "RRR", "SSS", "TTT",
    ];

    fn init_output(shares: &[&str], root_token: Option<&str>) -> String {
        let mut out = String::new();
        for (idx, share) in shares.iter().enumerate() {
            out.push_str(&format!("Unseal Key {}: {share}\n", idx + 1));
        }
        out.push('\n');
        if let Some(token) = root_token {
            out.push_str(&format!("Initial Root Token: {token}\n"));
        }
        out.push_str("\nVault initialized with 20 key shares and a key threshold of 2.\n");
        out
    }

    #[test]
    fn test_extracts_twenty_shares_and_root_token() {
        let logs = init_output(&SHARE_VALUES, Some("deadbeef"));
        let result = extract_credentials(&logs, 20).expect("credentials");
        let keys: Vec<&str> = result
            .unseal_keys
            .iter()
            .map(UnsealKey::expose_secret)
            .collect();
        assert_eq!(keys, SHARE_VALUES);
        assert_eq!(result.root_token.expose_secret(), "deadbeef");
    }

    #[test]
    fn test_bare_root_token_label() {
        let mut logs = String::new();
        for (idx, share) in SHARE_VALUES.iter().enumerate() {
            logs.push_str(&format!("Unseal Key {}: {share}\n", idx + 1));
        }
        logs.push_str("Root Token: deadbeef");
        let result = extract_credentials(&logs, 20).expect("credentials");
        assert_eq!(result.unseal_keys.len(), 20);
        assert_eq!(result.unseal_keys[19].expose_secret(), "TTT");
        assert_eq!(result.root_token.expose_secret(), "deadbeef");
    }

    #[test]
    fn test_handles_crlf_line_endings() {
        let logs = init_output(&SHARE_VALUES, Some("deadbeef")).replace('\n', "\r\n");
        let result = extract_credentials(&logs, 20).expect("credentials");
        assert_eq!(result.unseal_keys[0].expose_secret(), "AAA");
        assert_eq!(result.root_token.expose_secret(), "deadbeef");
    }

    #[test]
    fn test_value_keeps_later_separators() {
        let logs = "Unseal Key 1: a: b\nRoot Token: t";
        let result = extract_credentials(logs, 1).expect("credentials");
        assert_eq!(result.unseal_keys[0].expose_secret(), "a: b");
    }

    #[test]
    fn test_first_root_token_line_wins() {
        let logs = "Unseal Key 1: k\nRoot Token: first\nRoot Token: second";
        let result = extract_credentials(logs, 1).expect("credentials");
        assert_eq!(result.root_token.expose_secret(), "first");
    }

    #[test]
    fn test_missing_shares_is_an_error() {
        let logs = "Error initializing: Vault is already initialized";
        let err = extract_credentials(logs, 20).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingUnsealKeys));
    }

    #[test]
    fn test_missing_root_token_is_an_error() {
        let logs = init_output(&SHARE_VALUES, None);
        let err = extract_credentials(&logs, 20).unwrap_err();
        assert!(matches!(err, ExtractionError::MissingRootToken));
    }

    #[test]
    fn test_one_share_short_is_an_error() {
        let logs = init_output(&SHARE_VALUES[..19], Some("deadbeef"));
        let err = extract_credentials(&logs, 20).unwrap_err();
        assert!(matches!(
            err,
            ExtractionError::KeyCountMismatch {
                expected: 20,
                found: 19
            }
        ));
    }

    #[test]
    fn test_line_without_value_is_an_error() {
        let logs = "Unseal Key 1:\nRoot Token: t";
        let err = extract_credentials(logs, 1).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedLine { line: 1 }));
        assert!(!err.to_string().contains("Unseal Key"));
    }
}

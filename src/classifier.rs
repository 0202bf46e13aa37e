use std::collections::HashMap;
use std::fmt::Write as _;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::io::AsyncWriteExt;

use crate::db::SCHEDULE_C_CATEGORIES;
use crate::error::{Result, SchedcError};
use crate::models::{Classification, ClassifyRequest};

pub const BATCH_TIMEOUT: Duration = Duration::from_secs(60);
pub const SINGLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Maps transactions to Schedule C categories.
///
/// A successful batch may omit ids; callers treat those as unclassified.
/// Returned lines are not yet range-checked.
pub trait Classifier: Send + Sync {
    fn classify_batch(&self, items: &[ClassifyRequest]) -> Result<HashMap<String, Classification>>;
    fn classify_one(&self, item: &ClassifyRequest) -> Result<Classification>;
}

/// Sends a prompt somewhere and returns the raw completion text.
pub trait CompletionTransport: Send + Sync {
    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String>;
}

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

fn category_list() -> String {
    let mut out = String::new();
    for (name, line, _) in SCHEDULE_C_CATEGORIES {
        let _ = writeln!(out, "- Line {line}: \"{name}\"");
    }
    out
}

const RULES: &str = "\
Rules:
- schedule_c_line must be between 8 and 27. Never answer 0.
- Use the exact category names above.
- When unsure, answer \"Other business expenses\" on line 27.
- If the purchase is not a business expense, still answer line 27 and set expensable to false.
";

pub fn batch_prompt(items: &[ClassifyRequest]) -> String {
    let mut listing = String::new();
    for (i, item) in items.iter().enumerate() {
        let _ = write!(
            listing,
            "\nTransaction {}:\n- ID: {}\n- Vendor: {}\n- Amount: ${:.2}\n- Description: {}\n",
            i + 1,
            item.id,
            item.vendor,
            item.amount,
            item.description
        );
    }
    format!(
        "You are a tax accountant who prepares IRS Schedule C returns.\n\n\
         Assign each of these {count} business transactions to a Schedule C category.\n\
         {listing}\n\
         Categories:\n{categories}\n{RULES}\n\
         Reply with only a JSON array holding one object per transaction:\n\
         [{{\"transaction_id\": \"<id from above>\", \"category\": \"<name>\", \"schedule_c_line\": <number>, \
         \"expensable\": <bool>, \"purpose\": \"<short business purpose>\", \"confidence\": <0.0-1.0>}}]\n",
        count = items.len(),
        categories = category_list(),
    )
}

pub fn single_prompt(item: &ClassifyRequest) -> String {
    format!(
        "You are a tax accountant who prepares IRS Schedule C returns.\n\n\
         Assign this business transaction to a Schedule C category.\n\n\
         Vendor: {vendor}\nAmount: ${amount:.2}\nDescription: {description}\n\n\
         Categories:\n{categories}\n{RULES}\n\
         Reply with only a JSON object:\n\
         {{\"category\": \"<name>\", \"schedule_c_line\": <number>, \"expensable\": <bool>, \
         \"purpose\": \"<short business purpose>\", \"confidence\": <0.0-1.0>}}\n",
        vendor = item.vendor,
        amount = item.amount,
        description = item.description,
        categories = category_list(),
    )
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

/// Models like to wrap JSON in ```json fences.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Deserialize)]
struct BatchEntry {
    transaction_id: String,
    #[serde(flatten)]
    classification: Classification,
}

pub fn parse_batch_response(text: &str) -> Result<HashMap<String, Classification>> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| SchedcError::ClassifierMalformedResponse(e.to_string()))?;
    let serde_json::Value::Array(entries) = value else {
        return Err(SchedcError::ClassifierMalformedResponse(
            "expected a JSON array".to_string(),
        ));
    };

    let mut results = HashMap::new();
    for entry in entries {
        match serde_json::from_value::<BatchEntry>(entry) {
            Ok(e) => {
                results.insert(e.transaction_id, e.classification);
            }
            Err(e) => tracing::warn!(error = %e, "skipping malformed classification entry"),
        }
    }
    Ok(results)
}

pub fn parse_single_response(text: &str) -> Result<Classification> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(text))
        .map_err(|e| SchedcError::ClassifierMalformedResponse(e.to_string()))?;
    if !value.is_object() {
        return Err(SchedcError::ClassifierMalformedResponse(
            "expected a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| SchedcError::ClassifierMalformedResponse(e.to_string()))
}

// ---------------------------------------------------------------------------
// LLM-backed classifier
// ---------------------------------------------------------------------------

pub struct LlmClassifier<T> {
    transport: T,
}

impl<T: CompletionTransport> LlmClassifier<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }
}

impl<T: CompletionTransport> Classifier for LlmClassifier<T> {
    fn classify_batch(&self, items: &[ClassifyRequest]) -> Result<HashMap<String, Classification>> {
        if items.is_empty() {
            return Ok(HashMap::new());
        }
        let completion = self.transport.complete(&batch_prompt(items), BATCH_TIMEOUT)?;
        parse_batch_response(&completion)
    }

    fn classify_one(&self, item: &ClassifyRequest) -> Result<Classification> {
        let completion = self.transport.complete(&single_prompt(item), SINGLE_TIMEOUT)?;
        parse_single_response(&completion)
    }
}

// ---------------------------------------------------------------------------
// External command transport
// ---------------------------------------------------------------------------

/// Runs a user-configured command per completion: the prompt goes to stdin,
/// the completion comes back on stdout.
pub struct CommandTransport {
    program: String,
    args: Vec<String>,
    handle: tokio::runtime::Handle,
}

impl CommandTransport {
    pub fn new(command: &[String], handle: tokio::runtime::Handle) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| SchedcError::Settings("classifier command is empty".to_string()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            handle,
        })
    }

    async fn run(&self, prompt: &str, timeout: Duration) -> Result<String> {
        let mut child = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                SchedcError::ClassifierUnavailable(format!("failed to start {}: {e}", self.program))
            })?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SchedcError::ClassifierUnavailable("no stdin pipe".to_string()))?;

        let write = async move {
            let result = stdin.write_all(prompt.as_bytes()).await;
            drop(stdin);
            result
        };
        let exchange = async move { tokio::join!(write, child.wait_with_output()) };

        let (written, output) = tokio::time::timeout(timeout, exchange).await.map_err(|_| {
            SchedcError::ClassifierUnavailable(format!("no answer within {}s", timeout.as_secs()))
        })?;
        let output = output.map_err(|e| SchedcError::ClassifierUnavailable(e.to_string()))?;
        if let Err(e) = written {
            tracing::debug!(error = %e, "classifier closed stdin early");
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SchedcError::ClassifierUnavailable(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| SchedcError::ClassifierMalformedResponse(e.to_string()))
    }
}

impl CompletionTransport for CommandTransport {
    fn complete(&self, prompt: &str, timeout: Duration) -> Result<String> {
        self.handle.block_on(self.run(prompt, timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CannedTransport {
        reply: std::result::Result<String, String>,
        prompts: Mutex<Vec<(String, Duration)>>,
    }

    impl CannedTransport {
        fn ok(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn down() -> Self {
            Self {
                reply: Err("connection refused".to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl CompletionTransport for CannedTransport {
        fn complete(&self, prompt: &str, timeout: Duration) -> Result<String> {
            self.prompts.lock().unwrap().push((prompt.to_string(), timeout));
            self.reply.clone().map_err(SchedcError::ClassifierUnavailable)
        }
    }

    fn request(id: &str, vendor: &str) -> ClassifyRequest {
        ClassifyRequest {
            id: id.to_string(),
            vendor: vendor.to_string(),
            amount: 42.0,
            description: String::new(),
        }
    }

    #[test]
    fn test_categories_include_other_expenses() {
        assert!(SCHEDULE_C_CATEGORIES
            .iter()
            .any(|(name, line, _)| *name == "Other business expenses" && *line == 27));
    }

    #[test]
    fn test_batch_prompt_lists_every_transaction() {
        let prompt = batch_prompt(&[request("a1", "ADOBE"), request("b2", "UBER")]);
        assert!(prompt.contains("- ID: a1"));
        assert!(prompt.contains("- Vendor: UBER"));
        assert!(prompt.contains("$42.00"));
        assert!(prompt.contains("Line 27: \"Other business expenses\""));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]");
        assert_eq!(strip_code_fence("```\n{}\n```\n"), "{}");
        assert_eq!(strip_code_fence("  [1] "), "[1]");
    }

    #[test]
    fn test_parse_batch_skips_malformed_entries() {
        let text = r#"```json
[
  {"transaction_id": "a1", "category": "Office expenses", "schedule_c_line": 18, "expensable": true, "purpose": "software", "confidence": 0.9},
  {"transaction_id": "b2", "category": "Travel expenses"},
  {"category": "Meals", "schedule_c_line": 24, "expensable": true}
]
```"#;
        let results = parse_batch_response(text).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results["a1"].schedule_c_line, 18);
        assert_eq!(results["a1"].purpose, "software");
    }

    #[test]
    fn test_parse_batch_rejects_non_array() {
        assert!(matches!(
            parse_batch_response(r#"{"category": "Meals"}"#),
            Err(SchedcError::ClassifierMalformedResponse(_))
        ));
        assert!(matches!(
            parse_batch_response("I could not classify these."),
            Err(SchedcError::ClassifierMalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_single_defaults_optional_fields() {
        let c = parse_single_response(r#"{"category": "Meals", "schedule_c_line": 24, "expensable": true}"#)
            .unwrap();
        assert_eq!(c.category, "Meals");
        assert_eq!(c.purpose, "");
        assert_eq!(c.confidence, 0.0);
        assert!(parse_single_response("[]").is_err());
    }

    #[test]
    fn test_llm_classifier_uses_mode_timeouts() {
        let transport = CannedTransport::ok(
            r#"[{"transaction_id": "a1", "category": "Supplies", "schedule_c_line": 22, "expensable": true}]"#,
        );
        let classifier = LlmClassifier::new(transport);
        let results = classifier.classify_batch(&[request("a1", "STAPLES")]).unwrap();
        assert_eq!(results["a1"].category, "Supplies");
        let prompts = classifier.transport.prompts.lock().unwrap();
        assert_eq!(prompts[0].1, BATCH_TIMEOUT);
    }

    #[test]
    fn test_llm_classifier_empty_batch_skips_transport() {
        let classifier = LlmClassifier::new(CannedTransport::down());
        assert!(classifier.classify_batch(&[]).unwrap().is_empty());
        assert!(classifier.transport.prompts.lock().unwrap().is_empty());
    }

    #[test]
    fn test_llm_classifier_propagates_unavailable() {
        let classifier = LlmClassifier::new(CannedTransport::down());
        let err = classifier.classify_one(&request("a1", "ADOBE")).unwrap_err();
        assert!(matches!(err, SchedcError::ClassifierUnavailable(_)));
        assert_eq!(classifier.transport.prompts.lock().unwrap()[0].1, SINGLE_TIMEOUT);
    }

    #[test]
    fn test_command_transport_requires_program() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        assert!(CommandTransport::new(&[], rt.handle().clone()).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_command_transport_round_trip() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let transport = CommandTransport::new(&["cat".to_string()], rt.handle().clone()).unwrap();
        let out = transport.complete("hello", Duration::from_secs(5)).unwrap();
        assert_eq!(out, "hello");
    }

    #[cfg(unix)]
    #[test]
    fn test_command_transport_failures_are_unavailable() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let sh = |script: &str| {
            CommandTransport::new(
                &["sh".to_string(), "-c".to_string(), script.to_string()],
                rt.handle().clone(),
            )
            .unwrap()
        };

        let err = sh("exit 3").complete("x", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, SchedcError::ClassifierUnavailable(_)));

        let err = sh("sleep 5").complete("x", Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, SchedcError::ClassifierUnavailable(_)));

        let missing = CommandTransport::new(&["/nonexistent/classifier".to_string()], rt.handle().clone())
            .unwrap();
        assert!(matches!(
            missing.complete("x", Duration::from_secs(1)),
            Err(SchedcError::ClassifierUnavailable(_))
        ));
    }
}

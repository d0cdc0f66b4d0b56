use crate::catalog::describe_schema;
use crate::error::PipelineError;

/// Rules embedded verbatim in every system prompt. The executor enforces the
/// read-only rule again on its own; the model is never trusted with it.
pub const SAFETY_RULES: &[&str] = &[
    "Only generate a single SELECT statement. Never produce INSERT, UPDATE, DELETE, DROP, ALTER, CREATE or any other statement type.",
    "Add LIMIT 100 to the query unless the question asks for a different number of rows.",
    "For JSON columns use the JSON arrow operators (->, ->>) or JSON path functions; never compare JSON columns with plain equality.",
    "When querying more than one table use explicit JOIN ... ON syntax; never use implicit comma joins.",
    "Only reference tables and columns listed in the schema.",
];

const RESPONSE_FORMAT: &str = r#"Respond with a single JSON object and nothing else:
{
  "sql": "SELECT ...",
  "explanation": "What the query does, in one or two sentences",
  "confidence": 0.0 to 1.0,
  "suggestions": ["Optional follow-up questions or improvements"]
}"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Builds the completion prompt for `question`.
///
/// Fails with a validation error for empty or whitespace-only questions so
/// the completion service is never called for them.
pub fn build_prompt(question: &str) -> Result<Prompt, PipelineError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(PipelineError::Validation(
            "Natural language query is required".to_string(),
        ));
    }

    let rules = SAFETY_RULES
        .iter()
        .enumerate()
        .map(|(i, rule)| format!("{}. {}", i + 1, rule))
        .collect::<Vec<_>>()
        .join("\n");

    let system = format!(
        "You are an expert SQL generator for a DuckDB analytics database.\n\
         Convert the user's question into one valid, safe SQL query.\n\n\
         {}\n\
         Rules:\n{}\n\n{}",
        describe_schema(),
        rules,
        RESPONSE_FORMAT
    );

    Ok(Prompt {
        system,
        user: question.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_contains_schema_and_every_rule() {
        for question in ["show me the top domains", "DROP TABLE scrapers; --", "ünïcødé ✓"] {
            let prompt = build_prompt(question).unwrap();
            assert!(prompt.system.contains(&describe_schema()));
            for rule in SAFETY_RULES {
                assert!(prompt.system.contains(rule), "missing rule: {rule}");
            }
            assert_eq!(prompt.user, question);
        }
    }

    #[test]
    fn row_cap_is_requested() {
        let prompt = build_prompt("list posts").unwrap();
        assert!(prompt.system.contains("Add LIMIT 100 to the query"));
    }

    #[test]
    fn empty_questions_are_rejected() {
        for question in ["", "   ", "\n\t"] {
            let err = build_prompt(question).unwrap_err();
            assert_eq!(err.kind(), "ValidationError");
        }
    }

    #[test]
    fn surrounding_whitespace_is_dropped() {
        assert_eq!(build_prompt("  top domains \n").unwrap().user, "top domains");
    }
}

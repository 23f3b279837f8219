//! Task declarations and the registry that holds them.
//!
//! A [`TaskSpec`] is pure data: a name, the variables its prompt needs, the
//! prompt itself, and the JSON shape the model is told to answer with. The
//! pipeline runs every spec in a [`TaskRegistry`] through the same code path,
//! so adding a task means adding a spec and nothing else.

use std::collections::HashSet;

use rfpscope_shared::{Result, RfpScopeError, TaskConfig};

use crate::prompt;

/// Variable carrying the company profile text.
pub const COMPANY_DATA: &str = "company_data";

/// Variable carrying the RFP text.
pub const RFP_CONTENT: &str = "rfp_content";

/// Result key holding per-task errors under the partial policy. Not a valid
/// task name.
pub const ERRORS_KEY: &str = "errors";

// ---------------------------------------------------------------------------
// TaskSpec
// ---------------------------------------------------------------------------

/// Prompt shape of a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptTemplate {
    /// One instruction string.
    Single(String),
    /// A system message with the fixed instructions and a user message with the payload.
    Chat { system: String, user: String },
}

impl PromptTemplate {
    /// All template parts, in send order.
    pub fn parts(&self) -> Vec<&str> {
        match self {
            Self::Single(template) => vec![template.as_str()],
            Self::Chat { system, user } => vec![system.as_str(), user.as_str()],
        }
    }
}

/// Immutable declaration of one LLM-backed extraction task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    /// Unique key; also the top-level key of the task's JSON answer.
    pub name: String,
    /// Variables the template needs, in declaration order.
    pub required_variables: Vec<String>,
    pub template: PromptTemplate,
    /// The JSON shape the model is instructed to emit. Documentation only;
    /// responses are not validated against it.
    pub response_schema_hint: String,
}

impl TaskSpec {
    /// Check the spec is internally consistent: non-empty name, and every
    /// placeholder in the template is a declared variable.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RfpScopeError::validation("task name must not be empty"));
        }

        let declared: HashSet<&str> = self.required_variables.iter().map(String::as_str).collect();
        for part in self.template.parts() {
            for name in prompt::placeholders(part) {
                if !declared.contains(name) {
                    return Err(RfpScopeError::validation(format!(
                        "task `{}` uses placeholder `{name}` that is not in required_variables",
                        self.name
                    )));
                }
            }
        }

        Ok(())
    }
}

impl TryFrom<&TaskConfig> for TaskSpec {
    type Error = RfpScopeError;

    fn try_from(config: &TaskConfig) -> Result<Self> {
        let template = match (&config.template, &config.system, &config.user) {
            (Some(template), None, None) => PromptTemplate::Single(template.clone()),
            (None, Some(system), Some(user)) => PromptTemplate::Chat {
                system: system.clone(),
                user: user.clone(),
            },
            _ => {
                return Err(RfpScopeError::validation(format!(
                    "task `{}` must set either `template` or both `system` and `user`",
                    config.name
                )));
            }
        };

        let spec = Self {
            name: config.name.clone(),
            required_variables: config.required_variables.clone(),
            template,
            response_schema_hint: config.response_schema_hint.clone(),
        };
        spec.validate()?;
        Ok(spec)
    }
}

// ---------------------------------------------------------------------------
// TaskRegistry
// ---------------------------------------------------------------------------

/// Ordered, immutable collection of task specs with unique names.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    tasks: Vec<TaskSpec>,
}

impl TaskRegistry {
    /// The four built-in RFP tasks: compliance, eligibility, risk, submission.
    pub fn builtin() -> Self {
        Self {
            tasks: builtin_tasks(),
        }
    }

    /// Build a registry from arbitrary specs, rejecting duplicates and invalid specs.
    pub fn from_specs(tasks: Vec<TaskSpec>) -> Result<Self> {
        let mut seen = HashSet::new();
        for spec in &tasks {
            spec.validate()?;
            if spec.name == ERRORS_KEY {
                return Err(RfpScopeError::validation(format!(
                    "task name `{ERRORS_KEY}` is reserved"
                )));
            }
            if !seen.insert(spec.name.as_str()) {
                return Err(RfpScopeError::validation(format!(
                    "duplicate task name `{}`",
                    spec.name
                )));
            }
        }
        Ok(Self { tasks })
    }

    /// Built-in tasks followed by the `[[tasks]]` entries from config.
    pub fn with_configured(configured: &[TaskConfig]) -> Result<Self> {
        let mut tasks = builtin_tasks();
        for config in configured {
            tasks.push(TaskSpec::try_from(config)?);
        }
        Self::from_specs(tasks)
    }

    pub fn tasks(&self) -> &[TaskSpec] {
        &self.tasks
    }

    pub fn iter(&self) -> impl Iterator<Item = &TaskSpec> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Look up a task by name.
    pub fn get(&self, name: &str) -> Option<&TaskSpec> {
        self.tasks.iter().find(|t| t.name == name)
    }

    /// Task names in registry order.
    pub fn names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name.as_str()).collect()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Built-in tasks
// ---------------------------------------------------------------------------

const COMPLIANCE_SCHEMA: &str = r#"{
  "compliance": {
    "title": "Compliance Check",
    "results": [
      {
        "type": "success | error",
        "title": "<check title>",
        "message": "<brief explanation>"
      }
    ]
  }
}"#;

const ELIGIBILITY_SCHEMA: &str = r#"{
  "eligibility": {
    "title": "Mandatory Eligibility",
    "warning": "<optional overall warning if any major requirement is missing>",
    "checklist": [
      { "status": "pass | fail", "text": "<requirement>" }
    ]
  }
}"#;

const RISK_SCHEMA: &str = r#"{
  "risk": {
    "title": "Risk Analysis",
    "risks": [
      {
        "severity": "low | medium | high",
        "title": "<risk title>",
        "message": "<explanation>",
        "suggestion": "<remedy suggestion>"
      }
    ]
  }
}"#;

const SUBMISSION_SCHEMA: &str = r#"{
  "submission": {
    "title": "Submission Checklist",
    "items": [
      {
        "status": "pass | fail",
        "title": "<requirement title>",
        "description": "<requirement description>"
      }
    ]
  }
}"#;

fn builtin_tasks() -> Vec<TaskSpec> {
    vec![
        builtin(
            "compliance",
            &[COMPANY_DATA, RFP_CONTENT],
            "You are a compliance expert. Check if the company meets the RFP requirements.\n\n\
             Company Data:\n{company_data}\n\n\
             RFP Content:\n{rfp_content}",
            COMPLIANCE_SCHEMA,
        ),
        builtin(
            "eligibility",
            &[RFP_CONTENT],
            "Extract the mandatory eligibility requirements from the RFP.\n\n\
             RFP Content:\n{rfp_content}",
            ELIGIBILITY_SCHEMA,
        ),
        builtin(
            "risk",
            &[RFP_CONTENT],
            "Identify contractual risks in the RFP.\n\n\
             RFP Content:\n{rfp_content}",
            RISK_SCHEMA,
        ),
        builtin(
            "submission",
            &[RFP_CONTENT],
            "Generate a checklist of submission requirements from the RFP including \
             formatting and attachments.\n\n\
             RFP Content:\n{rfp_content}",
            SUBMISSION_SCHEMA,
        ),
    ]
}

/// Assemble a single-message spec whose template ends with the schema hint.
fn builtin(name: &str, variables: &[&str], instructions: &str, schema: &str) -> TaskSpec {
    let template = format!(
        "{instructions}\n\nRespond ONLY with JSON in the following format:\n{}\n",
        prompt::escape_braces(schema)
    );
    TaskSpec {
        name: name.into(),
        required_variables: variables.iter().map(|v| (*v).to_string()).collect(),
        template: PromptTemplate::Single(template),
        response_schema_hint: schema.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_order() {
        let registry = TaskRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec!["compliance", "eligibility", "risk", "submission"]
        );
    }

    #[test]
    fn builtin_specs_validate() {
        for spec in TaskRegistry::builtin().iter() {
            spec.validate().expect("builtin spec is valid");
        }
    }

    #[test]
    fn builtin_schema_keys_are_disjoint_and_match_names() {
        let registry = TaskRegistry::builtin();
        let mut seen = HashSet::new();
        for spec in registry.iter() {
            let hint: serde_json::Value =
                serde_json::from_str(&spec.response_schema_hint).expect("hint is JSON");
            let keys: Vec<&String> = hint.as_object().expect("hint is an object").keys().collect();
            assert_eq!(keys, vec![&spec.name]);
            assert!(seen.insert(spec.name.clone()), "key {} collides", spec.name);
        }
    }

    #[test]
    fn only_compliance_needs_company_data() {
        let registry = TaskRegistry::builtin();
        let needing: Vec<&str> = registry
            .iter()
            .filter(|t| t.required_variables.iter().any(|v| v == COMPANY_DATA))
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(needing, vec!["compliance"]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let mut tasks = builtin_tasks();
        tasks.push(tasks[2].clone());
        let err = TaskRegistry::from_specs(tasks).unwrap_err();
        assert!(err.to_string().contains("duplicate task name `risk`"));
    }

    #[test]
    fn reserved_errors_name_rejected() {
        let configured = TaskConfig {
            name: ERRORS_KEY.into(),
            required_variables: vec![RFP_CONTENT.into()],
            template: Some("List the errors in {rfp_content}".into()),
            system: None,
            user: None,
            response_schema_hint: String::new(),
        };
        let err = TaskRegistry::with_configured(&[configured]).unwrap_err();
        assert!(err.to_string().contains("task name `errors` is reserved"));
    }

    #[test]
    fn undeclared_placeholder_rejected() {
        let spec = TaskSpec {
            name: "broken".into(),
            required_variables: vec![RFP_CONTENT.into()],
            template: PromptTemplate::Single("{rfp_content} and {budget}".into()),
            response_schema_hint: String::new(),
        };
        let err = spec.validate().unwrap_err();
        assert!(err.to_string().contains("`budget`"));
    }

    #[test]
    fn configured_chat_task_is_appended() {
        let config = TaskConfig {
            name: "pricing".into(),
            required_variables: vec![RFP_CONTENT.into()],
            template: None,
            system: Some("Extract pricing terms as JSON.".into()),
            user: Some("{rfp_content}".into()),
            response_schema_hint: r#"{"pricing": {}}"#.into(),
        };
        let registry = TaskRegistry::with_configured(&[config]).expect("valid registry");
        assert_eq!(registry.len(), 5);
        let spec = registry.get("pricing").expect("pricing task");
        assert!(matches!(spec.template, PromptTemplate::Chat { .. }));
    }

    #[test]
    fn configured_task_needs_one_template_form() {
        let config = TaskConfig {
            name: "pricing".into(),
            required_variables: vec![],
            template: Some("x".into()),
            system: Some("y".into()),
            user: None,
            response_schema_hint: String::new(),
        };
        assert!(TaskSpec::try_from(&config).is_err());
    }

    #[test]
    fn configured_task_cannot_shadow_builtin() {
        let config = TaskConfig {
            name: "compliance".into(),
            required_variables: vec![],
            template: Some("check".into()),
            system: None,
            user: None,
            response_schema_hint: String::new(),
        };
        assert!(TaskRegistry::with_configured(&[config]).is_err());
    }
}

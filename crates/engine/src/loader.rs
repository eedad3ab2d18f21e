//! Rule file loading. A rule file holds a top-level `rules` list in YAML or
//! TOML.

use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use remedy_core::RemediationRule;

use crate::error::EngineError;

/// Document format of a rule file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleFormat {
    Yaml,
    Toml,
}

impl RuleFormat {
    /// Format for a file extension, or `None` for anything else.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RemediationRule>,
}

/// Parse and validate the rules of one document.
pub fn load_rules_from_str(
    content: &str,
    format: RuleFormat,
) -> Result<Vec<RemediationRule>, EngineError> {
    let file: RuleFile = match format {
        RuleFormat::Yaml => serde_yaml_ng::from_str(content)
            .map_err(|e| EngineError::RuleFile(format!("YAML parse error: {e}")))?,
        RuleFormat::Toml => toml::from_str(content)
            .map_err(|e| EngineError::RuleFile(format!("TOML parse error: {e}")))?,
    };
    for rule in &file.rules {
        rule.validate()?;
    }
    Ok(file.rules)
}

/// Load every `.yaml`, `.yml` and `.toml` file in `dir`, in file name order.
/// Other files are ignored. Subdirectories are not descended into.
pub fn load_rules_from_dir(dir: &Path) -> Result<Vec<RemediationRule>, EngineError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        EngineError::RuleFile(format!("cannot read directory {}: {e}", dir.display()))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| EngineError::RuleFile(e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(RuleFormat::from_extension);
        if let Some(format) = format {
            paths.push((path, format));
        } else {
            debug!(path = %path.display(), "skipping non-rule file");
        }
    }
    paths.sort_by(|a, b| a.0.cmp(&b.0));

    let mut rules = Vec::new();
    for (path, format) in paths {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| EngineError::RuleFile(format!("cannot read {}: {e}", path.display())))?;
        let loaded = load_rules_from_str(&content, format).map_err(|e| match e {
            EngineError::RuleFile(msg) => EngineError::RuleFile(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        info!(path = %path.display(), count = loaded.len(), "loaded rule file");
        rules.extend(loaded);
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use remedy_core::{ActionType, FailurePolicy, TriggerType};

    use super::*;

    const YAML: &str = r#"
rules:
  - name: restart-on-backoff
    trigger:
      type: event
      event_types: [Warning]
      filters:
        reason: [BackOff, CrashLoopBackOff]
    actions:
      - type: restart_pod
        grace_period_seconds: 15
      - type: notify
        order: 1
        on_failure: continue
        message: "pod restarted"
    cooldown_seconds: 120
    scope:
      clusters: ["*"]
      namespaces: [default]
"#;

    const TOML: &str = r#"
[[rules]]
name = "nightly-scale-down"

[rules.trigger]
type = "schedule"
schedule = "0 22 * * *"

[[rules.actions]]
type = "scale"
replicas = 0
on_failure = "retry"
max_retries = 2

[rules.actions.target]
from = "named"
kind = "deployment"
name = "batch"
namespace = "jobs"
"#;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("remedy-loader-{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parses_yaml() {
        let rules = load_rules_from_str(YAML, RuleFormat::Yaml).unwrap();
        assert_eq!(rules.len(), 1);
        let rule = &rules[0];
        assert_eq!(rule.trigger.trigger_type, TriggerType::Event);
        assert_eq!(rule.actions.len(), 2);
        assert_eq!(rule.actions[1].on_failure, FailurePolicy::Continue);
        assert_eq!(rule.cooldown_seconds, Some(120));
        assert!(rule.scope.allows("anything", "default"));
    }

    #[test]
    fn parses_toml() {
        let rules = load_rules_from_str(TOML, RuleFormat::Toml).unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].trigger.trigger_type, TriggerType::Schedule);
        assert_eq!(rules[0].actions[0].action_type(), ActionType::Scale);
        assert_eq!(rules[0].actions[0].max_retries, 2);
    }

    #[test]
    fn invalid_rule_is_rejected() {
        let yaml = r#"
rules:
  - name: broken
    trigger:
      type: schedule
      schedule: "every tuesday"
    actions:
      - type: cordon
"#;
        let err = load_rules_from_str(yaml, RuleFormat::Yaml).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn malformed_document_is_a_file_error() {
        let err = load_rules_from_str("rules: [", RuleFormat::Yaml).unwrap_err();
        assert!(matches!(err, EngineError::RuleFile(_)));
    }

    #[test]
    fn loads_directory_and_skips_other_files() {
        let dir = scratch_dir("dir");
        std::fs::write(dir.join("a.yaml"), YAML).unwrap();
        std::fs::write(dir.join("b.toml"), TOML).unwrap();
        std::fs::write(dir.join("README.md"), "not rules").unwrap();

        let rules = load_rules_from_dir(&dir).unwrap();
        let names: Vec<_> = rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["restart-on-backoff", "nightly-scale-down"]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_directory_errors() {
        let err = load_rules_from_dir(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, EngineError::RuleFile(_)));
    }
}

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigIssue, GuideError};
use crate::model::context_model::{Context, ContextKey, ContextKind, Flow};
use crate::model::identifier_model::{NativeIdentifier, WebIdentifier};

// ============================================================================
// Configuration snapshot
// ============================================================================

/// Immutable guidance configuration for one session.
///
/// Loaded once before detection starts, optionally extended with
/// sub-configurations through [`Configuration::merge`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    #[serde(default)]
    pub assists: Vec<Context>,
    #[serde(default)]
    pub discoveries: Vec<Context>,
    #[serde(default)]
    pub flows: Vec<Flow>,
    #[serde(default)]
    pub native_identifiers: BTreeMap<String, NativeIdentifier>,
    #[serde(default)]
    pub web_identifiers: BTreeMap<String, WebIdentifier>,
}

impl Configuration {
    /// Parse a JSON document.
    pub fn from_json(text: &str) -> Result<Self, GuideError> {
        let config: Configuration =
            serde_json::from_str(text).map_err(|e| GuideError::Json {
                context: "guidance configuration".into(),
                source: e,
            })?;
        Ok(config.normalized())
    }

    /// Parse a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, GuideError> {
        let config: Configuration =
            serde_yaml::from_str(text).map_err(|e| GuideError::Yaml {
                context: "guidance configuration".into(),
                source: e,
            })?;
        Ok(config.normalized())
    }

    /// Parse a configuration file without validating it. `.json` files are
    /// parsed as JSON, everything else as YAML.
    pub fn read(path: &Path) -> Result<Self, GuideError> {
        let text = std::fs::read_to_string(path).map_err(|e| GuideError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json(&text),
            _ => Self::from_yaml(&text),
        }
    }

    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> Result<Self, GuideError> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Stamp each context with the kind of list it came from.
    pub fn normalized(mut self) -> Self {
        for assist in &mut self.assists {
            assist.kind = ContextKind::Assist;
        }
        for discovery in &mut self.discoveries {
            discovery.kind = ContextKind::Discovery;
        }
        self
    }

    /// Append a sub-configuration. Definitions in `other` replace existing
    /// ones with the same id (contexts, flows) or name (identifiers).
    pub fn merge(&mut self, other: Configuration) {
        let other = other.normalized();

        merge_by(&mut self.assists, other.assists, |c| c.id);
        merge_by(&mut self.discoveries, other.discoveries, |c| c.id);
        merge_by(&mut self.flows, other.flows, |f| f.id);
        self.native_identifiers.extend(other.native_identifiers);
        self.web_identifiers.extend(other.web_identifiers);
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    pub fn flow(&self, id: i64) -> Option<&Flow> {
        self.flows.iter().find(|f| f.id == id)
    }

    pub fn context(&self, key: ContextKey) -> Option<&Context> {
        let list = match key.kind {
            ContextKind::Assist => &self.assists,
            ContextKind::Discovery => &self.discoveries,
        };
        list.iter().find(|c| c.id == key.id)
    }

    pub fn native_identifier(&self, id: &str) -> Option<&NativeIdentifier> {
        self.native_identifiers.get(id)
    }

    pub fn web_identifier(&self, id: &str) -> Option<&WebIdentifier> {
        self.web_identifiers.get(id)
    }

    // ------------------------------------------------------------------------
    // Fingerprint
    // ------------------------------------------------------------------------

    /// SHA-1 over the canonical JSON encoding.
    pub fn fingerprint(&self) -> String {
        use sha1::{Digest, Sha1};

        // BTreeMaps keep key order stable; Vec order is part of the config.
        let encoded = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha1::new();
        hasher.update(&encoded);
        format!("{:x}", hasher.finalize())
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    /// Reject graphs the engine cannot interpret.
    ///
    /// Missing identifier references are deliberately not reported: they
    /// fail at detection time instead.
    pub fn validate(&self) -> Result<(), GuideError> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(GuideError::InvalidConfiguration(issues))
        }
    }

    pub fn issues(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        check_contexts(&self.assists, "assist", &mut issues);
        check_contexts(&self.discoveries, "discovery", &mut issues);

        let flow_ids: HashSet<i64> = self.flows.iter().map(|f| f.id).collect();
        if flow_ids.len() != self.flows.len() {
            issues.push(issue("flows", "duplicate flow id"));
        }

        for discovery in &self.discoveries {
            if let Some(flow_id) = discovery.flow_id {
                if !flow_ids.contains(&flow_id) {
                    issues.push(issue(
                        &format!("discovery {}", discovery.id),
                        &format!("references unknown flow {}", flow_id),
                    ));
                }
            }
        }

        for flow in &self.flows {
            let location = format!("flow {}", flow.id);
            if flow.pages.is_empty() {
                issues.push(issue(&location, "has no pages"));
            }

            let mut page_names = HashSet::new();
            for page in &flow.pages {
                let page_location = format!("{} / page {:?}", location, page.name);
                if !page_names.insert(page.name.as_str()) {
                    issues.push(issue(&page_location, "duplicate page name"));
                }
                if !page.weight.is_finite() {
                    issues.push(issue(&page_location, "weight is not a finite number"));
                }

                let mut stage_names = HashSet::new();
                for stage in &page.stages {
                    let stage_location = format!("{} / stage {:?}", page_location, stage.name);
                    if !stage_names.insert(stage.name.as_str()) {
                        issues.push(issue(&stage_location, "duplicate stage name"));
                    }
                    if !stage.weight.is_finite() {
                        issues.push(issue(&stage_location, "weight is not a finite number"));
                    }
                    if let Some(n) = stage.termination_frequency.per_flow {
                        if n == 0 || n < -1 {
                            issues.push(issue(
                                &stage_location,
                                &format!("perFlow must be positive or -1, got {}", n),
                            ));
                        }
                    }
                    if let Some(branch) = stage.branch_flow_id {
                        if !flow_ids.contains(&branch) {
                            issues.push(issue(
                                &stage_location,
                                &format!("branches to unknown flow {}", branch),
                            ));
                        }
                    }
                }
            }
        }

        issues
    }
}

fn check_contexts(contexts: &[Context], label: &str, issues: &mut Vec<ConfigIssue>) {
    let mut seen = HashSet::new();
    for context in contexts {
        let location = format!("{} {}", label, context.id);
        if !seen.insert(context.id) {
            issues.push(issue(&location, "duplicate id"));
        }
        if !context.weight.is_finite() {
            issues.push(issue(&location, "weight is not a finite number"));
        }
    }
}

fn issue(location: &str, message: &str) -> ConfigIssue {
    ConfigIssue {
        location: location.to_string(),
        message: message.to_string(),
    }
}

fn merge_by<T, K: PartialEq>(existing: &mut Vec<T>, incoming: Vec<T>, key: impl Fn(&T) -> K) {
    for item in incoming {
        match existing.iter().position(|e| key(e) == key(&item)) {
            Some(idx) => existing[idx] = item,
            None => existing.push(item),
        }
    }
}

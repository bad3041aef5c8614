//! Control-Plane Operations (§2 item 11, SPEC_FULL.md supplement): definition
//! CRUD/activation/validation, template CRUD/instantiation, and a minimal
//! analytics aggregate.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use petgraph::graphmap::DiGraphMap;
use strsim::levenshtein;
use thiserror::Error;

use strata_domain::definition::WorkflowDefinition;
use strata_domain::ids::{OrganizationId, TemplateId, TriggerId, WorkflowId};
use strata_domain::instance::InstanceStatus;
use strata_domain::step::WorkflowStep;
use strata_domain::template::WorkflowTemplate;
use strata_domain::trigger::{TriggerDefinition, WorkflowTrigger};

use crate::repository::definition::{DefinitionRepository, RepositoryError as DefinitionRepoError};
use crate::repository::instance::{InstanceRepository, RepositoryError as InstanceRepoError};
use crate::repository::trigger::TriggerRepository;
use crate::store::{collections, Store, StoreError, StoredDocument};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Definition(#[from] DefinitionRepoError),
    #[error(transparent)]
    Instance(#[from] InstanceRepoError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("template not found: {0}")]
    TemplateNotFound(TemplateId),
}

/// One validation finding. `message` carries a Levenshtein-nearest-neighbor
/// suggestion for unreachable-target typos when one is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// `validateDefinition` (SPEC_FULL.md supplement): step-ID uniqueness,
/// transition-target existence (with typo suggestions), reachability from
/// the entry step, and each variable's default value against its own
/// `validation` JSON Schema, where one is given. Cycles are explicitly
/// legal (§9) and are never flagged.
#[must_use]
pub fn validate_definition(definition: &WorkflowDefinition) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen_ids: HashSet<&str> = HashSet::new();

    for step in &definition.steps {
        if !seen_ids.insert(step.id.as_str()) {
            issues.push(ValidationIssue {
                severity: IssueSeverity::Error,
                message: format!("duplicate step id: {}", step.id),
            });
        }
    }

    let all_ids: HashSet<&str> = definition.steps.iter().map(|s| s.id.as_str()).collect();
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for step in &definition.steps {
        graph.add_node(step.id.as_str());
        for transition in step_targets(step) {
            if all_ids.contains(transition) {
                graph.add_edge(step.id.as_str(), transition, ());
            } else {
                let suggestion = nearest_step_id(transition, &all_ids);
                issues.push(ValidationIssue {
                    severity: IssueSeverity::Error,
                    message: suggestion.map_or_else(
                        || format!("step '{}' transitions to unknown step '{transition}'", step.id),
                        |s| format!("step '{}' transitions to unknown step '{transition}' (did you mean '{s}'?)", step.id),
                    ),
                });
            }
        }
    }

    if let Some(entry) = definition.entry_step() {
        let reachable: HashSet<&str> = petgraph::algo::dijkstra(&graph, entry.id.as_str(), None, |_| 1)
            .into_keys()
            .collect();
        for step in &definition.steps {
            if !reachable.contains(step.id.as_str()) {
                issues.push(ValidationIssue {
                    severity: IssueSeverity::Warning,
                    message: format!("step '{}' is unreachable from the entry step", step.id),
                });
            }
        }
    } else if !definition.steps.is_empty() {
        issues.push(ValidationIssue {
            severity: IssueSeverity::Error,
            message: "definition has steps but no identifiable entry step".to_string(),
        });
    }

    for (name, schema) in &definition.variable_schema {
        let (Some(default_value), Some(validation_schema)) = (&schema.default_value, &schema.validation) else {
            continue;
        };
        match jsonschema::validator_for(validation_schema) {
            Ok(validator) if !validator.is_valid(default_value) => issues.push(ValidationIssue {
                severity: IssueSeverity::Error,
                message: format!("variable '{name}' default value does not satisfy its validation schema"),
            }),
            Ok(_) => {}
            Err(e) => issues.push(ValidationIssue {
                severity: IssueSeverity::Error,
                message: format!("variable '{name}' has an invalid validation schema: {e}"),
            }),
        }
    }

    issues
}

fn step_targets(step: &WorkflowStep) -> Vec<&str> {
    let mut targets: Vec<&str> = step.transitions.iter().map(|t| t.target_step_id.as_str()).collect();
    if let Some(policy) = &step.on_error {
        if let Some(fallback) = &policy.fallback_step_id {
            targets.push(fallback.as_str());
        }
    }
    targets
}

fn nearest_step_id<'a>(target: &str, candidates: &HashSet<&'a str>) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, levenshtein(target, c)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(c, _)| c)
}

/// Definition and template control operations, consuming the lower-level
/// repositories.
pub struct ControlPlane {
    definitions: DefinitionRepository,
    triggers: TriggerRepository,
    instances: InstanceRepository,
    store: Arc<dyn Store>,
}

impl ControlPlane {
    #[must_use]
    pub fn new(
        definitions: DefinitionRepository,
        triggers: TriggerRepository,
        instances: InstanceRepository,
        store: Arc<dyn Store>,
    ) -> Self {
        Self { definitions, triggers, instances, store }
    }

    pub async fn create_definition(&self, definition: &WorkflowDefinition) -> Result<(), ControlError> {
        self.definitions.save(definition).await?;
        Ok(())
    }

    /// Activate a version, registering its event triggers and deactivating
    /// any other active version of the same workflow (Testable Property 4).
    pub async fn activate_definition(
        &self,
        organization_id: OrganizationId,
        workflow_id: WorkflowId,
        version: i64,
    ) -> Result<(), ControlError> {
        self.definitions.activate(organization_id, workflow_id, version).await?;
        self.triggers.unregister_by_workflow(organization_id, workflow_id).await.ok();

        let definition = self.definitions.get(organization_id, workflow_id, version).await?;
        for trigger in &definition.triggers {
            if trigger.trigger_type == strata_domain::trigger::TriggerType::Event && trigger.is_active {
                if let Some(event_type) = &trigger.event_type {
                    let registry_entry = WorkflowTrigger {
                        trigger_id: TriggerId::new(),
                        workflow_id,
                        workflow_version: version,
                        is_active: true,
                        event_type: event_type.clone(),
                        event_filter: trigger.event_filter.clone(),
                        extract_variables: trigger.extract_variables.clone(),
                        priority: trigger.priority.unwrap_or(0),
                    };
                    self.triggers.register(&registry_entry, organization_id).await.ok();
                }
            }
        }
        Ok(())
    }

    pub async fn deactivate_definition(
        &self,
        organization_id: OrganizationId,
        workflow_id: WorkflowId,
        version: i64,
    ) -> Result<(), ControlError> {
        self.definitions.deactivate(organization_id, workflow_id, version).await?;
        self.triggers.unregister_by_workflow(organization_id, workflow_id).await.ok();
        Ok(())
    }

    pub async fn save_template(&self, template: &WorkflowTemplate) -> Result<(), ControlError> {
        let id = template.template_id.to_string();
        let existing = self.store.get(collections::TEMPLATES, &id, &id).await?;
        let store_version = existing.map_or(0, |d| d.version);
        self.store
            .upsert(
                collections::TEMPLATES,
                StoredDocument {
                    id: id.clone(),
                    partition_key: id,
                    version: store_version,
                    data: serde_json::to_value(template)?,
                },
            )
            .await?;
        Ok(())
    }

    pub async fn get_template(&self, template_id: TemplateId) -> Result<WorkflowTemplate, ControlError> {
        let doc = self
            .store
            .get(collections::TEMPLATES, &template_id.to_string(), &template_id.to_string())
            .await?
            .ok_or(ControlError::TemplateNotFound(template_id))?;
        Ok(serde_json::from_value(doc.data)?)
    }

    /// `instantiateTemplate` (Testable Property 8): every produced step and
    /// trigger ID is fresh, and every internal reference to them is rewritten
    /// consistently.
    pub async fn instantiate_template(
        &self,
        template_id: TemplateId,
        organization_id: OrganizationId,
        name: String,
        variable_overrides: HashMap<String, serde_json::Value>,
    ) -> Result<WorkflowDefinition, ControlError> {
        let template = self.get_template(template_id).await?;
        let id_map: HashMap<String, String> = template
            .base
            .steps
            .iter()
            .map(|s| (s.id.clone(), fresh_step_id()))
            .collect();

        let steps: Vec<WorkflowStep> = template
            .base
            .steps
            .iter()
            .map(|step| rewrite_step(step, &id_map))
            .collect();

        let triggers: Vec<TriggerDefinition> = template
            .base
            .triggers
            .iter()
            .map(|t| TriggerDefinition { id: fresh_step_id(), ..t.clone() })
            .collect();

        let mut variable_schema = template.base.variable_schema.clone();
        for (key, value) in &variable_overrides {
            if let Some(schema) = variable_schema.get_mut(key) {
                schema.default_value = Some(value.clone());
            }
        }

        let definition = WorkflowDefinition {
            workflow_id: WorkflowId::new(),
            version: 1,
            name,
            description: template.description.clone(),
            status: strata_domain::definition::DefinitionStatus::Draft,
            organization_id,
            triggers,
            steps,
            variable_schema,
            settings: template.base.settings.clone(),
            tags: vec![],
            category: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: None,
            is_deleted: false,
        };
        self.definitions.save(&definition).await?;
        Ok(definition)
    }

    /// Minimal analytics aggregate: instance counts by status for an organization.
    pub async fn instance_status_counts(
        &self,
        organization_id: OrganizationId,
    ) -> Result<HashMap<InstanceStatus, usize>, ControlError> {
        let instances = self.instances.list_by_workflow(organization_id).await?;
        let mut counts = HashMap::new();
        for instance in instances {
            *counts.entry(instance.status).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

fn fresh_step_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn rewrite_step(step: &WorkflowStep, id_map: &HashMap<String, String>) -> WorkflowStep {
    let mut rewritten = step.clone();
    rewritten.id = id_map.get(&step.id).cloned().unwrap_or_else(|| step.id.clone());
    for transition in &mut rewritten.transitions {
        if let Some(fresh) = id_map.get(&transition.target_step_id) {
            transition.target_step_id = fresh.clone();
        }
    }
    if let Some(policy) = &mut rewritten.on_error {
        if let Some(fallback) = &policy.fallback_step_id {
            if let Some(fresh) = id_map.get(fallback) {
                policy.fallback_step_id = Some(fresh.clone());
            }
        }
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_domain::step::{SetVariableConfig, StepKind, TransitionRule};

    fn step(id: &str, order: i64, targets: Vec<&str>) -> WorkflowStep {
        WorkflowStep {
            id: id.to_string(),
            name: id.to_string(),
            kind: StepKind::SetVariable(SetVariableConfig { variables: serde_json::json!({}) }),
            order,
            is_enabled: true,
            transitions: targets
                .into_iter()
                .map(|t| TransitionRule {
                    target_step_id: t.to_string(),
                    condition: None,
                    is_default: None,
                    priority: None,
                })
                .collect(),
            on_error: None,
            timeout_seconds: None,
        }
    }

    fn definition(steps: Vec<WorkflowStep>) -> WorkflowDefinition {
        WorkflowDefinition {
            workflow_id: WorkflowId::new(),
            version: 1,
            name: "test".to_string(),
            description: None,
            status: strata_domain::definition::DefinitionStatus::Draft,
            organization_id: OrganizationId::new(),
            triggers: vec![],
            steps,
            variable_schema: HashMap::new(),
            settings: strata_domain::common::WorkflowSettings::default(),
            tags: vec![],
            category: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            created_by: None,
            is_deleted: false,
        }
    }

    #[test]
    fn detects_duplicate_step_ids() {
        let def = definition(vec![step("a", 0, vec![]), step("a", 1, vec![])]);
        let issues = validate_definition(&def);
        assert!(issues.iter().any(|i| i.message.contains("duplicate step id")));
    }

    #[test]
    fn detects_unknown_transition_target_with_suggestion() {
        let def = definition(vec![step("start", 0, vec!["finsh"]), step("finish", 1, vec![])]);
        let issues = validate_definition(&def);
        assert!(issues.iter().any(|i| i.message.contains("did you mean 'finish'")));
    }

    #[test]
    fn detects_unreachable_step() {
        let def = definition(vec![step("start", 0, vec![]), step("orphan", 1, vec![])]);
        let issues = validate_definition(&def);
        assert!(issues.iter().any(|i| i.message.contains("orphan") && i.message.contains("unreachable")));
    }

    #[test]
    fn cycles_are_not_flagged() {
        let def = definition(vec![step("a", 0, vec!["b"]), step("b", 1, vec!["a"])]);
        let issues = validate_definition(&def);
        assert!(issues.is_empty());
    }

    #[test]
    fn flags_default_value_violating_its_validation_schema() {
        let mut def = definition(vec![step("start", 0, vec![])]);
        def.variable_schema.insert(
            "amount".to_string(),
            strata_domain::common::VariableSchema {
                var_type: "number".to_string(),
                required: false,
                default_value: Some(serde_json::json!(-5)),
                validation: Some(serde_json::json!({ "type": "number", "minimum": 0 })),
            },
        );
        let issues = validate_definition(&def);
        assert!(issues.iter().any(|i| i.message.contains("amount") && i.message.contains("validation schema")));
    }

    #[test]
    fn passes_default_value_satisfying_its_validation_schema() {
        let mut def = definition(vec![step("start", 0, vec![])]);
        def.variable_schema.insert(
            "amount".to_string(),
            strata_domain::common::VariableSchema {
                var_type: "number".to_string(),
                required: false,
                default_value: Some(serde_json::json!(5)),
                validation: Some(serde_json::json!({ "type": "number", "minimum": 0 })),
            },
        );
        let issues = validate_definition(&def);
        assert!(!issues.iter().any(|i| i.message.contains("amount")));
    }

    fn control_plane() -> ControlPlane {
        let store: Arc<dyn crate::store::Store> = Arc::new(crate::store::InMemoryStore::new());
        ControlPlane::new(
            DefinitionRepository::new(store.clone()),
            TriggerRepository::new(store.clone()),
            InstanceRepository::new(store.clone()),
            store,
        )
    }

    fn template() -> WorkflowTemplate {
        WorkflowTemplate {
            template_id: TemplateId::new(),
            name: "lead intake".to_string(),
            description: None,
            base: strata_domain::template::TemplateBase {
                triggers: vec![],
                steps: vec![
                    step("start", 0, vec!["finish"]),
                    step("finish", 1, vec![]),
                ],
                variable_schema: HashMap::new(),
                settings: strata_domain::common::WorkflowSettings::default(),
            },
            required_variables: vec![],
            config_schema: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn instantiate_template_mints_fresh_unique_step_ids() {
        let control = control_plane();
        let template = template();
        control.save_template(&template).await.unwrap();
        let org = OrganizationId::new();

        let first = control
            .instantiate_template(template.template_id, org, "first".to_string(), HashMap::new())
            .await
            .unwrap();
        let second = control
            .instantiate_template(template.template_id, org, "second".to_string(), HashMap::new())
            .await
            .unwrap();

        let original_ids: HashSet<&str> = ["start", "finish"].into_iter().collect();
        let mut seen: HashSet<String> = HashSet::new();
        for definition in [&first, &second] {
            for step in &definition.steps {
                assert!(!original_ids.contains(step.id.as_str()));
                assert!(seen.insert(step.id.clone()), "step id {} reused across instantiations", step.id);
            }
        }

        let start = first.steps.iter().find(|s| s.name == "start").unwrap();
        assert_eq!(start.transitions[0].target_step_id, first.steps.iter().find(|s| s.name == "finish").unwrap().id);
    }
}

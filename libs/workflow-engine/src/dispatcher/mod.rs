//! Event Dispatcher (§2 item 10, §4.5): inbound-event fan-in to new instances.

use chrono::Utc;
use serde_json::{Map, Value};

use strata_domain::ids::{InstanceId, OrganizationId, WorkflowId};
use strata_domain::instance::{InstanceStatus, WorkflowInstance};
use strata_domain::trigger::{TriggerType, WorkflowTrigger};

use crate::expression::resolve_path;
use crate::orchestrator::{Orchestrator, OrchestratorError};
use crate::repository::instance::InstanceRepository;
use crate::repository::trigger::{RepositoryError as TriggerRepoError, TriggerRepository};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error(transparent)]
    Trigger(#[from] TriggerRepoError),
    #[error(transparent)]
    Instance(#[from] crate::repository::instance::RepositoryError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
}

/// One inbound event, per §6's "Inbound event shape".
pub struct InboundEvent {
    pub event_type: String,
    pub data: Value,
}

pub struct EventDispatcher {
    triggers: TriggerRepository,
    instances: InstanceRepository,
    orchestrator: Orchestrator,
}

impl EventDispatcher {
    #[must_use]
    pub fn new(triggers: TriggerRepository, instances: InstanceRepository, orchestrator: Orchestrator) -> Self {
        Self { triggers, instances, orchestrator }
    }

    /// Dispatch one inbound event (§4.5). Returns the instances created.
    pub async fn dispatch(
        &self,
        organization_id: OrganizationId,
        event: &InboundEvent,
    ) -> Result<Vec<InstanceId>, DispatchError> {
        let triggers = self.triggers.find_by_event_type(organization_id, &event.event_type).await?;
        let mut created = Vec::new();

        for trigger in &triggers {
            if !matches_filter(trigger, &event.data) {
                continue;
            }
            let variables = extract_variables(trigger, &event.data);
            let instance = WorkflowInstance {
                instance_id: InstanceId::new(),
                workflow_id: trigger.workflow_id,
                workflow_version: trigger.workflow_version,
                organization_id,
                trigger_id: Some(trigger.trigger_id),
                trigger_type: Some(TriggerType::Event),
                trigger_data: event.data.clone(),
                status: InstanceStatus::Pending,
                current_step_id: None,
                step_executions: vec![],
                variables,
                completed_step_ids: vec![],
                correlation_id: None,
                parent_instance_id: None,
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
                last_error: None,
                initiated_by: None,
                activity_log: vec![],
                current_stage: None,
                progress_percent: None,
                version: 0,
            };
            let saved = self.instances.save(&instance).await?;
            self.orchestrator.execute_workflow(organization_id, saved.instance_id).await?;
            created.push(saved.instance_id);
        }

        Ok(created)
    }
}

/// `data.x.y op literal` (§4.5, §6 "bit-exact" grammar). Absence matches.
/// Parse failures default to match (logged).
fn matches_filter(trigger: &WorkflowTrigger, data: &Value) -> bool {
    let Some(filter) = &trigger.event_filter else { return true };
    match parse_filter(filter) {
        Some((path, op, literal)) => {
            let root = Value::Object({
                let mut m = Map::new();
                m.insert("data".to_string(), data.clone());
                m
            });
            let left = resolve_path(&path, &root);
            compare(op, left, &literal)
        }
        None => {
            tracing::warn!(filter, "failed to parse event filter; defaulting to match");
            true
        }
    }
}

fn parse_filter(filter: &str) -> Option<(String, &'static str, Value)> {
    for op in ["==", "!=", ">=", "<=", ">", "<"] {
        if let Some((path, literal)) = filter.split_once(op) {
            let path = path.trim().to_string();
            let literal = parse_literal(literal.trim());
            return Some((path, op, literal));
        }
    }
    None
}

fn parse_literal(s: &str) -> Value {
    if let Some(stripped) = s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        return Value::String(stripped.to_string());
    }
    if let Some(stripped) = s.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        return Value::String(stripped.to_string());
    }
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        "null" => Value::Null,
        _ => s.parse::<f64>().map_or_else(
            |_| Value::String(s.to_string()),
            |n| serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number),
        ),
    }
}

fn compare(op: &str, left: Option<&Value>, right: &Value) -> bool {
    let Some(left) = left else { return false };
    if let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) {
        return match op {
            "==" => (a - b).abs() < f64::EPSILON,
            "!=" => (a - b).abs() >= f64::EPSILON,
            ">" => a > b,
            ">=" => a >= b,
            "<" => a < b,
            "<=" => a <= b,
            _ => false,
        };
    }
    match op {
        "==" => left == right,
        "!=" => left != right,
        _ => false,
    }
}

fn extract_variables(trigger: &WorkflowTrigger, data: &Value) -> Map<String, Value> {
    let root = Value::Object({
        let mut m = Map::new();
        m.insert("data".to_string(), data.clone());
        m
    });
    let mut variables = Map::new();
    for (name, path) in &trigger.extract_variables {
        let resolved = path
            .strip_prefix("$.")
            .and_then(|rest| resolve_path(rest, &root))
            .cloned()
            .unwrap_or(Value::Null);
        variables.insert(name.clone(), resolved);
    }
    variables
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::logging_publisher;
    use crate::executor::StepDispatcher;
    use crate::repository::DefinitionRepository;
    use crate::store::InMemoryStore;
    use chrono::Utc as ChronoUtc;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;
    use strata_common::clock::system_clock;
    use strata_domain::definition::{DefinitionStatus, WorkflowDefinition};
    use strata_domain::ids::TriggerId;
    use strata_domain::step::{StepKind, WorkflowStep};

    async fn dispatcher_with_trigger(
        org: OrganizationId,
        filter: Option<&str>,
    ) -> (EventDispatcher, WorkflowId) {
        let store: Arc<dyn crate::store::Store> = Arc::new(InMemoryStore::new());
        let definitions = DefinitionRepository::new(store.clone());
        let instances = InstanceRepository::new(store.clone());
        let triggers = TriggerRepository::new(store.clone());

        let workflow_id = WorkflowId::new();
        let step = WorkflowStep {
            id: "s1".to_string(),
            name: "s1".to_string(),
            kind: StepKind::Terminate,
            order: 0,
            is_enabled: true,
            transitions: vec![],
            on_error: None,
            timeout_seconds: None,
        };
        let definition = WorkflowDefinition {
            workflow_id,
            version: 1,
            name: "lead intake".to_string(),
            description: None,
            status: DefinitionStatus::Active,
            organization_id: org,
            triggers: vec![],
            steps: vec![step],
            variable_schema: HashMap::new(),
            settings: strata_domain::common::WorkflowSettings::default(),
            tags: vec![],
            category: None,
            created_at: ChronoUtc::now(),
            updated_at: ChronoUtc::now(),
            created_by: None,
            is_deleted: false,
        };
        definitions.save(&definition).await.unwrap();

        let trigger = WorkflowTrigger {
            trigger_id: TriggerId::new(),
            workflow_id,
            workflow_version: 1,
            is_active: true,
            event_type: "lead.created".to_string(),
            event_filter: filter.map(str::to_string),
            extract_variables: {
                let mut m = HashMap::new();
                m.insert("leadId".to_string(), "$.data.leadId".to_string());
                m.insert("customerId".to_string(), "$.data.customerId".to_string());
                m
            },
            priority: 0,
        };
        triggers.register(&trigger, org).await.unwrap();

        let dispatcher = StepDispatcher::new(reqwest::Client::new(), logging_publisher(), store.clone());
        let orchestrator = Orchestrator::new(
            DefinitionRepository::new(store.clone()),
            InstanceRepository::new(store.clone()),
            dispatcher,
            logging_publisher(),
            system_clock(),
        );
        (EventDispatcher::new(TriggerRepository::new(store), instances, orchestrator), workflow_id)
    }

    #[tokio::test]
    async fn scenario_f_matching_filter_creates_instance_with_extracted_variables() {
        let org = OrganizationId::new();
        let (dispatcher, _workflow_id) = dispatcher_with_trigger(org, Some("data.lineOfBusiness == \"medical\"")).await;
        let event = InboundEvent {
            event_type: "lead.created".to_string(),
            data: json!({"leadId": "L7", "lineOfBusiness": "medical", "customerId": "C9"}),
        };
        let created = dispatcher.dispatch(org, &event).await.unwrap();
        assert_eq!(created.len(), 1);
    }

    #[tokio::test]
    async fn scenario_f_non_matching_filter_creates_zero_instances() {
        let org = OrganizationId::new();
        let (dispatcher, _workflow_id) = dispatcher_with_trigger(org, Some("data.lineOfBusiness == \"medical\"")).await;
        let event = InboundEvent {
            event_type: "lead.created".to_string(),
            data: json!({"leadId": "L8", "lineOfBusiness": "motor", "customerId": "C10"}),
        };
        let created = dispatcher.dispatch(org, &event).await.unwrap();
        assert_eq!(created.len(), 0);
    }
}

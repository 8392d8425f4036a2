#![allow(dead_code)]

use process_manager::notify::BroadcastRelay;
use process_manager::process::registry::DefinitionRegistry;
use process_manager::storage::MemoryStore;
use process_manager::{
    Actor, DefinitionDraft, Element, ElementKind, ProcessEngine, ProcessInstance, Role, Transition,
};
use std::sync::Arc;

/// Engine over an in-memory store, with handles on its collaborators
pub struct Harness {
    pub engine: ProcessEngine,
    pub store: Arc<MemoryStore>,
    pub relay: BroadcastRelay,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let relay = BroadcastRelay::new(64);
        let engine = ProcessEngine::new(
            store.clone(),
            Arc::new(DefinitionRegistry::new()),
            Arc::new(relay.clone()),
        );
        Self {
            engine,
            store,
            relay,
        }
    }

    /// Publish the purchase order process as a manager and return its id
    pub async fn publish_purchase_order(&self) -> String {
        self.engine
            .publish_definition(purchase_order("ops"), &manager())
            .await
            .unwrap()
            .applied()
            .expect("manager publishes directly")
            .definition
            .id
    }

    /// Instance advanced by an employee until it sits on the manager review task
    pub async fn instance_at_review(&self, definition_id: &str, name: &str) -> ProcessInstance {
        let employee = employee();
        let instance = self
            .engine
            .create_instance(definition_id, name, &employee)
            .await
            .unwrap();
        self.engine.advance(&instance.id, &employee).await.unwrap();
        let at_review = self
            .engine
            .advance(&instance.id, &employee)
            .await
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(at_review.position, "Task_Review");
        at_review
    }
}

pub fn employee() -> Actor {
    Actor::new("u-emp", "Erin", Role::Employee)
}

pub fn manager() -> Actor {
    Actor::new("u-mgr", "Mia", Role::Manager)
}

pub fn admin() -> Actor {
    Actor::new("u-adm", "Ada", Role::Admin)
}

pub fn element(id: &str, kind: ElementKind, role: Option<Role>, description: &str) -> Element {
    Element {
        id: id.into(),
        name: Some(id.replace('_', " ")),
        kind,
        role,
        description: description.into(),
    }
}

/// Start -> fill form -> manager review -> decision gateway -> approved | rejected
///
/// The rejected end event belongs to managers so employees sitting on it can be
/// checked against gating at a sink.
pub fn purchase_order(project: &str) -> DefinitionDraft {
    DefinitionDraft {
        name: "Purchase order".into(),
        project: project.into(),
        elements: vec![
            element("StartEvent_1", ElementKind::StartEvent, Some(Role::Employee), "Order requested"),
            element("Task_Fill", ElementKind::Task, Some(Role::Employee), "Fill in the order form"),
            element("Task_Review", ElementKind::Task, Some(Role::Manager), "Review the order"),
            element("Gateway_Decision", ElementKind::Gateway, Some(Role::Manager), "Approve or reject"),
            element("EndEvent_Ok", ElementKind::EndEvent, Some(Role::Employee), "Order placed"),
            element("EndEvent_Rejected", ElementKind::EndEvent, Some(Role::Manager), "Order rejected"),
            element("Flow_1", ElementKind::SequenceFlow, None, ""),
        ],
        transitions: vec![
            Transition::new("StartEvent_1", "Task_Fill", Some("start")),
            Transition::new("Task_Fill", "Task_Review", Some("submit")),
            Transition::new("Task_Review", "Gateway_Decision", None),
            Transition::new("Gateway_Decision", "EndEvent_Ok", Some("approve")),
            Transition::new("Gateway_Decision", "EndEvent_Rejected", Some("reject")),
        ],
        start_element: None,
        source: Some("<bpmn:definitions/>".into()),
    }
}

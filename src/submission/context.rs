use serde_json::{Map, Value};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::traits::ObserverRing;
use super::SubmitError;
use crate::models::{Category, EntityPath, FormData, School, UserProfile, ValidationRule};
use crate::notifications::NotificationService;
use crate::schema::SchemaOptions;
use crate::store::SharedStore;
use crate::types::SubmitIntent;

/// Owner's save or submit of a category's data for a school
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub category_id: Uuid,
    pub school_id: Uuid,
    #[serde(default)]
    pub data: Map<String, Value>,
    pub intent: SubmitIntent,
    #[serde(default)]
    pub existing_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub enum Operation {
    Submit(SubmitRequest),
    Approve { form_id: Uuid },
    Reject { form_id: Uuid, reason: Option<String> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Submit,
    Approve,
    Reject,
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Submit(_) => OperationKind::Submit,
            Operation::Approve { .. } => OperationKind::Approve,
            Operation::Reject { .. } => OperationKind::Reject,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            OperationKind::Submit => "submit",
            OperationKind::Approve => "approve",
            OperationKind::Reject => "reject",
        })
    }
}

/// State flowing through the submission rings
pub struct SubmissionContext {
    pub operation: Operation,
    pub actor: Option<UserProfile>,
    pub store: SharedStore,
    pub notifications: NotificationService,
    pub schema_options: SchemaOptions,
    pub cancel: CancellationToken,

    // Ring 0
    pub category: Option<Category>,
    pub rules: Vec<ValidationRule>,
    pub school: Option<School>,
    pub path: Option<EntityPath>,
    pub existing: Option<FormData>,

    // Rings 2-3
    pub validated: Option<Map<String, Value>>,
    pub record: Option<FormData>,

    // Ring 4
    pub result: Option<FormData>,

    pub start_time: Instant,
    pub current_ring: Option<ObserverRing>,
    pub warnings: Vec<String>,
}

impl SubmissionContext {
    pub fn new(
        operation: Operation,
        actor: Option<UserProfile>,
        store: SharedStore,
        notifications: NotificationService,
        schema_options: SchemaOptions,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            operation,
            actor,
            store,
            notifications,
            schema_options,
            cancel,
            category: None,
            rules: Vec::new(),
            school: None,
            path: None,
            existing: None,
            validated: None,
            record: None,
            result: None,
            start_time: Instant::now(),
            current_ring: None,
            warnings: Vec::new(),
        }
    }

    pub fn kind(&self) -> OperationKind {
        self.operation.kind()
    }

    pub fn actor_user_id(&self) -> Option<Uuid> {
        self.actor.as_ref().map(|p| p.user_id)
    }

    pub fn category(&self) -> Result<&Category, SubmitError> {
        self.category.as_ref().ok_or(SubmitError::NotFound("Category"))
    }

    pub fn school(&self) -> Result<&School, SubmitError> {
        self.school.as_ref().ok_or(SubmitError::NotFound("School"))
    }

    pub fn path(&self) -> Result<&EntityPath, SubmitError> {
        self.path.as_ref().ok_or(SubmitError::NotFound("School"))
    }

    pub fn record(&self) -> Result<&FormData, SubmitError> {
        self.record
            .as_ref()
            .ok_or_else(|| SubmitError::Internal("no record was prepared".to_string()))
    }
}

// Form submission orchestrator: submit, approve and reject run through an observer
// pipeline of ordered rings. See `traits::ObserverRing` for the ring order.

pub mod context;
pub mod error;
pub mod observers;
pub mod pipeline;
pub mod state;
pub mod traits;

pub use context::{Operation, OperationKind, SubmissionContext, SubmitRequest};
pub use error::SubmitError;
pub use pipeline::SubmissionPipeline;
pub use traits::{Observer, ObserverRing};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::models::{FormData, UserProfile};
use crate::notifications::{NotificationHub, NotificationService};
use crate::schema::SchemaOptions;
use crate::store::SharedStore;

#[derive(Clone)]
pub struct FormSubmissionService {
    store: SharedStore,
    notifications: NotificationService,
    pipeline: Arc<SubmissionPipeline>,
    schema_options: SchemaOptions,
}

impl FormSubmissionService {
    pub fn new(store: SharedStore, hub: NotificationHub) -> Self {
        Self {
            notifications: NotificationService::new(store.clone(), hub),
            store,
            pipeline: Arc::new(SubmissionPipeline::standard()),
            schema_options: SchemaOptions::from_config(),
        }
    }

    pub fn with_schema_options(mut self, options: SchemaOptions) -> Self {
        self.schema_options = options;
        self
    }

    pub fn with_pipeline(mut self, pipeline: SubmissionPipeline) -> Self {
        self.pipeline = Arc::new(pipeline);
        self
    }

    pub async fn submit(
        &self,
        actor: Option<&UserProfile>,
        request: SubmitRequest,
        cancel: CancellationToken,
    ) -> Result<FormData, SubmitError> {
        self.run(Operation::Submit(request), actor, cancel).await
    }

    pub async fn approve(
        &self,
        actor: Option<&UserProfile>,
        form_id: Uuid,
        cancel: CancellationToken,
    ) -> Result<FormData, SubmitError> {
        self.run(Operation::Approve { form_id }, actor, cancel).await
    }

    pub async fn reject(
        &self,
        actor: Option<&UserProfile>,
        form_id: Uuid,
        reason: Option<String>,
        cancel: CancellationToken,
    ) -> Result<FormData, SubmitError> {
        self.run(Operation::Reject { form_id, reason }, actor, cancel).await
    }

    async fn run(
        &self,
        operation: Operation,
        actor: Option<&UserProfile>,
        cancel: CancellationToken,
    ) -> Result<FormData, SubmitError> {
        let kind = operation.kind();
        let mut ctx = SubmissionContext::new(
            operation,
            actor.cloned(),
            self.store.clone(),
            self.notifications.clone(),
            self.schema_options.clone(),
            cancel,
        );

        let outcome = match self.pipeline.execute(&mut ctx).await {
            Ok(()) => ctx
                .result
                .take()
                .ok_or_else(|| SubmitError::Internal("pipeline finished without a result".to_string())),
            Err(e) => Err(e),
        };

        let who = actor.map(|p| p.user_id.to_string()).unwrap_or_else(|| "anonymous".to_string());
        match &outcome {
            Ok(form) => tracing::info!(
                "Form {} {}: status={} version={} by {} in {:?}",
                form.id,
                kind,
                form.status,
                form.version,
                who,
                ctx.start_time.elapsed()
            ),
            Err(e) => tracing::warn!("Form {} failed ({}) for {}: {}", kind, e.kind(), who, e),
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Category, CategoryScope, Column, ColumnType, ProfileInput, Region, School, SchoolInput, Sector,
    };
    use crate::store::{MemoryStore, Store};
    use crate::types::{FormStatus, Role, SubmitIntent};
    use serde_json::{json, Map, Value};

    struct Fixture {
        store: Arc<MemoryStore>,
        service: FormSubmissionService,
        hub: NotificationHub,
        category: Category,
        school: School,
        school_admin: UserProfile,
        sector_admin: UserProfile,
    }

    fn profile(role: Role, sector: Option<Uuid>, school: Option<Uuid>) -> UserProfile {
        UserProfile::from_input(ProfileInput {
            user_id: None,
            first_name: "T".into(),
            last_name: "U".into(),
            email: Some(format!("{}@example.com", Uuid::new_v4())),
            role,
            region_id: None,
            sector_id: sector,
            school_id: school,
        })
        .unwrap()
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let region = store.create_region(Region::new("Baku")).await.unwrap();
        let sector = store.create_sector(Sector::new("Nasimi", region.id)).await.unwrap();
        let school = store
            .create_school(School::from_input(SchoolInput {
                name: "School 20".into(),
                sector_id: sector.id,
                ..Default::default()
            }))
            .await
            .unwrap();

        let category = store
            .create_category(Category::new("Students", CategoryScope::Global, None))
            .await
            .unwrap();
        let mut count = Column::new(category.id, "Student Count", ColumnType::Number).required();
        count.order_index = 0;
        let mut email = Column::new(category.id, "Email", ColumnType::Email);
        email.order_index = 1;
        let mut notes = Column::new(category.id, "Notes", ColumnType::Textarea);
        notes.order_index = 2;
        let mut summary = Column::new(category.id, "Summary", ColumnType::Textarea).rich_text();
        summary.order_index = 3;
        for column in [count, email, notes, summary] {
            store.add_column(column).await.unwrap();
        }
        let category = store.get_category(category.id).await.unwrap().unwrap();

        let school_admin = store.create_profile(profile(Role::Schooladmin, None, Some(school.id))).await.unwrap();
        let sector_admin = store.create_profile(profile(Role::Sectoradmin, Some(sector.id), None)).await.unwrap();

        let hub = NotificationHub::new(32);
        let service = FormSubmissionService::new(store.clone(), hub.clone()).with_schema_options(SchemaOptions::default());
        Fixture {
            store,
            service,
            hub,
            category,
            school,
            school_admin,
            sector_admin,
        }
    }

    fn request(f: &Fixture, data: Value, intent: SubmitIntent) -> SubmitRequest {
        SubmitRequest {
            category_id: f.category.id,
            school_id: f.school.id,
            data: data.as_object().cloned().unwrap_or_else(Map::new),
            intent,
            existing_id: None,
        }
    }

    #[tokio::test]
    async fn submit_coerces_and_notifies_reviewers() {
        let f = fixture().await;
        let mut reviewer_stream = f.hub.subscribe("reviewer", f.sector_admin.user_id);

        let form = f
            .service
            .submit(
                Some(&f.school_admin),
                request(
                    &f,
                    json!({
                        "Student Count": "450",
                        "Notes": " <b>ok</b><script>x</script> ",
                        "Summary": "<b>ok</b><script>x</script>"
                    }),
                    SubmitIntent::Submit,
                ),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(form.status, FormStatus::Submitted);
        assert_eq!(form.data["Student Count"], json!(450));
        // Plain textareas lose all markup; only columns flagged rich text keep the allow-list
        assert_eq!(form.data["Notes"], json!("ok"));
        assert_eq!(form.data["Summary"], json!("<b>ok</b>"));
        assert!(form.submitted_at.is_some());

        assert_eq!(f.store.unread_count(f.sector_admin.user_id).await.unwrap(), 1);
        let first = reviewer_stream.next().await.unwrap();
        assert_eq!(first.name(), "notification_created");
        let versions = f.store.list_versions(form.id).await.unwrap();
        assert_eq!(versions.len(), 1);
    }

    #[tokio::test]
    async fn missing_required_number_is_reported_by_name() {
        let f = fixture().await;
        let err = f
            .service
            .submit(Some(&f.school_admin), request(&f, json!({"Student Count": ""}), SubmitIntent::Submit), CancellationToken::new())
            .await
            .unwrap_err();

        let SubmitError::Validation(errors) = err else {
            panic!("expected validation error, got {:?}", err);
        };
        assert_eq!(errors.to_map()["Student Count"], json!("Student Count is required"));
    }

    #[tokio::test]
    async fn invalid_data_never_reaches_the_store() {
        let f = fixture().await;
        let err = f
            .service
            .submit(
                Some(&f.school_admin),
                request(&f, json!({"Student Count": 10, "Email": "not-an-email"}), SubmitIntent::Submit),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::Validation(_)));
        assert!(f.store.find_form(f.category.id, f.school.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn other_schools_admins_are_denied() {
        let f = fixture().await;
        let outsider = profile(Role::Schooladmin, None, Some(Uuid::new_v4()));
        let err = f
            .service
            .submit(Some(&outsider), request(&f, json!({"Student Count": 1}), SubmitIntent::Draft), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, SubmitError::AccessDenied(crate::types::PermissionAction::SubmitForms));

        let err = f
            .service
            .submit(None, request(&f, json!({"Student Count": 1}), SubmitIntent::Draft), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn review_cycle_appends_versions() {
        let f = fixture().await;
        let submit = |intent| request(&f, json!({"Student Count": 300}), intent);

        let draft = f.service.submit(Some(&f.school_admin), submit(SubmitIntent::Draft), CancellationToken::new()).await.unwrap();
        assert_eq!(draft.status, FormStatus::Draft);

        // Drafts cannot be approved
        let err = f.service.approve(Some(&f.sector_admin), draft.id, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SubmitError::InvalidTransition { .. }));

        let submitted = f.service.submit(Some(&f.school_admin), submit(SubmitIntent::Submit), CancellationToken::new()).await.unwrap();
        assert_eq!(submitted.id, draft.id);

        // School admins cannot review their own entry
        let err = f.service.approve(Some(&f.school_admin), submitted.id, CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, SubmitError::AccessDenied(_)));

        let rejected = f
            .service
            .reject(Some(&f.sector_admin), submitted.id, Some("Counts look wrong".into()), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(rejected.status, FormStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Counts look wrong"));

        f.service.submit(Some(&f.school_admin), submit(SubmitIntent::Submit), CancellationToken::new()).await.unwrap();
        let approved = f.service.approve(Some(&f.sector_admin), draft.id, CancellationToken::new()).await.unwrap();
        assert_eq!(approved.status, FormStatus::Approved);
        assert_eq!(approved.approved_by, Some(f.sector_admin.user_id));

        let versions = f.store.list_versions(draft.id).await.unwrap();
        let statuses: Vec<FormStatus> = versions.iter().map(|v| v.status).collect();
        assert_eq!(
            statuses,
            vec![
                FormStatus::Draft,
                FormStatus::Submitted,
                FormStatus::Rejected,
                FormStatus::Submitted,
                FormStatus::Approved
            ]
        );
        assert_eq!(approved.version, 5);
        assert!(f.store.unread_count(f.school_admin.user_id).await.unwrap() >= 2);
    }

    #[tokio::test]
    async fn submitted_entries_are_locked_until_reviewed() {
        let f = fixture().await;
        f.service
            .submit(Some(&f.school_admin), request(&f, json!({"Student Count": 1}), SubmitIntent::Submit), CancellationToken::new())
            .await
            .unwrap();
        let err = f
            .service
            .submit(Some(&f.school_admin), request(&f, json!({"Student Count": 2}), SubmitIntent::Draft), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SubmitError::InvalidTransition { from: FormStatus::Submitted, .. }));
    }

    #[tokio::test]
    async fn cancelled_requests_stop_before_any_write() {
        let f = fixture().await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = f
            .service
            .submit(Some(&f.school_admin), request(&f, json!({"Student Count": 5}), SubmitIntent::Submit), cancel)
            .await
            .unwrap_err();
        assert_eq!(err, SubmitError::Cancelled);
        assert!(f.store.find_form(f.category.id, f.school.id).await.unwrap().is_none());
    }
}

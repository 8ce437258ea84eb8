pub mod auth;
pub mod categories;
pub mod forms;
pub mod hierarchy;
pub mod notifications;
pub mod profiles;
pub mod reports;
pub mod scope;
pub mod statistics;

use axum::{
    routing::{get, post},
    Router,
};

use super::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/whoami", get(auth::whoami))
        // Hierarchy
        .route("/api/regions", get(hierarchy::list_regions).post(hierarchy::create_region))
        .route("/api/regions/:id", get(hierarchy::get_region).delete(hierarchy::delete_region))
        .route("/api/sectors", get(hierarchy::list_sectors).post(hierarchy::create_sector))
        .route("/api/sectors/:id", get(hierarchy::get_sector).delete(hierarchy::delete_sector))
        .route("/api/schools", get(hierarchy::list_schools).post(hierarchy::create_school))
        .route("/api/schools/:id", get(hierarchy::get_school).delete(hierarchy::delete_school))
        // Categories and their form definition
        .route("/api/categories", get(categories::list).post(categories::create))
        .route("/api/categories/:id", get(categories::get).delete(categories::delete))
        .route("/api/categories/:id/columns", post(categories::add_column))
        .route("/api/categories/:id/rules", get(categories::list_rules).post(categories::add_rule))
        // Profiles
        .route("/api/profiles", get(profiles::list).post(profiles::create))
        .route("/api/profiles/me", get(profiles::me))
        // Form entries
        .route("/api/forms", get(forms::list).post(forms::submit))
        .route("/api/forms/:id", get(forms::get))
        .route("/api/forms/:id/approve", post(forms::approve))
        .route("/api/forms/:id/reject", post(forms::reject))
        .route("/api/forms/:id/versions", get(forms::versions))
        // Notifications
        .route("/api/notifications", get(notifications::list))
        .route("/api/notifications/unread-count", get(notifications::unread_count))
        .route("/api/notifications/read-all", post(notifications::mark_all_read))
        .route("/api/notifications/mass", post(notifications::mass_notify))
        .route("/api/notifications/stream", get(notifications::stream))
        .route("/api/notifications/:id/read", post(notifications::mark_read))
        // Dashboard and reports
        .route("/api/statistics/forms", get(statistics::form_statistics))
        .route("/api/reports/forms", post(reports::query_forms))
        .route("/api/reports/export/forms", get(reports::export_forms))
        .route("/api/reports/export/schools", get(reports::export_schools))
        .route("/api/reports/import/users", post(reports::import_users))
        .route("/api/reports/import/schools", post(reports::import_schools))
}

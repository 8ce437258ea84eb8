mod common;

use anyhow::Result;
use common::*;
use reqwest::StatusCode;
use serde_json::{json, Value};

fn notification_types(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|n| n["notificationType"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn submission_is_validated_and_coerced() -> Result<()> {
    let session = Session::as_user(SCHOOL_12_ADMIN).await?;

    // Nothing is written when validation fails
    let (status, body) = session
        .post(
            "/api/forms",
            json!({
                "categoryId": CATEGORY_STUDENTS,
                "schoolId": SCHOOL_12,
                "intent": "draft",
                "data": { "Student Count": "120", "Email": "not-an-email" }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["errors"]["Email"], "Email must be a valid email address");

    let (status, body) = session
        .post(
            "/api/forms",
            json!({
                "categoryId": CATEGORY_STUDENTS,
                "schoolId": SCHOOL_12,
                "intent": "draft",
                "data": { "Notes": "pending" }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "Student Count is required");

    let (_, listed) = session.get(&format!("/api/forms?schoolId={}", SCHOOL_12)).await?;
    assert_eq!(listed["data"].as_array().map(Vec::len), Some(0));

    let (status, body) = session
        .post(
            "/api/forms",
            json!({
                "categoryId": CATEGORY_STUDENTS,
                "schoolId": SCHOOL_12,
                "intent": "draft",
                "data": { "Student Count": "120", "Shift": "Morning" }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let form = &body["data"];
    assert_eq!(form["status"], "draft");
    assert_eq!(form["version"], 1);
    assert_eq!(form["data"]["Student Count"].as_f64(), Some(120.0));
    Ok(())
}

#[tokio::test]
async fn owners_cannot_submit_for_other_schools() -> Result<()> {
    let session = Session::as_user(SCHOOL_40_ADMIN).await?;
    let (status, body) = session
        .post(
            "/api/forms",
            json!({
                "categoryId": CATEGORY_STUDENTS,
                "schoolId": SCHOOL_12,
                "intent": "submit",
                "data": { "Student Count": 10 }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "ACCESS_DENIED");
    Ok(())
}

#[tokio::test]
async fn review_cycle_notifies_and_keeps_history() -> Result<()> {
    let owner = Session::as_user(SCHOOL_40_ADMIN).await?;
    let reviewer = Session::as_user(REGION_ADMIN).await?;
    let outsider = Session::as_user(SECTOR_A_ADMIN).await?;

    let (status, body) = owner
        .post(
            "/api/forms",
            json!({
                "categoryId": CATEGORY_STAFF,
                "schoolId": SCHOOL_40,
                "intent": "submit",
                "data": { "Teachers": "35" }
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["status"], "submitted");
    let form_id = body["data"]["id"].as_str().unwrap().to_string();

    // Reviewers within the region hear about the submission
    let (_, inbox) = reviewer.get("/api/notifications").await?;
    assert!(notification_types(&inbox).contains(&"form_submitted".to_string()));
    let (_, unread) = reviewer.get("/api/notifications/unread-count").await?;
    assert!(unread["data"]["count"].as_u64().unwrap_or(0) >= 1);

    // A sector admin of another sector cannot review it
    let (status, _) = outsider.post(&format!("/api/forms/{}/approve", form_id), json!({})).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = reviewer.post(&format!("/api/forms/{}/approve", form_id), json!({})).await?;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "approved");
    assert!(body["data"]["approvedAt"].is_string());

    // Approved entries are final
    let (status, _) = reviewer
        .post(&format!("/api/forms/{}/reject", form_id), json!({ "reason": "late" }))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, inbox) = owner.get("/api/notifications").await?;
    assert!(notification_types(&inbox).contains(&"form_approved".to_string()));

    let (status, history) = owner.get(&format!("/api/forms/{}/versions", form_id)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["data"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
async fn notifications_can_be_marked_read() -> Result<()> {
    let superadmin = Session::as_user(SUPERADMIN).await?;
    let (status, body) = superadmin
        .post(
            "/api/notifications/mass",
            json!({
                "title": "Deadline",
                "body": "Submit staff data by Friday",
                "sectorId": SECTOR_A
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert!(body["data"]["recipients"].as_u64().unwrap_or(0) >= 2);

    let school_admin = Session::as_user(SCHOOL_12_ADMIN).await?;
    let (_, inbox) = school_admin.get("/api/notifications").await?;
    let first = inbox["data"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = school_admin
        .post(&format!("/api/notifications/{}/read", first), json!({}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isRead"], true);

    let (status, _) = school_admin.post("/api/notifications/read-all", json!({})).await?;
    assert_eq!(status, StatusCode::OK);
    let (_, unread) = school_admin.get("/api/notifications/unread-count").await?;
    assert_eq!(unread["data"]["count"], 0);
    Ok(())
}

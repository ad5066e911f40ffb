//! End-to-end API tests for the story lifecycle: start, poll, continue,
//! retrieve, resume.

mod common;

use axum::http::StatusCode;
use axum::Router;
use serde_json::json;

use common::{body_json, build_test_app, get, post_json};
use storyreel_core::clip::ClipParams;
use storyreel_db::DbPool;
use storyreel_provider::PollOutcome;

async fn start_story(app: &Router, story_id: &str) -> serde_json::Value {
    let response = post_json(
        app,
        "/start",
        json!({ "story_id": story_id, "base_prompt": "A quiet harbor at dawn." }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    body_json(response).await["data"].clone()
}

/// Drive a job to completion: one progress poll, then a completed poll.
async fn complete_job(t: &common::TestApp, job_id: &str) -> serde_json::Value {
    t.client.script_poll(Ok(PollOutcome::Running));
    let response = get(&t.app, &format!("/jobs/{job_id}")).await;
    assert_eq!(body_json(response).await["data"]["status"], "processing");

    t.client
        .script_poll(Ok(PollOutcome::Completed { download_url: None }));
    let response = get(&t.app, &format!("/jobs/{job_id}")).await;
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["status"], "completed");
    data
}

#[sqlx::test(migrations = "../db/migrations")]
async fn start_poll_complete_round_trip(pool: DbPool) {
    let t = build_test_app(pool);

    let started = start_story(&t.app, "s1").await;
    let job_id = started["job_id"].as_str().unwrap();
    let node_id = started["node_id"].as_str().unwrap();

    let completed = complete_job(&t, job_id).await;
    assert_eq!(completed["node_id"], node_id);
    assert_eq!(
        completed["video_url"],
        format!("/media/videos/s1/{node_id}.mp4")
    );
    assert_eq!(
        completed["frame_url"],
        format!("/media/frames/s1/{node_id}.jpg")
    );
    assert_eq!(completed["options"].as_array().unwrap().len(), 3);
    assert_eq!(completed["options_source"], "model");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn terminal_job_polls_are_idempotent(pool: DbPool) {
    let t = build_test_app(pool);
    let started = start_story(&t.app, "s1").await;
    let job_id = started["job_id"].as_str().unwrap();

    let first = complete_job(&t, job_id).await;
    for _ in 0..3 {
        let response = get(&t.app, &format!("/jobs/{job_id}")).await;
        assert_eq!(body_json(response).await["data"], first);
    }
}

#[sqlx::test(migrations = "../db/migrations")]
async fn continue_creates_a_child_node(pool: DbPool) {
    let t = build_test_app(pool);
    let root = start_story(&t.app, "s1").await;
    complete_job(&t, root["job_id"].as_str().unwrap()).await;

    let response = post_json(
        &t.app,
        "/continue",
        json!({
            "story_id": "s1",
            "parent_node_id": root["node_id"],
            "choice_label": "Set sail",
            "provider_prompt": "The boat pulls away from the dock.",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let child = body_json(response).await["data"].clone();

    // The child's submission carried the parent's extracted frame.
    {
        let submissions = t.client.submissions.lock().unwrap();
        assert_eq!(submissions.len(), 2);
        assert_eq!(
            submissions[1].reference_image.as_deref(),
            Some(common::FRAME_BYTES)
        );
    }

    complete_job(&t, child["job_id"].as_str().unwrap()).await;

    // The story now lists both nodes in creation order.
    let response = get(&t.app, "/stories/s1").await;
    assert_eq!(response.status(), StatusCode::OK);
    let story = body_json(response).await["data"].clone();
    assert_eq!(story["story_id"], "s1");
    let nodes = story["nodes"].as_array().unwrap();
    assert_eq!(nodes.len(), 2);
    assert_eq!(nodes[0]["id"], root["node_id"]);
    assert!(nodes[0]["parent_id"].is_null());
    assert_eq!(nodes[1]["parent_id"], root["node_id"]);
    assert_eq!(nodes[1]["choice_label"], "Set sail");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn latest_returns_the_resume_point(pool: DbPool) {
    let t = build_test_app(pool);
    let root = start_story(&t.app, "s1").await;
    complete_job(&t, root["job_id"].as_str().unwrap()).await;

    let response = post_json(
        &t.app,
        "/continue",
        json!({
            "story_id": "s1",
            "parent_node_id": root["node_id"],
            "choice_label": "Set sail",
            "provider_prompt": "The boat pulls away from the dock.",
        }),
    )
    .await;
    let child = body_json(response).await["data"].clone();
    complete_job(&t, child["job_id"].as_str().unwrap()).await;

    let response = get(&t.app, "/stories/s1/latest").await;
    assert_eq!(response.status(), StatusCode::OK);
    let latest = body_json(response).await["data"].clone();
    assert_eq!(latest["id"], child["node_id"]);
    assert_eq!(latest["status"], "completed");
    assert_eq!(latest["options"].as_array().unwrap().len(), 3);
}

#[sqlx::test(migrations = "../db/migrations")]
async fn custom_clip_parameters_flow_to_the_provider(pool: DbPool) {
    let t = build_test_app(pool);

    let response = post_json(
        &t.app,
        "/start",
        json!({
            "story_id": "s1",
            "base_prompt": "A quiet harbor at dawn.",
            "seconds": 4,
            "size": "720x1280",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let submissions = t.client.submissions.lock().unwrap();
    assert_eq!(submissions[0].seconds, 4);
    assert_eq!(submissions[0].size, "720x1280");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn configured_clip_defaults_apply_when_requests_omit_them(pool: DbPool) {
    let defaults = ClipParams {
        seconds: 12,
        size: "720x1280".to_string(),
        model: "sora-2-pro".to_string(),
    };
    let t = common::build_test_app_with_defaults(pool, defaults);

    // No seconds/size in the request: the configured defaults flow through.
    let response = post_json(
        &t.app,
        "/start",
        json!({ "story_id": "s1", "base_prompt": "A quiet harbor at dawn." }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    // Request fields still override the configured defaults where present.
    let response = post_json(
        &t.app,
        "/start",
        json!({ "story_id": "s2", "base_prompt": "A quiet harbor at dawn.", "seconds": 4 }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let submissions = t.client.submissions.lock().unwrap();
    assert_eq!(submissions[0].seconds, 12);
    assert_eq!(submissions[0].size, "720x1280");
    assert_eq!(submissions[0].model, "sora-2-pro");
    assert_eq!(submissions[1].seconds, 4);
    assert_eq!(submissions[1].size, "720x1280");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn moderation_retry_surfaces_new_job_id(pool: DbPool) {
    let t = build_test_app(pool);
    let started = start_story(&t.app, "s1").await;
    let job_id = started["job_id"].as_str().unwrap();

    t.client.script_poll(Ok(PollOutcome::Blocked {
        message: "flagged".into(),
    }));
    let response = get(&t.app, &format!("/jobs/{job_id}")).await;
    let data = body_json(response).await["data"].clone();
    assert_eq!(data["status"], "retrying");
    let new_job_id = data["new_job_id"].as_str().unwrap().to_string();
    assert_ne!(new_job_id, job_id);

    t.client
        .script_poll(Ok(PollOutcome::Completed { download_url: None }));
    let response = get(&t.app, &format!("/jobs/{new_job_id}")).await;
    assert_eq!(body_json(response).await["data"]["status"], "completed");
}

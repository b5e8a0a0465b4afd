use std::time::{SystemTime, UNIX_EPOCH};
use serde_json::{json, Value};

// Shared test context
struct TestContext {
    client: reqwest::Client,
    base_url: String,
}

impl TestContext {
    fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .cookie_store(true)
                .build()
                .unwrap(),
            base_url: "http://127.0.0.1:3000".to_string(),
        }
    }

    fn get_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "requires a running server on 127.0.0.1:3000 with Postgres and Redis"]
    async fn test_session_lifecycle_drain_and_rejoin() {
        let context = TestContext::new();
        let creator = format!("e2e-{}", TestContext::get_timestamp());

        // Step 1: create a group, which starts live immediately
        let create_response = context
            .client
            .post(format!("{}/api/study-groups", context.base_url))
            .json(&json!({
                "creator_id": creator,
                "title": "E2E drill",
                "subject": "Pharmacology",
                "schedule": "now"
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(create_response.status().as_u16(), 201, "Create failed");
        let create_body: Value = create_response.json().await.unwrap();
        let group_id = create_body["group"]["id"].as_str().unwrap().to_string();
        assert_eq!(create_body["group"]["participant_count"], 1);

        // Step 2: a second user joins the group, then the session
        let second = format!("{}-b", creator);
        let join_response = context
            .client
            .post(format!("{}/api/study-groups/{}/join", context.base_url, group_id))
            .json(&json!({ "user_id": second }))
            .send()
            .await
            .unwrap();
        assert_eq!(join_response.status().as_u16(), 200, "Join failed");

        let join_session_response = context
            .client
            .post(format!(
                "{}/api/study-groups/{}/join-session",
                context.base_url, group_id
            ))
            .json(&json!({ "user_id": second }))
            .send()
            .await
            .unwrap();
        assert_eq!(join_session_response.status().as_u16(), 200);
        let join_body: Value = join_session_response.json().await.unwrap();
        assert_eq!(join_body["participant_count"], 2);

        // Step 3: both leave; the group must survive with the countdown running
        for user in [&creator, &second] {
            let leave_response = context
                .client
                .post(format!(
                    "{}/api/study-groups/{}/leave-session",
                    context.base_url, group_id
                ))
                .json(&json!({ "user_id": user }))
                .send()
                .await
                .unwrap();
            assert_eq!(leave_response.status().as_u16(), 200);
            let leave_body: Value = leave_response.json().await.unwrap();
            assert_eq!(leave_body["group_deleted"], false);
        }

        // Step 4: an immediate sweep must not delete the drained group
        let cleanup_response = context
            .client
            .post(format!(
                "{}/api/study-groups/cleanup-inactive",
                context.base_url
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(cleanup_response.status().as_u16(), 200);

        let info_response = context
            .client
            .get(format!(
                "{}/api/study-groups/{}/session-info",
                context.base_url, group_id
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(info_response.status().as_u16(), 200, "Group was reaped early");

        // Step 5: end the session with delete; the group must be gone
        let end_response = context
            .client
            .post(format!(
                "{}/api/study-groups/{}/end-session",
                context.base_url, group_id
            ))
            .json(&json!({ "user_id": creator, "delete_group": true }))
            .send()
            .await
            .unwrap();
        assert_eq!(end_response.status().as_u16(), 200);

        let gone_response = context
            .client
            .get(format!(
                "{}/api/study-groups/{}/session-info",
                context.base_url, group_id
            ))
            .send()
            .await
            .unwrap();
        assert_eq!(gone_response.status().as_u16(), 404);
    }

    #[tokio::test]
    #[ignore = "requires a running server on 127.0.0.1:3000 with Postgres and Redis"]
    async fn test_verify_password_gate() {
        let context = TestContext::new();
        let creator = format!("e2e-{}", TestContext::get_timestamp());

        let create_response = context
            .client
            .post(format!("{}/api/study-groups", context.base_url))
            .json(&json!({
                "creator_id": creator,
                "title": "Locked room",
                "password": "secret"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(create_response.status().as_u16(), 201);
        let create_body: Value = create_response.json().await.unwrap();
        let group_id = create_body["group"]["id"].as_str().unwrap().to_string();

        let wrong = context
            .client
            .post(format!(
                "{}/api/study-groups/{}/verify-password",
                context.base_url, group_id
            ))
            .json(&json!({ "password": "wrong" }))
            .send()
            .await
            .unwrap();
        assert_eq!(wrong.status().as_u16(), 403);

        let right = context
            .client
            .post(format!(
                "{}/api/study-groups/{}/verify-password",
                context.base_url, group_id
            ))
            .json(&json!({ "password": "secret" }))
            .send()
            .await
            .unwrap();
        assert_eq!(right.status().as_u16(), 200);
        let right_body: Value = right.json().await.unwrap();
        assert_eq!(right_body["group"]["title"], "Locked room");
    }
}

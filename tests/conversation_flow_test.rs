mod common;

use common::*;
use testcontainers::clients::Cli;
use uuid::Uuid;

#[tokio::test]
async fn create_or_get_is_idempotent_and_order_independent() {
    let docker = Cli::default();
    let (_node, pool) = start_db(&docker).await;
    let alice = seed_user(&pool, "alice", "mentee").await;
    let bob = seed_user(&pool, "bob", "mentor").await;
    let base = start_app(pool, &[&alice, &bob]).await;

    let (status, first) = create_conversation(&base, &alice, bob.id).await;
    assert_eq!(status.as_u16(), 201);
    assert_eq!(first["status"], "active");
    assert!(first["last_message_id"].is_null());

    // Same pair from the other side resolves to the same conversation, 200.
    let (status, second) = create_conversation(&base, &bob, alice.id).await;
    assert_eq!(status.as_u16(), 200);
    assert_eq!(second["id"], first["id"]);

    let (status, third) = create_conversation(&base, &alice, bob.id).await;
    assert_eq!(status.as_u16(), 200);
    assert_eq!(third["id"], first["id"]);
}

#[tokio::test]
async fn concurrent_create_or_get_resolves_to_a_single_conversation() {
    let docker = Cli::default();
    let (_node, pool) = start_db(&docker).await;
    let alice = seed_user(&pool, "alice", "mentee").await;
    let bob = seed_user(&pool, "bob", "mentor").await;
    let base = start_app(pool, &[&alice, &bob]).await;

    // Race both directions of the pair at once; the unique index decides,
    // and no caller ever sees a duplicate-key error.
    let mut handles = Vec::new();
    for i in 0..8 {
        let base = base.clone();
        let (token, other) = if i % 2 == 0 {
            (alice.token.clone(), bob.id)
        } else {
            (bob.token.clone(), alice.id)
        };
        handles.push(tokio::spawn(async move {
            let resp = reqwest::Client::new()
                .post(format!("{base}/api/v1/conversations"))
                .bearer_auth(token)
                .json(&serde_json::json!({ "participant_id": other }))
                .send()
                .await
                .unwrap();
            assert!(resp.status().is_success());
            let body: serde_json::Value = resp.json().await.unwrap();
            body["id"].as_str().unwrap().to_string()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.iter().collect::<std::collections::HashSet<_>>().len(), 1);
}

#[tokio::test]
async fn self_conversation_and_unknown_participant_are_rejected() {
    let docker = Cli::default();
    let (_node, pool) = start_db(&docker).await;
    let alice = seed_user(&pool, "alice", "mentee").await;
    let base = start_app(pool, &[&alice]).await;

    let (status, _) = create_conversation(&base, &alice, alice.id).await;
    assert_eq!(status.as_u16(), 400);

    let (status, _) = create_conversation(&base, &alice, Uuid::new_v4()).await;
    assert_eq!(status.as_u16(), 404);
}

#[tokio::test]
async fn non_participant_gets_403_and_missing_conversation_404() {
    let docker = Cli::default();
    let (_node, pool) = start_db(&docker).await;
    let alice = seed_user(&pool, "alice", "mentee").await;
    let bob = seed_user(&pool, "bob", "mentor").await;
    let mallory = seed_user(&pool, "mallory", "mentee").await;
    let base = start_app(pool, &[&alice, &bob, &mallory]).await;

    let (_, conv) = create_conversation(&base, &alice, bob.id).await;
    let conv_id = conv["id"].as_str().unwrap();

    let resp = client()
        .get(format!("{base}/api/v1/conversations/{conv_id}"))
        .bearer_auth(&mallory.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = client()
        .get(format!("{base}/api/v1/conversations/{}", Uuid::new_v4()))
        .bearer_auth(&mallory.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    // No credential at all is 401.
    let resp = client()
        .get(format!("{base}/api/v1/conversations"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn status_transitions_follow_the_permitted_table() {
    let docker = Cli::default();
    let (_node, pool) = start_db(&docker).await;
    let alice = seed_user(&pool, "alice", "mentee").await;
    let bob = seed_user(&pool, "bob", "mentor").await;
    let base = start_app(pool, &[&alice, &bob]).await;

    let (_, conv) = create_conversation(&base, &alice, bob.id).await;
    let conv_id = conv["id"].as_str().unwrap().to_string();

    let put = |path: String, user: &TestUser| {
        let token = user.token.clone();
        let base = base.clone();
        async move {
            client()
                .put(format!("{base}/api/v1/conversations/{path}"))
                .bearer_auth(token)
                .send()
                .await
                .unwrap()
        }
    };

    // active -> archived
    let resp = put(format!("{conv_id}/archive"), &alice).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "archived");

    // archived -> active is not permitted; status stays archived.
    let resp = put(format!("{conv_id}/unblock"), &alice).await;
    assert_eq!(resp.status().as_u16(), 400);
    let resp = client()
        .get(format!("{base}/api/v1/conversations/{conv_id}"))
        .bearer_auth(&alice.token)
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "archived");

    // archived -> blocked, then blocked -> active (unblock), by either side.
    let resp = put(format!("{conv_id}/block"), &bob).await;
    assert_eq!(resp.status().as_u16(), 200);
    let resp = put(format!("{conv_id}/archive"), &bob).await;
    assert_eq!(resp.status().as_u16(), 400);
    let resp = put(format!("{conv_id}/unblock"), &alice).await;
    assert_eq!(resp.status().as_u16(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn inbox_sorts_by_activity_and_can_exclude_blocked() {
    let docker = Cli::default();
    let (_node, pool) = start_db(&docker).await;
    let alice = seed_user(&pool, "alice", "mentee").await;
    let bob = seed_user(&pool, "bob", "mentor").await;
    let carol = seed_user(&pool, "carol", "mentor").await;
    let base = start_app(pool, &[&alice, &bob, &carol]).await;

    let (_, with_bob) = create_conversation(&base, &alice, bob.id).await;
    let (_, with_carol) = create_conversation(&base, &alice, carol.id).await;

    // Messaging bob makes that conversation the most recent one.
    let bob_conv = Uuid::parse_str(with_bob["id"].as_str().unwrap()).unwrap();
    send_text_message(&base, &alice, bob_conv, "hi bob").await;

    let resp = client()
        .get(format!("{base}/api/v1/conversations"))
        .bearer_auth(&alice.token)
        .send()
        .await
        .unwrap();
    let inbox: Vec<serde_json::Value> = resp.json().await.unwrap();
    assert_eq!(inbox.len(), 2);
    assert_eq!(inbox[0]["id"], with_bob["id"]);
    assert_eq!(inbox[1]["id"], with_carol["id"]);
    // Denormalized directory info for the other participant.
    assert_eq!(inbox[0]["other"]["display_name"], "bob");
    assert_eq!(inbox[0]["unread_count"], 0);

    // Bob sees one unread message from alice.
    let resp = client()
        .get(format!("{base}/api/v1/conversations"))
        .bearer_auth(&bob.token)
        .send()
        .await
        .unwrap();
    let inbox: Vec<serde_json::Value> = resp.json().await.unwrap();
    assert_eq!(inbox[0]["unread_count"], 1);

    // Block carol's conversation and filter it out.
    let carol_conv = with_carol["id"].as_str().unwrap();
    client()
        .put(format!("{base}/api/v1/conversations/{carol_conv}/block"))
        .bearer_auth(&alice.token)
        .send()
        .await
        .unwrap();
    let resp = client()
        .get(format!("{base}/api/v1/conversations?exclude_blocked=true"))
        .bearer_auth(&alice.token)
        .send()
        .await
        .unwrap();
    let inbox: Vec<serde_json::Value> = resp.json().await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["id"], with_bob["id"]);
}

mod common;

use common::TestServer;
use serde_json::{json, Value};
use uuid::Uuid;

async fn matched_pair(srv: &TestServer) -> ((Uuid, String), (Uuid, String), String) {
    let (a, ta) = srv.user("alice").await;
    let (b, tb) = srv.user("bob").await;
    srv.join(&ta, "E100").await;
    srv.join(&tb, "E100").await;
    srv.swipe(&ta, "E100", b, "right").await;
    let v: Value = srv.swipe(&tb, "E100", a, "right").await.json().await.unwrap();
    let match_id = v["matchId"].as_str().unwrap().to_string();
    ((a, ta), (b, tb), match_id)
}

#[tokio::test]
async fn messages_are_delivered_and_marked_read() {
    let srv = TestServer::spawn().await;
    let ((a, ta), (b, tb), match_id) = matched_pair(&srv).await;
    let path = format!("/api/{match_id}/messages");

    let resp = srv.post(&ta, &path, json!({"content": "meet at the merch stand?"})).await;
    assert_eq!(resp.status(), 201);
    let sent: Value = resp.json().await.unwrap();
    assert_eq!(sent["senderId"], a.to_string());
    assert_eq!(sent["receiverId"], b.to_string());
    assert_eq!(sent["isRead"], false);
    srv.post(&ta, &path, json!({"content": "after the opener"})).await;

    let v: Value = srv.get(&tb, "/api/matches/unread").await.json().await.unwrap();
    assert_eq!(v["unread"], 2);
    let v: Value = srv.get(&tb, "/api/matches").await.json().await.unwrap();
    assert_eq!(v["matches"][0]["unreadMessages"], 2);
    assert_eq!(v["matches"][0]["lastMessage"]["content"], "after the opener");

    let v: Value = srv.get(&tb, &path).await.json().await.unwrap();
    let msgs = v["messages"].as_array().unwrap();
    assert_eq!(msgs.len(), 2);
    assert_eq!(msgs[0]["content"], "meet at the merch stand?");
    assert_eq!(msgs[0]["sender"]["username"], "alice");
    assert!(msgs.iter().all(|m| m["isRead"] == true));

    let v: Value = srv.get(&tb, "/api/matches/unread").await.json().await.unwrap();
    assert_eq!(v["unread"], 0);

    // reading as the sender does not mark anything on the other side
    srv.post(&tb, &path, json!({"content": "deal"})).await;
    let v: Value = srv.get(&tb, &path).await.json().await.unwrap();
    assert_eq!(v["messages"][2]["isRead"], false);
    let v: Value = srv.get(&ta, "/api/matches/unread").await.json().await.unwrap();
    assert_eq!(v["unread"], 1);
}

#[tokio::test]
async fn outsiders_cannot_read_or_write() {
    let srv = TestServer::spawn().await;
    let ((_a, ta), _, match_id) = matched_pair(&srv).await;
    let (_c, tc) = srv.user("carol").await;
    let path = format!("/api/{match_id}/messages");

    assert_eq!(srv.post(&tc, &path, json!({"content": "hey"})).await.status(), 403);
    assert_eq!(srv.post(&tc, &path, json!({"content": ""})).await.status(), 403);
    assert_eq!(srv.get(&tc, &path).await.status(), 403);

    assert_eq!(srv.post(&ta, &path, json!({"content": "   "})).await.status(), 400);
    let unknown = format!("/api/{}/messages", Uuid::new_v4());
    assert_eq!(srv.get(&ta, &unknown).await.status(), 404);
    assert_eq!(srv.get(&ta, "/api/not-a-uuid/messages").await.status(), 404);
}

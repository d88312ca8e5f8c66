mod common;

use common::TestServer;
use serde_json::Value;

#[tokio::test]
async fn two_users_match_at_a_concert() {
    let srv = TestServer::spawn().await;
    let (u1, t1) = srv.user("user_one").await;
    let (u2, t2) = srv.user("user_two").await;

    assert_eq!(srv.join(&t1, "E100").await.status(), 201);
    let again = srv.join(&t1, "E100").await;
    assert_eq!(again.status(), 400);
    let body: Value = again.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("already"));
    assert_eq!(srv.join(&t2, "E100").await.status(), 201);

    let resp = srv.get(&t1, "/api/matchmaking/potential-matches/E100").await;
    assert_eq!(resp.status(), 200);
    let v: Value = resp.json().await.unwrap();
    assert_eq!(v["eventId"], "E100");
    let cards = v["matches"].as_array().unwrap();
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0]["userId"], u2.to_string());
    assert_eq!(cards[0]["username"], "user_two");
    assert!(cards[0]["age"].as_u64().unwrap() >= 30);

    let first: Value = srv.swipe(&t1, "E100", u2, "right").await.json().await.unwrap();
    assert_eq!(first["matched"], false);
    assert!(first.get("matchId").is_none());

    let resp = srv.swipe(&t2, "E100", u1, "right").await;
    assert_eq!(resp.status(), 200);
    let second: Value = resp.json().await.unwrap();
    assert_eq!(second["matched"], true);
    let match_id = second["matchId"].as_str().unwrap().to_string();

    let v: Value = srv.get(&t1, "/api/matches").await.json().await.unwrap();
    let matches = v["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["matchId"], match_id);
    assert_eq!(matches[0]["eventId"], "E100");
    assert_eq!(matches[0]["otherUser"]["id"], u2.to_string());
    assert!(matches[0]["chatRoomId"].is_string());
    assert_eq!(matches[0]["unreadMessages"], 0);

    // nobody left to swipe on
    let v: Value = srv
        .get(&t1, "/api/matchmaking/potential-matches/E100")
        .await
        .json()
        .await
        .unwrap();
    assert!(v["matches"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn swiping_rules() {
    let srv = TestServer::spawn().await;
    let (u1, t1) = srv.user("swiper").await;
    let (u2, _t2) = srv.user("target").await;
    let (_u3, t3) = srv.user("outsider").await;

    srv.join(&t1, "E100").await;
    // target has not joined yet
    assert_eq!(srv.swipe(&t1, "E100", u2, "right").await.status(), 404);
    // outsider is not in the pool at all
    assert_eq!(srv.swipe(&t3, "E100", u1, "right").await.status(), 403);
    assert_eq!(
        srv.get(&t3, "/api/matchmaking/potential-matches/E100")
            .await
            .status(),
        403
    );
    assert_eq!(srv.swipe(&t1, "E100", u1, "right").await.status(), 400);
    assert_eq!(srv.swipe(&t1, "E100", u2, "sideways").await.status(), 400);

    let t2 = {
        let v: Value = srv.login("target", common::PASSWORD).await.json().await.unwrap();
        v["token"].as_str().unwrap().to_string()
    };
    srv.join(&t2, "E100").await;
    assert_eq!(srv.swipe(&t1, "E100", u2, "left").await.status(), 200);
    assert_eq!(srv.swipe(&t1, "E100", u2, "right").await.status(), 409);

    let v: Value = srv.swipe(&t2, "E100", u1, "right").await.json().await.unwrap();
    assert_eq!(v["matched"], false);
}

#[tokio::test]
async fn unknown_events_and_leaving() {
    let srv = TestServer::spawn().await;
    let (_u1, t1) = srv.user("leaver").await;

    assert_eq!(srv.join(&t1, "NOPE").await.status(), 404);
    assert_eq!(srv.join(&t1, "  ").await.status(), 400);

    srv.join(&t1, "E100").await;
    srv.join(&t1, "E200").await;
    let v: Value = srv.get(&t1, "/api/matchmaking/pools").await.json().await.unwrap();
    let pools = v["pools"].as_array().unwrap();
    assert_eq!(pools.len(), 2);
    assert!(pools.iter().any(|p| p["event"]["name"] == "Big Thief"));

    let resp = srv
        .client
        .delete(srv.url("/api/matchmake/E100"))
        .bearer_auth(&t1)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    let resp = srv
        .client
        .delete(srv.url("/api/matchmake/E100"))
        .bearer_auth(&t1)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let v: Value = srv.get(&t1, "/api/matchmaking/pools").await.json().await.unwrap();
    assert_eq!(v["pools"].as_array().unwrap().len(), 1);
    // rejoining after leaving is allowed
    assert_eq!(srv.join(&t1, "E100").await.status(), 201);
}

#[tokio::test]
async fn event_search_passes_through_catalog() {
    let srv = TestServer::spawn().await;
    let (_id, token) = srv.user("searcher").await;

    let v: Value = srv.get(&token, "/api/events").await.json().await.unwrap();
    assert_eq!(v["events"].as_array().unwrap().len(), 2);

    let v: Value = srv
        .get(&token, "/api/events?query=boygenius")
        .await
        .json()
        .await
        .unwrap();
    let events = v["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], "E100");
    assert_eq!(events[0]["ticketUrl"], "https://tickets.example/E100");
}

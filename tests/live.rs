//! Smoke tests against a running native server:
//! `BOARD_BIND_ADDR=127.0.0.1:3000 cargo run` then `cargo test -- --ignored`.

use std::sync::Mutex;

const BASE_URL: &str = "http://127.0.0.1:3000";
static TEST_LOCK: Mutex<()> = Mutex::new(());

fn lock_test() -> std::sync::MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to build client")
}

#[ignore]
#[tokio::test]
async fn test_signup_post_and_poll() {
    let _lock = lock_test();
    let client = client();
    let email = format!("live_{}@example.com", uuid::Uuid::new_v4());

    // 1. Sign up; the redirect lands on the index view
    let home = client
        .post(format!("{}/signup", BASE_URL))
        .form(&[("new_email", email.as_str()), ("new_password", "test")])
        .send()
        .await
        .expect("Failed to sign up");
    assert_eq!(home.status(), 200);
    let home = home.json::<serde_json::Value>().await.unwrap();
    assert_eq!(home["user"], email.as_str());

    // 2. Create a topic
    let created = client
        .post(format!("{}/create_topic", BASE_URL))
        .form(&[("title", "Live topic")])
        .send()
        .await
        .expect("Failed to create topic");
    let topic_key = created
        .url()
        .path()
        .trim_start_matches("/discussion/")
        .to_string();
    let discussion = created.json::<serde_json::Value>().await.unwrap();
    assert_eq!(discussion["topic"]["title"], "Live topic");

    // 3. Post a message
    client
        .post(format!("{}/post", BASE_URL))
        .form(&[("topic_key", topic_key.as_str()), ("content", "Hello from a live test")])
        .send()
        .await
        .expect("Failed to post");

    // 4. Poll from the start
    let polled = client
        .get(format!("{}/poll", BASE_URL))
        .query(&[("topic_key", topic_key.as_str()), ("offset", "0")])
        .send()
        .await
        .expect("Failed to poll")
        .json::<serde_json::Value>()
        .await
        .unwrap();
    assert_eq!(polled["messages"][0]["content"], "Hello from a live test");
    assert_eq!(polled["messages"][0]["email"], email.as_str());
}

#[ignore]
#[tokio::test]
async fn test_login_invalid_credentials() {
    let _lock = lock_test();
    let client = client();

    let response = client
        .post(format!("{}/login", BASE_URL))
        .form(&[("email", "nonexistent@example.com"), ("password", "wrongpass")])
        .send()
        .await
        .expect("Failed to make request");

    assert_eq!(response.status(), 401);
    let view = response.json::<serde_json::Value>().await.unwrap();
    assert!(view["user"].is_null());
}

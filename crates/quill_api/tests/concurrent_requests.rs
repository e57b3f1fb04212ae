mod common;

use common::{Harness, PASSWORD};
use quill_core::auth::password::{Bcrypt, PasswordHashError, PasswordHasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

/// Bcrypt that parks the next verification until the test lets it go.
struct GatedHasher {
    inner: Bcrypt,
    armed: AtomicBool,
    gate: Barrier,
}

impl GatedHasher {
    fn new() -> Self {
        Self {
            inner: Bcrypt { cost: 4 },
            armed: AtomicBool::new(false),
            gate: Barrier::new(2),
        }
    }
}

/// Waits until the parked verification reaches the same point.
async fn meet(hasher: &Arc<GatedHasher>) {
    let hasher = Arc::clone(hasher);
    tokio::task::spawn_blocking(move || {
        hasher.gate.wait();
    })
    .await
    .unwrap();
}

impl PasswordHasher for GatedHasher {
    fn hash(&self, raw: &str) -> Result<String, PasswordHashError> {
        self.inner.hash(raw)
    }

    fn verify(&self, raw: &str, hash: &str) -> bool {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.gate.wait();
            self.gate.wait();
        }
        self.inner.verify(raw, hash)
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reads_are_served_while_a_login_verifies() {
    let hasher = Arc::new(GatedHasher::new());
    let harness = Harness::with_hasher(hasher.clone());
    let token = harness.sign_up("ada").await;

    hasher.armed.store(true, Ordering::SeqCst);
    let login = tokio::spawn({
        let harness = harness.clone();
        async move {
            let query = format!(
                r#"mutation {{ login(username: "ada", password: "{PASSWORD}") {{ token }} }}"#
            );
            harness.execute(None, &query).await
        }
    });
    meet(&hasher).await;

    let read = tokio::spawn({
        let harness = harness.clone();
        async move { harness.execute(Some(&token), "{ me { username } }").await }
    });
    let response = tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("read blocked behind a password check")
        .unwrap();
    assert_eq!(response["data"]["me"]["username"], "ada");

    meet(&hasher).await;
    let response = login.await.unwrap();
    assert!(response["data"]["login"]["token"].is_string(), "{response}");
}

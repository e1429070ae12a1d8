use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use harvester_browser::{MemorySessionStore, SessionStore};

use super::*;
use crate::testing::{FakeContext, FakeSite};

const TOTP_SECRET: &str = "JBSWY3DPEHPK3PXP";

fn timings() -> LoginTimings {
    LoginTimings {
        selector_timeout: Duration::from_millis(200),
        confirm_grace: Duration::from_millis(200),
        poll_interval: Duration::from_millis(10),
    }
}

fn descriptor(auth_timeout: Duration) -> VendorDescriptor {
    let mut descriptor = VendorDescriptor::amazon();
    descriptor.auth_timeout = auth_timeout;
    descriptor
}

fn credential() -> Credential {
    Credential::new(FakeSite::USERNAME, FakeSite::PASSWORD)
}

struct Harness {
    site: FakeSite,
    context: FakeContext,
    store: Arc<MemorySessionStore>,
    descriptor: VendorDescriptor,
}

impl Harness {
    fn new(site: FakeSite) -> Self {
        let store = Arc::new(MemorySessionStore::new());
        let descriptor = site.descriptor();
        let context = FakeContext::new("amazon", site.clone(), store.clone());
        Self {
            site,
            context,
            store,
            descriptor,
        }
    }

    async fn login(&self, credential: &Credential) -> Result<LoginOutcome, VendorError> {
        self.login_with_screenshots(credential, None).await
    }

    async fn login_with_screenshots(
        &self,
        credential: &Credential,
        dir: Option<&Path>,
    ) -> Result<LoginOutcome, VendorError> {
        let page = self.context.new_page().await.unwrap();
        LoginFlow::new(page.as_ref(), &self.context, &self.descriptor, timings())
            .with_screenshots(dir)
            .run(credential)
            .await
    }
}

/// Finish the login by hand `delay` after the page saw `action`.
fn complete_after(site: &FakeSite, action: &'static str, delay: Duration) {
    let site = site.clone();
    tokio::spawn(async move {
        while !site.actions().iter().any(|a| a == action) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        tokio::time::sleep(delay).await;
        site.complete_manually();
    });
}

#[tokio::test]
async fn test_wait_until_immediate() {
    let counter = AtomicUsize::new(0);
    let calls = &counter;
    let ok = wait_until(
        move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            true
        },
        Duration::from_millis(10),
        Duration::ZERO,
    )
    .await;
    assert!(ok);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_wait_until_eventually() {
    let counter = AtomicUsize::new(0);
    let calls = &counter;
    let ok = wait_until(
        move || async move { calls.fetch_add(1, Ordering::SeqCst) >= 3 },
        Duration::from_millis(5),
        Duration::from_secs(2),
    )
    .await;
    assert!(ok);
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_wait_until_times_out() {
    let start = Instant::now();
    let ok = wait_until(
        || async { false },
        Duration::from_millis(10),
        Duration::from_millis(60),
    )
    .await;
    assert!(!ok);
    assert!(start.elapsed() >= Duration::from_millis(60));
}

#[test]
fn test_phase_display() {
    assert_eq!(LoginPhase::CheckingExisting.to_string(), "checking_existing");
    assert_eq!(
        serde_json::to_value(LoginPhase::WaitingForManualCompletion).unwrap(),
        "waiting_for_manual_completion"
    );
}

#[tokio::test]
async fn test_restored_session_skips_form() {
    let h = Harness::new(FakeSite::new(descriptor(Duration::from_secs(1))).logged_in());

    let outcome = h.login(&credential()).await.unwrap();
    assert!(outcome.restored);
    assert!(!outcome.manual);
    assert!(!h.site.actions().iter().any(|a| a.starts_with("fill")));
    assert_eq!(h.context.persisted(), 1);
}

#[tokio::test]
async fn test_credential_login_persists_session() {
    let h = Harness::new(FakeSite::new(descriptor(Duration::from_secs(1))));

    let outcome = h.login(&credential()).await.unwrap();
    assert_eq!(outcome, LoginOutcome::default());
    assert!(h.site.is_authenticated());

    let actions = h.site.actions();
    for expected in ["fill #ap_email", "click #continue", "fill #ap_password", "click #signInSubmit"] {
        assert!(actions.contains(&expected.to_string()), "missing {}", expected);
    }

    let saved = h.store.load("amazon").await.unwrap().unwrap();
    assert!(!saved.cookies.is_empty());
}

#[tokio::test]
async fn test_wrong_password_fails() {
    let h = Harness::new(FakeSite::new(descriptor(Duration::from_secs(1))));

    let err = h
        .login(&Credential::new(FakeSite::USERNAME, "wrong"))
        .await
        .unwrap_err();
    match err {
        VendorError::LoginFailed {
            vendor,
            phase,
            reason,
        } => {
            assert_eq!(vendor, "amazon");
            assert_eq!(phase, LoginPhase::SubmittingCredential);
            assert!(reason.contains("not authenticated"));
            assert!(!reason.contains("wrong"));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(h.context.persisted(), 0);
}

#[tokio::test]
async fn test_totp_second_factor() {
    let secret = harvester_otp::decode_secret(TOTP_SECRET).unwrap();
    let h = Harness::new(FakeSite::new(descriptor(Duration::from_secs(1))).with_totp(&secret));

    let outcome = h.login(&credential().with_totp(TOTP_SECRET)).await.unwrap();
    assert!(!outcome.manual);
    assert!(h.site.actions().contains(&"fill #auth-mfa-otpcode".to_string()));
    assert!(h.site.is_authenticated());
}

#[tokio::test]
async fn test_totp_without_secret_waits_then_times_out() {
    let secret = harvester_otp::decode_secret(TOTP_SECRET).unwrap();
    let h = Harness::new(
        FakeSite::new(descriptor(Duration::from_millis(100))).with_totp(&secret),
    );

    let err = h.login(&credential()).await.unwrap_err();
    match err {
        VendorError::LoginFailed { phase, reason, .. } => {
            assert_eq!(phase, LoginPhase::WaitingForManualCompletion);
            assert!(reason.contains("timeout"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_captcha_waits_for_manual_completion() {
    let dir = tempfile::tempdir().unwrap();
    let h = Harness::new(FakeSite::new(descriptor(Duration::from_secs(5))).with_captcha());

    complete_after(&h.site, "click #continue", Duration::from_millis(50));

    let outcome = h
        .login_with_screenshots(&credential(), Some(dir.path()))
        .await
        .unwrap();
    assert!(outcome.manual);
    assert!(!h.site.actions().contains(&"fill #ap_password".to_string()));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    assert_eq!(h.context.persisted(), 1);
}

#[tokio::test]
async fn test_interaction_required_vendor_goes_manual() {
    let mut descriptor = descriptor(Duration::from_secs(5));
    descriptor.interaction_required = true;
    let h = Harness::new(FakeSite::new(descriptor));

    complete_after(&h.site, "click #signInSubmit", Duration::from_millis(400));

    let outcome = h
        .login(&Credential::new(FakeSite::USERNAME, "push-approval"))
        .await
        .unwrap();
    assert!(outcome.manual);
}

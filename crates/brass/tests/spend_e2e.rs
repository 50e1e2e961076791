//! End-to-end spend verification: "does the whole pipeline hold?"
//!
//! The chapters tell one story with fixed scalars (issuer k = 0xA1,
//! blinding r = 0x2B), a fixed client nonce, origin https://example.com,
//! and a budget of 3:
//!
//! 1. A first spend is accepted and decrements the budget
//! 2. A byte-for-byte replay is answered idempotently
//! 3. The fourth spend in a window is denied, and the denial is sticky
//! 4. Another origin lands on another counter; moving a presentation
//!    there without re-proving fails
//! 5. The same token on both sides of UTC midnight is bridged by the
//!    grace cache
//! 6. Rebinding a presentation to a different HTTP body fails
//!
//! What's real: P-256 arithmetic, both DLEQ proofs, the derivation layer,
//! the atomic counter store, telemetry. What's simulated: the issuer and
//! the client SDK (local functions below), and H2C (a fixed-scalar base
//! point, since the verifier treats P as opaque).

use std::sync::Arc;

use p256::elliptic_curve::ops::Reduce;
use p256::{AffinePoint, FieldBytes, ProjectivePoint, Scalar};
use rand::rngs::OsRng;

use brass::{
    handle_spend, ApiKeyRecord, AppState, Config, KvSecret, MemorySink, RequestContext,
    SpendOutcome, StaticKeyTable, WindowUsed,
};
use brass_context::{
    canonical_origin, epoch_days, http_context_digest, nullifier_y, parse_policy_id, salt_eta,
    tls_binding, window_id,
};
use brass_core::codec::{b64url_encode, encode_point, encode_scalar};
use brass_core::hash::sha256;
use brass_core::{ManualClock, ProjectId};
use brass_proof::binding::BindingContext;
use brass_proof::{client_binding, dleq, Presentation, ProofScalars, DLEQ_LABEL};
use brass_store::AtomicStore;

const API_KEY: &str = "brass-test-key";
const PROJECT: &str = "proj-1";
const LIMIT: u64 = 3;
const KID: &str = "kid-2025-11";
const AADR: &str = "policy=comments|window=W";
const ORIGIN: &str = "https://example.com";

const MS_PER_DAY: u64 = 86_400_000;
// 2025-11-14, mid-day
const DAY: u64 = 20_406;
const NOON_MS: u64 = DAY * MS_PER_DAY + 12 * 3_600_000;

fn issuer_secret() -> Scalar {
    Scalar::from(0xA1u64)
}

fn blinding() -> Scalar {
    Scalar::from(0x2Bu64)
}

fn client_nonce() -> [u8; 16] {
    [0x99; 16]
}

struct TestEnv {
    state: AppState,
    clock: Arc<ManualClock>,
    sink: Arc<MemorySink>,
}

fn env() -> TestEnv {
    let issuer_pk = (ProjectivePoint::GENERATOR * issuer_secret()).to_affine();
    let config = Config::new(
        b64url_encode(&encode_point(&issuer_pk)),
        KvSecret::new([0x11; 32]),
    );

    let clock = Arc::new(ManualClock::new(NOON_MS));
    let sink = Arc::new(MemorySink::new(64));
    let mut keys = StaticKeyTable::new();
    keys.insert(
        API_KEY,
        ApiKeyRecord {
            project_id: ProjectId::new(PROJECT),
            limit: LIMIT,
        },
    );

    let state = AppState::new(
        config,
        Arc::new(AtomicStore::with_clock(clock.clone())),
        Arc::new(keys),
        sink.clone(),
        clock.clone(),
    )
    .unwrap();

    TestEnv { state, clock, sink }
}

/// The client's protected API call that the pass is bound to.
fn protected_request() -> (&'static str, &'static str, &'static [u8]) {
    ("POST", "/api/comments", b"hello")
}

/// Simulate issuer + client: mint a pass for `origin` at `now_ms` and
/// build a presentation bound to the protected request.
fn build_presentation(origin: &str, aadr: &str, nonce: [u8; 16], now_ms: u64) -> Presentation {
    let (method, path, body) = protected_request();
    build_presentation_for(origin, aadr, nonce, now_ms, method, path, body)
}

fn build_presentation_for(
    origin: &str,
    aadr: &str,
    nonce: [u8; 16],
    now_ms: u64,
    method: &str,
    path: &str,
    body: &[u8],
) -> Presentation {
    let k = issuer_secret();
    let r = blinding();
    let canonical = canonical_origin(origin).unwrap();
    let epoch = epoch_days(now_ms);
    let window = window_id(epoch);
    let policy = parse_policy_id(aadr);

    // Stand-in for H2C: a per-(origin, epoch, policy) base point with a
    // hash-derived discrete log. The verifier treats P as opaque.
    let seed = sha256(format!("{}|{}|{}", canonical, epoch, policy.as_str()).as_bytes());
    let h = Scalar::reduce_bytes(&FieldBytes::from(seed));
    let p = (ProjectivePoint::GENERATOR * h).to_affine();

    let m = (ProjectivePoint::from(p) * r).to_affine();
    let z = (ProjectivePoint::from(m) * k).to_affine();
    let z_prime = (ProjectivePoint::from(p) * k).to_affine();
    let issuer_pk = (ProjectivePoint::GENERATOR * k).to_affine();
    let issuer_pk_enc = encode_point(&issuer_pk);
    let z_prime_enc = encode_point(&z_prime);

    // Server-side derivations are all public; the client mirrors them.
    let eta = salt_eta(&issuer_pk_enc, &canonical, epoch, &policy, window);
    let y = nullifier_y(&z_prime_enc, KID, aadr, &eta);
    let body_hash = sha256(body);
    let d = http_context_digest(method, path, &body_hash);
    let channel = tls_binding(None);
    let bind = client_binding(&BindingContext {
        nullifier: &y,
        client_nonce: &nonce,
        http_context: &d,
        tls_binding: &channel,
        window_id: window,
        policy_id: &policy,
        aadr,
        kid: KID,
        eta: &eta,
    });

    let pi_i = dleq::prove(
        &k,
        &AffinePoint::GENERATOR,
        &issuer_pk,
        &m,
        &z,
        DLEQ_LABEL,
        b"",
        &mut OsRng,
    );
    let pi_c = dleq::prove(&r, &p, &m, &z_prime, &z, DLEQ_LABEL, &bind, &mut OsRng);

    Presentation {
        kid: KID.into(),
        aadr: aadr.into(),
        origin: origin.into(),
        epoch,
        p: b64url_encode(&encode_point(&p)),
        m: b64url_encode(&encode_point(&m)),
        z: b64url_encode(&encode_point(&z)),
        z_prime: b64url_encode(&z_prime_enc),
        c: b64url_encode(&nonce),
        pi_i: ProofScalars {
            c: b64url_encode(&encode_scalar(&pi_i.c)),
            r: b64url_encode(&encode_scalar(&pi_i.s)),
        },
        pi_c: ProofScalars {
            c: b64url_encode(&encode_scalar(&pi_c.c)),
            r: b64url_encode(&encode_scalar(&pi_c.s)),
        },
        d_client: None,
        http_method: Some(method.into()),
        http_path: Some(path.into()),
        http_body_hash_b64: Some(b64url_encode(&body_hash)),
        tls_exporter_b64: None,
    }
}

fn submit(env: &TestEnv, presentation: &Presentation) -> SpendOutcome {
    submit_with_key(env, presentation, Some(API_KEY))
}

fn submit_with_key(env: &TestEnv, presentation: &Presentation, key: Option<&str>) -> SpendOutcome {
    let request = RequestContext {
        method: "POST".into(),
        path: "/verify".into(),
        body: serde_json::to_vec(presentation).unwrap(),
    };
    handle_spend(&env.state, key, &request)
}

fn rejected_kind(outcome: &SpendOutcome) -> &'static str {
    match outcome {
        SpendOutcome::Rejected { kind } => kind.as_str(),
        other => panic!("expected rejection, got {:?}", other),
    }
}

// ============================================================================
// Chapter 1: a first spend is accepted
// ============================================================================

#[test]
fn chapter_1_first_spend_accepted() {
    let env = env();
    let presentation = build_presentation(ORIGIN, AADR, client_nonce(), NOON_MS);

    match submit(&env, &presentation) {
        SpendOutcome::Accepted {
            remaining,
            idempotent,
            window_used,
        } => {
            assert_eq!(remaining, 2);
            assert!(!idempotent);
            assert_eq!(window_used, WindowUsed::Window(window_id(DAY)));
        }
        other => panic!("expected acceptance, got {:?}", other),
    }

    let events = env.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].result, "ok");
    assert_eq!(events[0].remaining, Some(2));
    assert!(!events[0].in_grace_period);
}

// ============================================================================
// Chapter 2: replays are idempotent
// ============================================================================

#[test]
fn chapter_2_byte_for_byte_replay_is_idempotent() {
    let env = env();
    let presentation = build_presentation(ORIGIN, AADR, client_nonce(), NOON_MS);

    submit(&env, &presentation);
    match submit(&env, &presentation) {
        SpendOutcome::Accepted {
            remaining,
            idempotent,
            ..
        } => {
            // Same decision, counter untouched
            assert_eq!(remaining, 2);
            assert!(idempotent);
        }
        other => panic!("expected idempotent acceptance, got {:?}", other),
    }

    // The counter really stayed at 1: the next distinct nonce sees 1 left
    // after two more spends, not an exhausted budget.
    match submit(&env, &build_presentation(ORIGIN, AADR, [0x01; 16], NOON_MS)) {
        SpendOutcome::Accepted { remaining, .. } => assert_eq!(remaining, 1),
        other => panic!("expected acceptance, got {:?}", other),
    }
}

// ============================================================================
// Chapter 3: the budget runs out, and the denial is sticky
// ============================================================================

#[test]
fn chapter_3_budget_exhausted() {
    let env = env();

    for (i, expected_remaining) in [(0u8, 2u64), (1, 1), (2, 0)] {
        let presentation = build_presentation(ORIGIN, AADR, [i; 16], NOON_MS);
        match submit(&env, &presentation) {
            SpendOutcome::Accepted { remaining, .. } => assert_eq!(remaining, expected_remaining),
            other => panic!("spend {} should be accepted, got {:?}", i, other),
        }
    }

    let fourth = build_presentation(ORIGIN, AADR, [0x04; 16], NOON_MS);
    match submit(&env, &fourth) {
        SpendOutcome::Denied { window_used } => {
            assert_eq!(window_used, WindowUsed::Window(window_id(DAY)));
        }
        other => panic!("expected denial, got {:?}", other),
    }

    // Replaying the denied spend re-serves the stored denial.
    match submit(&env, &fourth) {
        SpendOutcome::Denied { .. } => {}
        other => panic!("expected replayed denial, got {:?}", other),
    }

    let events = env.sink.events();
    assert_eq!(events[3].result, "limit_exceeded");
    assert_eq!(events[3].remaining, Some(0));
}

// ============================================================================
// Chapter 4: origins are isolated counters
// ============================================================================

#[test]
fn chapter_4_cross_origin_isolation() {
    let env = env();

    submit(&env, &build_presentation(ORIGIN, AADR, client_nonce(), NOON_MS));

    // A pass minted for the other origin lands on a fresh counter.
    let other = build_presentation("https://attacker.com", AADR, client_nonce(), NOON_MS);
    match submit(&env, &other) {
        SpendOutcome::Accepted { remaining, .. } => assert_eq!(remaining, 2),
        other => panic!("expected acceptance on fresh counter, got {:?}", other),
    }

    // The original origin's budget is unaffected.
    match submit(&env, &build_presentation(ORIGIN, AADR, [0x02; 16], NOON_MS)) {
        SpendOutcome::Accepted { remaining, .. } => assert_eq!(remaining, 1),
        other => panic!("expected acceptance, got {:?}", other),
    }
}

#[test]
fn chapter_4b_presentation_cannot_be_moved_across_origins() {
    let env = env();

    // Take a valid presentation and only swap the origin field: the
    // server re-derives η and y for the new origin, so the client proof
    // no longer binds.
    let mut moved = build_presentation(ORIGIN, AADR, client_nonce(), NOON_MS);
    moved.origin = "https://attacker.com".into();
    assert_eq!(rejected_kind(&submit(&env, &moved)), "invalid_piC");
}

#[test]
fn chapter_4c_canonical_spellings_share_one_counter() {
    let env = env();

    submit(&env, &build_presentation(ORIGIN, AADR, [0x01; 16], NOON_MS));
    submit(
        &env,
        &build_presentation("https://EXAMPLE.com.", AADR, [0x02; 16], NOON_MS),
    );

    // Two spellings, one counter: the third spend sees remaining 0.
    match submit(
        &env,
        &build_presentation("https://example.com:443", AADR, [0x03; 16], NOON_MS),
    ) {
        SpendOutcome::Accepted { remaining, .. } => assert_eq!(remaining, 0),
        other => panic!("expected acceptance, got {:?}", other),
    }
}

// ============================================================================
// Chapter 5: midnight grace bridges the window boundary
// ============================================================================

#[test]
fn chapter_5_grace_replays_boundary_success() {
    let env = env();
    let before_midnight = DAY * MS_PER_DAY + MS_PER_DAY - 10_000; // 23:59:50
    let after_midnight = (DAY + 1) * MS_PER_DAY + 10_000; // 00:00:10

    env.clock.set(before_midnight);
    let first = build_presentation(ORIGIN, AADR, client_nonce(), before_midnight);
    match submit(&env, &first) {
        SpendOutcome::Accepted {
            remaining,
            window_used,
            ..
        } => {
            assert_eq!(remaining, 2);
            assert_eq!(window_used, WindowUsed::Window(window_id(DAY)));
        }
        other => panic!("expected acceptance, got {:?}", other),
    }

    // The same token, re-presented for the new window: the window-agnostic
    // grace key collides and the cached success is replayed.
    env.clock.set(after_midnight);
    let second = build_presentation(ORIGIN, AADR, client_nonce(), after_midnight);
    match submit(&env, &second) {
        SpendOutcome::Accepted {
            remaining,
            window_used,
            ..
        } => {
            assert_eq!(remaining, 2);
            assert_eq!(window_used, WindowUsed::GraceCached);
        }
        other => panic!("expected grace replay, got {:?}", other),
    }

    let events = env.sink.events();
    assert!(events[1].grace_protected);
    assert!(events[1].in_grace_period);
    // No new counter was touched for the replay.
    match submit(
        &env,
        &build_presentation(ORIGIN, AADR, [0x05; 16], after_midnight),
    ) {
        SpendOutcome::Accepted { remaining, .. } => assert_eq!(remaining, 2),
        other => panic!("expected fresh-window acceptance, got {:?}", other),
    }
}

#[test]
fn chapter_5b_grace_does_not_replay_denials() {
    let env = env();
    let mid_day = NOON_MS;
    let before_midnight = DAY * MS_PER_DAY + MS_PER_DAY - 10_000;
    let after_midnight = (DAY + 1) * MS_PER_DAY + 10_000;

    // Exhaust the budget during the day.
    for i in 0..3 {
        submit(&env, &build_presentation(ORIGIN, AADR, [i; 16], mid_day));
    }

    // A boundary spend is denied; denials are not banked in the grace
    // cache.
    env.clock.set(before_midnight);
    let denied = build_presentation(ORIGIN, AADR, [0x0A; 16], before_midnight);
    assert!(matches!(
        submit(&env, &denied),
        SpendOutcome::Denied { .. }
    ));

    // After midnight the new window has capacity: the token is
    // re-evaluated, not punished with a replayed denial.
    env.clock.set(after_midnight);
    let retry = build_presentation(ORIGIN, AADR, [0x0B; 16], after_midnight);
    match submit(&env, &retry) {
        SpendOutcome::Accepted {
            remaining,
            window_used,
            ..
        } => {
            assert_eq!(remaining, 2);
            assert_eq!(window_used, WindowUsed::Window(window_id(DAY + 1)));
        }
        other => panic!("expected re-evaluation, got {:?}", other),
    }
}

// ============================================================================
// Chapter 6: the pass is welded to its HTTP context
// ============================================================================

#[test]
fn chapter_6_tampered_body_rejected() {
    let env = env();

    let mut tampered = build_presentation(ORIGIN, AADR, client_nonce(), NOON_MS);
    tampered.http_body_hash_b64 = Some(b64url_encode(&sha256(b"hellx")));
    assert_eq!(rejected_kind(&submit(&env, &tampered)), "invalid_piC");
}

#[test]
fn chapter_6b_client_digest_cross_check() {
    let env = env();
    let (method, path, body) = protected_request();

    // An honest d_client passes through to π_C verification.
    let mut honest = build_presentation(ORIGIN, AADR, client_nonce(), NOON_MS);
    let d = http_context_digest(method, path, &sha256(body));
    honest.d_client = Some(b64url_encode(&d));
    assert!(matches!(
        submit(&env, &honest),
        SpendOutcome::Accepted { .. }
    ));

    // A disagreeing d_client is caught before proof verification.
    let mut lying = build_presentation(ORIGIN, AADR, [0x07; 16], NOON_MS);
    lying.d_client = Some(b64url_encode(&[0xAB; 32]));
    assert_eq!(rejected_kind(&submit(&env, &lying)), "d_mismatch");
}

// ============================================================================
// Chapter 7: the doors that stay shut
// ============================================================================

#[test]
fn chapter_7_auth_failures() {
    let env = env();
    let presentation = build_presentation(ORIGIN, AADR, client_nonce(), NOON_MS);

    assert_eq!(
        rejected_kind(&submit_with_key(&env, &presentation, None)),
        "missing_api_key"
    );
    assert_eq!(
        rejected_kind(&submit_with_key(&env, &presentation, Some("wrong"))),
        "invalid_api_key"
    );
    // Neither consumed budget.
    match submit(&env, &presentation) {
        SpendOutcome::Accepted { remaining, .. } => assert_eq!(remaining, 2),
        other => panic!("expected acceptance, got {:?}", other),
    }
}

#[test]
fn chapter_7b_structural_and_point_failures() {
    let env = env();

    let garbage = RequestContext {
        method: "POST".into(),
        path: "/verify".into(),
        body: b"{not json".to_vec(),
    };
    assert_eq!(
        rejected_kind(&handle_spend(&env.state, Some(API_KEY), &garbage)),
        "server_error"
    );

    let mut bad_point = build_presentation(ORIGIN, AADR, client_nonce(), NOON_MS);
    bad_point.m = b64url_encode(&[0x04; 33]);
    assert_eq!(rejected_kind(&submit(&env, &bad_point)), "invalid_point_encoding");

    let mut infinity = build_presentation(ORIGIN, AADR, client_nonce(), NOON_MS);
    infinity.z_prime = b64url_encode(&[0x00]);
    assert_eq!(
        rejected_kind(&submit(&env, &infinity)),
        "invalid_point_infinity"
    );

    let mut bad_origin = build_presentation(ORIGIN, AADR, client_nonce(), NOON_MS);
    bad_origin.origin = "http://example.com".into();
    assert_eq!(
        rejected_kind(&submit(&env, &bad_origin)),
        "origin_must_be_https"
    );
}

#[test]
fn chapter_7c_foreign_issuer_rejected() {
    let env = env();

    // A presentation whose proofs were produced under a different issuer
    // secret fails the issuer proof against the configured key.
    let mut presentation = build_presentation(ORIGIN, AADR, client_nonce(), NOON_MS);
    let rogue_k = Scalar::from(0xB7u64);
    let m = (ProjectivePoint::GENERATOR * Scalar::from(5u64)).to_affine();
    let z = (ProjectivePoint::from(m) * rogue_k).to_affine();
    let rogue_pk = (ProjectivePoint::GENERATOR * rogue_k).to_affine();
    let pi_i = dleq::prove(
        &rogue_k,
        &AffinePoint::GENERATOR,
        &rogue_pk,
        &m,
        &z,
        DLEQ_LABEL,
        b"",
        &mut OsRng,
    );
    presentation.m = b64url_encode(&encode_point(&m));
    presentation.z = b64url_encode(&encode_point(&z));
    presentation.pi_i = ProofScalars {
        c: b64url_encode(&encode_scalar(&pi_i.c)),
        r: b64url_encode(&encode_scalar(&pi_i.s)),
    };
    assert_eq!(rejected_kind(&submit(&env, &presentation)), "invalid_piI");
}

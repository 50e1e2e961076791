//! The spend-verification pipeline.
//!
//! One pass per request: authenticate, parse and validate the
//! presentation, verify the issuer proof, cross-check the HTTP context,
//! derive the server-authoritative salt and nullifier, verify the
//! context-bound client proof, then account the spend (with the
//! midnight-grace replay path). Telemetry fires on every terminal state.

use serde::{Serialize, Serializer};
use tracing::warn;

use brass_context::{
    canonical_origin, epoch_days, grace_nullifier, http_context_digest, idempotency_key,
    in_boundary_grace, nullifier_y, parse_policy_id, salt_eta, seconds_until_window_end,
    tls_binding, window_id,
};
use brass_core::codec::b64url_encode;
use brass_core::hash::{ct_eq, sha256};
use brass_core::{CounterKey, ErrorKind, SpendRequest, WindowId};
use brass_proof::binding::BindingContext;
use brass_proof::{client_binding, verify_client_proof, verify_issuer_proof, Presentation};

use crate::telemetry::SpendEvent;
use crate::AppState;

/// The live HTTP request the spend is bound to.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: String,
    pub path: String,
    pub body: Vec<u8>,
}

/// Which window a response was accounted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowUsed {
    Window(WindowId),
    /// The response was replayed from the midnight-grace cache.
    GraceCached,
}

impl Serialize for WindowUsed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            WindowUsed::Window(w) => serializer.serialize_u64(w.as_u64()),
            WindowUsed::GraceCached => serializer.serialize_str("grace_cached"),
        }
    }
}

/// Terminal state of one spend request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpendOutcome {
    Accepted {
        remaining: u64,
        idempotent: bool,
        window_used: WindowUsed,
    },
    Denied {
        window_used: WindowUsed,
    },
    Rejected {
        kind: ErrorKind,
    },
}

struct Verdict {
    outcome: SpendOutcome,
    in_grace: bool,
    grace_protected: bool,
}

impl Verdict {
    fn rejected(kind: ErrorKind) -> Self {
        Self {
            outcome: SpendOutcome::Rejected { kind },
            in_grace: false,
            grace_protected: false,
        }
    }
}

/// Run the full pipeline and emit telemetry for the terminal state.
pub fn handle_spend(
    state: &AppState,
    bearer: Option<&str>,
    request: &RequestContext,
) -> SpendOutcome {
    let started_ms = state.clock.now_ms();
    let verdict = run_pipeline(state, bearer, request);
    let elapsed_ms = state.clock.now_ms().saturating_sub(started_ms);

    let (result, idempotent, remaining) = match &verdict.outcome {
        SpendOutcome::Accepted {
            remaining,
            idempotent,
            ..
        } => ("ok".to_string(), Some(*idempotent), Some(*remaining)),
        SpendOutcome::Denied { .. } => ("limit_exceeded".to_string(), None, Some(0)),
        SpendOutcome::Rejected { kind } => (kind.as_str().to_string(), None, None),
    };
    state.telemetry.emit(SpendEvent {
        result,
        response_time_ms: elapsed_ms,
        in_grace_period: verdict.in_grace,
        grace_protected: verdict.grace_protected,
        idempotent,
        remaining,
    });

    verdict.outcome
}

fn run_pipeline(state: &AppState, bearer: Option<&str>, request: &RequestContext) -> Verdict {
    // S0: authenticate. The lookup is the only source of tenancy.
    let api_key = match bearer {
        Some(key) => key,
        None => return Verdict::rejected(ErrorKind::MissingApiKey),
    };
    let tenant = match state.keys.lookup(api_key) {
        Some(record) => record,
        None => return Verdict::rejected(ErrorKind::InvalidApiKey),
    };

    // S1: parse the payload and validate every point and scalar.
    let wire = match Presentation::from_json(&request.body) {
        Ok(wire) => wire,
        Err(e) => return Verdict::rejected(e.kind()),
    };
    let decoded = match wire.decode() {
        Ok(decoded) => decoded,
        Err(e) => return Verdict::rejected(e.kind()),
    };

    // S2: issuer proof over (G, Y, M, Z).
    if let Err(e) = verify_issuer_proof(&state.issuer_point, &decoded.m, &decoded.z, &decoded.pi_i)
    {
        return Verdict::rejected(e.kind());
    }

    // S3: HTTP-context digest from overrides or the live request, then the
    // client's cross-check if it sent one.
    let body_hash: [u8; 32] = match &wire.http_body_hash_b64 {
        Some(encoded) => match brass_core::codec::b64url_decode(encoded)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
        {
            Some(hash) => hash,
            None => return Verdict::rejected(ErrorKind::ServerError),
        },
        None => sha256(&request.body),
    };
    let method = wire.http_method.as_deref().unwrap_or(&request.method);
    let path = wire.http_path.as_deref().unwrap_or(&request.path);
    let http_context = http_context_digest(method, path, &body_hash);
    if let Some(d_client) = &decoded.d_client {
        if !ct_eq(d_client, &http_context) {
            return Verdict::rejected(ErrorKind::DigestMismatch);
        }
    }

    // S4: canonicalize the origin and derive the window, salt, and
    // nullifier. The presented epoch is advisory only.
    let origin = match canonical_origin(&wire.origin) {
        Ok(origin) => origin,
        Err(e) => return Verdict::rejected(e.kind()),
    };
    let now_ms = state.clock.now_ms();
    let epoch = epoch_days(now_ms);
    let window = window_id(epoch);
    if wire.epoch != epoch {
        warn!(presented = wire.epoch, derived = epoch, "presentation epoch disagrees");
    }
    let policy = parse_policy_id(&wire.aadr);
    let eta = salt_eta(&state.issuer_pk_enc, &origin, epoch, &policy, window);
    let nullifier = nullifier_y(&decoded.z_prime_enc, &wire.kid, &wire.aadr, &eta);

    // S5: context-bound client proof.
    let channel = tls_binding(decoded.tls_exporter.as_deref());
    let bind = client_binding(&BindingContext {
        nullifier: &nullifier,
        client_nonce: &decoded.nonce,
        http_context: &http_context,
        tls_binding: &channel,
        window_id: window,
        policy_id: &policy,
        aadr: &wire.aadr,
        kid: &wire.kid,
        eta: &eta,
    });
    if let Err(e) = verify_client_proof(
        &decoded.p,
        &decoded.m,
        &decoded.z_prime,
        &decoded.z,
        &decoded.pi_c,
        &bind,
    ) {
        return Verdict::rejected(e.kind());
    }

    // S6: idempotency key and the midnight-grace guard. Only cached
    // successes replay; anything else falls through to a real spend.
    let ik = match idempotency_key(state.config.kv_secret.as_bytes(), &nullifier, &decoded.nonce)
    {
        Ok(ik) => ik,
        Err(_) => return Verdict::rejected(ErrorKind::ServerError),
    };
    let in_grace = in_boundary_grace(now_ms, state.config.grace_seconds);
    let grace_key = if in_grace {
        let y_g = grace_nullifier(
            &decoded.z_prime_enc,
            &wire.kid,
            &state.issuer_pk_enc,
            &origin,
            &policy,
            &wire.aadr,
        );
        let grace_key = b64url_encode(&y_g);
        match state.store.guard_grace(
            &tenant.project_id,
            &grace_key,
            state.config.grace_seconds,
        ) {
            Ok(Some(cached)) if cached.ok => {
                return Verdict {
                    outcome: SpendOutcome::Accepted {
                        remaining: cached.remaining,
                        idempotent: cached.idempotent,
                        window_used: WindowUsed::GraceCached,
                    },
                    in_grace,
                    grace_protected: true,
                };
            }
            // A pending or non-ok entry means someone saw this token at
            // the boundary but never banked a success; re-evaluate.
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "grace guard failed");
                return Verdict::rejected(ErrorKind::ServerError);
            }
        }
        Some(grace_key)
    } else {
        None
    };

    // S7: account the spend.
    let spend = SpendRequest {
        key: CounterKey {
            project_id: tenant.project_id.clone(),
            issuer_pk: b64url_encode(&state.issuer_pk_enc),
            origin,
            epoch_days: epoch,
            policy_id: policy,
            window_id: window,
            nullifier: b64url_encode(&nullifier),
        },
        idempotency_key: ik,
        limit: tenant.limit,
        ttl_seconds: seconds_until_window_end(now_ms),
    };
    let decision = match state.store.spend(&spend) {
        Ok(decision) => decision,
        Err(e) => {
            warn!(error = %e, "counter store failed");
            return Verdict::rejected(ErrorKind::ServerError);
        }
    };

    if decision.ok {
        if let Some(grace_key) = grace_key {
            // Completes even if the caller goes away; a lost grace entry
            // would reopen the cross-window double-spend it exists to
            // close. Failures only lose the optimization.
            if let Err(e) = state.store.cache_grace_response(
                &tenant.project_id,
                &grace_key,
                state.config.grace_seconds,
                &decision,
            ) {
                warn!(error = %e, "grace cache write failed");
            }
        }
        Verdict {
            outcome: SpendOutcome::Accepted {
                remaining: decision.remaining,
                idempotent: decision.idempotent,
                window_used: WindowUsed::Window(window),
            },
            in_grace,
            grace_protected: false,
        }
    } else {
        Verdict {
            outcome: SpendOutcome::Denied {
                window_used: WindowUsed::Window(window),
            },
            in_grace,
            grace_protected: false,
        }
    }
}

//! Two-phase HTTP submission to KTL.
//!
//! Phase 1 uploads every produced artifact in a single `multipart/form-data`
//! request (repeated `files` field) to `{base}/uploadfiles`; it is skipped
//! outright when no artifacts exist. Phase 2 always POSTs the JSON envelope
//! to `{base}/env`. Phase 2 never starts before phase 1 finishes, and there
//! is no compensating rollback: artifacts uploaded in phase 1 stay on the
//! server if phase 2 fails.
//!
//! Each phase runs under bounded exponential-backoff retry. Only connection
//! failures, timeouts, and 5xx responses retry; 4xx and explicit
//! service-level failures are terminal immediately.
//!
//! The wire is behind the [`HttpTransport`] trait so tests drive the protocol
//! with scripted responses; [`ReqwestTransport`] is the production
//! implementation.

use crate::mapping::Envelope;
use crate::types::Artifact;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// The two protocol phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Upload,
    Data,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Upload => write!(f, "binary upload"),
            Phase::Data => write!(f, "data submission"),
        }
    }
}

/// Transport-level failure, below the HTTP status line.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    fn retryable(&self) -> bool {
        matches!(self, TransportError::Connect(_) | TransportError::Timeout)
    }
}

/// Raw response: status line plus body text.
#[derive(Debug, Clone)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

/// Seam between the protocol and the wire.
pub trait HttpTransport: Sync {
    fn post_artifacts(
        &self,
        url: &str,
        artifacts: &[Artifact],
    ) -> impl Future<Output = Result<TransportReply, TransportError>>;

    fn post_envelope(
        &self,
        url: &str,
        envelope: &Envelope,
    ) -> impl Future<Output = Result<TransportReply, TransportError>>;
}

/// Optional service-level result flags both endpoints may carry.
///
/// Success is `Success == "true"` or `code == 0`; an HTTP 200 body without
/// either flag counts as success.
#[derive(Debug, Default, Deserialize)]
pub struct ServiceReply {
    #[serde(rename = "Success")]
    success: Option<String>,
    code: Option<i64>,
    message: Option<String>,
    msg: Option<String>,
}

impl ServiceReply {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    /// `None` when the body carries no explicit flag. With both flags
    /// present, either one signalling success wins.
    fn verdict(&self) -> Option<bool> {
        if self.success.is_none() && self.code.is_none() {
            return None;
        }
        let flag_ok = self.success.as_deref() == Some("true");
        let code_ok = self.code == Some(0);
        Some(flag_ok || code_ok)
    }

    fn detail(&self) -> Option<&str> {
        self.message.as_deref().or(self.msg.as_deref())
    }
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("{phase} failed: {source}")]
    Transport {
        phase: Phase,
        source: TransportError,
    },
    #[error("{phase} failed: HTTP {status}: {detail}")]
    Server {
        phase: Phase,
        status: u16,
        detail: String,
    },
    #[error("{phase} rejected: {detail}")]
    Rejected { phase: Phase, detail: String },
}

impl SubmitError {
    fn retryable(&self) -> bool {
        match self {
            SubmitError::Transport { source, .. } => source.retryable(),
            SubmitError::Server { status, .. } => *status >= 500,
            SubmitError::Rejected { .. } => false,
        }
    }

    /// The phase whose failure is being surfaced.
    pub fn phase(&self) -> Phase {
        match self {
            SubmitError::Transport { phase, .. }
            | SubmitError::Server { phase, .. }
            | SubmitError::Rejected { phase, .. } => *phase,
        }
    }
}

/// Bounded exponential backoff, applied per phase.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(500),
            factor: 2,
        }
    }
}

/// Executes the two-phase protocol against one KTL base URL.
pub struct SubmissionClient<T> {
    transport: T,
    base_url: String,
    policy: RetryPolicy,
}

impl<T: HttpTransport> SubmissionClient<T> {
    pub fn new(transport: T, base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            policy,
        }
    }

    /// Run both phases in order. Resolves to success or the first terminal
    /// error — never left pending.
    pub async fn submit(
        &self,
        artifacts: &[Artifact],
        envelope: &Envelope,
    ) -> Result<(), SubmitError> {
        if artifacts.is_empty() {
            debug!("no artifacts produced, skipping binary upload phase");
        } else {
            let url = format!("{}/uploadfiles", self.base_url);
            self.run_phase(Phase::Upload, || {
                self.transport.post_artifacts(&url, artifacts)
            })
            .await?;
        }

        let url = format!("{}/env", self.base_url);
        self.run_phase(Phase::Data, || self.transport.post_envelope(&url, envelope))
            .await
    }

    /// Borrow the underlying transport, e.g. to inspect a recording mock.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn run_phase<F, Fut>(&self, phase: Phase, send: F) -> Result<(), SubmitError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<TransportReply, TransportError>>,
    {
        let mut delay = self.policy.base_delay;
        let mut attempt = 1u32;
        loop {
            let outcome = match send().await {
                Ok(reply) => evaluate(phase, &reply),
                Err(source) => Err(SubmitError::Transport { phase, source }),
            };

            match outcome {
                Ok(()) => {
                    debug!(%phase, attempt, "phase succeeded");
                    return Ok(());
                }
                Err(err) if err.retryable() && attempt < self.policy.attempts => {
                    warn!(%phase, attempt, error = %err, "retrying after backoff");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(self.policy.factor);
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Apply the response contract to one reply.
fn evaluate(phase: Phase, reply: &TransportReply) -> Result<(), SubmitError> {
    let service = ServiceReply::parse(&reply.body);
    if reply.status == 200 {
        return match service.verdict() {
            Some(false) => Err(SubmitError::Rejected {
                phase,
                detail: service
                    .detail()
                    .unwrap_or("service reported failure")
                    .to_string(),
            }),
            _ => Ok(()),
        };
    }
    Err(SubmitError::Server {
        phase,
        status: reply.status,
        detail: service.detail().unwrap_or("").to_string(),
    })
}

/// Production transport over a shared `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(Self { client })
    }
}

fn map_reqwest(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

async fn into_reply(response: reqwest::Response) -> Result<TransportReply, TransportError> {
    let status = response.status().as_u16();
    let body = response.text().await.map_err(map_reqwest)?;
    Ok(TransportReply { status, body })
}

impl HttpTransport for ReqwestTransport {
    async fn post_artifacts(
        &self,
        url: &str,
        artifacts: &[Artifact],
    ) -> Result<TransportReply, TransportError> {
        let mut form = reqwest::multipart::Form::new();
        for artifact in artifacts {
            let part = reqwest::multipart::Part::bytes(artifact.bytes.clone())
                .file_name(artifact.name.clone())
                .mime_str(&artifact.mime)
                .map_err(|e| TransportError::Other(e.to_string()))?;
            form = form.part("files", part);
        }
        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest)?;
        into_reply(response).await
    }

    async fn post_envelope(
        &self,
        url: &str,
        envelope: &Envelope,
    ) -> Result<TransportReply, TransportError> {
        let response = self
            .client
            .post(url)
            .json(envelope)
            .send()
            .await
            .map_err(map_reqwest)?;
        into_reply(response).await
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::sync::Mutex;

    /// One recorded request.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Sent {
        Artifacts { url: String, names: Vec<String> },
        Envelope { url: String, receipt: String },
    }

    /// Transport that replays a script of responses and records requests.
    #[derive(Default)]
    pub struct ScriptedTransport {
        script: Mutex<Vec<Result<TransportReply, TransportError>>>,
        pub sent: Mutex<Vec<Sent>>,
    }

    impl ScriptedTransport {
        pub fn with_script(script: Vec<Result<TransportReply, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn requests(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }

        fn next(&self) -> Result<TransportReply, TransportError> {
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                return Ok(ok_reply(""));
            }
            script.remove(0)
        }
    }

    impl HttpTransport for ScriptedTransport {
        async fn post_artifacts(
            &self,
            url: &str,
            artifacts: &[Artifact],
        ) -> Result<TransportReply, TransportError> {
            self.sent.lock().unwrap().push(Sent::Artifacts {
                url: url.to_string(),
                names: artifacts.iter().map(|a| a.name.clone()).collect(),
            });
            self.next()
        }

        async fn post_envelope(
            &self,
            url: &str,
            envelope: &Envelope,
        ) -> Result<TransportReply, TransportError> {
            self.sent.lock().unwrap().push(Sent::Envelope {
                url: url.to_string(),
                receipt: envelope.receipt_no.clone(),
            });
            self.next()
        }
    }

    pub fn ok_reply(body: &str) -> TransportReply {
        TransportReply {
            status: 200,
            body: body.to_string(),
        }
    }

    pub fn status_reply(status: u16, body: &str) -> TransportReply {
        TransportReply {
            status,
            body: body.to_string(),
        }
    }

    pub fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            base_delay: Duration::from_millis(1),
            factor: 2,
        }
    }

    fn artifact(name: &str) -> Artifact {
        Artifact {
            name: name.into(),
            bytes: vec![0u8; 8],
            mime: "image/png".into(),
        }
    }

    fn envelope() -> Envelope {
        Envelope {
            receipt_no: "R1".into(),
            env_data: "{}".into(),
            category: "env".into(),
            username: "kim".into(),
            comment: "\"A Bay\"".into(),
        }
    }

    #[test]
    fn service_flag_parsing() {
        assert_eq!(ServiceReply::parse(r#"{"Success":"true"}"#).verdict(), Some(true));
        assert_eq!(ServiceReply::parse(r#"{"Success":"false"}"#).verdict(), Some(false));
        assert_eq!(ServiceReply::parse(r#"{"code":0}"#).verdict(), Some(true));
        assert_eq!(ServiceReply::parse(r#"{"code":7}"#).verdict(), Some(false));
        assert_eq!(ServiceReply::parse("not json").verdict(), None);
        assert_eq!(ServiceReply::parse("{}").verdict(), None);
    }

    #[test]
    fn either_success_flag_wins_when_both_are_present() {
        assert_eq!(
            ServiceReply::parse(r#"{"Success":"false","code":0}"#).verdict(),
            Some(true)
        );
        assert_eq!(
            ServiceReply::parse(r#"{"Success":"true","code":7}"#).verdict(),
            Some(true)
        );
        assert_eq!(
            ServiceReply::parse(r#"{"Success":"false","code":3}"#).verdict(),
            Some(false)
        );
    }

    #[test]
    fn detail_prefers_message_over_msg() {
        let reply = ServiceReply::parse(r#"{"message":"a","msg":"b"}"#);
        assert_eq!(reply.detail(), Some("a"));
        let reply = ServiceReply::parse(r#"{"msg":"b"}"#);
        assert_eq!(reply.detail(), Some("b"));
    }

    #[tokio::test]
    async fn both_phases_run_in_order() {
        let transport = ScriptedTransport::with_script(vec![
            Ok(ok_reply(r#"{"Success":"true"}"#)),
            Ok(ok_reply(r#"{"code":0}"#)),
        ]);
        let client = SubmissionClient::new(transport, "http://ktl.local/", fast_policy());

        client.submit(&[artifact("t.png")], &envelope()).await.unwrap();

        let sent = client.transport.requests();
        assert_eq!(sent.len(), 2);
        assert!(matches!(
            &sent[0],
            Sent::Artifacts { url, names }
                if url == "http://ktl.local/uploadfiles" && names == &vec!["t.png".to_string()]
        ));
        assert!(matches!(
            &sent[1],
            Sent::Envelope { url, .. } if url == "http://ktl.local/env"
        ));
    }

    #[tokio::test]
    async fn zero_artifacts_skips_upload_phase_entirely() {
        let transport = ScriptedTransport::with_script(vec![Ok(ok_reply("{}"))]);
        let client = SubmissionClient::new(transport, "http://ktl.local", fast_policy());

        client.submit(&[], &envelope()).await.unwrap();

        let sent = client.transport.requests();
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Sent::Envelope { .. }));
    }

    #[tokio::test]
    async fn retries_5xx_up_to_cap_then_succeeds() {
        // 500, 500, then 200 within a cap of 3.
        let transport = ScriptedTransport::with_script(vec![
            Ok(status_reply(500, "")),
            Ok(status_reply(500, "")),
            Ok(ok_reply("")),
            Ok(ok_reply("")),
        ]);
        let client = SubmissionClient::new(transport, "http://ktl.local", fast_policy());

        client.submit(&[artifact("t.png")], &envelope()).await.unwrap();

        let sent = client.transport.requests();
        // Three upload attempts, one data attempt.
        assert_eq!(sent.len(), 4);
        assert!(matches!(&sent[3], Sent::Envelope { .. }));
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_server_error() {
        let transport = ScriptedTransport::with_script(vec![
            Ok(status_reply(503, "")),
            Ok(status_reply(503, "")),
            Ok(status_reply(503, "")),
        ]);
        let client = SubmissionClient::new(transport, "http://ktl.local", fast_policy());

        let err = client
            .submit(&[artifact("t.png")], &envelope())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SubmitError::Server { phase: Phase::Upload, status: 503, .. }
        ));
        assert_eq!(client.transport.requests().len(), 3);
    }

    #[tokio::test]
    async fn http_400_is_terminal_without_retry() {
        let transport = ScriptedTransport::with_script(vec![Ok(status_reply(
            400,
            r#"{"message":"invalid schema"}"#,
        ))]);
        let client = SubmissionClient::new(transport, "http://ktl.local", fast_policy());

        let err = client.submit(&[], &envelope()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Server { status: 400, .. }));
        assert!(err.to_string().contains("invalid schema"));
        // Exactly one request: no retries on 4xx.
        assert_eq!(client.transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn service_level_failure_on_200_is_terminal() {
        let transport = ScriptedTransport::with_script(vec![Ok(ok_reply(
            r#"{"Success":"false","msg":"duplicate receipt"}"#,
        ))]);
        let client = SubmissionClient::new(transport, "http://ktl.local", fast_policy());

        let err = client.submit(&[], &envelope()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Rejected { phase: Phase::Data, .. }));
        assert!(err.to_string().contains("duplicate receipt"));
        assert_eq!(client.transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn timeouts_retry_but_other_transport_errors_do_not() {
        let transport = ScriptedTransport::with_script(vec![
            Err(TransportError::Timeout),
            Ok(ok_reply("")),
        ]);
        let client = SubmissionClient::new(transport, "http://ktl.local", fast_policy());
        client.submit(&[], &envelope()).await.unwrap();
        assert_eq!(client.transport.requests().len(), 2);

        let transport = ScriptedTransport::with_script(vec![Err(TransportError::Other(
            "bad request body".into(),
        ))]);
        let client = SubmissionClient::new(transport, "http://ktl.local", fast_policy());
        let err = client.submit(&[], &envelope()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Transport { .. }));
        assert_eq!(client.transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn upload_failure_stops_before_data_phase() {
        let transport =
            ScriptedTransport::with_script(vec![Ok(status_reply(400, r#"{"msg":"too large"}"#))]);
        let client = SubmissionClient::new(transport, "http://ktl.local", fast_policy());

        let err = client
            .submit(&[artifact("t.png")], &envelope())
            .await
            .unwrap_err();
        assert_eq!(err.phase(), Phase::Upload);
        assert_eq!(client.transport.requests().len(), 1);
    }
}

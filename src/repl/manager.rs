use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicI64, Ordering};
use std::sync::Arc;
use chrono::{DateTime, Utc, Duration};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};
use crate::policy::{AuditPolicy, PolicyLoader};
use super::commands::ReplCommand;
use super::protocol::{
    JsonRpcRequest, JsonRpcResponse, RpcErrorCode, SessionInfo, ServerConfigInfo,
};
use super::session::ReplSession;

pub struct ServerConfig {
    pub default_policy: AuditPolicy,
    pub default_policy_path: Option<PathBuf>,
    pub max_sessions: usize,
    pub default_idle_timeout_secs: u64,
    pub max_idle_timeout_secs: u64,
    pub cleanup_interval_secs: u64,
}

impl ServerConfig {
    pub fn new(policy: AuditPolicy, policy_path: Option<PathBuf>) -> Self {
        Self {
            default_policy: policy,
            default_policy_path: policy_path,
            max_sessions: 100,
            default_idle_timeout_secs: 300,
            max_idle_timeout_secs: 3600,
            cleanup_interval_secs: 60,
        }
    }

    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.max_sessions = max;
        self
    }

    pub fn with_idle_timeout(mut self, secs: u64) -> Self {
        self.default_idle_timeout_secs = secs;
        self
    }

    pub fn with_max_idle_timeout(mut self, secs: u64) -> Self {
        self.max_idle_timeout_secs = secs;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SessionCreateParams {
    pub session_id: Option<String>,
    /// Dataset file to load as soon as the session starts.
    pub dataset: Option<PathBuf>,
    pub policy: Option<PathBuf>,
    pub idle_timeout_secs: Option<u64>,
    pub metadata: HashMap<String, String>,
}

impl SessionCreateParams {
    pub fn from_json(params: Option<&serde_json::Value>) -> Self {
        let mut result = Self::default();

        if let Some(p) = params {
            if let Some(s) = p.get("session").and_then(|v| v.as_str()) {
                result.session_id = Some(s.to_string());
            }
            if let Some(s) = p.get("dataset").and_then(|v| v.as_str()) {
                result.dataset = Some(PathBuf::from(s));
            }
            if let Some(s) = p.get("policy").and_then(|v| v.as_str()) {
                result.policy = Some(PathBuf::from(s));
            }
            if let Some(n) = p.get("idle_timeout").and_then(|v| v.as_u64()) {
                result.idle_timeout_secs = Some(n);
            }
            if let Some(obj) = p.get("metadata").and_then(|v| v.as_object()) {
                for (k, v) in obj {
                    if let Some(s) = v.as_str() {
                        result.metadata.insert(k.clone(), s.to_string());
                    }
                }
            }
        }

        result
    }
}

struct SessionRequest {
    request: JsonRpcRequest,
    response_tx: oneshot::Sender<JsonRpcResponse>,
}

pub struct SessionHandle {
    id: String,
    request_tx: mpsc::Sender<SessionRequest>,
    created_at: DateTime<Utc>,
    last_activity: Arc<AtomicI64>,
    request_count: Arc<AtomicU64>,
    idle_timeout_secs: u64,
    dataset: Option<PathBuf>,
    policy: Option<PathBuf>,
    metadata: HashMap<String, String>,
}

impl SessionHandle {
    pub fn touch(&self) {
        self.last_activity.store(Utc::now().timestamp(), Ordering::Relaxed);
    }

    pub fn last_activity_time(&self) -> DateTime<Utc> {
        let ts = self.last_activity.load(Ordering::Relaxed);
        DateTime::from_timestamp(ts, 0).unwrap_or(self.created_at)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.last_activity_time() + Duration::seconds(self.idle_timeout_secs as i64)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            created_at: self.created_at.to_rfc3339(),
            last_activity: self.last_activity_time().to_rfc3339(),
            request_count: self.request_count.load(Ordering::Relaxed),
            idle_timeout_secs: self.idle_timeout_secs,
            expires_at: self.expires_at().to_rfc3339(),
            dataset: self.dataset.as_ref().map(|p| p.to_string_lossy().to_string()),
            policy: self.policy.as_ref().map(|p| p.to_string_lossy().to_string()),
            metadata: self.metadata.clone(),
        }
    }
}

/// Owns one `ReplSession`; requests reach it only through its channel, so
/// sessions never share engine state.
struct SessionActor {
    id: String,
    session: ReplSession,
    request_rx: mpsc::Receiver<SessionRequest>,
    request_count: Arc<AtomicU64>,
    last_activity: Arc<AtomicI64>,
}

impl SessionActor {
    fn new(
        id: String,
        session: ReplSession,
        request_rx: mpsc::Receiver<SessionRequest>,
        request_count: Arc<AtomicU64>,
        last_activity: Arc<AtomicI64>,
    ) -> Self {
        Self {
            id,
            session,
            request_rx,
            request_count,
            last_activity,
        }
    }

    async fn run(mut self) {
        while let Some(req) = self.request_rx.recv().await {
            self.last_activity.store(Utc::now().timestamp(), Ordering::Relaxed);
            self.request_count.fetch_add(1, Ordering::Relaxed);
            let response = self.handle_request(req.request);
            let _ = req.response_tx.send(response);
        }
        debug!("Session actor {} stopped", self.id);
    }

    fn handle_request(&mut self, request: JsonRpcRequest) -> JsonRpcResponse {
        if !request.is_valid() {
            return JsonRpcResponse::invalid_request(request.id);
        }

        let cmd = match ReplCommand::from_json_rpc(&request.method, request.params.as_ref()) {
            Ok(c) => c,
            Err(e) => {
                if e.to_string().contains("Unknown method") {
                    return JsonRpcResponse::method_not_found(request.id, &request.method);
                }
                return JsonRpcResponse::invalid_params(request.id, e.to_string());
            }
        };

        let result = self.session.execute(cmd);

        if result.success {
            let response_data = if let Some(data) = result.data {
                data
            } else if let Some(output) = result.output {
                serde_json::json!({"output": output})
            } else {
                serde_json::json!({"success": true})
            };
            JsonRpcResponse::success(request.id, response_data)
        } else {
            let error_msg = result.error.unwrap_or_else(|| "Unknown error".to_string());
            JsonRpcResponse::engine_error(request.id, error_msg, result.code.as_deref())
        }
    }
}

pub struct SessionManager {
    sessions: HashMap<String, SessionHandle>,
    config: ServerConfig,
}

impl SessionManager {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            sessions: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn server_info(&self) -> ServerConfigInfo {
        ServerConfigInfo {
            max_sessions: self.config.max_sessions,
            current_sessions: self.sessions.len(),
            default_idle_timeout_secs: self.config.default_idle_timeout_secs,
            max_idle_timeout_secs: self.config.max_idle_timeout_secs,
            default_policy: self
                .config
                .default_policy_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string()),
        }
    }

    pub fn can_create_session(&self) -> bool {
        self.sessions.len() < self.config.max_sessions
    }

    fn limit_error(&self) -> JsonRpcResponse {
        JsonRpcResponse::fail(
            None,
            RpcErrorCode::SessionLimit,
            format!("Session limit reached (max: {})", self.config.max_sessions),
        )
    }

    pub fn get_or_create(&mut self, session_id: &str) -> Result<&SessionHandle, JsonRpcResponse> {
        if !self.sessions.contains_key(session_id) {
            if !self.can_create_session() {
                return Err(self.limit_error());
            }
            let params = SessionCreateParams {
                session_id: Some(session_id.to_string()),
                ..Default::default()
            };
            let handle = self.create_session(params)?;
            self.sessions.insert(session_id.to_string(), handle);
        }
        self.sessions.get(session_id).ok_or_else(|| {
            JsonRpcResponse::internal_error(None, format!("Session '{}' is missing", session_id))
        })
    }

    pub fn create_session_with_params(&mut self, params: SessionCreateParams) -> Result<SessionInfo, JsonRpcResponse> {
        let session_id = params.session_id.clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        if let Some(existing) = self.sessions.get(&session_id) {
            return Ok(existing.info());
        }

        if !self.can_create_session() {
            return Err(self.limit_error());
        }

        let handle = self.create_session(SessionCreateParams {
            session_id: Some(session_id.clone()),
            ..params
        })?;
        let info = handle.info();
        self.sessions.insert(session_id, handle);
        Ok(info)
    }

    fn create_session(&self, params: SessionCreateParams) -> Result<SessionHandle, JsonRpcResponse> {
        let id = params.session_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let (policy, policy_path) = match &params.policy {
            Some(path) => {
                let policy = PolicyLoader::load(path).map_err(|e| {
                    JsonRpcResponse::fail(None, RpcErrorCode::InvalidSessionConfig, e.to_string())
                })?;
                (policy, Some(path.clone()))
            }
            None => (
                self.config.default_policy.clone(),
                self.config.default_policy_path.clone(),
            ),
        };

        let idle_timeout = params.idle_timeout_secs
            .map(|t| t.min(self.config.max_idle_timeout_secs))
            .unwrap_or(self.config.default_idle_timeout_secs);

        let mut session = ReplSession::new(policy, policy_path.clone());

        if let Some(dataset) = &params.dataset {
            let result = session.execute(ReplCommand::Load {
                path: dataset.to_string_lossy().to_string(),
                policy: None,
            });
            if !result.success {
                return Err(JsonRpcResponse::fail(
                    None,
                    RpcErrorCode::InvalidSessionConfig,
                    result.error.unwrap_or_else(|| "Failed to load dataset".to_string()),
                ));
            }
        }

        let (request_tx, request_rx) = mpsc::channel(32);
        let request_count = Arc::new(AtomicU64::new(0));
        let last_activity = Arc::new(AtomicI64::new(Utc::now().timestamp()));
        let created_at = Utc::now();

        let actor = SessionActor::new(
            id.clone(),
            session,
            request_rx,
            Arc::clone(&request_count),
            Arc::clone(&last_activity),
        );

        tokio::spawn(actor.run());
        info!("Created session {}", id);

        Ok(SessionHandle {
            id,
            request_tx,
            created_at,
            last_activity,
            request_count,
            idle_timeout_secs: idle_timeout,
            dataset: params.dataset,
            policy: policy_path,
            metadata: params.metadata,
        })
    }

    pub async fn send_request(
        &mut self,
        session_id: &str,
        request: JsonRpcRequest,
    ) -> JsonRpcResponse {
        if let Some(handle) = self.sessions.get(session_id) {
            if handle.is_expired() {
                self.sessions.remove(session_id);
                return JsonRpcResponse::fail(
                    request.id,
                    RpcErrorCode::SessionExpired,
                    format!("Session '{}' has expired", session_id),
                );
            }
        }

        let handle = match self.get_or_create(session_id) {
            Ok(h) => h,
            Err(mut e) => {
                e.id = request.id;
                return e;
            }
        };

        handle.touch();

        let (response_tx, response_rx) = oneshot::channel();

        let session_request = SessionRequest {
            request: request.clone(),
            response_tx,
        };

        if handle.request_tx.send(session_request).await.is_err() {
            return JsonRpcResponse::internal_error(
                request.id,
                format!("Session '{}' is no longer available", session_id),
            );
        }

        match response_rx.await {
            Ok(response) => response,
            Err(_) => JsonRpcResponse::internal_error(
                request.id,
                "Session actor terminated unexpectedly".to_string(),
            ),
        }
    }

    pub fn keepalive(&mut self, session_id: &str) -> bool {
        if let Some(handle) = self.sessions.get(session_id) {
            if !handle.is_expired() {
                handle.touch();
                return true;
            }
        }
        false
    }

    pub fn destroy_session(&mut self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            info!("Destroyed session {}", session_id);
        }
        removed
    }

    pub fn cleanup_expired(&mut self) -> usize {
        let expired: Vec<String> = self.sessions
            .iter()
            .filter(|(_, h)| h.is_expired())
            .map(|(id, _)| id.clone())
            .collect();

        let count = expired.len();
        for id in expired {
            self.sessions.remove(&id);
        }
        if count > 0 {
            info!("Expired {} idle session(s)", count);
        }
        count
    }

    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        self.sessions.values().map(|h| h.info()).collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn request(method: &str, params: serde_json::Value) -> JsonRpcRequest {
        JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params: Some(params),
            id: Some(serde_json::json!(1)),
            session: None,
        }
    }

    fn dataset_file(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("orders.json");
        fs::write(
            &path,
            r#"[{"id": 1, "qty": 2}, {"id": 2, "qty": null}, {"id": 3, "qty": 4}]"#,
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_session_limit() {
        let config = ServerConfig::new(AuditPolicy::default(), None).with_max_sessions(1);
        let mut manager = SessionManager::new(config);

        assert!(manager.create_session_with_params(SessionCreateParams::default()).is_ok());
        let err = manager
            .create_session_with_params(SessionCreateParams::default())
            .unwrap_err();
        assert_eq!(err.error.unwrap().code, RpcErrorCode::SessionLimit.as_i32());
        assert_eq!(manager.session_count(), 1);
    }

    #[tokio::test]
    async fn test_create_with_dataset_and_audit() {
        let dir = TempDir::new().unwrap();
        let path = dataset_file(&dir);
        let mut manager = SessionManager::new(ServerConfig::new(AuditPolicy::default(), None));

        let params = SessionCreateParams {
            session_id: Some("a".to_string()),
            dataset: Some(path),
            ..Default::default()
        };
        let info = manager.create_session_with_params(params).unwrap();
        assert_eq!(info.id, "a");

        let response = manager.send_request("a", request("audit", serde_json::json!({}))).await;
        let result = response.result.unwrap();
        assert_eq!(result["rows"], 3);
        assert!(result["total_issues"].as_u64().unwrap() >= 1);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let dir = TempDir::new().unwrap();
        let path = dataset_file(&dir);
        let mut manager = SessionManager::new(ServerConfig::new(AuditPolicy::default(), None));

        for id in ["a", "b"] {
            let params = SessionCreateParams {
                session_id: Some(id.to_string()),
                dataset: Some(path.clone()),
                ..Default::default()
            };
            manager.create_session_with_params(params).unwrap();
            manager.send_request(id, request("audit", serde_json::json!({}))).await;
        }

        let propose = request("propose", serde_json::json!({"strategy": "drop-null-rows", "column": "qty"}));
        assert!(manager.send_request("a", propose).await.result.is_some());
        assert!(manager.send_request("a", request("confirm", serde_json::json!({}))).await.result.is_some());

        let a = manager.send_request("a", request("status", serde_json::json!({}))).await;
        let b = manager.send_request("b", request("status", serde_json::json!({}))).await;
        assert_eq!(a.result.unwrap()["summary"]["rows"], 2);
        assert_eq!(b.result.unwrap()["summary"]["rows"], 3);

        let undo = manager.send_request("b", request("undo", serde_json::json!({}))).await;
        let error = undo.error.unwrap();
        assert_eq!(error.data.unwrap()["code"], "empty_ledger");
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let mut manager = SessionManager::new(ServerConfig::new(AuditPolicy::default(), None));
        let response = manager.send_request("default", request("run", serde_json::json!({}))).await;
        assert_eq!(response.error.unwrap().code, RpcErrorCode::MethodNotFound.as_i32());
    }

    #[tokio::test]
    async fn test_bad_dataset_rejected() {
        let mut manager = SessionManager::new(ServerConfig::new(AuditPolicy::default(), None));
        let params = SessionCreateParams {
            dataset: Some(PathBuf::from("/nonexistent/data.json")),
            ..Default::default()
        };
        let err = manager.create_session_with_params(params).unwrap_err();
        assert_eq!(err.error.unwrap().code, RpcErrorCode::InvalidSessionConfig.as_i32());
        assert_eq!(manager.session_count(), 0);
    }

    #[tokio::test]
    async fn test_destroy_and_keepalive() {
        let mut manager = SessionManager::new(ServerConfig::new(AuditPolicy::default(), None));
        let params = SessionCreateParams {
            session_id: Some("x".to_string()),
            ..Default::default()
        };
        manager.create_session_with_params(params).unwrap();
        assert!(manager.keepalive("x"));
        assert!(manager.destroy_session("x"));
        assert!(!manager.keepalive("x"));
        assert!(!manager.destroy_session("x"));
    }
}

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, Duration};
use tracing::{debug, info};
use crate::error::Result;
use super::manager::{ServerConfig, SessionManager, SessionCreateParams};
use super::protocol::{JsonRpcRequest, JsonRpcResponse};

/// JSON-RPC 2.0 over stdin/stdout, one request per line. Requests name
/// their session with a top-level `session` field.
pub struct AsyncJsonRpcServer {
    manager: Arc<Mutex<SessionManager>>,
}

impl AsyncJsonRpcServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            manager: Arc::new(Mutex::new(SessionManager::new(config))),
        }
    }

    pub async fn run(config: ServerConfig) -> Result<()> {
        let cleanup_interval = config.cleanup_interval_secs;
        let server = Self::new(config);
        let (response_tx, mut response_rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        let stdout = tokio::io::stdout();
        let writer = tokio::spawn(async move {
            let mut stdout = BufWriter::new(stdout);
            while let Some(response) = response_rx.recv().await {
                if let Ok(json) = serde_json::to_string(&response) {
                    let _ = stdout.write_all(json.as_bytes()).await;
                    let _ = stdout.write_all(b"\n").await;
                    let _ = stdout.flush().await;
                }
            }
        });

        let cleanup_manager = Arc::clone(&server.manager);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(cleanup_interval.max(1)));
            loop {
                ticker.tick().await;
                let mut mgr = cleanup_manager.lock().await;
                mgr.cleanup_expired();
            }
        });

        info!("JSON-RPC server listening on stdin");

        let stdin = tokio::io::stdin();
        let reader = BufReader::new(stdin);
        let mut lines = reader.lines();

        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }

            let (response, should_exit) = server.dispatch_request(&line).await;
            let _ = response_tx.send(response);
            if should_exit {
                break;
            }
        }

        drop(response_tx);
        let _ = writer.await;
        info!("JSON-RPC server stopped");
        Ok(())
    }

    /// Handle one request line. The flag is true when the client asked to exit.
    pub async fn dispatch_request(&self, line: &str) -> (JsonRpcResponse, bool) {
        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                debug!("Unparseable request: {}", e);
                return (JsonRpcResponse::parse_error(), false);
            }
        };

        let session_id = request.session_id().to_string();
        let is_exit = matches!(request.method.as_str(), "exit" | "quit");

        match request.method.as_str() {
            "ping" => {
                return (
                    JsonRpcResponse::success(request.id, serde_json::json!({"pong": true})),
                    false,
                );
            }

            "sessions" => {
                let mgr = self.manager.lock().await;
                let sessions = mgr.list_sessions();
                return (
                    JsonRpcResponse::success(
                        request.id,
                        serde_json::to_value(sessions).unwrap_or_default(),
                    ),
                    false,
                );
            }

            "server_config" => {
                let mgr = self.manager.lock().await;
                let info = mgr.server_info();
                return (
                    JsonRpcResponse::success(
                        request.id,
                        serde_json::to_value(info).unwrap_or_default(),
                    ),
                    false,
                );
            }

            "session_create" => {
                let params = SessionCreateParams::from_json(request.params.as_ref());
                let mut mgr = self.manager.lock().await;
                let response = match mgr.create_session_with_params(params) {
                    Ok(info) => JsonRpcResponse::success(
                        request.id,
                        serde_json::to_value(info).unwrap_or_default(),
                    ),
                    Err(mut err) => {
                        err.id = request.id;
                        err
                    }
                };
                return (response, false);
            }

            "session_destroy" => {
                let session_id = request.params
                    .as_ref()
                    .and_then(|p| p.get("session"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("default");

                let mut mgr = self.manager.lock().await;
                let destroyed = mgr.destroy_session(session_id);
                return (
                    JsonRpcResponse::success(
                        request.id,
                        serde_json::json!({"destroyed": destroyed, "session": session_id}),
                    ),
                    false,
                );
            }

            "session_keepalive" => {
                let session_id = request.params
                    .as_ref()
                    .and_then(|p| p.get("session"))
                    .and_then(|v| v.as_str())
                    .unwrap_or("default");

                let mut mgr = self.manager.lock().await;
                let success = mgr.keepalive(session_id);
                return (
                    JsonRpcResponse::success(
                        request.id,
                        serde_json::json!({"success": success, "session": session_id}),
                    ),
                    false,
                );
            }

            _ => {}
        }

        let mut mgr = self.manager.lock().await;
        let response = mgr.send_request(&session_id, request).await;
        (response, is_exit)
    }
}

#[cfg(test)]
mod tests {
    use super::super::protocol::RpcErrorCode;
    use super::*;
    use crate::policy::AuditPolicy;

    fn server() -> AsyncJsonRpcServer {
        AsyncJsonRpcServer::new(ServerConfig::new(AuditPolicy::default(), None))
    }

    #[test]
    fn test_parse_error() {
        let response = JsonRpcResponse::parse_error();
        assert!(response.error.is_some());
        assert_eq!(response.error.as_ref().unwrap().code, RpcErrorCode::ParseError.as_i32());
    }

    #[test]
    fn test_invalid_request() {
        let response = JsonRpcResponse::invalid_request(Some(serde_json::json!(1)));
        assert!(response.error.is_some());
        assert_eq!(response.error.as_ref().unwrap().code, RpcErrorCode::InvalidRequest.as_i32());
    }

    #[tokio::test]
    async fn test_dispatch_ping_and_garbage() {
        let server = server();
        let (response, exit) = server.dispatch_request(r#"{"jsonrpc":"2.0","method":"ping","id":1}"#).await;
        assert_eq!(response.result.unwrap()["pong"], true);
        assert!(!exit);

        let (response, _) = server.dispatch_request("not json").await;
        assert_eq!(response.error.unwrap().code, RpcErrorCode::ParseError.as_i32());
    }

    #[tokio::test]
    async fn test_dispatch_exit() {
        let server = server();
        let (response, exit) = server.dispatch_request(r#"{"jsonrpc":"2.0","method":"exit","id":2}"#).await;
        assert!(response.error.is_none());
        assert!(exit);
    }

    #[tokio::test]
    async fn test_dispatch_session_lifecycle() {
        let server = server();
        let (created, _) = server
            .dispatch_request(r#"{"jsonrpc":"2.0","method":"session_create","params":{"session":"s1"},"id":1}"#)
            .await;
        assert_eq!(created.result.unwrap()["id"], "s1");

        let (listed, _) = server.dispatch_request(r#"{"jsonrpc":"2.0","method":"sessions","id":2}"#).await;
        assert_eq!(listed.result.unwrap().as_array().unwrap().len(), 1);

        let (destroyed, _) = server
            .dispatch_request(r#"{"jsonrpc":"2.0","method":"session_destroy","params":{"session":"s1"},"id":3}"#)
            .await;
        assert_eq!(destroyed.result.unwrap()["destroyed"], true);
    }
}

mod commands;
mod interactive;
mod manager;
mod protocol;
mod server;
mod session;

pub use commands::{ReplCommand, ReplResult};
pub use interactive::InteractiveRepl;
pub use manager::{ServerConfig, SessionManager, SessionCreateParams};
pub use protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcErrorCode, SessionInfo, ServerConfigInfo};
pub use server::AsyncJsonRpcServer;
pub use session::{format_report, ReplSession};

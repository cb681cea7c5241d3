pub mod conversation;
pub mod normalizer;
pub mod poller;
pub mod prompt;
pub mod providers;
pub mod retry;
pub mod server;
pub mod session_store;
pub mod state;
pub mod upload;

pub use conversation::{Answer, AskParams, ChatFlowError, ConversationManager};
pub use providers::{
    AgentApi, AgentClient, ChatClient, DocumentAnalysisResult, DocumentClient, MessageContent,
    ProviderError, RunInfo, RunStatus, RunStatusSource,
};
pub use retry::{RetryError, RetryPolicy};
pub use state::AppState;

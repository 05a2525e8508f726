//! The Invoker contract and its adapters: a generic OpenAI-compatible HTTP
//! implementation, a retry-once decorator, and a scripted mock for tests.

mod http;
mod mock;
mod parse;
mod registry;
mod retry;
mod traits;

pub use http::HttpInvoker;
pub use mock::MockInvoker;
pub use parse::{parse_best_effort, slice_outermost_braces, strip_fences};
pub use registry::InvokerRegistry;
pub use retry::RetryingInvoker;
pub use traits::{InvokeRequest, InvokeResponse, Invoker, PromptMessage, Role};

//! 生成层：文本生成客户端抽象与实现（Gemini / Mock）

pub mod gemini;
pub mod mock;
pub mod traits;

pub use gemini::{GeminiClient, DEFAULT_API_URL};
pub use mock::MockGenerateClient;
pub use traits::{GenerateClient, GenerateError};

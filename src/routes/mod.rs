pub mod health;
pub mod practice;
pub mod session;

/// AI 类接口共用的计数资源名
pub const AI_RESOURCE: &str = "ai";

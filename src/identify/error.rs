//! 协议选择配置错误
use thiserror::Error;

/// 解析协议选择字符串时可能出现的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// 配置字符串中没有任何协议名
    #[error("Protocol selection string is empty")]
    Empty,

    /// 不在已知词表中的协议名
    #[error("Unknown protocol '{0}' in selection string")]
    UnknownProtocol(String),
}

pub type Result<T> = std::result::Result<T, SelectorError>;

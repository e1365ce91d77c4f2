/// 协议识别模块
///
/// 只看 TCP / UDP 载荷的前 8 个字节，用 mask/value 规则判断消息类型。
pub mod error;
pub mod identifier;
pub mod matcher;
pub mod patterns;
pub mod selector;

pub use error::SelectorError;
pub use identifier::{ProtocolIdentifier, TcpMsgType, UdpMsgType, MATCH_LEN};
pub use matcher::MaskAndValue;
pub use selector::{ProtocolName, ProtocolSet, TrafficSelector};

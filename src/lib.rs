//! wirefp 库
//!
//! 被动协议识别和 ClientHello 指纹：用前 8 个字节识别 TCP / UDP 载荷类型，
//! 解密 QUIC Initial packet 并提取其中的 TLS ClientHello

pub mod analysis;
pub mod config;
pub mod identify;
pub mod logging;
pub mod processor;
pub mod quic;
pub mod tls;

// 重新导出常用类型
pub use analysis::{AnalysisResult, Classifier, DestinationContext, FlowKey, Transport};
pub use config::Config;
pub use identify::{TcpMsgType, TrafficSelector, UdpMsgType};
pub use processor::PacketProcessor;
pub use quic::{InitialSalts, QuicInitialMessage};
pub use tls::{ClientHello, Fingerprint, FingerprintType};

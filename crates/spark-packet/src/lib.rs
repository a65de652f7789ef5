//! `spark-packet` 提供可编程交换流水线中单个在途报文的运行时表示。
//!
//! # 模块定位（Why）
//! - 流水线的解析、匹配动作、逆解析各阶段都围绕同一个“报文”工作单元读写字节与头部状态，
//!   需要一个所有权清晰、可在线程间移动、又不会在热路径上反复分配的载体；
//! - 解析后的头部对象（PHV 一类结构）构造代价高昂，必须通过对象池在报文之间复用；
//! - 组播复制需要从一个入口报文派生出多个相互独立、可并发修改的副本，并以 `packet_id.copy_id`
//!   稳定标识每个副本。
//!
//! # 设计概要（How）
//! - [`buffer`]：[`PacketBuffer`] 在固定容量的 `BytesMut` 上维护前后留白，
//!   以 `push`/`pop` 实现零拷贝的封装头插入与剥离；
//! - [`header`]：[`Header`] 与 [`HeaderFactory`] 两个 trait 界定外部协作者的最小契约，
//!   本 crate 从不窥探头部对象的字段布局；
//! - [`pool`]：[`HeaderPool`] 以显式拥有的句柄替代进程级单例，配合 [`PooledHeader`] 在 `Drop`
//!   阶段自动归还对象；
//! - [`packet`]：[`Packet`] 组合缓冲、头部句柄与身份元数据，只允许移动，
//!   复制必须走显式的 [`Packet::clone_with_copy_id`]。
//!
//! # 契约说明（What）
//! - 数据路径上的前置条件违例（留白不足、剥离侵入负载区、未设置负载即访问负载）视为流水线缺陷，
//!   直接 panic；
//! - 池生命周期错误（未安装工厂、重复安装、跨代归还）以 [`PoolError`] 返回，便于测试确定性断言；
//! - 唯一的共享可变资源是池内空闲集合，由互斥锁保护；其余状态均由单一报文独占。

pub mod buffer;
pub mod config;
pub mod error;
pub mod header;
pub mod observability;
pub mod packet;
pub mod pool;

pub use buffer::PacketBuffer;
pub use config::{BufferConfig, PacketConfig, PoolConfig};
pub use error::{ConfigError, PoolError};
pub use header::{Header, HeaderFactory};
pub use packet::{CopyId, IngressMetadata, Packet, PacketId, PortId};
pub use pool::{HeaderPool, PoolStats, PooledHeader};

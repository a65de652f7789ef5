//! # Packet：流水线中的报文工作单元
//!
//! ## 核心意图（Why）
//! - 把原始字节（[`PacketBuffer`]）、解析后的头部状态（[`PooledHeader`]）与身份/路由元数据
//!   组合成一个只能移动的值，在解析、匹配动作、逆解析各阶段之间传递；
//! - 为组播复制提供显式的深拷贝入口，每个副本以 `packet_id.copy_id` 唯一标识。
//!
//! ## 行为契约（What）
//! - `Packet` 不实现 `Clone`：移动即转移缓冲与头部的所有权，移动后的旧绑定在编译期即不可用；
//! - 销毁时（包括被赋值覆盖时）持有的头部对象自动归还其所属池；
//! - `payload_size` 从活跃区间末尾起算，0 表示未设置负载边界；任何剥离都不得侵入负载区。
//!
//! ## 生命周期（How）
//! 构造（入口阶段或复制）→ 零个或多个阶段就地修改（缓冲编辑、头部编辑、出端口改写）→
//! 被消费（移交出口、复制为多个副本或直接丢弃）。报文自身没有“复用”状态，只有头部对象会被回收。

use core::fmt;

use crate::{
    buffer::PacketBuffer,
    error::PoolError,
    header::Header,
    pool::{HeaderPool, PooledHeader},
};

/// 交换机端口号。
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PortId(pub u32);

/// 原始入口报文的全局唯一编号，复制得到的副本沿用同一编号。
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct PacketId(pub u64);

/// 区分同一 `packet_id` 的不同副本。
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CopyId(pub u64);

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for PacketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Display for CopyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// 入口阶段为新报文提供的身份元数据。
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IngressMetadata {
    pub port: PortId,
    pub packet_id: PacketId,
    pub copy_id: CopyId,
}

impl IngressMetadata {
    pub fn new(port: PortId, packet_id: PacketId, copy_id: CopyId) -> Self {
        Self {
            port,
            packet_id,
            copy_id,
        }
    }
}

/// 在途报文。
///
/// # 教案式注释
/// - **意图 (Why)**：流水线各阶段只通过本类型的访问器读写报文，所有权规则保证同一时刻只有一个写者，
///   因此缓冲与头部对象都无需额外同步；
/// - **契约 (What)**：
///   - `ingress_port`、`packet_id`、`signature` 构造后不可变；`egress_port`、`copy_id` 可由路由决策改写；
///   - `payload_size <= data_len()` 恒成立；
///   - 头部对象若存在，绝不会与其他存活报文共享；
/// - **风险 (Trade-offs)**：字段顺序中 `header` 先于 `buffer`，销毁时先归还头部对象再释放字节存储。
pub struct Packet<H: Header> {
    ingress_port: Option<PortId>,
    egress_port: Option<PortId>,
    packet_id: PacketId,
    copy_id: CopyId,
    signature: u64,
    payload_size: usize,
    header: Option<PooledHeader<H>>,
    buffer: PacketBuffer,
}

/// 占位报文：无端口、编号为零、空缓冲、无头部对象。
impl<H: Header> Default for Packet<H> {
    fn default() -> Self {
        Self {
            ingress_port: None,
            egress_port: None,
            packet_id: PacketId::default(),
            copy_id: CopyId::default(),
            signature: 0,
            payload_size: 0,
            header: None,
            buffer: PacketBuffer::default(),
        }
    }
}

impl<H: Header> Packet<H> {
    /// 以入口元数据与缓冲构造报文，并从 `pool` 借出一个头部对象。
    ///
    /// - **契约 (What)**：池未安装工厂时返回 [`PoolError::FactoryNotInstalled`]，此时缓冲随错误路径一并释放；
    ///   借出的头部对象可能残留上一个报文的内容，需由解析阶段重写。
    pub fn new(
        pool: &HeaderPool<H>,
        meta: IngressMetadata,
        buffer: PacketBuffer,
    ) -> Result<Self, PoolError> {
        let header = pool.acquire()?;
        Ok(Self::assemble(meta, buffer, Some(header)))
    }

    /// 与 [`new`](Self::new) 相同，但借出的头部对象内容以 `src` 初始化。
    pub fn with_header_from(
        pool: &HeaderPool<H>,
        meta: IngressMetadata,
        buffer: PacketBuffer,
        src: &H,
    ) -> Result<Self, PoolError> {
        let mut header = pool.acquire()?;
        header.copy_from(src);
        Ok(Self::assemble(meta, buffer, Some(header)))
    }

    /// 构造不携带头部对象的报文，例如只做字节转发的旁路流量。
    pub fn without_header(meta: IngressMetadata, buffer: PacketBuffer) -> Self {
        Self::assemble(meta, buffer, None)
    }

    fn assemble(
        meta: IngressMetadata,
        buffer: PacketBuffer,
        header: Option<PooledHeader<H>>,
    ) -> Self {
        Self {
            ingress_port: Some(meta.port),
            egress_port: None,
            packet_id: meta.packet_id,
            copy_id: meta.copy_id,
            signature: signature_of(buffer.data()),
            payload_size: 0,
            header,
            buffer,
        }
    }

    pub fn ingress_port(&self) -> Option<PortId> {
        self.ingress_port
    }

    /// 出端口；路由决策写入之前为 `None`。
    pub fn egress_port(&self) -> Option<PortId> {
        self.egress_port
    }

    pub fn set_egress_port(&mut self, port: PortId) {
        self.egress_port = Some(port);
    }

    pub fn packet_id(&self) -> PacketId {
        self.packet_id
    }

    pub fn copy_id(&self) -> CopyId {
        self.copy_id
    }

    pub fn set_copy_id(&mut self, copy_id: CopyId) {
        self.copy_id = copy_id;
    }

    /// `"<packet_id>.<copy_id>"`，用于跨副本的追踪与去重。
    pub fn unique_id(&self) -> String {
        format!("{}.{}", self.packet_id, self.copy_id)
    }

    /// 构造时对入口字节计算的 CRC-32 摘要（扩展为 `u64`）；占位报文为 0。复制得到的副本沿用原值。
    pub fn signature(&self) -> u64 {
        self.signature
    }

    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    /// 声明负载边界：活跃区间末尾的 `size` 字节为负载。
    ///
    /// # Panics
    /// `size > data_len()` 时 panic。
    #[track_caller]
    pub fn set_payload_size(&mut self, size: usize) {
        assert!(
            size <= self.buffer.data_len(),
            "Packet::set_payload_size: payload of {size} bytes exceeds {} bytes of data",
            self.buffer.data_len()
        );
        self.payload_size = size;
    }

    pub fn data_len(&self) -> usize {
        self.buffer.data_len()
    }

    pub fn data(&self) -> &[u8] {
        self.buffer.data()
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.buffer.data_mut()
    }

    /// 负载区的只读视图。
    ///
    /// # Panics
    /// 尚未设置负载边界（`payload_size == 0`）时 panic。
    #[track_caller]
    pub fn payload(&self) -> &[u8] {
        let offset = self.payload_offset();
        &self.buffer.data()[offset..]
    }

    /// 负载区的可写视图，前置条件同 [`payload`](Self::payload)。
    #[track_caller]
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let offset = self.payload_offset();
        &mut self.buffer.data_mut()[offset..]
    }

    #[track_caller]
    fn payload_offset(&self) -> usize {
        assert!(
            self.payload_size > 0,
            "Packet::payload: payload size is not set"
        );
        self.buffer.data_len() - self.payload_size
    }

    /// 只读访问底层缓冲；长度变更只能经由 [`prepend`](Self::prepend) / [`remove`](Self::remove)。
    pub fn buffer(&self) -> &PacketBuffer {
        &self.buffer
    }

    /// 在报文前端插入 `n` 字节，返回新暴露区域；留白不足时 panic。
    #[track_caller]
    pub fn prepend(&mut self, n: usize) -> &mut [u8] {
        self.buffer.push(n)
    }

    /// 从报文前端剥离 `n` 字节，返回被剥离区域。
    ///
    /// # 教案式说明
    /// - **契约 (What)**：剥离后缓冲仍须容纳完整负载，即 `data_len() >= payload_size + n`；
    ///   否则说明解封装逻辑越过了负载边界，视为流水线缺陷并 panic。
    #[track_caller]
    pub fn remove(&mut self, n: usize) -> &mut [u8] {
        let data_len = self.buffer.data_len();
        assert!(
            self.payload_size
                .checked_add(n)
                .is_some_and(|required| required <= data_len),
            "Packet::remove: removing {n} bytes from {data_len} bytes would cut into {} bytes of payload",
            self.payload_size
        );
        self.buffer.pop(n)
    }

    pub fn has_header(&self) -> bool {
        self.header.is_some()
    }

    /// 借用头部对象；引用在报文存活且未被修改期间有效。
    pub fn header(&self) -> Option<&H> {
        self.header.as_deref()
    }

    pub fn header_mut(&mut self) -> Option<&mut H> {
        self.header.as_deref_mut()
    }

    /// 提前把头部对象归还给池，之后报文以无头部状态继续流转。
    pub fn release_header(&mut self) {
        self.header = None;
    }

    /// 为组播复制生成独立副本。
    ///
    /// # 教案式说明
    /// - **意图 (Why)**：一个入口报文需要变成 N 个可被不同出口并发修改的副本；
    /// - **执行 (How)**：
    ///   1. 缓冲深拷贝，副本拥有独立存储；
    ///   2. 若原报文持有头部对象，则从同一个池借出新实例并以 `copy_from` 复制内容；
    ///   3. `packet_id`、端口、签名、负载边界沿用原值，`copy_id` 取调用方给定值；
    /// - **契约 (What)**：池已卸载时返回 [`PoolError::FactoryNotInstalled`]；
    ///   之后对任一方缓冲或头部的修改都不会影响另一方。
    pub fn clone_with_copy_id(&self, new_copy_id: CopyId) -> Result<Self, PoolError> {
        let header = match &self.header {
            Some(src) => {
                let mut header = src.pool().acquire()?;
                header.copy_from(src);
                Some(header)
            }
            None => None,
        };
        Ok(Self {
            ingress_port: self.ingress_port,
            egress_port: self.egress_port,
            packet_id: self.packet_id,
            copy_id: new_copy_id,
            signature: self.signature,
            payload_size: self.payload_size,
            header,
            buffer: self.buffer.deep_clone(),
        })
    }

    /// 消耗报文，交出缓冲与头部句柄，供出口侧继续处理。
    pub fn into_parts(self) -> (PacketBuffer, Option<PooledHeader<H>>) {
        (self.buffer, self.header)
    }
}

fn signature_of(data: &[u8]) -> u64 {
    u64::from(crc32fast::hash(data))
}

impl<H: Header> fmt::Debug for Packet<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("unique_id", &self.unique_id())
            .field("ingress_port", &self.ingress_port)
            .field("egress_port", &self.egress_port)
            .field("signature", &format_args!("{:#010x}", self.signature))
            .field("payload_size", &self.payload_size)
            .field("has_header", &self.header.is_some())
            .field("buffer", &self.buffer)
            .finish()
    }
}

#[cfg(all(test, not(any(loom, spark_loom))))]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Phv {
        fields: [u16; 4],
    }

    impl Header for Phv {
        fn copy_from(&mut self, src: &Self) {
            self.fields = src.fields;
        }
    }

    fn pool() -> HeaderPool<Phv> {
        let pool = HeaderPool::new();
        pool.install(Phv::default).expect("安装工厂失败");
        pool
    }

    fn meta(port: u32, id: u64, copy: u64) -> IngressMetadata {
        IngressMetadata::new(PortId(port), PacketId(id), CopyId(copy))
    }

    #[test]
    fn default_packet_is_a_placeholder() {
        let packet: Packet<Phv> = Packet::default();
        assert_eq!(packet.ingress_port(), None);
        assert_eq!(packet.egress_port(), None);
        assert_eq!(packet.unique_id(), "0.0");
        assert_eq!(packet.signature(), 0);
        assert_eq!(packet.data_len(), 0);
        assert!(!packet.has_header());
    }

    #[test]
    fn construction_records_identity_and_signature() {
        let pool = pool();
        let frame = [0xde, 0xad, 0xbe, 0xef];
        let mut packet =
            Packet::new(&pool, meta(7, 55, 2), PacketBuffer::from_slice(8, &frame)).expect("构造失败");
        assert_eq!(packet.ingress_port(), Some(PortId(7)));
        assert_eq!(packet.packet_id(), PacketId(55));
        assert_eq!(packet.copy_id(), CopyId(2));
        assert_eq!(packet.unique_id(), "55.2");
        assert_eq!(packet.signature(), u64::from(crc32fast::hash(&frame)));
        assert!(packet.has_header());

        packet.set_egress_port(PortId(9));
        packet.set_copy_id(CopyId(3));
        assert_eq!(packet.egress_port(), Some(PortId(9)));
        assert_eq!(packet.unique_id(), "55.3");
    }

    #[test]
    fn header_is_initialised_from_source() {
        let pool = pool();
        let template = Phv {
            fields: [1, 2, 3, 4],
        };
        let packet = Packet::with_header_from(
            &pool,
            meta(1, 1, 0),
            PacketBuffer::with_headroom(16, 16),
            &template,
        )
        .expect("构造失败");
        assert_eq!(packet.header(), Some(&template));
    }

    #[test]
    fn construction_without_factory_fails() {
        let pool: HeaderPool<Phv> = HeaderPool::new();
        let err = Packet::new(&pool, meta(1, 1, 0), PacketBuffer::default())
            .expect_err("未安装工厂时构造必须失败");
        assert_eq!(err, PoolError::FactoryNotInstalled);
    }

    #[test]
    fn payload_is_counted_from_the_end() {
        let pool = pool();
        let mut packet = Packet::new(
            &pool,
            meta(1, 1, 0),
            PacketBuffer::from_slice(4, &[1, 2, 3, 4, 5, 6]),
        )
        .expect("构造失败");
        packet.set_payload_size(2);
        assert_eq!(packet.payload(), &[5, 6]);
        packet.payload_mut()[0] = 50;
        assert_eq!(packet.data(), &[1, 2, 3, 4, 50, 6]);

        packet.remove(4);
        assert_eq!(packet.data(), &[50, 6]);
        assert_eq!(packet.payload(), &[50, 6]);
    }

    #[test]
    #[should_panic(expected = "payload size is not set")]
    fn payload_access_without_boundary_panics() {
        let packet: Packet<Phv> =
            Packet::without_header(meta(1, 1, 0), PacketBuffer::from_slice(0, &[1]));
        let _ = packet.payload();
    }

    #[test]
    #[should_panic(expected = "would cut into")]
    fn remove_into_payload_panics() {
        let mut packet: Packet<Phv> =
            Packet::without_header(meta(1, 1, 0), PacketBuffer::from_slice(0, &[0; 10]));
        packet.set_payload_size(8);
        packet.remove(3);
    }

    #[test]
    #[should_panic(expected = "exceeds")]
    fn payload_larger_than_data_panics() {
        let mut packet: Packet<Phv> =
            Packet::without_header(meta(1, 1, 0), PacketBuffer::from_slice(0, &[0; 4]));
        packet.set_payload_size(5);
    }

    #[test]
    fn dropping_packet_returns_header() {
        let pool = pool();
        let packet =
            Packet::new(&pool, meta(1, 1, 0), PacketBuffer::default()).expect("构造失败");
        assert_eq!(pool.stats().checked_out, 1);
        drop(packet);
        let stats = pool.stats();
        assert_eq!(stats.checked_out, 0);
        assert_eq!(stats.idle, 1);
    }

    #[test]
    fn assignment_returns_destination_header_first() {
        let pool = pool();
        let mut slot =
            Packet::new(&pool, meta(1, 1, 0), PacketBuffer::default()).expect("构造失败");
        let incoming =
            Packet::new(&pool, meta(1, 2, 0), PacketBuffer::default()).expect("构造失败");
        assert_eq!(pool.stats().checked_out, 2);

        slot = incoming;
        assert_eq!(slot.packet_id(), PacketId(2));
        let stats = pool.stats();
        assert_eq!(stats.checked_out, 1);
        assert_eq!(stats.idle, 1);
    }

    #[test]
    fn release_header_hands_instance_back_early() {
        let pool = pool();
        let mut packet =
            Packet::new(&pool, meta(1, 1, 0), PacketBuffer::default()).expect("构造失败");
        packet.release_header();
        assert!(packet.header().is_none());
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn header_less_packet_clones_header_less() {
        let packet: Packet<Phv> =
            Packet::without_header(meta(4, 9, 0), PacketBuffer::from_slice(2, &[1, 2]));
        let copy = packet.clone_with_copy_id(CopyId(5)).expect("复制失败");
        assert!(!copy.has_header());
        assert_eq!(copy.unique_id(), "9.5");
        assert_eq!(copy.data(), packet.data());
    }

    #[test]
    fn into_parts_hands_over_buffer_and_header() {
        let pool = pool();
        let packet = Packet::new(&pool, meta(1, 1, 0), PacketBuffer::from_slice(0, &[3, 4]))
            .expect("构造失败");
        let (buffer, header) = packet.into_parts();
        assert_eq!(buffer.data(), &[3, 4]);
        assert!(header.is_some());
        drop(header);
        assert_eq!(pool.stats().idle, 1);
    }

    #[test]
    fn debug_renders_metadata() {
        let packet: Packet<Phv> =
            Packet::without_header(meta(3, 1000, 0), PacketBuffer::with_headroom(64, 64));
        let rendered = format!("{packet:?}");
        assert!(rendered.contains("unique_id: \"1000.0\""));
        assert!(rendered.contains("has_header: false"));
    }
}

use core::fmt;

use bytes::{Bytes, BytesMut};

/// `PacketBuffer` 是报文原始字节的承载区，在固定容量的存储上维护一段“活跃区间”。
///
/// # 设计动机（Why）
/// - 封装/解封装是交换流水线最频繁的字节操作：VXLAN、MPLS、VLAN 等头部需要在报文前端插入或剥离，
///   若每次都搬移整段负载，热路径成本将随报文长度线性增长；
/// - 通过在存储前后预留留白（headroom / tailroom），插入与剥离只需移动起始偏移，实现零拷贝。
///
/// # 布局（How）
/// ```text
/// |<-- headroom -->|<-- live data (start..end) -->|<-- tailroom -->|
/// 0              start                          end           capacity
/// ```
/// - `storage` 为一次性零填充的 `BytesMut`，容量在构造后不再变化；
/// - `start` 与 `len` 描述活跃区间，`end = start + len`。
///
/// # 契约说明（What）
/// - **不变量**：`start + len <= capacity`，任何操作都不会越出已分配区域；
/// - **前置条件**：`push(n)` 要求 `n <= headroom()`，`pop(n)` 要求 `n <= data_len()`，
///   `extend_from_slice` 要求写入长度不超过 `tailroom()`；违例即 panic，容量规划由调用方负责，
///   本类型不会静默扩容；
/// - **副作用**：仅更新内部偏移，不涉及头部对象。
///
/// # 设计取舍（Trade-offs）
/// - `Clone` 会复制整块存储（包含留白），保证副本与原件互不影响；组播复制依赖这一点。
/// - 放弃自动扩容换取可预测的延迟；若需要更大留白，应在入口阶段按配置重新申请缓冲。
#[derive(Clone, Default)]
pub struct PacketBuffer {
    storage: BytesMut,
    start: usize,
    len: usize,
}

impl PacketBuffer {
    /// 创建空缓冲：容量为 `capacity`，活跃区间从 `headroom` 处开始且长度为 0。
    ///
    /// # Panics
    /// `headroom > capacity` 时 panic。
    #[track_caller]
    pub fn with_headroom(capacity: usize, headroom: usize) -> Self {
        assert!(
            headroom <= capacity,
            "PacketBuffer::with_headroom: headroom {headroom} exceeds capacity {capacity}"
        );
        Self {
            storage: BytesMut::zeroed(capacity),
            start: headroom,
            len: 0,
        }
    }

    /// 以入口帧内容构造缓冲，前端预留 `headroom` 字节，尾部不留白。
    pub fn from_slice(headroom: usize, data: &[u8]) -> Self {
        Self::from_slice_with_tailroom(headroom, data, 0)
    }

    /// 以入口帧内容构造缓冲，并同时预留前后留白。
    ///
    /// - **契约 (What)**：返回缓冲的 `capacity() == headroom + data.len() + tailroom`，
    ///   `data()` 与输入逐字节相等。
    pub fn from_slice_with_tailroom(headroom: usize, data: &[u8], tailroom: usize) -> Self {
        let mut storage = BytesMut::zeroed(headroom + data.len() + tailroom);
        storage[headroom..headroom + data.len()].copy_from_slice(data);
        Self {
            storage,
            start: headroom,
            len: data.len(),
        }
    }

    /// 在活跃区间前端扩展 `n` 字节，返回新暴露出来的区域供调用方写入封装头。
    ///
    /// # 教案式说明
    /// - **意图 (Why)**：封装阶段需要在现有报文之前写入新头部，且不能搬移已有字节；
    /// - **执行 (How)**：仅将 `start` 前移 `n`，暴露的区域保留存储中的旧内容，调用方应完整覆盖；
    /// - **契约 (What)**：`n` 必须不超过 [`headroom`](Self::headroom)，否则视为流水线容量规划缺陷并 panic。
    #[track_caller]
    pub fn push(&mut self, n: usize) -> &mut [u8] {
        assert!(
            n <= self.start,
            "PacketBuffer::push: requested {n} bytes but only {} bytes of headroom remain",
            self.start
        );
        self.start -= n;
        self.len += n;
        &mut self.storage[self.start..self.start + n]
    }

    /// 从活跃区间前端剥离 `n` 字节，返回被剥离的区域（内容仍留在存储中，直至被后续 `push` 覆盖）。
    ///
    /// # Panics
    /// `n > data_len()` 时 panic。
    #[track_caller]
    pub fn pop(&mut self, n: usize) -> &mut [u8] {
        assert!(
            n <= self.len,
            "PacketBuffer::pop: requested {n} bytes but only {} bytes of data are live",
            self.len
        );
        let removed = self.start;
        self.start += n;
        self.len -= n;
        &mut self.storage[removed..removed + n]
    }

    /// 将 `src` 追加到活跃区间尾部，供接收路径填充帧内容。
    ///
    /// # Panics
    /// `src.len() > tailroom()` 时 panic。
    #[track_caller]
    pub fn extend_from_slice(&mut self, src: &[u8]) {
        let tailroom = self.tailroom();
        assert!(
            src.len() <= tailroom,
            "PacketBuffer::extend_from_slice: {} bytes do not fit into {tailroom} bytes of tailroom",
            src.len()
        );
        let end = self.end();
        self.storage[end..end + src.len()].copy_from_slice(src);
        self.len += src.len();
    }

    /// 活跃区间长度。
    pub fn data_len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 活跃区间在存储中的起始偏移。
    pub fn start(&self) -> usize {
        self.start
    }

    /// 活跃区间在存储中的结束偏移（不含），恒有 `end() - start() == data_len()`。
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    /// 存储总容量，构造后不变。
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// 前端剩余留白。
    pub fn headroom(&self) -> usize {
        self.start
    }

    /// 尾部剩余留白。
    pub fn tailroom(&self) -> usize {
        self.capacity() - self.end()
    }

    /// 活跃区间的只读视图。
    pub fn data(&self) -> &[u8] {
        &self.storage[self.start..self.end()]
    }

    /// 活跃区间的可写视图。
    pub fn data_mut(&mut self) -> &mut [u8] {
        let end = self.end();
        &mut self.storage[self.start..end]
    }

    /// 复制出一份独立存储的缓冲，布局（留白与偏移）与原件一致。
    ///
    /// 与 `Clone` 等价，单独命名是为了在复制路径上显式表达“深拷贝”的成本。
    pub fn deep_clone(&self) -> Self {
        self.clone()
    }

    /// 消耗缓冲并以 `Bytes` 交出活跃区间，供出口侧在不复制存储的前提下继续传递。
    pub fn freeze(self) -> Bytes {
        let mut storage = self.storage;
        storage.truncate(self.start + self.len);
        storage.split_off(self.start).freeze()
    }
}

// 只输出元数据，避免在日志中泄露报文内容。
impl fmt::Debug for PacketBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PacketBuffer")
            .field("capacity", &self.capacity())
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}

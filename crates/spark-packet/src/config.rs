//! 报文核心的静态配置：缓冲容量规划与头部对象池预热。
//!
//! # 设计背景（Why）
//! - 缓冲不会自动扩容，留白大小必须在入口阶段按最深封装栈规划，适合作为部署配置而非硬编码常量；
//! - 程序加载时预热一批头部对象，可以把首批报文的构造成本移出热路径。
//!
//! # 契约说明（What）
//! - 配置以 TOML 描述，缺省字段取 [`Default`] 值；未知字段视为错误，防止拼写错误被静默忽略；
//! - [`PacketConfig::validate`] 在加载后校验字段间约束，[`PacketConfig::from_toml_str`] 会自动调用。

use serde::Deserialize;

use crate::{buffer::PacketBuffer, error::ConfigError};

/// 默认缓冲容量，覆盖标准以太网帧与常见封装栈。
pub const DEFAULT_BUFFER_CAPACITY: usize = 2048;

/// 默认前端留白：以太网(14) + IPv6(40) + UDP(8) + VXLAN(8) 的两层封装后仍有余量。
pub const DEFAULT_HEADROOM: usize = 128;

/// 顶层配置。
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PacketConfig {
    pub buffer: BufferConfig,
    pub pool: PoolConfig,
}

impl PacketConfig {
    /// 从 TOML 文本解析并校验配置。
    ///
    /// ```rust
    /// use spark_packet::PacketConfig;
    ///
    /// let config = PacketConfig::from_toml_str("[pool]\nprewarm = 4\n").expect("合法配置");
    /// assert_eq!(config.pool.prewarm, 4);
    /// assert_eq!(config.buffer.headroom, spark_packet::config::DEFAULT_HEADROOM);
    /// ```
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// 校验字段间约束。
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.buffer.validate()
    }
}

/// 入口缓冲的容量规划。
///
/// - `capacity`：单个缓冲的总字节数（含前后留白）；
/// - `headroom`：入口时预留给封装头的前端字节数，必须不超过 `capacity`。
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BufferConfig {
    pub capacity: usize,
    pub headroom: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_BUFFER_CAPACITY,
            headroom: DEFAULT_HEADROOM,
        }
    }
}

impl BufferConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "buffer.capacity",
                reason: "capacity must be non-zero".to_owned(),
            });
        }
        if self.headroom > self.capacity {
            return Err(ConfigError::Invalid {
                field: "buffer.headroom",
                reason: format!(
                    "headroom {} exceeds capacity {}",
                    self.headroom, self.capacity
                ),
            });
        }
        Ok(())
    }

    /// 按规划申请一个空缓冲，活跃区间从 `headroom` 处开始。
    ///
    /// # Panics
    /// 未经 [`validate`](Self::validate) 且 `headroom > capacity` 时 panic。
    pub fn allocate(&self) -> PacketBuffer {
        PacketBuffer::with_headroom(self.capacity, self.headroom)
    }
}

/// 头部对象池的行为参数。
///
/// - `prewarm`：每次安装工厂后立即构造并放入空闲集合的实例数量；0 表示完全按需构造。
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    pub prewarm: usize,
}

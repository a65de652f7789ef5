//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 区分两类失败：数据路径上的前置条件违例属于流水线缺陷，直接 panic，不在此建模；
//!   池生命周期与配置错误需要被启动/热加载流程显式处理，因此以 `thiserror` 枚举返回。
//!
//! ## 设计要求（What）
//! - 所有错误类型均实现 `std::error::Error + Send + Sync + 'static`；
//! - 变体携带足够的上下文（安装代次、配置字段），便于排障时直接定位。

use thiserror::Error;

/// 头部对象池的生命周期错误。
///
/// # 教案式说明
/// - **意图 (Why)**：流水线在程序加载/卸载时安装或拆除工厂，时序错误必须可被测试确定性地断言，
///   而不是在热路径上静默降级；
/// - **契约 (What)**：`acquire`/`release` 在未安装工厂时返回 [`PoolError::FactoryNotInstalled`]；
///   重复安装返回 [`PoolError::FactoryAlreadyInstalled`]；跨代归还返回 [`PoolError::GenerationMismatch`]。
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum PoolError {
    /// 池当前没有安装工厂：程序尚未加载或已被卸载。
    #[error("header pool has no factory installed")]
    FactoryNotInstalled,

    /// 已有工厂处于安装状态，必须先卸载才能安装新的工厂。
    ///
    /// - **风险 (Trade-offs)**：频繁出现通常意味着热加载流程遗漏了卸载步骤。
    #[error("header pool already has a factory installed (generation {generation})")]
    FactoryAlreadyInstalled { generation: u64 },

    /// 归还的头部对象属于已卸载的旧程序代次，被直接丢弃而不会进入当前空闲集合。
    #[error("header checked out under generation {checked_out} returned to generation {current}")]
    GenerationMismatch { checked_out: u64, current: u64 },
}

/// 配置加载与校验错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    /// TOML 文本无法解析为配置结构。
    #[error("failed to parse packet configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// 配置字段取值违反约束。
    #[error("invalid packet configuration `{field}`: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

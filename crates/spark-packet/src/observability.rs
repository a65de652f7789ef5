//! 日志键名契约：统一 `spark-packet` 输出的 `tracing` target 与事件名。
//!
//! 教案式说明（Why）：订阅方（如 `tracing-subscriber` 的 `EnvFilter`）按 target 过滤，
//! 测试通过事件名断言日志，集中声明避免多处字符串漂移。
//! 契约定义（What）：字段统一采用 `header_pool.*` 前缀的点分命名，直接写在 `tracing` 宏中。

/// 头部对象池的日志分组。
pub mod pool {
    #[doc = "类型：tracing target。"]
    #[doc = "适用范围：池安装、卸载、构造、复用与丢弃事件。"]
    pub const TARGET: &str = "spark_packet::pool";

    #[doc = "工厂安装完成，字段：`header_pool.generation`、`header_pool.prewarmed`。"]
    pub const EVENT_INSTALLED: &str = "header_pool.installed";

    #[doc = "工厂已卸载，字段：`header_pool.generation`、`header_pool.idle_dropped`。"]
    pub const EVENT_UNINSTALLED: &str = "header_pool.uninstalled";

    #[doc = "空闲集合未命中，工厂构造了新实例，字段：`header_pool.generation`。"]
    pub const EVENT_CREATED: &str = "header_pool.created";

    #[doc = "空闲集合命中，复用既有实例，字段：`header_pool.generation`。"]
    pub const EVENT_REUSED: &str = "header_pool.reused";

    #[doc = "归还的实例或被作废的预热批次被丢弃，字段：`header_pool.reason` 及代次信息。"]
    pub const EVENT_DISCARDED: &str = "header_pool.discarded";
}

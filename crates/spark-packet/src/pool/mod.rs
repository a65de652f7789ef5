use std::{
    fmt, mem,
    ops::{Deref, DerefMut},
    sync::Arc,
};

//
// 教案级说明：空闲集合是整个报文核心唯一的共享可变资源。常规构建使用 `parking_lot::Mutex`
// （无毒化语义，工厂 panic 不会连带污染池）；`--cfg loom` 下切换到 `loom::sync::Mutex`
// 以便模型检查枚举 acquire/release 的交错。
#[cfg(any(loom, spark_loom))]
use loom::sync::{Mutex, MutexGuard};
#[cfg(not(any(loom, spark_loom)))]
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use crate::{
    config::PoolConfig,
    error::PoolError,
    header::{Header, HeaderFactory},
    observability::pool as keys,
};

mod stats;

pub use stats::PoolStats;
use stats::PoolMetrics;

#[cfg(not(any(loom, spark_loom)))]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock()
}

#[cfg(any(loom, spark_loom))]
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// `HeaderPool` 是线程安全的头部对象回收器，以工厂为键在报文之间复用昂贵的头部实例。
///
/// # 模块角色（Why）
/// - 头部对象按程序分配全部字段，构造成本远高于报文本身；池让稳态下的报文处理不再触发该构造；
/// - 池是显式拥有的对象：由装配流水线执行上下文的一方创建并以句柄传给报文构造点，
///   取代隐藏的进程级全局状态，生命周期清晰且不泄漏；
/// - “每个活跃程序一个池”的语义由 `install` / `uninstall` 生命周期保持。
///
/// # 核心机制（How）
/// - 内部维护 `Mutex<PoolState>`：当前工厂、安装代次与空闲集合 `Vec<Box<H>>`；
/// - `acquire` 在锁内决定“复用还是构造”，构造本身在释放锁之后进行，避免不相关线程为分配成本排队；
/// - 借出的实例包装为 [`PooledHeader`]，其 `Drop` 自动归还；显式归还走 [`HeaderPool::release`]；
/// - 每次 `install` 开启新代次，旧代次借出的实例归还时被丢弃，不会混入新程序的空闲集合。
///
/// # 契约说明（What）
/// - **线程安全**：`acquire` / `release` 可被任意数量线程并发调用；同一实例绝不会同时出借给两个调用方；
/// - **生命周期**：未安装工厂时 `acquire` / `release` 返回 [`PoolError::FactoryNotInstalled`]；
///   同一时刻至多安装一个工厂；
/// - **容量**：池只增不减，空闲集合仅在 `uninstall` 时整体清空；
/// - **复用语义**：实例按原样出借，不做重置，详见 [`acquire`](Self::acquire)。
///
/// # 设计权衡（Trade-offs）
/// - 以内存换热路径稳定性：峰值并发借出的实例数即池的最终规模；
/// - 重复归还在类型层面不可表达（`PooledHeader` 为唯一所有者且归还即消耗），无需运行期检测。
pub struct HeaderPool<H: Header> {
    shared: Arc<PoolShared<H>>,
}

impl<H: Header> Clone for HeaderPool<H> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<H: Header> Default for HeaderPool<H> {
    fn default() -> Self {
        Self::with_config(PoolConfig::default())
    }
}

impl<H: Header> HeaderPool<H> {
    /// 创建尚未安装工厂的空池。
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建携带预热参数的空池；参数在每次 `install` 时生效。
    pub fn with_config(config: PoolConfig) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    factory: None,
                    generation: 0,
                    idle: Vec::new(),
                }),
                config,
                metrics: PoolMetrics::new(),
            }),
        }
    }

    /// 安装工厂并开启新的代次，随后按配置预热空闲集合。
    ///
    /// # 教案式说明
    /// - **意图 (Why)**：程序加载完成后由装配方调用一次，此后报文才能获取头部对象；
    /// - **执行 (How)**：锁内登记工厂并递增代次；预热实例在锁外构造，再整体并入空闲集合；
    ///   若预热期间池已被卸载或重装，这批实例整体丢弃，记入 `discarded` 并输出 `warn` 日志；
    /// - **契约 (What)**：已有工厂处于安装状态时返回 [`PoolError::FactoryAlreadyInstalled`]，
    ///   且不改变池的任何状态。
    pub fn install<F>(&self, factory: F) -> Result<(), PoolError>
    where
        F: HeaderFactory<H>,
    {
        let factory: Arc<dyn HeaderFactory<H>> = Arc::new(factory);
        let generation = {
            let mut state = lock(&self.shared.state);
            if state.factory.is_some() {
                return Err(PoolError::FactoryAlreadyInstalled {
                    generation: state.generation,
                });
            }
            state.generation += 1;
            state.factory = Some(Arc::clone(&factory));
            state.generation
        };

        let prewarm = self.shared.config.prewarm;
        if prewarm > 0 {
            let warmed: Vec<Box<H>> = (0..prewarm).map(|_| Box::new(factory.create())).collect();
            self.shared.metrics.record_created(prewarm as u64);
            let superseded = {
                let mut state = lock(&self.shared.state);
                if state.factory.is_some() && state.generation == generation {
                    state.idle.extend(warmed);
                    None
                } else {
                    Some(warmed)
                }
            };
            if let Some(warmed) = superseded {
                drop(warmed);
                self.shared.metrics.record_discard(prewarm as u64);
                warn!(
                    target: keys::TARGET,
                    {
                        header_pool.generation = generation,
                        header_pool.discarded = prewarm,
                        header_pool.reason = "prewarm batch superseded by uninstall or reinstall",
                    },
                    "{}",
                    keys::EVENT_DISCARDED
                );
            }
        }

        debug!(
            target: keys::TARGET,
            {
                header_pool.generation = generation,
                header_pool.prewarmed = prewarm,
            },
            "{}",
            keys::EVENT_INSTALLED
        );
        Ok(())
    }

    /// 卸载当前工厂并释放全部空闲实例。
    ///
    /// - **契约 (What)**：未安装时返回 [`PoolError::FactoryNotInstalled`]；
    ///   卸载后仍在外借出的实例归还时将被丢弃并记入 `discarded`。
    pub fn uninstall(&self) -> Result<(), PoolError> {
        let (generation, idle) = {
            let mut state = lock(&self.shared.state);
            if state.factory.take().is_none() {
                return Err(PoolError::FactoryNotInstalled);
            }
            (state.generation, mem::take(&mut state.idle))
        };
        let idle_dropped = idle.len();
        drop(idle);

        debug!(
            target: keys::TARGET,
            {
                header_pool.generation = generation,
                header_pool.idle_dropped = idle_dropped,
            },
            "{}",
            keys::EVENT_UNINSTALLED
        );
        Ok(())
    }

    /// 当前是否有工厂处于安装状态。
    pub fn is_installed(&self) -> bool {
        lock(&self.shared.state).factory.is_some()
    }

    /// 借出一个头部实例：空闲集合非空时复用，否则调用工厂构造。
    ///
    /// # 教案式说明
    /// - **意图 (Why)**：让稳态下的报文构造只付出一次加锁与一次 `Vec::pop`；
    /// - **执行 (How)**：
    ///   1. 锁内读取工厂与代次，并尝试弹出空闲实例；是否需要构造由这一刻的空闲集合决定；
    ///   2. 未命中时释放锁，再调用工厂构造，使分配成本不会串行化其他线程；
    /// - **契约 (What)**：
    ///   - 未安装工厂时返回 [`PoolError::FactoryNotInstalled`]；
    ///   - 复用的实例**保留上一次使用时的内容**，池不负责重置；需要干净状态的调用方应自行初始化，
    ///     例如 [`Packet::with_header_from`](crate::Packet::with_header_from) 会以 `copy_from` 覆盖；
    ///   - 在无其他借出介入时，刚归还的实例会被下一次 `acquire` 原样取回（后进先出）。
    pub fn acquire(&self) -> Result<PooledHeader<H>, PoolError> {
        let (factory, generation) = {
            let mut state = lock(&self.shared.state);
            let generation = state.generation;
            if state.factory.is_some()
                && let Some(instance) = state.idle.pop()
            {
                drop(state);
                self.shared.metrics.record_checkout(true);
                trace!(
                    target: keys::TARGET,
                    {
                        header_pool.generation = generation,
                    },
                    "{}",
                    keys::EVENT_REUSED
                );
                return Ok(PooledHeader::new(instance, generation, Arc::clone(&self.shared)));
            }
            let Some(factory) = state.factory.as_ref().map(Arc::clone) else {
                return Err(PoolError::FactoryNotInstalled);
            };
            (factory, generation)
        };

        let instance = Box::new(factory.create());
        self.shared.metrics.record_created(1);
        self.shared.metrics.record_checkout(false);
        trace!(
            target: keys::TARGET,
            {
                header_pool.generation = generation,
            },
            "{}",
            keys::EVENT_CREATED
        );
        Ok(PooledHeader::new(instance, generation, Arc::clone(&self.shared)))
    }

    /// 显式归还一个头部实例。
    ///
    /// # 契约说明（What）
    /// - **前置条件**：`header` 必须借自本池；误用属于调用方缺陷，debug 构建下断言失败，
    ///   release 构建下实例仍回到其所属池；
    /// - **后置条件**：成功时实例进入空闲集合；池已卸载时返回 [`PoolError::FactoryNotInstalled`]，
    ///   代次不符时返回 [`PoolError::GenerationMismatch`]，两种情况下实例均被丢弃；
    /// - 调用后句柄已被消耗，调用方不再持有实例的任何引用。
    pub fn release(&self, header: PooledHeader<H>) -> Result<(), PoolError> {
        debug_assert!(
            Arc::ptr_eq(&self.shared, &header.pool),
            "PooledHeader released into a pool it was not acquired from"
        );
        let (instance, generation, home) = header.detach();
        home.reclaim(instance, generation)
    }

    /// 读取统计快照。
    pub fn stats(&self) -> PoolStats {
        let (generation, installed, idle) = {
            let state = lock(&self.shared.state);
            (state.generation, state.factory.is_some(), state.idle.len())
        };
        self.shared.metrics.snapshot(generation, installed, idle)
    }

    /// 判断两个句柄是否指向同一个池。
    pub fn same_pool(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<H: Header> fmt::Debug for HeaderPool<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HeaderPool")
            .field("stats", &self.stats())
            .finish()
    }
}

struct PoolShared<H: Header> {
    state: Mutex<PoolState<H>>,
    config: PoolConfig,
    metrics: PoolMetrics,
}

struct PoolState<H: Header> {
    factory: Option<Arc<dyn HeaderFactory<H>>>,
    generation: u64,
    idle: Vec<Box<H>>,
}

impl<H: Header> PoolShared<H> {
    /// 归还路径的唯一实现，显式 `release` 与 `PooledHeader::drop` 共用。
    fn reclaim(&self, instance: Box<H>, checked_out: u64) -> Result<(), PoolError> {
        self.metrics.record_return();
        let mut state = lock(&self.state);
        let error = if state.factory.is_none() {
            PoolError::FactoryNotInstalled
        } else if state.generation != checked_out {
            PoolError::GenerationMismatch {
                checked_out,
                current: state.generation,
            }
        } else {
            state.idle.push(instance);
            return Ok(());
        };
        drop(state);
        drop(instance);

        self.metrics.record_discard(1);
        warn!(
            target: keys::TARGET,
            {
                header_pool.generation = checked_out,
                header_pool.reason = %error,
            },
            "{}",
            keys::EVENT_DISCARDED
        );
        Err(error)
    }
}

/// `PooledHeader` 是借出头部实例的唯一所有权句柄。
///
/// # 设计动机（Why）
/// - 报文需要独占头部对象，并在自身销毁时把它交还给池；把归还动作放进句柄的 `Drop`，
///   调用方无需记得释放，移动句柄即转移所有权，天然不存在别名；
///
/// # 契约说明（What）
/// - 通过 `Deref` / `DerefMut` 访问实例；
/// - `Drop` 时归还所属池；池已卸载或代次不符时实例被丢弃，并以 `warn` 日志记录；
/// - [`into_inner`](Self::into_inner) 让实例脱离池管理，之后不会被归还。
pub struct PooledHeader<H: Header> {
    instance: Option<Box<H>>,
    generation: u64,
    pool: Arc<PoolShared<H>>,
}

impl<H: Header> PooledHeader<H> {
    fn new(instance: Box<H>, generation: u64, pool: Arc<PoolShared<H>>) -> Self {
        Self {
            instance: Some(instance),
            generation,
            pool,
        }
    }

    /// 借出时所属的安装代次。
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 返回所属池的句柄，供复制路径在同一池中借出新实例。
    pub fn pool(&self) -> HeaderPool<H> {
        HeaderPool {
            shared: Arc::clone(&self.pool),
        }
    }

    /// 让实例脱离池管理并交出所有权。
    pub fn into_inner(self) -> H {
        let (instance, _, pool) = self.detach();
        pool.metrics.record_return();
        *instance
    }

    fn detach(mut self) -> (Box<H>, u64, Arc<PoolShared<H>>) {
        let Some(instance) = self.instance.take() else {
            unreachable!("PooledHeader 仅在 detach/drop 时取出实例");
        };
        (instance, self.generation, Arc::clone(&self.pool))
    }
}

impl<H: Header> Deref for PooledHeader<H> {
    type Target = H;

    fn deref(&self) -> &H {
        match &self.instance {
            Some(instance) => instance,
            None => unreachable!("PooledHeader 仅在 detach/drop 时取出实例"),
        }
    }
}

impl<H: Header> DerefMut for PooledHeader<H> {
    fn deref_mut(&mut self) -> &mut H {
        match &mut self.instance {
            Some(instance) => instance,
            None => unreachable!("PooledHeader 仅在 detach/drop 时取出实例"),
        }
    }
}

impl<H: Header> Drop for PooledHeader<H> {
    fn drop(&mut self) {
        if let Some(instance) = self.instance.take() {
            // 失败已在 reclaim 内记录日志与计数。
            let _ = self.pool.reclaim(instance, self.generation);
        }
    }
}

impl<H: Header + fmt::Debug> fmt::Debug for PooledHeader<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledHeader")
            .field("generation", &self.generation)
            .field("instance", &self.instance)
            .finish()
    }
}

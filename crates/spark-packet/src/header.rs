//! 头部对象与其构造工厂的外部协作者契约。
//!
//! # 角色定位（Why）
//! - 解析后的头部表示（字段布局、合法性位、元数据字段等）由程序编译产物决定，不属于本 crate；
//! - 报文核心只需要两项能力：按程序构造一个全新实例、把另一个实例的内容复制过来。
//!
//! # 复用语义（What）
//! - 对象池按原样回收与出借实例，**不会**在出借前重置内容；
//! - 因此从池中取得的实例可能残留上一个报文的字段值，流水线需在使用前自行初始化
//!   （例如通过 [`Header::copy_from`] 覆盖，或在解析阶段整体重写）。

/// 可被报文独占、可在池中复用的头部对象。
///
/// - **前置条件**：实现必须满足 `Send + 'static`，以便报文跨工作线程移动；
/// - **后置条件**：`copy_from` 返回后，`self` 的可观测内容与 `src` 一致，且二者不共享任何可变存储。
pub trait Header: Send + 'static {
    /// 将 `src` 的内容复制到 `self`。
    fn copy_from(&mut self, src: &Self);
}

/// 为固定程序构造全新头部对象的工厂。
///
/// # 教案式说明
/// - **意图 (Why)**：头部对象构造昂贵（需按程序分配全部字段），池仅在空闲集合为空时才调用工厂；
/// - **契约 (What)**：池会在**不持有锁**的情况下调用 `create`，因此实现必须可被多个线程并发调用；
/// - **风险 (Trade-offs)**：工厂内 panic 会沿 `acquire` 传播给调用方，池本身的状态不受影响。
pub trait HeaderFactory<H: Header>: Send + Sync + 'static {
    /// 构造一个新的头部实例。
    fn create(&self) -> H;
}

impl<H, F> HeaderFactory<H> for F
where
    H: Header,
    F: Fn() -> H + Send + Sync + 'static,
{
    fn create(&self) -> H {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default, PartialEq)]
    struct Fields(Vec<u32>);

    impl Header for Fields {
        fn copy_from(&mut self, src: &Self) {
            self.0.clone_from(&src.0);
        }
    }

    #[test]
    fn closures_act_as_factories() {
        let factory = || Fields(vec![0; 4]);
        let built: Fields = HeaderFactory::create(&factory);
        assert_eq!(built, Fields(vec![0; 4]));
    }

    #[test]
    fn copy_from_overwrites_stale_content() {
        let mut stale = Fields(vec![7, 7]);
        stale.copy_from(&Fields(vec![1, 2, 3]));
        assert_eq!(stale, Fields(vec![1, 2, 3]));
    }
}

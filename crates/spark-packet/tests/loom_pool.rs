#![cfg(any(loom, spark_loom))]

use loom::{model, thread};
use spark_packet::{Header, HeaderPool};

#[derive(Default)]
struct Slot {
    owner: usize,
}

impl Header for Slot {
    fn copy_from(&mut self, src: &Self) {
        self.owner = src.owner;
    }
}

#[test]
fn concurrent_acquire_never_aliases_an_instance() {
    //
    // 教案级说明：验证空闲集合在并发借出与归还下不会把同一实例交给两个持有者。
    // - **Why**：池是唯一的共享可变资源，若“弹出空闲实例”与“归还”之间存在竞态，两个报文将写同一头部对象；
    // - **How**：预先放入一个空闲实例，两个线程同时借出、写入自身编号、读回校验后归还，由 Loom 穷举交错；
    // - **What**：每个线程读回的编号必须是自己写入的值，结束后空闲集合容纳全部实例且无外借。
    model(|| {
        let pool: HeaderPool<Slot> = HeaderPool::new();
        pool.install(Slot::default).expect("安装工厂失败");
        drop(pool.acquire().expect("预热借出失败"));

        let handles: Vec<_> = (1..=2)
            .map(|owner| {
                let pool = pool.clone();
                thread::spawn(move || {
                    let mut header = pool.acquire().expect("借出失败");
                    header.owner = owner;
                    thread::yield_now();
                    assert_eq!(header.owner, owner, "实例被其他线程同时持有");
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("工作线程不应 panic");
        }

        let stats = pool.stats();
        assert_eq!(stats.checked_out, 0);
        assert_eq!(stats.idle as u64, stats.created);
    });
}

#[test]
fn release_racing_uninstall_is_discarded_or_pooled() {
    //
    // 教案级说明：归还与卸载并发时，实例要么在卸载前进入空闲集合随后被整体清空，要么被识别为无主而丢弃。
    // 两种交错下卸载后的空闲集合都必须为空。
    model(|| {
        let pool: HeaderPool<Slot> = HeaderPool::new();
        pool.install(Slot::default).expect("安装工厂失败");
        let held = pool.acquire().expect("借出失败");

        let returner = {
            let pool = pool.clone();
            thread::spawn(move || {
                let _ = pool.release(held);
            })
        };
        let uninstaller = {
            let pool = pool.clone();
            thread::spawn(move || {
                pool.uninstall().expect("卸载失败");
            })
        };

        returner.join().expect("归还线程不应 panic");
        uninstaller.join().expect("卸载线程不应 panic");

        let stats = pool.stats();
        assert!(!stats.installed);
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.checked_out, 0);
    });
}

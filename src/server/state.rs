use std::sync::Arc;

use tokio::sync::RwLock;

use crate::IQDB;

/// 应用状态
pub struct AppState {
    /// 内存索引与持久化句柄。查询持读锁、增删持写锁，
    /// 保证并发查询看到一致的索引快照
    pub iqdb: RwLock<IQDB>,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(iqdb: IQDB) -> Arc<Self> {
        Arc::new(AppState { iqdb: RwLock::new(iqdb) })
    }
}

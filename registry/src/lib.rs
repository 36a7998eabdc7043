use std::sync::Arc;

use adapter::{database::ConnectionPool, repository::unit_of_work::UnitOfWorkFactoryImpl};
use kernel::{repository::unit_of_work::UnitOfWorkFactory, service::circulation::CirculationService};
use shared::{
    clock::{Clock, SystemClock},
    config::CirculationConfig,
};

/// 貸出サービスをストアと時計に結びつける
#[derive(Clone)]
pub struct AppRegistry {
    circulation_service: Arc<CirculationService>,
}

impl AppRegistry {
    pub fn new(pool: ConnectionPool, config: CirculationConfig) -> Self {
        let store = Arc::new(UnitOfWorkFactoryImpl::new(pool));
        Self::with_store(store, Arc::new(SystemClock), config)
    }

    /// 任意のストアと時計を使う。テストやインメモリ構成向け
    pub fn with_store(
        store: Arc<dyn UnitOfWorkFactory>,
        clock: Arc<dyn Clock>,
        config: CirculationConfig,
    ) -> Self {
        let circulation_service = Arc::new(CirculationService::new(store, clock, config));
        Self {
            circulation_service,
        }
    }

    pub fn circulation_service(&self) -> Arc<CirculationService> {
        self.circulation_service.clone()
    }
}

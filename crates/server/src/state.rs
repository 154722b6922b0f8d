// SPDX-License-Identifier: MIT

//! Shared application state handed to every axum handler.

use std::sync::Arc;

use low_tide_broker::Broker;
use low_tide_config::Config;
use low_tide_scheduler::SchedulerHandle;
use low_tide_store::Store;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<Store>,
    pub broker: Broker,
    pub scheduler: SchedulerHandle,
}

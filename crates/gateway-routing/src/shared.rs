//! Atomically replaceable route table.

use crate::error::{RouteBuildError, RouteError};
use crate::table::{RouteMatch, RouteTable};
use arc_swap::ArcSwap;
use gateway_config::RouteConfig;
use http::Method;
use std::sync::Arc;
use tracing::{info, warn};

/// Route table shared by all request tasks and swapped whole on reload.
///
/// Readers never block; a request that loaded the previous table keeps using
/// it until it finishes.
#[derive(Debug)]
pub struct SharedRouteTable {
    current: ArcSwap<RouteTable>,
}

impl SharedRouteTable {
    /// Wrap an initial table.
    pub fn new(table: RouteTable) -> Self {
        Self {
            current: ArcSwap::from_pointee(table),
        }
    }

    /// Snapshot of the current table.
    pub fn load(&self) -> Arc<RouteTable> {
        self.current.load_full()
    }

    /// Resolve against the current table.
    pub fn resolve(&self, path: &str, method: &Method) -> Result<RouteMatch, RouteError> {
        self.current.load().resolve(path, method)
    }

    /// Replace the current table.
    pub fn store(&self, table: RouteTable) {
        self.current.store(Arc::new(table));
    }

    /// Build a new table from `configs` and swap it in. On failure the
    /// previous table stays in service.
    pub fn reload(&self, configs: &[RouteConfig]) -> Result<(), RouteBuildError> {
        self.reload_checked(configs, |_| true)
    }

    /// Like [`reload`](Self::reload), but also rejects tables naming a scheme
    /// for which `known` is false.
    pub fn reload_checked(
        &self,
        configs: &[RouteConfig],
        known: impl Fn(&str) -> bool,
    ) -> Result<(), RouteBuildError> {
        let built = RouteTable::from_config(configs)
            .and_then(|table| table.check_schemes(known).map(|()| table));
        match built {
            Ok(table) => {
                let routes = table.len();
                self.store(table);
                info!(routes, "Route table reloaded");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Route table reload rejected, keeping previous table");
                Err(e)
            }
        }
    }
}

impl Default for SharedRouteTable {
    fn default() -> Self {
        Self::new(RouteTable::default())
    }
}

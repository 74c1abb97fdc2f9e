//! Warehouse access: driver traits, the SQL REST implementation, and
//! the per-tenant connection pool.

pub mod driver;
pub mod pool;
pub mod rest;

pub use driver::{RowSet, WarehouseConnection, WarehouseDriver, WarehouseValue};
pub use pool::{ConnectionPool, PoolStats};
pub use rest::{RestDriverOptions, RestWarehouseDriver};

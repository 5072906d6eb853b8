// PostgreSQL backend
//
// - manager: bb8 manager and the pooled client with its named statement cache
// - pool: the pool as a connection source
// - params: binding `RowValues` as driver parameters
// - query: decoding rows into a `QueryResult`
// - numeric: binary `numeric` decoding

pub mod manager;
mod numeric;
pub mod params;
pub mod pool;
pub mod query;

pub use manager::{PgClient, PgManager};
pub use numeric::PgNumeric;
pub use params::Params;
pub use pool::{PgConnection, PgPool};

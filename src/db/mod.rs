pub mod factory;
pub mod postgres;
pub mod shared;
pub mod source;

pub use factory::ConnectionFactory;
pub use postgres::{create_pool, PoolSettings};
pub use shared::SharedConnection;
pub use source::ConnectionSource;

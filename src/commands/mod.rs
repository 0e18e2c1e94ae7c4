pub mod migrate;
pub mod serve;

pub use migrate::handle_migrate;
pub use serve::handle_serve;

pub mod fsx;
pub mod static_hash_cache;

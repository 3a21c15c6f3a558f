//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async CRUD methods
//! that accept `&PgPool` as the first argument.

pub mod anonymous_usage_repo;
pub mod credit_account_repo;
pub mod temp_asset_repo;
pub mod usage_log_repo;

pub use anonymous_usage_repo::AnonymousUsageRepo;
pub use credit_account_repo::CreditAccountRepo;
pub use temp_asset_repo::TempAssetRepo;
pub use usage_log_repo::UsageLogRepo;

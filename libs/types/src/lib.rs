//! # Shared Data Model
//!
//! Types shared across the ingest, validation, aggregation, and caching stages
//! of the price-feed provider. Every value that crosses a component boundary in
//! this workspace is defined here so the boundary is a type, not a convention.
//!
//! ## Numeric policy
//!
//! Prices and confidences are carried as `f64`. The validator is the only place
//! that is allowed to observe a non-finite value; everything downstream of it
//! may assume finite inputs (see [`validation`]).

pub mod access;
pub mod aggregate;
pub mod cache;
pub mod error;
pub mod feed;
pub mod health;
pub mod update;
pub mod validation;

pub use access::AccessPattern;
pub use aggregate::AggregatedPrice;
pub use cache::{CacheEntry, VotingRound};
pub use error::{ErrorKind, ErrorSeverity, ProviderError};
pub use feed::{FeedCategory, FeedId};
pub use health::{SourceHealth, SourceStatus};
pub use update::{PriceUpdate, VolumeUpdate};
pub use validation::{Severity, ValidationError, ValidationResult};

/// Result type alias used throughout the core pipeline.
pub type Result<T> = std::result::Result<T, ProviderError>;

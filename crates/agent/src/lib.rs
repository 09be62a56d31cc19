// Domain-driven module structure for the Ringtail Agent.

// Core infrastructure
pub mod proto;
pub mod codec;
pub mod ring;
pub mod registry;
pub mod metrics;

// Domain modules
pub mod ingest;
pub mod export;
pub mod driver;
pub mod conf;
pub mod runtime;

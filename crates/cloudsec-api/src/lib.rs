//! Clients for the security APIs the agent collects from.
//!
//! - [`prisma`]: Prisma Cloud API client with token management, compliance
//!   posture and health check.
//! - [`google`]: Google Security Command Center health, derived from the public
//!   Google Cloud incident feed.
//! - [`scc`]: Security Command Center source listing and latest-finding delay.
//!
//! Every call reports failures through [`error::ApiError`].

pub mod error;
pub mod google;
mod http;
pub mod prisma;
pub mod scc;

pub use google::IncidentFeed;
pub use http::{LISTING_TIMEOUT, REQUEST_TIMEOUT};
pub use prisma::{Credentials, PrismaClient, TokenStatus};
pub use scc::{SecurityCenter, SecurityCenterClient, SourceMap, TokenSource};

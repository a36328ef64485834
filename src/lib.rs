//! Build canonical sample sheets for amplicon sequencing runs.
//!
//! Two independent pieces:
//!
//! - the manifest builder ([`sheet`]): joins the read locations discovered
//!   under a run directory ([`layout`]) against a metadata table
//!   ([`metadata`]), resolves the amplicon scheme ([`scheme`]), and writes
//!   one CSV sample sheet atomically;
//! - the execution policy ([`exec`]): the resource-sizing tiers and
//!   exit-status retry rules the job runner applies to every task attempt,
//!   this build included.

pub mod error;
pub mod exec;
pub mod layout;
pub mod metadata;
pub mod profile;
pub mod scheme;
pub mod sheet;

pub use crate::error::Error;
pub use crate::layout::{DiscoveredSample, FindReads, Platform, RunLayout};
pub use crate::metadata::MetadataTable;
pub use crate::profile::ExecProfile;
pub use crate::scheme::SchemeRef;
pub use crate::sheet::{JoinPolicy, SampleSheet, SampleSheetDef, SampleSheetRow};

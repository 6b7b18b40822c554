//! Size limits for task submissions.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so these limits are duplicated on `TaskSubmission`. Keep both in sync
//! when modifying.

/// Task display name max length (chars).
pub const MAX_TASK_NAME_LEN: usize = 200;

/// Maximum brands in a single source allow-list.
pub const MAX_BRANDS_PER_SOURCE: usize = 100;

/// Location filter max length (chars).
pub const MAX_LOCATION_LEN: usize = 200;

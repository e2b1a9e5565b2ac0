//! Social analytics API clients and record extraction used by linkrank.
//!
//! Only CrowdTangle's post search is implemented. Pagination is exposed one page at a
//! time; walking cursors and handling rate limits is left to `linkrank-search`.
pub mod crowdtangle;

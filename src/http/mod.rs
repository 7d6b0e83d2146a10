//! JSON-over-HTTP surface.
//!
//! The acting user is read from the `X-User-Id` header; authentication itself
//! happens upstream. Business rejections are replied with status 200 and
//! `{"success": false, "message": ...}`, missing records with 404, store
//! failures with 500 and a generic message.

pub mod dto;
pub mod router;
pub mod service;

pub use router::{route, ApiRequest, ApiResponse, AppContext, ContentType, USER_HEADER};
pub use service::{serve, ApiService};

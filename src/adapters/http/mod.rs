//! HTTP adapter: axum routes over the interview handlers.
//!
//! Every body uses the [`ApiResponse`] envelope. Admission throttles run
//! before the handler; rejections become 429 with `Retry-After`.

mod client_ip;
mod dto;
mod error;
mod handlers;
mod routes;

pub use client_ip::{client_ip, ClientIp, UNKNOWN_CLIENT};
pub use dto::{
    ApiResponse, CreateInterviewRequest, ErrorDetail, SubmitMessageRequest, SubmitMessageResponse,
};
pub use error::ApiError;
pub use handlers::{create_interview, get_interview, submit_message, InterviewHandlers};
pub use routes::{app_router, cors_layer, interview_routes};

//! Schedule pipeline: fetch → verify → parse → execute.
//!
//! Document bytes flow through exactly one path.  The fetcher returns an
//! opaque [`SignedPayload`](crate::app::ports::SignedPayload), the
//! verifier is the only code that can mint a
//! [`Verified`](verify::Verified) view of it, and the parser only accepts
//! that view.  Unverified bytes therefore cannot reach the parser by
//! construction.

pub mod document;
pub mod executor;
pub mod verify;

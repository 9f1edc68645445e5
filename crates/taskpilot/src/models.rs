//! Chat models exchanged with the browser front-end
//!
//! The wire shape mirrors the `messages` format chat widgets expect: a flat list of
//! `{role, content}` objects. A [`transcript::Transcript`] is append-only; updates are
//! emitted as whole snapshots so a client can simply replace what it renders.
pub mod message;
pub mod transcript;

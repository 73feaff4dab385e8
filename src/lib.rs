//! An iterative DNS stub resolver.
//!
//! Rather than handing a question to a recursive server, this crate walks the
//! DNS hierarchy itself: it asks a root server, follows the referrals it gets
//! back, and stops at the server that holds the answer.
//!
//! - [`name`] and [`dns`] implement the RFC 1035 wire format, including name
//!   compression.
//! - [`query`] builds outgoing queries.
//! - [`transport`] delivers them, over UDP by default.
//! - [`resolver`] drives the referral-following loop.

pub mod dns;
pub mod name;
pub mod query;
pub mod resolver;
pub mod transport;

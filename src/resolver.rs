//! Iterative DNS resolution.
//!
//! [`Resolver`] answers a question by walking the DNS hierarchy itself
//! instead of asking a recursive server. Starting at a root server it sends a
//! non-recursive query and inspects the response, in this order:
//!
//! 1. An answer record of the requested type ends the lookup.
//! 2. An A record in the additional section (glue) names the next server to
//!    ask.
//! 3. An NS record in the authority section names the next server without an
//!    address. The address is looked up as a separate A query from the root,
//!    and the original lookup continues at that address.
//! 4. Anything else is a dead end and fails with [`ResolveError::NoProgress`].
//!
//! Every query sent counts against [`ResolverConfig::max_iterations`],
//! including those made while looking up a name server's address. Running out
//! fails with [`ResolveError::IterationBudgetExhausted`], so referral loops
//! cannot run forever.
//!
//! # Examples
//!
//! ```rust,no_run
//! use iterative_dns::dns::RecordType;
//! use iterative_dns::resolver::{Resolver, ResolverConfig};
//! use iterative_dns::transport::UdpTransport;
//! use rand::rngs::OsRng;
//!
//! let mut resolver = Resolver::new(UdpTransport::default(), OsRng, ResolverConfig::default());
//! let address = resolver.resolve_ipv4("www.example.com")?;
//! println!("www.example.com has address {}", address);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::net::Ipv4Addr;

use rand::RngCore;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::dns::{DnsMessage, RData, RecordType, ResponseCode, WireError};
use crate::query::{build_query, message_id};
use crate::transport::{Transport, TransportError};

/// a.root-servers.net
pub const DEFAULT_ROOT_SERVER: Ipv4Addr = Ipv4Addr::new(198, 41, 0, 4);

/// Queries a single resolution may send before giving up.
pub const DEFAULT_MAX_ITERATIONS: usize = 100;

/// Errors that end a resolution.
///
/// Each variant is terminal; the resolver never retries another server or
/// substitutes a default answer.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The name to resolve cannot be put in a query.
    #[error("cannot query '{domain}': {source}")]
    InvalidQuery { domain: String, source: WireError },

    /// A server's response could not be decoded.
    #[error("malformed response from {server}: {source}")]
    Malformed { server: Ipv4Addr, source: WireError },

    /// The transport failed to deliver a query or its response.
    #[error("transport failure talking to {server}: {source}")]
    Transport {
        server: Ipv4Addr,
        source: TransportError,
    },

    /// The response does not belong to the query that was sent.
    #[error("response from {server} has id {actual:#06x}, expected {expected:#06x}")]
    IdMismatch {
        server: Ipv4Addr,
        expected: u16,
        actual: u16,
    },

    /// The response had the TC flag set. Retrying over TCP is not supported.
    #[error("response from {server} was truncated")]
    Truncated { server: Ipv4Addr },

    /// The server answered with a non-zero response code.
    #[error("{server} returned {code}")]
    ServerReturnedError { server: Ipv4Addr, code: ResponseCode },

    /// The response had no usable answer, glue or referral.
    #[error("no answer, glue or referral for {domain} from {server}")]
    NoProgress { server: Ipv4Addr, domain: String },

    /// The query budget ran out before an answer was found.
    #[error("no answer after {limit} queries")]
    IterationBudgetExhausted { limit: usize },
}

/// Resolver settings.
#[derive(Clone, Debug)]
pub struct ResolverConfig {
    /// Server every lookup starts from.
    pub root: Ipv4Addr,
    /// Upper bound on queries sent per call to [`Resolver::resolve`].
    pub max_iterations: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT_SERVER,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

/// What a response tells the resolver to do next.
#[derive(Debug)]
enum Step<V> {
    Answer(V),
    Glue(Ipv4Addr),
    Referral(String),
    Stuck,
}

fn next_step<V>(response: &DnsMessage, answer: &dyn Fn(&DnsMessage) -> Option<V>) -> Step<V> {
    if let Some(value) = answer(response) {
        Step::Answer(value)
    } else if let Some(address) = response.glue_address() {
        Step::Glue(address)
    } else if let Some(name) = response.referral_name() {
        Step::Referral(name.to_string())
    } else {
        Step::Stuck
    }
}

/// An iterative resolver over a [`Transport`].
///
/// The random number generator supplies transaction ids; see
/// [`crate::query`].
pub struct Resolver<T, R> {
    transport: T,
    rng: R,
    config: ResolverConfig,
}

impl<T: Transport, R: RngCore> Resolver<T, R> {
    pub fn new(transport: T, rng: R, config: ResolverConfig) -> Self {
        Self {
            transport,
            rng,
            config,
        }
    }

    /// Resolves `domain` to the data of its first record of `record_type`.
    ///
    /// # Errors
    ///
    /// See [`ResolveError`]. The error kinds distinguish a dead end
    /// (`NoProgress`), a referral loop (`IterationBudgetExhausted`), an
    /// undecodable response (`Malformed`) and a network failure
    /// (`Transport`).
    pub fn resolve(&mut self, domain: &str, record_type: RecordType) -> Result<RData, ResolveError> {
        let mut queries = 0;
        self.lookup(domain, record_type, &mut queries, &|response: &DnsMessage| {
            response.answer_of_type(record_type).cloned()
        })
    }

    /// Resolves the IPv4 address of `domain`.
    pub fn resolve_ipv4(&mut self, domain: &str) -> Result<Ipv4Addr, ResolveError> {
        let mut queries = 0;
        self.lookup_address(domain, &mut queries)
    }

    fn lookup_address(&mut self, domain: &str, queries: &mut usize) -> Result<Ipv4Addr, ResolveError> {
        self.lookup(domain, RecordType::A, queries, &|response: &DnsMessage| {
            response
                .answer_of_type(RecordType::A)
                .and_then(RData::as_ipv4)
        })
    }

    /// Walks referrals from the root until `answer` finds a value in a
    /// response.
    fn lookup<V: fmt::Display>(
        &mut self,
        domain: &str,
        record_type: RecordType,
        queries: &mut usize,
        answer: &dyn Fn(&DnsMessage) -> Option<V>,
    ) -> Result<V, ResolveError> {
        let mut server = self.config.root;

        loop {
            if *queries >= self.config.max_iterations {
                warn!(%domain, limit = self.config.max_iterations, "query budget exhausted");
                return Err(ResolveError::IterationBudgetExhausted {
                    limit: self.config.max_iterations,
                });
            }
            *queries += 1;

            debug!(%domain, %record_type, %server, query = *queries, "querying");
            let response = self.query(server, domain, record_type)?;

            match next_step(&response, answer) {
                Step::Answer(value) => {
                    info!(%domain, %record_type, %value, %server, "resolved");
                    return Ok(value);
                }
                Step::Glue(address) => {
                    debug!(%server, next = %address, "following glue");
                    server = address;
                }
                Step::Referral(name_server) => {
                    debug!(%server, %name_server, "referral without glue, resolving name server");
                    server = self.lookup_address(&name_server, queries)?;
                }
                Step::Stuck => {
                    return Err(ResolveError::NoProgress {
                        server,
                        domain: domain.to_string(),
                    });
                }
            }
        }
    }

    fn query(
        &mut self,
        server: Ipv4Addr,
        domain: &str,
        record_type: RecordType,
    ) -> Result<DnsMessage, ResolveError> {
        let query = build_query(domain, record_type, false, &mut self.rng).map_err(|source| {
            ResolveError::InvalidQuery {
                domain: domain.to_string(),
                source,
            }
        })?;

        let bytes = self
            .transport
            .exchange(server, &query)
            .map_err(|source| ResolveError::Transport { server, source })?;

        let response = DnsMessage::from_bytes(&bytes)
            .map_err(|source| ResolveError::Malformed { server, source })?;

        let expected = message_id(&query).unwrap_or_default();
        if response.header.id != expected {
            return Err(ResolveError::IdMismatch {
                server,
                expected,
                actual: response.header.id,
            });
        }

        if response.header.is_truncated() {
            return Err(ResolveError::Truncated { server });
        }

        match response.header.response_code() {
            ResponseCode::NoError => Ok(response),
            code => Err(ResolveError::ServerReturnedError { server, code }),
        }
    }
}

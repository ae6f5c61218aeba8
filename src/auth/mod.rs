//! Bearer-token authentication: credential format, hashing, the verifier,
//! and the scope predicates.

pub mod scope;
pub mod secret;
pub mod verifier;

pub use self::secret::{CREDENTIAL_PREFIX, LOOKUP_PREFIX_LEN};
pub use self::verifier::{AuthContext, Verifier};

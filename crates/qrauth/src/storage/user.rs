//! User resolution trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::Principal;

/// Loads the full principal for an identity bound to a confirmed token.
///
/// Implementations usually wrap a user directory or database. A `None`
/// result means the account was deleted or disabled after the token was
/// confirmed; the provider reports it as `PrincipalNotFound`.
#[async_trait]
pub trait UserResolver: Send + Sync {
    /// Resolves `identity` to a principal.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be reached.
    async fn resolve(&self, identity: &str) -> AuthResult<Option<Principal>>;
}

//! OIDC token validation
//!
//! Multi-issuer validator: picks the issuer config matching the token's `iss`, fetches the
//! provider's discovery document and JWKS, then verifies signature/issuer/audience/expiry.

mod discovery;
mod jwks;
mod validator;

pub use validator::{
    ClaimsError, MultiValidator, TokenValidator, UnavailableValidator, ValidatedClaims,
    ValidationError, ValidatorBuildError, ValidatorConfig,
};

/// Router Module Index
///
/// Splits the API by access level. Authentication is attached to the admin
/// router as a layer, so a route cannot end up unguarded by being registered
/// in the wrong place.

/// Routes open to anonymous callers.
pub mod public;

/// Routes behind the session-token layer; handlers additionally require the admin role.
pub mod admin;

//! Router Module Index
//!
//! Routes are grouped by the gate they sit behind. `create_router` composes each
//! group with its own `AuthGate`, so the role allow-list is fixed where the group
//! is registered rather than on individual handlers.

/// Routes reachable without a token.
pub mod public;

/// Routes open to any authenticated identity.
pub mod authenticated;

/// Routes restricted to the `administrator` role.
pub mod admin;

/// Routes restricted to the `advisor` role.
pub mod advisor;

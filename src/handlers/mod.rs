// handlers/mod.rs - Three handler tiers
//
// Public (no auth) → Protected (valid session) → Elevated (ADMIN or SYSTEM_ADMIN)
// The gates themselves live in middleware::auth and are applied in router.rs.

pub mod public;
pub mod protected;
pub mod elevated;

// Atelier core domain
//
// DB-agnostic entity types shared by the server and its clients.
//
// Key design decisions:
// - Roles are a closed enum; unknown stored values degrade to the least privileged role
// - Quote estimation is a pure function over items and answers
// - All money amounts are integer cents

pub mod quote;
pub mod user;

pub use quote::{
    estimate, EstimateError, ItemAnswer, ItemParameter, PriceRange, QuoteItem, QuoteResponse,
    QuoteTemplate,
};
pub use user::{Role, User};

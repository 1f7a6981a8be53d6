// Services layer for business logic
// Services own validation and persistence; authorization is settled before they are called

pub mod quote;

pub use quote::QuoteService;

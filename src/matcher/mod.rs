pub mod name_gate;
pub mod offer_matcher;

pub use offer_matcher::OfferMatcher;

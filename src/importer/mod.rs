pub mod feed;
pub mod runner;
pub mod scheduler;

pub use feed::{FeedSource, HttpFeedSource};
pub use runner::{ImportRunner, OfferSink, TemplateStore};
pub use scheduler::ImportScheduler;

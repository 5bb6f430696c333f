pub mod formatter;
pub mod pipeline;

pub use formatter::format_notification;
pub use pipeline::{notification_consumer, OfferPipeline, OfferStore};

pub mod converter;
pub mod extractor;
pub mod fetcher;
pub mod robots;
pub mod throttle;
pub mod writer;

pub use converter::{Html2MdConverter, MarkdownConverter};
pub use extractor::ContentExtractor;
pub use fetcher::{ContentFetcher, DispatchPermit};
pub use robots::RobotsTxt;
pub use throttle::AutoThrottle;
pub use writer::OutputWriter;

//! Package sources: the installed cache, in-workspace source checkouts,
//! and the remote release feed.

pub mod feed;
pub mod locator;
pub mod remote;

pub use feed::{Asset, FeedError, HttpReleaseFeed, Release, ReleaseFeed};
pub use locator::{Candidate, LocateError, SourceLocator};
pub use remote::{RemoteCandidate, RemoteCatalog};

mod clock;
mod store;

pub use clock::SystemClock;
pub use store::FsArtifactStore;

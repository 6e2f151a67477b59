pub mod http_storage_repository;
pub mod http_synthesis_repository;
pub mod memory_storage_repository;
pub mod polly_synthesis_repository;
pub mod storage_repository;
pub mod synthesis_repository;

pub use http_storage_repository::HttpObjectStorage;
pub use http_synthesis_repository::HttpSynthesisRepository;
pub use memory_storage_repository::MemoryObjectStorage;
pub use polly_synthesis_repository::PollySynthesisRepository;
pub use storage_repository::{ObjectStorage, StorageError};
pub use synthesis_repository::SynthesisRepository;

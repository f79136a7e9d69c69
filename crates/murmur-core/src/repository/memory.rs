//! MemoryRepository trait definition.
//!
//! The persistence collaborator for conversation messages. The runtime treats
//! every call as fallible and asynchronous and never manages transactions.

use murmur_types::error::RepositoryError;
use murmur_types::memory::Memory;
use uuid::Uuid;

/// Repository trait for conversation message persistence.
///
/// Implementations live in murmur-infra (e.g., `InMemoryRepository`).
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait MemoryRepository: Send + Sync {
    /// Store a memory in `table` and return its id.
    ///
    /// A memory without an id is assigned one by the repository.
    fn create_memory(
        &self,
        memory: &Memory,
        table: &str,
    ) -> impl std::future::Future<Output = Result<Uuid, RepositoryError>> + Send;

    /// Fetch a memory by id from any table.
    fn get_memory_by_id(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<Memory>, RepositoryError>> + Send;

    /// Memories for a room, oldest first. `count` keeps only the most recent N.
    fn get_memories_by_room(
        &self,
        room_id: &Uuid,
        table: &str,
        count: Option<usize>,
    ) -> impl std::future::Future<Output = Result<Vec<Memory>, RepositoryError>> + Send;

    /// Delete a memory by id. Deleting a missing id is not an error.
    fn delete_memory(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

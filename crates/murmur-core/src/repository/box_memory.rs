//! BoxMemoryRepository -- object-safe dynamic dispatch wrapper for MemoryRepository.
//!
//! Same blanket-impl pattern as the other boxed ports:
//! 1. Define an object-safe `MemoryRepositoryDyn` trait with boxed futures
//! 2. Blanket-impl `MemoryRepositoryDyn` for all `T: MemoryRepository`
//! 3. `BoxMemoryRepository` wraps `Arc<dyn MemoryRepositoryDyn>` and delegates

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use murmur_types::error::RepositoryError;
use murmur_types::memory::Memory;
use uuid::Uuid;

use super::memory::MemoryRepository;

type BoxFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, RepositoryError>> + Send + 'a>>;

/// Object-safe version of [`MemoryRepository`] with boxed futures.
pub trait MemoryRepositoryDyn: Send + Sync {
    fn create_memory_boxed<'a>(&'a self, memory: &'a Memory, table: &'a str) -> BoxFut<'a, Uuid>;

    fn get_memory_by_id_boxed<'a>(&'a self, id: &'a Uuid) -> BoxFut<'a, Option<Memory>>;

    fn get_memories_by_room_boxed<'a>(
        &'a self,
        room_id: &'a Uuid,
        table: &'a str,
        count: Option<usize>,
    ) -> BoxFut<'a, Vec<Memory>>;

    fn delete_memory_boxed<'a>(&'a self, id: &'a Uuid) -> BoxFut<'a, ()>;
}

impl<T: MemoryRepository> MemoryRepositoryDyn for T {
    fn create_memory_boxed<'a>(&'a self, memory: &'a Memory, table: &'a str) -> BoxFut<'a, Uuid> {
        Box::pin(self.create_memory(memory, table))
    }

    fn get_memory_by_id_boxed<'a>(&'a self, id: &'a Uuid) -> BoxFut<'a, Option<Memory>> {
        Box::pin(self.get_memory_by_id(id))
    }

    fn get_memories_by_room_boxed<'a>(
        &'a self,
        room_id: &'a Uuid,
        table: &'a str,
        count: Option<usize>,
    ) -> BoxFut<'a, Vec<Memory>> {
        Box::pin(self.get_memories_by_room(room_id, table, count))
    }

    fn delete_memory_boxed<'a>(&'a self, id: &'a Uuid) -> BoxFut<'a, ()> {
        Box::pin(self.delete_memory(id))
    }
}

/// Type-erased memory repository shared by the runtime and its plugins.
///
/// Cloning is cheap; all clones point at the same backing store.
#[derive(Clone)]
pub struct BoxMemoryRepository {
    inner: Arc<dyn MemoryRepositoryDyn>,
}

impl BoxMemoryRepository {
    /// Wrap a concrete `MemoryRepository` in a type-erased box.
    pub fn new<T: MemoryRepository + 'static>(repository: T) -> Self {
        Self {
            inner: Arc::new(repository),
        }
    }

    pub async fn create_memory(&self, memory: &Memory, table: &str) -> Result<Uuid, RepositoryError> {
        self.inner.create_memory_boxed(memory, table).await
    }

    pub async fn get_memory_by_id(&self, id: &Uuid) -> Result<Option<Memory>, RepositoryError> {
        self.inner.get_memory_by_id_boxed(id).await
    }

    pub async fn get_memories_by_room(
        &self,
        room_id: &Uuid,
        table: &str,
        count: Option<usize>,
    ) -> Result<Vec<Memory>, RepositoryError> {
        self.inner
            .get_memories_by_room_boxed(room_id, table, count)
            .await
    }

    pub async fn delete_memory(&self, id: &Uuid) -> Result<(), RepositoryError> {
        self.inner.delete_memory_boxed(id).await
    }
}

impl std::fmt::Debug for BoxMemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxMemoryRepository").finish_non_exhaustive()
    }
}

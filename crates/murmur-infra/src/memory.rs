//! In-memory `MemoryRepository`.
//!
//! Rows live in a `DashMap` keyed by memory id and tagged with their table.
//! Room queries return memories ordered by `created_at`, ties broken by
//! insertion order, so a conversation reads oldest first.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use murmur_core::repository::MemoryRepository;
use murmur_types::error::RepositoryError;
use murmur_types::memory::Memory;

#[derive(Debug, Clone)]
struct Row {
    table: String,
    seq: u64,
    memory: Memory,
}

/// Process-local message store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    rows: DashMap<Uuid, Row>,
    next_seq: AtomicU64,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored memories across all tables.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl MemoryRepository for InMemoryRepository {
    async fn create_memory(&self, memory: &Memory, table: &str) -> Result<Uuid, RepositoryError> {
        let mut memory = memory.clone();
        let id = memory.ensure_id();

        match self.rows.entry(id) {
            Entry::Occupied(_) => {
                tracing::debug!(memory_id = %id, table, "Duplicate memory id");
                Err(RepositoryError::Conflict(format!("memory {id} already exists")))
            }
            Entry::Vacant(slot) => {
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert(Row {
                    table: table.to_string(),
                    seq,
                    memory,
                });
                Ok(id)
            }
        }
    }

    async fn get_memory_by_id(&self, id: &Uuid) -> Result<Option<Memory>, RepositoryError> {
        Ok(self.rows.get(id).map(|row| row.memory.clone()))
    }

    async fn get_memories_by_room(
        &self,
        room_id: &Uuid,
        table: &str,
        count: Option<usize>,
    ) -> Result<Vec<Memory>, RepositoryError> {
        let mut rows: Vec<Row> = self
            .rows
            .iter()
            .filter(|row| row.table == table && row.memory.room_id == *room_id)
            .map(|row| row.value().clone())
            .collect();
        rows.sort_by_key(|row| (row.memory.created_at, row.seq));

        if let Some(limit) = count {
            let skip = rows.len().saturating_sub(limit);
            rows.drain(..skip);
        }
        Ok(rows.into_iter().map(|row| row.memory).collect())
    }

    async fn delete_memory(&self, id: &Uuid) -> Result<(), RepositoryError> {
        self.rows.remove(id);
        Ok(())
    }
}

//! Host-side view of what the firmware has been told to schedule.
//!
//! Processes own gangs, gangs own up to [`MAX_QUEUES_IN_A_GANG`] queues. The
//! registry mirrors the scheduler's hierarchy so requests can be validated and
//! resolved (doorbell to queue, gang handle to context address) before a frame
//! is built. Lookups take a read lock; every mutation checks all of its
//! preconditions before touching any table, so a rejected call leaves the
//! registry unchanged.

use crate::error::{HandleKind, RegistryError};
use mes_abi::{AddQueue, PriorityLevel, QueueFlags, QueueType, MAX_QUEUES_IN_A_GANG};
use parking_lot::RwLock;
use serde::Serialize;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Queue handles of one gang, in insertion order.
pub type GangQueues = SmallVec<[u64; MAX_QUEUES_IN_A_GANG]>;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProcessEntry {
    pub process_context_addr: u64,
    pub process_id: u32,
    pub process_context_array_index: u32,
    pub page_table_base_addr: u64,
    pub process_va_start: u64,
    pub process_va_end: u64,
    pub process_quantum: u64,
    gangs: Vec<u64>,
}

impl ProcessEntry {
    pub fn new(process_context_addr: u64, process_id: u32) -> Self {
        Self {
            process_context_addr,
            process_id,
            process_context_array_index: 0,
            page_table_base_addr: 0,
            process_va_start: 0,
            process_va_end: 0,
            process_quantum: 0,
            gangs: Vec::new(),
        }
    }

    /// Gang handles owned by this process.
    pub fn gangs(&self) -> &[u64] {
        &self.gangs
    }

    fn from_add_queue(cmd: &AddQueue) -> Self {
        Self {
            process_context_addr: cmd.process_context_addr,
            process_id: cmd.process_id,
            process_context_array_index: cmd.process_context_array_index,
            page_table_base_addr: cmd.page_table_base_addr,
            process_va_start: cmd.process_va_start,
            process_va_end: cmd.process_va_end,
            process_quantum: cmd.process_quantum,
            gangs: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GangEntry {
    pub h_context: u64,
    pub gang_context_addr: u64,
    pub gang_context_array_index: u32,
    pub process_context_addr: u64,
    pub inprocess_priority: u32,
    pub priority_level: PriorityLevel,
    pub gang_quantum: u64,
    pub suspended: bool,
    queues: GangQueues,
}

impl GangEntry {
    pub fn new(h_context: u64, gang_context_addr: u64, process_context_addr: u64) -> Self {
        Self {
            h_context,
            gang_context_addr,
            gang_context_array_index: 0,
            process_context_addr,
            inprocess_priority: 0,
            priority_level: PriorityLevel::default(),
            gang_quantum: 0,
            suspended: false,
            queues: GangQueues::new(),
        }
    }

    pub fn queues(&self) -> &[u64] {
        &self.queues
    }

    pub fn is_full(&self) -> bool {
        self.queues.len() >= MAX_QUEUES_IN_A_GANG
    }

    fn from_add_queue(cmd: &AddQueue) -> Self {
        Self {
            h_context: cmd.h_context,
            gang_context_addr: cmd.gang_context_addr,
            gang_context_array_index: cmd.gang_context_array_index,
            process_context_addr: cmd.process_context_addr,
            inprocess_priority: cmd.inprocess_gang_priority,
            priority_level: cmd.gang_global_priority_level,
            gang_quantum: cmd.gang_quantum,
            suspended: cmd.flags.is_gang_suspended(),
            queues: GangQueues::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub h_queue: u64,
    pub h_context: u64,
    pub doorbell_offset: u32,
    pub queue_type: QueueType,
    pub mqd_addr: u64,
    pub wptr_addr: u64,
    pub flags: QueueFlags,
}

impl QueueEntry {
    fn from_add_queue(cmd: &AddQueue) -> Self {
        Self {
            h_queue: cmd.h_queue,
            h_context: cmd.h_context,
            doorbell_offset: cmd.doorbell_offset,
            queue_type: cmd.queue_type,
            mqd_addr: cmd.mqd_addr,
            wptr_addr: cmd.wptr_addr,
            flags: cmd.flags,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SyncObjectEntry {
    pub h_sync_object: u64,
    /// Queues currently blocked on this object.
    pub waiters: Vec<u64>,
}

/// What [`Registry::admit_queue`] added. The flags record whether the
/// admission created the gang and process, so a retraction removes no more
/// than that.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Admission {
    pub queue: QueueEntry,
    pub process_context_addr: u64,
    pub created_gang: bool,
    pub created_process: bool,
}

/// What [`Registry::unregister_queue`] removed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueueRemoval {
    pub queue: QueueEntry,
    pub gang_context_addr: u64,
    pub gang_context_array_index: u32,
    /// Set when the queue was the last one of its gang.
    pub removed_gang: Option<GangEntry>,
    /// Set when the removed gang was the last one of its process.
    pub removed_process: Option<ProcessEntry>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RegistryStats {
    pub processes: usize,
    pub gangs: usize,
    pub queues: usize,
    pub sync_objects: usize,
}

#[derive(Default)]
struct Tables {
    processes: HashMap<u64, ProcessEntry>,
    gangs: HashMap<u64, GangEntry>,
    gang_contexts: HashMap<u64, u64>,
    queues: HashMap<u64, QueueEntry>,
    doorbells: HashMap<u32, u64>,
    sync_objects: HashMap<u64, SyncObjectEntry>,
}

fn not_found(kind: HandleKind, handle: u64) -> RegistryError {
    RegistryError::NotFound { kind, handle }
}

fn duplicate(kind: HandleKind, handle: u64) -> RegistryError {
    RegistryError::DuplicateHandle { kind, handle }
}

impl Tables {
    fn check_new_gang(&self, gang: &GangEntry) -> Result<(), RegistryError> {
        if self.gangs.contains_key(&gang.h_context) {
            return Err(duplicate(HandleKind::Gang, gang.h_context));
        }
        if self.gang_contexts.contains_key(&gang.gang_context_addr) {
            return Err(duplicate(HandleKind::GangContext, gang.gang_context_addr));
        }
        Ok(())
    }

    fn check_new_queue(&self, h_queue: u64, doorbell_offset: u32) -> Result<(), RegistryError> {
        if self.queues.contains_key(&h_queue) {
            return Err(duplicate(HandleKind::Queue, h_queue));
        }
        if self.doorbells.contains_key(&doorbell_offset) {
            return Err(duplicate(HandleKind::Doorbell, u64::from(doorbell_offset)));
        }
        Ok(())
    }

    fn insert_gang(&mut self, gang: GangEntry) {
        if let Some(process) = self.processes.get_mut(&gang.process_context_addr) {
            process.gangs.push(gang.h_context);
        }
        self.gang_contexts
            .insert(gang.gang_context_addr, gang.h_context);
        self.gangs.insert(gang.h_context, gang);
    }

    /// Drops a queue from the queue and doorbell tables and from every sync
    /// object it waited on. The owning gang's list is left alone.
    fn forget_queue(&mut self, h_queue: u64) -> Option<QueueEntry> {
        let queue = self.queues.remove(&h_queue)?;
        self.doorbells.remove(&queue.doorbell_offset);
        for object in self.sync_objects.values_mut() {
            object.waiters.retain(|h| *h != h_queue);
        }
        Some(queue)
    }

    /// Removes a gang and its queues, unlinking it from its process.
    fn take_gang(&mut self, h_context: u64) -> Option<GangEntry> {
        let gang = self.gangs.remove(&h_context)?;
        self.gang_contexts.remove(&gang.gang_context_addr);
        for h_queue in &gang.queues {
            self.forget_queue(*h_queue);
        }
        if let Some(process) = self.processes.get_mut(&gang.process_context_addr) {
            process.gangs.retain(|h| *h != h_context);
        }
        Some(gang)
    }

    /// Removes a gang, then its process if no gang is left under it.
    fn remove_gang(&mut self, h_context: u64) -> Option<(GangEntry, Option<ProcessEntry>)> {
        let gang = self.take_gang(h_context)?;
        let removed_process = self.remove_process_if_empty(gang.process_context_addr);
        Some((gang, removed_process))
    }

    fn remove_process_if_empty(&mut self, process_context_addr: u64) -> Option<ProcessEntry> {
        let empty = self
            .processes
            .get(&process_context_addr)
            .is_some_and(|process| process.gangs.is_empty());
        if empty {
            self.processes.remove(&process_context_addr)
        } else {
            None
        }
    }
}

/// Concurrent table of processes, gangs, queues and sync objects.
#[derive(Default)]
pub struct Registry {
    tables: RwLock<Tables>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_process(&self, mut process: ProcessEntry) -> Result<(), RegistryError> {
        let mut tables = self.tables.write();
        if tables.processes.contains_key(&process.process_context_addr) {
            return Err(duplicate(HandleKind::Process, process.process_context_addr));
        }
        tracing::trace!(addr = process.process_context_addr, "registered process");
        process.gangs.clear();
        tables.processes.insert(process.process_context_addr, process);
        Ok(())
    }

    /// Registers a gang under an already registered process.
    pub fn register_gang(&self, mut gang: GangEntry) -> Result<(), RegistryError> {
        let mut tables = self.tables.write();
        if !tables.processes.contains_key(&gang.process_context_addr) {
            return Err(not_found(HandleKind::Process, gang.process_context_addr));
        }
        tables.check_new_gang(&gang)?;
        gang.queues.clear();
        tracing::trace!(h_context = gang.h_context, "registered gang");
        tables.insert_gang(gang);
        Ok(())
    }

    /// Records the effect of an ADD_QUEUE request.
    ///
    /// The process and gang are created on first use. An existing gang must
    /// belong to the request's process and still have room.
    pub fn admit_queue(&self, cmd: &AddQueue) -> Result<Admission, RegistryError> {
        let mut tables = self.tables.write();
        let process_exists = tables.processes.contains_key(&cmd.process_context_addr);
        match tables.gangs.get(&cmd.h_context) {
            Some(gang) => {
                if gang.process_context_addr != cmd.process_context_addr {
                    return Err(RegistryError::OwnerMismatch {
                        kind: HandleKind::Gang,
                        handle: cmd.h_context,
                        expected: cmd.process_context_addr,
                        actual: gang.process_context_addr,
                    });
                }
                if gang.is_full() {
                    return Err(RegistryError::GangFull {
                        h_context: cmd.h_context,
                    });
                }
            }
            None => tables.check_new_gang(&GangEntry::from_add_queue(cmd))?,
        }
        tables.check_new_queue(cmd.h_queue, cmd.doorbell_offset)?;

        if !process_exists {
            tables.processes.insert(
                cmd.process_context_addr,
                ProcessEntry::from_add_queue(cmd),
            );
        }
        let created_gang = !tables.gangs.contains_key(&cmd.h_context);
        if created_gang {
            tables.insert_gang(GangEntry::from_add_queue(cmd));
        }
        let queue = QueueEntry::from_add_queue(cmd);
        if let Some(gang) = tables.gangs.get_mut(&cmd.h_context) {
            gang.queues.push(cmd.h_queue);
        }
        tables.doorbells.insert(cmd.doorbell_offset, cmd.h_queue);
        tables.queues.insert(cmd.h_queue, queue.clone());
        tracing::debug!(
            h_queue = cmd.h_queue,
            h_context = cmd.h_context,
            doorbell = cmd.doorbell_offset,
            "queue admitted"
        );
        Ok(Admission {
            queue,
            process_context_addr: cmd.process_context_addr,
            created_gang,
            created_process: !process_exists,
        })
    }

    /// Takes back an admission: the queue, plus the gang and process when the
    /// admission created them and nothing else has joined them since.
    pub fn retract(&self, admission: &Admission) -> Result<(), RegistryError> {
        let mut tables = self.tables.write();
        let h_queue = admission.queue.h_queue;
        let queue = tables
            .forget_queue(h_queue)
            .ok_or_else(|| not_found(HandleKind::Queue, h_queue))?;
        let gang_empty = match tables.gangs.get_mut(&queue.h_context) {
            Some(gang) => {
                gang.queues.retain(|h| *h != h_queue);
                gang.queues.is_empty()
            }
            None => false,
        };
        let mut removed_gang = false;
        if admission.created_gang && gang_empty {
            removed_gang = tables.take_gang(queue.h_context).is_some();
        }
        let mut removed_process = false;
        if admission.created_process {
            removed_process = tables
                .remove_process_if_empty(admission.process_context_addr)
                .is_some();
        }
        tracing::debug!(h_queue, removed_gang, removed_process, "admission retracted");
        Ok(())
    }

    /// Removes a queue, then its gang if it was the last queue, then the
    /// owning process if that gang was its last.
    pub fn unregister_queue(&self, h_queue: u64) -> Result<QueueRemoval, RegistryError> {
        let mut tables = self.tables.write();
        let queue = tables
            .forget_queue(h_queue)
            .ok_or_else(|| not_found(HandleKind::Queue, h_queue))?;

        let (gang_context_addr, gang_context_array_index, gang_empty) =
            match tables.gangs.get_mut(&queue.h_context) {
                Some(gang) => {
                    gang.queues.retain(|h| *h != h_queue);
                    (
                        gang.gang_context_addr,
                        gang.gang_context_array_index,
                        gang.queues.is_empty(),
                    )
                }
                None => (0, 0, false),
            };
        let (removed_gang, removed_process) = if gang_empty {
            match tables.remove_gang(queue.h_context) {
                Some((gang, process)) => (Some(gang), process),
                None => (None, None),
            }
        } else {
            (None, None)
        };
        tracing::debug!(
            h_queue,
            gang_removed = removed_gang.is_some(),
            process_removed = removed_process.is_some(),
            "queue unregistered"
        );
        Ok(QueueRemoval {
            queue,
            gang_context_addr,
            gang_context_array_index,
            removed_gang,
            removed_process,
        })
    }

    /// Puts back what [`unregister_queue`](Self::unregister_queue) removed.
    pub fn restore(&self, removal: QueueRemoval) -> Result<(), RegistryError> {
        let mut tables = self.tables.write();
        let queue = removal.queue;
        tables.check_new_queue(queue.h_queue, queue.doorbell_offset)?;
        if let Some(mut process) = removal.removed_process {
            if tables.processes.contains_key(&process.process_context_addr) {
                return Err(duplicate(HandleKind::Process, process.process_context_addr));
            }
            process.gangs.clear();
            tables.processes.insert(process.process_context_addr, process);
        }
        if let Some(mut gang) = removal.removed_gang {
            tables.check_new_gang(&gang)?;
            gang.queues.clear();
            tables.insert_gang(gang);
        }
        let gang = tables
            .gangs
            .get_mut(&queue.h_context)
            .ok_or_else(|| not_found(HandleKind::Gang, queue.h_context))?;
        if gang.is_full() {
            return Err(RegistryError::GangFull {
                h_context: queue.h_context,
            });
        }
        gang.queues.push(queue.h_queue);
        tables.doorbells.insert(queue.doorbell_offset, queue.h_queue);
        tables.queues.insert(queue.h_queue, queue);
        Ok(())
    }

    /// Removes a gang with all of its queues.
    pub fn unregister_gang(&self, h_context: u64) -> Result<GangEntry, RegistryError> {
        let mut tables = self.tables.write();
        tables
            .remove_gang(h_context)
            .map(|(gang, _)| gang)
            .ok_or_else(|| not_found(HandleKind::Gang, h_context))
    }

    /// Removes a process with all of its gangs and queues.
    pub fn unregister_process(&self, process_context_addr: u64) -> Result<ProcessEntry, RegistryError> {
        let mut tables = self.tables.write();
        let gangs = tables
            .processes
            .get(&process_context_addr)
            .map(|process| process.gangs.clone())
            .ok_or_else(|| not_found(HandleKind::Process, process_context_addr))?;
        let mut removed = None;
        for h_context in gangs {
            if let Some((_, process)) = tables.remove_gang(h_context) {
                removed = removed.or(process);
            }
        }
        match removed {
            Some(process) => Ok(process),
            None => tables
                .processes
                .remove(&process_context_addr)
                .ok_or_else(|| not_found(HandleKind::Process, process_context_addr)),
        }
    }

    pub fn process(&self, process_context_addr: u64) -> Result<ProcessEntry, RegistryError> {
        self.tables
            .read()
            .processes
            .get(&process_context_addr)
            .cloned()
            .ok_or_else(|| not_found(HandleKind::Process, process_context_addr))
    }

    pub fn gang(&self, h_context: u64) -> Result<GangEntry, RegistryError> {
        self.tables
            .read()
            .gangs
            .get(&h_context)
            .cloned()
            .ok_or_else(|| not_found(HandleKind::Gang, h_context))
    }

    pub fn gang_by_context_addr(&self, gang_context_addr: u64) -> Result<GangEntry, RegistryError> {
        let tables = self.tables.read();
        tables
            .gang_contexts
            .get(&gang_context_addr)
            .and_then(|h| tables.gangs.get(h))
            .cloned()
            .ok_or_else(|| not_found(HandleKind::GangContext, gang_context_addr))
    }

    pub fn queue(&self, h_queue: u64) -> Result<QueueEntry, RegistryError> {
        self.tables
            .read()
            .queues
            .get(&h_queue)
            .cloned()
            .ok_or_else(|| not_found(HandleKind::Queue, h_queue))
    }

    pub fn queue_by_doorbell(&self, doorbell_offset: u32) -> Result<QueueEntry, RegistryError> {
        let tables = self.tables.read();
        tables
            .doorbells
            .get(&doorbell_offset)
            .and_then(|h| tables.queues.get(h))
            .cloned()
            .ok_or_else(|| not_found(HandleKind::Doorbell, u64::from(doorbell_offset)))
    }

    pub fn queues_of_gang(&self, h_context: u64) -> Result<GangQueues, RegistryError> {
        self.tables
            .read()
            .gangs
            .get(&h_context)
            .map(|gang| gang.queues.clone())
            .ok_or_else(|| not_found(HandleKind::Gang, h_context))
    }

    pub fn gangs_of_process(&self, process_context_addr: u64) -> Result<Vec<u64>, RegistryError> {
        self.tables
            .read()
            .processes
            .get(&process_context_addr)
            .map(|process| process.gangs.clone())
            .ok_or_else(|| not_found(HandleKind::Process, process_context_addr))
    }

    /// Applies `update` to a registered gang.
    pub fn update_gang<R>(
        &self,
        h_context: u64,
        update: impl FnOnce(&mut GangEntry) -> R,
    ) -> Result<R, RegistryError> {
        let mut tables = self.tables.write();
        let gang = tables
            .gangs
            .get_mut(&h_context)
            .ok_or_else(|| not_found(HandleKind::Gang, h_context))?;
        Ok(update(gang))
    }

    /// Applies `update` to a registered process.
    pub fn update_process<R>(
        &self,
        process_context_addr: u64,
        update: impl FnOnce(&mut ProcessEntry) -> R,
    ) -> Result<R, RegistryError> {
        let mut tables = self.tables.write();
        let process = tables
            .processes
            .get_mut(&process_context_addr)
            .ok_or_else(|| not_found(HandleKind::Process, process_context_addr))?;
        Ok(update(process))
    }

    /// Marks every gang suspended or resumed. Returns how many changed.
    pub fn set_all_suspended(&self, suspended: bool) -> usize {
        let mut tables = self.tables.write();
        let mut changed = 0;
        for gang in tables.gangs.values_mut() {
            if gang.suspended != suspended {
                gang.suspended = suspended;
                changed += 1;
            }
        }
        changed
    }

    pub fn register_sync_object(&self, h_sync_object: u64) -> Result<(), RegistryError> {
        let mut tables = self.tables.write();
        if tables.sync_objects.contains_key(&h_sync_object) {
            return Err(duplicate(HandleKind::SyncObject, h_sync_object));
        }
        tables.sync_objects.insert(
            h_sync_object,
            SyncObjectEntry {
                h_sync_object,
                waiters: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn unregister_sync_object(&self, h_sync_object: u64) -> Result<SyncObjectEntry, RegistryError> {
        self.tables
            .write()
            .sync_objects
            .remove(&h_sync_object)
            .ok_or_else(|| not_found(HandleKind::SyncObject, h_sync_object))
    }

    pub fn sync_object(&self, h_sync_object: u64) -> Result<SyncObjectEntry, RegistryError> {
        self.tables
            .read()
            .sync_objects
            .get(&h_sync_object)
            .cloned()
            .ok_or_else(|| not_found(HandleKind::SyncObject, h_sync_object))
    }

    /// Records that `h_queue` now waits on `h_sync_object`.
    pub fn add_sync_waiter(&self, h_sync_object: u64, h_queue: u64) -> Result<(), RegistryError> {
        let mut tables = self.tables.write();
        if !tables.queues.contains_key(&h_queue) {
            return Err(not_found(HandleKind::Queue, h_queue));
        }
        let object = tables
            .sync_objects
            .get_mut(&h_sync_object)
            .ok_or_else(|| not_found(HandleKind::SyncObject, h_sync_object))?;
        if !object.waiters.contains(&h_queue) {
            object.waiters.push(h_queue);
        }
        Ok(())
    }

    /// Clears `h_queue` from the waiters of `h_sync_object`.
    pub fn remove_sync_waiter(&self, h_sync_object: u64, h_queue: u64) -> Result<bool, RegistryError> {
        let mut tables = self.tables.write();
        let object = tables
            .sync_objects
            .get_mut(&h_sync_object)
            .ok_or_else(|| not_found(HandleKind::SyncObject, h_sync_object))?;
        let before = object.waiters.len();
        object.waiters.retain(|h| *h != h_queue);
        Ok(object.waiters.len() != before)
    }

    pub fn stats(&self) -> RegistryStats {
        let tables = self.tables.read();
        RegistryStats {
            processes: tables.processes.len(),
            gangs: tables.gangs.len(),
            queues: tables.queues.len(),
            sync_objects: tables.sync_objects.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROCESS: u64 = 0x10_0000;

    fn add_queue(h_context: u64, h_queue: u64, doorbell: u32) -> AddQueue {
        AddQueue {
            process_id: 7,
            process_context_addr: PROCESS,
            gang_context_addr: 0x20_0000 + h_context,
            h_context,
            h_queue,
            doorbell_offset: doorbell,
            queue_type: QueueType::Compute,
            ..AddQueue::default()
        }
    }

    #[test]
    fn admit_creates_hierarchy_on_first_use() {
        let registry = Registry::new();
        let admission = registry.admit_queue(&add_queue(1, 0x100, 8)).expect("admit");
        assert_eq!(admission.queue.h_context, 1);
        assert!(admission.created_gang && admission.created_process);
        assert_eq!(registry.gangs_of_process(PROCESS).expect("process"), vec![1]);
        assert_eq!(registry.queues_of_gang(1).expect("gang").as_slice(), &[0x100]);
        assert_eq!(registry.queue_by_doorbell(8).expect("doorbell").h_queue, 0x100);
        assert_eq!(
            registry.gang_by_context_addr(0x20_0001).expect("ctx").h_context,
            1
        );
    }

    #[test]
    fn rejected_admission_leaves_tables_untouched() {
        let registry = Registry::new();
        registry.admit_queue(&add_queue(1, 0x100, 8)).expect("admit");
        let before = registry.stats();

        let err = registry.admit_queue(&add_queue(2, 0x100, 9)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateHandle {
                kind: HandleKind::Queue,
                handle: 0x100
            }
        );
        let err = registry.admit_queue(&add_queue(2, 0x101, 8)).unwrap_err();
        assert!(matches!(
            err,
            RegistryError::DuplicateHandle {
                kind: HandleKind::Doorbell,
                ..
            }
        ));
        assert_eq!(registry.stats(), before);
    }

    #[test]
    fn gang_holds_at_most_eight_queues() {
        let registry = Registry::new();
        for i in 0..MAX_QUEUES_IN_A_GANG as u64 {
            registry
                .admit_queue(&add_queue(1, 0x100 + i, 8 + i as u32))
                .expect("admit");
        }
        assert_eq!(
            registry.admit_queue(&add_queue(1, 0x200, 100)).unwrap_err(),
            RegistryError::GangFull { h_context: 1 }
        );
    }

    #[test]
    fn gang_of_another_process_is_rejected() {
        let registry = Registry::new();
        registry.admit_queue(&add_queue(1, 0x100, 8)).expect("admit");
        let mut foreign = add_queue(1, 0x101, 9);
        foreign.process_context_addr = 0x99_0000;
        assert!(matches!(
            registry.admit_queue(&foreign),
            Err(RegistryError::OwnerMismatch {
                kind: HandleKind::Gang,
                handle: 1,
                ..
            })
        ));
    }

    #[test]
    fn last_queue_removal_cascades() {
        let registry = Registry::new();
        registry.admit_queue(&add_queue(1, 0x100, 8)).expect("admit");
        registry.admit_queue(&add_queue(1, 0x101, 9)).expect("admit");

        let first = registry.unregister_queue(0x100).expect("remove");
        assert!(first.removed_gang.is_none());
        assert_eq!(first.gang_context_addr, 0x20_0001);

        let last = registry.unregister_queue(0x101).expect("remove");
        assert_eq!(last.removed_gang.map(|g| g.h_context), Some(1));
        assert_eq!(
            last.removed_process.map(|p| p.process_context_addr),
            Some(PROCESS)
        );
        assert_eq!(registry.stats(), RegistryStats::default());
        assert!(registry.queue_by_doorbell(9).is_err());
    }

    #[test]
    fn restore_undoes_cascading_removal() {
        let registry = Registry::new();
        registry.admit_queue(&add_queue(1, 0x100, 8)).expect("admit");
        let before = registry.stats();
        let removal = registry.unregister_queue(0x100).expect("remove");
        assert_eq!(registry.stats(), RegistryStats::default());
        registry.restore(removal).expect("restore");
        assert_eq!(registry.stats(), before);
        assert_eq!(registry.queue_by_doorbell(8).expect("doorbell").h_queue, 0x100);
        assert_eq!(registry.gangs_of_process(PROCESS).expect("process"), vec![1]);
    }

    #[test]
    fn explicit_gang_registration_requires_process() {
        let registry = Registry::new();
        assert_eq!(
            registry
                .register_gang(GangEntry::new(0xAAA1, 0x3000, PROCESS))
                .unwrap_err(),
            RegistryError::NotFound {
                kind: HandleKind::Process,
                handle: PROCESS
            }
        );
        registry
            .register_process(ProcessEntry::new(PROCESS, 1))
            .expect("process");
        registry
            .register_gang(GangEntry::new(0xAAA1, 0x3000, PROCESS))
            .expect("gang");
        assert!(registry
            .register_gang(GangEntry::new(0xAAA2, 0x3000, PROCESS))
            .is_err());
    }

    #[test]
    fn unregister_process_drops_everything_below_it() {
        let registry = Registry::new();
        registry.admit_queue(&add_queue(1, 0x100, 8)).expect("admit");
        registry.admit_queue(&add_queue(2, 0x200, 9)).expect("admit");
        let process = registry.unregister_process(PROCESS).expect("process");
        assert_eq!(process.process_context_addr, PROCESS);
        assert_eq!(registry.stats(), RegistryStats::default());
    }

    #[test]
    fn sync_object_waiters() {
        let registry = Registry::new();
        registry.admit_queue(&add_queue(1, 0x100, 8)).expect("admit");
        registry.register_sync_object(0x5000).expect("sync");
        registry.add_sync_waiter(0x5000, 0x100).expect("wait");
        registry.add_sync_waiter(0x5000, 0x100).expect("idempotent");
        assert_eq!(registry.sync_object(0x5000).expect("sync").waiters, vec![0x100]);
        assert!(registry.remove_sync_waiter(0x5000, 0x100).expect("unwait"));
        assert!(registry.add_sync_waiter(0x5000, 0x999).is_err());
    }

    #[test]
    fn retract_keeps_what_was_registered_before() {
        let registry = Registry::new();
        registry
            .register_process(ProcessEntry::new(PROCESS, 1))
            .expect("process");
        registry
            .register_gang(GangEntry::new(0xAAA1, 0x20_AAA1, PROCESS))
            .expect("gang");
        let admission = registry
            .admit_queue(&add_queue(0xAAA1, 0xBEEF, 8))
            .expect("admit");
        assert!(!admission.created_gang);
        assert!(!admission.created_process);

        registry.retract(&admission).expect("retract");
        assert!(registry.queue(0xBEEF).is_err());
        assert!(registry.queue_by_doorbell(8).is_err());
        assert!(registry.gang(0xAAA1).expect("gang").queues().is_empty());
        assert_eq!(registry.gangs_of_process(PROCESS).expect("process"), vec![0xAAA1]);
        assert_eq!(
            registry.retract(&admission).unwrap_err(),
            RegistryError::NotFound {
                kind: HandleKind::Queue,
                handle: 0xBEEF
            }
        );
    }

    #[test]
    fn retract_drops_a_gang_it_created_under_a_shared_process() {
        let registry = Registry::new();
        registry.admit_queue(&add_queue(1, 0x100, 8)).expect("admit");
        let admission = registry.admit_queue(&add_queue(2, 0x200, 9)).expect("admit");
        assert!(admission.created_gang);
        assert!(!admission.created_process);

        registry.retract(&admission).expect("retract");
        assert!(registry.gang(2).is_err());
        assert!(registry.gang_by_context_addr(0x20_0002).is_err());
        assert_eq!(registry.gangs_of_process(PROCESS).expect("process"), vec![1]);
    }

    #[test]
    fn retract_of_a_fresh_hierarchy_empties_the_registry() {
        let registry = Registry::new();
        let admission = registry.admit_queue(&add_queue(1, 0x100, 8)).expect("admit");
        registry.retract(&admission).expect("retract");
        assert_eq!(registry.stats(), RegistryStats::default());
    }

    #[test]
    fn removed_queues_leave_sync_waiters() {
        let registry = Registry::new();
        registry.admit_queue(&add_queue(1, 0x100, 8)).expect("admit");
        registry.admit_queue(&add_queue(1, 0x101, 9)).expect("admit");
        registry.admit_queue(&add_queue(2, 0x200, 10)).expect("admit");
        registry.register_sync_object(0x5000).expect("sync");
        for h_queue in [0x100, 0x101, 0x200] {
            registry.add_sync_waiter(0x5000, h_queue).expect("wait");
        }

        registry.unregister_queue(0x100).expect("remove");
        assert_eq!(
            registry.sync_object(0x5000).expect("sync").waiters,
            vec![0x101, 0x200]
        );
        registry.unregister_gang(2).expect("gang");
        assert_eq!(registry.sync_object(0x5000).expect("sync").waiters, vec![0x101]);
    }

    #[test]
    fn gang_serializes_its_queue_list() {
        let registry = Registry::new();
        registry.admit_queue(&add_queue(1, 0x100, 8)).expect("admit");
        registry.admit_queue(&add_queue(1, 0x101, 9)).expect("admit");
        let gang = serde_json::to_value(registry.gang(1).expect("gang")).expect("json");
        assert_eq!(gang["queues"], serde_json::json!([0x100, 0x101]));
        assert_eq!(gang["h_context"], serde_json::json!(1));
    }

    #[test]
    fn suspend_all_marks_every_gang() {
        let registry = Registry::new();
        registry.admit_queue(&add_queue(1, 0x100, 8)).expect("admit");
        registry.admit_queue(&add_queue(2, 0x200, 9)).expect("admit");
        assert_eq!(registry.set_all_suspended(true), 2);
        assert!(registry.gang(2).expect("gang").suspended);
        assert_eq!(registry.set_all_suspended(true), 0);
    }
}

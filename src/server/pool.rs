//! Fixed-size pool of connection streams.
//!
//! Slots are created once at startup and move between an inactive list and
//! an active list under a single lock. A slot is in exactly one list at any
//! time, and only active slots are bound to a socket.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{HttpServerError, Result};
use crate::http::connection::ConnectionStream;
use crate::server::events::EventNotifier;
use crate::transport::{SocketId, Transport};

#[derive(Debug, Clone, Copy)]
struct ActiveSlot {
    socket: SocketId,
    index: usize,
}

#[derive(Debug)]
struct Lists {
    inactive: VecDeque<usize>,
    active: Vec<ActiveSlot>,
}

#[derive(Debug)]
pub struct StreamPool {
    slots: Vec<ConnectionStream>,
    lists: Mutex<Lists>,
}

impl StreamPool {
    /// Allocates every slot up front.
    pub fn new(
        capacity: usize,
        transport: Arc<dyn Transport>,
        notifier: EventNotifier,
        max_cached_request: usize,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(HttpServerError::BadArgument("pool capacity must be non-zero"));
        }

        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| HttpServerError::NoMemory)?;
        slots.extend(
            (0..capacity)
                .map(|_| ConnectionStream::new(transport.clone(), notifier.clone(), max_cached_request)),
        );

        Ok(Self {
            slots,
            lists: Mutex::new(Lists {
                inactive: (0..capacity).collect(),
                active: Vec::with_capacity(capacity),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Lists> {
        self.lists.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn active_count(&self) -> usize {
        self.lock().active.len()
    }

    pub fn has_capacity(&self) -> bool {
        !self.lock().inactive.is_empty()
    }

    /// Moves an inactive slot to the active list and binds it to `socket`.
    ///
    /// Returns `None` when every slot is in use.
    pub fn allocate(&self, socket: SocketId) -> Option<&ConnectionStream> {
        let mut lists = self.lock();
        let index = lists.inactive.pop_front()?;
        // Bind before the slot becomes findable.
        let stream = &self.slots[index];
        stream.open(socket);
        lists.active.push(ActiveSlot { socket, index });
        Some(stream)
    }

    /// Active slot bound to `socket`.
    pub fn find(&self, socket: SocketId) -> Option<&ConnectionStream> {
        let lists = self.lock();
        lists
            .active
            .iter()
            .find(|slot| slot.socket == socket)
            .map(|slot| &self.slots[slot.index])
    }

    /// Unbinds the slot bound to `socket` and returns it to the inactive
    /// list. Returns the socket it was listed under.
    ///
    /// The slot is cleared before the pool lock is released, so a
    /// concurrent `allocate` never hands out a slot still being torn down.
    pub fn release(&self, socket: SocketId) -> Option<SocketId> {
        let mut lists = self.lock();
        let pos = lists.active.iter().position(|slot| slot.socket == socket)?;
        let slot = lists.active.swap_remove(pos);
        self.slots[slot.index].close();
        lists.inactive.push_back(slot.index);
        Some(slot.socket)
    }

    /// Reclaims active slots whose stream lost its socket. Returns the
    /// sockets they were listed under.
    pub fn release_orphans(&self) -> Vec<SocketId> {
        let mut lists = self.lock();
        let mut orphans = Vec::new();
        let mut i = 0;
        while i < lists.active.len() {
            let slot = lists.active[i];
            let stream = &self.slots[slot.index];
            if stream.response().socket().is_none() {
                lists.active.swap_remove(i);
                stream.close();
                lists.inactive.push_back(slot.index);
                orphans.push(slot.socket);
            } else {
                i += 1;
            }
        }
        orphans
    }

    /// Unbinds every active slot and empties the active list.
    pub fn drain(&self) -> Vec<SocketId> {
        let mut lists = self.lock();
        let drained: Vec<ActiveSlot> = lists.active.drain(..).collect();
        for slot in &drained {
            self.slots[slot.index].close();
            lists.inactive.push_back(slot.index);
        }
        drained.into_iter().map(|slot| slot.socket).collect()
    }

    pub fn active_sockets(&self) -> Vec<SocketId> {
        self.lock().active.iter().map(|slot| slot.socket).collect()
    }
}

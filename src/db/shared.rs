use std::any::Any;
use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tokio::sync::Mutex;

use crate::error::{FactoryError, FactoryResult};

thread_local! {
    /// Live shared connections on this thread, keyed by factory id
    static LOCAL_CONNECTIONS: RefCell<HashMap<u64, Weak<dyn Any>>> = RefCell::new(HashMap::new());

    /// Serializes pool checkouts per factory so overlapping call sites on
    /// this thread wait for one acquire instead of racing their own
    static ACQUIRE_LOCKS: RefCell<HashMap<u64, Rc<Mutex<()>>>> = RefCell::new(HashMap::new());
}

/// This thread's acquire lock for `factory_id`, created on first use.
pub(crate) fn acquire_lock(factory_id: u64) -> Rc<Mutex<()>> {
    ACQUIRE_LOCKS.with(|locks| {
        locks
            .borrow_mut()
            .entry(factory_id)
            .or_insert_with(|| Rc::new(Mutex::new(())))
            .clone()
    })
}

/// Drops the thread's acquire lock for `factory_id` once nobody else waits on it.
pub(crate) fn release_acquire_lock(factory_id: u64, lock: Rc<Mutex<()>>) {
    ACQUIRE_LOCKS.with(|locks| {
        let mut locks = locks.borrow_mut();
        // One reference in the map plus the caller's.
        if Rc::strong_count(&lock) == 2 {
            locks.remove(&factory_id);
        }
    });
}

struct Slot<C> {
    factory_id: u64,
    connection: RefCell<C>,
}

impl<C> Drop for Slot<C> {
    fn drop(&mut self) {
        let factory_id = self.factory_id;
        // The registry may already be gone if this runs during thread teardown.
        let _ = LOCAL_CONNECTIONS.try_with(|slots| {
            if let Ok(mut slots) = slots.try_borrow_mut() {
                let stale = slots
                    .get(&factory_id)
                    .is_some_and(|weak| weak.strong_count() == 0);
                if stale {
                    slots.remove(&factory_id);
                }
            }
        });
        tracing::debug!(factory_id, "Returning thread-local connection to pool");
    }
}

/// A reference-counted handle to the connection this thread shares for one
/// factory.
///
/// Cloning a handle is another use of the same physical connection. When
/// the last handle on the thread is dropped the connection goes back to the
/// pool and the next request acquires a fresh one. Handles are `!Send`, so a
/// connection never leaves the thread it was checked out on.
pub struct SharedConnection<C> {
    slot: Rc<Slot<C>>,
}

impl<C: Send + 'static> SharedConnection<C> {
    /// Another handle to this thread's live connection for `factory_id`, if any.
    pub(crate) fn current(factory_id: u64) -> Option<Self> {
        let live = LOCAL_CONNECTIONS
            .with(|slots| slots.borrow().get(&factory_id).and_then(Weak::upgrade))?;
        let slot = live.downcast::<Slot<C>>().ok()?;
        Some(Self { slot })
    }

    /// Make `connection` this thread's shared connection for `factory_id`.
    ///
    /// If another call site on the thread registered one in the meantime,
    /// `connection` is dropped back into the pool and the existing one is
    /// returned instead.
    pub(crate) fn register(factory_id: u64, connection: C) -> Self {
        if let Some(existing) = Self::current(factory_id) {
            drop(connection);
            return existing;
        }

        let slot = Rc::new(Slot {
            factory_id,
            connection: RefCell::new(connection),
        });
        let weak: Weak<dyn Any> = Rc::downgrade(&slot) as Weak<dyn Any>;
        LOCAL_CONNECTIONS.with(|slots| {
            slots.borrow_mut().insert(factory_id, weak);
        });

        Self { slot }
    }
}

impl<C> SharedConnection<C> {
    /// Exclusive access to the underlying connection.
    ///
    /// Fails with [`FactoryError::ConnectionBusy`] while another handle on
    /// this thread holds it.
    pub fn borrow_mut(&self) -> FactoryResult<RefMut<'_, C>> {
        self.slot
            .connection
            .try_borrow_mut()
            .map_err(|_| FactoryError::ConnectionBusy)
    }

    /// Number of live handles sharing this connection
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.slot)
    }

    pub fn factory_id(&self) -> u64 {
        self.slot.factory_id
    }

    /// Whether two handles point at the same physical connection
    pub fn same_connection(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.slot, &other.slot)
    }
}

impl<C> Clone for SharedConnection<C> {
    fn clone(&self) -> Self {
        Self {
            slot: Rc::clone(&self.slot),
        }
    }
}

impl<C> fmt::Debug for SharedConnection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedConnection")
            .field("factory_id", &self.slot.factory_id)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// Whether the calling thread holds a live connection for `factory_id`
pub(crate) fn thread_holds(factory_id: u64) -> bool {
    LOCAL_CONNECTIONS.with(|slots| {
        slots
            .borrow()
            .get(&factory_id)
            .is_some_and(|weak| weak.strong_count() > 0)
    })
}

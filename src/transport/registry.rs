//! Callback name registry for in-flight JSONP requests.
//!
//! Each request reserves a unique, script-addressable name for the duration of
//! the call. The reservation is held by a [`CallbackGuard`] and released when
//! the guard drops, so completed, failed and cancelled requests all deregister.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;

/// Prefix for generated callback names.
pub const CALLBACK_PREFIX: &str = "cb_";

const SUFFIX_LEN: usize = 11;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Set of callback names currently bound to pending requests.
#[derive(Debug, Default, Clone)]
pub struct CallbackRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh callback name that no in-flight request is using.
    pub fn acquire(&self) -> CallbackGuard {
        let mut rng = rand::thread_rng();
        let mut active = self.active.lock();
        loop {
            let name = random_name(&mut rng);
            if active.insert(name.clone()) {
                return CallbackGuard {
                    name,
                    active: Arc::clone(&self.active),
                };
            }
        }
    }

    /// Number of names currently reserved.
    pub fn pending(&self) -> usize {
        self.active.lock().len()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.active.lock().contains(name)
    }
}

fn random_name(rng: &mut impl Rng) -> String {
    let mut name = String::with_capacity(CALLBACK_PREFIX.len() + SUFFIX_LEN);
    name.push_str(CALLBACK_PREFIX);
    for _ in 0..SUFFIX_LEN {
        name.push(BASE36[rng.gen_range(0..BASE36.len())] as char);
    }
    name
}

/// Reservation of one callback name; deregisters on drop.
#[derive(Debug)]
pub struct CallbackGuard {
    name: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl CallbackGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for CallbackGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.name);
    }
}

use std::sync::{Arc, Mutex};

use crate::stream::Resource;

/// A scoped bag of resources released as a group.
///
/// Files opened while wiring a command are registered here and released
/// together once the command has run. `close` releases all members in
/// parallel, since closes can block and serializing them would stall
/// unrelated I/O.
///
/// The closer stays usable after `close`: members added afterwards are
/// released by the next call. Double-closing any member is harmless because
/// handle closes are idempotent.
#[derive(Default)]
pub struct Closer {
    resources: Mutex<Vec<Arc<dyn Resource>>>,
}

impl Closer {
    /// Create an empty closer.
    pub fn new() -> Closer {
        Closer::default()
    }

    /// Register a resource to be released by the next `close`.
    pub fn add(&self, resource: Arc<dyn Resource>) {
        self.resources.lock().unwrap().push(resource);
    }

    /// Release every registered resource and wait for all releases to
    /// complete. Runs under a single critical section.
    pub fn close(&self) {
        let mut resources = self.resources.lock().unwrap();
        match resources.len() {
            0 => return,
            1 => {
                let _ = resources[0].close();
            }
            _ => {
                crossbeam_utils::thread::scope(|scope| {
                    for resource in resources.iter() {
                        scope.spawn(move |_| {
                            let _ = resource.close();
                        });
                    }
                })
                .unwrap();
            }
        }
        resources.clear();
    }
}

use std::{cell::RefCell, rc::Rc};

use crate::{
    register::DebugRegister, DebugTarget, InvalidFormat, RegisterCache, RegisterObserver,
    SyncError, UpdateDirection,
};

/// An observer registered with a [`RegisterManager`].
///
/// The UI keeps its own handle to edit the widget between notifications.
pub type SharedObserver = Rc<RefCell<dyn RegisterObserver>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(usize);

/// Owns the register cache and moves values between the target, the cache and the observers.
pub struct RegisterManager<T: DebugTarget> {
    target: T,
    cache: RegisterCache,
    observers: Vec<(ObserverId, SharedObserver)>,
    next_id: usize,
}

impl<T: DebugTarget> RegisterManager<T> {
    pub fn new(target: T) -> Self {
        Self {
            target,
            cache: RegisterCache::new(),
            observers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn cache(&self) -> &RegisterCache {
        &self.cache
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    /// Observers are notified in the order they subscribed.
    pub fn subscribe(&mut self, observer: SharedObserver) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer_id, _)| *observer_id != id);
        self.observers.len() != before
    }

    /// Notifies every observer.
    ///
    /// Pushing GUI values stops at the first observer that fails. The cache is then restored to
    /// its state from before the notification, so values of earlier observers do not stick.
    pub fn notify(&mut self, direction: UpdateDirection) -> Result<(), InvalidFormat> {
        let snapshot = match direction {
            UpdateDirection::GuiToRegisters => Some(self.cache.clone()),
            UpdateDirection::RegistersToGui => None,
        };

        for (id, observer) in &self.observers {
            let result = observer
                .borrow_mut()
                .notify_register_update(direction, &mut self.cache);
            if let Err(error) = result {
                log::warn!("Observer {:?} rejected {:?}: {}", id, direction, error);
                if let Some(snapshot) = snapshot {
                    self.cache = snapshot;
                }
                return Err(error);
            }
        }
        Ok(())
    }

    /// Reads all debug registers from the target and refreshes the observers.
    ///
    /// If any read fails the cache keeps its previous contents.
    pub fn read_registers(&mut self) -> Result<(), SyncError> {
        let mut values = Vec::with_capacity(DebugRegister::ALL.len());
        for register in DebugRegister::ALL.iter().copied() {
            let value = self
                .target
                .read_spr(register.spr())
                .map_err(|error| SyncError::Target(error.context(format!("Reading {}", register))))?;
            values.push((register, value));
        }
        log::info!("Read {} debug registers", values.len());

        self.cache.load(values);
        self.notify(UpdateDirection::RegistersToGui)?;
        Ok(())
    }

    /// Collects the GUI values and writes the modified registers to the target.
    ///
    /// Nothing is written if any observer holds an invalid value.
    pub fn write_registers(&mut self) -> Result<(), SyncError> {
        self.notify(UpdateDirection::GuiToRegisters)?;

        let dirty = self.cache.dirty();
        for (register, value) in &dirty {
            log::debug!("Writing {} = {:#010x}", register, value);
            self.target
                .write_spr(register.spr(), *value)
                .map_err(|error| SyncError::Target(error.context(format!("Writing {}", register))))?;
            self.cache.mark_register_clean(*register);
        }
        log::info!("Wrote {} debug registers", dirty.len());
        Ok(())
    }

    /// Takes register values from elsewhere, e.g. a remote viewer, and shows them in the GUI.
    ///
    /// The values only reach the target with the next [`write_registers`](Self::write_registers).
    pub fn apply_remote(&mut self, values: impl IntoIterator<Item = (DebugRegister, u32)>) {
        for (register, value) in values {
            self.cache.set(register, value);
        }
        if let Err(error) = self.notify(UpdateDirection::RegistersToGui) {
            log::warn!("Showing the remote values failed: {}", error);
        }
    }

    pub fn snapshot(&self) -> Vec<(DebugRegister, u32)> {
        DebugRegister::ALL
            .iter()
            .map(|register| (*register, self.cache.get(*register)))
            .collect()
    }
}

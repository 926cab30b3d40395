use std::{cell::RefCell, rc::Rc};

use register_view::{
    DebugRegister, DebugTarget, InvalidFormat, MemoryTarget, RegisterCache, RegisterManager,
    RegisterObserver, SyncError, UpdateDirection, WatchpointPanel,
};

/// Fails every update, in both directions.
struct Stubborn;

impl RegisterObserver for Stubborn {
    fn notify_register_update(
        &mut self,
        _direction: UpdateDirection,
        _cache: &mut RegisterCache,
    ) -> Result<(), InvalidFormat> {
        Err(InvalidFormat::new("Stubborn", "", "always fails"))
    }
}

fn manager_with_panels() -> (
    RegisterManager<MemoryTarget>,
    Rc<RefCell<WatchpointPanel>>,
    Rc<RefCell<WatchpointPanel>>,
) {
    let mut manager = RegisterManager::new(MemoryTarget::new());
    let first = Rc::new(RefCell::new(WatchpointPanel::new(0)));
    let second = Rc::new(RefCell::new(WatchpointPanel::new(1)));
    manager.subscribe(first.clone());
    manager.subscribe(second.clone());
    (manager, first, second)
}

#[test]
fn read_refreshes_every_observer() {
    let (mut manager, first, second) = manager_with_panels();
    let target = manager.target_mut();
    target.write_spr(DebugRegister::Dvr(0).spr(), 0x100).unwrap();
    target.write_spr(DebugRegister::Dvr(1).spr(), 0x200).unwrap();

    manager.read_registers().unwrap();

    assert_eq!(first.borrow().value.text(), "0x00000100");
    assert_eq!(second.borrow().value.text(), "0x00000200");
    assert!(manager.cache().dirty().is_empty());
}

#[test]
fn write_sends_only_modified_registers() {
    let (mut manager, first, _second) = manager_with_panels();
    manager.read_registers().unwrap();

    first.borrow_mut().value.set_text("0xcafe");
    first.borrow_mut().condition.select(1);
    manager.write_registers().unwrap();

    let target = manager.target();
    assert_eq!(target.get(DebugRegister::Dvr(0).spr()), 0xcafe);
    assert_eq!(target.get(DebugRegister::Dcr(0).spr()), 0b10);
    assert!(manager.cache().dirty().is_empty());
}

#[test]
fn invalid_observer_aborts_write_and_restores_cache() {
    let (mut manager, first, second) = manager_with_panels();
    manager.read_registers().unwrap();
    let before = manager.cache().clone();

    first.borrow_mut().value.set_text("0x10");
    second.borrow_mut().value.set_text("oops");

    match manager.write_registers() {
        Err(SyncError::Format(error)) => assert_eq!(error.input, "oops"),
        other => panic!("expected a format error, got {:?}", other),
    }
    assert_eq!(manager.cache(), &before);
    assert_eq!(manager.target().get(DebugRegister::Dvr(0).spr()), 0);
}

#[test]
fn failed_read_keeps_cache() {
    let mut manager = RegisterManager::new(MemoryTarget::new().with_fault(DebugRegister::Dsr.spr()));
    manager.apply_remote(vec![(DebugRegister::Dvr(3), 3)]);
    let before = manager.cache().clone();

    assert!(matches!(manager.read_registers(), Err(SyncError::Target(_))));
    assert_eq!(manager.cache(), &before);
}

#[test]
fn unsubscribed_observers_are_left_alone() {
    let mut manager = RegisterManager::new(MemoryTarget::new());
    let panel = Rc::new(RefCell::new(WatchpointPanel::new(2)));
    let id = manager.subscribe(panel.clone());
    assert!(manager.unsubscribe(id));
    assert!(!manager.unsubscribe(id));

    panel.borrow_mut().value.set_text("zz");
    assert!(manager.notify(UpdateDirection::GuiToRegisters).is_ok());
}

#[test]
fn remote_values_reach_the_gui() {
    let (mut manager, first, _second) = manager_with_panels();
    manager.apply_remote(vec![(DebugRegister::Dcr(0), 0b1010_0100)]);
    let panel = first.borrow();
    assert_eq!(panel.condition.selected_name(), Some("<"));
    assert_eq!(panel.compare.selected_name(), Some("store data"));
}

#[test]
fn remote_values_survive_a_failing_observer() {
    let (mut manager, first, _second) = manager_with_panels();
    manager.subscribe(Rc::new(RefCell::new(Stubborn)));

    manager.apply_remote(vec![(DebugRegister::Dvr(0), 0x42)]);

    assert_eq!(manager.cache().get(DebugRegister::Dvr(0)), 0x42);
    assert_eq!(first.borrow().value.text(), "0x00000042");
}

use crate::{
    field::{CheckBox, ComboBox, Label, Radix, TextField},
    register::{dcr, dmr1, dmr2, dwcr, BitRange, DebugRegister, WATCHPOINTS},
    Control, InvalidFormat, RegisterCache, RegisterObserver, UpdateDirection,
};

/// A group of controls shown together, e.g. as one tab.
pub trait Panel: RegisterObserver {
    fn title(&self) -> String;

    fn controls(&self) -> Vec<&dyn Control>;

    fn controls_mut(&mut self) -> Vec<&mut dyn Control>;
}

/// Notifies all controls of a panel.
///
/// Values are pushed into a copy of the cache which only replaces the cache once every control
/// succeeded, so a panel never leaves a partial write behind.
fn sync_controls(
    controls: Vec<&mut dyn Control>,
    direction: UpdateDirection,
    cache: &mut RegisterCache,
) -> Result<(), InvalidFormat> {
    match direction {
        UpdateDirection::GuiToRegisters => {
            let mut staged = cache.clone();
            for control in controls {
                control.notify_register_update(direction, &mut staged)?;
            }
            *cache = staged;
        }
        UpdateDirection::RegistersToGui => {
            for control in controls {
                control.notify_register_update(direction, cache)?;
            }
        }
    }
    Ok(())
}

/// The controls of one DVR/DCR pair.
pub struct WatchpointPanel {
    index: u8,
    pub value: TextField,
    pub condition: ComboBox,
    pub signed: CheckBox,
    pub compare: ComboBox,
    pub chain: ComboBox,
    pub break_on_match: CheckBox,
    pub counter: ComboBox,
    pub present: Label,
}

impl WatchpointPanel {
    pub fn new(index: u8) -> Self {
        assert!(index < WATCHPOINTS, "watchpoint {} does not exist", index);
        let value = DebugRegister::Dvr(index);
        let control = DebugRegister::Dcr(index);
        Self {
            index,
            value: TextField::new("Value", value, BitRange::WORD, Radix::Hex),
            condition: ComboBox::new("Condition", control, dcr::CC, &dcr::CONDITIONS),
            signed: CheckBox::new("Signed compare", control, dcr::SC),
            compare: ComboBox::new("Compare to", control, dcr::CT, &dcr::COMPARE_TYPES),
            chain: ComboBox::new(
                "Chain",
                DebugRegister::Dmr1,
                dmr1::chain(index),
                &dmr1::CHAINS,
            ),
            break_on_match: CheckBox::new(
                "Break on match",
                DebugRegister::Dmr2,
                dmr2::break_generate(index),
            ),
            counter: ComboBox::new(
                "Count into",
                DebugRegister::Dmr2,
                dmr2::counter_assign(index),
                &dmr2::COUNTERS,
            ),
            present: Label::new("Present", control, dcr::DP, Radix::Decimal),
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }
}

impl RegisterObserver for WatchpointPanel {
    fn notify_register_update(
        &mut self,
        direction: UpdateDirection,
        cache: &mut RegisterCache,
    ) -> Result<(), InvalidFormat> {
        sync_controls(self.controls_mut(), direction, cache)
    }
}

impl Panel for WatchpointPanel {
    fn title(&self) -> String {
        format!("WP{}", self.index)
    }

    fn controls(&self) -> Vec<&dyn Control> {
        vec![
            &self.value,
            &self.condition,
            &self.signed,
            &self.compare,
            &self.chain,
            &self.break_on_match,
            &self.counter,
            &self.present,
        ]
    }

    fn controls_mut(&mut self) -> Vec<&mut dyn Control> {
        vec![
            &mut self.value,
            &mut self.condition,
            &mut self.signed,
            &mut self.compare,
            &mut self.chain,
            &mut self.break_on_match,
            &mut self.counter,
            &mut self.present,
        ]
    }
}

/// The controls of one watchpoint counter.
///
/// Counter `k` acts as watchpoint `8 + k` for chaining and breakpoint generation.
pub struct CounterPanel {
    index: u8,
    pub count: TextField,
    pub match_value: TextField,
    pub enable: CheckBox,
    pub break_on_match: CheckBox,
    pub chain: ComboBox,
}

impl CounterPanel {
    pub fn new(index: u8) -> Self {
        assert!(
            index < crate::register::COUNTERS,
            "counter {} does not exist",
            index
        );
        let counter = DebugRegister::Dwcr(index);
        let watchpoint = WATCHPOINTS + index;
        Self {
            index,
            count: TextField::new("Count", counter, dwcr::COUNT, Radix::Decimal),
            match_value: TextField::new("Match", counter, dwcr::MATCH, Radix::Decimal),
            enable: CheckBox::new(
                "Enabled",
                DebugRegister::Dmr2,
                dmr2::counter_enable(index),
            ),
            break_on_match: CheckBox::new(
                "Break on match",
                DebugRegister::Dmr2,
                dmr2::break_generate(watchpoint),
            ),
            chain: ComboBox::new(
                "Chain",
                DebugRegister::Dmr1,
                dmr1::chain(watchpoint),
                &dmr1::CHAINS,
            ),
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }
}

impl RegisterObserver for CounterPanel {
    fn notify_register_update(
        &mut self,
        direction: UpdateDirection,
        cache: &mut RegisterCache,
    ) -> Result<(), InvalidFormat> {
        sync_controls(self.controls_mut(), direction, cache)
    }
}

impl Panel for CounterPanel {
    fn title(&self) -> String {
        format!("Counter {}", self.index)
    }

    fn controls(&self) -> Vec<&dyn Control> {
        vec![
            &self.count,
            &self.match_value,
            &self.enable,
            &self.break_on_match,
            &self.chain,
        ]
    }

    fn controls_mut(&mut self) -> Vec<&mut dyn Control> {
        vec![
            &mut self.count,
            &mut self.match_value,
            &mut self.enable,
            &mut self.break_on_match,
            &mut self.chain,
        ]
    }
}

/// Trace modes, break status and the stop/reason registers.
pub struct StatusPanel {
    pub single_step: CheckBox,
    pub branch_trace: CheckBox,
    pub stop: TextField,
    pub break_status: Label,
    pub reason: Label,
}

impl StatusPanel {
    pub fn new() -> Self {
        Self {
            single_step: CheckBox::new("Single step", DebugRegister::Dmr1, dmr1::ST),
            branch_trace: CheckBox::new("Branch trace", DebugRegister::Dmr1, dmr1::BT),
            stop: TextField::new("Stop (DSR)", DebugRegister::Dsr, BitRange::WORD, Radix::Hex),
            break_status: Label::new("Break status", DebugRegister::Dmr2, dmr2::WBS, Radix::Hex),
            reason: Label::new("Reason (DRR)", DebugRegister::Drr, BitRange::WORD, Radix::Hex),
        }
    }
}

impl Default for StatusPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterObserver for StatusPanel {
    fn notify_register_update(
        &mut self,
        direction: UpdateDirection,
        cache: &mut RegisterCache,
    ) -> Result<(), InvalidFormat> {
        sync_controls(self.controls_mut(), direction, cache)
    }
}

impl Panel for StatusPanel {
    fn title(&self) -> String {
        "Status".to_string()
    }

    fn controls(&self) -> Vec<&dyn Control> {
        vec![
            &self.single_step,
            &self.branch_trace,
            &self.stop,
            &self.break_status,
            &self.reason,
        ]
    }

    fn controls_mut(&mut self) -> Vec<&mut dyn Control> {
        vec![
            &mut self.single_step,
            &mut self.branch_trace,
            &mut self.stop,
            &mut self.break_status,
            &mut self.reason,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watchpoint_panel_encodes_all_fields() {
        let mut cache = RegisterCache::new();
        let mut panel = WatchpointPanel::new(3);
        panel.value.set_text("0x80000000");
        panel.condition.select(1);
        panel.signed.set_checked(true);
        panel.compare.select(2);
        panel.chain.select(2);
        panel.break_on_match.set_checked(true);
        panel.counter.select(1);

        panel
            .notify_register_update(UpdateDirection::GuiToRegisters, &mut cache)
            .unwrap();

        assert_eq!(cache.get(DebugRegister::Dvr(3)), 0x8000_0000);
        assert_eq!(cache.get(DebugRegister::Dcr(3)), 0b010_1_001_0);
        assert_eq!(cache.get(DebugRegister::Dmr1), 0b10 << 6);
        assert_eq!(cache.get(DebugRegister::Dmr2), (1 << 15) | (1 << 5));
    }

    #[test]
    fn bad_value_leaves_cache_untouched() {
        let mut cache = RegisterCache::new();
        cache.load(vec![(DebugRegister::Dcr(0), 0x3)]);
        let before = cache.clone();

        let mut panel = WatchpointPanel::new(0);
        panel.condition.select(4);
        panel.break_on_match.set_checked(true);
        panel.value.set_text("not a number");

        let error = panel
            .notify_register_update(UpdateDirection::GuiToRegisters, &mut cache)
            .unwrap_err();
        assert_eq!(error.input, "not a number");
        assert_eq!(cache, before);
    }

    #[test]
    fn counter_panel_shares_dmr_with_watchpoints() {
        let mut cache = RegisterCache::new();
        cache.set(DebugRegister::Dmr2, (1 << 1) | (1 << 21));
        cache.set(DebugRegister::Dmr1, 1 << 18);
        cache.set(DebugRegister::Dwcr(1), (7 << 16) | 2);

        let mut panel = CounterPanel::new(1);
        panel
            .notify_register_update(UpdateDirection::RegistersToGui, &mut cache)
            .unwrap();

        assert!(panel.enable.is_checked());
        assert!(panel.break_on_match.is_checked());
        assert_eq!(panel.chain.selected_name(), Some("AND"));
        assert_eq!(panel.count.text(), "2");
        assert_eq!(panel.match_value.text(), "7");
    }

    #[test]
    fn status_panel_titles_and_rows() {
        let panel = StatusPanel::new();
        assert_eq!(panel.title(), "Status");
        let labels: Vec<_> = panel.controls().iter().map(|c| c.label().to_string()).collect();
        assert_eq!(labels[0], "Single step");
        assert!(panel.controls()[3].is_read_only());
        assert_eq!(WatchpointPanel::new(7).title(), "WP7");
    }
}

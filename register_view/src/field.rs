use crate::{
    register::{BitRange, DebugRegister},
    Control, Input, InvalidFormat, RegisterCache, RegisterObserver, UpdateDirection,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Radix {
    Hex,
    Decimal,
}

impl Radix {
    fn format(self, value: u32, range: BitRange) -> String {
        match self {
            Radix::Hex => {
                let digits = ((range.width + 3) / 4) as usize;
                format!("0x{:0width$X}", value, width = digits)
            }
            Radix::Decimal => value.to_string(),
        }
    }
}

/// A text entry bound to a bit range of a register.
#[derive(Debug, Clone)]
pub struct TextField {
    label: String,
    register: DebugRegister,
    range: BitRange,
    radix: Radix,
    text: String,
}

impl TextField {
    pub fn new(
        label: impl Into<String>,
        register: DebugRegister,
        range: BitRange,
        radix: Radix,
    ) -> Self {
        Self {
            label: label.into(),
            register,
            range,
            radix,
            text: radix.format(0, range),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Parses the held text into the field value.
    pub fn value(&self) -> Result<u32, InvalidFormat> {
        let invalid = |reason: &str| {
            InvalidFormat::new(
                format!("{} ({})", self.label, self.register),
                self.text.clone(),
                reason,
            )
        };

        let text = self.text.trim();
        let (digits, radix) = match self.radix {
            Radix::Hex => (
                text.strip_prefix("0x")
                    .or_else(|| text.strip_prefix("0X"))
                    .unwrap_or(text),
                16,
            ),
            Radix::Decimal => (text, 10),
        };

        if digits.is_empty() {
            return Err(invalid("no digits"));
        }
        // `from_str_radix` would also accept a leading sign.
        if !digits.chars().all(|c| c.is_digit(radix)) {
            return Err(invalid(match self.radix {
                Radix::Hex => "not a hexadecimal number",
                Radix::Decimal => "not a decimal number",
            }));
        }

        let value = u32::from_str_radix(digits, radix).map_err(|_| invalid("out of range"))?;
        if value > self.range.max_value() {
            return Err(invalid(&format!(
                "does not fit into {} bits",
                self.range.width
            )));
        }
        Ok(value)
    }
}

impl RegisterObserver for TextField {
    fn notify_register_update(
        &mut self,
        direction: UpdateDirection,
        cache: &mut RegisterCache,
    ) -> Result<(), InvalidFormat> {
        match direction {
            UpdateDirection::GuiToRegisters => {
                let value = self.value()?;
                cache.set_field(self.register, self.range, value);
            }
            UpdateDirection::RegistersToGui => {
                self.text = self
                    .radix
                    .format(cache.field(self.register, self.range), self.range);
            }
        }
        Ok(())
    }
}

impl Control for TextField {
    fn label(&self) -> &str {
        &self.label
    }

    fn display(&self) -> String {
        self.text.clone()
    }

    fn input(&mut self, input: Input) {
        match input {
            Input::Char(c) if !c.is_control() => self.text.push(c),
            Input::Backspace => {
                self.text.pop();
            }
            _ => (),
        }
    }
}

/// A checkbox bound to a single bit.
#[derive(Debug, Clone)]
pub struct CheckBox {
    label: String,
    register: DebugRegister,
    bit: BitRange,
    checked: bool,
}

impl CheckBox {
    pub fn new(label: impl Into<String>, register: DebugRegister, bit: BitRange) -> Self {
        debug_assert_eq!(bit.width, 1);
        Self {
            label: label.into(),
            register,
            bit,
            checked: false,
        }
    }

    pub fn is_checked(&self) -> bool {
        self.checked
    }

    pub fn set_checked(&mut self, checked: bool) {
        self.checked = checked;
    }
}

impl RegisterObserver for CheckBox {
    fn notify_register_update(
        &mut self,
        direction: UpdateDirection,
        cache: &mut RegisterCache,
    ) -> Result<(), InvalidFormat> {
        match direction {
            UpdateDirection::GuiToRegisters => {
                cache.set_field(self.register, self.bit, self.checked as u32)
            }
            UpdateDirection::RegistersToGui => {
                self.checked = cache.field(self.register, self.bit) != 0
            }
        }
        Ok(())
    }
}

impl Control for CheckBox {
    fn label(&self) -> &str {
        &self.label
    }

    fn display(&self) -> String {
        let mark = if self.checked { "[x]" } else { "[ ]" };
        mark.to_string()
    }

    fn input(&mut self, input: Input) {
        if let Input::Toggle = input {
            self.checked = !self.checked;
        }
    }
}

/// A selection among named values of a multi bit field.
///
/// Values read from the target without a name are kept and written back as they are.
#[derive(Debug, Clone)]
pub struct ComboBox {
    label: String,
    register: DebugRegister,
    range: BitRange,
    options: Vec<&'static str>,
    selected: u32,
}

impl ComboBox {
    pub fn new(
        label: impl Into<String>,
        register: DebugRegister,
        range: BitRange,
        options: &[&'static str],
    ) -> Self {
        debug_assert!(!options.is_empty());
        debug_assert!(options.len() as u64 <= range.max_value() as u64 + 1);
        Self {
            label: label.into(),
            register,
            range,
            options: options.to_vec(),
            selected: 0,
        }
    }

    pub fn selected(&self) -> u32 {
        self.selected
    }

    pub fn selected_name(&self) -> Option<&'static str> {
        self.options.get(self.selected as usize).copied()
    }

    /// Selects a raw field value. Values wider than the field are truncated.
    pub fn select(&mut self, value: u32) {
        self.selected = value & self.range.max_value();
    }
}

impl RegisterObserver for ComboBox {
    fn notify_register_update(
        &mut self,
        direction: UpdateDirection,
        cache: &mut RegisterCache,
    ) -> Result<(), InvalidFormat> {
        match direction {
            UpdateDirection::GuiToRegisters => {
                cache.set_field(self.register, self.range, self.selected)
            }
            UpdateDirection::RegistersToGui => {
                self.selected = cache.field(self.register, self.range)
            }
        }
        Ok(())
    }
}

impl Control for ComboBox {
    fn label(&self) -> &str {
        &self.label
    }

    fn display(&self) -> String {
        match self.selected_name() {
            Some(name) => format!("< {} >", name),
            None => format!("< reserved ({}) >", self.selected),
        }
    }

    fn input(&mut self, input: Input) {
        if let Input::Toggle = input {
            let next = self.selected as usize + 1;
            self.selected = if next < self.options.len() {
                next as u32
            } else {
                0
            };
        }
    }
}

/// A read-only view of a register field.
#[derive(Debug, Clone)]
pub struct Label {
    label: String,
    register: DebugRegister,
    range: BitRange,
    radix: Radix,
    text: String,
}

impl Label {
    pub fn new(
        label: impl Into<String>,
        register: DebugRegister,
        range: BitRange,
        radix: Radix,
    ) -> Self {
        Self {
            label: label.into(),
            register,
            range,
            radix,
            text: radix.format(0, range),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl RegisterObserver for Label {
    fn notify_register_update(
        &mut self,
        direction: UpdateDirection,
        cache: &mut RegisterCache,
    ) -> Result<(), InvalidFormat> {
        if let UpdateDirection::RegistersToGui = direction {
            self.text = self
                .radix
                .format(cache.field(self.register, self.range), self.range);
        }
        Ok(())
    }
}

impl Control for Label {
    fn label(&self) -> &str {
        &self.label
    }

    fn display(&self) -> String {
        self.text.clone()
    }

    fn input(&mut self, _input: Input) {}

    fn is_read_only(&self) -> bool {
        true
    }
}

use std::fmt;

/// SPR group of the debug unit.
const DEBUG_GROUP: u16 = 6 << 11;

/// Number of DVR/DCR pairs implemented by the debug unit.
pub const WATCHPOINTS: u8 = 8;
/// Number of watchpoint counters (DWCR0, DWCR1).
pub const COUNTERS: u8 = 2;

/// A register of the OR1200 debug unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DebugRegister {
    /// Debug value register.
    Dvr(u8),
    /// Debug control register.
    Dcr(u8),
    Dmr1,
    Dmr2,
    /// Debug watchpoint counter register.
    Dwcr(u8),
    Dsr,
    Drr,
}

impl DebugRegister {
    pub const ALL: [DebugRegister; 22] = [
        DebugRegister::Dvr(0),
        DebugRegister::Dvr(1),
        DebugRegister::Dvr(2),
        DebugRegister::Dvr(3),
        DebugRegister::Dvr(4),
        DebugRegister::Dvr(5),
        DebugRegister::Dvr(6),
        DebugRegister::Dvr(7),
        DebugRegister::Dcr(0),
        DebugRegister::Dcr(1),
        DebugRegister::Dcr(2),
        DebugRegister::Dcr(3),
        DebugRegister::Dcr(4),
        DebugRegister::Dcr(5),
        DebugRegister::Dcr(6),
        DebugRegister::Dcr(7),
        DebugRegister::Dmr1,
        DebugRegister::Dmr2,
        DebugRegister::Dwcr(0),
        DebugRegister::Dwcr(1),
        DebugRegister::Dsr,
        DebugRegister::Drr,
    ];

    /// The special purpose register number used to address this register.
    pub fn spr(self) -> u16 {
        debug_assert!(self.is_implemented(), "{:?} is not implemented", self);
        let index = match self {
            DebugRegister::Dvr(n) => n as u16,
            DebugRegister::Dcr(n) => 8 + n as u16,
            DebugRegister::Dmr1 => 16,
            DebugRegister::Dmr2 => 17,
            DebugRegister::Dwcr(n) => 18 + n as u16,
            DebugRegister::Dsr => 20,
            DebugRegister::Drr => 21,
        };
        DEBUG_GROUP | index
    }

    /// Whether the index of a numbered register is in range.
    pub fn is_implemented(self) -> bool {
        match self {
            DebugRegister::Dvr(n) | DebugRegister::Dcr(n) => n < WATCHPOINTS,
            DebugRegister::Dwcr(n) => n < COUNTERS,
            _ => true,
        }
    }

    pub fn from_spr(spr: u16) -> Option<Self> {
        DebugRegister::ALL.iter().copied().find(|r| r.spr() == spr)
    }

    pub fn name(self) -> String {
        match self {
            DebugRegister::Dvr(n) => format!("DVR{}", n),
            DebugRegister::Dcr(n) => format!("DCR{}", n),
            DebugRegister::Dmr1 => "DMR1".to_string(),
            DebugRegister::Dmr2 => "DMR2".to_string(),
            DebugRegister::Dwcr(n) => format!("DWCR{}", n),
            DebugRegister::Dsr => "DSR".to_string(),
            DebugRegister::Drr => "DRR".to_string(),
        }
    }
}

impl fmt::Display for DebugRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A contiguous range of bits inside a 32 bit register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitRange {
    pub offset: u32,
    pub width: u32,
}

impl BitRange {
    pub const WORD: BitRange = BitRange {
        offset: 0,
        width: 32,
    };

    /// Panics unless `1 <= width` and the range ends inside the word.
    pub const fn new(offset: u32, width: u32) -> Self {
        assert!(width > 0 && offset + width <= 32, "bit range outside of a word");
        Self { offset, width }
    }

    pub const fn bit(offset: u32) -> Self {
        assert!(offset < 32, "bit outside of a word");
        Self { offset, width: 1 }
    }

    pub fn lsb(&self) -> u32 {
        self.offset
    }

    pub fn msb(&self) -> u32 {
        self.offset + self.width - 1
    }

    pub fn max_value(&self) -> u32 {
        if self.width >= 32 {
            u32::MAX
        } else {
            (1 << self.width) - 1
        }
    }

    fn mask(&self) -> u32 {
        self.max_value() << self.offset
    }

    pub fn extract(&self, word: u32) -> u32 {
        let left_shift = 31 - self.msb();
        (word << left_shift) >> (self.lsb() + left_shift)
    }

    /// Replaces the bits of `word` covered by this range. Excess bits of `value` are dropped.
    pub fn insert(&self, word: u32, value: u32) -> u32 {
        (word & !self.mask()) | ((value & self.max_value()) << self.offset)
    }
}

/// Field layout of the debug control registers.
pub mod dcr {
    use super::BitRange;

    /// DVR/DCR pair present.
    pub const DP: BitRange = BitRange::bit(0);
    /// Compare condition.
    pub const CC: BitRange = BitRange::new(1, 3);
    /// Signed compare.
    pub const SC: BitRange = BitRange::bit(4);
    /// Compare type.
    pub const CT: BitRange = BitRange::new(5, 3);

    pub const CONDITIONS: [&str; 7] = ["masked", "==", "<", "<=", ">", ">=", "!="];

    pub const COMPARE_TYPES: [&str; 8] = [
        "disabled",
        "insn fetch addr",
        "load addr",
        "store addr",
        "load data",
        "store data",
        "load/store addr",
        "load/store data",
    ];
}

/// Field layout of debug mode register 1.
pub mod dmr1 {
    use super::BitRange;

    /// Chain mode of watchpoint `n` (0..10).
    pub const fn chain(n: u8) -> BitRange {
        BitRange::new(2 * n as u32, 2)
    }

    /// Single step trace.
    pub const ST: BitRange = BitRange::bit(22);
    /// Branch trace.
    pub const BT: BitRange = BitRange::bit(23);

    pub const CHAINS: [&str; 3] = ["none", "AND", "OR"];
}

/// Field layout of debug mode register 2.
pub mod dmr2 {
    use super::BitRange;

    /// Counter enable of counter `k` (0..2).
    pub const fn counter_enable(k: u8) -> BitRange {
        BitRange::bit(k as u32)
    }

    /// Counter assignment of watchpoint `n`: clear counts into DWCR0, set into DWCR1.
    pub const fn counter_assign(n: u8) -> BitRange {
        BitRange::bit(2 + n as u32)
    }

    /// Watchpoint `n` generates a breakpoint.
    pub const fn break_generate(n: u8) -> BitRange {
        BitRange::bit(12 + n as u32)
    }

    /// Watchpoint break status, one bit per watchpoint.
    pub const WBS: BitRange = BitRange::new(22, 10);

    pub const COUNTERS: [&str; 2] = ["counter 0", "counter 1"];
}

/// Field layout of the watchpoint counter registers.
pub mod dwcr {
    use super::BitRange;

    pub const COUNT: BitRange = BitRange::new(0, 16);
    pub const MATCH: BitRange = BitRange::new(16, 16);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spr_numbers_follow_group_six() {
        assert_eq!(DebugRegister::Dvr(0).spr(), 0x3000);
        assert_eq!(DebugRegister::Dcr(7).spr(), 0x300f);
        assert_eq!(DebugRegister::Dmr1.spr(), 0x3010);
        assert_eq!(DebugRegister::Dmr2.spr(), 0x3011);
        assert_eq!(DebugRegister::Dwcr(1).spr(), 0x3013);
        assert_eq!(DebugRegister::Drr.spr(), 0x3015);
    }

    #[test]
    fn spr_lookup_is_inverse() {
        for register in DebugRegister::ALL.iter() {
            assert_eq!(DebugRegister::from_spr(register.spr()), Some(*register));
        }
        assert_eq!(DebugRegister::from_spr(0x2000), None);
    }

    #[test]
    fn insert_keeps_surrounding_bits() {
        let word = 0xffff_ffff;
        let word = dcr::CC.insert(word, 0b010);
        assert_eq!(word, 0xffff_fff5);
        assert_eq!(dcr::CC.extract(word), 0b010);
        assert_eq!(BitRange::WORD.insert(0, 0xdead_beef), 0xdead_beef);
        assert_eq!(dwcr::MATCH.extract(0x1234_5678), 0x1234);
    }

    #[test]
    #[should_panic]
    fn empty_bit_range_is_rejected() {
        BitRange::new(4, 0);
    }

    #[test]
    #[should_panic]
    fn bit_range_past_the_word_is_rejected() {
        BitRange::new(30, 4);
    }

    #[test]
    fn numbered_registers_are_bounded() {
        assert!(DebugRegister::Dcr(7).is_implemented());
        assert!(!DebugRegister::Dvr(8).is_implemented());
        assert!(!DebugRegister::Dwcr(2).is_implemented());
        assert!(DebugRegister::ALL.iter().all(|r| r.is_implemented()));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not implemented")]
    fn out_of_range_register_has_no_spr() {
        DebugRegister::Dvr(8).spr();
    }

    #[test]
    fn dmr_layout() {
        assert_eq!(dmr1::chain(9), BitRange::new(18, 2));
        assert_eq!(dmr2::counter_assign(7).lsb(), 9);
        assert_eq!(dmr2::break_generate(9).msb(), 21);
        assert_eq!(dmr2::WBS.max_value(), 0x3ff);
    }
}

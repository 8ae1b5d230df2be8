//! The IRQ counter circuit shared by the VRC4, VRC6, and VRC7 boards.

use bincode::{Decode, Encode};

const PRESCALER_SEQUENCE: [u8; 3] = [114, 114, 113];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
enum IrqMode {
    Scanline,
    Cycle,
}

#[derive(Debug, Clone, Encode, Decode)]
pub(crate) struct VrcIrqCounter {
    irq_counter: u8,
    prescaler_counter: u8,
    prescaler_step: u8,
    enabled: bool,
    pending: bool,
    mode: IrqMode,
    reload_value: u8,
    enable_after_ack: bool,
}

impl VrcIrqCounter {
    pub(crate) fn new() -> Self {
        Self {
            irq_counter: 0,
            prescaler_counter: 0,
            prescaler_step: 0,
            enabled: false,
            pending: false,
            mode: IrqMode::Scanline,
            reload_value: 0,
            enable_after_ack: false,
        }
    }

    pub(crate) fn set_reload_value(&mut self, value: u8) {
        self.reload_value = value;
    }

    pub(crate) fn set_reload_value_low_4_bits(&mut self, value: u8) {
        self.reload_value = (self.reload_value & 0xF0) | (value & 0x0F);
    }

    pub(crate) fn set_reload_value_high_4_bits(&mut self, value: u8) {
        self.reload_value = (self.reload_value & 0x0F) | (value << 4);
    }

    pub(crate) fn set_control(&mut self, value: u8) {
        self.pending = false;
        self.reset_prescaler();

        self.enable_after_ack = value & 0x01 != 0;
        self.enabled = value & 0x02 != 0;
        self.mode = if value & 0x04 != 0 { IrqMode::Cycle } else { IrqMode::Scanline };

        if self.enabled {
            self.irq_counter = self.reload_value;
        }
    }

    pub(crate) fn acknowledge(&mut self) {
        self.pending = false;
        self.enabled = self.enable_after_ack;
    }

    pub(crate) fn tick_cpu(&mut self, cycles: u32) {
        for _ in 0..cycles {
            self.tick();
        }
    }

    fn tick(&mut self) {
        if !self.enabled {
            return;
        }

        match self.mode {
            IrqMode::Scanline => {
                // Scanline mode uses a prescaler that approximates a 113.666~ divider
                self.prescaler_counter += 1;
                if self.prescaler_counter == PRESCALER_SEQUENCE[self.prescaler_step as usize] {
                    self.clock_irq();

                    self.prescaler_counter = 0;
                    self.prescaler_step = (self.prescaler_step + 1) % 3;
                }
            }
            IrqMode::Cycle => {
                // Cycle mode clocks IRQ on every CPU cycle
                self.clock_irq();
            }
        }
    }

    fn clock_irq(&mut self) {
        if self.irq_counter == u8::MAX {
            self.irq_counter = self.reload_value;
            self.pending = true;
        } else {
            self.irq_counter += 1;
        }
    }

    pub(crate) fn interrupt_flag(&self) -> bool {
        self.pending
    }

    fn reset_prescaler(&mut self) {
        self.prescaler_counter = 0;
        self.prescaler_step = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_mode_counts_up_from_reload_value() {
        let mut irq = VrcIrqCounter::new();

        irq.set_reload_value(0xFD);
        irq.set_control(0x06);

        irq.tick_cpu(2);
        assert!(!irq.interrupt_flag());

        irq.tick_cpu(1);
        assert!(irq.interrupt_flag());
        assert_eq!(irq.irq_counter, 0xFD);
    }

    #[test]
    fn scanline_mode_prescaler_sequence() {
        let mut irq = VrcIrqCounter::new();

        irq.set_reload_value(0xFF);
        irq.set_control(0x02);

        // first scanline clock after 114 CPU cycles
        irq.tick_cpu(113);
        assert!(!irq.interrupt_flag());
        irq.tick_cpu(1);
        assert!(irq.interrupt_flag());

        // three scanline clocks per 341 CPU cycles
        irq.set_control(0x02);
        assert!(!irq.interrupt_flag());
        irq.set_reload_value(0xFD);
        irq.set_control(0x02);
        irq.tick_cpu(114 + 114 + 113);
        assert!(irq.interrupt_flag());
    }

    #[test]
    fn acknowledge_respects_enable_after_ack() {
        let mut irq = VrcIrqCounter::new();

        irq.set_reload_value(0xFF);
        irq.set_control(0x06);
        irq.tick_cpu(1);
        assert!(irq.interrupt_flag());

        // bit 0 clear stops the counter on ack
        irq.acknowledge();
        assert!(!irq.interrupt_flag());
        irq.tick_cpu(500);
        assert!(!irq.interrupt_flag());

        irq.set_control(0x07);
        irq.tick_cpu(1);
        assert!(irq.interrupt_flag());
        irq.acknowledge();
        irq.tick_cpu(1);
        assert!(irq.interrupt_flag());
    }
}

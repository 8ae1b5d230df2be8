use crate::cpu::{BusInterface, CpuState, StatusReadContext};
use std::collections::HashMap;

struct TestBus {
    memory: Box<[u8; 0x10000]>,
}

impl TestBus {
    fn with_program(program: &str) -> Self {
        let mut memory: Box<[u8; 0x10000]> = vec![0; 0x10000].into_boxed_slice().try_into().unwrap();

        // Set RESET vector to 0x8000
        memory[0xFFFC] = 0x00;
        memory[0xFFFD] = 0x80;

        for (i, chunk) in program.as_bytes().chunks_exact(2).enumerate() {
            let hex = std::str::from_utf8(chunk).unwrap();
            memory[0x8000 + i] = u8::from_str_radix(hex, 16).unwrap();
        }

        Self { memory }
    }
}

impl BusInterface for TestBus {
    fn read(&mut self, address: u16) -> u8 {
        self.memory[address as usize]
    }

    fn write(&mut self, address: u16, value: u8) {
        self.memory[address as usize] = value;
    }
}

#[derive(Default)]
struct ExpectedState {
    a: Option<u8>,
    x: Option<u8>,
    y: Option<u8>,
    p: Option<u8>,
    s: Option<u8>,
    pc: Option<u16>,
    memory: HashMap<u16, u8>,
    cycles: Option<u32>,
}

macro_rules! assert_state_eq {
    ($(($name:literal, $expected:expr, $actual:expr)),+$(,)?) => {
        {
            let mut errors: Vec<String> = Vec::new();

            $(
                if let Some(expected) = $expected {
                    let actual = $actual;
                    if expected != actual {
                        errors.push(format!("[{} mismatch: expected = {:02X}, actual = {:02X}]", stringify!($name), expected, actual));
                    }
                }
            )*

            errors
        }
    }
}

impl ExpectedState {
    fn assert_eq(&self, cpu: &CpuState, bus: &TestBus, cycle_count: u32) {
        let registers = cpu.registers();
        let mut errors = assert_state_eq!(
            ("A", self.a, registers.accumulator),
            ("X", self.x, registers.x),
            ("Y", self.y, registers.y),
            ("P", self.p, registers.status.to_byte(StatusReadContext::PushStack)),
            ("S", self.s, registers.sp),
            ("PC", self.pc, registers.pc),
            ("Cycles", self.cycles, cycle_count),
        );

        for (&address, &value) in &self.memory {
            let actual_value = bus.memory[address as usize];
            if value != actual_value {
                errors.push(format!("[Mismatch at memory address {address:04X}: expected = {value:02X}, actual = {actual_value:02X}]"));
            }
        }

        if !errors.is_empty() {
            panic!("Expected state mismatch: {}", errors.join(", "));
        }
    }
}

fn run_test(program: &str, expected_state: ExpectedState) {
    let mut bus = TestBus::with_program(program);
    let mut cpu = CpuState::new(&mut bus);

    let program_end = 0x8000 + (program.len() / 2) as u16;
    let mut cycle_count = 0;
    while cpu.pc() < program_end && cpu.pc() >= 0x8000 {
        cycle_count += cpu.execute(&mut bus, 1);
    }

    expected_state.assert_eq(&cpu, &bus, cycle_count);
}

#[test]
fn lda_immediate() {
    run_test(
        // LDA #$78
        "A978",
        ExpectedState { a: Some(0x78), p: Some(0x34), cycles: Some(2), ..ExpectedState::default() },
    );

    run_test(
        // LDA #$DD
        "A9DD",
        ExpectedState { a: Some(0xDD), p: Some(0xB4), cycles: Some(2), ..ExpectedState::default() },
    );

    run_test(
        // LDA #$00
        "A900",
        ExpectedState { a: Some(0x00), p: Some(0x36), cycles: Some(2), ..ExpectedState::default() },
    );
}

#[test]
fn lda_zero_page() {
    run_test(
        // LDA #$42; STA $10; LDA #$00; LDA $10
        "A9428510A900A510",
        ExpectedState {
            a: Some(0x42),
            p: Some(0x34),
            memory: [(0x0010, 0x42)].into_iter().collect(),
            cycles: Some(10),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn lda_absolute_x_page_cross_penalty() {
    run_test(
        // LDX #$01; LDA $8000,X (no page cross; reads the LDX operand byte)
        "A201BD0080",
        ExpectedState {
            a: Some(0x01),
            x: Some(0x01),
            cycles: Some(6),
            ..ExpectedState::default()
        },
    );

    run_test(
        // LDX #$01; LDA $80FF,X (page cross, 5 cycles)
        "A201BDFF80",
        ExpectedState {
            a: Some(0x00),
            x: Some(0x01),
            p: Some(0x36),
            cycles: Some(7),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn sta_absolute_x_no_cross_penalty() {
    // Indexed stores always take 5 cycles, page cross or not
    run_test(
        // LDA #$AB; LDX #$00; STA $0200,X
        "A9ABA2009D0002",
        ExpectedState {
            a: Some(0xAB),
            memory: [(0x0200, 0xAB)].into_iter().collect(),
            cycles: Some(9),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn adc_overflow_and_carry() {
    run_test(
        // LDA #$7F; ADC #$01
        "A97F6901",
        ExpectedState { a: Some(0x80), p: Some(0xF4), cycles: Some(4), ..ExpectedState::default() },
    );

    run_test(
        // SEC; LDA #$00; ADC #$00 (carry in)
        "38A9006900",
        ExpectedState { a: Some(0x01), p: Some(0x34), cycles: Some(6), ..ExpectedState::default() },
    );

    run_test(
        // LDA #$FF; ADC #$01 (carry out, zero result)
        "A9FF6901",
        ExpectedState { a: Some(0x00), p: Some(0x37), cycles: Some(4), ..ExpectedState::default() },
    );
}

#[test]
fn sbc_borrow() {
    run_test(
        // SEC; LDA #$40; SBC #$41
        "38A940E941",
        ExpectedState { a: Some(0xFF), p: Some(0xB4), cycles: Some(6), ..ExpectedState::default() },
    );
}

#[test]
fn inc_memory_wraps_to_zero() {
    run_test(
        // LDA #$FF; STA $20; INC $20
        "A9FF8520E620",
        ExpectedState {
            a: Some(0xFF),
            p: Some(0x36),
            memory: [(0x0020, 0x00)].into_iter().collect(),
            cycles: Some(10),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn asl_accumulator() {
    run_test(
        // LDA #$C0; ASL A
        "A9C00A",
        ExpectedState { a: Some(0x80), p: Some(0xB5), cycles: Some(4), ..ExpectedState::default() },
    );
}

#[test]
fn ror_rotates_carry_in() {
    run_test(
        // SEC; LDA #$00; ROR A
        "38A9006A",
        ExpectedState { a: Some(0x80), p: Some(0xB4), cycles: Some(6), ..ExpectedState::default() },
    );
}

#[test]
fn cmp_sets_carry_and_zero() {
    run_test(
        // LDA #$40; CMP #$40
        "A940C940",
        ExpectedState { a: Some(0x40), p: Some(0x37), cycles: Some(4), ..ExpectedState::default() },
    );

    run_test(
        // LDA #$40; CMP #$41
        "A940C941",
        ExpectedState { a: Some(0x40), p: Some(0xB4), cycles: Some(4), ..ExpectedState::default() },
    );
}

#[test]
fn branch_cycle_counts() {
    // Not taken: 2 cycles
    run_test(
        // LDA #$01; BEQ +2; LDA #$05
        "A901F002A905",
        ExpectedState { a: Some(0x05), cycles: Some(6), ..ExpectedState::default() },
    );

    // Taken, same page: 3 cycles
    run_test(
        // LDA #$00; BEQ +2 (over LDA #$05); NOP
        "A900F002A905EA",
        ExpectedState { a: Some(0x00), cycles: Some(7), ..ExpectedState::default() },
    );

    // Taken, crossing into the next page: 4 cycles
    let mut program = "EA".repeat(251);
    program.push_str("A900F002EAEAEA");
    run_test(
        &program,
        ExpectedState { a: Some(0x00), cycles: Some(510), ..ExpectedState::default() },
    );
}

#[test]
fn jmp_indirect_page_wrap() {
    run_test(
        // LDA #$10; STA $02FF; LDA #$90; STA $0200; JMP ($02FF)
        // Pointer MSB read wraps to $0200 instead of $0300
        "A9108DFF02A9908D00026CFF02",
        ExpectedState { pc: Some(0x9010), cycles: Some(17), ..ExpectedState::default() },
    );
}

#[test]
fn jsr_rts() {
    run_test(
        // JMP $8006; $8003: LDX #$05; RTS; $8006: JSR $8003
        "4C0680A20560200380",
        ExpectedState {
            x: Some(0x05),
            s: Some(0xFD),
            pc: Some(0x8009),
            cycles: Some(17),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn php_plp_restores_flags() {
    run_test(
        // SEC; PHP; CLC; PLP
        "38081828",
        ExpectedState { p: Some(0x35), s: Some(0xFD), cycles: Some(11), ..ExpectedState::default() },
    );
}

#[test]
fn pha_pla() {
    run_test(
        // LDA #$FF; PHA; LDA #$00; PLA
        "A9FF48A90068",
        ExpectedState {
            a: Some(0xFF),
            p: Some(0xB4),
            s: Some(0xFD),
            cycles: Some(11),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn brk_pushes_state_and_vectors() {
    run_test(
        // LDA #$20; STA $FFFE; LDA #$90; STA $FFFF; BRK
        "A9208DFEFFA9908DFFFF00",
        ExpectedState {
            pc: Some(0x9020),
            s: Some(0xFA),
            p: Some(0x34),
            memory: [(0x01FD, 0x80), (0x01FC, 0x0C), (0x01FB, 0x34)].into_iter().collect(),
            cycles: Some(19),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn unofficial_opcodes_execute_as_nops() {
    run_test(
        // NOP $00 (zp); NOP (1A); NOP #$00 (80); NOP $0200 (0C); NOP $0200,X (FC)
        "04001A80000C0002FC0002",
        ExpectedState {
            a: Some(0x00),
            x: Some(0x00),
            p: Some(0x34),
            pc: Some(0x800B),
            cycles: Some(15),
            ..ExpectedState::default()
        },
    );
}

#[test]
fn irq_masked_while_interrupt_disable_set() {
    let mut bus = TestBus::with_program("EAEA");
    bus.memory[0xFFFE] = 0x00;
    bus.memory[0xFFFF] = 0x90;

    let mut cpu = CpuState::new(&mut bus);
    cpu.set_irq_line(true);

    // I flag is set at power-on; both NOPs execute with the line asserted
    assert_eq!(cpu.execute(&mut bus, 1), 2);
    assert_eq!(cpu.execute(&mut bus, 1), 2);
    assert_eq!(cpu.pc(), 0x8002);
}

#[test]
fn cli_delays_irq_by_one_instruction() {
    let mut bus = TestBus::with_program("58EAEA");
    bus.memory[0xFFFE] = 0x00;
    bus.memory[0xFFFF] = 0x90;

    let mut cpu = CpuState::new(&mut bus);
    cpu.set_irq_line(true);

    // CLI
    assert_eq!(cpu.execute(&mut bus, 1), 2);
    assert_eq!(cpu.pc(), 0x8001);

    // One more instruction executes before the IRQ is taken
    assert_eq!(cpu.execute(&mut bus, 1), 2);
    assert_eq!(cpu.pc(), 0x8002);

    // IRQ service: 7 cycles, B flag clear in the pushed status byte
    assert_eq!(cpu.execute(&mut bus, 1), 7);
    assert_eq!(cpu.pc(), 0x9000);
    assert!(cpu.registers().status.interrupt_disable);
    assert_eq!(bus.memory[0x01FB], 0x20);
}

#[test]
fn nmi_is_edge_triggered() {
    let mut bus = TestBus::with_program("EAEAEA");
    bus.memory[0xFFFA] = 0x00;
    bus.memory[0xFFFB] = 0x91;
    for address in 0x9100..0x9110 {
        bus.memory[address] = 0xEA;
    }

    let mut cpu = CpuState::new(&mut bus);

    // Line deasserted, nothing pending
    assert_eq!(cpu.execute(&mut bus, 1), 2);

    cpu.set_nmi_line(true);
    assert_eq!(cpu.execute(&mut bus, 1), 7);
    assert_eq!(cpu.pc(), 0x9100);

    // Holding the line asserted does not retrigger
    assert_eq!(cpu.execute(&mut bus, 1), 2);
    assert_eq!(cpu.pc(), 0x9101);

    // A new edge does
    cpu.set_nmi_line(false);
    cpu.set_nmi_line(true);
    assert_eq!(cpu.execute(&mut bus, 1), 7);
    assert_eq!(cpu.pc(), 0x9100);
}

#[test]
fn reset_is_idempotent() {
    let mut bus = TestBus::with_program("58EAEA");

    let mut cpu = CpuState::new(&mut bus);
    cpu.execute(&mut bus, 4);
    cpu.set_nmi_line(true);
    cpu.set_irq_line(true);

    cpu.reset(&mut bus);
    assert_eq!(cpu.pc(), 0x8000);
    assert_eq!(cpu.registers().sp, 0xFD);
    assert!(cpu.registers().status.interrupt_disable);

    let first = bincode::encode_to_vec(&cpu, bincode::config::standard()).unwrap();
    cpu.reset(&mut bus);
    let second = bincode::encode_to_vec(&cpu, bincode::config::standard()).unwrap();
    assert_eq!(first, second);

    // The pending NMI was discarded by the reset
    assert_eq!(cpu.execute(&mut bus, 1), 2);
    assert_eq!(cpu.pc(), 0x8001);
}

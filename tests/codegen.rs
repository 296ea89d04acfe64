use vm_translator::codegen::{CodegenError, Emitter};
use vm_translator::command::{ArithmeticOp, Command, Segment};
use vm_translator::emulator::{Halt, Machine};

const SP: usize = 0;
const STACK_BASE: i16 = 256;

fn push(segment: Segment, index: u16) -> Command {
    Command::Push { segment, index }
}

fn pop(segment: Segment, index: u16) -> Command {
    Command::Pop { segment, index }
}

fn constant(value: u16) -> Command {
    push(Segment::Constant, value)
}

fn assemble(commands: &[Command]) -> Vec<String> {
    let mut emitter = Emitter::new();
    emitter.set_unit("Unit");
    let mut lines = Vec::new();
    for command in commands {
        lines.extend(emitter.emit(command).expect("translation should succeed"));
    }
    lines
}

/// Assemble, seed RAM, run to the end of the program, return the machine.
fn run(commands: &[Command], seed: &[(usize, i16)]) -> Machine {
    let lines = assemble(commands);
    let mut machine = Machine::load(&lines.join("\n")).expect("program should load");
    machine.set_ram(SP, STACK_BASE);
    for (address, value) in seed {
        machine.set_ram(*address, *value);
    }
    let halt = machine.run().expect("program should run");
    assert_eq!(halt, Halt::EndOfProgram);
    machine
}

#[test]
fn add_result_lands_in_local() {
    let machine = run(
        &[
            constant(7),
            constant(8),
            Command::Arithmetic(ArithmeticOp::Add),
            pop(Segment::Local, 0),
        ],
        &[(1, 300)],
    );
    assert_eq!(machine.ram(300), 15);
    assert_eq!(machine.ram(SP), STACK_BASE);
}

#[test]
fn sub_is_ordered_lower_minus_upper() {
    let machine = run(
        &[
            constant(10),
            constant(4),
            Command::Arithmetic(ArithmeticOp::Sub),
        ],
        &[],
    );
    assert_eq!(machine.ram(256), 6);
    assert_eq!(machine.ram(SP), 257);
}

#[test]
fn comparisons_produce_canonical_booleans() {
    let cases: &[(ArithmeticOp, i16, i16, i16)] = &[
        (ArithmeticOp::Eq, 3, 3, -1),
        (ArithmeticOp::Eq, 3, 4, 0),
        (ArithmeticOp::Gt, 4, 3, -1),
        (ArithmeticOp::Gt, 3, 3, 0),
        (ArithmeticOp::Gt, 2, 9, 0),
        (ArithmeticOp::Lt, 2, 9, -1),
        (ArithmeticOp::Lt, 9, 2, 0),
        (ArithmeticOp::Lt, 3, 3, 0),
    ];
    for (op, x, y, expected) in cases {
        let machine = run(
            &[
                constant(*x as u16),
                constant(*y as u16),
                Command::Arithmetic(*op),
            ],
            &[],
        );
        assert_eq!(
            machine.ram(256),
            *expected,
            "{} {x} {y}",
            op.mnemonic()
        );
        assert_eq!(machine.ram(SP), 257);
    }
}

#[test]
fn unary_operators_rewrite_the_stack_top_in_place() {
    let machine = run(&[constant(7), Command::Arithmetic(ArithmeticOp::Neg)], &[]);
    assert_eq!(machine.ram(256), -7);
    assert_eq!(machine.ram(SP), 257);

    let machine = run(&[constant(0), Command::Arithmetic(ArithmeticOp::Not)], &[]);
    assert_eq!(machine.ram(256), -1);
    assert_eq!(machine.ram(SP), 257);
}

#[test]
fn bitwise_and_or() {
    let machine = run(
        &[
            constant(0b1100),
            constant(0b1010),
            Command::Arithmetic(ArithmeticOp::And),
        ],
        &[],
    );
    assert_eq!(machine.ram(256), 0b1000);

    let machine = run(
        &[
            constant(0b1100),
            constant(0b1010),
            Command::Arithmetic(ArithmeticOp::Or),
        ],
        &[],
    );
    assert_eq!(machine.ram(256), 0b1110);
}

#[test]
fn indirect_segments_round_trip_through_their_base_pointers() {
    // (segment, index, target address given the seeded base pointers)
    let cases: &[(Segment, u16, usize)] = &[
        (Segment::Local, 2, 302),
        (Segment::Argument, 3, 403),
        (Segment::This, 1, 3001),
        (Segment::That, 0, 3010),
    ];
    for (segment, index, target) in cases {
        let machine = run(
            &[
                constant(55),
                pop(*segment, *index),
                push(*segment, *index),
                pop(Segment::Temp, 0),
            ],
            &[(1, 300), (2, 400), (3, 3000), (4, 3010)],
        );
        assert_eq!(machine.ram(*target), 55, "{}", segment.name());
        assert_eq!(machine.ram(5), 55, "{}", segment.name());
        assert_eq!(machine.ram(SP), STACK_BASE, "{}", segment.name());
        // Base pointers must come through untouched.
        assert_eq!(machine.ram(1), 300);
        assert_eq!(machine.ram(2), 400);
        assert_eq!(machine.ram(3), 3000);
        assert_eq!(machine.ram(4), 3010);
    }
}

#[test]
fn pointer_segment_rewires_this_and_that() {
    let machine = run(
        &[
            constant(3000),
            pop(Segment::Pointer, 0),
            constant(3010),
            pop(Segment::Pointer, 1),
            push(Segment::Pointer, 0),
        ],
        &[],
    );
    assert_eq!(machine.ram(3), 3000);
    assert_eq!(machine.ram(4), 3010);
    assert_eq!(machine.ram(256), 3000);
}

#[test]
fn temp_segment_addresses_the_fixed_register_window() {
    let machine = run(&[constant(9), pop(Segment::Temp, 7)], &[]);
    assert_eq!(machine.ram(12), 9);
}

#[test]
fn static_variables_live_in_the_unit_namespace() {
    let lines = assemble(&[constant(9), pop(Segment::Static, 5), push(Segment::Static, 5)]);
    assert!(lines.iter().any(|l| l == "@Unit.5"));

    let mut machine = Machine::load(&lines.join("\n")).expect("program should load");
    machine.set_ram(SP, STACK_BASE);
    let halt = machine.run().expect("program should run");
    assert_eq!(halt, Halt::EndOfProgram);
    let slot = machine.symbol("Unit.5").expect("static slot allocated");
    assert_eq!(machine.ram(slot as usize), 9);
    assert_eq!(machine.ram(256), 9);
}

#[test]
fn if_goto_consumes_the_condition() {
    // Falsy condition: fall through and push.
    let machine = run(
        &[
            constant(0),
            Command::IfGoto("END".to_owned()),
            constant(9),
            Command::Label("END".to_owned()),
        ],
        &[],
    );
    assert_eq!(machine.ram(256), 9);
    assert_eq!(machine.ram(SP), 257);

    // Truthy condition: the push is skipped and the condition is gone.
    let machine = run(
        &[
            constant(1),
            Command::IfGoto("END".to_owned()),
            constant(9),
            Command::Label("END".to_owned()),
        ],
        &[],
    );
    assert_eq!(machine.ram(SP), STACK_BASE);
}

#[test]
fn pop_constant_has_no_translation() {
    let mut emitter = Emitter::new();
    emitter.set_unit("Unit");
    let err = emitter
        .emit(&pop(Segment::Constant, 0))
        .expect_err("pop constant must fail");
    assert!(matches!(err, CodegenError::ConstantPop));
}

#[test]
fn pointer_index_above_one_is_rejected() {
    let mut emitter = Emitter::new();
    emitter.set_unit("Unit");
    let err = emitter
        .emit(&push(Segment::Pointer, 2))
        .expect_err("pointer 2 must fail");
    assert!(matches!(err, CodegenError::PointerIndexOutOfRange(2)));
}

#[test]
fn temp_index_outside_the_window_is_rejected() {
    let mut emitter = Emitter::new();
    emitter.set_unit("Unit");
    let err = emitter
        .emit(&pop(Segment::Temp, 8))
        .expect_err("temp 8 must fail");
    assert!(matches!(err, CodegenError::TempIndexOutOfRange(8)));
}

#[test]
fn comparison_labels_stay_unique_across_occurrences() {
    let lines = assemble(&[
        constant(1),
        constant(1),
        Command::Arithmetic(ArithmeticOp::Eq),
        constant(1),
        constant(1),
        Command::Arithmetic(ArithmeticOp::Eq),
        constant(1),
        constant(1),
        Command::Arithmetic(ArithmeticOp::Gt),
    ]);
    let declared: Vec<&String> = lines.iter().filter(|l| l.starts_with('(')).collect();
    let unique: std::collections::HashSet<&&String> = declared.iter().collect();
    assert_eq!(declared.len(), unique.len());
    assert!(lines.iter().any(|l| l == "(EQ.0)"));
    assert!(lines.iter().any(|l| l == "(EQ.1)"));
    assert!(lines.iter().any(|l| l == "(GT.0)"));
}

#[test]
fn counters_survive_unit_switches() {
    let mut emitter = Emitter::new();
    emitter.set_unit("First");
    let _ = emitter
        .emit(&Command::Arithmetic(ArithmeticOp::Eq))
        .expect("translation should succeed");
    emitter.set_unit("Second");
    let lines = emitter
        .emit(&Command::Arithmetic(ArithmeticOp::Eq))
        .expect("translation should succeed");
    assert!(lines.iter().any(|l| l == "(EQ.1)"));
    assert_eq!(emitter.comparison_labels(), 2);
}

#[test]
fn every_translation_opens_with_a_source_echo() {
    let lines = assemble(&[constant(7)]);
    assert_eq!(lines[0], "// push constant 7");
}

#[test]
fn bootstrap_points_sp_at_the_stack_base_and_calls_the_entry() {
    let mut emitter = Emitter::new();
    let lines = emitter.bootstrap();
    assert_eq!(lines[0], "// bootstrap");
    assert!(lines.iter().any(|l| l == "@256"));
    assert!(lines.iter().any(|l| l == "@Sys.init"));
    assert!(lines.iter().any(|l| l == "(Sys.init$ret.0)"));
    assert_eq!(emitter.call_sites(), 1);
}
